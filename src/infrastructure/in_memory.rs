use crate::domain::bank_account::{BankAccount, BankAccountUpdate};
use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::ports::{BankAccountStore, BookingStore, PaymentStore, Swap};
use crate::error::{DeskError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory store for bookings.
///
/// Status-guarded writes hold the write lock across the compare and the
/// replace, so two racing admin actions cannot both observe `pending`.
#[derive(Default, Clone)]
pub struct InMemoryBookingStore {
    bookings: Arc<RwLock<HashMap<Uuid, Booking>>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert(&self, booking: Booking) -> Result<()> {
        let mut bookings = self.bookings.write().await;
        bookings.insert(booking.id, booking);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Booking>> {
        let bookings = self.bookings.read().await;
        Ok(bookings.get(&id).cloned())
    }

    async fn all(&self) -> Result<Vec<Booking>> {
        let bookings = self.bookings.read().await;
        let mut all: Vec<Booking> = bookings.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn swap_if_status(
        &self,
        expected: BookingStatus,
        next: Booking,
    ) -> Result<Swap<Booking, BookingStatus>> {
        let mut bookings = self.bookings.write().await;
        let Some(current) = bookings.get_mut(&next.id) else {
            return Ok(Swap::Missing);
        };
        if current.status != expected {
            return Ok(Swap::Stale {
                current: current.status,
            });
        }
        *current = next.clone();
        Ok(Swap::Applied(next))
    }
}

#[derive(Default)]
struct PaymentTable {
    rows: HashMap<Uuid, Payment>,
    by_token: HashMap<String, Uuid>,
}

/// A thread-safe in-memory store for payments with a unique
/// transaction-id index.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    table: Arc<RwLock<PaymentTable>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        let mut table = self.table.write().await;
        if table.by_token.contains_key(&payment.transaction_id) {
            return Err(DeskError::Conflict(format!(
                "transaction id {} already recorded",
                payment.transaction_id
            )));
        }
        table
            .by_token
            .insert(payment.transaction_id.clone(), payment.id);
        table.rows.insert(payment.id, payment);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Payment>> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id).cloned())
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>> {
        let table = self.table.read().await;
        Ok(table
            .by_token
            .get(transaction_id)
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    async fn for_owner(&self, owner: &str) -> Result<Vec<Payment>> {
        let table = self.table.read().await;
        let mut payments: Vec<Payment> = table
            .rows
            .values()
            .filter(|p| p.owner == owner)
            .cloned()
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    async fn swap_if_status(
        &self,
        expected: PaymentStatus,
        next: Payment,
    ) -> Result<Swap<Payment, PaymentStatus>> {
        let mut table = self.table.write().await;
        let Some(current) = table.rows.get_mut(&next.id) else {
            return Ok(Swap::Missing);
        };
        if current.status != expected {
            return Ok(Swap::Stale {
                current: current.status,
            });
        }
        if current.transaction_id != next.transaction_id {
            return Err(DeskError::Conflict(
                "transaction id is immutable once set".to_string(),
            ));
        }
        *current = next.clone();
        Ok(Swap::Applied(next))
    }
}

/// A thread-safe in-memory bank account table.
#[derive(Default, Clone)]
pub struct InMemoryBankAccountStore {
    accounts: Arc<RwLock<HashMap<Uuid, BankAccount>>>,
}

impl InMemoryBankAccountStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn clear_defaults(accounts: &mut HashMap<Uuid, BankAccount>, keep: Uuid, now: DateTime<Utc>) {
    for account in accounts.values_mut() {
        if account.id != keep && account.is_default {
            account.is_default = false;
            account.updated_at = now;
        }
    }
}

#[async_trait]
impl BankAccountStore for InMemoryBankAccountStore {
    async fn save(&self, account: BankAccount) -> Result<()> {
        let mut accounts = self.accounts.write().await;
        if account.is_default {
            clear_defaults(&mut accounts, account.id, account.updated_at);
        }
        accounts.insert(account.id, account);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<BankAccount>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.get(&id).cloned())
    }

    async fn all(&self) -> Result<Vec<BankAccount>> {
        let accounts = self.accounts.read().await;
        Ok(accounts.values().cloned().collect())
    }

    async fn update(
        &self,
        id: Uuid,
        update: BankAccountUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<BankAccount>> {
        let mut accounts = self.accounts.write().await;
        let Some(current) = accounts.get(&id) else {
            return Ok(None);
        };
        let next = current.apply(update, now)?;
        if next.is_default {
            clear_defaults(&mut accounts, id, now);
        }
        accounts.insert(id, next.clone());
        Ok(Some(next))
    }

    async fn set_default(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<BankAccount>> {
        let mut accounts = self.accounts.write().await;
        if !accounts.contains_key(&id) {
            return Ok(None);
        }
        clear_defaults(&mut accounts, id, now);
        let account = accounts.get_mut(&id).map(|account| {
            account.is_default = true;
            account.updated_at = now;
            account.clone()
        });
        Ok(account)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut accounts = self.accounts.write().await;
        match accounts.get(&id) {
            None => Ok(false),
            Some(account) if account.is_default => Err(DeskError::Conflict(
                "Cannot delete the default bank account".to_string(),
            )),
            Some(_) => {
                accounts.remove(&id);
                Ok(true)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bank_account::{AccountType, NewBankAccount};
    use crate::domain::booking::{BookingAction, BookingDetails, CancellationPolicy};
    use crate::domain::payment::{Amount, ProviderDetails};
    use rust_decimal_macros::dec;

    fn booking() -> Booking {
        Booking::new(
            "u1",
            BookingDetails {
                service_type: Some("oil_change".to_string()),
                ..Default::default()
            },
            Utc::now(),
        )
        .unwrap()
    }

    fn mock_payment(token: &str) -> Payment {
        Payment::pending(
            "u1",
            None,
            Amount::new(dec!(10)).unwrap(),
            "KES",
            None,
            token.to_string(),
            ProviderDetails::Mock {
                requested_method: crate::domain::payment::PaymentMethod::Mock,
                receipt_number: None,
            },
            Utc::now(),
        )
    }

    fn account(name: &str, is_default: bool) -> BankAccount {
        BankAccount::new(
            NewBankAccount {
                account_name: name.to_string(),
                account_number: "1234567".to_string(),
                bank_name: "Equity".to_string(),
                bank_code: "68".to_string(),
                account_type: AccountType::Current,
                is_default,
                admin_notes: None,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_booking_swap_guards_status() {
        let store = InMemoryBookingStore::new();
        let booking = booking();
        store.insert(booking.clone()).await.unwrap();

        let approved = booking
            .transition(
                &BookingAction::Approve {
                    notes: None,
                    estimated_completion: None,
                    assigned_truck: None,
                },
                "admin",
                CancellationPolicy::default(),
                Utc::now(),
            )
            .unwrap();

        let first = store
            .swap_if_status(BookingStatus::Pending, approved.clone())
            .await
            .unwrap();
        assert!(matches!(first, Swap::Applied(_)));

        let second = store
            .swap_if_status(BookingStatus::Pending, approved)
            .await
            .unwrap();
        assert_eq!(
            second,
            Swap::Stale {
                current: BookingStatus::Approved
            }
        );
    }

    #[tokio::test]
    async fn test_booking_swap_missing() {
        let store = InMemoryBookingStore::new();
        let result = store
            .swap_if_status(BookingStatus::Pending, booking())
            .await
            .unwrap();
        assert_eq!(result, Swap::Missing);
    }

    #[tokio::test]
    async fn test_payment_token_is_unique() {
        let store = InMemoryPaymentStore::new();
        store.insert(mock_payment("MOCK-1")).await.unwrap();
        let duplicate = store.insert(mock_payment("MOCK-1")).await;
        assert!(matches!(duplicate, Err(DeskError::Conflict(_))));

        let found = store.find_by_transaction_id("MOCK-1").await.unwrap();
        assert!(found.is_some());
        assert!(store.find_by_transaction_id("MOCK-2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_single_default_account() {
        let store = InMemoryBankAccountStore::new();
        let first = account("First", true);
        let second = account("Second", true);
        store.save(first.clone()).await.unwrap();
        store.save(second.clone()).await.unwrap();

        let defaults: Vec<_> = store
            .all()
            .await
            .unwrap()
            .into_iter()
            .filter(|a| a.is_default)
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id, second.id);

        store.set_default(first.id, Utc::now()).await.unwrap();
        assert!(store.get(first.id).await.unwrap().unwrap().is_default);
        assert!(!store.get(second.id).await.unwrap().unwrap().is_default);
    }

    #[tokio::test]
    async fn test_update_applies_to_latest_state() {
        let store = InMemoryBankAccountStore::new();
        let first = account("First", true);
        let second = account("Second", false);
        store.save(first.clone()).await.unwrap();
        store.save(second.clone()).await.unwrap();

        // Another admin moves the default between our read and our edit.
        store.set_default(second.id, Utc::now()).await.unwrap();
        let renamed = store
            .update(
                first.id,
                BankAccountUpdate {
                    bank_name: Some("KCB".to_string()),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(renamed.bank_name, "KCB");
        assert!(!renamed.is_default);
        assert!(store.get(second.id).await.unwrap().unwrap().is_default);

        store.delete(first.id).await.unwrap();
        let gone = store
            .update(first.id, BankAccountUpdate::default(), Utc::now())
            .await
            .unwrap();
        assert!(gone.is_none());
        assert!(store.get(first.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_to_default_clears_previous() {
        let store = InMemoryBankAccountStore::new();
        let first = account("First", true);
        let second = account("Second", false);
        store.save(first.clone()).await.unwrap();
        store.save(second.clone()).await.unwrap();

        store
            .update(
                second.id,
                BankAccountUpdate {
                    is_default: Some(true),
                    ..Default::default()
                },
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(!store.get(first.id).await.unwrap().unwrap().is_default);
        assert!(store.get(second.id).await.unwrap().unwrap().is_default);
    }

    #[tokio::test]
    async fn test_default_account_cannot_be_deleted() {
        let store = InMemoryBankAccountStore::new();
        let default = account("Main", true);
        let spare = account("Spare", false);
        store.save(default.clone()).await.unwrap();
        store.save(spare.clone()).await.unwrap();

        assert!(matches!(
            store.delete(default.id).await,
            Err(DeskError::Conflict(_))
        ));
        assert!(store.delete(spare.id).await.unwrap());
        assert!(!store.delete(spare.id).await.unwrap());
    }
}
