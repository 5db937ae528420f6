use crate::domain::bank_account::{BankAccount, BankAccountUpdate};
use crate::domain::booking::{Booking, BookingStatus};
use crate::domain::payment::{Payment, PaymentStatus};
use crate::domain::ports::{BankAccountStore, BookingStore, PaymentStore, Swap};
use crate::error::{DeskError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for booking records.
pub const CF_BOOKINGS: &str = "bookings";
/// Column Family for payment records.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family mapping transaction ids to payment ids.
pub const CF_PAYMENT_TOKENS: &str = "payment_tokens";
/// Column Family for admin bank accounts.
pub const CF_BANK_ACCOUNTS: &str = "bank_accounts";

/// A persistent store implementation using RocksDB.
///
/// Bookings, payments and bank accounts live in separate Column Families,
/// serialized as JSON. Every read-compare-write sequence runs under
/// `write_lock`, which is what makes the status-guarded swaps atomic.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path, creating the
    /// column families on first use.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = [CF_BOOKINGS, CF_PAYMENTS, CF_PAYMENT_TOKENS, CF_BANK_ACCOUNTS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()));

        let db = DB::open_cf_descriptors(&opts, path, cfs)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &'static str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| DeskError::internal(format!("{name} column family not found")))
    }

    fn read<T: DeserializeOwned>(&self, cf: &'static str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_cf(self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&self, cf: &'static str, key: &[u8], value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(self.cf(cf)?, key, bytes)?;
        Ok(())
    }

    fn scan<T: DeserializeOwned>(&self, cf: &'static str) -> Result<Vec<T>> {
        let mut rows = Vec::new();
        for item in self.db.iterator_cf(self.cf(cf)?, IteratorMode::Start) {
            let (_key, value) = item?;
            rows.push(serde_json::from_slice(&value)?);
        }
        Ok(rows)
    }
}

#[async_trait]
impl BookingStore for RocksDBStore {
    async fn insert(&self, booking: Booking) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        self.write(CF_BOOKINGS, booking.id.as_bytes(), &booking)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Booking>> {
        self.read(CF_BOOKINGS, id.as_bytes())
    }

    async fn all(&self) -> Result<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self.scan(CF_BOOKINGS)?;
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn swap_if_status(
        &self,
        expected: BookingStatus,
        next: Booking,
    ) -> Result<Swap<Booking, BookingStatus>> {
        let _guard = self.write_lock.lock().await;
        let Some(current) = self.read::<Booking>(CF_BOOKINGS, next.id.as_bytes())? else {
            return Ok(Swap::Missing);
        };
        if current.status != expected {
            return Ok(Swap::Stale {
                current: current.status,
            });
        }
        self.write(CF_BOOKINGS, next.id.as_bytes(), &next)?;
        Ok(Swap::Applied(next))
    }
}

#[async_trait]
impl PaymentStore for RocksDBStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let tokens = self.cf(CF_PAYMENT_TOKENS)?;
        let token = payment.transaction_id.as_bytes();
        if self.db.get_pinned_cf(tokens, token)?.is_some() {
            return Err(DeskError::Conflict(format!(
                "transaction id {} already recorded",
                payment.transaction_id
            )));
        }

        let mut batch = WriteBatch::default();
        batch.put_cf(tokens, token, payment.id.as_bytes());
        batch.put_cf(
            self.cf(CF_PAYMENTS)?,
            payment.id.as_bytes(),
            serde_json::to_vec(&payment)?,
        );
        self.db.write(batch)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Payment>> {
        self.read(CF_PAYMENTS, id.as_bytes())
    }

    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>> {
        let tokens = self.cf(CF_PAYMENT_TOKENS)?;
        let Some(id) = self.db.get_cf(tokens, transaction_id.as_bytes())? else {
            return Ok(None);
        };
        let id = Uuid::from_slice(&id).map_err(|e| DeskError::InternalError(Box::new(e)))?;
        self.read(CF_PAYMENTS, id.as_bytes())
    }

    async fn for_owner(&self, owner: &str) -> Result<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .scan::<Payment>(CF_PAYMENTS)?
            .into_iter()
            .filter(|p| p.owner == owner)
            .collect();
        payments.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(payments)
    }

    async fn swap_if_status(
        &self,
        expected: PaymentStatus,
        next: Payment,
    ) -> Result<Swap<Payment, PaymentStatus>> {
        let _guard = self.write_lock.lock().await;
        let Some(current) = self.read::<Payment>(CF_PAYMENTS, next.id.as_bytes())? else {
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
        self.write(CF_PAYMENTS, next.id.as_bytes(), &next)?;
        Ok(Swap::Applied(next))
    }
}

impl RocksDBStore {
    /// Stages `is_default = false` for every default account except `keep`.
    fn stage_default_clear(
        &self,
        batch: &mut WriteBatch,
        keep: Uuid,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let cf = self.cf(CF_BANK_ACCOUNTS)?;
        for mut account in self.scan::<BankAccount>(CF_BANK_ACCOUNTS)? {
            if account.id != keep && account.is_default {
                account.is_default = false;
                account.updated_at = now;
                batch.put_cf(cf, account.id.as_bytes(), serde_json::to_vec(&account)?);
            }
        }
        Ok(())
    }
}

#[async_trait]
impl BankAccountStore for RocksDBStore {
    async fn save(&self, account: BankAccount) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let mut batch = WriteBatch::default();
        if account.is_default {
            self.stage_default_clear(&mut batch, account.id, account.updated_at)?;
        }
        batch.put_cf(
            self.cf(CF_BANK_ACCOUNTS)?,
            account.id.as_bytes(),
            serde_json::to_vec(&account)?,
        );
        self.db.write(batch)?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<BankAccount>> {
        self.read(CF_BANK_ACCOUNTS, id.as_bytes())
    }

    async fn all(&self) -> Result<Vec<BankAccount>> {
        self.scan(CF_BANK_ACCOUNTS)
    }

    async fn update(
        &self,
        id: Uuid,
        update: BankAccountUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<BankAccount>> {
        let _guard = self.write_lock.lock().await;
        let Some(current) = self.read::<BankAccount>(CF_BANK_ACCOUNTS, id.as_bytes())? else {
            return Ok(None);
        };
        let next = current.apply(update, now)?;

        let mut batch = WriteBatch::default();
        if next.is_default {
            self.stage_default_clear(&mut batch, id, now)?;
        }
        batch.put_cf(
            self.cf(CF_BANK_ACCOUNTS)?,
            id.as_bytes(),
            serde_json::to_vec(&next)?,
        );
        self.db.write(batch)?;
        Ok(Some(next))
    }

    async fn set_default(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<BankAccount>> {
        let _guard = self.write_lock.lock().await;
        let Some(mut account) = self.read::<BankAccount>(CF_BANK_ACCOUNTS, id.as_bytes())? else {
            return Ok(None);
        };
        account.is_default = true;
        account.updated_at = now;

        let mut batch = WriteBatch::default();
        self.stage_default_clear(&mut batch, id, now)?;
        batch.put_cf(
            self.cf(CF_BANK_ACCOUNTS)?,
            id.as_bytes(),
            serde_json::to_vec(&account)?,
        );
        self.db.write(batch)?;
        Ok(Some(account))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        match self.read::<BankAccount>(CF_BANK_ACCOUNTS, id.as_bytes())? {
            None => Ok(false),
            Some(account) if account.is_default => Err(DeskError::Conflict(
                "Cannot delete the default bank account".to_string(),
            )),
            Some(_) => {
                self.db.delete_cf(self.cf(CF_BANK_ACCOUNTS)?, id.as_bytes())?;
                Ok(true)
            }
        }
    }
}
