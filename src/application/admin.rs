use crate::application::bookings::BookingService;
use crate::application::reconciliation::{Reconciler, Reconciliation};
use crate::domain::bank_account::{BankAccount, BankAccountUpdate, NewBankAccount};
use crate::domain::notification::{Channel, Notification};
use crate::domain::payment::{Payment, PaymentMethod, SettlementOutcome};
use crate::domain::ports::{BankAccountStoreRef, NotificationBusRef, PaymentStoreRef};
use crate::domain::principal::{Authorizer, Principal};
use crate::error::{DeskError, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BulkFailure {
    pub id: Uuid,
    pub code: &'static str,
    pub message: String,
}

/// Per-id result of a bulk approval.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BulkOutcome {
    pub approved: Vec<Uuid>,
    pub failed: Vec<BulkFailure>,
}

/// Admin decision on a bank-transfer payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Review {
    Approve,
    Reject,
}

/// Admin-only operations that span bookings, payments and the bank account
/// table.
#[derive(Clone)]
pub struct AdminDesk {
    bookings: BookingService,
    payments: PaymentStoreRef,
    reconciler: Reconciler,
    accounts: BankAccountStoreRef,
    bus: NotificationBusRef,
    authorizer: Authorizer,
}

impl AdminDesk {
    pub fn new(
        bookings: BookingService,
        payments: PaymentStoreRef,
        reconciler: Reconciler,
        accounts: BankAccountStoreRef,
        bus: NotificationBusRef,
        authorizer: Authorizer,
    ) -> Self {
        Self {
            bookings,
            payments,
            reconciler,
            accounts,
            bus,
            authorizer,
        }
    }

    /// Approves each id on its own; one failure does not stop the rest.
    pub async fn bulk_approve(
        &self,
        principal: &Principal,
        ids: &[Uuid],
        notes: Option<String>,
    ) -> Result<BulkOutcome> {
        self.authorizer.require_admin(principal)?;

        let mut outcome = BulkOutcome::default();
        for &id in ids {
            match self
                .bookings
                .approve(principal, id, notes.clone(), None, None)
                .await
            {
                Ok(_) => outcome.approved.push(id),
                Err(e) => outcome.failed.push(BulkFailure {
                    id,
                    code: e.code(),
                    message: e.to_string(),
                }),
            }
        }
        info!(
            admin = %principal.id,
            approved = outcome.approved.len(),
            failed = outcome.failed.len(),
            "Bulk approval finished"
        );

        self.bus
            .publish(Notification::new(
                Channel::Admin,
                "bookings-bulk-approved",
                json!({ "approvedBy": principal.id, "result": outcome }),
            ))
            .await;
        Ok(outcome)
    }

    /// Settles a pending bank transfer after an admin checked the proof.
    pub async fn review_bank_transfer(
        &self,
        principal: &Principal,
        payment_id: Uuid,
        review: Review,
        notes: Option<String>,
    ) -> Result<Payment> {
        self.authorizer.require_admin(principal)?;
        let payment = self
            .payments
            .get(payment_id)
            .await?
            .ok_or_else(|| DeskError::not_found("Payment", payment_id))?;
        if payment.method() != PaymentMethod::BankTransfer {
            return Err(DeskError::ValidationError(
                "Only bank transfers are reviewed manually".to_string(),
            ));
        }

        let (outcome, action) = match review {
            Review::Approve => (
                SettlementOutcome::Completed {
                    receipt: None,
                    settled_at: None,
                },
                "approve",
            ),
            Review::Reject => (
                SettlementOutcome::Failed {
                    reason: notes
                        .clone()
                        .unwrap_or_else(|| "Rejected by admin".to_string()),
                },
                "reject",
            ),
        };

        match self
            .reconciler
            .apply(&payment.transaction_id, outcome, notes)
            .await?
        {
            Reconciliation::Applied(settled) => {
                info!(admin = %principal.id, payment_id = %settled.id, action, "Bank transfer reviewed");
                Ok(settled)
            }
            Reconciliation::Unchanged(current) => Err(DeskError::InvalidStateTransition {
                entity: "payment",
                from: current.status.to_string(),
                action,
            }),
        }
    }

    pub async fn create_bank_account(
        &self,
        principal: &Principal,
        input: NewBankAccount,
    ) -> Result<BankAccount> {
        self.authorizer.require_admin(principal)?;
        let account = BankAccount::new(input, Utc::now())?;
        self.accounts.save(account.clone()).await?;
        info!(account_id = %account.id, is_default = account.is_default, "Bank account created");
        Ok(account)
    }

    pub async fn update_bank_account(
        &self,
        principal: &Principal,
        id: Uuid,
        update: BankAccountUpdate,
    ) -> Result<BankAccount> {
        self.authorizer.require_admin(principal)?;
        let next = self
            .accounts
            .update(id, update, Utc::now())
            .await?
            .ok_or_else(|| DeskError::not_found("BankAccount", id))?;
        info!(account_id = %id, "Bank account updated");
        Ok(next)
    }

    pub async fn set_default_bank_account(
        &self,
        principal: &Principal,
        id: Uuid,
    ) -> Result<BankAccount> {
        self.authorizer.require_admin(principal)?;
        let account = self
            .accounts
            .set_default(id, Utc::now())
            .await?
            .ok_or_else(|| DeskError::not_found("BankAccount", id))?;
        info!(account_id = %id, "Default bank account changed");
        Ok(account)
    }

    pub async fn delete_bank_account(&self, principal: &Principal, id: Uuid) -> Result<()> {
        self.authorizer.require_admin(principal)?;
        if self.accounts.delete(id).await? {
            info!(account_id = %id, "Bank account deleted");
            Ok(())
        } else {
            warn!(account_id = %id, "Delete of unknown bank account");
            Err(DeskError::not_found("BankAccount", id))
        }
    }

    /// Default first, then newest.
    pub async fn list_bank_accounts(&self, principal: &Principal) -> Result<Vec<BankAccount>> {
        self.authorizer.require_admin(principal)?;
        let mut accounts = self.accounts.all().await?;
        accounts.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(accounts)
    }

    /// The account payers should transfer to. Any authenticated caller may read it.
    pub async fn default_bank_account(&self) -> Result<BankAccount> {
        self.accounts
            .all()
            .await?
            .into_iter()
            .find(|a| a.is_default && a.is_active)
            .ok_or_else(|| DeskError::not_found("BankAccount", "default"))
    }
}
