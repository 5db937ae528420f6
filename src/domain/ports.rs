use super::bank_account::{BankAccount, BankAccountUpdate};
use super::booking::{Booking, BookingStatus};
use super::notification::Notification;
use super::payment::{Payment, PaymentStatus};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Result of a status-guarded write.
#[derive(Debug, Clone, PartialEq)]
pub enum Swap<T, S> {
    /// The stored status matched and the new value is now committed.
    Applied(T),
    /// Another writer got there first; the record was left untouched.
    Stale { current: S },
    Missing,
}

#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn insert(&self, booking: Booking) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Booking>>;
    /// All bookings, newest first.
    async fn all(&self) -> Result<Vec<Booking>>;
    /// Atomically replaces the booking if its stored status still equals `expected`.
    async fn swap_if_status(
        &self,
        expected: BookingStatus,
        next: Booking,
    ) -> Result<Swap<Booking, BookingStatus>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Fails with `Conflict` when the transaction id is already taken.
    async fn insert(&self, payment: Payment) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_by_transaction_id(&self, transaction_id: &str) -> Result<Option<Payment>>;
    /// Payments of one owner, newest first.
    async fn for_owner(&self, owner: &str) -> Result<Vec<Payment>>;
    /// Atomically replaces the payment if its stored status still equals `expected`.
    async fn swap_if_status(
        &self,
        expected: PaymentStatus,
        next: Payment,
    ) -> Result<Swap<Payment, PaymentStatus>>;
}

#[async_trait]
pub trait BankAccountStore: Send + Sync {
    /// Inserts or replaces an account. When it is flagged default, every other
    /// default flag is cleared in the same atomic step.
    async fn save(&self, account: BankAccount) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<BankAccount>>;
    async fn all(&self) -> Result<Vec<BankAccount>>;
    /// Applies `update` to the stored account in one atomic step, clearing the
    /// other defaults when the result is flagged default. Returns `None` when
    /// the account is unknown.
    async fn update(
        &self,
        id: Uuid,
        update: BankAccountUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<BankAccount>>;
    /// Makes `id` the only default. Returns `None` when the account is unknown.
    async fn set_default(&self, id: Uuid, now: DateTime<Utc>) -> Result<Option<BankAccount>>;
    /// Deletes a non-default account. Returns false when it does not exist.
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

pub type BookingStoreRef = Arc<dyn BookingStore>;
pub type PaymentStoreRef = Arc<dyn PaymentStore>;
pub type BankAccountStoreRef = Arc<dyn BankAccountStore>;

/// Publish side of the notification fan-out.
#[async_trait]
pub trait NotificationBus: Send + Sync {
    /// Delivers to sessions connected right now; dropped when nobody listens.
    async fn publish(&self, notification: Notification);
}

pub type NotificationBusRef = Arc<dyn NotificationBus>;

/// STK-push request to a mobile-money gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct PushRequest {
    pub phone_number: String,
    pub amount: Decimal,
    pub account_reference: String,
    pub description: String,
}

/// The gateway accepted the push; confirmation arrives later by callback.
#[derive(Debug, Clone, PartialEq)]
pub struct PushAccepted {
    pub checkout_request_id: String,
    pub merchant_request_id: String,
}

#[async_trait]
pub trait MobileMoneyGateway: Send + Sync {
    async fn push_prompt(&self, request: PushRequest) -> Result<PushAccepted>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutOrder {
    pub order_id: String,
    pub approval_url: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CaptureResult {
    Completed { capture_id: String },
    Declined { reason: String },
}

#[async_trait]
pub trait CheckoutGateway: Send + Sync {
    fn currency(&self) -> &str;
    async fn create_order(&self, amount: Decimal, description: &str) -> Result<CheckoutOrder>;
    async fn capture_order(&self, order_id: &str) -> Result<CaptureResult>;
}
