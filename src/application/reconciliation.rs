use crate::domain::notification::{Channel, Notification};
use crate::domain::payment::{Payment, PaymentStatus, SettlementOutcome};
use crate::domain::ports::{NotificationBusRef, PaymentStoreRef, Swap};
use crate::error::{DeskError, Result};
use crate::infrastructure::providers::daraja;
use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

/// What a confirmation did to the payment it names.
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// This confirmation moved the payment out of `pending`.
    Applied(Payment),
    /// The payment was already final; nothing changed and nothing was published.
    Unchanged(Payment),
}

impl Reconciliation {
    pub fn payment(&self) -> &Payment {
        match self {
            Self::Applied(p) | Self::Unchanged(p) => p,
        }
    }

    pub fn into_payment(self) -> Payment {
        match self {
            Self::Applied(p) | Self::Unchanged(p) => p,
        }
    }
}

/// Applies provider confirmations, simulated settlements and admin reviews to
/// payment records.
///
/// Confirmations may arrive more than once and in any order. Each one is
/// resolved by looking the payment up by its correlation token and then
/// swapping it out of `pending`; only the swap that wins publishes.
#[derive(Clone)]
pub struct Reconciler {
    store: PaymentStoreRef,
    bus: NotificationBusRef,
}

impl Reconciler {
    pub fn new(store: PaymentStoreRef, bus: NotificationBusRef) -> Self {
        Self { store, bus }
    }

    pub async fn apply(
        &self,
        transaction_id: &str,
        outcome: SettlementOutcome,
        admin_notes: Option<String>,
    ) -> Result<Reconciliation> {
        let Some(payment) = self.store.find_by_transaction_id(transaction_id).await? else {
            warn!(transaction_id, "Confirmation for unknown payment");
            return Err(DeskError::ReconciliationMismatch(transaction_id.to_string()));
        };
        if payment.status.is_terminal() {
            debug!(
                transaction_id,
                status = %payment.status,
                "Duplicate confirmation ignored"
            );
            return Ok(Reconciliation::Unchanged(payment));
        }

        let next = payment.settle(&outcome, admin_notes, Utc::now())?;
        match self.store.swap_if_status(PaymentStatus::Pending, next).await? {
            Swap::Applied(settled) => {
                info!(
                    payment_id = %settled.id,
                    transaction_id,
                    method = settled.method().as_str(),
                    status = %settled.status,
                    "Payment reconciled"
                );
                self.announce(&settled).await;
                Ok(Reconciliation::Applied(settled))
            }
            Swap::Stale { current } => {
                debug!(transaction_id, %current, "Concurrent confirmation won the race");
                let latest = self
                    .store
                    .get(payment.id)
                    .await?
                    .ok_or_else(|| DeskError::not_found("Payment", payment.id))?;
                Ok(Reconciliation::Unchanged(latest))
            }
            Swap::Missing => Err(DeskError::ReconciliationMismatch(
                transaction_id.to_string(),
            )),
        }
    }

    /// Handles a raw STK callback body. Never fails: a malformed or unmatched
    /// callback is logged and acknowledged like any other.
    pub async fn handle_mobile_money_callback(&self, body: &[u8]) {
        let payload: Value = match serde_json::from_slice(body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "Unreadable mobile money callback");
                return;
            }
        };
        let Some(callback) = daraja::parse_callback(&payload) else {
            warn!(payload = %payload, "Mobile money callback without a usable stkCallback");
            return;
        };

        match self
            .apply(&callback.checkout_request_id, callback.outcome, None)
            .await
        {
            Ok(_) => {}
            Err(DeskError::ReconciliationMismatch(token)) => {
                warn!(checkout_request_id = %token, "Mobile money callback matched no payment");
            }
            Err(e) => {
                error!(
                    checkout_request_id = %callback.checkout_request_id,
                    error = %e,
                    "Failed to apply mobile money callback"
                );
            }
        }
    }

    async fn announce(&self, payment: &Payment) {
        let event = format!("payment-{}", payment.status);
        let payload = json!({
            "paymentId": payment.id,
            "transactionId": payment.transaction_id,
            "status": payment.status,
            "amount": payment.amount,
            "payment": payment,
        });
        self.bus
            .publish(Notification::new(
                Channel::user(payment.owner.clone()),
                event.clone(),
                payload.clone(),
            ))
            .await;
        self.bus
            .publish(Notification::new(Channel::Admin, event, payload))
            .await;
    }
}
