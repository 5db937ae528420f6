use crate::application::reconciliation::{Reconciler, Reconciliation};
use crate::domain::notification::{Channel, Notification};
use crate::domain::payment::{
    Amount, Payment, PaymentMethod, PaymentStatus, ProviderDetails, SettlementOutcome,
};
use crate::domain::ports::{
    BankAccountStoreRef, CaptureResult, CheckoutGateway, MobileMoneyGateway, NotificationBusRef,
    PaymentStoreRef, PushRequest, Swap,
};
use crate::domain::principal::{Authorizer, Principal};
use crate::error::{DeskError, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Method-specific part of a payment request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "paymentMethod", rename_all = "snake_case")]
pub enum PaymentInstruction {
    Mock,
    #[serde(alias = "mpesa")]
    MobileMoney {
        #[serde(rename = "phoneNumber")]
        phone_number: String,
    },
    BankTransfer {
        #[serde(rename = "payerAccount", default)]
        payer_account: Option<String>,
    },
    Paypal,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub booking_id: Option<Uuid>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub instruction: PaymentInstruction,
}

/// What the payer has to do next for the payment to settle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NextStep {
    /// Nothing; a confirmation arrives on its own.
    AwaitConfirmation,
    /// Approve the prompt sent to the phone.
    ConfirmOnPhone,
    /// Transfer to the receiving account and submit a proof reference.
    SubmitProof,
    /// Visit the approval URL, then capture.
    ApproveAndCapture,
}

/// A freshly initiated payment and the payer's next step.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHandle {
    pub payment: Payment,
    pub next_step: NextStep,
}

/// Gateways the adapter can reach. A missing gateway means the method is
/// not configured.
#[derive(Clone, Default)]
pub struct Gateways {
    pub mobile_money: Option<Arc<dyn MobileMoneyGateway>>,
    pub checkout: Option<Arc<dyn CheckoutGateway>>,
}

#[derive(Debug, Clone)]
pub struct PaymentSettings {
    pub currency: String,
    pub mock_settlement_delay: Duration,
}

impl Default for PaymentSettings {
    fn default() -> Self {
        Self {
            currency: "KES".to_string(),
            mock_settlement_delay: Duration::from_secs(3),
        }
    }
}

/// Uniform entry point over the mock, mobile money, bank transfer and PayPal
/// settlement strategies.
///
/// A payment row only exists once a correlation token is known: provider
/// calls happen first and a failed call leaves nothing behind.
#[derive(Clone)]
pub struct PaymentAdapter {
    store: PaymentStoreRef,
    bank_accounts: BankAccountStoreRef,
    bus: NotificationBusRef,
    reconciler: Reconciler,
    gateways: Gateways,
    authorizer: Authorizer,
    settings: PaymentSettings,
}

impl PaymentAdapter {
    pub fn new(
        store: PaymentStoreRef,
        bank_accounts: BankAccountStoreRef,
        bus: NotificationBusRef,
        reconciler: Reconciler,
        gateways: Gateways,
        authorizer: Authorizer,
        settings: PaymentSettings,
    ) -> Self {
        Self {
            store,
            bank_accounts,
            bus,
            reconciler,
            gateways,
            authorizer,
            settings,
        }
    }

    pub async fn initiate(
        &self,
        principal: &Principal,
        request: PaymentRequest,
    ) -> Result<PaymentHandle> {
        let amount = Amount::new(request.amount)?;
        let description = request.description.clone();

        let handle = match request.instruction {
            PaymentInstruction::Mock => {
                self.start_mock(principal, &request, amount, PaymentMethod::Mock)
                    .await?
            }
            PaymentInstruction::MobileMoney { ref phone_number } => {
                match &self.gateways.mobile_money {
                    Some(gateway) => {
                        let amount = amount.whole_units()?;
                        let accepted = gateway
                            .push_prompt(PushRequest {
                                phone_number: phone_number.clone(),
                                amount: amount.value(),
                                account_reference: request
                                    .booking_id
                                    .map(|id| id.to_string())
                                    .unwrap_or_else(|| principal.id.clone()),
                                description: description
                                    .clone()
                                    .unwrap_or_else(|| "Vehicle service payment".to_string()),
                            })
                            .await?;
                        let payment = Payment::pending(
                            &principal.id,
                            request.booking_id,
                            amount,
                            &self.settings.currency,
                            description,
                            accepted.checkout_request_id,
                            ProviderDetails::MobileMoney {
                                phone_number: phone_number.clone(),
                                merchant_request_id: accepted.merchant_request_id,
                                receipt_number: None,
                                transaction_date: None,
                                error: None,
                            },
                            Utc::now(),
                        );
                        self.store.insert(payment.clone()).await?;
                        PaymentHandle {
                            payment,
                            next_step: NextStep::ConfirmOnPhone,
                        }
                    }
                    None => {
                        info!(
                            owner = %principal.id,
                            "Mobile money gateway not configured, settling with the mock strategy"
                        );
                        self.start_mock(principal, &request, amount, PaymentMethod::MobileMoney)
                            .await?
                    }
                }
            }
            PaymentInstruction::BankTransfer { ref payer_account } => {
                let receiving = self
                    .bank_accounts
                    .all()
                    .await?
                    .into_iter()
                    .find(|a| a.is_default && a.is_active)
                    .ok_or_else(|| DeskError::not_found("BankAccount", "default"))?;
                let reference = format!("BT-{}", Uuid::new_v4().simple()).to_uppercase();
                let payment = Payment::pending(
                    &principal.id,
                    request.booking_id,
                    amount,
                    &self.settings.currency,
                    description,
                    reference,
                    ProviderDetails::BankTransfer {
                        payer_account: payer_account.clone(),
                        receiving_account: receiving.snapshot(),
                        payment_proof: None,
                    },
                    Utc::now(),
                );
                self.store.insert(payment.clone()).await?;
                PaymentHandle {
                    payment,
                    next_step: NextStep::SubmitProof,
                }
            }
            PaymentInstruction::Paypal => {
                let gateway = self
                    .gateways
                    .checkout
                    .as_ref()
                    .ok_or_else(|| DeskError::UnsupportedMethod("paypal".to_string()))?;
                let order = gateway
                    .create_order(
                        amount.value(),
                        description.as_deref().unwrap_or("Vehicle service payment"),
                    )
                    .await?;
                let payment = Payment::pending(
                    &principal.id,
                    request.booking_id,
                    amount,
                    gateway.currency(),
                    description,
                    order.order_id,
                    ProviderDetails::Paypal {
                        approval_url: order.approval_url,
                        capture_id: None,
                    },
                    Utc::now(),
                );
                self.store.insert(payment.clone()).await?;
                PaymentHandle {
                    payment,
                    next_step: NextStep::ApproveAndCapture,
                }
            }
        };

        info!(
            payment_id = %handle.payment.id,
            owner = %handle.payment.owner,
            method = handle.payment.method().as_str(),
            transaction_id = %handle.payment.transaction_id,
            amount = %handle.payment.amount,
            "Payment initiated"
        );
        Ok(handle)
    }

    async fn start_mock(
        &self,
        principal: &Principal,
        request: &PaymentRequest,
        amount: Amount,
        requested_method: PaymentMethod,
    ) -> Result<PaymentHandle> {
        let token = format!("MOCK_{}", Uuid::new_v4().simple());
        let payment = Payment::pending(
            &principal.id,
            request.booking_id,
            amount,
            &self.settings.currency,
            request.description.clone(),
            token.clone(),
            ProviderDetails::Mock {
                requested_method,
                receipt_number: None,
            },
            Utc::now(),
        );
        self.store.insert(payment.clone()).await?;

        let reconciler = self.reconciler.clone();
        let delay = self.settings.mock_settlement_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let outcome = SettlementOutcome::Completed {
                receipt: Some(format!(
                    "MOCK{}",
                    Uuid::new_v4().simple().to_string()[..10].to_uppercase()
                )),
                settled_at: Some(Utc::now().format("%Y%m%d%H%M%S").to_string()),
            };
            if let Err(e) = reconciler.apply(&token, outcome, None).await {
                error!(transaction_id = %token, error = %e, "Mock settlement failed");
            }
        });

        Ok(PaymentHandle {
            payment,
            next_step: NextStep::AwaitConfirmation,
        })
    }

    /// Captures an approved PayPal order. A payment that is already final is
    /// returned as is.
    pub async fn capture(&self, principal: &Principal, order_id: &str) -> Result<Payment> {
        let payment = self.status_by_token(principal, order_id).await?;
        if payment.method() != PaymentMethod::Paypal {
            return Err(DeskError::ValidationError(
                "Only PayPal payments can be captured".to_string(),
            ));
        }
        if payment.status.is_terminal() {
            return Ok(payment);
        }

        let gateway = self
            .gateways
            .checkout
            .as_ref()
            .ok_or_else(|| DeskError::UnsupportedMethod("paypal".to_string()))?;
        let outcome = match gateway.capture_order(order_id).await? {
            CaptureResult::Completed { capture_id } => SettlementOutcome::Completed {
                receipt: Some(capture_id),
                settled_at: None,
            },
            CaptureResult::Declined { reason } => {
                warn!(order_id, %reason, "PayPal capture declined");
                SettlementOutcome::Failed { reason }
            }
        };
        Ok(self
            .reconciler
            .apply(order_id, outcome, None)
            .await?
            .into_payment())
    }

    /// Attaches a proof-of-payment reference to the caller's pending bank transfer.
    pub async fn submit_proof(
        &self,
        principal: &Principal,
        payment_id: Uuid,
        proof: &str,
    ) -> Result<Payment> {
        let payment = self.get(principal, payment_id).await?;
        if payment.owner != principal.id {
            return Err(DeskError::Forbidden(
                "Only the payer can submit a proof of payment".to_string(),
            ));
        }
        let next = payment.with_proof(proof, Utc::now())?;

        let updated = match self.store.swap_if_status(PaymentStatus::Pending, next).await? {
            Swap::Applied(updated) => updated,
            Swap::Stale { current } => {
                return Err(DeskError::InvalidStateTransition {
                    entity: "payment",
                    from: current.to_string(),
                    action: "attach proof to",
                });
            }
            Swap::Missing => return Err(DeskError::not_found("Payment", payment_id)),
        };
        info!(payment_id = %updated.id, "Proof of payment submitted");

        self.bus
            .publish(Notification::new(
                Channel::Admin,
                "payment-proof-submitted",
                json!({ "payment": updated }),
            ))
            .await;
        Ok(updated)
    }

    /// Cancels a pending payment on behalf of its owner or an admin.
    pub async fn cancel(&self, principal: &Principal, payment_id: Uuid) -> Result<Payment> {
        let payment = self.get(principal, payment_id).await?;
        if payment.status.is_terminal() {
            return Err(DeskError::InvalidStateTransition {
                entity: "payment",
                from: payment.status.to_string(),
                action: "cancel",
            });
        }

        match self
            .reconciler
            .apply(&payment.transaction_id, SettlementOutcome::Cancelled, None)
            .await?
        {
            Reconciliation::Applied(cancelled) => Ok(cancelled),
            Reconciliation::Unchanged(current) => Err(DeskError::InvalidStateTransition {
                entity: "payment",
                from: current.status.to_string(),
                action: "cancel",
            }),
        }
    }

    pub async fn get(&self, principal: &Principal, payment_id: Uuid) -> Result<Payment> {
        match self.store.get(payment_id).await? {
            Some(payment) if self.authorizer.can_access(principal, &payment.owner) => Ok(payment),
            _ => Err(DeskError::not_found("Payment", payment_id)),
        }
    }

    /// Payments of one owner, newest first.
    pub async fn list_for_owner(&self, principal: &Principal, owner: &str) -> Result<Vec<Payment>> {
        self.authorizer.require_self_or_admin(principal, owner)?;
        self.store.for_owner(owner).await
    }

    pub async fn status_by_token(
        &self,
        principal: &Principal,
        transaction_id: &str,
    ) -> Result<Payment> {
        match self.store.find_by_transaction_id(transaction_id).await? {
            Some(payment) if self.authorizer.can_access(principal, &payment.owner) => Ok(payment),
            _ => Err(DeskError::not_found("Payment", transaction_id)),
        }
    }
}
