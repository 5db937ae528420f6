use crate::error::{DeskError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A strictly positive payment amount.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(DeskError::InvalidAmount)
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    /// Rounds to whole currency units, halves away from zero. Fails when the
    /// result is below one unit.
    pub fn whole_units(&self) -> Result<Self> {
        let rounded = self
            .0
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        if rounded >= Decimal::ONE {
            Ok(Self(rounded))
        } else {
            Err(DeskError::InvalidAmount)
        }
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = DeskError;

    fn try_from(value: Decimal) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    MobileMoney,
    BankTransfer,
    Paypal,
    Mock,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MobileMoney => "mobile_money",
            Self::BankTransfer => "bank_transfer",
            Self::Paypal => "paypal",
            Self::Mock => "mock",
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "mobile_money" | "mpesa" => Ok(Self::MobileMoney),
            "bank_transfer" => Ok(Self::BankTransfer),
            "paypal" => Ok(Self::Paypal),
            "mock" => Ok(Self::Mock),
            other => Err(DeskError::UnsupportedMethod(other.to_string())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of the admin account a bank transfer should be sent to.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ReceivingAccount {
    pub account_name: String,
    pub account_number: String,
    pub bank_name: String,
    pub bank_code: String,
}

/// Method-specific payment data, keyed by the payment method.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "paymentMethod", rename_all = "snake_case")]
pub enum ProviderDetails {
    Mock {
        #[serde(rename = "requestedMethod")]
        requested_method: PaymentMethod,
        #[serde(rename = "receiptNumber")]
        receipt_number: Option<String>,
    },
    MobileMoney {
        #[serde(rename = "phoneNumber")]
        phone_number: String,
        #[serde(rename = "merchantRequestId")]
        merchant_request_id: String,
        #[serde(rename = "receiptNumber")]
        receipt_number: Option<String>,
        #[serde(rename = "transactionDate")]
        transaction_date: Option<String>,
        error: Option<String>,
    },
    BankTransfer {
        #[serde(rename = "payerAccount")]
        payer_account: Option<String>,
        #[serde(rename = "receivingAccount")]
        receiving_account: ReceivingAccount,
        #[serde(rename = "paymentProof")]
        payment_proof: Option<String>,
    },
    Paypal {
        #[serde(rename = "approvalUrl")]
        approval_url: String,
        #[serde(rename = "captureId")]
        capture_id: Option<String>,
    },
}

impl ProviderDetails {
    pub fn method(&self) -> PaymentMethod {
        match self {
            Self::Mock { .. } => PaymentMethod::Mock,
            Self::MobileMoney { .. } => PaymentMethod::MobileMoney,
            Self::BankTransfer { .. } => PaymentMethod::BankTransfer,
            Self::Paypal { .. } => PaymentMethod::Paypal,
        }
    }
}

/// Outcome reported by a provider, a simulated settlement or an admin review.
#[derive(Debug, Clone, PartialEq)]
pub enum SettlementOutcome {
    Completed {
        receipt: Option<String>,
        settled_at: Option<String>,
    },
    Failed {
        reason: String,
    },
    Cancelled,
}

impl SettlementOutcome {
    pub fn status(&self) -> PaymentStatus {
        match self {
            Self::Completed { .. } => PaymentStatus::Completed,
            Self::Failed { .. } => PaymentStatus::Failed,
            Self::Cancelled => PaymentStatus::Cancelled,
        }
    }
}

/// An independent funds-movement record.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub id: Uuid,
    pub owner: String,
    pub booking_id: Option<Uuid>,
    pub amount: Decimal,
    pub currency: String,
    pub description: Option<String>,
    pub status: PaymentStatus,
    /// Unique external correlation token. Never changes once set.
    pub transaction_id: String,
    pub details: ProviderDetails,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Payment {
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        owner: &str,
        booking_id: Option<Uuid>,
        amount: Amount,
        currency: &str,
        description: Option<String>,
        transaction_id: String,
        details: ProviderDetails,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            owner: owner.to_string(),
            booking_id,
            amount: amount.value(),
            currency: currency.to_string(),
            description,
            status: PaymentStatus::Pending,
            transaction_id,
            details,
            admin_notes: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }

    pub fn method(&self) -> PaymentMethod {
        self.details.method()
    }

    /// Computes the settled payment. Only `pending` payments can settle.
    pub fn settle(
        &self,
        outcome: &SettlementOutcome,
        admin_notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Payment> {
        if self.status.is_terminal() {
            return Err(DeskError::InvalidStateTransition {
                entity: "payment",
                from: self.status.to_string(),
                action: "settle",
            });
        }

        let mut next = self.clone();
        next.status = outcome.status();
        next.updated_at = now;
        next.admin_notes = admin_notes.or(next.admin_notes);

        match outcome {
            SettlementOutcome::Completed {
                receipt,
                settled_at,
            } => {
                next.completed_at = Some(now);
                match &mut next.details {
                    ProviderDetails::Mock { receipt_number, .. } => {
                        *receipt_number = receipt.clone();
                    }
                    ProviderDetails::MobileMoney {
                        receipt_number,
                        transaction_date,
                        ..
                    } => {
                        *receipt_number = receipt.clone();
                        *transaction_date = settled_at.clone();
                    }
                    ProviderDetails::Paypal { capture_id, .. } => {
                        *capture_id = receipt.clone();
                    }
                    ProviderDetails::BankTransfer { .. } => {}
                }
            }
            SettlementOutcome::Failed { reason } => {
                if let ProviderDetails::MobileMoney { error, .. } = &mut next.details {
                    *error = Some(reason.clone());
                }
            }
            SettlementOutcome::Cancelled => {}
        }
        Ok(next)
    }

    /// Attaches a proof-of-payment reference to a pending bank transfer.
    pub fn with_proof(&self, proof: &str, now: DateTime<Utc>) -> Result<Payment> {
        if self.status.is_terminal() {
            return Err(DeskError::InvalidStateTransition {
                entity: "payment",
                from: self.status.to_string(),
                action: "attach proof to",
            });
        }
        let proof = proof.trim();
        if proof.is_empty() {
            return Err(DeskError::ValidationError(
                "paymentProof is required".to_string(),
            ));
        }

        let mut next = self.clone();
        match &mut next.details {
            ProviderDetails::BankTransfer { payment_proof, .. } => {
                *payment_proof = Some(proof.to_string());
            }
            _ => {
                return Err(DeskError::ValidationError(
                    "Proof of payment applies to bank transfers only".to_string(),
                ));
            }
        }
        next.updated_at = now;
        Ok(next)
    }
}
