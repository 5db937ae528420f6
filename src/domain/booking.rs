use crate::error::{DeskError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Price charged for service types missing from [`SERVICE_PRICES`].
pub const DEFAULT_SERVICE_PRICE: Decimal = dec!(3000);

/// Static service type to price table (KES).
pub const SERVICE_PRICES: &[(&str, Decimal)] = &[
    ("oil_change", dec!(2500)),
    ("tire_change", dec!(3500)),
    ("battery_replacement", dec!(4500)),
    ("brake_service", dec!(5500)),
    ("engine_repair", dec!(15000)),
    ("general_maintenance", dec!(3000)),
    ("emergency_service", dec!(8000)),
];

/// Looks up the price of a service type, falling back to [`DEFAULT_SERVICE_PRICE`].
pub fn price_for(service_type: &str) -> Decimal {
    SERVICE_PRICES
        .iter()
        .find(|(name, _)| *name == service_type)
        .map(|(_, price)| *price)
        .unwrap_or(DEFAULT_SERVICE_PRICE)
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    #[default]
    Normal,
    Urgent,
    Emergency,
}

impl Urgency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Urgent => "urgent",
            Self::Emergency => "emergency",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        Self::Pending,
        Self::Approved,
        Self::Rejected,
        Self::Completed,
        Self::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Rejected | Self::Completed | Self::Cancelled)
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = DeskError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DeskError::ValidationError(format!("Unknown booking status: {s}")))
    }
}

/// Whether a requester may still cancel an approved booking.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum CancellationPolicy {
    /// Cancellation only from `pending`.
    #[default]
    PendingOnly,
    /// Cancellation from `pending` or `approved`.
    UntilCompleted,
}

impl CancellationPolicy {
    pub fn allows(&self, from: BookingStatus) -> bool {
        match self {
            Self::PendingOnly => from == BookingStatus::Pending,
            Self::UntilCompleted => {
                matches!(from, BookingStatus::Pending | BookingStatus::Approved)
            }
        }
    }
}

/// Who moved a booking out of `pending`, and when.
///
/// Exactly one variant exists for a non-pending booking, matching its status.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Resolution {
    Approved {
        #[serde(rename = "approvedBy")]
        by: String,
        #[serde(rename = "approvedAt")]
        at: DateTime<Utc>,
    },
    Rejected {
        #[serde(rename = "rejectedBy")]
        by: String,
        #[serde(rename = "rejectedAt")]
        at: DateTime<Utc>,
    },
    Completed {
        #[serde(rename = "completedBy")]
        by: String,
        #[serde(rename = "completedAt")]
        at: DateTime<Utc>,
    },
    Cancelled {
        #[serde(rename = "cancelledBy")]
        by: String,
        #[serde(rename = "cancelledAt")]
        at: DateTime<Utc>,
    },
}

impl Resolution {
    pub fn status(&self) -> BookingStatus {
        match self {
            Self::Approved { .. } => BookingStatus::Approved,
            Self::Rejected { .. } => BookingStatus::Rejected,
            Self::Completed { .. } => BookingStatus::Completed,
            Self::Cancelled { .. } => BookingStatus::Cancelled,
        }
    }

    pub fn by(&self) -> &str {
        match self {
            Self::Approved { by, .. }
            | Self::Rejected { by, .. }
            | Self::Completed { by, .. }
            | Self::Cancelled { by, .. } => by,
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Self::Approved { at, .. }
            | Self::Rejected { at, .. }
            | Self::Completed { at, .. }
            | Self::Cancelled { at, .. } => *at,
        }
    }
}

/// Requester-supplied fields of a new booking.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BookingDetails {
    pub service_type: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub vehicle_info: Option<String>,
    pub urgency: Option<Urgency>,
}

/// A customer's service request.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub requester: String,
    pub service_type: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub vehicle_info: Option<String>,
    pub urgency: Urgency,
    pub status: BookingStatus,
    pub amount: Decimal,
    pub admin_notes: Option<String>,
    pub rejection_reason: Option<String>,
    pub completion_notes: Option<String>,
    pub estimated_completion: Option<DateTime<Utc>>,
    pub assigned_truck: Option<String>,
    pub resolution: Option<Resolution>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An admin or requester action on an existing booking.
#[derive(Debug, Clone, PartialEq)]
pub enum BookingAction {
    Approve {
        notes: Option<String>,
        estimated_completion: Option<DateTime<Utc>>,
        assigned_truck: Option<String>,
    },
    Reject {
        notes: Option<String>,
        reason: Option<String>,
    },
    Complete {
        notes: Option<String>,
        completion_notes: Option<String>,
    },
    Cancel,
}

impl BookingAction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Approve { .. } => "approve",
            Self::Reject { .. } => "reject",
            Self::Complete { .. } => "complete",
            Self::Cancel => "cancel",
        }
    }

    /// Past-tense label used in event names.
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Approve { .. } => "approved",
            Self::Reject { .. } => "rejected",
            Self::Complete { .. } => "completed",
            Self::Cancel => "cancelled",
        }
    }
}

impl Booking {
    pub fn new(requester: &str, details: BookingDetails, now: DateTime<Utc>) -> Result<Self> {
        let service_type = details
            .service_type
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| DeskError::ValidationError("serviceType is required".to_string()))?;

        Ok(Self {
            id: Uuid::new_v4(),
            requester: requester.to_string(),
            amount: price_for(&service_type),
            service_type,
            description: details.description,
            location: details.location,
            vehicle_info: details.vehicle_info,
            urgency: details.urgency.unwrap_or_default(),
            status: BookingStatus::Pending,
            admin_notes: None,
            rejection_reason: None,
            completion_notes: None,
            estimated_completion: None,
            assigned_truck: None,
            resolution: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies requester edits to a pending booking and re-prices it from the
    /// resulting service type. Fields left out of `details` keep their value.
    pub fn with_details(&self, details: BookingDetails, now: DateTime<Utc>) -> Result<Booking> {
        if self.status != BookingStatus::Pending {
            return Err(DeskError::InvalidStateTransition {
                entity: "booking",
                from: self.status.to_string(),
                action: "edit",
            });
        }

        let mut next = self.clone();
        if let Some(service_type) = details.service_type {
            let service_type = service_type.trim();
            if service_type.is_empty() {
                return Err(DeskError::ValidationError(
                    "serviceType must not be blank".to_string(),
                ));
            }
            next.service_type = service_type.to_string();
        }
        next.description = details.description.or(next.description);
        next.location = details.location.or(next.location);
        next.vehicle_info = details.vehicle_info.or(next.vehicle_info);
        next.urgency = details.urgency.unwrap_or(next.urgency);
        next.amount = price_for(&next.service_type);
        next.updated_at = now;
        Ok(next)
    }

    /// Computes the booking that results from `action`, without touching `self`.
    ///
    /// Fails with `InvalidStateTransition` when the current status is not a valid
    /// source for the action.
    pub fn transition(
        &self,
        action: &BookingAction,
        actor: &str,
        policy: CancellationPolicy,
        now: DateTime<Utc>,
    ) -> Result<Booking> {
        let allowed = match action {
            BookingAction::Approve { .. } | BookingAction::Reject { .. } => {
                self.status == BookingStatus::Pending
            }
            BookingAction::Complete { .. } => self.status == BookingStatus::Approved,
            BookingAction::Cancel => policy.allows(self.status),
        };
        if !allowed {
            return Err(DeskError::InvalidStateTransition {
                entity: "booking",
                from: self.status.to_string(),
                action: action.name(),
            });
        }

        let mut next = self.clone();
        let by = actor.to_string();
        match action {
            BookingAction::Approve {
                notes,
                estimated_completion,
                assigned_truck,
            } => {
                next.admin_notes = notes.clone().or(next.admin_notes);
                next.estimated_completion = estimated_completion.or(next.estimated_completion);
                next.assigned_truck = assigned_truck.clone().or(next.assigned_truck);
                next.resolution = Some(Resolution::Approved { by, at: now });
            }
            BookingAction::Reject { notes, reason } => {
                next.admin_notes = notes.clone().or(next.admin_notes);
                next.rejection_reason = reason.clone();
                next.resolution = Some(Resolution::Rejected { by, at: now });
            }
            BookingAction::Complete {
                notes,
                completion_notes,
            } => {
                next.admin_notes = notes.clone().or(next.admin_notes);
                next.completion_notes = completion_notes.clone();
                next.resolution = Some(Resolution::Completed { by, at: now });
            }
            BookingAction::Cancel => {
                next.resolution = Some(Resolution::Cancelled { by, at: now });
            }
        }
        next.status = next
            .resolution
            .as_ref()
            .map(Resolution::status)
            .unwrap_or(BookingStatus::Pending);
        next.updated_at = now;
        Ok(next)
    }
}
