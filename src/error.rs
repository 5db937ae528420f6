use thiserror::Error;

/// Errors produced by the desk services.
///
/// Validation, not-found and conflict errors are caller-recoverable and carry a
/// stable [`DeskError::code`]. Provider errors are normalized at the adapter
/// boundary; the raw upstream body is logged, never stored in the variant.
#[derive(Error, Debug)]
pub enum DeskError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("{resource} {id} not found")]
    NotFound { resource: &'static str, id: String },
    #[error("Cannot {action} a {entity} in status {from}")]
    InvalidStateTransition {
        entity: &'static str,
        from: String,
        action: &'static str,
    },
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Amount must be greater than zero")]
    InvalidAmount,
    #[error("Unsupported payment method: {0}")]
    UnsupportedMethod(String),
    #[error("Payment provider {provider} unavailable: {reason}")]
    ProviderUnavailable {
        provider: &'static str,
        reason: String,
    },
    #[error("Payment provider {provider} rejected the request: {reason}")]
    ProviderRejected {
        provider: &'static str,
        reason: String,
    },
    #[error("No payment matches correlation token {0}")]
    ReconciliationMismatch(String),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl DeskError {
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::InternalError(Box::new(std::io::Error::other(message.into())))
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidStateTransition { .. } => "INVALID_STATE_TRANSITION",
            Self::Conflict(_) => "CONFLICT",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::InvalidAmount => "INVALID_AMOUNT",
            Self::UnsupportedMethod(_) => "UNSUPPORTED_METHOD",
            Self::ProviderUnavailable { .. } => "PROVIDER_UNAVAILABLE",
            Self::ProviderRejected { .. } => "PROVIDER_REJECTED",
            Self::ReconciliationMismatch(_) => "RECONCILIATION_MISMATCH",
            Self::CsvError(_) | Self::IoError(_) | Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// True for precondition failures the caller resolves by re-fetching.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::InvalidStateTransition { .. } | Self::Conflict(_)
        )
    }
}

impl From<serde_json::Error> for DeskError {
    fn from(err: serde_json::Error) -> Self {
        Self::InternalError(Box::new(err))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for DeskError {
    fn from(err: rocksdb::Error) -> Self {
        Self::InternalError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, DeskError>;
