//! Error types for the checkout service.
//!
//! Every failure a caller can see is a [`CheckoutError`], and every
//! `CheckoutError` falls into exactly one [`ErrorKind`].
//!
//! ```text
//! ValidationError ─► CoreError ─► DbError ─► CheckoutError ─► ErrorKind
//!                        │                        ▲
//!                        └────────────────────────┘ (rule failures keep their type)
//! ```

use storefront_core::{CoreError, DiscountError};
use storefront_db::DbError;

/// Coarse classification for callers (HTTP status, retry policy, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed input. Fix the request.
    Validation,
    /// The request is well-formed but conflicts with current state.
    ResourceConflict,
    Authorization,
    NotFound,
    /// Signature or amount mismatch on a gateway callback.
    IntegrityFailure,
    /// The shipping estimator failed or timed out.
    UpstreamUnavailable,
    Internal,
}

/// Checkout service errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    /// A business rule or validation failure.
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Forbidden: {actor_id} may not {action}")]
    Forbidden { actor_id: String, action: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    #[error("Integrity check failed: {0}")]
    Integrity(String),

    #[error("Shipping estimator unavailable: {0}")]
    Upstream(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl CheckoutError {
    pub fn forbidden(actor_id: impl Into<String>, action: impl Into<String>) -> Self {
        CheckoutError::Forbidden {
            actor_id: actor_id.into(),
            action: action.into(),
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        CheckoutError::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Classifies this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::Core(err) => match err {
                CoreError::MismatchedLineCounts { .. }
                | CoreError::InvalidPaymentMethod(_)
                | CoreError::InvalidOrderStatus(_)
                | CoreError::InvalidPaymentStatus(_)
                | CoreError::InvalidAmount { .. }
                | CoreError::AmountOverflow { .. }
                | CoreError::Validation(_) => ErrorKind::Validation,

                CoreError::Discount(DiscountError::UnknownCode(_)) => ErrorKind::NotFound,

                CoreError::InsufficientStock { .. }
                | CoreError::InvalidTransition { .. }
                | CoreError::Discount(_) => ErrorKind::ResourceConflict,

                CoreError::SigningKey => ErrorKind::Internal,
            },
            CheckoutError::Forbidden { .. } => ErrorKind::Authorization,
            CheckoutError::NotFound { .. } => ErrorKind::NotFound,
            CheckoutError::Integrity(_) => ErrorKind::IntegrityFailure,
            CheckoutError::Upstream(_) => ErrorKind::UpstreamUnavailable,
            CheckoutError::Conflict(_) => ErrorKind::ResourceConflict,
            CheckoutError::Database(_) => ErrorKind::Internal,
        }
    }
}

impl From<DbError> for CheckoutError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Core(err) => CheckoutError::Core(err),
            DbError::NotFound { entity, id } => CheckoutError::NotFound { entity, id },
            DbError::UniqueViolation { field, value } => {
                CheckoutError::Conflict(format!("duplicate {field}: '{value}'"))
            }
            other => CheckoutError::Database(other.to_string()),
        }
    }
}

impl From<storefront_core::ValidationError> for CheckoutError {
    fn from(err: storefront_core::ValidationError) -> Self {
        CheckoutError::Core(CoreError::Validation(err))
    }
}

impl From<DiscountError> for CheckoutError {
    fn from(err: DiscountError) -> Self {
        CheckoutError::Core(CoreError::Discount(err))
    }
}

/// Result type for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;
