use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PaymentError>;

/// Error taxonomy for the payment and budget-ledger engine.
///
/// Validation and authorization failures are returned to the caller before any
/// state is created. `InsufficientBudget` can occur both at initiation (threshold
/// check) and at completion (the authoritative ledger guard).
#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("authorization error: {0}")]
    Authorization(String),
    #[error("insufficient budget: requested {requested} exceeds remaining {remaining}")]
    InsufficientBudget {
        requested: Decimal,
        remaining: Decimal,
    },
    #[error("provider error: {0}")]
    Provider(String),
    #[error("webhook signature verification failed: {0}")]
    SignatureVerification(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl PaymentError {
    /// True for errors the caller can correct (bad input, missing resources),
    /// as opposed to rail-side or storage faults.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PaymentError::Validation(_)
                | PaymentError::Authorization(_)
                | PaymentError::InsufficientBudget { .. }
                | PaymentError::NotFound(_)
                | PaymentError::Conflict(_)
        )
    }
}
