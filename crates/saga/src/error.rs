//! Saga error types.

use thiserror::Error;

use crate::services::ServiceError;

/// Errors surfaced from saga execution.
///
/// [`Orchestrator::start`](crate::Orchestrator::start) returns the first
/// step-execute error; compensation failures are recorded in the saga log
/// but never surfaced. The transport/declined split matters: a declined
/// business response arrives over a successful transport and still has to
/// abort the saga.
#[derive(Debug, Error)]
pub enum SagaError {
    /// Inventory service transport failure.
    #[error("inventory service error: {0}")]
    Inventory(#[source] ServiceError),

    /// Inventory declined the reservation (insufficient stock or unknown
    /// product).
    #[error("inventory insufficient for order {0}")]
    InventoryDeclined(String),

    /// Inventory rejected a release.
    #[error("inventory release rejected for order {0}")]
    ReleaseDeclined(String),

    /// Payment service transport failure.
    #[error("payment service error: {0}")]
    Payment(#[source] ServiceError),

    /// Payment declined the charge.
    #[error("payment declined for order {0}")]
    PaymentDeclined(String),

    /// Payment rejected a refund.
    #[error("payment refund rejected for order {0}")]
    RefundDeclined(String),

    /// Order service transport failure while confirming.
    #[error("failed to confirm order: {0}")]
    Confirm(#[source] ServiceError),

    /// Order service refused the confirmation.
    #[error("order service refused to confirm order {0}")]
    ConfirmDeclined(String),

    /// Order service transport failure while cancelling.
    #[error("failed to cancel order: {0}")]
    Cancel(#[source] ServiceError),

    /// Order service refused the cancellation.
    #[error("order service refused to cancel order {0}")]
    CancelDeclined(String),

    /// A step failed for a reason outside the concrete step set.
    #[error("saga step '{step}' failed: {reason}")]
    StepFailed { step: String, reason: String },
}
