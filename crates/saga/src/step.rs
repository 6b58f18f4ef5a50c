//! The step contract every workflow stage satisfies.

use async_trait::async_trait;
use common::Context;

use crate::SagaError;

/// A single unit of work in a saga: one forward action paired with the
/// compensation that semantically undoes it.
///
/// Steps are stateful. They capture their request data at construction
/// and may record identifiers produced by `execute` for later use in
/// `compensate`; only `name` is required to be pure. A step must be safe
/// to call at least once; retries are the idempotency layer's job, not
/// the step's.
///
/// `compensate` is invoked only after `execute` succeeded. Every
/// implementation must still be defensively correct on its own: the last
/// step in a saga conventionally never gets compensated, but nothing may
/// depend on that ordering.
#[async_trait]
pub trait Step: Send + Sync {
    /// Stable name used in log entries and error messages.
    fn name(&self) -> &str;

    /// Performs the forward action.
    async fn execute(&mut self, cx: &Context) -> Result<(), SagaError>;

    /// Undoes a successful `execute`.
    async fn compensate(&mut self, cx: &Context) -> Result<(), SagaError>;
}
