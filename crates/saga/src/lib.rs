//! Saga orchestration for the order-processing system.
//!
//! A saga is a sequence of steps, each pairing a forward action with a
//! compensating one. The orchestrator drives the steps in order; when one
//! fails it unwinds the completed prefix in reverse (LIFO) and reports the
//! root cause. Every transition is appended to the saga log.
//!
//! The order saga runs three steps:
//! 1. reserve inventory
//! 2. charge payment
//! 3. confirm the order
//!
//! Downstream services are reached through semantic contracts
//! ([`services`]); the in-process implementations double as the demo
//! backends and the test fakes.

pub mod error;
pub mod orchestrator;
pub mod services;
pub mod step;
pub mod steps;

pub use error::SagaError;
pub use orchestrator::Orchestrator;
pub use step::Step;
pub use steps::{ConfirmOrderStep, InventoryStep, PaymentStep};
