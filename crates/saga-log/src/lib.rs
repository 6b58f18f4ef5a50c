//! Durable append-only audit log for saga executions.
//!
//! Every state transition a saga goes through becomes one immutable row,
//! correlated with the distributed trace that was active when the row was
//! written. The log serves observability today (jump from a row straight
//! to the trace, or from a trace to the saga) and leaves the door open for
//! recovery tooling later.

pub mod entry;
pub mod error;
pub mod memory;
pub mod sqlite;
pub mod store;
pub mod trace;

pub use entry::{SagaLogEntry, SagaStatus};
pub use error::{Result, SagaLogError};
pub use memory::InMemorySagaLog;
pub use sqlite::SqliteSagaLog;
pub use store::SagaLogStore;
pub use trace::{extract_trace_info, TraceInfo};
