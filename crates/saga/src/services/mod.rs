//! Downstream service contracts and in-process backends.
//!
//! The contracts are semantic: each call carries a [`common::Request`]
//! with propagation metadata instead of a wire format. The in-process
//! implementations mirror the real services' behavior: an idempotency
//! cache checked in front of a mutex-guarded state map, with a second
//! check inside the mutex covering the race between a cache miss and the
//! later cache fill.

pub mod inventory;
pub mod order;
pub mod payment;

use thiserror::Error;

/// Transport-level failure from a downstream service. Business declines
/// are not errors; they come back as `success = false` responses.
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("order {0} not found")]
    OrderNotFound(String),

    #[error("{0} unavailable")]
    Unavailable(String),
}

pub use inventory::{
    InMemoryInventory, InventoryService, ReleaseRequest, ReleaseResponse, ReserveRequest,
    ReserveResponse, StockItem,
};
pub use order::{
    CreateOrderRequest, GetOrderRequest, InMemoryOrders, OrderService, UpdateOrderStatusRequest,
    UpdateOrderStatusResponse,
};
pub use payment::{
    ChargeRequest, ChargeResponse, InMemoryPayments, PaymentService, RefundRequest, RefundResponse,
};
