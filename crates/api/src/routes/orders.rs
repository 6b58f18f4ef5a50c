//! Order intake and status endpoints.
//!
//! `create` persists a PENDING order and spawns the saga on a detached
//! task: the task's context is derived from the request context with all
//! metadata values and the active span kept, but no cancellation linkage.
//! Sending the 201 response (or the client hanging up) never stops the
//! saga.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use chrono::{DateTime, Utc};
use common::{with_correlation, Context, Order, OrderStatus, Request, IDEMPOTENCY_KEY_HEADER};
use saga::services::{self, InventoryService, OrderService, PaymentService, StockItem};
use saga::{ConfirmOrderStep, InventoryStep, Orchestrator, PaymentStep, Step};
use saga_log::{SagaLogError, SagaLogStore};
use serde::{Deserialize, Serialize};
use tracing_opentelemetry::OpenTelemetrySpanExt;
use uuid::Uuid;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orders: Arc<dyn OrderService>,
    pub inventory: Arc<dyn InventoryService>,
    pub payments: Arc<dyn PaymentService>,
    pub saga_log: Option<Arc<dyn SagaLogStore>>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: String,
    pub items: Vec<OrderItemRequest>,
}

#[derive(Deserialize)]
pub struct OrderItemRequest {
    pub product_id: String,
    pub quantity: u32,
    pub price: f64,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub customer_id: String,
    pub status: OrderStatus,
    pub total: f64,
    pub items: Vec<OrderItemResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub quantity: u32,
    pub price: f64,
}

#[derive(Serialize)]
pub struct SagaStatusResponse {
    pub saga_id: String,
    pub status: String,
    pub current_step: String,
    pub error_messages: Vec<String>,
    pub trace_id: String,
    pub span_id: String,
    pub updated_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            customer_id: order.customer_id,
            status: order.status,
            total: order.total,
            items: order
                .items
                .into_iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

// -- Handlers --

/// POST /orders — create a PENDING order and trigger the saga.
#[tracing::instrument(skip(state, headers, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), ApiError> {
    if req.customer_id.is_empty() || req.items.is_empty() {
        return Err(ApiError::BadRequest {
            code: "invalid_request",
            message: "customer_id and items are required".to_string(),
        });
    }
    for item in &req.items {
        if item.product_id.is_empty() || item.quantity == 0 || item.price <= 0.0 {
            return Err(ApiError::BadRequest {
                code: "invalid_item",
                message: "product_id, quantity, and price must be valid".to_string(),
            });
        }
    }

    let cx = ambient_context(&headers);

    let items = req
        .items
        .into_iter()
        .map(|item| common::OrderItem {
            product_id: item.product_id,
            quantity: item.quantity,
            price: item.price,
        })
        .collect();
    let order = state
        .orders
        .create_order(Request::new(
            &cx,
            services::CreateOrderRequest {
                customer_id: req.customer_id,
                items,
            },
        ))
        .await?;

    // Detached: the cloned context keeps the span parentage and the
    // correlation values, and carries no cancellation from the request.
    let saga_state = state.clone();
    let saga_order = order.clone();
    tokio::spawn(async move {
        run_order_saga(cx, saga_state, saga_order).await;
    });

    Ok((StatusCode::CREATED, Json(OrderResponse::from(order))))
}

/// GET /orders/{id} — current order state.
#[tracing::instrument(skip(state, headers))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let cx = ambient_context(&headers);
    let order = state
        .orders
        .get_order(Request::new(&cx, services::GetOrderRequest { id }))
        .await?;
    Ok(Json(OrderResponse::from(order)))
}

/// GET /orders/{id}/saga — latest saga log entry for the order.
#[tracing::instrument(skip(state))]
pub async fn saga_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SagaStatusResponse>, ApiError> {
    let Some(log) = &state.saga_log else {
        return Err(ApiError::NotFound {
            code: "saga_not_found",
            message: format!("no saga log recorded for {id}"),
        });
    };

    match log.get_latest(&id).await {
        Ok(entry) => Ok(Json(SagaStatusResponse {
            saga_id: entry.saga_id,
            status: entry.status.to_string(),
            current_step: entry.current_step,
            error_messages: entry.error_messages,
            trace_id: entry.trace_id,
            span_id: entry.span_id,
            updated_at: entry.updated_at,
        })),
        Err(SagaLogError::NotFound(_)) => Err(ApiError::NotFound {
            code: "saga_not_found",
            message: format!("no saga log recorded for {id}"),
        }),
        Err(err) => Err(ApiError::Internal(err.to_string())),
    }
}

/// Runs the order saga to completion; on failure, cancels the order.
async fn run_order_saga(cx: Context, state: Arc<AppState>, order: Order) {
    let items: Vec<StockItem> = order
        .items
        .iter()
        .map(|item| StockItem {
            product_id: item.product_id.clone(),
            quantity: item.quantity,
        })
        .collect();

    let steps: Vec<Box<dyn Step>> = vec![
        Box::new(InventoryStep::new(
            state.inventory.clone(),
            order.id.as_str(),
            items,
        )),
        Box::new(PaymentStep::new(
            state.payments.clone(),
            order.id.as_str(),
            order.total,
        )),
        Box::new(ConfirmOrderStep::new(
            state.orders.clone(),
            order.id.as_str(),
        )),
    ];

    let payload = serde_json::to_string(&order).unwrap_or_default();
    let orchestrator = Orchestrator::new(order.id.clone(), steps, state.saga_log.clone())
        .with_payload(payload);

    if let Err(err) = orchestrator.start(&cx).await {
        tracing::error!(order_id = %order.id, error = %err, "saga failed, cancelling order");
        let cancel = Request::new(
            &cx,
            services::UpdateOrderStatusRequest {
                id: order.id.clone(),
                status: OrderStatus::Cancelled,
            },
        );
        if let Err(cancel_err) = state.orders.update_order_status(cancel).await {
            tracing::error!(
                order_id = %order.id,
                error = %cancel_err,
                "CRITICAL: failed to cancel order after saga failure"
            );
        }
    }
}

// One request id per inbound HTTP request; the idempotency key comes from
// the client header and may be empty. Both land on the ambient context
// together with the handler's active span.
fn ambient_context(headers: &HeaderMap) -> Context {
    let request_id = Uuid::new_v4().to_string();
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    with_correlation(
        &tracing::Span::current().context(),
        request_id,
        idempotency_key,
    )
}
