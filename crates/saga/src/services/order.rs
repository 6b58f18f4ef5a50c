//! Order service contract and in-process backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use common::{Cache, Order, OrderItem, OrderStatus, Request, IDEMPOTENCY_TTL};
use uuid::Uuid;

use super::ServiceError;

#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    pub customer_id: String,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone)]
pub struct GetOrderRequest {
    pub id: String,
}

#[derive(Debug, Clone)]
pub struct UpdateOrderStatusRequest {
    pub id: String,
    pub status: OrderStatus,
}

#[derive(Debug, Clone)]
pub struct UpdateOrderStatusResponse {
    pub success: bool,
}

/// Order lifecycle operations.
#[async_trait]
pub trait OrderService: Send + Sync {
    /// Creates a PENDING order. Requests repeating a non-empty
    /// idempotency key return the previously created order.
    async fn create_order(&self, req: Request<CreateOrderRequest>) -> Result<Order, ServiceError>;

    async fn get_order(&self, req: Request<GetOrderRequest>) -> Result<Order, ServiceError>;

    async fn update_order_status(
        &self,
        req: Request<UpdateOrderStatusRequest>,
    ) -> Result<UpdateOrderStatusResponse, ServiceError>;
}

#[derive(Debug, Default)]
struct OrderState {
    orders: HashMap<String, Order>,
    fail_on_update: bool,
}

/// In-process order backend: demo service and test fake in one.
#[derive(Clone)]
pub struct InMemoryOrders {
    state: Arc<Mutex<OrderState>>,
    cache: Arc<dyn Cache>,
}

impl InMemoryOrders {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            state: Arc::new(Mutex::new(OrderState::default())),
            cache,
        }
    }

    pub fn order_count(&self) -> usize {
        self.state.lock().unwrap().orders.len()
    }

    /// Current status of an order, if it exists.
    pub fn status_of(&self, order_id: &str) -> Option<OrderStatus> {
        self.state
            .lock()
            .unwrap()
            .orders
            .get(order_id)
            .map(|order| order.status)
    }

    /// Makes the next status updates fail at the transport level.
    pub fn set_fail_on_update(&self, fail: bool) {
        self.state.lock().unwrap().fail_on_update = fail;
    }
}

#[async_trait]
impl OrderService for InMemoryOrders {
    async fn create_order(&self, req: Request<CreateOrderRequest>) -> Result<Order, ServiceError> {
        let cx = req.context();
        let request = req.into_inner();

        let idempotency_key = common::idempotency_key(&cx).to_string();
        let request_id = common::request_id(&cx).to_string();

        let cache_key = self.cache.generate_key("create", &idempotency_key);
        if !idempotency_key.is_empty() {
            match self.cache.get(&cache_key).await {
                Ok(Some(cached)) => match serde_json::from_str::<Order>(&cached) {
                    Ok(order) => {
                        tracing::info!(order_id = %order.id, "create: idempotent response from cache");
                        return Ok(order);
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "create: failed to decode cached order");
                    }
                },
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(error = %err, "create: cache lookup failed");
                }
            }
        }

        let order = {
            let mut state = self.state.lock().unwrap();

            // Second check inside the lock, covering the cache-miss /
            // cache-fill race.
            if !idempotency_key.is_empty() {
                let existing = state
                    .orders
                    .values()
                    .find(|order| order.idempotency_key == idempotency_key)
                    .cloned();
                if let Some(order) = existing {
                    tracing::info!(order_id = %order.id, "create: idempotent response from memory");
                    return Ok(order);
                }
            }

            let now = Utc::now();
            let order = Order {
                id: Uuid::new_v4().to_string(),
                customer_id: request.customer_id,
                total: Order::total_of(&request.items),
                items: request.items,
                status: OrderStatus::Pending,
                idempotency_key: idempotency_key.clone(),
                request_id,
                created_at: now,
                updated_at: now,
            };
            state.orders.insert(order.id.clone(), order.clone());
            order
        };

        if !idempotency_key.is_empty() {
            match serde_json::to_string(&order) {
                Ok(json) => {
                    if let Err(err) = self.cache.set(&cache_key, &json, IDEMPOTENCY_TTL).await {
                        tracing::warn!(order_id = %order.id, error = %err, "create: failed to persist idempotency key");
                    }
                }
                Err(err) => {
                    tracing::warn!(order_id = %order.id, error = %err, "create: failed to encode order for cache");
                }
            }
        }

        tracing::info!(order_id = %order.id, customer_id = %order.customer_id, "order created");
        Ok(order)
    }

    async fn get_order(&self, req: Request<GetOrderRequest>) -> Result<Order, ServiceError> {
        let request = req.into_inner();
        self.state
            .lock()
            .unwrap()
            .orders
            .get(&request.id)
            .cloned()
            .ok_or(ServiceError::OrderNotFound(request.id))
    }

    async fn update_order_status(
        &self,
        req: Request<UpdateOrderStatusRequest>,
    ) -> Result<UpdateOrderStatusResponse, ServiceError> {
        let request = req.into_inner();
        let mut state = self.state.lock().unwrap();

        if state.fail_on_update {
            return Err(ServiceError::Unavailable("order service".to_string()));
        }

        match state.orders.get_mut(&request.id) {
            Some(order) => {
                order.status = request.status;
                order.updated_at = Utc::now();
                tracing::info!(
                    order_id = %request.id,
                    new_status = %request.status,
                    "order status updated"
                );
                Ok(UpdateOrderStatusResponse { success: true })
            }
            None => Err(ServiceError::OrderNotFound(request.id)),
        }
    }
}
