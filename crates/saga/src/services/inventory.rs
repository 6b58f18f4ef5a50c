//! Inventory service contract and in-process backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{Cache, Context, Request, IDEMPOTENCY_TTL};

use super::ServiceError;

/// One product line to reserve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockItem {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Debug, Clone)]
pub struct ReserveRequest {
    pub order_id: String,
    pub items: Vec<StockItem>,
}

#[derive(Debug, Clone)]
pub struct ReserveResponse {
    pub success: bool,
}

#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    pub order_id: String,
}

#[derive(Debug, Clone)]
pub struct ReleaseResponse {
    pub success: bool,
}

/// Stock reservation operations.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Reserves stock for every item, all-or-nothing. Insufficient stock
    /// or an unknown product is a business decline (`success = false`),
    /// not a transport error.
    async fn reserve(&self, req: Request<ReserveRequest>) -> Result<ReserveResponse, ServiceError>;

    /// Releases the reservation held for the order. Releasing an order
    /// with no reservation is a successful no-op.
    async fn release(&self, req: Request<ReleaseRequest>) -> Result<ReleaseResponse, ServiceError>;
}

#[derive(Debug, Default)]
struct InventoryState {
    stock: HashMap<String, u32>,
    reservations: HashMap<String, Vec<StockItem>>,
    fail_on_release: bool,
}

impl InventoryState {
    fn can_reserve(&self, items: &[StockItem]) -> bool {
        items.iter().all(|item| {
            self.stock
                .get(&item.product_id)
                .is_some_and(|available| *available >= item.quantity)
        })
    }
}

/// In-process inventory backend: demo service and test fake in one.
#[derive(Clone)]
pub struct InMemoryInventory {
    state: Arc<Mutex<InventoryState>>,
    cache: Arc<dyn Cache>,
}

impl InMemoryInventory {
    /// Creates the backend with the demo stock fixture.
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self::with_stock(
            cache,
            HashMap::from([
                ("prod_1".to_string(), 15),
                ("prod_2".to_string(), 10),
                ("prod_3".to_string(), 0),
            ]),
        )
    }

    pub fn with_stock(cache: Arc<dyn Cache>, stock: HashMap<String, u32>) -> Self {
        Self {
            state: Arc::new(Mutex::new(InventoryState {
                stock,
                ..InventoryState::default()
            })),
            cache,
        }
    }

    /// Current stock for a product; 0 for unknown products.
    pub fn stock_of(&self, product_id: &str) -> u32 {
        self.state
            .lock()
            .unwrap()
            .stock
            .get(product_id)
            .copied()
            .unwrap_or(0)
    }

    /// Number of reservations currently held.
    pub fn reservation_count(&self) -> usize {
        self.state.lock().unwrap().reservations.len()
    }

    /// Makes the next release calls fail at the transport level.
    pub fn set_fail_on_release(&self, fail: bool) {
        self.state.lock().unwrap().fail_on_release = fail;
    }
}

#[async_trait]
impl InventoryService for InMemoryInventory {
    async fn reserve(&self, req: Request<ReserveRequest>) -> Result<ReserveResponse, ServiceError> {
        let cx = req.context();
        let request = req.into_inner();

        let cache_key = self
            .cache
            .generate_key("reserve", forward_discriminator(&cx, &request.order_id));
        match self.cache.get(&cache_key).await {
            Ok(Some(_)) => {
                tracing::info!(order_id = %request.order_id, "reserve: idempotent response from cache");
                return Ok(ReserveResponse { success: true });
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(order_id = %request.order_id, error = %err, "reserve: cache lookup failed");
            }
        }

        let success = {
            let mut state = self.state.lock().unwrap();
            if state.reservations.contains_key(&request.order_id) {
                tracing::info!(order_id = %request.order_id, "reserve: idempotent response from memory");
                true
            } else if !state.can_reserve(&request.items) {
                tracing::warn!(order_id = %request.order_id, "reserve: insufficient stock");
                false
            } else {
                for item in &request.items {
                    if let Some(available) = state.stock.get_mut(&item.product_id) {
                        *available -= item.quantity;
                    }
                }
                state
                    .reservations
                    .insert(request.order_id.clone(), request.items);
                true
            }
        };

        if success {
            if let Err(err) = self.cache.set(&cache_key, "ok", IDEMPOTENCY_TTL).await {
                tracing::warn!(order_id = %request.order_id, error = %err, "reserve: failed to persist idempotency key");
            }
        }

        Ok(ReserveResponse { success })
    }

    async fn release(&self, req: Request<ReleaseRequest>) -> Result<ReleaseResponse, ServiceError> {
        let request = req.into_inner();

        // Compensation is keyed per order, not per client attempt.
        let cache_key = self.cache.generate_key("release", &request.order_id);
        match self.cache.get(&cache_key).await {
            Ok(Some(_)) => {
                tracing::info!(order_id = %request.order_id, "release: idempotent response from cache");
                return Ok(ReleaseResponse { success: true });
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(order_id = %request.order_id, error = %err, "release: cache lookup failed");
            }
        }

        {
            let mut state = self.state.lock().unwrap();
            if state.fail_on_release {
                return Err(ServiceError::Unavailable("inventory service".to_string()));
            }
            match state.reservations.remove(&request.order_id) {
                Some(items) => {
                    for item in &items {
                        *state.stock.entry(item.product_id.clone()).or_insert(0) += item.quantity;
                    }
                }
                None => {
                    // Nothing reserved: compensation is an idempotent no-op.
                    tracing::warn!(order_id = %request.order_id, "release: no reservation found, nothing to release");
                }
            }
        }

        if let Err(err) = self.cache.set(&cache_key, "ok", IDEMPOTENCY_TTL).await {
            tracing::warn!(order_id = %request.order_id, error = %err, "release: failed to persist idempotency key");
        }

        Ok(ReleaseResponse { success: true })
    }
}

// reserve dedupes by the client's idempotency key when one was sent,
// otherwise by order id.
fn forward_discriminator<'a>(cx: &'a Context, order_id: &'a str) -> &'a str {
    let key = common::idempotency_key(cx);
    if key.is_empty() {
        order_id
    } else {
        key
    }
}
