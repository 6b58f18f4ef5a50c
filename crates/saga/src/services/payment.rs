//! Payment service contract and in-process backend.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{Cache, Context, Request, IDEMPOTENCY_TTL};

use super::ServiceError;

// Business rule: charges above this amount are declined.
const CHARGE_LIMIT: f64 = 500.00;

#[derive(Debug, Clone)]
pub struct ChargeRequest {
    pub order_id: String,
    pub amount: f64,
}

#[derive(Debug, Clone)]
pub struct ChargeResponse {
    pub success: bool,
}

#[derive(Debug, Clone)]
pub struct RefundRequest {
    pub order_id: String,
}

#[derive(Debug, Clone)]
pub struct RefundResponse {
    pub success: bool,
}

/// Charge and refund operations.
#[async_trait]
pub trait PaymentService: Send + Sync {
    /// Charges the order amount. A declined charge is a business response
    /// (`success = false`), not a transport error.
    async fn charge(&self, req: Request<ChargeRequest>) -> Result<ChargeResponse, ServiceError>;

    /// Refunds whatever was charged for the order. Refunding an order
    /// with no payment is a successful no-op.
    async fn refund(&self, req: Request<RefundRequest>) -> Result<RefundResponse, ServiceError>;
}

#[derive(Debug, Default)]
struct PaymentState {
    payments: HashMap<String, f64>,
    fail_on_refund: bool,
}

/// In-process payment backend: demo service and test fake in one.
#[derive(Clone)]
pub struct InMemoryPayments {
    state: Arc<Mutex<PaymentState>>,
    cache: Arc<dyn Cache>,
}

impl InMemoryPayments {
    pub fn new(cache: Arc<dyn Cache>) -> Self {
        Self {
            state: Arc::new(Mutex::new(PaymentState::default())),
            cache,
        }
    }

    /// Number of payments currently held.
    pub fn payment_count(&self) -> usize {
        self.state.lock().unwrap().payments.len()
    }

    /// Returns true if a payment exists for the order.
    pub fn has_payment(&self, order_id: &str) -> bool {
        self.state.lock().unwrap().payments.contains_key(order_id)
    }

    /// Makes the next refund calls fail at the transport level.
    pub fn set_fail_on_refund(&self, fail: bool) {
        self.state.lock().unwrap().fail_on_refund = fail;
    }
}

#[async_trait]
impl PaymentService for InMemoryPayments {
    async fn charge(&self, req: Request<ChargeRequest>) -> Result<ChargeResponse, ServiceError> {
        let cx = req.context();
        let request = req.into_inner();

        let cache_key = self
            .cache
            .generate_key("charge", forward_discriminator(&cx, &request.order_id));
        match self.cache.get(&cache_key).await {
            Ok(Some(_)) => {
                tracing::info!(order_id = %request.order_id, "charge: idempotent response from cache");
                return Ok(ChargeResponse { success: true });
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(order_id = %request.order_id, error = %err, "charge: cache lookup failed");
            }
        }

        let success = {
            let mut state = self.state.lock().unwrap();
            if state.payments.contains_key(&request.order_id) {
                tracing::info!(order_id = %request.order_id, "charge: idempotent response from memory");
                true
            } else if request.amount > CHARGE_LIMIT {
                tracing::warn!(
                    order_id = %request.order_id,
                    amount = request.amount,
                    "charge declined: amount exceeds limit"
                );
                false
            } else {
                state.payments.insert(request.order_id.clone(), request.amount);
                tracing::info!(order_id = %request.order_id, amount = request.amount, "charge successful");
                true
            }
        };

        if success {
            let amount = format!("{:.2}", request.amount);
            if let Err(err) = self.cache.set(&cache_key, &amount, IDEMPOTENCY_TTL).await {
                tracing::warn!(order_id = %request.order_id, error = %err, "charge: failed to persist idempotency key");
            }
        }

        Ok(ChargeResponse { success })
    }

    async fn refund(&self, req: Request<RefundRequest>) -> Result<RefundResponse, ServiceError> {
        let request = req.into_inner();

        // Compensation is keyed per order, not per client attempt.
        let cache_key = self.cache.generate_key("refund", &request.order_id);
        match self.cache.get(&cache_key).await {
            Ok(Some(_)) => {
                tracing::info!(order_id = %request.order_id, "refund: idempotent response from cache");
                return Ok(RefundResponse { success: true });
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(order_id = %request.order_id, error = %err, "refund: cache lookup failed");
            }
        }

        {
            let mut state = self.state.lock().unwrap();
            if state.fail_on_refund {
                return Err(ServiceError::Unavailable("payment service".to_string()));
            }
            match state.payments.remove(&request.order_id) {
                Some(amount) => {
                    tracing::info!(order_id = %request.order_id, amount, "refund processed");
                }
                None => {
                    // Nothing charged: compensation is an idempotent no-op.
                    tracing::warn!(order_id = %request.order_id, "refund: no payment found");
                }
            }
        }

        if let Err(err) = self.cache.set(&cache_key, "ok", IDEMPOTENCY_TTL).await {
            tracing::warn!(order_id = %request.order_id, error = %err, "refund: failed to persist idempotency key");
        }

        Ok(RefundResponse { success: true })
    }
}

fn forward_discriminator<'a>(cx: &'a Context, order_id: &'a str) -> &'a str {
    let key = common::idempotency_key(cx);
    if key.is_empty() {
        order_id
    } else {
        key
    }
}
