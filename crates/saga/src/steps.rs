//! The concrete step set for the order saga.
//!
//! Each step adapts the generic [`Step`] contract to one downstream
//! service call and its compensation, and is responsible for telling a
//! transport failure apart from a business decline; both abort the saga,
//! with different messages.

use std::sync::Arc;

use async_trait::async_trait;
use common::{Context, OrderStatus, Request};

use crate::services::{
    ChargeRequest, InventoryService, OrderService, PaymentService, RefundRequest, ReleaseRequest,
    ReserveRequest, StockItem, UpdateOrderStatusRequest,
};
use crate::{SagaError, Step};

/// Reserves stock for the order; compensation releases the reservation.
pub struct InventoryStep {
    service: Arc<dyn InventoryService>,
    order_id: String,
    items: Vec<StockItem>,
}

impl InventoryStep {
    pub fn new(
        service: Arc<dyn InventoryService>,
        order_id: impl Into<String>,
        items: Vec<StockItem>,
    ) -> Self {
        Self {
            service,
            order_id: order_id.into(),
            items,
        }
    }
}

#[async_trait]
impl Step for InventoryStep {
    fn name(&self) -> &str {
        "Inventory_Reservation_Step"
    }

    async fn execute(&mut self, cx: &Context) -> Result<(), SagaError> {
        let request = Request::new(
            cx,
            ReserveRequest {
                order_id: self.order_id.clone(),
                items: self.items.clone(),
            },
        );
        let response = self
            .service
            .reserve(request)
            .await
            .map_err(SagaError::Inventory)?;
        if !response.success {
            return Err(SagaError::InventoryDeclined(self.order_id.clone()));
        }
        Ok(())
    }

    async fn compensate(&mut self, cx: &Context) -> Result<(), SagaError> {
        let request = Request::new(
            cx,
            ReleaseRequest {
                order_id: self.order_id.clone(),
            },
        );
        let response = self
            .service
            .release(request)
            .await
            .map_err(SagaError::Inventory)?;
        if !response.success {
            return Err(SagaError::ReleaseDeclined(self.order_id.clone()));
        }
        Ok(())
    }
}

/// Charges the order total; compensation refunds it.
pub struct PaymentStep {
    service: Arc<dyn PaymentService>,
    order_id: String,
    amount: f64,
}

impl PaymentStep {
    pub fn new(service: Arc<dyn PaymentService>, order_id: impl Into<String>, amount: f64) -> Self {
        Self {
            service,
            order_id: order_id.into(),
            amount,
        }
    }
}

#[async_trait]
impl Step for PaymentStep {
    fn name(&self) -> &str {
        "Payment_Charge_Step"
    }

    async fn execute(&mut self, cx: &Context) -> Result<(), SagaError> {
        let request = Request::new(
            cx,
            ChargeRequest {
                order_id: self.order_id.clone(),
                amount: self.amount,
            },
        );
        let response = self
            .service
            .charge(request)
            .await
            .map_err(SagaError::Payment)?;
        if !response.success {
            return Err(SagaError::PaymentDeclined(self.order_id.clone()));
        }
        Ok(())
    }

    async fn compensate(&mut self, cx: &Context) -> Result<(), SagaError> {
        let request = Request::new(
            cx,
            RefundRequest {
                order_id: self.order_id.clone(),
            },
        );
        let response = self
            .service
            .refund(request)
            .await
            .map_err(SagaError::Payment)?;
        if !response.success {
            return Err(SagaError::RefundDeclined(self.order_id.clone()));
        }
        Ok(())
    }
}

/// Confirms the order; compensation reverts it to CANCELLED.
///
/// Today this is the terminal step, so the compensation never runs, but
/// a reordering must not leave a confirmed order behind, so it is
/// implemented rather than stubbed.
pub struct ConfirmOrderStep {
    service: Arc<dyn OrderService>,
    order_id: String,
}

impl ConfirmOrderStep {
    pub fn new(service: Arc<dyn OrderService>, order_id: impl Into<String>) -> Self {
        Self {
            service,
            order_id: order_id.into(),
        }
    }
}

#[async_trait]
impl Step for ConfirmOrderStep {
    fn name(&self) -> &str {
        "Confirm_Order_Step"
    }

    async fn execute(&mut self, cx: &Context) -> Result<(), SagaError> {
        let request = Request::new(
            cx,
            UpdateOrderStatusRequest {
                id: self.order_id.clone(),
                status: OrderStatus::Confirmed,
            },
        );
        let response = self
            .service
            .update_order_status(request)
            .await
            .map_err(SagaError::Confirm)?;
        if !response.success {
            return Err(SagaError::ConfirmDeclined(self.order_id.clone()));
        }
        Ok(())
    }

    async fn compensate(&mut self, cx: &Context) -> Result<(), SagaError> {
        let request = Request::new(
            cx,
            UpdateOrderStatusRequest {
                id: self.order_id.clone(),
                status: OrderStatus::Cancelled,
            },
        );
        let response = self
            .service
            .update_order_status(request)
            .await
            .map_err(SagaError::Cancel)?;
        if !response.success {
            return Err(SagaError::CancelDeclined(self.order_id.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::InMemoryCache;

    use super::*;
    use crate::services::{InMemoryInventory, InMemoryOrders, InMemoryPayments};
    use crate::services::{CreateOrderRequest, GetOrderRequest};
    use common::OrderItem;

    fn cache() -> Arc<InMemoryCache> {
        Arc::new(InMemoryCache::new("test"))
    }

    #[tokio::test]
    async fn inventory_step_reports_decline_with_order_id() {
        let inventory = Arc::new(InMemoryInventory::new(cache()));
        let mut step = InventoryStep::new(
            inventory,
            "ord-3",
            vec![StockItem {
                product_id: "prod_3".to_string(),
                quantity: 1,
            }],
        );

        let err = step.execute(&Context::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "inventory insufficient for order ord-3");
    }

    #[tokio::test]
    async fn inventory_step_round_trips_reserve_and_release() {
        let inventory = Arc::new(InMemoryInventory::new(cache()));
        let mut step = InventoryStep::new(
            inventory.clone(),
            "ord-1",
            vec![StockItem {
                product_id: "prod_1".to_string(),
                quantity: 2,
            }],
        );

        step.execute(&Context::new()).await.unwrap();
        assert_eq!(inventory.stock_of("prod_1"), 13);

        step.compensate(&Context::new()).await.unwrap();
        assert_eq!(inventory.stock_of("prod_1"), 15);
    }

    #[tokio::test]
    async fn payment_step_reports_decline_with_order_id() {
        let payments = Arc::new(InMemoryPayments::new(cache()));
        let mut step = PaymentStep::new(payments, "ord-2", 600.0);

        let err = step.execute(&Context::new()).await.unwrap_err();
        assert_eq!(err.to_string(), "payment declined for order ord-2");
    }

    #[tokio::test]
    async fn payment_step_transport_failure_reads_differently() {
        let payments = Arc::new(InMemoryPayments::new(cache()));
        payments.set_fail_on_refund(true);
        let mut step = PaymentStep::new(payments.clone(), "ord-2", 100.0);

        step.execute(&Context::new()).await.unwrap();
        let err = step.compensate(&Context::new()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "payment service error: payment service unavailable"
        );
    }

    #[tokio::test]
    async fn confirm_step_confirms_and_defensively_cancels() {
        let orders = Arc::new(InMemoryOrders::new(cache()));
        let cx = Context::new();
        let order = orders
            .create_order(Request::new(
                &cx,
                CreateOrderRequest {
                    customer_id: "cust-1".to_string(),
                    items: vec![OrderItem {
                        product_id: "prod_1".to_string(),
                        quantity: 1,
                        price: 10.0,
                    }],
                },
            ))
            .await
            .unwrap();

        let mut step = ConfirmOrderStep::new(orders.clone(), order.id.clone());
        step.execute(&cx).await.unwrap();
        assert_eq!(orders.status_of(&order.id), Some(OrderStatus::Confirmed));

        step.compensate(&cx).await.unwrap();
        assert_eq!(orders.status_of(&order.id), Some(OrderStatus::Cancelled));

        let fetched = orders
            .get_order(Request::new(&cx, GetOrderRequest { id: order.id }))
            .await
            .unwrap();
        assert_eq!(fetched.status, OrderStatus::Cancelled);
    }
}
