//! Simulated payment gateway.
//!
//! Every order it creates is instantly payable: the checkout URL points
//! straight at the frontend success page and `fetch_order` reports paid.
//! Used for development and tests; the production flow is identical except
//! the gateway is real.

use async_trait::async_trait;
use axum::http::HeaderMap;
use rust_decimal::Decimal;

use crate::payment_providers::{
    OrderState, PaymentError, PaymentProvider, ProviderOrder, Result, WebhookEvent,
};

pub struct DummyProvider {
    public_url: String,
}

impl DummyProvider {
    pub fn new(public_url: String) -> Self {
        Self { public_url }
    }
}

#[async_trait]
impl PaymentProvider for DummyProvider {
    fn name(&self) -> &'static str {
        "dummy"
    }

    async fn create_order(&self, reference: &str, _amount: Decimal, _currency: &str) -> Result<ProviderOrder> {
        // Embed the local reference so the order id alone identifies the payment
        let order_id = format!("dummy_order_{}_{}", reference, uuid::Uuid::new_v4().simple());
        let checkout_url = format!("{}/payments/result?status=success&order_id={}", self.public_url, order_id);

        tracing::info!("Dummy provider created order {} for payment {}", order_id, reference);

        Ok(ProviderOrder { order_id, checkout_url })
    }

    async fn fetch_order(&self, order_id: &str) -> Result<OrderState> {
        if !order_id.starts_with("dummy_order_") {
            return Err(PaymentError::InvalidData("not a dummy order id".to_string()));
        }

        // Dummy orders are always "paid"
        Ok(OrderState {
            is_paid: true,
            payment_id: Some(format!("dummy_pay_{order_id}")),
        })
    }

    fn verify_webhook(&self, _headers: &HeaderMap, _body: &[u8]) -> Result<Option<WebhookEvent>> {
        // Dummy provider doesn't use webhooks
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_order_is_instantly_paid() {
        let provider = DummyProvider::new("http://localhost:3000".to_string());

        let order = provider
            .create_order("11111111-2222-3333-4444-555555555555", Decimal::new(1200, 0), "INR")
            .await
            .unwrap();
        assert!(order.order_id.starts_with("dummy_order_11111111"));
        assert!(order.checkout_url.contains("status=success"));
        assert!(order.checkout_url.contains(&order.order_id));

        let state = provider.fetch_order(&order.order_id).await.unwrap();
        assert!(state.is_paid);
        assert!(state.payment_id.is_some());
    }

    #[tokio::test]
    async fn test_foreign_order_rejected() {
        let provider = DummyProvider::new("http://localhost:3000".to_string());
        let result = provider.fetch_order("order_real_gateway").await;
        assert!(matches!(result, Err(PaymentError::InvalidData(_))));
    }

    #[test]
    fn test_webhooks_not_supported() {
        let provider = DummyProvider::new("http://localhost:3000".to_string());
        let headers = HeaderMap::new();
        let result = provider.verify_webhook(&headers, b"{}").unwrap();
        assert_eq!(result, None);
    }
}
