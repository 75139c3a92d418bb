//! Razorpay payment provider.
//!
//! Orders are created through the Orders API with basic auth; the client
//! completes payment in Razorpay's hosted checkout, and the gateway reports
//! captures/failures/refunds through webhooks signed with HMAC-SHA256 over
//! the raw request body (`X-Razorpay-Signature`, hex encoded).

use async_trait::async_trait;
use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;

use crate::config::RazorpayConfig;
use crate::payment_providers::{
    OrderState, PaymentError, PaymentProvider, ProviderOrder, Result, WebhookEvent, WebhookEventKind,
};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

pub struct RazorpayProvider {
    config: RazorpayConfig,
    public_url: String,
    http: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct PaymentEntity {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct OrderPaymentsResponse {
    items: Vec<PaymentEntity>,
}

impl RazorpayProvider {
    pub fn new(config: RazorpayConfig, public_url: String) -> Self {
        Self {
            config,
            public_url,
            http: reqwest::Client::new(),
        }
    }
}

/// Compute the hex HMAC-SHA256 signature Razorpay attaches to webhooks.
pub fn sign_payload(body: &[u8], secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify a webhook signature with a constant-time comparison.
pub fn verify_signature(body: &[u8], signature: &str, secret: &str) -> bool {
    let expected = sign_payload(body, secret);
    constant_time_eq(signature.as_bytes(), expected.as_bytes())
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Pull the fields we react to out of a webhook payload.
fn parse_event(body: &[u8]) -> Result<WebhookEvent> {
    let value: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| PaymentError::InvalidData(format!("webhook body: {e}")))?;

    let event = value
        .get("event")
        .and_then(|e| e.as_str())
        .ok_or_else(|| PaymentError::InvalidData("webhook body missing event field".to_string()))?;

    let kind = match event {
        "payment.captured" => WebhookEventKind::PaymentCaptured,
        "payment.failed" => WebhookEventKind::PaymentFailed,
        "refund.processed" => WebhookEventKind::RefundProcessed,
        other => WebhookEventKind::Other(other.to_string()),
    };

    // The payment entity rides along on all three event families
    let payment = value.pointer("/payload/payment/entity");
    let order_id = payment
        .and_then(|p| p.get("order_id"))
        .and_then(|o| o.as_str())
        .map(|s| s.to_string());
    let payment_id = payment
        .and_then(|p| p.get("id"))
        .and_then(|i| i.as_str())
        .map(|s| s.to_string());
    let reason = payment
        .and_then(|p| p.get("error_description"))
        .and_then(|r| r.as_str())
        .map(|s| s.to_string());

    Ok(WebhookEvent {
        kind,
        order_id,
        payment_id,
        reason,
    })
}

#[async_trait]
impl PaymentProvider for RazorpayProvider {
    fn name(&self) -> &'static str {
        "razorpay"
    }

    async fn create_order(&self, reference: &str, amount: Decimal, currency: &str) -> Result<ProviderOrder> {
        // Razorpay transacts in the currency's smallest unit
        let subunits = (amount * Decimal::from(100))
            .trunc()
            .to_i64()
            .ok_or_else(|| PaymentError::InvalidData(format!("amount out of range: {amount}")))?;
        if subunits <= 0 {
            return Err(PaymentError::InvalidData(format!("non-positive amount: {amount}")));
        }

        let response = self
            .http
            .post(format!("{}/orders", self.config.base_url))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .json(&serde_json::json!({
                "amount": subunits,
                "currency": currency,
                "receipt": reference,
            }))
            .send()
            .await
            .map_err(|e| PaymentError::ProviderApi(format!("create order: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Razorpay order creation failed ({}): {}", status, body);
            return Err(PaymentError::ProviderApi(format!("create order: HTTP {status}")));
        }

        let order: OrderResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::ProviderApi(format!("decode order response: {e}")))?;

        tracing::info!("Created Razorpay order {} for payment {}", order.id, reference);

        // The frontend opens hosted checkout with the order id and key
        let checkout_url = format!(
            "{}/payments/checkout?order_id={}&key_id={}",
            self.public_url, order.id, self.config.key_id
        );

        Ok(ProviderOrder {
            order_id: order.id,
            checkout_url,
        })
    }

    async fn fetch_order(&self, order_id: &str) -> Result<OrderState> {
        let response = self
            .http
            .get(format!("{}/orders/{}/payments", self.config.base_url, order_id))
            .basic_auth(&self.config.key_id, Some(&self.config.key_secret))
            .send()
            .await
            .map_err(|e| PaymentError::ProviderApi(format!("fetch order payments: {e}")))?;

        if !response.status().is_success() {
            return Err(PaymentError::ProviderApi(format!(
                "fetch order payments: HTTP {}",
                response.status()
            )));
        }

        let payments: OrderPaymentsResponse = response
            .json()
            .await
            .map_err(|e| PaymentError::ProviderApi(format!("decode order payments: {e}")))?;

        let captured = payments.items.iter().find(|p| p.status == "captured");

        Ok(OrderState {
            is_paid: captured.is_some(),
            payment_id: captured.map(|p| p.id.clone()),
        })
    }

    fn verify_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<Option<WebhookEvent>> {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(PaymentError::SignatureInvalid)?;

        if !verify_signature(body, signature, &self.config.webhook_secret) {
            return Err(PaymentError::SignatureInvalid);
        }

        parse_event(body).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: String) -> RazorpayConfig {
        RazorpayConfig {
            key_id: "rzp_test_key".to_string(),
            key_secret: "secret".to_string(),
            webhook_secret: "whsec_test".to_string(),
            base_url,
        }
    }

    fn captured_body(order_id: &str) -> Vec<u8> {
        serde_json::json!({
            "event": "payment.captured",
            "payload": {
                "payment": {
                    "entity": {
                        "id": "pay_123",
                        "order_id": order_id,
                        "status": "captured"
                    }
                }
            }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_sign_and_verify() {
        let secret = "whsec_test";
        let body = br#"{"event":"payment.captured"}"#;

        let signature = sign_payload(body, secret);
        assert_eq!(signature.len(), 64); // hex sha256

        assert!(verify_signature(body, &signature, secret));
        assert!(!verify_signature(b"tampered", &signature, secret));
        assert!(!verify_signature(body, &signature, "other_secret"));
        assert!(!verify_signature(body, "deadbeef", secret));
    }

    #[test]
    fn test_signature_is_deterministic() {
        let body = br#"{"test": 2432232314}"#;
        assert_eq!(sign_payload(body, "s"), sign_payload(body, "s"));
        assert_ne!(sign_payload(body, "s"), sign_payload(body, "t"));
    }

    #[test]
    fn test_webhook_requires_header() {
        let provider = RazorpayProvider::new(test_config("http://unused".to_string()), "http://app".to_string());
        let headers = HeaderMap::new();
        let result = provider.verify_webhook(&headers, b"{}");
        assert!(matches!(result, Err(PaymentError::SignatureInvalid)));
    }

    #[test]
    fn test_webhook_valid_signature_parses_event() {
        let provider = RazorpayProvider::new(test_config("http://unused".to_string()), "http://app".to_string());
        let body = captured_body("order_abc");
        let signature = sign_payload(&body, "whsec_test");

        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, signature.parse().unwrap());

        let event = provider.verify_webhook(&headers, &body).unwrap().unwrap();
        assert_eq!(event.kind, WebhookEventKind::PaymentCaptured);
        assert_eq!(event.order_id.as_deref(), Some("order_abc"));
        assert_eq!(event.payment_id.as_deref(), Some("pay_123"));
    }

    #[test]
    fn test_webhook_tampered_body_rejected() {
        let provider = RazorpayProvider::new(test_config("http://unused".to_string()), "http://app".to_string());
        let body = captured_body("order_abc");
        let signature = sign_payload(&body, "whsec_test");

        let mut headers = HeaderMap::new();
        headers.insert(SIGNATURE_HEADER, signature.parse().unwrap());

        let tampered = captured_body("order_evil");
        let result = provider.verify_webhook(&headers, &tampered);
        assert!(matches!(result, Err(PaymentError::SignatureInvalid)));
    }

    #[test]
    fn test_unknown_event_kind_is_other() {
        let body = serde_json::json!({
            "event": "invoice.paid",
            "payload": {}
        })
        .to_string()
        .into_bytes();

        let event = parse_event(&body).unwrap();
        assert_eq!(event.kind, WebhookEventKind::Other("invoice.paid".to_string()));
        assert!(event.order_id.is_none());
    }

    #[tokio::test]
    async fn test_create_order_against_mock_gateway() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "order_MkWt1",
                "amount": 120000,
                "currency": "INR",
                "status": "created"
            })))
            .mount(&server)
            .await;

        let provider = RazorpayProvider::new(test_config(server.uri()), "http://app".to_string());
        let order = provider
            .create_order("payment-ref", Decimal::new(1200, 0), "INR")
            .await
            .unwrap();

        assert_eq!(order.order_id, "order_MkWt1");
        assert!(order.checkout_url.contains("order_id=order_MkWt1"));
        assert!(order.checkout_url.contains("key_id=rzp_test_key"));
    }

    #[tokio::test]
    async fn test_fetch_order_reports_capture() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/orders/order_MkWt1/payments"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "count": 2,
                "items": [
                    {"id": "pay_fail", "status": "failed"},
                    {"id": "pay_ok", "status": "captured"}
                ]
            })))
            .mount(&server)
            .await;

        let provider = RazorpayProvider::new(test_config(server.uri()), "http://app".to_string());
        let state = provider.fetch_order("order_MkWt1").await.unwrap();
        assert!(state.is_paid);
        assert_eq!(state.payment_id.as_deref(), Some("pay_ok"));
    }

    #[tokio::test]
    async fn test_gateway_error_surfaces() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/orders"))
            .respond_with(ResponseTemplate::new(401).set_body_string("unauthorized"))
            .mount(&server)
            .await;

        let provider = RazorpayProvider::new(test_config(server.uri()), "http://app".to_string());
        let result = provider.create_order("ref", Decimal::new(100, 0), "INR").await;
        assert!(matches!(result, Err(PaymentError::ProviderApi(_))));
    }

    #[test]
    fn test_non_positive_amount_rejected() {
        let provider = RazorpayProvider::new(test_config("http://unused".to_string()), "http://app".to_string());
        let result = tokio_test::block_on(provider.create_order("ref", Decimal::ZERO, "INR"));
        assert!(matches!(result, Err(PaymentError::InvalidData(_))));
    }
}
