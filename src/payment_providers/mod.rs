//! Payment provider abstraction layer
//!
//! The `PaymentProvider` trait abstracts gateway interaction: creating an
//! order for a checkout, fetching its state for manual reconciliation, and
//! validating incoming webhook events. Database state transitions live in
//! the payment handlers so both booking payments and case payments share
//! one reconciliation path.

use async_trait::async_trait;
use axum::http::HeaderMap;
use rust_decimal::Decimal;

use crate::config::{Config, PaymentConfig};

pub mod dummy;
pub mod razorpay;

/// Create a payment provider from configuration
///
/// This is the single point where we convert config into provider instances.
/// Adding a new provider requires adding a match arm here.
pub fn create_provider(config: &Config) -> Option<Box<dyn PaymentProvider>> {
    match config.payment.as_ref()? {
        PaymentConfig::Razorpay(razorpay_config) => Some(Box::new(razorpay::RazorpayProvider::new(
            razorpay_config.clone(),
            config.public_url.clone(),
        ))),
        PaymentConfig::Dummy(_) => Some(Box::new(dummy::DummyProvider::new(config.public_url.clone()))),
    }
}

/// Result type for payment provider operations
pub type Result<T> = std::result::Result<T, PaymentError>;

/// Errors that can occur during payment processing
#[derive(Debug, thiserror::Error)]
pub enum PaymentError {
    #[error("Payment provider API error: {0}")]
    ProviderApi(String),

    #[error("Invalid webhook signature")]
    SignatureInvalid,

    #[error("Payment not completed yet")]
    PaymentNotCompleted,

    #[error("Invalid payment data: {0}")]
    InvalidData(String),
}

impl From<PaymentError> for crate::errors::Error {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::ProviderApi(detail) => crate::errors::Error::Internal {
                operation: format!("talk to payment provider: {detail}"),
            },
            PaymentError::SignatureInvalid => crate::errors::Error::BadRequest {
                message: "Invalid webhook signature".to_string(),
            },
            PaymentError::PaymentNotCompleted => crate::errors::Error::BadRequest {
                message: "The payment has not been completed yet".to_string(),
            },
            PaymentError::InvalidData(message) => crate::errors::Error::BadRequest { message },
        }
    }
}

/// A gateway order created for a checkout attempt.
#[derive(Debug, Clone)]
pub struct ProviderOrder {
    /// Gateway-side order id, echoed back in webhook payloads
    pub order_id: String,
    /// URL the client is redirected to for payment
    pub checkout_url: String,
}

/// Gateway-side state of an order, for manual reconciliation.
#[derive(Debug, Clone)]
pub struct OrderState {
    pub is_paid: bool,
    /// Gateway payment id when a capture exists
    pub payment_id: Option<String>,
}

/// Kinds of webhook events this service reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventKind {
    PaymentCaptured,
    PaymentFailed,
    RefundProcessed,
    /// Anything else; acknowledged and ignored
    Other(String),
}

/// A validated webhook event from a payment provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub kind: WebhookEventKind,
    /// Gateway order id the event refers to
    pub order_id: Option<String>,
    /// Gateway payment id, when present
    pub payment_id: Option<String>,
    /// Failure description, when present
    pub reason: Option<String>,
}

/// Abstract payment provider interface
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Short provider name recorded on the payment row
    fn name(&self) -> &'static str;

    /// Create a gateway order for `amount` and return the checkout redirect.
    ///
    /// `reference` is the local payment id, round-tripped through the gateway
    /// so webhooks and receipts tie back to our row.
    async fn create_order(&self, reference: &str, amount: Decimal, currency: &str) -> Result<ProviderOrder>;

    /// Fetch the current gateway state of an order.
    ///
    /// Used by the manual confirmation fallback when webhooks are delayed.
    async fn fetch_order(&self, order_id: &str) -> Result<OrderState>;

    /// Validate and extract a webhook event from raw request data.
    ///
    /// Returns `None` if this provider doesn't emit webhooks. Fails with
    /// [`PaymentError::SignatureInvalid`] when the signature check fails.
    fn verify_webhook(&self, headers: &HeaderMap, body: &[u8]) -> Result<Option<WebhookEvent>>;
}
