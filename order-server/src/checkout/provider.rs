//! Payment provider adapters
//!
//! Stripe Checkout is driven over its REST API with `reqwest` (no SDK).
//! The offline and mock providers never leave the process.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use thiserror::Error;

const STRIPE_API_BASE: &str = "https://api.stripe.com";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Payment provider request failed: {0}")]
    Transport(String),

    #[error("Payment provider timed out")]
    Timeout,

    #[error("Payment provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected payment provider response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Transport(err.to_string())
        }
    }
}

/// One payment session for one order, single line item
#[derive(Debug, Clone, PartialEq)]
pub struct SessionRequest {
    /// Embedded in session metadata, also the idempotency key
    pub order_id: String,
    pub amount_minor_units: i64,
    pub currency: String,
    /// Line item name shown on the payment page
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Unix seconds after which the provider expires the session
    pub expires_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSession {
    pub session_id: String,
    pub redirect_url: String,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn create_session(&self, request: &SessionRequest) -> Result<ProviderSession, ProviderError>;
}

// =============================================================================
// Stripe
// =============================================================================

pub struct StripeProvider {
    client: reqwest::Client,
    secret_key: String,
    api_base: String,
}

impl std::fmt::Debug for StripeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeProvider")
            .field("api_base", &self.api_base)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

impl StripeProvider {
    pub fn new(secret_key: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        Self::with_api_base(secret_key, STRIPE_API_BASE, timeout)
    }

    /// Point at another Stripe-compatible endpoint (stripe-mock, tests)
    pub fn with_api_base(
        secret_key: impl Into<String>,
        api_base: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            secret_key: secret_key.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn create_session(&self, request: &SessionRequest) -> Result<ProviderSession, ProviderError> {
        let amount = request.amount_minor_units.to_string();
        let expires_at = request.expires_at.to_string();
        let resp = self
            .client
            .post(format!("{}/v1/checkout/sessions", self.api_base))
            .basic_auth(&self.secret_key, None::<&str>)
            .header("Idempotency-Key", &request.order_id)
            .form(&[
                ("mode", "payment"),
                ("line_items[0][quantity]", "1"),
                ("line_items[0][price_data][currency]", request.currency.as_str()),
                ("line_items[0][price_data][unit_amount]", amount.as_str()),
                (
                    "line_items[0][price_data][product_data][name]",
                    request.description.as_str(),
                ),
                ("success_url", request.success_url.as_str()),
                ("expires_at", expires_at.as_str()),
                ("cancel_url", request.cancel_url.as_str()),
                ("client_reference_id", request.order_id.as_str()),
                ("metadata[order_id]", request.order_id.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        let body: serde_json::Value = resp.json().await?;
        if !status.is_success() {
            let message = body["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        let session_id = body["id"]
            .as_str()
            .ok_or_else(|| ProviderError::InvalidResponse(format!("missing id: {body}")))?;
        let redirect_url = body["url"]
            .as_str()
            .ok_or_else(|| ProviderError::InvalidResponse(format!("missing url: {body}")))?;

        Ok(ProviderSession {
            session_id: session_id.to_string(),
            redirect_url: redirect_url.to_string(),
        })
    }
}

// =============================================================================
// Offline (development)
// =============================================================================

/// Issues local session ids and redirects straight to the success URL
#[derive(Debug, Clone, Default)]
pub struct OfflinePaymentProvider;

#[async_trait]
impl PaymentProvider for OfflinePaymentProvider {
    fn name(&self) -> &'static str {
        "offline"
    }

    async fn create_session(&self, request: &SessionRequest) -> Result<ProviderSession, ProviderError> {
        let session_id = format!("offline_{}", shared::util::new_id());
        let sep = if request.success_url.contains('?') { '&' } else { '?' };
        let redirect_url = format!(
            "{}{sep}session_id={session_id}&order_id={}",
            request.success_url, request.order_id
        );
        tracing::info!(
            order_id = %request.order_id,
            session_id = %session_id,
            amount_minor_units = request.amount_minor_units,
            "Offline payment session issued"
        );
        Ok(ProviderSession {
            session_id,
            redirect_url,
        })
    }
}

// =============================================================================
// Mock (tests)
// =============================================================================

/// Counts calls, can be told to fail or stall
#[derive(Debug, Default)]
pub struct MockPaymentProvider {
    calls: AtomicUsize,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
    requests: Mutex<Vec<SessionRequest>>,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Option<Duration>) {
        *self.delay.lock() = delay;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn create_session(&self, request: &SessionRequest) -> Result<ProviderSession, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().push(request.clone());

        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(ProviderError::Rejected {
                status: 500,
                message: "mock failure".into(),
            });
        }

        Ok(ProviderSession {
            session_id: format!("cs_mock_{n}"),
            redirect_url: format!("https://pay.mock/cs_mock_{n}"),
        })
    }
}
