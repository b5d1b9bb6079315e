//! HTTP client for the order server API

use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use shared::error::ApiResponse;
use shared::models::Food;
use shared::order::{
    AggregateCounters, CartLine, CheckoutRequest, CheckoutResponse, Order, OrderCheckoutRequest,
    ServiceType,
};

use crate::{ClientConfig, ClientError, ClientResult};

/// HTTP client used by one kiosk
#[derive(Debug, Clone)]
pub struct KioskClient {
    client: Client,
    base_url: String,
}

impl KioskClient {
    /// Create a new HTTP client from configuration
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Make a GET request
    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> ClientResult<T> {
        let response = self.client.get(self.url(path)).query(query).send().await?;
        Self::handle_response(response).await
    }

    /// Make a POST request with JSON body
    async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> ClientResult<T> {
        let response = self.client.post(self.url(path)).json(body).send().await?;
        Self::handle_response(response).await
    }

    /// Unwrap the `ApiResponse` envelope
    ///
    /// Error envelopes become [`ClientError::Api`] regardless of the HTTP
    /// status, so the kiosk can branch on the error code.
    async fn handle_response<T: DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();
        let body = response.bytes().await?;

        let envelope: ApiResponse<T> = match serde_json::from_slice(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(e.into()),
            Err(_) => {
                return Err(ClientError::InvalidResponse(format!(
                    "HTTP {}: {}",
                    status,
                    String::from_utf8_lossy(&body)
                )));
            }
        };

        if !envelope.is_success() {
            let err = envelope.into_error();
            tracing::debug!(code = %err.code, message = %err.message, "Server returned error");
            return Err(ClientError::Api(err));
        }

        envelope
            .data
            .ok_or_else(|| ClientError::InvalidResponse("Missing response data".to_string()))
    }

    // ========== Catalog ==========

    /// Foods for the current navigation step; `None` filters nothing
    pub async fn list_foods(
        &self,
        category_id: Option<&str>,
        sub_category_id: Option<&str>,
    ) -> ClientResult<Vec<Food>> {
        let mut query = Vec::new();
        if let Some(id) = category_id {
            query.push(("categoryId", id));
        }
        if let Some(id) = sub_category_id {
            query.push(("subCategoryId", id));
        }
        self.get("/api/catalog/foods", &query).await
    }

    // ========== Checkout ==========

    /// Create the order and open its payment session
    pub async fn submit_checkout(
        &self,
        mode: ServiceType,
        items: Vec<CartLine>,
    ) -> ClientResult<CheckoutResponse> {
        let request = CheckoutRequest { mode, items };
        self.post("/api/checkout", &request).await
    }

    /// Re-open (or fetch) the payment session of a pending order
    pub async fn retry_checkout(
        &self,
        order_id: &str,
        items: Vec<CartLine>,
    ) -> ClientResult<CheckoutResponse> {
        let request = OrderCheckoutRequest { items };
        self.post(&format!("/api/orders/{}/checkout", order_id), &request)
            .await
    }

    // ========== Orders ==========

    pub async fn get_order(&self, order_id: &str) -> ClientResult<Order> {
        self.get(&format!("/api/orders/{}", order_id), &[]).await
    }

    pub async fn board_counters(&self) -> ClientResult<AggregateCounters> {
        self.get("/api/board/counters", &[]).await
    }
}
