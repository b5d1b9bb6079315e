//! CheckoutService - prices carts, opens payment sessions, applies confirmations

use super::pricing::{PricedCart, price_cart};
use super::provider::{PaymentProvider, ProviderError, SessionRequest};
use super::webhook::{self, PaymentEvent};
use super::{CHECKOUT_SESSION_LIFETIME, CheckoutError, CheckoutResult};
use crate::catalog::CatalogReader;
use crate::orders::manager::validate_cart;
use crate::orders::{CheckoutSession, ManagerError, ManagerResult, OrdersManager, PaymentOutcome};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use shared::order::{CartLine, CheckoutResponse, Order, OrderStatus, ServiceType, merge_lines};
use shared::util::now_millis;
use std::sync::Arc;
use std::time::Duration;

/// Provider-facing checkout settings
#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// ISO 4217, lower case (`eur`)
    pub currency: String,
    pub success_url: String,
    pub cancel_url: String,
    pub webhook_secret: String,
    /// Upper bound for one provider call
    pub provider_timeout: Duration,
}

impl Default for CheckoutSettings {
    fn default() -> Self {
        Self {
            currency: "eur".into(),
            success_url: "http://localhost:3000/checkout/success".into(),
            cancel_url: "http://localhost:3000/checkout/cancel".into(),
            webhook_secret: String::new(),
            provider_timeout: Duration::from_secs(15),
        }
    }
}

/// Removes the order from the in-flight set when dropped
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<String, ()>,
    order_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.in_flight.remove(&self.order_id);
    }
}

pub struct CheckoutService {
    orders: Arc<OrdersManager>,
    catalog: Arc<dyn CatalogReader>,
    provider: Arc<dyn PaymentProvider>,
    settings: CheckoutSettings,
    /// order id -> session request currently with the provider
    in_flight: DashMap<String, ()>,
}

impl std::fmt::Debug for CheckoutService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckoutService")
            .field("provider", &self.provider.name())
            .field("currency", &self.settings.currency)
            .field("in_flight", &self.in_flight.len())
            .finish()
    }
}

impl CheckoutService {
    pub fn new(
        orders: Arc<OrdersManager>,
        catalog: Arc<dyn CatalogReader>,
        provider: Arc<dyn PaymentProvider>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            orders,
            catalog,
            provider,
            settings,
            in_flight: DashMap::new(),
        }
    }

    pub fn settings(&self) -> &CheckoutSettings {
        &self.settings
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Run blocking redb work off the async runtime
    async fn blocking<T, F>(&self, f: F) -> CheckoutResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&OrdersManager) -> ManagerResult<T> + Send + 'static,
    {
        let orders = self.orders.clone();
        tokio::task::spawn_blocking(move || f(&orders))
            .await
            .map_err(|e| CheckoutError::Internal(format!("blocking task failed: {e}")))?
            .map_err(CheckoutError::from)
    }

    fn acquire(&self, order_id: &str) -> CheckoutResult<InFlightGuard<'_>> {
        match self.in_flight.entry(order_id.to_string()) {
            Entry::Occupied(_) => Err(CheckoutError::InProgress(order_id.to_string())),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(InFlightGuard {
                    in_flight: &self.in_flight,
                    order_id: order_id.to_string(),
                })
            }
        }
    }

    /// Kiosk entry point: price, create the order, open its payment session
    ///
    /// An unknown food rejects the cart before anything is stored. A provider
    /// failure leaves the `PENDING` order in place for a retry through
    /// [`create_checkout_session`](Self::create_checkout_session).
    pub async fn submit_checkout(
        &self,
        mode: ServiceType,
        lines: Vec<CartLine>,
    ) -> CheckoutResult<CheckoutResponse> {
        validate_cart(&lines)?;
        let priced = price_cart(self.catalog.as_ref(), &lines)?;

        let order = self
            .blocking(move |orders| orders.create_order(&lines, mode))
            .await?;

        let _guard = self.acquire(&order.id)?;
        self.open_session(&order, &priced).await
    }

    /// Open (or return the existing) payment session for a `PENDING` order
    ///
    /// `lines` must match the order's items; prices always come from the
    /// catalog.
    pub async fn create_checkout_session(
        &self,
        order_id: &str,
        lines: Vec<CartLine>,
    ) -> CheckoutResult<CheckoutResponse> {
        validate_cart(&lines)?;
        let _guard = self.acquire(order_id)?;

        let id = order_id.to_string();
        let (order, existing) = self
            .blocking(move |orders| {
                let order = orders.get_order(&id)?;
                let session = orders.get_checkout_session(&id)?;
                Ok((order, session))
            })
            .await?;

        if order.is_abandoned() {
            return Err(ManagerError::OrderAbandoned(order.id).into());
        }
        if order.status != OrderStatus::Pending {
            return Err(ManagerError::invalid_transition(order.status, OrderStatus::Paid).into());
        }
        if merge_lines(&lines) != order.cart_lines() {
            return Err(CheckoutError::CartMismatch(order.id));
        }

        if let Some(session) = existing.filter(|s| !s.confirmed) {
            tracing::info!(
                order_id = %order.id,
                session_id = %session.session_id,
                "Returning existing checkout session"
            );
            return Ok(response_from(&order, &session));
        }

        let priced = price_cart(self.catalog.as_ref(), &lines)?;
        self.open_session(&order, &priced).await
    }

    /// Caller must hold the in-flight guard for `order`
    async fn open_session(&self, order: &Order, priced: &PricedCart) -> CheckoutResult<CheckoutResponse> {
        let request = SessionRequest {
            order_id: order.id.clone(),
            amount_minor_units: priced.amount_minor_units,
            currency: self.settings.currency.clone(),
            description: format!("Order #{}", order.counter),
            success_url: self.settings.success_url.clone(),
            cancel_url: self.settings.cancel_url.clone(),
            expires_at: chrono::Utc::now().timestamp() + CHECKOUT_SESSION_LIFETIME.as_secs() as i64,
        };

        let created = match tokio::time::timeout(
            self.settings.provider_timeout,
            self.provider.create_session(&request),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        };
        let provider_session = created.map_err(|e| {
            tracing::warn!(
                order_id = %order.id,
                provider = self.provider.name(),
                error = %e,
                "Payment session creation failed, order stays PENDING"
            );
            CheckoutError::Provider {
                order_id: order.id.clone(),
                source: e,
            }
        })?;

        let session = CheckoutSession {
            order_id: order.id.clone(),
            session_id: provider_session.session_id,
            redirect_url: provider_session.redirect_url,
            total: priced.total,
            amount_minor_units: priced.amount_minor_units,
            currency: self.settings.currency.clone(),
            created_at: now_millis(),
            confirmed: false,
            confirmed_at: None,
        };
        let record = session.clone();
        self.blocking(move |orders| orders.record_checkout_session(&record))
            .await?;

        Ok(response_from(order, &session))
    }

    /// Apply a provider confirmation for `order_id`
    pub async fn confirm_payment(&self, session_id: &str, order_id: &str) -> CheckoutResult<PaymentOutcome> {
        let (session_id, order_id) = (session_id.to_string(), order_id.to_string());
        self.blocking(move |orders| orders.confirm_payment(&session_id, &order_id))
            .await
    }

    /// Release an unpaid order; `None` when there was nothing to release
    pub async fn abandon_order(&self, order_id: &str, session_id: Option<&str>) -> CheckoutResult<Option<Order>> {
        let order_id = order_id.to_string();
        let session_id = session_id.map(str::to_string);
        self.blocking(move |orders| orders.abandon_order(&order_id, session_id.as_deref()))
            .await
    }

    /// Verify and apply a raw provider webhook
    ///
    /// Returns `None` for events that do not confirm a payment. An expired
    /// session abandons its unpaid order and frees the counter.
    pub async fn handle_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> CheckoutResult<Option<PaymentOutcome>> {
        webhook::verify_webhook_signature(payload, signature, &self.settings.webhook_secret)?;

        match webhook::parse_event(payload)? {
            PaymentEvent::CheckoutCompleted {
                event_id,
                session_id,
                order_id,
            } => {
                tracing::info!(event_id = %event_id, order_id = %order_id, "Payment webhook received");
                self.confirm_payment(&session_id, &order_id).await.map(Some)
            }
            PaymentEvent::CheckoutExpired {
                event_id,
                session_id,
                order_id,
            } => {
                tracing::info!(event_id = %event_id, order_id = %order_id, "Checkout session expired");
                self.abandon_order(&order_id, Some(&session_id)).await?;
                Ok(None)
            }
            PaymentEvent::Ignored { event_type } => {
                tracing::debug!(event_type = %event_type, "Unhandled webhook event type");
                Ok(None)
            }
        }
    }
}

fn response_from(order: &Order, session: &CheckoutSession) -> CheckoutResponse {
    CheckoutResponse {
        order_id: order.id.clone(),
        counter: order.counter,
        session_id: session.session_id.clone(),
        redirect_url: session.redirect_url.clone(),
        total: session.total,
        amount_minor_units: session.amount_minor_units,
        currency: session.currency.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use crate::checkout::provider::MockPaymentProvider;
    use crate::message::RecordingPublisher;
    use crate::orders::OrderStorage;
    use rust_decimal::Decimal;
    use shared::models::Food;

    const SECRET: &str = "whsec_test";

    struct Harness {
        service: Arc<CheckoutService>,
        orders: Arc<OrdersManager>,
        provider: Arc<MockPaymentProvider>,
        catalog: Arc<InMemoryCatalog>,
    }

    fn harness() -> Harness {
        let storage = OrderStorage::open_in_memory().unwrap();
        let orders = Arc::new(OrdersManager::with_storage(
            storage,
            Arc::new(RecordingPublisher::new()),
        ));
        let catalog = InMemoryCatalog::from_foods(vec![
            Food {
                id: "f1".into(),
                title: "Burger".into(),
                price: Decimal::new(950, 2),
                image: None,
                category_id: None,
                sub_category_id: None,
            },
            Food {
                id: "f2".into(),
                title: "Fries".into(),
                price: Decimal::new(300, 2),
                image: None,
                category_id: None,
                sub_category_id: None,
            },
        ])
        .unwrap();
        let catalog = Arc::new(catalog);
        let provider = MockPaymentProvider::shared();
        let settings = CheckoutSettings {
            webhook_secret: SECRET.into(),
            ..CheckoutSettings::default()
        };
        let service = Arc::new(CheckoutService::new(
            orders.clone(),
            catalog.clone(),
            provider.clone(),
            settings,
        ));
        Harness {
            service,
            orders,
            provider,
            catalog,
        }
    }

    #[tokio::test]
    async fn test_submit_checkout_prices_from_catalog() {
        let h = harness();
        let resp = h
            .service
            .submit_checkout(ServiceType::DineIn, vec![CartLine::new("f1", 2)])
            .await
            .unwrap();

        assert_eq!(resp.total, Decimal::new(1900, 2));
        assert_eq!(resp.amount_minor_units, 1900);
        assert_eq!(resp.session_id, "cs_mock_1");
        assert_eq!(resp.counter, 1);

        let sent = h.provider.requests();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].order_id, resp.order_id);
        assert_eq!(sent[0].amount_minor_units, 1900);
        assert!(sent[0].expires_at > chrono::Utc::now().timestamp());

        let order = h.orders.get_order(&resp.order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_unknown_food_creates_nothing() {
        let h = harness();
        let err = h
            .service
            .submit_checkout(
                ServiceType::DineIn,
                vec![CartLine::new("f1", 1), CartLine::new("ghost", 1)],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::UnknownFood(_)));
        assert_eq!(h.provider.calls(), 0);
        assert!(h.orders.storage().get_all_orders().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_cart_rejected_before_pricing() {
        let h = harness();
        let err = h
            .service
            .submit_checkout(ServiceType::DineIn, vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Manager(ManagerError::Validation(_))));
    }

    #[tokio::test]
    async fn test_provider_failure_keeps_order_pending_and_retry_succeeds() {
        let h = harness();
        h.provider.set_failing(true);
        let err = h
            .service
            .submit_checkout(ServiceType::Takeout, vec![CartLine::new("f2", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Provider { .. }));

        let orders = h.orders.storage().get_all_orders().unwrap();
        assert_eq!(orders.len(), 1);
        let order = &orders[0];
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(h.orders.get_checkout_session(&order.id).unwrap().is_none());

        h.provider.set_failing(false);
        let resp = h
            .service
            .create_checkout_session(&order.id, vec![CartLine::new("f2", 1)])
            .await
            .unwrap();
        assert_eq!(resp.order_id, order.id);
        assert_eq!(resp.amount_minor_units, 300);
    }

    #[tokio::test]
    async fn test_existing_order_with_removed_food_opens_no_session() {
        let h = harness();
        let lines = vec![CartLine::new("f1", 1), CartLine::new("f2", 2)];
        let order = h.orders.create_order(&lines, ServiceType::DineIn).unwrap();

        // f1 下架
        let fries = h.catalog.get("f2").unwrap();
        h.catalog.replace(vec![fries]).unwrap();

        let err = h
            .service
            .create_checkout_session(&order.id, lines)
            .await
            .unwrap_err();
        match err {
            CheckoutError::UnknownFood(ids) => assert_eq!(ids, vec!["f1".to_string()]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(h.provider.calls(), 0);
        assert!(h.orders.get_checkout_session(&order.id).unwrap().is_none());
        assert_eq!(h.orders.get_order(&order.id).unwrap(), order);
    }

    #[tokio::test]
    async fn test_repeat_checkout_returns_existing_session() {
        let h = harness();
        let first = h
            .service
            .submit_checkout(ServiceType::DineIn, vec![CartLine::new("f1", 1)])
            .await
            .unwrap();
        let second = h
            .service
            .create_checkout_session(&first.order_id, vec![CartLine::new("f1", 1)])
            .await
            .unwrap();
        assert_eq!(first, second);
        assert_eq!(h.provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_cart_mismatch_rejected() {
        let h = harness();
        let first = h
            .service
            .submit_checkout(ServiceType::DineIn, vec![CartLine::new("f1", 1)])
            .await
            .unwrap();
        let err = h
            .service
            .create_checkout_session(&first.order_id, vec![CartLine::new("f1", 5)])
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::CartMismatch(_)));
    }

    #[tokio::test]
    async fn test_checkout_for_paid_order_is_invalid_transition() {
        let h = harness();
        let resp = h
            .service
            .submit_checkout(ServiceType::DineIn, vec![CartLine::new("f1", 1)])
            .await
            .unwrap();
        h.service
            .confirm_payment(&resp.session_id, &resp.order_id)
            .await
            .unwrap();

        let err = h
            .service
            .create_checkout_session(&resp.order_id, vec![CartLine::new("f1", 1)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Manager(ManagerError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_checkout_for_same_order_conflicts() {
        let h = harness();
        h.provider.set_failing(true);
        let _ = h
            .service
            .submit_checkout(ServiceType::DineIn, vec![CartLine::new("f1", 1)])
            .await;
        let order_id = h.orders.storage().get_all_orders().unwrap()[0].id.clone();

        h.provider.set_failing(false);
        h.provider.set_delay(Some(Duration::from_millis(200)));

        let slow = {
            let service = h.service.clone();
            let order_id = order_id.clone();
            tokio::spawn(async move {
                service
                    .create_checkout_session(&order_id, vec![CartLine::new("f1", 1)])
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        let err = h
            .service
            .create_checkout_session(&order_id, vec![CartLine::new("f1", 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::InProgress(_)));

        assert!(slow.await.unwrap().is_ok());
        // guard released
        assert!(h
            .service
            .create_checkout_session(&order_id, vec![CartLine::new("f1", 1)])
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_webhook_confirms_once() {
        let h = harness();
        let resp = h
            .service
            .submit_checkout(ServiceType::DineIn, vec![CartLine::new("f1", 1)])
            .await
            .unwrap();

        let body = serde_json::json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": {"object": {"id": resp.session_id, "metadata": {"order_id": resp.order_id}}}
        })
        .to_string();
        let sig = webhook::sign_payload(body.as_bytes(), SECRET, chrono::Utc::now().timestamp())
            .unwrap();

        let first = h.service.handle_webhook(body.as_bytes(), &sig).await.unwrap();
        assert!(matches!(first, Some(PaymentOutcome::Applied(_))));
        let again = h.service.handle_webhook(body.as_bytes(), &sig).await.unwrap();
        assert!(matches!(again, Some(PaymentOutcome::AlreadyApplied(_))));

        assert_eq!(
            h.orders.get_order(&resp.order_id).unwrap().status,
            OrderStatus::Paid
        );
    }

    #[tokio::test]
    async fn test_expired_session_webhook_releases_order() {
        let h = harness();
        let resp = h
            .service
            .submit_checkout(ServiceType::DineIn, vec![CartLine::new("f1", 1)])
            .await
            .unwrap();

        let body = serde_json::json!({
            "id": "evt_9",
            "type": "checkout.session.expired",
            "data": {"object": {"id": resp.session_id, "metadata": {"order_id": resp.order_id}}}
        })
        .to_string();
        let sig = webhook::sign_payload(body.as_bytes(), SECRET, chrono::Utc::now().timestamp())
            .unwrap();

        let outcome = h.service.handle_webhook(body.as_bytes(), &sig).await.unwrap();
        assert!(outcome.is_none());
        assert!(h.orders.get_order(&resp.order_id).unwrap().is_abandoned());
        assert!(h.orders.storage().get_active_counters().unwrap().is_empty());

        // 过期订单不能再结账
        let err = h
            .service
            .create_checkout_session(&resp.order_id, vec![CartLine::new("f1", 1)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CheckoutError::Manager(ManagerError::OrderAbandoned(_))
        ));
        assert_eq!(h.provider.calls(), 1);
    }

    #[tokio::test]
    async fn test_webhook_bad_signature() {
        let h = harness();
        let err = h
            .service
            .handle_webhook(b"{}", "t=1,v1=00")
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Webhook(_)));
    }
}
