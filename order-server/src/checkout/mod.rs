//! Checkout Pricing & Session Issuer
//!
//! ```text
//! kiosk cart ─→ price_cart (catalog prices only)
//!                  ├─ unknown food → Validation, nothing stored
//!                  └─ OrdersManager::create_order (PENDING, ORDER_CREATED)
//!                        └─ PaymentProvider::create_session (metadata: order_id)
//!                              └─ record_checkout_session
//!
//! provider webhook ─→ verify signature → confirm_payment → PENDING → PAID
//!                                      └─ session expired → abandon_order
//! ```

pub mod pricing;
pub mod provider;
pub mod service;
pub mod webhook;

pub use pricing::{PricedCart, PricedLine, price_cart};
pub use provider::{
    MockPaymentProvider, OfflinePaymentProvider, PaymentProvider, ProviderError, ProviderSession,
    SessionRequest, StripeProvider,
};
pub use service::{CheckoutService, CheckoutSettings};
pub use webhook::{PaymentEvent, WebhookError};

use crate::orders::ManagerError;
use shared::error::{AppError, ErrorCode};
use std::time::Duration;
use thiserror::Error;

/// Lifetime of one provider payment session (Stripe's minimum)
///
/// Unpaid orders are only swept after this has passed.
pub const CHECKOUT_SESSION_LIFETIME: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error("{0}")]
    Validation(String),

    #[error("Unknown food: {}", .0.join(", "))]
    UnknownFood(Vec<String>),

    #[error("Cart does not match order {0}")]
    CartMismatch(String),

    #[error("Checkout already in progress for order {0}")]
    InProgress(String),

    #[error("Payment provider failed for order {order_id}: {source}")]
    Provider {
        order_id: String,
        #[source]
        source: ProviderError,
    },

    #[error(transparent)]
    Webhook(#[from] WebhookError),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type CheckoutResult<T> = Result<T, CheckoutError>;

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Manager(e) => e.into(),
            CheckoutError::Validation(msg) => AppError::validation(msg),
            CheckoutError::UnknownFood(ids) => AppError::with_message(
                ErrorCode::FoodNotFound,
                format!("Unknown food: {}", ids.join(", ")),
            )
            .with_detail("food_ids", ids),
            CheckoutError::CartMismatch(order_id) => AppError::with_message(
                ErrorCode::CartMismatch,
                format!("Items do not match order {order_id}"),
            )
            .with_detail("order_id", order_id),
            CheckoutError::InProgress(order_id) => AppError::with_message(
                ErrorCode::CheckoutInProgress,
                format!("Checkout already in progress for order {order_id}"),
            )
            .with_detail("order_id", order_id),
            // 订单已创建，kiosk 凭 order_id 重试
            CheckoutError::Provider { order_id, source } => {
                AppError::payment_provider(source.to_string()).with_detail("order_id", order_id)
            }
            CheckoutError::Webhook(e) => {
                AppError::with_message(ErrorCode::WebhookSignatureInvalid, e.to_string())
            }
            CheckoutError::Internal(msg) => AppError::internal(msg),
        }
    }
}
