//! Checkout and staff action payloads

use super::model::CartLine;
use super::types::{OrderItemStatus, OrderStatus, ServiceType};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Kiosk checkout: creates the order and its payment session in one call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub mode: ServiceType,
    pub items: Vec<CartLine>,
}

/// Checkout retry for an existing `PENDING` order
///
/// `items` must match what the order was created with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCheckoutRequest {
    pub items: Vec<CartLine>,
}

/// Payment session handed back to the kiosk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub order_id: String,
    pub counter: u16,
    pub session_id: String,
    /// Where the kiosk sends the customer to pay
    pub redirect_url: String,
    /// Server-computed total, never taken from the client
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub amount_minor_units: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateItemStatusRequest {
    pub status: OrderItemStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkout_request_defaults_to_dine_in() {
        let req: CheckoutRequest =
            serde_json::from_str(r#"{"items":[{"foodId":"f1","quantity":2}]}"#).unwrap();
        assert_eq!(req.mode, ServiceType::DineIn);
        assert_eq!(req.items, vec![CartLine::new("f1", 2)]);
    }

    #[test]
    fn checkout_response_total_is_a_number() {
        let resp = CheckoutResponse {
            order_id: "o-1".into(),
            counter: 12,
            session_id: "cs_1".into(),
            redirect_url: "https://pay.example/cs_1".into(),
            total: Decimal::new(1900, 2),
            amount_minor_units: 1900,
            currency: "eur".into(),
        };
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["total"], serde_json::json!(19.0));
        assert_eq!(json["amountMinorUnits"], 1900);

        let back: CheckoutResponse = serde_json::from_value(json).unwrap();
        assert_eq!(back.total, Decimal::new(19, 0));
    }
}
