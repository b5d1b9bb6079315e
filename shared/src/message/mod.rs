//! 订单通知类型
//!
//! Notifications are cues: a dashboard receiving one re-fetches the order
//! from the server. Payload fields only help the subscriber filter and
//! highlight, they are never authoritative.

use crate::order::{Order, OrderItemStatus, OrderStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderEventKind {
    OrderCreated,
    OrderUpdated,
}

impl fmt::Display for OrderEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OrderCreated => f.write_str("ORDER_CREATED"),
            Self::OrderUpdated => f.write_str("ORDER_UPDATED"),
        }
    }
}

/// What an `ORDER_UPDATED` touched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationScope {
    Order,
    Item,
}

/// 订单变更通知（仅作为刷新提示）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderNotification {
    pub event: OrderEventKind,
    pub order_id: String,
    pub counter: u16,
    pub scope: NotificationScope,
    /// New order status for order-level changes and creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_status: Option<OrderStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_status: Option<OrderItemStatus>,
    pub timestamp: i64,
}

impl OrderNotification {
    pub fn created(order: &Order) -> Self {
        Self {
            event: OrderEventKind::OrderCreated,
            order_id: order.id.clone(),
            counter: order.counter,
            scope: NotificationScope::Order,
            order_status: Some(order.status),
            item_id: None,
            item_status: None,
            timestamp: order.created_at,
        }
    }

    pub fn order_updated(order: &Order) -> Self {
        Self {
            event: OrderEventKind::OrderUpdated,
            order_id: order.id.clone(),
            counter: order.counter,
            scope: NotificationScope::Order,
            order_status: Some(order.status),
            item_id: None,
            item_status: None,
            timestamp: order.updated_at,
        }
    }

    pub fn item_updated(order: &Order, item_id: &str, status: OrderItemStatus) -> Self {
        Self {
            event: OrderEventKind::OrderUpdated,
            order_id: order.id.clone(),
            counter: order.counter,
            scope: NotificationScope::Item,
            order_status: None,
            item_id: Some(item_id.to_string()),
            item_status: Some(status),
            timestamp: order.updated_at,
        }
    }
}

/// Kind of staff dashboard subscribed to the notification stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DashboardKind {
    /// Kitchen view
    Cook,
    /// Front-of-house view
    Server,
    /// Customer-facing counter board
    StatusBoard,
}

impl DashboardKind {
    /// Subscriber filter
    ///
    /// The kitchen only cares about new orders, item progress and payment
    /// (a paid order is one it may start cooking).
    pub fn accepts(&self, n: &OrderNotification) -> bool {
        match self {
            Self::Cook => match (n.event, n.scope) {
                (OrderEventKind::OrderCreated, _) => true,
                (OrderEventKind::OrderUpdated, NotificationScope::Item) => true,
                (OrderEventKind::OrderUpdated, NotificationScope::Order) => {
                    n.order_status == Some(OrderStatus::Paid)
                }
            },
            Self::Server | Self::StatusBoard => true,
        }
    }

    /// Whether the dashboard should play its new-order sound
    pub fn wants_alert(&self, n: &OrderNotification) -> bool {
        n.event == OrderEventKind::OrderCreated && matches!(self, Self::Cook | Self::Server)
    }

    /// Path segment used by the stream endpoint
    pub const fn as_path(&self) -> &'static str {
        match self {
            Self::Cook => "cook",
            Self::Server => "server",
            Self::StatusBoard => "status-board",
        }
    }
}

impl fmt::Display for DashboardKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_path())
    }
}

impl FromStr for DashboardKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cook" => Ok(Self::Cook),
            "server" => Ok(Self::Server),
            "status-board" | "status_board" => Ok(Self::StatusBoard),
            other => Err(format!("unknown dashboard kind: {other}")),
        }
    }
}

/// 推送给看板的消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardCue {
    pub event: OrderEventKind,
    pub order_id: String,
    pub counter: u16,
    pub alert: bool,
}

impl DashboardCue {
    pub fn for_dashboard(kind: DashboardKind, n: &OrderNotification) -> Self {
        Self {
            event: n.event,
            order_id: n.order_id.clone(),
            counter: n.counter,
            alert: kind.wants_alert(n),
        }
    }
}
