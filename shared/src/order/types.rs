//! Status enums and the transition rules attached to them

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Service Type
// ============================================================================

/// 服务类型（自助点餐机上选择）
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceType {
    /// 堂食
    #[default]
    DineIn,
    /// 外卖/打包
    Takeout,
}

// ============================================================================
// Order Status
// ============================================================================

/// 订单状态
///
/// Strictly monotonic: `PENDING -> PAID -> COMPLETED`. No skipping, no reverse.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Created at checkout, waiting for payment confirmation
    #[default]
    Pending,
    /// Payment confirmed by the provider
    Paid,
    /// Handed over to the customer
    Completed,
}

impl OrderStatus {
    /// The only status this one may move to
    pub const fn successor(self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Paid),
            Self::Paid => Some(Self::Completed),
            Self::Completed => None,
        }
    }

    pub fn can_transition_to(self, next: Self) -> bool {
        self.successor() == Some(next)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Completed => "COMPLETED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Order Item Status
// ============================================================================

/// 菜品制作状态
///
/// `PENDING -> IN_PROGRESS -> COMPLETED`, and `PENDING | IN_PROGRESS -> CANCELLED`.
/// `COMPLETED` and `CANCELLED` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderItemStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl OrderItemStatus {
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress)
                | (Self::InProgress, Self::Completed)
                | (Self::Pending, Self::Cancelled)
                | (Self::InProgress, Self::Cancelled)
        )
    }

    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Still waiting on the kitchen
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::InProgress => "IN_PROGRESS",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
