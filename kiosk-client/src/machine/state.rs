//! Kiosk states, events and session context

use serde::{Deserialize, Serialize};
use shared::order::{CartLine, ServiceType};
use std::fmt;

/// 自助点餐流程的界面阶段
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "state", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum KioskState {
    #[default]
    Welcome,
    ModeSelection,
    CategorySelection,
    SubCategorySelection,
    FoodSelection,
    /// Cart review
    Ordering,
    /// Waiting for the payment provider
    Payment,
    Confirmation {
        order_id: String,
        counter: u16,
    },
    Cancelled,
}

impl KioskState {
    pub const fn name(&self) -> &'static str {
        match self {
            KioskState::Welcome => "welcome",
            KioskState::ModeSelection => "modeSelection",
            KioskState::CategorySelection => "categorySelection",
            KioskState::SubCategorySelection => "subCategorySelection",
            KioskState::FoodSelection => "foodSelection",
            KioskState::Ordering => "ordering",
            KioskState::Payment => "payment",
            KioskState::Confirmation { .. } => "confirmation",
            KioskState::Cancelled => "cancelled",
        }
    }

    /// `confirmation` and `cancelled` end the session
    pub const fn is_terminal(&self) -> bool {
        matches!(self, KioskState::Confirmation { .. } | KioskState::Cancelled)
    }
}

impl fmt::Display for KioskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 顾客操作
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum KioskEvent {
    StartOrder,
    SelectMode { mode: ServiceType },
    SelectCategory { category_id: String },
    SelectSubCategory { sub_category_id: String },
    /// Adds one unit of the food to the cart
    SelectFood { food_id: String },
    Back,
    Checkout,
    /// 0 removes the line
    SetQuantity { food_id: String, quantity: i32 },
    RemoveFromCart { food_id: String },
    /// Leave cart review to pick more food
    AddMore,
    PaymentSucceeded { order_id: String, counter: u16 },
    PaymentFailed,
    Cancel,
}

impl KioskEvent {
    pub const fn name(&self) -> &'static str {
        match self {
            KioskEvent::StartOrder => "START_ORDER",
            KioskEvent::SelectMode { .. } => "SELECT_MODE",
            KioskEvent::SelectCategory { .. } => "SELECT_CATEGORY",
            KioskEvent::SelectSubCategory { .. } => "SELECT_SUB_CATEGORY",
            KioskEvent::SelectFood { .. } => "SELECT_FOOD",
            KioskEvent::Back => "BACK",
            KioskEvent::Checkout => "CHECKOUT",
            KioskEvent::SetQuantity { .. } => "SET_QUANTITY",
            KioskEvent::RemoveFromCart { .. } => "REMOVE_FROM_CART",
            KioskEvent::AddMore => "ADD_MORE",
            KioskEvent::PaymentSucceeded { .. } => "PAYMENT_SUCCEEDED",
            KioskEvent::PaymentFailed => "PAYMENT_FAILED",
            KioskEvent::Cancel => "CANCEL",
        }
    }
}

/// Session context, only changed by transitions
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KioskContext {
    pub mode: Option<ServiceType>,
    pub current_category_id: Option<String>,
    pub current_sub_category_id: Option<String>,
    pub cart: Vec<CartLine>,
}

impl KioskContext {
    pub fn cart_quantity(&self, food_id: &str) -> i32 {
        self.cart
            .iter()
            .find(|l| l.food_id == food_id)
            .map_or(0, |l| l.quantity)
    }

    pub fn item_count(&self) -> i32 {
        self.cart.iter().map(|l| l.quantity).sum()
    }
}

/// Full machine value: current state, context and the `BACK` stack
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KioskSnapshot {
    pub state: KioskState,
    pub context: KioskContext,
    /// States left by forward transitions, most recent last
    pub history: Vec<KioskState>,
}
