//! Order model
//!
//! - [`types`]: order / item statuses and their transition rules
//! - [`model`]: the stored order, its items and read-side projections
//! - [`checkout`]: request/response payloads for checkout and staff actions

pub mod checkout;
pub mod model;
pub mod types;

// Re-exports
pub use checkout::{
    CheckoutRequest, CheckoutResponse, OrderCheckoutRequest, UpdateItemStatusRequest,
    UpdateOrderStatusRequest,
};
pub use model::{
    AggregateCounters, BoardBucket, CartLine, MAX_LINE_QUANTITY, Order, OrderItem, OrderView,
    merge_lines,
};
pub use types::{OrderItemStatus, OrderStatus, ServiceType};
