//! Order lifecycle module
//!
//! - **manager**: OrdersManager, the single writer for order and item status
//! - **storage**: redb persistence for orders, ticket counters and checkout sessions
//!
//! # Architecture
//!
//! ```text
//! HTTP handler → OrdersManager → Storage (redb, one write txn per mutation)
//!                      ↓
//!               EventPublisher → NotificationBus → dashboards
//! ```

pub mod manager;
pub mod storage;

// Re-exports
pub use manager::{ManagerError, ManagerResult, OrdersManager, PaymentOutcome};
pub use storage::{CheckoutSession, OrderStorage, StorageError, StorageStats};
