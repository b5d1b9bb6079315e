//! Shared types for the kiosk ordering platform
//!
//! Wire types used by both `order-server` and `kiosk-client`: the error
//! system, the order model and its status rules, dashboard notifications,
//! checkout payloads and the food catalog entries.

pub mod error;
pub mod message;
pub mod models;
pub mod order;
pub mod util;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use message::{DashboardKind, NotificationScope, OrderEventKind, OrderNotification};
