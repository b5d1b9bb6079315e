//! 订单通知总线
//!
//! ```text
//! OrdersManager ──publish()──▶ NotificationBus
//!                                 ├── broadcast ──▶ in-process listeners (logging)
//!                                 ├── mpsc ──▶ COOK dashboard        (filtered)
//!                                 ├── mpsc ──▶ SERVER dashboard      (all)
//!                                 └── mpsc ──▶ STATUS_BOARD          (all)
//! ```
//!
//! Delivery is at-most-once with no replay. A dashboard that misses a cue
//! re-fetches on reconnect.

pub mod bus;
pub mod listener;

pub use bus::{EventPublisher, NotificationBus, RecordingPublisher, Subscription};
pub use listener::run_notification_logger;
pub use shared::message::{DashboardCue, DashboardKind, OrderEventKind, OrderNotification};
