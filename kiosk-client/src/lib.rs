//! Kiosk Client - customer-side ordering flow
//!
//! - [`machine`]: the ordering state machine (pure reducer + session)
//! - [`KioskClient`]: HTTP calls to the order server (catalog, checkout)

pub mod config;
pub mod error;
pub mod http;
pub mod machine;

pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use http::KioskClient;
pub use machine::{KioskContext, KioskEvent, KioskSession, KioskState, MachineError};

// Re-export shared types for convenience
pub use shared::error::{ApiResponse, AppError, ErrorCode};
pub use shared::order::{CartLine, CheckoutResponse, ServiceType};
