//! Unified error system
//!
//! - [`ErrorCode`]: numeric error codes grouped by range
//! - [`ErrorCategory`]: classification of codes by domain
//! - [`AppError`]: code + message + optional structured details
//! - [`ApiResponse`]: the response envelope used by every endpoint
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Catalog errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCode, ApiResponse};
//!
//! let err = AppError::with_message(ErrorCode::InvalidTransition, "PAID -> PENDING")
//!     .with_detail("order_id", "o-1");
//! let response = ApiResponse::<()>::error(&err);
//! assert_eq!(response.code, Some(4010));
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::{ApiResponse, AppError, AppResult};
