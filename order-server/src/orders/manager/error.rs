use super::super::storage::StorageError;
use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Manager errors
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("{0}")]
    Validation(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Item not found: {item_id} in order {order_id}")]
    ItemNotFound { order_id: String, item_id: String },

    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Checkout session not found: {0}")]
    CheckoutSessionNotFound(String),

    #[error("Order {0} was abandoned before payment")]
    OrderAbandoned(String),
}

impl ManagerError {
    pub(crate) fn invalid_transition(from: impl ToString, to: impl ToString) -> Self {
        Self::InvalidTransition {
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// Transient storage failure worth one more attempt
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ManagerError::Storage(
                StorageError::Database(_)
                    | StorageError::Transaction(_)
                    | StorageError::Table(_)
                    | StorageError::Storage(_)
                    | StorageError::Commit(_)
            )
        )
    }
}

/// 将存储错误转换为错误码
fn classify_storage_error(e: &StorageError) -> ErrorCode {
    match e {
        StorageError::CountersExhausted(_) => return ErrorCode::CounterExhausted,
        StorageError::Serialization(_) => return ErrorCode::StorageCorrupted,
        _ => {}
    }

    // redb 错误通过字符串匹配分类
    let err_str = e.to_string().to_lowercase();
    if err_str.contains("corrupt") || err_str.contains("invalid database") {
        return ErrorCode::StorageCorrupted;
    }
    if err_str.contains("no space") || err_str.contains("disk full") || err_str.contains("enospc")
    {
        return ErrorCode::DatabaseError;
    }

    // 默认：系统繁忙
    ErrorCode::SystemBusy
}

impl From<ManagerError> for AppError {
    fn from(err: ManagerError) -> Self {
        match err {
            ManagerError::Storage(e) => {
                let code = classify_storage_error(&e);
                tracing::error!(error = %e, error_code = %code, "Storage error occurred");
                AppError::with_message(code, e.to_string())
            }
            ManagerError::Validation(msg) => AppError::validation(msg),
            ManagerError::OrderNotFound(id) => {
                AppError::with_message(ErrorCode::OrderNotFound, format!("Order not found: {id}"))
                    .with_detail("order_id", id)
            }
            ManagerError::ItemNotFound { order_id, item_id } => AppError::with_message(
                ErrorCode::OrderItemNotFound,
                format!("Item {item_id} not found in order {order_id}"),
            )
            .with_detail("order_id", order_id)
            .with_detail("item_id", item_id),
            ManagerError::InvalidTransition { from, to } => AppError::invalid_transition(from, to),
            ManagerError::CheckoutSessionNotFound(id) => AppError::with_message(
                ErrorCode::CheckoutSessionNotFound,
                format!("Checkout session not found: {id}"),
            ),
            ManagerError::OrderAbandoned(id) => AppError::with_message(
                ErrorCode::OrderAbandoned,
                format!("Order {id} was abandoned before payment"),
            )
            .with_detail("order_id", id),
        }
    }
}

pub type ManagerResult<T> = Result<T, ManagerError>;
