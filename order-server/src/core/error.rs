use crate::catalog::CatalogError;
use crate::checkout::ProviderError;
use crate::orders::ManagerError;
use thiserror::Error;

/// 启动与运行期错误 (HTTP 层之外)
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("配置错误: {0}")]
    Config(String),

    #[error("存储初始化失败: {0}")]
    Storage(#[from] ManagerError),

    #[error("菜品目录加载失败: {0}")]
    Catalog(#[from] CatalogError),

    #[error("支付服务初始化失败: {0}")]
    Provider(#[from] ProviderError),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("内部服务器错误")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
