//! Order Server - 自助点餐订单核心服务
//!
//! # 架构概述
//!
//! - **订单** (`orders`): redb 存储、取餐号分配、订单/菜品状态机
//! - **结账** (`checkout`): 按目录价格计算金额、开启支付会话、处理支付回调
//! - **通知** (`message`): 订单事件推送到后厨、服务员和取餐号看板
//! - **目录** (`catalog`): 只读菜品价格查询
//! - **HTTP API** (`api`): REST + WebSocket 接口
//!
//! # 模块结构
//!
//! ```text
//! order-server/src/
//! ├── core/          # 配置、状态、服务器、后台任务
//! ├── auth/          # 员工令牌中间件
//! ├── api/           # HTTP 路由和处理器
//! ├── catalog/       # 菜品目录
//! ├── checkout/      # 计价、支付服务、webhook
//! ├── message/       # 通知总线
//! ├── orders/        # 订单存储与状态机
//! └── utils/         # 日志、错误类型
//! ```

pub mod api;
pub mod auth;
pub mod catalog;
pub mod checkout;
pub mod core;
pub mod message;
pub mod orders;
pub mod utils;

// Re-export 公共类型
pub use catalog::{CatalogReader, InMemoryCatalog};
pub use checkout::{CheckoutService, MockPaymentProvider, PaymentProvider};
pub use core::{Config, Server, ServerState};
pub use message::{EventPublisher, NotificationBus, RecordingPublisher};
pub use orders::{OrderStorage, OrdersManager};
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

pub use utils::logger::{init_logger, init_logger_with_file};

/// 加载 .env 并初始化日志
pub fn setup_environment() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    let json = std::env::var("ENVIRONMENT").is_ok_and(|e| e == "production");
    init_logger_with_file(level.as_deref(), json, log_dir.as_deref())
}

pub fn print_banner() {
    println!(
        r#"
   ____          __
  / __ \_________/ /__  _____
 / / / / ___/ __  / _ \/ ___/
/ /_/ / /  / /_/ /  __/ /
\____/_/   \__,_/\___/_/
    "#
    );
}
