use super::error::{Result, ServerError};
use crate::checkout::CHECKOUT_SESSION_LIFETIME;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// 服务器配置 - 点餐核心服务的所有配置项
///
/// # 环境变量
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./data | 工作目录 (redb 数据库) |
/// | HTTP_PORT | 3000 | HTTP 服务端口 |
/// | ENVIRONMENT | development | 运行环境 |
/// | CATALOG_PATH | {WORK_DIR}/catalog.json | 菜品目录 JSON 文件 |
/// | CURRENCY | eur | 支付币种 |
/// | STRIPE_SECRET_KEY | (无) | 未设置时开发环境使用离线支付 |
/// | STRIPE_WEBHOOK_SECRET | dev 占位值 | Webhook 签名密钥 |
/// | CHECKOUT_SUCCESS_URL | http://localhost:5173/checkout/success | 支付成功跳转 |
/// | CHECKOUT_CANCEL_URL | http://localhost:5173/checkout/cancel | 支付取消跳转 |
/// | STAFF_TOKEN | (无) | 员工操作令牌，未设置时开发环境不校验 |
/// | SUBSCRIBER_BUFFER | 64 | 每个看板订阅的通道容量 |
/// | PENDING_ORDER_TTL_MS | 3600000 | 未支付订单无结账活动多久后释放计数器 |
/// | REQUEST_TIMEOUT_MS | 30000 | 请求超时(毫秒) |
/// | SHUTDOWN_TIMEOUT_MS | 10000 | 关闭超时(毫秒) |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_DIR | (无) | 日志目录，存在时写入按天滚动的文件 |
///
/// 非 development 环境下密钥必须显式设置。
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/kiosk HTTP_PORT=8080 cargo run -p order-server
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库文件
    pub work_dir: String,
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 运行环境: development | staging | production
    pub environment: String,
    /// 菜品目录文件，未设置时为 {work_dir}/catalog.json
    pub catalog_path: Option<String>,
    pub currency: String,
    /// None = 离线支付 (仅开发环境)
    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: String,
    pub checkout_success_url: String,
    pub checkout_cancel_url: String,
    /// None = 员工接口不校验令牌
    pub staff_token: Option<String>,
    pub subscriber_buffer: usize,
    /// 未支付订单保留时间 (毫秒)，须长于支付会话有效期
    pub pending_order_ttl_ms: u64,
    /// 请求超时时间 (毫秒)
    pub request_timeout_ms: u64,
    /// 关闭超时时间 (毫秒)
    pub shutdown_timeout_ms: u64,
    pub log_level: String,
    pub log_dir: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            work_dir: "./data".into(),
            http_port: 3000,
            environment: "development".into(),
            catalog_path: None,
            currency: "eur".into(),
            stripe_secret_key: None,
            stripe_webhook_secret: dev_secret("STRIPE_WEBHOOK_SECRET"),
            checkout_success_url: "http://localhost:5173/checkout/success".into(),
            checkout_cancel_url: "http://localhost:5173/checkout/cancel".into(),
            staff_token: None,
            subscriber_buffer: 64,
            pending_order_ttl_ms: 3_600_000,
            request_timeout_ms: 30000,
            shutdown_timeout_ms: 10000,
            log_level: "info".into(),
            log_dir: None,
        }
    }
}

fn dev_secret(name: &str) -> String {
    format!("dev-{name}-not-for-production")
}

fn env_opt(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 非 development 环境必须提供密钥，开发环境使用占位值
fn require_secret(name: &str, value: Option<String>, environment: &str) -> Result<String> {
    match value {
        Some(v) if !v.is_empty() => Ok(v),
        _ if environment == "development" => Ok(dev_secret(name)),
        _ => Err(ServerError::Config(format!(
            "{name} must be set in {environment} environment"
        ))),
    }
}

/// 开发环境允许缺省 (返回 None)，其他环境必须设置
fn optional_in_development(
    name: &str,
    value: Option<String>,
    environment: &str,
) -> Result<Option<String>> {
    match value {
        Some(v) => Ok(Some(v)),
        None if environment == "development" => Ok(None),
        None => Err(ServerError::Config(format!(
            "{name} must be set in {environment} environment"
        ))),
    }
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let environment = env_opt("ENVIRONMENT").unwrap_or(defaults.environment);

        let config = Self {
            work_dir: env_opt("WORK_DIR").unwrap_or(defaults.work_dir),
            http_port: env_parse("HTTP_PORT", defaults.http_port),
            catalog_path: env_opt("CATALOG_PATH"),
            currency: env_opt("CURRENCY")
                .map(|c| c.to_lowercase())
                .unwrap_or(defaults.currency),
            stripe_secret_key: optional_in_development(
                "STRIPE_SECRET_KEY",
                env_opt("STRIPE_SECRET_KEY"),
                &environment,
            )?,
            stripe_webhook_secret: require_secret(
                "STRIPE_WEBHOOK_SECRET",
                env_opt("STRIPE_WEBHOOK_SECRET"),
                &environment,
            )?,
            checkout_success_url: env_opt("CHECKOUT_SUCCESS_URL")
                .unwrap_or(defaults.checkout_success_url),
            checkout_cancel_url: env_opt("CHECKOUT_CANCEL_URL")
                .unwrap_or(defaults.checkout_cancel_url),
            staff_token: optional_in_development("STAFF_TOKEN", env_opt("STAFF_TOKEN"), &environment)?,
            subscriber_buffer: env_parse("SUBSCRIBER_BUFFER", defaults.subscriber_buffer),
            pending_order_ttl_ms: env_parse("PENDING_ORDER_TTL_MS", defaults.pending_order_ttl_ms),
            request_timeout_ms: env_parse("REQUEST_TIMEOUT_MS", defaults.request_timeout_ms),
            shutdown_timeout_ms: env_parse("SHUTDOWN_TIMEOUT_MS", defaults.shutdown_timeout_ms),
            log_level: env_opt("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_dir: env_opt("LOG_DIR"),
            environment,
        };
        config.validate()?;
        Ok(config)
    }

    /// 使用自定义值覆盖部分配置
    ///
    /// 常用于测试场景，不读取环境变量
    pub fn with_overrides(work_dir: impl Into<String>, http_port: u16) -> Self {
        Self {
            work_dir: work_dir.into(),
            http_port,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.subscriber_buffer == 0 {
            return Err(ServerError::Config("SUBSCRIBER_BUFFER must be > 0".into()));
        }
        if self.pending_order_ttl() <= CHECKOUT_SESSION_LIFETIME {
            return Err(ServerError::Config(format!(
                "PENDING_ORDER_TTL_MS must exceed the payment session lifetime ({}s)",
                CHECKOUT_SESSION_LIFETIME.as_secs()
            )));
        }
        if self.currency.len() != 3 {
            return Err(ServerError::Config(format!(
                "CURRENCY must be an ISO 4217 code, got {}",
                self.currency
            )));
        }
        Ok(())
    }

    /// redb 数据库文件
    pub fn db_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("orders.redb")
    }

    pub fn catalog_path(&self) -> PathBuf {
        match &self.catalog_path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(&self.work_dir).join("catalog.json"),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn pending_order_ttl(&self) -> Duration {
        Duration::from_millis(self.pending_order_ttl_ms)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_required_outside_development() {
        assert!(require_secret("X", None, "production").is_err());
        assert!(require_secret("X", Some(String::new()), "staging").is_err());
        assert_eq!(
            require_secret("X", Some("s".into()), "production").unwrap(),
            "s"
        );
        assert_eq!(
            require_secret("X", None, "development").unwrap(),
            "dev-X-not-for-production"
        );
    }

    #[test]
    fn test_optional_in_development() {
        assert_eq!(
            optional_in_development("STAFF_TOKEN", None, "development").unwrap(),
            None
        );
        assert!(optional_in_development("STAFF_TOKEN", None, "production").is_err());
    }

    #[test]
    fn test_paths_and_overrides() {
        let config = Config::with_overrides("/tmp/kiosk", 0);
        assert_eq!(config.db_path(), PathBuf::from("/tmp/kiosk/orders.redb"));
        assert_eq!(config.catalog_path(), PathBuf::from("/tmp/kiosk/catalog.json"));
        assert!(config.is_development());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pending_ttl_must_outlive_payment_session() {
        let config = Config {
            pending_order_ttl_ms: 10 * 60 * 1000,
            ..Config::default()
        };
        assert!(config.validate().is_err());
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_buffer() {
        let config = Config {
            subscriber_buffer: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
