use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::catalog::InMemoryCatalog;
use crate::checkout::{
    CheckoutService, CheckoutSettings, OfflinePaymentProvider, PaymentProvider, StripeProvider,
};
use crate::core::tasks::{BackgroundTasks, TaskKind};
use crate::core::{Config, Result};
use crate::message::{NotificationBus, run_notification_logger};
use crate::orders::{OrderStorage, OrdersManager};
use shared::util::now_millis;

/// 存储统计日志间隔
const STATS_INTERVAL: Duration = Duration::from_secs(300);

/// 未支付订单清理间隔
const PENDING_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// 服务器状态 - 持有所有服务的共享引用
///
/// 使用 Arc 实现浅拷贝，axum handler 通过 `State<ServerState>` 获取。
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | orders | Arc<OrdersManager> | 订单存储与状态机 |
/// | bus | NotificationBus | 看板通知总线 |
/// | catalog | Arc<InMemoryCatalog> | 菜品目录 |
/// | checkout | Arc<CheckoutService> | 结账与支付 |
/// | shutdown | CancellationToken | 全局关闭信号 |
#[derive(Clone, Debug)]
pub struct ServerState {
    pub config: Config,
    pub orders: Arc<OrdersManager>,
    pub bus: NotificationBus,
    pub catalog: Arc<InMemoryCatalog>,
    pub checkout: Arc<CheckoutService>,
    pub shutdown: CancellationToken,
    tasks: Arc<Mutex<BackgroundTasks>>,
}

impl ServerState {
    /// 由已构造的组件组装状态
    ///
    /// 测试使用内存存储和 mock 支付时直接调用。
    pub fn build(
        config: Config,
        storage: OrderStorage,
        catalog: InMemoryCatalog,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        let bus = NotificationBus::new(config.subscriber_buffer);
        let orders = Arc::new(OrdersManager::with_storage(storage, Arc::new(bus.clone())));
        let catalog = Arc::new(catalog);

        let settings = CheckoutSettings {
            currency: config.currency.clone(),
            success_url: config.checkout_success_url.clone(),
            cancel_url: config.checkout_cancel_url.clone(),
            webhook_secret: config.stripe_webhook_secret.clone(),
            provider_timeout: config.request_timeout(),
        };
        let checkout = Arc::new(CheckoutService::new(
            orders.clone(),
            catalog.clone(),
            provider,
            settings,
        ));

        let shutdown = CancellationToken::new();
        let tasks = BackgroundTasks::with_token(shutdown.clone());

        Self {
            config,
            orders,
            bus,
            catalog,
            checkout,
            shutdown,
            tasks: Arc::new(Mutex::new(tasks)),
        }
    }

    /// 初始化服务器状态
    ///
    /// 按顺序初始化：
    /// 1. 工作目录
    /// 2. 订单数据库 (work_dir/orders.redb)
    /// 3. 菜品目录 (开发环境缺失时为空目录)
    /// 4. 支付服务 (未配置 Stripe 时使用离线支付)
    pub async fn initialize(config: &Config) -> Result<Self> {
        std::fs::create_dir_all(&config.work_dir)?;

        let storage = OrderStorage::open(config.db_path()).map_err(crate::orders::ManagerError::from)?;
        let catalog = Self::load_catalog(config)?;

        let provider: Arc<dyn PaymentProvider> = match &config.stripe_secret_key {
            Some(key) => Arc::new(StripeProvider::new(key.clone(), config.request_timeout())?),
            None => {
                tracing::warn!("STRIPE_SECRET_KEY not set, using offline payment provider");
                Arc::new(OfflinePaymentProvider)
            }
        };

        let state = Self::build(config.clone(), storage, catalog, provider);
        tracing::info!(
            db = %config.db_path().display(),
            foods = state.catalog.len(),
            provider = state.checkout.provider_name(),
            epoch = %state.orders.epoch(),
            "Server state initialized"
        );
        Ok(state)
    }

    fn load_catalog(config: &Config) -> Result<InMemoryCatalog> {
        let path = config.catalog_path();
        if !path.exists() && config.is_development() {
            tracing::warn!(path = %path.display(), "Catalog file not found, starting with an empty catalog");
            return Ok(InMemoryCatalog::new());
        }
        Ok(InMemoryCatalog::load(path)?)
    }

    /// 启动后台任务
    ///
    /// - notification_logger: 结构化记录每条订单通知
    /// - storage_stats: 定时输出存储统计
    /// - pending_order_sweep: 释放超时未支付订单的计数器
    pub fn start_background_tasks(&self) {
        let mut tasks = self.tasks.lock();

        let rx = self.bus.listen();
        let token = self.shutdown.clone();
        tasks.spawn("notification_logger", TaskKind::Listener, async move {
            run_notification_logger(rx, token).await;
        });

        let orders = self.orders.clone();
        let bus = self.bus.clone();
        tasks.spawn_periodic("storage_stats", STATS_INTERVAL, move || {
            match orders.storage().get_stats() {
                Ok(stats) => tracing::info!(
                    orders = stats.order_count,
                    active_counters = stats.active_counter_count,
                    checkout_sessions = stats.checkout_session_count,
                    subscribers = bus.subscriber_count(),
                    "Storage stats"
                ),
                Err(e) => tracing::warn!(error = %e, "Failed to read storage stats"),
            }
        });

        let orders = self.orders.clone();
        let ttl = i64::try_from(self.config.pending_order_ttl().as_millis()).unwrap_or(i64::MAX);
        tasks.spawn_periodic("pending_order_sweep", PENDING_SWEEP_INTERVAL, move || {
            let cutoff = now_millis().saturating_sub(ttl);
            match orders.abandon_stale_orders(cutoff) {
                Ok(released) if !released.is_empty() => {
                    tracing::info!(released = released.len(), "Stale unpaid orders released")
                }
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "Pending order sweep failed"),
            }
        });

        tasks.log_summary();
    }

    /// 关闭：取消后台任务，断开所有看板订阅
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        self.bus.close_all();
        let tasks = std::mem::take(&mut *self.tasks.lock());
        tasks.shutdown(self.config.shutdown_timeout()).await;
    }
}
