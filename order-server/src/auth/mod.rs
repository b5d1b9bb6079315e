//! 员工操作鉴权
//!
//! 订单状态变更需要 `Authorization: Bearer <STAFF_TOKEN>`。
//! 读取接口、看板订阅、自助点餐结账和支付回调是公开的。

pub mod middleware;

pub use middleware::{is_public_route, require_staff};
