//! OrdersManager - order creation and the status transition engine
//!
//! This is the single authority for order and item status changes, whichever
//! dashboard asked for them.
//!
//! # Mutation Flow
//!
//! ```text
//! set_order_item_status(order_id, item_id, next)
//!     ├─ 1. Begin write transaction (single writer)
//!     ├─ 2. Load order, compare current status with `next`
//!     ├─ 3. Reject with InvalidTransition (transaction aborted, nothing stored)
//!     ├─ 4. Apply, persist, commit
//!     ├─ 5. Retry once if the storage layer failed
//!     └─ 6. Publish ORDER_UPDATED (fire-and-forget)
//! ```

mod error;
pub use error::*;

use super::storage::{CheckoutSession, OrderStorage, StorageError};
use crate::message::EventPublisher;
use shared::message::OrderNotification;
use shared::order::model::MAX_LINE_QUANTITY;
use shared::order::{
    AggregateCounters, CartLine, Order, OrderItem, OrderItemStatus, OrderStatus, OrderView,
    ServiceType,
};
use shared::util::{new_id, now_millis};
use std::path::Path;
use std::sync::Arc;

/// Result of applying a payment confirmation
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    /// Order moved `PENDING -> PAID`
    Applied(Order),
    /// Confirmation was already recorded; nothing changed
    AlreadyApplied(Order),
}

impl PaymentOutcome {
    pub fn order(&self) -> &Order {
        match self {
            Self::Applied(order) | Self::AlreadyApplied(order) => order,
        }
    }
}

/// OrdersManager
///
/// The `epoch` field is generated on each startup so dashboards can detect
/// a restart and resync.
pub struct OrdersManager {
    storage: OrderStorage,
    publisher: Arc<dyn EventPublisher>,
    epoch: String,
}

impl std::fmt::Debug for OrdersManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrdersManager")
            .field("storage", &"<OrderStorage>")
            .field("publisher", &"<dyn EventPublisher>")
            .field("epoch", &self.epoch)
            .finish()
    }
}

impl OrdersManager {
    /// Create a new OrdersManager with the given database path
    pub fn new(db_path: impl AsRef<Path>, publisher: Arc<dyn EventPublisher>) -> ManagerResult<Self> {
        let storage = OrderStorage::open(db_path)?;
        Ok(Self::with_storage(storage, publisher))
    }

    /// Create an OrdersManager with existing storage
    pub fn with_storage(storage: OrderStorage, publisher: Arc<dyn EventPublisher>) -> Self {
        let epoch = uuid::Uuid::new_v4().to_string();
        tracing::info!(epoch = %epoch, "OrdersManager started with new epoch");
        Self {
            storage,
            publisher,
            epoch,
        }
    }

    pub fn epoch(&self) -> &str {
        &self.epoch
    }

    pub fn storage(&self) -> &OrderStorage {
        &self.storage
    }

    /// Run a storage operation, retrying once on a transient storage failure
    fn with_retry<T>(
        &self,
        operation: &'static str,
        mut f: impl FnMut() -> ManagerResult<T>,
    ) -> ManagerResult<T> {
        match f() {
            Err(e) if e.is_retryable() => {
                tracing::warn!(operation, error = %e, "Storage write failed, retrying once");
                f()
            }
            other => other,
        }
    }

    // ========== Order Store ==========

    /// Create a `PENDING` order with one `PENDING` item per cart line
    ///
    /// Publishes `ORDER_CREATED` after commit.
    pub fn create_order(&self, lines: &[CartLine], mode: ServiceType) -> ManagerResult<Order> {
        validate_cart(lines)?;

        let order = self.with_retry("create_order", || self.insert_order(lines, mode))?;

        tracing::info!(
            order_id = %order.id,
            counter = order.counter,
            items = order.items.len(),
            mode = ?order.mode,
            "Order created"
        );
        self.publisher.publish(OrderNotification::created(&order));
        Ok(order)
    }

    fn insert_order(&self, lines: &[CartLine], mode: ServiceType) -> ManagerResult<Order> {
        let txn = self.storage.begin_write()?;
        let order_id = new_id();
        let counter = self.storage.allocate_counter(&txn, &order_id)?;
        let now = now_millis();

        let order = Order {
            id: order_id,
            counter,
            status: OrderStatus::Pending,
            mode,
            items: lines
                .iter()
                .map(|line| OrderItem {
                    id: new_id(),
                    food_id: line.food_id.clone(),
                    quantity: line.quantity,
                    status: OrderItemStatus::Pending,
                })
                .collect(),
            created_at: now,
            updated_at: now,
        };

        self.storage.store_order(&txn, &order)?;
        txn.commit().map_err(StorageError::from)?;
        Ok(order)
    }

    pub fn get_order(&self, order_id: &str) -> ManagerResult<Order> {
        self.storage
            .get_order(order_id)?
            .ok_or_else(|| ManagerError::OrderNotFound(order_id.to_string()))
    }

    /// Orders matching `predicate`, oldest first
    pub fn list_orders_by_item_status<P>(&self, predicate: P) -> ManagerResult<Vec<Order>>
    where
        P: Fn(&Order) -> bool,
    {
        Ok(self
            .storage
            .get_all_orders()?
            .into_iter()
            .filter(|order| predicate(order))
            .collect())
    }

    /// Cook/server view listing, optionally narrowed by order status
    pub fn list_orders(
        &self,
        view: OrderView,
        status: Option<OrderStatus>,
    ) -> ManagerResult<Vec<Order>> {
        self.list_orders_by_item_status(|order| {
            view.matches(order) && status.is_none_or(|s| order.status == s)
        })
    }

    /// Status board projection, recomputed from stored orders on every call
    pub fn aggregate_counters(&self) -> ManagerResult<AggregateCounters> {
        let orders = self.storage.get_all_orders()?;
        Ok(AggregateCounters::from_orders(&orders))
    }

    // ========== Transition Engine ==========

    /// Move an order to its unique successor status
    ///
    /// Reaching `COMPLETED` releases the ticket counter.
    pub fn set_order_status(&self, order_id: &str, next: OrderStatus) -> ManagerResult<Order> {
        let order = self.with_retry("set_order_status", || {
            self.apply_order_status(order_id, next)
        })?;

        tracing::info!(order_id = %order.id, status = %next, "Order status changed");
        self.publisher.publish(OrderNotification::order_updated(&order));
        Ok(order)
    }

    fn apply_order_status(&self, order_id: &str, next: OrderStatus) -> ManagerResult<Order> {
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| ManagerError::OrderNotFound(order_id.to_string()))?;

        if !order.status.can_transition_to(next) {
            return Err(ManagerError::invalid_transition(order.status, next));
        }

        order.status = next;
        order.updated_at = now_millis();
        if next == OrderStatus::Completed {
            self.storage
                .release_counter(&txn, order.counter, &order.id)?;
        }
        self.storage.store_order(&txn, &order)?;
        txn.commit().map_err(StorageError::from)?;
        Ok(order)
    }

    /// Move one item along its status graph
    pub fn set_order_item_status(
        &self,
        order_id: &str,
        item_id: &str,
        next: OrderItemStatus,
    ) -> ManagerResult<Order> {
        let order = self.with_retry("set_order_item_status", || {
            self.apply_item_status(order_id, item_id, next)
        })?;

        tracing::info!(order_id = %order.id, item_id = %item_id, status = %next, "Item status changed");
        self.publisher
            .publish(OrderNotification::item_updated(&order, item_id, next));
        Ok(order)
    }

    fn apply_item_status(
        &self,
        order_id: &str,
        item_id: &str,
        next: OrderItemStatus,
    ) -> ManagerResult<Order> {
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| ManagerError::OrderNotFound(order_id.to_string()))?;

        let item = order
            .item_mut(item_id)
            .ok_or_else(|| ManagerError::ItemNotFound {
                order_id: order_id.to_string(),
                item_id: item_id.to_string(),
            })?;

        if !item.status.can_transition_to(next) {
            return Err(ManagerError::invalid_transition(item.status, next));
        }
        item.status = next;

        order.updated_at = now_millis();
        self.storage.store_order(&txn, &order)?;
        txn.commit().map_err(StorageError::from)?;
        Ok(order)
    }

    // ========== Checkout Sessions ==========

    pub fn get_checkout_session(&self, order_id: &str) -> ManagerResult<Option<CheckoutSession>> {
        Ok(self.storage.get_checkout_session(order_id)?)
    }

    /// Order owning a provider session id
    pub fn find_order_by_session(&self, session_id: &str) -> ManagerResult<Option<String>> {
        Ok(self.storage.find_order_by_session(session_id)?)
    }

    /// Persist the payment session issued for a `PENDING` order
    pub fn record_checkout_session(&self, session: &CheckoutSession) -> ManagerResult<()> {
        self.with_retry("record_checkout_session", || {
            let txn = self.storage.begin_write()?;
            let order = self
                .storage
                .get_order_txn(&txn, &session.order_id)?
                .ok_or_else(|| ManagerError::OrderNotFound(session.order_id.clone()))?;
            if order.status != OrderStatus::Pending {
                return Err(ManagerError::invalid_transition(order.status, OrderStatus::Paid));
            }
            if order.is_abandoned() {
                return Err(ManagerError::OrderAbandoned(order.id));
            }
            self.storage.store_checkout_session(&txn, session)?;
            txn.commit().map_err(StorageError::from)?;
            Ok(())
        })?;

        tracing::info!(
            order_id = %session.order_id,
            session_id = %session.session_id,
            amount_minor_units = session.amount_minor_units,
            "Checkout session recorded"
        );
        Ok(())
    }

    /// Apply a provider payment confirmation
    ///
    /// Marks the session confirmed and moves the order `PENDING -> PAID` in one
    /// transaction. A repeated confirmation is acknowledged without a second
    /// transition or notification.
    pub fn confirm_payment(&self, session_id: &str, order_id: &str) -> ManagerResult<PaymentOutcome> {
        let outcome = self.with_retry("confirm_payment", || {
            self.apply_payment(session_id, order_id)
        })?;

        match &outcome {
            PaymentOutcome::Applied(order) => {
                tracing::info!(order_id = %order.id, session_id = %session_id, "Payment confirmed");
                self.publisher.publish(OrderNotification::order_updated(order));
            }
            PaymentOutcome::AlreadyApplied(order) => {
                tracing::info!(
                    order_id = %order.id,
                    session_id = %session_id,
                    "Duplicate payment confirmation ignored"
                );
            }
        }
        Ok(outcome)
    }

    fn apply_payment(&self, session_id: &str, order_id: &str) -> ManagerResult<PaymentOutcome> {
        let txn = self.storage.begin_write()?;
        let mut session = self
            .storage
            .get_checkout_session_txn(&txn, order_id)?
            .ok_or_else(|| ManagerError::CheckoutSessionNotFound(session_id.to_string()))?;
        if session.session_id != session_id {
            return Err(ManagerError::Validation(format!(
                "Session {session_id} does not belong to order {order_id}"
            )));
        }

        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| ManagerError::OrderNotFound(order_id.to_string()))?;

        // 计数器可能已被新订单占用，不能再恢复
        if order.is_abandoned() && !session.confirmed {
            return Err(ManagerError::OrderAbandoned(order.id));
        }
        if session.confirmed || order.status != OrderStatus::Pending {
            if !session.confirmed {
                session.confirmed = true;
                session.confirmed_at = Some(now_millis());
                self.storage.store_checkout_session(&txn, &session)?;
                txn.commit().map_err(StorageError::from)?;
            }
            return Ok(PaymentOutcome::AlreadyApplied(order));
        }

        let now = now_millis();
        session.confirmed = true;
        session.confirmed_at = Some(now);
        order.status = OrderStatus::Paid;
        order.updated_at = now;

        self.storage.store_checkout_session(&txn, &session)?;
        self.storage.store_order(&txn, &order)?;
        txn.commit().map_err(StorageError::from)?;
        Ok(PaymentOutcome::Applied(order))
    }

    // ========== Abandonment ==========

    /// Release an unpaid order whose payment session lapsed
    ///
    /// Cancels every item, frees the ticket counter and publishes
    /// `ORDER_UPDATED`; the board stops showing the order. `session_id`
    /// must name the stored session when given. Paid, confirmed or already
    /// abandoned orders are left alone and `None` is returned.
    pub fn abandon_order(&self, order_id: &str, session_id: Option<&str>) -> ManagerResult<Option<Order>> {
        let released = self.with_retry("abandon_order", || {
            self.apply_abandon(order_id, session_id, None)
        })?;
        if let Some(order) = &released {
            self.log_abandoned(order);
        }
        Ok(released)
    }

    /// Abandon every unpaid order with no checkout activity since `cutoff`
    ///
    /// Activity is the order creation or the latest payment session,
    /// whichever is newer. Returns the orders released.
    pub fn abandon_stale_orders(&self, cutoff: i64) -> ManagerResult<Vec<Order>> {
        let candidates = self.list_orders_by_item_status(|order| {
            order.status == OrderStatus::Pending && !order.is_abandoned() && order.created_at < cutoff
        })?;

        let mut released = Vec::new();
        for candidate in candidates {
            let order = self.with_retry("abandon_stale_order", || {
                self.apply_abandon(&candidate.id, None, Some(cutoff))
            })?;
            if let Some(order) = order {
                self.log_abandoned(&order);
                released.push(order);
            }
        }
        Ok(released)
    }

    fn log_abandoned(&self, order: &Order) {
        tracing::info!(order_id = %order.id, counter = order.counter, "Unpaid order abandoned, counter released");
        self.publisher.publish(OrderNotification::order_updated(order));
    }

    fn apply_abandon(
        &self,
        order_id: &str,
        session_id: Option<&str>,
        cutoff: Option<i64>,
    ) -> ManagerResult<Option<Order>> {
        let txn = self.storage.begin_write()?;
        let mut order = self
            .storage
            .get_order_txn(&txn, order_id)?
            .ok_or_else(|| ManagerError::OrderNotFound(order_id.to_string()))?;
        if order.status != OrderStatus::Pending || order.is_abandoned() {
            return Ok(None);
        }

        let mut last_activity = order.created_at;
        if let Some(session) = self.storage.get_checkout_session_txn(&txn, order_id)? {
            if session.confirmed {
                return Ok(None);
            }
            if session_id.is_some_and(|id| id != session.session_id) {
                tracing::debug!(order_id, session_id = ?session_id, "Expired session is not the current one");
                return Ok(None);
            }
            last_activity = last_activity.max(session.created_at);
        }
        if cutoff.is_some_and(|cutoff| last_activity >= cutoff) {
            return Ok(None);
        }

        for item in &mut order.items {
            if item.status.can_transition_to(OrderItemStatus::Cancelled) {
                item.status = OrderItemStatus::Cancelled;
            }
        }
        order.updated_at = now_millis();

        self.storage.release_counter(&txn, order.counter, &order.id)?;
        self.storage.store_order(&txn, &order)?;
        txn.commit().map_err(StorageError::from)?;
        Ok(Some(order))
    }
}

/// Reject empty carts and out-of-range quantities
pub fn validate_cart(lines: &[CartLine]) -> ManagerResult<()> {
    if lines.is_empty() {
        return Err(ManagerError::Validation("Order must contain at least one item".into()));
    }
    for line in lines {
        if line.food_id.trim().is_empty() {
            return Err(ManagerError::Validation("foodId must not be empty".into()));
        }
        if line.quantity <= 0 {
            return Err(ManagerError::Validation(format!(
                "quantity must be positive, got {} for food {}",
                line.quantity, line.food_id
            )));
        }
        if line.quantity > MAX_LINE_QUANTITY {
            return Err(ManagerError::Validation(format!(
                "quantity exceeds maximum allowed ({}), got {} for food {}",
                MAX_LINE_QUANTITY, line.quantity, line.food_id
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
