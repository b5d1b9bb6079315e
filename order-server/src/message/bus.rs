//! 通知总线核心实现
//!
//! Each dashboard connection owns one [`Subscription`]: a bounded mpsc
//! channel plus a filter chosen by its [`DashboardKind`]. Publishing never
//! blocks. A subscriber whose channel is full or closed is dropped on the
//! spot; its receiver then drains and yields `None`, which closes the
//! connection and forces a re-fetch on reconnect.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::Mutex;
use shared::message::{DashboardCue, DashboardKind, OrderNotification};
use tokio::sync::{broadcast, mpsc};

/// Capacity of the in-process listener broadcast channel
const LISTENER_CHANNEL_CAPACITY: usize = 1024;

/// Default per-subscriber buffer
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 64;

/// Sink for order notifications
///
/// Publishing is fire-and-forget: implementations must not block and must
/// not fail the mutation that triggered them.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, notification: OrderNotification);
}

struct Subscriber {
    kind: DashboardKind,
    tx: mpsc::Sender<DashboardCue>,
}

struct BusInner {
    subscribers: DashMap<u64, Subscriber>,
    next_id: AtomicU64,
    buffer: usize,
    listener_tx: broadcast::Sender<Arc<OrderNotification>>,
}

/// 通知总线
#[derive(Clone)]
pub struct NotificationBus {
    inner: Arc<BusInner>,
}

impl std::fmt::Debug for NotificationBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationBus")
            .field("subscribers", &self.inner.subscribers.len())
            .field("buffer", &self.inner.buffer)
            .finish()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_BUFFER)
    }
}

impl NotificationBus {
    /// `buffer` is the per-subscriber channel capacity (at least 1)
    pub fn new(buffer: usize) -> Self {
        let (listener_tx, _) = broadcast::channel(LISTENER_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(BusInner {
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(1),
                buffer: buffer.max(1),
                listener_tx,
            }),
        }
    }

    /// Register a dashboard; deregistered when the returned handle drops
    pub fn subscribe(&self, kind: DashboardKind) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.inner.buffer);
        self.inner.subscribers.insert(id, Subscriber { kind, tx });
        tracing::debug!(subscriber_id = id, kind = %kind, "Dashboard subscribed");
        Subscription {
            id,
            kind,
            rx,
            bus: Arc::downgrade(&self.inner),
        }
    }

    /// Unfiltered stream for in-process listeners
    pub fn listen(&self) -> broadcast::Receiver<Arc<OrderNotification>> {
        self.inner.listener_tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    pub fn subscriber_count_of(&self, kind: DashboardKind) -> usize {
        self.inner
            .subscribers
            .iter()
            .filter(|entry| entry.value().kind == kind)
            .count()
    }

    /// Drop every subscriber (shutdown)
    pub fn close_all(&self) {
        let count = self.inner.subscribers.len();
        self.inner.subscribers.clear();
        tracing::info!(count, "All dashboard subscriptions closed");
    }
}

impl EventPublisher for NotificationBus {
    fn publish(&self, notification: OrderNotification) {
        let notification = Arc::new(notification);

        // No listener is not an error
        let _ = self.inner.listener_tx.send(Arc::clone(&notification));

        // DashMap iteration holds shard locks, so removal happens afterwards
        let mut dropped = Vec::new();
        for entry in self.inner.subscribers.iter() {
            let sub = entry.value();
            if !sub.kind.accepts(&notification) {
                continue;
            }
            let cue = DashboardCue::for_dashboard(sub.kind, &notification);
            match sub.tx.try_send(cue) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        subscriber_id = *entry.key(),
                        kind = %sub.kind,
                        order_id = %notification.order_id,
                        "Subscriber channel full, dropping subscriber"
                    );
                    dropped.push(*entry.key());
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(subscriber_id = *entry.key(), "Subscriber channel closed");
                    dropped.push(*entry.key());
                }
            }
        }

        for id in dropped {
            self.inner.subscribers.remove(&id);
        }
    }
}

/// A live dashboard subscription
pub struct Subscription {
    id: u64,
    kind: DashboardKind,
    rx: mpsc::Receiver<DashboardCue>,
    bus: Weak<BusInner>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> DashboardKind {
        self.kind
    }

    /// Next cue; `None` once the bus dropped this subscriber
    pub async fn recv(&mut self) -> Option<DashboardCue> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<DashboardCue> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(bus) = self.bus.upgrade() {
            bus.subscribers.remove(&self.id);
            tracing::debug!(subscriber_id = self.id, kind = %self.kind, "Dashboard unsubscribed");
        }
    }
}

/// Publisher that keeps every notification in memory
///
/// Used by tests in place of the bus.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<OrderNotification>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<OrderNotification> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventPublisher for RecordingPublisher {
    fn publish(&self, notification: OrderNotification) {
        self.events.lock().push(notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::message::OrderEventKind;
    use shared::order::{Order, OrderItem, OrderItemStatus, OrderStatus, ServiceType};

    fn order(status: OrderStatus) -> Order {
        Order {
            id: "o-1".into(),
            counter: 3,
            status,
            mode: ServiceType::DineIn,
            items: vec![OrderItem {
                id: "i-1".into(),
                food_id: "f1".into(),
                quantity: 2,
                status: OrderItemStatus::Pending,
            }],
            created_at: 1,
            updated_at: 1,
        }
    }

    #[tokio::test]
    async fn test_fan_out_applies_filters() {
        let bus = NotificationBus::new(8);
        let mut cook = bus.subscribe(DashboardKind::Cook);
        let mut server = bus.subscribe(DashboardKind::Server);
        let mut board = bus.subscribe(DashboardKind::StatusBoard);

        bus.publish(OrderNotification::created(&order(OrderStatus::Pending)));
        bus.publish(OrderNotification::order_updated(&order(OrderStatus::Completed)));

        let cue = cook.recv().await.unwrap();
        assert_eq!(cue.event, OrderEventKind::OrderCreated);
        assert!(cue.alert);
        // COMPLETED is not for the kitchen
        assert!(cook.try_recv().is_none());

        assert!(server.recv().await.unwrap().alert);
        assert_eq!(
            server.recv().await.unwrap().event,
            OrderEventKind::OrderUpdated
        );

        let first = board.recv().await.unwrap();
        assert!(!first.alert);
        assert!(board.recv().await.is_some());
    }

    #[tokio::test]
    async fn test_full_subscriber_is_dropped_others_still_receive() {
        let bus = NotificationBus::new(1);
        let mut slow = bus.subscribe(DashboardKind::Server);
        let mut fast = bus.subscribe(DashboardKind::StatusBoard);

        bus.publish(OrderNotification::created(&order(OrderStatus::Pending)));
        // fast keeps up
        assert!(fast.recv().await.is_some());
        // slow never read: second publish overflows it
        bus.publish(OrderNotification::order_updated(&order(OrderStatus::Paid)));

        assert_eq!(bus.subscriber_count(), 1);
        assert!(fast.recv().await.is_some());

        // slow drains what it had, then sees the end of the stream
        assert!(slow.recv().await.is_some());
        assert!(slow.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_drop_deregisters() {
        let bus = NotificationBus::default();
        let sub = bus.subscribe(DashboardKind::Cook);
        let _other = bus.subscribe(DashboardKind::Server);
        assert_eq!(bus.subscriber_count(), 2);
        assert_eq!(bus.subscriber_count_of(DashboardKind::Cook), 1);

        drop(sub);
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.subscriber_count_of(DashboardKind::Cook), 0);

        // Publishing with nobody listening is fine
        bus.publish(OrderNotification::created(&order(OrderStatus::Pending)));
    }

    #[tokio::test]
    async fn test_listener_sees_everything() {
        let bus = NotificationBus::default();
        let mut listener = bus.listen();
        bus.publish(OrderNotification::order_updated(&order(OrderStatus::Completed)));
        let n = listener.recv().await.unwrap();
        assert_eq!(n.order_status, Some(OrderStatus::Completed));
    }

    #[test]
    fn test_close_all_ends_streams() {
        let bus = NotificationBus::default();
        let mut sub = bus.subscribe(DashboardKind::Cook);
        bus.close_all();
        assert_eq!(bus.subscriber_count(), 0);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn test_recording_publisher() {
        let recorder = RecordingPublisher::new();
        recorder.publish(OrderNotification::created(&order(OrderStatus::Pending)));
        assert_eq!(recorder.events().len(), 1);
        recorder.clear();
        assert!(recorder.events().is_empty());
    }
}
