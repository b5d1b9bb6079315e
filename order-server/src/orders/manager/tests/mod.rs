use super::*;
use crate::message::RecordingPublisher;
use shared::message::{NotificationScope, OrderEventKind};

fn create_test_manager() -> OrdersManager {
    let storage = OrderStorage::open_in_memory().unwrap();
    OrdersManager::with_storage(storage, Arc::new(RecordingPublisher::new()))
}

/// Manager plus the recorder it publishes into
fn create_recorded_manager() -> (OrdersManager, Arc<RecordingPublisher>) {
    let recorder = Arc::new(RecordingPublisher::new());
    let storage = OrderStorage::open_in_memory().unwrap();
    let manager = OrdersManager::with_storage(storage, recorder.clone());
    (manager, recorder)
}

fn line(food_id: &str, quantity: i32) -> CartLine {
    CartLine::new(food_id, quantity)
}

/// Order with three PENDING items
fn three_item_order(manager: &OrdersManager) -> Order {
    manager
        .create_order(
            &[line("f1", 1), line("f2", 2), line("f3", 1)],
            ServiceType::DineIn,
        )
        .unwrap()
}

fn test_session(order: &Order, session_id: &str) -> CheckoutSession {
    CheckoutSession {
        order_id: order.id.clone(),
        session_id: session_id.to_string(),
        redirect_url: format!("https://pay.example/{session_id}"),
        total: rust_decimal::Decimal::new(1900, 2),
        amount_minor_units: 1900,
        currency: "eur".to_string(),
        created_at: now_millis(),
        confirmed: false,
        confirmed_at: None,
    }
}

mod test_transitions;
