use super::*;

#[test]
fn test_order_status_forward_path() {
    let (manager, recorder) = create_recorded_manager();
    let order = three_item_order(&manager);
    recorder.clear();

    let paid = manager.set_order_status(&order.id, OrderStatus::Paid).unwrap();
    assert_eq!(paid.status, OrderStatus::Paid);
    let done = manager
        .set_order_status(&order.id, OrderStatus::Completed)
        .unwrap();
    assert_eq!(done.status, OrderStatus::Completed);

    let events = recorder.events();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.event == OrderEventKind::OrderUpdated
        && e.scope == NotificationScope::Order));
    assert_eq!(events[0].order_status, Some(OrderStatus::Paid));
    assert_eq!(events[1].order_status, Some(OrderStatus::Completed));
}

#[test]
fn test_order_status_cannot_skip_or_reverse() {
    let (manager, recorder) = create_recorded_manager();
    let order = three_item_order(&manager);
    recorder.clear();

    let err = manager
        .set_order_status(&order.id, OrderStatus::Completed)
        .unwrap_err();
    assert!(matches!(err, ManagerError::InvalidTransition { .. }));

    manager.set_order_status(&order.id, OrderStatus::Paid).unwrap();
    manager
        .set_order_status(&order.id, OrderStatus::Completed)
        .unwrap();

    let err = manager
        .set_order_status(&order.id, OrderStatus::Pending)
        .unwrap_err();
    match err {
        ManagerError::InvalidTransition { from, to } => {
            assert_eq!(from, "COMPLETED");
            assert_eq!(to, "PENDING");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
        manager.get_order(&order.id).unwrap().status,
        OrderStatus::Completed
    );
    // Rejections publish nothing
    assert_eq!(recorder.events().len(), 2);
}

#[test]
fn test_same_status_is_rejected() {
    let manager = create_test_manager();
    let order = three_item_order(&manager);
    assert!(matches!(
        manager.set_order_status(&order.id, OrderStatus::Pending),
        Err(ManagerError::InvalidTransition { .. })
    ));
}

#[test]
fn test_set_status_unknown_order() {
    let manager = create_test_manager();
    assert!(matches!(
        manager.set_order_status("ghost", OrderStatus::Paid),
        Err(ManagerError::OrderNotFound(_))
    ));
    assert!(matches!(
        manager.set_order_item_status("ghost", "x", OrderItemStatus::InProgress),
        Err(ManagerError::OrderNotFound(_))
    ));
}

#[test]
fn test_item_status_path_and_events() {
    let (manager, recorder) = create_recorded_manager();
    let order = three_item_order(&manager);
    let item_id = order.items[1].id.clone();
    recorder.clear();

    let updated = manager
        .set_order_item_status(&order.id, &item_id, OrderItemStatus::InProgress)
        .unwrap();
    assert_eq!(
        updated.item(&item_id).unwrap().status,
        OrderItemStatus::InProgress
    );
    // Other items untouched, order status untouched
    assert_eq!(updated.items[0].status, OrderItemStatus::Pending);
    assert_eq!(updated.status, OrderStatus::Pending);

    manager
        .set_order_item_status(&order.id, &item_id, OrderItemStatus::Completed)
        .unwrap();

    let events = recorder.events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].scope, NotificationScope::Item);
    assert_eq!(events[0].item_id.as_deref(), Some(item_id.as_str()));
    assert_eq!(events[1].item_status, Some(OrderItemStatus::Completed));
}

#[test]
fn test_item_status_rejections_leave_store_unchanged() {
    let manager = create_test_manager();
    let order = three_item_order(&manager);
    let item_id = order.items[0].id.clone();

    // PENDING -> COMPLETED skips IN_PROGRESS
    assert!(matches!(
        manager.set_order_item_status(&order.id, &item_id, OrderItemStatus::Completed),
        Err(ManagerError::InvalidTransition { .. })
    ));
    assert_eq!(
        manager.get_order(&order.id).unwrap().items[0].status,
        OrderItemStatus::Pending
    );

    manager
        .set_order_item_status(&order.id, &item_id, OrderItemStatus::Cancelled)
        .unwrap();
    for next in [
        OrderItemStatus::Pending,
        OrderItemStatus::InProgress,
        OrderItemStatus::Completed,
    ] {
        assert!(matches!(
            manager.set_order_item_status(&order.id, &item_id, next),
            Err(ManagerError::InvalidTransition { .. })
        ));
    }
    assert_eq!(
        manager.get_order(&order.id).unwrap().items[0].status,
        OrderItemStatus::Cancelled
    );
}

#[test]
fn test_in_progress_item_can_be_cancelled() {
    let manager = create_test_manager();
    let order = three_item_order(&manager);
    let item_id = &order.items[2].id;

    manager
        .set_order_item_status(&order.id, item_id, OrderItemStatus::InProgress)
        .unwrap();
    let order = manager
        .set_order_item_status(&order.id, item_id, OrderItemStatus::Cancelled)
        .unwrap();
    assert_eq!(order.items[2].status, OrderItemStatus::Cancelled);
}

#[test]
fn test_unknown_item() {
    let manager = create_test_manager();
    let order = three_item_order(&manager);
    assert!(matches!(
        manager.set_order_item_status(&order.id, "nope", OrderItemStatus::InProgress),
        Err(ManagerError::ItemNotFound { .. })
    ));
}

#[test]
fn test_item_updates_do_not_touch_order_status() {
    let manager = create_test_manager();
    let order = three_item_order(&manager);
    for item in &order.items {
        manager
            .set_order_item_status(&order.id, &item.id, OrderItemStatus::InProgress)
            .unwrap();
        manager
            .set_order_item_status(&order.id, &item.id, OrderItemStatus::Completed)
            .unwrap();
    }
    assert_eq!(
        manager.get_order(&order.id).unwrap().status,
        OrderStatus::Pending
    );
}

#[test]
fn test_completed_order_releases_counter() {
    let manager = create_test_manager();
    let first = three_item_order(&manager);
    assert_eq!(manager.storage().get_active_counters().unwrap(), vec![first.counter]);

    manager.set_order_status(&first.id, OrderStatus::Paid).unwrap();
    // PAID still holds the counter
    assert_eq!(manager.storage().get_active_counters().unwrap(), vec![first.counter]);

    let done = manager
        .set_order_status(&first.id, OrderStatus::Completed)
        .unwrap();
    assert!(manager.storage().get_active_counters().unwrap().is_empty());
    // The completed order keeps its number for display
    assert_eq!(done.counter, first.counter);
}

#[test]
fn test_released_counter_is_handed_out_again_after_wrap() {
    let manager = create_test_manager();

    // Hold every counter except the first order's
    let first = manager
        .create_order(&[line("f1", 1)], ServiceType::DineIn)
        .unwrap();
    for _ in 1..crate::orders::storage::MAX_COUNTER {
        manager
            .create_order(&[line("f1", 1)], ServiceType::DineIn)
            .unwrap();
    }
    assert!(matches!(
        manager.create_order(&[line("f1", 1)], ServiceType::DineIn),
        Err(ManagerError::Storage(StorageError::CountersExhausted(_)))
    ));

    manager.set_order_status(&first.id, OrderStatus::Paid).unwrap();
    manager
        .set_order_status(&first.id, OrderStatus::Completed)
        .unwrap();

    let reused = manager
        .create_order(&[line("f2", 1)], ServiceType::DineIn)
        .unwrap();
    assert_eq!(reused.counter, first.counter);
}
