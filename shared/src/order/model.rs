//! Stored order shape and the read-side projections built from it

use super::types::{OrderItemStatus, OrderStatus, ServiceType};
use serde::{Deserialize, Serialize};

/// Upper bound for a single cart line
pub const MAX_LINE_QUANTITY: i32 = 999;

/// One line of the kiosk cart, `{foodId, quantity}`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub food_id: String,
    pub quantity: i32,
}

impl CartLine {
    pub fn new(food_id: impl Into<String>, quantity: i32) -> Self {
        Self {
            food_id: food_id.into(),
            quantity,
        }
    }
}

/// Order item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub food_id: String,
    pub quantity: i32,
    pub status: OrderItemStatus,
}

/// Order
///
/// Created together with its items at checkout. `status` never derives from
/// item statuses; dashboards read the items to decide whether food is ready.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    /// Human-facing ticket number, unique among orders not yet completed
    pub counter: u16,
    pub status: OrderStatus,
    #[serde(default)]
    pub mode: ServiceType,
    pub items: Vec<OrderItem>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Order {
    pub fn item(&self, item_id: &str) -> Option<&OrderItem> {
        self.items.iter().find(|i| i.id == item_id)
    }

    pub fn item_mut(&mut self, item_id: &str) -> Option<&mut OrderItem> {
        self.items.iter_mut().find(|i| i.id == item_id)
    }

    /// Some item still `PENDING` or `IN_PROGRESS`
    pub fn has_open_items(&self) -> bool {
        self.items.iter().any(|i| i.status.is_open())
    }

    /// Unpaid order released after its payment session lapsed
    ///
    /// Its items are all `CANCELLED` and its counter is free again.
    pub fn is_abandoned(&self) -> bool {
        self.status == OrderStatus::Pending
            && !self.items.is_empty()
            && self
                .items
                .iter()
                .all(|i| i.status == OrderItemStatus::Cancelled)
    }

    /// Every item terminal and at least one actually served
    pub fn is_kitchen_done(&self) -> bool {
        self.items.iter().all(|i| i.status.is_terminal())
            && self
                .items
                .iter()
                .any(|i| i.status == OrderItemStatus::Completed)
    }

    /// Cart lines this order was created from, aggregated per food
    pub fn cart_lines(&self) -> Vec<CartLine> {
        let lines: Vec<CartLine> = self
            .items
            .iter()
            .map(|item| CartLine::new(item.food_id.clone(), item.quantity))
            .collect();
        merge_lines(&lines)
    }

    /// Status board column for this order, `None` when it is not shown
    ///
    /// Completed orders and orders with nothing but cancelled items are hidden.
    /// Cancelled items are ignored otherwise.
    pub fn board_bucket(&self) -> Option<BoardBucket> {
        if self.status == OrderStatus::Completed {
            return None;
        }
        let mut live = self
            .items
            .iter()
            .filter(|i| i.status != OrderItemStatus::Cancelled)
            .peekable();
        live.peek()?;

        let (mut all_pending, mut all_completed) = (true, true);
        for item in live {
            all_pending &= item.status == OrderItemStatus::Pending;
            all_completed &= item.status == OrderItemStatus::Completed;
        }
        Some(if all_pending {
            BoardBucket::Pending
        } else if all_completed {
            BoardBucket::Completed
        } else {
            BoardBucket::InProgress
        })
    }
}

/// Status board column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BoardBucket {
    Pending,
    InProgress,
    Completed,
}

/// Status board projection, recomputed on every read
///
/// Each list is sorted ascending and contains each counter at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateCounters {
    pub pending_counters: Vec<u16>,
    pub in_progress_counters: Vec<u16>,
    pub completed_counters: Vec<u16>,
}

impl AggregateCounters {
    pub fn from_orders<'a>(orders: impl IntoIterator<Item = &'a Order>) -> Self {
        let mut counters = Self::default();
        for order in orders {
            match order.board_bucket() {
                Some(BoardBucket::Pending) => counters.pending_counters.push(order.counter),
                Some(BoardBucket::InProgress) => counters.in_progress_counters.push(order.counter),
                Some(BoardBucket::Completed) => counters.completed_counters.push(order.counter),
                None => {}
            }
        }
        counters.pending_counters.sort_unstable();
        counters.in_progress_counters.sort_unstable();
        counters.completed_counters.sort_unstable();
        counters
    }
}

/// Predicate used by the cook and server views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderView {
    /// Some item still needs the kitchen
    #[default]
    Active,
    /// Kitchen is done with every item
    Completed,
    All,
}

impl OrderView {
    pub fn matches(&self, order: &Order) -> bool {
        match self {
            Self::Active => order.has_open_items(),
            Self::Completed => order.is_kitchen_done(),
            Self::All => true,
        }
    }
}

/// One line per food with summed quantities, sorted by food id
pub fn merge_lines(lines: &[CartLine]) -> Vec<CartLine> {
    let mut merged: Vec<CartLine> = Vec::new();
    for line in lines {
        match merged.iter_mut().find(|l| l.food_id == line.food_id) {
            Some(existing) => existing.quantity += line.quantity,
            None => merged.push(line.clone()),
        }
    }
    merged.sort_by(|a, b| a.food_id.cmp(&b.food_id));
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order_with(counter: u16, statuses: &[OrderItemStatus]) -> Order {
        Order {
            id: format!("o-{counter}"),
            counter,
            status: OrderStatus::Paid,
            mode: ServiceType::DineIn,
            items: statuses
                .iter()
                .enumerate()
                .map(|(i, s)| OrderItem {
                    id: format!("i-{i}"),
                    food_id: format!("f{i}"),
                    quantity: 1,
                    status: *s,
                })
                .collect(),
            created_at: 0,
            updated_at: 0,
        }
    }

    use OrderItemStatus::*;

    #[test]
    fn board_bucket_rules() {
        assert_eq!(
            order_with(1, &[Pending, Pending]).board_bucket(),
            Some(BoardBucket::Pending)
        );
        assert_eq!(
            order_with(2, &[Pending, Completed]).board_bucket(),
            Some(BoardBucket::InProgress)
        );
        assert_eq!(
            order_with(3, &[Completed, Cancelled]).board_bucket(),
            Some(BoardBucket::Completed)
        );
        assert_eq!(
            order_with(4, &[Pending, Cancelled]).board_bucket(),
            Some(BoardBucket::Pending)
        );
        assert_eq!(order_with(5, &[Cancelled, Cancelled]).board_bucket(), None);

        let mut done = order_with(6, &[Completed]);
        done.status = OrderStatus::Completed;
        assert_eq!(done.board_bucket(), None);
    }

    #[test]
    fn aggregate_counters_are_sorted_and_deterministic() {
        let orders = vec![
            order_with(7, &[Pending]),
            order_with(3, &[InProgress]),
            order_with(2, &[Pending]),
            order_with(9, &[Completed, Completed]),
        ];
        let first = AggregateCounters::from_orders(&orders);
        let second = AggregateCounters::from_orders(&orders);
        assert_eq!(first, second);
        assert_eq!(first.pending_counters, vec![2, 7]);
        assert_eq!(first.in_progress_counters, vec![3]);
        assert_eq!(first.completed_counters, vec![9]);
    }

    #[test]
    fn view_predicates() {
        let active = order_with(1, &[Completed, InProgress]);
        let done = order_with(2, &[Completed, Cancelled]);
        let dropped = order_with(3, &[Cancelled]);

        assert!(OrderView::Active.matches(&active));
        assert!(!OrderView::Completed.matches(&active));
        assert!(OrderView::Completed.matches(&done));
        assert!(!OrderView::Active.matches(&done));
        assert!(!OrderView::Completed.matches(&dropped));
        assert!(OrderView::All.matches(&dropped));
    }

    #[test]
    fn abandoned_only_when_unpaid_and_fully_cancelled() {
        let mut order = order_with(1, &[Cancelled, Cancelled]);
        assert!(!order.is_abandoned());
        order.status = OrderStatus::Pending;
        assert!(order.is_abandoned());
        order.items[0].status = Pending;
        assert!(!order.is_abandoned());
    }

    #[test]
    fn cart_lines_merge_same_food() {
        let mut order = order_with(1, &[Pending, Pending]);
        order.items[1].food_id = "f0".to_string();
        order.items[1].quantity = 2;
        assert_eq!(order.cart_lines(), vec![CartLine::new("f0", 3)]);
    }

    #[test]
    fn camel_case_wire_format() {
        let json = serde_json::to_value(CartLine::new("f1", 2)).unwrap();
        assert_eq!(json, serde_json::json!({"foodId": "f1", "quantity": 2}));

        let counters = AggregateCounters::default();
        let json = serde_json::to_value(counters).unwrap();
        assert!(json.get("inProgressCounters").is_some());
    }
}
