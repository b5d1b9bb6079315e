//! redb-based order store
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `Order` (JSON) | Orders with their items |
//! | `active_counters` | `counter` | `order_id` | Ticket numbers held by orders not yet completed |
//! | `sequence_counter` | `"counter_cursor"` | `u64` | Last ticket number handed out |
//! | `checkout_sessions` | `order_id` | `CheckoutSession` (JSON) | One payment session per order |
//! | `session_index` | `session_id` | `order_id` | Webhook lookup |
//!
//! # Concurrency
//!
//! redb has a single writer. Every read-modify-write on an order happens
//! inside one write transaction, so a status check and the following update
//! are atomic with respect to other writers.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::order::Order;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// key = order_id, value = JSON-serialized Order
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// key = ticket counter, value = order_id holding it
const ACTIVE_COUNTERS_TABLE: TableDefinition<u16, &str> = TableDefinition::new("active_counters");

const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequence_counter");

/// key = order_id, value = JSON-serialized CheckoutSession
const CHECKOUT_SESSIONS_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("checkout_sessions");

/// key = provider session id, value = order_id
const SESSION_INDEX_TABLE: TableDefinition<&str, &str> = TableDefinition::new("session_index");

const COUNTER_CURSOR_KEY: &str = "counter_cursor";

/// Ticket counters run `1..=MAX_COUNTER`
pub const MAX_COUNTER: u16 = 999;

/// Payment session issued for an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub order_id: String,
    pub session_id: String,
    pub redirect_url: String,
    pub total: Decimal,
    pub amount_minor_units: i64,
    pub currency: String,
    pub created_at: i64,
    /// Provider confirmed payment
    pub confirmed: bool,
    #[serde(default)]
    pub confirmed_at: Option<i64>,
}

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("All {0} ticket counters are in use")]
    CountersExhausted(u16),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Order storage backed by redb
#[derive(Clone)]
pub struct OrderStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for OrderStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderStorage").finish_non_exhaustive()
    }
}

impl OrderStorage {
    /// Open or create the database at the given path
    ///
    /// Commits are durable once `commit()` returns (redb default durability).
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests and throwaway instances)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(ACTIVE_COUNTERS_TABLE)?;
            let _ = write_txn.open_table(CHECKOUT_SESSIONS_TABLE)?;
            let _ = write_txn.open_table(SESSION_INDEX_TABLE)?;

            let mut seq_table = write_txn.open_table(SEQUENCE_TABLE)?;
            if seq_table.get(COUNTER_CURSOR_KEY)?.is_none() {
                seq_table.insert(COUNTER_CURSOR_KEY, 0u64)?;
            }
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Ticket Counters ==========

    /// Hand out the next free ticket counter to `order_id`
    ///
    /// Advances the persistent cursor, skipping numbers still held by orders
    /// that are not completed. Wraps from `MAX_COUNTER` back to 1.
    pub fn allocate_counter(&self, txn: &WriteTransaction, order_id: &str) -> StorageResult<u16> {
        let mut seq_table = txn.open_table(SEQUENCE_TABLE)?;
        let mut counters = txn.open_table(ACTIVE_COUNTERS_TABLE)?;

        let cursor = seq_table
            .get(COUNTER_CURSOR_KEY)?
            .map(|g| g.value())
            .unwrap_or(0);

        for step in 1..=u64::from(MAX_COUNTER) {
            let candidate = ((cursor + step - 1) % u64::from(MAX_COUNTER) + 1) as u16;
            if counters.get(candidate)?.is_none() {
                counters.insert(candidate, order_id)?;
                seq_table.insert(COUNTER_CURSOR_KEY, u64::from(candidate))?;
                return Ok(candidate);
            }
        }

        Err(StorageError::CountersExhausted(MAX_COUNTER))
    }

    /// Free a counter, but only if `order_id` still holds it
    pub fn release_counter(
        &self,
        txn: &WriteTransaction,
        counter: u16,
        order_id: &str,
    ) -> StorageResult<bool> {
        let mut counters = txn.open_table(ACTIVE_COUNTERS_TABLE)?;
        let held_by_order = counters
            .get(counter)?
            .is_some_and(|holder| holder.value() == order_id);
        if held_by_order {
            counters.remove(counter)?;
        }
        Ok(held_by_order)
    }

    /// Counters currently held, ascending
    pub fn get_active_counters(&self) -> StorageResult<Vec<u16>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACTIVE_COUNTERS_TABLE)?;

        let mut counters = Vec::new();
        for result in table.iter()? {
            let (key, _value) = result?;
            counters.push(key.value());
        }
        Ok(counters)
    }

    // ========== Orders ==========

    /// Store an order (within transaction)
    pub fn store_order(&self, txn: &WriteTransaction, order: &Order) -> StorageResult<()> {
        let mut table = txn.open_table(ORDERS_TABLE)?;
        let value = serde_json::to_vec(order)?;
        table.insert(order.id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Get an order by ID
    pub fn get_order(&self, order_id: &str) -> StorageResult<Option<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get an order by ID (within transaction)
    pub fn get_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Option<Order>> {
        let table = txn.open_table(ORDERS_TABLE)?;

        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get all orders, oldest first
    pub fn get_all_orders(&self) -> StorageResult<Vec<Order>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        let mut orders: Vec<Order> = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            orders.push(serde_json::from_slice(value.value())?);
        }
        orders.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.counter.cmp(&b.counter)));
        Ok(orders)
    }

    // ========== Checkout Sessions ==========

    /// Store the payment session of an order (within transaction)
    pub fn store_checkout_session(
        &self,
        txn: &WriteTransaction,
        session: &CheckoutSession,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(CHECKOUT_SESSIONS_TABLE)?;
        let value = serde_json::to_vec(session)?;
        table.insert(session.order_id.as_str(), value.as_slice())?;

        let mut index = txn.open_table(SESSION_INDEX_TABLE)?;
        index.insert(session.session_id.as_str(), session.order_id.as_str())?;
        Ok(())
    }

    pub fn get_checkout_session(&self, order_id: &str) -> StorageResult<Option<CheckoutSession>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CHECKOUT_SESSIONS_TABLE)?;

        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_checkout_session_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Option<CheckoutSession>> {
        let table = txn.open_table(CHECKOUT_SESSIONS_TABLE)?;

        match table.get(order_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Order that owns a provider session
    pub fn find_order_by_session(&self, session_id: &str) -> StorageResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(SESSION_INDEX_TABLE)?;
        Ok(table.get(session_id)?.map(|g| g.value().to_string()))
    }

    // ========== Statistics ==========

    /// Get storage statistics
    pub fn get_stats(&self) -> StorageResult<StorageStats> {
        let read_txn = self.db.begin_read()?;

        let orders_table = read_txn.open_table(ORDERS_TABLE)?;
        let counters_table = read_txn.open_table(ACTIVE_COUNTERS_TABLE)?;
        let sessions_table = read_txn.open_table(CHECKOUT_SESSIONS_TABLE)?;
        let seq_table = read_txn.open_table(SEQUENCE_TABLE)?;

        Ok(StorageStats {
            order_count: orders_table.len()?,
            active_counter_count: counters_table.len()?,
            checkout_session_count: sessions_table.len()?,
            counter_cursor: seq_table
                .get(COUNTER_CURSOR_KEY)?
                .map(|guard| guard.value())
                .unwrap_or(0),
        })
    }
}

/// Storage statistics
#[derive(Debug, Clone, Serialize)]
pub struct StorageStats {
    pub order_count: u64,
    pub active_counter_count: u64,
    pub checkout_session_count: u64,
    pub counter_cursor: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::order::{OrderItem, OrderItemStatus, OrderStatus, ServiceType};

    fn test_order(id: &str, counter: u16) -> Order {
        Order {
            id: id.to_string(),
            counter,
            status: OrderStatus::Pending,
            mode: ServiceType::DineIn,
            items: vec![OrderItem {
                id: format!("{id}-item"),
                food_id: "f1".to_string(),
                quantity: 1,
                status: OrderItemStatus::Pending,
            }],
            created_at: shared::util::now_millis(),
            updated_at: shared::util::now_millis(),
        }
    }

    #[test]
    fn test_store_and_get_order() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let order = test_order("o-1", 1);

        let txn = storage.begin_write().unwrap();
        storage.store_order(&txn, &order).unwrap();
        txn.commit().unwrap();

        assert_eq!(storage.get_order("o-1").unwrap(), Some(order));
        assert!(storage.get_order("missing").unwrap().is_none());
        assert_eq!(storage.get_all_orders().unwrap().len(), 1);
    }

    #[test]
    fn test_uncommitted_write_is_invisible() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        storage.store_order(&txn, &test_order("o-1", 1)).unwrap();
        drop(txn);

        assert!(storage.get_order("o-1").unwrap().is_none());
    }

    #[test]
    fn test_counters_advance_and_skip_held() {
        let storage = OrderStorage::open_in_memory().unwrap();

        let txn = storage.begin_write().unwrap();
        assert_eq!(storage.allocate_counter(&txn, "a").unwrap(), 1);
        assert_eq!(storage.allocate_counter(&txn, "b").unwrap(), 2);
        txn.commit().unwrap();

        // Releasing 1 does not rewind the cursor
        let txn = storage.begin_write().unwrap();
        assert!(storage.release_counter(&txn, 1, "a").unwrap());
        assert_eq!(storage.allocate_counter(&txn, "c").unwrap(), 3);
        txn.commit().unwrap();

        assert_eq!(storage.get_active_counters().unwrap(), vec![2, 3]);
    }

    #[test]
    fn test_counter_wraps_and_reuses_released() {
        let storage = OrderStorage::open_in_memory().unwrap();

        let txn = storage.begin_write().unwrap();
        for i in 1..=MAX_COUNTER {
            assert_eq!(storage.allocate_counter(&txn, &format!("o-{i}")).unwrap(), i);
        }
        assert!(matches!(
            storage.allocate_counter(&txn, "overflow"),
            Err(StorageError::CountersExhausted(MAX_COUNTER))
        ));
        assert!(storage.release_counter(&txn, 42, "o-42").unwrap());
        assert_eq!(storage.allocate_counter(&txn, "late").unwrap(), 42);
        txn.commit().unwrap();
    }

    #[test]
    fn test_release_requires_holder() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let txn = storage.begin_write().unwrap();
        let counter = storage.allocate_counter(&txn, "a").unwrap();
        assert!(!storage.release_counter(&txn, counter, "someone-else").unwrap());
        assert!(storage.release_counter(&txn, counter, "a").unwrap());
        txn.commit().unwrap();
        assert!(storage.get_active_counters().unwrap().is_empty());
    }

    #[test]
    fn test_checkout_session_index() {
        let storage = OrderStorage::open_in_memory().unwrap();
        let session = CheckoutSession {
            order_id: "o-1".into(),
            session_id: "cs_test_1".into(),
            redirect_url: "https://pay.example/cs_test_1".into(),
            total: Decimal::new(1900, 2),
            amount_minor_units: 1900,
            currency: "eur".into(),
            created_at: 1,
            confirmed: false,
            confirmed_at: None,
        };

        let txn = storage.begin_write().unwrap();
        storage.store_checkout_session(&txn, &session).unwrap();
        txn.commit().unwrap();

        assert_eq!(storage.get_checkout_session("o-1").unwrap(), Some(session));
        assert_eq!(
            storage.find_order_by_session("cs_test_1").unwrap().as_deref(),
            Some("o-1")
        );

        let stats = storage.get_stats().unwrap();
        assert_eq!(stats.checkout_session_count, 1);
        assert_eq!(stats.order_count, 0);
    }

    #[test]
    fn test_reopen_file_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("orders.redb");
        {
            let storage = OrderStorage::open(&path).unwrap();
            let txn = storage.begin_write().unwrap();
            let counter = storage.allocate_counter(&txn, "o-1").unwrap();
            storage.store_order(&txn, &test_order("o-1", counter)).unwrap();
            txn.commit().unwrap();
        }
        let storage = OrderStorage::open(&path).unwrap();
        assert!(storage.get_order("o-1").unwrap().is_some());
        assert_eq!(storage.get_stats().unwrap().counter_cursor, 1);
    }
}
