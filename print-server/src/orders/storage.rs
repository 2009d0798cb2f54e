//! redb-based storage for print orders and verification codes
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `orders` | `order_id` | `PrintOrder` | Order records |
//! | `order_no_index` | `order_no` | `order_id` | Lookup by human order number |
//! | `user_orders` | `(user_id, order_id)` | `()` | Per-user listing |
//! | `pending_payment` | `order_id` | `created_at` | Sweeper candidates |
//! | `payments` | `payment_ref` | `order_id` | Payment confirmation idempotency |
//! | `codes` | `(code, issued_at)` | `VerificationCode` | Code history |
//! | `active_codes` | `code` | `issued_at` | Active code uniqueness |
//! | `order_active_code` | `order_id` | `code` | At most one active code per order |
//! | `sequence_counter` | `order_seq:{YYYYMMDD}` | `u64` | Per-date order number counter |
//!
//! Every multi-record change happens inside one `WriteTransaction`; redb
//! serializes writers, so a read-check-write inside one transaction is an
//! atomic conditional update.

use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use serde::de::DeserializeOwned;
use shared::order::{CodeStatus, OrderStatus, PrintOrder, VerificationCode};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// key = order_id, value = JSON-serialized PrintOrder
const ORDERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("orders");

/// key = order_no, value = order_id
const ORDER_NO_TABLE: TableDefinition<&str, &str> = TableDefinition::new("order_no_index");

/// key = (user_id, order_id), value = empty (existence)
const USER_ORDERS_TABLE: TableDefinition<(&str, &str), ()> = TableDefinition::new("user_orders");

/// key = order_id, value = created_at; only PENDING_PAYMENT orders
const PENDING_PAYMENT_TABLE: TableDefinition<&str, i64> = TableDefinition::new("pending_payment");

/// key = payment_ref, value = order_id
const PAYMENTS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("payments");

/// key = (code, issued_at), value = JSON-serialized VerificationCode
const CODES_TABLE: TableDefinition<(&str, i64), &[u8]> = TableDefinition::new("codes");

/// key = code, value = issued_at of the ACTIVE record
const ACTIVE_CODES_TABLE: TableDefinition<&str, i64> = TableDefinition::new("active_codes");

/// key = order_id, value = active code
const ORDER_ACTIVE_CODE_TABLE: TableDefinition<&str, &str> =
    TableDefinition::new("order_active_code");

/// key = counter name, value = u64
const SEQUENCE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("sequence_counter");

const ORDER_SEQ_PREFIX: &str = "order_seq";

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

    #[error("Order number {order_no} already belongs to order {existing}")]
    OrderNoConflict { order_no: String, existing: String },
}

pub type StorageResult<T> = Result<T, StorageError>;

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StorageResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

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
    /// redb commits with `Durability::Immediate`: a committed transition
    /// survives a power cut.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            // Create all tables if they don't exist
            let _ = write_txn.open_table(ORDERS_TABLE)?;
            let _ = write_txn.open_table(ORDER_NO_TABLE)?;
            let _ = write_txn.open_table(USER_ORDERS_TABLE)?;
            let _ = write_txn.open_table(PENDING_PAYMENT_TABLE)?;
            let _ = write_txn.open_table(PAYMENTS_TABLE)?;
            let _ = write_txn.open_table(CODES_TABLE)?;
            let _ = write_txn.open_table(ACTIVE_CODES_TABLE)?;
            let _ = write_txn.open_table(ORDER_ACTIVE_CODE_TABLE)?;
            let _ = write_txn.open_table(SEQUENCE_TABLE)?;
        }
        write_txn.commit()?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    /// Commit a write transaction
    pub fn commit(&self, txn: WriteTransaction) -> StorageResult<()> {
        Ok(txn.commit()?)
    }

    // ========== Order Number Counter ==========

    /// Next order sequence for `date` (YYYYMMDD)
    ///
    /// 每个日期独立计数，时钟回拨到旧日期时继续该日期的序号。
    pub fn next_daily_sequence(&self, txn: &WriteTransaction, date: u64) -> StorageResult<u64> {
        let mut table = txn.open_table(SEQUENCE_TABLE)?;
        let key = format!("{ORDER_SEQ_PREFIX}:{date}");
        let next = table.get(key.as_str())?.map(|g| g.value()).unwrap_or(0) + 1;
        table.insert(key.as_str(), next)?;
        Ok(next)
    }

    // ========== Orders ==========

    /// Store an order and maintain its indexes
    pub fn put_order(&self, txn: &WriteTransaction, order: &PrintOrder) -> StorageResult<()> {
        let order_id = order.order_id.as_str();
        {
            let mut table = txn.open_table(ORDER_NO_TABLE)?;
            let existing = table
                .get(order.order_no.as_str())?
                .map(|g| g.value().to_string());
            match existing {
                Some(existing) if existing != order_id => {
                    return Err(StorageError::OrderNoConflict {
                        order_no: order.order_no.clone(),
                        existing,
                    });
                }
                Some(_) => {}
                None => {
                    table.insert(order.order_no.as_str(), order_id)?;
                }
            }
        }
        {
            let mut table = txn.open_table(ORDERS_TABLE)?;
            let value = serde_json::to_vec(order)?;
            table.insert(order_id, value.as_slice())?;
        }
        {
            let mut table = txn.open_table(USER_ORDERS_TABLE)?;
            table.insert((order.user_id.as_str(), order_id), ())?;
        }
        let mut pending = txn.open_table(PENDING_PAYMENT_TABLE)?;
        if order.status == OrderStatus::PendingPayment {
            pending.insert(order_id, order.created_at)?;
        } else {
            pending.remove(order_id)?;
        }
        Ok(())
    }

    /// Get an order by ID
    pub fn get_order(&self, order_id: &str) -> StorageResult<Option<PrintOrder>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Get an order by ID (within transaction)
    pub fn get_order_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Option<PrintOrder>> {
        let table = txn.open_table(ORDERS_TABLE)?;
        match table.get(order_id)? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Resolve an order number to its order ID
    pub fn find_order_id_by_no(&self, order_no: &str) -> StorageResult<Option<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDER_NO_TABLE)?;
        Ok(table.get(order_no)?.map(|g| g.value().to_string()))
    }

    /// All orders belonging to a user (unordered)
    pub fn get_user_orders(&self, user_id: &str) -> StorageResult<Vec<PrintOrder>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(USER_ORDERS_TABLE)?;
        let orders = read_txn.open_table(ORDERS_TABLE)?;

        let mut result = Vec::new();
        for entry in index.range((user_id, "")..)? {
            let (key, _) = entry?;
            let (owner, order_id) = key.value();
            if owner != user_id {
                break;
            }
            if let Some(value) = orders.get(order_id)? {
                result.push(decode(value.value())?);
            }
        }
        Ok(result)
    }

    /// All orders
    pub fn get_all_orders(&self) -> StorageResult<Vec<PrintOrder>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ORDERS_TABLE)?;

        let mut orders = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            orders.push(decode(value.value())?);
        }
        Ok(orders)
    }

    /// PENDING_PAYMENT orders as `(order_id, created_at)`
    pub fn get_pending_payment_orders(&self) -> StorageResult<Vec<(String, i64)>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PENDING_PAYMENT_TABLE)?;

        let mut pending = Vec::new();
        for result in table.iter()? {
            let (key, value) = result?;
            pending.push((key.value().to_string(), value.value()));
        }
        Ok(pending)
    }

    // ========== Payments ==========

    /// Order already confirmed with this payment reference
    pub fn get_payment_order_txn(
        &self,
        txn: &WriteTransaction,
        payment_ref: &str,
    ) -> StorageResult<Option<String>> {
        let table = txn.open_table(PAYMENTS_TABLE)?;
        Ok(table.get(payment_ref)?.map(|g| g.value().to_string()))
    }

    pub fn record_payment(
        &self,
        txn: &WriteTransaction,
        payment_ref: &str,
        order_id: &str,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(PAYMENTS_TABLE)?;
        table.insert(payment_ref, order_id)?;
        Ok(())
    }

    // ========== Verification Codes ==========

    /// Whether `code` is currently held by an ACTIVE record
    pub fn is_code_active_txn(&self, txn: &WriteTransaction, code: &str) -> StorageResult<bool> {
        let table = txn.open_table(ACTIVE_CODES_TABLE)?;
        Ok(table.get(code)?.is_some())
    }

    /// Whether a history record with exactly this key exists
    pub fn code_record_exists_txn(
        &self,
        txn: &WriteTransaction,
        code: &str,
        issued_at: i64,
    ) -> StorageResult<bool> {
        let table = txn.open_table(CODES_TABLE)?;
        Ok(table.get((code, issued_at))?.is_some())
    }

    /// Insert a freshly issued ACTIVE code
    pub fn insert_active_code(
        &self,
        txn: &WriteTransaction,
        record: &VerificationCode,
    ) -> StorageResult<()> {
        {
            let mut table = txn.open_table(CODES_TABLE)?;
            let value = serde_json::to_vec(record)?;
            table.insert((record.code.as_str(), record.issued_at), value.as_slice())?;
        }
        {
            let mut table = txn.open_table(ACTIVE_CODES_TABLE)?;
            table.insert(record.code.as_str(), record.issued_at)?;
        }
        let mut table = txn.open_table(ORDER_ACTIVE_CODE_TABLE)?;
        table.insert(record.order_id.as_str(), record.code.as_str())?;
        Ok(())
    }

    /// Persist a code record; a non-ACTIVE record leaves the active indexes
    pub fn update_code(&self, txn: &WriteTransaction, record: &VerificationCode) -> StorageResult<()> {
        {
            let mut table = txn.open_table(CODES_TABLE)?;
            let value = serde_json::to_vec(record)?;
            table.insert((record.code.as_str(), record.issued_at), value.as_slice())?;
        }
        if record.status == CodeStatus::Active {
            return Ok(());
        }

        {
            let mut table = txn.open_table(ACTIVE_CODES_TABLE)?;
            let held_by_record = table
                .get(record.code.as_str())?
                .is_some_and(|g| g.value() == record.issued_at);
            if held_by_record {
                table.remove(record.code.as_str())?;
            }
        }
        let mut table = txn.open_table(ORDER_ACTIVE_CODE_TABLE)?;
        let held_by_record = table
            .get(record.order_id.as_str())?
            .is_some_and(|g| g.value() == record.code);
        if held_by_record {
            table.remove(record.order_id.as_str())?;
        }
        Ok(())
    }

    /// The ACTIVE record for `code` (within transaction)
    pub fn get_active_code_txn(
        &self,
        txn: &WriteTransaction,
        code: &str,
    ) -> StorageResult<Option<VerificationCode>> {
        let issued_at = {
            let table = txn.open_table(ACTIVE_CODES_TABLE)?;
            table.get(code)?.map(|g| g.value())
        };
        let Some(issued_at) = issued_at else {
            return Ok(None);
        };
        let table = txn.open_table(CODES_TABLE)?;
        match table.get((code, issued_at))? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// The ACTIVE record for `code`
    pub fn get_active_code(&self, code: &str) -> StorageResult<Option<VerificationCode>> {
        let read_txn = self.db.begin_read()?;
        let active = read_txn.open_table(ACTIVE_CODES_TABLE)?;
        let codes = read_txn.open_table(CODES_TABLE)?;

        let Some(issued_at) = active.get(code)?.map(|g| g.value()) else {
            return Ok(None);
        };
        match codes.get((code, issued_at))? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// Most recently issued record for `code` regardless of status (within transaction)
    pub fn get_latest_code_txn(
        &self,
        txn: &WriteTransaction,
        code: &str,
    ) -> StorageResult<Option<VerificationCode>> {
        let table = txn.open_table(CODES_TABLE)?;
        let mut range = table.range((code, i64::MIN)..=(code, i64::MAX))?;
        match range.next_back() {
            Some(entry) => {
                let (_key, value) = entry?;
                Ok(Some(decode(value.value())?))
            }
            None => Ok(None),
        }
    }

    /// Most recently issued record for `code` regardless of status
    pub fn get_latest_code(&self, code: &str) -> StorageResult<Option<VerificationCode>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CODES_TABLE)?;
        let mut range = table.range((code, i64::MIN)..=(code, i64::MAX))?;
        match range.next_back() {
            Some(entry) => {
                let (_key, value) = entry?;
                Ok(Some(decode(value.value())?))
            }
            None => Ok(None),
        }
    }

    /// The ACTIVE code of an order (within transaction)
    pub fn get_order_active_code_txn(
        &self,
        txn: &WriteTransaction,
        order_id: &str,
    ) -> StorageResult<Option<VerificationCode>> {
        let code = {
            let table = txn.open_table(ORDER_ACTIVE_CODE_TABLE)?;
            table.get(order_id)?.map(|g| g.value().to_string())
        };
        match code {
            Some(code) => self.get_active_code_txn(txn, &code),
            None => Ok(None),
        }
    }

    /// The ACTIVE code of an order
    pub fn get_order_active_code(&self, order_id: &str) -> StorageResult<Option<VerificationCode>> {
        let read_txn = self.db.begin_read()?;
        let by_order = read_txn.open_table(ORDER_ACTIVE_CODE_TABLE)?;
        let active = read_txn.open_table(ACTIVE_CODES_TABLE)?;
        let codes = read_txn.open_table(CODES_TABLE)?;

        let Some(code) = by_order.get(order_id)?.map(|g| g.value().to_string()) else {
            return Ok(None);
        };
        let Some(issued_at) = active.get(code.as_str())?.map(|g| g.value()) else {
            return Ok(None);
        };
        match codes.get((code.as_str(), issued_at))? {
            Some(value) => Ok(Some(decode(value.value())?)),
            None => Ok(None),
        }
    }

    /// All ACTIVE code records
    pub fn get_active_codes(&self) -> StorageResult<Vec<VerificationCode>> {
        let read_txn = self.db.begin_read()?;
        let active = read_txn.open_table(ACTIVE_CODES_TABLE)?;
        let codes = read_txn.open_table(CODES_TABLE)?;

        let mut result = Vec::new();
        for entry in active.iter()? {
            let (code, issued_at) = entry?;
            if let Some(value) = codes.get((code.value(), issued_at.value()))? {
                result.push(decode(value.value())?);
            }
        }
        Ok(result)
    }

    // ========== Statistics ==========

    /// Get storage statistics
    pub fn get_stats(&self) -> StorageResult<StorageStats> {
        let read_txn = self.db.begin_read()?;

        let orders = read_txn.open_table(ORDERS_TABLE)?;
        let pending = read_txn.open_table(PENDING_PAYMENT_TABLE)?;
        let codes = read_txn.open_table(CODES_TABLE)?;
        let active = read_txn.open_table(ACTIVE_CODES_TABLE)?;
        let payments = read_txn.open_table(PAYMENTS_TABLE)?;

        Ok(StorageStats {
            order_count: orders.len()?,
            pending_payment_count: pending.len()?,
            code_count: codes.len()?,
            active_code_count: active.len()?,
            payment_count: payments.len()?,
        })
    }
}

/// Storage statistics
#[derive(Debug, Clone)]
pub struct StorageStats {
    pub order_count: u64,
    pub pending_payment_count: u64,
    pub code_count: u64,
    pub active_code_count: u64,
    pub payment_count: u64,
}
