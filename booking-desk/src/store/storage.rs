//! redb-based storage layer for the booking desk
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `bookings` | `booking_id` | `StoredBooking` | Local booking state |
//! | `outbox_pending` | `entry_id` | `OutboxEntry` | Notifications waiting to be sent |
//! | `outbox_dead_letter` | `entry_id` | `DeadLetterEntry` | Exhausted retries |
//! | `outbox_delivered` | `entry_id` | `DeliveredEntry` | Sent notifications |
//! | `customers` | `phone` | `Customer` | Points balances |
//! | `points_history` | `record_id` | `PointsRecord` | Points changes (append-only, pruned) |
//! | `preferences` | `key` | JSON value | Typed preferences |
//! | `meta` | `name` | `u64` | Schema version, sequences |
//!
//! # Durability
//!
//! Every multi-record change (booking + outbox entry + points) is one write
//! transaction. Callers get the transaction from [`DeskStorage::begin_write`]
//! and pass it to the `*_txn` style methods below.

use crate::notify::outbox::{DeadLetterEntry, DeliveredEntry, OutboxEntry, OutboxStats};
use booking_client::DeliveryReceipt;
use redb::{
    Database, ReadableDatabase, ReadableTable, ReadableTableMetadata, TableDefinition,
    WriteTransaction,
};
use serde::{Deserialize, Serialize};
use shared::models::{Booking, Customer, PointsRecord};
use shared::util::now_millis;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Table for bookings: key = booking id, value = JSON-serialized StoredBooking
const BOOKINGS_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("bookings");

/// Table for pending notifications: key = entry id, value = JSON-serialized OutboxEntry
const OUTBOX_PENDING_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("outbox_pending");

/// Table for dead letters: key = entry id, value = JSON-serialized DeadLetterEntry
const OUTBOX_DEAD_LETTER_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("outbox_dead_letter");

/// Table for delivered notifications: key = entry id, value = JSON-serialized DeliveredEntry
const OUTBOX_DELIVERED_TABLE: TableDefinition<&str, &[u8]> =
    TableDefinition::new("outbox_delivered");

/// Table for customers: key = phone, value = JSON-serialized Customer
const CUSTOMERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("customers");

/// Table for points history: key = record id (sequence), value = JSON-serialized PointsRecord
const POINTS_HISTORY_TABLE: TableDefinition<i64, &[u8]> = TableDefinition::new("points_history");

/// Table for preferences: key = preference key, value = JSON
const PREFERENCES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("preferences");

/// Table for metadata: key = name, value = u64
const META_TABLE: TableDefinition<&str, u64> = TableDefinition::new("meta");

pub const SCHEMA_VERSION_KEY: &str = "schema_version";
const POINTS_SEQUENCE_KEY: &str = "points_seq";

/// Where a locally stored booking came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingOrigin {
    /// Returned by the bookings API
    Remote,
    /// Synthesized while the API was unreachable
    Local,
}

/// Booking plus local-only metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredBooking {
    pub booking: Booking,
    pub origin: BookingOrigin,
    pub updated_at: i64,
}

impl StoredBooking {
    pub fn new(booking: Booking, origin: BookingOrigin) -> Self {
        Self {
            booking,
            origin,
            updated_at: now_millis(),
        }
    }
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

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Desk storage backed by redb
#[derive(Clone)]
pub struct DeskStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for DeskStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeskStorage").finish_non_exhaustive()
    }
}

impl DeskStorage {
    /// Open or create the database at the given path
    ///
    /// The parent directory is created when missing.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
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
        // Initialize tables
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(BOOKINGS_TABLE)?;
            let _ = write_txn.open_table(OUTBOX_PENDING_TABLE)?;
            let _ = write_txn.open_table(OUTBOX_DEAD_LETTER_TABLE)?;
            let _ = write_txn.open_table(OUTBOX_DELIVERED_TABLE)?;
            let _ = write_txn.open_table(CUSTOMERS_TABLE)?;
            let _ = write_txn.open_table(POINTS_HISTORY_TABLE)?;
            let _ = write_txn.open_table(PREFERENCES_TABLE)?;
            let _ = write_txn.open_table(META_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    /// Begin a write transaction
    pub fn begin_write(&self) -> StorageResult<WriteTransaction> {
        Ok(self.db.begin_write()?)
    }

    // ========== Meta ==========

    pub fn get_meta(&self, key: &str) -> StorageResult<Option<u64>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(META_TABLE)?;
        Ok(table.get(key)?.map(|guard| guard.value()))
    }

    pub fn set_meta(&self, txn: &WriteTransaction, key: &str, value: u64) -> StorageResult<()> {
        let mut table = txn.open_table(META_TABLE)?;
        table.insert(key, value)?;
        Ok(())
    }

    /// Increment and return a named sequence (within transaction)
    fn next_sequence(&self, txn: &WriteTransaction, key: &str) -> StorageResult<u64> {
        let mut table = txn.open_table(META_TABLE)?;
        let current = table.get(key)?.map(|guard| guard.value()).unwrap_or(0);
        let next = current + 1;
        table.insert(key, next)?;
        Ok(next)
    }

    // ========== Bookings ==========

    pub fn put_booking(&self, txn: &WriteTransaction, stored: &StoredBooking) -> StorageResult<()> {
        let mut table = txn.open_table(BOOKINGS_TABLE)?;
        let value = serde_json::to_vec(stored)?;
        table.insert(stored.booking.id, value.as_slice())?;
        Ok(())
    }

    pub fn get_booking(&self, id: i64) -> StorageResult<Option<StoredBooking>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BOOKINGS_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Read a booking inside a write transaction
    pub fn get_booking_txn(
        &self,
        txn: &WriteTransaction,
        id: i64,
    ) -> StorageResult<Option<StoredBooking>> {
        let table = txn.open_table(BOOKINGS_TABLE)?;
        let stored = match table.get(id)? {
            Some(value) => Some(serde_json::from_slice(value.value())?),
            None => None,
        };
        Ok(stored)
    }

    pub fn get_all_bookings(&self) -> StorageResult<Vec<StoredBooking>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(BOOKINGS_TABLE)?;

        let mut bookings = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            bookings.push(serde_json::from_slice(value.value())?);
        }
        Ok(bookings)
    }

    // ========== Outbox ==========

    /// Add a notification to the outbox (within transaction)
    pub fn enqueue_notification(
        &self,
        txn: &WriteTransaction,
        entry: &OutboxEntry,
    ) -> StorageResult<()> {
        let mut table = txn.open_table(OUTBOX_PENDING_TABLE)?;
        let value = serde_json::to_vec(entry)?;
        table.insert(entry.id.as_str(), value.as_slice())?;
        Ok(())
    }

    /// Get all pending notifications, oldest first
    pub fn get_pending_notifications(&self) -> StorageResult<Vec<OutboxEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OUTBOX_PENDING_TABLE)?;

        let mut entries: Vec<OutboxEntry> = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            entries.push(serde_json::from_slice(value.value())?);
        }
        entries.sort_by_key(|e| e.created_at);
        Ok(entries)
    }

    pub fn get_pending_notification(&self, id: &str) -> StorageResult<Option<OutboxEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OUTBOX_PENDING_TABLE)?;
        match table.get(id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Move a pending entry to the delivered table
    pub fn mark_notification_delivered(
        &self,
        id: &str,
        receipt: &DeliveryReceipt,
    ) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut pending_table = txn.open_table(OUTBOX_PENDING_TABLE)?;
            let mut delivered_table = txn.open_table(OUTBOX_DELIVERED_TABLE)?;

            // Read and clone first to avoid borrow conflict
            let pending_opt = if let Some(value) = pending_table.get(id)? {
                let entry: OutboxEntry = serde_json::from_slice(value.value())?;
                Some(entry)
            } else {
                None
            };

            if let Some(entry) = pending_opt {
                let delivered = DeliveredEntry::from_receipt(&entry, receipt);
                let value = serde_json::to_vec(&delivered)?;
                delivered_table.insert(id, value.as_slice())?;
                pending_table.remove(id)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Record a failed attempt, increment retry count
    pub fn mark_notification_failed(&self, id: &str, error: &str) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut table = txn.open_table(OUTBOX_PENDING_TABLE)?;

            let pending_opt = if let Some(value) = table.get(id)? {
                let entry: OutboxEntry = serde_json::from_slice(value.value())?;
                Some(entry)
            } else {
                None
            };

            if let Some(mut entry) = pending_opt {
                entry.retry_count += 1;
                entry.last_error = Some(error.to_string());
                entry.last_attempt_at = Some(now_millis());
                let new_value = serde_json::to_vec(&entry)?;
                table.insert(id, new_value.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Move a pending entry to the dead letter table
    pub fn move_notification_to_dead_letter(&self, id: &str, error: &str) -> StorageResult<()> {
        let txn = self.begin_write()?;
        {
            let mut pending_table = txn.open_table(OUTBOX_PENDING_TABLE)?;
            let mut dead_letter_table = txn.open_table(OUTBOX_DEAD_LETTER_TABLE)?;

            let pending_opt = if let Some(value) = pending_table.get(id)? {
                let entry: OutboxEntry = serde_json::from_slice(value.value())?;
                Some(entry)
            } else {
                None
            };

            if let Some(entry) = pending_opt {
                let dead_letter = DeadLetterEntry {
                    entry,
                    failed_at: now_millis(),
                    last_error: error.to_string(),
                };
                let value = serde_json::to_vec(&dead_letter)?;
                dead_letter_table.insert(id, value.as_slice())?;
                pending_table.remove(id)?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    /// Get all dead letter entries
    pub fn get_dead_letters(&self) -> StorageResult<Vec<DeadLetterEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OUTBOX_DEAD_LETTER_TABLE)?;

        let mut entries = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            entries.push(serde_json::from_slice(value.value())?);
        }
        Ok(entries)
    }

    /// Move all dead letter entries back to pending (reset retry count)
    ///
    /// Used at worker startup to retry notifications that failed in an
    /// earlier run.
    pub fn recover_dead_letters(&self) -> StorageResult<usize> {
        let txn = self.begin_write()?;
        let count = {
            let mut pending_table = txn.open_table(OUTBOX_PENDING_TABLE)?;
            let mut dead_letter_table = txn.open_table(OUTBOX_DEAD_LETTER_TABLE)?;

            // Collect first (can't iterate and mutate simultaneously)
            let mut dead: Vec<DeadLetterEntry> = Vec::new();
            for result in dead_letter_table.iter()? {
                let (_key, value) = result?;
                dead.push(serde_json::from_slice(value.value())?);
            }

            if dead.is_empty() {
                return Ok(0);
            }

            for letter in &dead {
                let id = letter.entry.id.clone();
                let value = serde_json::to_vec(&letter.entry.clone().reset())?;
                pending_table.insert(id.as_str(), value.as_slice())?;
                dead_letter_table.remove(id.as_str())?;
            }
            dead.len()
        };
        txn.commit()?;
        Ok(count)
    }

    pub fn get_delivered_notifications(&self) -> StorageResult<Vec<DeliveredEntry>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(OUTBOX_DELIVERED_TABLE)?;

        let mut entries: Vec<DeliveredEntry> = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            entries.push(serde_json::from_slice(value.value())?);
        }
        entries.sort_by_key(|e| e.delivered_at);
        Ok(entries)
    }

    pub fn get_outbox_stats(&self) -> StorageResult<OutboxStats> {
        let read_txn = self.db.begin_read()?;
        let pending = read_txn.open_table(OUTBOX_PENDING_TABLE)?;
        let dead_letter = read_txn.open_table(OUTBOX_DEAD_LETTER_TABLE)?;
        let delivered = read_txn.open_table(OUTBOX_DELIVERED_TABLE)?;

        Ok(OutboxStats {
            pending: pending.len()?,
            dead_letter: dead_letter.len()?,
            delivered: delivered.len()?,
        })
    }

    // ========== Customers & points ==========

    pub fn get_customer(&self, phone: &str) -> StorageResult<Option<Customer>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CUSTOMERS_TABLE)?;
        match table.get(phone)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    pub fn get_customer_txn(
        &self,
        txn: &WriteTransaction,
        phone: &str,
    ) -> StorageResult<Option<Customer>> {
        let table = txn.open_table(CUSTOMERS_TABLE)?;
        let customer = match table.get(phone)? {
            Some(value) => Some(serde_json::from_slice(value.value())?),
            None => None,
        };
        Ok(customer)
    }

    pub fn put_customer(&self, txn: &WriteTransaction, customer: &Customer) -> StorageResult<()> {
        let mut table = txn.open_table(CUSTOMERS_TABLE)?;
        let value = serde_json::to_vec(customer)?;
        table.insert(customer.phone.as_str(), value.as_slice())?;
        Ok(())
    }

    pub fn get_all_customers(&self) -> StorageResult<Vec<Customer>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(CUSTOMERS_TABLE)?;

        let mut customers = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            customers.push(serde_json::from_slice(value.value())?);
        }
        Ok(customers)
    }

    /// Insert `seed` when the customer table is empty. Returns whether it did.
    pub fn seed_customers_if_empty(&self, seed: &[Customer]) -> StorageResult<bool> {
        let txn = self.begin_write()?;
        let seeded = {
            let mut table = txn.open_table(CUSTOMERS_TABLE)?;
            if table.len()? > 0 {
                false
            } else {
                for customer in seed {
                    let value = serde_json::to_vec(customer)?;
                    table.insert(customer.phone.as_str(), value.as_slice())?;
                }
                true
            }
        };
        txn.commit()?;
        Ok(seeded)
    }

    /// Append a history record, assigning its id (within transaction)
    pub fn append_points_record(
        &self,
        txn: &WriteTransaction,
        mut record: PointsRecord,
    ) -> StorageResult<PointsRecord> {
        record.id = self.next_sequence(txn, POINTS_SEQUENCE_KEY)? as i64;
        let mut table = txn.open_table(POINTS_HISTORY_TABLE)?;
        let value = serde_json::to_vec(&record)?;
        table.insert(record.id, value.as_slice())?;
        Ok(record)
    }

    /// All history records in insertion order
    pub fn get_points_history(&self) -> StorageResult<Vec<PointsRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(POINTS_HISTORY_TABLE)?;

        let mut records = Vec::new();
        for result in table.iter()? {
            let (_key, value) = result?;
            records.push(serde_json::from_slice(value.value())?);
        }
        Ok(records)
    }

    /// Delete records with `timestamp < cutoff_ms`. Returns the count removed.
    pub fn remove_points_records_before(&self, cutoff_ms: i64) -> StorageResult<usize> {
        let txn = self.begin_write()?;
        let removed = {
            let mut table = txn.open_table(POINTS_HISTORY_TABLE)?;
            let mut stale: Vec<i64> = Vec::new();
            for result in table.iter()? {
                let (key, value) = result?;
                let record: PointsRecord = serde_json::from_slice(value.value())?;
                if record.timestamp < cutoff_ms {
                    stale.push(key.value());
                }
            }
            for id in &stale {
                table.remove(*id)?;
            }
            stale.len()
        };
        txn.commit()?;
        Ok(removed)
    }

    // ========== Preferences ==========

    pub fn get_preference(&self, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PREFERENCES_TABLE)?;
        Ok(table.get(key)?.map(|guard| guard.value().to_vec()))
    }

    pub fn put_preference(
        &self,
        txn: &WriteTransaction,
        key: &str,
        value: &[u8],
    ) -> StorageResult<()> {
        let mut table = txn.open_table(PREFERENCES_TABLE)?;
        table.insert(key, value)?;
        Ok(())
    }

    pub fn remove_preference(&self, txn: &WriteTransaction, key: &str) -> StorageResult<()> {
        let mut table = txn.open_table(PREFERENCES_TABLE)?;
        table.remove(key)?;
        Ok(())
    }

    pub fn get_preference_keys(&self) -> StorageResult<Vec<String>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(PREFERENCES_TABLE)?;

        let mut keys = Vec::new();
        for result in table.iter()? {
            let (key, _value) = result?;
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }
}
