//! PointsLedger - 积分账本
//!
//! Customer balances and the append-only history behind the admin
//! adjustment screen. Balances never go below zero.

use crate::export::{self, ExportError};
use crate::notify::OutboxEntry;
use crate::preferences::{LastPointsExport, LastPointsReminder, PreferenceError, PreferenceStore};
use crate::store::{DeskStorage, StorageError, StorageResult};
use chrono::{DateTime, Local, Months};
use redb::WriteTransaction;
use shared::booking::points::apply_delta;
use shared::error::{AppError, ErrorCode};
use shared::models::{Customer, PointsDirection, PointsRecord, seed_customers};
use shared::notification::{self, TemplateContext};
use shared::query::{HISTORY_MONTHS, PAGE_SIZE, PaginatedResponse, paginate};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;

/// Reminder to export and prune shows again after this long (5 × 30 days)
pub const REMINDER_INTERVAL_MS: i64 = 5 * 30 * 24 * 60 * 60 * 1000;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Preference error: {0}")]
    Preference(#[from] PreferenceError),

    #[error("Customer not found: {0}")]
    CustomerNotFound(String),

    #[error("Amount must be a positive number, got {0:?}")]
    InvalidAmount(String),

    #[error("Invalid direction: {0}")]
    InvalidDirection(String),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Storage(e) => AppError::storage(e.to_string()),
            LedgerError::Preference(e) => e.into(),
            LedgerError::CustomerNotFound(phone) => AppError::customer_not_found(phone),
            e @ LedgerError::InvalidAmount(_) => {
                AppError::with_message(ErrorCode::InvalidAmount, e.to_string())
            }
            e @ LedgerError::InvalidDirection(_) => {
                AppError::with_message(ErrorCode::InvalidDirection, e.to_string())
            }
            LedgerError::Export(ExportError::NothingToExport) => {
                AppError::with_message(ErrorCode::NothingToExport, "Nothing to export")
            }
            LedgerError::Export(e) => AppError::with_message(ErrorCode::InternalError, e.to_string()),
        }
    }
}

/// Name / phone filter of the history list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryFilter {
    /// Case-insensitive substring of the customer name
    pub name: Option<String>,
    /// Substring of the phone
    pub phone: Option<String>,
}

impl HistoryFilter {
    pub fn new(name: Option<String>, phone: Option<String>) -> Self {
        let clean = |v: Option<String>| v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            name: clean(name),
            phone: clean(phone),
        }
    }

    pub fn is_filtered(&self) -> bool {
        self.name.is_some() || self.phone.is_some()
    }

    pub fn matches(&self, record: &PointsRecord) -> bool {
        let name_ok = self
            .name
            .as_ref()
            .is_none_or(|n| record.name.to_lowercase().contains(&n.to_lowercase()));
        let phone_ok = self
            .phone
            .as_ref()
            .is_none_or(|p| record.phone.contains(p.as_str()));
        name_ok && phone_ok
    }
}

/// Start of the six-month history window
pub fn history_cutoff_ms(now: DateTime<Local>) -> i64 {
    now.checked_sub_months(Months::new(HISTORY_MONTHS))
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(i64::MIN)
}

/// `"15"` → 15. Zero, negative and non-numeric input is rejected.
pub fn parse_amount(raw: &str) -> LedgerResult<i64> {
    match raw.trim().parse::<i64>() {
        Ok(amount) if amount > 0 => Ok(amount),
        _ => Err(LedgerError::InvalidAmount(raw.to_string())),
    }
}

pub fn parse_direction(raw: &str) -> LedgerResult<PointsDirection> {
    raw.parse().map_err(LedgerError::InvalidDirection)
}

/// Credit (or debit) a customer inside the caller's transaction.
///
/// The customer is created with a zero balance when missing. The record
/// keeps the requested change; the balance is clamped at zero.
pub(crate) fn credit_txn(
    storage: &DeskStorage,
    txn: &WriteTransaction,
    phone: &str,
    name: &str,
    change: i64,
    reason: &str,
    now_ms: i64,
) -> StorageResult<PointsRecord> {
    let mut customer = storage
        .get_customer_txn(txn, phone)?
        .unwrap_or_else(|| Customer::new(phone, name, 0));
    customer.points = apply_delta(customer.points, change);
    storage.put_customer(txn, &customer)?;

    storage.append_points_record(
        txn,
        PointsRecord {
            id: 0,
            phone: customer.phone.clone(),
            name: customer.name.clone(),
            change,
            new_total: customer.points,
            reason: reason.to_string(),
            timestamp: now_ms,
        },
    )
}

pub struct PointsLedger {
    storage: DeskStorage,
    preferences: PreferenceStore,
    context: TemplateContext,
    /// Queue `PointsUpdated` messages (only when a template is registered)
    notify_points: bool,
    wake_tx: Option<mpsc::Sender<()>>,
}

impl PointsLedger {
    /// Open the ledger, seeding the customer list on first use
    pub fn open(storage: DeskStorage, context: TemplateContext) -> LedgerResult<Self> {
        if storage.seed_customers_if_empty(&seed_customers())? {
            tracing::info!("Customer list seeded");
        }
        Ok(Self {
            preferences: PreferenceStore::new(storage.clone()),
            storage,
            context,
            notify_points: false,
            wake_tx: None,
        })
    }

    pub fn with_points_notifications(mut self, enabled: bool) -> Self {
        self.notify_points = enabled;
        self
    }

    pub fn with_wake(mut self, wake_tx: mpsc::Sender<()>) -> Self {
        self.wake_tx = Some(wake_tx);
        self
    }

    pub fn customers(&self) -> LedgerResult<Vec<Customer>> {
        Ok(self.storage.get_all_customers()?)
    }

    /// Exact phone match
    pub fn find_customer(&self, phone: &str) -> LedgerResult<Option<Customer>> {
        Ok(self.storage.get_customer(phone.trim())?)
    }

    /// Manual adjustment from the admin screen
    pub fn adjust(
        &self,
        phone: &str,
        direction: PointsDirection,
        amount: &str,
    ) -> LedgerResult<PointsRecord> {
        let amount = parse_amount(amount)?;
        let phone = phone.trim();

        let txn = self.storage.begin_write()?;
        let customer = self
            .storage
            .get_customer_txn(&txn, phone)?
            .ok_or_else(|| LedgerError::CustomerNotFound(phone.to_string()))?;
        let record = credit_txn(
            &self.storage,
            &txn,
            &customer.phone,
            &customer.name,
            direction.signed(amount),
            direction.reason(),
            shared::util::now_millis(),
        )?;
        if self.notify_points {
            let request = notification::points_updated(&record, &self.context);
            self.storage
                .enqueue_notification(&txn, &OutboxEntry::new(request))?;
        }
        txn.commit().map_err(StorageError::from)?;

        crate::audit_log!(
            "points_adjusted",
            phone = record.phone.as_str(),
            change = record.change,
            old_total = customer.points,
            new_total = record.new_total,
        );
        if self.notify_points {
            if let Some(tx) = &self.wake_tx {
                let _ = tx.try_send(());
            }
        }
        Ok(record)
    }

    /// Records of the last six months matching `filter`, newest first
    pub fn history_all(
        &self,
        filter: &HistoryFilter,
        now: DateTime<Local>,
    ) -> LedgerResult<Vec<PointsRecord>> {
        let cutoff = history_cutoff_ms(now);
        let mut rows: Vec<PointsRecord> = self
            .storage
            .get_points_history()?
            .into_iter()
            .filter(|r| r.timestamp >= cutoff)
            .filter(|r| filter.matches(r))
            .collect();
        // newest first, later records first on equal timestamps
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    /// One page (20 rows) of the history list
    pub fn history(
        &self,
        filter: &HistoryFilter,
        page: u32,
        now: DateTime<Local>,
    ) -> LedgerResult<PaginatedResponse<PointsRecord>> {
        let rows = self.history_all(filter, now)?;
        Ok(paginate(&rows, page, PAGE_SIZE))
    }

    /// Delete records older than the six-month window
    pub fn prune_older_than_six_months(&self, now: DateTime<Local>) -> LedgerResult<usize> {
        let removed = self
            .storage
            .remove_points_records_before(history_cutoff_ms(now))?;
        crate::audit_log!("points_history_pruned", removed = removed);
        Ok(removed)
    }

    pub fn reminder_due(&self, now: DateTime<Local>) -> LedgerResult<bool> {
        Ok(match self.preferences.get::<LastPointsReminder>()? {
            Some(last) => now.timestamp_millis() - last > REMINDER_INTERVAL_MS,
            None => true,
        })
    }

    pub fn acknowledge_reminder(&self, now: DateTime<Local>) -> LedgerResult<()> {
        self.preferences
            .set::<LastPointsReminder>(&Some(now.timestamp_millis()))?;
        Ok(())
    }

    /// Write the filtered history to `dir` and remember the export time.
    /// Returns the file path and the number of rows.
    pub fn export_history(
        &self,
        dir: &Path,
        filter: &HistoryFilter,
        now: DateTime<Local>,
    ) -> LedgerResult<(PathBuf, usize)> {
        let rows = self.history_all(filter, now)?;
        let file_name = export::points_file_name(
            now.date_naive(),
            filter.name.as_deref(),
            filter.phone.as_deref(),
        );
        let path = dir.join(file_name);
        let count = export::export_to_file(&path, &rows, export::write_points_csv)?;
        self.preferences
            .set::<LastPointsExport>(&Some(now.timestamp_millis()))?;
        Ok((path, count))
    }
}
