//! Booking Store - 预约列表
//!
//! In-memory list seeded from the bookings API (or its built-in fallback)
//! and overlaid with whatever the desk changed locally.

use super::error::ManagerResult;
use crate::store::{BookingOrigin, DeskStorage, StorageError, StoredBooking};
use booking_client::{BookingApi, Source};
use chrono::NaiveDate;
use parking_lot::RwLock;
use shared::models::{Booking, BookingDraft};
use shared::query::{BookingQuery, PaginatedResponse, schedule_for};
use std::collections::HashSet;

/// What a refresh loaded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub source: Source,
    /// Fetch error when the fallback list was used
    pub error: Option<String>,
    pub total: usize,
    /// Records where the local copy won over the remote one
    pub local_overrides: usize,
    /// Local-only records appended after the remote list
    pub local_only: usize,
    /// Local records rewritten because the remote status progressed further
    pub superseded: usize,
}

/// A newly created booking and where it was created
#[derive(Debug, Clone, PartialEq)]
pub struct Created {
    pub booking: Booking,
    pub origin: BookingOrigin,
}

pub struct BookingStore {
    api: BookingApi,
    storage: DeskStorage,
    bookings: RwLock<Vec<Booking>>,
}

impl BookingStore {
    pub fn new(api: BookingApi, storage: DeskStorage) -> Self {
        Self {
            api,
            storage,
            bookings: RwLock::new(Vec::new()),
        }
    }

    /// Reload from the API and merge the local records in
    ///
    /// A local record wins unless the remote copy has progressed further
    /// through the status lifecycle. Local-only bookings (created offline)
    /// are appended in id order.
    pub async fn refresh(&self) -> ManagerResult<RefreshReport> {
        let fetched = self.api.list_bookings().await?;
        let local = self.storage.get_all_bookings()?;
        let (merged, local_overrides, local_only) = merge(fetched.value, local.clone());
        let superseded = self.persist_superseded(&local, &merged)?;

        let report = RefreshReport {
            source: fetched.source,
            error: fetched.error,
            total: merged.len(),
            local_overrides,
            local_only,
            superseded,
        };
        tracing::info!(
            source = ?report.source,
            total = report.total,
            local_overrides,
            local_only,
            superseded,
            "Booking store refreshed"
        );
        *self.bookings.write() = merged;
        Ok(report)
    }

    /// Overwrite local rows the remote list moved past, so the redb copy
    /// never holds an older status than the store shows
    fn persist_superseded(&self, local: &[StoredBooking], merged: &[Booking]) -> ManagerResult<usize> {
        let rows: Vec<StoredBooking> = local
            .iter()
            .filter_map(|stored| {
                let current = merged.iter().find(|b| b.id == stored.booking.id)?;
                (current.status != stored.booking.status)
                    .then(|| StoredBooking::new(current.clone(), stored.origin))
            })
            .collect();
        if rows.is_empty() {
            return Ok(0);
        }
        let txn = self.storage.begin_write()?;
        for row in &rows {
            tracing::info!(
                booking_id = row.booking.id,
                status = %row.booking.status,
                "Local copy superseded by the API"
            );
            self.storage.put_booking(&txn, row)?;
        }
        txn.commit().map_err(StorageError::from)?;
        Ok(rows.len())
    }

    /// Load the locally stored records only (no network)
    pub fn load_local(&self) -> ManagerResult<usize> {
        let (merged, _, _) = merge(Vec::new(), self.storage.get_all_bookings()?);
        let count = merged.len();
        *self.bookings.write() = merged;
        Ok(count)
    }

    /// Submit a new booking. Falls back to a locally synthesized pending
    /// booking when the API is unreachable.
    pub async fn create(&self, draft: BookingDraft) -> ManagerResult<Created> {
        let fetched = self.api.submit_booking(draft).await?;
        let origin = match fetched.source {
            Source::Remote => BookingOrigin::Remote,
            Source::Fallback => BookingOrigin::Local,
        };
        let booking = fetched.value;

        let txn = self.storage.begin_write()?;
        self.storage
            .put_booking(&txn, &StoredBooking::new(booking.clone(), origin))?;
        txn.commit().map_err(StorageError::from)?;

        self.upsert(booking.clone());
        tracing::info!(booking_id = booking.id, origin = ?origin, "Booking created");
        Ok(Created { booking, origin })
    }

    pub fn list(&self) -> Vec<Booking> {
        self.bookings.read().clone()
    }

    pub fn len(&self) -> usize {
        self.bookings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookings.read().is_empty()
    }

    pub fn get(&self, id: i64) -> Option<Booking> {
        self.bookings.read().iter().find(|b| b.id == id).cloned()
    }

    /// Filtered, sorted page
    pub fn query(&self, query: &BookingQuery) -> PaginatedResponse<Booking> {
        query.page(&self.bookings.read())
    }

    /// Every booking matching the filter, in display order (all pages)
    pub fn filtered(&self, query: &BookingQuery) -> Vec<Booking> {
        query.filter_sorted(&self.bookings.read())
    }

    /// One customer's bookings from the last six months
    pub fn schedule(&self, phone: &str, today: NaiveDate, page: u32) -> PaginatedResponse<Booking> {
        schedule_for(&self.bookings.read(), phone, today, page)
    }

    /// Replace the in-memory copy, keeping its position
    pub(crate) fn upsert(&self, booking: Booking) {
        let mut bookings = self.bookings.write();
        match bookings.iter_mut().find(|b| b.id == booking.id) {
            Some(slot) => *slot = booking,
            None => bookings.push(booking),
        }
    }
}

/// Remote list overlaid with local records.
///
/// Returns the merged list, how many local records replaced a remote one,
/// and how many were local-only.
fn merge(remote: Vec<Booking>, local: Vec<StoredBooking>) -> (Vec<Booking>, usize, usize) {
    let mut local = local;
    local.sort_by_key(|s| s.booking.id);

    let remote_ids: HashSet<i64> = remote.iter().map(|b| b.id).collect();
    let mut overrides = 0;
    let mut merged: Vec<Booking> = remote
        .into_iter()
        .map(|remote_booking| {
            match local.iter().find(|s| s.booking.id == remote_booking.id) {
                Some(stored)
                    if stored.booking.status.progress_rank()
                        >= remote_booking.status.progress_rank() =>
                {
                    if stored.booking != remote_booking {
                        overrides += 1;
                    }
                    stored.booking.clone()
                }
                _ => remote_booking,
            }
        })
        .collect();

    let local_only: Vec<Booking> = local
        .into_iter()
        .filter(|s| !remote_ids.contains(&s.booking.id))
        .map(|s| s.booking)
        .collect();
    let local_only_count = local_only.len();
    merged.extend(local_only);
    (merged, overrides, local_only_count)
}
