use booking_client::mock_bookings;
use parking_lot::RwLock;
use shared::booking::BookingStatus;
use shared::models::Booking;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// In-memory state behind the mock API
#[derive(Debug)]
pub struct AppState {
    bookings: RwLock<Vec<Booking>>,
    next_id: AtomicU64,
    /// Template sends to reject before accepting again
    zns_failures: AtomicU32,
    zns_sent: AtomicU32,
}

impl AppState {
    /// Seeded with the five demo bookings
    pub fn seeded() -> Self {
        Self::with_bookings(mock_bookings())
    }

    pub fn with_bookings(bookings: Vec<Booking>) -> Self {
        let next = bookings.iter().map(|b| b.id).max().unwrap_or(0) + 1;
        Self {
            bookings: RwLock::new(bookings),
            next_id: AtomicU64::new(next.max(1) as u64),
            zns_failures: AtomicU32::new(0),
            zns_sent: AtomicU32::new(0),
        }
    }

    /// Reject the next `n` template sends
    pub fn fail_next_zns(&self, n: u32) {
        self.zns_failures.store(n, Ordering::SeqCst);
    }

    /// Accepted template sends so far
    pub fn zns_sent(&self) -> u32 {
        self.zns_sent.load(Ordering::SeqCst)
    }

    pub(crate) fn take_zns_failure(&self) -> bool {
        self.zns_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    pub(crate) fn record_zns_sent(&self) -> u32 {
        self.zns_sent.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn list(&self) -> Vec<Booking> {
        self.bookings.read().clone()
    }

    pub fn get(&self, id: i64) -> Option<Booking> {
        self.bookings.read().iter().find(|b| b.id == id).cloned()
    }

    pub fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) as i64
    }

    /// Move a booking on the backend side, as another admin would
    pub fn set_status(&self, id: i64, status: BookingStatus) -> bool {
        match self.bookings.write().iter_mut().find(|b| b.id == id) {
            Some(b) => {
                b.status = status;
                true
            }
            None => false,
        }
    }

    pub fn insert(&self, booking: Booking) {
        self.bookings.write().push(booking);
    }
}
