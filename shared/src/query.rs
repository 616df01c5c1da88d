//! List queries over bookings
//!
//! Filtering, priority ordering and page slicing for the approval list and
//! the customer schedule. Everything here works on in-memory slices; the
//! desk hands in its current booking list.

use crate::booking::BookingStatus;
use crate::models::Booking;
use crate::util::{months_before, parse_booking_date};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::fmt;
use std::str::FromStr;

/// Rows per page in every list
pub const PAGE_SIZE: u32 = 20;
/// Page numbers shown by the pager
pub const PAGE_WINDOW: u32 = 5;
/// Schedule and points history look back this many months
pub const HISTORY_MONTHS: u32 = 6;

/// 分页响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    /// Rows of the current page
    pub data: Vec<T>,
    /// Total rows matching the filter
    pub total: u64,
    /// Current page (1-based, after clamping)
    pub page: u32,
    pub limit: u32,
    /// 0 when nothing matched
    pub total_pages: u32,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: u64, page: u32, limit: u32) -> Self {
        let total_pages = if limit > 0 {
            total.div_ceil(u64::from(limit)) as u32
        } else {
            1
        };

        Self {
            data,
            total,
            page,
            limit,
            total_pages,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Pager buttons for this page
    pub fn window(&self) -> Vec<u32> {
        page_window(self.page, self.total_pages)
    }
}

/// Slice `items` into the requested page.
///
/// The page is clamped to `[1, total_pages]`, so asking for page 9 of 3
/// returns page 3.
pub fn paginate<T: Clone>(items: &[T], page: u32, limit: u32) -> PaginatedResponse<T> {
    let limit = limit.max(1);
    let total = items.len() as u64;
    let total_pages = total.div_ceil(u64::from(limit)) as u32;
    let page = page.clamp(1, total_pages.max(1));
    let start = ((page - 1) * limit) as usize;
    let data = items
        .iter()
        .skip(start)
        .take(limit as usize)
        .cloned()
        .collect();
    PaginatedResponse::new(data, total, page, limit)
}

/// Up to five page numbers around `current`
pub fn page_window(current: u32, total_pages: u32) -> Vec<u32> {
    if total_pages == 0 {
        return Vec::new();
    }
    let len = PAGE_WINDOW.min(total_pages);
    let first = if total_pages <= PAGE_WINDOW || current <= 3 {
        1
    } else if current >= total_pages - 2 {
        total_pages - PAGE_WINDOW + 1
    } else {
        current - 2
    };
    (first..first + len).collect()
}

/// Status filter of the approval list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusFilter {
    #[default]
    All,
    #[serde(untagged)]
    Only(BookingStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: BookingStatus) -> bool {
        match self {
            Self::All => true,
            Self::Only(s) => *s == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse::<BookingStatus>()
            .map(Self::Only)
            .map_err(|e| e.to_string())
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(s) => write!(f, "{}", s),
        }
    }
}

/// Approval list query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingQuery {
    pub status: StatusFilter,
    /// Case-insensitive substring of the customer name
    pub name: Option<String>,
    /// Substring of the phone number
    pub phone: Option<String>,
    /// 1-based
    pub page: u32,
}

impl BookingQuery {
    pub fn new() -> Self {
        Self {
            page: 1,
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: StatusFilter) -> Self {
        self.status = status;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Whether any filter narrows the list
    pub fn is_filtered(&self) -> bool {
        self.status != StatusFilter::All
            || self.name.as_deref().is_some_and(|s| !s.trim().is_empty())
            || self.phone.as_deref().is_some_and(|s| !s.trim().is_empty())
    }

    pub fn matches(&self, booking: &Booking) -> bool {
        if !self.status.matches(booking.status) {
            return false;
        }
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if !booking
                .name()
                .to_lowercase()
                .contains(&name.to_lowercase())
            {
                return false;
            }
        }
        if let Some(phone) = self.phone.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            if !booking.phone().contains(phone) {
                return false;
            }
        }
        true
    }

    /// Every matching booking, in display order
    pub fn filter_sorted(&self, bookings: &[Booking]) -> Vec<Booking> {
        let mut rows: Vec<Booking> = bookings
            .iter()
            .filter(|b| self.matches(b))
            .cloned()
            .collect();
        sort_for_display(&mut rows);
        rows
    }

    /// The requested page of matching bookings
    pub fn page(&self, bookings: &[Booking]) -> PaginatedResponse<Booking> {
        paginate(&self.filter_sorted(bookings), self.page, PAGE_SIZE)
    }
}

/// Status priority first, then newest date. Undated rows go last within
/// their status. Stable.
pub fn sort_for_display(rows: &mut [Booking]) {
    rows.sort_by_key(|b| {
        let date = parse_booking_date(b.date());
        (b.status.priority(), date.is_none(), Reverse(date))
    });
}

/// Compare two bookings by date, newest first; undated last
pub fn newest_first(a: &Booking, b: &Booking) -> Ordering {
    let (da, db) = (parse_booking_date(a.date()), parse_booking_date(b.date()));
    match (da, db) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// One customer's bookings from the last six months, newest first
pub fn schedule_for(
    bookings: &[Booking],
    phone: &str,
    today: NaiveDate,
    page: u32,
) -> PaginatedResponse<Booking> {
    let cutoff = months_before(today, HISTORY_MONTHS);
    let phone = phone.trim();
    let mut rows: Vec<Booking> = bookings
        .iter()
        .filter(|b| b.phone().trim() == phone)
        .filter(|b| parse_booking_date(b.date()).is_some_and(|d| d >= cutoff))
        .cloned()
        .collect();
    rows.sort_by(newest_first);
    paginate(&rows, page, PAGE_SIZE)
}
