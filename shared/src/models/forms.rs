//! Booking submission forms
//!
//! Forms are also what gets saved as drafts in the preference store, so
//! every field has a default and decoding tolerates missing keys.

use super::booking::{BookingCore, BookingDraft, ServiceDetail};
use crate::booking::points_for_total;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// VND per staff-hour
pub const PRICE_PER_HOUR: i64 = 100_000;
/// Minimum billable hours
pub const MIN_DURATION: u32 = 2;
/// Selectable start hours
pub const START_HOURS: std::ops::RangeInclusive<u32> = 6..=17;
/// Selectable start minutes
pub const START_MINUTES: [u32; 4] = [0, 15, 30, 45];
/// Selectable staff counts
pub const STAFF_RANGE: std::ops::RangeInclusive<u32> = 1..=4;
/// Minimum address length after trimming
pub const MIN_ADDRESS_LEN: usize = 5;

/// Service name recorded for hourly bookings
pub const HOURLY_SERVICE_NAME: &str = "Dọn dẹp theo giờ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormError {
    #[error("{0} is required")]
    Required(&'static str),

    #[error("address must be at least 5 characters")]
    AddressTooShort,

    #[error("{field} out of range: {value}")]
    OutOfRange { field: &'static str, value: u32 },
}

/// Price and points shown before submitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub price: i64,
    pub points: i64,
}

/// Hourly cleaning form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HourlyBookingForm {
    pub date: String,
    pub hour: u32,
    pub minute: u32,
    pub duration: u32,
    pub staff: u32,
    pub name: String,
    pub phone: String,
    pub address: String,
    pub note: String,
    pub zalo_id: String,
}

impl Default for HourlyBookingForm {
    fn default() -> Self {
        Self {
            date: String::new(),
            hour: 8,
            minute: 0,
            duration: MIN_DURATION,
            staff: 1,
            name: String::new(),
            phone: String::new(),
            address: String::new(),
            note: String::new(),
            zalo_id: String::new(),
        }
    }
}

impl HourlyBookingForm {
    pub fn start_time(&self) -> String {
        format!("{:02}:{:02}", self.hour, self.minute)
    }

    pub fn quote(&self) -> Quote {
        let price = i64::from(self.duration) * i64::from(self.staff) * PRICE_PER_HOUR;
        Quote {
            price,
            points: points_for_total(price),
        }
    }

    pub fn validate(&self) -> Result<(), FormError> {
        if self.date.trim().is_empty() {
            return Err(FormError::Required("date"));
        }
        if self.name.trim().is_empty() {
            return Err(FormError::Required("name"));
        }
        if self.phone.trim().is_empty() {
            return Err(FormError::Required("phone"));
        }
        if self.address.trim().chars().count() < MIN_ADDRESS_LEN {
            return Err(FormError::AddressTooShort);
        }
        if !START_HOURS.contains(&self.hour) {
            return Err(FormError::OutOfRange {
                field: "hour",
                value: self.hour,
            });
        }
        if !START_MINUTES.contains(&self.minute) {
            return Err(FormError::OutOfRange {
                field: "minute",
                value: self.minute,
            });
        }
        if self.duration < MIN_DURATION {
            return Err(FormError::OutOfRange {
                field: "duration",
                value: self.duration,
            });
        }
        if !STAFF_RANGE.contains(&self.staff) {
            return Err(FormError::OutOfRange {
                field: "staff",
                value: self.staff,
            });
        }
        Ok(())
    }

    pub fn can_submit(&self) -> bool {
        self.validate().is_ok()
    }

    /// Validate and build the submission body
    pub fn to_draft(&self) -> Result<BookingDraft, FormError> {
        self.validate()?;
        Ok(BookingDraft(BookingCore {
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            date: self.date.trim().to_string(),
            time: self.start_time(),
            service: HOURLY_SERVICE_NAME.to_string(),
            total: self.quote().price,
            staff: self.staff,
            note: self.note.clone(),
            detail: ServiceDetail::Hourly {
                hours: f64::from(self.duration),
            },
            size: None,
            zalo_id: (!self.zalo_id.is_empty()).then(|| self.zalo_id.clone()),
        }))
    }

    /// Draft kept after a successful submission: customer fields stay
    pub fn after_submit(&self) -> Self {
        Self {
            date: String::new(),
            note: String::new(),
            ..self.clone()
        }
    }
}

/// Other-service form (air conditioners, sofas, offices ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OtherBookingForm {
    pub service: String,
    pub quantity: u32,
    pub size: String,
    pub date: String,
    pub time: String,
    pub address: String,
    pub note: String,
    pub name: String,
    pub phone: String,
}

impl Default for OtherBookingForm {
    fn default() -> Self {
        Self {
            service: String::new(),
            quantity: 1,
            size: String::new(),
            date: String::new(),
            time: String::new(),
            address: String::new(),
            note: String::new(),
            name: String::new(),
            phone: String::new(),
        }
    }
}

impl OtherBookingForm {
    pub fn validate(&self) -> Result<(), FormError> {
        for (field, value) in [
            ("service", &self.service),
            ("date", &self.date),
            ("name", &self.name),
            ("phone", &self.phone),
            ("address", &self.address),
        ] {
            if value.trim().is_empty() {
                return Err(FormError::Required(field));
            }
        }
        if self.quantity == 0 {
            return Err(FormError::OutOfRange {
                field: "quantity",
                value: 0,
            });
        }
        Ok(())
    }

    /// Validate and build the submission body. Other services are quoted
    /// on site, so the total starts at zero.
    pub fn to_draft(&self) -> Result<BookingDraft, FormError> {
        self.validate()?;
        Ok(BookingDraft(BookingCore {
            name: self.name.trim().to_string(),
            phone: self.phone.trim().to_string(),
            address: self.address.trim().to_string(),
            date: self.date.trim().to_string(),
            time: self.time.trim().to_string(),
            service: self.service.trim().to_string(),
            total: 0,
            staff: 1,
            note: self.note.clone(),
            detail: ServiceDetail::Count {
                quantity: self.quantity,
            },
            size: (!self.size.trim().is_empty()).then(|| self.size.trim().to_string()),
            zalo_id: None,
        }))
    }

    pub fn after_submit(&self) -> Self {
        Self {
            date: String::new(),
            time: String::new(),
            note: String::new(),
            ..self.clone()
        }
    }
}
