//! 带错误码的应用错误

use super::codes::ErrorCode;
use http::StatusCode;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// An [`ErrorCode`] plus the message shown to the operator
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct AppError {
    pub code: ErrorCode,
    pub message: String,
    /// Context such as the booking id or the offending field, sorted by key
    pub details: BTreeMap<String, Value>,
}

impl AppError {
    /// Uses the code's stock message
    pub fn new(code: ErrorCode) -> Self {
        Self::with_message(code, code.message())
    }

    pub fn with_message(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }

    pub fn http_status(&self) -> StatusCode {
        self.code.http_status()
    }

    pub fn booking_not_found(id: i64) -> Self {
        Self::with_message(
            ErrorCode::BookingNotFound,
            format!("Booking {} not found", id),
        )
        .with_detail("booking_id", id)
    }

    pub fn customer_not_found(phone: impl Into<String>) -> Self {
        let phone = phone.into();
        Self::with_message(
            ErrorCode::CustomerNotFound,
            format!("No customer with phone {}", phone),
        )
        .with_detail("phone", phone)
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::StorageError, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_message(ErrorCode::InternalError, msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_message() {
        let err = AppError::new(ErrorCode::InvalidBannerSlot);
        assert_eq!(err.to_string(), "Banner slot must be 0, 1 or 2");
        assert!(err.details.is_empty());
    }

    #[test]
    fn test_booking_not_found() {
        let err = AppError::booking_not_found(42);
        assert_eq!(err.code, ErrorCode::BookingNotFound);
        assert_eq!(err.message, "Booking 42 not found");
        assert_eq!(err.details["booking_id"], 42);
        assert_eq!(err.http_status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_customer_not_found_keeps_phone() {
        let err = AppError::customer_not_found("0909123456").with_detail("points", 40);
        assert_eq!(err.details["phone"], "0909123456");
        let keys: Vec<_> = err.details.keys().cloned().collect();
        assert_eq!(keys, vec!["phone", "points"]);
    }
}
