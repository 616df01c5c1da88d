//! Error codes
//!
//! Codes are `u16` on the wire and render as `E0003`-style tags in logs and
//! CLI output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Business rule violation
    BusinessRule = 5,
    /// Invalid request
    InvalidRequest = 6,
    /// Required field missing
    RequiredField = 7,

    // ==================== 1xxx: Booking ====================
    /// Booking not found
    BookingNotFound = 1001,
    /// Action not allowed from the current status
    InvalidTransition = 1002,
    /// Unrecognized status string
    UnknownStatus = 1003,
    /// Unrecognized admin action
    UnknownAction = 1004,
    /// Booking form is incomplete
    InvalidBookingForm = 1005,
    /// Export selection is empty
    NothingToExport = 1006,

    // ==================== 2xxx: Points ====================
    /// Customer not found in the ledger
    CustomerNotFound = 2001,
    /// Adjustment amount is not a positive number
    InvalidAmount = 2002,
    /// Adjustment direction is not add/subtract
    InvalidDirection = 2003,

    // ==================== 3xxx: Preference ====================
    /// Theme name is not known
    UnknownTheme = 3001,
    /// Banner slot outside 0..2
    InvalidBannerSlot = 3002,
    /// Stored schema version is newer than this build
    UnsupportedSchema = 3003,

    // ==================== 4xxx: Notification ====================
    /// Notification dispatch failed (transport)
    NotificationFailed = 4001,
    /// Notification API rejected the message
    NotificationRejected = 4002,
    /// No template configured for this notification kind
    TemplateMissing = 4003,

    // ==================== 9xxx: System ====================
    /// Internal error
    InternalError = 9001,
    /// Local store error
    StorageError = 9002,
    /// Network error
    NetworkError = 9003,
    /// Request timed out
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,
}

impl ErrorCode {
    /// Numeric value of the code
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// `E0003`-style tag
    pub fn tag(&self) -> String {
        format!("E{:04}", self.code())
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    /// Default message for this code
    pub fn message(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Unknown => "Unknown error",
            Self::ValidationFailed => "Validation failed",
            Self::NotFound => "Resource not found",
            Self::BusinessRule => "Business rule violation",
            Self::InvalidRequest => "Invalid request",
            Self::RequiredField => "Required field missing",

            Self::BookingNotFound => "Booking not found",
            Self::InvalidTransition => "Action not allowed for the booking status",
            Self::UnknownStatus => "Unknown booking status",
            Self::UnknownAction => "Unknown booking action",
            Self::InvalidBookingForm => "Booking form is incomplete",
            Self::NothingToExport => "Nothing to export",

            Self::CustomerNotFound => "Customer not found",
            Self::InvalidAmount => "Amount must be a positive number",
            Self::InvalidDirection => "Direction must be add or subtract",

            Self::UnknownTheme => "Unknown theme",
            Self::InvalidBannerSlot => "Banner slot must be 0, 1 or 2",
            Self::UnsupportedSchema => "Unsupported preference schema version",

            Self::NotificationFailed => "Notification dispatch failed",
            Self::NotificationRejected => "Notification rejected by the messaging API",
            Self::TemplateMissing => "No template configured",

            Self::InternalError => "Internal error",
            Self::StorageError => "Local store error",
            Self::NetworkError => "Network error",
            Self::TimeoutError => "Request timed out",
            Self::ConfigError => "Configuration error",
        }
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error returned when a u16 is not a known code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            5 => Ok(ErrorCode::BusinessRule),
            6 => Ok(ErrorCode::InvalidRequest),
            7 => Ok(ErrorCode::RequiredField),

            // Booking
            1001 => Ok(ErrorCode::BookingNotFound),
            1002 => Ok(ErrorCode::InvalidTransition),
            1003 => Ok(ErrorCode::UnknownStatus),
            1004 => Ok(ErrorCode::UnknownAction),
            1005 => Ok(ErrorCode::InvalidBookingForm),
            1006 => Ok(ErrorCode::NothingToExport),

            // Points
            2001 => Ok(ErrorCode::CustomerNotFound),
            2002 => Ok(ErrorCode::InvalidAmount),
            2003 => Ok(ErrorCode::InvalidDirection),

            // Preference
            3001 => Ok(ErrorCode::UnknownTheme),
            3002 => Ok(ErrorCode::InvalidBannerSlot),
            3003 => Ok(ErrorCode::UnsupportedSchema),

            // Notification
            4001 => Ok(ErrorCode::NotificationFailed),
            4002 => Ok(ErrorCode::NotificationRejected),
            4003 => Ok(ErrorCode::TemplateMissing),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::StorageError),
            9003 => Ok(ErrorCode::NetworkError),
            9004 => Ok(ErrorCode::TimeoutError),
            9005 => Ok(ErrorCode::ConfigError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
