//! Unified error codes for the booking desk
//!
//! - [`ErrorCode`]: standardized numeric codes shared by every crate
//! - [`ErrorCategory`]: classification by code range
//! - [`AppError`]: error with a code, a message and optional details
//!
//! # Error Code Ranges
//!
//! - 0xxx: General errors
//! - 1xxx: Booking errors
//! - 2xxx: Points errors
//! - 3xxx: Preference errors
//! - 4xxx: Notification errors
//! - 9xxx: System errors
//!
//! # Example
//!
//! ```
//! use shared::error::{AppError, ErrorCategory, ErrorCode};
//! use shared::response::ApiResponse;
//!
//! let err = AppError::booking_not_found(7);
//! assert_eq!(err.code.category(), ErrorCategory::Booking);
//! let response = ApiResponse::<()>::from(err);
//! assert_eq!(response.code, 1001);
//! ```

mod category;
mod codes;
mod http;
mod types;

pub use category::ErrorCategory;
pub use codes::{ErrorCode, InvalidErrorCode};
pub use types::AppError;
