//! Shared types for the booking desk
//!
//! Common types used across multiple crates: the booking model and its
//! status machine, points arithmetic, list queries, notification templates,
//! error codes and response envelopes.

pub mod booking;
pub mod error;
pub mod models;
pub mod notification;
pub mod query;
pub mod response;
pub mod util;

// Re-exports
pub use http;
pub use serde::{Deserialize, Serialize};

pub use booking::{BookingAction, BookingStatus, Transition, TransitionError};
pub use models::{Booking, BookingCore, BookingDraft, ServiceDetail};
pub use query::{BookingQuery, PaginatedResponse, StatusFilter};
