//! Booking lifecycle
//!
//! - **status**: status enum and the transition table
//! - **points**: loyalty points arithmetic
//! - **code**: human-readable booking codes

pub mod code;
pub mod points;
pub mod status;

pub use code::booking_code;
pub use points::points_for_total;
pub use status::{BookingAction, BookingStatus, TRANSITIONS, Transition, TransitionError};
