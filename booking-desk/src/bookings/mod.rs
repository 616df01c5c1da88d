//! 预约模块
//!
//! - [`BookingStore`]: remote list merged with local changes
//! - [`BookingsManager`]: status transitions, reminders, detail edits

pub mod error;
pub mod manager;
pub mod store;

pub use error::{ManagerError, ManagerResult};
pub use manager::{BOOKING_REWARD_REASON, BookingsManager};
pub use store::{BookingStore, Created, RefreshReport};
