//! Data models
//!
//! Shared between the desk, the client and the mock API.
//! All booking IDs are `i64`.

pub mod booking;
pub mod customer;
pub mod forms;

// Re-exports
pub use booking::*;
pub use customer::*;
pub use forms::*;
