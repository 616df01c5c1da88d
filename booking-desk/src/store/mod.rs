//! 本地存储 (redb)

pub mod storage;

pub use storage::{
    BookingOrigin, DeskStorage, SCHEMA_VERSION_KEY, StorageError, StorageResult, StoredBooking,
};
