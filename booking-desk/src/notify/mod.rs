//! 通知 - outbox entries and the dispatch worker
//!
//! # 流程
//!
//! ```text
//! BookingsManager / PointsLedger
//!     └─ enqueue (same txn as the change)
//!          └─ wake ──► OutboxWorker ──► Notifier::send
//!                          ├─ ok    → outbox_delivered
//!                          ├─ error → retry with backoff
//!                          └─ 3rd failure → outbox_dead_letter
//! ```

pub mod outbox;
pub mod worker;

pub use outbox::{DeadLetterEntry, DeliveredEntry, DeliveryStatus, OutboxEntry, OutboxStats};
pub use worker::{OutboxWorker, delivery_status};
