//! Outbox records
//!
//! A notification is written to `outbox_pending` in the same transaction as
//! the change that caused it. The worker moves it to `outbox_delivered` or,
//! after the last retry, to `outbox_dead_letter`.

use booking_client::DeliveryReceipt;
use serde::{Deserialize, Serialize};
use shared::notification::{NotificationKind, NotificationRequest, TemplateData};
use shared::util::now_millis;

/// Pending outbox entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: String,
    pub booking_id: Option<i64>,
    pub kind: NotificationKind,
    pub phone: String,
    pub template_data: TemplateData,
    pub created_at: i64,
    pub retry_count: u32,
    pub last_error: Option<String>,
    /// Backoff is measured from here (or `created_at` before the first failure)
    #[serde(default)]
    pub last_attempt_at: Option<i64>,
}

impl OutboxEntry {
    pub fn new(request: NotificationRequest) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            booking_id: request.booking_id,
            kind: request.kind,
            phone: request.phone,
            template_data: request.template_data,
            created_at: now_millis(),
            retry_count: 0,
            last_error: None,
            last_attempt_at: None,
        }
    }

    pub fn request(&self) -> NotificationRequest {
        NotificationRequest {
            kind: self.kind,
            booking_id: self.booking_id,
            phone: self.phone.clone(),
            template_data: self.template_data.clone(),
        }
    }

    /// Back in the queue with a clean retry count
    pub fn reset(mut self) -> Self {
        self.retry_count = 0;
        self.last_error = None;
        self.last_attempt_at = None;
        self
    }
}

/// Dead letter entry (exhausted retries)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub entry: OutboxEntry,
    pub failed_at: i64,
    pub last_error: String,
}

/// Delivered entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveredEntry {
    pub id: String,
    pub booking_id: Option<i64>,
    pub kind: NotificationKind,
    pub phone: String,
    pub created_at: i64,
    pub delivered_at: i64,
    /// Failed attempts before this one
    pub retry_count: u32,
    pub message_id: String,
    pub sent_time: String,
    pub simulated: bool,
}

impl DeliveredEntry {
    pub fn from_receipt(entry: &OutboxEntry, receipt: &DeliveryReceipt) -> Self {
        Self {
            id: entry.id.clone(),
            booking_id: entry.booking_id,
            kind: entry.kind,
            phone: entry.phone.clone(),
            created_at: entry.created_at,
            delivered_at: now_millis(),
            retry_count: entry.retry_count,
            message_id: receipt.message_id.clone(),
            sent_time: receipt.sent_time.clone(),
            simulated: receipt.simulated,
        }
    }
}

/// Where a booking's latest notification is
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending {
        kind: NotificationKind,
        retry_count: u32,
        last_error: Option<String>,
    },
    Delivered {
        kind: NotificationKind,
        message_id: String,
        simulated: bool,
    },
    DeadLetter {
        kind: NotificationKind,
        last_error: String,
    },
}

impl DeliveryStatus {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Self::Pending { kind, .. } | Self::Delivered { kind, .. } | Self::DeadLetter { kind, .. } => {
                *kind
            }
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Pending { .. } => "pending",
            Self::Delivered { .. } => "delivered",
            Self::DeadLetter { .. } => "dead_letter",
        }
    }
}

/// Queue sizes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OutboxStats {
    pub pending: u64,
    pub dead_letter: u64,
    pub delivered: u64,
}
