//! Outbox Worker - 通知发送
//!
//! Drains `outbox_pending` through a [`Notifier`]. Woken by the managers
//! after each commit and by a periodic scan that picks up retries.
//!
//! Note: redb operations are synchronous for stability.

use super::outbox::{DeliveryStatus, OutboxEntry};
use crate::store::{DeskStorage, StorageResult};
use booking_client::Notifier;
use futures::future::join_all;
use shared::util::now_millis;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};

/// Outbox worker configuration
pub const MAX_RETRY_COUNT: u32 = 3;
const RETRY_BASE_DELAY_SECS: u64 = 5;
const RETRY_MAX_DELAY_SECS: u64 = 60; // 1 minute max
const QUEUE_SCAN_INTERVAL_SECS: u64 = 60;
/// 并发发送数量
const DISPATCH_CONCURRENCY: usize = 4;

/// Result of one pass over the pending queue
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub dead_lettered: usize,
}

enum Outcome {
    Delivered,
    Failed,
    DeadLettered,
    Skipped,
}

/// Worker for processing the notification outbox
pub struct OutboxWorker {
    storage: DeskStorage,
    notifier: Arc<dyn Notifier>,
    semaphore: Arc<Semaphore>,
}

impl OutboxWorker {
    pub fn new(storage: DeskStorage, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            storage,
            notifier,
            semaphore: Arc::new(Semaphore::new(DISPATCH_CONCURRENCY)),
        }
    }

    /// Run until the wake channel closes
    pub async fn run(self, mut wake_rx: mpsc::Receiver<()>) {
        tracing::info!("OutboxWorker started with concurrency={}", DISPATCH_CONCURRENCY);

        // Give entries that failed in an earlier run another chance
        match self.storage.recover_dead_letters() {
            Ok(0) => {}
            Ok(n) => tracing::info!(count = n, "Recovered dead letter entries to pending queue"),
            Err(e) => tracing::error!(error = %e, "Failed to recover dead letter entries"),
        }

        self.drain_due().await;

        let mut scan_interval = tokio::time::interval(Duration::from_secs(QUEUE_SCAN_INTERVAL_SECS));
        // the first tick completes immediately; the queue was just drained
        scan_interval.tick().await;

        loop {
            tokio::select! {
                signal = wake_rx.recv() => {
                    match signal {
                        Some(()) => {
                            // coalesce bursts of wake-ups into one pass
                            while wake_rx.try_recv().is_ok() {}
                            self.drain_due().await;
                        }
                        None => {
                            tracing::info!("Outbox channel closed, shutting down OutboxWorker");
                            break;
                        }
                    }
                }
                // Periodic queue scan for retries
                _ = scan_interval.tick() => {
                    self.drain_due().await;
                }
            }
        }
    }

    /// Send every entry whose backoff has elapsed
    pub async fn drain_due(&self) -> DrainReport {
        self.drain(false).await
    }

    /// Send every pending entry now, ignoring backoff
    pub async fn drain_now(&self) -> DrainReport {
        self.drain(true).await
    }

    async fn drain(&self, ignore_backoff: bool) -> DrainReport {
        let pending = match self.storage.get_pending_notifications() {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Failed to get pending notifications");
                return DrainReport::default();
            }
        };

        let now = now_millis();
        let due: Vec<OutboxEntry> = pending
            .into_iter()
            .filter(|entry| ignore_backoff || is_due(entry, now))
            .collect();
        if due.is_empty() {
            return DrainReport::default();
        }

        tracing::info!(count = due.len(), "Processing outbox queue");

        let outcomes = join_all(due.into_iter().map(|entry| self.process_entry_limited(entry))).await;

        let mut report = DrainReport::default();
        for outcome in outcomes {
            match outcome {
                Outcome::Delivered => report.delivered += 1,
                Outcome::Failed => report.failed += 1,
                Outcome::DeadLettered => report.dead_lettered += 1,
                Outcome::Skipped => continue,
            }
            report.attempted += 1;
        }
        report
    }

    /// 带并发限制的发送
    async fn process_entry_limited(&self, entry: OutboxEntry) -> Outcome {
        let Ok(_permit) = self.semaphore.acquire().await else {
            return Outcome::Skipped;
        };
        self.process_entry(entry).await
    }

    /// Send one entry and record the result
    async fn process_entry(&self, entry: OutboxEntry) -> Outcome {
        match self.notifier.send(&entry.request()).await {
            Ok(receipt) => {
                tracing::info!(
                    entry_id = %entry.id,
                    booking_id = ?entry.booking_id,
                    kind = %entry.kind,
                    message_id = %receipt.message_id,
                    simulated = receipt.simulated,
                    "Notification sent"
                );
                if let Err(e) = self.storage.mark_notification_delivered(&entry.id, &receipt) {
                    tracing::error!(entry_id = %entry.id, error = %e, "Failed to mark notification delivered");
                }
                Outcome::Delivered
            }
            Err(e) => {
                let error = e.to_string();
                let attempts = entry.retry_count + 1;
                if attempts >= MAX_RETRY_COUNT {
                    tracing::error!(
                        entry_id = %entry.id,
                        booking_id = ?entry.booking_id,
                        retry_count = attempts,
                        error = %error,
                        "Max retry count exceeded, moving to dead letter queue"
                    );
                    let moved = self
                        .storage
                        .mark_notification_failed(&entry.id, &error)
                        .and_then(|()| self.storage.move_notification_to_dead_letter(&entry.id, &error));
                    if let Err(e2) = moved {
                        tracing::error!(entry_id = %entry.id, error = %e2, "Failed to dead-letter notification");
                    }
                    Outcome::DeadLettered
                } else {
                    tracing::warn!(
                        entry_id = %entry.id,
                        retry_count = attempts,
                        transient = e.is_transient(),
                        error = %error,
                        "Notification failed, will retry"
                    );
                    if let Err(e2) = self.storage.mark_notification_failed(&entry.id, &error) {
                        tracing::error!(entry_id = %entry.id, error = %e2, "Failed to mark notification failed");
                    }
                    Outcome::Failed
                }
            }
        }
    }
}

/// Exponential backoff: delay = base * 2^retry_count, capped at max
fn backoff_secs(retry_count: u32) -> u64 {
    RETRY_BASE_DELAY_SECS
        .saturating_mul(2u64.saturating_pow(retry_count))
        .min(RETRY_MAX_DELAY_SECS)
}

/// Fresh entries are due at once; failed ones after their backoff
fn is_due(entry: &OutboxEntry, now: i64) -> bool {
    match entry.last_attempt_at {
        None => true,
        Some(at) => now >= at + (backoff_secs(entry.retry_count) as i64 * 1000),
    }
}

/// Latest notification state for a booking, across all three tables
pub fn delivery_status(storage: &DeskStorage, booking_id: i64) -> StorageResult<Option<DeliveryStatus>> {
    let mut latest: Option<(i64, DeliveryStatus)> = None;
    let mut consider = |created_at: i64, status: DeliveryStatus| {
        if latest.as_ref().is_none_or(|(at, _)| created_at >= *at) {
            latest = Some((created_at, status));
        }
    };

    for entry in storage.get_delivered_notifications()? {
        if entry.booking_id == Some(booking_id) {
            consider(
                entry.created_at,
                DeliveryStatus::Delivered {
                    kind: entry.kind,
                    message_id: entry.message_id,
                    simulated: entry.simulated,
                },
            );
        }
    }
    for letter in storage.get_dead_letters()? {
        if letter.entry.booking_id == Some(booking_id) {
            consider(
                letter.entry.created_at,
                DeliveryStatus::DeadLetter {
                    kind: letter.entry.kind,
                    last_error: letter.last_error,
                },
            );
        }
    }
    for entry in storage.get_pending_notifications()? {
        if entry.booking_id == Some(booking_id) {
            consider(
                entry.created_at,
                DeliveryStatus::Pending {
                    kind: entry.kind,
                    retry_count: entry.retry_count,
                    last_error: entry.last_error,
                },
            );
        }
    }

    Ok(latest.map(|(_, status)| status))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use booking_client::{ClientError, ClientResult, DeliveryReceipt};
    use shared::notification::{NotificationKind, NotificationRequest, TemplateData};
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` sends, then succeeds
    struct FlakyNotifier {
        failures: AtomicU32,
        sent: AtomicU32,
    }

    impl FlakyNotifier {
        fn new(failures: u32) -> Self {
            Self {
                failures: AtomicU32::new(failures),
                sent: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl Notifier for FlakyNotifier {
        async fn send(&self, _request: &NotificationRequest) -> ClientResult<DeliveryReceipt> {
            if self
                .failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok()
            {
                return Err(ClientError::Rejected {
                    code: -133,
                    message: "Template is not approved".into(),
                });
            }
            let n = self.sent.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(DeliveryReceipt {
                message_id: format!("msg_{}", n),
                sent_time: "0".into(),
                simulated: false,
            })
        }
    }

    fn enqueue(storage: &DeskStorage, booking_id: i64) -> OutboxEntry {
        let entry = OutboxEntry::new(NotificationRequest {
            kind: NotificationKind::BookingConfirmed,
            booking_id: Some(booking_id),
            phone: "0901234567".into(),
            template_data: TemplateData::new(),
        });
        let txn = storage.begin_write().unwrap();
        storage.enqueue_notification(&txn, &entry).unwrap();
        txn.commit().unwrap();
        entry
    }

    #[test]
    fn test_backoff_calculation() {
        assert_eq!(backoff_secs(0), 5);
        assert_eq!(backoff_secs(1), 10);
        assert_eq!(backoff_secs(2), 20);
        assert_eq!(backoff_secs(3), 40);
        assert_eq!(backoff_secs(4), 60); // capped
        assert_eq!(backoff_secs(40), 60);
    }

    #[test]
    fn test_is_due() {
        let storage = DeskStorage::open_in_memory().unwrap();
        let mut entry = enqueue(&storage, 1);
        assert!(is_due(&entry, 0));

        entry.retry_count = 1;
        entry.last_attempt_at = Some(1_000);
        assert!(!is_due(&entry, 10_999));
        assert!(is_due(&entry, 11_000));
    }

    #[tokio::test]
    async fn test_delivers_pending_entry() {
        let storage = DeskStorage::open_in_memory().unwrap();
        enqueue(&storage, 1);
        let worker = OutboxWorker::new(storage.clone(), Arc::new(FlakyNotifier::new(0)));

        let report = worker.drain_due().await;
        assert_eq!(report.delivered, 1);
        assert_eq!(storage.get_outbox_stats().unwrap().delivered, 1);
        assert!(matches!(
            delivery_status(&storage, 1).unwrap(),
            Some(DeliveryStatus::Delivered { .. })
        ));
        assert!(delivery_status(&storage, 2).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_entry_waits_for_backoff() {
        let storage = DeskStorage::open_in_memory().unwrap();
        enqueue(&storage, 1);
        let worker = OutboxWorker::new(storage.clone(), Arc::new(FlakyNotifier::new(1)));

        assert_eq!(worker.drain_due().await.failed, 1);
        // just failed, backoff not elapsed
        assert_eq!(worker.drain_due().await.attempted, 0);
        match delivery_status(&storage, 1).unwrap() {
            Some(DeliveryStatus::Pending { retry_count, last_error, .. }) => {
                assert_eq!(retry_count, 1);
                assert!(last_error.unwrap().contains("not approved"));
            }
            other => panic!("unexpected status: {:?}", other),
        }

        assert_eq!(worker.drain_now().await.delivered, 1);
    }

    #[tokio::test]
    async fn test_dead_letter_after_three_failures() {
        let storage = DeskStorage::open_in_memory().unwrap();
        enqueue(&storage, 1);
        let worker = OutboxWorker::new(storage.clone(), Arc::new(FlakyNotifier::new(10)));

        assert_eq!(worker.drain_now().await.failed, 1);
        assert_eq!(worker.drain_now().await.failed, 1);
        assert_eq!(worker.drain_now().await.dead_lettered, 1);

        let stats = storage.get_outbox_stats().unwrap();
        assert_eq!(stats.pending, 0);
        assert_eq!(stats.dead_letter, 1);
        let dead = storage.get_dead_letters().unwrap();
        assert_eq!(dead[0].entry.retry_count, 3);
        assert!(matches!(
            delivery_status(&storage, 1).unwrap(),
            Some(DeliveryStatus::DeadLetter { .. })
        ));
    }

    #[tokio::test]
    async fn test_run_recovers_dead_letters_and_stops_on_close() {
        let storage = DeskStorage::open_in_memory().unwrap();
        let entry = enqueue(&storage, 1);
        storage.move_notification_to_dead_letter(&entry.id, "old failure").unwrap();

        let worker = OutboxWorker::new(storage.clone(), Arc::new(FlakyNotifier::new(0)));
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(worker.run(rx));
        drop(tx);
        handle.await.unwrap();

        let stats = storage.get_outbox_stats().unwrap();
        assert_eq!(stats.dead_letter, 0);
        assert_eq!(stats.delivered, 1);
    }
}
