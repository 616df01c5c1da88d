//! BookingsManager - 状态流转处理
//!
//! # Command Flow
//!
//! ```text
//! apply(id, action)
//!     ├─ 1. Begin write transaction
//!     ├─ 2. Load booking (local copy first, then the store)
//!     ├─ 3. Check the transition table
//!     │      ├─ same status → Unchanged, nothing written
//!     │      └─ not allowed → InvalidTransition, nothing written
//!     ├─ 4. Stamp points + credit ledger (complete only)
//!     ├─ 5. Persist booking + outbox entry
//!     ├─ 6. Commit transaction
//!     ├─ 7. Update the in-memory store
//!     └─ 8. Wake the outbox worker
//! ```

use super::error::{ManagerError, ManagerResult};
use super::store::BookingStore;
use crate::notify::OutboxEntry;
use crate::points::ledger::credit_txn;
use crate::store::{BookingOrigin, DeskStorage, StorageError, StoredBooking};
use redb::WriteTransaction;
use shared::booking::{BookingAction, BookingStatus, Transition, points_for_total};
use shared::models::{Booking, BookingUpdate};
use shared::notification::{self, NotificationRequest, TemplateContext};
use shared::util::now_millis;
use std::sync::Arc;
use tokio::sync::mpsc;

/// History reason for points credited on completion
pub const BOOKING_REWARD_REASON: &str = "Booking reward";

pub struct BookingsManager {
    storage: DeskStorage,
    store: Arc<BookingStore>,
    context: TemplateContext,
    wake_tx: Option<mpsc::Sender<()>>,
}

impl std::fmt::Debug for BookingsManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BookingsManager")
            .field("bookings", &self.store.len())
            .field("wake", &self.wake_tx.is_some())
            .finish()
    }
}

impl BookingsManager {
    pub fn new(storage: DeskStorage, store: Arc<BookingStore>, context: TemplateContext) -> Self {
        Self {
            storage,
            store,
            context,
            wake_tx: None,
        }
    }

    /// Signal the outbox worker after each commit
    pub fn with_wake(mut self, wake_tx: mpsc::Sender<()>) -> Self {
        self.wake_tx = Some(wake_tx);
        self
    }

    pub fn store(&self) -> &Arc<BookingStore> {
        &self.store
    }

    pub fn confirm(&self, id: i64) -> ManagerResult<Transition> {
        self.apply(id, BookingAction::Confirm, None)
    }

    pub fn complete(&self, id: i64) -> ManagerResult<Transition> {
        self.apply(id, BookingAction::Complete, None)
    }

    /// An empty reason becomes the default one in the message
    pub fn cancel(&self, id: i64, reason: &str) -> ManagerResult<Transition> {
        self.apply(id, BookingAction::Cancel, Some(reason))
    }

    /// Apply an admin action to a booking
    pub fn apply(
        &self,
        id: i64,
        action: BookingAction,
        reason: Option<&str>,
    ) -> ManagerResult<Transition> {
        let txn = self.storage.begin_write()?;
        let (mut booking, origin) = self.load(&txn, id)?;

        let transition = booking.status.apply(action).inspect_err(|e| {
            tracing::warn!(booking_id = id, action = %action, error = %e, "Transition rejected");
        })?;
        let Transition::Changed { from, to } = transition else {
            tracing::debug!(booking_id = id, status = %booking.status, "Status unchanged");
            return Ok(transition);
        };

        booking.status = to;
        let request = match action {
            BookingAction::Confirm => notification::confirmation(&booking, &self.context),
            BookingAction::Complete => self.stamp_completion(&txn, &mut booking)?,
            BookingAction::Cancel => {
                notification::cancellation(&booking, reason.unwrap_or_default(), &self.context)
            }
        };

        self.storage
            .put_booking(&txn, &StoredBooking::new(booking.clone(), origin))?;
        self.storage
            .enqueue_notification(&txn, &OutboxEntry::new(request))?;
        txn.commit().map_err(StorageError::from)?;

        crate::audit_log!(
            "booking_status_changed",
            booking_id = id,
            from = from.as_str(),
            to = to.as_str(),
            reason = reason.unwrap_or_default(),
        );
        self.store.upsert(booking);
        self.wake();
        Ok(transition)
    }

    /// Queue a reminder for an upcoming booking
    pub fn remind(&self, id: i64) -> ManagerResult<()> {
        let txn = self.storage.begin_write()?;
        let (booking, _) = self.load(&txn, id)?;
        if !matches!(booking.status, BookingStatus::Pending | BookingStatus::Confirmed) {
            return Err(ManagerError::NotRemindable {
                id,
                status: booking.status,
            });
        }
        let request = notification::reminder(&booking, &self.context);
        self.storage
            .enqueue_notification(&txn, &OutboxEntry::new(request))?;
        txn.commit().map_err(StorageError::from)?;

        tracing::info!(booking_id = id, "Reminder queued");
        self.wake();
        Ok(())
    }

    /// Edit customer, schedule and price fields. Status is not editable here.
    pub fn update_details(&self, id: i64, patch: &BookingUpdate) -> ManagerResult<Booking> {
        if patch.is_empty() {
            return Err(ManagerError::NothingToUpdate);
        }
        let txn = self.storage.begin_write()?;
        let (mut booking, origin) = self.load(&txn, id)?;

        let changed = patch.apply_to(&mut booking.core);
        if changed.is_empty() {
            return Ok(booking);
        }
        self.storage
            .put_booking(&txn, &StoredBooking::new(booking.clone(), origin))?;
        txn.commit().map_err(StorageError::from)?;

        crate::audit_log!(
            "booking_details_updated",
            booking_id = id,
            fields = changed.join(","),
        );
        self.store.upsert(booking.clone());
        Ok(booking)
    }

    /// The booking as the store shows it, with the origin of the local row.
    /// Falls back to the local row when the store has not loaded it.
    fn load(&self, txn: &WriteTransaction, id: i64) -> ManagerResult<(Booking, BookingOrigin)> {
        let stored = self.storage.get_booking_txn(txn, id)?;
        let origin = stored
            .as_ref()
            .map(|s| s.origin)
            .unwrap_or(BookingOrigin::Remote);
        match self.store.get(id) {
            Some(booking) => Ok((booking, origin)),
            None => stored
                .map(|s| (s.booking, s.origin))
                .ok_or(ManagerError::BookingNotFound(id)),
        }
    }

    /// Stamp points and credit them to the customer
    fn stamp_completion(
        &self,
        txn: &WriteTransaction,
        booking: &mut Booking,
    ) -> ManagerResult<NotificationRequest> {
        let points = points_for_total(booking.core.total);
        booking.points = Some(points);
        if points > 0 {
            let record = credit_txn(
                &self.storage,
                txn,
                booking.phone(),
                booking.name(),
                points,
                BOOKING_REWARD_REASON,
                now_millis(),
            )?;
            tracing::info!(
                booking_id = booking.id,
                phone = %record.phone,
                points,
                new_total = record.new_total,
                "Completion points credited"
            );
        }
        let today = chrono::Local::now().date_naive();
        Ok(notification::completion(booking, points, today, &self.context))
    }

    fn wake(&self) {
        if let Some(tx) = &self.wake_tx {
            // a full channel already has a wake-up queued
            let _ = tx.try_send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use booking_client::{BookingApi, ClientConfig, mock_bookings};
    use shared::booking::TransitionError;
    use shared::notification::NotificationKind;

    /// Store loaded with the built-in bookings, API pointed nowhere
    fn setup() -> (DeskStorage, BookingsManager) {
        let storage = DeskStorage::open_in_memory().unwrap();
        let api = BookingApi::new(&ClientConfig::new("http://127.0.0.1:9/api")).unwrap();
        let store = Arc::new(BookingStore::new(api, storage.clone()));
        for b in mock_bookings() {
            store.upsert(b);
        }
        let manager = BookingsManager::new(storage.clone(), store, TemplateContext::default());
        (storage, manager)
    }

    fn first_with(manager: &BookingsManager, status: BookingStatus) -> Booking {
        manager
            .store()
            .list()
            .into_iter()
            .find(|b| b.status == status)
            .unwrap()
    }

    fn kinds(storage: &DeskStorage) -> Vec<NotificationKind> {
        storage
            .get_pending_notifications()
            .unwrap()
            .into_iter()
            .map(|e| e.kind)
            .collect()
    }

    #[test]
    fn test_confirm_pending_queues_notification() {
        let (storage, manager) = setup();
        let b = first_with(&manager, BookingStatus::Pending);

        let t = manager.confirm(b.id).unwrap();
        assert!(t.is_changed());
        assert_eq!(manager.store().get(b.id).unwrap().status, BookingStatus::Confirmed);
        assert_eq!(
            storage.get_booking(b.id).unwrap().unwrap().booking.status,
            BookingStatus::Confirmed
        );
        assert_eq!(kinds(&storage), vec![NotificationKind::BookingConfirmed]);
    }

    #[test]
    fn test_confirm_twice_is_idempotent() {
        let (storage, manager) = setup();
        let b = first_with(&manager, BookingStatus::Pending);

        manager.confirm(b.id).unwrap();
        let second = manager.confirm(b.id).unwrap();
        assert_eq!(second, Transition::Unchanged(BookingStatus::Confirmed));
        assert_eq!(kinds(&storage).len(), 1);
    }

    #[test]
    fn test_complete_stamps_points_and_credits_ledger() {
        let (storage, manager) = setup();
        let b = first_with(&manager, BookingStatus::Pending);
        let expected = b.core.total * 5 / 100 / 1000;

        manager.complete(b.id).unwrap();
        let done = manager.store().get(b.id).unwrap();
        assert_eq!(done.status, BookingStatus::Completed);
        assert_eq!(done.points, Some(expected));

        let customer = storage.get_customer(b.phone()).unwrap().unwrap();
        assert_eq!(customer.points, expected);
        let history = storage.get_points_history().unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].reason, BOOKING_REWARD_REASON);
        assert_eq!(history[0].change, expected);

        let pending = storage.get_pending_notifications().unwrap();
        assert_eq!(pending[0].kind, NotificationKind::ServiceCompleted);
        assert_eq!(
            pending[0].template_data.get("points_earned"),
            Some(&expected.to_string())
        );
    }

    #[test]
    fn test_cancel_with_empty_reason() {
        let (storage, manager) = setup();
        let b = first_with(&manager, BookingStatus::Pending);

        manager.cancel(b.id, "").unwrap();
        assert_eq!(manager.store().get(b.id).unwrap().status, BookingStatus::Cancelled);
        let pending = storage.get_pending_notifications().unwrap();
        assert_eq!(
            pending[0].template_data.get("cancellation_reason").map(String::as_str),
            Some("Theo yêu cầu")
        );
    }

    #[test]
    fn test_illegal_transition_rejected_without_mutation() {
        let (storage, manager) = setup();
        let b = first_with(&manager, BookingStatus::Pending);
        manager.cancel(b.id, "khách đổi lịch").unwrap();

        let err = manager.complete(b.id).unwrap_err();
        assert!(matches!(
            err,
            ManagerError::Transition(TransitionError::Invalid {
                from: BookingStatus::Cancelled,
                action: BookingAction::Complete
            })
        ));
        assert_eq!(manager.store().get(b.id).unwrap().status, BookingStatus::Cancelled);
        assert_eq!(kinds(&storage).len(), 1);
        assert!(storage.get_points_history().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_booking() {
        let (_, manager) = setup();
        assert!(matches!(
            manager.confirm(999_999),
            Err(ManagerError::BookingNotFound(999_999))
        ));
    }

    #[test]
    fn test_remind_only_open_bookings() {
        let (storage, manager) = setup();
        let b = first_with(&manager, BookingStatus::Pending);
        manager.remind(b.id).unwrap();
        assert_eq!(kinds(&storage), vec![NotificationKind::BookingReminder]);

        manager.cancel(b.id, "").unwrap();
        assert!(matches!(
            manager.remind(b.id),
            Err(ManagerError::NotRemindable { .. })
        ));
    }

    #[test]
    fn test_update_details_keeps_status() {
        let (storage, manager) = setup();
        let b = first_with(&manager, BookingStatus::Confirmed);

        let patch = BookingUpdate {
            time: Some("09:00".into()),
            staff: Some(3),
            ..Default::default()
        };
        let updated = manager.update_details(b.id, &patch).unwrap();
        assert_eq!(updated.core.time, "09:00");
        assert_eq!(updated.core.staff, 3);
        assert_eq!(updated.status, BookingStatus::Confirmed);
        assert!(storage.get_booking(b.id).unwrap().is_some());
        // details edits send nothing
        assert!(kinds(&storage).is_empty());

        assert!(matches!(
            manager.update_details(b.id, &BookingUpdate::default()),
            Err(ManagerError::NothingToUpdate)
        ));
    }

    #[tokio::test]
    async fn test_commit_wakes_worker() {
        let (_, manager) = setup();
        let (tx, mut rx) = mpsc::channel(4);
        let manager = manager.with_wake(tx);
        let b = first_with(&manager, BookingStatus::Pending);

        manager.confirm(b.id).unwrap();
        assert_eq!(rx.try_recv(), Ok(()));
        // unchanged → no wake
        manager.confirm(b.id).unwrap();
        assert!(rx.try_recv().is_err());
    }
}
