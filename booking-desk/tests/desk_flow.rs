// booking-desk/tests/desk_flow.rs
// The desk against the in-process mock API: refresh, transitions, delivery

use booking_api_mock::{AppState, spawn};
use booking_client::Source;
use booking_desk::export;
use booking_desk::store::BookingOrigin;
use booking_desk::{Config, DeliveryStatus, DeskState, ManagerError};
use shared::booking::BookingStatus;
use shared::booking::Transition;
use shared::models::{BookingUpdate, HourlyBookingForm};
use shared::query::{BookingQuery, StatusFilter};
use std::sync::Arc;

struct Harness {
    _dir: tempfile::TempDir,
    mock: Arc<AppState>,
    state: DeskState,
}

/// Desk in production mode with a token, so template sends hit the mock
async fn harness() -> Harness {
    let mock = Arc::new(AppState::seeded());
    let addr = spawn("127.0.0.1:0".parse().unwrap(), mock.clone())
        .await
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let config = Config::with_work_dir(dir.path().to_string_lossy().to_string())
        .with_api_url(format!("http://{}/api", addr))
        .with_request_timeout_ms(2000)
        .with_zns(
            format!("http://{}/zns/message/template", addr),
            Some("test-token".to_string()),
        )
        .with_environment("production");
    let state = DeskState::initialize(&config).unwrap();
    Harness {
        _dir: dir,
        mock,
        state,
    }
}

/// Nothing listening, built-in list as fallback
fn offline(dir: &std::path::Path) -> DeskState {
    let config = Config::with_work_dir(dir.to_string_lossy().to_string())
        .with_api_url("http://127.0.0.1:9/api")
        .with_request_timeout_ms(500)
        .with_mock_fallback(true)
        .with_zns("http://127.0.0.1:9/zns", None)
        .with_environment("development");
    DeskState::initialize(&config).unwrap()
}

#[tokio::test]
async fn test_refresh_from_api() {
    let h = harness().await;
    let report = h.state.refresh_bookings().await.unwrap();
    assert_eq!(report.source, Source::Remote);
    assert!(report.error.is_none());
    assert_eq!(report.total, 5);

    let pending = h
        .state
        .store
        .query(&BookingQuery::new().with_status(StatusFilter::Only(BookingStatus::Pending)));
    assert_eq!(pending.total, 2);
}

#[tokio::test]
async fn test_confirm_and_complete_deliver_real_messages() {
    let h = harness().await;
    h.state.refresh_bookings().await.unwrap();

    h.state.manager.confirm(1).unwrap();
    let report = h.state.drain_outbox(false).await;
    assert_eq!(report.delivered, 1);
    assert_eq!(h.mock.zns_sent(), 1);
    match h.state.delivery_status(1).unwrap() {
        Some(DeliveryStatus::Delivered {
            message_id,
            simulated,
            ..
        }) => {
            assert_eq!(message_id, "mock_1");
            assert!(!simulated);
        }
        other => panic!("unexpected status: {:?}", other),
    }

    h.state.manager.complete(1).unwrap();
    h.state.drain_outbox(false).await;
    assert_eq!(h.mock.zns_sent(), 2);

    let booking = h.state.store.get(1).unwrap();
    assert_eq!(booking.status, BookingStatus::Completed);
    assert_eq!(booking.points, Some(40));
    let customer = h.state.ledger.find_customer("0909123456").unwrap().unwrap();
    assert_eq!(customer.points, 40);
}

#[tokio::test]
async fn test_local_status_survives_refresh() {
    let h = harness().await;
    h.state.refresh_bookings().await.unwrap();
    h.state.manager.confirm(5).unwrap();

    let report = h.state.refresh_bookings().await.unwrap();
    assert_eq!(report.local_overrides, 1);
    assert_eq!(
        h.state.store.get(5).unwrap().status,
        BookingStatus::Confirmed
    );
}

#[tokio::test]
async fn test_remote_progress_wins_over_local_copy() {
    let h = harness().await;
    h.state.refresh_bookings().await.unwrap();
    h.state.manager.confirm(1).unwrap();
    h.state.manager.confirm(5).unwrap();
    h.state.drain_outbox(true).await;
    let sent = h.mock.zns_sent();

    // completed on the backend meanwhile
    assert!(h.mock.set_status(1, BookingStatus::Completed));
    assert!(h.mock.set_status(5, BookingStatus::Completed));
    let report = h.state.refresh_bookings().await.unwrap();
    assert_eq!(report.superseded, 2);
    assert_eq!(h.state.store.get(1).unwrap().status, BookingStatus::Completed);

    let err = h.state.manager.cancel(1, "").unwrap_err();
    assert!(matches!(err, ManagerError::Transition(_)));
    assert!(matches!(
        h.state.manager.complete(1).unwrap(),
        Transition::Unchanged(BookingStatus::Completed)
    ));
    assert!(h.state.ledger.find_customer("0909123456").unwrap().is_none());

    let patch = BookingUpdate {
        note: Some("Mang theo máy hút bụi".into()),
        ..Default::default()
    };
    let edited = h.state.manager.update_details(5, &patch).unwrap();
    assert_eq!(edited.status, BookingStatus::Completed);
    assert_eq!(h.state.store.get(5).unwrap().status, BookingStatus::Completed);

    // the local rows follow the backend too
    let stored = h.state.storage.get_booking(1).unwrap().unwrap();
    assert_eq!(stored.booking.status, BookingStatus::Completed);
    assert_eq!(h.state.storage.get_outbox_stats().unwrap().pending, 0);
    assert_eq!(h.mock.zns_sent(), sent);
}

#[tokio::test]
async fn test_rejected_send_retries_then_dead_letters() {
    let h = harness().await;
    h.state.refresh_bookings().await.unwrap();
    h.mock.fail_next_zns(3);

    h.state.manager.cancel(5, "Khách đổi lịch").unwrap();
    let first = h.state.drain_outbox(true).await;
    assert_eq!(first.failed, 1);
    assert!(matches!(
        h.state.delivery_status(5).unwrap(),
        Some(DeliveryStatus::Pending { retry_count: 1, .. })
    ));

    h.state.drain_outbox(true).await;
    let third = h.state.drain_outbox(true).await;
    assert_eq!(third.dead_lettered, 1);
    assert!(matches!(
        h.state.delivery_status(5).unwrap(),
        Some(DeliveryStatus::DeadLetter { .. })
    ));
    // the status change stands regardless of delivery
    assert_eq!(
        h.state.store.get(5).unwrap().status,
        BookingStatus::Cancelled
    );

    assert_eq!(h.state.storage.recover_dead_letters().unwrap(), 1);
    let retry = h.state.drain_outbox(true).await;
    assert_eq!(retry.delivered, 1);
    assert_eq!(h.mock.zns_sent(), 1);
}

#[tokio::test]
async fn test_terminal_booking_rejects_actions() {
    let h = harness().await;
    h.state.refresh_bookings().await.unwrap();

    let err = h.state.manager.confirm(4).unwrap_err();
    assert!(matches!(err, ManagerError::Transition(_)));
    assert_eq!(h.state.storage.get_outbox_stats().unwrap().pending, 0);
}

#[tokio::test]
async fn test_create_through_api() {
    let h = harness().await;
    h.state.refresh_bookings().await.unwrap();

    let form = HourlyBookingForm {
        date: "2025-11-20".into(),
        hour: 9,
        duration: 3,
        staff: 2,
        name: "Vicky".into(),
        phone: "0901234567".into(),
        address: "12 Lê Lợi, Q1".into(),
        ..Default::default()
    };
    let created = h.state.store.create(form.to_draft().unwrap()).await.unwrap();
    assert_eq!(created.origin, BookingOrigin::Remote);
    assert_eq!(created.booking.id, 6);
    assert_eq!(created.booking.core.total, 600_000);
    assert_eq!(h.mock.list().len(), 6);
    assert_eq!(h.state.store.len(), 6);
}

#[tokio::test]
async fn test_offline_create_is_kept_across_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let state = offline(dir.path());
    state.refresh_bookings().await.unwrap();

    let form = HourlyBookingForm {
        date: "2025-11-20".into(),
        name: "An".into(),
        phone: "0907654321".into(),
        address: "99 Hai Bà Trưng".into(),
        ..Default::default()
    };
    let created = state.store.create(form.to_draft().unwrap()).await.unwrap();
    assert_eq!(created.origin, BookingOrigin::Local);

    let report = state.refresh_bookings().await.unwrap();
    assert_eq!(report.local_only, 1);
    assert_eq!(report.total, 6);
    assert!(state.store.get(created.booking.id).is_some());
}

#[tokio::test]
async fn test_export_filtered_bookings() {
    let h = harness().await;
    h.state.refresh_bookings().await.unwrap();
    let out = tempfile::tempdir().unwrap();

    let query = BookingQuery::new().with_status(StatusFilter::Only(BookingStatus::Pending));
    let rows = h.state.store.filtered(&query);
    let path = out.path().join(export::bookings_file_name(
        chrono::NaiveDate::from_ymd_opt(2025, 11, 1).unwrap(),
        Some("pending"),
    ));
    let count = export::export_to_file(&path, &rows, export::write_bookings_csv).unwrap();
    assert_eq!(count, 2);

    let mut reader = csv::Reader::from_path(&path).unwrap();
    assert_eq!(reader.records().count(), 2);

    let none = h.state.store.filtered(&BookingQuery::new().with_name("nobody"));
    let err = export::export_to_file(&out.path().join("empty.csv"), &none, export::write_bookings_csv)
        .unwrap_err();
    assert!(matches!(err, export::ExportError::NothingToExport));
}
