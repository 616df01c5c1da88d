// booking-api-mock/tests/client_roundtrip.rs
// The HTTP clients against the in-process mock API

use booking_api_mock::{AppState, spawn};
use booking_client::{
    BookingApi, ClientConfig, ClientError, HttpClient, Notifier, Source, ZnsClient, ZnsConfig,
};
use shared::booking::BookingStatus;
use shared::models::{BookingCore, BookingDraft, ServiceDetail};
use shared::notification::{NotificationKind, NotificationRequest, TemplateData};
use std::sync::Arc;

async fn start(state: Arc<AppState>) -> String {
    let addr = spawn("127.0.0.1:0".parse().unwrap(), state).await.unwrap();
    format!("http://{}", addr)
}

fn draft() -> BookingDraft {
    BookingDraft(BookingCore {
        name: "Vicky".into(),
        phone: "0901234567".into(),
        address: "12 Lê Lợi, Q1".into(),
        date: "2025-11-10".into(),
        time: "09:00".into(),
        service: "Dọn dẹp theo giờ".into(),
        total: 400_000,
        staff: 1,
        detail: ServiceDetail::Hourly { hours: 4.0 },
        ..Default::default()
    })
}

#[tokio::test]
async fn test_list_from_mock_api() {
    let base = start(Arc::new(AppState::seeded())).await;
    let api = BookingApi::new(&ClientConfig::new(format!("{}/api", base))).unwrap();

    let fetched = api.list_bookings().await.unwrap();
    assert_eq!(fetched.source, Source::Remote);
    assert_eq!(fetched.value.len(), 5);
    assert_eq!(fetched.value[2].core.detail, ServiceDetail::Area { area: 100.0 });
}

#[tokio::test]
async fn test_create_assigns_id() {
    let state = Arc::new(AppState::seeded());
    let base = start(state.clone()).await;
    let api = BookingApi::new(&ClientConfig::new(format!("{}/api", base))).unwrap();

    let created = api.submit_booking(draft()).await.unwrap();
    assert!(created.is_remote());
    assert_eq!(created.value.id, 6);
    assert_eq!(created.value.status, BookingStatus::Pending);
    assert_eq!(state.list().len(), 6);
}

#[tokio::test]
async fn test_create_validation_error_surfaces() {
    let base = start(Arc::new(AppState::seeded())).await;
    let api = BookingApi::new(&ClientConfig::new(format!("{}/api", base))).unwrap();

    let err = api
        .create_booking(&BookingDraft::default())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
}

#[tokio::test]
async fn test_error_envelope_message_surfaces() {
    let base = start(Arc::new(AppState::seeded())).await;
    let http = HttpClient::new(&ClientConfig::new(format!("{}/api/", base))).unwrap();

    let one = http.get("/bookings/2").await.unwrap();
    assert_eq!(one["id"], 2);

    let err = http.get("bookings/99").await.unwrap_err();
    match err {
        ClientError::NotFound(message) => assert_eq!(message, "Booking 99 not found"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_fallback_when_unreachable() {
    // nothing listens on port 9 locally
    let config = ClientConfig::new("http://127.0.0.1:9/api").with_timeout_ms(2_000);
    let api = BookingApi::new(&config).unwrap();

    let fetched = api.list_bookings().await.unwrap();
    assert_eq!(fetched.source, Source::Fallback);
    assert_eq!(fetched.value.len(), 5);
    assert!(fetched.error.is_some());

    let created = api.submit_booking(draft()).await.unwrap();
    assert_eq!(created.source, Source::Fallback);
    assert!(created.value.created_at.is_some());

    let strict = BookingApi::new(&config.with_mock_fallback(false)).unwrap();
    assert!(strict.list_bookings().await.is_err());
}

#[tokio::test]
async fn test_zns_delivery_and_rejection() {
    let state = Arc::new(AppState::seeded());
    let base = start(state.clone()).await;
    let zns = ZnsClient::new(
        ZnsConfig::new()
            .with_access_token("test-token")
            .with_base_url(format!("{}/zns/message/template", base)),
    )
    .unwrap();

    let request = NotificationRequest {
        kind: NotificationKind::BookingConfirmed,
        booking_id: Some(1),
        phone: "0909 123 456".into(),
        template_data: TemplateData::new(),
    };

    let receipt = zns.send(&request).await.unwrap();
    assert!(!receipt.simulated);
    assert_eq!(receipt.message_id, "mock_1");

    state.fail_next_zns(1);
    let err = zns.send(&request).await.unwrap_err();
    assert!(matches!(err, ClientError::Rejected { code: -133, .. }));
    assert_eq!(state.zns_sent(), 1);
}
