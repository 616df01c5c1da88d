use crate::state::AppState;
use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde_json::{Value, json};
use shared::error::{AppError, ErrorCode};
use shared::models::{Booking, BookingDraft};
use shared::response::ApiResponse;
use shared::util::now_millis;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/bookings", get(list_bookings).post(create_booking))
        .route("/api/bookings/{id}", get(get_booking))
        .route("/zns/message/template", post(send_template))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn error_response(err: AppError) -> Response {
    (err.http_status(), Json(ApiResponse::<()>::from(err))).into_response()
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// Bare JSON array, like the production backend
async fn list_bookings(State(state): State<Arc<AppState>>) -> Json<Vec<Booking>> {
    Json(state.list())
}

async fn get_booking(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Response {
    match state.get(id) {
        Some(b) => Json(b).into_response(),
        None => error_response(AppError::booking_not_found(id)),
    }
}

async fn create_booking(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<BookingDraft>,
) -> Response {
    let core = &draft.0;
    if core.name.trim().is_empty() || core.phone.trim().is_empty() {
        return error_response(
            AppError::with_message(ErrorCode::RequiredField, "name and phone are required")
                .with_detail("fields", json!(["name", "phone"])),
        );
    }
    let created_at = chrono::DateTime::from_timestamp_millis(now_millis())
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true));
    let booking = Booking::from_draft(state.next_id(), draft, created_at);
    tracing::info!(booking_id = booking.id, "Mock booking created");
    state.insert(booking.clone());
    (StatusCode::CREATED, Json(booking)).into_response()
}

/// Stand-in for the template message endpoint
async fn send_template(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Json<Value> {
    let token = headers
        .get("access_token")
        .and_then(|h| h.to_str().ok())
        .unwrap_or("");
    if token.is_empty() {
        return Json(json!({ "error": -124, "message": "Access token is invalid" }));
    }
    if payload.get("phone").and_then(Value::as_str).is_none_or(str::is_empty) {
        return Json(json!({ "error": -108, "message": "Phone number is invalid" }));
    }
    if state.take_zns_failure() {
        return Json(json!({ "error": -133, "message": "Template is not approved" }));
    }
    let n = state.record_zns_sent();
    Json(json!({
        "error": 0,
        "message": "Success",
        "data": {
            "msg_id": format!("mock_{}", n),
            "sent_time": now_millis().to_string()
        }
    }))
}
