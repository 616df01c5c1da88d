//! Bookings API
//!
//! `GET {base}/bookings` and `POST {base}/bookings`. The remote side is a
//! third-party backend, so responses are decoded defensively: either a bare
//! JSON array or a `shared::response` envelope is accepted, and one malformed
//! record is skipped instead of failing the whole list.

use crate::mock::mock_bookings;
use crate::{ClientConfig, ClientError, ClientResult, HttpClient};
use serde_json::Value;
use shared::response::open_body;
use shared::models::{Booking, BookingDraft};
use shared::util::{now_millis, snowflake_id};

const BOOKINGS_PATH: &str = "bookings";

/// Where a result came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Remote,
    /// Built-in list or local synthesis
    Fallback,
}

/// A value plus its origin
#[derive(Debug, Clone)]
pub struct Fetched<T> {
    pub value: T,
    pub source: Source,
    /// Why the remote call was not used
    pub error: Option<String>,
}

impl<T> Fetched<T> {
    fn remote(value: T) -> Self {
        Self {
            value,
            source: Source::Remote,
            error: None,
        }
    }

    fn fallback(value: T, error: &ClientError) -> Self {
        Self {
            value,
            source: Source::Fallback,
            error: Some(error.to_string()),
        }
    }

    pub fn is_remote(&self) -> bool {
        self.source == Source::Remote
    }
}

#[derive(Debug, Clone)]
pub struct BookingApi {
    http: HttpClient,
    mock_fallback: bool,
}

impl BookingApi {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        Ok(Self {
            http: HttpClient::new(config)?,
            mock_fallback: config.mock_fallback,
        })
    }

    pub fn base_url(&self) -> &str {
        self.http.base_url()
    }

    /// Fetch the remote list
    pub async fn fetch_bookings(&self) -> ClientResult<Vec<Booking>> {
        let body: Value = self.http.get(BOOKINGS_PATH).await?;
        decode_booking_list(body)
    }

    /// Submit a booking; the API assigns the id
    pub async fn create_booking(&self, draft: &BookingDraft) -> ClientResult<Booking> {
        let body: Value = self.http.post(BOOKINGS_PATH, draft).await?;
        decode_single(body)
    }

    /// Remote list, or the built-in list when the API fails
    pub async fn list_bookings(&self) -> ClientResult<Fetched<Vec<Booking>>> {
        match self.fetch_bookings().await {
            Ok(list) => {
                tracing::info!(count = list.len(), "Bookings loaded from API");
                Ok(Fetched::remote(list))
            }
            Err(e) if self.mock_fallback => {
                tracing::warn!(error = %e, "Bookings API unavailable, using mock data");
                Ok(Fetched::fallback(mock_bookings(), &e))
            }
            Err(e) => Err(e),
        }
    }

    /// Submit, or synthesize a pending booking locally when the API fails
    pub async fn submit_booking(&self, draft: BookingDraft) -> ClientResult<Fetched<Booking>> {
        match self.create_booking(&draft).await {
            Ok(booking) => {
                tracing::info!(booking_id = booking.id, "Booking created via API");
                Ok(Fetched::remote(booking))
            }
            Err(e) if self.mock_fallback => {
                tracing::warn!(error = %e, "Bookings API unavailable, creating booking locally");
                Ok(Fetched::fallback(synthesize_booking(draft), &e))
            }
            Err(e) => Err(e),
        }
    }
}

/// Pending booking with a locally generated id
pub fn synthesize_booking(draft: BookingDraft) -> Booking {
    let created_at = chrono::DateTime::from_timestamp_millis(now_millis())
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true));
    Booking::from_draft(snowflake_id(), draft, created_at)
}

/// Decode a list body, skipping records that do not decode
pub fn decode_booking_list(body: Value) -> ClientResult<Vec<Booking>> {
    let Value::Array(items) = open_body(body).map_err(ClientError::Api)? else {
        return Err(ClientError::InvalidResponse(
            "expected a JSON array of bookings".to_string(),
        ));
    };
    let mut list = Vec::with_capacity(items.len());
    for item in items {
        match serde_json::from_value::<Booking>(item) {
            Ok(b) => list.push(b),
            Err(e) => tracing::warn!(error = %e, "Skipping malformed booking record"),
        }
    }
    Ok(list)
}

fn decode_single(body: Value) -> ClientResult<Booking> {
    serde_json::from_value(open_body(body).map_err(ClientError::Api)?).map_err(Into::into)
}
