//! Booking Client - HTTP clients for the external services
//!
//! - [`BookingApi`]: the bookings backend, with mock fallback
//! - [`ZnsClient`]: the messaging platform's template API

pub mod bookings;
pub mod config;
pub mod error;
pub mod http;
pub mod mock;
pub mod zns;

pub use bookings::{BookingApi, Fetched, Source};
pub use config::{ClientConfig, ZnsConfig};
pub use error::{ClientError, ClientResult};
pub use http::HttpClient;
pub use mock::mock_bookings;
pub use zns::{ConnectionReport, DeliveryReceipt, Notifier, ZnsClient};
