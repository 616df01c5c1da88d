//! Status codes the bookings API answers with

use super::category::ErrorCategory;
use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,
            Self::NotFound | Self::BookingNotFound | Self::CustomerNotFound => {
                StatusCode::NOT_FOUND
            }
            Self::BusinessRule | Self::InvalidTransition => StatusCode::UNPROCESSABLE_ENTITY,
            Self::NotificationRejected => StatusCode::BAD_GATEWAY,
            Self::TimeoutError => StatusCode::GATEWAY_TIMEOUT,
            Self::NetworkError | Self::NotificationFailed => StatusCode::SERVICE_UNAVAILABLE,
            Self::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
            _ => match self.category() {
                ErrorCategory::System => StatusCode::INTERNAL_SERVER_ERROR,
                _ => StatusCode::BAD_REQUEST,
            },
        }
    }

    /// The same request may succeed later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.http_status(),
            StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_booking_codes() {
        assert_eq!(ErrorCode::BookingNotFound.http_status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::InvalidTransition.http_status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(ErrorCode::InvalidBookingForm.http_status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_form_input_is_bad_request() {
        for code in [
            ErrorCode::RequiredField,
            ErrorCode::InvalidAmount,
            ErrorCode::UnknownTheme,
            ErrorCode::TemplateMissing,
        ] {
            assert_eq!(code.http_status(), StatusCode::BAD_REQUEST, "{:?}", code);
        }
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorCode::TimeoutError.is_retryable());
        assert!(ErrorCode::NotificationFailed.is_retryable());
        assert!(!ErrorCode::NotificationRejected.is_retryable());
        assert!(!ErrorCode::StorageError.is_retryable());
        assert_eq!(
            ErrorCode::ConfigError.http_status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
