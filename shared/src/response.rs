//! JSON envelope of the bookings API
//!
//! ```json
//! { "code": 1001, "message": "Booking 7 not found", "details": { "booking_id": 7 } }
//! ```
//!
//! Errors always come wrapped. Success bodies may be wrapped under `data`
//! or sent bare, so readers go through [`open_body`].

use crate::error::{AppError, ErrorCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// [`ErrorCode`] value, 0 on success
    #[serde(default)]
    pub code: u16,
    #[serde(default)]
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, Value>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: ErrorCode::Success.code(),
            message: "OK".to_string(),
            data: Some(data),
            details: BTreeMap::new(),
        }
    }

    /// Payload, or the error the envelope carries
    pub fn into_result(self) -> Result<Option<T>, AppError> {
        let code = ErrorCode::try_from(self.code).unwrap_or(ErrorCode::Unknown);
        if code.is_success() {
            return Ok(self.data);
        }
        let message = if self.message.is_empty() {
            code.message().to_string()
        } else {
            self.message
        };
        let mut err = AppError::with_message(code, message);
        err.details = self.details;
        Err(err)
    }
}

impl<T> From<AppError> for ApiResponse<T> {
    fn from(err: AppError) -> Self {
        Self {
            code: err.code.code(),
            message: err.message,
            data: None,
            details: err.details,
        }
    }
}

fn is_envelope(body: &Value) -> bool {
    match body {
        Value::Object(map) => {
            map.contains_key("data") || (map.contains_key("code") && map.contains_key("message"))
        }
        _ => false,
    }
}

/// Unwrap `data` from an enveloped body; bare bodies pass through
pub fn open_body(body: Value) -> Result<Value, AppError> {
    if !is_envelope(&body) {
        return Ok(body);
    }
    let envelope: ApiResponse<Value> = serde_json::from_value(body)
        .map_err(|e| AppError::with_message(ErrorCode::InvalidRequest, e.to_string()))?;
    envelope.into_result().map(|data| data.unwrap_or(Value::Null))
}

/// Error carried by a non-2xx body, if it is an envelope
pub fn error_from_body(text: &str) -> Option<AppError> {
    let envelope: ApiResponse<Value> = serde_json::from_str(text).ok()?;
    envelope.into_result().err()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_envelope_shape() {
        let response = ApiResponse::<()>::from(AppError::booking_not_found(12));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["code"], 1001);
        assert_eq!(json["details"]["booking_id"], 12);
        assert!(json.get("data").is_none());

        let ok = serde_json::to_value(ApiResponse::success(3)).unwrap();
        assert_eq!(ok, json!({ "code": 0, "message": "OK", "data": 3 }));
    }

    #[test]
    fn test_open_bare_and_wrapped() {
        let bare = json!([{ "id": 1 }]);
        assert_eq!(open_body(bare.clone()).unwrap(), bare);

        let wrapped = json!({ "code": 0, "message": "OK", "data": [1, 2] });
        assert_eq!(open_body(wrapped).unwrap(), json!([1, 2]));

        // `data` alone is enough
        assert_eq!(open_body(json!({ "data": 5 })).unwrap(), json!(5));

        // a booking object is not an envelope
        let booking = json!({ "id": 3, "status": "pending" });
        assert_eq!(open_body(booking.clone()).unwrap(), booking);
    }

    #[test]
    fn test_open_error() {
        let err = open_body(json!({
            "code": 1002,
            "message": "cannot confirm a booking that is cancelled"
        }))
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidTransition);

        let odd = error_from_body(r#"{"code":31337,"message":""}"#).unwrap();
        assert_eq!(odd.code, ErrorCode::Unknown);
        assert_eq!(odd.message, "Unknown error");

        assert!(error_from_body("<html>502</html>").is_none());
        assert!(error_from_body(r#"{"code":0,"message":"OK"}"#).is_none());
    }
}
