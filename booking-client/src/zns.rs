//! Template message client (ZNS)
//!
//! POSTs `{ phone, template_id, template_data, tracking_id }` to the
//! template endpoint with the `access_token` header. A response with
//! `error == 0` is a delivery; anything else is a rejection.
//!
//! Without an access token (or in development mode) nothing leaves the
//! process: the send is logged and a simulated receipt is returned.

use crate::{ClientError, ClientResult, ZnsConfig};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::notification::{NotificationRequest, TemplateData, format_phone_for_zns};
use shared::util::now_millis;
use std::time::Duration;

/// Proof of delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub message_id: String,
    pub sent_time: String,
    /// Not actually sent
    pub simulated: bool,
}

/// Anything that can deliver a notification
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, request: &NotificationRequest) -> ClientResult<DeliveryReceipt>;
}

#[derive(Debug, Serialize)]
struct ZnsPayload<'a> {
    phone: String,
    template_id: &'a str,
    template_data: &'a TemplateData,
    tracking_id: String,
}

#[derive(Debug, Deserialize)]
struct ZnsResponse {
    error: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<ZnsResponseData>,
}

#[derive(Debug, Deserialize)]
struct ZnsResponseData {
    #[serde(default)]
    msg_id: Option<Value>,
    #[serde(default)]
    sent_time: Option<Value>,
}

fn value_to_string(v: Option<Value>) -> String {
    match v {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Connection report for `notify check`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionReport {
    pub has_access_token: bool,
    pub simulated: bool,
    pub app_id: String,
    pub base_url: String,
}

#[derive(Debug, Clone)]
pub struct ZnsClient {
    client: Client,
    config: ZnsConfig,
}

impl ZnsClient {
    pub fn new(config: ZnsConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ZnsConfig {
        &self.config
    }

    pub fn check_connection(&self) -> ConnectionReport {
        ConnectionReport {
            has_access_token: self.config.access_token.is_some(),
            simulated: self.config.is_simulated(),
            app_id: self.config.app_id.clone(),
            base_url: self.config.base_url.clone(),
        }
    }

    fn simulated_receipt(&self, payload: &ZnsPayload<'_>) -> DeliveryReceipt {
        tracing::info!(
            phone = %payload.phone,
            template_id = payload.template_id,
            tracking_id = %payload.tracking_id,
            "Notification simulated (development mode)"
        );
        DeliveryReceipt {
            message_id: format!("dev_{}", now_millis()),
            sent_time: chrono::Utc::now().to_rfc3339(),
            simulated: true,
        }
    }
}

#[async_trait]
impl Notifier for ZnsClient {
    async fn send(&self, request: &NotificationRequest) -> ClientResult<DeliveryReceipt> {
        let template_id = self
            .config
            .templates
            .for_kind(request.kind)
            .ok_or_else(|| {
                ClientError::Config(format!("no template configured for {}", request.kind))
            })?;
        let phone = format_phone_for_zns(&request.phone);
        if phone.is_empty() {
            return Err(ClientError::Validation(
                "recipient phone is empty".to_string(),
            ));
        }

        let payload = ZnsPayload {
            phone,
            template_id,
            template_data: &request.template_data,
            tracking_id: format!("booking_{}", now_millis()),
        };

        let token = match (&self.config.access_token, self.config.development) {
            (Some(token), false) => token,
            _ => return Ok(self.simulated_receipt(&payload)),
        };

        let response = self
            .client
            .post(&self.config.base_url)
            .header("access_token", token)
            .json(&payload)
            .send()
            .await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        let body: ZnsResponse = serde_json::from_slice(&bytes).map_err(|e| {
            if status.is_success() {
                ClientError::InvalidResponse(e.to_string())
            } else {
                ClientError::Server {
                    status: status.as_u16(),
                    body: String::from_utf8_lossy(&bytes).into_owned(),
                }
            }
        })?;

        if body.error != 0 {
            return Err(ClientError::Rejected {
                code: body.error,
                message: body
                    .message
                    .unwrap_or_else(|| "ZNS API Error".to_string()),
            });
        }

        let data = body.data.ok_or_else(|| {
            ClientError::InvalidResponse("missing data in messaging API response".to_string())
        })?;
        let receipt = DeliveryReceipt {
            message_id: value_to_string(data.msg_id),
            sent_time: value_to_string(data.sent_time),
            simulated: false,
        };
        tracing::info!(
            kind = %request.kind,
            message_id = %receipt.message_id,
            "Notification delivered"
        );
        Ok(receipt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::notification::NotificationKind;

    fn request(kind: NotificationKind) -> NotificationRequest {
        NotificationRequest {
            kind,
            booking_id: Some(1),
            phone: "0909123456".into(),
            template_data: TemplateData::new(),
        }
    }

    #[tokio::test]
    async fn test_simulated_without_token() {
        let client = ZnsClient::new(ZnsConfig::new()).unwrap();
        let receipt = client
            .send(&request(NotificationKind::BookingConfirmed))
            .await
            .unwrap();
        assert!(receipt.simulated);
        assert!(receipt.message_id.starts_with("dev_"));
    }

    #[tokio::test]
    async fn test_missing_template_is_config_error() {
        let client = ZnsClient::new(ZnsConfig::new()).unwrap();
        let err = client
            .send(&request(NotificationKind::PointsUpdated))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_check_connection() {
        let client =
            ZnsClient::new(ZnsConfig::new().with_access_token("secret")).unwrap();
        let report = client.check_connection();
        assert!(report.has_access_token);
        assert!(!report.simulated);
        assert_eq!(report.app_id, "3794181198297525649");

        let client = ZnsClient::new(ZnsConfig::new().with_access_token("  ")).unwrap();
        assert!(client.check_connection().simulated);
    }
}
