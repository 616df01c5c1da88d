//! JSON over HTTP against one base URL

use crate::{ClientConfig, ClientError, ClientResult};
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde_json::Value;
use shared::response::{error_from_body, open_body};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpClient {
    pub fn new(config: &ClientConfig) -> ClientResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn builder(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GET, envelope already opened
    pub async fn get(&self, path: &str) -> ClientResult<Value> {
        Self::read(self.builder(Method::GET, path)).await
    }

    /// POST a JSON body, envelope already opened
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> ClientResult<Value> {
        Self::read(self.builder(Method::POST, path).json(body)).await
    }

    async fn read(request: RequestBuilder) -> ClientResult<Value> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let message = error_from_body(&text)
                .map(|e| e.message)
                .unwrap_or(text);
            tracing::debug!(status = status.as_u16(), %message, "API answered with an error");
            return Err(match status {
                StatusCode::NOT_FOUND => ClientError::NotFound(message),
                StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                    ClientError::Validation(message)
                }
                _ => ClientError::Server {
                    status: status.as_u16(),
                    body: message,
                },
            });
        }

        let body: Value = serde_json::from_str(&text)?;
        open_body(body).map_err(ClientError::Api)
    }
}
