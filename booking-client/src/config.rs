//! Client configuration

use shared::notification::TemplateIds;

/// Default bookings API
pub const DEFAULT_API_URL: &str = "https://nscare-backend.onrender.com/api";
/// Template message endpoint of the messaging platform
pub const DEFAULT_ZNS_URL: &str = "https://business.openapi.zalo.me/message/template";
/// Mini app id registered with the messaging platform
pub const DEFAULT_APP_ID: &str = "3794181198297525649";

/// Configuration for the bookings API client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API base URL, e.g. "http://localhost:3000/api"
    pub base_url: String,

    /// Bearer token, if the API wants one
    pub token: Option<String>,

    /// Request timeout in milliseconds
    pub timeout_ms: u64,

    /// Serve the built-in mock list when the API cannot be reached
    pub mock_fallback: bool,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout_ms: 30_000,
            mock_fallback: true,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn with_mock_fallback(mut self, enabled: bool) -> Self {
        self.mock_fallback = enabled;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_API_URL)
    }
}

/// Configuration for the template message client
#[derive(Debug, Clone)]
pub struct ZnsConfig {
    /// Without a token every send is simulated
    pub access_token: Option<String>,
    pub app_id: String,
    pub base_url: String,
    pub templates: TemplateIds,
    /// Simulate sends even when a token is set
    pub development: bool,
    pub timeout_ms: u64,
}

impl ZnsConfig {
    pub fn new() -> Self {
        Self {
            access_token: None,
            app_id: DEFAULT_APP_ID.to_string(),
            base_url: DEFAULT_ZNS_URL.to_string(),
            templates: TemplateIds::default(),
            development: false,
            timeout_ms: 30_000,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        let token = token.into();
        self.access_token = (!token.trim().is_empty()).then_some(token);
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    pub fn with_templates(mut self, templates: TemplateIds) -> Self {
        self.templates = templates;
        self
    }

    pub fn with_development(mut self, development: bool) -> Self {
        self.development = development;
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Sends are simulated (no token, or development mode)
    pub fn is_simulated(&self) -> bool {
        self.development || self.access_token.is_none()
    }
}

impl Default for ZnsConfig {
    fn default() -> Self {
        Self::new()
    }
}
