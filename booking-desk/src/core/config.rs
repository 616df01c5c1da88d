use booking_client::config::{DEFAULT_API_URL, DEFAULT_APP_ID, DEFAULT_ZNS_URL};
use booking_client::{ClientConfig, ZnsConfig};
use shared::notification::{DEFAULT_HOTLINE, TemplateContext, TemplateIds};
use std::path::PathBuf;

/// Phones treated as admin when `ADMIN_PHONES` is not set
pub const DEFAULT_ADMIN_PHONES: [&str; 2] = ["0909123456", "0888999777"];

/// 后台配置
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖 (`.env` 由 dotenv 加载)：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | WORK_DIR | ./work_dir | 工作目录 (数据库、日志) |
/// | BOOKING_API_URL | https://nscare-backend.onrender.com/api | 预约 API |
/// | REQUEST_TIMEOUT_MS | 30000 | 请求超时(毫秒) |
/// | ZNS_ACCESS_TOKEN | (none) | 模板消息 token，缺省时只模拟发送 |
/// | ZNS_APP_ID | 3794181198297525649 | Mini app id |
/// | ZNS_BASE_URL | https://business.openapi.zalo.me/message/template | 模板消息接口 |
/// | ZNS_TEMPLATE_POINTS | (none) | 积分变动模板 id |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_LEVEL | info | 日志级别 |
/// | LOG_JSON | false | JSON 日志 |
/// | ADMIN_PHONES | 0909123456,0888999777 | 管理员手机号，逗号分隔 |
/// | HOTLINE | 1900 2024 | 模板中的热线 |
///
/// # 示例
///
/// ```ignore
/// WORK_DIR=/data/desk BOOKING_API_URL=http://127.0.0.1:3000/api booking-desk bookings list
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// 工作目录，存储数据库、日志等文件
    pub work_dir: String,
    pub api_url: String,
    /// 请求超时时间 (毫秒)
    pub request_timeout_ms: u64,
    /// Serve the built-in bookings when the API is unreachable
    pub mock_fallback: bool,
    pub zns_access_token: Option<String>,
    pub zns_app_id: String,
    pub zns_base_url: String,
    pub zns_template_points: Option<String>,
    /// 运行环境: development | staging | production
    pub environment: String,
    pub log_level: String,
    pub log_json: bool,
    pub admin_phones: Vec<String>,
    pub hotline: String,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            work_dir: std::env::var("WORK_DIR").unwrap_or_else(|_| "./work_dir".into()),
            api_url: std::env::var("BOOKING_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into()),
            request_timeout_ms: std::env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(30000),
            mock_fallback: std::env::var("MOCK_FALLBACK")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(true),
            zns_access_token: std::env::var("ZNS_ACCESS_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            zns_app_id: std::env::var("ZNS_APP_ID").unwrap_or_else(|_| DEFAULT_APP_ID.into()),
            zns_base_url: std::env::var("ZNS_BASE_URL").unwrap_or_else(|_| DEFAULT_ZNS_URL.into()),
            zns_template_points: std::env::var("ZNS_TEMPLATE_POINTS")
                .ok()
                .filter(|t| !t.trim().is_empty()),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            log_json: std::env::var("LOG_JSON")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
            admin_phones: std::env::var("ADMIN_PHONES")
                .ok()
                .map(|v| parse_phone_list(&v))
                .unwrap_or_else(|| DEFAULT_ADMIN_PHONES.iter().map(|p| p.to_string()).collect()),
            hotline: std::env::var("HOTLINE").unwrap_or_else(|_| DEFAULT_HOTLINE.into()),
        }
    }

    /// Config rooted at `work_dir`, everything else from the environment
    ///
    /// 常用于测试场景
    pub fn with_work_dir(work_dir: impl Into<String>) -> Self {
        let mut config = Self::from_env();
        config.work_dir = work_dir.into();
        config
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_request_timeout_ms(mut self, ms: u64) -> Self {
        self.request_timeout_ms = ms;
        self
    }

    pub fn with_mock_fallback(mut self, enabled: bool) -> Self {
        self.mock_fallback = enabled;
        self
    }

    pub fn with_zns(mut self, base_url: impl Into<String>, access_token: Option<String>) -> Self {
        self.zns_base_url = base_url.into();
        self.zns_access_token = access_token.filter(|t| !t.trim().is_empty());
        self
    }

    pub fn with_environment(mut self, environment: impl Into<String>) -> Self {
        self.environment = environment.into();
        self
    }

    pub fn with_admin_phones(mut self, phones: &[&str]) -> Self {
        self.admin_phones = phones.iter().map(|p| p.to_string()).collect();
        self
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    pub fn database_path(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("desk.redb")
    }

    pub fn log_dir(&self) -> PathBuf {
        PathBuf::from(&self.work_dir).join("logs")
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api_url.clone())
            .with_timeout_ms(self.request_timeout_ms)
            .with_mock_fallback(self.mock_fallback)
    }

    /// Only production sends real messages; elsewhere a token alone is not enough
    pub fn zns_config(&self) -> ZnsConfig {
        let templates = TemplateIds {
            points_updated: self.zns_template_points.clone(),
            ..TemplateIds::default()
        };
        let mut zns = ZnsConfig::new()
            .with_base_url(self.zns_base_url.clone())
            .with_app_id(self.zns_app_id.clone())
            .with_templates(templates)
            .with_development(self.is_development())
            .with_timeout_ms(self.request_timeout_ms);
        if let Some(token) = &self.zns_access_token {
            zns = zns.with_access_token(token.clone());
        }
        zns
    }

    pub fn template_context(&self) -> TemplateContext {
        TemplateContext {
            hotline: self.hotline.clone(),
            ..TemplateContext::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

fn parse_phone_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}
