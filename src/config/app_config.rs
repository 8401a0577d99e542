//! # 应用配置结构定义

use serde::{Deserialize, Serialize};

/// Klarna playground 默认地址
pub const DEFAULT_KLARNA_BASE_URL: &str = "https://api.playground.klarna.com";
/// Stripe API 默认地址
pub const DEFAULT_STRIPE_API_BASE_URL: &str = "https://api.stripe.com";
/// Adyen Checkout 测试环境默认地址
pub const DEFAULT_ADYEN_CHECKOUT_BASE_URL: &str = "https://checkout-test.adyen.com/v71";

/// 应用主配置结构
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// HTTP 服务器配置
    pub server: ServerConfig,
    /// Klarna 配置
    pub klarna: KlarnaConfig,
    /// 检查快照配置
    pub inspector: InspectorConfig,
    /// 上游客户端配置
    pub upstream: UpstreamConfig,
    /// Stripe 配置
    pub stripe: StripeConfig,
    /// Adyen 配置
    pub adyen: AdyenConfig,
}

/// HTTP 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 监听地址
    pub bind_address: String,
    /// 监听端口
    pub port: u16,
    /// 是否启用CORS
    pub enable_cors: bool,
    /// 允许的CORS源地址
    pub cors_origins: Vec<String>,
    /// 入站请求体最大字节数
    pub max_request_size: usize,
    /// 对外访问地址（用于拼接回跳 URL），缺省时从请求头推导
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_origin: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            enable_cors: true,
            cors_origins: vec!["*".to_string()],
            max_request_size: 1024 * 1024, // 1MB
            public_origin: None,
        }
    }
}

/// Klarna 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KlarnaConfig {
    /// API 基础地址
    pub base_url: String,
    /// 服务端凭证用户名
    pub username: Option<String>,
    /// 服务端凭证密码
    pub password: Option<String>,
    /// 前端演示默认用户名（可公开）
    pub public_username: Option<String>,
    /// 前端演示默认密码（可公开）
    pub public_password: Option<String>,
}

impl Default for KlarnaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_KLARNA_BASE_URL.to_string(),
            username: None,
            password: None,
            public_username: None,
            public_password: None,
        }
    }
}

impl KlarnaConfig {
    /// 服务端凭证对应的原始 Basic 认证头（`Basic user:pass`，由规范化器负责编码）
    #[must_use]
    pub fn server_authorization(&self) -> Option<String> {
        match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(format!("Basic {username}:{password}"))
            }
            _ => None,
        }
    }
}

/// 检查快照配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InspectorConfig {
    /// 是否生成检查快照
    pub enabled: bool,
    /// 请求/响应正文的最大字符数
    pub max_content_chars: usize,
    /// data URL 的最大字符数
    pub max_data_url_chars: usize,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_content_chars: 10_000,
            max_data_url_chars: 5_000,
        }
    }
}

/// 上游 HTTP 客户端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// 请求超时（秒），缺省时使用客户端默认行为
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    /// 出站 User-Agent
    pub user_agent: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: None,
            user_agent: concat!("payments-proxy/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Stripe 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StripeConfig {
    /// API 基础地址
    pub api_base_url: String,
    /// 服务端密钥
    pub secret_key: Option<String>,
    /// 前端可公开的 publishable key
    pub publishable_key: Option<String>,
    /// 结算使用的价格 ID
    pub price_id: Option<String>,
    /// 支付成功回跳地址
    pub success_url: Option<String>,
    /// 支付取消回跳地址
    pub cancel_url: Option<String>,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_STRIPE_API_BASE_URL.to_string(),
            secret_key: None,
            publishable_key: None,
            price_id: None,
            success_url: None,
            cancel_url: None,
        }
    }
}

/// Adyen 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdyenConfig {
    /// Checkout API 基础地址（含版本号）
    pub checkout_base_url: String,
    /// 服务端 API Key
    pub api_key: Option<String>,
    /// 商户账号
    pub merchant_account: Option<String>,
    /// 前端可公开的 client key
    pub client_key: Option<String>,
    /// 前端 SDK 环境（test / live）
    pub environment: String,
}

impl Default for AdyenConfig {
    fn default() -> Self {
        Self {
            checkout_base_url: DEFAULT_ADYEN_CHECKOUT_BASE_URL.to_string(),
            api_key: None,
            merchant_account: None,
            client_key: None,
            environment: "test".to_string(),
        }
    }
}

impl AppConfig {
    /// 获取服务监听地址
    #[must_use]
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.server.bind_address, self.server.port)
    }
}
