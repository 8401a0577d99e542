//! # 配置管理模块
//!
//! 处理应用配置加载、环境变量覆盖和验证

mod app_config;
mod manager;

pub use app_config::{
    AdyenConfig, AppConfig, DEFAULT_ADYEN_CHECKOUT_BASE_URL, DEFAULT_KLARNA_BASE_URL,
    DEFAULT_STRIPE_API_BASE_URL, InspectorConfig, KlarnaConfig, ServerConfig, StripeConfig,
    UpstreamConfig,
};
pub use manager::{CONFIG_PATH_ENV, ConfigManager, apply_env_overrides, validate};
