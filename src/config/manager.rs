//! # 配置管理器
//!
//! 统一的配置加载入口：TOML 文件 → 环境变量覆盖 → 校验

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::AppConfig;
use crate::error::{Context, Result};
use crate::logging::{LogComponent, LogStage};
use crate::proxy::upstream_url::validate_base_url;
use crate::{config_error, ensure, linfo};

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "PAYMENTS_PROXY_CONFIG_PATH";

/// 配置管理器
#[derive(Debug, Clone)]
pub struct ConfigManager {
    /// 当前配置
    config: Arc<AppConfig>,
    /// 配置来源文件（使用内置默认值时为空）
    source: Option<PathBuf>,
}

impl ConfigManager {
    /// 按约定位置加载配置，并应用进程环境变量覆盖
    pub fn new() -> Result<Self> {
        let path = env::var(CONFIG_PATH_ENV).map_or_else(
            |_| {
                let env = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
                PathBuf::from(format!("config/config.{env}.toml"))
            },
            PathBuf::from,
        );
        Self::load(Some(&path), |key| env::var(key).ok())
    }

    /// 从指定文件加载配置
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::load(Some(path.as_ref()), |key| env::var(key).ok())
    }

    /// 通用加载流程，环境变量读取由调用方注入
    ///
    /// 文件不存在时使用内置默认值。
    pub fn load<F>(path: Option<&Path>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let (mut config, source) = match path {
            Some(path) if path.exists() => (Self::load_config_file(path)?, Some(path.to_path_buf())),
            _ => (AppConfig::default(), None),
        };

        apply_env_overrides(&mut config, lookup)?;
        validate(&config)?;

        linfo!(
            "system",
            LogStage::Configuration,
            LogComponent::Config,
            "config_loaded",
            "configuration loaded",
            source = source
                .as_ref()
                .map_or_else(|| "defaults".to_string(), |p| p.display().to_string()),
            klarna_base_url = config.klarna.base_url
        );

        Ok(Self {
            config: Arc::new(config),
            source,
        })
    }

    /// 读取并解析 TOML 配置文件
    fn load_config_file(path: &Path) -> Result<AppConfig> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: AppConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// 当前配置
    #[must_use]
    pub fn config(&self) -> Arc<AppConfig> {
        Arc::clone(&self.config)
    }

    /// 配置来源文件
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }
}

/// 应用环境变量覆盖
///
/// 只有非空值才会覆盖文件配置。
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(value) = get("PAYMENTS_PROXY_BIND") {
        config.server.bind_address = value;
    }
    if let Some(value) = get("PAYMENTS_PROXY_PORT") {
        config.server.port = value
            .trim()
            .parse()
            .map_err(|e| config_error!("invalid PAYMENTS_PROXY_PORT '{}': {}", value, e))?;
    }
    if let Some(value) = get("PAYMENTS_PROXY_PUBLIC_ORIGIN") {
        config.server.public_origin = Some(value);
    }

    if let Some(value) = get("KLARNA_API_BASE_URL") {
        config.klarna.base_url = value;
    }
    if let Some(value) = get("KLARNA_API_USERNAME") {
        config.klarna.username = Some(value);
    }
    if let Some(value) = get("KLARNA_API_PASSWORD") {
        config.klarna.password = Some(value);
    }
    if let Some(value) = get("NEXT_PUBLIC_KLARNA_API_USERNAME") {
        config.klarna.public_username = Some(value);
    }
    if let Some(value) = get("NEXT_PUBLIC_KLARNA_API_PASSWORD") {
        config.klarna.public_password = Some(value);
    }

    if let Some(value) = get("INSPECTOR_MAX_CONTENT_CHARS") {
        config.inspector.max_content_chars = value.trim().parse().map_err(|e| {
            config_error!("invalid INSPECTOR_MAX_CONTENT_CHARS '{}': {}", value, e)
        })?;
    }

    if let Some(value) = get("STRIPE_SECRET_KEY") {
        config.stripe.secret_key = Some(value);
    }
    if let Some(value) = get("STRIPE_PRICE_ID_USD") {
        config.stripe.price_id = Some(value);
    }
    if let Some(value) = get("STRIPE_SUCCESS_URL") {
        config.stripe.success_url = Some(value);
    }
    if let Some(value) = get("STRIPE_CANCEL_URL") {
        config.stripe.cancel_url = Some(value);
    }
    if let Some(value) = get("NEXT_PUBLIC_STRIPE_PUBLISHABLE_KEY") {
        config.stripe.publishable_key = Some(value);
    }

    if let Some(value) = get("ADYEN_API_KEY") {
        config.adyen.api_key = Some(value);
    }
    if let Some(value) = get("ADYEN_MERCHANT_ACCOUNT") {
        config.adyen.merchant_account = Some(value);
    }
    if let Some(value) = get("NEXT_PUBLIC_ADYEN_CLIENT_KEY") {
        config.adyen.client_key = Some(value);
    }
    if let Some(value) = get("NEXT_PUBLIC_ADYEN_ENV") {
        config.adyen.environment = value;
    }

    Ok(())
}

/// 验证配置有效性
pub fn validate(config: &AppConfig) -> Result<()> {
    ensure!(
        config.server.port != 0,
        config_error!("server.port must be greater than 0")
    );
    ensure!(
        config.server.max_request_size > 0,
        config_error!("server.max_request_size must be greater than 0")
    );
    ensure!(
        config.inspector.max_content_chars > 0,
        config_error!("inspector.max_content_chars must be greater than 0")
    );
    ensure!(
        config.inspector.max_data_url_chars > 0,
        config_error!("inspector.max_data_url_chars must be greater than 0")
    );

    validate_base_url(&config.klarna.base_url).context("klarna.base_url")?;
    validate_base_url(&config.stripe.api_base_url).context("stripe.api_base_url")?;
    validate_base_url(&config.adyen.checkout_base_url).context("adyen.checkout_base_url")?;
    if let Some(origin) = config.server.public_origin.as_deref() {
        validate_base_url(origin).context("server.public_origin")?;
    }

    Ok(())
}
