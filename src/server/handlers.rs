//! # 系统处理器
//!
//! 存活探测、路由目录以及可公开给浏览器的演示配置。

use axum::Json;
use axum::extract::State;
use serde::Serialize;

use super::AppState;
use crate::config::AppConfig;
use crate::providers::RouteInfo;

/// Ping 处理器
pub async fn ping_handler() -> &'static str {
    "pong"
}

/// 根路径返回的服务信息
#[derive(Debug, Serialize)]
pub struct ServiceInfo {
    pub service: &'static str,
    pub version: &'static str,
    pub routes: Vec<RouteInfo>,
}

/// 根路径处理器
pub async fn root_handler(State(state): State<AppState>) -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        routes: state.catalog.as_ref().clone(),
    })
}

/// 公开的 Klarna 演示凭据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublicKlarnaConfig {
    pub username: Option<String>,
    pub password: Option<String>,
}

/// 公开的 Stripe 配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicStripeConfig {
    pub publishable_key: Option<String>,
}

/// 公开的 Adyen 配置
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicAdyenConfig {
    pub client_key: Option<String>,
    pub environment: String,
}

/// 浏览器可见的配置子集，不包含任何服务端密钥
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PublicConfig {
    pub klarna: PublicKlarnaConfig,
    pub stripe: PublicStripeConfig,
    pub adyen: PublicAdyenConfig,
}

impl From<&AppConfig> for PublicConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            klarna: PublicKlarnaConfig {
                username: config.klarna.public_username.clone(),
                password: config.klarna.public_password.clone(),
            },
            stripe: PublicStripeConfig {
                publishable_key: config.stripe.publishable_key.clone(),
            },
            adyen: PublicAdyenConfig {
                client_key: config.adyen.client_key.clone(),
                environment: config.adyen.environment.clone(),
            },
        }
    }
}

/// `GET /api/config/public`
pub async fn public_config_handler(State(state): State<AppState>) -> Json<PublicConfig> {
    Json(PublicConfig::from(state.route_context.config.as_ref()))
}
