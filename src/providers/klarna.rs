//! # Klarna 代理路由
//!
//! Klarna Payments / Customer Token / Order Management / Disputes / On-site Messaging
//! 的声明式路由表，以及使用服务端凭证创建支付会话的辅助函数。

use async_trait::async_trait;
use axum::http::Method;
use serde_json::Value;
use uuid::Uuid;

use super::RouteEntry;
use crate::config::KlarnaConfig;
use crate::error::{ProxyError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::proxy::credentials::{BasicAuth, mask_auth};
use crate::proxy::dispatcher::{DispatchRequest, UpstreamClient};
use crate::proxy::route::{
    BodyMode, InboundRequest, OutboundHeader, ProxyRoute, RouteContext, RouteStrategy,
};
use crate::proxy::upstream_url::build_upstream_url;
use crate::{config_error, linfo};

/// Klarna 幂等键请求头
pub const IDEMPOTENCY_HEADER: &str = "Klarna-Idempotency-Key";
/// 幂等键在转发描述中可见的前缀长度
const IDEMPOTENCY_VISIBLE_PREFIX: usize = 8;

const DEFAULT_OSM_LOCALE: &str = "en-US";
const DEFAULT_OSM_PLACEMENT_KEY: &str = "credit-promotion-badge";

type ResolveFn = fn(&InboundRequest) -> Result<String>;

/// 声明式 Klarna 路由
#[derive(Debug, Clone)]
pub struct KlarnaRoute {
    name: &'static str,
    method: Method,
    also_post: bool,
    body_mode: BodyMode,
    idempotent: bool,
    resolve: ResolveFn,
}

impl KlarnaRoute {
    fn new(name: &'static str, method: Method, resolve: ResolveFn) -> Self {
        Self {
            name,
            method,
            also_post: false,
            body_mode: BodyMode::None,
            idempotent: false,
            resolve,
        }
    }

    /// 同时接受 POST 入站请求
    fn also_post(mut self) -> Self {
        self.also_post = true;
        self
    }

    fn body(mut self, mode: BodyMode) -> Self {
        self.body_mode = mode;
        self
    }

    /// 每次调用附带新的幂等键
    fn idempotent(mut self) -> Self {
        self.idempotent = true;
        self
    }
}

#[async_trait]
impl RouteStrategy for KlarnaRoute {
    fn name(&self) -> &'static str {
        self.name
    }

    fn method(&self) -> Method {
        self.method.clone()
    }

    fn inbound_methods(&self) -> Vec<Method> {
        if self.also_post && self.method != Method::POST {
            vec![self.method.clone(), Method::POST]
        } else {
            vec![self.method.clone()]
        }
    }

    fn body_mode(&self) -> BodyMode {
        self.body_mode
    }

    async fn resolve_url(&self, inbound: &InboundRequest, _ctx: &RouteContext) -> Result<String> {
        (self.resolve)(inbound)
    }

    fn outbound_headers(&self, _inbound: &InboundRequest) -> Vec<OutboundHeader> {
        if !self.idempotent {
            return Vec::new();
        }
        let key = Uuid::new_v4().to_string();
        vec![OutboundHeader {
            name: IDEMPOTENCY_HEADER,
            display: Some(mask_auth(&key, IDEMPOTENCY_VISIBLE_PREFIX)),
            value: key,
        }]
    }
}

/// 取路径参数并做百分号编码
fn encoded_param(inbound: &InboundRequest, name: &str) -> Result<String> {
    inbound
        .required_param(name)
        .map(|value| urlencoding::encode(value).into_owned())
}

fn authorization_path(inbound: &InboundRequest, suffix: &str) -> Result<String> {
    let token = encoded_param(inbound, "authorizationToken")?;
    Ok(format!("/payments/v1/authorizations/{token}{suffix}"))
}

fn customer_token_path(inbound: &InboundRequest, suffix: &str) -> Result<String> {
    let token = encoded_param(inbound, "customerToken")?;
    Ok(format!("/customer-token/v1/tokens/{token}{suffix}"))
}

fn order_path(inbound: &InboundRequest, suffix: &str) -> Result<String> {
    let order_id = encoded_param(inbound, "orderId")?;
    Ok(format!("/ordermanagement/v1/orders/{order_id}{suffix}"))
}

/// On-site Messaging 查询地址
fn osm_path(inbound: &InboundRequest) -> Result<String> {
    let non_empty = |name: &str| inbound.query_param(name).filter(|v| !v.is_empty());
    let locale = non_empty("locale").unwrap_or_else(|| DEFAULT_OSM_LOCALE.to_string());
    let placement_key =
        non_empty("placement_key").unwrap_or_else(|| DEFAULT_OSM_PLACEMENT_KEY.to_string());

    let mut query = url::form_urlencoded::Serializer::new(String::new());
    query.append_pair("locale", &locale);
    query.append_pair("placement_key", &placement_key);
    if let Some(amount) = non_empty("purchase_amount") {
        query.append_pair("purchase_amount", &amount);
    }
    Ok(format!("/messaging/v4?{}", query.finish()))
}

/// Klarna 路由表
#[must_use]
pub fn routes() -> Vec<RouteEntry> {
    let table = [
        (
            "/create-session",
            KlarnaRoute::new("create_session", Method::POST, |_| {
                Ok("/payments/v1/sessions".to_string())
            })
            .body(BodyMode::Optional),
        ),
        (
            "/create-order/{authorizationToken}",
            KlarnaRoute::new("create_order", Method::POST, |r| {
                authorization_path(r, "/order")
            })
            .body(BodyMode::Optional),
        ),
        (
            "/create-customer-token/{authorizationToken}",
            KlarnaRoute::new("create_customer_token", Method::POST, |r| {
                authorization_path(r, "/customer-token")
            })
            .body(BodyMode::Required),
        ),
        (
            "/customer-token/read/{customerToken}",
            KlarnaRoute::new("read_customer_token", Method::GET, |r| {
                customer_token_path(r, "")
            }),
        ),
        (
            "/customer-token/create-order/{customerToken}",
            KlarnaRoute::new("customer_token_create_order", Method::POST, |r| {
                customer_token_path(r, "/order")
            })
            .body(BodyMode::Optional),
        ),
        (
            "/ordermanagement/get-order/{orderId}",
            KlarnaRoute::new("get_order", Method::GET, |r| order_path(r, "")).also_post(),
        ),
        (
            "/ordermanagement/capture-order/{orderId}",
            KlarnaRoute::new("capture_order", Method::POST, |r| order_path(r, "/captures"))
                .body(BodyMode::Optional),
        ),
        (
            "/ordermanagement/get-captures/{orderId}",
            KlarnaRoute::new("get_captures", Method::GET, |r| order_path(r, "/captures")),
        ),
        (
            "/ordermanagement/cancel-order/{orderId}",
            KlarnaRoute::new("cancel_order", Method::POST, |r| order_path(r, "/cancel")),
        ),
        (
            "/ordermanagement/refund-order/{orderId}",
            KlarnaRoute::new("refund_order", Method::POST, |r| order_path(r, "/refunds"))
                .body(BodyMode::Optional),
        ),
        (
            "/ordermanagement/release-remaining-authorization/{orderId}",
            KlarnaRoute::new("release_remaining_authorization", Method::POST, |r| {
                order_path(r, "/release-remaining-authorization")
            })
            .idempotent(),
        ),
        (
            "/disputes/list",
            KlarnaRoute::new("list_disputes", Method::GET, |_| {
                Ok("/disputes/v3/disputes".to_string())
            })
            .also_post(),
        ),
        (
            "/osm",
            KlarnaRoute::new("osm", Method::GET, osm_path).also_post(),
        ),
    ];

    table
        .into_iter()
        .map(|(path, route)| RouteEntry::new(path, ProxyRoute::new(route)))
        .collect()
}

/// 使用服务端凭证创建 Klarna 支付会话
///
/// 上游返回非 2xx 时报错 `Klarna API error <status>: <body>`。
pub async fn create_session_with_server_credentials(
    client: &UpstreamClient,
    config: &KlarnaConfig,
    session_request: &Value,
) -> Result<Value> {
    let (Some(username), Some(password)) = (
        config.username.as_deref().filter(|v| !v.is_empty()),
        config.password.as_deref().filter(|v| !v.is_empty()),
    ) else {
        return Err(config_error!(
            "Missing Klarna credentials. Provide KLARNA_API_USERNAME and KLARNA_API_PASSWORD"
        ));
    };

    let auth = BasicAuth::from_credentials(username, password);
    let url = build_upstream_url(&config.base_url, "/payments/v1/sessions");
    let request_id = Uuid::new_v4().to_string();

    linfo!(
        request_id,
        LogStage::UpstreamRequest,
        LogComponent::Klarna,
        "create_session",
        &format!("creating payment session at {url}"),
        auth = auth.masked()
    );

    let request = DispatchRequest::new(Method::POST, url)
        .authorization(auth.header_value())
        .json(session_request.clone())
        .header("Content-Type", "application/json; charset=utf-8");
    let outcome = client.dispatch(request, &request_id).await?;

    if !outcome.is_success() {
        let message = match &outcome.payload {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        return Err(ProxyError::internal(format!(
            "Klarna API error {}: {message}",
            outcome.status.as_u16()
        )));
    }

    Ok(outcome.payload)
}
