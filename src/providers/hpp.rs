//! # Klarna Hosted Payment Page
//!
//! 基于已有的支付会话创建 HPP 会话，以及查询 HPP 会话状态。

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::{Value, json};

use super::RouteEntry;
use crate::error::Result;
use crate::proxy::route::{BodyMode, InboundRequest, ProxyRoute, RouteContext, RouteStrategy};
use crate::proxy::upstream_url::build_upstream_url;
use crate::http_error;

/// 从请求体中读取非空字符串字段
fn string_field<'a>(body: &'a Value, key: &str) -> Option<&'a str> {
    body.get(key)
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
}

/// `POST hpp/create-session`
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateHppSession;

impl CreateHppSession {
    /// 由 `session_url`（优先）或 `session_id` 得到支付会话的完整地址
    fn payment_session_url(body: &Value, base_url: &str) -> Option<String> {
        if let Some(session_url) = string_field(body, "session_url") {
            return Some(build_upstream_url(base_url, session_url));
        }
        string_field(body, "session_id").map(|session_id| {
            build_upstream_url(
                base_url,
                &format!("/payments/v1/sessions/{}", urlencoding::encode(session_id)),
            )
        })
    }
}

#[async_trait]
impl RouteStrategy for CreateHppSession {
    fn name(&self) -> &'static str {
        "hpp_create_session"
    }

    fn method(&self) -> Method {
        Method::POST
    }

    fn body_mode(&self) -> BodyMode {
        BodyMode::Required
    }

    async fn resolve_url(&self, _inbound: &InboundRequest, _ctx: &RouteContext) -> Result<String> {
        Ok("/hpp/v1/sessions".to_string())
    }

    async fn outbound_body(
        &self,
        _inbound: &InboundRequest,
        ctx: &RouteContext,
        inbound_body: Option<Value>,
    ) -> Result<Option<Value>> {
        let body = inbound_body.unwrap_or(Value::Null);
        let payment_session_url = Self::payment_session_url(&body, ctx.klarna_base_url())
            .ok_or_else(|| http_error!(StatusCode::BAD_REQUEST, "Missing session_id or session_url"))?;
        Ok(Some(json!({ "payment_session_url": payment_session_url })))
    }
}

/// `POST hpp/get-session`，出站为 GET
#[derive(Debug, Clone, Copy, Default)]
pub struct GetHppSession;

#[async_trait]
impl RouteStrategy for GetHppSession {
    fn name(&self) -> &'static str {
        "hpp_get_session"
    }

    fn method(&self) -> Method {
        Method::GET
    }

    fn inbound_methods(&self) -> Vec<Method> {
        vec![Method::POST]
    }

    async fn resolve_url(&self, inbound: &InboundRequest, _ctx: &RouteContext) -> Result<String> {
        let body = inbound.json_body()?;
        if let Some(session_url) = string_field(&body, "session_url") {
            return Ok(session_url.to_string());
        }
        string_field(&body, "hpp_session_id")
            .map(|id| format!("/hpp/v1/sessions/{}", urlencoding::encode(id)))
            .ok_or_else(|| http_error!(StatusCode::BAD_REQUEST, "Missing hpp_session_id or session_url"))
    }
}

/// HPP 路由
#[must_use]
pub fn routes() -> Vec<RouteEntry> {
    vec![
        RouteEntry::new("/hpp/create-session", ProxyRoute::new(CreateHppSession)),
        RouteEntry::new("/hpp/get-session", ProxyRoute::new(GetHppSession)),
    ]
}
