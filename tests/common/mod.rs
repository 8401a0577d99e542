//! 集成测试共享工具

#![allow(dead_code)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use payments_proxy::AppConfig;
use payments_proxy::server::build_router;
use serde_json::Value;
use tower::ServiceExt;

/// 编码后的 Basic 凭据头
pub fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{user}:{pass}")))
}

/// 所有上游都指向同一个 mock 服务的配置
pub fn config_for(upstream: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.klarna.base_url = upstream.to_string();
    config.stripe.api_base_url = upstream.to_string();
    config.adyen.checkout_base_url = upstream.to_string();
    config
}

pub fn router(config: AppConfig) -> Router {
    build_router(Arc::new(config)).unwrap()
}

/// 构造带 JSON 请求体的 POST
pub fn post_json(uri: &str, auth: Option<&str>, body: &Value) -> Request<Body> {
    let mut builder = Request::post(uri).header("content-type", "application/json");
    if let Some(auth) = auth {
        builder = builder.header("authorization", auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

/// 发送请求，返回状态码、响应头与 JSON 响应体
pub async fn send(router: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| {
            Value::String(String::from_utf8_lossy(&bytes).into_owned())
        })
    };
    (status, headers, body)
}
