//! # 出站调度器
//!
//! 对支付服务商发起一次 HTTP 调用，并按响应 `Content-Type` 解析响应体。
//! 上游非 2xx 不视为本地错误，只有网络层失败才会返回 `Err`。

use std::time::Duration;

use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
use bytes::Bytes;
use serde_json::Value;

use crate::config::UpstreamConfig;
use crate::error::{ProxyError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::{ldebug, lerror};

/// 默认的 `Accept` 头
pub const DEFAULT_ACCEPT: &str = "application/json";

/// 出站请求体
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchBody {
    /// JSON 请求体
    Json(Value),
    /// `application/x-www-form-urlencoded` 请求体
    Form(Vec<(String, String)>),
}

impl DispatchBody {
    fn content_type(&self) -> &'static str {
        match self {
            Self::Json(_) => "application/json",
            Self::Form(_) => "application/x-www-form-urlencoded",
        }
    }

    fn encode(&self) -> Result<String> {
        match self {
            Self::Json(value) => Ok(serde_json::to_string(value)?),
            Self::Form(pairs) => Ok(url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
                .finish()),
        }
    }
}

/// 一次出站调用的描述
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    method: Method,
    url: String,
    authorization: Option<String>,
    accept: Option<String>,
    body: Option<DispatchBody>,
    headers: Vec<(String, String)>,
}

impl DispatchRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            authorization: None,
            accept: None,
            body: None,
            headers: Vec::new(),
        }
    }

    /// 设置 `Authorization` 头
    #[must_use]
    pub fn authorization(mut self, value: impl Into<String>) -> Self {
        self.authorization = Some(value.into());
        self
    }

    /// 覆盖 `Accept` 头，缺省为 `application/json`
    #[must_use]
    pub fn accept(mut self, value: Option<&str>) -> Self {
        self.accept = value.map(str::to_string);
        self
    }

    /// 设置 JSON 请求体
    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(DispatchBody::Json(body));
        self
    }

    /// 设置表单请求体
    #[must_use]
    pub fn form(mut self, pairs: Vec<(String, String)>) -> Self {
        self.body = Some(DispatchBody::Form(pairs));
        self
    }

    /// 追加调用方指定的请求头，同名时覆盖默认值
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// 组装最终发送的请求头
    ///
    /// `Content-Type` 只在有请求体时出现。
    pub(crate) fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        if let Some(auth) = &self.authorization {
            headers.insert(header::AUTHORIZATION, header_value(auth)?);
        }
        headers.insert(
            header::ACCEPT,
            header_value(self.accept.as_deref().unwrap_or(DEFAULT_ACCEPT))?,
        );
        if let Some(body) = &self.body {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(body.content_type()),
            );
        }
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ProxyError::internal_with_source(format!("invalid header name: {name}"), e)
            })?;
            headers.insert(name, header_value(value)?);
        }
        Ok(headers)
    }
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|e| ProxyError::internal_with_source("invalid outbound header value", e))
}

/// 出站调用结果
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// 实际请求地址
    pub url: String,
    /// 实际请求方法
    pub method: Method,
    /// 实际发送的请求头
    pub request_headers: HeaderMap,
    /// 实际发送的请求体文本
    pub request_body_text: Option<String>,
    /// 上游状态码
    pub status: StatusCode,
    /// 上游响应头
    pub headers: HeaderMap,
    /// 上游 `Content-Type`，缺失时为空串
    pub content_type: String,
    /// 原始响应体
    pub body: Bytes,
    /// 解析后的响应体：JSON 值，或原始文本
    pub payload: Value,
}

impl DispatchOutcome {
    /// 响应体文本（非 UTF-8 字节按替换字符处理）
    #[must_use]
    pub fn raw_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// 响应是否声明为 JSON
    #[must_use]
    pub fn is_json(&self) -> bool {
        is_json_content_type(&self.content_type)
    }

    /// 以展示值替换已发送的请求头，快照中不再出现原值
    pub fn mask_request_header(&mut self, name: &str, display: &str) {
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(display),
        ) else {
            return;
        };
        if self.request_headers.contains_key(&name) {
            self.request_headers.insert(name, value);
        }
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    content_type
        .to_ascii_lowercase()
        .contains("application/json")
}

/// 按 `Content-Type` 解析响应体
///
/// 声明为 JSON 但解析失败时退回原始文本，不会报错。
#[must_use]
pub fn parse_payload(content_type: &str, body: &[u8]) -> Value {
    let text = || Value::String(String::from_utf8_lossy(body).into_owned());
    if is_json_content_type(content_type) {
        serde_json::from_slice(body).unwrap_or_else(|_| text())
    } else {
        text()
    }
}

/// 上游 HTTP 客户端
///
/// 不启用 cookie 存储，出站请求从不携带浏览器凭证。
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
}

impl UpstreamClient {
    /// 按配置创建客户端
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http = builder
            .build()
            .map_err(|e| ProxyError::config_with_source("failed to build upstream HTTP client", e))?;
        Ok(Self { http })
    }

    /// 发起出站调用
    pub async fn dispatch(&self, request: DispatchRequest, request_id: &str) -> Result<DispatchOutcome> {
        let request_headers = request.build_headers()?;
        let request_body_text = request.body.as_ref().map(DispatchBody::encode).transpose()?;

        ldebug!(
            request_id,
            LogStage::UpstreamRequest,
            LogComponent::Dispatcher,
            "dispatch",
            &format!("{} {}", request.method, request.url),
            has_body = request_body_text.is_some()
        );

        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .headers(request_headers.clone());
        if let Some(text) = &request_body_text {
            builder = builder.body(text.clone());
        }

        let response = builder.send().await.map_err(|e| {
            lerror!(
                request_id,
                LogStage::UpstreamRequest,
                LogComponent::Dispatcher,
                "dispatch_failed",
                &format!("upstream request failed: {e}"),
                url = request.url
            );
            ProxyError::from(e)
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let content_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.bytes().await?;
        let payload = parse_payload(&content_type, &body);

        ldebug!(
            request_id,
            LogStage::UpstreamResponse,
            LogComponent::Dispatcher,
            "dispatch_completed",
            "upstream responded",
            status = status.as_u16(),
            content_type = content_type,
            size_bytes = body.len()
        );

        Ok(DispatchOutcome {
            url: request.url,
            method: request.method,
            request_headers,
            request_body_text,
            status,
            headers,
            content_type,
            body,
            payload,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_content_type_only_with_body() {
        let without = DispatchRequest::new(Method::GET, "https://a").authorization("Basic x");
        let headers = without.build_headers().unwrap();
        assert!(headers.get(header::CONTENT_TYPE).is_none());
        assert_eq!(headers.get(header::ACCEPT).unwrap(), "application/json");
        assert_eq!(headers.get(header::AUTHORIZATION).unwrap(), "Basic x");

        let with = DispatchRequest::new(Method::POST, "https://a").json(json!({"a": 1}));
        let headers = with.build_headers().unwrap();
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_caller_headers_override_defaults() {
        let request = DispatchRequest::new(Method::GET, "https://a")
            .accept(Some("image/png"))
            .header("Accept", "text/plain")
            .header("Klarna-Idempotency-Key", "abc");
        let headers = request.build_headers().unwrap();
        assert_eq!(headers.get(header::ACCEPT).unwrap(), "text/plain");
        assert_eq!(headers.get("klarna-idempotency-key").unwrap(), "abc");
    }

    #[test]
    fn test_mask_request_header_replaces_sent_value() {
        let request_headers = DispatchRequest::new(Method::POST, "https://a")
            .header("Klarna-Idempotency-Key", "0f7e9c1a-0000-4000-8000-000000000000")
            .build_headers()
            .unwrap();
        let mut outcome = DispatchOutcome {
            url: "https://a".to_string(),
            method: Method::POST,
            request_headers,
            request_body_text: None,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            content_type: String::new(),
            body: Bytes::new(),
            payload: Value::String(String::new()),
        };

        outcome.mask_request_header("Klarna-Idempotency-Key", "0f7e9c1a...");
        outcome.mask_request_header("X-Not-Sent", "ignored");

        assert_eq!(
            outcome.request_headers.get("klarna-idempotency-key").unwrap(),
            "0f7e9c1a..."
        );
        assert!(outcome.request_headers.get("x-not-sent").is_none());
    }

    #[test]
    fn test_form_body_is_url_encoded() {
        let body = DispatchBody::Form(vec![
            ("mode".to_string(), "payment".to_string()),
            ("line_items[0][price]".to_string(), "price_1".to_string()),
        ]);
        assert_eq!(
            body.encode().unwrap(),
            "mode=payment&line_items%5B0%5D%5Bprice%5D=price_1"
        );
    }

    #[test]
    fn test_parse_payload_json_and_fallbacks() {
        assert_eq!(
            parse_payload("application/json; charset=utf-8", br#"{"ok":true}"#),
            json!({"ok": true})
        );
        assert_eq!(
            parse_payload("application/json", b"not json"),
            Value::String("not json".to_string())
        );
        assert_eq!(
            parse_payload("text/plain", br#"{"ok":true}"#),
            Value::String(r#"{"ok":true}"#.to_string())
        );
        assert_eq!(parse_payload("", b""), Value::String(String::new()));
    }
}
