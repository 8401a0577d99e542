//! # 响应信封
//!
//! 把转发结果包装成统一 JSON 返回给浏览器。传输层状态码只区分成功/失败，
//! 上游的真实状态码保存在信封的 `status` 字段中。

use std::collections::BTreeMap;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::credentials::BasicAuth;
use super::inspector::InspectorSnapshot;

/// 上游状态码折叠为传输层状态码：2xx → 200，其余 → 500
#[must_use]
pub const fn transport_status(upstream_status: u16) -> StatusCode {
    if upstream_status >= 200 && upstream_status < 300 {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

/// 实际转发出去的请求描述（凭证已遮罩）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForwardedRequest {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl ForwardedRequest {
    pub fn new(
        url: impl Into<String>,
        method: impl Into<String>,
        auth: &BasicAuth,
        body: Option<Value>,
    ) -> Self {
        Self {
            url: url.into(),
            method: method.into(),
            headers: BTreeMap::from([("Authorization".to_string(), auth.masked())]),
            body,
        }
    }

    /// 追加一个展示用的请求头（调用方负责遮罩）
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// 返回给浏览器的响应信封
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyEnvelope {
    pub forwarded_request: ForwardedRequest,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub klarna_response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inspector: Option<InspectorSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distribution: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 信封主体：解析后的上游响应，或者由二进制响应生成的 data URL
#[derive(Debug, Clone, PartialEq)]
pub enum EnvelopeBody {
    Payload(Option<Value>),
    DataUrl(String),
}

impl ProxyEnvelope {
    /// 构造信封
    ///
    /// 有 data URL 时携带 `data_url`，否则携带 `klarna_response`；二者不会同时出现。
    #[must_use]
    pub fn new(forwarded_request: ForwardedRequest, status: u16, body: EnvelopeBody) -> Self {
        let (klarna_response, data_url) = match body {
            EnvelopeBody::Payload(payload) => (payload, None),
            EnvelopeBody::DataUrl(data_url) => (None, Some(data_url)),
        };

        Self {
            forwarded_request,
            klarna_response,
            data_url,
            content_type: None,
            status,
            inspector: None,
            distribution: None,
            error: None,
        }
    }

    /// 设置内容类型，空串视为缺失
    #[must_use]
    pub fn with_content_type(mut self, content_type: Option<String>) -> Self {
        self.content_type = content_type.filter(|ct| !ct.is_empty());
        self
    }

    #[must_use]
    pub fn with_inspector(mut self, inspector: Option<InspectorSnapshot>) -> Self {
        self.inspector = inspector;
        self
    }

    #[must_use]
    pub fn with_distribution(mut self, distribution: Option<Value>) -> Self {
        self.distribution = distribution;
        self
    }

    #[must_use]
    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }

    /// 传输层状态码
    #[must_use]
    pub const fn transport_status(&self) -> StatusCode {
        transport_status(self.status)
    }
}

impl IntoResponse for ProxyEnvelope {
    fn into_response(self) -> Response {
        (self.transport_status(), Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn forwarded() -> ForwardedRequest {
        ForwardedRequest::new(
            "https://api.example.com/payments/v1/sessions",
            "POST",
            &BasicAuth::from_credentials("user", "pass"),
            Some(json!({"purchase_country": "US"})),
        )
    }

    #[rstest]
    #[case(200, StatusCode::OK)]
    #[case(204, StatusCode::OK)]
    #[case(299, StatusCode::OK)]
    #[case(199, StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(300, StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(400, StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(401, StatusCode::INTERNAL_SERVER_ERROR)]
    #[case(500, StatusCode::INTERNAL_SERVER_ERROR)]
    fn test_transport_status(#[case] upstream: u16, #[case] expected: StatusCode) {
        assert_eq!(transport_status(upstream), expected);
    }

    #[test]
    fn test_payload_envelope_shape() {
        let envelope = ProxyEnvelope::new(
            forwarded(),
            200,
            EnvelopeBody::Payload(Some(json!({"session_id": "abc123"}))),
        )
        .with_content_type(Some(String::new()));

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            value,
            json!({
                "forwarded_request": {
                    "url": "https://api.example.com/payments/v1/sessions",
                    "method": "POST",
                    "headers": { "Authorization": "Basic dXNlcjpwYX..." },
                    "body": { "purchase_country": "US" }
                },
                "klarna_response": { "session_id": "abc123" },
                "status": 200
            })
        );
    }

    #[test]
    fn test_data_url_replaces_payload() {
        let envelope = ProxyEnvelope::new(
            forwarded(),
            200,
            EnvelopeBody::DataUrl("data:image/png;base64,iVBORw==".to_string()),
        )
        .with_content_type(Some("image/png".to_string()));

        assert!(envelope.klarna_response.is_none());
        assert_eq!(envelope.data_url.as_deref(), Some("data:image/png;base64,iVBORw=="));
        assert_eq!(envelope.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn test_failed_upstream_collapses_to_500() {
        let response = ProxyEnvelope::new(
            forwarded(),
            400,
            EnvelopeBody::Payload(Some(json!({"error_message": "invalid amount"}))),
        )
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let envelope: ProxyEnvelope = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(envelope.status, 400);
        assert_eq!(
            envelope.klarna_response,
            Some(json!({"error_message": "invalid amount"}))
        );
    }
}
