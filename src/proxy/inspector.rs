//! # 检查快照
//!
//! 为界面展示生成一次出站调用的脱敏、限长记录。快照只随响应返回，不做任何持久化。

use std::collections::BTreeMap;
use std::time::Instant;

use axum::http::HeaderMap;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::InspectorConfig;

use super::dispatcher::DispatchOutcome;

/// 敏感头替换值
pub const REDACTED: &str = "***";
/// 截断标记
pub const TRUNCATION_MARKER: &str = "\n… (truncated)";

const SENSITIVE_HEADERS: [&str; 4] = ["authorization", "cookie", "set-cookie", "x-api-key"];

/// 是否为需要脱敏的请求头（大小写不敏感）
#[must_use]
pub fn is_sensitive_header(name: &str) -> bool {
    SENSITIVE_HEADERS
        .iter()
        .any(|sensitive| sensitive.eq_ignore_ascii_case(name))
}

/// 脱敏任意键值对形式的头，保留原始键名
pub fn sanitize_header_pairs<I, K, V>(pairs: I) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    pairs
        .into_iter()
        .map(|(key, value)| {
            let key = key.as_ref();
            let value = if is_sensitive_header(key) {
                REDACTED.to_string()
            } else {
                value.as_ref().to_string()
            };
            (key.to_string(), value)
        })
        .collect()
}

/// 脱敏 `HeaderMap`，同名多值以 `, ` 合并
#[must_use]
pub fn sanitize_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut merged: BTreeMap<String, String> = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        merged
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    sanitize_header_pairs(merged)
}

/// 超过 `limit` 个字符时截断并追加标记
#[must_use]
pub fn maybe_truncate(text: Option<&str>, limit: usize) -> Option<String> {
    let text = text?;
    match text.char_indices().nth(limit) {
        Some((cut, _)) => Some(format!("{}{TRUNCATION_MARKER}", &text[..cut])),
        None => Some(text.to_string()),
    }
}

/// 单次请求的计时与标识
#[derive(Debug, Clone)]
pub struct RequestTrace {
    pub request_id: String,
    pub started_at: DateTime<Utc>,
    started: Instant,
}

impl RequestTrace {
    /// 开始计时；未提供请求ID时生成一个
    #[must_use]
    pub fn start(request_id: Option<String>) -> Self {
        Self {
            request_id: request_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// 自开始以来经过的毫秒数
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// 快照中的请求部分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectedRequest {
    pub url: String,
    pub method: String,
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
}

/// 快照中的响应部分
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectedResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_url: Option<String>,
}

/// 检查快照
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InspectorSnapshot {
    pub request_id: String,
    /// 请求开始时间（ISO 8601，毫秒精度）
    pub timestamp: String,
    pub duration_ms: u64,
    pub request: InspectedRequest,
    pub response: InspectedResponse,
}

/// 构造快照所需的一次调用信息
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'a> {
    pub url: &'a str,
    pub method: &'a str,
    pub request_headers: &'a HeaderMap,
    pub request_body: Option<&'a str>,
    pub status: u16,
    pub response_headers: &'a HeaderMap,
    pub content_type: Option<&'a str>,
    pub response_body: Option<&'a str>,
    pub size_bytes: Option<usize>,
    pub data_url: Option<&'a str>,
}

impl<'a> Exchange<'a> {
    /// 以调度结果为基础构造，响应体文本由调用方给出
    #[must_use]
    pub fn from_outcome(outcome: &'a DispatchOutcome, response_body: Option<&'a str>) -> Self {
        Self {
            url: &outcome.url,
            method: outcome.method.as_str(),
            request_headers: &outcome.request_headers,
            request_body: outcome.request_body_text.as_deref(),
            status: outcome.status.as_u16(),
            response_headers: &outcome.headers,
            content_type: Some(outcome.content_type.as_str()),
            response_body,
            size_bytes: None,
            data_url: None,
        }
    }

    #[must_use]
    pub fn with_content_type(mut self, content_type: Option<&'a str>) -> Self {
        self.content_type = content_type;
        self
    }

    #[must_use]
    pub fn with_binary(mut self, size_bytes: usize, data_url: Option<&'a str>) -> Self {
        self.size_bytes = Some(size_bytes);
        self.data_url = data_url;
        self
    }
}

/// 快照构建器
#[derive(Debug, Clone)]
pub struct Inspector {
    enabled: bool,
    max_content_chars: usize,
    max_data_url_chars: usize,
}

impl Inspector {
    #[must_use]
    pub fn new(config: &InspectorConfig) -> Self {
        Self {
            enabled: config.enabled,
            max_content_chars: config.max_content_chars,
            max_data_url_chars: config.max_data_url_chars,
        }
    }

    /// 构造快照；关闭检查时返回 `None`
    #[must_use]
    pub fn snapshot(&self, trace: &RequestTrace, exchange: Exchange<'_>) -> Option<InspectorSnapshot> {
        if !self.enabled {
            return None;
        }

        Some(InspectorSnapshot {
            request_id: trace.request_id.clone(),
            timestamp: trace
                .started_at
                .to_rfc3339_opts(SecondsFormat::Millis, true),
            duration_ms: trace.elapsed_ms(),
            request: InspectedRequest {
                url: exchange.url.to_string(),
                method: exchange.method.to_string(),
                headers: sanitize_headers(exchange.request_headers),
                body_text: maybe_truncate(exchange.request_body, self.max_content_chars),
            },
            response: InspectedResponse {
                status: exchange.status,
                headers: sanitize_headers(exchange.response_headers),
                content_type: exchange
                    .content_type
                    .filter(|ct| !ct.is_empty())
                    .map(str::to_string),
                body_text: maybe_truncate(exchange.response_body, self.max_content_chars),
                size_bytes: exchange.size_bytes,
                data_url: maybe_truncate(exchange.data_url, self.max_data_url_chars),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use pretty_assertions::assert_eq;

    fn limits(max_content_chars: usize) -> Inspector {
        Inspector::new(&InspectorConfig {
            enabled: true,
            max_content_chars,
            max_data_url_chars: 8,
        })
    }

    #[test]
    fn test_truncation_boundary() {
        assert_eq!(maybe_truncate(Some("abcde"), 5).as_deref(), Some("abcde"));
        assert_eq!(
            maybe_truncate(Some("abcdef"), 5).as_deref(),
            Some("abcde\n… (truncated)")
        );
        assert_eq!(maybe_truncate(None, 5), None);
    }

    #[test]
    fn test_truncation_counts_characters() {
        assert_eq!(maybe_truncate(Some("ééé"), 3).as_deref(), Some("ééé"));
        assert_eq!(
            maybe_truncate(Some("éééé"), 3).as_deref(),
            Some("ééé\n… (truncated)")
        );
    }

    #[test]
    fn test_sanitize_header_pairs_any_casing() {
        let sanitized = sanitize_header_pairs([
            ("Authorization", "Basic abc"),
            ("COOKIE", "a=b"),
            ("Set-Cookie", "c=d"),
            ("x-Api-Key", "secret"),
            ("Accept", "application/json"),
        ]);
        assert_eq!(sanitized["Authorization"], REDACTED);
        assert_eq!(sanitized["COOKIE"], REDACTED);
        assert_eq!(sanitized["Set-Cookie"], REDACTED);
        assert_eq!(sanitized["x-Api-Key"], REDACTED);
        assert_eq!(sanitized["Accept"], "application/json");
    }

    #[test]
    fn test_sanitize_headers_merges_multi_values() {
        let mut headers = HeaderMap::new();
        headers.append("set-cookie", HeaderValue::from_static("a=1"));
        headers.append("set-cookie", HeaderValue::from_static("b=2"));
        headers.append("vary", HeaderValue::from_static("accept"));
        headers.append("vary", HeaderValue::from_static("origin"));

        let sanitized = sanitize_headers(&headers);
        assert_eq!(sanitized["set-cookie"], REDACTED);
        assert_eq!(sanitized["vary"], "accept, origin");
    }

    #[test]
    fn test_snapshot_redacts_and_truncates() {
        let mut request_headers = HeaderMap::new();
        request_headers.insert("authorization", HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        let mut response_headers = HeaderMap::new();
        response_headers.insert("content-type", HeaderValue::from_static("application/json"));

        let trace = RequestTrace::start(Some("req-1".to_string()));
        let exchange = Exchange {
            url: "https://api.example.com/x",
            method: "POST",
            request_headers: &request_headers,
            request_body: Some("0123456789ABC"),
            status: 201,
            response_headers: &response_headers,
            content_type: Some("application/json"),
            response_body: Some("short"),
            size_bytes: Some(3),
            data_url: Some("data:image/png;base64,AAAA"),
        };

        let snapshot = limits(10).snapshot(&trace, exchange).unwrap();
        assert_eq!(snapshot.request_id, "req-1");
        assert!(snapshot.timestamp.ends_with('Z'));
        assert_eq!(snapshot.request.headers["authorization"], REDACTED);
        assert_eq!(
            snapshot.request.body_text.as_deref(),
            Some("0123456789\n… (truncated)")
        );
        assert_eq!(snapshot.response.status, 201);
        assert_eq!(snapshot.response.body_text.as_deref(), Some("short"));
        assert_eq!(
            snapshot.response.data_url.as_deref(),
            Some("data:ima\n… (truncated)")
        );
    }

    #[test]
    fn test_disabled_inspector_produces_nothing() {
        let inspector = Inspector::new(&InspectorConfig {
            enabled: false,
            ..InspectorConfig::default()
        });
        let headers = HeaderMap::new();
        let trace = RequestTrace::start(None);
        let exchange = Exchange {
            url: "u",
            method: "GET",
            request_headers: &headers,
            request_body: None,
            status: 200,
            response_headers: &headers,
            content_type: None,
            response_body: None,
            size_bytes: None,
            data_url: None,
        };
        assert!(inspector.snapshot(&trace, exchange).is_none());
        assert!(!trace.request_id.is_empty());
    }
}
