//! # 入站凭证规范化
//!
//! 浏览器传入的 `Authorization: Basic <token>` 可能已经是 base64，也可能是原始的
//! `username:password`。这里统一规范化为 `Basic <base64>` 供出站使用。

use std::fmt;
use std::sync::LazyLock;

use axum::http::{HeaderMap, HeaderValue, header};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use regex::Regex;

use crate::error::{ProxyError, Result};

/// 出站描述中认证头保留的可见前缀长度
pub const AUTH_VISIBLE_PREFIX: usize = 16;

const BASIC_PREFIX: &str = "basic ";

static BASE64_CHARSET: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/=]+$").ok());

/// 判断字符串是否“看起来像” base64
///
/// 只检查字符集与长度是否为 4 的倍数，不做解码校验。
#[must_use]
pub fn is_probably_base64(value: &str) -> bool {
    let charset_ok = BASE64_CHARSET
        .as_ref()
        .is_some_and(|re| re.is_match(value));
    charset_ok && value.len() % 4 == 0
}

/// 去掉大小写不敏感的 `Basic ` 前缀，返回修剪后的 token
fn strip_basic_prefix(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    let prefix = trimmed.get(..BASIC_PREFIX.len())?;
    if prefix.eq_ignore_ascii_case(BASIC_PREFIX) {
        trimmed.get(BASIC_PREFIX.len()..).map(str::trim)
    } else {
        None
    }
}

/// 规范化 Basic 认证头
///
/// 非 `Basic` 方案的值原样返回（修剪空白）；调用方在此之前应已经通过
/// [`require_basic_auth`] 做过校验。
#[must_use]
pub fn normalize_basic_auth(raw: &str) -> String {
    let Some(token) = strip_basic_prefix(raw) else {
        return raw.trim().to_string();
    };

    if token.contains(':') && !is_probably_base64(token) {
        format!("Basic {}", STANDARD.encode(token.as_bytes()))
    } else {
        format!("Basic {token}")
    }
}

/// 对认证值做遮罩：保留前 `visible` 个字符并追加 `...`
#[must_use]
pub fn mask_auth(auth: &str, visible: usize) -> String {
    let prefix: String = auth.chars().take(visible).collect();
    format!("{prefix}...")
}

/// 已规范化的 Basic 认证值
#[derive(Clone, PartialEq, Eq)]
pub struct BasicAuth(String);

impl BasicAuth {
    /// 由原始认证头构造（会先规范化）
    ///
    /// 缺少 `Basic ` 前缀或 token 为空时返回 401。
    pub fn parse(raw: &str) -> Result<Self> {
        match strip_basic_prefix(raw) {
            Some(token) if !token.is_empty() => Ok(Self(normalize_basic_auth(raw))),
            _ => Err(ProxyError::authentication()),
        }
    }

    /// 由服务端用户名密码构造
    #[must_use]
    pub fn from_credentials(username: &str, password: &str) -> Self {
        Self(format!(
            "Basic {}",
            STANDARD.encode(format!("{username}:{password}").as_bytes())
        ))
    }

    /// 完整认证值，仅用于出站请求头
    #[must_use]
    pub fn header_value(&self) -> &str {
        &self.0
    }

    /// 遮罩后的认证值，可安全展示或记录
    #[must_use]
    pub fn masked(&self) -> String {
        mask_auth(&self.0, AUTH_VISIBLE_PREFIX)
    }
}

impl fmt::Debug for BasicAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("BasicAuth").field(&self.masked()).finish()
    }
}

/// 从入站请求头中提取并规范化 Basic 认证
pub fn require_basic_auth(headers: &HeaderMap) -> Result<BasicAuth> {
    let value = headers
        .get(header::AUTHORIZATION)
        .map(HeaderValue::to_str)
        .and_then(std::result::Result::ok)
        .ok_or_else(ProxyError::authentication)?;
    BasicAuth::parse(value)
}
