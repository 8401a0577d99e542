//! 上游地址解析工具
//!
//! 相对路径拼接到配置的 `base_url` 上，绝对地址原样透传。

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::config_error;
use crate::ensure;
use crate::error::Result;

static ABSOLUTE_URL: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?i)^https?:").ok());

/// 是否为带 `http:` / `https:` scheme 的绝对地址
#[must_use]
pub fn is_absolute_url(path_or_url: &str) -> bool {
    ABSOLUTE_URL
        .as_ref()
        .is_some_and(|re| re.is_match(path_or_url))
}

/// 解析出站地址
///
/// 无论 `path` 是否以 `/` 开头，`base` 与 `path` 之间都只保留一个 `/`。
#[must_use]
pub fn build_upstream_url(base: &str, path_or_url: &str) -> String {
    if is_absolute_url(path_or_url) {
        return path_or_url.to_string();
    }

    let base = base.trim_end_matches('/');
    let path = path_or_url.trim_start_matches('/');
    format!("{base}/{path}")
}

/// 校验配置中的基础地址：必须是可解析的 http/https 绝对地址
pub(crate) fn validate_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    ensure!(!trimmed.is_empty(), config_error!("base_url 不能为空"));
    ensure!(
        is_absolute_url(trimmed),
        config_error!("base_url 必须以 http:// 或 https:// 开头: {}", trimmed)
    );

    let url = Url::parse(trimmed)?;
    ensure!(
        url.host().is_some(),
        config_error!("base_url 缺少 host: {}", trimmed)
    );
    Ok(url)
}
