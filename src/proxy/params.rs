//! 动态路由参数提取

use std::collections::HashMap;

use axum::extract::{FromRequestParts, Path};
use axum::http::request::Parts;

use crate::error::{ProxyError, Result};

/// 单个路由参数值，可能是标量或数组（通配段）
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Single(String),
    Multi(Vec<String>),
}

impl ParamValue {
    /// 标量直接返回，数组取第一个元素
    #[must_use]
    pub fn first(&self) -> Option<&str> {
        match self {
            Self::Single(value) => Some(value),
            Self::Multi(values) => values.first().map(String::as_str),
        }
    }
}

/// 当前请求匹配到的路由参数
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteParams(HashMap<String, ParamValue>);

impl RouteParams {
    /// 从请求中提取路径参数；路由不含参数时为空
    pub async fn from_parts(parts: &mut Parts) -> Self {
        Path::<HashMap<String, String>>::from_request_parts(parts, &())
            .await
            .map(|Path(params)| Self::from(params))
            .unwrap_or_default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ParamValue) {
        self.0.insert(name.into(), value);
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }

    /// 提取必需参数，缺失或为空时返回 400 `Missing {name} in path`
    pub fn required(&self, name: &str) -> Result<&str> {
        self.get(name)
            .and_then(ParamValue::first)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| ProxyError::missing_parameter(name))
    }
}

impl From<HashMap<String, String>> for RouteParams {
    fn from(params: HashMap<String, String>) -> Self {
        Self(
            params
                .into_iter()
                .map(|(name, value)| (name, ParamValue::Single(value)))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn test_required_scalar() {
        let params = RouteParams::from(HashMap::from([(
            "orderId".to_string(),
            "abc-123".to_string(),
        )]));
        assert_eq!(params.required("orderId").unwrap(), "abc-123");
    }

    #[test]
    fn test_required_takes_first_of_array() {
        let mut params = RouteParams::default();
        params.insert(
            "customerToken",
            ParamValue::Multi(vec!["first".to_string(), "second".to_string()]),
        );
        assert_eq!(params.required("customerToken").unwrap(), "first");
    }

    #[test]
    fn test_required_missing_or_empty_is_400() {
        let mut params = RouteParams::default();
        params.insert("orderId", ParamValue::Single(String::new()));
        params.insert("empty", ParamValue::Multi(Vec::new()));

        for name in ["orderId", "empty", "absent"] {
            let err = params.required(name).unwrap_err();
            assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
            assert_eq!(err.to_string(), format!("Missing {name} in path"));
        }
    }
}
