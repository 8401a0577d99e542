//! # 错误类型定义

use axum::http::StatusCode;
use thiserror::Error;

/// 入站认证失败时返回给浏览器的固定消息
pub const AUTHORIZATION_ERROR_MESSAGE: &str = "Missing or invalid Authorization header";

/// 应用主要错误类型
#[derive(Debug, Error)]
pub enum ProxyError {
    /// 携带明确 HTTP 状态码的错误（认证失败、参数缺失等）
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    /// 配置相关错误
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 上游网络通信错误，消息取自底层错误
    #[error("{message}")]
    Network {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 序列化/反序列化错误
    #[error("{message}")]
    Serialization {
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// IO相关错误
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// 服务器启动错误
    #[error("Server start error: {message}")]
    ServerStart {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 系统内部错误
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<anyhow::Error>,
    },

    /// 附加了上下文的错误
    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<ProxyError>,
    },
}

impl ProxyError {
    /// 将错误转换为HTTP状态码和错误代码
    ///
    /// 只有 `Http` 变体携带自己的状态码，其余错误一律视为 500。
    #[must_use]
    pub fn to_http_response_parts(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Http { status, .. } => (*status, "HTTP_ERROR"),
            Self::Config { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "CONFIG_ERROR"),
            Self::Network { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "NETWORK_ERROR"),
            Self::Serialization { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "SERIALIZATION_ERROR")
            }
            Self::Io { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
            Self::ServerStart { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "SERVER_START_ERROR"),
            Self::Internal { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            Self::Context { source, .. } => source.to_http_response_parts(),
        }
    }

    /// 响应状态码
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        self.to_http_response_parts().0
    }

    /// 是否为携带明确状态码的 HTTP 错误
    #[must_use]
    pub fn is_http_error(&self) -> bool {
        match self {
            Self::Http { .. } => true,
            Self::Context { source, .. } => source.is_http_error(),
            _ => false,
        }
    }

    /// 返回给浏览器的错误消息
    ///
    /// 上下文包装只用于日志，客户端看到的是最内层错误的消息。
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            Self::Context { source, .. } => source.client_message(),
            other => other.to_string(),
        }
    }

    /// 创建 HTTP 错误
    pub fn http<T: Into<String>>(status: StatusCode, message: T) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// 创建入站认证错误（401）
    #[must_use]
    pub fn authentication() -> Self {
        Self::http(StatusCode::UNAUTHORIZED, AUTHORIZATION_ERROR_MESSAGE)
    }

    /// 创建缺失路径参数错误（400）
    pub fn missing_parameter<T: AsRef<str>>(name: T) -> Self {
        Self::http(
            StatusCode::BAD_REQUEST,
            format!("Missing {} in path", name.as_ref()),
        )
    }

    /// 创建配置错误
    pub fn config<T: Into<String>>(message: T) -> Self {
        Self::Config {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的配置错误
    pub fn config_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Config {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建带来源的网络错误
    pub fn network_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Network {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建序列化错误
    pub fn serialization<T: Into<String>, E: Into<anyhow::Error>>(message: T, source: E) -> Self {
        Self::Serialization {
            message: message.into(),
            source: source.into(),
        }
    }

    /// 创建服务器启动错误
    pub fn server_start_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::ServerStart {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// 创建内部错误
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// 创建带来源的内部错误
    pub fn internal_with_source<T: Into<String>, E: Into<anyhow::Error>>(
        message: T,
        source: E,
    ) -> Self {
        Self::Internal {
            message: message.into(),
            source: Some(source.into()),
        }
    }
}

// 自动转换常见错误类型
impl From<std::io::Error> for ProxyError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: err.to_string(),
            source: err,
        }
    }
}

impl From<toml::de::Error> for ProxyError {
    fn from(err: toml::de::Error) -> Self {
        Self::config_with_source(format!("TOML parse failed: {err}"), err)
    }
}

impl From<url::ParseError> for ProxyError {
    fn from(err: url::ParseError) -> Self {
        Self::config_with_source(format!("Invalid URL: {err}"), err)
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        Self::serialization(err.to_string(), err)
    }
}

// Reqwest错误转换：消息直接使用底层错误文本
impl From<reqwest::Error> for ProxyError {
    fn from(err: reqwest::Error) -> Self {
        Self::network_with_source(err.to_string(), err)
    }
}
