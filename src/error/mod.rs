//! The unified error handling system for the application.

use axum::Json;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::logging::{LogComponent, LogStage};
use crate::{lerror, lwarn};

// 1. Core Types
pub use types::{AUTHORIZATION_ERROR_MESSAGE, ProxyError};

/// A unified `Result` type for the entire application.
///
/// All functions that can fail should return this type.
pub type Result<T> = std::result::Result<T, ProxyError>;

// 2. Module declarations
pub mod macros;
pub mod types;

// 3. Context Trait for adding context to errors.
pub trait Context<T, E> {
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display;

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display;
}

impl<T, E> Context<T, E> for std::result::Result<T, E>
where
    E: Into<ProxyError>,
{
    #[track_caller]
    fn context<C>(self, context: C) -> Result<T>
    where
        C: std::fmt::Display,
    {
        self.with_context(|| context)
    }

    #[track_caller]
    fn with_context<C, F>(self, context: F) -> Result<T>
    where
        F: FnOnce() -> C,
        C: std::fmt::Display,
    {
        match self {
            Ok(value) => Ok(value),
            Err(error) => {
                let context_message = context().to_string();
                Err(ProxyError::Context {
                    context: context_message,
                    source: Box::new(error.into()),
                })
            }
        }
    }
}

/// 返回给浏览器的错误体：`{ "error": message }`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

impl ProxyError {
    /// 记录错误日志并转换为响应，日志携带当前请求ID
    pub fn respond(self, request_id: &str) -> Response {
        let (status, code) = self.to_http_response_parts();
        if status.is_server_error() {
            lerror!(
                request_id,
                LogStage::Error,
                LogComponent::RouteFactory,
                "request_failed",
                &format!("{code}: {self}")
            );
        } else {
            lwarn!(
                request_id,
                LogStage::Error,
                LogComponent::RouteFactory,
                "request_rejected",
                &format!("{code}: {}", self.client_message()),
                status = status.as_u16()
            );
        }
        self.into_response()
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(ErrorBody { error: self.client_message() })).into_response()
    }
}

#[cfg(test)]
mod tests;
