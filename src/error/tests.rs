//! # 错误处理测试

use crate::error::{AUTHORIZATION_ERROR_MESSAGE, Context, ErrorBody, ProxyError};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::error::Error;

#[test]
fn test_authentication_error_is_401_with_fixed_message() {
    let err = ProxyError::authentication();
    assert!(err.is_http_error());
    assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(err.to_string(), AUTHORIZATION_ERROR_MESSAGE);
}

#[test]
fn test_missing_parameter_names_the_field() {
    let err = ProxyError::missing_parameter("orderId");
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    assert_eq!(err.to_string(), "Missing orderId in path");
}

#[test]
fn test_generic_errors_default_to_500() {
    let errors = [
        ProxyError::config("bad config"),
        ProxyError::network_with_source("connection refused", anyhow::anyhow!("refused")),
        ProxyError::internal("boom"),
    ];
    for err in errors {
        assert!(!err.is_http_error());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}

#[test]
fn test_network_error_keeps_underlying_message() {
    let err = ProxyError::network_with_source(
        "error sending request",
        anyhow::anyhow!("connection refused"),
    );
    assert_eq!(err.client_message(), "error sending request");
    assert!(err.source().is_some());
}

#[test]
fn test_context_delegates_status_and_client_message() {
    let result: Result<(), ProxyError> = Err(ProxyError::missing_parameter("customerToken"));
    let err = result.context("resolving upstream url").unwrap_err();

    assert!(matches!(err, ProxyError::Context { .. }));
    assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    assert!(err.is_http_error());
    assert_eq!(err.client_message(), "Missing customerToken in path");
    assert!(err.to_string().starts_with("resolving upstream url: "));
}

#[test]
fn test_context_on_io_error_is_500() {
    let result: std::io::Result<()> = Err(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "no such file",
    ));
    let err = result.context("reading config").unwrap_err();
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    assert!(err.to_string().contains("reading config"));
}

#[test]
fn test_auto_conversion_from_serde_json_error() {
    let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
    let err: ProxyError = json_err.into();
    assert!(matches!(err, ProxyError::Serialization { .. }));
    assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[test]
fn test_auto_conversion_from_toml_error() {
    let toml_err = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
    let err: ProxyError = toml_err.into();
    assert!(matches!(err, ProxyError::Config { .. }));
}

#[tokio::test]
async fn test_into_response_renders_error_body() {
    let response = ProxyError::authentication().into_response();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.error, AUTHORIZATION_ERROR_MESSAGE);
}

#[tokio::test]
async fn test_respond_keeps_status_and_message() {
    let response = ProxyError::missing_parameter("orderId").respond("req-1");
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: ErrorBody = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body.error, "Missing orderId in path");
}
