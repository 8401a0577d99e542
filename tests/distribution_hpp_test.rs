//! HPP 会话与分发二维码路由测试

mod common;

use axum::http::StatusCode;
use common::{basic, config_for, post_json, router, send};
use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PNG_MAGIC: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];

#[tokio::test]
async fn test_hpp_create_session_builds_payment_session_url() {
    let upstream = MockServer::start().await;
    let expected_url = format!("{}/payments/v1/sessions/sess-1", upstream.uri());
    Mock::given(method("POST"))
        .and(path("/hpp/v1/sessions"))
        .and(body_json(json!({ "payment_session_url": expected_url })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "session_id": "hpp-1" })),
        )
        .expect(1)
        .mount(&upstream)
        .await;

    let (status, _, body) = send(
        router(config_for(&upstream.uri())),
        post_json(
            "/api/klarna/hpp/create-session",
            Some(&basic("user", "pass")),
            &json!({ "session_id": "sess-1" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["klarna_response"]["session_id"], "hpp-1");
}

#[tokio::test]
async fn test_hpp_create_session_requires_session_reference() {
    let upstream = MockServer::start().await;
    let (status, _, body) = send(
        router(config_for(&upstream.uri())),
        post_json(
            "/api/klarna/hpp/create-session",
            Some(&basic("user", "pass")),
            &json!({}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({ "error": "Missing session_id or session_url" }));
}

#[tokio::test]
async fn test_hpp_get_session_uses_get() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/hpp/v1/sessions/hpp-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "WAITING" })))
        .expect(1)
        .mount(&upstream)
        .await;

    let (status, _, body) = send(
        router(config_for(&upstream.uri())),
        post_json(
            "/api/klarna/hpp/get-session",
            Some(&basic("user", "pass")),
            &json!({ "hpp_session_id": "hpp-1" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["klarna_response"]["status"], "WAITING");
    assert_eq!(body["forwarded_request"]["method"], "GET");
}

#[tokio::test]
async fn test_hpp_get_session_requires_identifier() {
    let upstream = MockServer::start().await;
    let (status, _, body) = send(
        router(config_for(&upstream.uri())),
        post_json(
            "/api/klarna/hpp/get-session",
            Some(&basic("user", "pass")),
            &json!({ "other": 1 }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing hpp_session_id or session_url");
}

#[tokio::test]
async fn test_distribution_image_becomes_data_url() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/distribution/result/1"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PNG_MAGIC.to_vec(), "image/png"))
        .expect(1)
        .mount(&upstream)
        .await;

    let (status, _, body) = send(
        router(config_for(&upstream.uri())),
        post_json(
            "/api/klarna/fetch-distribution",
            Some(&basic("user", "pass")),
            &json!({ "result_url": format!("{}/distribution/result/1", upstream.uri()) }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data_url"], "data:image/png;base64,iVBORw==");
    assert_eq!(body["content_type"], "image/png");
    assert!(body.get("klarna_response").is_none());
    assert_eq!(body["inspector"]["response"]["size_bytes"], 4);
}

#[tokio::test]
async fn test_distribution_status_fetches_qr_without_credentials() {
    let upstream = MockServer::start().await;
    let qr_url = format!("{}/qr/1.png", upstream.uri());
    Mock::given(method("GET"))
        .and(path("/distribution/result/2"))
        .and(header("authorization", basic("user", "pass").as_str()))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": "SENT", "qr": qr_url })),
        )
        .expect(1)
        .mount(&upstream)
        .await;
    Mock::given(method("GET"))
        .and(path("/qr/1.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(PNG_MAGIC.to_vec(), "image/png"))
        .expect(1)
        .mount(&upstream)
        .await;

    let (status, _, body) = send(
        router(config_for(&upstream.uri())),
        post_json(
            "/api/klarna/fetch-distribution",
            Some(&basic("user", "pass")),
            &json!({ "result_url": format!("{}/distribution/result/2", upstream.uri()) }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data_url"], "data:image/png;base64,iVBORw==");
    assert_eq!(body["distribution"]["status"], "SENT");

    let requests = upstream.received_requests().await.unwrap();
    let qr_request = requests
        .iter()
        .find(|r| r.url.path() == "/qr/1.png")
        .unwrap();
    assert!(!qr_request.headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_distribution_failure_reports_upstream_text() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/distribution/result/3"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&upstream)
        .await;

    let (status, _, body) = send(
        router(config_for(&upstream.uri())),
        post_json(
            "/api/klarna/fetch-distribution",
            Some(&basic("user", "pass")),
            &json!({ "result_url": format!("{}/distribution/result/3", upstream.uri()) }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], 404);
    assert_eq!(body["error"], "not found");
}

#[tokio::test]
async fn test_distribution_requires_result_url() {
    let upstream = MockServer::start().await;
    let (status, _, body) = send(
        router(config_for(&upstream.uri())),
        post_json(
            "/api/klarna/fetch-distribution",
            Some(&basic("user", "pass")),
            &json!({}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing result_url in body");
}

#[tokio::test]
async fn test_distribution_malformed_json_is_an_error() {
    let upstream = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/distribution/result/4"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{not json", "application/json"))
        .mount(&upstream)
        .await;

    let (status, _, body) = send(
        router(config_for(&upstream.uri())),
        post_json(
            "/api/klarna/fetch-distribution",
            Some(&basic("user", "pass")),
            &json!({ "result_url": format!("{}/distribution/result/4", upstream.uri()) }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body["error"].as_str().is_some_and(|e| !e.is_empty()));
    assert!(body.get("distribution").is_none());
    assert!(body.get("data_url").is_none());
}
