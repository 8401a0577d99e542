//! # HTTP 服务
//!
//! 组装 axum 路由：Klarna 代理路由挂载在 `/api/klarna` 下，
//! Stripe 与 Adyen 各自一个处理器，另有系统端点与公开配置端点。

mod handlers;
mod request_id;

pub use handlers::{
    PublicAdyenConfig, PublicConfig, PublicKlarnaConfig, PublicStripeConfig, ServiceInfo,
};
pub use request_id::{REQUEST_ID_HEADER, RequestId, request_id_middleware};

use std::sync::Arc;

use axum::Router;
use axum::extract::FromRef;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, ServerConfig};
use crate::error::{ProxyError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::providers::{self, KLARNA_PREFIX, RouteInfo, adyen, stripe};
use crate::proxy::route::RouteContext;
use crate::{linfo, lwarn};

/// 路由共享状态
#[derive(Debug, Clone)]
pub struct AppState {
    pub route_context: RouteContext,
    pub catalog: Arc<Vec<RouteInfo>>,
}

impl FromRef<AppState> for RouteContext {
    fn from_ref(state: &AppState) -> Self {
        state.route_context.clone()
    }
}

/// 创建完整路由
pub fn build_router(config: Arc<AppConfig>) -> Result<Router> {
    let route_context = RouteContext::new(Arc::clone(&config))?;
    let entries = providers::proxy_routes();
    let catalog = entries.iter().map(RouteInfo::from).collect::<Vec<_>>();

    let klarna_routes = entries
        .into_iter()
        .fold(Router::new(), |router, entry| {
            router.route(entry.path, entry.route.into_method_router())
        });

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::RouteFactory,
        "routes_mounted",
        &format!("Mounted {} proxy routes under {KLARNA_PREFIX}", catalog.len())
    );

    let state = AppState {
        route_context,
        catalog: Arc::new(catalog),
    };

    let mut app = Router::new()
        .nest(KLARNA_PREFIX, klarna_routes)
        .route(
            "/api/stripe/create-checkout-session",
            post(stripe::create_checkout_session),
        )
        .route("/api/adyen/sessions", post(adyen::create_session))
        .route("/api/config/public", get(handlers::public_config_handler))
        .route("/ping", get(handlers::ping_handler))
        .route("/", get(handlers::root_handler))
        .with_state(state);

    let service_builder = ServiceBuilder::new().layer(TraceLayer::new_for_http());
    if config.server.enable_cors {
        app = app.layer(service_builder.layer(cors_layer(&config.server)));
    } else {
        app = app.layer(service_builder);
    }

    Ok(app.layer(axum::middleware::from_fn(request_id_middleware)))
}

fn cors_layer(config: &ServerConfig) -> CorsLayer {
    let cors_layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            header::ACCEPT,
            header::ORIGIN,
            HeaderName::from_static("idempotency-key"),
            REQUEST_ID_HEADER,
        ])
        .expose_headers([REQUEST_ID_HEADER]);

    if config.cors_origins.iter().any(|origin| origin == "*") {
        return cors_layer.allow_origin(Any);
    }

    let origins = config
        .cors_origins
        .iter()
        .map(|origin| origin.parse::<HeaderValue>())
        .collect::<std::result::Result<Vec<_>, _>>();
    match origins {
        Ok(origins) => cors_layer.allow_origin(origins),
        Err(e) => {
            lwarn!(
                "system",
                LogStage::Startup,
                LogComponent::ServerSetup,
                "cors_config_fail",
                &format!("Invalid CORS origin configuration: {e}, falling back to allow any")
            );
            cors_layer.allow_origin(Any)
        }
    }
}

/// 启动 HTTP 服务，收到 Ctrl+C 后优雅退出
pub async fn serve(config: Arc<AppConfig>) -> Result<()> {
    let address = config.listen_address();
    let router = build_router(config)?;

    let listener = TcpListener::bind(&address).await.map_err(|e| {
        ProxyError::server_start_with_source(format!("Failed to bind {address}"), e)
    })?;

    linfo!(
        "system",
        LogStage::Startup,
        LogComponent::ServerSetup,
        "server_listening",
        &format!("Payments proxy listening on {address}")
    );

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| ProxyError::server_start_with_source("HTTP server terminated", e))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        lwarn!(
            "system",
            LogStage::Shutdown,
            LogComponent::ServerSetup,
            "signal_listen_failed",
            &format!("Failed to listen for shutdown signal: {e}")
        );
        return;
    }
    linfo!(
        "system",
        LogStage::Shutdown,
        LogComponent::ServerSetup,
        "shutdown_signal",
        "Shutdown signal received"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn router() -> Router {
        build_router(Arc::new(AppConfig::default())).unwrap()
    }

    #[tokio::test]
    async fn test_ping_sets_request_id() {
        let response = router()
            .oneshot(Request::get("/ping").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_inbound_request_id_is_echoed() {
        let response = router()
            .oneshot(
                Request::get("/ping")
                    .header("x-request-id", "trace-abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[REQUEST_ID_HEADER], "trace-abc");
    }

    #[tokio::test]
    async fn test_unknown_method_is_rejected() {
        let response = router()
            .oneshot(
                Request::get("/api/klarna/create-session")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
