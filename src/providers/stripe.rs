//! # Stripe Checkout
//!
//! 使用服务端密钥创建 Checkout Session，只把会话 ID 返回给浏览器。

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::StripeConfig;
use crate::error::{ProxyError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::proxy::dispatcher::DispatchRequest;
use crate::proxy::route::RouteContext;
use crate::proxy::upstream_url::build_upstream_url;
use crate::server::RequestId;
use crate::{http_error, linfo, lwarn};

/// 固定的 Stripe API 版本
pub const STRIPE_API_VERSION: &str = "2025-08-27.basil";

const DEFAULT_FAILURE_MESSAGE: &str = "Failed to create session";

/// 创建成功的响应
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSessionCreated {
    pub id: String,
}

/// 校验后的 Stripe 配置
#[derive(Debug)]
struct CheckoutSettings<'a> {
    secret_key: &'a str,
    price_id: &'a str,
    success_url: &'a str,
    cancel_url: &'a str,
}

fn non_empty(value: Option<&String>) -> Option<&str> {
    value.map(String::as_str).filter(|v| !v.is_empty())
}

fn missing(message: &str) -> ProxyError {
    http_error!(StatusCode::INTERNAL_SERVER_ERROR, message)
}

impl<'a> CheckoutSettings<'a> {
    fn from_config(config: &'a StripeConfig) -> Result<Self> {
        let secret_key =
            non_empty(config.secret_key.as_ref()).ok_or_else(|| missing("Missing STRIPE_SECRET_KEY"))?;
        let price_id =
            non_empty(config.price_id.as_ref()).ok_or_else(|| missing("Missing STRIPE_PRICE_ID_USD"))?;
        let (Some(success_url), Some(cancel_url)) = (
            non_empty(config.success_url.as_ref()),
            non_empty(config.cancel_url.as_ref()),
        ) else {
            return Err(missing("Missing STRIPE_SUCCESS_URL or STRIPE_CANCEL_URL"));
        };

        Ok(Self {
            secret_key,
            price_id,
            success_url,
            cancel_url,
        })
    }

    /// Checkout Session 的表单参数
    fn form(&self) -> Vec<(String, String)> {
        [
            ("mode", "payment"),
            ("line_items[0][price]", self.price_id),
            ("line_items[0][quantity]", "1"),
            ("billing_address_collection", "required"),
            ("shipping_address_collection[allowed_countries][0]", "US"),
            ("success_url", self.success_url),
            ("cancel_url", self.cancel_url),
        ]
        .into_iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
    }
}

/// 从 Stripe 错误响应中取出错误消息
fn upstream_error_message(payload: &Value) -> String {
    payload
        .pointer("/error/message")
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_FAILURE_MESSAGE)
        .to_string()
}

/// `POST /api/stripe/create-checkout-session`
pub async fn create_checkout_session(State(ctx): State<RouteContext>, request: Request) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string);
    match create_session(&ctx, &request_id).await {
        Ok(created) => Json(created).into_response(),
        Err(err) => err.respond(&request_id),
    }
}

async fn create_session(ctx: &RouteContext, request_id: &str) -> Result<CheckoutSessionCreated> {
    let settings = CheckoutSettings::from_config(&ctx.config.stripe)?;
    let url = build_upstream_url(&ctx.config.stripe.api_base_url, "/v1/checkout/sessions");

    linfo!(
        request_id,
        LogStage::UpstreamRequest,
        LogComponent::Stripe,
        "create_checkout_session",
        "creating Stripe checkout session",
        price_id = settings.price_id
    );

    let outcome = ctx
        .client
        .dispatch(
            DispatchRequest::new(Method::POST, url)
                .authorization(format!("Bearer {}", settings.secret_key))
                .header("Stripe-Version", STRIPE_API_VERSION)
                .form(settings.form()),
            request_id,
        )
        .await?;

    if !outcome.is_success() {
        let message = upstream_error_message(&outcome.payload);
        lwarn!(
            request_id,
            LogStage::UpstreamResponse,
            LogComponent::Stripe,
            "create_checkout_session_failed",
            &message,
            status = outcome.status.as_u16()
        );
        return Err(http_error!(StatusCode::INTERNAL_SERVER_ERROR, message));
    }

    let id = outcome
        .payload
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| missing(DEFAULT_FAILURE_MESSAGE))?;

    Ok(CheckoutSessionCreated { id: id.to_string() })
}
