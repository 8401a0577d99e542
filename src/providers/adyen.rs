//! # Adyen Checkout Sessions
//!
//! 使用服务端 API Key 创建 Checkout Session。请求体可覆盖金额、国家、语言与订单号。

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::config::AdyenConfig;
use crate::error::{ProxyError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::proxy::dispatcher::DispatchRequest;
use crate::proxy::route::RouteContext;
use crate::proxy::upstream_url::build_upstream_url;
use crate::server::RequestId;
use crate::{http_error, lerror, linfo, lwarn};

/// 透传给 Adyen 的幂等键请求头
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";
/// 支付完成后的回跳路径
pub const RETURN_PATH: &str = "/apps/adyen/status";

const DEFAULT_FAILURE_MESSAGE: &str = "Failed to create Adyen session";
const UNAUTHORIZED_HINT: &str = "Unauthorized from Adyen. Verify ADYEN_API_KEY, ADYEN_MERCHANT_ACCOUNT, env (test/live), and Checkout API permissions.";

/// 创建失败时返回给浏览器的错误体
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdyenErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl AdyenErrorBody {
    fn from_upstream(status: StatusCode, payload: &Value) -> Self {
        let error = ["message", "errorMessage"]
            .iter()
            .find_map(|key| {
                payload
                    .get(*key)
                    .and_then(Value::as_str)
                    .filter(|message| !message.is_empty())
            })
            .unwrap_or(DEFAULT_FAILURE_MESSAGE)
            .to_string();
        let hint = matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN)
            .then(|| UNAUTHORIZED_HINT.to_string());

        Self {
            error,
            upstream_status: Some(status.as_u16()),
            hint,
        }
    }
}

impl IntoResponse for AdyenErrorBody {
    fn into_response(self) -> Response {
        (StatusCode::INTERNAL_SERVER_ERROR, Json(self)).into_response()
    }
}

impl From<ProxyError> for AdyenErrorBody {
    fn from(err: ProxyError) -> Self {
        Self {
            error: err.client_message(),
            upstream_status: None,
            hint: None,
        }
    }
}

/// 浏览器可覆盖的会话参数
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOverrides {
    pub amount: Value,
    pub country_code: Option<Value>,
    pub shopper_locale: Option<Value>,
    pub reference: String,
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::String(text) => !text.is_empty(),
        Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}

impl SessionOverrides {
    /// 默认参数：USD 10.00、美国
    #[must_use]
    pub fn defaults(now_millis: i64) -> Self {
        Self {
            amount: json!({ "currency": "USD", "value": 1000 }),
            country_code: Some(json!("US")),
            shopper_locale: None,
            reference: format!("ADYEN_DEMO_{now_millis}"),
        }
    }

    /// 合并请求体；无法解析的请求体按空处理
    #[must_use]
    pub fn from_body(body: &[u8], now_millis: i64) -> Self {
        let mut overrides = Self::defaults(now_millis);
        let Ok(Value::Object(fields)) = serde_json::from_slice::<Value>(body) else {
            return overrides;
        };

        if let Some(amount) = fields.get("amount") {
            let has_currency = amount.get("currency").is_some_and(is_truthy);
            let has_value = amount.get("value").is_some_and(Value::is_number);
            if has_currency && has_value {
                overrides.amount = amount.clone();
            }
        }
        if let Some(country_code) = fields.get("countryCode").filter(|v| is_truthy(v)) {
            overrides.country_code = Some(country_code.clone());
        }
        if let Some(locale) = fields.get("shopperLocale").filter(|v| is_truthy(v)) {
            overrides.shopper_locale = Some(locale.clone());
        }
        match fields.get("reference") {
            Some(Value::String(reference)) if !reference.is_empty() => {
                overrides.reference.clone_from(reference);
            }
            Some(reference @ Value::Number(_)) => overrides.reference = reference.to_string(),
            _ => {}
        }
        overrides
    }

    /// 构建 `/sessions` 请求体
    #[must_use]
    pub fn into_payload(self, merchant_account: &str, return_url: &str) -> Value {
        let mut payload = Map::new();
        payload.insert("merchantAccount".into(), json!(merchant_account));
        payload.insert("amount".into(), self.amount);
        payload.insert("reference".into(), json!(self.reference));
        payload.insert("returnUrl".into(), json!(return_url));
        payload.insert("channel".into(), json!("Web"));
        if let Some(country_code) = self.country_code {
            payload.insert("countryCode".into(), country_code);
        }
        if let Some(locale) = self.shopper_locale {
            payload.insert("shopperLocale".into(), locale);
        }
        Value::Object(payload)
    }
}

/// 计算回跳地址使用的站点 origin：配置优先，其次是请求头
#[must_use]
pub fn request_origin(headers: &HeaderMap, public_origin: Option<&str>) -> String {
    if let Some(origin) = public_origin.filter(|o| !o.is_empty()) {
        return origin.trim_end_matches('/').to_string();
    }
    if let Some(origin) = headers
        .get(header::ORIGIN)
        .and_then(|v| v.to_str().ok())
        .filter(|o| !o.is_empty() && *o != "null")
    {
        return origin.trim_end_matches('/').to_string();
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map_or("http", str::trim);
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(header::HOST))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{scheme}://{host}")
}

fn required_setting<'a>(value: Option<&'a String>, message: &str) -> Result<&'a str> {
    value
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| http_error!(StatusCode::INTERNAL_SERVER_ERROR, message))
}

fn credentials(config: &AdyenConfig) -> Result<(&str, &str)> {
    let api_key = required_setting(config.api_key.as_ref(), "Missing ADYEN_API_KEY")?;
    let merchant_account =
        required_setting(config.merchant_account.as_ref(), "Missing ADYEN_MERCHANT_ACCOUNT")?;
    Ok((api_key, merchant_account))
}

/// `POST /api/adyen/sessions`
pub async fn create_session(State(ctx): State<RouteContext>, request: Request) -> Response {
    let request_id = request
        .extensions()
        .get::<RequestId>()
        .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string);
    match create_session_inner(&ctx, request, &request_id).await {
        Ok(Ok(session)) => Json(session).into_response(),
        Ok(Err(upstream_error)) => upstream_error.into_response(),
        Err(err) => {
            lerror!(
                request_id,
                LogStage::Error,
                LogComponent::Adyen,
                "create_session_error",
                &err.to_string()
            );
            AdyenErrorBody::from(err).into_response()
        }
    }
}

async fn create_session_inner(
    ctx: &RouteContext,
    request: Request,
    request_id: &str,
) -> Result<std::result::Result<Value, AdyenErrorBody>> {
    let (parts, body) = request.into_parts();
    let config = &ctx.config.adyen;
    let (api_key, merchant_account) = credentials(config)?;

    let origin = request_origin(&parts.headers, ctx.config.server.public_origin.as_deref());
    let return_url = format!("{origin}{RETURN_PATH}");
    // 读取失败同样按空请求体处理
    let body = axum::body::to_bytes(body, ctx.config.server.max_request_size)
        .await
        .unwrap_or_default();
    let payload = SessionOverrides::from_body(&body, chrono::Utc::now().timestamp_millis())
        .into_payload(merchant_account, &return_url);

    let mut dispatch = DispatchRequest::new(
        Method::POST,
        build_upstream_url(&config.checkout_base_url, "/sessions"),
    )
    .header("X-API-Key", api_key)
    .json(payload);
    if let Some(key) = parts
        .headers
        .get(IDEMPOTENCY_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        dispatch = dispatch.header(IDEMPOTENCY_HEADER, key);
    }

    linfo!(
        request_id,
        LogStage::UpstreamRequest,
        LogComponent::Adyen,
        "create_session",
        "creating Adyen checkout session",
        environment = config.environment
    );
    let outcome = ctx.client.dispatch(dispatch, request_id).await?;

    if outcome.is_success() {
        return Ok(Ok(outcome.payload));
    }

    let error = AdyenErrorBody::from_upstream(outcome.status, &outcome.payload);
    lwarn!(
        request_id,
        LogStage::UpstreamResponse,
        LogComponent::Adyen,
        "create_session_failed",
        &format!("Adyen session creation failed: {}", error.error),
        status = outcome.status.as_u16()
    );
    Ok(Err(error))
}
