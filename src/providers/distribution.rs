//! # 店内分发二维码
//!
//! 读取分发结果：上游直接返回图片时转为 data URL；返回分发状态 JSON 时，
//! 再以无认证请求拉取其中 `qr` 指向的图片。

use async_trait::async_trait;
use axum::http::{Method, StatusCode};
use serde_json::Value;

use super::RouteEntry;
use crate::error::Result;
use crate::logging::{LogComponent, LogStage};
use crate::proxy::dispatcher::DispatchRequest;
use crate::proxy::inspector::Exchange;
use crate::proxy::route::{
    InboundRequest, ProxyRoute, RouteContext, RouteStrategy, TransformInput, Transformed,
};
use crate::proxy::transform::{is_image, to_data_url};
use crate::{http_error, lwarn};

/// 分发结果请求的 `Accept`
pub const DISTRIBUTION_ACCEPT: &str = "image/png, image/jpeg, application/json;q=0.9, */*;q=0.8";
/// 二维码图片请求的 `Accept`
pub const QR_ACCEPT: &str = "image/png,image/jpeg,image/gif;q=0.9,*/*;q=0.8";
/// 二维码响应缺少内容类型时的默认值
const DEFAULT_QR_CONTENT_TYPE: &str = "image/png";

/// `POST fetch-distribution`
#[derive(Debug, Clone, Copy, Default)]
pub struct FetchDistribution;

impl FetchDistribution {
    /// 图片响应：转为 data URL
    fn image(input: TransformInput<'_>) -> Transformed {
        let outcome = input.outcome;
        let data_url = to_data_url(&outcome.content_type, &outcome.body);
        let inspector = input.ctx.inspector.snapshot(
            input.trace,
            Exchange::from_outcome(outcome, None).with_binary(outcome.body.len(), Some(&data_url)),
        );
        Transformed {
            content_type: Some(outcome.content_type.clone()),
            data_url: Some(data_url),
            inspector,
            ..Transformed::default()
        }
    }

    /// 分发状态 JSON：尝试拉取 `qr` 图片
    async fn distribution_status(input: TransformInput<'_>) -> Result<Transformed> {
        let outcome = input.outcome;
        let raw_text = outcome.raw_text();
        let status = outcome.payload.clone();

        let mut qr_content_type = None;
        let mut data_url = None;
        if let Some(qr_url) = status.get("qr").and_then(Value::as_str) {
            let qr = input
                .ctx
                .client
                .dispatch(
                    DispatchRequest::new(Method::GET, qr_url).accept(Some(QR_ACCEPT)),
                    &input.trace.request_id,
                )
                .await?;
            if qr.is_success() {
                let content_type = if qr.content_type.is_empty() {
                    DEFAULT_QR_CONTENT_TYPE.to_string()
                } else {
                    qr.content_type.clone()
                };
                data_url = Some(to_data_url(&content_type, &qr.body));
                qr_content_type = Some(content_type);
            } else {
                lwarn!(
                    input.trace.request_id,
                    LogStage::UpstreamResponse,
                    LogComponent::Klarna,
                    "qr_fetch_failed",
                    "QR image fetch returned a non-success status",
                    status = qr.status.as_u16()
                );
            }
        }

        let inspector = input.ctx.inspector.snapshot(
            input.trace,
            Exchange::from_outcome(outcome, Some(&raw_text)),
        );
        Ok(Transformed {
            content_type: Some(
                qr_content_type.unwrap_or_else(|| DEFAULT_QR_CONTENT_TYPE.to_string()),
            ),
            data_url,
            inspector,
            distribution: Some(status),
            ..Transformed::default()
        })
    }
}

#[async_trait]
impl RouteStrategy for FetchDistribution {
    fn name(&self) -> &'static str {
        "fetch_distribution"
    }

    fn method(&self) -> Method {
        Method::GET
    }

    fn inbound_methods(&self) -> Vec<Method> {
        vec![Method::POST]
    }

    fn accept(&self) -> Option<&'static str> {
        Some(DISTRIBUTION_ACCEPT)
    }

    async fn resolve_url(&self, inbound: &InboundRequest, _ctx: &RouteContext) -> Result<String> {
        let body = inbound.json_body()?;
        body.get("result_url")
            .and_then(Value::as_str)
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .ok_or_else(|| http_error!(StatusCode::BAD_REQUEST, "Missing result_url in body"))
    }

    async fn transform(&self, input: TransformInput<'_>) -> Result<Option<Transformed>> {
        let outcome = input.outcome;

        if !outcome.is_success() {
            let raw_text = outcome.raw_text();
            let inspector = input.ctx.inspector.snapshot(
                input.trace,
                Exchange::from_outcome(outcome, Some(&raw_text)),
            );
            return Ok(Some(Transformed {
                error: Some(raw_text),
                inspector,
                ..Transformed::default()
            }));
        }

        if is_image(&outcome.content_type) {
            return Ok(Some(Self::image(input)));
        }

        if outcome.is_json() {
            // 声明为 JSON 但无法解析时按上游失败处理
            if let Err(err) = serde_json::from_slice::<Value>(&outcome.body) {
                return Err(http_error!(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Invalid JSON from distribution endpoint: {}",
                    err
                ));
            }
            return Self::distribution_status(input).await.map(Some);
        }

        Ok(None)
    }
}

/// 分发路由
#[must_use]
pub fn routes() -> Vec<RouteEntry> {
    vec![RouteEntry::new(
        "/fetch-distribution",
        ProxyRoute::new(FetchDistribution),
    )]
}
