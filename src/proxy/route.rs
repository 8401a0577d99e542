//! # 路由工厂
//!
//! 每条代理路由由一个 [`RouteStrategy`] 声明：出站方法、地址解析、请求体策略、
//! 可选的成功变换。[`ProxyRoute`] 把它与凭证规范化、出站调度、检查快照和响应信封
//! 组合成完整的 axum 处理器。

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::{FromRef, Request, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{MethodFilter, MethodRouter, on};
use serde_json::Value;

use super::credentials::{BasicAuth, require_basic_auth};
use super::dispatcher::{DispatchOutcome, DispatchRequest, UpstreamClient};
use super::envelope::{EnvelopeBody, ForwardedRequest, ProxyEnvelope};
use super::inspector::{Exchange, Inspector, InspectorSnapshot, RequestTrace};
use super::params::RouteParams;
use super::upstream_url::build_upstream_url;
use crate::config::AppConfig;
use crate::error::{ProxyError, Result};
use crate::logging::{LogComponent, LogStage};
use crate::server::RequestId;
use crate::{http_error, ldebug, linfo, lwarn};

/// 入站请求体的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BodyMode {
    /// 不读取请求体
    #[default]
    None,
    /// 尝试解析 JSON，失败时视为没有请求体
    Optional,
    /// 必须是合法 JSON，解析失败返回 500
    Required,
}

/// 代理路由共享的运行时依赖
#[derive(Debug, Clone)]
pub struct RouteContext {
    pub config: Arc<AppConfig>,
    pub client: UpstreamClient,
    pub inspector: Inspector,
}

impl RouteContext {
    pub fn new(config: Arc<AppConfig>) -> Result<Self> {
        let client = UpstreamClient::new(&config.upstream)?;
        let inspector = Inspector::new(&config.inspector);
        Ok(Self {
            config,
            client,
            inspector,
        })
    }

    /// Klarna 基础地址
    #[must_use]
    pub fn klarna_base_url(&self) -> &str {
        &self.config.klarna.base_url
    }
}

/// 已通过认证的入站请求
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub params: RouteParams,
    pub body: Bytes,
    pub request_id: String,
}

impl InboundRequest {
    /// 必需的路径参数
    pub fn required_param(&self, name: &str) -> Result<&str> {
        self.params.required(name)
    }

    /// 查询参数（取第一个同名值）
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        let query = self.uri.query()?;
        url::form_urlencoded::parse(query.as_bytes())
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// 严格解析 JSON 请求体
    pub fn json_body(&self) -> Result<Value> {
        serde_json::from_slice(&self.body).map_err(|e| {
            ProxyError::serialization(format!("Invalid JSON body: {e}"), e)
        })
    }

    /// 宽松解析 JSON 请求体，空体或非法 JSON 均视为缺失
    #[must_use]
    pub fn optional_json_body(&self) -> Option<Value> {
        if self.body.is_empty() {
            return None;
        }
        match serde_json::from_slice(&self.body) {
            Ok(value) => Some(value),
            Err(e) => {
                ldebug!(
                    self.request_id,
                    LogStage::RequestStart,
                    LogComponent::RouteFactory,
                    "ignore_invalid_body",
                    &format!("ignoring malformed JSON body: {e}")
                );
                None
            }
        }
    }

    /// 按策略读取请求体
    pub fn body_for(&self, mode: BodyMode) -> Result<Option<Value>> {
        match mode {
            BodyMode::None => Ok(None),
            BodyMode::Optional => Ok(self.optional_json_body()),
            BodyMode::Required => self.json_body().map(Some),
        }
    }
}

/// 需要随出站请求发送的额外请求头
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundHeader {
    pub name: &'static str,
    pub value: String,
    /// 在 `forwarded_request.headers` 中展示的值；`None` 表示不展示
    pub display: Option<String>,
}

/// 成功变换的输入
#[derive(Debug, Clone, Copy)]
pub struct TransformInput<'a> {
    pub ctx: &'a RouteContext,
    pub trace: &'a RequestTrace,
    pub outcome: &'a DispatchOutcome,
}

/// 变换后的响应内容
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transformed {
    /// 写入 `klarna_response` 的值
    pub payload: Option<Value>,
    /// 覆盖上游的内容类型
    pub content_type: Option<String>,
    /// 存在时代替 `klarna_response`
    pub data_url: Option<String>,
    pub inspector: Option<InspectorSnapshot>,
    pub distribution: Option<Value>,
    pub error: Option<String>,
}

impl Transformed {
    /// 默认处理：原样转发解析结果，并以原始响应文本生成快照
    #[must_use]
    pub fn passthrough(input: TransformInput<'_>) -> Self {
        let raw_text = input.outcome.raw_text();
        let inspector = input.ctx.inspector.snapshot(
            input.trace,
            Exchange::from_outcome(input.outcome, Some(&raw_text)),
        );
        Self {
            payload: Some(input.outcome.payload.clone()),
            inspector,
            ..Self::default()
        }
    }
}

/// 代理路由策略
#[async_trait]
pub trait RouteStrategy: Send + Sync + 'static {
    /// 路由名称（用于日志与路由目录）
    fn name(&self) -> &'static str;

    /// 出站方法
    fn method(&self) -> Method;

    /// 接受的入站方法，缺省与出站方法一致
    fn inbound_methods(&self) -> Vec<Method> {
        vec![self.method()]
    }

    fn body_mode(&self) -> BodyMode {
        BodyMode::None
    }

    /// 覆盖出站 `Accept` 头
    fn accept(&self) -> Option<&'static str> {
        None
    }

    /// 解析出站路径或绝对地址
    async fn resolve_url(&self, inbound: &InboundRequest, ctx: &RouteContext) -> Result<String>;

    /// 额外的出站请求头
    fn outbound_headers(&self, _inbound: &InboundRequest) -> Vec<OutboundHeader> {
        Vec::new()
    }

    /// 出站请求体，缺省转发入站请求体
    async fn outbound_body(
        &self,
        _inbound: &InboundRequest,
        _ctx: &RouteContext,
        inbound_body: Option<Value>,
    ) -> Result<Option<Value>> {
        Ok(inbound_body)
    }

    /// 成功变换钩子；返回 `None` 时走默认处理
    async fn transform(&self, _input: TransformInput<'_>) -> Result<Option<Transformed>> {
        Ok(None)
    }
}

/// 由策略实例化的路由处理器
#[derive(Clone)]
pub struct ProxyRoute {
    strategy: Arc<dyn RouteStrategy>,
}

impl std::fmt::Debug for ProxyRoute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyRoute")
            .field("name", &self.strategy.name())
            .field("method", &self.strategy.method())
            .finish()
    }
}

impl ProxyRoute {
    pub fn new<S: RouteStrategy>(strategy: S) -> Self {
        Self {
            strategy: Arc::new(strategy),
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        self.strategy.name()
    }

    #[must_use]
    pub fn inbound_methods(&self) -> Vec<Method> {
        self.strategy.inbound_methods()
    }

    /// 处理一次请求，任何阶段的错误都转换为 `{ "error": message }`
    pub async fn handle(&self, ctx: &RouteContext, request: Request) -> Response {
        let trace = RequestTrace::start(
            request
                .extensions()
                .get::<RequestId>()
                .map(ToString::to_string),
        );
        match self.process(ctx, &trace, request).await {
            Ok(envelope) => envelope.into_response(),
            Err(err) => err.respond(&trace.request_id),
        }
    }

    async fn process(
        &self,
        ctx: &RouteContext,
        trace: &RequestTrace,
        request: Request,
    ) -> Result<ProxyEnvelope> {
        let (mut parts, body) = request.into_parts();
        let auth = require_basic_auth(&parts.headers).inspect_err(|_| {
            lwarn!(
                trace.request_id,
                LogStage::Authentication,
                LogComponent::Credentials,
                "auth_rejected",
                "rejected request without usable Basic credentials",
                route = self.strategy.name(),
                path = parts.uri.path()
            );
        })?;

        let params = RouteParams::from_parts(&mut parts).await;
        let body = read_body(body, ctx.config.server.max_request_size).await?;

        let inbound = InboundRequest {
            method: parts.method,
            uri: parts.uri,
            headers: parts.headers,
            params,
            body,
            request_id: trace.request_id.clone(),
        };

        let target = self.strategy.resolve_url(&inbound, ctx).await?;
        let url = build_upstream_url(ctx.klarna_base_url(), &target);
        let inbound_body = inbound.body_for(self.strategy.body_mode())?;
        let outbound_body = self
            .strategy
            .outbound_body(&inbound, ctx, inbound_body)
            .await?;
        let extra_headers = self.strategy.outbound_headers(&inbound);
        let method = self.strategy.method();

        linfo!(
            trace.request_id,
            LogStage::RequestStart,
            LogComponent::RouteFactory,
            "forward",
            &format!("{} → {} {}", self.strategy.name(), method, url),
            auth = auth.masked()
        );

        let mut outcome = ctx
            .client
            .dispatch(
                build_dispatch(
                    &method,
                    &url,
                    &auth,
                    self.strategy.accept(),
                    outbound_body.as_ref(),
                    &extra_headers,
                ),
                &trace.request_id,
            )
            .await?;
        for header in &extra_headers {
            if let Some(display) = &header.display {
                outcome.mask_request_header(header.name, display);
            }
        }

        let input = TransformInput {
            ctx,
            trace,
            outcome: &outcome,
        };
        let transformed = match self.strategy.transform(input).await? {
            Some(transformed) => transformed,
            None => Transformed::passthrough(input),
        };

        let forwarded = extra_headers.into_iter().fold(
            ForwardedRequest::new(url, method.as_str(), &auth, outbound_body),
            |forwarded, header| match header.display {
                Some(display) => forwarded.with_header(header.name, display),
                None => forwarded,
            },
        );

        let body = match transformed.data_url {
            Some(data_url) => EnvelopeBody::DataUrl(data_url),
            None => EnvelopeBody::Payload(transformed.payload),
        };
        let content_type = transformed
            .content_type
            .or_else(|| Some(outcome.content_type.clone()));

        let envelope = ProxyEnvelope::new(forwarded, outcome.status.as_u16(), body)
            .with_content_type(content_type)
            .with_inspector(transformed.inspector)
            .with_distribution(transformed.distribution)
            .with_error(transformed.error);

        linfo!(
            trace.request_id,
            LogStage::Response,
            LogComponent::RouteFactory,
            "forwarded",
            "upstream call completed",
            upstream_status = envelope.status,
            transport_status = envelope.transport_status().as_u16(),
            duration_ms = trace.elapsed_ms()
        );

        Ok(envelope)
    }

    /// 转换为 axum 方法路由
    pub fn into_method_router<S>(self) -> MethodRouter<S>
    where
        RouteContext: FromRef<S>,
        S: Clone + Send + Sync + 'static,
    {
        let filter = self
            .inbound_methods()
            .into_iter()
            .filter_map(|method| MethodFilter::try_from(method).ok())
            .reduce(MethodFilter::or)
            .unwrap_or(MethodFilter::POST);

        on(
            filter,
            move |State(ctx): State<RouteContext>, request: Request| {
                let route = self.clone();
                async move { route.handle(&ctx, request).await }
            },
        )
    }
}

fn build_dispatch(
    method: &Method,
    url: &str,
    auth: &BasicAuth,
    accept: Option<&str>,
    body: Option<&Value>,
    extra_headers: &[OutboundHeader],
) -> DispatchRequest {
    let mut request = DispatchRequest::new(method.clone(), url)
        .authorization(auth.header_value())
        .accept(accept);
    if let Some(body) = body {
        request = request.json(body.clone());
    }
    extra_headers.iter().fold(request, |request, header| {
        request.header(header.name, header.value.clone())
    })
}

async fn read_body(body: Body, limit: usize) -> Result<Bytes> {
    axum::body::to_bytes(body, limit).await.map_err(|e| {
        http_error!(StatusCode::PAYLOAD_TOO_LARGE, "Failed to read request body: {}", e)
    })
}
