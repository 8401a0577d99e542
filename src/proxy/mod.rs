//! # 代理核心
//!
//! 凭据规范化、上游 URL 拼接、出站调度、检查器快照、响应信封以及路由工厂。

pub mod credentials;
pub mod dispatcher;
pub mod envelope;
pub mod inspector;
pub mod params;
pub mod route;
pub mod transform;
pub mod upstream_url;

pub use credentials::{BasicAuth, normalize_basic_auth, require_basic_auth};
pub use dispatcher::{DispatchBody, DispatchOutcome, DispatchRequest, UpstreamClient};
pub use envelope::{ForwardedRequest, ProxyEnvelope, transport_status};
pub use inspector::{Inspector, InspectorSnapshot, RequestTrace};
pub use params::RouteParams;
pub use route::{BodyMode, InboundRequest, ProxyRoute, RouteContext, RouteStrategy};
pub use upstream_url::build_upstream_url;
