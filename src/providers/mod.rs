//! # 支付服务商路由
//!
//! Klarna 系列路由通过路由工厂声明；Stripe 与 Adyen 使用服务端密钥，直接以 axum 处理器实现。

pub mod adyen;
pub mod distribution;
pub mod hpp;
pub mod klarna;
pub mod stripe;

use serde::Serialize;

use crate::proxy::route::ProxyRoute;

/// Klarna 代理路由的挂载前缀
pub const KLARNA_PREFIX: &str = "/api/klarna";

/// 一条待挂载的代理路由
#[derive(Debug, Clone)]
pub struct RouteEntry {
    /// 相对 [`KLARNA_PREFIX`] 的路径（axum 路径语法）
    pub path: &'static str,
    pub route: ProxyRoute,
}

impl RouteEntry {
    #[must_use]
    pub fn new(path: &'static str, route: ProxyRoute) -> Self {
        Self { path, route }
    }

    /// 挂载后的完整路径
    #[must_use]
    pub fn full_path(&self) -> String {
        format!("{KLARNA_PREFIX}{}", self.path)
    }
}

/// 路由目录中的一项
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub name: &'static str,
    pub path: String,
    pub methods: Vec<String>,
}

impl From<&RouteEntry> for RouteInfo {
    fn from(entry: &RouteEntry) -> Self {
        Self {
            name: entry.route.name(),
            path: entry.full_path(),
            methods: entry
                .route
                .inbound_methods()
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

/// 所有经路由工厂构建的代理路由
#[must_use]
pub fn proxy_routes() -> Vec<RouteEntry> {
    let mut entries = klarna::routes();
    entries.extend(hpp::routes());
    entries.extend(distribution::routes());
    entries
}
