//! # Payments Proxy Library
//!
//! 支付服务商沙箱代理核心库：浏览器通过 Basic 凭据调用本服务，
//! 由本服务转发到 Klarna / Stripe / Adyen，并返回带检查器快照的响应信封。

pub mod config;
pub mod error;
pub mod logging;
pub mod providers;
pub mod proxy;
pub mod server;

// Re-export commonly used types
pub use config::AppConfig;
pub use error::{ProxyError, Result};
