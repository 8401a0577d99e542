//! # 错误处理宏

/// 快速创建配置错误的宏
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::ProxyError::config($msg)
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::ProxyError::config(format!($fmt, $($arg)*))
    };
}

/// 快速创建带状态码的 HTTP 错误的宏
#[macro_export]
macro_rules! http_error {
    ($status:expr, $msg:expr) => {
        $crate::error::ProxyError::http($status, $msg)
    };
    ($status:expr, $fmt:expr, $($arg:tt)*) => {
        $crate::error::ProxyError::http($status, format!($fmt, $($arg)*))
    };
}

/// 确保条件成立，否则提前返回给定错误
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $err:expr $(,)?) => {
        if !($cond) {
            return Err(::core::convert::Into::into($err));
        }
    };
}
