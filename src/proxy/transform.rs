//! 成功响应的变换辅助：二进制图片转 data URL

use base64::{Engine as _, engine::general_purpose::STANDARD};

/// 去掉 `Content-Type` 中的参数部分，例如 `image/png; charset=binary` → `image/png`
#[must_use]
pub fn mime_essence(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .map_or(content_type, str::trim)
}

/// 是否为图片响应
#[must_use]
pub fn is_image(content_type: &str) -> bool {
    content_type
        .trim_start()
        .get(..6)
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case("image/"))
}

/// 生成 `data:<mime>;base64,<payload>` 形式的 data URL
#[must_use]
pub fn to_data_url(content_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_essence(content_type),
        STANDARD.encode(bytes)
    )
}
