//! 图片路径识别
//!
//! 接受两种形式：`file:///` URL（去掉协议前缀后做百分号解码）或裸文件路径。
//! 扩展名按白名单大小写不敏感比较。任何解码失败都视为"不是图片"，从不报错。

use std::path::Path;

const IMAGE_EXTENSIONS: [&str; 9] = ["png", "jpg", "jpeg", "gif", "bmp", "webp", "ico", "tiff", "tif"];

const FILE_URL_PREFIX: &str = "file://";

/// 从 `file:///` URL 中提取本地路径
///
/// - `file:///home/a/b%20c.png` → `/home/a/b c.png`
/// - `file:///C:/Users/a.png` → `C:/Users/a.png`
/// - 非 `file:///` 形式或解码失败 → `None`
pub fn extract_path(candidate: &str) -> Option<String> {
    let candidate = candidate.trim();
    if !candidate.starts_with("file:///") {
        return None;
    }

    let raw = &candidate[FILE_URL_PREFIX.len()..];
    let decoded = urlencoding::decode(raw).ok()?.into_owned();

    // `/C:/...` 形式的 Windows 盘符路径
    let bytes = decoded.as_bytes();
    if bytes.len() >= 3 && bytes[0] == b'/' && bytes[1].is_ascii_alphabetic() && bytes[2] == b':' {
        return Some(decoded[1..].to_string());
    }

    Some(decoded)
}

/// 判断文本是否指向图片文件
pub fn is_image(candidate: &str) -> bool {
    let candidate = candidate.trim();
    if candidate.is_empty() || candidate.contains(['\n', '\r']) {
        return false;
    }

    let path = if candidate.starts_with("file:///") {
        match extract_path(candidate) {
            Some(path) => path,
            None => return false,
        }
    } else {
        candidate.to_string()
    };

    has_image_extension(Path::new(&path))
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
