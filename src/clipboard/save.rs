//! 剪贴板图片保存模块
//!
//! # 设计思路
//!
//! - 剪贴板图片统一编码为 PNG（无损、编码结果确定），指纹就算在这些字节上，
//!   因此同一组像素无论编码几次，指纹都相同。
//! - 文件名形如 `img_<本地时间戳>_<指纹前8位>.png`，由本模块生成；
//!   `db::cleanup` 依据这个前缀识别"由本应用生成、可安全删除"的文件。

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use image::ImageEncoder;
use image::codecs::png::PngEncoder;

use super::{ContentFingerprint, RawImage};
use crate::error::AppError;

pub(crate) const GENERATED_IMAGE_PREFIX: &str = "img_";

/// 将 RGBA 像素编码为 PNG 字节
pub fn encode_png(image: &RawImage) -> Result<Vec<u8>, AppError> {
    let expected = image
        .width
        .checked_mul(image.height)
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| AppError::Image("图片尺寸溢出".to_string()))?;

    if image.width == 0 || image.height == 0 || image.bytes.len() != expected {
        return Err(AppError::Image(format!(
            "像素缓冲区与尺寸不符: {}x{}，{} 字节",
            image.width,
            image.height,
            image.bytes.len()
        )));
    }

    let width = u32::try_from(image.width).map_err(|_| AppError::Image("图片宽度过大".to_string()))?;
    let height = u32::try_from(image.height).map_err(|_| AppError::Image("图片高度过大".to_string()))?;

    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(&image.bytes, width, height, image::ExtendedColorType::Rgba8)
        .map_err(|e| AppError::Image(format!("PNG 编码失败: {}", e)))?;
    Ok(png)
}

fn generated_file_name(fingerprint: &ContentFingerprint) -> String {
    let timestamp = Local::now().format("%Y%m%d%H%M%S%f");
    format!("{}{}_{}.png", GENERATED_IMAGE_PREFIX, timestamp, fingerprint.short())
}

/// 把已编码的 PNG 写入图片目录，返回完整路径
pub fn save_png(images_dir: &Path, fingerprint: &ContentFingerprint, png: &[u8]) -> Result<PathBuf, AppError> {
    fs::create_dir_all(images_dir)
        .map_err(|e| AppError::Storage(format!("创建图片目录 '{}' 失败: {}", images_dir.display(), e)))?;

    let file_path = images_dir.join(generated_file_name(fingerprint));
    fs::write(&file_path, png)?;
    log::debug!("🖼️ 图片已保存: {}", file_path.display());
    Ok(file_path)
}

/// 读取磁盘上的图片并解码为 RGBA，用于复制回剪贴板
pub fn load_rgba(path: &Path) -> Result<RawImage, AppError> {
    let decoded = image::open(path)
        .map_err(|e| AppError::Image(format!("读取图片 '{}' 失败: {}", path.display(), e)))?
        .to_rgba8();

    Ok(RawImage {
        width: decoded.width() as usize,
        height: decoded.height() as usize,
        bytes: decoded.into_raw(),
    })
}
