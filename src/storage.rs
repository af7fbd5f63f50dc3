//! 图片存储目录管理模块
//!
//! # 设计思路
//!
//! 统一管理剪贴板图片的持久化存储路径，支持用户自定义目录，
//! 并在目录不存在时自动创建。
//!
//! # 实现思路
//!
//! - 优先使用配置中的自定义目录。
//! - 未设置时回退到应用数据目录下的 `images` 子目录。
//! - 目录不存在时自动 `create_dir_all`，避免上层判断。

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::AppError;

/// 存储目录信息
#[derive(Debug, Clone, Serialize)]
pub struct StorageInfo {
    pub path: String,
    pub total_size: u64,
    pub file_count: u64,
}

/// 获取图片存储目录
///
/// # 返回
/// - `Ok(PathBuf)` — 可用的图片存储目录
/// - `Err(AppError::Storage)` — 无法创建目录
pub fn get_images_dir(data_dir: &Path, custom_dir: Option<&Path>) -> Result<PathBuf, AppError> {
    let dir = match custom_dir {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => data_dir.join("images"),
    };

    if !dir.exists() {
        fs::create_dir_all(&dir).map_err(|e| {
            AppError::Storage(format!("创建图片目录 '{}' 失败: {}", dir.display(), e))
        })?;
    }
    Ok(dir)
}

/// 获取图片存储目录信息（路径 + 占用大小 + 文件数）
pub fn images_dir_info(dir: &Path) -> StorageInfo {
    let mut total_size: u64 = 0;
    let mut file_count: u64 = 0;

    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            if let Ok(metadata) = entry.metadata() {
                if metadata.is_file() {
                    total_size += metadata.len();
                    file_count += 1;
                }
            }
        }
    }

    StorageInfo {
        path: dir.to_string_lossy().to_string(),
        total_size,
        file_count,
    }
}
