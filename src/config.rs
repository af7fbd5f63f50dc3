//! 应用配置
//!
//! 解析顺序：内置默认值 → 数据目录下的 `config.json` → 环境变量（含 `.env`）。
//! 配置文件缺失或损坏时记录警告并使用默认值，不阻止启动。

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

const APP_DIR_NAME: &str = "clipboard-categorizer";
const DB_FILE_NAME: &str = "clipboard_history.db";
const CONFIG_FILE_NAME: &str = "config.json";

const POLL_INTERVAL_DEFAULT_MS: u64 = 500;
const POLL_INTERVAL_MIN_MS: u64 = 100;
const POLL_INTERVAL_MAX_MS: u64 = 10_000;
const AI_TIMEOUT_DEFAULT_SECS: u64 = 10;
const AI_TIMEOUT_MIN_SECS: u64 = 1;
const AI_TIMEOUT_MAX_SECS: u64 = 60;

/// `config.json` 的内容，所有字段可选
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FileConfig {
    #[serde(default)]
    db_dir: Option<String>,
    #[serde(default)]
    images_dir: Option<String>,
    #[serde(default)]
    poll_interval_ms: Option<u64>,
    #[serde(default)]
    ai_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub images_dir: PathBuf,
    pub poll_interval: Duration,
    pub ai_timeout: Duration,
}

impl AppConfig {
    /// 从默认数据目录（或 `CLIPCAT_DATA_DIR`）加载
    pub fn load() -> Result<Self, AppError> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                log::warn!("读取 .env 失败: {}", err);
            }
        }

        let data_dir = match std::env::var("CLIPCAT_DATA_DIR") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR_NAME))
                .ok_or_else(|| AppError::Config("无法确定应用数据目录".to_string()))?,
        };

        let env = |name: &str| std::env::var(name).ok();
        Ok(Self::resolve(&data_dir, load_file_config(&data_dir), env))
    }

    fn resolve(data_dir: &Path, file: FileConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let db_dir = env("CLIPCAT_DB_DIR")
            .or(file.db_dir)
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.to_path_buf());

        let images_dir = env("CLIPCAT_IMAGES_DIR")
            .or(file.images_dir)
            .filter(|dir| !dir.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| data_dir.join("images"));

        let poll_interval_ms = env("CLIPCAT_POLL_INTERVAL_MS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .or(file.poll_interval_ms)
            .unwrap_or(POLL_INTERVAL_DEFAULT_MS)
            .clamp(POLL_INTERVAL_MIN_MS, POLL_INTERVAL_MAX_MS);

        let ai_timeout_secs = env("CLIPCAT_AI_TIMEOUT_SECS")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .or(file.ai_timeout_secs)
            .unwrap_or(AI_TIMEOUT_DEFAULT_SECS)
            .clamp(AI_TIMEOUT_MIN_SECS, AI_TIMEOUT_MAX_SECS);

        Self {
            data_dir: data_dir.to_path_buf(),
            db_path: db_dir.join(DB_FILE_NAME),
            images_dir,
            poll_interval: Duration::from_millis(poll_interval_ms),
            ai_timeout: Duration::from_secs(ai_timeout_secs),
        }
    }
}

fn load_file_config(data_dir: &Path) -> FileConfig {
    let config_path = data_dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        return FileConfig::default();
    }

    match fs::read_to_string(&config_path).map(|content| serde_json::from_str::<FileConfig>(&content)) {
        Ok(Ok(config)) => config,
        Ok(Err(e)) => {
            log::warn!("解析配置文件 '{}' 失败，使用默认配置: {}", config_path.display(), e);
            FileConfig::default()
        }
        Err(e) => {
            log::warn!("读取配置文件 '{}' 失败，使用默认配置: {}", config_path.display(), e);
            FileConfig::default()
        }
    }
}
