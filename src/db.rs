//! 数据库模块
//!
//! # 设计思路
//!
//! 历史记录库：以内容指纹为唯一键的记录表，外加一张键值设置表。
//! 使用 `rusqlite` 直接操作 SQLite，所有 SQL 逻辑集中在本模块。
//!
//! - 记录只由采集流水线创建；之后只能切换收藏或删除。
//! - `content_hash` 列 UNIQUE：插入冲突被解释为"已存在"，不是错误。
//! - 连接放在 `Mutex` 中，采集线程与用户命令共用同一个连接。

use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::categorize::Category;
use crate::clipboard::ContentFingerprint;
use crate::error::AppError;

mod cleanup;
mod history;
mod schema;
mod settings;

// ============================================================================
// 数据模型
// ============================================================================

/// 记录的存储形态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Image => "image",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(ContentType::Text),
            "image" => Ok(ContentType::Image),
            other => Err(format!("未知内容类型: {}", other)),
        }
    }
}

/// 剪贴板历史条目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: i64,
    pub content_type: ContentType,
    /// 文本内容；图片记录可能保存原始引用（如 `file:///` URL）
    pub content: Option<String>,
    pub image_path: Option<String>,
    pub content_hash: ContentFingerprint,
    pub category: Category,
    pub is_favorite: bool,
    /// 插入时间（UTC 毫秒）
    pub created_at: i64,
}

/// 待插入的记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub content_type: ContentType,
    pub content: Option<String>,
    pub image_path: Option<String>,
    pub content_hash: ContentFingerprint,
    pub category: Category,
}

impl NewRecord {
    pub fn text(content: &str, content_hash: ContentFingerprint, category: Category) -> Self {
        Self {
            content_type: ContentType::Text,
            content: Some(content.to_string()),
            image_path: None,
            content_hash,
            category,
        }
    }

    pub fn image(content: Option<String>, image_path: String, content_hash: ContentFingerprint) -> Self {
        Self {
            content_type: ContentType::Image,
            content,
            image_path: Some(image_path),
            content_hash,
            category: Category::Image,
        }
    }
}

/// 插入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted(i64),
    /// 指纹已存在（含检查与插入之间的竞争）
    AlreadyExists,
}

/// 查询过滤条件
#[derive(Debug, Clone)]
pub struct HistoryFilter {
    pub category: Option<Category>,
    pub search_text: Option<String>,
    pub favorites_only: bool,
    pub limit: i64,
    pub offset: i64,
}

impl Default for HistoryFilter {
    fn default() -> Self {
        Self {
            category: None,
            search_text: None,
            favorites_only: false,
            limit: 100,
            offset: 0,
        }
    }
}

/// 应用统计信息
#[derive(Debug, Clone, Serialize)]
pub struct AppStats {
    pub total: i64,
    pub today: i64,
    pub favorites: i64,
}

// ============================================================================
// 数据库句柄
// ============================================================================

/// 历史记录库
pub struct HistoryDb {
    conn: Mutex<Connection>,
    /// 本应用生成图片所在目录；只有其中的 `img_*.png` 会在删除记录时被清理
    images_dir: Option<PathBuf>,
}

impl HistoryDb {
    /// 打开（必要时创建）数据库文件并初始化 Schema
    ///
    /// 失败意味着无法启动，调用方应直接中止。
    pub fn open(db_path: &Path, images_dir: Option<PathBuf>) -> Result<Self, AppError> {
        if let Some(parent) = db_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| AppError::Database(format!("创建数据库目录失败: {}", e)))?;
        }
        log::info!("数据库路径: {}", db_path.display());

        let conn = Connection::open(db_path)
            .map_err(|e| AppError::Database(format!("打开数据库失败: {}", e)))?;
        schema::initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            images_dir,
        })
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| AppError::Database(format!("打开内存数据库失败: {}", e)))?;
        schema::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            images_dir: None,
        })
    }

    pub fn with_images_dir(mut self, images_dir: PathBuf) -> Self {
        self.images_dir = Some(images_dir);
        self
    }

    fn with_conn<T>(&self, op: impl FnOnce(&Connection) -> Result<T, AppError>) -> Result<T, AppError> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| AppError::Database(format!("获取数据库锁失败: {}", e)))?;
        op(&conn)
    }

    pub fn insert(&self, record: &NewRecord) -> Result<InsertOutcome, AppError> {
        self.with_conn(|conn| history::insert(conn, record))
    }

    pub fn exists(&self, fingerprint: &ContentFingerprint) -> Result<bool, AppError> {
        self.with_conn(|conn| history::exists(conn, fingerprint))
    }

    pub fn query(&self, filter: &HistoryFilter) -> Result<Vec<HistoryRecord>, AppError> {
        self.with_conn(|conn| history::query(conn, filter))
    }

    pub fn get(&self, id: i64) -> Result<Option<HistoryRecord>, AppError> {
        self.with_conn(|conn| history::get(conn, id))
    }

    pub fn delete(&self, id: i64) -> Result<bool, AppError> {
        self.with_conn(|conn| cleanup::delete_with_cleanup(conn, self.images_dir.as_deref(), id))
    }

    pub fn toggle_favorite(&self, id: i64) -> Result<bool, AppError> {
        self.with_conn(|conn| history::toggle_favorite(conn, id))
    }

    /// 删除所有未收藏记录，返回删除条数
    pub fn clear_non_favorites(&self) -> Result<usize, AppError> {
        self.with_conn(|conn| cleanup::clear_non_favorites_with_cleanup(conn, self.images_dir.as_deref()))
    }

    pub fn category_counts(&self) -> Result<HashMap<Category, i64>, AppError> {
        self.with_conn(history::category_counts)
    }

    pub fn stats(&self) -> Result<AppStats, AppError> {
        self.with_conn(history::stats)
    }

    pub fn get_setting(&self, key: &str, default: &str) -> Result<String, AppError> {
        Ok(self
            .get_setting_opt(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    pub fn get_setting_opt(&self, key: &str) -> Result<Option<String>, AppError> {
        self.with_conn(|conn| settings::get_setting(conn, key))
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), AppError> {
        self.with_conn(|conn| settings::set_setting(conn, key, value))
    }
}
