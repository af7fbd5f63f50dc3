//! Schema 初始化子模块
//!
//! ## 职责
//! - 创建历史表、设置表与索引
//! - 设置 SQLite 运行参数（WAL）
//! - 通过 `PRAGMA user_version` 记录 Schema 版本
//!
//! ## 错误语义
//! - DDL 失败统一映射为 `AppError::Database`

use rusqlite::Connection;

use crate::error::AppError;

const SCHEMA_VERSION: i64 = 1;

fn get_user_version(conn: &Connection) -> Result<i64, AppError> {
    conn.query_row("PRAGMA user_version", [], |row| row.get(0))
        .map_err(|e| AppError::Database(format!("读取数据库版本失败: {}", e)))
}

fn set_user_version(conn: &Connection, version: i64) -> Result<(), AppError> {
    conn.execute_batch(&format!("PRAGMA user_version = {version};"))
        .map_err(|e| AppError::Database(format!("写入数据库版本失败: {}", e)))
}

fn create_base_tables(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS clipboard_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            content_type TEXT NOT NULL CHECK (content_type IN ('text', 'image')),
            content TEXT,
            image_path TEXT,
            content_hash TEXT NOT NULL UNIQUE,
            category TEXT NOT NULL,
            is_favorite INTEGER NOT NULL DEFAULT 0 CHECK (is_favorite IN (0, 1)),
            created_at INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT
        );"
    ).map_err(|e| AppError::Database(format!("创建基础表失败: {}", e)))?;

    conn.execute_batch(
        "CREATE INDEX IF NOT EXISTS idx_history_category ON clipboard_history(category);
         CREATE INDEX IF NOT EXISTS idx_history_created_at ON clipboard_history(created_at DESC);
         CREATE INDEX IF NOT EXISTS idx_history_favorite ON clipboard_history(is_favorite);
         CREATE INDEX IF NOT EXISTS idx_history_image_path ON clipboard_history(image_path);"
    ).map_err(|e| AppError::Database(format!("创建历史索引失败: {}", e)))
}

pub(super) fn initialize_schema(conn: &Connection) -> Result<(), AppError> {
    conn.execute_batch("PRAGMA journal_mode=WAL;").ok();

    create_base_tables(conn)?;

    let mut version = get_user_version(conn)?;
    if version < 1 {
        set_user_version(conn, 1)?;
        version = 1;
    }

    if version != SCHEMA_VERSION {
        return Err(AppError::Database(format!(
            "数据库版本不匹配: current={}, expected={}",
            version, SCHEMA_VERSION
        )));
    }

    Ok(())
}
