//! 键值设置子模块

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::AppError;

pub(super) fn get_setting(conn: &Connection, key: &str) -> Result<Option<String>, AppError> {
    conn.query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| {
        row.get::<_, Option<String>>(0)
    })
    .optional()
    .map(Option::flatten)
    .map_err(|e| AppError::Database(format!("读取设置 '{}' 失败: {}", key, e)))
}

pub(super) fn set_setting(conn: &Connection, key: &str, value: &str) -> Result<(), AppError> {
    conn.execute(
        "INSERT INTO settings (key, value) VALUES (?1, ?2)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        params![key, value],
    )
    .map_err(|e| AppError::Database(format!("保存设置 '{}' 失败: {}", key, e)))?;
    Ok(())
}
