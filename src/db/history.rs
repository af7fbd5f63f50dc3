use std::collections::HashMap;
use std::str::FromStr;

use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::categorize::Category;
use crate::clipboard::ContentFingerprint;
use crate::error::AppError;

use super::{AppStats, HistoryFilter, HistoryRecord, InsertOutcome, NewRecord};

pub(super) const RECORD_COLUMNS: &str =
    "id, content_type, content, image_path, content_hash, category, is_favorite, created_at";

fn parse_column<T: FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse::<T>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, e.into()))
}

pub(super) fn map_record(row: &Row<'_>) -> rusqlite::Result<HistoryRecord> {
    let hash: String = row.get(4)?;
    let content_hash = ContentFingerprint::from_hex(hash)
        .ok_or_else(|| rusqlite::Error::FromSqlConversionFailure(4, Type::Text, "无效的内容指纹".into()))?;

    Ok(HistoryRecord {
        id: row.get(0)?,
        content_type: parse_column(row, 1)?,
        content: row.get(2)?,
        image_path: row.get(3)?,
        content_hash,
        category: parse_column(row, 5)?,
        is_favorite: row.get::<_, i64>(6)? != 0,
        created_at: row.get(7)?,
    })
}

pub(super) fn insert(conn: &Connection, record: &NewRecord) -> Result<InsertOutcome, AppError> {
    let now = chrono::Utc::now().timestamp_millis();
    let result = conn.execute(
        "INSERT INTO clipboard_history (content_type, content, image_path, content_hash, category, is_favorite, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, 0, ?6)",
        params![
            record.content_type.as_str(),
            record.content,
            record.image_path,
            record.content_hash.as_str(),
            record.category.as_str(),
            now,
        ],
    );

    match result {
        Ok(_) => Ok(InsertOutcome::Inserted(conn.last_insert_rowid())),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            log::debug!("指纹 {} 已存在，跳过插入", record.content_hash.short());
            Ok(InsertOutcome::AlreadyExists)
        }
        Err(e) => Err(AppError::Database(format!("插入记录失败: {}", e))),
    }
}

pub(super) fn exists(conn: &Connection, fingerprint: &ContentFingerprint) -> Result<bool, AppError> {
    conn.query_row(
        "SELECT 1 FROM clipboard_history WHERE content_hash = ?1",
        params![fingerprint.as_str()],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
    .map_err(|e| AppError::Database(format!("查询指纹失败: {}", e)))
}

pub(super) fn query(conn: &Connection, filter: &HistoryFilter) -> Result<Vec<HistoryRecord>, AppError> {
    let mut sql = format!("SELECT {} FROM clipboard_history WHERE 1=1", RECORD_COLUMNS);
    let mut values: Vec<Value> = Vec::new();

    if let Some(category) = filter.category {
        sql.push_str(" AND category = ?");
        values.push(Value::Text(category.as_str().to_string()));
    }

    if let Some(search) = filter.search_text.as_deref().filter(|s| !s.is_empty()) {
        sql.push_str(" AND content LIKE ?");
        values.push(Value::Text(format!("%{}%", search)));
    }

    if filter.favorites_only {
        sql.push_str(" AND is_favorite = 1");
    }

    sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?");
    values.push(Value::Integer(filter.limit.max(0)));
    values.push(Value::Integer(filter.offset.max(0)));

    let mut stmt = conn
        .prepare(&sql)
        .map_err(|e| AppError::Database(format!("准备查询失败: {}", e)))?;

    let records = stmt
        .query_map(params_from_iter(values), map_record)
        .map_err(|e| AppError::Database(format!("查询历史失败: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(format!("读取行失败: {}", e)))?;

    Ok(records)
}

pub(super) fn get(conn: &Connection, id: i64) -> Result<Option<HistoryRecord>, AppError> {
    conn.query_row(
        &format!("SELECT {} FROM clipboard_history WHERE id = ?1", RECORD_COLUMNS),
        params![id],
        map_record,
    )
    .optional()
    .map_err(|e| AppError::Database(format!("查询记录失败: {}", e)))
}

pub(super) fn toggle_favorite(conn: &Connection, id: i64) -> Result<bool, AppError> {
    let affected = conn
        .execute(
            "UPDATE clipboard_history SET is_favorite = CASE WHEN is_favorite = 0 THEN 1 ELSE 0 END WHERE id = ?1",
            params![id],
        )
        .map_err(|e| AppError::Database(format!("切换收藏失败: {}", e)))?;
    Ok(affected > 0)
}

pub(super) fn category_counts(conn: &Connection) -> Result<HashMap<Category, i64>, AppError> {
    let mut stmt = conn
        .prepare("SELECT category, COUNT(*) FROM clipboard_history GROUP BY category")
        .map_err(|e| AppError::Database(format!("准备分类统计失败: {}", e)))?;

    let rows = stmt
        .query_map([], |row| Ok((parse_column::<Category>(row, 0)?, row.get::<_, i64>(1)?)))
        .map_err(|e| AppError::Database(format!("查询分类统计失败: {}", e)))?;

    let mut counts = HashMap::new();
    for row in rows {
        let (category, count) = row.map_err(|e| AppError::Database(format!("读取分类统计失败: {}", e)))?;
        counts.insert(category, count);
    }
    Ok(counts)
}

pub(super) fn stats(conn: &Connection) -> Result<AppStats, AppError> {
    let total: i64 = conn
        .query_row("SELECT COUNT(*) FROM clipboard_history", [], |row| row.get(0))
        .map_err(|e| AppError::Database(format!("查询总数失败: {}", e)))?;

    let start_of_day = chrono::Local::now()
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .and_then(|midnight| midnight.and_local_timezone(chrono::Local).earliest())
        .map(|midnight| midnight.timestamp_millis())
        .unwrap_or(0);

    let today: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM clipboard_history WHERE created_at >= ?1",
            params![start_of_day],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Database(format!("查询今日数失败: {}", e)))?;

    let favorites: i64 = conn
        .query_row("SELECT COUNT(*) FROM clipboard_history WHERE is_favorite = 1", [], |row| row.get(0))
        .map_err(|e| AppError::Database(format!("查询收藏数失败: {}", e)))?;

    Ok(AppStats { total, today, favorites })
}
