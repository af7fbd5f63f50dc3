//! 图片文件清理子模块
//!
//! 删除记录后，若其 `image_path` 指向本应用生成的图片（图片目录下的 `img_*.png`）
//! 且已无其他记录引用，则一并删除磁盘文件。
//! 用户自己的图片文件（通过 `file:///` 引用入库的）永远不会被删除。

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, OptionalExtension, params};

use crate::clipboard::save::GENERATED_IMAGE_PREFIX;
use crate::error::AppError;

fn is_generated_image(images_dir: Option<&Path>, path: &Path) -> bool {
    let Some(images_dir) = images_dir else {
        return false;
    };
    if path.parent() != Some(images_dir) {
        return false;
    }

    let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();

    file_name.starts_with(GENERATED_IMAGE_PREFIX) && ext == "png"
}

fn remove_orphan_generated_image(conn: &Connection, path: &Path) -> Result<(), AppError> {
    let path_str = path.to_string_lossy().to_string();

    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM clipboard_history WHERE image_path = ?1",
            params![path_str],
            |row| row.get(0),
        )
        .map_err(|e| AppError::Database(format!("检查图片引用失败: {}", e)))?;

    if count == 0 {
        match fs::remove_file(path) {
            Ok(_) => log::debug!("🗑️ 已删除图片文件: {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(AppError::Storage(format!("删除图片文件失败 '{}': {}", path.display(), e)));
            }
        }
    }

    Ok(())
}

fn cleanup_generated_images(conn: &Connection, candidates: HashSet<PathBuf>) {
    for path in candidates {
        if let Err(err) = remove_orphan_generated_image(conn, &path) {
            log::warn!("{}", err);
        }
    }
}

fn collect_candidates(images_dir: Option<&Path>, paths: impl IntoIterator<Item = String>) -> HashSet<PathBuf> {
    paths
        .into_iter()
        .map(PathBuf::from)
        .filter(|path| is_generated_image(images_dir, path))
        .collect()
}

pub(super) fn delete_with_cleanup(conn: &Connection, images_dir: Option<&Path>, id: i64) -> Result<bool, AppError> {
    let image_path: Option<String> = conn
        .query_row(
            "SELECT image_path FROM clipboard_history WHERE id = ?1",
            params![id],
            |row| row.get::<_, Option<String>>(0),
        )
        .optional()
        .map_err(|e| AppError::Database(format!("查询待删除记录失败: {}", e)))?
        .flatten();

    let affected = conn
        .execute("DELETE FROM clipboard_history WHERE id = ?1", params![id])
        .map_err(|e| AppError::Database(format!("删除记录失败: {}", e)))?;

    if affected == 0 {
        return Ok(false);
    }

    cleanup_generated_images(conn, collect_candidates(images_dir, image_path));
    Ok(true)
}

pub(super) fn clear_non_favorites_with_cleanup(conn: &Connection, images_dir: Option<&Path>) -> Result<usize, AppError> {
    let mut stmt = conn
        .prepare("SELECT image_path FROM clipboard_history WHERE is_favorite = 0 AND image_path IS NOT NULL")
        .map_err(|e| AppError::Database(format!("准备清空查询失败: {}", e)))?;
    let paths = stmt
        .query_map([], |row| row.get::<_, String>(0))
        .map_err(|e| AppError::Database(format!("查询清空条目失败: {}", e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(format!("读取清空条目失败: {}", e)))?;

    let affected = conn
        .execute("DELETE FROM clipboard_history WHERE is_favorite = 0", [])
        .map_err(|e| AppError::Database(format!("清空记录失败: {}", e)))?;

    cleanup_generated_images(conn, collect_candidates(images_dir, paths));
    log::info!("🧹 已清除 {} 条未收藏记录", affected);
    Ok(affected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{SystemTime, UNIX_EPOCH};

    use crate::db::schema::initialize_schema;

    fn unique_temp_dir(prefix: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!("{}_{}", prefix, nanos));
        let _ = fs::create_dir_all(&dir);
        dir
    }

    fn setup_conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open in-memory sqlite failed");
        initialize_schema(&conn).expect("create schema");
        conn
    }

    fn insert_image(conn: &Connection, path: &Path, hash_seed: &str, favorite: bool) -> i64 {
        let hash = crate::clipboard::ContentFingerprint::of_text(hash_seed);
        conn.execute(
            "INSERT INTO clipboard_history (content_type, image_path, content_hash, category, is_favorite, created_at)
             VALUES ('image', ?1, ?2, 'image', ?3, 0)",
            params![path.to_string_lossy().to_string(), hash.as_str(), favorite as i64],
        )
        .expect("insert image row");
        conn.last_insert_rowid()
    }

    #[test]
    fn only_generated_files_inside_images_dir_qualify() {
        let dir = PathBuf::from("/data/images");
        assert!(is_generated_image(Some(&dir), &dir.join("img_20260101_abcdef12.png")));
        assert!(!is_generated_image(Some(&dir), &dir.join("holiday.png")));
        assert!(!is_generated_image(Some(&dir), Path::new("/elsewhere/img_1.png")));
        assert!(!is_generated_image(None, &dir.join("img_1.png")));
    }

    #[test]
    fn delete_removes_generated_file_but_not_user_file() {
        let dir = unique_temp_dir("clipcat_delete_cleanup");
        let generated = dir.join("img_20260101010101000_aaaaaaaa.png");
        let user_dir = unique_temp_dir("clipcat_user_files");
        let user_file = user_dir.join("holiday.png");
        fs::write(&generated, b"png").expect("create generated file");
        fs::write(&user_file, b"png").expect("create user file");

        let conn = setup_conn();
        let generated_id = insert_image(&conn, &generated, "g", false);
        let user_id = insert_image(&conn, &user_file, "u", false);

        assert!(delete_with_cleanup(&conn, Some(&dir), generated_id).expect("delete generated"));
        assert!(delete_with_cleanup(&conn, Some(&dir), user_id).expect("delete user"));
        assert!(!delete_with_cleanup(&conn, Some(&dir), user_id).expect("delete again"));

        assert!(!generated.exists(), "generated file should be removed");
        assert!(user_file.exists(), "user file must be kept");

        let _ = fs::remove_dir_all(&dir);
        let _ = fs::remove_dir_all(&user_dir);
    }

    #[test]
    fn clear_keeps_favorites_and_their_files() {
        let dir = unique_temp_dir("clipcat_clear_cleanup");
        let kept = dir.join("img_1_bbbbbbbb.png");
        let dropped = dir.join("img_2_cccccccc.png");
        fs::write(&kept, b"png").expect("create kept file");
        fs::write(&dropped, b"png").expect("create dropped file");

        let conn = setup_conn();
        insert_image(&conn, &kept, "kept", true);
        insert_image(&conn, &dropped, "dropped", false);

        assert_eq!(clear_non_favorites_with_cleanup(&conn, Some(&dir)).expect("clear"), 1);
        assert!(kept.exists());
        assert!(!dropped.exists());

        let remaining: i64 = conn
            .query_row("SELECT COUNT(*) FROM clipboard_history", [], |row| row.get(0))
            .expect("count");
        assert_eq!(remaining, 1);

        let _ = fs::remove_dir_all(&dir);
    }
}
