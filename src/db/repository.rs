use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::error::AppError;

/// DBから取得した履歴エントリ
#[derive(Debug, Clone)]
pub struct Entry {
    pub id: i64,
    pub recognized_text: String,
    pub translated_text: Option<String>,
    pub source_language: String,
    pub target_language: Option<String>,
    pub voice: Option<String>,
    pub created_at: String,
}

/// 新規保存用の入力データ
#[derive(Debug, Clone, Default)]
pub struct NewEntry {
    pub recognized_text: String,
    pub translated_text: Option<String>,
    pub source_language: String,
    pub target_language: Option<String>,
    pub voice: Option<String>,
}

const SELECT_COLUMNS: &str = "SELECT id, recognized_text, translated_text, source_language, \
     target_language, voice, created_at FROM entries";

fn entry_from_row(row: &Row<'_>) -> rusqlite::Result<Entry> {
    Ok(Entry {
        id: row.get(0)?,
        recognized_text: row.get(1)?,
        translated_text: row.get(2)?,
        source_language: row.get(3)?,
        target_language: row.get(4)?,
        voice: row.get(5)?,
        created_at: row.get(6)?,
    })
}

/// エントリを保存し、挿入されたIDを返す
pub fn insert_entry(conn: &Connection, entry: &NewEntry) -> Result<i64, AppError> {
    conn.execute(
        "INSERT INTO entries (recognized_text, translated_text, source_language, target_language, voice)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.recognized_text,
            entry.translated_text,
            entry.source_language,
            entry.target_language,
            entry.voice,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// エントリ一覧を取得（新しい順、limit/offset対応）
pub fn get_entries(conn: &Connection, limit: u32, offset: u32) -> Result<Vec<Entry>, AppError> {
    let mut stmt = conn.prepare(&format!(
        "{} ORDER BY created_at DESC, id DESC LIMIT ?1 OFFSET ?2",
        SELECT_COLUMNS
    ))?;

    let entries = stmt
        .query_map(params![limit, offset], entry_from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(entries)
}

/// IDでエントリを1件取得
pub fn get_entry(conn: &Connection, id: i64) -> Result<Option<Entry>, AppError> {
    let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", SELECT_COLUMNS))?;
    let entry = stmt.query_row(params![id], entry_from_row).optional()?;
    Ok(entry)
}

/// エントリを削除し、削除されたかを返す
pub fn delete_entry(conn: &Connection, id: i64) -> Result<bool, AppError> {
    let affected = conn.execute("DELETE FROM entries WHERE id = ?1", params![id])?;
    Ok(affected > 0)
}

/// 指定日数より古いエントリを削除し、削除件数を返す
pub fn delete_old_entries(conn: &Connection, days: u32) -> Result<usize, AppError> {
    let affected = conn.execute(
        "DELETE FROM entries WHERE created_at < strftime('%Y-%m-%dT%H:%M:%fZ', 'now', ?1)",
        params![format!("-{} days", days)],
    )?;
    Ok(affected)
}

/// 全エントリを削除し、削除件数を返す
pub fn clear_entries(conn: &Connection) -> Result<usize, AppError> {
    let affected = conn.execute("DELETE FROM entries", [])?;
    Ok(affected)
}

pub fn count_entries(conn: &Connection) -> Result<u64, AppError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
    Ok(count.max(0) as u64)
}
