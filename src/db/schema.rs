use rusqlite::Connection;

use crate::error::AppError;

/// 順番に適用するマイグレーション（`user_version` = 適用済みの数）
///
/// 認識のみのツールの履歴も同じテーブルに入るので、訳文・翻訳先言語・音声は NULL 可。
const MIGRATIONS: &[&str] = &["CREATE TABLE IF NOT EXISTS entries (
        id               INTEGER PRIMARY KEY AUTOINCREMENT,
        recognized_text  TEXT NOT NULL,
        translated_text  TEXT,
        source_language  TEXT NOT NULL,
        target_language  TEXT,
        voice            TEXT,
        created_at       TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
    );
    CREATE INDEX IF NOT EXISTS idx_entries_created_at ON entries(created_at);"];

pub fn schema_version(conn: &Connection) -> Result<usize, AppError> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(usize::try_from(version).unwrap_or(0))
}

/// 未適用のマイグレーションを1トランザクションで適用する
pub fn migrate(conn: &mut Connection) -> Result<(), AppError> {
    let applied = schema_version(conn)?;
    if applied >= MIGRATIONS.len() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for sql in &MIGRATIONS[applied..] {
        tx.execute_batch(sql)?;
    }
    tx.pragma_update(None, "user_version", MIGRATIONS.len() as i64)?;
    tx.commit()?;
    Ok(())
}
