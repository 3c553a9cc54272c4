pub mod repository;
pub mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;

use crate::error::AppError;
use repository::{Entry, NewEntry};

/// 認識・翻訳履歴の保存先
///
/// ループのワーカースレッドと CLI から共有するため Mutex で排他制御する。
pub struct HistoryStore {
    conn: Mutex<Connection>,
}

impl HistoryStore {
    /// 指定パスにDBファイルを作成（または開く）し、WALモード有効化 + スキーマ初期化
    pub fn open(db_path: &Path) -> Result<Self, AppError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        schema::migrate(&mut conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self, AppError> {
        let mut conn = Connection::open_in_memory()?;
        schema::migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, AppError> {
        self.conn
            .lock()
            .map_err(|e| AppError::Database(format!("Failed to lock DB: {}", e)))
    }

    pub fn record(&self, entry: &NewEntry) -> Result<i64, AppError> {
        repository::insert_entry(&*self.lock()?, entry)
    }

    pub fn recent(&self, limit: u32, offset: u32) -> Result<Vec<Entry>, AppError> {
        repository::get_entries(&*self.lock()?, limit, offset)
    }

    pub fn get(&self, id: i64) -> Result<Option<Entry>, AppError> {
        repository::get_entry(&*self.lock()?, id)
    }

    pub fn delete(&self, id: i64) -> Result<bool, AppError> {
        repository::delete_entry(&*self.lock()?, id)
    }

    pub fn prune_older_than(&self, days: u32) -> Result<usize, AppError> {
        repository::delete_old_entries(&*self.lock()?, days)
    }

    pub fn clear(&self) -> Result<usize, AppError> {
        repository::clear_entries(&*self.lock()?)
    }

    pub fn count(&self) -> Result<u64, AppError> {
        repository::count_entries(&*self.lock()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_roundtrip() {
        let store = HistoryStore::open_in_memory().unwrap();
        let id = store
            .record(&NewEntry {
                recognized_text: "谢谢".to_string(),
                source_language: "zh-CN".to_string(),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(store.get(id).unwrap().unwrap().recognized_text, "谢谢");
        assert!(store.delete(id).unwrap());
        assert!(store.recent(10, 0).unwrap().is_empty());
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = std::env::temp_dir().join(format!("voice-translate-test-{}", std::process::id()));
        let path = dir.join("nested").join("history.db");

        let store = HistoryStore::open(&path).unwrap();
        assert_eq!(store.count().unwrap(), 0);
        drop(store);

        assert!(path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
