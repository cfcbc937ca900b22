//! SQLite-backed keyword store for both filter lists.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection};

use super::{FilterError, KeywordKind, KeywordSource};

pub struct SqliteKeywordStore {
    conn: Mutex<Connection>,
}

impl SqliteKeywordStore {
    pub fn new(path: &Path) -> Result<Self, FilterError> {
        let conn = Connection::open(path).map_err(|e| FilterError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, FilterError> {
        let conn =
            Connection::open_in_memory().map_err(|e| FilterError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), FilterError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS filter_keywords (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                keyword TEXT NOT NULL,
                UNIQUE(kind, keyword)
            );
            "#,
        )
        .map_err(|e| FilterError::Database(e.to_string()))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, FilterError> {
        self.conn
            .lock()
            .map_err(|_| FilterError::Database("connection lock poisoned".to_string()))
    }

    /// Add a keyword to a list. Returns false if it was already present.
    pub fn add_keyword(&self, kind: KeywordKind, keyword: &str) -> Result<bool, FilterError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(FilterError::InvalidKeyword(
                "keyword cannot be empty".to_string(),
            ));
        }

        let conn = self.conn()?;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO filter_keywords (kind, keyword) VALUES (?1, ?2)",
                params![kind.as_str(), keyword],
            )
            .map_err(|e| FilterError::Database(e.to_string()))?;
        Ok(inserted > 0)
    }

    /// Returns true if the keyword was present.
    pub fn remove_keyword(&self, kind: KeywordKind, keyword: &str) -> Result<bool, FilterError> {
        let conn = self.conn()?;
        let deleted = conn
            .execute(
                "DELETE FROM filter_keywords WHERE kind = ?1 AND keyword = ?2",
                params![kind.as_str(), keyword.trim()],
            )
            .map_err(|e| FilterError::Database(e.to_string()))?;
        Ok(deleted > 0)
    }

    /// Keywords of one list in insertion order.
    pub fn list_keywords(&self, kind: KeywordKind) -> Result<Vec<String>, FilterError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT keyword FROM filter_keywords WHERE kind = ?1 ORDER BY id")
            .map_err(|e| FilterError::Database(e.to_string()))?;
        let rows = stmt
            .query_map(params![kind.as_str()], |row| row.get(0))
            .map_err(|e| FilterError::Database(e.to_string()))?;

        let mut keywords = Vec::new();
        for row in rows {
            keywords.push(row.map_err(|e| FilterError::Database(e.to_string()))?);
        }
        Ok(keywords)
    }
}

impl KeywordSource for SqliteKeywordStore {
    fn all_category_keywords(&self) -> Result<Vec<String>, FilterError> {
        self.list_keywords(KeywordKind::Category)
    }

    fn all_copyright_keywords(&self) -> Result<Vec<String>, FilterError> {
        self.list_keywords(KeywordKind::Copyright)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lists_are_independent() {
        let store = SqliteKeywordStore::in_memory().unwrap();
        store.add_keyword(KeywordKind::Category, "伦理").unwrap();
        store.add_keyword(KeywordKind::Copyright, "写真").unwrap();

        assert_eq!(store.all_category_keywords().unwrap(), vec!["伦理"]);
        assert_eq!(store.all_copyright_keywords().unwrap(), vec!["写真"]);
    }

    #[test]
    fn test_add_keyword_deduplicates() {
        let store = SqliteKeywordStore::in_memory().unwrap();
        assert!(store.add_keyword(KeywordKind::Copyright, "写真").unwrap());
        assert!(!store.add_keyword(KeywordKind::Copyright, " 写真 ").unwrap());
        assert_eq!(store.list_keywords(KeywordKind::Copyright).unwrap().len(), 1);
    }

    #[test]
    fn test_add_empty_keyword_fails() {
        let store = SqliteKeywordStore::in_memory().unwrap();
        let result = store.add_keyword(KeywordKind::Category, "   ");
        assert!(matches!(result, Err(FilterError::InvalidKeyword(_))));
    }

    #[test]
    fn test_remove_keyword() {
        let store = SqliteKeywordStore::in_memory().unwrap();
        store.add_keyword(KeywordKind::Category, "伦理").unwrap();
        store.add_keyword(KeywordKind::Category, "写真").unwrap();

        assert!(store.remove_keyword(KeywordKind::Category, "伦理").unwrap());
        assert!(!store.remove_keyword(KeywordKind::Copyright, "写真").unwrap());
        assert_eq!(store.all_category_keywords().unwrap(), vec!["写真"]);
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let store = SqliteKeywordStore::in_memory().unwrap();
        for kw in ["c", "a", "b"] {
            store.add_keyword(KeywordKind::Copyright, kw).unwrap();
        }
        assert_eq!(
            store.list_keywords(KeywordKind::Copyright).unwrap(),
            vec!["c", "a", "b"]
        );
    }
}
