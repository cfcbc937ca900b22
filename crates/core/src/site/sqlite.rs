//! SQLite-backed site registry.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use super::{Site, SiteError, SiteRegistry};

pub struct SqliteSiteRegistry {
    conn: Mutex<Connection>,
}

impl SqliteSiteRegistry {
    pub fn new(path: &Path) -> Result<Self, SiteError> {
        let conn = Connection::open(path).map_err(|e| SiteError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, SiteError> {
        let conn = Connection::open_in_memory().map_err(|e| SiteError::Database(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), SiteError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS sites (
                key TEXT PRIMARY KEY,
                base_url TEXT NOT NULL,
                enabled INTEGER NOT NULL DEFAULT 1
            );
            "#,
        )
        .map_err(|e| SiteError::Database(e.to_string()))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, SiteError> {
        self.conn
            .lock()
            .map_err(|_| SiteError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_site(row: &rusqlite::Row) -> rusqlite::Result<Site> {
        Ok(Site {
            key: row.get(0)?,
            base_url: row.get(1)?,
            enabled: row.get::<_, i64>(2)? != 0,
        })
    }

    fn query_sites(conn: &Connection, sql: &str) -> Result<Vec<Site>, SiteError> {
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| SiteError::Database(e.to_string()))?;
        let rows = stmt
            .query_map([], Self::row_to_site)
            .map_err(|e| SiteError::Database(e.to_string()))?;

        let mut sites = Vec::new();
        for row in rows {
            sites.push(row.map_err(|e| SiteError::Database(e.to_string()))?);
        }
        Ok(sites)
    }

    /// Insert a site or replace the base URL and enabled flag of an existing one.
    pub fn upsert_site(&self, site: &Site) -> Result<(), SiteError> {
        if site.key.trim().is_empty() {
            return Err(SiteError::Invalid("site key cannot be empty".to_string()));
        }
        if site.base_url.trim().is_empty() {
            return Err(SiteError::Invalid(format!(
                "site {} has an empty base_url",
                site.key
            )));
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO sites (key, base_url, enabled) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET base_url = excluded.base_url, enabled = excluded.enabled",
            params![site.key, site.base_url, site.enabled as i64],
        )
        .map_err(|e| SiteError::Database(e.to_string()))?;
        Ok(())
    }

    pub fn set_enabled(&self, key: &str, enabled: bool) -> Result<(), SiteError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE sites SET enabled = ?2 WHERE key = ?1",
                params![key, enabled as i64],
            )
            .map_err(|e| SiteError::Database(e.to_string()))?;
        if updated == 0 {
            return Err(SiteError::NotFound(key.to_string()));
        }
        Ok(())
    }

    /// Returns true if a site was removed.
    pub fn remove_site(&self, key: &str) -> Result<bool, SiteError> {
        let conn = self.conn()?;
        let deleted = conn
            .execute("DELETE FROM sites WHERE key = ?1", params![key])
            .map_err(|e| SiteError::Database(e.to_string()))?;
        Ok(deleted > 0)
    }

    pub fn list_all(&self) -> Result<Vec<Site>, SiteError> {
        let conn = self.conn()?;
        Self::query_sites(&conn, "SELECT key, base_url, enabled FROM sites ORDER BY key")
    }
}

impl SiteRegistry for SqliteSiteRegistry {
    fn list_enabled(&self) -> Result<Vec<Site>, SiteError> {
        let conn = self.conn()?;
        Self::query_sites(
            &conn,
            "SELECT key, base_url, enabled FROM sites WHERE enabled = 1 ORDER BY key",
        )
    }

    fn find_by_key(&self, key: &str) -> Result<Option<Site>, SiteError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT key, base_url, enabled FROM sites WHERE key = ?1",
            params![key],
            Self::row_to_site,
        )
        .optional()
        .map_err(|e| SiteError::Database(e.to_string()))
    }
}
