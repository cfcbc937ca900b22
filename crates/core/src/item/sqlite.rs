//! SQLite-backed item store and load-stats tracker.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use rusqlite::functions::FunctionFlags;
use rusqlite::{params, Connection, OptionalExtension};

use super::{ItemStore, ItemStoreError, VodItem};
use crate::stats::{LoadStats, LoadStatsTracker};

const ITEM_COLUMNS: &str = "source_key, vod_id, vod_name, vod_sub, vod_en, vod_tag, vod_class, \
     type_name, vod_pic, vod_actor, vod_director, vod_blurb, vod_content, vod_remarks, \
     vod_pubdate, vod_total, vod_serial, vod_area, vod_lang, vod_year, vod_duration, vod_time, \
     vod_douban_id, vod_play_url, last_visited_at, avg_speed_ms, sample_count, failed_count";

pub struct SqliteItemStore {
    conn: Mutex<Connection>,
}

/// Timestamps are stored in one fixed-width UTC format so text comparison
/// orders them chronologically.
fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn escape_like(keyword: &str) -> String {
    let mut escaped = String::with_capacity(keyword.len() + 2);
    escaped.push('%');
    for c in keyword.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl SqliteItemStore {
    pub fn new(path: &Path) -> Result<Self, ItemStoreError> {
        let conn = Connection::open(path).map_err(|e| ItemStoreError::Database(e.to_string()))?;
        Self::register_functions(&conn)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, ItemStoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| ItemStoreError::Database(e.to_string()))?;
        Self::register_functions(&conn)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// `fold_case(text)`: Unicode lowercase. SQLite's own `LIKE` only folds ASCII.
    fn register_functions(conn: &Connection) -> Result<(), ItemStoreError> {
        conn.create_scalar_function(
            "fold_case",
            1,
            FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
            |ctx| {
                let text: Option<String> = ctx.get(0)?;
                Ok(text.map(|t| t.to_lowercase()))
            },
        )
        .map_err(|e| ItemStoreError::Database(e.to_string()))
    }

    fn initialize_schema(conn: &Connection) -> Result<(), ItemStoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS vod_items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_key TEXT NOT NULL,
                vod_id TEXT NOT NULL,
                vod_name TEXT NOT NULL DEFAULT '',
                vod_sub TEXT NOT NULL DEFAULT '',
                vod_en TEXT NOT NULL DEFAULT '',
                vod_tag TEXT NOT NULL DEFAULT '',
                vod_class TEXT NOT NULL DEFAULT '',
                type_name TEXT NOT NULL DEFAULT '',
                vod_pic TEXT NOT NULL DEFAULT '',
                vod_actor TEXT NOT NULL DEFAULT '',
                vod_director TEXT NOT NULL DEFAULT '',
                vod_blurb TEXT NOT NULL DEFAULT '',
                vod_content TEXT NOT NULL DEFAULT '',
                vod_remarks TEXT NOT NULL DEFAULT '',
                vod_pubdate TEXT NOT NULL DEFAULT '',
                vod_total TEXT NOT NULL DEFAULT '',
                vod_serial TEXT NOT NULL DEFAULT '',
                vod_area TEXT NOT NULL DEFAULT '',
                vod_lang TEXT NOT NULL DEFAULT '',
                vod_year TEXT NOT NULL DEFAULT '',
                vod_duration TEXT NOT NULL DEFAULT '',
                vod_time TEXT NOT NULL DEFAULT '',
                vod_douban_id TEXT NOT NULL DEFAULT '',
                vod_play_url TEXT NOT NULL DEFAULT '',
                last_visited_at TEXT NOT NULL,
                avg_speed_ms REAL NOT NULL DEFAULT 0,
                sample_count INTEGER NOT NULL DEFAULT 0,
                failed_count INTEGER NOT NULL DEFAULT 0,
                UNIQUE(source_key, vod_id)
            );

            CREATE INDEX IF NOT EXISTS idx_vod_items_last_visited ON vod_items(last_visited_at);
            CREATE INDEX IF NOT EXISTS idx_vod_items_name ON vod_items(vod_name);
            "#,
        )
        .map_err(|e| ItemStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ItemStoreError> {
        self.conn
            .lock()
            .map_err(|_| ItemStoreError::Internal("connection lock poisoned".to_string()))
    }

    fn row_to_item(row: &rusqlite::Row) -> rusqlite::Result<VodItem> {
        let last_visited_str: String = row.get(24)?;
        let last_visited_at = DateTime::parse_from_rfc3339(&last_visited_str)
            .map(|dt| dt.with_timezone(&Utc))
            .ok();

        Ok(VodItem {
            source_key: row.get(0)?,
            vod_id: row.get(1)?,
            vod_name: row.get(2)?,
            vod_sub: row.get(3)?,
            vod_en: row.get(4)?,
            vod_tag: row.get(5)?,
            vod_class: row.get(6)?,
            type_name: row.get(7)?,
            vod_pic: row.get(8)?,
            vod_actor: row.get(9)?,
            vod_director: row.get(10)?,
            vod_blurb: row.get(11)?,
            vod_content: row.get(12)?,
            vod_remarks: row.get(13)?,
            vod_pubdate: row.get(14)?,
            vod_total: row.get(15)?,
            vod_serial: row.get(16)?,
            vod_area: row.get(17)?,
            vod_lang: row.get(18)?,
            vod_year: row.get(19)?,
            vod_duration: row.get(20)?,
            vod_time: row.get(21)?,
            vod_douban_id: row.get(22)?,
            vod_play_url: row.get(23)?,
            last_visited_at,
            avg_speed_ms: row.get(25)?,
            sample_count: row.get(26)?,
            failed_count: row.get(27)?,
        })
    }

    fn not_found(source_key: &str, vod_id: &str) -> ItemStoreError {
        ItemStoreError::NotFound(VodItem::detail_key(source_key, vod_id))
    }

    #[cfg(test)]
    pub(crate) fn set_last_visited(&self, source_key: &str, vod_id: &str, at: DateTime<Utc>) {
        let conn = self.conn().unwrap();
        conn.execute(
            "UPDATE vod_items SET last_visited_at = ?3 WHERE source_key = ?1 AND vod_id = ?2",
            params![source_key, vod_id, format_timestamp(at)],
        )
        .unwrap();
    }
}

impl ItemStore for SqliteItemStore {
    fn upsert(&self, item: &VodItem) -> Result<(), ItemStoreError> {
        let conn = self.conn()?;
        let now = format_timestamp(Utc::now());

        conn.execute(
            r#"
            INSERT INTO vod_items (
                source_key, vod_id, vod_name, vod_sub, vod_en, vod_tag, vod_class, type_name,
                vod_pic, vod_actor, vod_director, vod_blurb, vod_content, vod_remarks,
                vod_pubdate, vod_total, vod_serial, vod_area, vod_lang, vod_year, vod_duration,
                vod_time, vod_douban_id, vod_play_url, last_visited_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                ?18, ?19, ?20, ?21, ?22, ?23, ?24, ?25
            )
            ON CONFLICT(source_key, vod_id) DO UPDATE SET
                vod_name = excluded.vod_name,
                vod_sub = excluded.vod_sub,
                vod_remarks = excluded.vod_remarks,
                vod_time = excluded.vod_time,
                vod_play_url = excluded.vod_play_url,
                last_visited_at = excluded.last_visited_at
            "#,
            params![
                item.source_key,
                item.vod_id,
                item.vod_name,
                item.vod_sub,
                item.vod_en,
                item.vod_tag,
                item.vod_class,
                item.type_name,
                item.vod_pic,
                item.vod_actor,
                item.vod_director,
                item.vod_blurb,
                item.vod_content,
                item.vod_remarks,
                item.vod_pubdate,
                item.vod_total,
                item.vod_serial,
                item.vod_area,
                item.vod_lang,
                item.vod_year,
                item.vod_duration,
                item.vod_time,
                item.vod_douban_id,
                item.vod_play_url,
                now,
            ],
        )
        .map_err(|e| ItemStoreError::Database(e.to_string()))?;

        Ok(())
    }

    fn search(&self, keyword: &str) -> Result<Vec<VodItem>, ItemStoreError> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM vod_items
             WHERE fold_case(vod_name) LIKE ?1 ESCAPE '\\'
                OR fold_case(vod_sub) LIKE ?1 ESCAPE '\\'
                OR fold_case(vod_en) LIKE ?1 ESCAPE '\\'
             ORDER BY last_visited_at DESC, id DESC",
            ITEM_COLUMNS
        );
        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| ItemStoreError::Database(e.to_string()))?;

        let rows = stmt
            .query_map(
                params![escape_like(&keyword.to_lowercase())],
                Self::row_to_item,
            )
            .map_err(|e| ItemStoreError::Database(e.to_string()))?;

        let mut items = Vec::new();
        for row in rows {
            items.push(row.map_err(|e| ItemStoreError::Database(e.to_string()))?);
        }
        Ok(items)
    }

    fn find_by_composite_key(
        &self,
        source_key: &str,
        vod_id: &str,
    ) -> Result<Option<VodItem>, ItemStoreError> {
        let conn = self.conn()?;

        let touched = conn
            .execute(
                "UPDATE vod_items SET last_visited_at = ?3 WHERE source_key = ?1 AND vod_id = ?2",
                params![source_key, vod_id, format_timestamp(Utc::now())],
            )
            .map_err(|e| ItemStoreError::Database(e.to_string()))?;
        if touched == 0 {
            return Ok(None);
        }

        let sql = format!(
            "SELECT {} FROM vod_items WHERE source_key = ?1 AND vod_id = ?2",
            ITEM_COLUMNS
        );
        conn.query_row(&sql, params![source_key, vod_id], Self::row_to_item)
            .optional()
            .map_err(|e| ItemStoreError::Database(e.to_string()))
    }

    fn delete_inactive(&self, days: u32) -> Result<usize, ItemStoreError> {
        // No row predates a cutoff outside chrono's range.
        let Some(cutoff) =
            Duration::try_days(i64::from(days)).and_then(|age| Utc::now().checked_sub_signed(age))
        else {
            return Ok(0);
        };
        let conn = self.conn()?;
        conn.execute(
            "DELETE FROM vod_items WHERE last_visited_at < ?1",
            params![format_timestamp(cutoff)],
        )
        .map_err(|e| ItemStoreError::Database(e.to_string()))
    }

    fn count(&self) -> Result<u64, ItemStoreError> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM vod_items", [], |row| row.get(0))
            .map_err(|e| ItemStoreError::Database(e.to_string()))?;
        Ok(count as u64)
    }
}

impl LoadStatsTracker for SqliteItemStore {
    fn report_success(
        &self,
        source_key: &str,
        vod_id: &str,
        latency_ms: f64,
    ) -> Result<(), ItemStoreError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE vod_items
                 SET avg_speed_ms = (avg_speed_ms * sample_count + ?3) / (sample_count + 1),
                     sample_count = sample_count + 1
                 WHERE source_key = ?1 AND vod_id = ?2",
                params![source_key, vod_id, latency_ms],
            )
            .map_err(|e| ItemStoreError::Database(e.to_string()))?;
        if updated == 0 {
            return Err(Self::not_found(source_key, vod_id));
        }
        Ok(())
    }

    fn report_failure(&self, source_key: &str, vod_id: &str) -> Result<(), ItemStoreError> {
        let conn = self.conn()?;
        let updated = conn
            .execute(
                "UPDATE vod_items SET failed_count = failed_count + 1
                 WHERE source_key = ?1 AND vod_id = ?2",
                params![source_key, vod_id],
            )
            .map_err(|e| ItemStoreError::Database(e.to_string()))?;
        if updated == 0 {
            return Err(Self::not_found(source_key, vod_id));
        }
        Ok(())
    }

    fn load_stats(&self, source_key: &str, vod_id: &str) -> Result<LoadStats, ItemStoreError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT avg_speed_ms, sample_count, failed_count FROM vod_items
             WHERE source_key = ?1 AND vod_id = ?2",
            params![source_key, vod_id],
            |row| Ok(LoadStats::new(row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()
        .map_err(|e| ItemStoreError::Database(e.to_string()))?
        .ok_or_else(|| Self::not_found(source_key, vod_id))
    }
}
