//! HTML Cache: a persistent, expiring key-value store over normalized URLs,
//! backed by SQLite with an in-memory LRU front for hot lookups.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use tokio::sync::RwLock;

use crate::config::CacheConfig;
use crate::error::Result;

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    url TEXT PRIMARY KEY,
    final_url TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers_json TEXT NOT NULL,
    text TEXT NOT NULL,
    content_type TEXT NOT NULL,
    stored_at INTEGER NOT NULL,
    bytes INTEGER NOT NULL
);
"#;

/// A single stored response. Headers and `content_type` are always
/// lowercased on write, per contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub final_url: String,
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub text: String,
    pub content_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub item_count: i64,
    pub bytes_on_disk: i64,
    pub directory: PathBuf,
}

enum Backend {
    Disabled,
    Enabled {
        pool: SqlitePool,
        dir: PathBuf,
        expire_seconds: u64,
        store_errors: bool,
        hot: Arc<RwLock<lru::LruCache<String, Option<CacheEntry>>>>,
    },
}

/// A scoped cache handle. Held for the duration of one crawl (or one CLI
/// invocation); `close` releases the underlying connection pool.
pub struct HtmlCache {
    backend: Backend,
}

impl HtmlCache {
    /// Opens (creating if necessary) the cache at `cfg.directory`, or the
    /// OS-conventional per-app cache directory when `cfg.directory` is
    /// `None`. A disabled cache (`cfg.enabled == false`) opens no database
    /// and every operation becomes a no-op.
    pub async fn open(cfg: &CacheConfig) -> Result<Self> {
        if !cfg.enabled {
            return Ok(Self {
                backend: Backend::Disabled,
            });
        }

        let dir = match &cfg.directory {
            Some(d) => d.clone(),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("webvouch"),
        };
        tokio::fs::create_dir_all(&dir).await?;

        let db_path = dir.join("html_cache.sqlite");
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(std::time::Duration::from_secs(30));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        sqlx::query(SCHEMA_SQL).execute(&pool).await?;

        let hot = Arc::new(RwLock::new(lru::LruCache::new(
            NonZeroUsize::new(1000).expect("1000 is nonzero"),
        )));

        Ok(Self {
            backend: Backend::Enabled {
                pool,
                dir,
                expire_seconds: cfg.expire_seconds,
                store_errors: cfg.store_errors,
                hot,
            },
        })
    }

    /// Returns the stored entry for `normalized_url` if present, unexpired,
    /// `status == 200`, and `content_type` contains `text/html`. Any other
    /// condition — miss, expiry, wrong status/type, or a disabled cache —
    /// yields `None`.
    pub async fn get(&self, normalized_url: &str) -> Result<Option<CacheEntry>> {
        let Backend::Enabled { pool, expire_seconds, hot, .. } = &self.backend else {
            return Ok(None);
        };

        if let Some(cached) = hot.read().await.peek(normalized_url) {
            return Ok(cached.clone());
        }

        let row = sqlx::query(
            "SELECT final_url, status, headers_json, text, content_type, stored_at \
             FROM cache_entries WHERE url = ?",
        )
        .bind(normalized_url)
        .fetch_optional(pool)
        .await?;

        let Some(row) = row else {
            hot.write().await.put(normalized_url.to_string(), None);
            return Ok(None);
        };

        let stored_at: i64 = row.get("stored_at");
        let age = chrono::Utc::now().timestamp() - stored_at;
        let status: i64 = row.get("status");
        let content_type: String = row.get("content_type");

        let expired = age < 0 || age as u64 > *expire_seconds;
        let gating_ok = status == 200 && content_type.contains("text/html");

        let result = if expired || !gating_ok {
            None
        } else {
            let headers_json: String = row.get("headers_json");
            Some(CacheEntry {
                final_url: row.get("final_url"),
                status: status as u16,
                headers: serde_json::from_str(&headers_json).unwrap_or_default(),
                text: row.get("text"),
                content_type,
            })
        };

        hot.write().await.put(normalized_url.to_string(), result.clone());
        Ok(result)
    }

    /// Stores `entry` under `normalized_url` if the gating predicates hold
    /// (`status == 200` and `content_type` contains `text/html`), unless
    /// `store_errors` is configured, in which case any status is stored.
    /// Headers and content type are lowercased before storage. A no-op on a
    /// disabled cache.
    pub async fn set_html_ok(&self, normalized_url: &str, entry: &CacheEntry) -> Result<()> {
        let Backend::Enabled { pool, store_errors, hot, .. } = &self.backend else {
            return Ok(());
        };

        let gating_ok = entry.status == 200 && entry.content_type.contains("text/html");
        if !gating_ok && !store_errors {
            return Ok(());
        }

        let lower_headers: HashMap<String, String> = entry
            .headers
            .iter()
            .map(|(k, v)| (k.to_ascii_lowercase(), v.clone()))
            .collect();
        let lower_entry = CacheEntry {
            final_url: entry.final_url.clone(),
            status: entry.status,
            headers: lower_headers,
            text: entry.text.clone(),
            content_type: entry.content_type.to_ascii_lowercase(),
        };

        let headers_json = serde_json::to_string(&lower_entry.headers).unwrap_or_default();
        let now = chrono::Utc::now().timestamp();
        let bytes = lower_entry.text.len() as i64;

        sqlx::query(
            "INSERT INTO cache_entries (url, final_url, status, headers_json, text, content_type, stored_at, bytes) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(url) DO UPDATE SET \
                final_url = excluded.final_url, \
                status = excluded.status, \
                headers_json = excluded.headers_json, \
                text = excluded.text, \
                content_type = excluded.content_type, \
                stored_at = excluded.stored_at, \
                bytes = excluded.bytes",
        )
        .bind(normalized_url)
        .bind(&lower_entry.final_url)
        .bind(i64::from(lower_entry.status))
        .bind(&headers_json)
        .bind(&lower_entry.text)
        .bind(&lower_entry.content_type)
        .bind(now)
        .bind(bytes)
        .execute(pool)
        .await?;

        hot.write()
            .await
            .put(normalized_url.to_string(), Some(lower_entry));
        Ok(())
    }

    /// Clears every stored entry. A no-op on a disabled cache.
    pub async fn clear_all(&self) -> Result<()> {
        let Backend::Enabled { pool, hot, .. } = &self.backend else {
            return Ok(());
        };
        sqlx::query("DELETE FROM cache_entries").execute(pool).await?;
        hot.write().await.clear();
        Ok(())
    }

    /// Item count, bytes on disk, and directory. Zeroed out on a disabled
    /// cache.
    pub async fn stats(&self) -> Result<CacheStats> {
        let Backend::Enabled { pool, dir, .. } = &self.backend else {
            return Ok(CacheStats::default());
        };
        let row = sqlx::query("SELECT COUNT(*), COALESCE(SUM(bytes), 0) FROM cache_entries")
            .fetch_one(pool)
            .await?;
        Ok(CacheStats {
            item_count: row.get(0),
            bytes_on_disk: row.get(1),
            directory: dir.clone(),
        })
    }

    /// Looks up a single URL's raw stored entry for diagnostic purposes
    /// (`cache inspect`), bypassing the gating predicates `get` applies.
    pub async fn inspect(&self, normalized_url: &str) -> Result<Option<CacheEntry>> {
        let Backend::Enabled { pool, .. } = &self.backend else {
            return Ok(None);
        };
        let row = sqlx::query(
            "SELECT final_url, status, headers_json, text, content_type \
             FROM cache_entries WHERE url = ?",
        )
        .bind(normalized_url)
        .fetch_optional(pool)
        .await?;
        Ok(row.map(|row| {
            let headers_json: String = row.get("headers_json");
            CacheEntry {
                final_url: row.get("final_url"),
                status: row.get::<i64, _>("status") as u16,
                headers: serde_json::from_str(&headers_json).unwrap_or_default(),
                text: row.get("text"),
                content_type: row.get("content_type"),
            }
        }))
    }

    pub fn directory(&self) -> Option<&Path> {
        match &self.backend {
            Backend::Disabled => None,
            Backend::Enabled { dir, .. } => Some(dir),
        }
    }

    pub async fn close(&self) {
        if let Backend::Enabled { pool, .. } = &self.backend {
            pool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(status: u16, content_type: &str, text: &str) -> CacheEntry {
        CacheEntry {
            final_url: "https://example.com/".to_string(),
            status,
            headers: HashMap::from([("Content-Type".to_string(), content_type.to_string())]),
            text: text.to_string(),
            content_type: content_type.to_string(),
        }
    }

    #[tokio::test]
    async fn write_then_read_round_trips_with_lowercased_fields() {
        let dir = TempDir::new().unwrap();
        let cfg = CacheConfig {
            directory: Some(dir.path().to_path_buf()),
            ..CacheConfig::default()
        };
        let cache = HtmlCache::open(&cfg).await.unwrap();
        cache
            .set_html_ok("https://example.com/", &entry(200, "Text/HTML; charset=utf-8", "<html></html>"))
            .await
            .unwrap();

        let got = cache.get("https://example.com/").await.unwrap().unwrap();
        assert_eq!(got.content_type, "text/html; charset=utf-8");
        assert_eq!(got.headers.get("content-type").unwrap(), "Text/HTML; charset=utf-8");
        cache.close().await;
    }

    #[tokio::test]
    async fn non_200_is_not_stored_by_default() {
        let dir = TempDir::new().unwrap();
        let cfg = CacheConfig {
            directory: Some(dir.path().to_path_buf()),
            ..CacheConfig::default()
        };
        let cache = HtmlCache::open(&cfg).await.unwrap();
        cache
            .set_html_ok("https://example.com/missing", &entry(404, "text/html", "not found"))
            .await
            .unwrap();
        assert!(cache.get("https://example.com/missing").await.unwrap().is_none());
        cache.close().await;
    }

    #[tokio::test]
    async fn non_html_content_type_is_not_stored() {
        let dir = TempDir::new().unwrap();
        let cfg = CacheConfig {
            directory: Some(dir.path().to_path_buf()),
            ..CacheConfig::default()
        };
        let cache = HtmlCache::open(&cfg).await.unwrap();
        cache
            .set_html_ok("https://example.com/doc.json", &entry(200, "application/json", "{}"))
            .await
            .unwrap();
        assert!(cache.get("https://example.com/doc.json").await.unwrap().is_none());
        cache.close().await;
    }

    #[tokio::test]
    async fn expired_entries_return_none() {
        let dir = TempDir::new().unwrap();
        let cfg = CacheConfig {
            directory: Some(dir.path().to_path_buf()),
            expire_seconds: 0,
            ..CacheConfig::default()
        };
        let cache = HtmlCache::open(&cfg).await.unwrap();
        cache
            .set_html_ok("https://example.com/", &entry(200, "text/html", "<html></html>"))
            .await
            .unwrap();
        // expire_seconds=0 means any nonnegative age already exceeds it
        tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
        assert!(cache.get("https://example.com/").await.unwrap().is_none());
        cache.close().await;
    }

    #[tokio::test]
    async fn disabled_cache_is_a_pure_no_op() {
        let cfg = CacheConfig {
            enabled: false,
            ..CacheConfig::default()
        };
        let cache = HtmlCache::open(&cfg).await.unwrap();
        cache
            .set_html_ok("https://example.com/", &entry(200, "text/html", "x"))
            .await
            .unwrap();
        assert!(cache.get("https://example.com/").await.unwrap().is_none());
        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.item_count, 0);
        cache.close().await;
    }

    #[tokio::test]
    async fn clear_all_empties_the_store() {
        let dir = TempDir::new().unwrap();
        let cfg = CacheConfig {
            directory: Some(dir.path().to_path_buf()),
            ..CacheConfig::default()
        };
        let cache = HtmlCache::open(&cfg).await.unwrap();
        cache
            .set_html_ok("https://example.com/", &entry(200, "text/html", "x"))
            .await
            .unwrap();
        assert_eq!(cache.stats().await.unwrap().item_count, 1);
        cache.clear_all().await.unwrap();
        assert_eq!(cache.stats().await.unwrap().item_count, 0);
        cache.close().await;
    }
}
