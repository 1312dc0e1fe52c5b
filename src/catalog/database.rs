//! SQLite-backed catalog with migrations

use super::{CatalogStore, Item};
use crate::error::{MemeseekError, Result};
use async_trait::async_trait;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, params_from_iter, Row};
use std::collections::HashMap;
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

const ITEM_COLUMNS: &str = "id, name, image, description, tags";

/// Catalog stored in the `memes` table
#[derive(Clone)]
pub struct SqliteCatalog {
    pool: DbPool,
}

impl SqliteCatalog {
    /// Open (or create) the catalog database
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| MemeseekError::Io {
                    source: e,
                    context: format!("Failed to create catalog directory: {:?}", parent),
                })?;
            }
        }

        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                PRAGMA busy_timeout = 5000;
                ",
            )
        });

        let pool = Pool::builder()
            .max_size(8)
            .build(manager)
            .map_err(|e| MemeseekError::Pool(format!("Failed to create connection pool: {}", e)))?;

        let catalog = Self { pool };
        catalog.migrate()?;

        Ok(catalog)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        self.pool
            .get()
            .map_err(|e| MemeseekError::Pool(format!("Failed to get connection: {}", e)))
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM _migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying catalog migration {}", version);

                conn.execute_batch(migration)?;
                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Insert an item or replace the existing record with the same id
    pub fn upsert(&self, item: &Item) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO memes (id, name, image, description, tags)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                image = excluded.image,
                description = excluded.description,
                tags = excluded.tags",
            params![
                item.id,
                item.name,
                item.media_ref,
                item.description,
                item.tags
            ],
        )?;
        Ok(())
    }

    /// Store the embedding of an item as a JSON array
    pub fn set_embedding(&self, id: i64, embedding: &[f32]) -> Result<()> {
        let json = serde_json::to_string(embedding).map_err(|e| MemeseekError::Json {
            source: e,
            context: format!("Failed to serialize embedding for item {}", id),
        })?;

        let conn = self.get_conn()?;
        let updated = conn.execute(
            "UPDATE memes SET embedding = ?1 WHERE id = ?2",
            params![json, id],
        )?;

        if updated == 0 {
            return Err(MemeseekError::Catalog(format!("Item {} not found", id)));
        }
        Ok(())
    }

    /// All items, ordered by id
    pub fn items(&self) -> Result<Vec<Item>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {} FROM memes ORDER BY id", ITEM_COLUMNS))?;
        let items = stmt
            .query_map([], item_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(items)
    }

    /// Stored embeddings. Rows whose JSON cannot be decoded are logged and skipped.
    pub fn embeddings(&self) -> Result<Vec<(i64, Vec<f32>)>> {
        let conn = self.get_conn()?;
        let mut stmt =
            conn.prepare("SELECT id, embedding FROM memes WHERE embedding IS NOT NULL")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut embeddings = Vec::with_capacity(rows.len());
        for (id, json) in rows {
            match serde_json::from_str::<Vec<f32>>(&json) {
                Ok(vector) => embeddings.push((id, vector)),
                Err(e) => tracing::warn!("Skipping malformed embedding for item {}: {}", id, e),
            }
        }

        Ok(embeddings)
    }

    /// Items that have a description but no stored embedding yet
    pub fn pending_embeddings(&self, limit: usize) -> Result<Vec<(i64, String)>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, description FROM memes
             WHERE embedding IS NULL AND TRIM(COALESCE(description, '')) != ''
             ORDER BY id LIMIT ?1",
        )?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt
            .query_map(params![limit], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Catalog statistics
    pub fn stats(&self) -> Result<CatalogStats> {
        let conn = self.get_conn()?;

        let item_count: i64 = conn.query_row("SELECT COUNT(*) FROM memes", [], |row| row.get(0))?;
        let embedded_count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM memes WHERE embedding IS NOT NULL",
            [],
            |row| row.get(0),
        )?;

        Ok(CatalogStats {
            item_count: item_count as usize,
            embedded_count: embedded_count as usize,
        })
    }

    fn fetch_blocking(&self, ids: &[i64]) -> Result<Vec<Item>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let conn = self.get_conn()?;
        let placeholders = vec!["?"; ids.len()].join(",");
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM memes WHERE id IN ({})",
            ITEM_COLUMNS, placeholders
        ))?;

        let mut by_id: HashMap<i64, Item> = stmt
            .query_map(params_from_iter(ids.iter()), item_from_row)?
            .map(|row| row.map(|item| (item.id, item)))
            .collect::<std::result::Result<_, _>>()?;

        // Keep the caller's ranking order
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    fn get_blocking(&self, id: i64) -> Result<Option<Item>> {
        Ok(self.fetch_blocking(&[id])?.into_iter().next())
    }

    fn count_blocking(&self) -> Result<u64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM memes", [], |row| row.get(0))?;
        Ok(count as u64)
    }
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
        media_ref: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        description: row.get(3)?,
        tags: row.get(4)?,
    })
}

async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| MemeseekError::Catalog(format!("Catalog task failed: {}", e)))?
}

#[async_trait]
impl CatalogStore for SqliteCatalog {
    async fn fetch(&self, ids: &[i64]) -> Result<Vec<Item>> {
        let catalog = self.clone();
        let ids = ids.to_vec();
        run_blocking(move || catalog.fetch_blocking(&ids)).await
    }

    async fn get(&self, id: i64) -> Result<Option<Item>> {
        let catalog = self.clone();
        run_blocking(move || catalog.get_blocking(id)).await
    }

    async fn count(&self) -> Result<u64> {
        let catalog = self.clone();
        run_blocking(move || catalog.count_blocking()).await
    }
}

/// Catalog statistics
#[derive(Debug)]
pub struct CatalogStats {
    pub item_count: usize,
    pub embedded_count: usize,
}

/// Catalog migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: memes table, embeddings stored as JSON arrays
    r#"
    CREATE TABLE IF NOT EXISTS memes (
        id INTEGER PRIMARY KEY,
        name TEXT,
        image TEXT,
        description TEXT,
        tags TEXT,
        embedding TEXT
    );
    "#,
];

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_catalog(temp: &TempDir) -> SqliteCatalog {
        let catalog = SqliteCatalog::open(&temp.path().join("memes.db")).unwrap();
        catalog
            .upsert(&Item::new(1, "Grumpy cat", "https://img/1.jpg").with_tags("cat grumpy"))
            .unwrap();
        catalog
            .upsert(
                &Item::new(2, "Doge", "https://img/2.jpg")
                    .with_description("Such wow, much dog"),
            )
            .unwrap();
        catalog
            .upsert(&Item::new(3, "Distracted boyfriend", "https://img/3.jpg"))
            .unwrap();
        catalog
    }

    #[test]
    fn test_migrations() {
        let temp = TempDir::new().unwrap();
        let catalog = SqliteCatalog::open(&temp.path().join("memes.db")).unwrap();

        let conn = catalog.get_conn().unwrap();
        let version: i32 = conn
            .query_row("SELECT MAX(version) FROM _migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, MIGRATIONS.len() as i32);
    }

    #[test]
    fn test_reopen_keeps_data() {
        let temp = TempDir::new().unwrap();
        sample_catalog(&temp);

        let reopened = SqliteCatalog::open(&temp.path().join("memes.db")).unwrap();
        assert_eq!(reopened.stats().unwrap().item_count, 3);
    }

    #[tokio::test]
    async fn test_fetch_preserves_order_and_drops_unknown() {
        let temp = TempDir::new().unwrap();
        let catalog = sample_catalog(&temp);

        let items = catalog.fetch(&[3, 42, 1]).await.unwrap();
        let ids: Vec<i64> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![3, 1]);

        assert!(catalog.fetch(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_and_count() {
        let temp = TempDir::new().unwrap();
        let catalog = sample_catalog(&temp);

        let doge = catalog.get(2).await.unwrap().unwrap();
        assert_eq!(doge.name, "Doge");
        assert_eq!(doge.description.as_deref(), Some("Such wow, much dog"));
        assert!(catalog.get(99).await.unwrap().is_none());
        assert_eq!(catalog.count().await.unwrap(), 3);
    }

    #[test]
    fn test_upsert_replaces() {
        let temp = TempDir::new().unwrap();
        let catalog = sample_catalog(&temp);

        catalog
            .upsert(&Item::new(1, "Very grumpy cat", "https://img/1b.jpg"))
            .unwrap();

        let items = catalog.items().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].name, "Very grumpy cat");
        assert!(items[0].tags.is_none());
    }

    #[test]
    fn test_embeddings_skip_malformed() {
        let temp = TempDir::new().unwrap();
        let catalog = sample_catalog(&temp);

        catalog.set_embedding(1, &[0.1, 0.2, 0.3]).unwrap();
        let conn = catalog.get_conn().unwrap();
        conn.execute("UPDATE memes SET embedding = 'not json' WHERE id = 2", [])
            .unwrap();

        let embeddings = catalog.embeddings().unwrap();
        assert_eq!(embeddings.len(), 1);
        assert_eq!(embeddings[0].0, 1);
        assert_eq!(embeddings[0].1, vec![0.1, 0.2, 0.3]);

        assert_eq!(catalog.stats().unwrap().embedded_count, 2);
    }

    #[test]
    fn test_pending_embeddings() {
        let temp = TempDir::new().unwrap();
        let catalog = sample_catalog(&temp);
        catalog
            .upsert(&Item::new(4, "Blank", "https://img/4.jpg").with_description("   "))
            .unwrap();

        // Only Doge has a usable description
        assert_eq!(
            catalog.pending_embeddings(10).unwrap(),
            vec![(2, "Such wow, much dog".to_string())]
        );

        catalog.set_embedding(2, &[1.0, 0.0]).unwrap();
        assert!(catalog.pending_embeddings(10).unwrap().is_empty());
    }

    #[test]
    fn test_set_embedding_unknown_item() {
        let temp = TempDir::new().unwrap();
        let catalog = sample_catalog(&temp);
        assert!(catalog.set_embedding(77, &[1.0]).is_err());
    }
}
