use anyhow::{Context, Result};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::info;

/// A saved `(title, url)` pair. Rows have no identity; duplicates are allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct Bookmark {
    pub title: String,
    pub url: String,
}

/// Append-only bookmark table over a single SQLite connection.
pub struct BookmarkStore {
    pool: SqlitePool,
}

impl BookmarkStore {
    /// Open (creating if needed) the database file at `path` and ensure the table exists.
    pub async fn open(path: &str) -> Result<Self> {
        let pool = common::init_db_pool(path, 1).await?;
        Self::from_pool(pool).await
    }

    /// Wrap an existing pool; the table is created if absent.
    pub async fn from_pool(pool: SqlitePool) -> Result<Self> {
        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the `bookmarks` table if it does not exist. It is never migrated.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bookmarks (
                title TEXT,
                url TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to ensure bookmarks table")?;
        Ok(())
    }

    /// Append one bookmark. Each insert commits on its own.
    pub async fn add(&self, title: &str, url: &str) -> Result<Bookmark> {
        sqlx::query("INSERT INTO bookmarks (title, url) VALUES (?, ?)")
            .bind(title)
            .bind(url)
            .execute(&self.pool)
            .await
            .context("failed to insert bookmark")?;

        info!(%title, %url, "bookmark stored");
        Ok(Bookmark {
            title: title.to_string(),
            url: url.to_string(),
        })
    }

    /// All bookmarks in insertion order.
    pub async fn list(&self) -> Result<Vec<Bookmark>> {
        sqlx::query_as::<_, Bookmark>("SELECT title, url FROM bookmarks ORDER BY rowid")
            .fetch_all(&self.pool)
            .await
            .context("failed to list bookmarks")
    }
}
