//! SQLite database management with migrations
//!
//! Holds the course catalog mirror, user progress, and the course embedding table

use crate::error::{Result, SkywiseError};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, Transaction, TransactionBehavior};
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

/// Pooled connection handed out by [`Database::get_conn`]
pub type DbConn = r2d2::PooledConnection<SqliteConnectionManager>;

/// Database manager with migration support
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (or create) the database at `db_path` and apply pending migrations
    pub fn new(db_path: &Path, pool_size: u32) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SkywiseError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        // Per-connection settings; journal_mode is persisted in the file itself
        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA foreign_keys = ON;
                PRAGMA busy_timeout = 5000;
                PRAGMA synchronous = NORMAL;
                ",
            )
        });

        let pool = Pool::builder().max_size(pool_size).build(manager)?;

        {
            let conn = pool.get()?;
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get::<_, String>(0))?;
        }

        let db = Self { pool };

        db.migrate()?;

        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<DbConn> {
        Ok(self.pool.get()?)
    }

    /// Run `work` inside one transaction.
    ///
    /// Commits when `work` returns `Ok`. Any `Err` rolls back, and so does a
    /// panic, since an uncommitted `Transaction` rolls back on drop.
    pub fn transaction<T, F>(&self, work: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        match work(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    tracing::warn!("Rollback failed after {}: {}", e, rollback_err);
                }
                Err(e)
            }
        }
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn.query_row(
            "SELECT COALESCE(MAX(version), 0) FROM _migrations",
            [],
            |row| row.get(0),
        )?;

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);

                conn.execute_batch(migration)?;

                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.get_conn()?;

        let course_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))?;

        let enrollment_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM user_course_progress", [], |row| {
                row.get(0)
            })?;

        let embedding_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM course_embedding", [], |row| row.get(0))?;

        Ok(DbStats {
            course_count: course_count as usize,
            enrollment_count: enrollment_count as usize,
            embedding_count: embedding_count as usize,
        })
    }
}

/// Database statistics
#[derive(Debug)]
pub struct DbStats {
    pub course_count: usize,
    pub enrollment_count: usize,
    pub embedding_count: usize,
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: catalog and progress tables read by the recommendation core
    r#"
    CREATE TABLE courses (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        course_type TEXT,
        is_public INTEGER NOT NULL DEFAULT 1
    );

    CREATE TABLE user_course_progress (
        user_id INTEGER NOT NULL,
        course_id INTEGER NOT NULL,
        progress REAL NOT NULL DEFAULT 0,
        PRIMARY KEY (user_id, course_id),
        FOREIGN KEY (course_id) REFERENCES courses(id) ON DELETE CASCADE
    );

    CREATE INDEX idx_progress_user ON user_course_progress(user_id);
    "#,
    // Migration 2: one embedding per course
    r#"
    CREATE TABLE course_embedding (
        course_id INTEGER PRIMARY KEY,
        embed_text TEXT NOT NULL,
        embedding BLOB NOT NULL,
        dimension INTEGER NOT NULL,
        model TEXT NOT NULL,
        created_at INTEGER NOT NULL
    );

    CREATE INDEX idx_course_embedding_model ON course_embedding(model);
    "#,
];
