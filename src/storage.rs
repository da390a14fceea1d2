//! SQLite telemetry journal for petcare.
//!
//! Pet state itself lives on the backend; this store only keeps a local record
//! of what the controller attempted and how it went. Failure rows carry the
//! underlying error detail that is deliberately kept out of user-facing
//! messages.

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

/// How an attempted operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
    /// The response arrived after a newer one had already been applied.
    Stale,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Failure => "failure",
            Outcome::Stale => "stale",
        }
    }

    fn parse(s: &str) -> Self {
        match s {
            "success" => Outcome::Success,
            "stale" => Outcome::Stale,
            _ => Outcome::Failure,
        }
    }
}

/// One journal row.
#[derive(Debug, Clone, Serialize)]
pub struct ActionRecord {
    /// Operation name ("feed", "refresh", "chat", ...).
    pub action: String,

    /// Pet the operation targeted.
    pub pet_id: String,

    pub outcome: Outcome,

    /// Underlying error detail for failures.
    pub detail: Option<String>,

    pub timestamp: DateTime<Utc>,
}

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Create a new storage instance and initialize the schema.
    ///
    /// # Arguments
    ///
    /// * `database_url` - SQLite connection string (e.g., "sqlite:petcare.db" or "sqlite::memory:")
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // In-memory databases are per connection; keep a single one so every
        // query sees the same tables.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        let storage = Self { pool };
        storage.initialize_schema().await?;

        Ok(storage)
    }

    /// Create the database schema if it doesn't exist.
    async fn initialize_schema(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS action_log (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                action TEXT NOT NULL,
                pet_id TEXT NOT NULL,
                outcome TEXT NOT NULL,
                detail TEXT,
                ts INTEGER NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_action_log_ts
            ON action_log(ts)
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Append a record to the journal.
    pub async fn record(&self, record: &ActionRecord) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO action_log (action, pet_id, outcome, detail, ts)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.action)
        .bind(&record.pet_id)
        .bind(record.outcome.as_str())
        .bind(&record.detail)
        .bind(record.timestamp.timestamp_millis())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Most recent records, newest first.
    pub async fn recent(&self, limit: u32) -> anyhow::Result<Vec<ActionRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT action, pet_id, outcome, detail, ts
            FROM action_log
            ORDER BY ts DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|r| {
                let ts: i64 = r.get("ts");
                let outcome: String = r.get("outcome");
                ActionRecord {
                    action: r.get("action"),
                    pet_id: r.get("pet_id"),
                    outcome: Outcome::parse(&outcome),
                    detail: r.get("detail"),
                    timestamp: Utc
                        .timestamp_millis_opt(ts)
                        .single()
                        .unwrap_or_default(),
                }
            })
            .collect())
    }

}
