// src/store/migration.rs
//! Creates the submissions and upvotes tables. Safe to call at every startup.

use anyhow::Result;
use sqlx::{Executor, SqlitePool};
use tracing::info;

const CREATE_SUBMISSIONS: &str = r#"
CREATE TABLE IF NOT EXISTS submissions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    value REAL NOT NULL,
    quality REAL NOT NULL,
    type TEXT NOT NULL,
    category TEXT NOT NULL,
    name TEXT NOT NULL,
    location TEXT NOT NULL,
    user_id TEXT,
    date_submitted DATETIME
);
"#;

/// One row per (submission, voter); the unique constraint makes adds idempotent
const CREATE_SUBMISSION_UPVOTES: &str = r#"
CREATE TABLE IF NOT EXISTS submission_upvotes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    submission_id INTEGER NOT NULL REFERENCES submissions(id),
    category TEXT NOT NULL,
    type TEXT NOT NULL,
    voter_id TEXT NOT NULL,
    timestamp DATETIME NOT NULL DEFAULT CURRENT_TIMESTAMP,
    CONSTRAINT _submission_voter_uc UNIQUE (submission_id, voter_id)
);
"#;

const CREATE_INDICES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_upvotes_submission_id ON submission_upvotes(submission_id);
CREATE INDEX IF NOT EXISTS idx_upvotes_voter_id ON submission_upvotes(voter_id);
CREATE INDEX IF NOT EXISTS idx_submissions_entity ON submissions(name, category);
"#;

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    pool.execute(CREATE_SUBMISSIONS).await?;
    pool.execute(CREATE_SUBMISSION_UPVOTES).await?;
    pool.execute(CREATE_INDICES).await?;

    info!("Schema ready");
    Ok(())
}
