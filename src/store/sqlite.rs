//! SQLite-backed submission repository and upvote store.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::error::ErrorKind;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use super::{SubmissionRepository, UpvoteStore};
use crate::error::SubmissionError;
use crate::types::{CategoryFilter, NewSubmission, Submission, SubmissionId, Upvote};

const SUBMISSION_COLUMNS: &str =
    "id, value, quality, type, category, name, location, user_id, date_submitted";

#[derive(Clone)]
pub struct SqliteStore {
    pub pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // Unreadable timestamps become None rather than failing the whole read
    fn row_to_submission(row: &SqliteRow) -> Submission {
        Submission {
            id: row.get("id"),
            value: row.get("value"),
            quality: row.get("quality"),
            kind: row.get("type"),
            category: row.get("category"),
            name: row.get("name"),
            location: row.get("location"),
            submitter_id: row
                .get::<Option<String>, _>("user_id")
                .unwrap_or_default(),
            submitted_at: row
                .try_get::<Option<DateTime<Utc>>, _>("date_submitted")
                .ok()
                .flatten(),
        }
    }

    fn row_to_upvote(row: &SqliteRow) -> Upvote {
        Upvote {
            submission_id: row.get("submission_id"),
            voter_id: row.get("voter_id"),
            category: row.get("category"),
            kind: row.get("type"),
            timestamp: row
                .try_get::<Option<DateTime<Utc>>, _>("timestamp")
                .ok()
                .flatten(),
        }
    }
}

#[async_trait]
impl SubmissionRepository for SqliteStore {
    async fn insert_submission(&self, new: &NewSubmission) -> Result<Submission> {
        new.validate()?;

        let submitted_at = Utc::now();
        let row = sqlx::query(
            r#"
            INSERT INTO submissions
                (value, quality, type, category, name, location, user_id, date_submitted)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(new.value)
        .bind(new.quality)
        .bind(&new.kind)
        .bind(&new.category)
        .bind(&new.name)
        .bind(&new.location)
        .bind(&new.submitter_id)
        .bind(submitted_at)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert submission")?;

        let id: i64 = row.get("id");
        debug!("Stored submission {} for {} / {}", id, new.name, new.category);

        Ok(Submission {
            id,
            value: new.value,
            quality: new.quality,
            kind: new.kind.clone(),
            category: new.category.clone(),
            name: new.name.clone(),
            location: new.location.clone(),
            submitter_id: new.submitter_id.clone(),
            submitted_at: Some(submitted_at),
        })
    }

    async fn get_submission(&self, id: SubmissionId) -> Result<Option<Submission>> {
        let sql = format!("SELECT {} FROM submissions WHERE id = ?", SUBMISSION_COLUMNS);
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch submission by id")?;

        Ok(row.as_ref().map(Self::row_to_submission))
    }

    async fn list_submissions(&self, filter: &CategoryFilter) -> Result<Vec<Submission>> {
        let rows = match filter.category() {
            Some(category) => {
                let sql = format!(
                    "SELECT {} FROM submissions WHERE category = ? ORDER BY id",
                    SUBMISSION_COLUMNS
                );
                sqlx::query(&sql).bind(category).fetch_all(&self.pool).await
            }
            None => {
                let sql = format!("SELECT {} FROM submissions ORDER BY id", SUBMISSION_COLUMNS);
                sqlx::query(&sql).fetch_all(&self.pool).await
            }
        }
        .context("Failed to list submissions")?;

        Ok(rows.iter().map(Self::row_to_submission).collect())
    }

    async fn list_submissions_for_entity(
        &self,
        name: &str,
        category: &str,
    ) -> Result<Vec<Submission>> {
        let sql = format!(
            "SELECT {} FROM submissions WHERE name = ? AND category = ? ORDER BY id",
            SUBMISSION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(name)
            .bind(category)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list submissions for entity")?;

        Ok(rows.iter().map(Self::row_to_submission).collect())
    }

    async fn list_submissions_by_submitter(
        &self,
        submitter_id: &str,
    ) -> Result<Vec<Submission>> {
        let submitter_id = submitter_id.trim();
        if submitter_id.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            "SELECT {} FROM submissions WHERE lower(trim(user_id)) = lower(?) ORDER BY id",
            SUBMISSION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(submitter_id)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list submissions by submitter")?;

        Ok(rows.iter().map(Self::row_to_submission).collect())
    }

    async fn delete_submission(&self, id: SubmissionId) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM submission_upvotes WHERE submission_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete upvotes for submission")?;

        let result = sqlx::query("DELETE FROM submissions WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await
            .context("Failed to delete submission")?;

        tx.commit().await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reassign_submitter(&self, old_id: &str, new_id: &str) -> Result<u64> {
        let result = sqlx::query("UPDATE submissions SET user_id = ? WHERE user_id = ?")
            .bind(new_id)
            .bind(old_id)
            .execute(&self.pool)
            .await
            .context("Failed to reassign submitter")?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl UpvoteStore for SqliteStore {
    async fn add_upvote(
        &self,
        submission_id: SubmissionId,
        voter_id: &str,
        category: &str,
        kind: &str,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO submission_upvotes (submission_id, category, type, voter_id, timestamp)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(submission_id, voter_id) DO NOTHING
            "#,
        )
        .bind(submission_id)
        .bind(category)
        .bind(kind)
        .bind(voter_id)
        .bind(Utc::now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(done.rows_affected() > 0),
            Err(sqlx::Error::Database(e))
                if matches!(e.kind(), ErrorKind::ForeignKeyViolation) =>
            {
                Err(SubmissionError::NotFound(submission_id).into())
            }
            Err(e) => Err(anyhow::Error::new(e).context("Failed to add upvote")),
        }
    }

    async fn remove_upvote(&self, submission_id: SubmissionId, voter_id: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM submission_upvotes
            WHERE id IN (
                SELECT id FROM submission_upvotes
                WHERE submission_id = ? AND voter_id = ?
                LIMIT 1
            )
            "#,
        )
        .bind(submission_id)
        .bind(voter_id)
        .execute(&self.pool)
        .await
        .context("Failed to remove upvote")?;

        Ok(result.rows_affected() > 0)
    }

    async fn load_all_upvotes(&self) -> Result<Vec<Upvote>> {
        let rows = sqlx::query(
            "SELECT submission_id, voter_id, category, type, timestamp
             FROM submission_upvotes ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to scan upvotes")?;

        Ok(rows.iter().map(Self::row_to_upvote).collect())
    }
}
