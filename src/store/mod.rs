// src/store/mod.rs

//! Durable storage traits for submissions and upvotes.
//! Business logic talks to these, never to SQL directly.

pub mod db;
pub mod migration;
pub mod sqlite;

use async_trait::async_trait;

use crate::types::{CategoryFilter, NewSubmission, Submission, SubmissionId, Upvote};

pub use db::create_pool;
pub use migration::run_migrations;
pub use sqlite::SqliteStore;

/// Source of truth for (submission, voter) upvote facts
#[async_trait]
pub trait UpvoteStore: Send + Sync {
    /// Records an upvote. Returns false if the pair already existed (no-op).
    /// Fails with [`SubmissionError::NotFound`](crate::error::SubmissionError::NotFound)
    /// when the submission does not exist.
    async fn add_upvote(
        &self,
        submission_id: SubmissionId,
        voter_id: &str,
        category: &str,
        kind: &str,
    ) -> anyhow::Result<bool>;

    /// Deletes at most one matching row. Returns whether a row was removed.
    async fn remove_upvote(
        &self,
        submission_id: SubmissionId,
        voter_id: &str,
    ) -> anyhow::Result<bool>;

    /// Full scan, used to rebuild the in-memory cache.
    async fn load_all_upvotes(&self) -> anyhow::Result<Vec<Upvote>>;
}

/// Plain CRUD over raw submissions
#[async_trait]
pub trait SubmissionRepository: Send + Sync {
    /// Validates, stamps the submission time and stores a new submission.
    async fn insert_submission(&self, new: &NewSubmission) -> anyhow::Result<Submission>;

    async fn get_submission(&self, id: SubmissionId) -> anyhow::Result<Option<Submission>>;

    async fn list_submissions(&self, filter: &CategoryFilter) -> anyhow::Result<Vec<Submission>>;

    async fn list_submissions_for_entity(
        &self,
        name: &str,
        category: &str,
    ) -> anyhow::Result<Vec<Submission>>;

    /// Case-insensitive match on the submitter id.
    async fn list_submissions_by_submitter(
        &self,
        submitter_id: &str,
    ) -> anyhow::Result<Vec<Submission>>;

    /// Removes the submission together with its upvotes. Returns whether it existed.
    async fn delete_submission(&self, id: SubmissionId) -> anyhow::Result<bool>;

    /// Moves every submission from `old_id` to `new_id`. Returns rows changed.
    async fn reassign_submitter(&self, old_id: &str, new_id: &str) -> anyhow::Result<u64>;
}
