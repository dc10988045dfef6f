// src/service.rs
// Core-facing operations: submissions in, weighted chart points and breakdowns out

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use tracing::info;

use crate::aggregate;
use crate::cache::{ToggleOutcome, UpvoteCache};
use crate::config::ValqualConfig;
use crate::error::SubmissionError;
use crate::store::{self, SqliteStore, SubmissionRepository};
use crate::types::{
    CategoryFilter, DisplayPoint, EntityBreakdown, NewSubmission, Submission, SubmissionId,
};
use crate::weighting::{self, WeightParams, Weights};

#[derive(Clone)]
pub struct RatingService {
    repo: Arc<dyn SubmissionRepository>,
    cache: Arc<UpvoteCache>,
    params: WeightParams,
    admin_email: String,
}

impl RatingService {
    pub fn new(
        repo: Arc<dyn SubmissionRepository>,
        cache: Arc<UpvoteCache>,
        params: WeightParams,
        admin_email: impl Into<String>,
    ) -> Self {
        Self {
            repo,
            cache,
            params,
            admin_email: admin_email.into(),
        }
    }

    /// Connects to the configured database, migrates it and loads the upvote cache.
    pub async fn open(config: &ValqualConfig) -> Result<Self> {
        let pool = store::create_pool(&config.database_url, config.sqlite_max_connections).await?;
        store::run_migrations(&pool).await?;

        let sqlite = Arc::new(SqliteStore::new(pool));
        let cache = Arc::new(UpvoteCache::load(sqlite.clone()).await);

        Ok(Self::new(sqlite, cache, config.weight_params(), config.admin_email.clone()))
    }

    pub fn cache(&self) -> &Arc<UpvoteCache> {
        &self.cache
    }

    pub fn params(&self) -> &WeightParams {
        &self.params
    }

    fn is_admin(&self, who: &str) -> bool {
        who.trim().eq_ignore_ascii_case(self.admin_email.trim())
    }

    // ── Submissions

    /// Stores a submission and records its submitter's own upvote.
    pub async fn submit(&self, new: NewSubmission) -> Result<Submission> {
        let submission = self.repo.insert_submission(&new).await?;
        self.cache
            .ensure_voted(
                submission.id,
                &submission.submitter_id,
                &submission.category,
                &submission.kind,
            )
            .await;

        info!(
            "New submission {} for {} / {} by {}",
            submission.id, submission.name, submission.category, submission.submitter_id
        );
        Ok(submission)
    }

    /// Deletes a submission owned by `requester`, or any submission if `requester` is the admin.
    /// A blank requester is never the owner, even of rows with no recorded submitter.
    pub async fn delete(&self, id: SubmissionId, requester: &str) -> Result<()> {
        if requester.trim().is_empty() {
            return Err(SubmissionError::NotPermitted {
                id,
                requester: requester.to_string(),
            }
            .into());
        }

        let submission = self
            .repo
            .get_submission(id)
            .await?
            .ok_or(SubmissionError::NotFound(id))?;

        let owner = submission.submitter_id.trim().eq_ignore_ascii_case(requester.trim());
        if !owner && !self.is_admin(requester) {
            return Err(SubmissionError::NotPermitted {
                id,
                requester: requester.to_string(),
            }
            .into());
        }

        self.repo.delete_submission(id).await?;
        self.cache.forget_submission(id).await;
        info!("Deleted submission {} at the request of {}", id, requester);
        Ok(())
    }

    pub async fn get_submission(&self, id: SubmissionId) -> Result<Option<Submission>> {
        self.repo.get_submission(id).await
    }

    pub async fn list_submissions(&self, filter: &CategoryFilter) -> Result<Vec<Submission>> {
        self.repo.list_submissions(filter).await
    }

    pub async fn list_submissions_for_entity(
        &self,
        name: &str,
        category: &str,
    ) -> Result<Vec<Submission>> {
        self.repo.list_submissions_for_entity(name, category).await
    }

    /// The requester's own submissions, optionally narrowed to one category
    pub async fn list_my_submissions(
        &self,
        submitter_id: &str,
        filter: &CategoryFilter,
    ) -> Result<Vec<Submission>> {
        let mut subs = self.repo.list_submissions_by_submitter(submitter_id).await?;
        subs.retain(|s| filter.matches(&s.category));
        Ok(subs)
    }

    /// Renames a submitter across all their submissions. Returns rows changed.
    pub async fn reassign_submitter(&self, old_id: &str, new_id: &str) -> Result<u64> {
        let changed = self.repo.reassign_submitter(old_id, new_id).await?;
        info!("Reassigned {} submission(s) from {} to {}", changed, old_id, new_id);
        Ok(changed)
    }

    // ── Upvotes

    pub fn vote_count(&self, submission_id: SubmissionId) -> u32 {
        self.cache.count(submission_id)
    }

    pub fn has_voted(&self, submission_id: SubmissionId, voter_id: &str) -> bool {
        self.cache.has_voted(submission_id, voter_id)
    }

    /// Flips `voter_id`'s upvote. Unknown submissions are refused before the cache is touched.
    pub async fn toggle_upvote(
        &self,
        submission_id: SubmissionId,
        voter_id: &str,
        category: &str,
        kind: &str,
    ) -> Result<ToggleOutcome> {
        if self.repo.get_submission(submission_id).await?.is_none() {
            return Err(SubmissionError::NotFound(submission_id).into());
        }
        Ok(self.cache.toggle(submission_id, voter_id, category, kind).await)
    }

    pub async fn rebuild_cache(&self) -> Result<usize> {
        self.cache.rebuild().await
    }

    // ── Weighting

    /// Normalized weights for one entity group, using live vote counts
    pub fn compute_weights(&self, submissions: &[Submission], now: DateTime<Utc>) -> Weights {
        weighting::compute_weights(submissions, |id| self.cache.count(id), &self.params, now)
    }

    /// One display point per entity, against a single snapshot of the vote counts
    pub fn aggregate(&self, submissions: &[Submission], now: DateTime<Utc>) -> Vec<DisplayPoint> {
        let counts = self.cache.counts_snapshot();
        aggregate::aggregate(
            submissions,
            |id| counts.get(&id).copied().unwrap_or(0),
            &self.params,
            now,
        )
    }

    /// Chart points for every entity matching `filter`
    pub async fn chart(&self, filter: &CategoryFilter) -> Result<Vec<DisplayPoint>> {
        let subs = self.repo.list_submissions(filter).await?;
        Ok(self.aggregate(&subs, Utc::now()))
    }

    /// Per-submission breakdown for one entity; `viewer` marks their own upvotes
    pub async fn breakdown(
        &self,
        name: &str,
        category: &str,
        viewer: Option<&str>,
    ) -> Result<EntityBreakdown> {
        let subs = self.repo.list_submissions_for_entity(name, category).await?;
        let counts = self.cache.counts_snapshot();

        Ok(aggregate::entity_breakdown(
            name,
            category,
            &subs,
            |id| counts.get(&id).copied().unwrap_or(0),
            |id| viewer.is_some_and(|v| self.cache.has_voted(id, v)),
            &self.params,
            Utc::now(),
        ))
    }
}
