// src/cache.rs
//! In-memory mirror of the upvote store.
//!
//! Reads (`count`, `has_voted`) only touch the in-memory maps and never wait on the
//! database. Toggles mutate the maps and enqueue the durable write under one exclusive
//! lock, so the queue is in toggle order. Whoever holds the write gate drains the queue
//! to the store; a toggle that finds the gate taken returns at once and leaves its write
//! to the current holder. A failed durable write stays queued (the in-memory state is
//! kept) until `flush_pending` or a later toggle gets it through. A write the store
//! rejects because the submission no longer exists is dropped along with everything
//! cached for that submission. The store stays the source of truth: `rebuild` reloads
//! everything from it.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::error::SubmissionError;
use crate::store::UpvoteStore;
use crate::types::{SubmissionId, UpvoteAction};

#[derive(Debug, Default)]
struct CacheState {
    counts: HashMap<SubmissionId, u32>,
    voters: HashMap<SubmissionId, HashSet<String>>,
}

impl CacheState {
    fn add(&mut self, submission_id: SubmissionId, voter_id: &str) -> bool {
        let inserted = self
            .voters
            .entry(submission_id)
            .or_default()
            .insert(voter_id.to_string());
        if inserted {
            *self.counts.entry(submission_id).or_insert(0) += 1;
        }
        inserted
    }

    fn remove(&mut self, submission_id: SubmissionId, voter_id: &str) -> bool {
        let removed = self
            .voters
            .get_mut(&submission_id)
            .is_some_and(|set| set.remove(voter_id));
        if removed {
            let count = self.counts.entry(submission_id).or_insert(1);
            *count = count.saturating_sub(1);
        }
        removed
    }

    fn has_voted(&self, submission_id: SubmissionId, voter_id: &str) -> bool {
        self.voters
            .get(&submission_id)
            .is_some_and(|set| set.contains(voter_id))
    }

    fn replay(&mut self, action: &UpvoteAction) {
        match action {
            UpvoteAction::Add { submission_id, voter_id, .. } => {
                self.add(*submission_id, voter_id);
            }
            UpvoteAction::Remove { submission_id, voter_id } => {
                self.remove(*submission_id, voter_id);
            }
        }
    }
}

/// State of one (submission, voter) pair after a toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToggleOutcome {
    pub voted: bool,
    pub count: u32,
}

/// Result of one pass over the pending queue
#[derive(Debug, Default)]
struct Drained {
    applied: usize,
    /// A write failed and is still at the head of the queue
    stalled: bool,
}

/// The store refuses this write for good: the submission is gone
fn is_rejected(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<SubmissionError>(), Some(SubmissionError::NotFound(_)))
}

pub struct UpvoteCache {
    store: Arc<dyn UpvoteStore>,
    state: RwLock<CacheState>,
    /// Durable writes not yet acknowledged by the store, oldest first
    pending: Mutex<VecDeque<UpvoteAction>>,
    /// Held by whoever is writing the pending queue to the store
    write_gate: tokio::sync::Mutex<()>,
    degraded: AtomicBool,
}

impl UpvoteCache {
    /// Empty cache over `store`; call [`rebuild`](Self::rebuild) to populate it.
    pub fn new(store: Arc<dyn UpvoteStore>) -> Self {
        Self {
            store,
            state: RwLock::new(CacheState::default()),
            pending: Mutex::new(VecDeque::new()),
            write_gate: tokio::sync::Mutex::new(()),
            degraded: AtomicBool::new(false),
        }
    }

    /// Builds the cache from a full store scan. If the scan fails the cache starts
    /// empty and degraded: every count reads 0 until a later rebuild succeeds.
    pub async fn load(store: Arc<dyn UpvoteStore>) -> Self {
        let cache = Self::new(store);
        if let Err(e) = cache.rebuild().await {
            warn!("Upvote counts unavailable, starting with an empty cache: {:#}", e);
            cache.degraded.store(true, Ordering::SeqCst);
        }
        cache
    }

    fn read_state(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // Lock order: state before pending
    fn pending_queue(&self) -> MutexGuard<'_, VecDeque<UpvoteAction>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn next_pending(&self) -> Option<UpvoteAction> {
        self.pending_queue().front().cloned()
    }

    pub fn count(&self, submission_id: SubmissionId) -> u32 {
        self.read_state().counts.get(&submission_id).copied().unwrap_or(0)
    }

    pub fn has_voted(&self, submission_id: SubmissionId, voter_id: &str) -> bool {
        self.read_state().has_voted(submission_id, voter_id)
    }

    /// Copy of every non-zero count, for one consistent read across many lookups
    pub fn counts_snapshot(&self) -> HashMap<SubmissionId, u32> {
        self.read_state()
            .counts
            .iter()
            .filter(|(_, count)| **count > 0)
            .map(|(id, count)| (*id, *count))
            .collect()
    }

    /// Durable writes still waiting for the store
    pub fn pending_writes(&self) -> usize {
        self.pending_queue().len()
    }

    /// True while the cache could not be loaded from the store
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Flips the voter's upvote on the submission.
    pub async fn toggle(
        &self,
        submission_id: SubmissionId,
        voter_id: &str,
        category: &str,
        kind: &str,
    ) -> ToggleOutcome {
        self.apply_vote(submission_id, voter_id, category, kind, None).await
    }

    /// Makes sure the voter has upvoted the submission; a no-op if they already have.
    pub async fn ensure_voted(
        &self,
        submission_id: SubmissionId,
        voter_id: &str,
        category: &str,
        kind: &str,
    ) -> ToggleOutcome {
        self.apply_vote(submission_id, voter_id, category, kind, Some(true))
            .await
    }

    /// `desired == None` flips the current state.
    async fn apply_vote(
        &self,
        submission_id: SubmissionId,
        voter_id: &str,
        category: &str,
        kind: &str,
        desired: Option<bool>,
    ) -> ToggleOutcome {
        let (outcome, queued) = {
            let mut state = self.write_state();
            let voted = state.has_voted(submission_id, voter_id);
            let want = desired.unwrap_or(!voted);

            let action = match (voted, want) {
                (false, true) => {
                    state.add(submission_id, voter_id);
                    Some(UpvoteAction::Add {
                        submission_id,
                        voter_id: voter_id.to_string(),
                        category: category.to_string(),
                        kind: kind.to_string(),
                    })
                }
                (true, false) => {
                    state.remove(submission_id, voter_id);
                    Some(UpvoteAction::Remove {
                        submission_id,
                        voter_id: voter_id.to_string(),
                    })
                }
                _ => None,
            };

            let queued = action.is_some();
            if let Some(action) = action {
                // enqueued under the state lock so queue order matches mutation order
                self.pending_queue().push_back(action);
            }

            let outcome = ToggleOutcome {
                voted: want,
                count: state.counts.get(&submission_id).copied().unwrap_or(0),
            };
            (outcome, queued)
        };

        if queued {
            debug!(
                "Upvote {:?} for submission {} by {} (count now {})",
                outcome.voted, submission_id, voter_id, outcome.count
            );
            self.write_through().await;
        }

        outcome
    }

    /// Drains the queue unless another caller already holds the write gate. The
    /// holder re-checks the queue after releasing the gate, so nothing enqueued
    /// while it was writing is left behind.
    async fn write_through(&self) {
        loop {
            let Ok(gate) = self.write_gate.try_lock() else {
                return;
            };
            let drained = self.drain_pending().await;
            drop(gate);

            if drained.stalled || self.pending_writes() == 0 {
                return;
            }
        }
    }

    /// Writes queued actions to the store in order. Stops at the first failure and
    /// leaves it (and everything after it) queued, except writes the store rejects
    /// for a missing submission, which are discarded. Caller holds the write gate.
    async fn drain_pending(&self) -> Drained {
        let mut drained = Drained::default();

        while let Some(action) = self.next_pending() {
            let submission_id = action.submission_id();
            let result = match &action {
                UpvoteAction::Add { voter_id, category, kind, .. } => self
                    .store
                    .add_upvote(submission_id, voter_id, category, kind)
                    .await
                    .map(|_| ()),
                UpvoteAction::Remove { voter_id, .. } => self
                    .store
                    .remove_upvote(submission_id, voter_id)
                    .await
                    .map(|_| ()),
            };

            match result {
                Ok(()) => {
                    self.pending_queue().pop_front();
                    drained.applied += 1;
                }
                Err(e) if is_rejected(&e) => {
                    warn!(
                        "Submission {} is gone, dropping its queued upvote writes: {:#}",
                        submission_id, e
                    );
                    self.purge(submission_id);
                }
                Err(e) => {
                    warn!(
                        "Durable upvote write failed for submission {}, {} write(s) queued: {:#}",
                        submission_id,
                        self.pending_writes(),
                        e
                    );
                    drained.stalled = true;
                    break;
                }
            }
        }

        drained
    }

    /// Removes a submission from the maps and the queue.
    fn purge(&self, submission_id: SubmissionId) {
        let mut state = self.write_state();
        state.counts.remove(&submission_id);
        state.voters.remove(&submission_id);
        self.pending_queue()
            .retain(|action| action.submission_id() != submission_id);
    }

    /// Retries queued durable writes. Returns how many reached the store.
    pub async fn flush_pending(&self) -> usize {
        let mut applied = 0;
        loop {
            let drained = {
                let _gate = self.write_gate.lock().await;
                self.drain_pending().await
            };
            applied += drained.applied;

            if drained.stalled || self.pending_writes() == 0 {
                return applied;
            }
        }
    }

    /// Replaces the in-memory state with a full scan of the store. Writes still
    /// queued are replayed on top so they stay visible. On failure the previous
    /// state is kept and the error returned.
    pub async fn rebuild(&self) -> Result<usize> {
        let (loaded, submissions) = {
            let _gate = self.write_gate.lock().await;
            let upvotes = self.store.load_all_upvotes().await?;

            let mut state = self.write_state();
            let mut fresh = CacheState::default();
            for upvote in &upvotes {
                fresh.add(upvote.submission_id, &upvote.voter_id);
            }
            for action in self.pending_queue().iter() {
                fresh.replay(action);
            }

            let submissions = fresh.voters.len();
            *state = fresh;
            (upvotes.len(), submissions)
        };
        self.degraded.store(false, Ordering::SeqCst);

        info!(
            "Upvote cache rebuilt: {} upvotes across {} submissions",
            loaded, submissions
        );
        self.write_through().await;
        Ok(loaded)
    }

    /// Drops everything cached or queued for a deleted submission.
    pub async fn forget_submission(&self, submission_id: SubmissionId) {
        {
            let _gate = self.write_gate.lock().await;
            self.purge(submission_id);
        }
        self.write_through().await;
    }
}
