// src/tasks/mod.rs

//! Background tasks. Currently just the reconciler that retries upvote writes
//! the store rejected.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info};

use crate::cache::UpvoteCache;

/// Spawns the reconciler: every `interval` it flushes queued durable writes.
pub fn spawn_reconciler(cache: Arc<UpvoteCache>, interval: Duration) -> JoinHandle<()> {
    info!("Upvote reconciler started (interval: {:?})", interval);

    tokio::spawn(async move {
        let mut interval_timer = time::interval(interval);
        interval_timer.set_missed_tick_behavior(time::MissedTickBehavior::Skip);

        loop {
            interval_timer.tick().await;
            run_reconcile_cycle(&cache).await;
        }
    })
}

/// One reconcile pass. Returns how many queued writes reached the store.
pub async fn run_reconcile_cycle(cache: &UpvoteCache) -> usize {
    let queued = cache.pending_writes();
    if queued == 0 {
        debug!("Reconcile: nothing queued");
        return 0;
    }

    let applied = cache.flush_pending().await;
    if applied < queued {
        error!(
            "Reconcile: {} of {} queued upvote writes still failing",
            queued - applied,
            queued
        );
    } else {
        info!("Reconcile: flushed {} queued upvote writes", applied);
    }
    applied
}
