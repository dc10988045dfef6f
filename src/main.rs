// src/main.rs

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{Level, info, warn};

use valqual::config::CONFIG;
use valqual::tasks::spawn_reconciler;
use valqual::{CategoryFilter, NewSubmission, RatingService, Submission};

#[derive(Parser)]
#[command(name = "valqual")]
#[command(about = "Rate places on value and quality, see where they land", long_about = None)]
struct Cli {
    /// SQLite database URL (defaults to DATABASE_URL)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Rate a place
    Submit {
        #[arg(long)]
        name: String,
        #[arg(long)]
        category: String,
        #[arg(long = "type", default_value = "Restaurant")]
        kind: String,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(long)]
        value: f64,
        #[arg(long)]
        quality: f64,
        /// Who is submitting
        #[arg(long)]
        user: String,
    },
    /// List raw submissions
    List {
        #[arg(long, default_value = "All")]
        category: CategoryFilter,
        /// Only submissions by this user
        #[arg(long)]
        mine: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Toggle an upvote
    Upvote {
        id: i64,
        voter: String,
    },
    /// Delete a submission (owner or admin)
    Delete {
        id: i64,
        requester: String,
    },
    /// Weighted point per place
    Chart {
        #[arg(long, default_value = "All")]
        category: CategoryFilter,
        #[arg(long)]
        json: bool,
    },
    /// Per-submission weights for one place
    Breakdown {
        name: String,
        category: String,
        /// Mark this user's upvotes
        #[arg(long)]
        viewer: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Reload upvote counts from the database
    RebuildCache,
    /// Move all submissions from one user id to another
    Reassign {
        old: String,
        new: String,
    },
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_submission(s: &Submission, votes: u32) {
    let date = s
        .submitted_at
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string());
    println!(
        "#{:<5} {:<30} {:<14} value {:>5.1}  quality {:>5.1}  {:>3} upvotes  {}  {}",
        s.id, s.name, s.category, s.value, s.quality, votes, date, s.submitter_id
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { CONFIG.tracing_level() };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mut config = CONFIG.clone();
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    let service = RatingService::open(&config).await?;
    if service.cache().is_degraded() {
        warn!("Upvote counts unavailable; showing 0 for every submission");
    }
    let reconciler = spawn_reconciler(service.cache().clone(), config.reconcile_interval());

    match cli.command {
        Command::Submit { name, category, kind, location, value, quality, user } => {
            let sub = service
                .submit(NewSubmission {
                    value,
                    quality,
                    kind,
                    category,
                    name,
                    location,
                    submitter_id: user,
                })
                .await?;
            print_submission(&sub, service.vote_count(sub.id));
        }
        Command::List { category, mine, json } => {
            let subs = match mine {
                Some(user) => service.list_my_submissions(&user, &category).await?,
                None => service.list_submissions(&category).await?,
            };
            if json {
                print_json(&subs)?;
            } else {
                for s in &subs {
                    print_submission(s, service.vote_count(s.id));
                }
            }
        }
        Command::Upvote { id, voter } => {
            let Some(sub) = service.get_submission(id).await? else {
                anyhow::bail!("submission {} not found", id);
            };
            let outcome = service
                .toggle_upvote(id, &voter, &sub.category, &sub.kind)
                .await?;
            println!(
                "{} submission #{} ({} upvotes)",
                if outcome.voted { "Upvoted" } else { "Removed upvote from" },
                id,
                outcome.count
            );
        }
        Command::Delete { id, requester } => {
            service.delete(id, &requester).await?;
            println!("Deleted submission #{}", id);
        }
        Command::Chart { category, json } => {
            let points = service.chart(&category).await?;
            if json {
                print_json(&points)?;
            } else {
                for p in &points {
                    println!(
                        "{:<30} {:<14} value {:>5.1}  quality {:>5.1}  ({} submissions)",
                        p.name, p.category, p.weighted_value, p.weighted_quality, p.member_count
                    );
                }
            }
        }
        Command::Breakdown { name, category, viewer, json } => {
            let breakdown = service.breakdown(&name, &category, viewer.as_deref()).await?;
            if json {
                print_json(&breakdown)?;
            } else {
                println!(
                    "{} / {}: value {:.1}, quality {:.1}",
                    breakdown.name,
                    breakdown.category,
                    breakdown.weighted_value,
                    breakdown.weighted_quality
                );
                for row in &breakdown.rows {
                    print!(
                        "{:>5.1}% {} ",
                        row.weight,
                        if row.viewer_has_voted { "*" } else { " " }
                    );
                    print_submission(&row.submission, row.upvotes);
                }
            }
        }
        Command::RebuildCache => {
            let loaded = service.rebuild_cache().await?;
            println!("Loaded {} upvotes", loaded);
        }
        Command::Reassign { old, new } => {
            let changed = service.reassign_submitter(&old, &new).await?;
            println!("Updated {} submissions from {} to {}", changed, old, new);
        }
    }

    reconciler.abort();
    if service.cache().flush_pending().await > 0 {
        info!("Flushed queued upvote writes before exit");
    }
    let stranded = service.cache().pending_writes();
    if stranded > 0 {
        warn!("{} upvote write(s) could not be saved", stranded);
    }

    Ok(())
}
