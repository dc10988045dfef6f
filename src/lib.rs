// src/lib.rs

pub mod aggregate;
pub mod cache;
pub mod config;
pub mod error;
pub mod service;
pub mod store;
pub mod tasks;
pub mod types;
pub mod weighting;

pub use cache::{ToggleOutcome, UpvoteCache};
pub use error::SubmissionError;
pub use service::RatingService;
pub use types::{CategoryFilter, DisplayPoint, EntityBreakdown, NewSubmission, Submission};
pub use weighting::{WeightParams, Weights};
