// src/types.rs
// Plain data shared by the store, the cache and the weighting core

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SubmissionError;

pub type SubmissionId = i64;

/// Longest accepted entity name, in characters
pub const MAX_NAME_LEN: usize = 100;

/// One user's rating of one entity. Immutable once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    pub value: f64,
    pub quality: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub name: String,
    pub location: String,
    pub submitter_id: String,
    /// `None` for rows written before timestamps were recorded
    pub submitted_at: Option<DateTime<Utc>>,
}

impl Submission {
    /// Grouping key: (name, category)
    pub fn entity_key(&self) -> (&str, &str) {
        (&self.name, &self.category)
    }
}

/// Input for creating a submission; the store assigns `id` and `submitted_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewSubmission {
    pub value: f64,
    pub quality: f64,
    #[serde(rename = "type")]
    pub kind: String,
    pub category: String,
    pub name: String,
    pub location: String,
    pub submitter_id: String,
}

impl NewSubmission {
    pub fn validate(&self) -> Result<(), SubmissionError> {
        if !(0.0..=100.0).contains(&self.value) {
            return Err(SubmissionError::ValueOutOfRange(self.value));
        }
        if !(0.0..=100.0).contains(&self.quality) {
            return Err(SubmissionError::QualityOutOfRange(self.quality));
        }
        let name_len = self.name.chars().count();
        if name_len > MAX_NAME_LEN {
            return Err(SubmissionError::NameTooLong(name_len));
        }
        if self.name.trim().is_empty() {
            return Err(SubmissionError::EmptyField("name"));
        }
        if self.category.trim().is_empty() {
            return Err(SubmissionError::EmptyField("category"));
        }
        if self.submitter_id.trim().is_empty() {
            return Err(SubmissionError::EmptyField("submitter"));
        }
        Ok(())
    }
}

/// A durable (submission, voter) upvote fact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upvote {
    pub submission_id: SubmissionId,
    pub voter_id: String,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// A durable write produced by a toggle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpvoteAction {
    Add {
        submission_id: SubmissionId,
        voter_id: String,
        category: String,
        kind: String,
    },
    Remove {
        submission_id: SubmissionId,
        voter_id: String,
    },
}

impl UpvoteAction {
    pub fn submission_id(&self) -> SubmissionId {
        match self {
            Self::Add { submission_id, .. } | Self::Remove { submission_id, .. } => *submission_id,
        }
    }
}

/// One weighted point per entity on the chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayPoint {
    pub name: String,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub location: String,
    pub weighted_value: f64,
    pub weighted_quality: f64,
    pub member_count: usize,
}

/// One submission's line in an entity breakdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownRow {
    pub submission: Submission,
    /// Normalized weight, percent of the entity total
    pub weight: f64,
    pub upvotes: u32,
    pub viewer_has_voted: bool,
    /// 0.2..=1.0, scaled between the lightest and heaviest weight in the group
    pub opacity: f64,
}

/// Everything known about one entity, newest submission first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityBreakdown {
    pub name: String,
    pub category: String,
    pub weighted_value: f64,
    pub weighted_quality: f64,
    pub rows: Vec<BreakdownRow>,
}

/// Category restriction for listings; `"All"` means no restriction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    pub fn matches(&self, category: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(c) => c == category,
        }
    }

    pub fn category(&self) -> Option<&str> {
        match self {
            Self::All => None,
            Self::Only(c) => Some(c),
        }
    }
}

impl FromStr for CategoryFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s == "All" {
            Ok(Self::All)
        } else {
            Ok(Self::Only(s.to_string()))
        }
    }
}

impl fmt::Display for CategoryFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "All"),
            Self::Only(c) => write!(f, "{}", c),
        }
    }
}
