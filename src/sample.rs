//! Sample files: a topic with known relevant and non-relevant entities.
//!
//! A sample is a TOML document:
//!
//! ```toml
//! topic = "capital cities"
//! relevant = ["Paris", "Rome", "Berlin", "Madrid", "Vienna"]
//! not_relevant = ["Lyon", "Milan"]
//! # optional: take the first N relevant entities as examples
//! examples = 2
//! ```
//!
//! Entity names are resolved with [`Entity::parse_lenient`]. Without an
//! `examples` key the examples are drawn at random.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::SampleError;
use crate::graph::Entity;
use crate::model::Query;

/// Result type for sample operations.
pub type SampleResult<T> = std::result::Result<T, SampleError>;

/// Raw sample file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub topic: String,
    pub relevant: Vec<String>,
    pub not_relevant: Vec<String>,
    /// Number of leading relevant entities used as examples.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<usize>,
}

/// A sample split into examples and entities to rank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparedSample {
    pub topic: String,
    pub examples: Vec<Entity>,
    /// Remaining relevant entities followed by the non-relevant ones.
    pub entities_to_rank: Vec<Entity>,
    /// Relevant entities that are not examples.
    pub relevant: Vec<Entity>,
}

impl Sample {
    /// Load and validate a sample file.
    pub fn load(path: &Path) -> SampleResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| SampleError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content, &path.display().to_string())
    }

    /// Parse and validate sample TOML; `origin` names the source in errors.
    pub fn parse(content: &str, origin: &str) -> SampleResult<Self> {
        let sample: Self = toml::from_str(content).map_err(|e| SampleError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        if sample.relevant.is_empty() {
            return Err(SampleError::NoRelevant {
                path: origin.to_string(),
            });
        }
        Ok(sample)
    }

    /// Split into examples and entities to rank.
    ///
    /// Uses the first `examples` relevant entities when the sample says how
    /// many, otherwise `default_amount` randomly chosen ones. At least one
    /// relevant entity is kept out of the examples whenever there are two or
    /// more.
    pub fn prepare<R: Rng + ?Sized>(&self, default_amount: usize, rng: &mut R) -> PreparedSample {
        let mut relevant: Vec<Entity> = self
            .relevant
            .iter()
            .map(|r| Entity::parse_lenient(r))
            .collect();
        let not_relevant = self.not_relevant.iter().map(|r| Entity::parse_lenient(r));

        let mut amount = self.examples.unwrap_or(default_amount).max(1);
        if relevant.len() <= amount {
            let trimmed = relevant.len().saturating_sub(1).max(1);
            tracing::warn!(
                topic = %self.topic,
                relevant = relevant.len(),
                requested = amount,
                examples = trimmed,
                "too few relevant entities, trimming amount of examples"
            );
            amount = trimmed;
        }

        if self.examples.is_none() {
            relevant.shuffle(rng);
        } else {
            tracing::info!(examples = amount, "using top relevant entities as examples");
        }

        let rest = relevant.split_off(amount.min(relevant.len()));
        let examples = relevant;
        let entities_to_rank = rest.iter().cloned().chain(not_relevant).collect();

        PreparedSample {
            topic: self.topic.clone(),
            examples,
            entities_to_rank,
            relevant: rest,
        }
    }
}

impl PreparedSample {
    /// The query this sample poses.
    pub fn query(&self) -> Query {
        Query::new(self.topic.clone(), self.examples.iter().cloned())
    }

    pub fn relevant_set(&self) -> HashSet<Entity> {
        self.relevant.iter().cloned().collect()
    }
}

/// Sample files (`*.toml`) in a directory, sorted by path.
pub fn sample_files(dir: &Path) -> SampleResult<Vec<PathBuf>> {
    let entries = std::fs::read_dir(dir).map_err(|e| SampleError::Read {
        path: dir.display().to_string(),
        source: e,
    })?;
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "toml"))
        .collect();
    files.sort();
    Ok(files)
}
