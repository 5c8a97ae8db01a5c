//! Retrieval models.
//!
//! A model is split into a one-off preparation step over the query and a
//! per-entity scoring step, so the [`Ranker`](crate::rank::Ranker) can run
//! preparation once and fan scoring out over a worker pool.

pub mod example;
pub mod text;

use serde::{Deserialize, Serialize};

use crate::error::RankResult;
use crate::graph::{Entity, GraphAdapter};
use crate::score::Probability;

pub use example::{ExampleRetrievalModel, PreparsedExampleWeights};
pub use text::{TextQuery, TextRetrievalModel};

/// A query: free-text relation plus positive example entities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub relation: String,
    pub examples: Vec<Entity>,
}

impl Query {
    pub fn new(relation: impl Into<String>, examples: impl IntoIterator<Item = Entity>) -> Self {
        Self {
            relation: relation.into(),
            examples: examples.into_iter().collect(),
        }
    }
}

/// Which model produced a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Text,
    Example,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::Text => f.write_str("text-based"),
            ModelKind::Example => f.write_str("example-based"),
        }
    }
}

/// A probabilistic scorer of entities against a query.
pub trait RetrievalModel: Sync {
    /// Query-dependent data computed once before scoring.
    type Prepared: Sync;

    fn kind(&self) -> ModelKind;

    /// Preparse the query. Runs once, before any scoring.
    fn prepare(&self, graph: &dyn GraphAdapter, query: &Query) -> RankResult<Self::Prepared>;

    /// Score one entity. Must only read shared state.
    fn score(
        &self,
        prepared: &Self::Prepared,
        graph: &dyn GraphAdapter,
        entity: &Entity,
    ) -> RankResult<Probability>;
}
