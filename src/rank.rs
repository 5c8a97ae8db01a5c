//! Ranking driver: scoring, ordering, normalization and self-evaluation.
//!
//! The [`Ranker`] prepares a [`RetrievalModel`] once, scores candidates in
//! parallel on a bounded rayon pool, and sorts the collected results once.
//! Scores stay exact rationals throughout.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::Serialize;

use crate::error::{RankError, RankResult};
use crate::evaluate::{EvaluationResult, Evaluator};
use crate::graph::{Entity, GraphAdapter};
use crate::model::{ModelKind, Query, RetrievalModel};
use crate::score::{self, Probability};

/// One ranked entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankingEntry {
    #[serde(serialize_with = "score::serialize_f64")]
    pub score: Probability,
    pub entity: Entity,
}

impl RankingEntry {
    pub fn new(score: Probability, entity: Entity) -> Self {
        Self { score, entity }
    }
}

/// Entries ordered best first.
///
/// Equal scores are ordered by descending entity identifier.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Ranking {
    entries: Vec<RankingEntry>,
}

impl Ranking {
    /// Sort arbitrary entries into a ranking.
    pub fn from_entries(mut entries: Vec<RankingEntry>) -> Self {
        entries.sort_unstable_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| b.entity.cmp(&a.entity))
        });
        Self { entries }
    }

    pub fn entries(&self) -> &[RankingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RankingEntry> {
        self.entries.iter()
    }

    /// Score of `entity`, if ranked.
    pub fn score_of(&self, entity: &Entity) -> Option<&Probability> {
        self.entries
            .iter()
            .find(|e| e.entity == *entity)
            .map(|e| &e.score)
    }

    /// Keep only entries matching `keep`, preserving order.
    pub fn filtered(&self, keep: impl Fn(&RankingEntry) -> bool) -> Self {
        Self {
            entries: self.entries.iter().filter(|e| keep(e)).cloned().collect(),
        }
    }

    /// Min-max normalize scores into `[0, 1]`.
    ///
    /// If every score is equal there is no spread to normalize and all scores
    /// become `0`.
    pub fn normalized(&self) -> Self {
        let (Some(best), Some(worst)) = (self.entries.first(), self.entries.last()) else {
            return self.clone();
        };
        let max = best.score.clone();
        let min = worst.score.clone();
        let spread = &max - &min;
        if spread == score::zero() {
            tracing::debug!(entries = self.entries.len(), "all scores equal, normalizing to zero");
            return Self {
                entries: self
                    .entries
                    .iter()
                    .map(|e| RankingEntry::new(score::zero(), e.entity.clone()))
                    .collect(),
            };
        }
        Self {
            entries: self
                .entries
                .iter()
                .map(|e| RankingEntry::new((&e.score - &min) / &spread, e.entity.clone()))
                .collect(),
        }
    }

    /// Relevance sequence of the top `depth` entries.
    pub fn relevance(&self, depth: usize, relevant: &HashSet<Entity>) -> Vec<bool> {
        self.entries
            .iter()
            .take(depth)
            .map(|e| relevant.contains(&e.entity))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Ranking {
    type Item = &'a RankingEntry;
    type IntoIter = std::slice::Iter<'a, RankingEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// A model's normalized candidate ranking plus how well it recovered the examples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRanking {
    pub model: ModelKind,
    /// Normalized ranking of the candidates (examples excluded).
    pub ranking: Ranking,
    /// Metrics of the model ranking its own examples among the candidates.
    pub self_evaluation: EvaluationResult,
}

impl ModelRanking {
    /// Average Precision used to drive fusion.
    pub fn avg_prec(&self) -> &Probability {
        &self.self_evaluation.avg_prec
    }
}

/// Runs retrieval models over candidate lists on a bounded worker pool.
pub struct Ranker<'p> {
    pool: &'p rayon::ThreadPool,
    self_evaluation_depth: usize,
}

impl<'p> Ranker<'p> {
    pub fn new(pool: &'p rayon::ThreadPool, self_evaluation_depth: usize) -> Self {
        Self {
            pool,
            self_evaluation_depth,
        }
    }

    /// Score `candidates` with an already-prepared model and sort once.
    ///
    /// Any scoring error aborts the whole ranking.
    pub fn rank<M: RetrievalModel>(
        &self,
        model: &M,
        prepared: &M::Prepared,
        graph: &dyn GraphAdapter,
        candidates: &[Entity],
    ) -> RankResult<Ranking> {
        let total = candidates.len();
        let progress_step = (total / 10).max(1);
        let done = AtomicUsize::new(0);
        tracing::info!(model = %model.kind(), entities = total, "ranking entities");

        let entries = self.pool.install(|| {
            candidates
                .par_iter()
                .map(|entity| {
                    let score = model.score(prepared, graph, entity)?;
                    let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                    if n % progress_step == 0 {
                        tracing::info!(model = %model.kind(), ranked = n, of = total, "ranking progress");
                    }
                    Ok(RankingEntry::new(score, entity.clone()))
                })
                .collect::<RankResult<Vec<_>>>()
        })?;
        Ok(Ranking::from_entries(entries))
    }

    /// Full per-model pipeline for a query: [`RetrievalModel::prepare`]
    /// followed by [`Ranker::rank_prepared`].
    pub fn rank_query<M: RetrievalModel>(
        &self,
        model: &M,
        graph: &dyn GraphAdapter,
        query: &Query,
        candidates: &[Entity],
    ) -> RankResult<ModelRanking> {
        let prepared = model.prepare(graph, query)?;
        self.rank_prepared(model, &prepared, graph, query, candidates)
    }

    /// Ranks candidates together with the examples, evaluates how well the
    /// examples were recovered, and returns the normalized candidate-only
    /// ranking.
    ///
    /// The self-evaluation inspects the top `K` positions, where `K` is the
    /// number of distinct examples capped by the configured depth, so every
    /// example missing from the top `K` costs precision.
    pub fn rank_prepared<M: RetrievalModel>(
        &self,
        model: &M,
        prepared: &M::Prepared,
        graph: &dyn GraphAdapter,
        query: &Query,
        candidates: &[Entity],
    ) -> RankResult<ModelRanking> {
        let examples: HashSet<Entity> = query.examples.iter().cloned().collect();
        let mut seen = HashSet::new();
        let pool: Vec<Entity> = candidates
            .iter()
            .chain(query.examples.iter())
            .filter(|e| seen.insert((*e).clone()))
            .cloned()
            .collect();
        let removed = candidates.iter().filter(|c| examples.contains(*c)).count();
        if removed > 0 {
            tracing::debug!(removed, "examples listed as candidates are ranked as examples");
        }
        if pool.is_empty() {
            return Err(RankError::invalid("nothing to rank"));
        }

        let merged = self.rank(model, prepared, graph, &pool)?;

        let depth = self
            .self_evaluation_depth
            .min(examples.len())
            .min(merged.len());
        let relevance = merged.relevance(depth, &examples);
        let self_evaluation = Evaluator::evaluate(&relevance)?;
        tracing::info!(
            model = %model.kind(),
            depth,
            r_precision = %score::format_fixed(&self_evaluation.r_precision, 5),
            avg_prec = %score::format_fixed(&self_evaluation.avg_prec, 5),
            "self-evaluation on examples"
        );

        let ranking = merged
            .filtered(|e| !examples.contains(&e.entity))
            .normalized();
        Ok(ModelRanking {
            model: model.kind(),
            ranking,
            self_evaluation,
        })
    }
}
