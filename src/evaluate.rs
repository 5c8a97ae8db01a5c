//! Ranking quality metrics.
//!
//! Both metrics are computed over a boolean relevance sequence of length `N`
//! holding `H` relevant positions:
//!
//! ```text
//! R-Precision = H / N
//! AvgPrec     = (1/H) · Σ_{i relevant} hits_so_far(i) / i     (0 if H = 0)
//! ```
//!
//! They serve two purposes: reporting quality against a sample's relevant
//! set, and driving [`RankFusion`](crate::fusion::RankFusion) through each
//! model's self-evaluation.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::Serialize;

use crate::error::{RankError, RankResult};
use crate::graph::Entity;
use crate::rank::Ranking;
use crate::score::{self, Probability};

/// R-Precision and Average Precision of one relevance sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EvaluationResult {
    #[serde(serialize_with = "score::serialize_f64")]
    pub r_precision: Probability,
    #[serde(serialize_with = "score::serialize_f64")]
    pub avg_prec: Probability,
}

/// Stateless metric computation.
pub struct Evaluator;

impl Evaluator {
    /// Metrics for a relevance sequence. An empty sequence is invalid.
    pub fn evaluate(relevance: &[bool]) -> RankResult<EvaluationResult> {
        if relevance.is_empty() {
            return Err(RankError::invalid(
                "cannot evaluate an empty relevance sequence",
            ));
        }
        let n = relevance.len() as u64;

        let mut hits = 0u64;
        let mut precision_sum = score::zero();
        for (i, &relevant) in relevance.iter().enumerate() {
            if relevant {
                hits += 1;
                precision_sum += score::ratio(hits, i as u64 + 1);
            }
        }

        let avg_prec = if hits == 0 {
            score::zero()
        } else {
            precision_sum / score::integer(hits)
        };
        Ok(EvaluationResult {
            r_precision: score::ratio(hits, n),
            avg_prec,
        })
    }

    /// Metrics of the top `limit` positions of `ranking` against a relevant set.
    ///
    /// A ranking shorter than `limit` counts its missing positions as
    /// non-relevant, so `N` is always `limit`.
    pub fn evaluate_ranking(
        ranking: &Ranking,
        relevant: &HashSet<Entity>,
        limit: usize,
    ) -> RankResult<EvaluationResult> {
        let mut relevance = ranking.relevance(limit, relevant);
        relevance.resize(limit, false);
        Self::evaluate(&relevance)
    }
}

/// A ranking method reported by an evaluation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Text,
    Example,
    Fused,
}

impl Method {
    pub const ALL: [Method; 3] = [Method::Text, Method::Example, Method::Fused];
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Text => f.write_str("text-based"),
            Method::Example => f.write_str("example-based"),
            Method::Fused => f.write_str("fused"),
        }
    }
}

/// Running sums for mean metrics per method.
#[derive(Debug, Clone, Default)]
pub struct MeanStats {
    sums: BTreeMap<Method, (Probability, Probability, u64)>,
}

impl MeanStats {
    pub fn add(&mut self, method: Method, result: &EvaluationResult) {
        let entry = self
            .sums
            .entry(method)
            .or_insert_with(|| (score::zero(), score::zero(), 0));
        entry.0 += &result.r_precision;
        entry.1 += &result.avg_prec;
        entry.2 += 1;
    }

    /// Mean metrics of `method`, if anything was added for it.
    pub fn mean(&self, method: Method) -> Option<EvaluationResult> {
        let (r_precision, avg_prec, count) = self.sums.get(&method)?;
        let count = score::integer(*count);
        Some(EvaluationResult {
            r_precision: r_precision / &count,
            avg_prec: avg_prec / &count,
        })
    }

    /// Means of every method seen so far.
    pub fn means(&self) -> BTreeMap<Method, EvaluationResult> {
        self.sums
            .keys()
            .filter_map(|&m| self.mean(m).map(|r| (m, r)))
            .collect()
    }

    pub fn samples(&self, method: Method) -> u64 {
        self.sums.get(&method).map(|s| s.2).unwrap_or(0)
    }
}
