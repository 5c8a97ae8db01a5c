//! Rank fusion of the text-based and example-based rankings.
//!
//! The two models are compared through the Average Precision they reach when
//! ranking their own examples. When one model clearly outperforms the other
//! its ranking is returned as is; otherwise normalized scores are blended:
//!
//! ```text
//! overlap  = min(AP) / max(AP)
//! score(e) = λ·example(e) + (1 − λ)·text(e)
//! ```

use std::collections::HashMap;

use serde::Serialize;

use crate::config::{ConfigResult, SearchConfig};
use crate::graph::Entity;
use crate::rank::{ModelRanking, Ranking, RankingEntry};
use crate::score::{self, Probability};

/// How a fused ranking was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionStrategy {
    /// The example-based model clearly won.
    ExampleOnly,
    /// The text-based model clearly won.
    TextOnly,
    /// Weighted blend of both normalized rankings.
    Blended,
    /// Neither model recovered a single example; example ranking used.
    ExampleFallback,
}

impl std::fmt::Display for FusionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FusionStrategy::ExampleOnly => "example-based only",
            FusionStrategy::TextOnly => "text-based only",
            FusionStrategy::Blended => "blended",
            FusionStrategy::ExampleFallback => "example-based fallback",
        };
        f.write_str(name)
    }
}

/// Output of [`RankFusion::fuse`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FusedRanking {
    pub strategy: FusionStrategy,
    pub ranking: Ranking,
}

/// AP-driven fusion rule.
#[derive(Debug, Clone)]
pub struct RankFusion {
    delta: Probability,
    lambda: Probability,
}

impl RankFusion {
    pub fn new(delta: Probability, lambda: Probability) -> Self {
        Self { delta, lambda }
    }

    pub fn from_config(config: &SearchConfig) -> ConfigResult<Self> {
        Ok(Self::new(config.exact_delta()?, config.exact_lambda()?))
    }

    /// Fuse the example-based and text-based rankings.
    pub fn fuse(&self, example: &ModelRanking, text: &ModelRanking) -> FusedRanking {
        let ap_example = example.avg_prec();
        let ap_text = text.avg_prec();
        let zero = score::zero();

        if *ap_example == zero && *ap_text == zero {
            tracing::warn!("both models failed to recover any example, using example-based ranking");
            return FusedRanking {
                strategy: FusionStrategy::ExampleFallback,
                ranking: example.ranking.clone(),
            };
        }

        let (min, max) = if ap_example <= ap_text {
            (ap_example, ap_text)
        } else {
            (ap_text, ap_example)
        };
        let overlap = min / max;
        tracing::info!(
            ap_example = %score::format_fixed(ap_example, 5),
            ap_text = %score::format_fixed(ap_text, 5),
            overlap = %score::format_fixed(&overlap, 5),
            "fusing rankings"
        );

        if overlap < self.delta && ap_example != ap_text {
            let (strategy, winner) = if ap_example > ap_text {
                (FusionStrategy::ExampleOnly, example)
            } else {
                (FusionStrategy::TextOnly, text)
            };
            tracing::info!(%strategy, "one model clearly outperforms the other");
            return FusedRanking {
                strategy,
                ranking: winner.ranking.clone(),
            };
        }

        FusedRanking {
            strategy: FusionStrategy::Blended,
            ranking: self.blend(&example.ranking, &text.ranking),
        }
    }

    /// `λ·example + (1 − λ)·text`, missing entries contributing 0.
    fn blend(&self, example: &Ranking, text: &Ranking) -> Ranking {
        let text_weight = score::one() - &self.lambda;
        let mut fused: HashMap<Entity, Probability> = HashMap::new();
        for entry in example {
            *fused.entry(entry.entity.clone()).or_insert_with(score::zero) +=
                &entry.score * &self.lambda;
        }
        for entry in text {
            *fused.entry(entry.entity.clone()).or_insert_with(score::zero) +=
                &entry.score * &text_weight;
        }
        Ranking::from_entries(
            fused
                .into_iter()
                .map(|(entity, score)| RankingEntry::new(score, entity))
                .collect(),
        )
    }
}

impl Default for RankFusion {
    fn default() -> Self {
        Self::new(score::ratio(1, 10), score::ratio(1, 2))
    }
}
