//! Search session: top-level API of the ranking engine.
//!
//! A [`SearchSession`] owns one graph, the set representation cache, the
//! scoring worker pool and both retrieval models. Every query goes through
//! validation first, so malformed input never reaches the scorers.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::Serialize;

use crate::config::SearchConfig;
use crate::error::{ConfigError, RankError, RankResult, SearchResult};
use crate::evaluate::{EvaluationResult, Evaluator, MeanStats, Method};
use crate::fusion::{FusedRanking, RankFusion};
use crate::graph::{Entity, GraphAdapter};
use crate::model::{ExampleRetrievalModel, Query, RetrievalModel, TextRetrievalModel};
use crate::rank::{ModelRanking, Ranker, Ranking};
use crate::representation::{
    tokenize, SetRepresentationBuilder, SetRepresentationCache, TextRepresentationBuilder,
};
use crate::sample::PreparedSample;
use crate::score;

/// Rankings of one query by every method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchOutcome {
    pub query: Query,
    pub text: ModelRanking,
    pub example: ModelRanking,
    pub fused: FusedRanking,
}

impl SearchOutcome {
    /// The ranking produced by `method`.
    pub fn ranking(&self, method: Method) -> &Ranking {
        match method {
            Method::Text => &self.text.ranking,
            Method::Example => &self.example.ranking,
            Method::Fused => &self.fused.ranking,
        }
    }
}

/// Metrics of every method on one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleEvaluation {
    pub topic: String,
    /// Number of top positions evaluated (the count of held-out relevant entities).
    pub limit: usize,
    pub metrics: BTreeMap<Method, EvaluationResult>,
    pub outcome: SearchOutcome,
}

/// Metrics over a batch of samples.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub samples: Vec<SampleEvaluation>,
    pub means: BTreeMap<Method, EvaluationResult>,
}

/// Owns everything needed to answer queries against one graph.
pub struct SearchSession {
    graph: Arc<dyn GraphAdapter>,
    config: SearchConfig,
    pool: rayon::ThreadPool,
    cache: Arc<SetRepresentationCache>,
    text_model: TextRetrievalModel,
    example_model: ExampleRetrievalModel,
    fusion: RankFusion,
}

impl SearchSession {
    /// Create a session over `graph`.
    pub fn new(graph: Arc<dyn GraphAdapter>, config: SearchConfig) -> SearchResult<Self> {
        config.validate()?;

        let mut builder = rayon::ThreadPoolBuilder::new().thread_name(|i| format!("ebes-rank-{i}"));
        if config.workers > 0 {
            builder = builder.num_threads(config.workers);
        }
        let pool = builder.build().map_err(|e| ConfigError::Invalid {
            message: format!("failed to build worker pool: {e}"),
        })?;

        let languages = config.language_filter();
        let cache = Arc::new(SetRepresentationCache::new(
            SetRepresentationBuilder::new(languages.clone()),
            config.cache_capacity,
        ));
        let text_model = TextRetrievalModel::new(
            TextRepresentationBuilder::new(
                languages,
                config.type_predicates(),
                config.text.bag_term_threshold,
            ),
            config.exact_weights()?,
        );
        let example_model = ExampleRetrievalModel::new(Arc::clone(&cache));
        let fusion = RankFusion::from_config(&config)?;

        tracing::info!(
            workers = pool.current_num_threads(),
            cache_capacity = config.cache_capacity,
            self_evaluation_depth = config.self_evaluation_depth,
            "search session ready"
        );

        Ok(Self {
            graph,
            config,
            pool,
            cache,
            text_model,
            example_model,
            fusion,
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn graph(&self) -> &dyn GraphAdapter {
        self.graph.as_ref()
    }

    fn ranker(&self) -> Ranker<'_> {
        Ranker::new(&self.pool, self.config.self_evaluation_depth)
    }

    /// Reject queries the models cannot rank.
    fn validate(query: &Query) -> RankResult<()> {
        if tokenize(&query.relation).is_empty() {
            return Err(RankError::invalid("relation is empty"));
        }
        if query.examples.is_empty() {
            return Err(RankError::invalid("at least one example entity is required"));
        }
        Ok(())
    }

    /// Rank `candidates` with the text-based model.
    pub fn rank_text(&self, query: &Query, candidates: &[Entity]) -> RankResult<ModelRanking> {
        Self::validate(query)?;
        self.ranker()
            .rank_query(&self.text_model, self.graph(), query, candidates)
    }

    /// Rank `candidates` with the example-based model.
    pub fn rank_examples(&self, query: &Query, candidates: &[Entity]) -> RankResult<ModelRanking> {
        Self::validate(query)?;
        self.ranker()
            .rank_query(&self.example_model, self.graph(), query, candidates)
    }

    /// Rank with both models and fuse.
    pub fn search(&self, query: &Query, candidates: &[Entity]) -> RankResult<SearchOutcome> {
        Self::validate(query)?;
        tracing::info!(
            relation = %query.relation,
            examples = query.examples.len(),
            candidates = candidates.len(),
            "searching"
        );
        // both models must accept the query before either scores anything
        let text_query = self.text_model.prepare(self.graph(), query)?;
        let example_weights = self.example_model.prepare(self.graph(), query)?;

        let ranker = self.ranker();
        let text = ranker.rank_prepared(&self.text_model, &text_query, self.graph(), query, candidates)?;
        let example = ranker.rank_prepared(
            &self.example_model,
            &example_weights,
            self.graph(),
            query,
            candidates,
        )?;
        let fused = self.fusion.fuse(&example, &text);
        tracing::info!(strategy = %fused.strategy, entities = fused.ranking.len(), "search done");

        Ok(SearchOutcome {
            query: query.clone(),
            text,
            example,
            fused,
        })
    }

    /// Rank a sample's own entities and evaluate every method against it.
    pub fn evaluate(&self, sample: &PreparedSample) -> RankResult<SampleEvaluation> {
        self.evaluate_against(sample, &sample.entities_to_rank)
    }

    /// Evaluate a batch of samples.
    ///
    /// Every sample ranks the entities of all samples pooled together
    /// (minus its own examples), which makes the runs harder and comparable.
    pub fn evaluate_all(&self, samples: &[PreparedSample]) -> RankResult<EvaluationReport> {
        let mut seen = HashSet::new();
        let pooled: Vec<Entity> = samples
            .iter()
            .flat_map(|s| s.examples.iter().chain(s.entities_to_rank.iter()))
            .filter(|e| seen.insert((*e).clone()))
            .cloned()
            .collect();
        tracing::info!(samples = samples.len(), entities = pooled.len(), "evaluating samples");

        let mut stats = MeanStats::default();
        let mut evaluations = Vec::with_capacity(samples.len());
        for sample in samples {
            let evaluation = self.evaluate_against(sample, &pooled)?;
            for (method, result) in &evaluation.metrics {
                stats.add(*method, result);
            }
            evaluations.push(evaluation);
        }

        Ok(EvaluationReport {
            samples: evaluations,
            means: stats.means(),
        })
    }

    fn evaluate_against(
        &self,
        sample: &PreparedSample,
        candidates: &[Entity],
    ) -> RankResult<SampleEvaluation> {
        let limit = sample.relevant.len();
        if limit == 0 {
            return Err(RankError::invalid(format!(
                "sample `{}` has no relevant entities left after choosing examples",
                sample.topic
            )));
        }

        let outcome = self.search(&sample.query(), candidates)?;
        let relevant = sample.relevant_set();
        let mut metrics = BTreeMap::new();
        for method in Method::ALL {
            let result = Evaluator::evaluate_ranking(outcome.ranking(method), &relevant, limit)?;
            tracing::info!(
                topic = %sample.topic,
                %method,
                r_precision = %score::format_fixed(&result.r_precision, 5),
                avg_prec = %score::format_fixed(&result.avg_prec, 5),
                "sample metrics"
            );
            metrics.insert(method, result);
        }

        Ok(SampleEvaluation {
            topic: sample.topic.clone(),
            limit,
            metrics,
            outcome,
        })
    }

    /// Drop every cached set representation.
    pub fn invalidate_cache(&self) -> RankResult<()> {
        self.cache.clear()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }
}
