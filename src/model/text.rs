//! Text-based retrieval: Dirichlet-smoothed language model over text bags.
//!
//! For relation terms `R` and entity `e`:
//!
//! ```text
//! P(t|θ_c)      = 1 / ni
//! P(t|θ_cs_e)   = (tf(t, cs) + ni·P(t|θ_c)) / (|cs| + ni)
//! P(t|θ_w_e)    = Σ_cs w_cs · P(t|θ_cs_e)
//! P(R|θ_e)      = Π_t P(t|θ_w_e)
//! ```
//!
//! `ni` (the Dirichlet pseudo-count) is the number of triples in the graph,
//! read once per query. The collection model is approximated by the uniform
//! `1/ni` instead of true collection frequencies.

use crate::config::ExactBagWeights;
use crate::error::{RankError, RankResult};
use crate::graph::{Entity, GraphAdapter};
use crate::representation::{tokenize, Bag, TextRepresentation, TextRepresentationBuilder};
use crate::score::{self, Probability};

use super::{ModelKind, Query, RetrievalModel};

/// Preparsed text query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextQuery {
    /// Lowercased relation tokens.
    pub terms: Vec<String>,
    /// Dirichlet pseudo-count.
    pub ni: u64,
}

impl TextQuery {
    pub fn new(relation: &str, ni: u64) -> Self {
        Self {
            terms: tokenize(relation),
            ni,
        }
    }
}

/// Dirichlet language-model scorer.
#[derive(Debug, Clone)]
pub struct TextRetrievalModel {
    builder: TextRepresentationBuilder,
    weights: ExactBagWeights,
}

impl TextRetrievalModel {
    pub fn new(builder: TextRepresentationBuilder, weights: ExactBagWeights) -> Self {
        Self { builder, weights }
    }

    fn weight(&self, bag: Bag) -> &Probability {
        match bag {
            Bag::Attributes => &self.weights.attributes,
            Bag::Types => &self.weights.types,
            Bag::Links => &self.weights.links,
        }
    }

    /// `P(t|θ_w_e)` for a single term.
    pub fn term_probability(
        &self,
        repr: &TextRepresentation,
        term: &str,
        ni: u64,
    ) -> RankResult<Probability> {
        if ni == 0 {
            return Err(RankError::invalid(
                "Dirichlet pseudo-count is zero (empty graph)",
            ));
        }
        let ni_ratio = score::integer(ni);
        let collection = score::ratio(1, ni);
        let smoothing = &ni_ratio * &collection;

        let mut total = score::zero();
        for bag in Bag::ALL {
            let tf = repr.tf(bag, term);
            let numer = score::integer(tf) + &smoothing;
            let denom = score::integer(repr.length(bag)) + &ni_ratio;
            let bag_probability = numer / denom;
            tracing::trace!(
                term,
                %bag,
                tf,
                len = repr.length(bag),
                p = %score::format_fixed(&bag_probability, 5),
                "bag probability"
            );
            total += bag_probability * self.weight(bag);
        }
        Ok(total)
    }

    /// `P(R|θ_e)` for preparsed terms and a built representation.
    ///
    /// An empty term list yields probability `1`.
    pub fn score_representation(
        &self,
        repr: &TextRepresentation,
        terms: &[String],
        ni: u64,
    ) -> RankResult<Probability> {
        if ni == 0 {
            return Err(RankError::invalid(
                "Dirichlet pseudo-count is zero (empty graph)",
            ));
        }
        let mut probability = score::one();
        for term in terms {
            let p = self.term_probability(repr, term, ni)?;
            tracing::trace!(term = term.as_str(), p = %score::format_fixed(&p, 5), "term probability");
            probability *= p;
        }
        Ok(probability)
    }
}

impl RetrievalModel for TextRetrievalModel {
    type Prepared = TextQuery;

    fn kind(&self) -> ModelKind {
        ModelKind::Text
    }

    fn prepare(&self, graph: &dyn GraphAdapter, query: &Query) -> RankResult<TextQuery> {
        let ni = graph.size()?;
        if ni == 0 {
            return Err(RankError::invalid(
                "graph is empty, the text model needs at least one triple",
            ));
        }
        let prepared = TextQuery::new(&query.relation, ni);
        tracing::debug!(terms = ?prepared.terms, ni, "prepared text query");
        Ok(prepared)
    }

    fn score(
        &self,
        prepared: &TextQuery,
        graph: &dyn GraphAdapter,
        entity: &Entity,
    ) -> RankResult<Probability> {
        let repr = self.builder.build(graph, entity)?;
        let p = self.score_representation(&repr, &prepared.terms, prepared.ni)?;
        tracing::debug!(%entity, p = %score::format_fixed(&p, 5), "text probability");
        Ok(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::graph::index::MemoryGraph;
    use crate::graph::{vocab, Literal};

    const E1: &str = "http://example.org/E1";
    const E2: &str = "http://example.org/E2";
    const DESC: &str = "http://example.org/description";

    fn model() -> TextRetrievalModel {
        let config = SearchConfig::default();
        TextRetrievalModel::new(
            TextRepresentationBuilder::new(
                config.language_filter(),
                config.type_predicates(),
                config.text.bag_term_threshold,
            ),
            config.exact_weights().unwrap(),
        )
    }

    fn paris_graph() -> MemoryGraph {
        let kg = MemoryGraph::new();
        kg.add_literal(E1, DESC, Literal::tagged("paris france", "en"));
        kg
    }

    fn repr_of(kg: &MemoryGraph, entity: &str) -> TextRepresentation {
        let config = SearchConfig::default();
        TextRepresentationBuilder::new(config.language_filter(), config.type_predicates(), 999)
            .build(kg, &Entity::new(entity))
            .unwrap()
    }

    #[test]
    fn present_term_beats_absent_term() {
        let kg = paris_graph();
        let repr = repr_of(&kg, E1);
        let m = model();

        let paris = m.term_probability(&repr, "paris", 2).unwrap();
        let london = m.term_probability(&repr, "london", 2).unwrap();
        assert!(paris > london);

        // attributes: (1 + 1)/(2 + 2); types and links: (0 + 1)/(0 + 2)
        let expected = score::ratio(2, 5) * score::ratio(2, 4)
            + score::ratio(2, 5) * score::ratio(1, 2)
            + score::ratio(1, 5) * score::ratio(1, 2);
        assert_eq!(paris, expected);
        // only the smoothing floor remains for an absent term
        let floor = score::ratio(2, 5) * score::ratio(1, 4)
            + score::ratio(2, 5) * score::ratio(1, 2)
            + score::ratio(1, 5) * score::ratio(1, 2);
        assert_eq!(london, floor);
    }

    #[test]
    fn empty_relation_scores_one() {
        let kg = paris_graph();
        let repr = repr_of(&kg, E1);
        assert_eq!(model().score_representation(&repr, &[], 5).unwrap(), score::one());
    }

    #[test]
    fn zero_pseudo_count_is_invalid() {
        let repr = TextRepresentation::default();
        let err = model()
            .score_representation(&repr, &["x".to_string()], 0)
            .unwrap_err();
        assert!(matches!(err, RankError::InvalidInput { .. }));
    }

    #[test]
    fn scores_stay_within_unit_interval() {
        let kg = paris_graph();
        kg.add_literal(E2, DESC, Literal::plain("paris paris paris"));
        kg.add_link(E2, vocab::RDF_TYPE, E1);
        kg.add_label(E1, Literal::plain("paris"));
        let m = model();
        let ni = kg.size().unwrap();
        for relation in ["", "paris", "paris france", "london", "paris paris paris paris"] {
            let terms = tokenize(relation);
            for entity in [E1, E2, "http://example.org/none"] {
                let repr = repr_of(&kg, entity);
                let p = m.score_representation(&repr, &terms, ni).unwrap();
                assert!(p >= score::zero() && p <= score::one(), "{relation} {entity}");
            }
        }
    }

    #[test]
    fn monotone_in_term_frequency() {
        let kg = MemoryGraph::new();
        kg.add_literal(E1, DESC, Literal::plain("paris rome"));
        kg.add_literal(E2, DESC, Literal::plain("paris paris"));
        let m = model();
        let terms = tokenize("paris");
        let one = m.score_representation(&repr_of(&kg, E1), &terms, 2).unwrap();
        let two = m.score_representation(&repr_of(&kg, E2), &terms, 2).unwrap();
        assert!(two > one);
    }

    #[test]
    fn prepare_uses_graph_size_and_rejects_empty_graph() {
        let m = model();
        let query = Query::new("Capital Cities", []);
        let kg = paris_graph();
        let prepared = m.prepare(&kg, &query).unwrap();
        assert_eq!(prepared.terms, vec!["capital", "cities"]);
        assert_eq!(prepared.ni, 1);

        let empty = MemoryGraph::new();
        assert!(matches!(
            m.prepare(&empty, &query),
            Err(RankError::InvalidInput { .. })
        ));
    }

    #[test]
    fn long_products_stay_exact() {
        let kg = paris_graph();
        let repr = repr_of(&kg, E1);
        let m = model();
        let terms: Vec<String> = (0..40).map(|_| "paris".to_string()).collect();
        let p = m.score_representation(&repr, &terms, 2).unwrap();
        let single = m.term_probability(&repr, "paris", 2).unwrap();
        let mut expected = score::one();
        for _ in 0..40 {
            expected *= &single;
        }
        assert_eq!(p, expected);
        assert!(p > score::zero());
    }
}
