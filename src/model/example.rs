//! Example-based retrieval: weighted triple-set overlap with the examples.
//!
//! Each example `x` is turned into its set representation. For every triple
//! `tr` seen in any example:
//!
//! ```text
//! n(tr, x)        = 1 if tr ∈ x else 0
//! P(tr|θ_X)       = Σ_x n(tr, x) / Σ_{x' ∈ X} Σ_{tr' ∈ x'} Σ_x n(tr', x)
//! P(e|θ_X)        = Σ_tr P(tr|θ_X) · [tr ∈ e]
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{RankError, RankResult};
use crate::graph::{Entity, GraphAdapter, Triple};
use crate::representation::{SetRepresentation, SetRepresentationCache};
use crate::score::{self, Probability};

use super::{ModelKind, Query, RetrievalModel};

/// `Triple → P(tr|θ_X)`, computed once per query.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PreparsedExampleWeights {
    weights: HashMap<Triple, Probability>,
}

impl PreparsedExampleWeights {
    pub fn get(&self, triple: &Triple) -> Option<&Probability> {
        self.weights.get(triple)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Triple, &Probability)> {
        self.weights.iter()
    }

    /// Compute weights from example set representations.
    pub fn from_representations(examples: &[Arc<SetRepresentation>]) -> RankResult<Self> {
        if examples.is_empty() {
            return Err(RankError::invalid("no example entities given"));
        }

        let mut nominators: HashMap<&Triple, u64> = HashMap::new();
        for triple in examples.iter().flat_map(|x| x.iter()) {
            if nominators.contains_key(triple) {
                continue;
            }
            let count = examples.iter().filter(|x| x.contains(triple)).count() as u64;
            nominators.insert(triple, count);
        }

        // every (owning example, triple) enumeration adds the triple's nominator
        let denominator: u64 = examples
            .iter()
            .flat_map(|x| x.iter())
            .map(|triple| nominators[triple])
            .sum();
        tracing::debug!(examples = examples.len(), triples = nominators.len(), denominator, "preparsed examples");

        if denominator == 0 {
            return Err(RankError::invalid(
                "example entities have no triples in the graph",
            ));
        }

        let weights = nominators
            .into_iter()
            .map(|(triple, nominator)| (triple.clone(), score::ratio(nominator, denominator)))
            .collect();
        Ok(Self { weights })
    }

    /// `P(e|θ_X)` for an entity's set representation.
    pub fn score(&self, representation: &SetRepresentation) -> Probability {
        let mut total = score::zero();
        // iterate the smaller side
        if representation.len() < self.weights.len() {
            for triple in representation.iter() {
                if let Some(w) = self.weights.get(triple) {
                    total += w;
                }
            }
        } else {
            for (triple, w) in &self.weights {
                if representation.contains(triple) {
                    total += w;
                }
            }
        }
        total
    }
}

/// Set-overlap scorer sharing a session-owned representation cache.
#[derive(Debug, Clone)]
pub struct ExampleRetrievalModel {
    cache: Arc<SetRepresentationCache>,
}

impl ExampleRetrievalModel {
    pub fn new(cache: Arc<SetRepresentationCache>) -> Self {
        Self { cache }
    }

    /// Preparse a list of examples into triple weights.
    pub fn examples_preparsing(
        &self,
        graph: &dyn GraphAdapter,
        examples: &[Entity],
    ) -> RankResult<PreparsedExampleWeights> {
        tracing::debug!(examples = examples.len(), "preparsing examples");
        let representations = examples
            .iter()
            .map(|example| self.cache.get_or_build(graph, example))
            .collect::<RankResult<Vec<_>>>()?;
        PreparsedExampleWeights::from_representations(&representations)
    }
}

impl RetrievalModel for ExampleRetrievalModel {
    type Prepared = PreparsedExampleWeights;

    fn kind(&self) -> ModelKind {
        ModelKind::Example
    }

    fn prepare(
        &self,
        graph: &dyn GraphAdapter,
        query: &Query,
    ) -> RankResult<PreparsedExampleWeights> {
        self.examples_preparsing(graph, &query.examples)
    }

    fn score(
        &self,
        prepared: &PreparsedExampleWeights,
        graph: &dyn GraphAdapter,
        entity: &Entity,
    ) -> RankResult<Probability> {
        let representation = self.cache.get_or_build(graph, entity)?;
        let p = prepared.score(&representation);
        tracing::debug!(%entity, p = %score::format_fixed(&p, 5), "example probability");
        Ok(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::index::MemoryGraph;
    use crate::graph::{Literal, Node};
    use crate::representation::SetRepresentationBuilder;

    const E1: &str = "http://example.org/E1";
    const E2: &str = "http://example.org/E2";
    const E3: &str = "http://example.org/E3";
    const LONELY: &str = "http://example.org/Lonely";
    const TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    const CITY: &str = "http://example.org/City";
    const IN: &str = "http://example.org/in";
    const EUROPE: &str = "http://example.org/Europe";
    const ASIA: &str = "http://example.org/Asia";

    fn fixture() -> MemoryGraph {
        let kg = MemoryGraph::new();
        kg.add_link(E1, TYPE, CITY);
        kg.add_link(E1, IN, EUROPE);
        kg.add_link(E2, TYPE, CITY);
        kg.add_link(E2, IN, ASIA);
        kg.add_link(E3, TYPE, CITY);
        kg.add_link(E3, IN, EUROPE);
        kg.add_literal(LONELY, "http://example.org/name", Literal::plain("x"));
        kg
    }

    fn model() -> ExampleRetrievalModel {
        ExampleRetrievalModel::new(Arc::new(SetRepresentationCache::new(
            SetRepresentationBuilder::default(),
            64,
        )))
    }

    fn link(s: &str, p: &str, o: &str) -> Triple {
        Triple::new(Some(Entity::new(s)), Entity::new(p), Node::Entity(Entity::new(o)))
    }

    #[test]
    fn weights_follow_membership_counts() {
        let kg = fixture();
        let weights = model()
            .examples_preparsing(&kg, &[Entity::new(E1), Entity::new(E2)])
            .unwrap();
        // subjects differ, so no triple is shared: four triples, each counted once
        assert_eq!(weights.len(), 4);
        assert_eq!(weights.get(&link(E1, TYPE, CITY)), Some(&score::ratio(1, 4)));
    }

    #[test]
    fn shared_literal_triples_weigh_more() {
        let kg = MemoryGraph::new();
        let name = "http://example.org/kind";
        kg.add_literal(E1, name, Literal::plain("city"));
        kg.add_literal(E2, name, Literal::plain("city"));
        kg.add_literal(E2, name, Literal::plain("port"));
        let weights = model()
            .examples_preparsing(&kg, &[Entity::new(E1), Entity::new(E2)])
            .unwrap();
        let city = Triple::new(None, Entity::new(name), Node::Literal(Literal::plain("city")));
        let port = Triple::new(None, Entity::new(name), Node::Literal(Literal::plain("port")));
        // nominators: city=2, port=1; denominator = 2 (E1: city) + 2 + 1 (E2: city, port) = 5
        assert_eq!(weights.get(&city), Some(&score::ratio(2, 5)));
        assert_eq!(weights.get(&port), Some(&score::ratio(1, 5)));
    }

    #[test]
    fn identical_entity_beats_disjoint_entity() {
        let kg = fixture();
        let m = model();
        let prepared = m.prepare(&kg, &Query::new("", [Entity::new(E1)])).unwrap();
        let same = m.score(&prepared, &kg, &Entity::new(E1)).unwrap();
        let disjoint = m.score(&prepared, &kg, &Entity::new(LONELY)).unwrap();
        assert_eq!(same, score::one());
        assert_eq!(disjoint, score::zero());
        assert!(same >= disjoint);
    }

    #[test]
    fn inlink_overlap_is_scored() {
        let kg = fixture();
        let m = model();
        // Europe's set holds E1→Europe and E3→Europe
        let prepared = m.prepare(&kg, &Query::new("", [Entity::new(EUROPE)])).unwrap();
        let e1 = m.score(&prepared, &kg, &Entity::new(E1)).unwrap();
        let e2 = m.score(&prepared, &kg, &Entity::new(E2)).unwrap();
        assert_eq!(e1, score::ratio(1, 2));
        assert_eq!(e2, score::zero());
    }

    #[test]
    fn scores_within_unit_interval() {
        let kg = fixture();
        let m = model();
        let prepared = m
            .prepare(&kg, &Query::new("", [Entity::new(CITY), Entity::new(E1), Entity::new(EUROPE)]))
            .unwrap();
        for e in [E1, E2, E3, LONELY, CITY, EUROPE, ASIA] {
            let p = m.score(&prepared, &kg, &Entity::new(e)).unwrap();
            assert!(p >= score::zero() && p <= score::one(), "{e}");
        }
    }

    #[test]
    fn preparsing_is_deterministic() {
        let kg = fixture();
        let examples = [Entity::new(E1), Entity::new(E3), Entity::new(CITY)];
        let first = model().examples_preparsing(&kg, &examples).unwrap();
        let second = model().examples_preparsing(&kg, &examples).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_or_tripleless_examples_are_invalid() {
        let kg = fixture();
        let m = model();
        assert!(matches!(
            m.examples_preparsing(&kg, &[]),
            Err(RankError::InvalidInput { .. })
        ));
        assert!(matches!(
            m.examples_preparsing(&kg, &[Entity::new("http://example.org/unknown")]),
            Err(RankError::InvalidInput { .. })
        ));
    }
}
