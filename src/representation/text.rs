//! Text representation: three term-frequency bags per entity.
//!
//! Every outgoing triple of the entity contributes tokens to one bag:
//!
//! - **attributes**: literal objects in an accepted language
//! - **types**: labels of objects reached through a type predicate
//!   (`rdf:type`, `skos:subject`, `dc:subject` by default)
//! - **links**: labels of all other object entities
//!
//! Objects without a label and blank objects are skipped.

use std::collections::{HashMap, HashSet};

use crate::graph::{Entity, GraphAdapter, GraphResult, LanguageFilter, Node};

use super::tokenize;

/// One of the three text bags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bag {
    Attributes,
    Types,
    Links,
}

impl Bag {
    pub const ALL: [Bag; 3] = [Bag::Attributes, Bag::Types, Bag::Links];

    pub fn name(self) -> &'static str {
        match self {
            Bag::Attributes => "attributes",
            Bag::Types => "types",
            Bag::Links => "links",
        }
    }
}

impl std::fmt::Display for Bag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Term frequencies of an entity, per bag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextRepresentation {
    attributes: HashMap<String, u64>,
    types: HashMap<String, u64>,
    links: HashMap<String, u64>,
    lengths: [u64; 3],
}

impl TextRepresentation {
    fn index(bag: Bag) -> usize {
        match bag {
            Bag::Attributes => 0,
            Bag::Types => 1,
            Bag::Links => 2,
        }
    }

    /// The term → frequency map of a bag.
    pub fn bag(&self, bag: Bag) -> &HashMap<String, u64> {
        match bag {
            Bag::Attributes => &self.attributes,
            Bag::Types => &self.types,
            Bag::Links => &self.links,
        }
    }

    /// Frequency of `term` in `bag`.
    pub fn tf(&self, bag: Bag, term: &str) -> u64 {
        self.bag(bag).get(term).copied().unwrap_or(0)
    }

    /// Total number of terms in `bag`.
    pub fn length(&self, bag: Bag) -> u64 {
        self.lengths[Self::index(bag)]
    }

    fn add_tokens(&mut self, bag: Bag, text: &str) {
        let tokens = tokenize(text);
        self.lengths[Self::index(bag)] += tokens.len() as u64;
        let counts = match bag {
            Bag::Attributes => &mut self.attributes,
            Bag::Types => &mut self.types,
            Bag::Links => &mut self.links,
        };
        for token in tokens {
            *counts.entry(token).or_insert(0) += 1;
        }
    }
}

/// Builds [`TextRepresentation`]s from graph state.
#[derive(Debug, Clone)]
pub struct TextRepresentationBuilder {
    languages: LanguageFilter,
    type_predicates: HashSet<Entity>,
    threshold: u64,
}

impl TextRepresentationBuilder {
    pub fn new(
        languages: LanguageFilter,
        type_predicates: impl IntoIterator<Item = Entity>,
        threshold: usize,
    ) -> Self {
        Self {
            languages,
            type_predicates: type_predicates.into_iter().collect(),
            threshold: threshold as u64,
        }
    }

    /// Build the representation of `entity`.
    pub fn build(
        &self,
        graph: &dyn GraphAdapter,
        entity: &Entity,
    ) -> GraphResult<TextRepresentation> {
        let mut repr = TextRepresentation::default();
        let mut missing_labels = 0usize;

        for (predicate, object) in graph.predicate_objects(entity)? {
            match object {
                Node::Literal(literal) => {
                    if !self.languages.accepts(&literal) {
                        continue;
                    }
                    repr.add_tokens(Bag::Attributes, &literal.value);
                }
                Node::Entity(target) => {
                    let label = match graph.label(&target)? {
                        Some(label) if !label.value.trim().is_empty() => label,
                        _ => {
                            missing_labels += 1;
                            continue;
                        }
                    };
                    let bag = if self.type_predicates.contains(&predicate) {
                        Bag::Types
                    } else {
                        Bag::Links
                    };
                    repr.add_tokens(bag, &label.value);
                }
                Node::Blank(_) => continue,
            }

            if Bag::ALL.iter().all(|&b| repr.length(b) >= self.threshold) {
                break;
            }
        }

        if missing_labels > 0 {
            tracing::debug!(%entity, missing_labels, "skipped objects without label");
        }
        tracing::debug!(
            %entity,
            attributes = repr.length(Bag::Attributes),
            types = repr.length(Bag::Types),
            links = repr.length(Bag::Links),
            "text representation"
        );
        Ok(repr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::index::MemoryGraph;
    use crate::graph::{vocab, Literal};

    const PARIS: &str = "http://example.org/Paris";
    const FRANCE: &str = "http://example.org/France";
    const CITY: &str = "http://example.org/City";
    const NOLABEL: &str = "http://example.org/NoLabel";
    const DESC: &str = "http://example.org/description";
    const COUNTRY: &str = "http://example.org/country";

    fn builder(threshold: usize) -> TextRepresentationBuilder {
        TextRepresentationBuilder::new(
            LanguageFilter::default(),
            [vocab::RDF_TYPE, vocab::SKOS_SUBJECT, vocab::DC_SUBJECT].map(Entity::new),
            threshold,
        )
    }

    fn fixture() -> MemoryGraph {
        let kg = MemoryGraph::new();
        kg.add_literal(PARIS, DESC, Literal::tagged("Capital city of France", "en"));
        kg.add_literal(PARIS, DESC, Literal::tagged("Hauptstadt", "de"));
        kg.add_link(PARIS, vocab::RDF_TYPE, CITY);
        kg.add_link(PARIS, COUNTRY, FRANCE);
        kg.add_link(PARIS, COUNTRY, NOLABEL);
        kg.insert(
            Node::Entity(Entity::new(PARIS)),
            Entity::new(COUNTRY),
            Node::Blank("b0".into()),
        );
        kg.add_label(CITY, Literal::tagged("Big City", "en"));
        kg.add_label(FRANCE, Literal::tagged("France", "en"));
        kg
    }

    #[test]
    fn routes_terms_into_bags() {
        let kg = fixture();
        let repr = builder(999).build(&kg, &Entity::new(PARIS)).unwrap();

        assert_eq!(repr.tf(Bag::Attributes, "capital"), 1);
        assert_eq!(repr.tf(Bag::Attributes, "france"), 1);
        assert_eq!(repr.tf(Bag::Attributes, "hauptstadt"), 0);
        assert_eq!(repr.length(Bag::Attributes), 4);

        assert_eq!(repr.tf(Bag::Types, "city"), 1);
        assert_eq!(repr.tf(Bag::Types, "big"), 1);
        assert_eq!(repr.length(Bag::Types), 2);

        assert_eq!(repr.tf(Bag::Links, "france"), 1);
        assert_eq!(repr.length(Bag::Links), 1);
    }

    #[test]
    fn unknown_entity_is_empty() {
        let kg = fixture();
        let repr = builder(999).build(&kg, &Entity::new("http://example.org/none")).unwrap();
        for bag in Bag::ALL {
            assert_eq!(repr.length(bag), 0);
            assert!(repr.bag(bag).is_empty());
        }
    }

    #[test]
    fn threshold_stops_early_only_when_all_bags_full() {
        let kg = fixture();
        // every bag is already full after the last useful triple
        let full = builder(999).build(&kg, &Entity::new(PARIS)).unwrap();
        let capped = builder(1).build(&kg, &Entity::new(PARIS)).unwrap();
        assert_eq!(full, capped);

        let kg = MemoryGraph::new();
        kg.add_literal(PARIS, DESC, Literal::plain("one"));
        kg.add_link(PARIS, vocab::RDF_TYPE, CITY);
        kg.add_link(PARIS, COUNTRY, FRANCE);
        kg.add_literal(PARIS, DESC, Literal::plain("two"));
        kg.add_label(CITY, Literal::plain("city"));
        kg.add_label(FRANCE, Literal::plain("france"));
        let capped = builder(1).build(&kg, &Entity::new(PARIS)).unwrap();
        assert_eq!(capped.tf(Bag::Attributes, "two"), 0);
        assert_eq!(capped.length(Bag::Attributes), 1);
    }
}
