//! Knowledge graph access: the RDF data model and the [`GraphAdapter`] seam.
//!
//! The ranking engine never talks to a triple store directly. It consumes the
//! narrow [`GraphAdapter`] trait, implemented here by three backends:
//!
//! - **In-memory** ([`index::MemoryGraph`]): `petgraph` + `DashMap`, used by tests
//!   and programmatic callers
//! - **Local files** ([`sparql::OxigraphGraph`]): triple files loaded into `oxigraph`
//! - **Remote endpoint** ([`remote::RemoteGraph`]): SPARQL over HTTP

pub mod index;
pub mod remote;
pub mod sparql;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Result type for graph operations.
pub type GraphResult<T> = std::result::Result<T, GraphError>;

/// Well-known vocabulary IRIs.
pub mod vocab {
    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const RDFS_LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";
    pub const SKOS_SUBJECT: &str = "http://www.w3.org/2004/02/skos/core#subject";
    pub const DC_SUBJECT: &str = "http://purl.org/dc/elements/1.1/subject";
    /// Prefix prepended to bare entity names on the command line.
    pub const DBPEDIA_RESOURCE: &str = "http://dbpedia.org/resource/";
}

/// An IRI-identified entity. Cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entity(Arc<str>);

impl Entity {
    /// Wrap an IRI. No validation is performed; backends reject IRIs they cannot use.
    pub fn new(iri: impl AsRef<str>) -> Self {
        Self(Arc::from(iri.as_ref()))
    }

    /// Parse a user-supplied entity reference.
    ///
    /// Surrounding `<...>` is trimmed and bare names are resolved against
    /// the DBpedia resource namespace.
    pub fn parse_lenient(input: &str) -> Self {
        let mut text = input.trim();
        if let Some(inner) = text.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
            tracing::warn!(entity = inner, "entity starts with `<`, trimming");
            text = inner;
        }
        if text.starts_with("http://") || text.starts_with("https://") {
            Self::new(text)
        } else {
            tracing::warn!(
                entity = text,
                prefix = vocab::DBPEDIA_RESOURCE,
                "entity is not an IRI, prepending prefix"
            );
            Self::new(format!("{}{text}", vocab::DBPEDIA_RESOURCE))
        }
    }

    /// The IRI as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Entity {
    fn from(iri: &str) -> Self {
        Self::new(iri)
    }
}

/// A text value with an optional language tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Literal {
    pub value: String,
    pub language: Option<String>,
}

impl Literal {
    /// A literal without a language tag.
    pub fn plain(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            language: None,
        }
    }

    /// A language-tagged literal.
    pub fn tagged(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            language: Some(language.into()),
        }
    }
}

/// An RDF node as seen by the representation builders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Node {
    Entity(Entity),
    Literal(Literal),
    /// Anonymous node, identified only within its graph.
    Blank(String),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Entity(e) => write!(f, "<{e}>"),
            Node::Literal(Literal {
                value,
                language: Some(lang),
            }) => write!(f, "{value:?}@{lang}"),
            Node::Literal(Literal {
                value,
                language: None,
            }) => write!(f, "{value:?}"),
            Node::Blank(id) => write!(f, "_:{id}"),
        }
    }
}

/// A triple inside a set representation.
///
/// `subject == None` marks a literal attribute of the entity under
/// representation, so equal attributes of different entities compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Triple {
    pub subject: Option<Entity>,
    pub predicate: Entity,
    pub object: Node,
}

impl Triple {
    pub fn new(subject: Option<Entity>, predicate: Entity, object: Node) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

/// Accepted literal languages. The empty string stands for "no tag".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageFilter {
    accepted: Vec<String>,
}

impl LanguageFilter {
    pub fn new<I, S>(accepted: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            accepted: accepted.into_iter().map(|s| s.into().to_lowercase()).collect(),
        }
    }

    /// Whether a literal's language tag is accepted.
    pub fn accepts(&self, literal: &Literal) -> bool {
        let tag = literal.language.as_deref().unwrap_or("").to_lowercase();
        self.accepted.iter().any(|a| *a == tag)
    }

    /// Preference rank of a literal's language (lower is better), `None` if rejected.
    pub fn rank(&self, literal: &Literal) -> Option<usize> {
        let tag = literal.language.as_deref().unwrap_or("").to_lowercase();
        self.accepted.iter().position(|a| *a == tag)
    }

    pub fn languages(&self) -> &[String] {
        &self.accepted
    }
}

impl Default for LanguageFilter {
    fn default() -> Self {
        Self::new(["en", "pl", ""])
    }
}

/// Read-only access to a knowledge graph.
///
/// Implementations must be shareable across the scoring worker pool.
pub trait GraphAdapter: Send + Sync {
    /// `(predicate, object)` pairs of every triple with `entity` as subject.
    fn predicate_objects(&self, entity: &Entity) -> GraphResult<Vec<(Entity, Node)>>;

    /// `(subject, predicate)` pairs of every triple with `entity` as object.
    fn subject_predicates(&self, entity: &Entity) -> GraphResult<Vec<(Node, Entity)>>;

    /// Human-readable label, in the backend's language preference order.
    fn label(&self, entity: &Entity) -> GraphResult<Option<Literal>>;

    /// Total number of triples.
    fn size(&self) -> GraphResult<u64>;

    /// Token identifying the current graph contents; changes on every mutation.
    fn snapshot(&self) -> u64 {
        0
    }
}

impl<G: GraphAdapter + ?Sized> GraphAdapter for Arc<G> {
    fn predicate_objects(&self, entity: &Entity) -> GraphResult<Vec<(Entity, Node)>> {
        (**self).predicate_objects(entity)
    }

    fn subject_predicates(&self, entity: &Entity) -> GraphResult<Vec<(Node, Entity)>> {
        (**self).subject_predicates(entity)
    }

    fn label(&self, entity: &Entity) -> GraphResult<Option<Literal>> {
        (**self).label(entity)
    }

    fn size(&self) -> GraphResult<u64> {
        (**self).size()
    }

    fn snapshot(&self) -> u64 {
        (**self).snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lenient_entity_parsing() {
        assert_eq!(
            Entity::parse_lenient("<http://example.org/a>").as_str(),
            "http://example.org/a"
        );
        assert_eq!(
            Entity::parse_lenient("Paris").as_str(),
            "http://dbpedia.org/resource/Paris"
        );
        assert_eq!(
            Entity::parse_lenient("  https://x.org/b ").as_str(),
            "https://x.org/b"
        );
    }

    #[test]
    fn language_filter() {
        let filter = LanguageFilter::default();
        assert!(filter.accepts(&Literal::plain("x")));
        assert!(filter.accepts(&Literal::tagged("x", "EN")));
        assert!(!filter.accepts(&Literal::tagged("x", "de")));
        assert_eq!(filter.rank(&Literal::tagged("x", "pl")), Some(1));
        assert_eq!(filter.rank(&Literal::plain("x")), Some(2));
    }

    #[test]
    fn literal_triples_compare_by_value() {
        let p = Entity::new("http://example.org/name");
        let a = Triple::new(None, p.clone(), Node::Literal(Literal::plain("x")));
        let b = Triple::new(None, p, Node::Literal(Literal::plain("x")));
        assert_eq!(a, b);
    }
}
