//! Set representation: every triple incident to an entity.
//!
//! Outgoing literal attributes are stored with a `None` subject so identical
//! attributes of different entities overlap. Blank nodes are dropped on both
//! sides.
//!
//! Building a set costs two graph round-trips, so sets are kept in a bounded
//! LRU cache tied to one graph snapshot.

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use lru::LruCache;

use crate::error::{RankError, RankResult};
use crate::graph::{Entity, GraphAdapter, GraphResult, LanguageFilter, Node, Triple};

/// The set of triples incident to one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SetRepresentation {
    triples: HashSet<Triple>,
}

impl SetRepresentation {
    pub fn contains(&self, triple: &Triple) -> bool {
        self.triples.contains(triple)
    }

    pub fn len(&self) -> usize {
        self.triples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }
}

impl FromIterator<Triple> for SetRepresentation {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        Self {
            triples: iter.into_iter().collect(),
        }
    }
}

/// Builds [`SetRepresentation`]s from graph state.
#[derive(Debug, Clone, Default)]
pub struct SetRepresentationBuilder {
    languages: LanguageFilter,
}

impl SetRepresentationBuilder {
    pub fn new(languages: LanguageFilter) -> Self {
        Self { languages }
    }

    /// Build the set representation of `entity`, bypassing any cache.
    pub fn build(&self, graph: &dyn GraphAdapter, entity: &Entity) -> GraphResult<SetRepresentation> {
        let mut triples = HashSet::new();

        for (predicate, object) in graph.predicate_objects(entity)? {
            match object {
                Node::Literal(ref literal) => {
                    if self.languages.accepts(literal) {
                        triples.insert(Triple::new(None, predicate, object));
                    }
                }
                Node::Entity(_) => {
                    triples.insert(Triple::new(Some(entity.clone()), predicate, object));
                }
                Node::Blank(_) => {}
            }
        }
        let outlinks = triples.len();

        for (subject, predicate) in graph.subject_predicates(entity)? {
            match subject {
                Node::Entity(subject) => {
                    triples.insert(Triple::new(
                        Some(subject),
                        predicate,
                        Node::Entity(entity.clone()),
                    ));
                }
                Node::Literal(_) | Node::Blank(_) => {}
            }
        }

        tracing::debug!(%entity, outlinks, inlinks = triples.len() - outlinks, "set representation");
        Ok(SetRepresentation { triples })
    }
}

struct CacheState {
    /// Graph snapshot the entries were built under.
    snapshot: Option<u64>,
    entries: LruCache<Entity, Arc<SetRepresentation>>,
}

/// Bounded, thread-safe cache of set representations for one graph.
///
/// The cache remembers the graph snapshot its entries belong to and empties
/// itself as soon as the graph reports a different one.
pub struct SetRepresentationCache {
    builder: SetRepresentationBuilder,
    state: Mutex<CacheState>,
}

impl SetRepresentationCache {
    /// Default capacity.
    pub const DEFAULT_CAPACITY: usize = 1024;

    pub fn new(builder: SetRepresentationBuilder, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            builder,
            state: Mutex::new(CacheState {
                snapshot: None,
                entries: LruCache::new(capacity),
            }),
        }
    }

    fn lock(&self) -> RankResult<std::sync::MutexGuard<'_, CacheState>> {
        self.state.lock().map_err(|_| RankError::CacheInconsistency {
            message: "set representation cache lock poisoned".into(),
        })
    }

    /// Fetch the representation of `entity`, building and caching it on a miss.
    pub fn get_or_build(
        &self,
        graph: &dyn GraphAdapter,
        entity: &Entity,
    ) -> RankResult<Arc<SetRepresentation>> {
        let snapshot = graph.snapshot();
        {
            let mut state = self.lock()?;
            if state.snapshot != Some(snapshot) {
                if state.snapshot.is_some() && !state.entries.is_empty() {
                    tracing::warn!(
                        entries = state.entries.len(),
                        "graph changed, invalidating set representation cache"
                    );
                }
                state.entries.clear();
                state.snapshot = Some(snapshot);
            }
            if let Some(hit) = state.entries.get(entity) {
                return Ok(Arc::clone(hit));
            }
        }

        // built outside the lock so workers don't serialize on graph I/O
        let built = Arc::new(self.builder.build(graph, entity)?);

        let mut state = self.lock()?;
        if state.snapshot == Some(snapshot) {
            if let Some(existing) = state.entries.get(entity) {
                if **existing != *built {
                    return Err(RankError::CacheInconsistency {
                        message: format!("two builds of {entity} under one snapshot differ"),
                    });
                }
                return Ok(Arc::clone(existing));
            }
            state.entries.put(entity.clone(), Arc::clone(&built));
        }
        Ok(built)
    }

    /// Drop every cached entry.
    pub fn clear(&self) -> RankResult<()> {
        let mut state = self.lock()?;
        state.entries.clear();
        state.snapshot = None;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().map(|s| s.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().map(|s| s.entries.cap().get()).unwrap_or(0)
    }
}

impl std::fmt::Debug for SetRepresentationCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetRepresentationCache")
            .field("len", &self.len())
            .field("capacity", &self.capacity())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::index::MemoryGraph;
    use crate::graph::Literal;

    const A: &str = "http://example.org/A";
    const B: &str = "http://example.org/B";
    const C: &str = "http://example.org/C";
    const REL: &str = "http://example.org/rel";
    const NAME: &str = "http://example.org/name";

    fn fixture() -> MemoryGraph {
        let kg = MemoryGraph::new();
        kg.add_link(A, REL, B);
        kg.add_link(C, REL, A);
        kg.add_literal(A, NAME, Literal::tagged("alpha", "en"));
        kg.add_literal(A, NAME, Literal::tagged("alfa", "de"));
        kg.insert(Node::Entity(Entity::new(A)), Entity::new(REL), Node::Blank("x".into()));
        kg.insert(Node::Blank("y".into()), Entity::new(REL), Node::Entity(Entity::new(A)));
        kg
    }

    #[test]
    fn collects_in_and_out_links() {
        let kg = fixture();
        let a = Entity::new(A);
        let set = SetRepresentationBuilder::default().build(&kg, &a).unwrap();

        assert_eq!(set.len(), 3);
        assert!(set.contains(&Triple::new(
            Some(a.clone()),
            Entity::new(REL),
            Node::Entity(Entity::new(B))
        )));
        assert!(set.contains(&Triple::new(
            Some(Entity::new(C)),
            Entity::new(REL),
            Node::Entity(a.clone())
        )));
        assert!(set.contains(&Triple::new(
            None,
            Entity::new(NAME),
            Node::Literal(Literal::tagged("alpha", "en"))
        )));
    }

    #[test]
    fn cache_returns_equal_sets() {
        let kg = fixture();
        let cache = SetRepresentationCache::new(SetRepresentationBuilder::default(), 4);
        let a = Entity::new(A);
        let first = cache.get_or_build(&kg, &a).unwrap();
        let second = cache.get_or_build(&kg, &a).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_is_bounded() {
        let kg = fixture();
        let cache = SetRepresentationCache::new(SetRepresentationBuilder::default(), 2);
        for e in [A, B, C] {
            cache.get_or_build(&kg, &Entity::new(e)).unwrap();
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.capacity(), 2);
    }

    #[test]
    fn cache_invalidated_on_graph_mutation() {
        let kg = fixture();
        let cache = SetRepresentationCache::new(SetRepresentationBuilder::default(), 8);
        let b = Entity::new(B);
        let before = cache.get_or_build(&kg, &b).unwrap();
        assert_eq!(before.len(), 1);

        kg.add_link(B, REL, C);
        let after = cache.get_or_build(&kg, &b).unwrap();
        assert_eq!(after.len(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn clear_empties_cache() {
        let kg = fixture();
        let cache = SetRepresentationCache::new(SetRepresentationBuilder::default(), 8);
        cache.get_or_build(&kg, &Entity::new(A)).unwrap();
        cache.clear().unwrap();
        assert!(cache.is_empty());
    }
}
