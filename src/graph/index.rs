//! In-memory RDF graph with dual indexing.
//!
//! Uses `petgraph` for the graph structure and `DashMap` for O(1) node
//! lookups. Edges carry the predicate entity. The graph is a set: inserting
//! an existing triple is a no-op.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::RwLock;

use dashmap::DashMap;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use super::{vocab, Entity, GraphAdapter, GraphResult, LanguageFilter, Literal, Node};

/// In-memory knowledge graph backed by petgraph.
pub struct MemoryGraph {
    /// Nodes are RDF nodes, edges carry the predicate.
    graph: RwLock<DiGraph<Node, Entity>>,
    /// Node → NodeIndex mapping for O(1) node lookups.
    node_index: DashMap<Node, NodeIndex>,
    /// Label language preference.
    languages: LanguageFilter,
    triple_count: AtomicUsize,
    /// Bumped on every successful insert.
    generation: AtomicU64,
}

impl MemoryGraph {
    /// Create an empty graph with the default label languages (`en`, `pl`, untagged).
    pub fn new() -> Self {
        Self::with_languages(LanguageFilter::default())
    }

    /// Create an empty graph with a custom label language preference.
    pub fn with_languages(languages: LanguageFilter) -> Self {
        Self {
            graph: RwLock::new(DiGraph::new()),
            node_index: DashMap::new(),
            languages,
            triple_count: AtomicUsize::new(0),
            generation: AtomicU64::new(0),
        }
    }

    fn read_graph(&self) -> std::sync::RwLockReadGuard<'_, DiGraph<Node, Entity>> {
        self.graph.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write_graph(&self) -> std::sync::RwLockWriteGuard<'_, DiGraph<Node, Entity>> {
        self.graph.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn ensure_node(graph: &mut DiGraph<Node, Entity>, index: &DashMap<Node, NodeIndex>, node: Node) -> NodeIndex {
        if let Some(idx) = index.get(&node) {
            return *idx.value();
        }
        let idx = graph.add_node(node.clone());
        index.insert(node, idx);
        idx
    }

    /// Insert a triple. Returns `false` if it was already present.
    ///
    /// Literal subjects are not valid RDF and are ignored.
    pub fn insert(&self, subject: Node, predicate: Entity, object: Node) -> bool {
        if matches!(subject, Node::Literal(_)) {
            tracing::warn!(%subject, "ignoring triple with literal subject");
            return false;
        }
        let mut graph = self.write_graph();
        let subj_idx = Self::ensure_node(&mut graph, &self.node_index, subject);
        let obj_idx = Self::ensure_node(&mut graph, &self.node_index, object);

        if graph
            .edges_connecting(subj_idx, obj_idx)
            .any(|e| *e.weight() == predicate)
        {
            return false;
        }
        graph.add_edge(subj_idx, obj_idx, predicate);
        self.triple_count.fetch_add(1, Ordering::Relaxed);
        self.generation.fetch_add(1, Ordering::Release);
        true
    }

    /// Insert an entity-to-entity link.
    pub fn add_link(&self, subject: &str, predicate: &str, object: &str) -> bool {
        self.insert(
            Node::Entity(Entity::new(subject)),
            Entity::new(predicate),
            Node::Entity(Entity::new(object)),
        )
    }

    /// Insert a literal attribute.
    pub fn add_literal(&self, subject: &str, predicate: &str, literal: Literal) -> bool {
        self.insert(
            Node::Entity(Entity::new(subject)),
            Entity::new(predicate),
            Node::Literal(literal),
        )
    }

    /// Insert an `rdfs:label`.
    pub fn add_label(&self, subject: &str, label: Literal) -> bool {
        self.add_literal(subject, vocab::RDFS_LABEL, label)
    }

    /// Check if a node exists.
    pub fn has_node(&self, node: &Node) -> bool {
        self.node_index.contains_key(node)
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.node_index.len()
    }

    /// Number of triples (edges).
    pub fn triple_count(&self) -> usize {
        self.triple_count.load(Ordering::Relaxed)
    }
}

impl GraphAdapter for MemoryGraph {
    fn predicate_objects(&self, entity: &Entity) -> GraphResult<Vec<(Entity, Node)>> {
        let graph = self.read_graph();
        let Some(idx) = self.node_index.get(&Node::Entity(entity.clone())).map(|i| *i.value()) else {
            return Ok(vec![]);
        };
        let mut pairs: Vec<(Entity, Node)> = graph
            .edges_directed(idx, Direction::Outgoing)
            .filter_map(|e| {
                let object = graph.node_weight(e.target())?.clone();
                Some((e.weight().clone(), object))
            })
            .collect();
        // petgraph yields edges newest-first; report insertion order
        pairs.reverse();
        Ok(pairs)
    }

    fn subject_predicates(&self, entity: &Entity) -> GraphResult<Vec<(Node, Entity)>> {
        let graph = self.read_graph();
        let Some(idx) = self.node_index.get(&Node::Entity(entity.clone())).map(|i| *i.value()) else {
            return Ok(vec![]);
        };
        let mut pairs: Vec<(Node, Entity)> = graph
            .edges_directed(idx, Direction::Incoming)
            .filter_map(|e| {
                let subject = graph.node_weight(e.source())?.clone();
                Some((subject, e.weight().clone()))
            })
            .collect();
        pairs.reverse();
        Ok(pairs)
    }

    fn label(&self, entity: &Entity) -> GraphResult<Option<Literal>> {
        let label_predicate = Entity::new(vocab::RDFS_LABEL);
        let best = self
            .predicate_objects(entity)?
            .into_iter()
            .filter(|(p, _)| *p == label_predicate)
            .filter_map(|(_, o)| match o {
                Node::Literal(lit) => Some(lit),
                Node::Entity(_) | Node::Blank(_) => None,
            })
            .filter_map(|lit| self.languages.rank(&lit).map(|rank| (rank, lit)))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, lit)| lit);
        Ok(best)
    }

    fn size(&self) -> GraphResult<u64> {
        Ok(self.triple_count() as u64)
    }

    fn snapshot(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryGraph")
            .field("nodes", &self.node_count())
            .field("triples", &self.triple_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "http://example.org/A";
    const B: &str = "http://example.org/B";
    const C: &str = "http://example.org/C";
    const REL: &str = "http://example.org/rel";

    #[test]
    fn insert_and_query() {
        let kg = MemoryGraph::new();
        assert!(kg.add_link(A, REL, B));

        assert!(kg.has_node(&Node::Entity(Entity::new(A))));
        assert!(kg.has_node(&Node::Entity(Entity::new(B))));
        assert_eq!(kg.node_count(), 2);
        assert_eq!(kg.size().unwrap(), 1);

        let outgoing = kg.predicate_objects(&Entity::new(A)).unwrap();
        assert_eq!(outgoing, vec![(Entity::new(REL), Node::Entity(Entity::new(B)))]);

        let incoming = kg.subject_predicates(&Entity::new(B)).unwrap();
        assert_eq!(incoming, vec![(Node::Entity(Entity::new(A)), Entity::new(REL))]);
    }

    #[test]
    fn duplicate_triples_are_ignored() {
        let kg = MemoryGraph::new();
        assert!(kg.add_link(A, REL, B));
        assert!(!kg.add_link(A, REL, B));
        assert_eq!(kg.triple_count(), 1);
    }

    #[test]
    fn snapshot_changes_on_mutation() {
        let kg = MemoryGraph::new();
        let before = kg.snapshot();
        kg.add_link(A, REL, B);
        let after = kg.snapshot();
        assert_ne!(before, after);
        kg.add_link(A, REL, B);
        assert_eq!(kg.snapshot(), after);
    }

    #[test]
    fn outgoing_pairs_keep_insertion_order() {
        let kg = MemoryGraph::new();
        kg.add_link(A, REL, B);
        kg.add_link(A, REL, C);
        let objects: Vec<Node> = kg
            .predicate_objects(&Entity::new(A))
            .unwrap()
            .into_iter()
            .map(|(_, o)| o)
            .collect();
        assert_eq!(
            objects,
            vec![Node::Entity(Entity::new(B)), Node::Entity(Entity::new(C))]
        );
    }

    #[test]
    fn label_prefers_configured_language() {
        let kg = MemoryGraph::new();
        kg.add_label(A, Literal::tagged("Paryż", "pl"));
        kg.add_label(A, Literal::tagged("Paris", "en"));
        kg.add_label(A, Literal::tagged("Parigi", "it"));
        assert_eq!(kg.label(&Entity::new(A)).unwrap(), Some(Literal::tagged("Paris", "en")));

        kg.add_label(B, Literal::tagged("Berlino", "it"));
        assert_eq!(kg.label(&Entity::new(B)).unwrap(), None);
        assert_eq!(kg.label(&Entity::new(C)).unwrap(), None);
    }

    #[test]
    fn literal_subjects_rejected() {
        let kg = MemoryGraph::new();
        assert!(!kg.insert(
            Node::Literal(Literal::plain("x")),
            Entity::new(REL),
            Node::Entity(Entity::new(A)),
        ));
        assert_eq!(kg.triple_count(), 0);
    }

    #[test]
    fn empty_queries() {
        let kg = MemoryGraph::new();
        assert!(kg.predicate_objects(&Entity::new(A)).unwrap().is_empty());
        assert!(kg.subject_predicates(&Entity::new(A)).unwrap().is_empty());
        assert_eq!(kg.size().unwrap(), 0);
    }
}
