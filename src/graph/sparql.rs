//! Local triple files loaded into an oxigraph store.
//!
//! Parsing is delegated to oxigraph; lookups are SPARQL SELECTs over the
//! union of the default graph and all named graphs (so `.nq` files behave
//! like one conjunctive graph).

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use oxigraph::io::RdfFormat;
use oxigraph::model::{NamedNode, Term};
use oxigraph::sparql::{QueryResults, QuerySolution};
use oxigraph::store::Store;

use crate::error::GraphError;

use super::{vocab, Entity, GraphAdapter, GraphResult, LanguageFilter, Literal, Node};

/// Extensions picked up when loading a directory.
const TRIPLE_FILE_EXTENSIONS: &[&str] = &["nt", "nq", "ttl", "trig", "rdf"];

/// SPARQL-capable graph backed by an in-memory oxigraph store.
pub struct OxigraphGraph {
    store: Store,
    languages: LanguageFilter,
    generation: AtomicU64,
}

impl OxigraphGraph {
    /// Create an empty in-memory store.
    pub fn in_memory(languages: LanguageFilter) -> GraphResult<Self> {
        let store = Store::new().map_err(|e| GraphError::Sparql {
            message: format!("failed to create oxigraph store: {e}"),
        })?;
        Ok(Self {
            store,
            languages,
            generation: AtomicU64::new(0),
        })
    }

    /// Create a store and load a triple file or a directory of triple files into it.
    pub fn open(path: &Path, languages: LanguageFilter) -> GraphResult<Self> {
        let graph = Self::in_memory(languages)?;
        graph.load_path(path)?;
        Ok(graph)
    }

    /// Load a file, or every supported file in a directory. Returns the number of files loaded.
    pub fn load_path(&self, path: &Path) -> GraphResult<usize> {
        if path.is_dir() {
            tracing::info!(path = %path.display(), "loading triples from files in directory");
            let entries = std::fs::read_dir(path).map_err(|e| GraphError::Load {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            let mut files: Vec<_> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| {
                    p.extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(|ext| TRIPLE_FILE_EXTENSIONS.contains(&ext))
                })
                .collect();
            files.sort();
            for (i, file) in files.iter().enumerate() {
                tracing::debug!(file = %file.display(), n = i + 1, of = files.len(), "loading");
                self.load_file(file)?;
            }
            Ok(files.len())
        } else {
            self.load_file(path)?;
            Ok(1)
        }
    }

    /// Load a single file, guessing its format from the extension.
    pub fn load_file(&self, path: &Path) -> GraphResult<()> {
        let load_err = |message: String| GraphError::Load {
            path: path.display().to_string(),
            message,
        };
        let format = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(RdfFormat::from_extension)
            .ok_or_else(|| load_err("unrecognized triple file extension".into()))?;
        let file = std::fs::File::open(path).map_err(|e| load_err(e.to_string()))?;
        tracing::info!(path = %path.display(), ?format, "loading triples from file");
        self.store
            .load_from_reader(format, std::io::BufReader::new(file))
            .map_err(|e| load_err(e.to_string()))?;
        self.generation.fetch_add(1, Ordering::Release);
        Ok(())
    }

    fn named_node(entity: &Entity) -> GraphResult<NamedNode> {
        NamedNode::new(entity.as_str()).map_err(|_| GraphError::InvalidIri {
            iri: entity.to_string(),
        })
    }

    fn select(&self, sparql: &str) -> GraphResult<Vec<QuerySolution>> {
        let results = self.store.query(sparql).map_err(|e| GraphError::Sparql {
            message: format!("SPARQL query failed: {e}"),
        })?;
        match results {
            QueryResults::Solutions(solutions) => solutions
                .map(|s| {
                    s.map_err(|e| GraphError::Sparql {
                        message: format!("solution error: {e}"),
                    })
                })
                .collect(),
            _ => Err(GraphError::Sparql {
                message: "expected SELECT solutions".into(),
            }),
        }
    }
}

/// Pattern matching `body` in the default graph or any named graph.
fn union_pattern(body: &str) -> String {
    format!("{{ {body} }} UNION {{ GRAPH ?g {{ {body} }} }}")
}

fn term_to_node(term: &Term) -> Option<Node> {
    match term {
        Term::NamedNode(n) => Some(Node::Entity(Entity::new(n.as_str()))),
        Term::BlankNode(b) => Some(Node::Blank(b.as_str().to_string())),
        Term::Literal(l) => Some(Node::Literal(Literal {
            value: l.value().to_string(),
            language: l.language().map(str::to_string),
        })),
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn term_to_entity(term: &Term) -> Option<Entity> {
    match term {
        Term::NamedNode(n) => Some(Entity::new(n.as_str())),
        _ => None,
    }
}

impl GraphAdapter for OxigraphGraph {
    fn predicate_objects(&self, entity: &Entity) -> GraphResult<Vec<(Entity, Node)>> {
        let subject = Self::named_node(entity)?;
        let query = format!(
            "SELECT DISTINCT ?p ?o WHERE {{ {} }}",
            union_pattern(&format!("{subject} ?p ?o"))
        );
        Ok(self
            .select(&query)?
            .iter()
            .filter_map(|s| Some((term_to_entity(s.get("p")?)?, term_to_node(s.get("o")?)?)))
            .collect())
    }

    fn subject_predicates(&self, entity: &Entity) -> GraphResult<Vec<(Node, Entity)>> {
        let object = Self::named_node(entity)?;
        let query = format!(
            "SELECT DISTINCT ?s ?p WHERE {{ {} }}",
            union_pattern(&format!("?s ?p {object}"))
        );
        Ok(self
            .select(&query)?
            .iter()
            .filter_map(|s| Some((term_to_node(s.get("s")?)?, term_to_entity(s.get("p")?)?)))
            .collect())
    }

    fn label(&self, entity: &Entity) -> GraphResult<Option<Literal>> {
        let subject = Self::named_node(entity)?;
        let query = format!(
            "SELECT DISTINCT ?label WHERE {{ {} }}",
            union_pattern(&format!("{subject} <{}> ?label", vocab::RDFS_LABEL))
        );
        Ok(self
            .select(&query)?
            .iter()
            .filter_map(|s| match term_to_node(s.get("label")?)? {
                Node::Literal(lit) => Some(lit),
                Node::Entity(_) | Node::Blank(_) => None,
            })
            .filter_map(|lit| self.languages.rank(&lit).map(|rank| (rank, lit)))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, lit)| lit))
    }

    fn size(&self) -> GraphResult<u64> {
        self.store
            .len()
            .map(|n| n as u64)
            .map_err(|e| GraphError::Sparql {
                message: format!("failed to count triples: {e}"),
            })
    }

    fn snapshot(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for OxigraphGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OxigraphGraph")
            .field("generation", &self.snapshot())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NT: &str = r#"<http://example.org/Paris> <http://www.w3.org/2000/01/rdf-schema#label> "Paris"@en .
<http://example.org/Paris> <http://www.w3.org/2000/01/rdf-schema#label> "Paryż"@pl .
<http://example.org/Paris> <http://example.org/country> <http://example.org/France> .
<http://example.org/Paris> <http://example.org/note> _:b0 .
<http://example.org/France> <http://www.w3.org/2000/01/rdf-schema#label> "France"@en .
<http://example.org/Lyon> <http://example.org/country> <http://example.org/France> .
"#;

    fn load_fixture() -> (tempfile::TempDir, OxigraphGraph) {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("cities.nt"), NT).unwrap();
        std::fs::write(dir.path().join("README.md"), "not triples").unwrap();
        let graph = OxigraphGraph::open(dir.path(), LanguageFilter::default()).unwrap();
        (dir, graph)
    }

    #[test]
    fn loads_directory_and_counts() {
        let (_dir, graph) = load_fixture();
        assert_eq!(graph.size().unwrap(), 6);
        assert!(graph.snapshot() > 0);
    }

    #[test]
    fn outgoing_and_incoming() {
        let (_dir, graph) = load_fixture();
        let paris = Entity::new("http://example.org/Paris");
        let out = graph.predicate_objects(&paris).unwrap();
        assert_eq!(out.len(), 4);
        assert!(out.iter().any(|(_, o)| matches!(o, Node::Blank(_))));

        let france = Entity::new("http://example.org/France");
        let incoming = graph.subject_predicates(&france).unwrap();
        assert_eq!(incoming.len(), 2);
    }

    #[test]
    fn label_by_language_preference() {
        let (_dir, graph) = load_fixture();
        let label = graph.label(&Entity::new("http://example.org/Paris")).unwrap();
        assert_eq!(label, Some(Literal::tagged("Paris", "en")));
        assert_eq!(graph.label(&Entity::new("http://example.org/Lyon")).unwrap(), None);
    }

    #[test]
    fn invalid_iri_is_reported() {
        let graph = OxigraphGraph::in_memory(LanguageFilter::default()).unwrap();
        let err = graph.predicate_objects(&Entity::new("not an iri")).unwrap_err();
        assert!(matches!(err, GraphError::InvalidIri { .. }));
    }

    #[test]
    fn unknown_extension_fails_to_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("data.xyz");
        std::fs::write(&path, "").unwrap();
        let graph = OxigraphGraph::in_memory(LanguageFilter::default()).unwrap();
        assert!(matches!(graph.load_file(&path), Err(GraphError::Load { .. })));
    }
}
