//! Remote SPARQL endpoint accessed over HTTP.
//!
//! Queries are sent as `GET ?query=...` requesting
//! `application/sparql-results+json`. Any transport or decoding failure is a
//! [`GraphError::Remote`]; nothing is retried.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::error::GraphError;

use super::{vocab, Entity, GraphAdapter, GraphResult, LanguageFilter, Literal, Node};

/// Triple count reported for remote graphs. Counting a public endpoint is too
/// expensive, so a large constant stands in for it.
pub const REMOTE_GRAPH_SIZE: u64 = 13370;

/// Default public endpoint.
pub const DEFAULT_ENDPOINT: &str = "http://dbpedia.org/sparql";

/// Graph served by a remote SPARQL endpoint.
pub struct RemoteGraph {
    endpoint: String,
    agent: ureq::Agent,
    languages: LanguageFilter,
}

#[derive(Debug, Deserialize)]
struct SparqlJson {
    results: SparqlBindings,
}

#[derive(Debug, Deserialize)]
struct SparqlBindings {
    bindings: Vec<HashMap<String, JsonTerm>>,
}

#[derive(Debug, Deserialize)]
struct JsonTerm {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    #[serde(rename = "xml:lang")]
    lang: Option<String>,
}

impl JsonTerm {
    fn to_node(&self) -> Option<Node> {
        match self.kind.as_str() {
            "uri" => Some(Node::Entity(Entity::new(&self.value))),
            "bnode" => Some(Node::Blank(self.value.clone())),
            "literal" | "typed-literal" => Some(Node::Literal(Literal {
                value: self.value.clone(),
                language: self.lang.clone(),
            })),
            _ => None,
        }
    }

    fn to_entity(&self) -> Option<Entity> {
        (self.kind == "uri").then(|| Entity::new(&self.value))
    }
}

impl RemoteGraph {
    /// Connect to an endpoint. No request is made until the first lookup.
    pub fn new(endpoint: impl Into<String>, languages: LanguageFilter, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            endpoint: endpoint.into(),
            agent,
            languages,
        }
    }

    /// The endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn remote_err(&self, message: impl std::fmt::Display) -> GraphError {
        GraphError::Remote {
            endpoint: self.endpoint.clone(),
            message: message.to_string(),
        }
    }

    fn select(&self, sparql: &str) -> GraphResult<Vec<HashMap<String, JsonTerm>>> {
        tracing::debug!(endpoint = %self.endpoint, query = sparql, "remote SPARQL query");
        let response = self
            .agent
            .get(&self.endpoint)
            .query("query", sparql)
            .set("Accept", "application/sparql-results+json")
            .call()
            .map_err(|e| self.remote_err(e))?;
        let body: SparqlJson = response.into_json().map_err(|e| self.remote_err(e))?;
        Ok(body.results.bindings)
    }

    /// Check the endpoint answers at all. Used to fail early on a bad URL.
    pub fn ping(&self) -> GraphResult<()> {
        self.select("SELECT ?s WHERE { ?s ?p ?o } LIMIT 1").map(|_| ())
    }
}

fn iri(entity: &Entity) -> GraphResult<String> {
    let text = entity.as_str();
    if text.is_empty() || text.chars().any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '"' | '{' | '}')) {
        return Err(GraphError::InvalidIri {
            iri: text.to_string(),
        });
    }
    Ok(format!("<{text}>"))
}

impl GraphAdapter for RemoteGraph {
    fn predicate_objects(&self, entity: &Entity) -> GraphResult<Vec<(Entity, Node)>> {
        let query = format!("SELECT ?p ?o WHERE {{ {} ?p ?o }}", iri(entity)?);
        Ok(self
            .select(&query)?
            .iter()
            .filter_map(|row| Some((row.get("p")?.to_entity()?, row.get("o")?.to_node()?)))
            .collect())
    }

    fn subject_predicates(&self, entity: &Entity) -> GraphResult<Vec<(Node, Entity)>> {
        let query = format!("SELECT ?s ?p WHERE {{ ?s ?p {} }}", iri(entity)?);
        Ok(self
            .select(&query)?
            .iter()
            .filter_map(|row| Some((row.get("s")?.to_node()?, row.get("p")?.to_entity()?)))
            .collect())
    }

    fn label(&self, entity: &Entity) -> GraphResult<Option<Literal>> {
        let query = format!(
            "SELECT ?label WHERE {{ {} <{}> ?label }}",
            iri(entity)?,
            vocab::RDFS_LABEL
        );
        Ok(self
            .select(&query)?
            .iter()
            .filter_map(|row| match row.get("label")?.to_node()? {
                Node::Literal(lit) => Some(lit),
                Node::Entity(_) | Node::Blank(_) => None,
            })
            .filter_map(|lit| self.languages.rank(&lit).map(|rank| (rank, lit)))
            .min_by_key(|(rank, _)| *rank)
            .map(|(_, lit)| lit))
    }

    fn size(&self) -> GraphResult<u64> {
        Ok(REMOTE_GRAPH_SIZE)
    }
}

impl std::fmt::Debug for RemoteGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteGraph")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}
