//! Rich diagnostic error types for the entity search engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]` derives,
//! providing error codes and help text. Callers can always tell a bad query
//! ([`RankError::InvalidInput`]) apart from an unavailable data source
//! ([`GraphError`]).

use miette::Diagnostic;
use thiserror::Error;

/// Top-level error type for the entity search engine.
#[derive(Debug, Error, Diagnostic)]
pub enum SearchError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Rank(#[from] RankError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Sample(#[from] SampleError),
}

// ---------------------------------------------------------------------------
// Graph errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum GraphError {
    #[error("invalid IRI: {iri}")]
    #[diagnostic(
        code(ebes::graph::invalid_iri),
        help("Entity identifiers must be absolute IRIs such as `http://dbpedia.org/resource/Paris`.")
    )]
    InvalidIri { iri: String },

    #[error("SPARQL query error: {message}")]
    #[diagnostic(
        code(ebes::graph::sparql),
        help(
            "The SPARQL query against the local store failed. \
             Check that the triple files were loaded correctly."
        )
    )]
    Sparql { message: String },

    #[error("failed to load triples from {path}: {message}")]
    #[diagnostic(
        code(ebes::graph::load),
        help(
            "Supported files are N-Triples (.nt), N-Quads (.nq), Turtle (.ttl) and RDF/XML (.rdf). \
             Check the file exists and is well-formed."
        )
    )]
    Load { path: String, message: String },

    #[error("remote endpoint {endpoint} failed: {message}")]
    #[diagnostic(
        code(ebes::graph::remote),
        help(
            "The SPARQL endpoint could not be queried. Check the URL and your \
             network connection. Rankings are never returned partially."
        )
    )]
    Remote { endpoint: String, message: String },
}

// ---------------------------------------------------------------------------
// Ranking errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum RankError {
    #[error("invalid input: {message}")]
    #[diagnostic(
        code(ebes::rank::invalid_input),
        help(
            "The query cannot be ranked as given. Provide a non-empty relation, \
             at least one example entity with triples in the graph, and a non-empty graph."
        )
    )]
    InvalidInput { message: String },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Graph(#[from] GraphError),

    #[error("set representation cache inconsistency: {message}")]
    #[diagnostic(
        code(ebes::rank::cache_inconsistency),
        help(
            "An internal invariant of the representation cache was violated. \
             This is a bug; please report it together with the log output."
        )
    )]
    CacheInconsistency { message: String },
}

impl RankError {
    /// Shorthand for [`RankError::InvalidInput`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Config errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    #[diagnostic(
        code(ebes::config::read),
        help("Check that the file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {message}")]
    #[diagnostic(
        code(ebes::config::parse),
        help("The config file must be valid TOML. Unknown sections are ignored.")
    )]
    Parse { path: String, message: String },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(ebes::config::invalid), help("Check the SearchConfig fields. {message}"))]
    Invalid { message: String },
}

// ---------------------------------------------------------------------------
// Sample errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum SampleError {
    #[error("failed to read sample file {path}")]
    #[diagnostic(
        code(ebes::sample::read),
        help("Check that the sample file exists and is readable.")
    )]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse sample file {path}: {message}")]
    #[diagnostic(
        code(ebes::sample::parse),
        help(
            "A sample file is TOML with keys `topic`, `relevant` and `not_relevant`, \
             and optionally `examples` (how many relevant entities to use as examples)."
        )
    )]
    Parse { path: String, message: String },

    #[error("sample {path} has no relevant entities")]
    #[diagnostic(
        code(ebes::sample::no_relevant),
        help("List at least one entity under `relevant`; examples are drawn from it.")
    )]
    NoRelevant { path: String },
}

/// Convenience result type for top-level operations.
pub type SearchResult<T> = std::result::Result<T, SearchError>;

/// Result type for ranking operations.
pub type RankResult<T> = std::result::Result<T, RankError>;
