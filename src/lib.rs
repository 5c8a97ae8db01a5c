// thiserror's #[error("...{field}...")] format strings reference struct fields,
// but the compiler doesn't see through the derive macro and reports false positives.
#![allow(unused_assignments)]

//! # ebes
//!
//! Example-based entity search: rank candidate entities of a knowledge graph
//! against a free-text relation and a handful of example entities.
//!
//! ## Architecture
//!
//! - **Graph access** (`graph`): the `GraphAdapter` seam with in-memory
//!   (petgraph), local file (oxigraph) and remote SPARQL backends
//! - **Representations** (`representation`): text bags and cached triple sets per entity
//! - **Models** (`model`): Dirichlet-smoothed text model and example set-overlap model
//! - **Ranking** (`rank`, `fusion`): parallel scoring, normalization, AP-driven fusion
//! - **Evaluation** (`evaluate`, `sample`): R-Precision and Average Precision over samples
//!
//! Scores are exact rationals end to end; `f64` only appears in output.
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use ebes::config::SearchConfig;
//! use ebes::graph::index::MemoryGraph;
//! use ebes::graph::{Entity, Literal};
//! use ebes::model::Query;
//! use ebes::session::SearchSession;
//!
//! let kg = MemoryGraph::new();
//! kg.add_literal("http://example.org/Paris", "http://example.org/kind", Literal::plain("capital city"));
//! kg.add_literal("http://example.org/Rome", "http://example.org/kind", Literal::plain("capital city"));
//!
//! let session = SearchSession::new(Arc::new(kg), SearchConfig::default()).unwrap();
//! let query = Query::new("capital", [Entity::new("http://example.org/Paris")]);
//! let outcome = session.search(&query, &[Entity::new("http://example.org/Rome")]).unwrap();
//! for entry in &outcome.fused.ranking {
//!     println!("{} {}", entry.entity, ebes::score::format_fixed(&entry.score, 5));
//! }
//! ```

pub mod config;
pub mod error;
pub mod evaluate;
pub mod fusion;
pub mod graph;
pub mod model;
pub mod rank;
pub mod representation;
pub mod sample;
pub mod score;
pub mod session;
