//! Entity representations consumed by the retrieval models.
//!
//! - [`text`]: term-frequency bags built from an entity's outgoing triples
//! - [`set`]: the set of triples incident to an entity, with a bounded cache

pub mod set;
pub mod text;

pub use set::{SetRepresentation, SetRepresentationBuilder, SetRepresentationCache};
pub use text::{Bag, TextRepresentation, TextRepresentationBuilder};

/// Lowercase and split on whitespace.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
