//! Search configuration.
//!
//! Every section has defaults, so an empty TOML file (or no file at all) is a
//! valid configuration. Decimal parameters are written as plain numbers and
//! converted to exact rationals via their shortest decimal representation.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::graph::{vocab, Entity, LanguageFilter};
use crate::score::{self, Probability};

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Mixing weights of the three text representation bags; they must sum to 1.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BagWeights {
    pub attributes: f64,
    pub types: f64,
    pub links: f64,
}

impl Default for BagWeights {
    fn default() -> Self {
        Self {
            attributes: 0.4,
            types: 0.4,
            links: 0.2,
        }
    }
}

/// Text model parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    pub weights: BagWeights,
    /// Stop reading an entity's triples once every bag holds this many terms.
    pub bag_term_threshold: usize,
    /// Predicates whose object labels go into the `types` bag.
    pub type_predicates: Vec<String>,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            weights: BagWeights::default(),
            bag_term_threshold: 999,
            type_predicates: vec![
                vocab::RDF_TYPE.to_string(),
                vocab::SKOS_SUBJECT.to_string(),
                vocab::DC_SUBJECT.to_string(),
            ],
        }
    }
}

/// Rank fusion parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FusionConfig {
    /// AP ratio below which the better model wins outright.
    pub delta: f64,
    /// Weight of the example-based score in a blend.
    pub lambda: f64,
}

impl Default for FusionConfig {
    fn default() -> Self {
        Self {
            delta: 0.1,
            lambda: 0.5,
        }
    }
}

/// Top-level configuration for a [`SearchSession`](crate::session::SearchSession).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub text: TextConfig,
    pub fusion: FusionConfig,
    /// Accepted literal languages; `""` means untagged.
    pub languages: Vec<String>,
    /// Capacity of the set representation cache.
    pub cache_capacity: usize,
    /// How many top positions are inspected when a model ranks its own examples.
    pub self_evaluation_depth: usize,
    /// Scoring threads; `0` lets rayon decide.
    pub workers: usize,
    /// Examples drawn from a sample's relevant entities when the sample does not say.
    pub examples_amount: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            text: TextConfig::default(),
            fusion: FusionConfig::default(),
            languages: vec!["en".into(), "pl".into(), String::new()],
            cache_capacity: 1024,
            self_evaluation_depth: 10,
            workers: 0,
            examples_amount: 4,
        }
    }
}

/// Exact text-model weights, derived from [`BagWeights`].
#[derive(Debug, Clone, PartialEq)]
pub struct ExactBagWeights {
    pub attributes: Probability,
    pub types: Probability,
    pub links: Probability,
}

impl SearchConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check every field is usable.
    pub fn validate(&self) -> ConfigResult<()> {
        let invalid = |message: &str| {
            Err(ConfigError::Invalid {
                message: message.to_string(),
            })
        };
        let w = &self.text.weights;
        if [w.attributes, w.types, w.links].iter().any(|v| !v.is_finite() || *v < 0.0) {
            return invalid("text bag weights must be finite and non-negative");
        }
        let exact = self.exact_weights()?;
        if exact.attributes + exact.types + exact.links != score::one() {
            return invalid("text bag weights must sum to 1");
        }
        if !(0.0..=1.0).contains(&self.fusion.delta) {
            return invalid("fusion.delta must be within [0, 1]");
        }
        if !(0.0..=1.0).contains(&self.fusion.lambda) {
            return invalid("fusion.lambda must be within [0, 1]");
        }
        if self.cache_capacity == 0 {
            return invalid("cache_capacity must be > 0");
        }
        if self.self_evaluation_depth == 0 {
            return invalid("self_evaluation_depth must be > 0");
        }
        if self.text.bag_term_threshold == 0 {
            return invalid("text.bag_term_threshold must be > 0");
        }
        Ok(())
    }

    pub fn language_filter(&self) -> LanguageFilter {
        LanguageFilter::new(self.languages.iter().cloned())
    }

    pub fn type_predicates(&self) -> Vec<Entity> {
        self.text.type_predicates.iter().map(Entity::new).collect()
    }

    pub fn exact_weights(&self) -> ConfigResult<ExactBagWeights> {
        let w = &self.text.weights;
        Ok(ExactBagWeights {
            attributes: exact(w.attributes, "text.weights.attributes")?,
            types: exact(w.types, "text.weights.types")?,
            links: exact(w.links, "text.weights.links")?,
        })
    }

    pub fn exact_delta(&self) -> ConfigResult<Probability> {
        exact(self.fusion.delta, "fusion.delta")
    }

    pub fn exact_lambda(&self) -> ConfigResult<Probability> {
        exact(self.fusion.lambda, "fusion.lambda")
    }
}

fn exact(value: f64, field: &str) -> ConfigResult<Probability> {
    score::from_f64(value).ok_or_else(|| ConfigError::Invalid {
        message: format!("{field} is not a finite number"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = SearchConfig::default();
        config.validate().unwrap();
        let w = config.exact_weights().unwrap();
        assert_eq!(w.attributes, score::ratio(2, 5));
        assert_eq!(w.links, score::ratio(1, 5));
        assert_eq!(config.exact_delta().unwrap(), score::ratio(1, 10));
        assert_eq!(config.exact_lambda().unwrap(), score::ratio(1, 2));
        assert_eq!(config.type_predicates().len(), 3);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let config: SearchConfig = toml::from_str(
            r#"
            workers = 2
            [fusion]
            lambda = 0.7
            "#,
        )
        .unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.fusion.lambda, 0.7);
        assert_eq!(config.fusion.delta, 0.1);
        assert_eq!(config.cache_capacity, 1024);
        assert_eq!(config.text.bag_term_threshold, 999);
    }

    #[test]
    fn rejects_bad_values() {
        let mut config = SearchConfig::default();
        config.fusion.delta = 1.5;
        assert!(config.validate().is_err());

        let mut config = SearchConfig::default();
        config.cache_capacity = 0;
        assert!(config.validate().is_err());

        let mut config = SearchConfig::default();
        config.text.weights = BagWeights {
            attributes: 0.0,
            types: 0.0,
            links: 0.0,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bag_weights_must_sum_to_one() {
        let mut config = SearchConfig::default();
        config.text.weights = BagWeights {
            attributes: 1.0,
            types: 1.0,
            links: 1.0,
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid { .. })));

        // 0.7 + 0.2 + 0.1 is not 1.0 in binary, but is exactly 1 as decimals
        config.text.weights = BagWeights {
            attributes: 0.7,
            types: 0.2,
            links: 0.1,
        };
        config.validate().unwrap();

        config.text.weights = BagWeights {
            attributes: 1.0,
            types: 0.0,
            links: 0.0,
        };
        config.validate().unwrap();
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("ebes.toml");
        std::fs::write(&path, "languages = [\"en\"]\n[text]\nbag_term_threshold = 50\n").unwrap();
        let config = SearchConfig::load(&path).unwrap();
        assert_eq!(config.languages, vec!["en".to_string()]);
        assert_eq!(config.text.bag_term_threshold, 50);

        std::fs::write(&path, "workers = \"many\"").unwrap();
        assert!(matches!(SearchConfig::load(&path), Err(ConfigError::Parse { .. })));

        let missing = dir.path().join("missing.toml");
        assert!(matches!(SearchConfig::load(&missing), Err(ConfigError::Read { .. })));
    }
}
