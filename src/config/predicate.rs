//! Predicates described as configuration data

use crate::error::ConfigurationError;
use crate::routing::Predicate;
use serde::{Deserialize, Serialize};

/// Serializable predicate description, compiled once at startup.
///
/// In TOML:
///
/// ```toml
/// when = { header_ends_with = { header = "CamelFileName", suffix = ".xml" } }
/// when = { not = { body_contains = "test=" } }
/// when = "always"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredicateSpec {
    Always,
    Never,
    HeaderEndsWith { header: String, suffix: String },
    HeaderMatches { header: String, pattern: String },
    HeaderEquals { header: String, value: String },
    HasHeader(String),
    BodyContains(String),
    All(Vec<PredicateSpec>),
    Any(Vec<PredicateSpec>),
    Not(Box<PredicateSpec>),
}

impl PredicateSpec {
    pub fn compile(&self) -> Result<Predicate, ConfigurationError> {
        let predicate = match self {
            Self::Always => Predicate::always(),
            Self::Never => Predicate::never(),
            Self::HeaderEndsWith { header, suffix } => {
                Predicate::header_ends_with(header.as_str(), suffix.as_str())
            }
            Self::HeaderMatches { header, pattern } => {
                Predicate::header_matches(header.as_str(), pattern)?
            }
            Self::HeaderEquals { header, value } => {
                Predicate::header_equals(header.as_str(), value.as_str())
            }
            Self::HasHeader(header) => Predicate::has_header(header.as_str()),
            Self::BodyContains(needle) => Predicate::body_contains(needle.as_str()),
            Self::All(specs) => compile_fold(specs, Predicate::always(), Predicate::and)?,
            Self::Any(specs) => compile_fold(specs, Predicate::never(), Predicate::or)?,
            Self::Not(spec) => spec.compile()?.negate(),
        };
        Ok(predicate)
    }
}

fn compile_fold(
    specs: &[PredicateSpec],
    empty: Predicate,
    combine: fn(Predicate, Predicate) -> Predicate,
) -> Result<Predicate, ConfigurationError> {
    let mut compiled = specs.iter().map(PredicateSpec::compile);
    let Some(first) = compiled.next() else {
        return Ok(empty);
    };
    compiled.try_fold(first?, |acc, next| Ok(combine(acc, next?)))
}
