//! Snake case naming convention
//!
//! Produces lowercase ascii identifiers made of letters, digits and single
//! underscores. Double underscores are reserved for
//! [`PATH_SEPARATOR`](super::PATH_SEPARATOR).

use super::{validate_settings, NamingConvention, DEFAULT_COLLISION_PROB, EMPTY_KEY_IDENTIFIER};
use crate::error::SchemaError;
use once_cell::sync::Lazy;
use regex::Regex;

static RE_UNDERSCORES: Lazy<Regex> = Lazy::new(|| Regex::new(r"__+").unwrap());

static RE_LEADING_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9]+").unwrap());

static RE_NON_ALPHANUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-zA-Z0-9_]+").unwrap());

static SNAKE_CASE_BREAK_1: Lazy<Regex> = Lazy::new(|| Regex::new(r"([^_])([A-Z][a-z]+)").unwrap());

static SNAKE_CASE_BREAK_2: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").unwrap());

/// Substituted before the generic replacement so `a+b` and `a-b` stay distinct
const REDUCE_ALPHABET: [(char, char); 5] = [('+', 'x'), ('-', '_'), ('*', 'x'), ('@', 'a'), ('|', 'l')];

#[derive(Debug, Clone)]
pub struct SnakeCaseNaming {
    max_length: Option<usize>,
    collision_prob: f64,
}

impl SnakeCaseNaming {
    /// Creates the convention, failing if `max_length` cannot hold a collision tag
    pub fn new(max_length: Option<usize>) -> Result<Self, SchemaError> {
        Self::with_collision_prob(max_length, DEFAULT_COLLISION_PROB)
    }

    pub fn with_collision_prob(
        max_length: Option<usize>,
        collision_prob: f64,
    ) -> Result<Self, SchemaError> {
        validate_settings(max_length, collision_prob)?;
        Ok(SnakeCaseNaming {
            max_length,
            collision_prob,
        })
    }

    /// Normalization without shortening
    fn to_snake_case(identifier: &str) -> String {
        let reduced: String = identifier
            .chars()
            .map(|c| {
                REDUCE_ALPHABET
                    .iter()
                    .find(|(from, _)| *from == c)
                    .map_or(c, |(_, to)| *to)
            })
            .collect();
        let replaced = RE_NON_ALPHANUMERIC.replace_all(&reduced, "_");

        let broken = SNAKE_CASE_BREAK_1.replace_all(&replaced, "${1}_${2}");
        let mut ident = SNAKE_CASE_BREAK_2
            .replace_all(&broken, "${1}_${2}")
            .to_ascii_lowercase();

        if RE_LEADING_DIGITS.is_match(&ident) {
            ident.insert(0, '_');
        }

        // trailing underscores become x
        let stripped = ident.trim_end_matches('_');
        let strip_count = ident.len() - stripped.len();
        let ident = format!("{}{}", stripped, "x".repeat(strip_count));

        RE_UNDERSCORES.replace_all(&ident, "_").into_owned()
    }
}

impl Default for SnakeCaseNaming {
    fn default() -> Self {
        SnakeCaseNaming {
            max_length: None,
            collision_prob: DEFAULT_COLLISION_PROB,
        }
    }
}

impl NamingConvention for SnakeCaseNaming {
    fn max_length(&self) -> Option<usize> {
        self.max_length
    }

    fn collision_prob(&self) -> f64 {
        self.collision_prob
    }

    fn normalize_identifier(&self, identifier: &str) -> String {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return EMPTY_KEY_IDENTIFIER.to_string();
        }
        self.shorten(&Self::to_snake_case(identifier), identifier)
    }
}
