//! Schema-level column hints
//!
//! Hints apply to columns of every table by name. Names are matched with
//! simple regexes: `re:<pattern>` is a regular expression, anything else must
//! match the column name exactly.

use crate::error::SchemaError;
use crate::schema::table::DataType;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

const SIMPLE_REGEX_PREFIX: &str = "re:";

#[derive(Debug, Clone)]
enum Matcher {
    Exact(String),
    Pattern(Regex),
}

/// A column name matcher parsed from a simple regex string
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SimpleRegex {
    raw: String,
    matcher: Matcher,
}

impl SimpleRegex {
    pub fn new(raw: impl Into<String>) -> Result<Self, SchemaError> {
        let raw = raw.into();
        let matcher = match raw.strip_prefix(SIMPLE_REGEX_PREFIX) {
            Some(pattern) => Matcher::Pattern(Regex::new(pattern).map_err(|source| {
                SchemaError::InvalidRegex {
                    pattern: raw.clone(),
                    source,
                }
            })?),
            None => Matcher::Exact(raw.clone()),
        };
        Ok(SimpleRegex { raw, matcher })
    }

    pub fn is_match(&self, name: &str) -> bool {
        match &self.matcher {
            Matcher::Exact(exact) => exact == name,
            Matcher::Pattern(regex) => regex.is_match(name),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for SimpleRegex {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl TryFrom<String> for SimpleRegex {
    type Error = SchemaError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        SimpleRegex::new(raw)
    }
}

impl From<SimpleRegex> for String {
    fn from(regex: SimpleRegex) -> Self {
        regex.raw
    }
}

impl fmt::Display for SimpleRegex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Hints applied to columns of all tables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnHints {
    /// Columns forming the primary key of any table that does not declare its own
    #[serde(default)]
    pub primary_key: Vec<SimpleRegex>,

    /// Data types preferred for matching columns that have no table definition
    #[serde(default, with = "preferred_types_map")]
    pub preferred_types: Vec<(SimpleRegex, DataType)>,
}

impl ColumnHints {
    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key.iter().any(|r| r.is_match(column))
    }

    /// First preferred type whose matcher accepts `column`
    pub fn preferred_type(&self, column: &str) -> Option<DataType> {
        self.preferred_types
            .iter()
            .find(|(r, _)| r.is_match(column))
            .map(|(_, data_type)| *data_type)
    }

    /// Appends hints not yet present
    pub fn merge(&mut self, other: ColumnHints) {
        for regex in other.primary_key {
            if !self.primary_key.contains(&regex) {
                self.primary_key.push(regex);
            }
        }
        for (regex, data_type) in other.preferred_types {
            match self.preferred_types.iter_mut().find(|(r, _)| *r == regex) {
                Some(existing) => existing.1 = data_type,
                None => self.preferred_types.push((regex, data_type)),
            }
        }
    }
}

/// Preferred types are a `{regex: type}` object in config files
mod preferred_types_map {
    use super::{DataType, IndexMap, SimpleRegex};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        types: &[(SimpleRegex, DataType)],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_map(types.iter().map(|(r, t)| (r.as_str(), t)))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<(SimpleRegex, DataType)>, D::Error> {
        let map = IndexMap::<String, DataType>::deserialize(deserializer)?;
        map.into_iter()
            .map(|(raw, data_type)| {
                SimpleRegex::new(raw)
                    .map(|r| (r, data_type))
                    .map_err(serde::de::Error::custom)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_exact_and_regex() {
        let exact = SimpleRegex::new("id").unwrap();
        assert!(exact.is_match("id"));
        assert!(!exact.is_match("user_id"));

        let pattern = SimpleRegex::new("re:^value$").unwrap();
        assert!(pattern.is_match("value"));
        assert!(!pattern.is_match("value__x"));
    }

    #[test]
    fn test_invalid_regex() {
        let err = SimpleRegex::new("re:(unclosed").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidRegex { .. }));
    }

    #[test]
    fn test_deserialize_hints() {
        let hints: ColumnHints = serde_json::from_value(json!({
            "primary_key": ["id"],
            "preferred_types": {"re:^payload": "complex"}
        }))
        .unwrap();

        assert!(hints.is_primary_key("id"));
        assert!(!hints.is_primary_key("_row_id"));
        assert_eq!(hints.preferred_type("payload__raw"), Some(DataType::Complex));
        assert_eq!(hints.preferred_type("value"), None);
    }

    #[test]
    fn test_merge_hints() {
        let mut hints = ColumnHints::default();
        hints.merge(ColumnHints {
            primary_key: vec![SimpleRegex::new("id").unwrap()],
            preferred_types: vec![(SimpleRegex::new("value").unwrap(), DataType::Text)],
        });
        hints.merge(ColumnHints {
            primary_key: vec![SimpleRegex::new("id").unwrap()],
            preferred_types: vec![(SimpleRegex::new("value").unwrap(), DataType::Complex)],
        });

        assert_eq!(hints.primary_key.len(), 1);
        assert_eq!(hints.preferred_type("value"), Some(DataType::Complex));
    }
}
