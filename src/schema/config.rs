//! Schema configuration loaded from JSON files

use crate::error::SchemaError;
use crate::naming::DEFAULT_COLLISION_PROB;
use crate::schema::hints::ColumnHints;
use crate::schema::propagation::PropagationConfig;
use crate::schema::table::TableSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings of the naming convention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Maximum length of table and column names, unbounded if omitted
    #[serde(default)]
    pub max_length: Option<usize>,

    /// Target collision probability of shortening tags
    #[serde(default = "default_collision_prob")]
    pub collision_prob: f64,
}

fn default_collision_prob() -> f64 {
    DEFAULT_COLLISION_PROB
}

impl Default for NamingConfig {
    fn default() -> Self {
        NamingConfig {
            max_length: None,
            collision_prob: DEFAULT_COLLISION_PROB,
        }
    }
}

/// Settings of the relational normalizer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NormalizerConfig {
    /// Nesting level at which lists and objects are kept as opaque values.
    /// `Some(0)` keeps every nested value on the root row.
    #[serde(default)]
    pub max_nesting: Option<usize>,

    /// Propagate the root row id to all descendant rows
    #[serde(default)]
    pub propagate_root_id: bool,

    /// Explicit propagation rules
    #[serde(default)]
    pub propagation: PropagationConfig,
}

/// Complete schema configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub name: String,

    #[serde(default)]
    pub naming: NamingConfig,

    #[serde(default)]
    pub normalizer: NormalizerConfig,

    #[serde(default)]
    pub hints: ColumnHints,

    #[serde(default)]
    pub tables: Vec<TableSchema>,
}

impl SchemaConfig {
    pub fn new(name: impl Into<String>) -> Self {
        SchemaConfig {
            name: name.into(),
            naming: NamingConfig::default(),
            normalizer: NormalizerConfig::default(),
            hints: ColumnHints::default(),
            tables: Vec::new(),
        }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::table::WriteDisposition;

    #[test]
    fn test_minimal_config() {
        let config = SchemaConfig::from_json(r#"{"name": "events"}"#).unwrap();
        assert_eq!(config, SchemaConfig::new("events"));
        assert_eq!(config.naming.collision_prob, DEFAULT_COLLISION_PROB);
    }

    #[test]
    fn test_full_config() {
        let config = SchemaConfig::from_json(
            r#"{
                "name": "discord",
                "naming": {"max_length": 63},
                "normalizer": {
                    "max_nesting": 3,
                    "propagate_root_id": true,
                    "propagation": {
                        "root": {"timestamp": "_partition_ts"},
                        "tables": {"discord__messages": {"channel_id": "_channel_id"}}
                    }
                },
                "hints": {"primary_key": ["id"], "preferred_types": {"re:^payload$": "complex"}},
                "tables": [
                    {"name": "discord", "write_disposition": "merge", "columns": [{"name": "id", "primary_key": true}]}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.naming.max_length, Some(63));
        assert_eq!(config.normalizer.max_nesting, Some(3));
        assert!(config.normalizer.propagate_root_id);
        assert_eq!(config.normalizer.propagation.root["timestamp"], "_partition_ts");
        assert_eq!(config.tables[0].write_disposition, Some(WriteDisposition::Merge));
        assert!(config.hints.is_primary_key("id"));
    }

    #[test]
    fn test_invalid_config() {
        let err = SchemaConfig::from_json(r#"{"name": "x", "hints": {"primary_key": ["re:("]}}"#).unwrap_err();
        assert!(matches!(err, SchemaError::Json(_)));

        let err = SchemaConfig::from_path("/nonexistent/schema.json").unwrap_err();
        assert!(matches!(err, SchemaError::Io(_)));
    }
}
