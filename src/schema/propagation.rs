//! Propagation of parent columns to descendant rows
//!
//! Each rule maps a source column name to a target column name. Root rules
//! read from the root row of a document; table rules read from rows of exactly
//! that table. The values are copied onto every descendant row.

use crate::melt::types::{ROOT_ID_COLUMN, ROOT_KEY_PREFIX, ROW_ID_COLUMN};
use crate::naming::NamingConvention;
use crate::schema::table::{TableSchema, WriteDisposition};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Source column -> target column
pub type PropagationRules = IndexMap<String, String>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropagationConfig {
    #[serde(default)]
    pub root: PropagationRules,

    #[serde(default)]
    pub tables: IndexMap<String, PropagationRules>,
}

impl PropagationConfig {
    pub fn is_empty(&self) -> bool {
        self.root.is_empty() && self.tables.values().all(|rules| rules.is_empty())
    }

    /// Values a row contributes to the context of its descendants.
    ///
    /// Root rules are applied first so table rules win on the same target.
    /// Rules whose source column is missing from the row are skipped.
    pub fn propagated_values(&self, table: &str, is_root: bool, row: &Map<String, Value>) -> Map<String, Value> {
        let mut extend = Map::new();
        let root_rules = if is_root { Some(&self.root) } else { None };
        let table_rules = self.tables.get(table);

        for rules in root_rules.into_iter().chain(table_rules) {
            for (source, target) in rules {
                if let Some(value) = row.get(source) {
                    extend.insert(target.clone(), value.clone());
                }
            }
        }
        extend
    }
}

/// Derives the effective propagation config from the explicit one.
///
/// - `propagate_root_id` adds a root rule copying the row id as root id
/// - root tables with a write disposition other than append get the same
///   rule as a table rule, so merge destinations can trace each descendant
///   back to its top level row
/// - those tables also copy their primary and merge key columns to
///   `_root_key_<column>` on every descendant
///
/// Derived rules never replace explicit rules for the same source column.
pub fn compute_propagation<'a>(
    explicit: &PropagationConfig,
    propagate_root_id: bool,
    tables: impl IntoIterator<Item = &'a TableSchema>,
    naming: &dyn NamingConvention,
) -> PropagationConfig {
    let mut config = explicit.clone();

    if propagate_root_id {
        config
            .root
            .entry(ROW_ID_COLUMN.to_string())
            .or_insert_with(|| ROOT_ID_COLUMN.to_string());
    }

    for table in tables {
        let disposition = table.write_disposition.unwrap_or_default();
        if !table.is_root() || disposition == WriteDisposition::Append {
            continue;
        }
        let rules = config.tables.entry(table.name.clone()).or_default();
        rules
            .entry(ROW_ID_COLUMN.to_string())
            .or_insert_with(|| ROOT_ID_COLUMN.to_string());

        for column in table.columns.values().filter(|c| c.primary_key || c.merge_key) {
            rules
                .entry(column.name.clone())
                .or_insert_with(|| naming.normalize_identifier(&format!("{ROOT_KEY_PREFIX}{}", column.name)));
        }
    }

    config
}
