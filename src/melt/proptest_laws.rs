//! Property-based checks of the normalizer over arbitrary documents.

use crate::melt::types::{Row, TableIdentity, LIST_IDX_COLUMN, PARENT_ID_COLUMN, ROW_ID_COLUMN};
use crate::naming::SnakeCaseNaming;
use crate::schema::Schema;
use indexmap::IndexMap;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::collections::HashMap;

const MAX_LENGTH: usize = 20;

/// Nested documents with mixed scalars, mappings and lists of lists
fn arb_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        "[a-z]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::vec(("[a-zA-Z ]{0,24}", inner), 0..6)
                .prop_map(|fields| Value::Object(fields.into_iter().collect())),
        ]
    })
}

/// Documents with a fixed root id, so every other id is derived from it
fn arb_document() -> impl Strategy<Value = Value> {
    arb_value().prop_map(|doc| json!({"_row_id": "root", "doc": doc}))
}

fn normalize(schema: &Schema, doc: &Value) -> Vec<(TableIdentity, Row)> {
    schema.normalize_data_item(doc.clone(), "load_id", "documents").collect()
}

fn short_schema() -> Schema {
    match SnakeCaseNaming::new(Some(MAX_LENGTH)) {
        Ok(naming) => Schema::with_naming("laws", naming),
        Err(err) => panic!("invalid naming settings: {}", err),
    }
}

proptest! {
    #[test]
    fn parents_precede_children(doc in arb_document()) {
        let schema = Schema::new("laws");
        let rows = normalize(&schema, &doc);
        prop_assert!(rows[0].0.is_root());

        let mut seen: HashMap<String, String> = HashMap::new();
        for (identity, row) in &rows {
            if let Some(parent_table) = &identity.parent_table_name {
                let parent_id = row[PARENT_ID_COLUMN].as_str().unwrap_or_default();
                prop_assert_eq!(seen.get(parent_id), Some(parent_table));
            }
            let id = row[ROW_ID_COLUMN].as_str().unwrap_or_default().to_string();
            seen.insert(id, identity.table_name.clone());
        }
    }

    #[test]
    fn list_positions_are_dense(doc in arb_document()) {
        let schema = Schema::new("laws");
        let mut positions: IndexMap<(String, String), Vec<u64>> = IndexMap::new();
        for (identity, row) in normalize(&schema, &doc) {
            if identity.is_root() {
                continue;
            }
            let parent_id = row[PARENT_ID_COLUMN].as_str().unwrap_or_default().to_string();
            let idx = row[LIST_IDX_COLUMN].as_u64();
            prop_assert!(idx.is_some());
            positions
                .entry((identity.table_name, parent_id))
                .or_default()
                .extend(idx);
        }
        for idx in positions.values() {
            let expected: Vec<u64> = (0..idx.len() as u64).collect();
            prop_assert_eq!(idx, &expected);
        }
    }

    #[test]
    fn names_fit_max_length(doc in arb_document()) {
        let schema = short_schema();
        for (identity, row) in normalize(&schema, &doc) {
            prop_assert!(identity.table_name.len() <= MAX_LENGTH, "table {}", identity.table_name);
            for column in row.keys() {
                prop_assert!(column.len() <= MAX_LENGTH, "column {}", column);
            }
        }
    }

    #[test]
    fn derived_ids_are_reproducible(doc in arb_document()) {
        let schema = short_schema();
        prop_assert_eq!(normalize(&schema, &doc), normalize(&schema, &doc));
    }
}
