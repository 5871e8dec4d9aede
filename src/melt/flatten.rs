//! Flattening of one mapping level into a row
//!
//! Nested mappings are inlined under joined column names, lists are pulled
//! out for child table emission. Values the schema declares complex, and any
//! nested value at the nesting limit, are kept as-is.

use crate::melt::types::Row;
use crate::schema::Schema;
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Shape of a value, decided once per inspected value
#[derive(Debug)]
pub(crate) enum Shape {
    Scalar(Value),
    Mapping(Map<String, Value>),
    Sequence(Vec<Value>),
    /// Nested value retained without decomposition
    Opaque(Value),
}

impl Shape {
    /// Classifies `value`. `keep_opaque` is consulted only for mappings and lists.
    pub(crate) fn inspect(value: Value, keep_opaque: impl FnOnce() -> bool) -> Self {
        let nested = matches!(value, Value::Object(_) | Value::Array(_));
        if nested && keep_opaque() {
            return Shape::Opaque(value);
        }
        match value {
            Value::Object(map) => Shape::Mapping(map),
            Value::Array(items) => Shape::Sequence(items),
            scalar => Shape::Scalar(scalar),
        }
    }
}

/// Result of flattening a mapping
#[derive(Debug, Default)]
pub(crate) struct Flattened {
    pub row: Row,
    /// Normalized path of each list relative to the row's table, in source order
    pub lists: IndexMap<Vec<String>, Vec<Value>>,
}

/// Flattens `dict` for a row of `table` at nesting `level`
pub(crate) fn flatten(schema: &Schema, table: &str, dict: Map<String, Value>, level: usize) -> Flattened {
    let mut out = Flattened::default();
    let mut path = Vec::new();
    flatten_into(schema, table, dict, level, &mut path, &mut out);
    out
}

fn flatten_into(
    schema: &Schema,
    table: &str,
    dict: Map<String, Value>,
    level: usize,
    path: &mut Vec<String>,
    out: &mut Flattened,
) {
    let naming = schema.naming();

    for (key, value) in dict {
        let norm_key = naming.normalize_identifier(&key);
        let column = if path.is_empty() {
            norm_key.clone()
        } else {
            path.push(norm_key.clone());
            let column = naming.shorten_fragments(path);
            path.pop();
            column
        };

        match Shape::inspect(value, || is_opaque(schema, table, &column, level)) {
            Shape::Mapping(map) => {
                path.push(norm_key);
                flatten_into(schema, table, map, level + 1, path, out);
                path.pop();
            }
            Shape::Sequence(items) => {
                let mut list_path = path.clone();
                list_path.push(naming.normalize_table_identifier(&key));
                out.lists.insert(list_path, items);
            }
            Shape::Scalar(value) | Shape::Opaque(value) => {
                // colliding names: the last key wins, the first position is kept
                out.row.insert(column, value);
            }
        }
    }
}

fn is_opaque(schema: &Schema, table: &str, column: &str, level: usize) -> bool {
    schema.max_nesting().is_some_and(|max| level >= max) || schema.is_complex(table, column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnSchema, DataType, TableSchema};
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    fn path(fragments: &[&str]) -> Vec<String> {
        fragments.iter().map(|f| f.to_string()).collect()
    }

    #[test]
    fn test_flatten_fix_field_name() {
        let schema = Schema::new("default");
        let row = object(json!({
            "f-1": "!  30",
            "f 2": [],
            "f!3": {"f4": "a", "f-5": "b", "f*6": {"c": 7, "c v": 8, "c x": []}}
        }));

        let flattened = flatten(&schema, "mock_table", row, 0);
        let columns: Vec<&str> = flattened.row.keys().map(String::as_str).collect();
        assert_eq!(columns, vec!["f_1", "f_3__f4", "f_3__f_5", "f_3__fx6__c", "f_3__fx6__c_v"]);
        assert!(!flattened.row.contains_key("f_3"));

        let lists: Vec<&Vec<String>> = flattened.lists.keys().collect();
        assert_eq!(lists, vec![&path(&["f_2"]), &path(&["f_3", "fx6", "c_x"])]);
    }

    #[test]
    fn test_preserve_complex_value() {
        let mut schema = Schema::new("default");
        schema
            .update_table(
                TableSchema::new("with_complex")
                    .with_column(ColumnSchema::new("value").with_data_type(DataType::Complex)),
            )
            .unwrap();

        let flattened = flatten(&schema, "with_complex", object(json!({"value": 1})), 0);
        assert_eq!(flattened.row["value"], json!(1));

        let flattened = flatten(&schema, "with_complex", object(json!({"value": {"complex": true}})), 0);
        assert_eq!(flattened.row["value"], json!({"complex": true}));
        assert!(!flattened.row.contains_key("value__complex"));

        let flattened = flatten(&schema, "with_complex", object(json!({"value": ["from", {"complex": true}]})), 0);
        assert_eq!(flattened.row["value"], json!(["from", {"complex": true}]));
        assert!(flattened.lists.is_empty());
    }

    #[test]
    fn test_nesting_limit_keeps_values_opaque() {
        let mut schema = Schema::new("default");
        schema.set_max_nesting(Some(1));
        let row = object(json!({"a": {"b": {"c": 1}, "l": [1]}, "top": [2]}));

        let flattened = flatten(&schema, "t", row, 0);
        // "a" flattens at level 1 where nested values are kept
        assert_eq!(flattened.row["a__b"], json!({"c": 1}));
        assert_eq!(flattened.row["a__l"], json!([1]));
        assert_eq!(flattened.lists.len(), 1);
        assert!(flattened.lists.contains_key(&path(&["top"])));
    }

    #[test]
    fn test_last_key_wins() {
        let schema = Schema::new("default");
        let row = object(json!({"a b": 1, "other": 2, "a-b": 3}));

        let flattened = flatten(&schema, "t", row, 0);
        let columns: Vec<&str> = flattened.row.keys().map(String::as_str).collect();
        assert_eq!(columns, vec!["a_b", "other"]);
        assert_eq!(flattened.row["a_b"], json!(3));
    }

    #[test]
    fn test_empty_keys() {
        let schema = Schema::new("default");
        let flattened = flatten(&schema, "t", object(json!({"a": 1, "": 2, "b": {"": 3}})), 0);
        assert_eq!(flattened.row["_empty"], json!(2));
        assert_eq!(flattened.row["b___empty"], json!(3));
    }
}
