use crate::error::{NormalizeError, SchemaError};
use crate::melt::normalizer::{RelationalNormalizer, RowStream};
use crate::melt::types::is_reserved_column;
use crate::naming::{NamingConvention, SnakeCaseNaming};
use crate::schema::config::{NormalizerConfig, SchemaConfig};
use crate::schema::hints::ColumnHints;
use crate::schema::propagation::{compute_propagation, PropagationConfig};
use crate::schema::table::{DataType, TableSchema};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

/// Table definitions, column hints, naming convention and normalizer
/// settings consumed by the relational normalizer.
///
/// Normalization borrows the schema immutably, all mutation goes through
/// `&mut self` methods that recompute derived state before returning.
#[derive(Debug)]
pub struct Schema {
    name: String,
    naming: Box<dyn NamingConvention>,
    tables: IndexMap<String, TableSchema>,
    hints: ColumnHints,
    normalizer: NormalizerConfig,
    /// Effective propagation rules, derived from `normalizer` and `tables`
    propagation: PropagationConfig,
}

impl Schema {
    /// Empty schema with the default snake case naming
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_naming(name, SnakeCaseNaming::default())
    }

    pub fn with_naming(name: impl Into<String>, naming: impl NamingConvention + 'static) -> Self {
        Schema {
            name: name.into(),
            naming: Box::new(naming),
            tables: IndexMap::new(),
            hints: ColumnHints::default(),
            normalizer: NormalizerConfig::default(),
            propagation: PropagationConfig::default(),
        }
    }

    /// Builds a schema from configuration, validating naming settings and tables
    pub fn from_config(config: SchemaConfig) -> Result<Self, SchemaError> {
        let naming = SnakeCaseNaming::with_collision_prob(
            config.naming.max_length,
            config.naming.collision_prob,
        )?;
        let mut schema = Self::with_naming(config.name, naming);
        schema.hints = config.hints;
        schema.update_normalizer_config(config.normalizer);
        for table in config.tables {
            schema.update_table(table)?;
        }
        Ok(schema)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn naming(&self) -> &dyn NamingConvention {
        self.naming.as_ref()
    }

    pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.values()
    }

    pub fn get_table(&self, name: &str) -> Option<&TableSchema> {
        self.tables.get(name)
    }

    pub fn hints(&self) -> &ColumnHints {
        &self.hints
    }

    pub fn normalizer_config(&self) -> &NormalizerConfig {
        &self.normalizer
    }

    /// Effective propagation rules
    pub fn propagation(&self) -> &PropagationConfig {
        &self.propagation
    }

    pub fn max_nesting(&self) -> Option<usize> {
        self.normalizer.max_nesting
    }

    /// Adds a table or merges `table` into the existing definition, then
    /// recomputes propagation rules.
    pub fn update_table(&mut self, table: TableSchema) -> Result<(), SchemaError> {
        if let Some(parent) = &table.parent {
            if parent != &table.name && !self.tables.contains_key(parent) {
                return Err(SchemaError::ParentTableNotFound {
                    table: table.name.clone(),
                    parent: parent.clone(),
                });
            }
        }

        debug!(schema = %self.name, table = %table.name, "updating table");
        match self.tables.get_mut(&table.name) {
            Some(existing) => existing.merge(table),
            None => {
                self.tables.insert(table.name.clone(), table);
            }
        }
        self.recompute_propagation();
        Ok(())
    }

    /// Replaces normalizer settings and recomputes propagation rules
    pub fn update_normalizer_config(&mut self, config: NormalizerConfig) {
        self.normalizer = config;
        self.recompute_propagation();
    }

    pub fn set_max_nesting(&mut self, max_nesting: Option<usize>) {
        self.normalizer.max_nesting = max_nesting;
    }

    pub fn set_propagate_root_id(&mut self, enabled: bool) {
        self.normalizer.propagate_root_id = enabled;
        self.recompute_propagation();
    }

    /// Adds an explicit root propagation rule
    pub fn add_root_propagation(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.normalizer
            .propagation
            .root
            .insert(source.into(), target.into());
        self.recompute_propagation();
    }

    /// Adds an explicit propagation rule for rows of `table`
    pub fn add_table_propagation(
        &mut self,
        table: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) {
        self.normalizer
            .propagation
            .tables
            .entry(table.into())
            .or_default()
            .insert(source.into(), target.into());
        self.recompute_propagation();
    }

    pub fn merge_hints(&mut self, hints: ColumnHints) {
        self.hints.merge(hints);
    }

    fn recompute_propagation(&mut self) {
        self.propagation = compute_propagation(
            &self.normalizer.propagation,
            self.normalizer.propagate_root_id,
            self.tables.values(),
            self.naming.as_ref(),
        );
        debug!(
            schema = %self.name,
            root_rules = self.propagation.root.len(),
            table_rules = self.propagation.tables.len(),
            "recomputed propagation"
        );
    }

    /// Whether nested values in `column` of `table` are kept as-is.
    ///
    /// A column defined on the table decides by its data type; otherwise the
    /// preferred type hints are consulted.
    pub fn is_complex(&self, table: &str, column: &str) -> bool {
        let data_type = match self.tables.get(table).and_then(|t| t.column(column)) {
            Some(column) => column.data_type,
            None => self.hints.preferred_type(column),
        };
        data_type == Some(DataType::Complex)
    }

    /// Primary key values present in `row`, in key order.
    ///
    /// Keys declared on the table take precedence over schema-level hints.
    /// Hints never match the normalizer's own linkage and load columns.
    pub fn primary_key_values<'r>(&self, table: &str, row: &'r Map<String, Value>) -> Vec<&'r Value> {
        if let Some(table) = self.tables.get(table) {
            let declared: Vec<&str> = table.primary_key().map(|c| c.name.as_str()).collect();
            if !declared.is_empty() {
                return declared.iter().filter_map(|name| row.get(*name)).collect();
            }
        }
        if self.hints.primary_key.is_empty() {
            return Vec::new();
        }
        row.iter()
            .filter(|(name, _)| !is_reserved_column(name) && self.hints.is_primary_key(name))
            .map(|(_, value)| value)
            .collect()
    }

    pub fn normalizer(&self) -> RelationalNormalizer<'_> {
        RelationalNormalizer::new(self)
    }

    /// Normalizes one item into rows of `table_name` and its child tables
    pub fn normalize_data_item(&self, item: Value, load_id: &str, table_name: &str) -> RowStream<'_> {
        self.normalizer().normalize(item, load_id, table_name)
    }

    /// Like [`Schema::normalize_data_item`] for any serializable item
    pub fn normalize_item<T: Serialize + ?Sized>(
        &self,
        item: &T,
        load_id: &str,
        table_name: &str,
    ) -> Result<RowStream<'_>, NormalizeError> {
        self.normalizer().normalize_item(item, load_id, table_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::melt::types::{ROOT_ID_COLUMN, ROW_ID_COLUMN};
    use crate::schema::hints::SimpleRegex;
    use crate::schema::table::{ColumnSchema, WriteDisposition};
    use serde_json::json;

    #[test]
    fn test_propagation_update_on_table_change() {
        let mut schema = Schema::new("default");

        let mut table_1 = TableSchema::new("table_1").with_write_disposition(WriteDisposition::Append);
        schema.update_table(table_1.clone()).unwrap();
        assert!(schema.propagation().is_empty());

        table_1.write_disposition = Some(WriteDisposition::Merge);
        schema.update_table(table_1).unwrap();
        assert_eq!(schema.propagation().tables["table_1"][ROW_ID_COLUMN], ROOT_ID_COLUMN);

        schema.update_table(TableSchema::new("table_2").with_parent("table_1")).unwrap();
        assert!(!schema.propagation().tables.contains_key("table_2"));

        schema.add_table_propagation("table_3", "prop1", "prop2");
        schema
            .update_table(TableSchema::new("table_3").with_write_disposition(WriteDisposition::Merge))
            .unwrap();
        let rules = &schema.propagation().tables["table_3"];
        assert_eq!(rules.len(), 2);
        assert_eq!(rules[ROW_ID_COLUMN], ROOT_ID_COLUMN);
        assert_eq!(rules["prop1"], "prop2");
    }

    #[test]
    fn test_missing_parent_table() {
        let mut schema = Schema::new("default");
        let err = schema
            .update_table(TableSchema::new("orphan__items").with_parent("orphan"))
            .unwrap_err();
        assert!(matches!(err, SchemaError::ParentTableNotFound { .. }));
    }

    #[test]
    fn test_is_complex() {
        let mut schema = Schema::new("default");
        schema
            .update_table(
                TableSchema::new("with_complex")
                    .with_column(ColumnSchema::new("value").with_data_type(DataType::Complex))
                    .with_column(ColumnSchema::new("payload").with_data_type(DataType::Text)),
            )
            .unwrap();
        schema.merge_hints(ColumnHints {
            primary_key: vec![],
            preferred_types: vec![(SimpleRegex::new("re:^payload$").unwrap(), DataType::Complex)],
        });

        assert!(schema.is_complex("with_complex", "value"));
        assert!(!schema.is_complex("other", "value"));
        // the table definition wins over the hint
        assert!(!schema.is_complex("with_complex", "payload"));
        assert!(schema.is_complex("other", "payload"));
    }

    #[test]
    fn test_primary_key_values() {
        let mut schema = Schema::new("default");
        schema
            .update_table(
                TableSchema::new("users")
                    .with_column(ColumnSchema::new("tenant").primary_key())
                    .with_column(ColumnSchema::new("id").primary_key()),
            )
            .unwrap();
        schema.merge_hints(ColumnHints {
            primary_key: vec![SimpleRegex::new("id").unwrap()],
            preferred_types: vec![],
        });

        let row = json!({"id": 7, "tenant": "acme", "name": "x"}).as_object().cloned().unwrap();
        assert_eq!(schema.primary_key_values("users", &row), vec![&json!("acme"), &json!(7)]);
        assert_eq!(schema.primary_key_values("posts", &row), vec![&json!(7)]);

        let no_key = json!({"name": "x"}).as_object().cloned().unwrap();
        assert!(schema.primary_key_values("posts", &no_key).is_empty());
    }

    #[test]
    fn test_key_hints_skip_reserved_columns() {
        let mut schema = Schema::new("default");
        schema.merge_hints(ColumnHints {
            primary_key: vec![SimpleRegex::new("re:id$").unwrap()],
            preferred_types: vec![],
        });

        let row = json!({
            "id": 7,
            "_load_id": "load_1",
            "_root_id": "abc",
            "_parent_id": "def",
            "device_id": "x"
        })
        .as_object()
        .cloned()
        .unwrap();
        assert_eq!(schema.primary_key_values("events", &row), vec![&json!(7), &json!("x")]);
    }

    #[test]
    fn test_from_config() {
        let config = SchemaConfig::from_json(
            r#"{
                "name": "events",
                "naming": {"max_length": 3},
                "tables": []
            }"#,
        )
        .unwrap();
        assert!(matches!(
            Schema::from_config(config),
            Err(SchemaError::MaxLengthTooShort { .. })
        ));

        let config = SchemaConfig::from_json(
            r#"{
                "name": "events",
                "normalizer": {"propagate_root_id": true},
                "tables": [
                    {"name": "events", "write_disposition": "merge"},
                    {"name": "events__items", "parent": "events"}
                ]
            }"#,
        )
        .unwrap();
        let schema = Schema::from_config(config).unwrap();
        assert_eq!(schema.tables().count(), 2);
        assert_eq!(schema.propagation().root[ROW_ID_COLUMN], ROOT_ID_COLUMN);
        assert!(schema.propagation().tables.contains_key("events"));
    }
}
