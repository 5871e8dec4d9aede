use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Column data types known to the schema.
///
/// Only [`DataType::Complex`] changes normalization: complex columns keep
/// nested values as-is instead of flattening them or emitting child tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Text,
    Double,
    Bool,
    Timestamp,
    Bigint,
    Binary,
    Complex,
    Decimal,
    Date,
    Time,
}

/// How a destination applies rows of a table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDisposition {
    Skip,
    #[default]
    Append,
    Replace,
    Merge,
}

/// A single column definition with its hints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<DataType>,

    #[serde(default)]
    pub primary_key: bool,

    #[serde(default)]
    pub merge_key: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>) -> Self {
        ColumnSchema {
            name: name.into(),
            data_type: None,
            primary_key: false,
            merge_key: false,
        }
    }

    pub fn with_data_type(mut self, data_type: DataType) -> Self {
        self.data_type = Some(data_type);
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn merge_key(mut self) -> Self {
        self.merge_key = true;
        self
    }

    /// Overwrites this column with the set properties of `other`
    fn merge(&mut self, other: ColumnSchema) {
        if other.data_type.is_some() {
            self.data_type = other.data_type;
        }
        self.primary_key |= other.primary_key;
        self.merge_key |= other.merge_key;
    }
}

/// A table definition. Names are expected to be already normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_disposition: Option<WriteDisposition>,

    #[serde(default, with = "columns_as_list")]
    pub columns: IndexMap<String, ColumnSchema>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>) -> Self {
        TableSchema {
            name: name.into(),
            parent: None,
            write_disposition: None,
            columns: IndexMap::new(),
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_write_disposition(mut self, write_disposition: WriteDisposition) -> Self {
        self.write_disposition = Some(write_disposition);
        self
    }

    pub fn with_column(mut self, column: ColumnSchema) -> Self {
        self.columns.insert(column.name.clone(), column);
        self
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Columns carrying the primary key hint, in definition order
    pub fn primary_key(&self) -> impl Iterator<Item = &ColumnSchema> {
        self.columns.values().filter(|c| c.primary_key)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
        self.columns.get(name)
    }

    /// Merges a partial definition of the same table into this one.
    ///
    /// New columns are appended, existing ones updated in place. Parent and
    /// write disposition are replaced only when `partial` sets them.
    pub(crate) fn merge(&mut self, partial: TableSchema) {
        if partial.parent.is_some() {
            self.parent = partial.parent;
        }
        if partial.write_disposition.is_some() {
            self.write_disposition = partial.write_disposition;
        }
        for (name, column) in partial.columns {
            match self.columns.get_mut(&name) {
                Some(existing) => existing.merge(column),
                None => {
                    self.columns.insert(name, column);
                }
            }
        }
    }
}

/// Columns are written as a list in config files, the name is part of each entry
mod columns_as_list {
    use super::ColumnSchema;
    use indexmap::IndexMap;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        columns: &IndexMap<String, ColumnSchema>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(columns.values())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<IndexMap<String, ColumnSchema>, D::Error> {
        let columns = Vec::<ColumnSchema>::deserialize(deserializer)?;
        Ok(columns.into_iter().map(|c| (c.name.clone(), c)).collect())
    }
}
