use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Row identifier column, present on every row
pub const ROW_ID_COLUMN: &str = "_row_id";

/// Identifier of the parent row, present on list element rows
pub const PARENT_ID_COLUMN: &str = "_parent_id";

/// Zero-based position in the source list, present on list element rows
pub const LIST_IDX_COLUMN: &str = "_list_idx";

/// Identifier of the document's root row, present when propagated
pub const ROOT_ID_COLUMN: &str = "_root_id";

/// Load identifier stamped on the root row
pub const LOAD_ID_COLUMN: &str = "_load_id";

/// Column holding wrapped scalars and non-mapping roots
pub const VALUE_COLUMN: &str = "value";

/// Column of the wrapper row created for a list nested directly in a list
pub const LIST_COLUMN: &str = "list";

/// Prefix of the columns carrying a root table's key values on its descendants
pub const ROOT_KEY_PREFIX: &str = "_root_key_";

/// Linkage and load columns written by the normalizer itself
pub const RESERVED_COLUMNS: [&str; 5] = [
    ROW_ID_COLUMN,
    PARENT_ID_COLUMN,
    LIST_IDX_COLUMN,
    ROOT_ID_COLUMN,
    LOAD_ID_COLUMN,
];

pub fn is_reserved_column(name: &str) -> bool {
    RESERVED_COLUMNS.contains(&name)
}

/// A normalized row: column name -> value, in insertion order
pub type Row = Map<String, Value>;

/// Unique identifier of a row
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowId(pub String);

impl RowId {
    pub fn new(id: impl Into<String>) -> Self {
        RowId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Adopts an identifier already present on a row.
    ///
    /// Strings are taken as-is, other scalars by their JSON text. Null and
    /// empty strings are not identifiers.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(RowId(s.clone())),
            other => Some(RowId(other.to_string())),
        }
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<RowId> for Value {
    fn from(id: RowId) -> Self {
        Value::String(id.0)
    }
}

/// Normalized table name of a row and of its parent table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableIdentity {
    pub table_name: String,

    /// `None` for root rows
    pub parent_table_name: Option<String>,
}

impl TableIdentity {
    pub fn root(table_name: impl Into<String>) -> Self {
        TableIdentity {
            table_name: table_name.into(),
            parent_table_name: None,
        }
    }

    pub fn child(table_name: impl Into<String>, parent_table_name: impl Into<String>) -> Self {
        TableIdentity {
            table_name: table_name.into(),
            parent_table_name: Some(parent_table_name.into()),
        }
    }

    pub fn is_root(&self) -> bool {
        self.parent_table_name.is_none()
    }
}

/// Caller decision after receiving a row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Descend {
    /// Normalize the child tables of the last row
    #[default]
    Yes,
    /// Skip the child tables of the last row, continue with its siblings
    No,
    /// Stop normalizing the document
    Stop,
}
