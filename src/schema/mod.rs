//! Schema contract
//!
//! Holds table definitions, column hints, the naming convention and the
//! normalizer configuration, including derived propagation rules.

pub mod config;
pub mod contract;
pub mod hints;
pub mod propagation;
pub mod table;

pub use config::{NamingConfig, NormalizerConfig, SchemaConfig};
pub use contract::Schema;
pub use hints::{ColumnHints, SimpleRegex};
pub use propagation::{compute_propagation, PropagationConfig, PropagationRules};
pub use table::{ColumnSchema, DataType, TableSchema, WriteDisposition};
