//! # Smelter - relational normalization of nested JSON
//!
//! Decomposes nested JSON documents into rows of flat, linked tables ready
//! for loading into a relational destination.
//!
//! ## Modules
//!
//! - **melt**: the normalizer, row stream and JSON Lines writers
//! - **schema**: tables, column hints and normalizer settings
//! - **naming**: the snake case naming convention and identifier shortening
//! - **hasher**: row identifiers
//!
//! ## Quick Start
//!
//! ```rust
//! use smelter::schema::Schema;
//! use serde_json::json;
//!
//! let schema = Schema::new("events");
//! let data = json!({
//!     "id": 1,
//!     "user": {"name": "Alice"},
//!     "posts": [
//!         {"id": 10, "title": "First Post"},
//!         {"id": 11, "title": "Second Post"}
//!     ]
//! });
//!
//! let rows: Vec<_> = schema.normalize_data_item(data, "load_1", "users").collect();
//!
//! // rows[0] = root row (id, user__name, _row_id, _load_id)
//! // rows[1-2] = posts rows linked by _parent_id and _list_idx
//! assert_eq!(rows[0].0.table_name, "users");
//! assert_eq!(rows[0].1["user__name"], "Alice");
//! assert_eq!(rows[2].0.table_name, "users__posts");
//! assert_eq!(rows[2].1["_list_idx"], 1);
//! ```

use anyhow::{Context, Result};
use serde_json::Value;
use std::io::BufRead;
use tracing::debug;

pub mod error;
pub mod hasher;
pub mod melt;
pub mod naming;
pub mod schema;

// Re-export commonly used types for convenience
pub use error::{NormalizeError, SchemaError};
pub use melt::{Descend, RelationalNormalizer, Row, RowId, RowStream, SingleWriter, TableIdentity, TableWriter};
pub use naming::{NamingConvention, SnakeCaseNaming};
pub use schema::{Schema, SchemaConfig};

/// Main entry point: normalize a JSON Lines stream into per-table files.
///
/// Every line is one document for `table_name`. Blank lines are skipped.
/// Returns the number of rows written.
pub fn normalize_json<R: BufRead>(
    reader: R,
    writer: &mut TableWriter,
    schema: &Schema,
    load_id: &str,
    table_name: &str,
) -> Result<usize> {
    let mut written = 0;

    for (line_no, line) in reader.lines().enumerate() {
        let line = line.context("Failed to read line")?;
        if line.trim().is_empty() {
            continue;
        }
        let value: Value = serde_json::from_str(&line)
            .with_context(|| format!("Failed to parse JSON on line {}", line_no + 1))?;

        written += writer.write_rows(schema.normalize_data_item(value, load_id, table_name))?;
    }

    debug!(rows = written, table = table_name, "normalized stream");
    Ok(written)
}
