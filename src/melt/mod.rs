//! JSON melting - decompose nested documents into relational tables
//!
//! A document becomes one root row plus one row per element of every nested
//! list, each list landing in its own child table. Nested mappings are
//! flattened into their row. Rows link to their parent through
//! `_parent_id` and `_list_idx`.

pub(crate) mod flatten;
pub mod normalizer;
pub mod types;
pub mod writer;

#[cfg(test)]
mod proptest_laws;

pub use normalizer::{RelationalNormalizer, RowStream};
pub use types::{Descend, Row, RowId, TableIdentity};
pub use writer::{SingleWriter, TableWriter};
