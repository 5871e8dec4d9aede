//! Row identifier hashing
//!
//! All identifiers are [`ID_LENGTH_BYTES`] bytes encoded as URL-safe base64
//! without padding, so they can appear verbatim in storage paths.

use crate::melt::types::RowId;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use xxhash_rust::xxh3::xxh3_128;

/// Number of raw bytes in a row identifier
pub const ID_LENGTH_BYTES: usize = 10;

/// Length of an encoded row identifier in characters
pub const ID_LENGTH_CHARS: usize = (ID_LENGTH_BYTES * 8).div_ceil(6);

/// Deterministic identifier derived from `content`
pub fn digest(content: impl AsRef<[u8]>) -> RowId {
    let hash = xxh3_128(content.as_ref()).to_le_bytes();
    RowId(URL_SAFE_NO_PAD.encode(&hash[..ID_LENGTH_BYTES]))
}

/// Fresh random identifier, different on every call
pub fn random_id() -> RowId {
    let bytes: [u8; ID_LENGTH_BYTES] = rand::random();
    RowId(URL_SAFE_NO_PAD.encode(bytes))
}

/// Deterministic identifier of a list element row.
///
/// Lists are ordered, so parent id + child table + position identify the
/// element across repeated runs.
pub fn child_row_id(parent_row_id: &str, child_table: &str, list_idx: usize) -> RowId {
    digest(format!("{}_{}_{}", parent_row_id, child_table, list_idx))
}
