//! Naming conventions for tables and columns
//!
//! A naming convention turns arbitrary field and table names into valid,
//! length-bounded identifiers. Shortening is deterministic: a name that
//! exceeds the maximum length keeps its head and tail around a short tag
//! hashed from the full, un-shortened path.

pub mod snake_case;

pub use snake_case::SnakeCaseNaming;

use crate::error::SchemaError;
use crate::melt::types::RESERVED_COLUMNS;
use base64::{engine::general_purpose::STANDARD_NO_PAD, Engine};
use std::fmt;
use xxhash_rust::xxh3::xxh3_128_with_seed;

/// Separator between nested table and column name fragments
pub const PATH_SEPARATOR: &str = "__";

/// Identifier used for empty or blank keys
pub const EMPTY_KEY_IDENTIFIER: &str = "_empty";

/// Default probability that two distinct paths get the same tag
pub const DEFAULT_COLLISION_PROB: f64 = 0.001;

/// Upper bound on tag size, lower collision probabilities are rejected
pub const MAX_TAG_BYTES: usize = 64;

/// Maps raw strings to identifiers.
///
/// Implementations must be pure: the same input always produces the same
/// output, so re-normalizing identical data yields identical names.
pub trait NamingConvention: fmt::Debug + Send + Sync {
    /// Maximum identifier length, `None` for unbounded
    fn max_length(&self) -> Option<usize>;

    /// Target collision probability for shortening tags
    fn collision_prob(&self) -> f64;

    /// Normalizes a single identifier (column name or path fragment)
    fn normalize_identifier(&self, identifier: &str) -> String;

    /// Normalizes a single table name fragment
    fn normalize_table_identifier(&self, identifier: &str) -> String {
        self.normalize_identifier(identifier)
    }

    /// Joins non-blank fragments with [`PATH_SEPARATOR`]
    fn make_path(&self, identifiers: &[String]) -> String {
        identifiers
            .iter()
            .filter(|ident| !ident.trim().is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(PATH_SEPARATOR)
    }

    /// Splits a path into its non-blank fragments
    fn break_path(&self, path: &str) -> Vec<String> {
        path.split(PATH_SEPARATOR)
            .filter(|ident| !ident.trim().is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Breaks a raw path, normalizes every fragment and shortens the result
    /// against the raw path
    fn normalize_path(&self, path: &str) -> String {
        let fragments: Vec<String> = self
            .break_path(path)
            .iter()
            .map(|fragment| self.normalize_identifier(fragment))
            .collect();
        self.shorten(&self.make_path(&fragments), path)
    }

    /// Joins already normalized fragments and shortens the joined path
    fn shorten_fragments(&self, fragments: &[String]) -> String {
        let path = self.make_path(fragments);
        self.shorten(&path, &path)
    }

    /// Shortens `normalized` to the maximum length, tagging with a hash of `identifier`
    fn shorten(&self, normalized: &str, identifier: &str) -> String {
        shorten_identifier(normalized, identifier, self.max_length(), self.collision_prob())
    }
}

/// Shortens `normalized` to `max_length` if it is longer.
///
/// The tag is computed from `identifier`, the full un-shortened name, so two
/// distinct paths sharing a head and tail still end up with different names.
pub fn shorten_identifier(
    normalized: &str,
    identifier: &str,
    max_length: Option<usize>,
    collision_prob: f64,
) -> String {
    match max_length {
        Some(max_length) if normalized.len() > max_length => {
            let tag = compute_tag(identifier, collision_prob);
            trim_and_tag(normalized, &tag, max_length)
        }
        _ => normalized.to_string(),
    }
}

/// Computes a short lowercase alphanumeric tag for `identifier`
pub fn compute_tag(identifier: &str, collision_prob: f64) -> String {
    let len = tag_bytes(collision_prob);
    let mut bytes = Vec::with_capacity(len + 16);
    let mut seed = 0u64;
    while bytes.len() < len {
        bytes.extend_from_slice(&xxh3_128_with_seed(identifier.as_bytes(), seed).to_le_bytes());
        seed += 1;
    }
    bytes.truncate(len);

    STANDARD_NO_PAD
        .encode(&bytes)
        .chars()
        .map(|c| match c {
            '/' => 'a',
            '+' => 'b',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// Length in characters of tags produced for `collision_prob`
pub fn tag_length(collision_prob: f64) -> usize {
    (tag_bytes(collision_prob) * 8).div_ceil(6)
}

fn tag_bytes(collision_prob: f64) -> usize {
    required_tag_bytes(collision_prob).unwrap_or(MAX_TAG_BYTES)
}

/// Number of digest bytes needed so the encoded tag has enough resolution
/// for the requested collision probability. `None` if that exceeds
/// [`MAX_TAG_BYTES`] or the probability is not a number.
fn required_tag_bytes(collision_prob: f64) -> Option<usize> {
    let resolution = (1.0 / collision_prob).log2() * 2.0;
    let sextets = ((resolution + 5.0) / 6.0).floor();
    let bytes = (sextets * 6.0 / 8.0).floor();
    if bytes.is_nan() || bytes > MAX_TAG_BYTES as f64 {
        return None;
    }
    Some(bytes.max(0.0) as usize)
}

/// Keeps the head and tail of `identifier` around `tag`, output is exactly `max_length` long
fn trim_and_tag(identifier: &str, tag: &str, max_length: usize) -> String {
    debug_assert!(tag.len() <= max_length);
    let remaining = max_length - tag.len();
    let head = remaining / 2 + remaining % 2;
    let tail = remaining / 2;
    // normalized identifiers are ascii
    let trimmed = format!(
        "{}{}{}",
        &identifier[..head],
        tag,
        &identifier[identifier.len() - tail..]
    );
    debug_assert_eq!(trimmed.len(), max_length);
    trimmed
}

/// Validates naming settings, called when a convention is constructed.
///
/// `max_length` must hold a collision tag and every reserved column name,
/// since reserved columns are never shortened.
pub(crate) fn validate_settings(
    max_length: Option<usize>,
    collision_prob: f64,
) -> Result<(), SchemaError> {
    let in_range = collision_prob > 0.0 && collision_prob < 1.0;
    if !in_range || required_tag_bytes(collision_prob).map_or(true, |bytes| bytes == 0) {
        return Err(SchemaError::InvalidCollisionProb(collision_prob));
    }
    let Some(max_length) = max_length else {
        return Ok(());
    };
    let tag_length = tag_length(collision_prob);
    if max_length < tag_length {
        return Err(SchemaError::MaxLengthTooShort { max_length, tag_length });
    }
    let longest = RESERVED_COLUMNS
        .iter()
        .chain(std::iter::once(&EMPTY_KEY_IDENTIFIER))
        .max_by_key(|column| column.len())
        .copied()
        .unwrap_or_default();
    if max_length < longest.len() {
        return Err(SchemaError::MaxLengthBelowReserved {
            max_length,
            column: longest,
        });
    }
    Ok(())
}
