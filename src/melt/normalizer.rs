//! The relational normalizer
//!
//! Decomposes one nested document into rows of a root table and child tables.
//! Rows are produced lazily from an explicit depth-first work stack: a row is
//! always yielded before its descendants, sibling subtrees follow source
//! order, and the caller may prune the descendants of any yielded row.

use crate::error::NormalizeError;
use crate::hasher;
use crate::melt::flatten::flatten;
use crate::melt::types::{
    Descend, Row, RowId, TableIdentity, LIST_COLUMN, LIST_IDX_COLUMN, LOAD_ID_COLUMN,
    PARENT_ID_COLUMN, ROW_ID_COLUMN, VALUE_COLUMN,
};
use crate::schema::Schema;
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, trace};

/// Normalizes documents against a borrowed schema
#[derive(Debug, Clone, Copy)]
pub struct RelationalNormalizer<'s> {
    schema: &'s Schema,
}

impl<'s> RelationalNormalizer<'s> {
    pub fn new(schema: &'s Schema) -> Self {
        RelationalNormalizer { schema }
    }

    /// Starts normalizing `item` into `root_table_name` and its child tables.
    ///
    /// Non-mapping items are wrapped into `{"value": item}`. `load_id` is
    /// stamped on the root row. `root_table_name` is a raw name and goes
    /// through the naming convention.
    pub fn normalize(&self, item: Value, load_id: &str, root_table_name: &str) -> RowStream<'s> {
        let root = match item {
            Value::Object(map) => map,
            other => wrap(VALUE_COLUMN, other),
        };

        let table = self.schema.naming().normalize_table_identifier(root_table_name);
        RowStream {
            normalizer: *self,
            stack: vec![Frame::Root {
                table,
                item: root,
                load_id: load_id.to_string(),
            }],
            pending: Vec::new(),
        }
    }

    /// Serializes `item` and normalizes it.
    ///
    /// Fails without producing any row if the item has no JSON representation.
    pub fn normalize_item<T: Serialize + ?Sized>(
        &self,
        item: &T,
        load_id: &str,
        root_table_name: &str,
    ) -> Result<RowStream<'s>, NormalizeError> {
        let value = serde_json::to_value(item).map_err(|source| NormalizeError::UnrepresentableItem {
            table: root_table_name.to_string(),
            source,
        })?;
        Ok(self.normalize(value, load_id, root_table_name))
    }

    fn process(&self, frame: Frame) -> (TableIdentity, Row, Vec<Frame>) {
        match frame {
            Frame::Root { table, item, load_id } => {
                let place = RowPlace {
                    path: std::slice::from_ref(&table),
                    identity: &TableIdentity::root(table.clone()),
                    level: 0,
                    link: None,
                    context: &Row::new(),
                    load_id: Some(&load_id),
                };
                self.process_mapping(&place, item)
            }
            Frame::Element { scope, idx, value } => {
                let place = RowPlace {
                    path: &scope.path,
                    identity: &scope.identity,
                    level: scope.level,
                    link: Some((&scope.parent_id, idx)),
                    context: &scope.context,
                    load_id: None,
                };
                match value {
                    Value::Object(map) => self.process_mapping(&place, map),
                    Value::Array(items) => {
                        // a list in a list gets a wrapper row whose "list" field
                        // becomes the next child table
                        let place = RowPlace {
                            level: place.level + 1,
                            ..place
                        };
                        self.process_mapping(&place, wrap(LIST_COLUMN, Value::Array(items)))
                    }
                    scalar => {
                        let (identity, row) = self.process_scalar(&place, scalar);
                        (identity, row, Vec::new())
                    }
                }
            }
        }
    }

    fn process_mapping(&self, place: &RowPlace<'_>, item: Map<String, Value>) -> (TableIdentity, Row, Vec<Frame>) {
        let table = place.identity.table_name.as_str();
        let flattened = flatten(self.schema, table, item, place.level);
        let mut row = flattened.row;
        if let Some(load_id) = place.load_id {
            row.insert(LOAD_ID_COLUMN.to_string(), Value::String(load_id.to_string()));
        }

        // propagated values overwrite data columns of the same name
        for (column, value) in place.context {
            row.insert(column.clone(), value.clone());
        }

        let row_id = match row.get(ROW_ID_COLUMN).and_then(RowId::from_value) {
            Some(explicit) => explicit,
            None => self.generate_row_id(table, &row, place.link),
        };
        // explicit ids are written back as strings so they join with `_parent_id`
        row.insert(ROW_ID_COLUMN.to_string(), row_id.clone().into());
        if let Some((parent_id, idx)) = place.link {
            link_row(&mut row, parent_id, idx);
        }

        let mut context = place.context.clone();
        let is_root = place.link.is_none();
        context.extend(self.schema.propagation().propagated_values(table, is_root, &row));
        let context = Arc::new(context);

        let naming = self.schema.naming();
        let mut children = Vec::new();
        for (list_path, items) in flattened.lists {
            let mut path = place.path.to_vec();
            path.extend(list_path);
            let scope = Arc::new(ListScope {
                identity: TableIdentity::child(naming.shorten_fragments(&path), table),
                path,
                parent_id: row_id.clone(),
                context: Arc::clone(&context),
                level: place.level + 1,
            });
            children.extend(items.into_iter().enumerate().map(|(idx, value)| Frame::Element {
                scope: Arc::clone(&scope),
                idx,
                value,
            }));
        }

        (place.identity.clone(), row, children)
    }

    /// Scalar list elements become `{"value": elem}` rows without further flattening
    fn process_scalar(&self, place: &RowPlace<'_>, value: Value) -> (TableIdentity, Row) {
        let table = place.identity.table_name.as_str();
        let mut row = wrap(VALUE_COLUMN, value);
        let row_id = self.generate_row_id(table, &row, place.link);
        row.insert(ROW_ID_COLUMN.to_string(), row_id.into());
        if let Some((parent_id, idx)) = place.link {
            link_row(&mut row, parent_id, idx);
        }
        for (column, value) in place.context {
            row.insert(column.clone(), value.clone());
        }
        (place.identity.clone(), row)
    }

    /// Identifier for a row without an explicit one.
    ///
    /// Primary key values give a content hash stable across runs. Otherwise
    /// list elements hash their position under the parent, and top level rows
    /// get a random id.
    fn generate_row_id(&self, table: &str, row: &Row, link: Option<(&RowId, usize)>) -> RowId {
        let key = self.schema.primary_key_values(table, row);
        if !key.is_empty() {
            let content: Vec<String> = key.into_iter().map(key_fragment).collect();
            return hasher::digest(content.join("_"));
        }
        match link {
            Some((parent_id, idx)) => hasher::child_row_id(parent_id.as_str(), table, idx),
            None => hasher::random_id(),
        }
    }
}

/// Lazily produced rows of one document.
///
/// Iterating descends into every row. Use [`RowStream::advance`] to decide,
/// after each row, whether its child tables are produced.
#[derive(Debug)]
pub struct RowStream<'s> {
    normalizer: RelationalNormalizer<'s>,
    stack: Vec<Frame>,
    /// Child frames of the last yielded row, waiting for the caller's decision
    pending: Vec<Frame>,
}

impl<'s> RowStream<'s> {
    /// Applies `descend` to the last yielded row and produces the next row.
    ///
    /// The decision given with the first call has no row to apply to and is
    /// ignored unless it is [`Descend::Stop`].
    pub fn advance(&mut self, descend: Descend) -> Option<(TableIdentity, Row)> {
        let pending = std::mem::take(&mut self.pending);
        match descend {
            Descend::Yes => self.stack.extend(pending.into_iter().rev()),
            Descend::No => {
                if !pending.is_empty() {
                    debug!(skipped = pending.len(), "not descending into child rows");
                }
            }
            Descend::Stop => {
                debug!(remaining = self.stack.len() + pending.len(), "normalization stopped");
                self.stack.clear();
                return None;
            }
        }

        let frame = self.stack.pop()?;
        let (identity, row, children) = self.normalizer.process(frame);
        trace!(
            table = %identity.table_name,
            parent = identity.parent_table_name.as_deref().unwrap_or(""),
            columns = row.len(),
            children = children.len(),
            "normalized row"
        );
        self.pending = children;
        Some((identity, row))
    }

    /// Whether no more rows can be produced
    pub fn is_finished(&self) -> bool {
        self.stack.is_empty() && self.pending.is_empty()
    }
}

impl Iterator for RowStream<'_> {
    type Item = (TableIdentity, Row);

    fn next(&mut self) -> Option<Self::Item> {
        self.advance(Descend::Yes)
    }
}

/// Pending unit of work
#[derive(Debug)]
enum Frame {
    Root { table: String, item: Map<String, Value>, load_id: String },
    Element { scope: Arc<ListScope>, idx: usize, value: Value },
}

/// Shared by all elements of one list
#[derive(Debug)]
struct ListScope {
    /// Normalized table path, root table first
    path: Vec<String>,
    identity: TableIdentity,
    parent_id: RowId,
    /// Propagated columns inherited from ancestors
    context: Arc<Row>,
    level: usize,
}

/// Where a row lands in the document
struct RowPlace<'a> {
    path: &'a [String],
    identity: &'a TableIdentity,
    level: usize,
    link: Option<(&'a RowId, usize)>,
    context: &'a Row,
    /// Set for the root row only
    load_id: Option<&'a str>,
}

fn wrap(column: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(column.to_string(), value);
    map
}

fn link_row(row: &mut Row, parent_id: &RowId, idx: usize) {
    row.insert(PARENT_ID_COLUMN.to_string(), parent_id.clone().into());
    row.insert(LIST_IDX_COLUMN.to_string(), Value::from(idx));
}

fn key_fragment(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
