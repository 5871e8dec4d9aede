use crate::melt::types::{Row, TableIdentity};
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Metadata column naming the table of a row in single stream output
pub const TABLE_NAME_FIELD: &str = "_table_name";

/// Metadata column naming the parent table of a row in single stream output
pub const PARENT_TABLE_NAME_FIELD: &str = "_parent_table_name";

/// Writes rows to JSON Lines files, one `<table>.jsonl` per table in an output directory
pub struct TableWriter {
    output_dir: PathBuf,
    writers: IndexMap<String, BufWriter<File>>,
    row_counts: IndexMap<String, usize>,
}

impl TableWriter {
    /// Creates the output directory if needed
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("Failed to create output directory: {}", output_dir.display()))?;

        Ok(TableWriter {
            output_dir,
            writers: IndexMap::new(),
            row_counts: IndexMap::new(),
        })
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Appends one row to the file of its table
    pub fn write_row(&mut self, identity: &TableIdentity, row: &Row) -> Result<()> {
        let table = identity.table_name.as_str();
        if !self.writers.contains_key(table) {
            let path = self.output_dir.join(format!("{}.jsonl", table));
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .with_context(|| format!("Failed to open file: {}", path.display()))?;
            debug!(table, path = %path.display(), "opened table file");
            self.writers.insert(table.to_string(), BufWriter::new(file));
        }

        let writer = self
            .writers
            .get_mut(table)
            .with_context(|| format!("No writer for table: {}", table))?;
        serde_json::to_writer(&mut *writer, row).context("Failed to serialize row")?;
        writer.write_all(b"\n").context("Failed to write row")?;

        *self.row_counts.entry(table.to_string()).or_default() += 1;
        Ok(())
    }

    /// Writes rows to their respective files, returns how many were written
    pub fn write_rows<I>(&mut self, rows: I) -> Result<usize>
    where
        I: IntoIterator<Item = (TableIdentity, Row)>,
    {
        let mut written = 0;
        for (identity, row) in rows {
            self.write_row(&identity, &row)?;
            written += 1;
        }
        Ok(written)
    }

    /// Rows written so far, per table, in order of first appearance
    pub fn row_counts(&self) -> &IndexMap<String, usize> {
        &self.row_counts
    }

    /// Flush all writers
    pub fn flush(&mut self) -> Result<()> {
        for writer in self.writers.values_mut() {
            writer.flush().context("Failed to flush writer")?;
        }
        Ok(())
    }
}

/// A simpler writer that writes all rows to a single output, tagged with their tables
pub struct SingleWriter<W: Write> {
    writer: W,
}

impl<W: Write> SingleWriter<W> {
    pub fn new(writer: W) -> Self {
        SingleWriter { writer }
    }

    pub fn write_row(&mut self, identity: &TableIdentity, row: &Row) -> Result<()> {
        let mut data = row.clone();
        data.insert(TABLE_NAME_FIELD.to_string(), Value::String(identity.table_name.clone()));
        if let Some(parent) = &identity.parent_table_name {
            data.insert(PARENT_TABLE_NAME_FIELD.to_string(), Value::String(parent.clone()));
        }

        let json = serde_json::to_string(&data).context("Failed to serialize row")?;
        writeln!(self.writer, "{}", json).context("Failed to write row")?;
        Ok(())
    }

    pub fn write_rows<I>(&mut self, rows: I) -> Result<usize>
    where
        I: IntoIterator<Item = (TableIdentity, Row)>,
    {
        let mut written = 0;
        for (identity, row) in rows {
            self.write_row(&identity, &row)?;
            written += 1;
        }
        Ok(written)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("Failed to flush writer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use serde_json::json;

    #[test]
    fn test_single_writer() {
        let schema = Schema::new("default");
        let mut buffer = Vec::new();
        let mut writer = SingleWriter::new(&mut buffer);

        let rows = schema.normalize_data_item(json!({"name": "Alice", "tags": ["a"]}), "load_1", "users");
        assert_eq!(writer.write_rows(rows).unwrap(), 2);

        let output = String::from_utf8(buffer).unwrap();
        let lines: Vec<Value> = output.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(lines[0]["name"], json!("Alice"));
        assert_eq!(lines[0][TABLE_NAME_FIELD], json!("users"));
        assert!(lines[0].get(PARENT_TABLE_NAME_FIELD).is_none());
        assert_eq!(lines[1][TABLE_NAME_FIELD], json!("users__tags"));
        assert_eq!(lines[1][PARENT_TABLE_NAME_FIELD], json!("users"));
    }

    #[test]
    fn test_table_writer() {
        let dir = tempfile::tempdir().unwrap();
        let schema = Schema::new("default");
        let mut writer = TableWriter::new(dir.path().join("out")).unwrap();

        for name in ["Alice", "Bob"] {
            let rows = schema.normalize_data_item(json!({"name": name, "posts": [{"id": 1}, {"id": 2}]}), "load_1", "users");
            writer.write_rows(rows).unwrap();
        }
        writer.flush().unwrap();

        assert_eq!(writer.row_counts()["users"], 2);
        assert_eq!(writer.row_counts()["users__posts"], 4);

        let users = std::fs::read_to_string(writer.output_dir().join("users.jsonl")).unwrap();
        assert_eq!(users.lines().count(), 2);
        let first: Value = serde_json::from_str(users.lines().next().unwrap()).unwrap();
        assert_eq!(first["name"], json!("Alice"));
        assert!(first.get(TABLE_NAME_FIELD).is_none());

        let posts = std::fs::read_to_string(writer.output_dir().join("users__posts.jsonl")).unwrap();
        assert_eq!(posts.lines().count(), 4);
    }
}
