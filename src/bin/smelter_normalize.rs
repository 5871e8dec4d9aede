//! smelter-normalize: Decompose nested JSON into relational tables
//!
//! Usage:
//!   # Read from file, output to stdout
//!   smelter-normalize data.json --table events
//!
//!   # Read from stdin, output to stdout
//!   echo '{"id": 1, "posts": [{"id": 10}]}' | smelter-normalize --table users
//!
//!   # Process NDJSON, write one file per table
//!   smelter-normalize --ndjson events.jsonl --table events --output-dir ./tables
//!
//!   # Use a schema config with primary keys, complex columns and propagation
//!   smelter-normalize --schema schema.json --ndjson events.jsonl -o ./tables

// Use MiMalloc allocator for better performance (recommended by simd-json)
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::Value;
use smelter::melt::{SingleWriter, TableWriter};
use smelter::schema::{Schema, SchemaConfig};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "smelter-normalize")]
#[command(about = "Decompose nested JSON into relational tables", long_about = None)]
struct Args {
    /// Input file (use stdin if omitted)
    #[arg(value_name = "FILE")]
    input: Option<String>,

    /// Process newline-delimited JSON (one JSON document per line)
    #[arg(long)]
    ndjson: bool,

    /// Treat a top-level array as a single document instead of a document stream
    #[arg(long)]
    no_ignore_array: bool,

    /// Output directory for separate .jsonl files per table
    /// If omitted, writes to stdout as a single stream with table metadata
    #[arg(long, short = 'o')]
    output_dir: Option<String>,

    /// Root table name (default: the schema name)
    #[arg(long, short = 't')]
    table: Option<String>,

    /// Load id stamped on root rows (default: current unix time)
    #[arg(long)]
    load_id: Option<String>,

    /// Schema config file (JSON)
    #[arg(long)]
    schema: Option<String>,

    /// Nesting level at which nested values are kept as-is
    #[arg(long)]
    max_nesting: Option<usize>,

    /// Maximum length of table and column names
    #[arg(long)]
    max_length: Option<usize>,

    /// Copy the root row id to every descendant row as _root_id
    #[arg(long)]
    propagate_root_id: bool,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args.log_level)?;

    let schema = build_schema(&args)?;
    let table = args.table.clone().unwrap_or_else(|| schema.name().to_string());
    let load_id = args.load_id.clone().unwrap_or_else(default_load_id);

    let reader = if let Some(file_path) = &args.input {
        Box::new(BufReader::new(
            File::open(file_path).with_context(|| format!("Failed to open input: {}", file_path))?,
        )) as Box<dyn Read>
    } else {
        Box::new(std::io::stdin()) as Box<dyn Read>
    };

    let mut sink = match &args.output_dir {
        Some(output_dir) => Sink::Tables(TableWriter::new(output_dir)?),
        None => Sink::Single(SingleWriter::new(std::io::stdout().lock())),
    };

    let mut documents = 0;
    let mut rows = 0;
    for_each_document(reader, args.ndjson, !args.no_ignore_array, |value| {
        documents += 1;
        rows += sink.write(schema.normalize_data_item(value, &load_id, &table))?;
        Ok(())
    })?;
    sink.flush()?;

    info!(documents, rows, table = %table, load_id = %load_id, "normalization finished");
    if let Sink::Tables(writer) = &sink {
        for (table, count) in writer.row_counts() {
            info!(table = %table, rows = count, "table written");
        }
    }
    Ok(())
}

fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("Invalid log level: {}", level))?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Schema from the config file, or an empty one, with command line overrides applied
fn build_schema(args: &Args) -> Result<Schema> {
    let mut config = match &args.schema {
        Some(path) => SchemaConfig::from_path(path)
            .with_context(|| format!("Failed to load schema config: {}", path))?,
        None => SchemaConfig::new(args.table.as_deref().unwrap_or("default")),
    };

    if args.max_length.is_some() {
        config.naming.max_length = args.max_length;
    }
    if args.max_nesting.is_some() {
        config.normalizer.max_nesting = args.max_nesting;
    }
    if args.propagate_root_id {
        config.normalizer.propagate_root_id = true;
    }

    Schema::from_config(config).context("Invalid schema")
}

fn default_load_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

enum Sink<'a> {
    Tables(TableWriter),
    Single(SingleWriter<std::io::StdoutLock<'a>>),
}

impl Sink<'_> {
    fn write(&mut self, rows: smelter::RowStream<'_>) -> Result<usize> {
        match self {
            Sink::Tables(writer) => writer.write_rows(rows),
            Sink::Single(writer) => writer.write_rows(rows),
        }
    }

    fn flush(&mut self) -> Result<()> {
        match self {
            Sink::Tables(writer) => writer.flush(),
            Sink::Single(writer) => writer.flush(),
        }
    }
}

/// Feeds every document of the input to `handle`.
///
/// NDJSON is streamed line by line. Otherwise the input is parsed whole with
/// SIMD-accelerated parsing, falling back to serde_json.
fn for_each_document<F>(reader: Box<dyn Read>, ndjson: bool, split_array: bool, mut handle: F) -> Result<()>
where
    F: FnMut(Value) -> Result<()>,
{
    if ndjson {
        for (line_no, line) in BufReader::new(reader).lines().enumerate() {
            let line = line.context("Failed to read line")?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let value = serde_json::from_str(line)
                .with_context(|| format!("Failed to parse JSON on line {}", line_no + 1))?;
            handle(value)?;
        }
        return Ok(());
    }

    // Read entire input for SIMD parsing
    let mut content = Vec::new();
    BufReader::new(reader)
        .read_to_end(&mut content)
        .context("Failed to read input")?;

    let value: Value = match simd_json::serde::from_slice(&mut content.clone()) {
        Ok(value) => value,
        Err(_) => serde_json::from_slice(&content).context("Failed to parse JSON")?,
    };

    match value {
        Value::Array(items) if split_array => {
            for item in items {
                handle(item)?;
            }
        }
        other => handle(other)?,
    }
    Ok(())
}
