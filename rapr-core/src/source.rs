//! Reading the upstream columnar dataset.
//!
//! Source tables are Parquet files under a dataset root directory. Upstream
//! schemas drift between dataset versions, so column lookup goes through an
//! ordered candidate list resolved once per table load; per-cell extraction
//! is permissive (a malformed value becomes `None`, never an error).

use anyhow::{anyhow, bail, Context, Result};
use arrow_array::{
    Array, Int16Array, Int32Array, Int64Array, LargeStringArray, RecordBatch, StringArray,
    TimestampMicrosecondArray, TimestampMillisecondArray, TimestampNanosecondArray,
    TimestampSecondArray, UInt32Array, UInt64Array,
};
use arrow_schema::{DataType, SchemaRef, TimeUnit};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::File;
use std::path::Path;
use tracing::info;

use crate::config::PipelineConfig;

/// An immutable source table loaded from Parquet.
pub struct SourceTable {
    name: String,
    schema: SchemaRef,
    batches: Vec<RecordBatch>,
}

/// Read one named table from the dataset root.
///
/// Fails if the file is missing or is not readable Parquet.
pub fn read_table(root: &Path, table_file: &str) -> Result<SourceTable> {
    let path = root.join(table_file);
    let file = File::open(&path)
        .with_context(|| format!("Failed to open source table {}", path.display()))?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file)
        .with_context(|| format!("Failed to read Parquet metadata from {}", path.display()))?;
    let schema = builder.schema().clone();
    let reader = builder
        .build()
        .with_context(|| format!("Failed to open Parquet reader for {}", path.display()))?;
    let batches = reader
        .collect::<std::result::Result<Vec<_>, _>>()
        .with_context(|| format!("Failed to decode record batches from {}", path.display()))?;
    Ok(SourceTable::new(table_file, schema, batches))
}

/// Preflight: open every configured source table and report its shape.
pub fn sanity_check(config: &PipelineConfig) -> Result<()> {
    for table_file in [
        &config.tables.pull_request,
        &config.tables.repository,
        &config.tables.review_comments,
    ] {
        let table = read_table(&config.dataset_root, table_file)?;
        info!(
            "Table {}: {} rows, columns: [{}]",
            table.name(),
            table.num_rows(),
            table.column_names().join(", ")
        );
    }
    Ok(())
}

impl SourceTable {
    pub fn new(name: &str, schema: SchemaRef, batches: Vec<RecordBatch>) -> Self {
        SourceTable {
            name: name.to_string(),
            schema,
            batches,
        }
    }

    /// Build a table directly from record batches (all sharing one schema).
    pub fn from_batches(name: &str, batches: Vec<RecordBatch>) -> Result<Self> {
        let schema = batches
            .first()
            .map(|b| b.schema())
            .ok_or_else(|| anyhow!("Table {} has no record batches", name))?;
        Ok(SourceTable::new(name, schema, batches))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_rows(&self) -> usize {
        self.batches.iter().map(|b| b.num_rows()).sum()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.schema
            .fields()
            .iter()
            .map(|f| f.name().as_str())
            .collect()
    }

    /// Return the index of the first candidate column present in the schema.
    pub fn try_resolve_column(&self, candidates: &[&str]) -> Option<usize> {
        candidates
            .iter()
            .find_map(|name| self.schema.index_of(name).ok())
    }

    /// Like [`try_resolve_column`], but missing columns are a fatal error
    /// naming the candidates tried and the columns actually available.
    ///
    /// [`try_resolve_column`]: SourceTable::try_resolve_column
    pub fn resolve_column(&self, candidates: &[&str]) -> Result<usize> {
        self.try_resolve_column(candidates).ok_or_else(|| {
            anyhow!(
                "Table {} has none of the candidate columns [{}]; available columns: [{}]",
                self.name,
                candidates.join(", "),
                self.column_names().join(", ")
            )
        })
    }

    /// Extract a column as strings. Null cells become `None`.
    pub fn string_column(&self, index: usize) -> Result<Vec<Option<String>>> {
        let mut values = Vec::with_capacity(self.num_rows());
        for batch in &self.batches {
            let array = batch.column(index);
            match array.data_type() {
                DataType::Utf8 => {
                    let array = downcast::<StringArray>(array, &self.name, index)?;
                    for i in 0..array.len() {
                        values.push(opt_if(!array.is_null(i), || array.value(i).to_string()));
                    }
                }
                DataType::LargeUtf8 => {
                    let array = downcast::<LargeStringArray>(array, &self.name, index)?;
                    for i in 0..array.len() {
                        values.push(opt_if(!array.is_null(i), || array.value(i).to_string()));
                    }
                }
                other => bail!(
                    "Table {} column {} has type {:?}, expected a string type",
                    self.name,
                    self.schema.field(index).name(),
                    other
                ),
            }
        }
        Ok(values)
    }

    /// Extract a column as 64-bit integers, widening from narrower integer
    /// types and parsing string cells permissively.
    pub fn int_column(&self, index: usize) -> Result<Vec<Option<i64>>> {
        let mut values = Vec::with_capacity(self.num_rows());
        for batch in &self.batches {
            let array = batch.column(index);
            match array.data_type() {
                DataType::Int64 => {
                    let array = downcast::<Int64Array>(array, &self.name, index)?;
                    for i in 0..array.len() {
                        values.push(opt_if(!array.is_null(i), || array.value(i)));
                    }
                }
                DataType::Int32 => {
                    let array = downcast::<Int32Array>(array, &self.name, index)?;
                    for i in 0..array.len() {
                        values.push(opt_if(!array.is_null(i), || i64::from(array.value(i))));
                    }
                }
                DataType::Int16 => {
                    let array = downcast::<Int16Array>(array, &self.name, index)?;
                    for i in 0..array.len() {
                        values.push(opt_if(!array.is_null(i), || i64::from(array.value(i))));
                    }
                }
                DataType::UInt32 => {
                    let array = downcast::<UInt32Array>(array, &self.name, index)?;
                    for i in 0..array.len() {
                        values.push(opt_if(!array.is_null(i), || i64::from(array.value(i))));
                    }
                }
                DataType::UInt64 => {
                    let array = downcast::<UInt64Array>(array, &self.name, index)?;
                    for i in 0..array.len() {
                        if array.is_null(i) {
                            values.push(None);
                        } else {
                            values.push(i64::try_from(array.value(i)).ok());
                        }
                    }
                }
                DataType::Utf8 => {
                    let array = downcast::<StringArray>(array, &self.name, index)?;
                    for i in 0..array.len() {
                        if array.is_null(i) {
                            values.push(None);
                        } else {
                            values.push(array.value(i).trim().parse::<i64>().ok());
                        }
                    }
                }
                other => bail!(
                    "Table {} column {} has type {:?}, expected an integer type",
                    self.name,
                    self.schema.field(index).name(),
                    other
                ),
            }
        }
        Ok(values)
    }

    /// Extract a column as UTC timestamps. Supports Arrow timestamps of any
    /// unit and string columns parsed permissively; unparseable cells become
    /// `None`.
    pub fn timestamp_column(&self, index: usize) -> Result<Vec<Option<DateTime<Utc>>>> {
        let mut values = Vec::with_capacity(self.num_rows());
        for batch in &self.batches {
            let array = batch.column(index);
            match array.data_type() {
                DataType::Timestamp(TimeUnit::Second, _) => {
                    let array = downcast::<TimestampSecondArray>(array, &self.name, index)?;
                    for i in 0..array.len() {
                        if array.is_null(i) {
                            values.push(None);
                        } else {
                            values.push(DateTime::from_timestamp(array.value(i), 0));
                        }
                    }
                }
                DataType::Timestamp(TimeUnit::Millisecond, _) => {
                    let array = downcast::<TimestampMillisecondArray>(array, &self.name, index)?;
                    for i in 0..array.len() {
                        if array.is_null(i) {
                            values.push(None);
                        } else {
                            values.push(DateTime::from_timestamp_millis(array.value(i)));
                        }
                    }
                }
                DataType::Timestamp(TimeUnit::Microsecond, _) => {
                    let array = downcast::<TimestampMicrosecondArray>(array, &self.name, index)?;
                    for i in 0..array.len() {
                        if array.is_null(i) {
                            values.push(None);
                        } else {
                            values.push(DateTime::from_timestamp_micros(array.value(i)));
                        }
                    }
                }
                DataType::Timestamp(TimeUnit::Nanosecond, _) => {
                    let array = downcast::<TimestampNanosecondArray>(array, &self.name, index)?;
                    for i in 0..array.len() {
                        if array.is_null(i) {
                            values.push(None);
                        } else {
                            values.push(Some(DateTime::from_timestamp_nanos(array.value(i))));
                        }
                    }
                }
                DataType::Utf8 => {
                    let array = downcast::<StringArray>(array, &self.name, index)?;
                    for i in 0..array.len() {
                        if array.is_null(i) {
                            values.push(None);
                        } else {
                            values.push(parse_timestamp(array.value(i)));
                        }
                    }
                }
                other => bail!(
                    "Table {} column {} has type {:?}, expected a timestamp or string type",
                    self.name,
                    self.schema.field(index).name(),
                    other
                ),
            }
        }
        Ok(values)
    }
}

fn downcast<'a, T: 'static>(
    array: &'a dyn Array,
    table: &str,
    index: usize,
) -> Result<&'a T> {
    array
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| anyhow!("Table {} column {} failed to downcast", table, index))
}

fn opt_if<T>(condition: bool, value: impl FnOnce() -> T) -> Option<T> {
    if condition {
        Some(value())
    } else {
        None
    }
}

/// Parse a timestamp string permissively; unparseable input is `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(text) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
    }
    None
}
