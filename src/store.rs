//! Append-only in-memory log record store
//!
//! Templates and file names live in [`IdentifierCache`]s so records only
//! carry integer ids, and parameter strings are shared through an
//! [`InternPool`]. Column access goes through a fixed schema table.

use crate::filter::Filter;
use thiserror::Error;

mod column;
mod entities;
mod identifier;
mod intern;
mod source;

pub use column::{
    Column, ColumnKind, ColumnValue, DEFAULT_COLUMNS, FieldAccessor, ParametricString, Span,
    render_template,
};
pub use entities::{LogLevel, LogRecord, RawRecord, RecordMeta};
pub use identifier::IdentifierCache;
pub use intern::InternPool;
pub use source::{
    CancelToken, DEFAULT_CHECKPOINT_INTERVAL, JsonLinesSource, MemorySource, Progress,
    RecordSource, SourceError, percent,
};

/// Format of the `Time` column
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Unknown template id {template_id} (store has {count} templates)")]
    UnknownTemplate { template_id: usize, count: usize },

    #[error("Unknown file index {file_index} (store has {count} files)")]
    UnknownFile { file_index: usize, count: usize },

    #[error("Unknown column {column} (schema has {count} columns)")]
    UnknownColumn { column: usize, count: usize },

    #[error("Unknown record id {id} (store has {count} records)")]
    UnknownRecord { id: usize, count: usize },
}

/// The canonical sequence of records of one log source
#[derive(Debug)]
pub struct LogStore {
    records: Vec<LogRecord>,
    templates: IdentifierCache<String>,
    files: IdentifierCache<String>,
    pool: InternPool,
    columns: Vec<Column>,
    first_batch_loaded: bool,
}

impl Default for LogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl LogStore {
    pub fn new() -> Self {
        Self::with_columns(DEFAULT_COLUMNS.to_vec())
    }

    pub fn with_columns(columns: Vec<Column>) -> Self {
        Self {
            records: Vec::new(),
            templates: IdentifierCache::new(),
            files: IdentifierCache::new(),
            pool: InternPool::new(),
            columns,
            first_batch_loaded: false,
        }
    }

    pub fn add_template(&mut self, text: &str) -> usize {
        self.templates.put(text.to_string())
    }

    pub fn add_file(&mut self, name: &str) -> usize {
        self.files.put(name.to_string())
    }

    /// Append a record; returns its id
    pub fn append<I, S>(
        &mut self,
        template_id: usize,
        parameters: I,
        meta: RecordMeta,
    ) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if template_id >= self.templates.len() {
            return Err(StoreError::UnknownTemplate {
                template_id,
                count: self.templates.len(),
            });
        }
        if meta.file_index >= self.files.len() {
            return Err(StoreError::UnknownFile {
                file_index: meta.file_index,
                count: self.files.len(),
            });
        }

        Ok(self.push_record(template_id, parameters, meta))
    }

    /// Append one record from an ingestion tuple, registering its template
    /// and file name on the way
    pub fn ingest(&mut self, raw: &RawRecord) -> usize {
        let template_id = self.add_template(&raw.template);
        let file_index = self.add_file(&raw.file);
        let meta = RecordMeta {
            time: raw.time,
            thread_id: raw.thread_id,
            process_id: raw.process_id,
            level: raw.level,
            file_index,
        };

        self.push_record(template_id, &raw.parameters, meta)
    }

    fn push_record<I, S>(&mut self, template_id: usize, parameters: I, meta: RecordMeta) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let parameters = parameters
            .into_iter()
            .map(|p| self.pool.intern(p.as_ref()))
            .collect();
        let id = self.records.len();
        self.records.push(LogRecord {
            id,
            template_id,
            parameters,
            time: meta.time,
            thread_id: meta.thread_id,
            process_id: meta.process_id,
            level: meta.level,
            file_index: meta.file_index,
        });
        id
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: usize) -> Option<&LogRecord> {
        self.records.get(id)
    }

    pub fn record(&self, id: usize) -> Result<&LogRecord, StoreError> {
        self.records.get(id).ok_or(StoreError::UnknownRecord {
            id,
            count: self.records.len(),
        })
    }

    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    pub fn templates(&self) -> &[String] {
        self.templates.as_slice()
    }

    pub fn template(&self, id: usize) -> Option<&str> {
        self.templates.get(id).map(String::as_str)
    }

    pub fn files(&self) -> &[String] {
        self.files.as_slice()
    }

    pub fn file_name(&self, index: usize) -> Option<&str> {
        self.files.get(index).map(String::as_str)
    }

    /// Number of distinct parameter strings held by the intern pool
    pub fn interned_count(&self) -> usize {
        self.pool.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// The record's display text: its template with parameters substituted
    pub fn render_text(&self, record: &LogRecord) -> String {
        render_template(
            self.template(record.template_id).unwrap_or_default(),
            &record.parameters,
        )
    }

    pub fn parametric_text(&self, record: &LogRecord) -> Result<ParametricString, StoreError> {
        let template = self
            .template(record.template_id)
            .ok_or(StoreError::UnknownTemplate {
                template_id: record.template_id,
                count: self.templates.len(),
            })?;
        Ok(ParametricString::new(template, &record.parameters))
    }

    pub fn column_value(&self, record: &LogRecord, column: usize) -> Result<ColumnValue, StoreError> {
        let kind = self
            .columns
            .get(column)
            .ok_or(StoreError::UnknownColumn {
                column,
                count: self.columns.len(),
            })?
            .kind;

        match kind {
            ColumnKind::Text => self.parametric_text(record).map(ColumnValue::Text),
            ColumnKind::Time => Ok(ColumnValue::Str(record.time.format(TIME_FORMAT).to_string())),
            ColumnKind::File => self
                .file_name(record.file_index)
                .map(|name| ColumnValue::Str(name.to_string()))
                .ok_or(StoreError::UnknownFile {
                    file_index: record.file_index,
                    count: self.files.len(),
                }),
            ColumnKind::Tags => Ok(ColumnValue::Tags(Vec::new())),
            ColumnKind::Field(accessor) => Ok(accessor(record)),
        }
    }

    /// Tab-separated rendering of `records`, one line per record, optionally
    /// preceded by a title line of column names
    pub fn export_text<'r>(
        &self,
        records: impl IntoIterator<Item = &'r LogRecord>,
        with_title: bool,
    ) -> Result<String, StoreError> {
        let mut out = String::new();
        if with_title {
            let names: Vec<&str> = self.columns.iter().map(|c| c.name).collect();
            out.push_str(&names.join("\t"));
            out.push('\n');
        }

        for record in records {
            let mut cells = Vec::with_capacity(self.columns.len());
            for column in 0..self.columns.len() {
                cells.push(self.column_value(record, column)?.to_string());
            }
            out.push_str(&cells.join("\t"));
            out.push('\n');
        }

        Ok(out)
    }

    /// Pull records from `source`: the first call performs the initial load,
    /// later calls the incremental one.
    pub fn load<'a>(
        &'a mut self,
        source: &'a mut dyn RecordSource,
        filter: Option<&'a Filter>,
        cancel: &'a CancelToken,
    ) -> Progress<'a> {
        if self.first_batch_loaded {
            source.load_incremental(self, filter, cancel)
        } else {
            self.first_batch_loaded = true;
            source.load_first(self, filter, cancel)
        }
    }

    /// Preview upcoming records of `source` without loading them
    pub fn peek<'a>(
        &'a self,
        source: &'a dyn RecordSource,
        filter: Option<&'a Filter>,
        count: usize,
        cancel: &'a CancelToken,
    ) -> Box<dyn Iterator<Item = usize> + 'a> {
        source.peek(self, filter, count, cancel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::sync::Arc;

    fn meta(file_index: usize) -> RecordMeta {
        RecordMeta {
            time: Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap(),
            thread_id: 11,
            process_id: 22,
            level: LogLevel::Warning,
            file_index,
        }
    }

    fn store_with_one_record() -> LogStore {
        let mut store = LogStore::new();
        let template = store.add_template("disk {0} at {1}%");
        let file = store.add_file("disk.rs");
        store.append(template, ["sda", "91"], meta(file)).unwrap();
        store
    }

    #[test]
    fn test_append_assigns_dense_ids() {
        let mut store = LogStore::new();
        let t = store.add_template("x {0}");
        let f = store.add_file("a.rs");
        for i in 0..5 {
            assert_eq!(store.append(t, [i.to_string()], meta(f)).unwrap(), i);
        }
        assert_eq!(store.len(), 5);
        assert!(store.records().iter().enumerate().all(|(i, r)| r.id == i));
    }

    #[test]
    fn test_append_rejects_unknown_ids() {
        let mut store = LogStore::new();
        assert_eq!(
            store.append(0, ["x"], meta(0)),
            Err(StoreError::UnknownTemplate {
                template_id: 0,
                count: 0
            })
        );
        let t = store.add_template("x");
        assert_eq!(
            store.append(t, ["x"], meta(3)),
            Err(StoreError::UnknownFile {
                file_index: 3,
                count: 0
            })
        );
    }

    #[test]
    fn test_duplicate_template_reuses_id() {
        let mut store = LogStore::new();
        assert_eq!(store.add_template("a {0}"), 0);
        assert_eq!(store.add_template("b {0}"), 1);
        assert_eq!(store.add_template("a {0}"), 0);
        assert_eq!(store.templates().len(), 2);
    }

    #[test]
    fn test_parameters_are_interned() {
        let mut store = LogStore::new();
        let t = store.add_template("{0} {1}");
        let f = store.add_file("");
        let a = store.append(t, ["same", "one"], meta(f)).unwrap();
        let b = store.append(t, ["same", "two"], meta(f)).unwrap();

        let first = &store.get(a).unwrap().parameters[0];
        let second = &store.get(b).unwrap().parameters[0];
        assert!(Arc::ptr_eq(first, second));
        assert_eq!(store.interned_count(), 3);
    }

    #[test]
    fn test_column_values() {
        let store = store_with_one_record();
        let record = store.get(0).unwrap();

        let value = |name: &str| {
            store
                .column_value(record, store.column_index(name).unwrap())
                .unwrap()
        };
        assert_eq!(value("Time"), ColumnValue::Str("2026-03-04T05:06:07".to_string()));
        assert_eq!(value("File"), ColumnValue::Str("disk.rs".to_string()));
        assert_eq!(value("Level"), ColumnValue::Level(LogLevel::Warning));
        assert_eq!(value("Thread"), ColumnValue::Number(11));
        assert_eq!(value("Process"), ColumnValue::Number(22));
        assert_eq!(value("Tags"), ColumnValue::Tags(vec![]));
        assert_eq!(value("Text").to_string(), "disk sda at 91%");

        assert_eq!(
            store.column_value(record, 99),
            Err(StoreError::UnknownColumn {
                column: 99,
                count: DEFAULT_COLUMNS.len()
            })
        );
    }

    #[test]
    fn test_export_text_with_title() {
        let store = store_with_one_record();
        let text = store.export_text(store.records(), true).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Id\tTime\tProcess\tThread\tLevel\tText\tTags\tFile");
        assert_eq!(
            lines[1],
            "0\t2026-03-04T05:06:07\t22\t11\tWarning\tdisk sda at 91%\t\tdisk.rs"
        );
    }

    #[test]
    fn test_second_load_is_incremental() {
        let raw = RawRecord {
            template: "tick {0}".to_string(),
            parameters: vec!["1".to_string()],
            time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            thread_id: 0,
            process_id: 0,
            level: LogLevel::Info,
            file: String::new(),
        };
        let mut source = MemorySource::new("mem", vec![raw.clone()]);
        let mut store = LogStore::new();
        let cancel = CancelToken::new();

        assert_eq!(store.load(&mut source, None, &cancel).count(), 1);
        assert_eq!(store.load(&mut source, None, &cancel).count(), 0);

        source.push(raw);
        assert_eq!(store.load(&mut source, None, &cancel).last(), Some(100));
        assert_eq!(store.len(), 2);
        assert_eq!(store.templates().len(), 1);
    }

    #[test]
    fn test_load_filter_skips_records() {
        let records = ["keep {0}", "drop {0}", "keep {0}"]
            .iter()
            .map(|t| RawRecord {
                template: t.to_string(),
                parameters: vec!["x".to_string()],
                time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
                thread_id: 0,
                process_id: 0,
                level: LogLevel::Info,
                file: String::new(),
            })
            .collect();
        let mut source = MemorySource::new("mem", records);
        let mut store = LogStore::new();
        let filter = Filter::new("keep").unwrap();
        let cancel = CancelToken::new();

        store.load(&mut source, Some(&filter), &cancel).for_each(drop);
        assert_eq!(store.len(), 2);
        assert_eq!(store.records()[1].id, 1);
    }
}
