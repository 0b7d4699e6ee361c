use super::LogStore;
use super::column::render_template;
use super::entities::RawRecord;
use crate::filter::Filter;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

/// Lazy sequence of progress percentages (0-100) of a long-running operation.
/// The caller drives it; dropping it early abandons the operation.
pub type Progress<'a> = Box<dyn Iterator<Item = u8> + 'a>;

/// Records processed between two progress checkpoints unless configured otherwise
pub const DEFAULT_CHECKPOINT_INTERVAL: usize = 4096;

/// Cooperative cancellation flag shared between a host and a running scan
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Percentage of `done` out of `total`, 100 for an empty range
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        100
    } else {
        (done.min(total) * 100 / total) as u8
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Failed to read record file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid record on line {line} of '{path}': {source}")]
    Record {
        path: String,
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// An ingestion backend feeding records into a [`LogStore`].
///
/// `load_first` runs on the first [`LogStore::load`], `load_incremental` on
/// every later one. Both append records through the store and yield progress
/// at checkpoints, checking `cancel` at each one. A `filter`, when given,
/// lets the backend skip records that do not match.
pub trait RecordSource {
    fn name(&self) -> &str;

    fn load_first<'a>(
        &'a mut self,
        store: &'a mut LogStore,
        filter: Option<&'a Filter>,
        cancel: &'a CancelToken,
    ) -> Progress<'a>;

    fn load_incremental<'a>(
        &'a mut self,
        _store: &'a mut LogStore,
        _filter: Option<&'a Filter>,
        _cancel: &'a CancelToken,
    ) -> Progress<'a> {
        Box::new(std::iter::empty())
    }

    /// Look ahead at up to `count` upcoming records matching `filter` without
    /// loading them. Yields positions in the backend's pending queue.
    fn peek<'a>(
        &'a self,
        _store: &'a LogStore,
        _filter: Option<&'a Filter>,
        _count: usize,
        _cancel: &'a CancelToken,
    ) -> Box<dyn Iterator<Item = usize> + 'a> {
        Box::new(std::iter::empty())
    }
}

fn passes(filter: Option<&Filter>, raw: &RawRecord) -> bool {
    filter.is_none_or(|f| f.matches_text(&render_template(&raw.template, &raw.parameters)))
}

/// Records handed over in memory. Records pushed after the first load are
/// picked up by the next incremental load.
#[derive(Debug, Clone)]
pub struct MemorySource {
    name: String,
    pending: Vec<RawRecord>,
    loaded: usize,
    checkpoint_interval: usize,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, records: Vec<RawRecord>) -> Self {
        Self {
            name: name.into(),
            pending: records,
            loaded: 0,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
        }
    }

    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval.max(1);
        self
    }

    pub fn push(&mut self, record: RawRecord) {
        self.pending.push(record);
    }

    /// Number of records not loaded yet
    pub fn remaining(&self) -> usize {
        self.pending.len() - self.loaded
    }

    fn load_pending<'a>(
        &'a mut self,
        store: &'a mut LogStore,
        filter: Option<&'a Filter>,
        cancel: &'a CancelToken,
    ) -> Progress<'a> {
        let start = self.loaded;
        let total = self.pending.len() - start;
        let interval = self.checkpoint_interval;
        let mut done = 0;

        Box::new(std::iter::from_fn(move || {
            if done >= total || cancel.is_cancelled() {
                return None;
            }

            let end = (done + interval).min(total);
            for raw in &self.pending[start + done..start + end] {
                if passes(filter, raw) {
                    store.ingest(raw);
                }
            }
            done = end;
            self.loaded = start + done;
            Some(percent(done, total))
        }))
    }
}

impl RecordSource for MemorySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load_first<'a>(
        &'a mut self,
        store: &'a mut LogStore,
        filter: Option<&'a Filter>,
        cancel: &'a CancelToken,
    ) -> Progress<'a> {
        self.load_pending(store, filter, cancel)
    }

    fn load_incremental<'a>(
        &'a mut self,
        store: &'a mut LogStore,
        filter: Option<&'a Filter>,
        cancel: &'a CancelToken,
    ) -> Progress<'a> {
        self.load_pending(store, filter, cancel)
    }

    fn peek<'a>(
        &'a self,
        _store: &'a LogStore,
        filter: Option<&'a Filter>,
        count: usize,
        cancel: &'a CancelToken,
    ) -> Box<dyn Iterator<Item = usize> + 'a> {
        Box::new(
            self.pending[self.loaded..]
                .iter()
                .enumerate()
                .take_while(move |_| !cancel.is_cancelled())
                .filter(move |(_, raw)| passes(filter, raw))
                .map(|(position, _)| position)
                .take(count),
        )
    }
}

/// Reads [`RawRecord`]s from a JSON-lines file. Incremental loads pick up
/// lines appended since the previous load.
///
/// Parsed lines wait in a pending queue until a load ingests them, so a
/// cancelled or dropped load resumes with the first record it did not ingest.
/// Lines that fail to parse are skipped and kept in [`JsonLinesSource::take_errors`].
#[derive(Debug)]
pub struct JsonLinesSource {
    path: PathBuf,
    name: String,
    /// Bytes of the file already parsed into `pending`
    offset: usize,
    line: usize,
    pending: Vec<RawRecord>,
    loaded: usize,
    checkpoint_interval: usize,
    errors: Vec<SourceError>,
}

impl JsonLinesSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SourceError> {
        let path = path.as_ref().to_path_buf();
        fs::metadata(&path).map_err(|source| SourceError::Read {
            path: path.display().to_string(),
            source,
        })?;

        Ok(Self {
            name: path.display().to_string(),
            path,
            offset: 0,
            line: 0,
            pending: Vec::new(),
            loaded: 0,
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            errors: Vec::new(),
        })
    }

    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval.max(1);
        self
    }

    pub fn take_errors(&mut self) -> Vec<SourceError> {
        std::mem::take(&mut self.errors)
    }

    /// Parsed records not ingested yet
    pub fn remaining(&self) -> usize {
        self.pending.len() - self.loaded
    }

    /// Parse complete lines appended since the last read into the pending queue
    fn read_new_records(&mut self) {
        if self.loaded == self.pending.len() {
            self.pending.clear();
            self.loaded = 0;
        }

        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(source) => {
                self.errors.push(SourceError::Read {
                    path: self.name.clone(),
                    source,
                });
                return;
            }
        };

        let Some(fresh) = content.get(self.offset..) else {
            // Truncated or replaced file, start over
            self.offset = 0;
            self.line = 0;
            self.read_new_records_from(&content);
            return;
        };
        self.read_new_records_from(fresh);
    }

    fn read_new_records_from(&mut self, fresh: &[u8]) {
        let mut consumed = 0;

        for chunk in fresh.split_inclusive(|b| *b == b'\n') {
            let complete = chunk.ends_with(b"\n");
            let text = String::from_utf8_lossy(chunk);
            let text = text.trim();

            if text.is_empty() {
                if complete {
                    consumed += chunk.len();
                    self.line += 1;
                }
                continue;
            }

            match serde_json::from_str::<RawRecord>(text) {
                Ok(record) => self.pending.push(record),
                // A partial trailing line may still be being written
                Err(_) if !complete => break,
                Err(source) => self.errors.push(SourceError::Record {
                    path: self.name.clone(),
                    line: self.line + 1,
                    source,
                }),
            }
            consumed += chunk.len();
            self.line += 1;
        }

        self.offset += consumed;
    }

    fn load_new<'a>(
        &'a mut self,
        store: &'a mut LogStore,
        filter: Option<&'a Filter>,
        cancel: &'a CancelToken,
    ) -> Progress<'a> {
        self.read_new_records();
        let start = self.loaded;
        let total = self.pending.len() - start;
        let interval = self.checkpoint_interval;
        let mut done = 0;

        Box::new(std::iter::from_fn(move || {
            if done >= total || cancel.is_cancelled() {
                return None;
            }

            let end = (done + interval).min(total);
            for raw in &self.pending[start + done..start + end] {
                if passes(filter, raw) {
                    store.ingest(raw);
                }
            }
            done = end;
            self.loaded = start + done;
            Some(percent(done, total))
        }))
    }
}

impl RecordSource for JsonLinesSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn load_first<'a>(
        &'a mut self,
        store: &'a mut LogStore,
        filter: Option<&'a Filter>,
        cancel: &'a CancelToken,
    ) -> Progress<'a> {
        self.load_new(store, filter, cancel)
    }

    fn load_incremental<'a>(
        &'a mut self,
        store: &'a mut LogStore,
        filter: Option<&'a Filter>,
        cancel: &'a CancelToken,
    ) -> Progress<'a> {
        self.load_new(store, filter, cancel)
    }

    /// Only lines already parsed by an earlier load are visible here
    fn peek<'a>(
        &'a self,
        _store: &'a LogStore,
        filter: Option<&'a Filter>,
        count: usize,
        cancel: &'a CancelToken,
    ) -> Box<dyn Iterator<Item = usize> + 'a> {
        Box::new(
            self.pending[self.loaded..]
                .iter()
                .enumerate()
                .take_while(move |_| !cancel.is_cancelled())
                .filter(move |(_, raw)| passes(filter, raw))
                .map(|(position, _)| position)
                .take(count),
        )
    }
}
