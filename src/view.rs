//! Filtered views over a [`LogStore`]
//!
//! A view holds the ids of the records its filter accepted, in store order.
//! It is built incrementally by draining the [`Scan`] returned from
//! [`FilteredView::initialize`], and can be resumed after a cancelled scan
//! or after the store has grown. A child view scans the rows its parent has
//! already matched, never the whole store.

use crate::filter::Filter;
use crate::store::{ColumnKind, ColumnValue, DEFAULT_CHECKPOINT_INTERVAL, LogRecord, LogStore, StoreError};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, OnceLock};
use thiserror::Error;

mod document;
mod scan;

pub use document::LogDocument;
pub use scan::{Count, Find, Scan};

/// Index of a view inside a [`LogDocument`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ViewId(pub usize);

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ViewError {
    #[error("Unknown view {0}")]
    UnknownView(ViewId),

    #[error("Row {row} is out of range (view has {total} rows)")]
    RowOutOfRange { row: usize, total: usize },

    #[error("Tag slot {slot} is out of range (0..{slots})")]
    TagSlotOutOfRange { slot: usize, slots: usize },

    #[error("The root view cannot be closed")]
    CloseRoot,

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewState {
    Created,
    Initializing,
    Initialized,
}

/// Sent to subscribers once per record newly appended to a view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemAdded {
    pub view: ViewId,
    pub row: usize,
}

/// Tuning shared by the views of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    /// Candidates examined between two progress checkpoints
    pub checkpoint_interval: usize,
    /// Number of tag slots; valid slots are `0..tag_slots`
    pub tag_slots: usize,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self {
            checkpoint_interval: DEFAULT_CHECKPOINT_INTERVAL,
            tag_slots: 8,
        }
    }
}

/// Single-use output cell of a long-running operation. Written at most once
/// by the operation and read by the caller once the progress sequence is
/// exhausted; an empty slot means "not found" or "cancelled".
#[derive(Debug, Clone)]
pub struct ResultSlot<T>(Arc<OnceLock<T>>);

impl<T> Default for ResultSlot<T> {
    fn default() -> Self {
        Self(Arc::new(OnceLock::new()))
    }
}

impl<T: Copy> ResultSlot<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the slot already held a value
    pub fn set(&self, value: T) -> bool {
        self.0.set(value).is_ok()
    }

    pub fn get(&self) -> Option<T> {
        self.0.get().copied()
    }

    pub fn is_set(&self) -> bool {
        self.0.get().is_some()
    }
}

/// The candidate rows a view scans: the whole store, or a parent's matches
#[derive(Debug, Clone, Copy)]
pub struct SourceRows<'a> {
    store: &'a LogStore,
    rows: Option<&'a [usize]>,
}

impl<'a> SourceRows<'a> {
    pub fn store(store: &'a LogStore) -> Self {
        Self { store, rows: None }
    }

    pub fn view(store: &'a LogStore, parent: &'a FilteredView) -> Self {
        Self {
            store,
            rows: Some(&parent.matched),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.map_or(self.store.len(), <[usize]>::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record id of the `index`-th candidate
    pub fn record_id(&self, index: usize) -> usize {
        self.rows.map_or(index, |rows| rows[index])
    }

    pub fn record(&self, index: usize) -> &'a LogRecord {
        &self.store.records()[self.record_id(index)]
    }

    pub fn log_store(&self) -> &'a LogStore {
        self.store
    }
}

/// A filtered, tagged view over a store or a parent view
#[derive(Debug)]
pub struct FilteredView {
    id: ViewId,
    parent: Option<ViewId>,
    filter: Option<Filter>,
    matched: Vec<usize>,
    /// Source candidates examined so far
    scanned: usize,
    state: ViewState,
    tags: BTreeMap<usize, Vec<usize>>,
    tag_filters: BTreeMap<usize, Filter>,
    first_displayed_row: Option<usize>,
    subscribers: Vec<Sender<ItemAdded>>,
    options: ViewOptions,
}

impl FilteredView {
    pub fn new(id: ViewId, parent: Option<ViewId>, filter: Option<Filter>, options: ViewOptions) -> Self {
        Self {
            id,
            parent,
            filter,
            matched: Vec::new(),
            scanned: 0,
            state: ViewState::Created,
            tags: BTreeMap::new(),
            tag_filters: BTreeMap::new(),
            first_displayed_row: None,
            subscribers: Vec::new(),
            options,
        }
    }

    pub fn id(&self) -> ViewId {
        self.id
    }

    pub fn parent(&self) -> Option<ViewId> {
        self.parent
    }

    pub fn filter(&self) -> Option<&Filter> {
        self.filter.as_ref()
    }

    pub fn state(&self) -> ViewState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == ViewState::Initialized
    }

    pub fn total_count(&self) -> usize {
        self.matched.len()
    }

    /// Record ids of the matched rows, in source order
    pub fn matched(&self) -> &[usize] {
        &self.matched
    }

    /// Number of source candidates already examined
    pub fn scanned(&self) -> usize {
        self.scanned
    }

    pub fn record_id(&self, row: usize) -> Result<usize, ViewError> {
        self.matched
            .get(row)
            .copied()
            .ok_or(ViewError::RowOutOfRange {
                row,
                total: self.matched.len(),
            })
    }

    pub fn record<'s>(&self, store: &'s LogStore, row: usize) -> Result<&'s LogRecord, ViewError> {
        Ok(store.record(self.record_id(row)?)?)
    }

    /// Cell value for the presentation layer; the `Tags` column reports this
    /// view's tag overlay
    pub fn column_value(&self, store: &LogStore, row: usize, column: usize) -> Result<ColumnValue, ViewError> {
        let record = self.record(store, row)?;
        match store.columns().get(column).map(|c| c.kind) {
            Some(ColumnKind::Tags) => Ok(ColumnValue::Tags(self.tags_of(record.id).to_vec())),
            _ => Ok(store.column_value(record, column)?),
        }
    }

    pub fn first_displayed_row(&self) -> Option<usize> {
        self.first_displayed_row
    }

    pub fn set_first_displayed_row(&mut self, row: Option<usize>) {
        self.first_displayed_row = row;
    }

    /// Receive an [`ItemAdded`] for every row appended from now on
    pub fn subscribe(&mut self) -> Receiver<ItemAdded> {
        let (sender, receiver) = channel();
        self.subscribers.push(sender);
        receiver
    }

    fn push_match(&mut self, record_id: usize) {
        let row = self.matched.len();
        self.matched.push(record_id);

        let event = ItemAdded { view: self.id, row };
        self.subscribers.retain(|s| s.send(event).is_ok());
    }

    /// Build the matched sequence. Yields progress percentages; the view
    /// becomes initialized once the returned scan is exhausted. Calling it
    /// again after that yields nothing.
    pub fn initialize<'a>(&'a mut self, source: SourceRows<'a>) -> Scan<'a> {
        if self.is_initialized() {
            return Scan::finished(self, source);
        }
        if self.state == ViewState::Created {
            self.state = ViewState::Initializing;
        }
        Scan::new(self, source)
    }

    /// Examine candidates that appeared in the source since the last scan
    pub fn refresh<'a>(&'a mut self, source: SourceRows<'a>) -> Scan<'a> {
        if self.state == ViewState::Created {
            self.state = ViewState::Initializing;
        }
        Scan::new(self, source)
    }

    /// Search this view's rows for `filter`, starting at `start` inclusive
    /// and moving towards the end (`forward`) or the beginning. Does not
    /// wrap around. The first matching row is written to `result`.
    pub fn find<'a>(
        &'a self,
        store: &'a LogStore,
        filter: &'a Filter,
        start: usize,
        forward: bool,
        result: ResultSlot<usize>,
    ) -> Find<'a> {
        Find::new(self, store, filter, start, forward, result)
    }

    /// Count this view's rows matching `filter`; the count is written to
    /// `result` once every row was examined
    pub fn count<'a>(&'a self, store: &'a LogStore, filter: &'a Filter, result: ResultSlot<usize>) -> Count<'a> {
        Count::new(self, store, filter, result)
    }

    /// Tag slots set on a record, ascending
    pub fn tags_of(&self, record_id: usize) -> &[usize] {
        self.tags.get(&record_id).map_or(&[], Vec::as_slice)
    }

    pub fn tags(&self) -> &BTreeMap<usize, Vec<usize>> {
        &self.tags
    }

    pub fn tag_filter(&self, slot: usize) -> Option<&Filter> {
        self.tag_filters.get(&slot)
    }

    fn check_slot(&self, slot: usize) -> Result<(), ViewError> {
        if slot < self.options.tag_slots {
            Ok(())
        } else {
            Err(ViewError::TagSlotOutOfRange {
                slot,
                slots: self.options.tag_slots,
            })
        }
    }

    /// Mark every source record matching `filter` with `slot`. Tags are an
    /// annotation layer independent of which records the view includes.
    /// Replaces an earlier tag of the same slot. The filter stays active, so
    /// candidates examined by later scans are tagged too. Returns the number
    /// of records tagged now.
    pub fn tag(&mut self, source: SourceRows<'_>, slot: usize, filter: Filter) -> Result<usize, ViewError> {
        self.check_slot(slot)?;
        self.untag(slot)?;

        let store = source.log_store();
        let mut tagged = 0;
        for index in 0..source.len() {
            let record = source.record(index);
            if filter.matches(store, record) {
                insert_tag(&mut self.tags, record.id, slot);
                tagged += 1;
            }
        }

        self.tag_filters.insert(slot, filter);
        Ok(tagged)
    }

    /// Apply the active tag filters to a candidate being scanned
    fn tag_candidate(&mut self, store: &LogStore, record: &LogRecord) {
        for (slot, filter) in &self.tag_filters {
            if filter.matches(store, record) {
                insert_tag(&mut self.tags, record.id, *slot);
            }
        }
    }

    /// Remove `slot` from every record
    pub fn untag(&mut self, slot: usize) -> Result<(), ViewError> {
        self.check_slot(slot)?;

        self.tags.retain(|_, slots| {
            slots.retain(|s| *s != slot);
            !slots.is_empty()
        });
        self.tag_filters.remove(&slot);
        Ok(())
    }
}

fn insert_tag(tags: &mut BTreeMap<usize, Vec<usize>>, record_id: usize, slot: usize) {
    let slots = tags.entry(record_id).or_default();
    if let Err(position) = slots.binary_search(&slot) {
        slots.insert(position, slot);
    }
}
