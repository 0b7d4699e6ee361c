use super::{FilteredView, ResultSlot, SourceRows, ViewState};
use crate::filter::Filter;
use crate::store::{CancelToken, LogStore, percent};

/// Progress of building or extending a view's matched sequence.
///
/// Every item is a checkpoint: a batch of source candidates has been
/// examined and the view is consistent. Dropping the scan (or tripping the
/// token given to [`Scan::cancel_on`]) stops it there; a later scan resumes
/// at the first unexamined candidate.
pub struct Scan<'a> {
    view: &'a mut FilteredView,
    source: SourceRows<'a>,
    end: usize,
    finished: bool,
    cancel: Option<CancelToken>,
}

impl<'a> Scan<'a> {
    pub(super) fn new(view: &'a mut FilteredView, source: SourceRows<'a>) -> Self {
        let end = source.len();
        Self {
            view,
            source,
            end,
            finished: false,
            cancel: None,
        }
    }

    pub(super) fn finished(view: &'a mut FilteredView, source: SourceRows<'a>) -> Self {
        Self {
            finished: true,
            ..Self::new(view, source)
        }
    }

    pub fn cancel_on(mut self, token: &CancelToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }
}

impl Iterator for Scan<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.finished {
            return None;
        }
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            self.finished = true;
            return None;
        }
        if self.view.scanned >= self.end {
            self.finished = true;
            self.view.state = ViewState::Initialized;
            return None;
        }

        let store = self.source.log_store();
        let interval = self.view.options.checkpoint_interval.max(1);
        let batch_end = (self.view.scanned + interval).min(self.end);

        while self.view.scanned < batch_end {
            let index = self.view.scanned;
            let record = self.source.record(index);
            let accepted = self
                .view
                .filter
                .as_ref()
                .is_none_or(|filter| filter.matches(store, record));
            if accepted {
                self.view.push_match(record.id);
            }
            self.view.tag_candidate(store, record);
            self.view.scanned = index + 1;
        }

        Some(percent(self.view.scanned, self.end))
    }
}

/// Progress of a search through a view's rows; see [`FilteredView::find`]
pub struct Find<'a> {
    view: &'a FilteredView,
    store: &'a LogStore,
    filter: &'a Filter,
    forward: bool,
    next_row: Option<usize>,
    examined: usize,
    span: usize,
    result: ResultSlot<usize>,
    done: bool,
    cancel: Option<CancelToken>,
}

impl<'a> Find<'a> {
    pub(super) fn new(
        view: &'a FilteredView,
        store: &'a LogStore,
        filter: &'a Filter,
        start: usize,
        forward: bool,
        result: ResultSlot<usize>,
    ) -> Self {
        let total = view.total_count();
        let (next_row, span) = if forward {
            ((start < total).then_some(start), total.saturating_sub(start))
        } else if total == 0 {
            (None, 0)
        } else {
            let first = start.min(total - 1);
            (Some(first), first + 1)
        };

        Self {
            view,
            store,
            filter,
            forward,
            next_row,
            examined: 0,
            span,
            result,
            done: false,
            cancel: None,
        }
    }

    pub fn cancel_on(mut self, token: &CancelToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }

    fn step(&self, row: usize) -> Option<usize> {
        if self.forward {
            Some(row + 1).filter(|next| *next < self.view.total_count())
        } else {
            row.checked_sub(1)
        }
    }

    fn row_matches(&self, row: usize) -> bool {
        self.view
            .matched
            .get(row)
            .and_then(|id| self.store.get(*id))
            .is_some_and(|record| self.filter.matches(self.store, record))
    }
}

impl Iterator for Find<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.done {
            return None;
        }
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            self.done = true;
            return None;
        }
        let Some(mut row) = self.next_row else {
            self.done = true;
            return None;
        };

        let interval = self.view.options.checkpoint_interval.max(1);
        for _ in 0..interval {
            self.examined += 1;
            if self.row_matches(row) {
                self.result.set(row);
                self.next_row = None;
                self.done = true;
                return Some(100);
            }

            match self.step(row) {
                Some(next) => row = next,
                None => {
                    self.next_row = None;
                    return Some(percent(self.examined, self.span));
                }
            }
        }

        self.next_row = Some(row);
        Some(percent(self.examined, self.span))
    }
}

/// Progress of counting a view's rows matching a filter; see
/// [`FilteredView::count`]
pub struct Count<'a> {
    view: &'a FilteredView,
    store: &'a LogStore,
    filter: &'a Filter,
    row: usize,
    matches: usize,
    result: ResultSlot<usize>,
    done: bool,
    cancel: Option<CancelToken>,
}

impl<'a> Count<'a> {
    pub(super) fn new(view: &'a FilteredView, store: &'a LogStore, filter: &'a Filter, result: ResultSlot<usize>) -> Self {
        Self {
            view,
            store,
            filter,
            row: 0,
            matches: 0,
            result,
            done: false,
            cancel: None,
        }
    }

    pub fn cancel_on(mut self, token: &CancelToken) -> Self {
        self.cancel = Some(token.clone());
        self
    }
}

impl Iterator for Count<'_> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        if self.done {
            return None;
        }
        if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
            self.done = true;
            return None;
        }

        let rows = &self.view.matched;
        if self.row >= rows.len() {
            self.result.set(self.matches);
            self.done = true;
            return None;
        }

        let interval = self.view.options.checkpoint_interval.max(1);
        let batch_end = (self.row + interval).min(rows.len());
        for &id in &rows[self.row..batch_end] {
            if let Some(record) = self.store.get(id)
                && self.filter.matches(self.store, record)
            {
                self.matches += 1;
            }
        }
        self.row = batch_end;

        if self.row == rows.len() {
            self.result.set(self.matches);
        }
        Some(percent(self.row, rows.len()))
    }
}
