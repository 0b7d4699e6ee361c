use super::{
    Count, Find, FilteredView, ItemAdded, ResultSlot, Scan, SourceRows, ViewError, ViewId,
    ViewOptions,
};
use crate::filter::Filter;
use crate::store::{CancelToken, ColumnValue, LogRecord, LogStore, Progress, RecordSource};
use std::sync::mpsc::Receiver;

/// A store together with the tree of views built over it.
///
/// Views live in an arena addressed by [`ViewId`]. The unfiltered root view
/// is [`LogDocument::ROOT`]; every other view has a parent created before it,
/// so a parent's id is always lower than its children's.
#[derive(Debug)]
pub struct LogDocument {
    store: LogStore,
    views: Vec<Option<FilteredView>>,
    options: ViewOptions,
}

impl LogDocument {
    pub const ROOT: ViewId = ViewId(0);

    pub fn new(store: LogStore) -> Self {
        Self::with_options(store, ViewOptions::default())
    }

    pub fn with_options(store: LogStore, options: ViewOptions) -> Self {
        let root = FilteredView::new(Self::ROOT, None, None, options);
        Self {
            store,
            views: vec![Some(root)],
            options,
        }
    }

    pub fn store(&self) -> &LogStore {
        &self.store
    }

    pub fn options(&self) -> ViewOptions {
        self.options
    }

    pub fn view(&self, id: ViewId) -> Result<&FilteredView, ViewError> {
        self.views
            .get(id.0)
            .and_then(Option::as_ref)
            .ok_or(ViewError::UnknownView(id))
    }

    pub fn view_mut(&mut self, id: ViewId) -> Result<&mut FilteredView, ViewError> {
        self.views
            .get_mut(id.0)
            .and_then(Option::as_mut)
            .ok_or(ViewError::UnknownView(id))
    }

    /// Ids of the open views, in creation order
    pub fn view_ids(&self) -> impl Iterator<Item = ViewId> + '_ {
        self.views.iter().flatten().map(FilteredView::id)
    }

    pub fn children(&self, id: ViewId) -> Vec<ViewId> {
        self.views
            .iter()
            .flatten()
            .filter(|view| view.parent() == Some(id))
            .map(FilteredView::id)
            .collect()
    }

    /// Create a view over the rows `parent` matched. The child starts empty
    /// and has to be initialized.
    pub fn create_child(&mut self, parent: ViewId, filter: Option<Filter>) -> Result<ViewId, ViewError> {
        self.view(parent)?;

        let id = ViewId(self.views.len());
        self.views
            .push(Some(FilteredView::new(id, Some(parent), filter, self.options)));
        Ok(id)
    }

    /// Remove a view and every view derived from it
    pub fn close(&mut self, id: ViewId) -> Result<Vec<ViewId>, ViewError> {
        if id == Self::ROOT {
            return Err(ViewError::CloseRoot);
        }
        self.view(id)?;

        let mut closed = vec![id];
        for slot in &mut self.views[id.0 + 1..] {
            let descends = slot
                .as_ref()
                .and_then(FilteredView::parent)
                .is_some_and(|parent| closed.contains(&parent));
            if descends && let Some(view) = slot.take() {
                closed.push(view.id());
            }
        }
        self.views[id.0] = None;
        Ok(closed)
    }

    /// Borrow a view mutably together with the rows it scans
    fn view_and_source(&mut self, id: ViewId) -> Result<(&mut FilteredView, SourceRows<'_>), ViewError> {
        let parent = self.view(id)?.parent();
        let (before, rest) = self.views.split_at_mut(id.0);
        let view = rest
            .first_mut()
            .and_then(Option::as_mut)
            .ok_or(ViewError::UnknownView(id))?;

        let source = match parent {
            None => SourceRows::store(&self.store),
            Some(parent) => {
                let parent_view = before
                    .get(parent.0)
                    .and_then(Option::as_ref)
                    .ok_or(ViewError::UnknownView(parent))?;
                SourceRows::view(&self.store, parent_view)
            }
        };
        Ok((view, source))
    }

    pub fn initialize(&mut self, id: ViewId) -> Result<Scan<'_>, ViewError> {
        let (view, source) = self.view_and_source(id)?;
        Ok(view.initialize(source))
    }

    pub fn refresh(&mut self, id: ViewId) -> Result<Scan<'_>, ViewError> {
        let (view, source) = self.view_and_source(id)?;
        Ok(view.refresh(source))
    }

    /// Bring every open view up to date with the store, parents first.
    /// Returns the number of rows added across all views.
    pub fn refresh_all(&mut self, cancel: &CancelToken) -> usize {
        let ids: Vec<ViewId> = self.view_ids().collect();
        let mut added = 0;
        for id in ids {
            let Ok((view, source)) = self.view_and_source(id) else {
                continue;
            };
            let before = view.total_count();
            view.refresh(source).cancel_on(cancel).for_each(drop);
            added += view.total_count() - before;
        }
        added
    }

    pub fn find<'a>(
        &'a self,
        id: ViewId,
        filter: &'a Filter,
        start: usize,
        forward: bool,
        result: ResultSlot<usize>,
    ) -> Result<Find<'a>, ViewError> {
        Ok(self.view(id)?.find(&self.store, filter, start, forward, result))
    }

    pub fn count<'a>(&'a self, id: ViewId, filter: &'a Filter, result: ResultSlot<usize>) -> Result<Count<'a>, ViewError> {
        Ok(self.view(id)?.count(&self.store, filter, result))
    }

    /// Tag the view's source records matching `filter` with `slot`; without
    /// a filter the slot is cleared. Returns the number of records tagged.
    pub fn tag(&mut self, id: ViewId, slot: usize, filter: Option<Filter>) -> Result<usize, ViewError> {
        let (view, source) = self.view_and_source(id)?;
        match filter {
            Some(filter) => view.tag(source, slot, filter),
            None => view.untag(slot).map(|()| 0),
        }
    }

    pub fn untag(&mut self, id: ViewId, slot: usize) -> Result<(), ViewError> {
        self.view_mut(id)?.untag(slot)
    }

    pub fn subscribe(&mut self, id: ViewId) -> Result<Receiver<ItemAdded>, ViewError> {
        Ok(self.view_mut(id)?.subscribe())
    }

    pub fn total_count(&self, id: ViewId) -> Result<usize, ViewError> {
        Ok(self.view(id)?.total_count())
    }

    pub fn record(&self, id: ViewId, row: usize) -> Result<&LogRecord, ViewError> {
        self.view(id)?.record(&self.store, row)
    }

    pub fn column_value(&self, id: ViewId, row: usize, column: usize) -> Result<ColumnValue, ViewError> {
        self.view(id)?.column_value(&self.store, row, column)
    }

    /// Pull records from `source` into the store. Views are not touched;
    /// call [`LogDocument::refresh`] or [`LogDocument::refresh_all`] afterwards.
    pub fn load<'a>(
        &'a mut self,
        source: &'a mut dyn RecordSource,
        filter: Option<&'a Filter>,
        cancel: &'a CancelToken,
    ) -> Progress<'a> {
        self.store.load(source, filter, cancel)
    }
}
