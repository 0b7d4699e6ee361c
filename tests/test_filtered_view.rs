use chrono::{TimeZone, Utc};
use log_sieve::filter::Filter;
use log_sieve::store::{CancelToken, LogLevel, LogStore, MemorySource, RawRecord};
use log_sieve::view::{
    FilteredView, ItemAdded, LogDocument, ResultSlot, SourceRows, ViewError, ViewId, ViewOptions,
    ViewState,
};
use std::thread;

fn raw(text: &str) -> RawRecord {
    RawRecord {
        template: "{0}".to_string(),
        parameters: vec![text.to_string()],
        time: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        thread_id: 0,
        process_id: 0,
        level: LogLevel::Info,
        file: "test.rs".to_string(),
    }
}

fn store_of<S: AsRef<str>>(texts: &[S]) -> LogStore {
    let mut store = LogStore::new();
    for text in texts {
        store.ingest(&raw(text.as_ref()));
    }
    store
}

/// Records "record N even" / "record N odd"
fn parity_store(count: usize) -> LogStore {
    let texts: Vec<String> = (0..count)
        .map(|n| format!("record {n} {}", if n % 2 == 0 { "even" } else { "odd" }))
        .collect();
    store_of(&texts)
}

fn interval(checkpoint_interval: usize) -> ViewOptions {
    ViewOptions {
        checkpoint_interval,
        ..ViewOptions::default()
    }
}

/// Ten records; rows 2, 5 and 9 contain "target"
fn find_document() -> LogDocument {
    let texts: Vec<String> = (0..10)
        .map(|n| match n {
            2 | 5 | 9 => format!("line {n} target"),
            _ => format!("line {n}"),
        })
        .collect();
    let mut doc = LogDocument::with_options(store_of(&texts), interval(3));
    doc.initialize(LogDocument::ROOT).unwrap().for_each(drop);
    doc
}

fn find(doc: &LogDocument, start: usize, forward: bool) -> Option<usize> {
    let filter = Filter::new("target").unwrap();
    let slot = ResultSlot::new();
    doc.find(LogDocument::ROOT, &filter, start, forward, slot.clone())
        .unwrap()
        .for_each(drop);
    slot.get()
}

#[test]
fn test_even_view_lists_even_records_in_order() {
    let store = parity_store(10);
    let mut view = FilteredView::new(ViewId(1), None, Some(Filter::new("even").unwrap()), interval(4));

    let progress: Vec<u8> = view.initialize(SourceRows::store(&store)).collect();
    assert_eq!(progress, vec![40, 80, 100]);
    assert!(view.is_initialized());
    assert_eq!(view.total_count(), 5);
    for row in 0..5 {
        assert_eq!(view.record(&store, row).unwrap().id, row * 2);
    }
    assert_eq!(view.record(&store, 5), Err(ViewError::RowOutOfRange { row: 5, total: 5 }));
}

#[test]
fn test_initialize_twice_yields_nothing() {
    let store = parity_store(3);
    let mut view = FilteredView::new(ViewId(0), None, None, ViewOptions::default());
    view.initialize(SourceRows::store(&store)).for_each(drop);

    assert_eq!(view.initialize(SourceRows::store(&store)).count(), 0);
    assert_eq!(view.total_count(), 3);
}

#[test]
fn test_find_forward_and_backward() {
    let doc = find_document();
    assert_eq!(find(&doc, 0, true), Some(2));
    assert_eq!(find(&doc, 3, true), Some(5));
    assert_eq!(find(&doc, 5, true), Some(5));
    assert_eq!(find(&doc, 1, false), None);
    assert_eq!(find(&doc, 8, false), Some(5));
    assert_eq!(find(&doc, 100, false), Some(9));
    assert_eq!(find(&doc, 10, true), None);
}

#[test]
fn test_find_progress_is_monotonic() {
    let doc = find_document();
    let filter = Filter::new("absent").unwrap();
    let slot = ResultSlot::new();
    let progress: Vec<u8> = doc
        .find(LogDocument::ROOT, &filter, 0, true, slot.clone())
        .unwrap()
        .collect();

    assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(progress.last(), Some(&100));
    assert_eq!(slot.get(), None);
}

#[test]
fn test_count_matches() {
    let doc = find_document();
    let filter = Filter::new("target || \"line 0\"").unwrap();
    let slot = ResultSlot::new();
    let steps = doc
        .count(LogDocument::ROOT, &filter, slot.clone())
        .unwrap()
        .count();

    assert_eq!(steps, 4);
    assert_eq!(slot.get(), Some(4));
}

#[test]
fn test_count_on_empty_view() {
    let doc = LogDocument::new(LogStore::new());
    let filter = Filter::new("x").unwrap();
    let slot = ResultSlot::new();
    assert_eq!(doc.count(LogDocument::ROOT, &filter, slot.clone()).unwrap().count(), 0);
    assert_eq!(slot.get(), Some(0));
}

#[test]
fn test_tag_and_untag_slots() {
    let store = store_of(&["alpha", "b", "c", "alpha beta", "alpha", "beta"]);
    let mut view = FilteredView::new(ViewId(0), None, None, ViewOptions::default());
    let source = SourceRows::store(&store);
    view.initialize(source).for_each(drop);

    assert_eq!(view.tag(source, 1, Filter::new("alpha").unwrap()), Ok(3));
    assert_eq!(view.tag(source, 2, Filter::new("beta").unwrap()), Ok(2));
    assert_eq!(view.tags_of(0), &[1]);
    assert_eq!(view.tags_of(3), &[1, 2]);
    assert_eq!(view.tags_of(4), &[1]);
    assert_eq!(view.tags_of(5), &[2]);

    view.untag(1).unwrap();
    assert_eq!(view.tags_of(3), &[2]);
    assert_eq!(view.tags_of(5), &[2]);
    assert!(view.tags_of(0).is_empty());
    assert!(view.tags_of(4).is_empty());
    assert!(view.tag_filter(1).is_none());
}

#[test]
fn test_tags_cover_records_outside_the_view() {
    let store = parity_store(4);
    let mut view = FilteredView::new(ViewId(0), None, Some(Filter::new("even").unwrap()), ViewOptions::default());
    let source = SourceRows::store(&store);
    view.initialize(source).for_each(drop);

    assert_eq!(view.tag(source, 0, Filter::new("odd").unwrap()), Ok(2));
    assert_eq!(view.tags_of(1), &[0]);
    assert_eq!(view.total_count(), 2);
}

#[test]
fn test_dropping_scan_after_k_checkpoints() {
    let store = parity_store(10);
    let mut view = FilteredView::new(ViewId(0), None, Some(Filter::new("even").unwrap()), interval(1));

    let taken = view.initialize(SourceRows::store(&store)).take(5).count();
    assert_eq!(taken, 5);
    assert!(!view.is_initialized());
    assert_eq!(view.state(), ViewState::Initializing);
    assert_eq!(view.scanned(), 5);
    assert_eq!(view.matched(), &[0, 2, 4]);

    // A later call resumes where the scan stopped
    view.initialize(SourceRows::store(&store)).for_each(drop);
    assert!(view.is_initialized());
    assert_eq!(view.matched(), &[0, 2, 4, 6, 8]);
}

#[test]
fn test_cancel_token_stops_initialize() {
    let store = parity_store(10);
    let mut view = FilteredView::new(ViewId(0), None, Some(Filter::new("odd").unwrap()), interval(1));
    let cancel = CancelToken::new();

    let mut scan = view.initialize(SourceRows::store(&store)).cancel_on(&cancel);
    for _ in 0..4 {
        assert!(scan.next().is_some());
    }
    cancel.cancel();
    assert_eq!(scan.next(), None);
    drop(scan);

    assert!(!view.is_initialized());
    assert_eq!(view.matched(), &[1, 3]);
}

#[test]
fn test_item_added_events_follow_row_order() {
    let store = parity_store(6);
    let mut view = FilteredView::new(ViewId(4), None, Some(Filter::new("even").unwrap()), ViewOptions::default());
    let events = view.subscribe();
    view.initialize(SourceRows::store(&store)).for_each(drop);

    let received: Vec<ItemAdded> = events.try_iter().collect();
    assert_eq!(
        received,
        (0..3).map(|row| ItemAdded { view: ViewId(4), row }).collect::<Vec<_>>()
    );
}

#[test]
fn test_dropped_subscriber_is_ignored() {
    let store = parity_store(2);
    let mut view = FilteredView::new(ViewId(0), None, None, ViewOptions::default());
    drop(view.subscribe());
    view.initialize(SourceRows::store(&store)).for_each(drop);
    assert_eq!(view.total_count(), 2);
}

#[test]
fn test_views_initialize_on_separate_threads() {
    let store = parity_store(1000);
    let mut even = FilteredView::new(ViewId(1), None, Some(Filter::new("even").unwrap()), interval(64));
    let mut odd = FilteredView::new(ViewId(2), None, Some(Filter::new("odd").unwrap()), interval(64));
    let events = even.subscribe();

    thread::scope(|scope| {
        scope.spawn(|| even.initialize(SourceRows::store(&store)).for_each(drop));
        scope.spawn(|| odd.initialize(SourceRows::store(&store)).for_each(drop));
        scope.spawn(move || {
            let rows: Vec<usize> = events.iter().take(500).map(|event| event.row).collect();
            assert_eq!(rows, (0..500).collect::<Vec<_>>());
        });
    });

    assert_eq!(even.total_count(), 500);
    assert_eq!(odd.total_count(), 500);
    assert!(even.matched().iter().all(|id| id % 2 == 0));
}

#[test]
fn test_cancel_from_another_thread() {
    let store = parity_store(10_000);
    let mut view = FilteredView::new(ViewId(0), None, None, interval(10));
    let cancel = CancelToken::new();

    thread::scope(|scope| {
        let worker_cancel = cancel.clone();
        let view = &mut view;
        let store = &store;
        let worker = scope.spawn(move || {
            view.initialize(SourceRows::store(store))
                .cancel_on(&worker_cancel)
                .take_while(|percent| *percent < 50)
                .count()
        });
        let checkpoints = worker.join().unwrap();
        assert!(checkpoints > 0);
        cancel.cancel();
    });

    // Resuming with a tripped token does nothing
    let before = view.scanned();
    view.initialize(SourceRows::store(&store)).cancel_on(&cancel).for_each(drop);
    assert_eq!(view.scanned(), before);
    assert!(!view.is_initialized());

    view.initialize(SourceRows::store(&store)).for_each(drop);
    assert_eq!(view.total_count(), 10_000);
}

#[test]
fn test_document_chain_with_incremental_load() {
    let mut doc = LogDocument::with_options(LogStore::new(), interval(2));
    let cancel = CancelToken::new();
    let mut source = MemorySource::new("mem", vec![raw("error disk"), raw("info disk")]);
    doc.load(&mut source, None, &cancel).for_each(drop);
    doc.initialize(LogDocument::ROOT).unwrap().for_each(drop);

    let errors = doc
        .create_child(LogDocument::ROOT, Some(Filter::new("error").unwrap()))
        .unwrap();
    doc.initialize(errors).unwrap().for_each(drop);
    assert_eq!(doc.total_count(errors), Ok(1));

    source.push(raw("error net"));
    doc.load(&mut source, None, &cancel).for_each(drop);
    assert_eq!(doc.total_count(errors), Ok(1));

    doc.refresh(LogDocument::ROOT).unwrap().for_each(drop);
    doc.refresh(errors).unwrap().for_each(drop);
    assert_eq!(doc.total_count(errors), Ok(2));
    assert_eq!(doc.record(errors, 1).unwrap().id, 2);

    let text = doc.store().column_index("Text").unwrap();
    assert_eq!(
        doc.column_value(errors, 1, text).unwrap().to_string(),
        "error net"
    );
}

#[test]
fn test_refresh_tags_records_loaded_later() {
    let mut doc = LogDocument::new(LogStore::new());
    let cancel = CancelToken::new();
    let mut source = MemorySource::new("mem", vec![raw("disk full"), raw("cpu hot")]);
    doc.load(&mut source, None, &cancel).for_each(drop);
    doc.initialize(LogDocument::ROOT).unwrap().for_each(drop);
    assert_eq!(doc.tag(LogDocument::ROOT, 2, Some(Filter::new("disk").unwrap())), Ok(1));

    source.push(raw("disk gone"));
    source.push(raw("fan slow"));
    doc.load(&mut source, None, &cancel).for_each(drop);
    doc.refresh(LogDocument::ROOT).unwrap().for_each(drop);

    let view = doc.view(LogDocument::ROOT).unwrap();
    assert_eq!(view.tags_of(0), &[2]);
    assert_eq!(view.tags_of(2), &[2]);
    assert!(view.tags_of(3).is_empty());

    // An untagged slot no longer applies to new records
    doc.untag(LogDocument::ROOT, 2).unwrap();
    source.push(raw("disk back"));
    doc.load(&mut source, None, &cancel).for_each(drop);
    doc.refresh(LogDocument::ROOT).unwrap().for_each(drop);
    assert!(doc.view(LogDocument::ROOT).unwrap().tags_of(4).is_empty());
}
