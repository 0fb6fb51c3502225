use feed_classifier::{Collector, Document, DocumentSet, FeedClassifierError, StaticFeedSource};
use std::sync::{Arc, Once};
use tracing::info;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn feeds(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn test_duplicates_across_pages_are_dropped() {
    init_tracing();

    let source = Arc::new(StaticFeedSource::new().with_pages("feed", vec![vec!["a", "b"], vec!["b", "c"]]));
    let collector = Collector::new(source.clone(), 2, 100);

    let documents = collector.collect(&feeds(&["feed"])).await.unwrap();

    assert_eq!(documents.texts(), vec!["a", "b", "c"]);
    assert_eq!(source.call_count(), 2);
}

#[tokio::test]
async fn test_dedup_is_independent_of_page_boundaries() {
    init_tracing();

    let stream = vec!["x", "y", "x", "z", "y", "w", "z", "v", "x"];
    let expected = vec!["x", "y", "z", "w", "v"];

    for page_size in 1..=stream.len() + 1 {
        let source = Arc::new(StaticFeedSource::new().with_stream("feed", stream.clone()));
        let collector = Collector::new(source, page_size, 1_000);

        let documents = collector.collect(&feeds(&["feed"])).await.unwrap();
        assert_eq!(documents.texts(), expected, "page size {}", page_size);
    }
}

#[tokio::test]
async fn test_first_occurrence_wins_across_feeds() {
    init_tracing();

    let source = Arc::new(
        StaticFeedSource::new()
            .with_pages("first", vec![vec!["shared", "one"]])
            .with_pages("second", vec![vec!["two", "shared"]]),
    );
    let collector = Collector::new(source, 100, 100);

    let (documents, stats) = collector
        .collect_with_stats(&feeds(&["first", "second"]))
        .await
        .unwrap();

    assert_eq!(documents.texts(), vec!["shared", "one", "two"]);
    assert_eq!(stats.pages_fetched, 2);
    assert_eq!(stats.documents_seen, 4);
    assert_eq!(stats.duplicates_discarded, 1);
}

#[tokio::test]
async fn test_budget_bounds_endless_feed() {
    init_tracing();

    for (budget, page_size) in [(100_i64, 100_usize), (250, 100), (7, 3), (1, 50), (10, 1)] {
        let source = Arc::new(StaticFeedSource::new().with_endless("endless"));
        let collector = Collector::new(source.clone(), page_size, budget);

        collector.collect(&feeds(&["endless"])).await.unwrap();

        let bound = (budget as usize + page_size - 1) / page_size;
        info!("budget {} page {} -> {} calls", budget, page_size, source.call_count());
        assert_eq!(source.call_count(), bound, "budget {} page size {}", budget, page_size);
    }
}

#[tokio::test]
async fn test_last_request_asks_only_for_remaining_budget() {
    init_tracing();

    let source = Arc::new(StaticFeedSource::new().with_endless("endless"));
    let collector = Collector::new(source.clone(), 100, 250);

    let documents = collector.collect(&feeds(&["endless"])).await.unwrap();

    let sizes: Vec<usize> = source.requests().iter().map(|(_, _, size)| *size).collect();
    assert_eq!(sizes, vec![100, 100, 50]);
    assert_eq!(documents.len(), 250);
}

#[tokio::test]
async fn test_missing_cursor_stops_feed_early() {
    init_tracing();

    let source = Arc::new(StaticFeedSource::new().with_pages("short", vec![vec!["only", "two"]]));
    let collector = Collector::new(source.clone(), 100, 1_000);

    let documents = collector.collect(&feeds(&["short"])).await.unwrap();

    assert_eq!(documents.len(), 2);
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn test_cursor_is_passed_through_and_reset_per_feed() {
    init_tracing();

    let source = Arc::new(
        StaticFeedSource::new()
            .with_pages("a", vec![vec!["a1"], vec!["a2"], vec!["a3"]])
            .with_pages("b", vec![vec!["b1"], vec!["b2"]]),
    );
    let collector = Collector::new(source.clone(), 1, 10);

    collector.collect(&feeds(&["a", "b"])).await.unwrap();

    let cursors: Vec<(String, Option<String>)> = source
        .requests()
        .into_iter()
        .map(|(feed, cursor, _)| (feed, cursor))
        .collect();
    assert_eq!(
        cursors,
        vec![
            ("a".to_string(), None),
            ("a".to_string(), Some("1".to_string())),
            ("a".to_string(), Some("2".to_string())),
            ("b".to_string(), None),
            ("b".to_string(), Some("1".to_string())),
        ]
    );
}

#[tokio::test]
async fn test_empty_pages_still_charge_the_budget() {
    init_tracing();

    let empty: Vec<Vec<&str>> = vec![vec![]; 50];
    let source = Arc::new(StaticFeedSource::new().with_pages("quiet", empty));
    let collector = Collector::new(source.clone(), 10, 30);

    let documents = collector.collect(&feeds(&["quiet"])).await.unwrap();

    assert!(documents.is_empty());
    assert_eq!(source.call_count(), 3);
}

#[tokio::test]
async fn test_non_positive_budget_fetches_nothing() {
    init_tracing();

    let source = Arc::new(StaticFeedSource::new().with_endless("endless"));
    let collector = Collector::new(source.clone(), 100, 0);

    let documents = collector.collect(&feeds(&["endless"])).await.unwrap();

    assert!(documents.is_empty());
    assert_eq!(source.call_count(), 0);
}

#[tokio::test]
async fn test_source_failure_aborts_collection() {
    init_tracing();

    let source = Arc::new(
        StaticFeedSource::new()
            .with_pages("good", vec![vec!["a"]])
            .with_failure("bad"),
    );
    let collector = Collector::new(source, 100, 100);

    let result = collector.collect(&feeds(&["good", "bad"])).await;

    match result {
        Err(FeedClassifierError::SourceUnavailable { feed, .. }) => assert_eq!(feed, "bad"),
        other => panic!("expected SourceUnavailable, got {:?}", other.map(|d| d.len())),
    }
}

#[test]
fn test_document_set_membership() {
    let mut set = DocumentSet::new();
    let doc = Document::new("hello").unwrap();

    assert!(set.insert(doc.clone()));
    assert!(!set.insert(doc.clone()));
    assert!(set.contains(&doc));
    assert_eq!(set.len(), 1);

    let collected: DocumentSet = ["b", "a", "b", "c", "a"]
        .into_iter()
        .filter_map(Document::new)
        .collect();
    assert_eq!(collected.texts(), vec!["b", "a", "c"]);
}

#[test]
fn test_blank_text_is_not_a_document() {
    assert!(Document::new("").is_none());
    assert!(Document::new("   \n").is_none());
    assert_eq!(Document::new(" padded ").unwrap().text(), " padded ");
}
