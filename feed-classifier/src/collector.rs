use crate::traits::FeedSource;
use crate::types::{Cursor, Document, Result, MAX_PAGE_SIZE};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Insertion-ordered set of documents; the first occurrence of a text wins
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    documents: Vec<Document>,
    seen: HashSet<Document>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when an equal document is already present
    pub fn insert(&mut self, document: Document) -> bool {
        if self.seen.contains(&document) {
            return false;
        }
        self.seen.insert(document.clone());
        self.documents.push(document);
        true
    }

    /// Folds a batch in order, returning how many were new
    pub fn extend_from<I: IntoIterator<Item = Document>>(&mut self, documents: I) -> usize {
        let mut added = 0;
        for document in documents {
            if self.insert(document) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, document: &Document) -> bool {
        self.seen.contains(document)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.documents.iter().map(Document::text).collect()
    }
}

impl IntoIterator for DocumentSet {
    type Item = Document;
    type IntoIter = std::vec::IntoIter<Document>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.into_iter()
    }
}

impl FromIterator<Document> for DocumentSet {
    fn from_iter<I: IntoIterator<Item = Document>>(iter: I) -> Self {
        let mut set = DocumentSet::new();
        set.extend_from(iter);
        set
    }
}

/// Counters gathered while walking the feeds
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectStats {
    pub pages_fetched: usize,
    pub documents_seen: usize,
    pub duplicates_discarded: usize,
}

/// Walks each feed's cursor chain until its budget is spent, deduplicating as it goes
pub struct Collector {
    source: Arc<dyn FeedSource>,
    page_size: usize,
    budget_per_feed: i64,
}

impl Collector {
    pub fn new(source: Arc<dyn FeedSource>, page_size: usize, budget_per_feed: i64) -> Self {
        Self {
            source,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
            budget_per_feed,
        }
    }

    pub async fn collect(&self, feeds: &[String]) -> Result<DocumentSet> {
        self.collect_with_stats(feeds).await.map(|(set, _)| set)
    }

    /// Any fetch error aborts the whole collection.
    pub async fn collect_with_stats(&self, feeds: &[String]) -> Result<(DocumentSet, CollectStats)> {
        let mut documents = DocumentSet::new();
        let mut stats = CollectStats::default();

        for feed in feeds {
            self.collect_feed(feed, &mut documents, &mut stats).await?;
        }

        info!(
            "Collected {} unique documents from {} feeds ({} pages, {} duplicates discarded)",
            documents.len(),
            feeds.len(),
            stats.pages_fetched,
            stats.duplicates_discarded
        );
        Ok((documents, stats))
    }

    async fn collect_feed(&self, feed: &str, documents: &mut DocumentSet, stats: &mut CollectStats) -> Result<()> {
        info!("Collecting from feed {} via {}", feed, self.source.source_name());

        // The budget alone bounds the loop; every call charges at least the
        // requested page size so a source that never ends its cursor chain
        // still stops after ceil(budget / page_size) calls.
        let mut remaining = self.budget_per_feed;
        let mut cursor: Option<Cursor> = None;
        let mut pages = 0;
        let mut added = 0;

        while remaining > 0 {
            let requested = (self.page_size as i64).min(remaining) as usize;
            let page = self.source.fetch_page(feed, cursor.as_ref(), requested).await?;

            let received = page.documents.len();
            let new = documents.extend_from(page.documents);
            pages += 1;
            added += new;
            stats.pages_fetched += 1;
            stats.documents_seen += received;
            stats.duplicates_discarded += received - new;

            remaining -= page.entries_received.max(requested) as i64;
            debug!(
                "Page {} of {}: {} documents, {} new, {} budget left",
                pages, feed, received, new, remaining.max(0)
            );

            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => {
                    debug!("Feed {} exhausted after {} pages", feed, pages);
                    break;
                }
            }
        }

        info!("Feed {}: {} pages, {} new documents", feed, pages, added);
        Ok(())
    }
}
