use crate::traits::FeedSource;
use crate::types::{Cursor, Document, FeedClassifierError, Page, Result, MAX_PAGE_SIZE};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

enum Script {
    /// Pages replayed as given; the cursor is the index of the next page
    Pages(Vec<Vec<String>>),
    /// A flat list sliced by the requested page size; the cursor is an offset
    Stream(Vec<String>),
    /// Always returns a full page and a cursor, never ending the chain
    Endless,
}

/// In-memory feed source with scripted content, for tests and dry runs
pub struct StaticFeedSource {
    scripts: HashMap<String, Script>,
    failing_feeds: HashSet<String>,
    calls: AtomicUsize,
    requests: Mutex<Vec<(String, Option<String>, usize)>>,
}

impl StaticFeedSource {
    pub fn new() -> Self {
        Self {
            scripts: HashMap::new(),
            failing_feeds: HashSet::new(),
            calls: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Serve `pages` one per call, in order
    pub fn with_pages<I, P, S>(mut self, feed: &str, pages: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pages = pages
            .into_iter()
            .map(|page| page.into_iter().map(Into::into).collect())
            .collect();
        self.scripts.insert(feed.to_string(), Script::Pages(pages));
        self
    }

    /// Serve `texts` in slices of whatever page size the caller asks for
    pub fn with_stream<I, S>(mut self, feed: &str, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let texts = texts.into_iter().map(Into::into).collect();
        self.scripts.insert(feed.to_string(), Script::Stream(texts));
        self
    }

    /// A misbehaving feed that never stops issuing cursors
    pub fn with_endless(mut self, feed: &str) -> Self {
        self.scripts.insert(feed.to_string(), Script::Endless);
        self
    }

    pub fn with_failure(mut self, feed: &str) -> Self {
        self.failing_feeds.insert(feed.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request seen so far as (feed, cursor, page size)
    pub fn requests(&self) -> Vec<(String, Option<String>, usize)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn position(cursor: Option<&Cursor>) -> usize {
        cursor.and_then(|c| c.as_str().parse().ok()).unwrap_or(0)
    }
}

impl Default for StaticFeedSource {
    fn default() -> Self {
        Self::new()
    }
}

fn to_documents(texts: &[String]) -> Vec<Document> {
    texts.iter().cloned().filter_map(Document::new).collect()
}

#[async_trait]
impl FeedSource for StaticFeedSource {
    fn source_name(&self) -> String {
        "Static feed".to_string()
    }

    async fn fetch_page(&self, feed: &str, cursor: Option<&Cursor>, page_size: usize) -> Result<Page> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((feed.to_string(), cursor.map(|c| c.as_str().to_string()), page_size));
        }

        if self.failing_feeds.contains(feed) {
            return Err(FeedClassifierError::source_unavailable(feed, "scripted failure"));
        }

        let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        let position = Self::position(cursor);

        let page = match self.scripts.get(feed) {
            None => Page::default(),
            Some(Script::Pages(pages)) => match pages.get(position) {
                Some(texts) => {
                    let next = (position + 1 < pages.len()).then(|| (position + 1).to_string());
                    Page::new(to_documents(texts), Cursor::from_source(next)).with_entries_received(texts.len())
                }
                None => Page::default(),
            },
            Some(Script::Stream(texts)) => {
                let start = position.min(texts.len());
                let end = (start + page_size).min(texts.len());
                let slice = &texts[start..end];
                let next = (end < texts.len()).then(|| end.to_string());
                Page::new(to_documents(slice), Cursor::from_source(next)).with_entries_received(slice.len())
            }
            Some(Script::Endless) => {
                let texts: Vec<String> = (0..page_size).map(|i| format!("{}-{}-{}", feed, call, i)).collect();
                Page::new(to_documents(&texts), Cursor::from_source(Some((position + 1).to_string())))
            }
        };

        Ok(page)
    }
}
