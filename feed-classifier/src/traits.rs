use crate::types::{Cursor, Label, Page, Result, StoredItem};
use async_trait::async_trait;

/// Trait for paginated document sources (Bluesky feeds, scripted test feeds, etc.)
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Human-readable name for this source
    fn source_name(&self) -> String;

    /// Fetch one page of `feed` starting at `cursor`.
    ///
    /// An empty page is not an error. Transport and auth failures surface as
    /// `SourceUnavailable` and must not be read as end-of-feed.
    async fn fetch_page(
        &self,
        feed: &str,
        cursor: Option<&Cursor>,
        page_size: usize,
    ) -> Result<Page>;
}

/// Trait for binary text classifiers
#[async_trait]
pub trait Classifier: Send + Sync {
    fn classifier_name(&self) -> String;

    /// Ambiguous replies fold into `Label::No`; only transport-level
    /// failures return an error.
    async fn classify(&self, text: &str) -> Result<Label>;
}

/// Trait for sinks that persist a document under its label's partition
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn store(&self, text: &str, label: Label, sequence: usize) -> Result<StoredItem>;
}
