use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Largest page the feed source will hand out in one call
pub const MAX_PAGE_SIZE: usize = 100;

/// A unit of work: the raw text extracted from one feed entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Document(String);

impl Document {
    /// Returns `None` for text that is empty or only whitespace
    pub fn new(text: impl Into<String>) -> Option<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            None
        } else {
            Some(Self(text))
        }
    }

    pub fn text(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque continuation token issued by the feed source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor(String);

impl Cursor {
    /// An empty token from the source means there is nothing left to page through
    pub fn from_source(token: Option<String>) -> Option<Self> {
        token.filter(|t| !t.is_empty()).map(Self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One batch of documents plus the cursor for the next batch
#[derive(Debug, Clone, Default)]
pub struct Page {
    pub documents: Vec<Document>,
    pub next_cursor: Option<Cursor>,
    /// Raw entries delivered by the source, including ones without usable text
    pub entries_received: usize,
}

impl Page {
    pub fn new(documents: Vec<Document>, next_cursor: Option<Cursor>) -> Self {
        let entries_received = documents.len();
        Self {
            documents,
            next_cursor,
            entries_received,
        }
    }

    pub fn with_entries_received(mut self, entries_received: usize) -> Self {
        self.entries_received = entries_received;
        self
    }

    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }
}

/// Closed set of classification outcomes. Each label names one output partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Yes,
    No,
}

impl Label {
    pub const ALL: [Label; 2] = [Label::Yes, Label::No];

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Yes => "Yes",
            Label::No => "No",
        }
    }

    /// Normalizes a raw oracle reply. Only an exact "Yes" (surrounding
    /// whitespace ignored) is positive; everything else folds into `No`.
    pub fn from_reply(reply: &str) -> Self {
        if reply.trim() == Label::Yes.as_str() {
            Label::Yes
        } else {
            Label::No
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document persisted under its label's partition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredItem {
    pub label: Label,
    pub path: PathBuf,
    pub sequence: usize,
    pub stored_at: DateTime<Utc>,
}

/// Transport settings shared by the outbound HTTP clients
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    /// Minimum spacing between two requests to the same host
    pub min_request_interval_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Feed-Classifier/1.0".to_string(),
            timeout_seconds: 30,
            max_retries: 2,
            retry_delay_ms: 500,
            min_request_interval_ms: 0,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FeedClassifierError {
    #[error("Feed source unavailable for {feed}: {reason}")]
    SourceUnavailable { feed: String, reason: String },

    #[error("Classification oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Failed to persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl FeedClassifierError {
    pub fn source_unavailable(feed: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self::SourceUnavailable {
            feed: feed.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FeedClassifierError>;
