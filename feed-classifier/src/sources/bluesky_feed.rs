use crate::fetcher::Fetcher;
use crate::traits::FeedSource;
use crate::types::{Cursor, Document, FeedClassifierError, FetchConfig, Page, Result, MAX_PAGE_SIZE};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT_LANGUAGE, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

pub const DEFAULT_SERVICE: &str = "https://bsky.social";

/// Account used to open an authenticated session with the feed service
#[derive(Clone)]
pub struct BlueskyCredentials {
    pub identifier: String,
    pub password: String,
}

impl fmt::Debug for BlueskyCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlueskyCredentials")
            .field("identifier", &self.identifier)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    access_jwt: String,
    #[serde(default)]
    handle: Option<String>,
}

/// Body of `app.bsky.feed.getFeed`
#[derive(Debug, Deserialize)]
pub struct FeedResponse {
    #[serde(default)]
    pub feed: Vec<FeedViewPost>,
    #[serde(default)]
    pub cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedViewPost {
    pub post: PostView,
}

#[derive(Debug, Deserialize)]
pub struct PostView {
    #[serde(default)]
    pub record: PostRecord,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostRecord {
    #[serde(default)]
    pub text: Option<String>,
}

impl From<FeedResponse> for Page {
    fn from(response: FeedResponse) -> Self {
        let entries_received = response.feed.len();
        let documents = response
            .feed
            .into_iter()
            .filter_map(|entry| entry.post.record.text)
            .filter_map(Document::new)
            .collect();

        Page::new(documents, Cursor::from_source(response.cursor))
            .with_entries_received(entries_received)
    }
}

/// Feed source backed by the Bluesky XRPC API
pub struct BlueskyFeedSource {
    service: String,
    credentials: BlueskyCredentials,
    accept_language: Option<String>,
    fetcher: Fetcher,
    session: RwLock<Option<String>>,
}

impl BlueskyFeedSource {
    pub fn new(service: impl Into<String>, credentials: BlueskyCredentials, fetch_config: FetchConfig) -> Result<Self> {
        Ok(Self {
            service: service.into().trim_end_matches('/').to_string(),
            credentials,
            accept_language: None,
            fetcher: Fetcher::new(fetch_config)?,
            session: RwLock::new(None),
        })
    }

    pub fn with_accept_language(mut self, accept_language: Option<String>) -> Self {
        self.accept_language = accept_language.filter(|l| !l.trim().is_empty());
        self
    }

    fn xrpc_url(&self, method: &str) -> String {
        format!("{}/xrpc/{}", self.service, method)
    }

    async fn access_token(&self, feed: &str) -> Result<String> {
        if let Some(token) = self.session.read().await.as_ref() {
            return Ok(token.clone());
        }

        let mut session = self.session.write().await;
        if let Some(token) = session.as_ref() {
            return Ok(token.clone());
        }

        info!("Creating session for {}", self.credentials.identifier);
        let request = CreateSessionRequest {
            identifier: &self.credentials.identifier,
            password: &self.credentials.password,
        };
        let response: CreateSessionResponse = self
            .fetcher
            .post_json(&self.xrpc_url("com.atproto.server.createSession"), &request, HeaderMap::new())
            .await
            .map_err(|e| FeedClassifierError::source_unavailable(feed, format!("login failed: {}", e)))?;

        debug!("Session created for {}", response.handle.as_deref().unwrap_or("unknown handle"));
        *session = Some(response.access_jwt.clone());
        Ok(response.access_jwt)
    }

    fn request_headers(&self, token: &str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token))
            .map_err(|e| FeedClassifierError::Config(format!("Invalid access token: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);

        if let Some(language) = &self.accept_language {
            let value = HeaderValue::from_str(language)
                .map_err(|e| FeedClassifierError::Config(format!("Invalid Accept-Language '{}': {}", language, e)))?;
            headers.insert(ACCEPT_LANGUAGE, value);
        }

        Ok(headers)
    }

    async fn get_feed(&self, feed: &str, cursor: Option<&Cursor>, limit: usize) -> Result<FeedResponse> {
        let token = self.access_token(feed).await?;
        let mut query = vec![("feed", feed.to_string()), ("limit", limit.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.as_str().to_string()));
        }

        self.fetcher
            .get_json(&self.xrpc_url("app.bsky.feed.getFeed"), &query, self.request_headers(&token)?)
            .await
    }
}

#[async_trait]
impl FeedSource for BlueskyFeedSource {
    fn source_name(&self) -> String {
        match url::Url::parse(&self.service).ok().and_then(|u| u.domain().map(str::to_string)) {
            Some(domain) => format!("Bluesky ({})", domain),
            None => "Bluesky".to_string(),
        }
    }

    async fn fetch_page(&self, feed: &str, cursor: Option<&Cursor>, page_size: usize) -> Result<Page> {
        let limit = page_size.clamp(1, MAX_PAGE_SIZE);

        let response = match self.get_feed(feed, cursor, limit).await {
            Err(FeedClassifierError::HttpStatus { status: 401, .. }) => {
                warn!("Session rejected while fetching {}, logging in again", feed);
                self.session.write().await.take();
                self.get_feed(feed, cursor, limit).await
            }
            other => other,
        }
        .map_err(|e| match e {
            e @ FeedClassifierError::SourceUnavailable { .. } => e,
            e => FeedClassifierError::source_unavailable(feed, e),
        })?;

        let page = Page::from(response);
        debug!(
            "Fetched {} entries ({} with text) from {}",
            page.entries_received,
            page.documents.len(),
            feed
        );
        Ok(page)
    }
}
