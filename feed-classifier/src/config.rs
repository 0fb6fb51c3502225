use crate::llm_adapter::DEFAULT_BASE_URL;
use crate::sources::bluesky_feed::DEFAULT_SERVICE;
use crate::types::{FeedClassifierError, FetchConfig, Result, MAX_PAGE_SIZE};
use clap::Parser;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Download posts from Bluesky feeds and sort them into Yes/No folders with an LLM
#[derive(Parser, Clone)]
#[command(name = "feed-classifier", version, about)]
pub struct AppConfig {
    #[arg(long, env = "BLUESKY_USERNAME")]
    pub bluesky_username: String,

    #[arg(long, env = "BLUESKY_PASSWORD", hide_env_values = true)]
    pub bluesky_password: String,

    #[arg(long, env = "BLUESKY_SERVICE", default_value = DEFAULT_SERVICE)]
    pub bluesky_service: String,

    /// Feed URIs, comma separated
    #[arg(long, env = "BLUESKY_FEED", value_delimiter = ',', required = true)]
    pub feeds: Vec<String>,

    /// Sent as Accept-Language on feed requests
    #[arg(long, env = "BLUESKY_ACCEPTLANGUAGE")]
    pub accept_language: Option<String>,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: String,

    #[arg(long, env = "OPENAI_CLASSIFICATION_MODEL", default_value = "gpt-4o-mini")]
    pub model: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub openai_base_url: String,

    /// Topic the oracle is asked about
    #[arg(long, env = "CLASSIFICATION_CATEGORY")]
    pub category: String,

    /// Download budget per feed
    #[arg(long, env = "POSTS_TO_DOWNLOAD", default_value_t = 100)]
    pub posts_to_download: i64,

    #[arg(long, env = "PAGE_SIZE", default_value_t = MAX_PAGE_SIZE)]
    pub page_size: usize,

    /// Minimum delay between two classification calls
    #[arg(long, env = "PACING_MS", default_value_t = 500)]
    pub pacing_ms: u64,

    #[arg(long, env = "OUTPUT_DIR", default_value = "output")]
    pub output_dir: PathBuf,

    #[arg(long, env = "HTTP_TIMEOUT_SECONDS", default_value_t = 30)]
    pub timeout_seconds: u64,

    #[arg(long, env = "HTTP_MAX_RETRIES", default_value_t = 2)]
    pub max_retries: u32,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("bluesky_username", &self.bluesky_username)
            .field("bluesky_password", &"***")
            .field("bluesky_service", &self.bluesky_service)
            .field("feeds", &self.feeds)
            .field("accept_language", &self.accept_language)
            .field("openai_api_key", &"***")
            .field("model", &self.model)
            .field("openai_base_url", &self.openai_base_url)
            .field("category", &self.category)
            .field("posts_to_download", &self.posts_to_download)
            .field("page_size", &self.page_size)
            .field("pacing_ms", &self.pacing_ms)
            .field("output_dir", &self.output_dir)
            .field("timeout_seconds", &self.timeout_seconds)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

impl AppConfig {
    /// Trims feed handles, drops empty ones and checks the remaining settings
    pub fn validate(mut self) -> Result<Self> {
        self.feeds = self
            .feeds
            .iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();

        if self.feeds.is_empty() {
            return Err(FeedClassifierError::Config("at least one feed is required".to_string()));
        }
        if self.category.trim().is_empty() {
            return Err(FeedClassifierError::Config("classification category is empty".to_string()));
        }
        if self.page_size == 0 {
            return Err(FeedClassifierError::Config("page size must be at least 1".to_string()));
        }
        check_http_url("BLUESKY_SERVICE", &self.bluesky_service)?;
        check_http_url("OPENAI_BASE_URL", &self.openai_base_url)?;

        Ok(self)
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            timeout_seconds: self.timeout_seconds,
            max_retries: self.max_retries,
            ..FetchConfig::default()
        }
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }

    pub fn effective_page_size(&self) -> usize {
        self.page_size.min(MAX_PAGE_SIZE)
    }
}

fn check_http_url(name: &str, value: &str) -> Result<()> {
    let url = Url::parse(value)?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(FeedClassifierError::Config(format!(
            "{} must be an http(s) URL, got scheme '{}'",
            name, scheme
        ))),
    }
}
