use crate::fetcher::Fetcher;
use crate::traits::Classifier;
use crate::types::{FeedClassifierError, FetchConfig, Label, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Mutex;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Enough room for a one-word answer
const MAX_REPLY_TOKENS: u32 = 3;

/// Builds the single-turn instruction sent to the oracle for one text
pub fn build_prompt(category: &str, text: &str) -> String {
    format!(
        "Your task is to classify whether a given text is related to the topic of {category}.\n\
         The text can be written in either Polish or English, so make sure to analyze it regardless of the language. \
         Here is the text for evaluation:\n\
         {text}\n\
         Your response should be either Yes or No."
    )
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
pub struct ChatChoice {
    pub message: Option<ChatReply>,
}

#[derive(Debug, Deserialize)]
pub struct ChatReply {
    pub content: Option<String>,
}

impl ChatCompletionResponse {
    /// A response without choices or content is ambiguous and counts as negative
    pub fn label(&self) -> Label {
        self.choices
            .first()
            .and_then(|choice| choice.message.as_ref())
            .and_then(|message| message.content.as_deref())
            .map(Label::from_reply)
            .unwrap_or(Label::No)
    }
}

/// Classifier backed by an OpenAI-compatible chat completions endpoint
pub struct OpenAiClassifier {
    fetcher: Fetcher,
    base_url: String,
    api_key: String,
    model: String,
    category: String,
}

impl fmt::Debug for OpenAiClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiClassifier")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("category", &self.category)
            .finish()
    }
}

impl OpenAiClassifier {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        category: impl Into<String>,
        fetch_config: FetchConfig,
    ) -> Result<Self> {
        Ok(Self {
            fetcher: Fetcher::new(fetch_config)?,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            model: model.into(),
            category: category.into(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", self.api_key))
            .map_err(|e| FeedClassifierError::Config(format!("Invalid API key: {}", e)))?;
        headers.insert(AUTHORIZATION, bearer);
        Ok(headers)
    }
}

#[async_trait]
impl Classifier for OpenAiClassifier {
    fn classifier_name(&self) -> String {
        format!("OpenAI ({})", self.model)
    }

    async fn classify(&self, text: &str) -> Result<Label> {
        let prompt = build_prompt(&self.category, text);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
            max_tokens: MAX_REPLY_TOKENS,
            temperature: 0.0,
        };

        let response: ChatCompletionResponse = self
            .fetcher
            .post_json(&format!("{}/chat/completions", self.base_url), &request, self.headers()?)
            .await
            .map_err(|e| FeedClassifierError::OracleUnavailable(e.to_string()))?;

        let label = response.label();
        debug!("Oracle labelled text as {}", label);
        Ok(label)
    }
}

/// Scripted classifier for development and testing
pub struct MockClassifier {
    name: String,
    replies: HashMap<String, String>,
    default_reply: String,
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl MockClassifier {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            replies: HashMap::new(),
            default_reply: Label::No.as_str().to_string(),
            failing: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Raw reply the oracle gives for `text`; normalized like a real reply
    pub fn with_reply(mut self, text: impl Into<String>, reply: impl Into<String>) -> Self {
        self.replies.insert(text.into(), reply.into());
        self
    }

    pub fn with_default_reply(mut self, reply: impl Into<String>) -> Self {
        self.default_reply = reply.into();
        self
    }

    /// Make the oracle unavailable for `text`
    pub fn failing_on(mut self, text: impl Into<String>) -> Self {
        self.failing.insert(text.into());
        self
    }

    /// Texts in the order they were submitted
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl Classifier for MockClassifier {
    fn classifier_name(&self) -> String {
        format!("Mock Classifier ({})", self.name)
    }

    async fn classify(&self, text: &str) -> Result<Label> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(text.to_string());
        }

        if self.failing.contains(text) {
            return Err(FeedClassifierError::OracleUnavailable(format!(
                "scripted failure for {}",
                self.name
            )));
        }

        let reply = self.replies.get(text).unwrap_or(&self.default_reply);
        Ok(Label::from_reply(reply))
    }
}
