use clap::Parser;
use feed_classifier::llm_adapter::ChatCompletionResponse;
use feed_classifier::sources::bluesky_feed::FeedResponse;
use feed_classifier::{
    build_prompt, AppConfig, BlueskyCredentials, BlueskyFeedSource, Classifier, FeedClassifierError, FeedSource,
    FetchConfig, Label, MockClassifier, OpenAiClassifier, Page,
};
use tokio_test::{assert_err, assert_ok};

#[test]
fn test_label_normalization() {
    assert_eq!(Label::from_reply("Yes"), Label::Yes);
    assert_eq!(Label::from_reply("  Yes\n"), Label::Yes);

    for reply in ["", "No", "yes", "YES", "Yes.", "Yes, it is", "Maybe", "{\"label\": \"Yes\"}", "Y e s"] {
        assert_eq!(Label::from_reply(reply), Label::No, "reply {:?}", reply);
    }
}

#[test]
fn test_label_partitions() {
    assert_eq!(Label::ALL.map(|l| l.as_str()), ["Yes", "No"]);
    assert_eq!(Label::Yes.to_string(), "Yes");
}

#[test]
fn test_prompt_embeds_category_and_text() {
    let prompt = build_prompt("climate change", "Glaciers are melting faster than expected");

    assert!(prompt.contains("related to the topic of climate change"));
    assert!(prompt.contains("Glaciers are melting faster than expected"));
    assert!(prompt.contains("Polish or English"));
    assert!(prompt.ends_with("Your response should be either Yes or No."));
}

#[test]
fn test_chat_response_label_extraction() {
    let positive: ChatCompletionResponse =
        serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":"Yes"}}]}"#).unwrap();
    assert_eq!(positive.label(), Label::Yes);

    let lowercase: ChatCompletionResponse =
        serde_json::from_str(r#"{"choices":[{"message":{"content":"yes"}}]}"#).unwrap();
    assert_eq!(lowercase.label(), Label::No);

    let no_content: ChatCompletionResponse =
        serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
    assert_eq!(no_content.label(), Label::No);

    let no_choices: ChatCompletionResponse = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
    assert_eq!(no_choices.label(), Label::No);
}

#[test]
fn test_feed_response_to_page() {
    let body = r#"{
        "cursor": "abc123",
        "feed": [
            {"post": {"uri": "at://1", "record": {"$type": "app.bsky.feed.post", "text": "first post"}}},
            {"post": {"uri": "at://2", "record": {"$type": "app.bsky.feed.post"}}},
            {"post": {"uri": "at://3", "record": {"text": "   "}}},
            {"post": {"uri": "at://4", "record": {"text": "second post"}}}
        ]
    }"#;
    let response: FeedResponse = serde_json::from_str(body).unwrap();

    let page = Page::from(response);

    let texts: Vec<&str> = page.documents.iter().map(|d| d.text()).collect();
    assert_eq!(texts, vec!["first post", "second post"]);
    assert_eq!(page.entries_received, 4);
    assert_eq!(page.next_cursor.as_ref().map(|c| c.as_str()), Some("abc123"));
}

#[test]
fn test_feed_response_without_cursor_is_last_page() {
    let missing: FeedResponse = serde_json::from_str(r#"{"feed": []}"#).unwrap();
    let missing = Page::from(missing);
    assert!(missing.is_last());
    assert!(missing.documents.is_empty());

    let empty: FeedResponse = serde_json::from_str(r#"{"feed": [], "cursor": ""}"#).unwrap();
    assert!(Page::from(empty).is_last());
}

#[tokio::test]
async fn test_mock_classifier_normalizes_replies() {
    let classifier = MockClassifier::new("script")
        .with_reply("on topic", "Yes")
        .with_reply("shouting", "YES")
        .failing_on("broken");

    assert_eq!(classifier.classify("on topic").await.unwrap(), Label::Yes);
    assert_eq!(classifier.classify("shouting").await.unwrap(), Label::No);
    assert_eq!(classifier.classify("unknown").await.unwrap(), Label::No);
    assert!(matches!(
        classifier.classify("broken").await,
        Err(FeedClassifierError::OracleUnavailable(_))
    ));
    assert_eq!(classifier.calls(), vec!["on topic", "shouting", "unknown", "broken"]);
}

fn unreachable_fetch_config() -> FetchConfig {
    FetchConfig {
        timeout_seconds: 2,
        max_retries: 0,
        ..FetchConfig::default()
    }
}

#[tokio::test]
async fn test_unreachable_oracle_is_oracle_unavailable() {
    let classifier = OpenAiClassifier::new("sk-test", "test-model", "anything", unreachable_fetch_config())
        .unwrap()
        .with_base_url("http://127.0.0.1:9/v1");

    let result = classifier.classify("some text").await;

    assert!(matches!(result, Err(FeedClassifierError::OracleUnavailable(_))), "{:?}", result);
}

#[tokio::test]
async fn test_unreachable_feed_is_source_unavailable() {
    let source = BlueskyFeedSource::new(
        "http://127.0.0.1:9",
        BlueskyCredentials {
            identifier: "someone.bsky.social".to_string(),
            password: "app-password".to_string(),
        },
        unreachable_fetch_config(),
    )
    .unwrap()
    .with_accept_language(Some("pl,en".to_string()));

    let result = source.fetch_page("at://did:plc:x/app.bsky.feed.generator/y", None, 100).await;

    match result {
        Err(FeedClassifierError::SourceUnavailable { feed, .. }) => {
            assert_eq!(feed, "at://did:plc:x/app.bsky.feed.generator/y")
        }
        other => panic!("expected SourceUnavailable, got {:?}", other.map(|p| p.documents.len())),
    }
}

#[test]
fn test_credentials_debug_hides_password() {
    let credentials = BlueskyCredentials {
        identifier: "someone".to_string(),
        password: "hunter2".to_string(),
    };
    let debug = format!("{:?}", credentials);
    assert!(debug.contains("someone"));
    assert!(!debug.contains("hunter2"));
}

fn args_with<'a>(overrides: &[(&'a str, &'a str)]) -> Vec<String> {
    let mut options: Vec<(&'a str, &'a str)> = vec![
        ("--bluesky-username", "someone.bsky.social"),
        ("--bluesky-password", "secret-password"),
        ("--openai-api-key", "sk-secret"),
        ("--category", "sports"),
        ("--feeds", "at://feed/one, at://feed/two,,"),
    ];
    for &(flag, value) in overrides {
        match options.iter_mut().find(|option| option.0 == flag) {
            Some(option) => option.1 = value,
            None => options.push((flag, value)),
        }
    }

    let mut args = vec!["feed-classifier".to_string()];
    for (flag, value) in options {
        args.push(flag.to_string());
        args.push(value.to_string());
    }
    args
}

#[test]
fn test_config_parses_and_validates() {
    let config = assert_ok!(AppConfig::try_parse_from(args_with(&[])));
    let config = assert_ok!(config.validate());

    assert_eq!(config.feeds, vec!["at://feed/one", "at://feed/two"]);
    assert_eq!(config.effective_page_size(), 100);
    assert_eq!(config.pacing().as_millis(), 500);
    assert_eq!(config.fetch_config().timeout_seconds, 30);

    let debug = format!("{:?}", config);
    assert!(!debug.contains("secret-password"));
    assert!(!debug.contains("sk-secret"));
}

#[test]
fn test_config_caps_page_size() {
    let config = AppConfig::try_parse_from(args_with(&[("--page-size", "500")]))
        .unwrap()
        .validate()
        .unwrap();

    assert_eq!(config.effective_page_size(), 100);
}

#[test]
fn test_config_rejects_bad_values() {
    for overrides in [
        [("--page-size", "0")],
        [("--category", "  ")],
        [("--openai-base-url", "ftp://example.com")],
        [("--feeds", " , ")],
    ] {
        let config = AppConfig::try_parse_from(args_with(&overrides)).unwrap();
        assert_err!(config.validate());
    }
}
