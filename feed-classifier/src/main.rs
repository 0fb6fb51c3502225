use anyhow::Context;
use clap::Parser;
use dotenv::dotenv;
use feed_classifier::{
    AppConfig, BlueskyCredentials, BlueskyFeedSource, ClassificationPipeline, Collector, FsCategoryStore,
    OpenAiClassifier, Pacer,
};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::parse().validate().context("Invalid configuration")?;
    info!("Starting feed classifier for {} feeds", config.feeds.len());

    let source = BlueskyFeedSource::new(
        config.bluesky_service.clone(),
        BlueskyCredentials {
            identifier: config.bluesky_username.clone(),
            password: config.bluesky_password.clone(),
        },
        config.fetch_config(),
    )?
    .with_accept_language(config.accept_language.clone());

    let collector = Collector::new(Arc::new(source), config.effective_page_size(), config.posts_to_download);
    let documents = match collector.collect(&config.feeds).await {
        Ok(documents) => documents,
        Err(e) => {
            error!("Ingestion failed, nothing was classified: {}", e);
            return Err(e).context("Failed to collect documents");
        }
    };

    let classifier = OpenAiClassifier::new(
        config.openai_api_key.clone(),
        config.model.clone(),
        config.category.clone(),
        config.fetch_config(),
    )?
    .with_base_url(config.openai_base_url.clone());
    let store = FsCategoryStore::new(config.output_dir.clone());

    let mut pipeline =
        ClassificationPipeline::new(Arc::new(classifier), Arc::new(store.clone())).with_pacer(Pacer::new(config.pacing()));
    let report = pipeline.run(documents).await;

    for summary in report.partition_summaries(&store).await {
        let on_disk = summary
            .on_disk
            .map_or_else(|| "unknown".to_string(), |count| count.to_string());
        info!(
            "  {}: {} stored this run, {} files in {}",
            summary.label,
            summary.stored_this_run,
            on_disk,
            summary.partition.display()
        );
    }
    if report.failed_count() > 0 {
        warn!("  {} documents could not be processed", report.failed_count());
    }

    info!("Feed classifier finished");
    Ok(())
}
