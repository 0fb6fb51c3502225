use crate::collector::DocumentSet;
use crate::store::FsCategoryStore;
use crate::traits::{Classifier, DocumentStore};
use crate::types::{Document, Label, StoredItem};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Spacing the oracle tolerates between two classification calls
pub const DEFAULT_PACING: Duration = Duration::from_millis(500);

/// Minimum-interval gate between consecutive oracle calls
#[derive(Debug, Clone)]
pub struct Pacer {
    interval: Duration,
    last_pass: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_pass: None,
        }
    }

    /// A gate that never waits
    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Returns once `interval` has elapsed since the previous pass. The first pass is immediate.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_pass {
            let ready_at = last + self.interval;
            if Instant::now() < ready_at {
                tokio::time::sleep_until(ready_at).await;
            }
        }
        self.last_pass = Some(Instant::now());
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(DEFAULT_PACING)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Classification,
    Persistence,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureReason {
    pub stage: FailureStage,
    pub message: String,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.stage {
            FailureStage::Classification => write!(f, "classification failed: {}", self.message),
            FailureStage::Persistence => write!(f, "persistence failed: {}", self.message),
        }
    }
}

/// Terminal state of one document
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Stored(StoredItem),
    Failed(FailureReason),
}

impl ItemOutcome {
    pub fn is_stored(&self) -> bool {
        matches!(self, ItemOutcome::Stored(_))
    }

    pub fn label(&self) -> Option<Label> {
        match self {
            ItemOutcome::Stored(item) => Some(item.label),
            ItemOutcome::Failed(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ProcessedItem {
    pub index: usize,
    pub document: Document,
    pub outcome: ItemOutcome,
}

/// Per-item outcomes of one run, in processing order
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub items: Vec<ProcessedItem>,
}

impl RunReport {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn stored_count(&self) -> usize {
        self.items.iter().filter(|i| i.outcome.is_stored()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.len() - self.stored_count()
    }

    pub fn stored_in(&self, label: Label) -> usize {
        self.items
            .iter()
            .filter(|i| i.outcome.label() == Some(label))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&Document, &FailureReason)> {
        self.items.iter().filter_map(|i| match &i.outcome {
            ItemOutcome::Failed(reason) => Some((&i.document, reason)),
            ItemOutcome::Stored(_) => None,
        })
    }

    /// Tallies each partition after a run. The run already finished, so a
    /// partition that cannot be read is logged and reported without a count.
    pub async fn partition_summaries(&self, store: &FsCategoryStore) -> Vec<PartitionSummary> {
        let mut summaries = Vec::with_capacity(Label::ALL.len());
        for label in Label::ALL {
            let on_disk = match store.count(label).await {
                Ok(count) => Some(count),
                Err(e) => {
                    warn!("Could not count files for {}: {}", label, e);
                    None
                }
            };
            summaries.push(PartitionSummary {
                label,
                stored_this_run: self.stored_in(label),
                on_disk,
                partition: store.partition(label),
            });
        }
        summaries
    }
}

#[derive(Debug, Clone)]
pub struct PartitionSummary {
    pub label: Label,
    pub stored_this_run: usize,
    /// `None` when the partition could not be read
    pub on_disk: Option<usize>,
    pub partition: PathBuf,
}

/// Classifies documents one at a time and hands each result to the store.
/// A failing item is recorded and skipped; the run always reaches the end.
pub struct ClassificationPipeline {
    classifier: Arc<dyn Classifier>,
    store: Arc<dyn DocumentStore>,
    pacer: Pacer,
}

impl ClassificationPipeline {
    pub fn new(classifier: Arc<dyn Classifier>, store: Arc<dyn DocumentStore>) -> Self {
        Self {
            classifier,
            store,
            pacer: Pacer::default(),
        }
    }

    pub fn with_pacer(mut self, pacer: Pacer) -> Self {
        self.pacer = pacer;
        self
    }

    pub async fn run(&mut self, documents: DocumentSet) -> RunReport {
        let total = documents.len();
        info!(
            "Classifying {} documents with {} (pacing {:?})",
            total,
            self.classifier.classifier_name(),
            self.pacer.interval()
        );

        let mut report = RunReport::default();
        for (index, document) in documents.into_iter().enumerate() {
            self.pacer.wait().await;
            info!(
                "Processing texts: {}/{} ({:.0}%)",
                index + 1,
                total,
                (index as f64 / total as f64) * 100.0
            );

            let outcome = self.process(index, &document).await;
            if let ItemOutcome::Failed(reason) = &outcome {
                warn!("Processing error \"{}\": {}", document, reason);
            }
            report.items.push(ProcessedItem {
                index,
                document,
                outcome,
            });
        }

        info!(
            "Process completed: {} stored ({} {}, {} {}), {} failed",
            report.stored_count(),
            report.stored_in(Label::Yes),
            Label::Yes,
            report.stored_in(Label::No),
            Label::No,
            report.failed_count()
        );
        report
    }

    async fn process(&self, index: usize, document: &Document) -> ItemOutcome {
        debug!("Classification of text: \"{}\"", document);
        let label = match self.classifier.classify(document.text()).await {
            Ok(label) => label,
            Err(e) => {
                return ItemOutcome::Failed(FailureReason {
                    stage: FailureStage::Classification,
                    message: e.to_string(),
                })
            }
        };
        debug!("Class: {}", label);

        match self.store.store(document.text(), label, index).await {
            Ok(item) => ItemOutcome::Stored(item),
            Err(e) => ItemOutcome::Failed(FailureReason {
                stage: FailureStage::Persistence,
                message: e.to_string(),
            }),
        }
    }
}
