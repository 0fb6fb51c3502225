use crate::traits::DocumentStore;
use crate::types::{FeedClassifierError, Label, Result, StoredItem};
use async_trait::async_trait;
use chrono::Utc;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

/// Attempts at a fresh name before giving up on a colliding file
const MAX_NAME_ATTEMPTS: usize = 1024;

/// Writes each document as a UTF-8 text file under `<root>/<label>/`
#[derive(Debug, Clone)]
pub struct FsCategoryStore {
    root: PathBuf,
}

impl FsCategoryStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn partition(&self, label: Label) -> PathBuf {
        self.root.join(label.as_str())
    }

    /// Number of stored files in a partition; a missing partition counts as empty
    pub async fn count(&self, label: Label) -> Result<usize> {
        let dir = self.partition(label);
        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(source) => return Err(FeedClassifierError::Persistence { path: dir, source }),
        };

        let mut count = 0;
        loop {
            match entries.next_entry().await {
                Ok(Some(entry)) => {
                    if entry.path().extension().is_some_and(|ext| ext == "txt") {
                        count += 1;
                    }
                }
                Ok(None) => break,
                Err(source) => return Err(FeedClassifierError::Persistence { path: dir, source }),
            }
        }
        Ok(count)
    }

    fn file_name(millis: i64, sequence: usize, attempt: usize) -> String {
        if attempt == 0 {
            format!("text_{}_{:06}.txt", millis, sequence)
        } else {
            format!("text_{}_{:06}-{}.txt", millis, sequence, attempt)
        }
    }
}

/// Writes `text` through `writer` into the freshly created file at `path`.
/// On a failed write or flush the file is removed again, so a partition only
/// ever holds complete documents.
pub async fn write_or_discard<W>(path: &Path, mut writer: W, text: &str) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let written = async {
        writer.write_all(text.as_bytes()).await?;
        writer.flush().await
    }
    .await;

    if let Err(e) = written {
        drop(writer);
        match fs::remove_file(path).await {
            Ok(()) => {}
            Err(remove) if remove.kind() == ErrorKind::NotFound => {}
            Err(remove) => warn!("Could not remove partial file {}: {}", path.display(), remove),
        }
        return Err(e);
    }
    Ok(())
}

#[async_trait]
impl DocumentStore for FsCategoryStore {
    async fn store(&self, text: &str, label: Label, sequence: usize) -> Result<StoredItem> {
        let dir = self.partition(label);
        fs::create_dir_all(&dir)
            .await
            .map_err(|source| FeedClassifierError::Persistence { path: dir.clone(), source })?;

        let stored_at = Utc::now();
        let millis = stored_at.timestamp_millis();

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = dir.join(Self::file_name(millis, sequence, attempt));

            // create_new refuses to touch an existing file, so nothing is overwritten
            let file = match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(FeedClassifierError::Persistence { path, source }),
            };

            if let Err(source) = write_or_discard(&path, file, text).await {
                return Err(FeedClassifierError::Persistence { path, source });
            }

            info!("Saved file: {}", path.display());
            return Ok(StoredItem {
                label,
                path,
                sequence,
                stored_at,
            });
        }

        Err(FeedClassifierError::Persistence {
            path: dir.join(Self::file_name(millis, sequence, 0)),
            source: std::io::Error::new(ErrorKind::AlreadyExists, "no free file name in partition"),
        })
    }
}
