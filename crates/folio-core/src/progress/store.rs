use super::{ProgressBackend, ProgressUpdate, ReadingProgress, clamp_percent};
use crate::BookId;
use crate::error::BackendError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::fs;
use tracing::debug;

/// One JSON record per book under `<data_dir>/progress/`.
#[derive(Debug, Clone)]
pub struct FileProgressStore {
    root: PathBuf,
}

impl FileProgressStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            root: data_dir.as_ref().join("progress"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, book_id: BookId) -> PathBuf {
        self.root.join(format!("{book_id}.json"))
    }
}

#[async_trait]
impl ProgressBackend for FileProgressStore {
    async fn get_reading_progress(
        &self,
        book_id: BookId,
    ) -> Result<Option<ReadingProgress>, BackendError> {
        let data = match fs::read(self.record_path(book_id)).await {
            Ok(data) => data,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let progress = serde_json::from_slice::<ReadingProgress>(&data)?;
        if progress.book_id != book_id {
            return Err(BackendError::Database(format!(
                "progress record for book {book_id} belongs to book {}",
                progress.book_id
            )));
        }
        Ok(Some(progress))
    }

    async fn save_reading_progress(
        &self,
        book_id: BookId,
        update: &ProgressUpdate,
    ) -> Result<ReadingProgress, BackendError> {
        let total_pages = update.total_pages;
        let current_page = match (update.current_page, total_pages) {
            (Some(page), Some(total)) if total > 0 => Some(page.min(total - 1)),
            (page, _) => page,
        };
        let record = ReadingProgress {
            book_id,
            location: update.location.clone(),
            percent: clamp_percent(update.percent),
            current_page,
            total_pages,
            updated_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_secs())
                .unwrap_or(0),
        };

        fs::create_dir_all(&self.root).await?;
        let path = self.record_path(book_id);
        let tmp = path.with_extension("json.tmp");
        let encoded = serde_json::to_vec_pretty(&record)?;
        fs::write(&tmp, encoded).await?;
        fs::rename(&tmp, &path).await?;
        debug!(book_id, path = %path.display(), "Wrote progress record");
        Ok(record)
    }
}
