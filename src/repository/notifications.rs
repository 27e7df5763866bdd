use crate::error::DataResult;
use crate::models::{NotificationQueueEntry, QueueStatus};

use super::{BaseRepository, ModelFilter};

pub type NotificationRepository = BaseRepository<NotificationQueueEntry>;

impl BaseRepository<NotificationQueueEntry> {
    pub async fn list_by_status(&self, status: QueueStatus) -> DataResult<Vec<NotificationQueueEntry>> {
        let filter = ModelFilter::eq("status", status.as_str());
        let mut entries = self.list_all(Some(&filter)).await?;
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(entries)
    }

    /// Oldest pending entries first.
    pub async fn list_pending(&self, limit: usize) -> DataResult<Vec<NotificationQueueEntry>> {
        let mut entries = self.list_by_status(QueueStatus::Pending).await?;
        entries.truncate(limit);
        Ok(entries)
    }
}
