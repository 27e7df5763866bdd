use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::DataResult;
use crate::graphql::GraphQlClient;
use crate::models::{NotificationPatch, NotificationQueueEntry, QueueStatus};
use crate::notify::{NotificationSender, OutboundMessage, SendError, TemplateRegistry};
use crate::repository::notifications::NotificationRepository;
use crate::repository::QueryCache;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Sent,
    Retry { error: String },
    Failed { error: String },
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchSettings {
    pub max_retries: u32,
    pub batch_size: usize,
    pub poll_interval: Duration,
}

impl DispatchSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_retries: config.notification_max_retries,
            batch_size: config.notification_batch_size as usize,
            poll_interval: config.poll_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickSummary {
    pub sent: usize,
    pub retried: usize,
    pub failed: usize,
    /// Delivered or failed, but the status write did not land.
    pub unrecorded: usize,
}

impl TickSummary {
    pub fn processed(&self) -> usize {
        self.sent + self.retried + self.failed + self.unrecorded
    }
}

/// Drains pending queue entries. Reads always go to the backend: the worker
/// owns an uncached repository because rows change underneath it.
pub struct DispatchWorker {
    repository: NotificationRepository,
    templates: Arc<TemplateRegistry>,
    sender: Arc<dyn NotificationSender>,
    settings: DispatchSettings,
}

impl DispatchWorker {
    pub fn new(
        client: GraphQlClient,
        templates: Arc<TemplateRegistry>,
        sender: Arc<dyn NotificationSender>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            repository: NotificationRepository::new(client, Arc::new(QueryCache::disabled())),
            templates,
            sender,
            settings,
        }
    }

    pub async fn run(&self) {
        info!(
            batch_size = self.settings.batch_size,
            max_retries = self.settings.max_retries,
            "dispatch worker started"
        );
        loop {
            match self.tick().await {
                Ok(summary) if self.drained_full_batch(&summary) => {}
                Ok(_) => sleep(self.settings.poll_interval).await,
                Err(err) => {
                    error!(error = %err, "dispatch tick failed");
                    sleep(self.settings.poll_interval).await;
                }
            }
        }
    }

    /// A full batch that left nothing to retry means more rows are likely
    /// waiting, so the next tick starts without sleeping. Retried entries
    /// always wait out the poll interval.
    fn drained_full_batch(&self, summary: &TickSummary) -> bool {
        self.settings.batch_size > 0 && summary.sent + summary.failed >= self.settings.batch_size
    }

    pub async fn tick(&self) -> DataResult<TickSummary> {
        let entries = self.repository.list_pending(self.settings.batch_size).await?;
        let mut summary = TickSummary::default();
        for entry in entries {
            let outcome = self.deliver(&entry).await;
            match self.record(&entry, outcome).await {
                Ok(QueueStatus::Sent) => summary.sent += 1,
                Ok(QueueStatus::Pending) => summary.retried += 1,
                Ok(QueueStatus::Failed) => summary.failed += 1,
                Err(err) => {
                    error!(
                        entry_id = %entry.id,
                        channel = %entry.channel,
                        error = %err,
                        operator_review = true,
                        "failed to record notification outcome"
                    );
                    summary.unrecorded += 1;
                }
            }
        }
        if summary.processed() > 0 {
            info!(
                sent = summary.sent,
                retried = summary.retried,
                failed = summary.failed,
                unrecorded = summary.unrecorded,
                "dispatch batch processed"
            );
        }
        Ok(summary)
    }

    pub async fn deliver(&self, entry: &NotificationQueueEntry) -> DeliveryOutcome {
        let rendered = match self
            .templates
            .render(&entry.template_id, entry.channel, &entry.payload)
        {
            Some(rendered) => rendered,
            None => {
                return DeliveryOutcome::Failed {
                    error: format!("unknown template {}", entry.template_id),
                }
            }
        };
        let message = OutboundMessage {
            channel: entry.channel,
            recipient: entry.recipient.clone(),
            subject: rendered.subject,
            body: rendered.body,
        };
        match self.sender.send(&message).await {
            Ok(()) => DeliveryOutcome::Sent,
            Err(SendError::Transient(error)) => DeliveryOutcome::Retry { error },
            Err(SendError::Permanent(error)) => DeliveryOutcome::Failed { error },
        }
    }

    async fn record(
        &self,
        entry: &NotificationQueueEntry,
        outcome: DeliveryOutcome,
    ) -> DataResult<QueueStatus> {
        let patch = match outcome {
            DeliveryOutcome::Sent => {
                info!(entry_id = %entry.id, channel = %entry.channel, "notification sent");
                NotificationPatch {
                    status: Some(QueueStatus::Sent),
                    sent_at: Some(Utc::now()),
                    ..NotificationPatch::default()
                }
            }
            DeliveryOutcome::Retry { error } => {
                let retry_count = entry.retry_count + 1;
                if retry_count >= self.settings.max_retries {
                    error!(
                        entry_id = %entry.id,
                        channel = %entry.channel,
                        retry_count,
                        %error,
                        operator_review = true,
                        "notification exhausted its retries"
                    );
                    NotificationPatch {
                        status: Some(QueueStatus::Failed),
                        retry_count: Some(retry_count),
                        last_error: Some(error),
                        ..NotificationPatch::default()
                    }
                } else {
                    warn!(entry_id = %entry.id, retry_count, %error, "notification will retry");
                    NotificationPatch {
                        retry_count: Some(retry_count),
                        last_error: Some(error),
                        ..NotificationPatch::default()
                    }
                }
            }
            DeliveryOutcome::Failed { error } => {
                error!(
                    entry_id = %entry.id,
                    channel = %entry.channel,
                    %error,
                    operator_review = true,
                    "notification failed permanently"
                );
                NotificationPatch {
                    status: Some(QueueStatus::Failed),
                    last_error: Some(error),
                    ..NotificationPatch::default()
                }
            }
        };
        let status = patch.status.unwrap_or(QueueStatus::Pending);
        self.repository.update(&entry.id, &patch).await?;
        Ok(status)
    }
}
