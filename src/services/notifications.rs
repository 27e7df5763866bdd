use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::error::{DataError, DataResult, ValidationErrors};
use crate::events::{BusinessEvent, EventBus};
use crate::models::{
    new_id, AccountExecutive, Channel, NewNotification, NotificationPatch,
    NotificationQueueEntry, QueueStatus,
};
use crate::notify::templates::REQUEST_ASSIGNED;
use crate::notify::TemplateRegistry;
use crate::repository::notifications::NotificationRepository;
use crate::validation::{check_email, check_phone, require};

/// Fixed recipients that replace real ones outside production.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecipientOverride {
    pub email: String,
    pub phone: String,
}

#[derive(Clone, Debug, Default)]
pub struct NotificationSettings {
    pub debug_override: Option<RecipientOverride>,
    pub admin_email: Option<String>,
}

impl NotificationSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        let debug_override = if config.notification_debug_mode {
            match (&config.debug_email, &config.debug_phone) {
                (Some(email), Some(phone)) => Some(RecipientOverride {
                    email: email.clone(),
                    phone: phone.clone(),
                }),
                _ => None,
            }
        } else {
            None
        };
        Self {
            debug_override,
            admin_email: config.admin_notification_email.clone(),
        }
    }
}

#[derive(Clone)]
pub struct NotificationService {
    repository: NotificationRepository,
    events: EventBus,
    templates: Arc<TemplateRegistry>,
    settings: NotificationSettings,
}

impl NotificationService {
    pub fn new(
        repository: NotificationRepository,
        events: EventBus,
        templates: Arc<TemplateRegistry>,
        settings: NotificationSettings,
    ) -> Self {
        Self {
            repository,
            events,
            templates,
            settings,
        }
    }

    /// The address or number that will actually be contacted.
    pub fn resolve_recipient(&self, channel: Channel, recipient: &str) -> String {
        match (&self.settings.debug_override, channel) {
            (Some(debug), Channel::Email) => debug.email.clone(),
            (Some(debug), Channel::Sms) => debug.phone.clone(),
            (None, _) => recipient.trim().to_string(),
        }
    }

    /// Persists a pending entry. The stored recipient is the resolved one, so
    /// the queue row always shows who was really contacted.
    pub async fn queue(
        &self,
        channel: Channel,
        recipient: &str,
        template_id: &str,
        payload: Value,
    ) -> DataResult<String> {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "recipient", Some(recipient));
        match channel {
            Channel::Email => check_email(&mut errors, "recipient", Some(recipient)),
            Channel::Sms => check_phone(&mut errors, "recipient", Some(recipient)),
        }
        if !self.templates.contains(template_id) {
            errors.add("templateId", format!("unknown template {template_id}"));
        }
        errors.into_result()?;

        let resolved = self.resolve_recipient(channel, recipient);
        let redirected = resolved != recipient.trim();
        let entry = NewNotification {
            id: new_id(),
            channel,
            recipient: resolved,
            template_id: template_id.to_string(),
            payload,
            status: QueueStatus::Pending,
            retry_count: 0,
        };
        let stored = self.repository.create(&entry).await?;
        info!(
            entry_id = %stored.id,
            %channel,
            template_id,
            redirected,
            "notification queued"
        );
        self.events.emit(BusinessEvent::NotificationQueued {
            entry_id: stored.id.clone(),
            channel,
        });
        Ok(stored.id)
    }

    /// Queues a submission notice to the assigned executive on every channel
    /// they opted into, falling back to the admin address.
    pub async fn notify_submission(
        &self,
        template_id: &str,
        payload: Value,
        assignee: Option<&AccountExecutive>,
    ) -> DataResult<Vec<String>> {
        let mut ids = self.notify_executive(template_id, &payload, assignee).await?;
        if ids.is_empty() {
            match &self.settings.admin_email {
                Some(admin) => ids.push(self.queue(Channel::Email, admin, template_id, payload).await?),
                None => warn!(template_id, "no recipient for submission notification"),
            }
        }
        Ok(ids)
    }

    pub async fn notify_assignment(
        &self,
        assignee: &AccountExecutive,
        payload: Value,
    ) -> DataResult<Vec<String>> {
        self.notify_executive(REQUEST_ASSIGNED, &payload, Some(assignee))
            .await
    }

    pub async fn list_failed(&self) -> DataResult<Vec<NotificationQueueEntry>> {
        self.repository.list_by_status(QueueStatus::Failed).await
    }

    pub async fn list_pending(&self, limit: usize) -> DataResult<Vec<NotificationQueueEntry>> {
        self.repository.list_pending(limit).await
    }

    /// Operator action: gives a permanently failed entry a fresh retry budget.
    pub async fn requeue(&self, id: &str) -> DataResult<NotificationQueueEntry> {
        let entry = self.repository.get(id).await?;
        if entry.status != QueueStatus::Failed {
            return Err(DataError::invalid(
                "status",
                format!("only failed notifications can be requeued (entry is {})", entry.status.as_str()),
            ));
        }
        let patch = NotificationPatch {
            status: Some(QueueStatus::Pending),
            retry_count: Some(0),
            ..NotificationPatch::default()
        };
        let updated = self.repository.update(id, &patch).await?;
        info!(entry_id = id, "notification requeued by operator");
        Ok(updated)
    }

    async fn notify_executive(
        &self,
        template_id: &str,
        payload: &Value,
        assignee: Option<&AccountExecutive>,
    ) -> DataResult<Vec<String>> {
        let mut ids = Vec::new();
        let Some(assignee) = assignee else {
            return Ok(ids);
        };
        if assignee.send_email_notifications {
            if let Some(email) = assignee.email.as_deref().filter(|e| !e.trim().is_empty()) {
                ids.push(self.queue(Channel::Email, email, template_id, payload.clone()).await?);
            }
        }
        if assignee.send_sms_notifications {
            if let Some(mobile) = assignee.mobile.as_deref().filter(|m| !m.trim().is_empty()) {
                ids.push(self.queue(Channel::Sms, mobile, template_id, payload.clone()).await?);
            }
        }
        Ok(ids)
    }
}
