use serde::Serialize;
use tokio::sync::broadcast;
use tracing::info;

use crate::models::{Channel, QuoteStatus, RequestStatus};

const EVENT_BUFFER: usize = 256;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BusinessEvent {
    Created {
        model: &'static str,
        id: String,
    },
    Updated {
        model: &'static str,
        id: String,
    },
    Deleted {
        model: &'static str,
        id: String,
    },
    RequestAssigned {
        request_id: String,
        assignee_id: String,
    },
    RequestStatusChanged {
        request_id: String,
        from: RequestStatus,
        to: RequestStatus,
    },
    QuoteStatusChanged {
        quote_id: String,
        from: QuoteStatus,
        to: QuoteStatus,
    },
    ProjectMilestoneAdded {
        project_id: String,
        order: i32,
    },
    ProjectCommentAdded {
        project_id: String,
    },
    NotificationQueued {
        entry_id: String,
        channel: Channel,
    },
}

#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<BusinessEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusinessEvent> {
        self.sender.subscribe()
    }

    /// Never fails the caller; having no subscribers is normal.
    pub fn emit(&self, event: BusinessEvent) {
        info!(event = ?event, "business event");
        let _ = self.sender.send(event);
    }
}
