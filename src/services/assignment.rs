use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde_json::json;
use tracing::{error, info, warn};

use crate::error::DataResult;
use crate::models::{AccountExecutive, Request};
use crate::repository::assignees::AssigneeRepository;

use super::notifications::NotificationService;
use super::requests::RequestService;

#[derive(Clone, Debug, PartialEq)]
pub enum Assignee {
    Executive(AccountExecutive),
    /// No active, non-placeholder executive was available.
    Unassigned,
}

impl Assignee {
    pub fn executive(&self) -> Option<&AccountExecutive> {
        match self {
            Assignee::Executive(ae) => Some(ae),
            Assignee::Unassigned => None,
        }
    }
}

/// Round-robin over the eligible pool. The cursor lives for the process and is
/// shared by every clone.
#[derive(Clone)]
pub struct AssignmentService {
    assignees: AssigneeRepository,
    requests: RequestService,
    notifications: NotificationService,
    cursor: Arc<AtomicUsize>,
}

impl AssignmentService {
    pub fn new(
        assignees: AssigneeRepository,
        requests: RequestService,
        notifications: NotificationService,
        cursor: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            assignees,
            requests,
            notifications,
            cursor,
        }
    }

    pub fn select_assignee(&self, pool: &[AccountExecutive]) -> Assignee {
        let mut eligible: Vec<&AccountExecutive> =
            pool.iter().filter(|ae| ae.is_assignable()).collect();
        if eligible.is_empty() {
            return Assignee::Unassigned;
        }
        eligible.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.id.cmp(&b.id)));
        let slot = self.cursor.fetch_add(1, Ordering::Relaxed) % eligible.len();
        Assignee::Executive(eligible[slot].clone())
    }

    pub async fn auto_assign(&self, request_id: &str) -> DataResult<Assignee> {
        let pool = self.assignees.list_pool().await?;
        match self.select_assignee(&pool) {
            Assignee::Executive(ae) => {
                self.requests.assign(request_id, &ae.id).await?;
                info!(request_id, assignee = %ae.name, "request auto-assigned");
                Ok(Assignee::Executive(ae))
            }
            Assignee::Unassigned => {
                warn!(
                    request_id,
                    pool_size = pool.len(),
                    "no assignable account executive, request left unassigned"
                );
                Ok(Assignee::Unassigned)
            }
        }
    }

    /// Manual assignment from the back office. The executive is told about it
    /// on the channels they opted into; a failed notice does not undo the
    /// assignment.
    pub async fn assign(&self, request_id: &str, ae_id: &str) -> DataResult<Request> {
        let request = self.requests.assign(request_id, ae_id).await?;
        let assignee = self.assignees.get(ae_id).await?;
        let property_address = match self.requests.details(request_id).await {
            Ok(details) => details.property.map(|p| p.property_full_address),
            Err(err) => {
                warn!(request_id, error = %err, "could not load request details for notice");
                None
            }
        };
        let payload = json!({
            "requestId": request.id,
            "assigneeName": assignee.name,
            "propertyAddress": property_address,
            "status": request.status.as_str(),
        });
        if let Err(err) = self.notifications.notify_assignment(&assignee, payload).await {
            error!(request_id, error = %err, "failed to queue assignment notice");
        }
        Ok(request)
    }
}
