use std::sync::atomic::AtomicUsize;
use std::sync::Arc;

use serde::Serialize;

use crate::error::ValidationErrors;
use crate::events::EventBus;
use crate::notify::TemplateRegistry;
use crate::repository::Repositories;

pub mod assignment;
pub mod base;
pub mod contacts;
pub mod notifications;
pub mod projects;
pub mod properties;
pub mod quotes;
pub mod requests;
pub mod submissions;

pub use assignment::{Assignee, AssignmentService};
pub use base::{BaseService, EntityView, Validate};
pub use contacts::{ContactInput, ContactService};
pub use notifications::{NotificationService, NotificationSettings, RecipientOverride};
pub use projects::ProjectService;
pub use properties::{PropertyInput, PropertyService};
pub use quotes::QuoteService;
pub use requests::RequestService;
pub use submissions::{ContactUsSubmission, EstimateSubmission, SubmissionReceipt, SubmissionService};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Created,
    Merged,
    Unchanged,
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Upserted<T> {
    pub entity: T,
    pub outcome: UpsertOutcome,
}

impl<T> Upserted<T> {
    pub fn new(entity: T, outcome: UpsertOutcome) -> Self {
        Self { entity, outcome }
    }
}

/// `Some(incoming)` only when it is present and differs from the stored value.
pub(crate) fn changed<T: PartialEq>(incoming: Option<T>, existing: Option<&T>) -> Option<T> {
    incoming.filter(|value| Some(value) != existing)
}

/// Flags any `order` that does not strictly exceed the one before it.
pub(crate) fn check_strictly_increasing<I>(errors: &mut ValidationErrors, field: &str, orders: I)
where
    I: IntoIterator<Item = i32>,
{
    let mut previous: Option<i32> = None;
    for order in orders {
        if let Some(prev) = previous {
            if order == prev {
                errors.add(field, format!("duplicate order {order}"));
                return;
            }
            if order < prev {
                errors.add(field, format!("order {order} follows {prev}; orders must increase"));
                return;
            }
        }
        previous = Some(order);
    }
}

/// Process-wide pieces every service bundle shares, whichever credential it
/// runs under.
#[derive(Clone)]
pub struct ServiceShared {
    pub events: EventBus,
    pub assignment_cursor: Arc<AtomicUsize>,
    pub templates: Arc<TemplateRegistry>,
    pub notifications: NotificationSettings,
}

impl ServiceShared {
    pub fn new(templates: TemplateRegistry, notifications: NotificationSettings) -> Self {
        Self {
            events: EventBus::new(),
            assignment_cursor: Arc::new(AtomicUsize::new(0)),
            templates: Arc::new(templates),
            notifications,
        }
    }
}

#[derive(Clone)]
pub struct Services {
    pub requests: RequestService,
    pub quotes: QuoteService,
    pub projects: ProjectService,
    pub contacts: ContactService,
    pub properties: PropertyService,
    pub assignment: AssignmentService,
    pub notifications: NotificationService,
    pub submissions: SubmissionService,
}

impl Services {
    pub fn new(repositories: &Repositories, shared: &ServiceShared) -> Self {
        let events = shared.events.clone();
        let requests = RequestService::new(repositories, events.clone());
        let contacts = ContactService::new(repositories, events.clone());
        let properties = PropertyService::new(repositories, events.clone());
        let notifications = NotificationService::new(
            repositories.notifications.clone(),
            events.clone(),
            shared.templates.clone(),
            shared.notifications.clone(),
        );
        let assignment = AssignmentService::new(
            repositories.assignees.clone(),
            requests.clone(),
            notifications.clone(),
            shared.assignment_cursor.clone(),
        );
        let submissions = SubmissionService::new(
            contacts.clone(),
            properties.clone(),
            requests.clone(),
            assignment.clone(),
            notifications.clone(),
        );
        Self {
            quotes: QuoteService::new(repositories, events.clone()),
            projects: ProjectService::new(repositories, events),
            requests,
            contacts,
            properties,
            assignment,
            notifications,
            submissions,
        }
    }
}
