use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::error::{DataResult, ValidationErrors};
use crate::models::{AccountExecutive, Contact, ContactRole, NewRequest};
use crate::notify::templates::{CONTACT_US, ESTIMATE_REQUEST};
use crate::validation::require;

use super::assignment::{Assignee, AssignmentService};
use super::contacts::{ContactInput, ContactService};
use super::notifications::NotificationService;
use super::properties::{PropertyInput, PropertyService};
use super::requests::RequestService;

const DEFAULT_LEAD_SOURCE: &str = "website";

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EstimateSubmission {
    pub agent: ContactInput,
    #[serde(default)]
    pub homeowner: Option<ContactInput>,
    pub property: PropertyInput,
    #[serde(default)]
    pub lead_source: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    #[serde(default)]
    pub budget: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub relation_to_property: Option<String>,
}

impl EstimateSubmission {
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.extend_prefixed("agent", self.agent.validate());
        if let Some(homeowner) = &self.homeowner {
            errors.extend_prefixed("homeowner", homeowner.validate());
        }
        errors.extend_prefixed("property", self.property.validate());
        errors
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactUsSubmission {
    pub contact: ContactInput,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub product: Option<String>,
    pub message: String,
}

impl ContactUsSubmission {
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        errors.extend_prefixed("contact", self.contact.validate());
        require(&mut errors, "message", Some(self.message.as_str()));
        errors
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
    pub request_id: Option<String>,
    pub contact_ids: Vec<String>,
    pub property_id: Option<String>,
    pub assigned_to: Option<String>,
    pub notification_ids: Vec<String>,
}

/// Form intake. Every form type shares the same dedup and notification path.
#[derive(Clone)]
pub struct SubmissionService {
    contacts: ContactService,
    properties: PropertyService,
    requests: RequestService,
    assignment: AssignmentService,
    notifications: NotificationService,
}

impl SubmissionService {
    pub fn new(
        contacts: ContactService,
        properties: PropertyService,
        requests: RequestService,
        assignment: AssignmentService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            contacts,
            properties,
            requests,
            assignment,
            notifications,
        }
    }

    pub async fn submit_estimate(&self, submission: EstimateSubmission) -> DataResult<SubmissionReceipt> {
        submission.validate().into_result()?;

        let mut agent_input = submission.agent.clone();
        agent_input.role.get_or_insert(ContactRole::Agent);
        let agent = self.contacts.upsert(&agent_input).await?.entity;

        let homeowner = match &submission.homeowner {
            Some(input) => Some(self.contacts.upsert(input).await?.entity),
            None => None,
        };
        let property = self.properties.upsert(&submission.property).await?.entity;

        let request = self
            .requests
            .create(NewRequest {
                agent_contact_id: Some(agent.id.clone()),
                homeowner_contact_id: homeowner.as_ref().map(|c| c.id.clone()),
                address_id: Some(property.id.clone()),
                lead_source: Some(
                    submission
                        .lead_source
                        .clone()
                        .unwrap_or_else(|| DEFAULT_LEAD_SOURCE.to_string()),
                ),
                product: submission.product.clone(),
                budget: submission.budget.clone(),
                message: submission.message.clone(),
                relation_to_property: submission.relation_to_property.clone(),
                ..NewRequest::default()
            })
            .await?;
        info!(request_id = %request.id, "estimate request received");

        // The request is stored; assignment and notification failures must not
        // turn the submission into an error the visitor would resubmit.
        let assignee = match self.assignment.auto_assign(&request.id).await {
            Ok(assignee) => assignee,
            Err(err) => {
                warn!(request_id = %request.id, error = %err, "auto-assignment failed");
                Assignee::Unassigned
            }
        };
        let executive = assignee.executive();

        let payload = json!({
            "requestId": request.id,
            "assignedTo": executive.map(|ae| ae.name.as_str()).unwrap_or("Unassigned"),
            "agentName": contact_name(&agent),
            "agentEmail": agent.email,
            "agentPhone": agent.phone.as_ref().or(agent.mobile.as_ref()),
            "homeownerName": homeowner.as_ref().map(contact_name),
            "homeownerEmail": homeowner.as_ref().map(|c| c.email.as_str()),
            "propertyAddress": property.property_full_address,
            "product": request.product,
            "budget": request.budget,
            "leadSource": request.lead_source,
            "leadScore": request.lead_score,
            "message": request.message,
            "submittedAt": Utc::now().to_rfc3339(),
        });
        let notification_ids = self
            .queue_notifications(ESTIMATE_REQUEST, payload, executive)
            .await;

        let mut contact_ids = vec![agent.id];
        contact_ids.extend(homeowner.map(|c| c.id));
        Ok(SubmissionReceipt {
            request_id: Some(request.id),
            contact_ids,
            property_id: Some(property.id),
            assigned_to: executive.map(|ae| ae.id.clone()),
            notification_ids,
        })
    }

    pub async fn submit_contact_us(&self, submission: ContactUsSubmission) -> DataResult<SubmissionReceipt> {
        submission.validate().into_result()?;
        let contact = self.contacts.upsert(&submission.contact).await?.entity;
        info!(contact_id = %contact.id, "contact form received");

        let payload = json!({
            "name": contact_name(&contact),
            "email": contact.email,
            "phone": contact.phone.as_ref().or(contact.mobile.as_ref()),
            "subject": submission.subject,
            "product": submission.product,
            "message": submission.message.trim(),
            "submittedAt": Utc::now().to_rfc3339(),
        });
        let notification_ids = self.queue_notifications(CONTACT_US, payload, None).await;

        Ok(SubmissionReceipt {
            contact_ids: vec![contact.id],
            notification_ids,
            ..SubmissionReceipt::default()
        })
    }

    async fn queue_notifications(
        &self,
        template_id: &str,
        payload: Value,
        executive: Option<&AccountExecutive>,
    ) -> Vec<String> {
        match self
            .notifications
            .notify_submission(template_id, payload, executive)
            .await
        {
            Ok(ids) => ids,
            Err(err) => {
                error!(template_id, error = %err, "failed to queue submission notifications");
                Vec::new()
            }
        }
    }
}

fn contact_name(contact: &Contact) -> String {
    contact
        .full_name
        .clone()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| contact.email.clone())
}
