use chrono::Utc;
use tracing::info;

use crate::error::{DataError, DataResult, ValidationErrors};
use crate::events::{BusinessEvent, EventBus};
use crate::models::{new_id, NewRequest, Request, RequestPatch, RequestStatus};
use crate::repository::assignees::AssigneeRepository;
use crate::repository::contacts::ContactRepository;
use crate::repository::properties::PropertyRepository;
use crate::repository::requests::RequestDetails;
use crate::repository::Repositories;
use crate::validation::{check_id, require};

use super::base::{BaseService, Validate};

const MAX_MESSAGE_LEN: usize = 5000;

impl Validate for NewRequest {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "addressId", self.address_id.as_deref());
        check_id(&mut errors, "addressId", self.address_id.as_deref());
        check_id(&mut errors, "agentContactId", self.agent_contact_id.as_deref());
        check_id(
            &mut errors,
            "homeownerContactId",
            self.homeowner_contact_id.as_deref(),
        );
        if self.agent_contact_id.is_none() && self.homeowner_contact_id.is_none() {
            errors.add("agentContactId", "a request needs at least one contact");
        }
        check_message(&mut errors, self.message.as_deref());
        errors
    }
}

impl Validate for RequestPatch {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if self.status.is_some() {
            errors.add("status", "use the status transition endpoint");
        }
        if self.assigned_to.is_some() || self.assigned_date.is_some() {
            errors.add("assignedTo", "use the assign endpoint");
        }
        check_id(&mut errors, "addressId", self.address_id.as_deref());
        check_id(&mut errors, "agentContactId", self.agent_contact_id.as_deref());
        check_id(
            &mut errors,
            "homeownerContactId",
            self.homeowner_contact_id.as_deref(),
        );
        check_message(&mut errors, self.message.as_deref());
        errors
    }
}

fn check_message(errors: &mut ValidationErrors, message: Option<&str>) {
    if message.map(|m| m.chars().count() > MAX_MESSAGE_LEN).unwrap_or(false) {
        errors.add("message", format!("must be at most {MAX_MESSAGE_LEN} characters"));
    }
}

/// Scores a lead from 0 to 100. Referrals and large budgets rank highest.
pub fn score_lead(input: &NewRequest) -> u32 {
    let source = input
        .lead_source
        .as_deref()
        .map(|s| s.trim().to_ascii_lowercase())
        .unwrap_or_default();
    let mut score = match source.as_str() {
        "referral" => 30,
        "agent" | "realtor" => 25,
        "website" | "web" => 20,
        "phone" => 15,
        _ => 5,
    };

    score += match input.budget.as_deref().map(parse_budget) {
        Some(Some(amount)) if amount >= 100_000 => 30,
        Some(Some(amount)) if amount >= 50_000 => 20,
        Some(Some(amount)) if amount >= 10_000 => 10,
        Some(_) => 5,
        None => 0,
    };

    if input.agent_contact_id.is_some() {
        score += 15;
    }
    if input.homeowner_contact_id.is_some() {
        score += 5;
    }
    if input.product.as_deref().map(|p| !p.trim().is_empty()).unwrap_or(false) {
        score += 10;
    }
    if input.message.as_deref().map(|m| m.trim().len() >= 40).unwrap_or(false) {
        score += 10;
    }
    score.min(100)
}

/// Reads the first number out of free-text budgets such as "$50,000 - $75,000"
/// or "80k".
fn parse_budget(budget: &str) -> Option<u64> {
    let lower = budget.to_ascii_lowercase();
    let start = lower.find(|c: char| c.is_ascii_digit())?;
    let rest = &lower[start..];
    let digits: String = rest
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == ',')
        .filter(char::is_ascii_digit)
        .collect();
    let amount: u64 = digits.parse().ok()?;
    let suffix = rest.trim_start_matches(|c: char| c.is_ascii_digit() || c == ',');
    if suffix.starts_with('k') {
        Some(amount * 1_000)
    } else if suffix.starts_with('m') {
        Some(amount * 1_000_000)
    } else {
        Some(amount)
    }
}

#[derive(Clone)]
pub struct RequestService {
    base: BaseService<Request>,
    assignees: AssigneeRepository,
    contacts: ContactRepository,
    properties: PropertyRepository,
}

impl RequestService {
    pub fn new(repositories: &Repositories, events: EventBus) -> Self {
        Self {
            base: BaseService::new(repositories.requests.clone(), events),
            assignees: repositories.assignees.clone(),
            contacts: repositories.contacts.clone(),
            properties: repositories.properties.clone(),
        }
    }

    pub fn base(&self) -> &BaseService<Request> {
        &self.base
    }

    /// New requests always start in `new`, unassigned, with a computed lead score.
    pub async fn create(&self, mut input: NewRequest) -> DataResult<Request> {
        if input.id.is_empty() {
            input.id = new_id();
        }
        input.status = RequestStatus::New;
        input.validate().into_result()?;

        if let Some(address_id) = input.address_id.as_deref() {
            if self.properties.find(address_id).await?.is_none() {
                return Err(DataError::invalid("addressId", "property does not exist"));
            }
        }
        input.lead_score = Some(score_lead(&input));
        self.base.create(&input).await
    }

    pub async fn update(&self, id: &str, patch: &RequestPatch) -> DataResult<Request> {
        self.base.update(id, patch).await
    }

    pub async fn assign(&self, request_id: &str, ae_id: &str) -> DataResult<Request> {
        if ae_id.trim().is_empty() {
            return Err(DataError::invalid("aeId", "is required"));
        }
        let assignee = match self.assignees.find(ae_id).await? {
            Some(assignee) => assignee,
            None => {
                return Err(DataError::invalid(
                    "aeId",
                    "no account executive with this id",
                ))
            }
        };
        if assignee.is_sentinel() {
            return Err(DataError::invalid(
                "aeId",
                "requests cannot be assigned to the Unassigned placeholder",
            ));
        }
        if !assignee.active {
            return Err(DataError::invalid("aeId", "account executive is inactive"));
        }

        let request = self.base.get(request_id).await?;
        let mut patch = RequestPatch {
            assigned_to: Some(assignee.id.clone()),
            assigned_date: Some(Utc::now()),
            ..RequestPatch::default()
        };
        if request.status == RequestStatus::New {
            patch.status = Some(RequestStatus::Assigned);
        }

        let updated = self.base.persist_update(request_id, &patch).await?;
        info!(request_id, assignee = %assignee.name, "request assigned");
        self.base.events().emit(BusinessEvent::RequestAssigned {
            request_id: request_id.to_string(),
            assignee_id: assignee.id,
        });
        if updated.status != request.status {
            self.emit_status_change(request_id, request.status, updated.status);
        }
        Ok(updated)
    }

    pub async fn transition_status(
        &self,
        request_id: &str,
        target: RequestStatus,
    ) -> DataResult<Request> {
        let request = self.base.get(request_id).await?;
        if !request.status.can_transition_to(target) {
            return Err(DataError::invalid(
                "status",
                format!("cannot move a request from {} to {target}", request.status),
            ));
        }
        if target == RequestStatus::Assigned && request.assigned_to.is_none() {
            return Err(DataError::invalid(
                "status",
                "assign an account executive before marking the request assigned",
            ));
        }
        self.write_status(&request, target).await
    }

    pub async fn reopen(&self, request_id: &str) -> DataResult<Request> {
        let request = self.base.get(request_id).await?;
        if !request.status.can_reopen() {
            return Err(DataError::invalid(
                "status",
                format!("a {} request cannot be reopened", request.status),
            ));
        }
        self.write_status(&request, RequestStatus::InProgress).await
    }

    pub async fn details(&self, request_id: &str) -> DataResult<RequestDetails> {
        let request = self.base.get(request_id).await?;
        self.base
            .repository()
            .with_relations(vec![request], &self.contacts, &self.properties)
            .await?
            .pop()
            .ok_or_else(|| DataError::not_found("Requests", request_id))
    }

    pub async fn list_details(
        &self,
        status: Option<RequestStatus>,
    ) -> DataResult<Vec<RequestDetails>> {
        let repository = self.base.repository();
        let requests = match status {
            Some(status) => repository.list_by_status(status).await?,
            None => repository.list_all(None).await?,
        };
        repository
            .with_relations(requests, &self.contacts, &self.properties)
            .await
    }

    async fn write_status(&self, request: &Request, target: RequestStatus) -> DataResult<Request> {
        let patch = RequestPatch {
            status: Some(target),
            ..RequestPatch::default()
        };
        let updated = self.base.persist_update(&request.id, &patch).await?;
        self.emit_status_change(&request.id, request.status, target);
        Ok(updated)
    }

    fn emit_status_change(&self, request_id: &str, from: RequestStatus, to: RequestStatus) {
        info!(request_id, %from, %to, "request status changed");
        self.base.events().emit(BusinessEvent::RequestStatusChanged {
            request_id: request_id.to_string(),
            from,
            to,
        });
    }
}
