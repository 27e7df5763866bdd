use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DataError, DataResult, ValidationErrors};
use crate::events::EventBus;
use crate::models::{new_id, Contact, ContactPatch, ContactRole, NewContact};
use crate::repository::Repositories;
use crate::validation::{check_contact_phone, check_email, normalize_email, require};

use super::base::{BaseService, Validate};
use super::{changed, UpsertOutcome, Upserted};

impl Validate for NewContact {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "email", Some(self.email.as_str()));
        check_email(&mut errors, "email", Some(self.email.as_str()));
        check_contact_phone(&mut errors, "phone", self.phone.as_deref());
        check_contact_phone(&mut errors, "mobile", self.mobile.as_deref());
        errors
    }
}

impl Validate for ContactPatch {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        check_email(&mut errors, "email", self.email.as_deref());
        check_contact_phone(&mut errors, "phone", self.phone.as_deref());
        check_contact_phone(&mut errors, "mobile", self.mobile.as_deref());
        errors
    }
}

/// Incoming contact fields. Absent fields never overwrite stored ones.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInput {
    pub email: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub role: Option<ContactRole>,
    #[serde(default)]
    pub email_notifications: Option<bool>,
    #[serde(default)]
    pub sms_notifications: Option<bool>,
}

impl ContactInput {
    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        require(&mut errors, "email", Some(self.email.as_str()));
        if !self.email.trim().is_empty() {
            check_email(&mut errors, "email", Some(self.email.as_str()));
        }
        check_contact_phone(&mut errors, "phone", self.phone.as_deref());
        check_contact_phone(&mut errors, "mobile", self.mobile.as_deref());
        errors
    }

    /// The display name: explicit full name, else first and last joined.
    pub fn display_name(&self) -> Option<String> {
        if let Some(full) = present(&self.full_name) {
            return Some(full);
        }
        let parts: Vec<String> = [present(&self.first_name), present(&self.last_name)]
            .into_iter()
            .flatten()
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }

    fn to_new(&self, id: String, email: String) -> NewContact {
        NewContact {
            id,
            email,
            first_name: present(&self.first_name),
            last_name: present(&self.last_name),
            full_name: self.display_name(),
            phone: present(&self.phone),
            mobile: present(&self.mobile),
            company: present(&self.company),
            role: self.role.unwrap_or_default(),
            email_notifications: self.email_notifications.unwrap_or(true),
            sms_notifications: self.sms_notifications.unwrap_or(false),
        }
    }

    /// Latest-wins: every supplied field that differs from the stored row.
    fn merge_patch(&self, existing: &Contact) -> ContactPatch {
        ContactPatch {
            email: None,
            first_name: changed(present(&self.first_name), existing.first_name.as_ref()),
            last_name: changed(present(&self.last_name), existing.last_name.as_ref()),
            full_name: changed(self.display_name(), existing.full_name.as_ref()),
            phone: changed(present(&self.phone), existing.phone.as_ref()),
            mobile: changed(present(&self.mobile), existing.mobile.as_ref()),
            company: changed(present(&self.company), existing.company.as_ref()),
            role: self.role.filter(|role| *role != existing.role),
            email_notifications: self
                .email_notifications
                .filter(|flag| *flag != existing.email_notifications),
            sms_notifications: self
                .sms_notifications
                .filter(|flag| *flag != existing.sms_notifications),
        }
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Clone)]
pub struct ContactService {
    base: BaseService<Contact>,
}

impl ContactService {
    pub fn new(repositories: &Repositories, events: EventBus) -> Self {
        Self {
            base: BaseService::new(repositories.contacts.clone(), events),
        }
    }

    pub fn base(&self) -> &BaseService<Contact> {
        &self.base
    }

    /// Creates the contact or merges into the row that already owns the
    /// normalized email.
    pub async fn upsert(&self, input: &ContactInput) -> DataResult<Upserted<Contact>> {
        input.validate().into_result()?;
        let email = normalize_email(&input.email);
        let repository = self.base.repository();

        if let Some(existing) = repository.find_by_email(&email).await? {
            return self.merge(existing, input).await;
        }

        let new_contact = input.to_new(new_id(), email.clone());
        match self.base.create(&new_contact).await {
            Ok(contact) => {
                info!(contact_id = %contact.id, "contact created");
                Ok(Upserted::new(contact, UpsertOutcome::Created))
            }
            Err(DataError::Conflict(reason)) => {
                warn!(%reason, "concurrent contact create, merging into winner");
                let existing = repository
                    .find_by_email(&email)
                    .await?
                    .ok_or(DataError::Conflict(reason))?;
                self.merge(existing, input).await
            }
            Err(error) => Err(error),
        }
    }

    /// Edits a contact. An email change must not collide with another contact.
    pub async fn update(&self, id: &str, patch: &ContactPatch) -> DataResult<Contact> {
        let mut patch = patch.clone();
        if let Some(email) = patch.email.as_deref() {
            let email = normalize_email(email);
            if let Some(owner) = self.base.repository().find_by_email(&email).await? {
                if owner.id != id {
                    return Err(DataError::invalid(
                        "email",
                        "another contact already uses this email",
                    ));
                }
            }
            patch.email = Some(email);
        }
        self.base.update(id, &patch).await
    }

    async fn merge(&self, existing: Contact, input: &ContactInput) -> DataResult<Upserted<Contact>> {
        let patch = input.merge_patch(&existing);
        if patch.is_empty() {
            debug!(contact_id = %existing.id, "contact unchanged");
            return Ok(Upserted::new(existing, UpsertOutcome::Unchanged));
        }
        let merged = self.base.update(&existing.id, &patch).await?;
        info!(contact_id = %merged.id, "contact merged");
        Ok(Upserted::new(merged, UpsertOutcome::Merged))
    }
}
