use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DataError, DataResult, ValidationErrors};
use crate::events::EventBus;
use crate::models::{new_id, NewProperty, Property, PropertyPatch};
use crate::repository::Repositories;
use crate::validation::{normalize_address, require};

use super::base::{BaseService, Validate};
use super::{changed, UpsertOutcome, Upserted};

const OLDEST_YEAR_BUILT: u32 = 1600;
const NEWEST_YEAR_BUILT: u32 = 2100;

fn check_year_built(errors: &mut ValidationErrors, year: Option<u32>) {
    if let Some(year) = year {
        if !(OLDEST_YEAR_BUILT..=NEWEST_YEAR_BUILT).contains(&year) {
            errors.add("yearBuilt", "is out of range");
        }
    }
}

impl Validate for NewProperty {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        require(
            &mut errors,
            "propertyFullAddress",
            Some(self.property_full_address.as_str()),
        );
        if self.address_key != normalize_address(&self.property_full_address) {
            errors.add("addressKey", "must be the normalized full address");
        }
        check_year_built(&mut errors, self.year_built);
        errors
    }
}

impl Validate for PropertyPatch {
    fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        match (&self.property_full_address, &self.address_key) {
            (Some(address), Some(key)) if *key != normalize_address(address) => {
                errors.add("addressKey", "must be the normalized full address");
            }
            (Some(address), _) if address.trim().is_empty() => {
                errors.add("propertyFullAddress", "is required");
            }
            (None, Some(_)) => errors.add("addressKey", "changes only with the full address"),
            _ => {}
        }
        check_year_built(&mut errors, self.year_built);
        errors
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyInput {
    #[serde(default)]
    pub property_full_address: Option<String>,
    #[serde(default)]
    pub house_address: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
    #[serde(default)]
    pub property_type: Option<String>,
    #[serde(default)]
    pub bedrooms: Option<u32>,
    #[serde(default)]
    pub bathrooms: Option<f32>,
    #[serde(default)]
    pub size_sqft: Option<u32>,
    #[serde(default)]
    pub year_built: Option<u32>,
}

impl PropertyInput {
    /// The explicit full address, else "house, city, state zip" from the parts.
    pub fn full_address(&self) -> Option<String> {
        if let Some(full) = trimmed(&self.property_full_address) {
            return Some(full);
        }
        let house = trimmed(&self.house_address)?;
        let region = [trimmed(&self.state), trimmed(&self.zip)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        let parts: Vec<String> = [Some(house), trimmed(&self.city), Some(region)]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect();
        Some(parts.join(", "))
    }

    pub fn address_key(&self) -> Option<String> {
        self.full_address().map(|address| normalize_address(&address))
    }

    pub fn validate(&self) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        if self.full_address().is_none() {
            errors.add("propertyFullAddress", "is required");
        }
        check_year_built(&mut errors, self.year_built);
        errors
    }

    fn to_new(&self, id: String, full_address: String, address_key: String) -> NewProperty {
        NewProperty {
            id,
            property_full_address: full_address,
            address_key,
            house_address: trimmed(&self.house_address),
            city: trimmed(&self.city),
            state: trimmed(&self.state),
            zip: trimmed(&self.zip),
            property_type: trimmed(&self.property_type),
            bedrooms: self.bedrooms,
            bathrooms: self.bathrooms,
            size_sqft: self.size_sqft,
            year_built: self.year_built,
        }
    }

    fn merge_patch(&self, existing: &Property) -> PropertyPatch {
        PropertyPatch {
            property_full_address: changed(
                trimmed(&self.property_full_address),
                Some(&existing.property_full_address),
            ),
            address_key: None,
            house_address: changed(trimmed(&self.house_address), existing.house_address.as_ref()),
            city: changed(trimmed(&self.city), existing.city.as_ref()),
            state: changed(trimmed(&self.state), existing.state.as_ref()),
            zip: changed(trimmed(&self.zip), existing.zip.as_ref()),
            property_type: changed(trimmed(&self.property_type), existing.property_type.as_ref()),
            bedrooms: changed(self.bedrooms, existing.bedrooms.as_ref()),
            bathrooms: changed(self.bathrooms, existing.bathrooms.as_ref()),
            size_sqft: changed(self.size_sqft, existing.size_sqft.as_ref()),
            year_built: changed(self.year_built, existing.year_built.as_ref()),
        }
    }
}

fn trimmed(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[derive(Clone)]
pub struct PropertyService {
    base: BaseService<Property>,
}

impl PropertyService {
    pub fn new(repositories: &Repositories, events: EventBus) -> Self {
        Self {
            base: BaseService::new(repositories.properties.clone(), events),
        }
    }

    pub fn base(&self) -> &BaseService<Property> {
        &self.base
    }

    /// Creates the property or merges into the row with the same normalized
    /// address.
    pub async fn upsert(&self, input: &PropertyInput) -> DataResult<Upserted<Property>> {
        input.validate().into_result()?;
        let (full_address, key) = match (input.full_address(), input.address_key()) {
            (Some(full), Some(key)) => (full, key),
            _ => return Err(DataError::invalid("propertyFullAddress", "is required")),
        };
        let repository = self.base.repository();

        if let Some(existing) = repository.find_by_address_key(&key).await? {
            return self.merge(existing, input).await;
        }

        let new_property = input.to_new(new_id(), full_address, key.clone());
        match self.base.create(&new_property).await {
            Ok(property) => {
                info!(property_id = %property.id, "property created");
                Ok(Upserted::new(property, UpsertOutcome::Created))
            }
            Err(DataError::Conflict(reason)) => {
                warn!(%reason, "concurrent property create, merging into winner");
                let existing = repository
                    .find_by_address_key(&key)
                    .await?
                    .ok_or(DataError::Conflict(reason))?;
                self.merge(existing, input).await
            }
            Err(error) => Err(error),
        }
    }

    pub async fn update(&self, id: &str, patch: &PropertyPatch) -> DataResult<Property> {
        let mut patch = patch.clone();
        if let Some(address) = patch.property_full_address.as_deref() {
            let key = normalize_address(address);
            if let Some(owner) = self.base.repository().find_by_address_key(&key).await? {
                if owner.id != id {
                    return Err(DataError::invalid(
                        "propertyFullAddress",
                        "another property already has this address",
                    ));
                }
            }
            patch.address_key = Some(key);
        }
        self.base.update(id, &patch).await
    }

    async fn merge(&self, existing: Property, input: &PropertyInput) -> DataResult<Upserted<Property>> {
        let patch = input.merge_patch(&existing);
        if patch.is_empty() {
            debug!(property_id = %existing.id, "property unchanged");
            return Ok(Upserted::new(existing, UpsertOutcome::Unchanged));
        }
        let merged = self.base.update(&existing.id, &patch).await?;
        info!(property_id = %merged.id, "property merged");
        Ok(Upserted::new(merged, UpsertOutcome::Merged))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn composes_full_address_from_parts() {
        let input = PropertyInput {
            house_address: Some("12 Oak Ave".into()),
            city: Some("Springfield".into()),
            state: Some("IL".into()),
            zip: Some("62704".into()),
            ..PropertyInput::default()
        };
        assert_eq!(
            input.full_address().as_deref(),
            Some("12 Oak Ave, Springfield, IL 62704")
        );
        assert_eq!(
            input.address_key().as_deref(),
            Some("12 oak ave, springfield, il 62704")
        );
    }

    #[test]
    fn requires_some_address() {
        let input = PropertyInput {
            bedrooms: Some(3),
            ..PropertyInput::default()
        };
        assert!(input.validate().has_field("propertyFullAddress"));
    }

    #[test]
    fn merge_keeps_unsupplied_fields() {
        let existing = Property {
            id: "p-1".into(),
            property_full_address: "12 Oak Ave, Springfield, IL 62704".into(),
            address_key: "12 oak ave, springfield, il 62704".into(),
            house_address: None,
            city: None,
            state: None,
            zip: None,
            property_type: Some("condo".into()),
            bedrooms: Some(2),
            bathrooms: None,
            size_sqft: None,
            year_built: None,
            created_at: None,
            updated_at: None,
        };
        let input = PropertyInput {
            property_full_address: Some("12 OAK AVE,  Springfield, IL 62704".into()),
            bedrooms: Some(3),
            ..PropertyInput::default()
        };
        let patch = input.merge_patch(&existing);
        assert_eq!(patch.bedrooms, Some(3));
        assert_eq!(patch.property_type, None);
        assert_eq!(
            patch.property_full_address.as_deref(),
            Some("12 OAK AVE,  Springfield, IL 62704")
        );
        assert_eq!(patch.validate().fields().len(), 0);
    }
}
