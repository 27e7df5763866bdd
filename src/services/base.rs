use chrono::Utc;
use serde::Serialize;

use crate::error::{DataResult, ValidationErrors};
use crate::events::{BusinessEvent, EventBus};
use crate::repository::{BaseRepository, Model, ModelFilter, Pagination};

pub trait Validate {
    fn validate(&self) -> ValidationErrors;
}

#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityView<M> {
    #[serde(flatten)]
    pub entity: M,
    pub age_days: Option<i64>,
}

/// Validation, then persistence, then event emission. A failed validation never
/// reaches the repository.
pub struct BaseService<M: Model> {
    repository: BaseRepository<M>,
    events: EventBus,
}

impl<M: Model> Clone for BaseService<M> {
    fn clone(&self) -> Self {
        Self {
            repository: self.repository.clone(),
            events: self.events.clone(),
        }
    }
}

impl<M> BaseService<M>
where
    M: Model,
    M::Create: Validate,
    M::Patch: Validate,
{
    pub fn new(repository: BaseRepository<M>, events: EventBus) -> Self {
        Self { repository, events }
    }

    pub fn repository(&self) -> &BaseRepository<M> {
        &self.repository
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub async fn list(
        &self,
        filter: Option<&ModelFilter>,
        pagination: Option<&Pagination>,
    ) -> DataResult<Vec<M>> {
        self.repository.list(filter, pagination).await
    }

    pub async fn get(&self, id: &str) -> DataResult<M> {
        self.repository.get(id).await
    }

    pub async fn create(&self, input: &M::Create) -> DataResult<M> {
        input.validate().into_result()?;
        let entity = self.repository.create(input).await?;
        self.events.emit(BusinessEvent::Created {
            model: M::NAME,
            id: entity.id().to_string(),
        });
        Ok(entity)
    }

    pub async fn update(&self, id: &str, patch: &M::Patch) -> DataResult<M> {
        patch.validate().into_result()?;
        self.persist_update(id, patch).await
    }

    /// Writes a patch the caller has already checked against business rules.
    pub(crate) async fn persist_update(&self, id: &str, patch: &M::Patch) -> DataResult<M> {
        let entity = self.repository.update(id, patch).await?;
        self.events.emit(BusinessEvent::Updated {
            model: M::NAME,
            id: id.to_string(),
        });
        Ok(entity)
    }

    pub async fn delete(&self, id: &str) -> DataResult<()> {
        self.repository.delete(id).await?;
        self.events.emit(BusinessEvent::Deleted {
            model: M::NAME,
            id: id.to_string(),
        });
        Ok(())
    }

    pub fn view(&self, entity: M) -> EntityView<M> {
        let age_days = entity
            .created_at()
            .map(|created| (Utc::now() - created).num_days());
        EntityView { entity, age_days }
    }
}
