use std::collections::{HashMap, HashSet};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::error::{DataError, DataResult};
use crate::graphql::{GraphQlClient, Operation};
use crate::models::{
    AccountExecutive, Contact, NotificationQueueEntry, Project, Property, Quote, Request,
};

pub mod assignees;
pub mod cache;
pub mod contacts;
pub mod notifications;
pub mod projects;
pub mod properties;
pub mod quotes;
pub mod requests;

pub use cache::{cache_key, CacheEntry, Clock, QueryCache, SystemClock};

const LIST_ALL_PAGE_SIZE: u32 = 100;
const LIST_ALL_MAX_PAGES: usize = 200;
const GET_MANY_CHUNK: usize = 25;

/// A backend model reachable through the generated list/get/create/update/delete
/// root fields (`listRequests`, `getRequests`, ...).
pub trait Model: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const NAME: &'static str;
    /// Selection set requested for every read and mutation.
    const FIELDS: &'static str;
    type Create: Serialize + Send + Sync;
    type Patch: Serialize + Send + Sync;

    fn id(&self) -> &str;

    fn created_at(&self) -> Option<DateTime<Utc>> {
        None
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ModelFilter(Value);

impl ModelFilter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Self::condition(field, "eq", value.into())
    }

    pub fn ne(field: &str, value: impl Into<Value>) -> Self {
        Self::condition(field, "ne", value.into())
    }

    pub fn any_of<I, V>(field: &str, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let branches: Vec<Value> = values
            .into_iter()
            .map(|value| Self::condition(field, "eq", value.into()).0)
            .collect();
        Self(json!({ "or": branches }))
    }

    pub fn and(self, other: ModelFilter) -> Self {
        Self(json!({ "and": [self.0, other.0] }))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    fn condition(field: &str, operator: &str, value: Value) -> Self {
        let mut inner = Map::new();
        inner.insert(operator.to_string(), value);
        let mut outer = Map::new();
        outer.insert(field.to_string(), Value::Object(inner));
        Self(Value::Object(outer))
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub limit: Option<u32>,
    #[serde(default)]
    pub next_token: Option<String>,
}

impl Pagination {
    pub fn first(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            next_token: None,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub next_token: Option<String>,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            next_token: None,
        }
    }
}

pub struct BaseRepository<M: Model> {
    client: GraphQlClient,
    cache: Arc<QueryCache>,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> Clone for BaseRepository<M> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            cache: self.cache.clone(),
            _model: PhantomData,
        }
    }
}

impl<M: Model> BaseRepository<M> {
    pub fn new(client: GraphQlClient, cache: Arc<QueryCache>) -> Self {
        Self {
            client,
            cache,
            _model: PhantomData,
        }
    }

    /// Same model and cache, different transport client (e.g. another credential).
    pub fn with_client(&self, client: GraphQlClient) -> Self {
        Self::new(client, self.cache.clone())
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn client(&self) -> &GraphQlClient {
        &self.client
    }

    pub async fn list_page(
        &self,
        filter: Option<&ModelFilter>,
        pagination: &Pagination,
    ) -> DataResult<Page<M>> {
        let variables = json!({
            "filter": filter.map(ModelFilter::as_value),
            "limit": pagination.limit,
            "nextToken": pagination.next_token,
        });
        let key = cache_key(M::NAME, "list", &variables);
        if let Some(hit) = self.cache.get(&key) {
            debug!(model = M::NAME, "list served from cache");
            return decode_page(hit);
        }

        let operation = Operation::query(format!("list{}", M::NAME), list_document::<M>(), variables);
        let value = self.client.execute(&operation).await?;
        let page = decode_page(value.clone())?;
        self.cache.put(key, value);
        Ok(page)
    }

    pub async fn list(
        &self,
        filter: Option<&ModelFilter>,
        pagination: Option<&Pagination>,
    ) -> DataResult<Vec<M>> {
        let default = Pagination::default();
        let page = self.list_page(filter, pagination.unwrap_or(&default)).await?;
        Ok(page.items)
    }

    /// Follows `nextToken` until the backend reports no further pages.
    pub async fn list_all(&self, filter: Option<&ModelFilter>) -> DataResult<Vec<M>> {
        let mut items = Vec::new();
        let mut pagination = Pagination::first(LIST_ALL_PAGE_SIZE);
        for _ in 0..LIST_ALL_MAX_PAGES {
            let page = self.list_page(filter, &pagination).await?;
            items.extend(page.items);
            match page.next_token {
                Some(token) => pagination.next_token = Some(token),
                None => return Ok(items),
            }
        }
        Err(DataError::Unknown(format!(
            "{} listing did not terminate after {LIST_ALL_MAX_PAGES} pages",
            M::NAME
        )))
    }

    pub async fn find(&self, id: &str) -> DataResult<Option<M>> {
        let variables = json!({ "id": id });
        let key = cache_key(M::NAME, "get", &variables);
        if let Some(hit) = self.cache.get(&key) {
            debug!(model = M::NAME, id, "get served from cache");
            return Ok(Some(serde_json::from_value(hit)?));
        }

        let operation = Operation::query(format!("get{}", M::NAME), get_document::<M>(), variables);
        let value = self.client.execute(&operation).await?;
        if value.is_null() {
            return Ok(None);
        }
        let entity = serde_json::from_value(value.clone())?;
        self.cache.put(key, value);
        Ok(Some(entity))
    }

    pub async fn get(&self, id: &str) -> DataResult<M> {
        self.find(id)
            .await?
            .ok_or_else(|| DataError::not_found(M::NAME, id))
    }

    /// Loads rows by id with one `or` query per chunk instead of one `get` per id.
    pub async fn get_many(&self, ids: &[String]) -> DataResult<Vec<M>> {
        let mut seen = HashSet::new();
        let unique: Vec<&String> = ids.iter().filter(|id| seen.insert(id.as_str())).collect();
        let mut found = Vec::with_capacity(unique.len());
        for chunk in unique.chunks(GET_MANY_CHUNK) {
            let filter = ModelFilter::any_of("id", chunk.iter().map(|id| id.as_str()));
            found.extend(self.list_all(Some(&filter)).await?);
        }
        Ok(found)
    }

    pub async fn create(&self, input: &M::Create) -> DataResult<M> {
        let variables = json!({ "input": input });
        let operation = Operation::mutation(
            format!("create{}", M::NAME),
            mutation_document::<M>("create"),
            variables,
        );
        let result = self.client.execute(&operation).await;
        self.invalidate();
        let value = result?;
        if value.is_null() {
            return Err(DataError::Unknown(format!(
                "create{} returned no record",
                M::NAME
            )));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub async fn update(&self, id: &str, patch: &M::Patch) -> DataResult<M> {
        let mut input = match serde_json::to_value(patch)? {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(DataError::Unknown(format!(
                    "patch for {} must serialize to an object, got {other}",
                    M::NAME
                )))
            }
        };
        input.insert("id".to_string(), Value::String(id.to_string()));
        let operation = Operation::mutation(
            format!("update{}", M::NAME),
            mutation_document::<M>("update"),
            json!({ "input": input }),
        );
        let result = self.client.execute(&operation).await;
        self.invalidate();
        let value = result?;
        if value.is_null() {
            return Err(DataError::not_found(M::NAME, id));
        }
        Ok(serde_json::from_value(value)?)
    }

    pub async fn delete(&self, id: &str) -> DataResult<()> {
        let operation = Operation::mutation(
            format!("delete{}", M::NAME),
            mutation_document::<M>("delete"),
            json!({ "input": { "id": id } }),
        );
        let result = self.client.execute(&operation).await;
        self.invalidate();
        if result?.is_null() {
            return Err(DataError::not_found(M::NAME, id));
        }
        Ok(())
    }

    /// Filters are opaque to the cache, so every mutation drops every entry.
    fn invalidate(&self) {
        if !self.cache.is_empty() {
            debug!(model = M::NAME, "invalidating cached queries");
        }
        self.cache.invalidate_all();
    }
}

/// Resolves the foreign keys yielded by `keys` for every row into the related
/// model, issuing batched lookups rather than one query per row.
pub async fn resolve_references<M, R, F>(
    related: &BaseRepository<R>,
    rows: &[M],
    keys: F,
) -> DataResult<HashMap<String, R>>
where
    M: Model,
    R: Model,
    F: Fn(&M) -> Vec<String>,
{
    let ids: Vec<String> = rows.iter().flat_map(|row| keys(row)).collect();
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let loaded = related.get_many(&ids).await?;
    Ok(loaded
        .into_iter()
        .map(|entity| (entity.id().to_string(), entity))
        .collect())
}

fn decode_page<M: Model>(value: Value) -> DataResult<Page<M>> {
    if value.is_null() {
        return Ok(Page::default());
    }
    Ok(serde_json::from_value(value)?)
}

fn list_document<M: Model>() -> String {
    format!(
        "query List{name}($filter: Model{name}FilterInput, $limit: Int, $nextToken: String) {{ \
         list{name}(filter: $filter, limit: $limit, nextToken: $nextToken) {{ items {{ {fields} }} nextToken }} }}",
        name = M::NAME,
        fields = M::FIELDS
    )
}

fn get_document<M: Model>() -> String {
    format!(
        "query Get{name}($id: ID!) {{ get{name}(id: $id) {{ {fields} }} }}",
        name = M::NAME,
        fields = M::FIELDS
    )
}

fn mutation_document<M: Model>(verb: &str) -> String {
    let title = match verb {
        "create" => "Create",
        "update" => "Update",
        _ => "Delete",
    };
    format!(
        "mutation {title}{name}($input: {title}{name}Input!) {{ {verb}{name}(input: $input) {{ {fields} }} }}",
        name = M::NAME,
        fields = M::FIELDS
    )
}

/// The full set of per-model repositories. Each owns its cache.
#[derive(Clone)]
pub struct Repositories {
    pub requests: requests::RequestRepository,
    pub quotes: quotes::QuoteRepository,
    pub projects: projects::ProjectRepository,
    pub contacts: contacts::ContactRepository,
    pub properties: properties::PropertyRepository,
    pub assignees: assignees::AssigneeRepository,
    pub notifications: notifications::NotificationRepository,
}

impl Repositories {
    pub fn new(client: GraphQlClient, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        let cache = || Arc::new(QueryCache::new(ttl, clock.clone()));
        Self {
            requests: BaseRepository::<Request>::new(client.clone(), cache()),
            quotes: BaseRepository::<Quote>::new(client.clone(), cache()),
            projects: BaseRepository::<Project>::new(client.clone(), cache()),
            contacts: BaseRepository::<Contact>::new(client.clone(), cache()),
            properties: BaseRepository::<Property>::new(client.clone(), cache()),
            assignees: BaseRepository::<AccountExecutive>::new(client.clone(), cache()),
            notifications: BaseRepository::<NotificationQueueEntry>::new(client, cache()),
        }
    }

    pub fn with_client(&self, client: GraphQlClient) -> Self {
        Self {
            requests: self.requests.with_client(client.clone()),
            quotes: self.quotes.with_client(client.clone()),
            projects: self.projects.with_client(client.clone()),
            contacts: self.contacts.with_client(client.clone()),
            properties: self.properties.with_client(client.clone()),
            assignees: self.assignees.with_client(client.clone()),
            notifications: self.notifications.with_client(client),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_filter_inputs() {
        let filter = ModelFilter::eq("status", "pending").and(ModelFilter::ne("retryCount", 3));
        assert_eq!(
            filter.as_value(),
            &json!({"and": [{"status": {"eq": "pending"}}, {"retryCount": {"ne": 3}}]})
        );

        let ids = ModelFilter::any_of("id", ["a", "b"]);
        assert_eq!(
            ids.as_value(),
            &json!({"or": [{"id": {"eq": "a"}}, {"id": {"eq": "b"}}]})
        );
    }

    #[test]
    fn documents_use_generated_root_fields() {
        let list = list_document::<Request>();
        assert!(list.contains("listRequests(filter: $filter"));
        assert!(list.contains("ModelRequestsFilterInput"));
        assert!(get_document::<Contact>().contains("getContacts(id: $id)"));
        let update = mutation_document::<Property>("update");
        assert!(update.contains("UpdatePropertiesInput!"));
        assert!(update.contains("updateProperties(input: $input)"));
    }
}
