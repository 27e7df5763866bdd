use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request};
use axum::Router;
use backoffice::config::{AppConfig, AppEnvironment};
use backoffice::graphql::{
    Credentials, GraphQlErrorEntry, GraphQlResponse, GraphQlTransport, Operation, TransportError,
};
use backoffice::notify::{NotificationSender, OutboundMessage, SendError, TemplateRegistry};
use backoffice::repository::Clock;
use backoffice::routes;
use backoffice::state::AppState;
use chrono::{DateTime, TimeZone, Utc};
use http_body_util::BodyExt;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tower::util::ServiceExt;

pub const ADMIN_TOKEN: &str = "admin-session-token";
pub const DEBUG_EMAIL: &str = "debug@backoffice.test";
pub const DEBUG_PHONE: &str = "+15550100000";

#[allow(dead_code)]
pub enum ScriptedFailure {
    Transport(TransportError),
    GraphQl(GraphQlErrorEntry),
}

/// In-memory stand-in for the hosted GraphQL API. Root fields follow the
/// generated naming (`listContacts`, `getContacts`, `createContacts`, ...).
pub struct FakeBackend {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    calls: Mutex<HashMap<String, usize>>,
    failures: Mutex<HashMap<String, VecDeque<ScriptedFailure>>>,
    credentials: Mutex<Vec<String>>,
    sequence: Mutex<i64>,
    epoch: DateTime<Utc>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            tables: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
            credentials: Mutex::new(Vec::new()),
            sequence: Mutex::new(0),
            epoch: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        }
    }
}

#[allow(dead_code)]
impl FakeBackend {
    pub fn seed(&self, table: &str, row: Value) {
        let stamped = self.stamp_new(row);
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(stamped);
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn row(&self, table: &str, id: &str) -> Option<Value> {
        self.rows(table)
            .into_iter()
            .find(|row| row.get("id").and_then(Value::as_str) == Some(id))
    }

    pub fn calls(&self, field: &str) -> usize {
        self.calls.lock().unwrap().get(field).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    pub fn credential_modes(&self) -> Vec<String> {
        self.credentials.lock().unwrap().clone()
    }

    pub fn fail_next(&self, field: &str, failure: ScriptedFailure) {
        self.failures
            .lock()
            .unwrap()
            .entry(field.to_string())
            .or_default()
            .push_back(failure);
    }

    fn next_timestamp(&self) -> Value {
        let mut sequence = self.sequence.lock().unwrap();
        *sequence += 1;
        let at = self.epoch + chrono::Duration::seconds(*sequence);
        Value::String(at.to_rfc3339())
    }

    fn stamp_new(&self, mut row: Value) -> Value {
        let now = self.next_timestamp();
        if let Some(object) = row.as_object_mut() {
            object.entry("createdAt").or_insert_with(|| now.clone());
            object.insert("updatedAt".to_string(), now);
        }
        row
    }

    fn resolve(&self, field: &str, variables: &Value) -> Result<Value, GraphQlErrorEntry> {
        let (verb, table) = ["list", "get", "create", "update", "delete"]
            .iter()
            .find_map(|verb| field.strip_prefix(verb).map(|table| (*verb, table)))
            .ok_or_else(|| GraphQlErrorEntry::new("ValidationError", format!("unknown field {field}")))?;

        match verb {
            "list" => Ok(self.list(table, variables)),
            "get" => {
                let id = variables.get("id").and_then(Value::as_str).unwrap_or_default();
                Ok(self.row(table, id).unwrap_or(Value::Null))
            }
            "create" => self.create(table, variables),
            "update" => Ok(self.update(table, variables)),
            _ => Ok(self.delete(table, variables)),
        }
    }

    fn list(&self, table: &str, variables: &Value) -> Value {
        let filter = variables.get("filter").filter(|f| !f.is_null());
        let matching: Vec<Value> = self
            .rows(table)
            .into_iter()
            .filter(|row| filter.map(|f| matches_filter(row, f)).unwrap_or(true))
            .collect();
        let start = variables
            .get("nextToken")
            .and_then(Value::as_str)
            .and_then(|token| token.parse::<usize>().ok())
            .unwrap_or(0);
        let limit = variables
            .get("limit")
            .and_then(Value::as_u64)
            .map(|limit| limit as usize)
            .unwrap_or(100);
        let end = (start + limit).min(matching.len());
        let items: Vec<Value> = matching.get(start..end).map(<[Value]>::to_vec).unwrap_or_default();
        let next_token = (end < matching.len()).then(|| end.to_string());
        json!({ "items": items, "nextToken": next_token })
    }

    fn create(&self, table: &str, variables: &Value) -> Result<Value, GraphQlErrorEntry> {
        let input = variables.get("input").cloned().unwrap_or(Value::Null);
        let id = input.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        if self.row(table, &id).is_some() {
            return Err(GraphQlErrorEntry::new(
                "DynamoDB:ConditionalCheckFailedException",
                "The conditional request failed",
            ));
        }
        let stamped = self.stamp_new(input);
        self.tables
            .lock()
            .unwrap()
            .entry(table.to_string())
            .or_default()
            .push(stamped.clone());
        Ok(stamped)
    }

    fn update(&self, table: &str, variables: &Value) -> Value {
        let input = variables.get("input").cloned().unwrap_or(Value::Null);
        let id = input.get("id").and_then(Value::as_str).unwrap_or_default().to_string();
        let now = self.next_timestamp();
        let mut tables = self.tables.lock().unwrap();
        let Some(row) = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| row.get("id").and_then(Value::as_str) == Some(id.as_str())))
        else {
            return Value::Null;
        };
        if let (Some(target), Some(changes)) = (row.as_object_mut(), input.as_object()) {
            for (key, value) in changes {
                target.insert(key.clone(), value.clone());
            }
            target.insert("updatedAt".to_string(), now);
        }
        row.clone()
    }

    fn delete(&self, table: &str, variables: &Value) -> Value {
        let id = variables
            .pointer("/input/id")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let mut tables = self.tables.lock().unwrap();
        let Some(rows) = tables.get_mut(table) else {
            return Value::Null;
        };
        match rows.iter().position(|row| row.get("id").and_then(Value::as_str) == Some(id)) {
            Some(index) => rows.remove(index),
            None => Value::Null,
        }
    }
}

fn matches_filter(row: &Value, filter: &Value) -> bool {
    let Some(conditions) = filter.as_object() else {
        return true;
    };
    conditions.iter().all(|(key, condition)| match key.as_str() {
        "and" => condition
            .as_array()
            .map(|branches| branches.iter().all(|branch| matches_filter(row, branch)))
            .unwrap_or(true),
        "or" => condition
            .as_array()
            .map(|branches| branches.iter().any(|branch| matches_filter(row, branch)))
            .unwrap_or(true),
        "not" => !matches_filter(row, condition),
        field => {
            let actual = row.get(field).unwrap_or(&Value::Null);
            condition
                .as_object()
                .map(|ops| ops.iter().all(|(op, expected)| compare(actual, op, expected)))
                .unwrap_or(true)
        }
    })
}

fn compare(actual: &Value, op: &str, expected: &Value) -> bool {
    match op {
        "eq" => actual == expected,
        "ne" => actual != expected,
        "contains" => match (actual.as_str(), expected.as_str()) {
            (Some(actual), Some(expected)) => actual.contains(expected),
            _ => false,
        },
        "beginsWith" => match (actual.as_str(), expected.as_str()) {
            (Some(actual), Some(expected)) => actual.starts_with(expected),
            _ => false,
        },
        _ => false,
    }
}

#[async_trait]
impl GraphQlTransport for FakeBackend {
    async fn send(
        &self,
        operation: &Operation,
        credentials: &Credentials,
    ) -> Result<GraphQlResponse, TransportError> {
        *self
            .calls
            .lock()
            .unwrap()
            .entry(operation.field.clone())
            .or_default() += 1;
        self.credentials
            .lock()
            .unwrap()
            .push(credentials.mode().to_string());

        let scripted = self
            .failures
            .lock()
            .unwrap()
            .get_mut(&operation.field)
            .and_then(VecDeque::pop_front);
        match scripted {
            Some(ScriptedFailure::Transport(error)) => return Err(error),
            Some(ScriptedFailure::GraphQl(entry)) => {
                return Ok(GraphQlResponse {
                    data: None,
                    errors: vec![entry],
                })
            }
            None => {}
        }

        match self.resolve(&operation.field, &operation.variables) {
            Ok(value) => {
                let mut data = Map::new();
                data.insert(operation.field.clone(), value);
                Ok(GraphQlResponse {
                    data: Some(Value::Object(data)),
                    errors: Vec::new(),
                })
            }
            Err(entry) => Ok(GraphQlResponse {
                data: None,
                errors: vec![entry],
            }),
        }
    }
}

/// Clock the tests move by hand.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

#[allow(dead_code)]
impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(by).unwrap();
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Captures outbound messages. Scripted results are consumed first; once they
/// run out every send succeeds.
#[derive(Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<OutboundMessage>>,
    scripted: Mutex<VecDeque<Result<(), SendError>>>,
}

#[allow(dead_code)]
impl RecordingSender {
    pub fn script(&self, result: Result<(), SendError>) {
        self.scripted.lock().unwrap().push_back(result);
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        let result = self.scripted.lock().unwrap().pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.sent.lock().unwrap().push(message.clone());
        }
        result
    }
}

pub fn test_config() -> AppConfig {
    AppConfig {
        environment: AppEnvironment::Development,
        graphql_endpoint: "http://127.0.0.1:9/graphql".parse().unwrap(),
        graphql_api_key: "da2-test-public-key".to_string(),
        server_host: "127.0.0.1".to_string(),
        server_port: 0,
        cors_allowed_origin: None,
        graphql_max_attempts: 3,
        graphql_base_delay_ms: 1,
        graphql_backoff_multiplier: 2,
        graphql_timeout_ms: 1_000,
        cache_ttl_seconds: 300,
        notification_debug_mode: false,
        debug_email: None,
        debug_phone: None,
        admin_notification_email: Some("office@backoffice.test".to_string()),
        notification_max_retries: 3,
        notification_poll_interval_secs: 1,
        notification_batch_size: 25,
        smtp: None,
        sms: None,
    }
}

#[allow(dead_code)]
pub fn debug_config() -> AppConfig {
    AppConfig {
        notification_debug_mode: true,
        debug_email: Some(DEBUG_EMAIL.to_string()),
        debug_phone: Some(DEBUG_PHONE.to_string()),
        ..test_config()
    }
}

pub struct TestApp {
    pub state: AppState,
    pub backend: Arc<FakeBackend>,
    pub clock: Arc<ManualClock>,
    router: Router,
}

#[allow(dead_code)]
impl TestApp {
    pub fn new() -> Self {
        Self::with_config(test_config())
    }

    pub fn with_config(config: AppConfig) -> Self {
        let backend = Arc::new(FakeBackend::default());
        let clock = Arc::new(ManualClock::new());
        let transport: Arc<dyn GraphQlTransport> = backend.clone();
        let clock_for_state: Arc<dyn Clock> = clock.clone();
        let state = AppState::new(config, transport, clock_for_state, TemplateRegistry::builtin());
        let router = routes::create_router(state.clone());
        Self {
            state,
            backend,
            clock,
            router,
        }
    }

    pub fn seed_executive(&self, id: &str, name: &str, active: bool, order: i32) {
        self.backend.seed(
            "BackOfficeAssignTo",
            json!({
                "id": id,
                "name": name,
                "email": format!("{id}@backoffice.test"),
                "mobile": null,
                "active": active,
                "order": order,
                "sendEmailNotifications": true,
                "sendSmsNotifications": false,
            }),
        );
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::POST, path, payload, token).await
    }

    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        self.send_json(Method::PATCH, path, payload, token).await
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send_empty(Method::GET, path, token).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> Result<hyper::Response<Body>> {
        self.send_empty(Method::DELETE, path, token).await
    }

    async fn send_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let body = serde_json::to_vec(payload)?;
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("content-type", "application/json");
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::from(body))?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }

    async fn send_empty(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
    ) -> Result<hyper::Response<Body>> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {token}"));
        }
        let request = builder.body(Body::empty())?;
        Ok(self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("infallible response"))
    }
}

#[allow(dead_code)]
pub async fn body_to_vec(body: Body) -> Result<Vec<u8>> {
    let collected = body.collect().await?;
    Ok(collected.to_bytes().to_vec())
}

#[allow(dead_code)]
pub async fn body_json(body: Body) -> Result<Value> {
    Ok(serde_json::from_slice(&body_to_vec(body).await?)?)
}
