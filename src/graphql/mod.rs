use serde::{Deserialize, Serialize};
use serde_json::Value;

pub mod client;
pub mod metrics;
pub mod transport;

pub use client::{GraphQlClient, RetryPolicy};
pub use metrics::{ClientMetrics, OperationStats};
pub use transport::{Credentials, GraphQlTransport, HttpTransport, TransportError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Query,
    Mutation,
}

/// A single root-field operation. `field` names the root field whose value is
/// the operation result (for example `listRequests`).
#[derive(Clone, Debug)]
pub struct Operation {
    pub kind: OperationKind,
    pub field: String,
    pub document: String,
    pub variables: Value,
}

impl Operation {
    pub fn query(field: impl Into<String>, document: impl Into<String>, variables: Value) -> Self {
        Self {
            kind: OperationKind::Query,
            field: field.into(),
            document: document.into(),
            variables,
        }
    }

    pub fn mutation(
        field: impl Into<String>,
        document: impl Into<String>,
        variables: Value,
    ) -> Self {
        Self {
            kind: OperationKind::Mutation,
            field: field.into(),
            document: document.into(),
            variables,
        }
    }

    pub fn is_write(&self) -> bool {
        self.kind == OperationKind::Mutation
    }
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct GraphQlResponse {
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub errors: Vec<GraphQlErrorEntry>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphQlErrorEntry {
    pub message: String,
    #[serde(default)]
    pub error_type: Option<String>,
}

impl GraphQlErrorEntry {
    pub fn new(error_type: &str, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            error_type: Some(error_type.to_string()),
        }
    }
}
