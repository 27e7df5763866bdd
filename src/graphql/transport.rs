use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use url::Url;

use super::{GraphQlResponse, Operation};

#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// Service-level key used by the public intake forms.
    ApiKey(String),
    /// Token of a signed-in admin user.
    UserSession(String),
}

impl Credentials {
    pub fn mode(&self) -> &'static str {
        match self {
            Credentials::ApiKey(_) => "api_key",
            Credentials::UserSession(_) => "user_session",
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Credentials({})", self.mode())
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("backend responded with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("could not decode backend response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait GraphQlTransport: Send + Sync + 'static {
    async fn send(
        &self,
        operation: &Operation,
        credentials: &Credentials,
    ) -> Result<GraphQlResponse, TransportError>;
}

pub struct HttpTransport {
    client: Client,
    endpoint: Url,
}

impl HttpTransport {
    pub fn new(endpoint: Url, timeout: Duration) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl GraphQlTransport for HttpTransport {
    async fn send(
        &self,
        operation: &Operation,
        credentials: &Credentials,
    ) -> Result<GraphQlResponse, TransportError> {
        let body = json!({
            "query": operation.document,
            "variables": operation.variables,
        });

        let mut request = self.client.post(self.endpoint.clone()).json(&body);
        request = match credentials {
            Credentials::ApiKey(key) => request.header("x-api-key", key),
            Credentials::UserSession(token) => request.bearer_auth(token),
        };

        let response = request.send().await.map_err(|err| {
            if err.is_timeout() {
                TransportError::Timeout
            } else {
                TransportError::Connect(err.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<GraphQlResponse>()
            .await
            .map_err(|err| TransportError::Decode(err.to_string()))
    }
}
