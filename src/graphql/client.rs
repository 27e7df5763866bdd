use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};

use crate::config::AppConfig;
use crate::error::{DataError, DataResult};

use super::{
    ClientMetrics, Credentials, GraphQlErrorEntry, GraphQlTransport, Operation, TransportError,
};

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub multiplier: u32,
    pub attempt_timeout: Duration,
    pub retryable: fn(&DataError) -> bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(300),
            multiplier: 2,
            attempt_timeout: Duration::from_secs(10),
            retryable: DataError::is_transient,
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            max_attempts: config.graphql_max_attempts.max(1),
            base_delay: Duration::from_millis(config.graphql_base_delay_ms),
            multiplier: config.graphql_backoff_multiplier.max(1),
            attempt_timeout: Duration::from_millis(config.graphql_timeout_ms),
            retryable: DataError::is_transient,
        }
    }

    /// Delay before the attempt that follows failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.multiplier.saturating_pow(exponent);
        self.base_delay.saturating_mul(factor)
    }
}

#[derive(Clone)]
pub struct GraphQlClient {
    transport: Arc<dyn GraphQlTransport>,
    credentials: Credentials,
    policy: RetryPolicy,
    metrics: Arc<ClientMetrics>,
}

impl GraphQlClient {
    pub fn new(
        transport: Arc<dyn GraphQlTransport>,
        credentials: Credentials,
        policy: RetryPolicy,
        metrics: Arc<ClientMetrics>,
    ) -> Self {
        Self {
            transport,
            credentials,
            policy,
            metrics,
        }
    }

    pub fn with_credentials(&self, credentials: Credentials) -> Self {
        Self {
            credentials,
            ..self.clone()
        }
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn metrics(&self) -> Arc<ClientMetrics> {
        self.metrics.clone()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs the operation, retrying transient failures with exponential backoff.
    /// Returns the value of the operation's root field (`Value::Null` when absent).
    pub async fn execute(&self, operation: &Operation) -> DataResult<Value> {
        let started = Instant::now();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            match self.attempt(operation).await {
                Ok(value) => {
                    self.metrics
                        .record(&operation.field, "ok", attempt, started.elapsed());
                    debug!(operation = %operation.field, attempt, "graphql operation succeeded");
                    return Ok(value);
                }
                Err(err) if attempt < max_attempts && (self.policy.retryable)(&err) => {
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        operation = %operation.field,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "graphql operation failed; retrying"
                    );
                    sleep(delay).await;
                }
                Err(err) => {
                    self.metrics.record(
                        &operation.field,
                        err.kind().as_str(),
                        attempt,
                        started.elapsed(),
                    );
                    error!(
                        operation = %operation.field,
                        attempt,
                        kind = err.kind().as_str(),
                        error = %err,
                        "graphql operation failed"
                    );
                    return Err(err);
                }
            }
        }
    }

    pub async fn execute_as<T: DeserializeOwned>(&self, operation: &Operation) -> DataResult<T> {
        let value = self.execute(operation).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn attempt(&self, operation: &Operation) -> DataResult<Value> {
        let send = self.transport.send(operation, &self.credentials);
        let response = match timeout(self.policy.attempt_timeout, send).await {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => return Err(classify_transport_error(err)),
            Err(_) => return Err(DataError::Network("attempt timed out".to_string())),
        };

        if !response.errors.is_empty() {
            return Err(classify_graphql_errors(&response.errors));
        }

        let data = response
            .data
            .ok_or_else(|| DataError::Unknown("response carried no data".to_string()))?;
        Ok(data.get(&operation.field).cloned().unwrap_or(Value::Null))
    }
}

pub(crate) fn classify_transport_error(error: TransportError) -> DataError {
    match error {
        TransportError::Timeout => DataError::Network("request timed out".to_string()),
        TransportError::Connect(message) => DataError::Network(message),
        TransportError::Status { status, body } => match status {
            401 | 403 => DataError::Auth(body),
            400 | 422 => DataError::Validation(crate::error::ValidationErrors::single(
                "request", body,
            )),
            404 => DataError::NotFound(body),
            409 => DataError::Conflict(body),
            408 | 429 | 500..=599 => DataError::Network(format!("status {status}: {body}")),
            _ => DataError::Unknown(format!("status {status}: {body}")),
        },
        TransportError::Decode(message) => DataError::Unknown(message),
    }
}

pub(crate) fn classify_graphql_errors(errors: &[GraphQlErrorEntry]) -> DataError {
    let message = errors
        .iter()
        .map(|error| error.message.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    let error_type = errors
        .iter()
        .find_map(|error| error.error_type.as_deref())
        .unwrap_or_default();

    if error_type.contains("Unauthorized") || error_type.contains("AccessDenied") {
        DataError::Auth(message)
    } else if error_type.contains("ConditionalCheckFailed") {
        DataError::Conflict(message)
    } else if error_type.contains("Throttl")
        || error_type.contains("ProvisionedThroughputExceeded")
        || error_type.contains("ServiceUnavailable")
        || error_type.contains("InternalFailure")
    {
        DataError::Network(message)
    } else if error_type.contains("Validation")
        || error_type.contains("BadRequest")
        || error_type.contains("MappingTemplate")
    {
        DataError::Validation(crate::error::ValidationErrors::single("request", message))
    } else if error_type.contains("NotFound") {
        DataError::NotFound(message)
    } else {
        DataError::Unknown(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn backoff_grows_exponentially() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(300));
        assert_eq!(policy.delay_after(2), Duration::from_millis(600));
        assert_eq!(policy.delay_after(3), Duration::from_millis(1200));
    }

    #[test]
    fn classifies_http_statuses() {
        let kind = |status| {
            classify_transport_error(TransportError::Status {
                status,
                body: String::new(),
            })
            .kind()
        };
        assert_eq!(kind(401), ErrorKind::Auth);
        assert_eq!(kind(403), ErrorKind::Auth);
        assert_eq!(kind(400), ErrorKind::Validation);
        assert_eq!(kind(404), ErrorKind::NotFound);
        assert_eq!(kind(409), ErrorKind::Conflict);
        assert_eq!(kind(429), ErrorKind::Network);
        assert_eq!(kind(503), ErrorKind::Network);
        assert_eq!(kind(418), ErrorKind::Unknown);
        assert_eq!(
            classify_transport_error(TransportError::Timeout).kind(),
            ErrorKind::Network
        );
    }

    #[test]
    fn classifies_graphql_error_types() {
        let kind = |error_type: &str| {
            classify_graphql_errors(&[GraphQlErrorEntry::new(error_type, "failed")]).kind()
        };
        assert_eq!(kind("Unauthorized"), ErrorKind::Auth);
        assert_eq!(
            kind("DynamoDB:ConditionalCheckFailedException"),
            ErrorKind::Conflict
        );
        assert_eq!(
            kind("DynamoDB:ProvisionedThroughputExceededException"),
            ErrorKind::Network
        );
        assert_eq!(kind("ValidationError"), ErrorKind::Validation);
        assert_eq!(kind("SomethingElse"), ErrorKind::Unknown);
    }
}
