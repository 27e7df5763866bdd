use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::{
    config::AppConfig,
    events::EventBus,
    graphql::{ClientMetrics, Credentials, GraphQlClient, GraphQlTransport, HttpTransport, RetryPolicy},
    notify::TemplateRegistry,
    repository::{Clock, Repositories, SystemClock},
    services::{NotificationSettings, ServiceShared, Services},
};

/// Process-wide context built once at startup. Cloning is cheap; every clone
/// shares the transport, caches, metrics, event bus and assignment cursor.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    client: GraphQlClient,
    repositories: Repositories,
    shared: ServiceShared,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        transport: Arc<dyn GraphQlTransport>,
        clock: Arc<dyn Clock>,
        templates: TemplateRegistry,
    ) -> Self {
        let client = GraphQlClient::new(
            transport,
            Credentials::ApiKey(config.graphql_api_key.clone()),
            RetryPolicy::from_config(&config),
            Arc::new(ClientMetrics::new()),
        );
        let repositories = Repositories::new(client.clone(), config.cache_ttl(), clock);
        let shared = ServiceShared::new(templates, NotificationSettings::from_config(&config));
        Self {
            config: Arc::new(config),
            client,
            repositories,
            shared,
        }
    }

    /// Wires the HTTP transport, system clock and built-in templates.
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let transport = HttpTransport::new(
            config.graphql_endpoint.clone(),
            Duration::from_millis(config.graphql_timeout_ms),
        )?;
        Ok(Self::new(
            config,
            Arc::new(transport),
            Arc::new(SystemClock),
            TemplateRegistry::builtin(),
        ))
    }

    pub fn client(&self) -> &GraphQlClient {
        &self.client
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repositories
    }

    pub fn metrics(&self) -> Arc<ClientMetrics> {
        self.client.metrics()
    }

    pub fn events(&self) -> &EventBus {
        &self.shared.events
    }

    pub fn templates(&self) -> Arc<TemplateRegistry> {
        self.shared.templates.clone()
    }

    /// Services acting with the public API key, for the intake forms.
    pub fn public_services(&self) -> Services {
        Services::new(&self.repositories, &self.shared)
    }

    /// Services acting as the caller. Caches are still shared.
    pub fn services_for(&self, credentials: Credentials) -> Services {
        let client = self.client.with_credentials(credentials);
        Services::new(&self.repositories.with_client(client), &self.shared)
    }
}
