use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing_subscriber::EnvFilter;

use backoffice::{
    config::AppConfig,
    graphql::{ClientMetrics, Credentials, GraphQlClient, HttpTransport, RetryPolicy},
    notify::{ChannelRouter, HttpSmsSender, SmtpEmailSender, TemplateRegistry},
    DispatchSettings, DispatchWorker,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!(
        component = "dispatcher",
        graphql_endpoint = %config.redacted_endpoint(),
        smtp_enabled = config.smtp.is_some(),
        sms_enabled = config.sms.is_some(),
        max_retries = config.notification_max_retries,
        "loaded backoffice configuration"
    );

    let transport = HttpTransport::new(
        config.graphql_endpoint.clone(),
        Duration::from_millis(config.graphql_timeout_ms),
    )?;
    let client = GraphQlClient::new(
        Arc::new(transport),
        Credentials::ApiKey(config.graphql_api_key.clone()),
        RetryPolicy::from_config(&config),
        Arc::new(ClientMetrics::new()),
    );

    let mut router = ChannelRouter::new();
    if let Some(smtp) = config.smtp.as_ref() {
        router = router.with_email(Arc::new(SmtpEmailSender::from_settings(smtp)?));
    }
    if let Some(sms) = config.sms.as_ref() {
        router = router.with_sms(Arc::new(HttpSmsSender::from_settings(sms)?));
    }

    let worker = DispatchWorker::new(
        client,
        Arc::new(TemplateRegistry::builtin()),
        Arc::new(router),
        DispatchSettings::from_config(&config),
    );

    tokio::select! {
        _ = worker.run() => {}
        _ = signal::ctrl_c() => {
            tracing::info!("dispatcher received shutdown signal");
        }
    }

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}
