use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, StatusCode};
use url::form_urlencoded;

use crate::config::SmsSettings;

use super::{NotificationSender, OutboundMessage, SendError};

const SMS_TIMEOUT: Duration = Duration::from_secs(15);

/// Posts to a Twilio-compatible `Accounts/{sid}/Messages.json` endpoint.
pub struct HttpSmsSender {
    http: Client,
    messages_url: String,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl HttpSmsSender {
    pub fn from_settings(settings: &SmsSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(SMS_TIMEOUT)
            .build()
            .context("failed to build SMS HTTP client")?;
        let messages_url = format!(
            "{}/2010-04-01/Accounts/{}/Messages.json",
            settings.api_base.trim_end_matches('/'),
            settings.account_sid
        );
        Ok(Self {
            http,
            messages_url,
            account_sid: settings.account_sid.clone(),
            auth_token: settings.auth_token.clone(),
            from_number: settings.from_number.clone(),
        })
    }
}

#[async_trait]
impl NotificationSender for HttpSmsSender {
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        let form = form_urlencoded::Serializer::new(String::new())
            .append_pair("To", &message.recipient)
            .append_pair("From", &self.from_number)
            .append_pair("Body", &message.body)
            .finish();
        let response = self
            .http
            .post(&self.messages_url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(form)
            .send()
            .await
            .map_err(|err| SendError::Transient(format!("SMS request failed: {err}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }
        let body = response.text().await.unwrap_or_default();
        let detail = format!("SMS provider returned {status}: {body}");
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            Err(SendError::Transient(detail))
        } else {
            Err(SendError::Permanent(detail))
        }
    }
}
