use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::Channel;

pub mod email;
pub mod sms;
pub mod templates;

pub use email::SmtpEmailSender;
pub use sms::HttpSmsSender;
pub use templates::{RenderedMessage, Template, TemplateRegistry};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutboundMessage {
    pub channel: Channel,
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SendError {
    #[error("transient delivery failure: {0}")]
    Transient(String),
    #[error("permanent delivery failure: {0}")]
    Permanent(String),
}

#[async_trait]
pub trait NotificationSender: Send + Sync + 'static {
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError>;
}

/// Dispatches each message to the sender registered for its channel.
#[derive(Clone, Default)]
pub struct ChannelRouter {
    email: Option<Arc<dyn NotificationSender>>,
    sms: Option<Arc<dyn NotificationSender>>,
}

impl ChannelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_email(mut self, sender: Arc<dyn NotificationSender>) -> Self {
        self.email = Some(sender);
        self
    }

    pub fn with_sms(mut self, sender: Arc<dyn NotificationSender>) -> Self {
        self.sms = Some(sender);
        self
    }

    pub fn handles(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.email.is_some(),
            Channel::Sms => self.sms.is_some(),
        }
    }
}

#[async_trait]
impl NotificationSender for ChannelRouter {
    async fn send(&self, message: &OutboundMessage) -> Result<(), SendError> {
        let sender = match message.channel {
            Channel::Email => self.email.as_ref(),
            Channel::Sms => self.sms.as_ref(),
        };
        match sender {
            Some(sender) => sender.send(message).await,
            None => Err(SendError::Permanent(format!(
                "no sender configured for {} notifications",
                message.channel
            ))),
        }
    }
}
