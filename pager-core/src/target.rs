//! Notification targets
//!
//! A [`Target`] is one destination in an escalation level (an email address,
//! a phone number). The engine addresses every target through the same
//! `send` capability; channel-specific rendering lives in [`MailTarget`] and
//! [`SmsTarget`], and the bytes-on-the-wire step is delegated to a
//! [`Transport`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::alert::Alert;

/// Maximum characters in a single SMS body
pub const SMS_MAX_CHARS: usize = 160;

/// Errors from a single delivery attempt
#[derive(Debug, Clone, Error)]
pub enum DeliveryError {
    #[error("{channel} transport rejected message to {destination}: {reason}")]
    Rejected {
        channel: Channel,
        destination: String,
        reason: String,
    },

    #[error("{channel} transport unavailable: {reason}")]
    Unavailable { channel: Channel, reason: String },
}

/// Delivery channel of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Mail,
    Sms,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mail => write!(f, "mail"),
            Self::Sms => write!(f, "sms"),
        }
    }
}

/// A rendered message ready for a transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub channel: Channel,
    pub destination: String,
    pub subject: Option<String>,
    pub body: String,
}

/// Trait for notification destinations
#[async_trait]
pub trait Target: Send + Sync {
    /// Channel this target delivers through
    fn channel(&self) -> Channel;

    /// Destination address or number
    fn value(&self) -> &str;

    /// Attempt to deliver the alert
    async fn send(&self, alert: &Alert) -> Result<(), DeliveryError>;
}

/// Trait for the network step of a channel (SMTP relay, SMS gateway, ...)
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError>;
}

/// Transport that only records the outbound message in the log
#[derive(Debug, Clone, Default)]
pub struct LogTransport;

#[async_trait]
impl Transport for LogTransport {
    async fn deliver(&self, message: &OutboundMessage) -> Result<(), DeliveryError> {
        info!(
            channel = %message.channel,
            destination = %message.destination,
            subject = message.subject.as_deref().unwrap_or(""),
            body = %message.body,
            "Page delivered"
        );
        Ok(())
    }
}

/// Email target
pub struct MailTarget {
    address: String,
    transport: Arc<dyn Transport>,
}

impl MailTarget {
    pub fn new(address: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            address: address.into(),
            transport,
        }
    }

    fn render(&self, alert: &Alert) -> OutboundMessage {
        OutboundMessage {
            channel: Channel::Mail,
            destination: self.address.clone(),
            subject: Some(format!("[{}] alert {}", alert.service_id, alert.id)),
            body: format!(
                "Service {} reported a problem.\n\nAlert: {}\nMessage: {}\n\nAcknowledge to stop escalation.",
                alert.service_id, alert.id, alert.message
            ),
        }
    }
}

#[async_trait]
impl Target for MailTarget {
    fn channel(&self) -> Channel {
        Channel::Mail
    }

    fn value(&self) -> &str {
        &self.address
    }

    async fn send(&self, alert: &Alert) -> Result<(), DeliveryError> {
        debug!(alert = %alert.key(), to = %self.address, "Sending mail page");
        self.transport.deliver(&self.render(alert)).await
    }
}

/// SMS target
pub struct SmsTarget {
    number: String,
    transport: Arc<dyn Transport>,
}

impl SmsTarget {
    pub fn new(number: impl Into<String>, transport: Arc<dyn Transport>) -> Self {
        Self {
            number: number.into(),
            transport,
        }
    }

    fn render(&self, alert: &Alert) -> OutboundMessage {
        let text = format!("[{}] {} ({})", alert.service_id, alert.message, alert.id);
        let text = text.replace('\n', " ");
        OutboundMessage {
            channel: Channel::Sms,
            destination: self.number.clone(),
            subject: None,
            body: text.chars().take(SMS_MAX_CHARS).collect(),
        }
    }
}

#[async_trait]
impl Target for SmsTarget {
    fn channel(&self) -> Channel {
        Channel::Sms
    }

    fn value(&self) -> &str {
        &self.number
    }

    async fn send(&self, alert: &Alert) -> Result<(), DeliveryError> {
        debug!(alert = %alert.key(), to = %self.number, "Sending SMS page");
        self.transport.deliver(&self.render(alert)).await
    }
}

/// Builds targets from configured `(channel, value)` pairs
pub trait TargetFactory: Send + Sync {
    fn build(&self, channel: Channel, value: &str) -> Arc<dyn Target>;
}

/// Factory wiring each channel to one shared transport
#[derive(Clone)]
pub struct TransportTargetFactory {
    mail: Arc<dyn Transport>,
    sms: Arc<dyn Transport>,
}

impl TransportTargetFactory {
    pub fn new(mail: Arc<dyn Transport>, sms: Arc<dyn Transport>) -> Self {
        Self { mail, sms }
    }

    /// Both channels go to the log
    pub fn logging() -> Self {
        let transport: Arc<dyn Transport> = Arc::new(LogTransport);
        Self::new(transport.clone(), transport)
    }
}

impl TargetFactory for TransportTargetFactory {
    fn build(&self, channel: Channel, value: &str) -> Arc<dyn Target> {
        match channel {
            Channel::Mail => Arc::new(MailTarget::new(value, self.mail.clone())),
            Channel::Sms => Arc::new(SmsTarget::new(value, self.sms.clone())),
        }
    }
}
