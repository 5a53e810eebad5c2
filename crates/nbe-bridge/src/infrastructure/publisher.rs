//! Publisher adapters for monitor output.
//!
//! The message-bus client lives outside this crate; these adapters cover
//! the two local needs.  [`LogPublisher`] writes each change to the log
//! under an MQTT-style topic, and [`ChannelPublisher`] forwards changes into
//! a Tokio channel for an in-process consumer.

use async_trait::async_trait;
use nbe_core::Value;
use tokio::sync::mpsc;
use tracing::info;

use crate::application::monitor::{PublishError, Publisher};

/// Logs every change as `<prefix>/<category>/<key> = <value>`.
#[derive(Debug, Clone)]
pub struct LogPublisher {
    prefix: String,
}

impl LogPublisher {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    pub fn topic(&self, category: &str, key: &str) -> String {
        format!("{}/{category}/{key}", self.prefix)
    }
}

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, category: &str, key: &str, value: &Value) -> Result<(), PublishError> {
        info!(topic = %self.topic(category, key), %value, "value changed");
        Ok(())
    }
}

/// One change notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub category: String,
    pub key: String,
    pub value: Value,
}

/// Forwards changes into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelPublisher {
    tx: mpsc::UnboundedSender<Publication>,
}

impl ChannelPublisher {
    /// Creates the publisher and the receiving end.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Publication>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Publisher for ChannelPublisher {
    async fn publish(&self, category: &str, key: &str, value: &Value) -> Result<(), PublishError> {
        self.tx
            .send(Publication {
                category: category.to_string(),
                key: key.to_string(),
                value: value.clone(),
            })
            .map_err(|_| PublishError("receiver dropped".into()))
    }
}
