// Third Party
use async_trait::async_trait;
use k8s_openapi::api::core::v1::Event;
use serde::Serialize;
use tokio::io::{self, AsyncWrite, AsyncWriteExt, Stdout};

// Local
use crate::informer::Notification;

/// Destination for routed event notifications.
#[async_trait]
pub trait Sink: Send + 'static {
    async fn route(&mut self, notification: &Notification) -> Result<(), anyhow::Error>;
}

/// One routed notification, as written by `JsonSink`.
#[derive(Serialize)]
struct Record<'a> {
    verb: &'static str,
    event: &'a Event,
    #[serde(skip_serializing_if = "Option::is_none")]
    old_event: Option<&'a Event>,
}

impl<'a> From<&'a Notification> for Record<'a> {
    fn from(notification: &'a Notification) -> Self {
        let (event, old_event) = match notification {
            Notification::Added(new) => (new.as_ref(), None),
            Notification::Updated { old, new } => (new.as_ref(), Some(old.as_ref())),
            Notification::Deleted(old) => (old.as_ref(), None),
        };
        Record {
            verb: notification.verb(),
            event,
            old_event,
        }
    }
}

/// Writes every notification as a single line of JSON.
pub struct JsonSink<W> {
    writer: W,
}

impl JsonSink<Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: AsyncWrite + Unpin> JsonSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }
}

#[async_trait]
impl<W: AsyncWrite + Unpin + Send + 'static> Sink for JsonSink<W> {
    async fn route(&mut self, notification: &Notification) -> Result<(), anyhow::Error> {
        let mut line = serde_json::to_vec(&Record::from(notification))?;
        line.push(b'\n');
        self.writer.write_all(&line).await?;
        self.writer.flush().await?;
        Ok(())
    }
}
