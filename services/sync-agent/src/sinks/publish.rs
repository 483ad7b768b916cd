//! Message-style sinks: queue, topic and function invocation
//!
//! These only deliver an envelope; applying it to the directory happens
//! on the consumer side.

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use gateway_registry::GatewayPayload;

use super::{GatewaySink, SinkError, SinkKind};

/// Carries serialized envelopes to an external system
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, body: Vec<u8>) -> Result<(), SinkError>;
}

/// POSTs envelopes to an ingestion endpoint
pub struct HttpTransport {
    http_client: Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, SinkError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http_client,
            url: url.to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, body: Vec<u8>) -> Result<(), SinkError> {
        let response = self
            .http_client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(())
    }
}

/// In-process queue backed by a bounded tokio channel
#[derive(Clone)]
pub struct ChannelTransport {
    tx: mpsc::Sender<Vec<u8>>,
}

impl ChannelTransport {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Vec<u8>>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn deliver(&self, body: Vec<u8>) -> Result<(), SinkError> {
        self.tx
            .send(body)
            .await
            .map_err(|_| SinkError::Transport("queue consumer has gone away".to_string()))
    }
}

/// Message framing per sink variant
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// Bare payload as the message body
    Queue,
    /// `{topic, message}` with the payload as a JSON string
    Topic { topic: String },
    /// `{action: "save", payload}`
    Function,
}

#[derive(Serialize)]
struct TopicMessage<'a> {
    topic: &'a str,
    message: String,
}

#[derive(Serialize)]
struct FunctionInvocation<'a> {
    action: &'static str,
    payload: &'a GatewayPayload,
}

impl Envelope {
    pub fn encode(&self, payload: &GatewayPayload) -> Result<Vec<u8>, SinkError> {
        let body = match self {
            Envelope::Queue => serde_json::to_vec(payload)?,
            Envelope::Topic { topic } => serde_json::to_vec(&TopicMessage {
                topic,
                message: serde_json::to_string(payload)?,
            })?,
            Envelope::Function => serde_json::to_vec(&FunctionInvocation {
                action: "save",
                payload,
            })?,
        };
        Ok(body)
    }

    fn kind(&self) -> SinkKind {
        match self {
            Envelope::Queue => SinkKind::Queue,
            Envelope::Topic { .. } => SinkKind::Topic,
            Envelope::Function => SinkKind::Function,
        }
    }
}

pub struct PublishSink {
    envelope: Envelope,
    transport: Arc<dyn Transport>,
}

impl PublishSink {
    pub fn new(envelope: Envelope, transport: Arc<dyn Transport>) -> Self {
        Self {
            envelope,
            transport,
        }
    }
}

#[async_trait]
impl GatewaySink for PublishSink {
    fn kind(&self) -> SinkKind {
        self.envelope.kind()
    }

    async fn save(
        &self,
        key: &str,
        gateway_id: &str,
        token: Option<&str>,
    ) -> Result<(), SinkError> {
        let payload = GatewayPayload::new(key, gateway_id, token);
        let body = self.envelope.encode(&payload)?;
        self.transport.deliver(body).await?;
        debug!(gateway = %key, sink = %self.kind(), "Envelope delivered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_queue_delivers_bare_payload() {
        let (transport, mut rx) = ChannelTransport::channel(4);
        let sink = PublishSink::new(Envelope::Queue, Arc::new(transport));

        sink.save("123:us-east-1:gw1", "id1", None).await.unwrap();

        let body = rx.recv().await.unwrap();
        let payload: GatewayPayload = serde_json::from_slice(&body).unwrap();
        assert_eq!(payload, GatewayPayload::new("123:us-east-1:gw1", "id1", None));
    }

    #[tokio::test]
    async fn test_topic_wraps_payload_as_string() {
        let (transport, mut rx) = ChannelTransport::channel(4);
        let sink = PublishSink::new(
            Envelope::Topic {
                topic: "gateways".to_string(),
            },
            Arc::new(transport),
        );
        assert_eq!(sink.kind(), SinkKind::Topic);

        sink.save("gw1", "id1", Some("t")).await.unwrap();

        let body: serde_json::Value = serde_json::from_slice(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(body["topic"], "gateways");
        let inner: GatewayPayload =
            serde_json::from_str(body["message"].as_str().unwrap()).unwrap();
        assert_eq!(inner.token.as_deref(), Some("t"));
    }

    #[tokio::test]
    async fn test_function_invocation_shape() {
        let (transport, mut rx) = ChannelTransport::channel(4);
        let sink = PublishSink::new(Envelope::Function, Arc::new(transport));

        sink.save("gw1", "id1", None).await.unwrap();

        let body: serde_json::Value = serde_json::from_slice(&rx.recv().await.unwrap()).unwrap();
        assert_eq!(body["action"], "save");
        assert_eq!(body["payload"]["gateway_id"], "id1");
    }

    #[tokio::test]
    async fn test_closed_queue_is_transport_error() {
        let (transport, rx) = ChannelTransport::channel(1);
        drop(rx);
        let sink = PublishSink::new(Envelope::Queue, Arc::new(transport));

        assert!(matches!(
            sink.save("gw1", "id1", None).await,
            Err(SinkError::Transport(_))
        ));
    }
}
