//! Propagation Sinks
//!
//! Every sink exposes one capability, `save(key, gateway_id, token)`.
//! The variant is picked at configuration time and owns its transport.
//!
//! - **direct**: writes into a directory backend (`put` then `put_token`)
//! - **webhook**: synchronous HTTP PUT against a registry
//! - **queue / topic / function**: hand an envelope to a transport,
//!   delivery only, the directory applies it asynchronously

mod direct;
mod publish;
mod webhook;

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use gateway_registry::{DirectoryError, DirectoryLocation};

pub use direct::DirectSink;
pub use publish::{ChannelTransport, Envelope, HttpTransport, PublishSink, Transport};
pub use webhook::WebhookSink;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("rejected with status {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("save timed out")]
    Timeout,

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("directory error: {0}")]
    Directory(#[from] DirectoryError),

    #[error("sink misconfigured: {0}")]
    Config(String),
}

impl From<reqwest::Error> for SinkError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            SinkError::Timeout
        } else {
            SinkError::Transport(e.to_string())
        }
    }
}

#[async_trait]
pub trait GatewaySink: Send + Sync {
    /// Short label for logs
    fn kind(&self) -> SinkKind;

    /// Persist or forward one `key -> gateway_id` mapping
    async fn save(&self, key: &str, gateway_id: &str, token: Option<&str>) -> Result<(), SinkError>;
}

/// Sink variant selected at configuration time
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SinkKind {
    Direct,
    Webhook,
    Queue,
    Topic,
    Function,
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkKind::Direct => write!(f, "direct"),
            SinkKind::Webhook => write!(f, "webhook"),
            SinkKind::Queue => write!(f, "queue"),
            SinkKind::Topic => write!(f, "topic"),
            SinkKind::Function => write!(f, "function"),
        }
    }
}

/// Settings needed to build any sink variant
#[derive(Debug, Clone)]
pub struct SinkSettings {
    pub kind: SinkKind,
    /// Directory location for the direct sink
    pub directory: Option<String>,
    /// Registry base URL for webhook, ingestion URL for publish sinks
    pub url: Option<String>,
    /// Topic name for the topic sink
    pub topic: Option<String>,
    /// Shared write token for the direct sink's remote directory
    pub write_token: Option<String>,
    pub timeout: Duration,
}

/// Build the configured sink
pub async fn build_sink(settings: &SinkSettings) -> Result<Arc<dyn GatewaySink>, SinkError> {
    let require_url = || {
        settings
            .url
            .clone()
            .ok_or_else(|| SinkError::Config(format!("{} sink needs --sink-url", settings.kind)))
    };

    let sink: Arc<dyn GatewaySink> = match settings.kind {
        SinkKind::Direct => {
            let location: DirectoryLocation = settings
                .directory
                .as_deref()
                .ok_or_else(|| SinkError::Config("direct sink needs --directory".to_string()))?
                .parse()?;
            let directory = location
                .open(settings.timeout, settings.write_token.as_deref())
                .await?;
            Arc::new(DirectSink::new(directory))
        }
        SinkKind::Webhook => Arc::new(WebhookSink::new(&require_url()?, settings.timeout)?),
        SinkKind::Queue => Arc::new(PublishSink::new(
            Envelope::Queue,
            Arc::new(HttpTransport::new(&require_url()?, settings.timeout)?),
        )),
        SinkKind::Topic => {
            let topic = settings
                .topic
                .clone()
                .ok_or_else(|| SinkError::Config("topic sink needs --topic".to_string()))?;
            Arc::new(PublishSink::new(
                Envelope::Topic { topic },
                Arc::new(HttpTransport::new(&require_url()?, settings.timeout)?),
            ))
        }
        SinkKind::Function => Arc::new(PublishSink::new(
            Envelope::Function,
            Arc::new(HttpTransport::new(&require_url()?, settings.timeout)?),
        )),
    };
    Ok(sink)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(kind: SinkKind) -> SinkSettings {
        SinkSettings {
            kind,
            directory: None,
            url: None,
            topic: None,
            write_token: None,
            timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn test_build_requires_settings() {
        assert!(matches!(
            build_sink(&settings(SinkKind::Direct)).await,
            Err(SinkError::Config(_))
        ));
        assert!(matches!(
            build_sink(&settings(SinkKind::Webhook)).await,
            Err(SinkError::Config(_))
        ));

        let mut topic = settings(SinkKind::Topic);
        topic.url = Some("http://bus:9000/publish".to_string());
        assert!(matches!(build_sink(&topic).await, Err(SinkError::Config(_))));
    }

    #[tokio::test]
    async fn test_build_each_kind() {
        let mut direct = settings(SinkKind::Direct);
        direct.directory = Some("memory://".to_string());
        assert_eq!(build_sink(&direct).await.unwrap().kind(), SinkKind::Direct);

        for kind in [SinkKind::Webhook, SinkKind::Queue, SinkKind::Function] {
            let mut s = settings(kind);
            s.url = Some("http://localhost:9000".to_string());
            assert_eq!(build_sink(&s).await.unwrap().kind(), kind);
        }

        let mut topic = settings(SinkKind::Topic);
        topic.url = Some("http://localhost:9000".to_string());
        topic.topic = Some("gateways".to_string());
        assert_eq!(build_sink(&topic).await.unwrap().kind(), SinkKind::Topic);
    }
}
