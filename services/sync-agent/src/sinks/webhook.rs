//! Webhook sink: synchronous PUT against a registry HTTP surface

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use gateway_registry::{GatewayPayload, GatewayReply};

use super::{GatewaySink, SinkError, SinkKind};

pub struct WebhookSink {
    http_client: Client,
    base_url: String,
}

impl WebhookSink {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SinkError> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn gateway_url(&self, key: &str) -> String {
        format!("{}/gateway/{}", self.base_url, urlencoding::encode(key))
    }
}

#[async_trait]
impl GatewaySink for WebhookSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Webhook
    }

    async fn save(
        &self,
        key: &str,
        gateway_id: &str,
        token: Option<&str>,
    ) -> Result<(), SinkError> {
        let payload = GatewayPayload::new(key, gateway_id, token);

        let response = self
            .http_client
            .put(self.gateway_url(key))
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<GatewayReply>(&text)
                .ok()
                .and_then(|r| r.error)
                .unwrap_or(text);
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        debug!(gateway = %key, status = %status, "Webhook accepted gateway");
        Ok(())
    }
}
