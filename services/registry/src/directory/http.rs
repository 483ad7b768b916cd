//! Remote directory reached over the registry HTTP surface

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::{Directory, DirectoryError, Result};
use crate::types::{DirectoryEntry, GatewayPayload, GatewayReply, TokenUpdate};

pub struct HttpDirectory {
    http_client: Client,
    base_url: String,
    /// Token sent with writes when the caller supplies none
    write_token: Option<String>,
}

impl HttpDirectory {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            write_token: None,
        })
    }

    pub fn with_write_token(mut self, token: impl Into<String>) -> Self {
        self.write_token = Some(token.into());
        self
    }

    fn gateway_url(&self, name: &str) -> String {
        format!("{}/gateway/{}", self.base_url, urlencoding::encode(name))
    }

    /// Map a non-success response onto the directory error taxonomy
    async fn error_from(name: &str, response: Response) -> DirectoryError {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GatewayReply>(&text)
            .ok()
            .and_then(|r| r.error)
            .unwrap_or(text);

        match status {
            StatusCode::NOT_FOUND => DirectoryError::NotFound(name.to_string()),
            StatusCode::UNAUTHORIZED => DirectoryError::Unauthorized,
            _ => DirectoryError::Backend(format!("registry returned {}: {}", status, message)),
        }
    }
}

#[async_trait]
impl Directory for HttpDirectory {
    /// Remote replies carry only name and id; counters are not exposed
    async fn get(&self, name: &str) -> Result<DirectoryEntry> {
        let response = self.http_client.get(self.gateway_url(name)).send().await?;
        if !response.status().is_success() {
            return Err(Self::error_from(name, response).await);
        }

        let reply: GatewayReply = response.json().await?;
        if reply.gateway_id.is_empty() {
            return Err(DirectoryError::NotFound(name.to_string()));
        }
        Ok(DirectoryEntry {
            changes: 0,
            ..DirectoryEntry::new(&reply.gateway_name, &reply.gateway_id)
        })
    }

    async fn put(&self, name: &str, id: &str) -> Result<DirectoryEntry> {
        self.put_authorized(name, id, None).await
    }

    async fn put_authorized(
        &self,
        name: &str,
        id: &str,
        token: Option<&str>,
    ) -> Result<DirectoryEntry> {
        let token = token.or(self.write_token.as_deref());
        let payload = GatewayPayload::new(name, id, token);

        debug!(gateway = %name, url = %self.base_url, "Writing gateway to remote registry");
        let response = self
            .http_client
            .put(self.gateway_url(name))
            .json(&payload)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(name, response).await);
        }

        let reply: GatewayReply = response.json().await?;
        Ok(DirectoryEntry::new(&reply.gateway_name, &reply.gateway_id))
    }

    async fn put_token(&self, name: &str, token: &str) -> Result<()> {
        self.put_token_authorized(name, token, None).await
    }

    async fn put_token_authorized(
        &self,
        name: &str,
        token: &str,
        authorization: Option<&str>,
    ) -> Result<()> {
        let update = TokenUpdate {
            token: token.to_string(),
            write_token: authorization
                .or(self.write_token.as_deref())
                .map(str::to_string),
        };
        let response = self
            .http_client
            .put(format!("{}/token", self.gateway_url(name)))
            .json(&update)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from(name, response).await);
        }
        Ok(())
    }

    async fn dump(&self) -> Result<Vec<DirectoryEntry>> {
        let response = self
            .http_client
            .get(format!("{}/gateways", self.base_url))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_from("*", response).await);
        }
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_url_encodes_name() {
        let dir = HttpDirectory::new("http://registry:8080/", Duration::from_secs(1)).unwrap();
        assert_eq!(
            dir.gateway_url("123:eu-west-1:gw1"),
            "http://registry:8080/gateway/123%3Aeu-west-1%3Agw1"
        );
    }
}
