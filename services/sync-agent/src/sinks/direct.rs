//! Direct write into a directory backend

use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use gateway_registry::Directory;

use super::{GatewaySink, SinkError, SinkKind};

pub struct DirectSink {
    directory: Arc<dyn Directory>,
}

impl DirectSink {
    pub fn new(directory: Arc<dyn Directory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl GatewaySink for DirectSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Direct
    }

    async fn save(
        &self,
        key: &str,
        gateway_id: &str,
        token: Option<&str>,
    ) -> Result<(), SinkError> {
        let token = token.filter(|t| !t.is_empty());
        let entry = self.directory.put_authorized(key, gateway_id, token).await?;
        debug!(gateway = %key, changes = entry.changes, "Direct write applied");

        if let Some(token) = token {
            self.directory.put_token_authorized(key, token, Some(token)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_registry::MemoryDirectory;

    #[tokio::test]
    async fn test_direct_save_writes_id_and_token() {
        let directory = Arc::new(MemoryDirectory::new());
        let sink = DirectSink::new(directory.clone());

        sink.save("123:us-east-1:gw1", "id1", Some("t1")).await.unwrap();
        sink.save("123:us-east-1:gw1", "id2", None).await.unwrap();

        let entry = directory.get("123:us-east-1:gw1").await.unwrap();
        assert_eq!(entry.gateway_id, "id2");
        assert_eq!(entry.changes, 2);
        assert_eq!(entry.token.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_direct_save_surfaces_directory_errors() {
        let sink = DirectSink::new(Arc::new(MemoryDirectory::new()));
        assert!(matches!(
            sink.save("gw1", "", None).await,
            Err(SinkError::Directory(_))
        ));
    }
}
