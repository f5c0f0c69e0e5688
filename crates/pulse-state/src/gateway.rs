//! StatusGateway: bootstrap-aware access to persisted target status.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::StateResult;
use crate::status::PersistedStatus;
use crate::store::StatusStore;

/// Reads and writes one status value per target key.
///
/// An absent key is not an error: the gateway initializes it to
/// `Unknown` and reports `Unknown`. Writes are unconditional
/// (last write wins).
#[derive(Clone)]
pub struct StatusGateway {
    store: Arc<dyn StatusStore>,
}

impl StatusGateway {
    pub fn new(store: Arc<dyn StatusStore>) -> Self {
        Self { store }
    }

    /// Read the status for `key`, initializing it to `Unknown` if absent.
    pub async fn get_status(&self, key: &str) -> StateResult<PersistedStatus> {
        match self.store.get(key).await? {
            Some(status) => {
                debug!(%key, %status, "status read");
                Ok(status)
            }
            None => {
                info!(%key, "no status recorded, initializing to Unknown");
                self.store.put(key, PersistedStatus::Unknown).await?;
                Ok(PersistedStatus::Unknown)
            }
        }
    }

    /// Overwrite the status for `key` and return the value the store holds.
    pub async fn set_status(
        &self,
        key: &str,
        status: PersistedStatus,
    ) -> StateResult<PersistedStatus> {
        let stored = self.store.put(key, status).await?;
        info!(%key, %stored, "status updated");
        Ok(stored)
    }

    /// Read without bootstrapping; absent keys stay absent.
    pub async fn peek_status(&self, key: &str) -> StateResult<Option<PersistedStatus>> {
        self.store.get(key).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redb_store::RedbStore;

    fn gateway() -> (StatusGateway, RedbStore) {
        let store = RedbStore::open_in_memory().unwrap();
        (StatusGateway::new(Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn absent_key_bootstraps_unknown() {
        let (gateway, store) = gateway();

        assert_eq!(gateway.get_status("K").await.unwrap(), PersistedStatus::Unknown);
        assert_eq!(store.get("K").await.unwrap(), Some(PersistedStatus::Unknown));
    }

    #[tokio::test]
    async fn present_key_is_returned_as_is() {
        let (gateway, store) = gateway();
        store.put("K", PersistedStatus::Stopping).await.unwrap();

        assert_eq!(gateway.get_status("K").await.unwrap(), PersistedStatus::Stopping);
    }

    #[tokio::test]
    async fn set_status_overwrites() {
        let (gateway, _) = gateway();
        gateway.get_status("K").await.unwrap();

        let stored = gateway.set_status("K", PersistedStatus::Running).await.unwrap();
        assert_eq!(stored, PersistedStatus::Running);
        assert_eq!(gateway.get_status("K").await.unwrap(), PersistedStatus::Running);
    }

    #[tokio::test]
    async fn peek_does_not_bootstrap() {
        let (gateway, store) = gateway();
        assert_eq!(gateway.peek_status("K").await.unwrap(), None);
        assert_eq!(store.get("K").await.unwrap(), None);
    }
}
