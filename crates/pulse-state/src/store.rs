//! The key-value seam every status backend implements.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::appconfig::{AppConfigStore, ConnectionString};
use crate::error::StateResult;
use crate::redb_store::RedbStore;
use crate::status::PersistedStatus;

/// Raw get/put over a durable key-value store.
///
/// Implementations do not apply the bootstrap rule; an absent key is
/// reported as `Ok(None)`. See [`crate::StatusGateway`].
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Read the stored status for `key`, or `None` if the key is absent.
    async fn get(&self, key: &str) -> StateResult<Option<PersistedStatus>>;

    /// Overwrite the value for `key` and return what the store now holds.
    async fn put(&self, key: &str, status: PersistedStatus) -> StateResult<PersistedStatus>;
}

/// Open a store from a connection string.
///
/// `Endpoint=...;Id=...;Secret=...` selects the remote configuration
/// service. `redb:<path>` or a bare filesystem path selects an embedded
/// redb file.
pub fn open_store(connection: &str) -> StateResult<Arc<dyn StatusStore>> {
    let connection = connection.trim();
    if connection.starts_with("Endpoint=") {
        let parsed = ConnectionString::parse(connection)?;
        return Ok(Arc::new(AppConfigStore::new(parsed)?));
    }

    let path = connection.strip_prefix("redb:").unwrap_or(connection);
    Ok(Arc::new(RedbStore::open(Path::new(path))?))
}
