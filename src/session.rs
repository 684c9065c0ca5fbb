//! Per-request client session.

use tracing::debug;

use crate::config::Config;
use crate::error::{tolerate_existing_container, AdapterResult};
use crate::storage::{BlobStore, StoreConnector};

/// Storage handle plus container binding for a single `/azblob` request.
///
/// Built when a request arrives and dropped when its response is written; nothing
/// carries over between requests.
pub struct ClientSession {
    store: Box<dyn BlobStore>,
    container: String,
}

impl ClientSession {
    /// Opens a session and, when configured, makes sure the container exists.
    ///
    /// A "container already exists" answer is expected on every request after the
    /// first and is swallowed; any other failure aborts the request.
    pub async fn open(config: &Config, connector: &dyn StoreConnector) -> AdapterResult<Self> {
        let store = connector.open(config)?;

        if config.ensure_container {
            debug!(container = %config.container, "ensuring container exists");
            tolerate_existing_container(store.create_container().await)?;
        }

        Ok(Self {
            store,
            container: config.container.clone(),
        })
    }

    /// Wraps an already opened store.
    pub fn from_store(store: Box<dyn BlobStore>, container: impl Into<String>) -> Self {
        Self {
            store,
            container: container.into(),
        }
    }

    pub fn store(&self) -> &dyn BlobStore {
        self.store.as_ref()
    }

    pub fn container(&self) -> &str {
        &self.container
    }
}
