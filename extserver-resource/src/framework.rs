use async_trait::async_trait;
use extserver_core::{AttributeOperation, ConnectorRecord, Identifier};

use crate::error::BackendError;

/// The remote configuration store, one whole object at a time.
///
/// Records going in and out carry their variant; a backend never needs the
/// attribute table. Timeouts and retries are the backend's business.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Create a new object. Answers with the object as stored.
    async fn create(&self, record: &ConnectorRecord) -> Result<ConnectorRecord, BackendError>;

    /// [`BackendError::NotFound`] if there is no such object.
    async fn read(&self, identifier: &Identifier) -> Result<ConnectorRecord, BackendError>;

    /// Apply all operations as one request. Answers with the object as stored.
    async fn update(
        &self,
        identifier: &Identifier,
        operations: &[AttributeOperation],
    ) -> Result<ConnectorRecord, BackendError>;

    /// [`BackendError::NotFound`] if there is no such object.
    async fn delete(&self, identifier: &Identifier) -> Result<(), BackendError>;
}
