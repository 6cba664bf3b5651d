//! Read-only view of the organisational directory for operator tooling.

use crate::domain::directory::DirectoryEntry;
use crate::errors::ApplicationError;
use crate::retry::RetryPolicy;
use crate::store::{DirectoryReader, Store};

pub struct DirectoryService<S> {
    store: S,
    retry: RetryPolicy,
}

impl<S> DirectoryService<S>
where
    S: Store,
{
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    pub async fn list_users(&self) -> Result<Vec<DirectoryEntry>, ApplicationError> {
        self.retry.run("directory.list_users", || self.list_users_once()).await
    }

    async fn list_users_once(&self) -> Result<Vec<DirectoryEntry>, ApplicationError> {
        let mut session = self.store.begin().await?;
        Ok(session.list_users().await?)
    }
}
