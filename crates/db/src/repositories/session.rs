use async_trait::async_trait;
use sqlx::{Sqlite, Transaction};

use assetflow_core::errors::StoreError;
use assetflow_core::store::{Session, Store};

use super::db;
use crate::DbPool;

/// SQLite-backed store. Every session is one deferred transaction on a pooled connection.
#[derive(Clone, Debug)]
pub struct SqlStore {
    pool: DbPool,
}

impl SqlStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}

/// An open transaction. Dropping it without [`Session::commit`] rolls back.
pub struct SqlSession {
    pub(crate) tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl Store for SqlStore {
    type Session = SqlSession;

    async fn begin(&self) -> Result<SqlSession, StoreError> {
        let tx = self.pool.begin().await.map_err(db)?;
        Ok(SqlSession { tx })
    }
}

#[async_trait]
impl Session for SqlSession {
    async fn commit(self) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(db)
    }
}
