use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use assetflow_core::credentials::CredentialError;
use assetflow_core::errors::StoreError;

pub mod approval;
pub mod asset;
pub mod directory;
pub mod maintenance;
pub mod memory;
pub mod session;

pub use directory::{check_password, register_user, NewDirectoryUser};
pub use memory::{InMemorySession, InMemoryStore};
pub use session::{SqlSession, SqlStore};

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("credential error: {0}")]
    Credential(#[from] CredentialError),
}

const SQLITE_BUSY: i64 = 5;
const SQLITE_LOCKED: i64 = 6;

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Decode(message) => Self::Decode(message),
            RepositoryError::Credential(error) => Self::Decode(error.to_string()),
            RepositoryError::Database(error) => classify(error),
        }
    }
}

fn classify(error: sqlx::Error) -> StoreError {
    match &error {
        sqlx::Error::PoolTimedOut
        | sqlx::Error::PoolClosed
        | sqlx::Error::Io(_)
        | sqlx::Error::WorkerCrashed => StoreError::Unavailable(error.to_string()),
        sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::Decode(_)
        | sqlx::Error::TypeNotFound { .. } => StoreError::Decode(error.to_string()),
        sqlx::Error::Database(database) => {
            // Extended result codes carry the primary code in the low byte.
            let primary = database
                .code()
                .and_then(|code| code.parse::<i64>().ok())
                .map(|code| code & 0xff);
            if matches!(primary, Some(SQLITE_BUSY) | Some(SQLITE_LOCKED))
                || database.is_unique_violation()
            {
                StoreError::Conflict(error.to_string())
            } else {
                StoreError::Unavailable(error.to_string())
            }
        }
        _ => StoreError::Unavailable(error.to_string()),
    }
}

/// Shorthand for `map_err` on raw sqlx calls inside store trait impls.
pub(crate) fn db(error: sqlx::Error) -> StoreError {
    RepositoryError::from(error).into()
}

pub(crate) fn parse_rfc3339(field: &str, value: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(value).map(|ts| ts.with_timezone(&Utc)).map_err(|err| {
        RepositoryError::Decode(format!("invalid {} timestamp '{}': {}", field, value, err))
    })
}

pub(crate) fn parse_optional_rfc3339(
    field: &str,
    value: Option<&str>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    value.map(|ts| parse_rfc3339(field, ts)).transpose()
}

pub(crate) fn parse_currency(field: &str, value: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(value).map_err(|err| {
        RepositoryError::Decode(format!("invalid {} amount '{}': {}", field, value, err))
    })
}

pub(crate) fn parse_date(field: &str, value: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).map_err(|err| {
        RepositoryError::Decode(format!("invalid {} date '{}': {}", field, value, err))
    })
}

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
