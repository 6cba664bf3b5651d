use thiserror::Error;

use crate::credentials::CredentialError;
use crate::domain::asset::{AssetId, AssetStatus};
use crate::domain::directory::UserId;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("invalid asset transition from {from} to {to}")]
    InvalidAssetTransition { from: AssetStatus, to: AssetStatus },
    #[error("invalid asset id `{0}` (expected AST-NNN)")]
    InvalidAssetId(String),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failures reported by a store implementation. `Unavailable` and `Conflict` are transient:
/// the whole operation may be re-executed from the start.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store conflict: {0}")]
    Conflict(String),
    #[error("store decode failure: {0}")]
    Decode(String),
}

impl StoreError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Conflict(_))
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("user {actor} is not allowed to {action} asset {asset_id}")]
    Forbidden { actor: UserId, asset_id: AssetId, action: &'static str },
    #[error("cannot {action} asset {asset_id} while it is {status}")]
    InvalidState { asset_id: AssetId, status: AssetStatus, action: &'static str },
    #[error("no pending approval found for this user and asset")]
    NoPendingApproval,
    #[error("no asset manager is available to process the approval")]
    NoApproverAvailable,
    #[error("{entity} `{id}` was not found")]
    NotFound { entity: &'static str, id: String },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
}

impl ApplicationError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound { entity, id: id.to_string() }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store(error) if error.is_retryable())
    }

    /// Stable machine-readable label for logs and command output.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Forbidden { .. } => "forbidden",
            Self::InvalidState { .. } => "invalid_state",
            Self::NoPendingApproval => "no_pending_approval",
            Self::NoApproverAvailable => "no_approver_available",
            Self::NotFound { .. } => "not_found",
            Self::Domain(_) => "domain_validation",
            Self::Store(StoreError::Conflict(_)) => "store_conflict",
            Self::Store(_) => "store_unavailable",
            Self::Credential(_) => "credential",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "You are not allowed to perform this action.",
            Self::NotFound { .. } => "The requested item could not be found.",
            Self::Conflict { .. } => "The item was changed concurrently. Please retry.",
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

impl ApplicationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            ApplicationError::Forbidden { .. } => {
                Self::Forbidden { message: value.to_string(), correlation_id }
            }
            // Kept coarse: the caller learns nothing about which stage the workflow is in.
            ApplicationError::NoPendingApproval => {
                Self::NotFound { message: "no pending approval".to_owned(), correlation_id }
            }
            ApplicationError::NotFound { .. } => {
                Self::NotFound { message: value.to_string(), correlation_id }
            }
            ApplicationError::InvalidState { .. } | ApplicationError::Domain(_) => {
                Self::BadRequest { message: value.to_string(), correlation_id }
            }
            ApplicationError::Store(StoreError::Conflict(message)) => {
                Self::Conflict { message, correlation_id }
            }
            ApplicationError::Store(StoreError::Unavailable(message)) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            ApplicationError::NoApproverAvailable
            | ApplicationError::Store(StoreError::Decode(_))
            | ApplicationError::Credential(_) => {
                Self::Internal { message: value.to_string(), correlation_id }
            }
        }
    }
}
