pub mod assets;
pub mod audit;
pub mod config;
pub mod credentials;
pub mod directory;
pub mod domain;
pub mod errors;
pub mod retry;
pub mod rollup;
pub mod store;
pub mod workflow;

pub use assets::{create_asset_in, update_asset_in, AssetService};
pub use audit::{AuditContext, AuditEvent, AuditSink, InMemoryAuditSink, TracingAuditSink};
pub use directory::DirectoryService;
pub use domain::approval::{ApprovalDecision, ApprovalId, ApprovalRecord, ApprovalStatus};
pub use domain::asset::{Asset, AssetFilter, AssetId, AssetStatus, AssetSummary, ReviewEntry};
pub use domain::directory::{DepartmentId, DirectoryEntry, ManagerScope, UserId, NO_SUPERVISOR};
pub use domain::maintenance::{MaintenanceRecord, MaintenanceRecordId};
pub use errors::{ApplicationError, DomainError, InterfaceError, StoreError};
pub use retry::RetryPolicy;
pub use rollup::{recompute_in, MaintenanceLedger, RollupResult};
pub use store::{ApprovalStore, AssetStore, DirectoryReader, MaintenanceStore, Session, Store};
pub use workflow::{ApprovalWorkflow, ChainStage, ChainVerdict, WorkflowSettings};
