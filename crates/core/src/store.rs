//! Persistence contract consumed by the workflow and rollup engines.
//!
//! A [`Session`] is one open transaction. Every core operation receives the session it runs
//! in; committing is explicit and dropping an uncommitted session rolls it back.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::domain::approval::{ApprovalRecord, DecisionStamp, NewApproval};
use crate::domain::asset::{Asset, AssetFilter, AssetId, AssetSummary};
use crate::domain::directory::{DirectoryEntry, ManagerScope, UserId};
use crate::domain::maintenance::{
    MaintenanceRecord, MaintenanceRecordId, MaintenanceUpdate, NewMaintenanceRecord,
};
use crate::errors::StoreError;

#[async_trait]
pub trait DirectoryReader: Send {
    async fn get_user(&mut self, id: UserId) -> Result<Option<DirectoryEntry>, StoreError>;

    /// Every directory user, ordered by id.
    async fn list_users(&mut self) -> Result<Vec<DirectoryEntry>, StoreError>;

    async fn list_asset_managers(
        &mut self,
        scope: ManagerScope,
    ) -> Result<Vec<UserId>, StoreError>;
}

#[async_trait]
pub trait AssetStore: Send {
    /// Takes the write lock for `id` and returns the current row. Must be the first write of
    /// any asset-scoped mutation so concurrent callers serialize on the asset.
    async fn lock_asset(&mut self, id: &AssetId) -> Result<Option<Asset>, StoreError>;

    async fn find_asset(&mut self, id: &AssetId) -> Result<Option<Asset>, StoreError>;

    async fn list_assets(&mut self, filter: &AssetFilter) -> Result<Vec<Asset>, StoreError>;

    /// Reserves the next asset sequence number, never below the highest existing id + 1.
    async fn next_asset_number(&mut self) -> Result<u64, StoreError>;

    async fn insert_asset(&mut self, asset: &Asset) -> Result<(), StoreError>;

    /// Persists details, status and review cycle. Never writes `value`.
    async fn update_asset(&mut self, asset: &Asset) -> Result<(), StoreError>;

    /// Writes only `value`. Returns `false` when the asset no longer exists.
    async fn set_asset_value(&mut self, id: &AssetId, value: Decimal) -> Result<bool, StoreError>;

    async fn delete_asset(&mut self, id: &AssetId) -> Result<bool, StoreError>;
}

#[async_trait]
pub trait ApprovalStore: Send {
    async fn list_approvals(
        &mut self,
        asset_id: &AssetId,
        review_cycle: u32,
    ) -> Result<Vec<ApprovalRecord>, StoreError>;

    async fn find_pending_approval(
        &mut self,
        asset_id: &AssetId,
        approver_id: UserId,
        review_cycle: u32,
    ) -> Result<Option<ApprovalRecord>, StoreError>;

    async fn insert_pending_approval(
        &mut self,
        approval: &NewApproval,
    ) -> Result<ApprovalRecord, StoreError>;

    /// Moves a still-pending record to its decided status. Returns `false` if the record was
    /// not pending anymore.
    async fn record_decision(&mut self, stamp: &DecisionStamp) -> Result<bool, StoreError>;

    /// Assets under review whose current cycle holds a pending record for `approver_id`.
    async fn list_pending_assets(
        &mut self,
        approver_id: UserId,
    ) -> Result<Vec<AssetSummary>, StoreError>;
}

#[async_trait]
pub trait MaintenanceStore: Send {
    async fn insert_maintenance(
        &mut self,
        record: &NewMaintenanceRecord,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<MaintenanceRecord, StoreError>;

    async fn find_maintenance(
        &mut self,
        id: MaintenanceRecordId,
    ) -> Result<Option<MaintenanceRecord>, StoreError>;

    /// Returns the linked asset id, or `None` when the record does not exist.
    async fn update_maintenance(
        &mut self,
        update: &MaintenanceUpdate,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<AssetId>, StoreError>;

    /// Returns the linked asset id, or `None` when the record does not exist.
    async fn delete_maintenance(
        &mut self,
        id: MaintenanceRecordId,
    ) -> Result<Option<AssetId>, StoreError>;

    async fn list_maintenance(
        &mut self,
        asset_id: &AssetId,
    ) -> Result<Vec<MaintenanceRecord>, StoreError>;

    async fn maintenance_costs(&mut self, asset_id: &AssetId) -> Result<Vec<Decimal>, StoreError>;
}

#[async_trait]
pub trait Session:
    DirectoryReader + AssetStore + ApprovalStore + MaintenanceStore + Send + Sized
{
    async fn commit(self) -> Result<(), StoreError>;
}

#[async_trait]
pub trait Store: Send + Sync {
    type Session: Session;

    async fn begin(&self) -> Result<Self::Session, StoreError>;
}
