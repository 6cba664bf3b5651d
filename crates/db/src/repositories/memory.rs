use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard};

use assetflow_core::domain::approval::{
    ApprovalId, ApprovalRecord, ApprovalStatus, DecisionStamp, NewApproval,
};
use assetflow_core::domain::asset::{currency, Asset, AssetFilter, AssetId, AssetSummary};
use assetflow_core::domain::directory::{DirectoryEntry, ManagerScope, UserId};
use assetflow_core::domain::maintenance::{
    MaintenanceRecord, MaintenanceRecordId, MaintenanceUpdate, NewMaintenanceRecord,
};
use assetflow_core::errors::StoreError;
use assetflow_core::store::{
    ApprovalStore, AssetStore, DirectoryReader, MaintenanceStore, Session, Store,
};
use assetflow_core::workflow::is_outstanding;

#[derive(Clone, Debug, Default)]
struct MemoryState {
    users: BTreeMap<UserId, DirectoryEntry>,
    assets: BTreeMap<AssetId, Asset>,
    approvals: Vec<ApprovalRecord>,
    maintenance: BTreeMap<i64, MaintenanceRecord>,
    next_asset: u64,
    next_approval_id: i64,
    next_maintenance_id: i64,
}

/// Process-local store with the same transactional contract as the SQL store: one session at a
/// time, changes published on commit, discarded on drop.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    injected_conflicts: Arc<AtomicU32>,
}

pub struct InMemorySession {
    committed: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, entry: DirectoryEntry) {
        let mut state = self.state.lock().await;
        state.users.insert(entry.id, entry);
    }

    /// Makes the next `count` calls to `begin` fail with a retryable conflict.
    pub fn inject_conflicts(&self, count: u32) {
        self.injected_conflicts.store(count, Ordering::SeqCst);
    }

    pub async fn approvals_for(&self, asset_id: &AssetId) -> Vec<ApprovalRecord> {
        let state = self.state.lock().await;
        state.approvals.iter().filter(|record| &record.asset_id == asset_id).cloned().collect()
    }

    fn take_injected_conflict(&self) -> bool {
        self.injected_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |remaining| remaining.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Session = InMemorySession;

    async fn begin(&self) -> Result<InMemorySession, StoreError> {
        if self.take_injected_conflict() {
            return Err(StoreError::Conflict("injected conflict".to_string()));
        }
        let committed = self.state.clone().lock_owned().await;
        let working = committed.clone();
        Ok(InMemorySession { committed, working })
    }
}

#[async_trait]
impl Session for InMemorySession {
    async fn commit(self) -> Result<(), StoreError> {
        let Self { mut committed, working } = self;
        *committed = working;
        Ok(())
    }
}

#[async_trait]
impl DirectoryReader for InMemorySession {
    async fn get_user(&mut self, id: UserId) -> Result<Option<DirectoryEntry>, StoreError> {
        Ok(self.working.users.get(&id).cloned())
    }

    async fn list_users(&mut self) -> Result<Vec<DirectoryEntry>, StoreError> {
        Ok(self.working.users.values().cloned().collect())
    }

    async fn list_asset_managers(&mut self, scope: ManagerScope) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .working
            .users
            .values()
            .filter(|entry| entry.is_asset_manager)
            .filter(|entry| match scope {
                ManagerScope::Global => true,
                ManagerScope::Department(department_id) => entry.department_id == department_id,
            })
            .map(|entry| entry.id)
            .collect())
    }
}

#[async_trait]
impl AssetStore for InMemorySession {
    async fn lock_asset(&mut self, id: &AssetId) -> Result<Option<Asset>, StoreError> {
        Ok(self.working.assets.get(id).cloned())
    }

    async fn find_asset(&mut self, id: &AssetId) -> Result<Option<Asset>, StoreError> {
        Ok(self.working.assets.get(id).cloned())
    }

    async fn list_assets(&mut self, filter: &AssetFilter) -> Result<Vec<Asset>, StoreError> {
        let users = &self.working.users;
        let in_department = |asset: &Asset| {
            filter.requester_department.map_or(true, |department_id| {
                users
                    .get(&asset.requester_id)
                    .is_some_and(|user| user.department_id == department_id)
            })
        };
        let mut assets: Vec<Asset> = self
            .working
            .assets
            .values()
            .filter(|asset| filter.requester_id.map_or(true, |id| asset.requester_id == id))
            .filter(|asset| in_department(asset))
            .filter(|asset| filter.status.map_or(true, |status| asset.status == status))
            .cloned()
            .collect();
        assets.sort_by(|left, right| {
            left.created_at.cmp(&right.created_at).then_with(|| left.id.cmp(&right.id))
        });
        Ok(assets)
    }

    async fn next_asset_number(&mut self) -> Result<u64, StoreError> {
        let highest = self
            .working
            .assets
            .keys()
            .filter_map(|id| id.sequence_number().ok())
            .max()
            .unwrap_or(0);
        let reserved = self.working.next_asset.max(1).max(highest + 1);
        self.working.next_asset = reserved + 1;
        Ok(reserved)
    }

    async fn insert_asset(&mut self, asset: &Asset) -> Result<(), StoreError> {
        if self.working.assets.contains_key(&asset.id) {
            return Err(StoreError::Conflict(format!("asset {} already exists", asset.id)));
        }
        self.working.assets.insert(asset.id.clone(), asset.clone());
        Ok(())
    }

    async fn update_asset(&mut self, asset: &Asset) -> Result<(), StoreError> {
        if let Some(stored) = self.working.assets.get_mut(&asset.id) {
            let value = stored.value;
            *stored = asset.clone();
            stored.value = value;
        }
        Ok(())
    }

    async fn set_asset_value(&mut self, id: &AssetId, value: Decimal) -> Result<bool, StoreError> {
        match self.working.assets.get_mut(id) {
            Some(asset) => {
                asset.value = currency(value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_asset(&mut self, id: &AssetId) -> Result<bool, StoreError> {
        if self.working.assets.remove(id).is_none() {
            return Ok(false);
        }
        self.working.approvals.retain(|record| &record.asset_id != id);
        self.working.maintenance.retain(|_, record| &record.asset_id != id);
        Ok(true)
    }
}

#[async_trait]
impl ApprovalStore for InMemorySession {
    async fn list_approvals(
        &mut self,
        asset_id: &AssetId,
        review_cycle: u32,
    ) -> Result<Vec<ApprovalRecord>, StoreError> {
        Ok(self
            .working
            .approvals
            .iter()
            .filter(|record| &record.asset_id == asset_id && record.review_cycle == review_cycle)
            .cloned()
            .collect())
    }

    async fn find_pending_approval(
        &mut self,
        asset_id: &AssetId,
        approver_id: UserId,
        review_cycle: u32,
    ) -> Result<Option<ApprovalRecord>, StoreError> {
        Ok(self
            .working
            .approvals
            .iter()
            .find(|record| {
                &record.asset_id == asset_id
                    && record.approver_id == approver_id
                    && record.review_cycle == review_cycle
                    && record.is_pending()
            })
            .cloned())
    }

    async fn insert_pending_approval(
        &mut self,
        approval: &NewApproval,
    ) -> Result<ApprovalRecord, StoreError> {
        let duplicate = self.working.approvals.iter().any(|record| {
            record.asset_id == approval.asset_id
                && record.approver_id == approval.approver_id
                && record.review_cycle == approval.review_cycle
        });
        if duplicate {
            return Err(StoreError::Conflict(format!(
                "approval for {} by {} in cycle {} already exists",
                approval.asset_id, approval.approver_id, approval.review_cycle
            )));
        }

        self.working.next_approval_id += 1;
        let record = ApprovalRecord {
            id: ApprovalId(self.working.next_approval_id),
            asset_id: approval.asset_id.clone(),
            approver_id: approval.approver_id,
            review_cycle: approval.review_cycle,
            status: ApprovalStatus::Pending,
            comments: None,
            decided_at: None,
            created_at: approval.created_at,
            created_by: approval.created_by,
            updated_at: None,
            updated_by: None,
        };
        self.working.approvals.push(record.clone());
        Ok(record)
    }

    async fn record_decision(&mut self, stamp: &DecisionStamp) -> Result<bool, StoreError> {
        let Some(record) = self
            .working
            .approvals
            .iter_mut()
            .find(|record| record.id == stamp.approval_id && record.is_pending())
        else {
            return Ok(false);
        };
        record.status = stamp.status;
        record.comments = stamp.comments.clone();
        record.decided_at = Some(stamp.decided_at);
        record.updated_at = Some(stamp.decided_at);
        record.updated_by = Some(stamp.decided_by);
        Ok(true)
    }

    async fn list_pending_assets(
        &mut self,
        approver_id: UserId,
    ) -> Result<Vec<AssetSummary>, StoreError> {
        let assets = &self.working.assets;
        Ok(self
            .working
            .approvals
            .iter()
            .filter(|record| record.approver_id == approver_id)
            .filter_map(|record| {
                let asset = assets.get(&record.asset_id)?;
                is_outstanding(record, asset).then(|| asset.summary())
            })
            .collect())
    }
}

#[async_trait]
impl MaintenanceStore for InMemorySession {
    async fn insert_maintenance(
        &mut self,
        record: &NewMaintenanceRecord,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<MaintenanceRecord, StoreError> {
        if !self.working.assets.contains_key(&record.asset_id) {
            return Err(StoreError::Conflict(format!("asset {} does not exist", record.asset_id)));
        }
        self.working.next_maintenance_id += 1;
        let stored = MaintenanceRecord {
            id: MaintenanceRecordId(self.working.next_maintenance_id),
            asset_id: record.asset_id.clone(),
            cost: currency(record.cost),
            maintenance_type: record.maintenance_type.clone(),
            vendor: record.vendor.clone(),
            comments: record.comments.clone(),
            maintenance_date: record.maintenance_date,
            created_at: at,
            created_by: actor,
            updated_at: None,
            updated_by: None,
        };
        self.working.maintenance.insert(stored.id.0, stored.clone());
        Ok(stored)
    }

    async fn find_maintenance(
        &mut self,
        id: MaintenanceRecordId,
    ) -> Result<Option<MaintenanceRecord>, StoreError> {
        Ok(self.working.maintenance.get(&id.0).cloned())
    }

    async fn update_maintenance(
        &mut self,
        update: &MaintenanceUpdate,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<AssetId>, StoreError> {
        let Some(record) = self.working.maintenance.get_mut(&update.id.0) else {
            return Ok(None);
        };
        record.cost = currency(update.cost);
        record.maintenance_type = update.maintenance_type.clone();
        record.vendor = update.vendor.clone();
        record.comments = update.comments.clone();
        record.maintenance_date = update.maintenance_date;
        record.updated_at = Some(at);
        record.updated_by = Some(actor);
        Ok(Some(record.asset_id.clone()))
    }

    async fn delete_maintenance(
        &mut self,
        id: MaintenanceRecordId,
    ) -> Result<Option<AssetId>, StoreError> {
        Ok(self.working.maintenance.remove(&id.0).map(|record| record.asset_id))
    }

    async fn list_maintenance(
        &mut self,
        asset_id: &AssetId,
    ) -> Result<Vec<MaintenanceRecord>, StoreError> {
        let mut records: Vec<MaintenanceRecord> = self
            .working
            .maintenance
            .values()
            .filter(|record| &record.asset_id == asset_id)
            .cloned()
            .collect();
        records.sort_by_key(|record| (record.maintenance_date, record.id.0));
        Ok(records)
    }

    async fn maintenance_costs(&mut self, asset_id: &AssetId) -> Result<Vec<Decimal>, StoreError> {
        Ok(self
            .working
            .maintenance
            .values()
            .filter(|record| &record.asset_id == asset_id)
            .map(|record| record.cost)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use assetflow_core::audit::{AuditContext, InMemoryAuditSink};
    use assetflow_core::domain::asset::{Asset, AssetFilter, NewAsset};
    use assetflow_core::domain::directory::{DepartmentId, DirectoryEntry, UserId, NO_SUPERVISOR};
    use assetflow_core::errors::{ApplicationError, StoreError};
    use assetflow_core::retry::RetryPolicy;
    use assetflow_core::store::{AssetStore, Store};
    use assetflow_core::workflow::WorkflowSettings;
    use assetflow_core::{ApprovalWorkflow, AssetService, DirectoryService};

    use super::InMemoryStore;

    fn entry(id: i64, supervisor: UserId, manager: bool) -> DirectoryEntry {
        DirectoryEntry {
            id: UserId(id),
            name: format!("user-{id}"),
            department_id: DepartmentId(1),
            title: "Staff".to_string(),
            supervisor_id: supervisor,
            is_asset_manager: manager,
        }
    }

    fn laptop() -> NewAsset {
        NewAsset {
            name: "Laptop".to_string(),
            description: "Developer workstation".to_string(),
            category: "IT".to_string(),
            subcategory: "Hardware".to_string(),
            responsible_person_id: UserId(1),
        }
    }

    fn settings(max_attempts: u32) -> WorkflowSettings {
        WorkflowSettings {
            retry: RetryPolicy::new(max_attempts, std::time::Duration::ZERO),
            ..WorkflowSettings::default()
        }
    }

    #[tokio::test]
    async fn dropped_session_discards_its_writes() {
        let store = InMemoryStore::new();
        {
            let mut session = store.begin().await.expect("begin");
            let number = session.next_asset_number().await.expect("number");
            assert_eq!(number, 1);
        }

        let mut session = store.begin().await.expect("begin");
        assert_eq!(session.next_asset_number().await.expect("number"), 1);
    }

    #[tokio::test]
    async fn injected_conflicts_are_absorbed_by_retry() {
        let store = InMemoryStore::new();
        store.add_user(entry(1, NO_SUPERVISOR, false)).await;
        store.add_user(entry(20, NO_SUPERVISOR, true)).await;
        let sink = Arc::new(InMemoryAuditSink::default());
        let assets = AssetService::new(store.clone(), settings(3), sink.clone());
        let workflow = ApprovalWorkflow::new(store.clone(), settings(3), sink.clone());
        let context = AuditContext::new("req-mem-1", "user:1");

        let asset = assets.create_asset(&context, UserId(1), laptop()).await.expect("create");
        store.inject_conflicts(2);
        let started =
            workflow.start_review(&context, &asset.id, UserId(1)).await.expect("start after retry");

        assert_eq!(started.approvals.len(), 1);
        assert_eq!(store.approvals_for(&asset.id).await.len(), 1);
    }

    #[tokio::test]
    async fn department_view_follows_the_requesters_directory_entry() {
        let store = InMemoryStore::new();
        store.add_user(entry(1, NO_SUPERVISOR, false)).await;
        store.add_user(entry(2, NO_SUPERVISOR, false)).await;
        let finance =
            DirectoryEntry { department_id: DepartmentId(2), ..entry(3, NO_SUPERVISOR, false) };
        store.add_user(finance).await;
        let settings = WorkflowSettings {
            shared_view_department: Some(DepartmentId(1)),
            ..settings(1)
        };
        let sink = Arc::new(InMemoryAuditSink::default());
        let assets = AssetService::new(store.clone(), settings, sink);
        let context = AuditContext::new("req-mem-3", "user:1");

        let first = assets.create_asset(&context, UserId(1), laptop()).await.expect("create");
        let second = assets.create_asset(&context, UserId(2), laptop()).await.expect("create");
        let outsider = assets.create_asset(&context, UserId(3), laptop()).await.expect("create");

        let ids = |listed: Vec<Asset>| listed.into_iter().map(|asset| asset.id).collect::<Vec<_>>();
        let shared = assets.list_assets_for(UserId(2)).await.expect("shared");
        assert_eq!(ids(shared), vec![first.id, second.id]);
        let own = assets.list_assets_for(UserId(3)).await.expect("own");
        assert_eq!(ids(own), vec![outsider.id]);

        let directory = DirectoryService::new(store.clone(), RetryPolicy::default());
        let users: Vec<_> =
            directory.list_users().await.expect("users").into_iter().map(|user| user.id).collect();
        assert_eq!(users, vec![UserId(1), UserId(2), UserId(3)]);
    }

    #[tokio::test]
    async fn exhausted_retries_surface_the_store_error() {
        let store = InMemoryStore::new();
        let sink = Arc::new(InMemoryAuditSink::default());
        let assets = AssetService::new(store.clone(), settings(2), sink.clone());
        let context = AuditContext::new("req-mem-2", "user:1");

        store.inject_conflicts(2);
        let error =
            assets.create_asset(&context, UserId(1), laptop()).await.expect_err("should fail");

        assert!(matches!(error, ApplicationError::Store(StoreError::Conflict(_))));
        assert_eq!(sink.events().len(), 1, "only the failure event is published");
        let listed = assets.list_assets(&AssetFilter::default()).await.expect("list");
        assert!(listed.is_empty());
    }
}
