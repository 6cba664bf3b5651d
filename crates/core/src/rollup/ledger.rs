use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::audit::{settle, AuditCategory, AuditContext, AuditOutcome, AuditSink, PendingAudit};
use crate::domain::asset::AssetId;
use crate::domain::directory::UserId;
use crate::domain::maintenance::{
    ensure_non_negative_cost, MaintenanceRecord, MaintenanceRecordId, MaintenanceUpdate,
    NewMaintenanceRecord,
};
use crate::errors::ApplicationError;
use crate::retry::RetryPolicy;
use crate::rollup::{recompute_in, RollupResult};
use crate::store::{AssetStore, MaintenanceStore, Session, Store};

/// Maintenance record mutations. Each one locks the owning asset, applies the change and
/// recomputes the asset value in the same transaction.
pub struct MaintenanceLedger<S> {
    store: S,
    retry: RetryPolicy,
    audit: Arc<dyn AuditSink>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LedgerChange {
    pub record: Option<MaintenanceRecord>,
    pub rollup: Option<RollupResult>,
}

impl<S> MaintenanceLedger<S>
where
    S: Store,
{
    pub fn new(store: S, retry: RetryPolicy, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, retry, audit }
    }

    pub async fn add_record(
        &self,
        context: &AuditContext,
        actor: UserId,
        record: NewMaintenanceRecord,
    ) -> Result<LedgerChange, ApplicationError> {
        let result = self
            .retry
            .run("maintenance.add", || self.add_once(context, actor, &record))
            .await;
        settle(
            self.audit.as_ref(),
            context,
            Some(&record.asset_id),
            "maintenance.added",
            AuditCategory::Rollup,
            result,
        )
    }

    pub async fn update_record(
        &self,
        context: &AuditContext,
        actor: UserId,
        update: MaintenanceUpdate,
    ) -> Result<LedgerChange, ApplicationError> {
        let result = self
            .retry
            .run("maintenance.update", || self.update_once(context, actor, &update))
            .await;
        settle(
            self.audit.as_ref(),
            context,
            None,
            "maintenance.updated",
            AuditCategory::Rollup,
            result,
        )
    }

    pub async fn delete_record(
        &self,
        context: &AuditContext,
        id: MaintenanceRecordId,
    ) -> Result<LedgerChange, ApplicationError> {
        let result = self.retry.run("maintenance.delete", || self.delete_once(context, id)).await;
        settle(
            self.audit.as_ref(),
            context,
            None,
            "maintenance.deleted",
            AuditCategory::Rollup,
            result,
        )
    }

    pub async fn get_record(
        &self,
        id: MaintenanceRecordId,
    ) -> Result<MaintenanceRecord, ApplicationError> {
        self.retry.run("maintenance.get", || self.get_once(id)).await
    }

    pub async fn list_records(
        &self,
        asset_id: &AssetId,
    ) -> Result<Vec<MaintenanceRecord>, ApplicationError> {
        self.retry.run("maintenance.list", || self.list_once(asset_id)).await
    }

    /// Standalone recompute trigger. A missing asset yields `Ok(None)`.
    pub async fn record_maintenance_change(
        &self,
        context: &AuditContext,
        asset_id: &AssetId,
    ) -> Result<Option<RollupResult>, ApplicationError> {
        let result =
            self.retry.run("rollup.recompute", || self.recompute_once(context, asset_id)).await;
        settle(
            self.audit.as_ref(),
            context,
            Some(asset_id),
            "rollup.value_recomputed",
            AuditCategory::Rollup,
            result,
        )
    }

    async fn add_once(
        &self,
        context: &AuditContext,
        actor: UserId,
        record: &NewMaintenanceRecord,
    ) -> Result<(LedgerChange, PendingAudit), ApplicationError> {
        ensure_non_negative_cost(record.cost)?;

        let mut session = self.store.begin().await?;
        session
            .lock_asset(&record.asset_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("asset", &record.asset_id))?;
        let stored = session.insert_maintenance(record, actor, Utc::now()).await?;
        let rollup = recompute_in(&mut session, &record.asset_id).await?;

        let audit = change_audit(context, "maintenance.added", &record.asset_id, stored.id, &rollup);
        session.commit().await?;
        Ok((LedgerChange { record: Some(stored), rollup }, audit))
    }

    async fn update_once(
        &self,
        context: &AuditContext,
        actor: UserId,
        update: &MaintenanceUpdate,
    ) -> Result<(LedgerChange, PendingAudit), ApplicationError> {
        ensure_non_negative_cost(update.cost)?;

        let mut session = self.store.begin().await?;
        let asset_id = self.lock_owner(&mut session, update.id).await?;
        session
            .update_maintenance(update, actor, Utc::now())
            .await?
            .ok_or_else(|| ApplicationError::not_found("maintenance record", update.id.0))?;
        let rollup = recompute_in(&mut session, &asset_id).await?;
        let record = session.find_maintenance(update.id).await?;

        let audit = change_audit(context, "maintenance.updated", &asset_id, update.id, &rollup);
        session.commit().await?;
        Ok((LedgerChange { record, rollup }, audit))
    }

    async fn delete_once(
        &self,
        context: &AuditContext,
        id: MaintenanceRecordId,
    ) -> Result<(LedgerChange, PendingAudit), ApplicationError> {
        let mut session = self.store.begin().await?;
        let asset_id = self.lock_owner(&mut session, id).await?;
        session
            .delete_maintenance(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("maintenance record", id.0))?;
        let rollup = recompute_in(&mut session, &asset_id).await?;

        let audit = change_audit(context, "maintenance.deleted", &asset_id, id, &rollup);
        session.commit().await?;
        Ok((LedgerChange { record: None, rollup }, audit))
    }

    async fn get_once(&self, id: MaintenanceRecordId) -> Result<MaintenanceRecord, ApplicationError> {
        let mut session = self.store.begin().await?;
        session
            .find_maintenance(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("maintenance record", id.0))
    }

    async fn list_once(
        &self,
        asset_id: &AssetId,
    ) -> Result<Vec<MaintenanceRecord>, ApplicationError> {
        let mut session = self.store.begin().await?;
        session
            .find_asset(asset_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("asset", asset_id))?;
        Ok(session.list_maintenance(asset_id).await?)
    }

    async fn recompute_once(
        &self,
        context: &AuditContext,
        asset_id: &AssetId,
    ) -> Result<(Option<RollupResult>, PendingAudit), ApplicationError> {
        let mut session = self.store.begin().await?;
        let mut audit = PendingAudit::default();
        // Missing asset: nothing to lock, recompute_in reports the skip.
        session.lock_asset(asset_id).await?;
        let rollup = recompute_in(&mut session, asset_id).await?;
        if let Some(result) = &rollup {
            audit.push(
                context
                    .event(
                        Some(asset_id),
                        "rollup.value_recomputed",
                        AuditCategory::Rollup,
                        AuditOutcome::Success,
                    )
                    .with_metadata("value", result.value.to_string()),
            );
        }
        session.commit().await?;
        Ok((rollup, audit))
    }

    /// Resolves the record's asset and takes that asset's write lock.
    async fn lock_owner(
        &self,
        session: &mut S::Session,
        id: MaintenanceRecordId,
    ) -> Result<AssetId, ApplicationError> {
        let record = session
            .find_maintenance(id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("maintenance record", id.0))?;
        session.lock_asset(&record.asset_id).await?;
        Ok(record.asset_id)
    }
}

fn change_audit(
    context: &AuditContext,
    event_type: &str,
    asset_id: &AssetId,
    record_id: MaintenanceRecordId,
    rollup: &Option<RollupResult>,
) -> PendingAudit {
    let mut audit = PendingAudit::default();
    let mut event = context
        .event(Some(asset_id), event_type, AuditCategory::Rollup, AuditOutcome::Success)
        .with_metadata("record_id", record_id.0.to_string());
    if let Some(result) = rollup {
        event = event.with_metadata("value", result.value.to_string());
    }
    audit.push(event);
    audit
}
