//! Asset registration and caller-driven edits. Status changes requested through an edit go
//! through the same rules as the workflow entry points.

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::audit::{settle, AuditCategory, AuditContext, AuditOutcome, AuditSink, PendingAudit};
use crate::domain::asset::{
    Asset, AssetFilter, AssetId, AssetStatus, AssetUpdate, NewAsset, ReviewEntry,
};
use crate::domain::directory::UserId;
use crate::errors::ApplicationError;
use crate::store::{AssetStore, DirectoryReader, Session, Store};
use crate::workflow::engine::start_review_in;
use crate::workflow::WorkflowSettings;

pub struct AssetService<S> {
    store: S,
    settings: WorkflowSettings,
    audit: Arc<dyn AuditSink>,
}

/// Registers a new asset inside the caller's session. The id is reserved from the store
/// sequence, so concurrent creations never collide.
pub async fn create_asset_in<S: Session>(
    session: &mut S,
    actor: UserId,
    new_asset: &NewAsset,
) -> Result<Asset, ApplicationError> {
    let number = session.next_asset_number().await?;
    let asset = Asset {
        id: AssetId::from_sequence(number),
        name: new_asset.name.clone(),
        description: new_asset.description.clone(),
        category: new_asset.category.clone(),
        subcategory: new_asset.subcategory.clone(),
        requester_id: actor,
        responsible_person_id: new_asset.responsible_person_id,
        status: AssetStatus::New,
        value: Decimal::new(0, 2),
        review_cycle: 0,
        created_at: Utc::now(),
        created_by: actor,
        updated_at: None,
        updated_by: None,
    };
    session.insert_asset(&asset).await?;

    info!(
        event_name = "asset.created",
        asset_id = %asset.id,
        actor_id = %actor,
        "asset registered"
    );
    Ok(asset)
}

/// Applies an edit. Requesting `UnderReview` starts or reopens a review cycle in the same
/// session; the outcome statuses can only be reached through approvals. The requester is kept
/// while a cycle is open and once the asset is assigned.
pub async fn update_asset_in<S: Session>(
    session: &mut S,
    actor: UserId,
    update: &AssetUpdate,
    settings: &WorkflowSettings,
) -> Result<Asset, ApplicationError> {
    let stored = session
        .lock_asset(&update.id)
        .await?
        .ok_or_else(|| ApplicationError::not_found("asset", &update.id))?;

    if update.status != stored.status {
        match update.status {
            AssetStatus::UnderReview => {
                start_review_in(
                    session,
                    &update.id,
                    actor,
                    ReviewEntry::Reopen,
                    settings.manager_scope,
                )
                .await?;
            }
            AssetStatus::New => {
                return Err(ApplicationError::InvalidState {
                    asset_id: update.id.clone(),
                    status: stored.status,
                    action: "reset",
                })
            }
            AssetStatus::Assigned | AssetStatus::Discarded => {
                return Err(ApplicationError::InvalidState {
                    asset_id: update.id.clone(),
                    status: stored.status,
                    action: "manually resolve",
                })
            }
        }
    }

    // Re-read: starting a review moved status and cycle forward.
    let mut asset = session
        .find_asset(&update.id)
        .await?
        .ok_or_else(|| ApplicationError::not_found("asset", &update.id))?;
    asset.name = update.name.clone();
    asset.description = update.description.clone();
    asset.category = update.category.clone();
    asset.subcategory = update.subcategory.clone();
    asset.responsible_person_id = update.responsible_person_id;
    if !asset.requester_is_frozen() {
        asset.requester_id = update.requester_id;
    } else if update.requester_id != asset.requester_id {
        debug!(
            asset_id = %asset.id,
            requested = %update.requester_id,
            status = asset.status.as_str(),
            "requester change ignored"
        );
    }
    asset.updated_at = Some(Utc::now());
    asset.updated_by = Some(actor);
    session.update_asset(&asset).await?;

    info!(
        event_name = "asset.updated",
        asset_id = %asset.id,
        actor_id = %actor,
        status = asset.status.as_str(),
        "asset updated"
    );
    Ok(asset)
}

impl<S> AssetService<S>
where
    S: Store,
{
    pub fn new(store: S, settings: WorkflowSettings, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, settings, audit }
    }

    pub async fn create_asset(
        &self,
        context: &AuditContext,
        actor: UserId,
        new_asset: NewAsset,
    ) -> Result<Asset, ApplicationError> {
        let result = self
            .settings
            .retry
            .run("asset.create", || self.create_once(context, actor, &new_asset))
            .await;
        settle(self.audit.as_ref(), context, None, "asset.created", AuditCategory::Asset, result)
    }

    pub async fn update_asset(
        &self,
        context: &AuditContext,
        actor: UserId,
        update: AssetUpdate,
    ) -> Result<Asset, ApplicationError> {
        let result = self
            .settings
            .retry
            .run("asset.update", || self.update_once(context, actor, &update))
            .await;
        settle(
            self.audit.as_ref(),
            context,
            Some(&update.id),
            "asset.updated",
            AuditCategory::Asset,
            result,
        )
    }

    /// Removes the asset together with its approval and maintenance history.
    pub async fn delete_asset(
        &self,
        context: &AuditContext,
        asset_id: &AssetId,
    ) -> Result<(), ApplicationError> {
        let result =
            self.settings.retry.run("asset.delete", || self.delete_once(context, asset_id)).await;
        settle(
            self.audit.as_ref(),
            context,
            Some(asset_id),
            "asset.deleted",
            AuditCategory::Asset,
            result,
        )
    }

    pub async fn get_asset(&self, asset_id: &AssetId) -> Result<Asset, ApplicationError> {
        self.settings.retry.run("asset.get", || self.get_once(asset_id)).await
    }

    pub async fn list_assets(&self, filter: &AssetFilter) -> Result<Vec<Asset>, ApplicationError> {
        self.settings.retry.run("asset.list", || self.list_once(filter)).await
    }

    /// Assets visible to `viewer`: members of the shared-view department see everything
    /// requested within it, everyone else sees what they requested.
    pub async fn list_assets_for(&self, viewer: UserId) -> Result<Vec<Asset>, ApplicationError> {
        self.settings.retry.run("asset.list_for", || self.list_for_once(viewer)).await
    }

    async fn create_once(
        &self,
        context: &AuditContext,
        actor: UserId,
        new_asset: &NewAsset,
    ) -> Result<(Asset, PendingAudit), ApplicationError> {
        let mut session = self.store.begin().await?;
        let asset = create_asset_in(&mut session, actor, new_asset).await?;

        let mut audit = PendingAudit::default();
        audit.push(
            context
                .event(Some(&asset.id), "asset.created", AuditCategory::Asset, AuditOutcome::Success)
                .with_metadata("requester_id", actor.to_string()),
        );
        session.commit().await?;
        Ok((asset, audit))
    }

    async fn update_once(
        &self,
        context: &AuditContext,
        actor: UserId,
        update: &AssetUpdate,
    ) -> Result<(Asset, PendingAudit), ApplicationError> {
        let mut session = self.store.begin().await?;
        let asset = update_asset_in(&mut session, actor, update, &self.settings).await?;

        let mut audit = PendingAudit::default();
        audit.push(
            context
                .event(Some(&asset.id), "asset.updated", AuditCategory::Asset, AuditOutcome::Success)
                .with_metadata("status", asset.status.as_str()),
        );
        session.commit().await?;
        Ok((asset, audit))
    }

    async fn delete_once(
        &self,
        context: &AuditContext,
        asset_id: &AssetId,
    ) -> Result<((), PendingAudit), ApplicationError> {
        let mut session = self.store.begin().await?;
        session
            .lock_asset(asset_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("asset", asset_id))?;
        if !session.delete_asset(asset_id).await? {
            return Err(ApplicationError::not_found("asset", asset_id));
        }

        let mut audit = PendingAudit::default();
        audit.push(context.event(
            Some(asset_id),
            "asset.deleted",
            AuditCategory::Asset,
            AuditOutcome::Success,
        ));
        session.commit().await?;
        info!(event_name = "asset.deleted", asset_id = %asset_id, "asset deleted");
        Ok(((), audit))
    }

    async fn get_once(&self, asset_id: &AssetId) -> Result<Asset, ApplicationError> {
        let mut session = self.store.begin().await?;
        session
            .find_asset(asset_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("asset", asset_id))
    }

    async fn list_once(&self, filter: &AssetFilter) -> Result<Vec<Asset>, ApplicationError> {
        let mut session = self.store.begin().await?;
        Ok(session.list_assets(filter).await?)
    }

    async fn list_for_once(&self, viewer: UserId) -> Result<Vec<Asset>, ApplicationError> {
        let mut session = self.store.begin().await?;
        let entry = session
            .get_user(viewer)
            .await?
            .ok_or_else(|| ApplicationError::not_found("user", viewer))?;

        let filter = if self.settings.shared_view_department == Some(entry.department_id) {
            AssetFilter {
                requester_department: Some(entry.department_id),
                ..AssetFilter::default()
            }
        } else {
            AssetFilter { requester_id: Some(viewer), ..AssetFilter::default() }
        };
        Ok(session.list_assets(&filter).await?)
    }
}
