//! Session-scoped workflow operations. Each function runs entirely inside the caller's
//! session; committing or rolling back is the caller's decision.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ManagerScopeMode;
use crate::domain::approval::{
    ApprovalDecision, ApprovalRecord, ApprovalStatus, DecisionStamp, NewApproval,
};
use crate::domain::asset::{Asset, AssetId, AssetStatus, AssetSummary, ReviewEntry};
use crate::domain::directory::{DirectoryEntry, ManagerScope, UserId};
use crate::errors::ApplicationError;
use crate::store::Session;
use crate::workflow::chain::{ChainSnapshot, ChainStage, ChainVerdict};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReviewStarted {
    pub asset_id: AssetId,
    pub review_cycle: u32,
    pub stage: ChainStage,
    pub approvals: Vec<ApprovalRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionOutcome {
    pub asset_id: AssetId,
    pub review_cycle: u32,
    pub approver_id: UserId,
    pub decision: ApprovalDecision,
    pub verdict: ChainVerdict,
    pub asset_status: AssetStatus,
    pub created_approvals: Vec<ApprovalRecord>,
}

pub fn manager_scope_for(mode: ManagerScopeMode, requester: &DirectoryEntry) -> ManagerScope {
    match mode {
        ManagerScopeMode::Global => ManagerScope::Global,
        ManagerScopeMode::Department => ManagerScope::Department(requester.department_id),
    }
}

async fn requester_entry<S: Session>(
    session: &mut S,
    asset: &Asset,
) -> Result<DirectoryEntry, ApplicationError> {
    session
        .get_user(asset.requester_id)
        .await?
        .ok_or_else(|| ApplicationError::not_found("user", asset.requester_id))
}

/// Opens a new review cycle for `asset_id`. The requester must be the asset's requester. An
/// [`ReviewEntry::Initial`] request needs a `New` asset; [`ReviewEntry::Reopen`] also accepts
/// an asset closed by a previous cycle.
pub async fn start_review_in<S: Session>(
    session: &mut S,
    asset_id: &AssetId,
    requester_id: UserId,
    entry: ReviewEntry,
    scope_mode: ManagerScopeMode,
) -> Result<ReviewStarted, ApplicationError> {
    let mut asset = session
        .lock_asset(asset_id)
        .await?
        .ok_or_else(|| ApplicationError::not_found("asset", asset_id))?;

    if asset.requester_id != requester_id {
        return Err(ApplicationError::Forbidden {
            actor: requester_id,
            asset_id: asset_id.clone(),
            action: "start review of",
        });
    }
    if !asset.can_enter_review(entry) {
        return Err(ApplicationError::InvalidState {
            asset_id: asset_id.clone(),
            status: asset.status,
            action: "start review of",
        });
    }

    let requester = requester_entry(session, &asset).await?;
    let now = Utc::now();
    let review_cycle = asset.enter_review(entry)?;
    asset.updated_at = Some(now);
    asset.updated_by = Some(requester_id);
    session.update_asset(&asset).await?;

    let (stage, approvals) = match requester.effective_supervisor() {
        Some(supervisor) => {
            let record = session
                .insert_pending_approval(&NewApproval {
                    asset_id: asset_id.clone(),
                    approver_id: supervisor,
                    review_cycle,
                    created_by: requester_id,
                    created_at: now,
                })
                .await?;
            (ChainStage::AwaitingSupervisor { supervisor }, vec![record])
        }
        None => {
            let scope = manager_scope_for(scope_mode, &requester);
            let created =
                create_manager_approvals_in(session, asset_id, review_cycle, scope, requester_id)
                    .await?;
            (ChainStage::AwaitingManagerQuorum, created)
        }
    };

    info!(
        event_name = "workflow.review_started",
        asset_id = %asset_id,
        actor_id = %requester_id,
        review_cycle,
        approver_count = approvals.len(),
        "asset review started"
    );

    Ok(ReviewStarted { asset_id: asset_id.clone(), review_cycle, stage, approvals })
}

/// Creates a pending record for every asset manager in `scope` that has no record yet in this
/// cycle. Fails when the scope holds no asset manager at all.
pub async fn create_manager_approvals_in<S: Session>(
    session: &mut S,
    asset_id: &AssetId,
    review_cycle: u32,
    scope: ManagerScope,
    actor: UserId,
) -> Result<Vec<ApprovalRecord>, ApplicationError> {
    let managers = session.list_asset_managers(scope).await?;
    if managers.is_empty() {
        return Err(ApplicationError::NoApproverAvailable);
    }

    let existing = session.list_approvals(asset_id, review_cycle).await?;
    let now = Utc::now();
    let mut created = Vec::new();
    for manager in managers {
        if existing.iter().any(|record| record.approver_id == manager) {
            debug!(asset_id = %asset_id, approver_id = %manager, "approver already has a record");
            continue;
        }
        let record = session
            .insert_pending_approval(&NewApproval {
                asset_id: asset_id.clone(),
                approver_id: manager,
                review_cycle,
                created_by: actor,
                created_at: now,
            })
            .await?;
        created.push(record);
    }

    Ok(created)
}

/// Records one approver's decision and resolves the cycle when the chain allows it.
/// Any miss (unknown asset, closed cycle, wrong approver, already decided) is reported as
/// `NoPendingApproval` without touching state.
pub async fn submit_decision_in<S: Session>(
    session: &mut S,
    asset_id: &AssetId,
    approver_id: UserId,
    decision: ApprovalDecision,
    comments: Option<String>,
    scope_mode: ManagerScopeMode,
) -> Result<DecisionOutcome, ApplicationError> {
    let Some(mut asset) = session.lock_asset(asset_id).await? else {
        return Err(ApplicationError::NoPendingApproval);
    };
    if asset.status != AssetStatus::UnderReview {
        return Err(ApplicationError::NoPendingApproval);
    }
    let review_cycle = asset.review_cycle;
    let pending = session
        .find_pending_approval(asset_id, approver_id, review_cycle)
        .await?
        .ok_or(ApplicationError::NoPendingApproval)?;

    let now = Utc::now();
    let stamped = session
        .record_decision(&DecisionStamp {
            approval_id: pending.id,
            status: decision.status(),
            comments,
            decided_by: approver_id,
            decided_at: now,
        })
        .await?;
    if !stamped {
        return Err(ApplicationError::NoPendingApproval);
    }

    info!(
        event_name = "workflow.approval_decided",
        asset_id = %asset_id,
        actor_id = %approver_id,
        review_cycle,
        decision = decision.status().as_str(),
        "approval decision recorded"
    );

    let requester = requester_entry(session, &asset).await?;
    let supervisor = requester.effective_supervisor();
    let scope = manager_scope_for(scope_mode, &requester);
    let managers = session.list_asset_managers(scope).await?;
    let records = session.list_approvals(asset_id, review_cycle).await?;
    let verdict = ChainSnapshot::new(supervisor, &managers, &records).verdict();

    let mut created_approvals = Vec::new();
    match verdict {
        ChainVerdict::Discarded { rejected_by } => {
            asset.resolve_review(AssetStatus::Discarded)?;
            asset.updated_at = Some(now);
            asset.updated_by = Some(approver_id);
            session.update_asset(&asset).await?;
            info!(
                event_name = "workflow.asset_discarded",
                asset_id = %asset_id,
                actor_id = %rejected_by,
                review_cycle,
                "asset discarded after rejection"
            );
        }
        ChainVerdict::Assigned => {
            asset.resolve_review(AssetStatus::Assigned)?;
            asset.updated_at = Some(now);
            asset.updated_by = Some(approver_id);
            session.update_asset(&asset).await?;
            info!(
                event_name = "workflow.asset_assigned",
                asset_id = %asset_id,
                actor_id = %approver_id,
                review_cycle,
                "approval chain satisfied, asset assigned"
            );
        }
        ChainVerdict::InProgress(ChainStage::AwaitingManagerQuorum)
            if supervisor == Some(approver_id) && decision == ApprovalDecision::Approve =>
        {
            created_approvals =
                create_manager_approvals_in(session, asset_id, review_cycle, scope, approver_id)
                    .await?;
            info!(
                event_name = "workflow.manager_stage_opened",
                asset_id = %asset_id,
                actor_id = %approver_id,
                review_cycle,
                approver_count = created_approvals.len(),
                "supervisor approved, asset managers asked"
            );
        }
        ChainVerdict::InProgress(_) => {}
    }

    Ok(DecisionOutcome {
        asset_id: asset_id.clone(),
        review_cycle,
        approver_id,
        decision,
        verdict,
        asset_status: asset.status,
        created_approvals,
    })
}

/// Assets waiting on `approver_id` in their current review cycle.
pub async fn pending_for_in<S: Session>(
    session: &mut S,
    approver_id: UserId,
) -> Result<Vec<AssetSummary>, ApplicationError> {
    Ok(session.list_pending_assets(approver_id).await?)
}

/// Whether a stored record still counts as outstanding work for its approver.
pub fn is_outstanding(record: &ApprovalRecord, asset: &Asset) -> bool {
    record.status == ApprovalStatus::Pending
        && asset.status == AssetStatus::UnderReview
        && record.review_cycle == asset.review_cycle
}
