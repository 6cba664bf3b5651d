use std::sync::Arc;

use crate::audit::{settle, AuditCategory, AuditContext, AuditOutcome, AuditSink, PendingAudit};
use crate::domain::approval::{ApprovalDecision, ApprovalRecord};
use crate::domain::asset::{AssetId, AssetSummary, ReviewEntry};
use crate::domain::directory::UserId;
use crate::errors::ApplicationError;
use crate::store::{Session, Store};
use crate::workflow::chain::ChainVerdict;
use crate::workflow::engine::{
    pending_for_in, start_review_in, submit_decision_in, DecisionOutcome, ReviewStarted,
};
use crate::workflow::WorkflowSettings;

/// Transactional entry points of the approval workflow. Every call runs in its own session,
/// is re-executed whole on transient store failures, and publishes audit events only after a
/// successful commit.
pub struct ApprovalWorkflow<S> {
    store: S,
    settings: WorkflowSettings,
    audit: Arc<dyn AuditSink>,
}

impl<S> ApprovalWorkflow<S>
where
    S: Store,
{
    pub fn new(store: S, settings: WorkflowSettings, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, settings, audit }
    }

    pub async fn start_review(
        &self,
        context: &AuditContext,
        asset_id: &AssetId,
        requester_id: UserId,
    ) -> Result<ReviewStarted, ApplicationError> {
        let result = self
            .settings
            .retry
            .run("workflow.start_review", || self.start_review_once(context, asset_id, requester_id))
            .await;
        settle(
            self.audit.as_ref(),
            context,
            Some(asset_id),
            "workflow.review_started",
            AuditCategory::Workflow,
            result,
        )
    }

    pub async fn submit_approval(
        &self,
        context: &AuditContext,
        asset_id: &AssetId,
        approver_id: UserId,
        approved: bool,
        comments: Option<String>,
    ) -> Result<DecisionOutcome, ApplicationError> {
        let decision = ApprovalDecision::from_approved(approved);
        let result = self
            .settings
            .retry
            .run("workflow.submit_approval", || {
                self.submit_once(context, asset_id, approver_id, decision, comments.clone())
            })
            .await;
        settle(
            self.audit.as_ref(),
            context,
            Some(asset_id),
            "workflow.approval_decided",
            AuditCategory::Workflow,
            result,
        )
    }

    pub async fn list_pending_approvals(
        &self,
        approver_id: UserId,
    ) -> Result<Vec<AssetSummary>, ApplicationError> {
        self.settings
            .retry
            .run("workflow.list_pending", || self.pending_once(approver_id))
            .await
    }

    async fn pending_once(&self, approver_id: UserId) -> Result<Vec<AssetSummary>, ApplicationError> {
        let mut session = self.store.begin().await?;
        let pending = pending_for_in(&mut session, approver_id).await?;
        session.commit().await?;
        Ok(pending)
    }

    async fn start_review_once(
        &self,
        context: &AuditContext,
        asset_id: &AssetId,
        requester_id: UserId,
    ) -> Result<(ReviewStarted, PendingAudit), ApplicationError> {
        let mut session = self.store.begin().await?;
        let started = start_review_in(
            &mut session,
            asset_id,
            requester_id,
            ReviewEntry::Initial,
            self.settings.manager_scope,
        )
        .await?;

        let mut audit = PendingAudit::default();
        audit.push(
            context
                .event(
                    Some(asset_id),
                    "workflow.review_started",
                    AuditCategory::Workflow,
                    AuditOutcome::Success,
                )
                .with_metadata("review_cycle", started.review_cycle.to_string())
                .with_metadata("approvers", approver_list(&started.approvals)),
        );

        session.commit().await?;
        Ok((started, audit))
    }

    async fn submit_once(
        &self,
        context: &AuditContext,
        asset_id: &AssetId,
        approver_id: UserId,
        decision: ApprovalDecision,
        comments: Option<String>,
    ) -> Result<(DecisionOutcome, PendingAudit), ApplicationError> {
        let mut session = self.store.begin().await?;
        let outcome = submit_decision_in(
            &mut session,
            asset_id,
            approver_id,
            decision,
            comments,
            self.settings.manager_scope,
        )
        .await?;

        let mut audit = PendingAudit::default();
        audit.push(
            context
                .event(
                    Some(asset_id),
                    "workflow.approval_decided",
                    AuditCategory::Workflow,
                    AuditOutcome::Success,
                )
                .with_metadata("approver_id", approver_id.to_string())
                .with_metadata("decision", decision.status().as_str())
                .with_metadata("review_cycle", outcome.review_cycle.to_string()),
        );
        match outcome.verdict {
            ChainVerdict::Assigned => audit.push(
                context
                    .event(
                        Some(asset_id),
                        "workflow.asset_assigned",
                        AuditCategory::Workflow,
                        AuditOutcome::Success,
                    )
                    .with_metadata("review_cycle", outcome.review_cycle.to_string()),
            ),
            ChainVerdict::Discarded { rejected_by } => audit.push(
                context
                    .event(
                        Some(asset_id),
                        "workflow.asset_discarded",
                        AuditCategory::Workflow,
                        AuditOutcome::Rejected,
                    )
                    .with_metadata("rejected_by", rejected_by.to_string())
                    .with_metadata("review_cycle", outcome.review_cycle.to_string()),
            ),
            ChainVerdict::InProgress(_) if !outcome.created_approvals.is_empty() => audit.push(
                context
                    .event(
                        Some(asset_id),
                        "workflow.manager_stage_opened",
                        AuditCategory::Workflow,
                        AuditOutcome::Success,
                    )
                    .with_metadata("approvers", approver_list(&outcome.created_approvals)),
            ),
            ChainVerdict::InProgress(_) => {}
        }

        session.commit().await?;
        Ok((outcome, audit))
    }
}

fn approver_list(records: &[ApprovalRecord]) -> String {
    records.iter().map(|record| record.approver_id.to_string()).collect::<Vec<_>>().join(",")
}
