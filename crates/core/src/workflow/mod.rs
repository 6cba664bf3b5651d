pub mod chain;
pub mod engine;
pub mod service;

use crate::config::{ManagerScopeMode, WorkflowConfig};
use crate::domain::directory::DepartmentId;
use crate::retry::RetryPolicy;

pub use chain::{ChainSnapshot, ChainStage, ChainVerdict};
pub use engine::{
    create_manager_approvals_in, is_outstanding, manager_scope_for, pending_for_in,
    start_review_in, submit_decision_in, DecisionOutcome, ReviewStarted,
};
pub use service::ApprovalWorkflow;

/// Runtime knobs shared by the transactional services.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkflowSettings {
    pub manager_scope: ManagerScopeMode,
    pub retry: RetryPolicy,
    pub shared_view_department: Option<DepartmentId>,
}

impl WorkflowSettings {
    pub fn from_config(config: &WorkflowConfig) -> Self {
        Self {
            manager_scope: config.manager_scope,
            retry: config.retry_policy(),
            shared_view_department: config.shared_view_department.map(DepartmentId),
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            manager_scope: ManagerScopeMode::Global,
            retry: RetryPolicy::default(),
            shared_view_department: None,
        }
    }
}
