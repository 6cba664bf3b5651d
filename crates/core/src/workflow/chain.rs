use serde::{Deserialize, Serialize};

use crate::domain::approval::{ApprovalRecord, ApprovalStatus};
use crate::domain::directory::UserId;

/// Where an open review cycle is waiting.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainStage {
    AwaitingSupervisor { supervisor: UserId },
    AwaitingManagerQuorum,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChainVerdict {
    Discarded { rejected_by: UserId },
    Assigned,
    InProgress(ChainStage),
}

impl ChainVerdict {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Discarded { .. } => "discarded",
            Self::Assigned => "assigned",
            Self::InProgress(ChainStage::AwaitingSupervisor { .. }) => "awaiting_supervisor",
            Self::InProgress(ChainStage::AwaitingManagerQuorum) => "awaiting_manager_quorum",
        }
    }
}

/// All approval records of one review cycle together with the directory facts they are judged
/// against. Re-derived on every evaluation; no stage is cached on the asset.
#[derive(Clone, Copy, Debug)]
pub struct ChainSnapshot<'a> {
    supervisor: Option<UserId>,
    managers: &'a [UserId],
    records: &'a [ApprovalRecord],
}

impl<'a> ChainSnapshot<'a> {
    pub fn new(
        supervisor: Option<UserId>,
        managers: &'a [UserId],
        records: &'a [ApprovalRecord],
    ) -> Self {
        Self { supervisor, managers, records }
    }

    pub fn head_satisfied(&self) -> bool {
        match self.supervisor {
            None => true,
            Some(supervisor) => self
                .records
                .iter()
                .any(|record| record.approver_id == supervisor && record.is_approved()),
        }
    }

    /// Quorum of one: any approval from a current asset manager is enough.
    pub fn manager_satisfied(&self) -> bool {
        self.records
            .iter()
            .any(|record| record.is_approved() && self.managers.contains(&record.approver_id))
    }

    pub fn rejected_by(&self) -> Option<UserId> {
        self.records
            .iter()
            .find(|record| record.status == ApprovalStatus::Rejected)
            .map(|record| record.approver_id)
    }

    pub fn verdict(&self) -> ChainVerdict {
        if let Some(rejected_by) = self.rejected_by() {
            return ChainVerdict::Discarded { rejected_by };
        }

        match self.supervisor {
            Some(supervisor) if !self.head_satisfied() => {
                ChainVerdict::InProgress(ChainStage::AwaitingSupervisor { supervisor })
            }
            _ if self.manager_satisfied() => ChainVerdict::Assigned,
            _ => ChainVerdict::InProgress(ChainStage::AwaitingManagerQuorum),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{ChainSnapshot, ChainStage, ChainVerdict};
    use crate::domain::approval::{ApprovalId, ApprovalRecord, ApprovalStatus};
    use crate::domain::asset::AssetId;
    use crate::domain::directory::UserId;

    const SUPERVISOR: UserId = UserId(10);
    const MANAGERS: [UserId; 2] = [UserId(20), UserId(21)];

    fn record(id: i64, approver: UserId, status: ApprovalStatus) -> ApprovalRecord {
        ApprovalRecord {
            id: ApprovalId(id),
            asset_id: AssetId::from_sequence(7),
            approver_id: approver,
            review_cycle: 1,
            status,
            comments: None,
            decided_at: None,
            created_at: Utc::now(),
            created_by: UserId(1),
            updated_at: None,
            updated_by: None,
        }
    }

    #[test]
    fn supervisor_stage_blocks_until_supervisor_approves() {
        let records = vec![record(1, SUPERVISOR, ApprovalStatus::Pending)];
        let snapshot = ChainSnapshot::new(Some(SUPERVISOR), &MANAGERS, &records);

        assert!(!snapshot.head_satisfied());
        assert!(!snapshot.manager_satisfied());
        assert_eq!(
            snapshot.verdict(),
            ChainVerdict::InProgress(ChainStage::AwaitingSupervisor { supervisor: SUPERVISOR })
        );
    }

    #[test]
    fn supervisor_approval_alone_never_assigns() {
        let records = vec![
            record(1, SUPERVISOR, ApprovalStatus::Approved),
            record(2, MANAGERS[0], ApprovalStatus::Pending),
            record(3, MANAGERS[1], ApprovalStatus::Pending),
        ];
        let snapshot = ChainSnapshot::new(Some(SUPERVISOR), &MANAGERS, &records);

        assert!(snapshot.head_satisfied());
        assert_eq!(snapshot.verdict(), ChainVerdict::InProgress(ChainStage::AwaitingManagerQuorum));
    }

    #[test]
    fn one_manager_approval_completes_the_chain() {
        let records = vec![
            record(1, SUPERVISOR, ApprovalStatus::Approved),
            record(2, MANAGERS[0], ApprovalStatus::Approved),
            record(3, MANAGERS[1], ApprovalStatus::Pending),
        ];
        let snapshot = ChainSnapshot::new(Some(SUPERVISOR), &MANAGERS, &records);

        assert_eq!(snapshot.verdict(), ChainVerdict::Assigned);
    }

    #[test]
    fn any_rejection_discards_regardless_of_other_approvals() {
        let records = vec![
            record(1, SUPERVISOR, ApprovalStatus::Approved),
            record(2, MANAGERS[0], ApprovalStatus::Approved),
            record(3, MANAGERS[1], ApprovalStatus::Rejected),
        ];
        let snapshot = ChainSnapshot::new(Some(SUPERVISOR), &MANAGERS, &records);

        assert_eq!(snapshot.verdict(), ChainVerdict::Discarded { rejected_by: MANAGERS[1] });
    }

    #[test]
    fn no_supervisor_means_head_is_satisfied_but_zero_approvals_never_assign() {
        let snapshot = ChainSnapshot::new(None, &MANAGERS, &[]);

        assert!(snapshot.head_satisfied());
        assert!(!snapshot.manager_satisfied());
        assert_eq!(snapshot.verdict(), ChainVerdict::InProgress(ChainStage::AwaitingManagerQuorum));
    }

    #[test]
    fn supervisor_who_is_also_manager_satisfies_both_tiers() {
        let managers = [SUPERVISOR, MANAGERS[0]];
        let records = vec![record(1, SUPERVISOR, ApprovalStatus::Approved)];
        let snapshot = ChainSnapshot::new(Some(SUPERVISOR), &managers, &records);

        assert_eq!(snapshot.verdict(), ChainVerdict::Assigned);
    }

    #[test]
    fn approvals_from_non_managers_do_not_count_toward_quorum() {
        let records = vec![record(1, UserId(99), ApprovalStatus::Approved)];
        let snapshot = ChainSnapshot::new(None, &MANAGERS, &records);

        assert!(!snapshot.manager_satisfied());
        assert_eq!(snapshot.verdict().label(), "awaiting_manager_quorum");
    }
}
