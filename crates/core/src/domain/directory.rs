use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DepartmentId(pub i64);

/// Stored supervisor reference that means "reports to nobody".
pub const NO_SUPERVISOR: UserId = UserId(0);

/// Read-only organisational identity as seen by the workflow engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: UserId,
    pub name: String,
    pub department_id: DepartmentId,
    pub title: String,
    pub supervisor_id: UserId,
    pub is_asset_manager: bool,
}

impl DirectoryEntry {
    /// The supervisor gate applies only to a distinct, real supervisor.
    pub fn effective_supervisor(&self) -> Option<UserId> {
        (self.supervisor_id != NO_SUPERVISOR && self.supervisor_id != self.id)
            .then_some(self.supervisor_id)
    }
}

/// Which asset managers are eligible for the manager quorum stage.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ManagerScope {
    #[default]
    Global,
    Department(DepartmentId),
}

#[cfg(test)]
mod tests {
    use super::{DepartmentId, DirectoryEntry, UserId, NO_SUPERVISOR};

    fn entry(id: i64, supervisor: UserId) -> DirectoryEntry {
        DirectoryEntry {
            id: UserId(id),
            name: format!("user-{id}"),
            department_id: DepartmentId(1),
            title: "Engineer".to_string(),
            supervisor_id: supervisor,
            is_asset_manager: false,
        }
    }

    #[test]
    fn sentinel_and_self_supervision_mean_no_supervisor() {
        assert_eq!(entry(5, NO_SUPERVISOR).effective_supervisor(), None);
        assert_eq!(entry(5, UserId(5)).effective_supervisor(), None);
        assert_eq!(entry(5, UserId(10)).effective_supervisor(), Some(UserId(10)));
    }
}
