use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::directory::{DepartmentId, UserId};
use crate::errors::DomainError;

const ASSET_ID_PREFIX: &str = "AST-";

/// Sequential asset key formatted `AST-NNN`. The numeric part is zero-padded to at least
/// three digits and widens past `AST-999`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssetId(pub String);

impl AssetId {
    pub fn from_sequence(number: u64) -> Self {
        Self(format!("{ASSET_ID_PREFIX}{number:03}"))
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let id = Self(raw.trim().to_string());
        id.sequence_number()?;
        Ok(id)
    }

    pub fn sequence_number(&self) -> Result<u64, DomainError> {
        let digits = self
            .0
            .strip_prefix(ASSET_ID_PREFIX)
            .ok_or_else(|| DomainError::InvalidAssetId(self.0.clone()))?;
        if digits.len() < 3 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(DomainError::InvalidAssetId(self.0.clone()));
        }
        digits.parse::<u64>().map_err(|_| DomainError::InvalidAssetId(self.0.clone()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetStatus {
    New,
    UnderReview,
    Assigned,
    Discarded,
}

impl AssetStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::UnderReview => "under_review",
            Self::Assigned => "assigned",
            Self::Discarded => "discarded",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().replace([' ', '-'], "_").as_str() {
            "new" => Some(Self::New),
            "under_review" => Some(Self::UnderReview),
            "assigned" => Some(Self::Assigned),
            "discarded" => Some(Self::Discarded),
            _ => None,
        }
    }

    /// Terminal for the current review cycle; a new cycle may start from here.
    pub fn closes_cycle(self) -> bool {
        matches!(self, Self::Assigned | Self::Discarded)
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub id: AssetId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub subcategory: String,
    pub requester_id: UserId,
    pub responsible_person_id: UserId,
    pub status: AssetStatus,
    pub value: Decimal,
    pub review_cycle: u32,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<UserId>,
}

/// How a review cycle is being opened.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewEntry {
    /// Explicit review request; only a `New` asset qualifies.
    Initial,
    /// Edit that moves the asset back into review; a closed cycle may be reopened.
    Reopen,
}

impl Asset {
    /// Approval outcomes (`Assigned`, `Discarded`) are only ever written by the workflow
    /// engine and are not reachable through this check.
    pub fn can_enter_review(&self, entry: ReviewEntry) -> bool {
        match entry {
            ReviewEntry::Initial => self.status == AssetStatus::New,
            ReviewEntry::Reopen => self.status == AssetStatus::New || self.status.closes_cycle(),
        }
    }

    /// The requester may only change while no cycle is open and none has been assigned.
    pub fn requester_is_frozen(&self) -> bool {
        matches!(self.status, AssetStatus::UnderReview | AssetStatus::Assigned)
    }

    pub fn enter_review(&mut self, entry: ReviewEntry) -> Result<u32, DomainError> {
        if !self.can_enter_review(entry) {
            return Err(DomainError::InvalidAssetTransition {
                from: self.status,
                to: AssetStatus::UnderReview,
            });
        }
        self.status = AssetStatus::UnderReview;
        self.review_cycle += 1;
        Ok(self.review_cycle)
    }

    pub fn resolve_review(&mut self, outcome: AssetStatus) -> Result<(), DomainError> {
        if self.status != AssetStatus::UnderReview || !outcome.closes_cycle() {
            return Err(DomainError::InvalidAssetTransition { from: self.status, to: outcome });
        }
        self.status = outcome;
        Ok(())
    }

    pub fn summary(&self) -> AssetSummary {
        AssetSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            category: self.category.clone(),
            subcategory: self.subcategory.clone(),
            requester_id: self.requester_id,
            status: self.status,
            value: self.value,
        }
    }
}

/// Fields a caller supplies when registering an asset; the rest is assigned by the core.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAsset {
    pub name: String,
    pub description: String,
    pub category: String,
    pub subcategory: String,
    pub responsible_person_id: UserId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetUpdate {
    pub id: AssetId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub subcategory: String,
    pub requester_id: UserId,
    pub responsible_person_id: UserId,
    pub status: AssetStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetSummary {
    pub id: AssetId,
    pub name: String,
    pub category: String,
    pub subcategory: String,
    pub requester_id: UserId,
    pub status: AssetStatus,
    pub value: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssetFilter {
    pub requester_id: Option<UserId>,
    /// Only assets whose requester currently belongs to this department.
    pub requester_department: Option<DepartmentId>,
    pub status: Option<AssetStatus>,
}

/// Normalises a currency amount to two decimal places.
pub fn currency(amount: Decimal) -> Decimal {
    let mut rounded = amount.round_dp(2);
    rounded.rescale(2);
    rounded
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::{currency, Asset, AssetId, AssetStatus, ReviewEntry};
    use crate::domain::directory::UserId;
    use crate::errors::DomainError;

    fn asset(status: AssetStatus) -> Asset {
        Asset {
            id: AssetId::from_sequence(7),
            name: "Laptop".to_string(),
            description: "Developer workstation".to_string(),
            category: "IT".to_string(),
            subcategory: "Hardware".to_string(),
            requester_id: UserId(1),
            responsible_person_id: UserId(1),
            status,
            value: Decimal::ZERO,
            review_cycle: 0,
            created_at: Utc::now(),
            created_by: UserId(1),
            updated_at: None,
            updated_by: None,
        }
    }

    #[test]
    fn asset_ids_are_zero_padded_and_widen_past_three_digits() {
        assert_eq!(AssetId::from_sequence(7).0, "AST-007");
        assert_eq!(AssetId::from_sequence(999).0, "AST-999");
        assert_eq!(AssetId::from_sequence(1000).0, "AST-1000");
        assert_eq!(AssetId::from_sequence(1000).sequence_number(), Ok(1000));
    }

    #[test]
    fn malformed_asset_ids_are_rejected() {
        for raw in ["AST-7", "AST-07x", "ASSET-007", "", "AST-"] {
            assert!(
                matches!(AssetId::parse(raw), Err(DomainError::InvalidAssetId(_))),
                "{raw} should be rejected"
            );
        }
        assert_eq!(AssetId::parse(" AST-042 ").map(|id| id.0), Ok("AST-042".to_string()));
    }

    #[test]
    fn status_parsing_accepts_display_spelling() {
        assert_eq!(AssetStatus::parse("Under Review"), Some(AssetStatus::UnderReview));
        assert_eq!(AssetStatus::parse("under_review"), Some(AssetStatus::UnderReview));
        assert_eq!(AssetStatus::parse("retired"), None);
    }

    #[test]
    fn entering_review_opens_a_new_cycle() {
        let mut asset = asset(AssetStatus::New);
        assert_eq!(asset.enter_review(ReviewEntry::Initial), Ok(1));
        assert_eq!(asset.status, AssetStatus::UnderReview);

        let error = asset.enter_review(ReviewEntry::Reopen).expect_err("already under review");
        assert!(matches!(error, DomainError::InvalidAssetTransition { .. }));

        asset.resolve_review(AssetStatus::Discarded).expect("discard");
        assert_eq!(asset.enter_review(ReviewEntry::Reopen), Ok(2));
    }

    #[test]
    fn only_new_assets_accept_an_initial_review_request() {
        assert!(asset(AssetStatus::New).can_enter_review(ReviewEntry::Initial));
        for status in [AssetStatus::UnderReview, AssetStatus::Assigned, AssetStatus::Discarded] {
            let closed = asset(status);
            assert!(!closed.can_enter_review(ReviewEntry::Initial), "{status} is not new");
            assert_eq!(closed.can_enter_review(ReviewEntry::Reopen), status.closes_cycle());
        }

        let mut discarded = asset(AssetStatus::Discarded);
        let error = discarded.enter_review(ReviewEntry::Initial).expect_err("closed");
        assert_eq!(
            error,
            DomainError::InvalidAssetTransition {
                from: AssetStatus::Discarded,
                to: AssetStatus::UnderReview
            }
        );
    }

    #[test]
    fn requester_is_frozen_while_reviewed_or_assigned() {
        assert!(!asset(AssetStatus::New).requester_is_frozen());
        assert!(!asset(AssetStatus::Discarded).requester_is_frozen());
        assert!(asset(AssetStatus::UnderReview).requester_is_frozen());
        assert!(asset(AssetStatus::Assigned).requester_is_frozen());
    }

    #[test]
    fn review_can_only_resolve_to_terminal_outcome() {
        let mut asset = asset(AssetStatus::UnderReview);
        assert!(asset.resolve_review(AssetStatus::New).is_err());
        asset.resolve_review(AssetStatus::Assigned).expect("assign");
        assert!(asset.resolve_review(AssetStatus::Discarded).is_err());
    }

    #[test]
    fn currency_rounds_to_cents() {
        assert_eq!(currency(Decimal::new(15, 0)).to_string(), "15.00");
        assert_eq!(currency(Decimal::new(100_555, 3)).to_string(), "100.56");
    }
}
