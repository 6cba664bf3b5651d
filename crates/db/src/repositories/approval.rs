use async_trait::async_trait;
use sqlx::{sqlite::SqliteRow, Row};

use assetflow_core::domain::approval::{
    ApprovalId, ApprovalRecord, ApprovalStatus, DecisionStamp, NewApproval,
};
use assetflow_core::domain::asset::{AssetId, AssetStatus, AssetSummary};
use assetflow_core::domain::directory::UserId;
use assetflow_core::errors::StoreError;
use assetflow_core::store::ApprovalStore;

use super::{
    db, parse_currency, parse_optional_rfc3339, parse_rfc3339, RepositoryError, SqlSession,
};

const APPROVAL_COLUMNS: &str = "id, asset_id, approver_id, review_cycle, status, comments, \
     decided_at, created_at, created_by, updated_at, updated_by";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovalRow {
    pub id: i64,
    pub asset_id: String,
    pub approver_id: i64,
    pub review_cycle: i64,
    pub status: String,
    pub comments: Option<String>,
    pub decided_at: Option<String>,
    pub created_at: String,
    pub created_by: i64,
    pub updated_at: Option<String>,
    pub updated_by: Option<i64>,
}

impl TryFrom<ApprovalRow> for ApprovalRecord {
    type Error = RepositoryError;

    fn try_from(value: ApprovalRow) -> Result<Self, Self::Error> {
        let status = ApprovalStatus::parse(&value.status).ok_or_else(|| {
            RepositoryError::Decode(format!("invalid approval status: {}", value.status))
        })?;
        let review_cycle = u32::try_from(value.review_cycle).map_err(|_| {
            RepositoryError::Decode(format!("invalid review cycle: {}", value.review_cycle))
        })?;

        Ok(Self {
            id: ApprovalId(value.id),
            asset_id: AssetId(value.asset_id),
            approver_id: UserId(value.approver_id),
            review_cycle,
            status,
            comments: value.comments,
            decided_at: parse_optional_rfc3339(
                "approval decided_at",
                value.decided_at.as_deref(),
            )?,
            created_at: parse_rfc3339("approval created_at", &value.created_at)?,
            created_by: UserId(value.created_by),
            updated_at: parse_optional_rfc3339(
                "approval updated_at",
                value.updated_at.as_deref(),
            )?,
            updated_by: value.updated_by.map(UserId),
        })
    }
}

fn approval_row_from_row(row: &SqliteRow) -> Result<ApprovalRow, RepositoryError> {
    Ok(ApprovalRow {
        id: row.try_get("id")?,
        asset_id: row.try_get("asset_id")?,
        approver_id: row.try_get("approver_id")?,
        review_cycle: row.try_get("review_cycle")?,
        status: row.try_get("status")?,
        comments: row.try_get("comments")?,
        decided_at: row.try_get("decided_at")?,
        created_at: row.try_get("created_at")?,
        created_by: row.try_get("created_by")?,
        updated_at: row.try_get("updated_at")?,
        updated_by: row.try_get("updated_by")?,
    })
}

fn approval_from_row(row: &SqliteRow) -> Result<ApprovalRecord, RepositoryError> {
    ApprovalRecord::try_from(approval_row_from_row(row)?)
}

fn summary_from_row(row: &SqliteRow) -> Result<AssetSummary, RepositoryError> {
    let status: String = row.try_get("status")?;
    let value: String = row.try_get("value")?;

    Ok(AssetSummary {
        id: AssetId(row.try_get("id")?),
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        subcategory: row.try_get("subcategory")?,
        requester_id: UserId(row.try_get("requester_id")?),
        status: AssetStatus::parse(&status)
            .ok_or_else(|| RepositoryError::Decode(format!("invalid asset status: {status}")))?,
        value: parse_currency("asset value", &value)?,
    })
}

#[async_trait]
impl ApprovalStore for SqlSession {
    async fn list_approvals(
        &mut self,
        asset_id: &AssetId,
        review_cycle: u32,
    ) -> Result<Vec<ApprovalRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM asset_approval
             WHERE asset_id = ? AND review_cycle = ?
             ORDER BY id ASC"
        ))
        .bind(&asset_id.0)
        .bind(i64::from(review_cycle))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;

        Ok(rows.iter().map(approval_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn find_pending_approval(
        &mut self,
        asset_id: &AssetId,
        approver_id: UserId,
        review_cycle: u32,
    ) -> Result<Option<ApprovalRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {APPROVAL_COLUMNS} FROM asset_approval
             WHERE asset_id = ? AND approver_id = ? AND review_cycle = ? AND status = 'pending'"
        ))
        .bind(&asset_id.0)
        .bind(approver_id.0)
        .bind(i64::from(review_cycle))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;

        Ok(row.as_ref().map(approval_from_row).transpose()?)
    }

    async fn insert_pending_approval(
        &mut self,
        approval: &NewApproval,
    ) -> Result<ApprovalRecord, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO asset_approval (asset_id, approver_id, review_cycle, status, created_at,
                                         created_by)
             VALUES (?, ?, ?, 'pending', ?, ?)
             RETURNING {APPROVAL_COLUMNS}"
        ))
        .bind(&approval.asset_id.0)
        .bind(approval.approver_id.0)
        .bind(i64::from(approval.review_cycle))
        .bind(approval.created_at.to_rfc3339())
        .bind(approval.created_by.0)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db)?;

        Ok(approval_from_row(&row)?)
    }

    async fn record_decision(&mut self, stamp: &DecisionStamp) -> Result<bool, StoreError> {
        let decided_at = stamp.decided_at.to_rfc3339();
        let result = sqlx::query(
            "UPDATE asset_approval
             SET status = ?, comments = ?, decided_at = ?, updated_at = ?, updated_by = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(stamp.status.as_str())
        .bind(&stamp.comments)
        .bind(&decided_at)
        .bind(&decided_at)
        .bind(stamp.decided_by.0)
        .bind(stamp.approval_id.0)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;

        Ok(result.rows_affected() == 1)
    }

    async fn list_pending_assets(
        &mut self,
        approver_id: UserId,
    ) -> Result<Vec<AssetSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT a.id, a.name, a.category, a.subcategory, a.requester_id, a.status, a.value
             FROM asset a
             JOIN asset_approval ap
               ON ap.asset_id = a.id AND ap.review_cycle = a.review_cycle
             WHERE ap.approver_id = ? AND ap.status = 'pending' AND a.status = 'under_review'
             ORDER BY ap.created_at ASC, ap.id ASC",
        )
        .bind(approver_id.0)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;

        Ok(rows.iter().map(summary_from_row).collect::<Result<Vec<_>, _>>()?)
    }
}
