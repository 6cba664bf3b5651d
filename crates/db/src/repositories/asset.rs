use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, QueryBuilder, Row, Sqlite};

use assetflow_core::domain::asset::{currency, Asset, AssetFilter, AssetId, AssetStatus};
use assetflow_core::domain::directory::UserId;
use assetflow_core::errors::StoreError;
use assetflow_core::store::AssetStore;

use super::{
    db, parse_currency, parse_optional_rfc3339, parse_rfc3339, RepositoryError, SqlSession,
};

pub(crate) const ASSET_COLUMNS: &str = "id, name, description, category, subcategory, requester_id, \
     responsible_person_id, status, value, review_cycle, created_at, created_by, updated_at, \
     updated_by";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssetRecord {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub subcategory: String,
    pub requester_id: i64,
    pub responsible_person_id: i64,
    pub status: String,
    pub value: String,
    pub review_cycle: i64,
    pub created_at: String,
    pub created_by: i64,
    pub updated_at: Option<String>,
    pub updated_by: Option<i64>,
}

impl TryFrom<AssetRecord> for Asset {
    type Error = RepositoryError;

    fn try_from(value: AssetRecord) -> Result<Self, Self::Error> {
        let status = AssetStatus::parse(&value.status).ok_or_else(|| {
            RepositoryError::Decode(format!("invalid asset status: {}", value.status))
        })?;
        let review_cycle = u32::try_from(value.review_cycle).map_err(|_| {
            RepositoryError::Decode(format!("invalid review cycle: {}", value.review_cycle))
        })?;

        Ok(Self {
            id: AssetId(value.id),
            name: value.name,
            description: value.description,
            category: value.category,
            subcategory: value.subcategory,
            requester_id: UserId(value.requester_id),
            responsible_person_id: UserId(value.responsible_person_id),
            status,
            value: parse_currency("asset value", &value.value)?,
            review_cycle,
            created_at: parse_rfc3339("asset created_at", &value.created_at)?,
            created_by: UserId(value.created_by),
            updated_at: parse_optional_rfc3339("asset updated_at", value.updated_at.as_deref())?,
            updated_by: value.updated_by.map(UserId),
        })
    }
}

pub(crate) fn asset_record_from_row(row: &SqliteRow) -> Result<AssetRecord, RepositoryError> {
    Ok(AssetRecord {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        category: row.try_get("category")?,
        subcategory: row.try_get("subcategory")?,
        requester_id: row.try_get("requester_id")?,
        responsible_person_id: row.try_get("responsible_person_id")?,
        status: row.try_get("status")?,
        value: row.try_get("value")?,
        review_cycle: row.try_get("review_cycle")?,
        created_at: row.try_get("created_at")?,
        created_by: row.try_get("created_by")?,
        updated_at: row.try_get("updated_at")?,
        updated_by: row.try_get("updated_by")?,
    })
}

pub(crate) fn asset_from_row(row: &SqliteRow) -> Result<Asset, RepositoryError> {
    Asset::try_from(asset_record_from_row(row)?)
}

pub(crate) fn currency_text(amount: Decimal) -> String {
    currency(amount).to_string()
}

#[async_trait]
impl AssetStore for SqlSession {
    async fn lock_asset(&mut self, id: &AssetId) -> Result<Option<Asset>, StoreError> {
        // Must be a write: SQLite takes the writer lock before any read snapshot exists.
        let row = sqlx::query(&format!(
            "UPDATE asset SET lock_version = lock_version + 1 WHERE id = ? RETURNING {ASSET_COLUMNS}"
        ))
        .bind(&id.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;

        Ok(row.as_ref().map(asset_from_row).transpose()?)
    }

    async fn find_asset(&mut self, id: &AssetId) -> Result<Option<Asset>, StoreError> {
        let row = sqlx::query(&format!("SELECT {ASSET_COLUMNS} FROM asset WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?;

        Ok(row.as_ref().map(asset_from_row).transpose()?)
    }

    async fn list_assets(&mut self, filter: &AssetFilter) -> Result<Vec<Asset>, StoreError> {
        let mut query = QueryBuilder::<Sqlite>::new(format!("SELECT {ASSET_COLUMNS} FROM asset"));
        let mut separator = " WHERE ";
        if let Some(requester_id) = filter.requester_id {
            query.push(separator).push("requester_id = ").push_bind(requester_id.0);
            separator = " AND ";
        }
        if let Some(department_id) = filter.requester_department {
            query
                .push(separator)
                .push("requester_id IN (SELECT id FROM directory_user WHERE department_id = ")
                .push_bind(department_id.0)
                .push(")");
            separator = " AND ";
        }
        if let Some(status) = filter.status {
            query.push(separator).push("status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY created_at ASC, id ASC");

        let rows = query.build().fetch_all(&mut *self.tx).await.map_err(db)?;
        Ok(rows.iter().map(asset_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn next_asset_number(&mut self) -> Result<u64, StoreError> {
        // Reserve max(sequence, highest existing suffix + 1) and advance past it in one write.
        let reserved: Option<i64> = sqlx::query_scalar(
            "UPDATE asset_sequence
             SET next_value = MAX(
                 next_value,
                 COALESCE((SELECT MAX(CAST(SUBSTR(id, 5) AS INTEGER)) FROM asset), 0) + 1
             ) + 1
             WHERE name = 'asset'
             RETURNING next_value - 1",
        )
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;

        let reserved = reserved.ok_or_else(|| {
            StoreError::Decode("asset sequence row is missing; run migrations".to_string())
        })?;
        u64::try_from(reserved)
            .map_err(|_| StoreError::Decode(format!("invalid asset sequence value: {reserved}")))
    }

    async fn insert_asset(&mut self, asset: &Asset) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO asset (id, name, description, category, subcategory, requester_id,
                                responsible_person_id, status, value, review_cycle, lock_version,
                                created_at, created_by, updated_at, updated_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)",
        )
        .bind(&asset.id.0)
        .bind(&asset.name)
        .bind(&asset.description)
        .bind(&asset.category)
        .bind(&asset.subcategory)
        .bind(asset.requester_id.0)
        .bind(asset.responsible_person_id.0)
        .bind(asset.status.as_str())
        .bind(currency_text(asset.value))
        .bind(i64::from(asset.review_cycle))
        .bind(asset.created_at.to_rfc3339())
        .bind(asset.created_by.0)
        .bind(asset.updated_at.map(|ts| ts.to_rfc3339()))
        .bind(asset.updated_by.map(|user| user.0))
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;

        Ok(())
    }

    async fn update_asset(&mut self, asset: &Asset) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE asset
             SET name = ?, description = ?, category = ?, subcategory = ?, requester_id = ?,
                 responsible_person_id = ?, status = ?, review_cycle = ?, updated_at = ?,
                 updated_by = ?
             WHERE id = ?",
        )
        .bind(&asset.name)
        .bind(&asset.description)
        .bind(&asset.category)
        .bind(&asset.subcategory)
        .bind(asset.requester_id.0)
        .bind(asset.responsible_person_id.0)
        .bind(asset.status.as_str())
        .bind(i64::from(asset.review_cycle))
        .bind(asset.updated_at.map(|ts| ts.to_rfc3339()))
        .bind(asset.updated_by.map(|user| user.0))
        .bind(&asset.id.0)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;

        Ok(())
    }

    async fn set_asset_value(&mut self, id: &AssetId, value: Decimal) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE asset SET value = ? WHERE id = ?")
            .bind(currency_text(value))
            .bind(&id.0)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;

        Ok(result.rows_affected() == 1)
    }

    async fn delete_asset(&mut self, id: &AssetId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM asset WHERE id = ?")
            .bind(&id.0)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;

        Ok(result.rows_affected() == 1)
    }
}
