use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{sqlite::SqliteRow, Row};

use assetflow_core::domain::asset::AssetId;
use assetflow_core::domain::directory::UserId;
use assetflow_core::domain::maintenance::{
    MaintenanceRecord, MaintenanceRecordId, MaintenanceUpdate, NewMaintenanceRecord,
};
use assetflow_core::errors::StoreError;
use assetflow_core::store::MaintenanceStore;

use super::asset::currency_text;
use super::{
    db, parse_currency, parse_date, parse_optional_rfc3339, parse_rfc3339, RepositoryError,
    SqlSession, DATE_FORMAT,
};

const MAINTENANCE_COLUMNS: &str = "id, asset_id, cost, maintenance_type, vendor, comments, \
     maintenance_date, created_at, created_by, updated_at, updated_by";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaintenanceRow {
    pub id: i64,
    pub asset_id: String,
    pub cost: String,
    pub maintenance_type: String,
    pub vendor: String,
    pub comments: String,
    pub maintenance_date: String,
    pub created_at: String,
    pub created_by: i64,
    pub updated_at: Option<String>,
    pub updated_by: Option<i64>,
}

impl TryFrom<MaintenanceRow> for MaintenanceRecord {
    type Error = RepositoryError;

    fn try_from(value: MaintenanceRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: MaintenanceRecordId(value.id),
            asset_id: AssetId(value.asset_id),
            cost: parse_currency("maintenance cost", &value.cost)?,
            maintenance_type: value.maintenance_type,
            vendor: value.vendor,
            comments: value.comments,
            maintenance_date: parse_date("maintenance_date", &value.maintenance_date)?,
            created_at: parse_rfc3339("maintenance created_at", &value.created_at)?,
            created_by: UserId(value.created_by),
            updated_at: parse_optional_rfc3339(
                "maintenance updated_at",
                value.updated_at.as_deref(),
            )?,
            updated_by: value.updated_by.map(UserId),
        })
    }
}

fn maintenance_row_from_row(row: &SqliteRow) -> Result<MaintenanceRow, RepositoryError> {
    Ok(MaintenanceRow {
        id: row.try_get("id")?,
        asset_id: row.try_get("asset_id")?,
        cost: row.try_get("cost")?,
        maintenance_type: row.try_get("maintenance_type")?,
        vendor: row.try_get("vendor")?,
        comments: row.try_get("comments")?,
        maintenance_date: row.try_get("maintenance_date")?,
        created_at: row.try_get("created_at")?,
        created_by: row.try_get("created_by")?,
        updated_at: row.try_get("updated_at")?,
        updated_by: row.try_get("updated_by")?,
    })
}

fn maintenance_from_row(row: &SqliteRow) -> Result<MaintenanceRecord, RepositoryError> {
    MaintenanceRecord::try_from(maintenance_row_from_row(row)?)
}

#[async_trait]
impl MaintenanceStore for SqlSession {
    async fn insert_maintenance(
        &mut self,
        record: &NewMaintenanceRecord,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<MaintenanceRecord, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO maintenance_record (asset_id, cost, maintenance_type, vendor, comments,
                                             maintenance_date, created_at, created_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {MAINTENANCE_COLUMNS}"
        ))
        .bind(&record.asset_id.0)
        .bind(currency_text(record.cost))
        .bind(&record.maintenance_type)
        .bind(&record.vendor)
        .bind(&record.comments)
        .bind(record.maintenance_date.format(DATE_FORMAT).to_string())
        .bind(at.to_rfc3339())
        .bind(actor.0)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(db)?;

        Ok(maintenance_from_row(&row)?)
    }

    async fn find_maintenance(
        &mut self,
        id: MaintenanceRecordId,
    ) -> Result<Option<MaintenanceRecord>, StoreError> {
        let row =
            sqlx::query(&format!("SELECT {MAINTENANCE_COLUMNS} FROM maintenance_record WHERE id = ?"))
                .bind(id.0)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(db)?;

        Ok(row.as_ref().map(maintenance_from_row).transpose()?)
    }

    async fn update_maintenance(
        &mut self,
        update: &MaintenanceUpdate,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> Result<Option<AssetId>, StoreError> {
        let asset_id: Option<String> = sqlx::query_scalar(
            "UPDATE maintenance_record
             SET cost = ?, maintenance_type = ?, vendor = ?, comments = ?, maintenance_date = ?,
                 updated_at = ?, updated_by = ?
             WHERE id = ?
             RETURNING asset_id",
        )
        .bind(currency_text(update.cost))
        .bind(&update.maintenance_type)
        .bind(&update.vendor)
        .bind(&update.comments)
        .bind(update.maintenance_date.format(DATE_FORMAT).to_string())
        .bind(at.to_rfc3339())
        .bind(actor.0)
        .bind(update.id.0)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?;

        Ok(asset_id.map(AssetId))
    }

    async fn delete_maintenance(
        &mut self,
        id: MaintenanceRecordId,
    ) -> Result<Option<AssetId>, StoreError> {
        let asset_id: Option<String> =
            sqlx::query_scalar("DELETE FROM maintenance_record WHERE id = ? RETURNING asset_id")
                .bind(id.0)
                .fetch_optional(&mut *self.tx)
                .await
                .map_err(db)?;

        Ok(asset_id.map(AssetId))
    }

    async fn list_maintenance(
        &mut self,
        asset_id: &AssetId,
    ) -> Result<Vec<MaintenanceRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {MAINTENANCE_COLUMNS} FROM maintenance_record
             WHERE asset_id = ?
             ORDER BY maintenance_date ASC, id ASC"
        ))
        .bind(&asset_id.0)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;

        Ok(rows.iter().map(maintenance_from_row).collect::<Result<Vec<_>, _>>()?)
    }

    async fn maintenance_costs(&mut self, asset_id: &AssetId) -> Result<Vec<Decimal>, StoreError> {
        let costs: Vec<String> =
            sqlx::query_scalar("SELECT cost FROM maintenance_record WHERE asset_id = ?")
                .bind(&asset_id.0)
                .fetch_all(&mut *self.tx)
                .await
                .map_err(db)?;

        Ok(costs
            .iter()
            .map(|cost| parse_currency("maintenance cost", cost))
            .collect::<Result<Vec<_>, _>>()?)
    }
}
