use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::asset::AssetId;
use crate::domain::directory::UserId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MaintenanceRecordId(pub i64);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub id: MaintenanceRecordId,
    pub asset_id: AssetId,
    pub cost: Decimal,
    pub maintenance_type: String,
    pub vendor: String,
    pub comments: String,
    pub maintenance_date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub created_by: UserId,
    pub updated_at: Option<DateTime<Utc>>,
    pub updated_by: Option<UserId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMaintenanceRecord {
    pub asset_id: AssetId,
    pub cost: Decimal,
    pub maintenance_type: String,
    pub vendor: String,
    pub comments: String,
    pub maintenance_date: NaiveDate,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaintenanceUpdate {
    pub id: MaintenanceRecordId,
    pub cost: Decimal,
    pub maintenance_type: String,
    pub vendor: String,
    pub comments: String,
    pub maintenance_date: NaiveDate,
}

pub fn ensure_non_negative_cost(cost: Decimal) -> Result<(), DomainError> {
    if cost.is_sign_negative() && !cost.is_zero() {
        return Err(DomainError::InvariantViolation(format!(
            "maintenance cost must not be negative (got {cost})"
        )));
    }
    Ok(())
}
