//! clap value parsers for domain identifiers and amounts.

use std::str::FromStr;

use anyhow::{anyhow, ensure, Context, Result};
use assetflow_core::domain::asset::{AssetId, AssetStatus};
use assetflow_core::domain::directory::UserId;
use assetflow_core::domain::maintenance::MaintenanceRecordId;
use chrono::NaiveDate;
use rust_decimal::Decimal;

pub fn user_id(raw: &str) -> Result<UserId> {
    let id: i64 = raw.trim().parse().with_context(|| format!("`{raw}` is not a user id"))?;
    ensure!(id > 0, "user ids are positive (got {id})");
    Ok(UserId(id))
}

pub fn asset_id(raw: &str) -> Result<AssetId> {
    Ok(AssetId::parse(raw)?)
}

pub fn asset_status(raw: &str) -> Result<AssetStatus> {
    AssetStatus::parse(raw).ok_or_else(|| {
        anyhow!("unknown asset status `{raw}` (expected new, under_review, assigned or discarded)")
    })
}

pub fn record_id(raw: &str) -> Result<MaintenanceRecordId> {
    let id: i64 =
        raw.trim().parse().with_context(|| format!("`{raw}` is not a maintenance record id"))?;
    Ok(MaintenanceRecordId(id))
}

pub fn money(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim()).with_context(|| format!("`{raw}` is not a decimal amount"))
}

pub fn date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .with_context(|| format!("`{raw}` is not a YYYY-MM-DD date"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifiers_are_validated_at_the_edge() {
        assert_eq!(user_id(" 42 ").expect("user"), UserId(42));
        assert!(user_id("0").is_err());
        assert!(user_id("abc").is_err());
        assert_eq!(asset_id("AST-007").expect("asset").as_str(), "AST-007");
        assert!(asset_id("AST-7").is_err());
    }

    #[test]
    fn statuses_accept_human_spellings() {
        assert_eq!(asset_status("Under Review").expect("status"), AssetStatus::UnderReview);
        assert_eq!(asset_status("discarded").expect("status"), AssetStatus::Discarded);
        assert!(asset_status("archived").is_err());
    }

    #[test]
    fn amounts_and_dates_parse_exactly() {
        assert_eq!(money("19.95").expect("money").to_string(), "19.95");
        assert!(money("19,95").is_err());
        let expected = NaiveDate::from_ymd_opt(2026, 3, 14).expect("date");
        assert_eq!(date("2026-03-14").expect("date"), expected);
        assert!(date("14/03/2026").is_err());
    }
}
