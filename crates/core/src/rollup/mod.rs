//! Keeps `Asset::value` equal to the sum of the asset's maintenance costs.

pub mod ledger;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::asset::{currency, AssetId};
use crate::errors::ApplicationError;
use crate::store::Session;

pub use ledger::MaintenanceLedger;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollupResult {
    pub asset_id: AssetId,
    pub value: Decimal,
    pub record_count: usize,
}

/// Recomputes the asset value from scratch. A missing asset is not an error: the rollup is
/// skipped and `None` is returned.
pub async fn recompute_in<S: Session>(
    session: &mut S,
    asset_id: &AssetId,
) -> Result<Option<RollupResult>, ApplicationError> {
    let costs = session.maintenance_costs(asset_id).await?;
    let value = currency(costs.iter().copied().sum::<Decimal>());

    if !session.set_asset_value(asset_id, value).await? {
        warn!(
            event_name = "rollup.asset_missing",
            asset_id = %asset_id,
            "asset no longer exists, rollup skipped"
        );
        return Ok(None);
    }

    info!(
        event_name = "rollup.value_recomputed",
        asset_id = %asset_id,
        value = %value,
        record_count = costs.len(),
        "asset value recomputed"
    );
    Ok(Some(RollupResult { asset_id: asset_id.clone(), value, record_count: costs.len() }))
}
