//! Fuel consumption and purchase models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{require_non_negative, require_positive, require_text};
use super::{Collection, Entity, EntityMeta};
use crate::Result;

/// Fuel dispensed into one vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FuelRecord {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub vehicle_id: String,
    #[serde(default)]
    pub litres: f64,
    #[serde(default)]
    pub cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odometer_km: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub station: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filled_at: Option<DateTime<Utc>>,
}

impl FuelRecord {
    pub fn new(vehicle_id: impl Into<String>, litres: f64, cost: f64) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            litres,
            cost,
            ..Self::default()
        }
    }

    /// Cost per litre, `None` when no fuel was recorded.
    pub fn price_per_litre(&self) -> Option<f64> {
        (self.litres > 0.0).then(|| self.cost / self.litres)
    }
}

impl Entity for FuelRecord {
    const COLLECTION: Collection = Collection::FuelRecords;
    const ID_PREFIX: &'static str = "FUEL";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<()> {
        require_text(&self.vehicle_id, "vehicleId")?;
        require_positive(self.litres, "litres")?;
        require_non_negative(self.cost, "cost")
    }
}

/// Bulk fuel bought from a vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FuelPurchase {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub litres: f64,
    #[serde(default)]
    pub total_cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub purchased_at: Option<DateTime<Utc>>,
}

impl Entity for FuelPurchase {
    const COLLECTION: Collection = Collection::FuelPurchases;
    const ID_PREFIX: &'static str = "FP";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<()> {
        require_text(&self.vendor, "vendor")?;
        require_positive(self.litres, "litres")?;
        require_non_negative(self.total_cost, "totalCost")
    }
}

/// Total litres and spend across `records`.
pub fn fuel_totals(records: &[FuelRecord]) -> (f64, f64) {
    records.iter().fold((0.0, 0.0), |(litres, cost), record| {
        (litres + record.litres, cost + record.cost)
    })
}
