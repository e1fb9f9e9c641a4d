//! Maintenance scheduling, service history and parts inventory models

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::entity::{require_non_negative, require_text};
use super::{Collection, Entity, EntityMeta};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum MaintenanceStatus {
    #[default]
    Pending,
    Completed,
    Overdue,
}

/// Upcoming maintenance task for a vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceScheduleItem {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub vehicle_id: String,
    #[serde(default)]
    pub task: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_odometer_km: Option<f64>,
    #[serde(default)]
    pub status: MaintenanceStatus,
}

impl MaintenanceScheduleItem {
    pub fn new(vehicle_id: impl Into<String>, task: impl Into<String>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            task: task.into(),
            ..Self::default()
        }
    }

    /// Whether the task is due by date or by odometer reading.
    pub fn is_due(&self, today: NaiveDate, odometer_km: f64) -> bool {
        if self.status == MaintenanceStatus::Completed {
            return false;
        }
        let due_by_date = self.due_date.is_some_and(|due| due <= today);
        let due_by_distance = self.due_odometer_km.is_some_and(|due| due <= odometer_km);
        due_by_date || due_by_distance
    }
}

impl Entity for MaintenanceScheduleItem {
    const COLLECTION: Collection = Collection::MaintenanceSchedule;
    const ID_PREFIX: &'static str = "MNT";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<()> {
        require_text(&self.vehicle_id, "vehicleId")?;
        require_text(&self.task, "task")?;
        if let Some(due) = self.due_odometer_km {
            require_non_negative(due, "dueOdometerKm")?;
        }
        Ok(())
    }
}

/// Completed service performed on a vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ServiceHistoryItem {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub vehicle_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_date: Option<NaiveDate>,
    #[serde(default)]
    pub cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub odometer_km: Option<f64>,
}

impl Entity for ServiceHistoryItem {
    const COLLECTION: Collection = Collection::ServiceHistory;
    const ID_PREFIX: &'static str = "SRV";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<()> {
        require_text(&self.vehicle_id, "vehicleId")?;
        require_text(&self.description, "description")?;
        require_non_negative(self.cost, "cost")
    }
}

/// Spare part held in inventory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub part_number: Option<String>,
    #[serde(default)]
    pub quantity: u32,
    #[serde(default)]
    pub reorder_level: u32,
    #[serde(default)]
    pub unit_cost: f64,
}

impl Part {
    pub fn new(name: impl Into<String>, quantity: u32) -> Self {
        Self {
            name: name.into(),
            quantity,
            ..Self::default()
        }
    }

    pub const fn needs_reorder(&self) -> bool {
        self.quantity <= self.reorder_level
    }
}

impl Entity for Part {
    const COLLECTION: Collection = Collection::PartsInventory;
    const ID_PREFIX: &'static str = "PRT";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<()> {
        require_text(&self.name, "name")?;
        require_non_negative(self.unit_cost, "unitCost")
    }
}
