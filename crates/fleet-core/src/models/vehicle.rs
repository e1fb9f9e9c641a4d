//! Vehicle registry and trip models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::{require_non_negative, require_text};
use super::{Collection, Entity, EntityMeta};
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum VehicleStatus {
    #[default]
    Active,
    InMaintenance,
    Inactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FuelType {
    #[default]
    Diesel,
    Petrol,
    Cng,
    Electric,
}

/// A vehicle in the fleet registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Vehicle {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub registration_number: String,
    #[serde(default)]
    pub make: String,
    #[serde(default)]
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default)]
    pub status: VehicleStatus,
    #[serde(default)]
    pub fuel_type: FuelType,
    #[serde(default)]
    pub odometer_km: f64,
}

impl Vehicle {
    pub fn new(registration_number: impl Into<String>) -> Self {
        Self {
            registration_number: registration_number.into(),
            ..Self::default()
        }
    }
}

impl Entity for Vehicle {
    const COLLECTION: Collection = Collection::Vehicles;
    const ID_PREFIX: &'static str = "VEH";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<()> {
        require_text(&self.registration_number, "registrationNumber")?;
        require_non_negative(self.odometer_km, "odometerKm")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub enum TripStatus {
    #[default]
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

/// A single trip driven by a vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub vehicle_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub driver: Option<String>,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    #[serde(default)]
    pub status: TripStatus,
}

impl Trip {
    pub fn new(vehicle_id: impl Into<String>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            ..Self::default()
        }
    }
}

impl Entity for Trip {
    const COLLECTION: Collection = Collection::Trips;
    const ID_PREFIX: &'static str = "TRP";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<()> {
        require_text(&self.vehicle_id, "vehicleId")?;
        if let Some(distance) = self.distance_km {
            require_non_negative(distance, "distanceKm")?;
        }
        if let (Some(start), Some(end)) = (self.start_time, self.end_time) {
            if end < start {
                return Err(Error::Validation(
                    "endTime must not be before startTime".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// A completed freight movement kept in the transport history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct TransportRecord {
    #[serde(flatten)]
    pub meta: EntityMeta,
    #[serde(default)]
    pub vehicle_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer: Option<String>,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub destination: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cargo: Option<String>,
    #[serde(default)]
    pub freight_amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transported_at: Option<DateTime<Utc>>,
}

impl Entity for TransportRecord {
    const COLLECTION: Collection = Collection::TransportHistory;
    const ID_PREFIX: &'static str = "TRN";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn validate(&self) -> Result<()> {
        require_text(&self.vehicle_id, "vehicleId")?;
        require_non_negative(self.freight_amount, "freightAmount")
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn vehicle_uses_camel_case_wire_names() {
        let mut vehicle = Vehicle::new("KA01AB1234");
        vehicle.meta.id = "V1".to_string();
        vehicle.driver = Some("A".to_string());

        let value = serde_json::to_value(&vehicle).unwrap();
        assert_eq!(value["id"], "V1");
        assert_eq!(value["registrationNumber"], "KA01AB1234");
        assert_eq!(value["status"], "active");
        assert!(value.get("createdAt").is_none());
    }

    #[test]
    fn vehicle_decodes_sparse_records() {
        let vehicle: Vehicle = serde_json::from_value(json!({
            "id": "V1",
            "registrationNumber": "KA01AB1234",
            "status": "inMaintenance",
            "createdAt": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(vehicle.meta.id, "V1");
        assert_eq!(vehicle.status, VehicleStatus::InMaintenance);
        assert!(vehicle.meta.created_at.is_some());
        assert_eq!(vehicle.driver, None);
    }

    #[test]
    fn vehicle_requires_registration_number() {
        assert!(Vehicle::new("  ").validate().is_err());
        assert!(Vehicle::new("KA01AB1234").validate().is_ok());
    }

    #[test]
    fn trip_rejects_end_before_start() {
        let start = Utc::now();
        let mut trip = Trip::new("V1");
        trip.start_time = Some(start);
        trip.end_time = Some(start - Duration::minutes(5));
        assert!(matches!(trip.validate(), Err(Error::Validation(_))));

        trip.end_time = Some(start + Duration::hours(2));
        assert!(trip.validate().is_ok());
    }

    #[test]
    fn transport_record_requires_vehicle() {
        let record = TransportRecord::default();
        assert!(record.validate().is_err());
    }
}
