//! Named collections in the remote tree

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A top-level set of entities of one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Collection {
    Vehicles,
    Trips,
    Notifications,
    Stats,
    Customers,
    FuelRecords,
    FuelPurchases,
    MaintenanceSchedule,
    ServiceHistory,
    PartsInventory,
    TransportSystem,
    TransportHistory,
    Invoices,
    Contracts,
    VehicleLocations,
    OtpAttempts,
}

impl Collection {
    pub const ALL: [Self; 16] = [
        Self::Vehicles,
        Self::Trips,
        Self::Notifications,
        Self::Stats,
        Self::Customers,
        Self::FuelRecords,
        Self::FuelPurchases,
        Self::MaintenanceSchedule,
        Self::ServiceHistory,
        Self::PartsInventory,
        Self::TransportSystem,
        Self::TransportHistory,
        Self::Invoices,
        Self::Contracts,
        Self::VehicleLocations,
        Self::OtpAttempts,
    ];

    /// Path of this collection in the remote tree.
    pub const fn path(self) -> &'static str {
        match self {
            Self::Vehicles => "vehicles",
            Self::Trips => "trips",
            Self::Notifications => "notifications",
            Self::Stats => "stats",
            Self::Customers => "customers",
            Self::FuelRecords => "fuelRecords",
            Self::FuelPurchases => "fuelPurchases",
            Self::MaintenanceSchedule => "maintenanceSchedule",
            Self::ServiceHistory => "serviceHistory",
            Self::PartsInventory => "partsInventory",
            Self::TransportSystem => "transportSystem",
            Self::TransportHistory => "transportHistory",
            Self::Invoices => "invoices",
            Self::Contracts => "contracts",
            Self::VehicleLocations => "vehicleLocations",
            Self::OtpAttempts => "settings/otpAttempts",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl FromStr for Collection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().trim_matches('/');
        Self::ALL
            .into_iter()
            .find(|collection| collection.path().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown collection '{wanted}'"))
    }
}
