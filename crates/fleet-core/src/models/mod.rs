//! Data models for Fleet

mod collection;
mod document;
mod entity;
mod fuel;
mod maintenance;
mod notification;
mod vehicle;

pub use collection::Collection;
pub use document::Document;
pub use entity::{Entity, EntityMeta, Identified};
pub use fuel::{fuel_totals, FuelPurchase, FuelRecord};
pub use maintenance::{MaintenanceScheduleItem, MaintenanceStatus, Part, ServiceHistoryItem};
pub use notification::{unread_count, Notification, NotificationKind};
pub use vehicle::{FuelType, TransportRecord, Trip, TripStatus, Vehicle, VehicleStatus};
