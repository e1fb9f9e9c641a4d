//! fleet-core - Core library for Fleet
//!
//! Typed access to the fleet management database: entity models, a
//! [`RemoteTree`](remote::RemoteTree) abstraction with REST and in-memory
//! backends, live collection synchronization, CRUD dispatch, dashboard
//! sessions and OTP rate limiting. Used by the `fleet` CLI.

pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod otp;
pub mod remote;
pub mod session;
pub mod sync;
pub mod util;

pub use client::FleetClient;
pub use config::FleetConfig;
pub use error::{Error, Result};
pub use models::{Collection, Document, Entity, EntityMeta};
pub use remote::{MemoryTree, RemoteTree, RestTree};
pub use sync::{ActionResult, CrudActionDispatcher, EntityListSynchronizer, RemoteCollectionStore};
