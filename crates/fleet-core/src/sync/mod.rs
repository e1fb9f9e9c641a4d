//! Collection store, live synchronization and CRUD dispatch
//!
//! Everything here is generic over a [`RemoteTree`](crate::remote::RemoteTree)
//! backend and an [`Entity`](crate::models::Entity) type.

mod dedupe;
mod dispatcher;
mod ids;
mod store;
mod synchronizer;

pub use dedupe::dedupe;
pub use dispatcher::{ActionResult, ActionState, CrudActionDispatcher, RetryPolicy};
pub use ids::{allocate_id, IdentifierAllocator};
pub use store::{decode_snapshot, RemoteCollectionStore, Subscription, DEFAULT_TIMEOUT};
pub use synchronizer::{EntityListSynchronizer, ListState, SyncPhase};
