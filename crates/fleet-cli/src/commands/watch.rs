use chrono::Utc;
use fleet_core::sync::{ListState, SyncPhase};
use fleet_core::{Collection, Entity, FleetClient, RemoteTree};
use serde::Serialize;

use crate::commands::common::format_record_lines;
use crate::error::CliError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotLine<'a, E> {
    pub collection: String,
    pub version: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'a str>,
    pub items: &'a [E],
}

/// Print each published state until `count` snapshots were shown or Ctrl-C.
pub async fn run_watch<T: RemoteTree, E: Entity>(
    client: &FleetClient<T>,
    collection: Collection,
    count: Option<usize>,
    as_json: bool,
) -> Result<(), CliError> {
    let synchronizer = client.synchronize_at::<E>(collection);
    let mut receiver = synchronizer.watch();
    let mut shown = 0usize;

    loop {
        let state = receiver.borrow_and_update().clone();
        if !state.loading {
            print_state(collection, &state, as_json)?;
            shown += 1;
            if count.is_some_and(|limit| shown >= limit) {
                break;
            }
        }

        tokio::select! {
            changed = receiver.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted; stopping watch on {}", collection);
                break;
            }
        }
    }

    synchronizer.shutdown().await;
    Ok(())
}

fn print_state<E: Entity>(
    collection: Collection,
    state: &ListState<E>,
    as_json: bool,
) -> Result<(), CliError> {
    if as_json {
        let line = SnapshotLine {
            collection: collection.to_string(),
            version: state.version,
            error: state.error.as_deref(),
            items: &state.items,
        };
        println!("{}", serde_json::to_string(&line)?);
        return Ok(());
    }

    println!("{}", snapshot_header(collection, state));
    for line in format_record_lines(&state.items, Utc::now()) {
        println!("  {line}");
    }
    Ok(())
}

pub fn snapshot_header<E>(collection: Collection, state: &ListState<E>) -> String {
    let status = match (&state.error, state.phase) {
        (Some(error), _) => format!("error: {error}"),
        (None, SyncPhase::Live) => "live".to_string(),
        (None, phase) => format!("{phase:?}").to_lowercase(),
    };
    format!(
        "[{collection} v{}] {} records ({status})",
        state.version,
        state.items.len()
    )
}
