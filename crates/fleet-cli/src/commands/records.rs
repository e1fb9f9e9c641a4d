use chrono::Utc;
use fleet_core::models::{
    FuelPurchase, FuelRecord, MaintenanceScheduleItem, Notification, Part, ServiceHistoryItem,
    TransportRecord, Trip, Vehicle,
};
use fleet_core::{ActionResult, Collection, Document, Entity, FleetClient, RemoteTree};

use crate::cli::RecordCommands;
use crate::commands::common::{
    entity_from_fields, format_record_lines, parse_object, print_json, read_data_arg,
};
use crate::commands::watch::run_watch;
use crate::error::CliError;

/// Run a records command with the entity type that matches its collection.
///
/// Collections without a typed model are handled as plain documents.
pub async fn run_records<T: RemoteTree>(
    command: RecordCommands,
    client: &FleetClient<T>,
) -> Result<(), CliError> {
    match command.collection() {
        Collection::Vehicles => run_typed::<T, Vehicle>(command, client).await,
        Collection::Trips => run_typed::<T, Trip>(command, client).await,
        Collection::FuelRecords => run_typed::<T, FuelRecord>(command, client).await,
        Collection::FuelPurchases => run_typed::<T, FuelPurchase>(command, client).await,
        Collection::MaintenanceSchedule => {
            run_typed::<T, MaintenanceScheduleItem>(command, client).await
        }
        Collection::ServiceHistory => run_typed::<T, ServiceHistoryItem>(command, client).await,
        Collection::PartsInventory => run_typed::<T, Part>(command, client).await,
        Collection::Notifications => run_typed::<T, Notification>(command, client).await,
        Collection::TransportHistory => run_typed::<T, TransportRecord>(command, client).await,
        _ => run_typed::<T, Document>(command, client).await,
    }
}

async fn run_typed<T: RemoteTree, E: Entity>(
    command: RecordCommands,
    client: &FleetClient<T>,
) -> Result<(), CliError> {
    match command {
        RecordCommands::List {
            collection,
            limit,
            json,
        } => {
            let records = list_records::<T, E>(client, collection, limit).await?;
            if json {
                print_json(&records)?;
            } else if records.is_empty() {
                println!("No records in {collection}");
            } else {
                for line in format_record_lines(&records, Utc::now()) {
                    println!("{line}");
                }
            }
            Ok(())
        }
        RecordCommands::Get {
            collection,
            id,
            json,
        } => {
            let record = client
                .collection_at::<E>(collection)
                .read(&id)
                .await?
                .ok_or_else(|| CliError::NotFound {
                    collection: collection.to_string(),
                    id: id.clone(),
                })?;
            if json {
                print_json(&record)?;
            } else {
                println!("{}", serde_json::to_string_pretty(&record)?);
            }
            Ok(())
        }
        RecordCommands::Add {
            collection,
            data,
            id,
            json,
        } => {
            let fields = parse_object(&read_data_arg(&data)?)?;
            let result = add_record::<T, E>(client, collection, fields, id.as_deref()).await?;
            report(&result, json, |id| format!("Created {collection}/{id}"))
        }
        RecordCommands::Update {
            collection,
            id,
            data,
            json,
        } => {
            let fields = parse_object(&read_data_arg(&data)?)?;
            let result = client
                .dispatcher_at::<E>(collection)
                .update(&id, fields)
                .await;
            report(&result, json, |_| format!("Updated {collection}/{id}"))
        }
        RecordCommands::Delete {
            collection,
            id,
            json,
        } => {
            let result = client.dispatcher_at::<E>(collection).remove(&id).await;
            report(&result, json, |_| format!("Deleted {collection}/{id}"))
        }
        RecordCommands::Watch {
            collection,
            count,
            json,
        } => run_watch::<T, E>(client, collection, count, json).await,
    }
}

pub async fn list_records<T: RemoteTree, E: Entity>(
    client: &FleetClient<T>,
    collection: Collection,
    limit: Option<usize>,
) -> Result<Vec<E>, CliError> {
    let mut records = client.collection_at::<E>(collection).list().await?;
    if let Some(limit) = limit {
        records.truncate(limit);
    }
    Ok(records)
}

pub async fn add_record<T: RemoteTree, E: Entity>(
    client: &FleetClient<T>,
    collection: Collection,
    fields: serde_json::Map<String, serde_json::Value>,
    id: Option<&str>,
) -> Result<ActionResult, CliError> {
    let entity = entity_from_fields::<E>(fields, id)?;
    Ok(client.dispatcher_at::<E>(collection).add(entity).await)
}

fn report(
    result: &ActionResult,
    as_json: bool,
    success_line: impl FnOnce(&str) -> String,
) -> Result<(), CliError> {
    if as_json {
        print_json(result)?;
    } else if result.success {
        println!("{}", success_line(result.id.as_deref().unwrap_or_default()));
    }

    if result.success {
        Ok(())
    } else {
        Err(CliError::ActionFailed(
            result
                .error
                .clone()
                .unwrap_or_else(|| "action failed".to_string()),
        ))
    }
}
