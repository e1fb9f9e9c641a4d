use chrono::{Duration, TimeZone, Utc};
use fleet_core::models::Vehicle;
use fleet_core::session::{Identity, Session};
use fleet_core::sync::{ListState, SyncPhase};
use fleet_core::{Collection, Document, FleetClient, FleetConfig, MemoryTree};
use pretty_assertions::assert_eq;
use serde_json::json;

use crate::cli::CompletionShell;
use crate::commands::auth_cmd::{describe_session, phone_profile};
use crate::commands::common::{
    entity_from_fields, format_relative_time, parse_object, record_summary, truncate,
};
use crate::commands::completions::render_completions;
use crate::commands::config::{redacted_config, run_config_init, ConfigUpdate};
use crate::commands::records::{add_record, list_records};
use crate::commands::watch::snapshot_header;
use crate::error::CliError;

#[test]
fn parse_object_rejects_non_objects() {
    assert!(parse_object(r#"{"registrationNumber": "KA01"}"#).is_ok());
    assert!(matches!(parse_object("[1, 2]"), Err(CliError::InvalidData(_))));
    assert!(matches!(parse_object("{oops"), Err(CliError::InvalidData(_))));
}

#[test]
fn entity_from_fields_uses_explicit_id_and_drops_timestamps() {
    let fields = parse_object(
        r#"{"registrationNumber": "KA01", "createdAt": "2020-01-01T00:00:00Z"}"#,
    )
    .unwrap();
    let vehicle: Vehicle = entity_from_fields(fields, Some("V1")).unwrap();
    assert_eq!(vehicle.meta.id, "V1");
    assert_eq!(vehicle.meta.created_at, None);
}

#[test]
fn entity_from_fields_reports_type_errors() {
    let fields = parse_object(r#"{"odometerKm": "far"}"#).unwrap();
    let result = entity_from_fields::<Vehicle>(fields, None);
    assert!(matches!(result, Err(CliError::InvalidData(_))));
}

#[test]
fn format_relative_time_units() {
    let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    assert_eq!(format_relative_time(now - Duration::seconds(30), now), "just now");
    assert_eq!(format_relative_time(now - Duration::minutes(2), now), "2m ago");
    assert_eq!(format_relative_time(now - Duration::hours(2), now), "2h ago");
    assert_eq!(format_relative_time(now - Duration::days(3), now), "3d ago");
}

#[test]
fn truncate_adds_ellipsis() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("This is a very long sentence", 10), "This is...");
}

#[test]
fn record_summary_hides_meta_fields() {
    let mut vehicle = Vehicle::new("KA01");
    vehicle.meta.id = "V1".to_string();
    vehicle.meta.created_at = Some(Utc::now());
    let summary = record_summary(&vehicle);
    assert!(summary.contains("KA01"));
    assert!(!summary.contains("V1"));
    assert!(!summary.contains("createdAt"));
}

#[tokio::test]
async fn add_then_list_through_a_client() {
    let client = FleetClient::new(MemoryTree::new());
    let fields = parse_object(r#"{"registrationNumber": "KA01"}"#).unwrap();
    let result = add_record::<_, Vehicle>(&client, Collection::Vehicles, fields, Some("V1"))
        .await
        .unwrap();
    assert!(result.success);

    let invalid = parse_object(r#"{"registrationNumber": ""}"#).unwrap();
    let result = add_record::<_, Vehicle>(&client, Collection::Vehicles, invalid, None)
        .await
        .unwrap();
    assert!(!result.success);

    let vehicles = list_records::<_, Vehicle>(&client, Collection::Vehicles, Some(5))
        .await
        .unwrap();
    assert_eq!(vehicles.len(), 1);
    assert_eq!(vehicles[0].meta.id, "V1");
}

#[tokio::test]
async fn untyped_collections_list_as_documents() {
    let tree = MemoryTree::with_root(json!({
        "invoices": {"I1": {"amount": 1200}, "I2": {"amount": 300}}
    }));
    let client = FleetClient::new(tree);
    let invoices = list_records::<_, Document>(&client, Collection::Invoices, Some(1))
        .await
        .unwrap();
    assert_eq!(invoices.len(), 1);
    assert_eq!(invoices[0].get("amount"), Some(&json!(1200)));
}

#[test]
fn snapshot_header_shows_status() {
    let mut state = ListState::<Vehicle>::default();
    state.items = vec![Vehicle::new("KA01")];
    state.loading = false;
    state.phase = SyncPhase::Live;
    state.version = 3;
    assert_eq!(
        snapshot_header(Collection::Vehicles, &state),
        "[vehicles v3] 1 records (live)"
    );

    let mut failed = state;
    failed.error = Some("permission denied".to_string());
    assert!(snapshot_header(Collection::Vehicles, &failed).contains("error: permission denied"));
}

#[test]
fn config_init_merges_into_existing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");

    run_config_init(
        &path,
        ConfigUpdate {
            database_url: Some("https://fleet-demo.firebaseio.com/".to_string()),
            admin_username: Some("admin".to_string()),
            ..ConfigUpdate::default()
        },
    )
    .unwrap();
    let config = run_config_init(
        &path,
        ConfigUpdate {
            timeout_secs: Some(5),
            ..ConfigUpdate::default()
        },
    )
    .unwrap();

    assert_eq!(
        config.database_url.as_deref(),
        Some("https://fleet-demo.firebaseio.com")
    );
    let reloaded = FleetConfig::load_from_path(&path).unwrap();
    assert_eq!(
        reloaded.database_url.as_deref(),
        Some("https://fleet-demo.firebaseio.com")
    );
    assert_eq!(reloaded.admin_username.as_deref(), Some("admin"));
    assert_eq!(reloaded.timeout_secs, 5);
}

#[test]
fn config_init_rejects_invalid_urls() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.json");
    let result = run_config_init(
        &path,
        ConfigUpdate {
            sms_endpoint: Some("sms.example.com".to_string()),
            ..ConfigUpdate::default()
        },
    );
    assert!(result.is_err());
    assert!(!path.exists());
}

#[test]
fn redacted_config_hides_secrets() {
    let config = FleetConfig {
        auth_token: Some("db-secret".to_string()),
        admin_password: Some("admin123".to_string()),
        ..FleetConfig::default()
    };
    let rendered = redacted_config(&config).unwrap().to_string();
    assert!(!rendered.contains("db-secret"));
    assert!(!rendered.contains("admin123"));
    assert!(rendered.contains("[REDACTED]"));
}

#[test]
fn describe_session_mentions_identity_and_tier() {
    let session = Session {
        identity: Identity::Federated(phone_profile("+91 98765 43210")),
        login_time: Utc::now(),
        remember_me: false,
    };
    let line = describe_session(&session);
    assert!(line.contains("+919876543210"));
    assert!(line.contains("via phone"));
    assert!(line.contains("this terminal only"));
}

#[test]
fn completions_name_the_fleet_binary() {
    let script = String::from_utf8(render_completions(CompletionShell::Bash)).unwrap();
    assert!(script.contains("fleet"));
    assert!(script.contains("records"));
}
