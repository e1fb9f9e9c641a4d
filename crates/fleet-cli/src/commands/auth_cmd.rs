use std::io::{self, BufRead, Write};
use std::sync::Arc;

use chrono::Utc;
use fleet_core::otp::{HttpSmsGateway, OtpService};
use fleet_core::session::{
    CredentialVerifier, FederatedProfile, HttpIdentityProvider, IdentityProvider, Session,
    SessionGate, StaticCredentialVerifier,
};
use fleet_core::{FleetClient, FleetConfig};

use crate::cli::AuthCommands;
use crate::commands::common::{format_relative_time, open_client};
use crate::error::CliError;
use crate::session_store::{terminal_session_storage, KeyringSessionStorage};

pub async fn run_auth(command: AuthCommands, config: &FleetConfig) -> Result<(), CliError> {
    let gate = build_gate(config);
    match &config.logout_url {
        Some(url) => {
            let gate = gate.with_provider(HttpIdentityProvider::new(url)?);
            run_with_gate(command, config, &gate).await
        }
        None => run_with_gate(command, config, &gate).await,
    }
}

async fn run_with_gate<P: IdentityProvider>(
    command: AuthCommands,
    config: &FleetConfig,
    gate: &SessionGate<P>,
) -> Result<(), CliError> {
    match command {
        AuthCommands::Login {
            username,
            password,
            remember,
        } => {
            if config.credential_verifier().is_none() {
                return Err(CliError::Config(
                    "no admin credentials configured; run `fleet config init --admin-username ... --admin-password ...`"
                        .to_string(),
                ));
            }
            let session = gate.login_local(&username, &password, remember)?;
            println!("{}", describe_session(&session));
            Ok(())
        }
        AuthCommands::Otp { phone, remember } => {
            let client = open_client(config)?;
            let profile = verify_phone(config, &client, &phone).await?;
            let session = gate.login_federated(profile, remember)?;
            println!("{}", describe_session(&session));
            Ok(())
        }
        AuthCommands::Status => {
            match gate.restore_on_load() {
                Some(session) => println!("{}", describe_session(&session)),
                None => println!("Not signed in."),
            }
            Ok(())
        }
        AuthCommands::Refresh => {
            gate.restore_on_load();
            let session = gate.refresh()?;
            println!("{}", describe_session(&session));
            Ok(())
        }
        AuthCommands::Logout => {
            gate.restore_on_load();
            gate.logout().await?;
            println!("Signed out.");
            Ok(())
        }
    }
}

fn build_gate(config: &FleetConfig) -> SessionGate {
    let account = config.database_url.as_deref().unwrap_or("default");
    let verifier: Arc<dyn CredentialVerifier> = match config.credential_verifier() {
        Some(verifier) => Arc::new(verifier),
        None => Arc::new(StaticCredentialVerifier::new("", "")),
    };
    SessionGate::new(
        Arc::new(KeyringSessionStorage::new(account)),
        Arc::new(terminal_session_storage(account)),
        verifier,
    )
    .with_windows(config.session_windows())
}

async fn verify_phone(
    config: &FleetConfig,
    client: &FleetClient<fleet_core::RestTree>,
    phone: &str,
) -> Result<FederatedProfile, CliError> {
    let endpoint = config.sms_endpoint.as_deref().ok_or_else(|| {
        CliError::Config("no SMS endpoint configured (set smsEndpoint or FLEET_SMS_ENDPOINT)".to_string())
    })?;
    let gateway = HttpSmsGateway::new(endpoint, config.sms_api_key.clone())?;
    let service = OtpService::new(client.otp_limiter(config), gateway);

    service.send_code(phone).await?;
    print!("Code sent to {phone}. Enter it: ");
    io::stdout().flush()?;

    let mut code = String::new();
    io::stdin().lock().read_line(&mut code)?;
    service.verify_code(phone, &code)?;

    Ok(phone_profile(phone))
}

pub fn phone_profile(phone: &str) -> FederatedProfile {
    let phone = phone.split_whitespace().collect::<String>();
    FederatedProfile {
        uid: phone.clone(),
        display_name: Some(phone),
        provider: "phone".to_string(),
        ..FederatedProfile::default()
    }
}

pub fn describe_session(session: &Session) -> String {
    let tier = if session.remember_me {
        "remembered"
    } else {
        "this terminal only"
    };
    format!(
        "Signed in as {} via {} ({}, since {})",
        session.identity.display_name(),
        session.identity.provider(),
        tier,
        format_relative_time(session.login_time, Utc::now())
    )
}
