use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use fleet_core::Collection;

#[derive(Parser)]
#[command(name = "fleet")]
#[command(about = "Work with the fleet management database from the command line")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to the config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Read and write records in a collection
    #[command(alias = "r")]
    Records {
        #[command(subcommand)]
        command: RecordCommands,
    },
    /// Dashboard sign-in
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Manage the config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum RecordCommands {
    /// List every record in a collection
    List {
        /// Collection name, e.g. vehicles or fuelRecords
        #[arg(value_parser = parse_collection)]
        collection: Collection,
        /// Number of records to show
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one record
    Get {
        #[arg(value_parser = parse_collection)]
        collection: Collection,
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Create a record from a JSON object
    Add {
        #[arg(value_parser = parse_collection)]
        collection: Collection,
        /// Record fields as JSON, or `-` to read stdin
        #[arg(long, value_name = "JSON")]
        data: String,
        /// Use this id instead of allocating one
        #[arg(long)]
        id: Option<String>,
        /// Output the action result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Merge fields into an existing record
    Update {
        #[arg(value_parser = parse_collection)]
        collection: Collection,
        id: String,
        /// Fields to change as a JSON object, or `-` to read stdin
        #[arg(long, value_name = "JSON")]
        data: String,
        /// Output the action result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a record
    Delete {
        #[arg(value_parser = parse_collection)]
        collection: Collection,
        id: String,
        /// Output the action result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the collection every time it changes
    Watch {
        #[arg(value_parser = parse_collection)]
        collection: Collection,
        /// Stop after this many snapshots
        #[arg(short, long)]
        count: Option<usize>,
        /// Output snapshots as JSON lines
        #[arg(long)]
        json: bool,
    },
}

impl RecordCommands {
    pub const fn collection(&self) -> Collection {
        match self {
            Self::List { collection, .. }
            | Self::Get { collection, .. }
            | Self::Add { collection, .. }
            | Self::Update { collection, .. }
            | Self::Delete { collection, .. }
            | Self::Watch { collection, .. } => *collection,
        }
    }
}

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in with the configured admin credentials
    Login {
        #[arg(long)]
        username: String,
        #[arg(long)]
        password: String,
        /// Keep the session for a day instead of this terminal session
        #[arg(long)]
        remember: bool,
    },
    /// Sign in with a one-time code sent by SMS
    Otp {
        /// Phone number in international format
        #[arg(long)]
        phone: String,
        #[arg(long)]
        remember: bool,
    },
    /// Show who is signed in
    Status,
    /// Extend the current session
    Refresh,
    /// Sign out and clear stored sessions
    Logout,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Create or update the config file
    Init {
        /// Realtime database root URL
        #[arg(long, value_name = "URL")]
        database_url: Option<String>,
        /// Database auth token
        #[arg(long, value_name = "TOKEN")]
        auth_token: Option<String>,
        /// Timeout for each remote operation
        #[arg(long, value_name = "SECONDS")]
        timeout_secs: Option<u64>,
        /// Attempts for transient write failures
        #[arg(long, value_name = "N")]
        retry_attempts: Option<u32>,
        #[arg(long, value_name = "NAME")]
        admin_username: Option<String>,
        #[arg(long, value_name = "PASSWORD")]
        admin_password: Option<String>,
        /// Identity provider logout endpoint
        #[arg(long, value_name = "URL")]
        logout_url: Option<String>,
        /// SMS gateway endpoint for one-time codes
        #[arg(long, value_name = "URL")]
        sms_endpoint: Option<String>,
        #[arg(long, value_name = "KEY")]
        sms_api_key: Option<String>,
    },
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

fn parse_collection(value: &str) -> Result<Collection, String> {
    value.parse()
}
