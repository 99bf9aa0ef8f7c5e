use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};
use uuid::Uuid;

/// Command-line arguments for the Vigil binary.
#[derive(Debug, Parser)]
#[command(name = "vigil", version, about = "Offline-first inspection store and sync engine")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "VIGIL_CONFIG_FILE",
        value_name = "PATH",
        value_hint = ValueHint::FilePath
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: GlobalOverrides,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Apply pending schema migrations and exit.
    Migrate,
    /// Reconcile interrupted state and drain the outbox.
    Sync,
    /// Show the outbox backlog and per-record sync state.
    Status(StatusArgs),
    /// Print dashboard counters.
    Summary,
    /// Query the local inspection store.
    #[command(subcommand)]
    Inspections(InspectionsCommand),
    /// Keep the local edit of a flagged record and resend it.
    Retry(RetryArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct GlobalOverrides {
    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Override the SQLite database file.
    #[arg(
        long = "database-path",
        value_name = "PATH",
        value_hint = ValueHint::FilePath,
        global = true
    )]
    pub database_path: Option<PathBuf>,

    /// Override the remote API base URL.
    #[arg(long = "remote-url", value_name = "URL", global = true)]
    pub remote_url: Option<String>,

    /// Override the per-request remote timeout.
    #[arg(long = "request-timeout-ms", value_name = "MILLIS", global = true)]
    pub request_timeout_ms: Option<u64>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct StatusArgs {
    /// Only records flagged for review.
    #[arg(long = "needs-review", action = clap::ArgAction::SetTrue)]
    pub needs_review: bool,

    /// Only records whose last delivery failed.
    #[arg(long = "failed", action = clap::ArgAction::SetTrue)]
    pub failed: bool,
}

#[derive(Debug, Subcommand, Clone)]
pub enum InspectionsCommand {
    /// List inspections matching the given filters.
    List(ListInspectionsArgs),
    /// Show one inspection and its history by code or id.
    Show(ShowInspectionArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ListInspectionsArgs {
    /// Status to include; repeat for several.
    #[arg(long = "status", value_name = "STATUS")]
    pub statuses: Vec<String>,

    #[arg(long = "site", value_name = "UUID")]
    pub site_id: Option<Uuid>,

    #[arg(long = "asset", value_name = "UUID")]
    pub asset_id: Option<Uuid>,

    #[arg(long = "location", value_name = "UUID")]
    pub location_id: Option<Uuid>,

    #[arg(long = "template", value_name = "UUID")]
    pub template_id: Option<Uuid>,

    #[arg(long = "inspector", value_name = "UUID")]
    pub inspector_id: Option<Uuid>,

    /// Only open inspections past their due date.
    #[arg(long = "overdue", action = clap::ArgAction::SetTrue)]
    pub overdue: bool,

    /// Only inspections that raised defects.
    #[arg(long = "has-defects", action = clap::ArgAction::SetTrue)]
    pub has_defects: bool,

    /// Match against code, template name and notes.
    #[arg(long = "search", value_name = "TEXT")]
    pub search: Option<String>,

    #[arg(long = "limit", value_name = "COUNT", default_value_t = 50)]
    pub limit: u32,

    #[arg(long = "offset", value_name = "COUNT", default_value_t = 0)]
    pub offset: u32,
}

#[derive(Debug, Args, Clone)]
pub struct ShowInspectionArgs {
    /// Inspection code (e.g. INSP-000123) or id.
    pub reference: String,
}

#[derive(Debug, Args, Clone)]
pub struct RetryArgs {
    /// Id of the inspection to resend.
    pub record_id: Uuid,
}
