//! Fieldlens inspector command line.

#![forbid(unsafe_code)]

mod edit_script;
mod inspector_config;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use fieldlens_application::{BatchOutcome, InspectorService, ScanState, scan_page};
use fieldlens_core::{AppError, AppResult, OrgDomain, SessionToken};
use fieldlens_domain::{DomElement, DomTree, FieldIdentity, PageContext};
use fieldlens_infrastructure::{ConfiguredSessionTokenProvider, HttpOrgRestTransport};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::edit_script::{apply_edit_script, parse_edit_script};
use crate::inspector_config::InspectorConfig;

#[derive(Parser)]
#[command(name = "fieldlens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Inspect and patch field-level security for one field at a time", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find inspectable fields in a DOM snapshot
    Scan {
        /// DOM snapshot as a JSON element tree
        #[arg(short, long)]
        dom: PathBuf,

        /// URL of the page the snapshot was taken from
        #[arg(short, long)]
        url: String,

        /// Document title of the page
        #[arg(short, long, default_value = "")]
        title: String,
    },

    /// Show the permission grid for a field
    Inspect {
        #[command(flatten)]
        field: FieldArgs,
    },

    /// Apply checkbox changes from an edit file
    Save {
        #[command(flatten)]
        field: FieldArgs,

        /// JSON list of `{ kind, name?, column, value }` changes
        #[arg(short, long)]
        edits: PathBuf,
    },

    /// Check whether a user can access a field
    CheckUser {
        #[command(flatten)]
        field: FieldArgs,

        /// User record id
        #[arg(short, long)]
        user: String,
    },

    /// List active users
    Users,
}

#[derive(clap::Args)]
struct FieldArgs {
    /// Object API name, e.g. `WorkOrder`
    #[arg(short, long)]
    object: String,

    /// Field API name, e.g. `Status`
    #[arg(short, long)]
    field: String,
}

impl FieldArgs {
    fn identity(&self) -> FieldIdentity {
        FieldIdentity::new(self.object.trim(), self.field.trim())
    }
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    if let Command::Scan { dom, url, title } = &cli.command {
        return run_scan(dom, url, title);
    }

    let config = InspectorConfig::load()?;
    let service = build_inspector_service(&config)?;
    let host = config.instance_host.as_str();

    info!(
        instance_host = host,
        api_version = %config.api_version,
        "fieldlens inspector ready"
    );

    match cli.command {
        Command::Scan { .. } => Ok(()),
        Command::Inspect { field } => {
            let view = service.load_field_permissions(host, &field.identity()).await?;
            print_json(&view)
        }
        Command::Save { field, edits } => {
            let view = service.load_field_permissions(host, &field.identity()).await?;
            let instructions = parse_edit_script(read_file(&edits)?.as_str())?;
            let mut pending = apply_edit_script(&view.grid, &instructions)?;

            let report = service.save_edits(host, &view, &mut pending).await?;
            match report.outcome {
                BatchOutcome::NothingToSave => info!("No changes to save"),
                BatchOutcome::AllSucceeded => info!(
                    saved = report.succeeded_count(),
                    "field permissions updated"
                ),
                BatchOutcome::Partial | BatchOutcome::AllFailed => warn!(
                    saved = report.succeeded_count(),
                    failed = report.failed().count(),
                    "some field permissions could not be saved"
                ),
            }
            print_json(&report)
        }
        Command::CheckUser { field, user } => {
            let view = service.load_field_permissions(host, &field.identity()).await?;
            let verdict = service.check_user_access(host, user.as_str(), &view.grid).await?;
            print_json(&verdict)
        }
        Command::Users => {
            let users = service.list_active_users(host).await?;
            print_json(&users)
        }
    }
}

fn run_scan(dom: &Path, url: &str, title: &str) -> AppResult<()> {
    let root: DomElement = serde_json::from_str(read_file(dom)?.as_str())
        .map_err(|error| AppError::Parse(format!("DOM snapshot is not valid JSON: {error}")))?;
    let page = PageContext::from_url(url, title)?;
    let tree = DomTree::from_root(root);

    let anchors = scan_page(&tree, tree.root(), &page, &mut ScanState::new());
    info!(
        host = %page.host().unwrap_or_default(),
        elements = tree.len(),
        fields = anchors.len(),
        "scanned DOM snapshot"
    );

    print_json(&anchors)
}

fn build_inspector_service(config: &InspectorConfig) -> AppResult<InspectorService> {
    let domain = OrgDomain::from_presentation_host(config.instance_host.as_str())?;
    let token = SessionToken::new(config.require_session_token()?)?;

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.http_timeout_seconds))
        .build()
        .map_err(|error| AppError::Internal(format!("failed to build HTTP client: {error}")))?;

    Ok(InspectorService::new(
        Arc::new(ConfiguredSessionTokenProvider::with_token(domain, token)),
        Arc::new(HttpOrgRestTransport::new(
            http_client,
            config.api_version.as_str(),
        )),
    )
    .with_user_lookup_limit(config.user_lookup_limit))
}

fn read_file(path: &Path) -> AppResult<String> {
    fs::read_to_string(path).map_err(|error| {
        AppError::Validation(format!("failed to read '{}': {error}", path.display()))
    })
}

fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|error| AppError::Internal(format!("failed to render output: {error}")))?;
    println!("{rendered}");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}
