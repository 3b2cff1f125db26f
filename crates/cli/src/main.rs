use crate::{
    commands::{Commands, InputArgs},
    env::EnvManager,
    error::CliError,
    review::TerminalReview,
    shutdown::{ExitCode, ShutdownCoordinator},
};
use clap::Parser;
use connectors::{
    file::csv::read_dataset,
    remote::{ConnectionFactory, RemoteSchema},
    salesforce::{credentials::OrgCredentials, factory::SalesforceConnectionFactory},
};
use engine_config::settings::{DEFAULT_REQUEST_TIMEOUT, SyncSettings};
use engine_core::{context::RunContext, layout::DEFAULT_OUTPUT_ROOT};
use engine_runtime::execution::{SyncRun, TransformRun};
use model::{execution::write::WriteOperation, transform::mapping::ColumnMapping};
use std::{collections::HashMap, path::PathBuf, str::FromStr, sync::Arc, time::Duration};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod commands;
mod env;
mod error;
mod output;
mod review;
mod shutdown;

#[derive(Parser)]
#[command(name = "dataload", version = "0.1.0", about = "Bulk CSV loader for remote CRM entities")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Env file with SF_INSTANCE_URL and SF_ACCESS_TOKEN")]
    env_file: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Log at debug level")]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let shutdown = ShutdownCoordinator::new(CancellationToken::new());
    shutdown.register_handlers();

    let code = match run(cli, &shutdown).await {
        Ok(code) => code,
        Err(e) if e.is_cancellation() => {
            error!(error = %e, "Stopped before anything was written");
            ExitCode::ShutdownRequested
        }
        Err(e) => {
            error!(error = %e, "Command failed");
            ExitCode::GeneralError
        }
    };
    std::process::exit(code.as_i32());
}

async fn run(cli: Cli, shutdown: &ShutdownCoordinator) -> Result<ExitCode, CliError> {
    let env = load_env(cli.env_file.as_ref())?;

    match cli.command {
        Commands::Sync {
            input,
            batch_size,
            parallelism,
            operation,
            external_id,
            timeout_secs,
            no_bool_coercion,
            settings,
            json,
        } => {
            let mut settings = match settings {
                Some(path) => SyncSettings::from_json(&tokio::fs::read_to_string(path).await?)?,
                None => SyncSettings::default(),
            };
            if let Some(size) = batch_size {
                settings.batch_size = Some(size);
            }
            if let Some(parallelism) = parallelism {
                settings.parallelism = parallelism;
            }
            if let Some(op) = operation {
                settings.operation = WriteOperation::from_str(&op).map_err(CliError::Config)?;
            }
            if external_id.is_some() {
                settings.external_id_field = external_id;
            }
            if let Some(secs) = timeout_secs {
                settings.request_timeout = Duration::from_secs(secs);
            }
            if no_bool_coercion {
                settings.coerce_booleans = false;
            }
            if let Some(root) = &input.output_root {
                settings.output_root = root.clone();
            }

            let creds = env.credentials()?;
            let factory = SalesforceConnectionFactory::new(creds.clone(), settings.request_timeout);
            let dataset = read_dataset(&input.file, &input.entity)?;
            let ctx = RunContext::new(&creds.alias, &input.entity, &settings.output_root)
                .with_cancellation(shutdown.cancel_token());

            let mut sync = SyncRun::new(ctx, settings, Arc::new(factory))
                .with_lookup_overrides(parse_lookups(&input.lookups)?);
            if let Some(mapping) = load_mapping(&input).await? {
                sync = sync.with_mapping(mapping);
            }
            if input.interactive {
                sync = sync.with_review(Arc::new(TerminalReview::stdin()));
            }

            let report = sync.execute(dataset).await?;
            output::print_sync_report(&report, json)?;

            if shutdown.is_shutdown_requested() {
                Ok(ExitCode::ShutdownRequested)
            } else if report.summary.error > 0 || report.summary.unprocessed > 0 {
                Ok(ExitCode::PartialFailure)
            } else {
                Ok(ExitCode::Success)
            }
        }
        Commands::Transform { input } => {
            let creds = env.credentials()?;
            let factory = SalesforceConnectionFactory::new(creds.clone(), DEFAULT_REQUEST_TIMEOUT);
            let dataset = read_dataset(&input.file, &input.entity)?;
            let ctx = transform_context(&creds, &input).with_cancellation(shutdown.cancel_token());

            let mut transform = TransformRun::new(ctx, Arc::new(factory))
                .with_lookup_overrides(parse_lookups(&input.lookups)?);
            if let Some(mapping) = load_mapping(&input).await? {
                transform = transform.with_mapping(mapping);
            }
            if input.interactive {
                transform = transform.with_review(Arc::new(TerminalReview::stdin()));
            }

            let report = transform.execute(dataset).await?;
            output::print_transform_report(&report);
            Ok(ExitCode::Success)
        }
        Commands::Describe {
            entity,
            output: out_path,
        } => {
            let factory = SalesforceConnectionFactory::new(env.credentials()?, DEFAULT_REQUEST_TIMEOUT);
            let conn = factory.connect().await?;
            let describe = conn.describe(&entity).await?;
            output::emit_json(&describe, out_path.as_deref()).await?;
            Ok(ExitCode::Success)
        }
        Commands::CheckConn { entity } => {
            let creds = env.credentials()?;
            info!(org = %creds.alias, url = %creds.instance_url, "Checking connection");
            let factory = SalesforceConnectionFactory::new(creds, DEFAULT_REQUEST_TIMEOUT);
            let conn = factory.connect().await?;
            let describe = conn.describe(&entity).await?;
            info!(entity = %describe.name, fields = describe.fields.len(), "Connection OK");
            Ok(ExitCode::Success)
        }
    }
}

fn load_env(explicit: Option<&PathBuf>) -> Result<EnvManager, CliError> {
    let mut env = EnvManager::new();
    match explicit {
        Some(path) => env.load_from_file(path)?,
        None => {
            if let Some(path) = EnvManager::default_file().filter(|p| p.exists()) {
                env.load_from_file(path)?;
            }
        }
    }
    Ok(env)
}

fn transform_context(creds: &OrgCredentials, input: &InputArgs) -> RunContext {
    let root = input
        .output_root
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_ROOT));
    RunContext::new(&creds.alias, &input.entity, root)
}

async fn load_mapping(input: &InputArgs) -> Result<Option<ColumnMapping>, CliError> {
    let Some(path) = &input.mapping else {
        return Ok(None);
    };
    let json = tokio::fs::read_to_string(path).await?;
    let mapping = ColumnMapping::from_json(&json).map_err(CliError::InvalidMapping)?;
    if mapping.is_empty() {
        return Err(CliError::Config(format!("{} maps no columns", path.display())));
    }
    Ok(Some(mapping))
}

/// Parses repeated `COLUMN=FIELD` flags.
fn parse_lookups(raw: &[String]) -> Result<HashMap<String, String>, CliError> {
    raw.iter()
        .map(|item| match item.split_once('=') {
            Some((column, field)) if !column.trim().is_empty() && !field.trim().is_empty() => {
                Ok((column.trim().to_string(), field.trim().to_string()))
            }
            _ => Err(CliError::InvalidLookup(item.clone())),
        })
        .collect()
}
