mod config;
mod context;

use std::collections::BTreeMap;
use std::process::ExitCode;

use clap::Parser;
use serde_json::Value;
use survey_sync_core::settings::SyncSettings;
use survey_sync_core::surveys::SurveyRecord;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use config::{Cli, Command};
use context::ServiceContext;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Parse `--fields` into a survey, optionally addressed by local id.
fn survey_from_fields(fields: &str, local_id: Option<i64>) -> anyhow::Result<SurveyRecord> {
    let parsed: BTreeMap<String, Value> = serde_json::from_str(fields)
        .map_err(|e| anyhow::anyhow!("--fields must be a JSON object: {}", e))?;
    Ok(SurveyRecord {
        local_id,
        fields: parsed,
        ..Default::default()
    })
}

async fn run(cli: Cli, ctx: ServiceContext) -> survey_sync_core::Result<Value> {
    let surveys = &ctx.survey_service;
    let value = match cli.command {
        Command::Metadata => serde_json::to_value(ctx.metadata_service.refresh_metadata().await?)?,
        Command::Download => serde_json::json!({ "stored": surveys.store_online_surveys().await? }),
        Command::Upload => serde_json::to_value(surveys.sync_unsynced_surveys().await?)?,
        Command::Refresh => {
            let uploaded = surveys.sync_unsynced_surveys().await?;
            let metadata = ctx.metadata_service.refresh_metadata().await?;
            let stored = surveys.store_online_surveys().await?;
            serde_json::json!({
                "uploaded": uploaded,
                "metadata": metadata,
                "stored": stored,
            })
        }
        Command::Save { fields, local_id } => {
            let record = survey_from_fields(&fields, local_id).map_err(|e| {
                survey_sync_core::errors::ValidationError::InvalidInput(e.to_string())
            })?;
            serde_json::json!({ "localId": surveys.upsert_local_survey(record).await? })
        }
        Command::List => serde_json::to_value(surveys.list_local_surveys()?)?,
        Command::Titles { ids } => {
            serde_json::to_value(surveys.fetch_surveys_with_title_fields(ids).await?)?
        }
        Command::Schema => serde_json::to_value(surveys.current_schema()?)?,
    };
    Ok(value)
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    if cli.command.needs_remote() {
        let missing = cli.missing_session_values();
        if !missing.is_empty() {
            anyhow::bail!("missing session values: {}", missing.join(", "));
        }
    }

    let settings = SyncSettings::from_env();
    let ctx = ServiceContext::initialize(&cli, settings)?;
    info!(
        "survey-sync {} against {} ({})",
        env!("CARGO_PKG_VERSION"),
        ctx.settings.survey_object,
        ctx.settings.api_version
    );

    match run(cli, ctx).await {
        Ok(value) => {
            print_json(&value)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            error!("{}", err);
            eprintln!("{}", serde_json::to_string(&err.to_payload())?);
            Ok(ExitCode::FAILURE)
        }
    }
}
