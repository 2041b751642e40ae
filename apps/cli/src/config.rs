//! Command-line arguments. Every connection flag can also come from the
//! environment (or a `.env` file loaded at startup).

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "survey-sync", version, about = "Sync CRM surveys with a local SQLite store")]
pub struct Cli {
    /// SQLite database file.
    #[arg(long, env = "SURVEY_SYNC_DB_PATH", default_value = "survey-sync.db")]
    pub db_path: PathBuf,

    /// Salesforce instance URL, e.g. https://example.my.salesforce.com
    #[arg(long, env = "SURVEY_SYNC_INSTANCE_URL", default_value = "")]
    pub instance_url: String,

    #[arg(long, env = "SURVEY_SYNC_ACCESS_TOKEN", default_value = "", hide_env_values = true)]
    pub access_token: String,

    /// Contact id of the user taking surveys.
    #[arg(long, env = "SURVEY_SYNC_CONTACT_ID", default_value = "")]
    pub contact_id: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Download record types, page layouts and localization rows.
    Metadata,
    /// Replace local surveys with the user's surveys from the CRM.
    Download,
    /// Upload unsynced surveys and mark them synced.
    Upload,
    /// Upload unsynced surveys, then reload metadata and surveys.
    Refresh,
    /// Save a survey locally from a JSON object of field values.
    Save {
        /// Field values, e.g. '{"Visits__c": 2}'
        #[arg(long)]
        fields: String,
        /// Update this local survey instead of creating one.
        #[arg(long)]
        local_id: Option<i64>,
    },
    /// List local surveys with their record type.
    List,
    /// Fetch title field values for remote survey ids.
    Titles { ids: Vec<String> },
    /// Print the local survey schema.
    Schema,
}

impl Cli {
    /// Commands that reach the CRM need a complete session.
    pub fn missing_session_values(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.instance_url.trim().is_empty() {
            missing.push("SURVEY_SYNC_INSTANCE_URL");
        }
        if self.access_token.trim().is_empty() {
            missing.push("SURVEY_SYNC_ACCESS_TOKEN");
        }
        if self.contact_id.trim().is_empty() {
            missing.push("SURVEY_SYNC_CONTACT_ID");
        }
        missing
    }
}

impl Command {
    pub fn needs_remote(&self) -> bool {
        matches!(
            self,
            Self::Metadata | Self::Download | Self::Upload | Self::Refresh | Self::Titles { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_save_with_local_id() {
        let cli = Cli::try_parse_from([
            "survey-sync",
            "--db-path",
            "/tmp/s.db",
            "--contact-id",
            "003xx",
            "save",
            "--fields",
            r#"{"Visits__c":2}"#,
            "--local-id",
            "7",
        ])
        .expect("parse");
        assert!(!cli.command.needs_remote());
        match cli.command {
            Command::Save { fields, local_id } => {
                assert_eq!(fields, r#"{"Visits__c":2}"#);
                assert_eq!(local_id, Some(7));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn remote_commands_report_missing_session_values() {
        let cli = Cli::try_parse_from([
            "survey-sync",
            "--instance-url",
            "https://example.my.salesforce.com",
            "--access-token",
            "",
            "--contact-id",
            "003xx",
            "upload",
        ])
        .expect("parse");
        assert!(cli.command.needs_remote());
        assert_eq!(cli.missing_session_values(), vec!["SURVEY_SYNC_ACCESS_TOKEN"]);
    }
}
