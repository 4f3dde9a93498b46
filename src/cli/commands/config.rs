//! `bowler config` command - effective configuration

use clap::Subcommand;
use miette::{IntoDiagnostic, Result};

use crate::cli::output::print_structured;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::config::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show the merged configuration (secrets masked)
    Show,

    /// Show where the config file and database live
    Path,
}

pub fn run(cmd: ConfigCommands, global: &GlobalOpts) -> Result<()> {
    let mut config = Config::load();
    if let Some(db) = &global.db {
        config.db = Some(db.clone());
    }
    if let Some(user) = &global.user {
        config.user = Some(user.clone());
    }

    match cmd {
        ConfigCommands::Show => {
            let redacted = config.redacted();
            let format = match global.format {
                OutputFormat::Json => OutputFormat::Json,
                _ => OutputFormat::Yaml,
            };
            print_structured(&redacted, format)?;
        }
        ConfigCommands::Path => {
            let config_file = Config::config_path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(no config directory)".to_string());
            let db = config.db_path();
            if global.format == OutputFormat::Json {
                let value = serde_json::json!({
                    "config": config_file,
                    "db": db.display().to_string(),
                });
                println!("{}", serde_json::to_string_pretty(&value).into_diagnostic()?);
            } else {
                println!("config: {}", config_file);
                println!("db:     {}", db.display());
            }
        }
    }
    Ok(())
}
