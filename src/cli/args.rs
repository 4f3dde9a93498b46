//! Command-line argument definitions

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    a3::A3Commands, admin::AdminCommands, ask::AskArgs, auth::AuthCommands,
    bowler::BowlerCommands, config::ConfigCommands, dashboard::DashboardCommands,
    email::EmailCommands, metric::MetricCommands,
};

#[derive(Parser, Debug)]
#[command(
    name = "bowler",
    version,
    about = "Track monthly KPIs on bowler scorecards and solve problems with A3 cases",
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options accepted by every command
#[derive(Args, Debug, Clone)]
pub struct GlobalOpts {
    /// Database file (overrides BOWLER_DB and the config file)
    #[arg(long, global = true, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Act as this user instead of the logged-in session
    #[arg(long, short = 'u', global = true)]
    pub user: Option<String>,

    /// Output format
    #[arg(long, short = 'f', global = true, value_enum, default_value_t = OutputFormat::Auto)]
    pub format: OutputFormat,

    /// More log output on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    /// Table for lists, readable summary for single records
    #[default]
    Auto,
    Yaml,
    Json,
    /// Tab-separated, one record per line
    Tsv,
    /// Record IDs only
    Id,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign up, log in and manage your account
    #[command(subcommand)]
    Auth(AuthCommands),

    /// Bowler scorecards
    #[command(subcommand)]
    Bowler(BowlerCommands),

    /// Metrics on a bowler
    #[command(subcommand)]
    Metric(MetricCommands),

    /// A3 problem-solving cases
    #[command(subcommand)]
    A3(A3Commands),

    /// Ask the assistant a free-form question
    Ask(AskArgs),

    /// Scheduled emails
    #[command(subcommand)]
    Email(EmailCommands),

    /// Dashboard notes and pinned bowlers
    #[command(subcommand)]
    Dashboard(DashboardCommands),

    /// Cross-user views and raw key access
    #[command(subcommand)]
    Admin(AdminCommands),

    /// Show configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    Completions {
        /// Shell to generate for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_opts_after_subcommand() {
        let cli = Cli::try_parse_from(["bowler", "bowler", "list", "--format", "json", "-vv", "--user", "bob"])
            .unwrap();
        assert_eq!(cli.global.format, OutputFormat::Json);
        assert_eq!(cli.global.verbose, 2);
        assert_eq!(cli.global.user.as_deref(), Some("bob"));
    }
}
