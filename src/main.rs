use std::io;

use bowler::cli::commands::{a3, admin, ask, auth, bowler as bowler_cmd, config, dashboard, email, metric};
use bowler::cli::{Cli, Commands};
use clap::{CommandFactory, Parser};
use miette::Result;

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .tab_width(4)
                .build(),
        )
    }))?;

    let cli = Cli::parse();
    bowler::core::logging::init(cli.global.verbose);

    let global = &cli.global;
    match cli.command {
        Commands::Auth(cmd) => auth::run(cmd, global),
        Commands::Bowler(cmd) => bowler_cmd::run(cmd, global),
        Commands::Metric(cmd) => metric::run(cmd, global),
        Commands::A3(cmd) => a3::run(cmd, global),
        Commands::Ask(args) => ask::run(args, global),
        Commands::Email(cmd) => email::run(cmd, global),
        Commands::Dashboard(cmd) => dashboard::run(cmd, global),
        Commands::Admin(cmd) => admin::run(cmd, global),
        Commands::Config(cmd) => config::run(cmd, global),
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "bowler", &mut io::stdout());
            Ok(())
        }
    }
}
