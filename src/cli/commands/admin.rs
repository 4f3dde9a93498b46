//! `bowler admin` command - cross-user views and raw key access

use clap::Subcommand;
use console::style;
use miette::{miette, IntoDiagnostic, Result};

use crate::cli::helpers::{confirm, escape_tsv, read_lines_from_stdin, truncate_str};
use crate::cli::output::{effective_format, print_structured};
use crate::cli::{Context, GlobalOpts, OutputFormat};
use crate::entities::a3::A3Status;
use crate::service::storage::{self, ConsolidateRequest};

#[derive(Subcommand, Debug)]
pub enum AdminCommands {
    /// List raw keys, one page at a time
    KvList {
        /// Key prefix (e.g. "user:alice:")
        #[arg(default_value = "")]
        prefix: String,

        /// Cursor from a previous page
        #[arg(long)]
        cursor: Option<String>,

        /// Page size
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },

    /// Delete raw keys (read from stdin when none are given)
    KvDelete {
        keys: Vec<String>,
    },

    /// Bowlers from every user, filtered by group and/or tags
    Consolidate {
        #[arg(long, short = 'g')]
        group: Option<String>,

        /// Match bowlers carrying any of these tags
        #[arg(long = "tag", short = 't')]
        tags: Vec<String>,
    },

    /// A3 cases from every user, newest first
    AllA3 {
        #[arg(long, short = 's')]
        status: Option<A3Status>,
    },
}

pub fn run(cmd: AdminCommands, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::open(global)?;
    match cmd {
        AdminCommands::KvList { prefix, cursor, limit } => run_kv_list(&ctx, &prefix, cursor.as_deref(), limit),
        AdminCommands::KvDelete { keys } => run_kv_delete(&ctx, keys),
        AdminCommands::Consolidate { group, tags } => run_consolidate(&ctx, group, tags),
        AdminCommands::AllA3 { status } => run_all_a3(&ctx, status),
    }
}

fn run_kv_list(ctx: &Context, prefix: &str, cursor: Option<&str>, limit: Option<usize>) -> Result<()> {
    let page = storage::kv_list(&ctx.store, prefix, cursor, limit).into_diagnostic()?;

    if print_structured(&page, ctx.format)? {
        return Ok(());
    }
    for key in &page.keys {
        println!("{}", key);
    }
    if let Some(next) = &page.cursor {
        eprintln!("{} more keys: --cursor {}", style("…").dim(), next);
    }
    Ok(())
}

fn run_kv_delete(ctx: &Context, keys: Vec<String>) -> Result<()> {
    let keys = if keys.is_empty() {
        read_lines_from_stdin().ok_or_else(|| miette!("No keys given"))?
    } else {
        keys
    };

    if !confirm(&format!("Delete {} raw key(s)?", keys.len()), ctx.yes)? {
        println!("Cancelled.");
        return Ok(());
    }

    let deleted = storage::kv_delete(&ctx.store, &keys).into_diagnostic()?;
    println!(
        "{} Deleted {} of {} key(s)",
        style("✓").green(),
        deleted,
        keys.len()
    );
    Ok(())
}

fn run_consolidate(ctx: &Context, group: Option<String>, tags: Vec<String>) -> Result<()> {
    let bowlers = storage::consolidate(&ctx.store, &ConsolidateRequest { group, tags }).into_diagnostic()?;

    let format = effective_format(ctx.format, true);
    if print_structured(&bowlers, format)? {
        return Ok(());
    }
    if bowlers.is_empty() {
        println!("No matching bowlers.");
        return Ok(());
    }

    match format {
        OutputFormat::Id => {
            for b in &bowlers {
                println!("{}", b.id);
            }
        }
        _ => {
            println!(
                "{:<14} {:<30} {:<14} {:>7}",
                style("USER").bold(),
                style("NAME").bold(),
                style("GROUP").bold(),
                style("METRICS").bold()
            );
            for b in &bowlers {
                println!(
                    "{:<14}\t{:<30}\t{:<14}\t{:>7}",
                    b.user_id,
                    escape_tsv(&truncate_str(&b.name, 30)),
                    escape_tsv(b.group.as_deref().unwrap_or("-")),
                    b.metrics.len()
                );
            }
        }
    }
    Ok(())
}

fn run_all_a3(ctx: &Context, status: Option<A3Status>) -> Result<()> {
    let cases = storage::all_a3(&ctx.store, status).into_diagnostic()?;

    let format = effective_format(ctx.format, true);
    if print_structured(&cases, format)? {
        return Ok(());
    }
    if cases.is_empty() {
        println!("No A3 cases.");
        return Ok(());
    }

    match format {
        OutputFormat::Id => {
            for c in &cases {
                println!("{}", c.id);
            }
        }
        _ => {
            println!(
                "{:<14} {:<30} {:<12} {}",
                style("USER").bold(),
                style("TITLE").bold(),
                style("STATUS").bold(),
                style("CREATED").bold()
            );
            for c in &cases {
                println!(
                    "{:<14}\t{:<30}\t{:<12}\t{}",
                    c.user_id,
                    escape_tsv(&truncate_str(&c.title, 30)),
                    c.status,
                    c.created.format("%Y-%m-%d")
                );
            }
        }
    }
    Ok(())
}
