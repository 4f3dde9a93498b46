//! `bowler dashboard` command - notes and pinned bowlers

use clap::Subcommand;
use console::style;
use miette::{miette, IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::context::resolve_bowler;
use crate::cli::helpers::{or_dash, truncate_str};
use crate::cli::output::print_structured;
use crate::cli::{Context, GlobalOpts};
use crate::core::stats::{Capability, MetricSummary};
use crate::entities::bowler::Dashboard;

#[derive(Subcommand, Debug)]
pub enum DashboardCommands {
    /// Show the notes and pinned bowlers
    Show,

    /// Replace the markdown notes
    Note {
        /// Markdown text
        #[arg(conflicts_with = "file")]
        text: Option<String>,

        /// Read the notes from a file
        #[arg(long)]
        file: Option<PathBuf>,
    },

    /// Pin a bowler to the dashboard
    Pin {
        /// Bowler (BWL@N, ID or name)
        bowler: String,
    },

    /// Unpin a bowler
    Unpin {
        /// Bowler (BWL@N, ID or name)
        bowler: String,
    },
}

pub fn run(cmd: DashboardCommands, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::open(global)?;
    match cmd {
        DashboardCommands::Show => run_show(&ctx),
        DashboardCommands::Note { text, file } => run_note(&ctx, text, file),
        DashboardCommands::Pin { bowler } => run_pin(&ctx, &bowler, true),
        DashboardCommands::Unpin { bowler } => run_pin(&ctx, &bowler, false),
    }
}

fn run_show(ctx: &Context) -> Result<()> {
    let state = ctx.load_state()?;
    let dashboard = state.dashboard();

    if print_structured(dashboard, ctx.format)? {
        return Ok(());
    }

    if dashboard.markdown.trim().is_empty() {
        println!("{}", style("(no notes)").dim());
    } else {
        println!("{}", dashboard.markdown.trim_end());
    }

    for id in &dashboard.pinned {
        let Some(bowler) = state.bowler(id) else {
            continue;
        };
        println!();
        println!("{}", style("─".repeat(60)).dim());
        println!("{}", style(&bowler.name).yellow().bold());
        if bowler.metrics.is_empty() {
            println!("{}", style("  (no metrics)").dim());
            continue;
        }
        for metric in &bowler.metrics {
            let s = MetricSummary::from_metric(metric);
            let cpk = match s.cpk {
                Capability::Calculated(v) if v >= 1.33 => style(s.cpk.to_string()).green(),
                Capability::Calculated(v) if v >= 1.0 => style(s.cpk.to_string()).yellow(),
                Capability::Calculated(_) => style(s.cpk.to_string()).red(),
                Capability::NotCalculated(_) => style(s.cpk.to_string()).dim(),
            };
            println!(
                "  {:<28} {:>10} / {:<12} Cpk {}",
                truncate_str(&s.name, 28),
                or_dash(s.latest_actual.as_deref().unwrap_or("")),
                or_dash(s.latest_target.as_deref().unwrap_or("")),
                cpk
            );
        }
    }
    Ok(())
}

fn run_note(ctx: &Context, text: Option<String>, file: Option<PathBuf>) -> Result<()> {
    let markdown = match (text, file) {
        (Some(text), _) => text,
        (None, Some(path)) => std::fs::read_to_string(&path)
            .map_err(|e| miette!("Failed to read {}: {}", path.display(), e))?,
        (None, None) => return Err(miette!("Pass the note text or --file")),
    };

    let mut state = ctx.load_state()?;
    let pinned = state.dashboard().pinned.clone();
    state.set_dashboard(Dashboard { markdown, pinned });
    ctx.save_state(&state)?;
    println!("{} Dashboard notes saved", style("✓").green());
    Ok(())
}

fn run_pin(ctx: &Context, reference: &str, pin: bool) -> Result<()> {
    let mut state = ctx.load_state()?;
    let id = resolve_bowler(&state, reference)?;
    if pin {
        state.pin_bowler(&id).into_diagnostic()?;
    } else {
        state.unpin_bowler(&id);
    }
    ctx.save_state(&state)?;

    let name = state.bowler(&id).map(|b| b.name.clone()).unwrap_or_default();
    println!(
        "{} {} {}",
        style("✓").green(),
        if pin { "Pinned" } else { "Unpinned" },
        style(name).yellow()
    );
    Ok(())
}
