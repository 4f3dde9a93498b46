//! `bowler metric` command - Metrics and monthly data

use clap::Subcommand;
use console::style;
use miette::{miette, IntoDiagnostic, Result};

use crate::ai::{analyze_metric, check_metric_inputs};
use crate::cli::commands::ai_error;
use crate::cli::context::resolve_bowler;
use crate::cli::helpers::{confirm, or_dash};
use crate::cli::output::print_structured;
use crate::cli::viz::{render_range_bar, render_trend_chart, CHART_HEIGHT, CHART_WIDTH};
use crate::cli::{Context, GlobalOpts, OutputFormat};
use crate::core::stats::{meets_target, parse_target, MetricSummary, TargetSpec};
use crate::entities::metric::{Attribute, Metric, TargetRule};

#[derive(Subcommand, Debug)]
pub enum MetricCommands {
    /// Add a metric to a bowler
    Add(AddArgs),

    /// Record a month's actual and/or target
    Set(SetArgs),

    /// Show monthly data with statistics and capability
    Show(MetricRef),

    /// Draw the monthly actuals as a chart
    Chart(ChartArgs),

    /// Ask the assistant for a trend label and assessment
    Analyze(MetricRef),

    /// Remove a metric from a bowler
    Remove(MetricRef),
}

#[derive(clap::Args, Debug)]
pub struct AddArgs {
    /// Bowler (BWL@N, ID or name)
    pub bowler: String,

    /// Metric name
    pub name: String,

    /// Target meeting rule: gte (>=), lte (<=) or within-range
    #[arg(long, short = 'r', default_value = "gte")]
    pub rule: TargetRule,

    /// accumulative or snapshot
    #[arg(long, default_value = "snapshot")]
    pub attribute: Attribute,

    #[arg(long)]
    pub unit: Option<String>,

    #[arg(long)]
    pub definition: Option<String>,

    #[arg(long)]
    pub owner: Option<String>,

    #[arg(long)]
    pub scope: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Bowler (BWL@N, ID or name)
    pub bowler: String,

    /// Metric name or ID
    pub metric: String,

    /// Month as YYYY-MM
    pub month: String,

    /// Actual value, kept as typed
    #[arg(long, short = 'a', allow_hyphen_values = true)]
    pub actual: Option<String>,

    /// Target: a number, or a range like "{10, 20}"
    #[arg(long, short = 't', allow_hyphen_values = true)]
    pub target: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct MetricRef {
    /// Bowler (BWL@N, ID or name)
    pub bowler: String,

    /// Metric name or ID
    pub metric: String,
}

#[derive(clap::Args, Debug)]
pub struct ChartArgs {
    #[command(flatten)]
    pub target: MetricRef,

    /// Chart width in braille pixels
    #[arg(long, default_value_t = CHART_WIDTH)]
    pub width: u32,

    /// Chart height in braille pixels
    #[arg(long, default_value_t = CHART_HEIGHT)]
    pub height: u32,
}

pub fn run(cmd: MetricCommands, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::open(global)?;
    match cmd {
        MetricCommands::Add(args) => run_add(&ctx, args),
        MetricCommands::Set(args) => run_set(&ctx, args),
        MetricCommands::Show(args) => run_show(&ctx, args),
        MetricCommands::Chart(args) => run_chart(&ctx, args),
        MetricCommands::Analyze(args) => run_analyze(&ctx, args),
        MetricCommands::Remove(args) => run_remove(&ctx, args),
    }
}

/// Load state and find a metric, returning a copy
fn find_metric(ctx: &Context, r: &MetricRef) -> Result<Metric> {
    let state = ctx.load_state()?;
    let id = resolve_bowler(&state, &r.bowler)?;
    state
        .bowler(&id)
        .and_then(|b| b.find_metric(&r.metric))
        .cloned()
        .ok_or_else(|| miette!("No metric '{}' in bowler '{}'", r.metric, r.bowler))
}

fn run_add(ctx: &Context, args: AddArgs) -> Result<()> {
    let mut state = ctx.load_state()?;
    let bowler_id = resolve_bowler(&state, &args.bowler)?;

    let name = args.name.trim();
    if name.is_empty() {
        return Err(miette!("Metric name cannot be empty"));
    }
    let mut metric = Metric::new(name, args.rule);
    metric.attribute = args.attribute;
    metric.unit = args.unit.filter(|u| !u.is_empty());
    metric.definition = args.definition.unwrap_or_default();
    metric.owner = args.owner.unwrap_or_default();
    metric.scope = args.scope.unwrap_or_default();

    let id = state.add_metric(&bowler_id, metric).into_diagnostic()?;
    ctx.save_state(&state)?;

    match ctx.format {
        OutputFormat::Id => println!("{}", id),
        _ => println!(
            "{} Added metric {} ({})",
            style("✓").green(),
            style(name).yellow(),
            args.rule
        ),
    }
    Ok(())
}

fn run_set(ctx: &Context, args: SetArgs) -> Result<()> {
    if args.actual.is_none() && args.target.is_none() {
        return Err(miette!("Nothing to set: pass --actual and/or --target"));
    }

    let mut state = ctx.load_state()?;
    let bowler_id = resolve_bowler(&state, &args.bowler)?;
    state
        .set_month(
            &bowler_id,
            &args.metric,
            &args.month,
            args.actual.as_deref(),
            args.target.as_deref(),
        )
        .into_diagnostic()?;
    ctx.save_state(&state)?;

    if let Some(target) = &args.target {
        if !target.trim().is_empty() && !parse_target(target).is_parsed() {
            eprintln!(
                "{} Target '{}' is not a number or range; capability won't be calculated from it",
                style("!").yellow(),
                target
            );
        }
    }

    println!(
        "{} {} {}: actual={} target={}",
        style("✓").green(),
        style(&args.metric).yellow(),
        args.month,
        args.actual.as_deref().unwrap_or("(unchanged)"),
        args.target.as_deref().unwrap_or("(unchanged)")
    );
    Ok(())
}

fn run_show(ctx: &Context, args: MetricRef) -> Result<()> {
    let metric = find_metric(ctx, &args)?;
    let summary = MetricSummary::from_metric(&metric);

    match ctx.format {
        OutputFormat::Json | OutputFormat::Yaml => {
            #[derive(serde::Serialize)]
            #[serde(rename_all = "camelCase")]
            struct Report<'a> {
                metric: &'a Metric,
                summary: &'a MetricSummary,
            }
            print_structured(
                &Report {
                    metric: &metric,
                    summary: &summary,
                },
                ctx.format,
            )?;
            return Ok(());
        }
        OutputFormat::Id => {
            println!("{}", metric.id);
            return Ok(());
        }
        OutputFormat::Tsv => {
            println!("month\tactual\ttarget\tmet");
            for (month, entry) in &metric.monthly_data {
                println!("{}\t{}\t{}\t{}", month, entry.actual, entry.target, met_cell(&metric, entry));
            }
            return Ok(());
        }
        OutputFormat::Auto => {}
    }

    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("Metric").bold(), style(&metric.name).yellow());
    println!(
        "{}: {}   {}: {}",
        style("Rule").bold(),
        metric.target_meeting_rule,
        style("Attribute").bold(),
        metric.attribute
    );
    if let Some(unit) = &metric.unit {
        println!("{}: {}", style("Unit").bold(), unit);
    }
    if !metric.definition.is_empty() {
        println!("{}: {}", style("Definition").bold(), metric.definition);
    }
    if !metric.owner.is_empty() {
        println!("{}: {}", style("Owner").bold(), metric.owner);
    }
    println!("{}", style("─".repeat(60)).dim());

    if metric.monthly_data.is_empty() {
        println!("No monthly data yet. Record some with 'bowler metric set'.");
        return Ok(());
    }

    println!(
        "{:<9} {:>12} {:>14}  {}",
        style("MONTH").bold(),
        style("ACTUAL").bold(),
        style("TARGET").bold(),
        style("MET").bold()
    );
    for (month, entry) in &metric.monthly_data {
        let met = match met_cell(&metric, entry) {
            "yes" => style("yes").green(),
            "no" => style("no").red(),
            other => style(other).dim(),
        };
        println!(
            "{:<9} {:>12} {:>14}  {}",
            month,
            or_dash(&entry.actual),
            or_dash(&entry.target),
            met
        );
    }

    let stats = &summary.statistics;
    println!();
    println!(
        "{}: n={}  mean={:.3}  std dev={:.3}  min={}  max={}",
        style("Statistics").bold(),
        stats.count,
        stats.mean,
        stats.std_dev,
        stats.min,
        stats.max
    );
    println!("{}: {}", style("Cpk").bold(), summary.cpk);
    println!(
        "{}: {}/{} months",
        style("Target met").bold(),
        summary.months_met,
        summary.months_evaluated
    );

    if let Some(TargetSpec::Range { min, max }) = summary.latest_target.as_deref().map(parse_target) {
        if stats.count > 0 {
            println!();
            println!("{}", render_range_bar(stats.min, stats.max, min, max));
        }
    }
    Ok(())
}

fn met_cell(metric: &Metric, entry: &crate::entities::metric::MonthlyEntry) -> &'static str {
    let Ok(actual) = entry.actual.trim().parse::<f64>() else {
        return "-";
    };
    match meets_target(actual, &parse_target(&entry.target), metric.target_meeting_rule) {
        Some(true) => "yes",
        Some(false) => "no",
        None => "-",
    }
}

fn run_chart(ctx: &Context, args: ChartArgs) -> Result<()> {
    let metric = find_metric(ctx, &args.target)?;
    let width = args.width.clamp(8, 400);
    let height = args.height.clamp(8, 200);
    println!("{}", render_trend_chart(&metric, width, height));
    Ok(())
}

fn run_analyze(ctx: &Context, args: MetricRef) -> Result<()> {
    let metric = find_metric(ctx, &args)?;
    check_metric_inputs(&metric).map_err(ai_error)?;

    let client = ctx.chat_client()?;
    let analysis = analyze_metric(&client, &metric).map_err(ai_error)?;

    if print_structured(&analysis, ctx.format)? {
        return Ok(());
    }

    println!(
        "{}: {}   {}: {}",
        style("Trend").bold(),
        style(analysis.trend).cyan(),
        style("Cpk").bold(),
        analysis.summary.cpk
    );
    if !analysis.narrative.is_empty() {
        println!();
        println!("{}", analysis.narrative);
    }
    if !analysis.suggestions.is_empty() {
        println!();
        println!("{}", style("Suggestions").bold());
        for s in &analysis.suggestions {
            println!("  • {}", s);
        }
    }
    Ok(())
}

fn run_remove(ctx: &Context, args: MetricRef) -> Result<()> {
    let mut state = ctx.load_state()?;
    let bowler_id = resolve_bowler(&state, &args.bowler)?;

    if !confirm(&format!("Remove metric '{}' and its monthly data?", args.metric), ctx.yes)? {
        println!("Cancelled.");
        return Ok(());
    }

    let removed = state
        .remove_metric(&bowler_id, &args.metric)
        .into_diagnostic()?;
    ctx.save_state(&state)?;
    println!("{} Removed metric {}", style("✓").green(), style(&removed.name).yellow());
    Ok(())
}
