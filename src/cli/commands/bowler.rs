//! `bowler bowler` command - Bowler scorecard management

use clap::Subcommand;
use console::style;
use miette::{miette, IntoDiagnostic, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::cli::context::resolve_bowler;
use crate::cli::helpers::{confirm, escape_tsv, or_dash, truncate_str};
use crate::cli::output::{effective_format, print_structured};
use crate::cli::{Context, GlobalOpts, OutputFormat};
use crate::core::stats::MetricSummary;
use crate::entities::bowler::Bowler;
use crate::entities::metric::{validate_month, Attribute, Metric, MonthlyEntry, TargetRule};
use crate::yaml::parse_yaml_file;

#[derive(Subcommand, Debug)]
pub enum BowlerCommands {
    /// Create a new bowler
    New(NewArgs),

    /// List your bowlers
    List(ListArgs),

    /// Show a bowler with per-metric statistics
    Show(ShowArgs),

    /// Change a bowler's name, description, group or tags
    Edit(EditArgs),

    /// Delete a bowler
    Delete(DeleteArgs),

    /// Export monthly data as CSV
    Export(ExportArgs),

    /// Import bowlers from a YAML file
    Import(ImportArgs),
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    /// Bowler name
    pub name: String,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Team or department
    #[arg(long, short = 'g')]
    pub group: Option<String>,

    /// Tags (comma-separated)
    #[arg(long, short = 't', value_delimiter = ',')]
    pub tags: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only bowlers in this group
    #[arg(long, short = 'g')]
    pub group: Option<String>,

    /// Only bowlers with this tag
    #[arg(long, short = 't')]
    pub tag: Option<String>,

    /// Print only the number of matches
    #[arg(long)]
    pub count: bool,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Bowler (BWL@N, ID or name)
    pub bowler: String,
}

#[derive(clap::Args, Debug)]
pub struct EditArgs {
    /// Bowler (BWL@N, ID or name)
    pub bowler: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    /// Team or department (empty to clear)
    #[arg(long, short = 'g')]
    pub group: Option<String>,

    /// Replace tags (comma-separated)
    #[arg(long, short = 't', value_delimiter = ',')]
    pub tags: Option<Vec<String>>,
}

#[derive(clap::Args, Debug)]
pub struct DeleteArgs {
    /// Bowler (BWL@N, ID or name)
    pub bowler: String,
}

#[derive(clap::Args, Debug)]
pub struct ExportArgs {
    /// Bowler (BWL@N, ID or name); all bowlers if omitted
    pub bowler: Option<String>,

    /// Write to a file instead of stdout
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// YAML file with one bowler or a list of bowlers
    pub file: PathBuf,
}

/// Bowler layout accepted by `bowler import`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ImportBowler {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<ImportMetric>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case", deny_unknown_fields)]
pub struct ImportMetric {
    pub name: String,
    #[serde(default)]
    pub rule: TargetRule,
    #[serde(default)]
    pub attribute: Attribute,
    #[serde(default)]
    pub definition: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub unit: Option<String>,
    /// `YYYY-MM` to `{actual, target}`
    #[serde(default)]
    pub months: BTreeMap<String, MonthlyEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImportFile {
    Many(Vec<ImportBowler>),
    One(ImportBowler),
}

impl ImportBowler {
    /// Build a bowler, checking every month key
    pub fn into_bowler(self, user_id: &str) -> Result<Bowler> {
        let mut bowler = Bowler::new(user_id, self.name);
        bowler.description = self.description;
        bowler.group = self.group.filter(|g| !g.trim().is_empty());
        bowler.tags = self.tags;

        for m in self.metrics {
            if bowler.find_metric(&m.name).is_some() {
                return Err(miette!("Duplicate metric '{}' in '{}'", m.name, bowler.name));
            }
            for month in m.months.keys() {
                validate_month(month).map_err(|e| miette!("{} (metric '{}')", e, m.name))?;
            }
            let mut metric = Metric::new(m.name, m.rule);
            metric.attribute = m.attribute;
            metric.definition = m.definition;
            metric.owner = m.owner;
            metric.scope = m.scope;
            metric.unit = m.unit;
            metric.monthly_data = m.months;
            bowler.metrics.push(metric);
        }
        Ok(bowler)
    }
}

/// A bowler with computed metric summaries, for structured output
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BowlerReport<'a> {
    #[serde(flatten)]
    bowler: &'a Bowler,
    summaries: Vec<MetricSummary>,
}

pub fn run(cmd: BowlerCommands, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::open(global)?;
    match cmd {
        BowlerCommands::New(args) => run_new(&ctx, args),
        BowlerCommands::List(args) => run_list(&ctx, args),
        BowlerCommands::Show(args) => run_show(&ctx, args),
        BowlerCommands::Edit(args) => run_edit(&ctx, args),
        BowlerCommands::Delete(args) => run_delete(&ctx, args),
        BowlerCommands::Export(args) => run_export(&ctx, args),
        BowlerCommands::Import(args) => run_import(&ctx, args),
    }
}

fn run_new(ctx: &Context, args: NewArgs) -> Result<()> {
    let mut state = ctx.load_state()?;

    let mut bowler = Bowler::new(state.user_id(), args.name.trim());
    if bowler.name.is_empty() {
        return Err(miette!("Bowler name cannot be empty"));
    }
    bowler.description = args.description.unwrap_or_default();
    bowler.group = args.group.filter(|g| !g.trim().is_empty());
    bowler.tags = args.tags;

    let id = state.add_bowler(bowler);
    ctx.save_state(&state)?;

    let short = state.short_ids().get_short_id(&id).unwrap_or_default();
    match ctx.format {
        OutputFormat::Id => println!("{}", id),
        _ => println!(
            "{} Created bowler {} ({})",
            style("✓").green(),
            style(&short).cyan(),
            id
        ),
    }
    Ok(())
}

fn run_list(ctx: &Context, args: ListArgs) -> Result<()> {
    let state = ctx.load_state()?;
    let short_ids = state.short_ids();

    let bowlers: Vec<&Bowler> = state
        .bowlers()
        .iter()
        .filter(|b| {
            args.group.as_deref().map_or(true, |g| {
                b.group.as_deref().is_some_and(|bg| bg.eq_ignore_ascii_case(g))
            })
        })
        .filter(|b| {
            args.tag
                .as_deref()
                .map_or(true, |t| b.tags.iter().any(|bt| bt.eq_ignore_ascii_case(t)))
        })
        .collect();

    if args.count {
        println!("{}", bowlers.len());
        return Ok(());
    }

    let format = effective_format(ctx.format, true);
    if print_structured(&bowlers, format)? {
        return Ok(());
    }

    if bowlers.is_empty() {
        println!("No bowlers found.");
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
                "{:<8} {:<30} {:<14} {:>7}  {}",
                style("SHORT").bold(),
                style("NAME").bold(),
                style("GROUP").bold(),
                style("METRICS").bold(),
                style("UPDATED").bold()
            );
            for b in &bowlers {
                println!(
                    "{:<8}\t{:<30}\t{:<14}\t{:>7}\t{}",
                    short_ids.get_short_id(&b.id).unwrap_or_default(),
                    escape_tsv(&truncate_str(&b.name, 30)),
                    escape_tsv(&truncate_str(b.group.as_deref().unwrap_or("-"), 14)),
                    b.metrics.len(),
                    b.updated.format("%Y-%m-%d")
                );
            }
        }
    }
    Ok(())
}

fn run_show(ctx: &Context, args: ShowArgs) -> Result<()> {
    let state = ctx.load_state()?;
    let id = resolve_bowler(&state, &args.bowler)?;
    let Some(bowler) = state.bowler(&id) else {
        return Err(miette!("No bowler found matching '{}'", args.bowler));
    };

    let summaries: Vec<MetricSummary> = bowler.metrics.iter().map(MetricSummary::from_metric).collect();

    if print_structured(&BowlerReport { bowler, summaries: summaries.clone() }, ctx.format)? {
        return Ok(());
    }
    if ctx.format == OutputFormat::Id {
        println!("{}", bowler.id);
        return Ok(());
    }

    println!("{}", style("─".repeat(72)).dim());
    println!(
        "{}: {}  {}",
        style("Bowler").bold(),
        style(&bowler.name).yellow(),
        style(state.short_ids().get_short_id(&id).unwrap_or_default()).dim()
    );
    println!("{}: {}", style("ID").bold(), style(&bowler.id).cyan());
    if let Some(group) = &bowler.group {
        println!("{}: {}", style("Group").bold(), group);
    }
    if !bowler.tags.is_empty() {
        println!("{}: {}", style("Tags").bold(), bowler.tags.join(", "));
    }
    if !bowler.description.is_empty() {
        println!("{}", bowler.description);
    }
    println!("{}", style("─".repeat(72)).dim());

    if summaries.is_empty() {
        println!("No metrics yet. Add one with 'bowler metric add'.");
        return Ok(());
    }

    println!(
        "{:<24} {:<13} {:>10} {:>10} {:>9} {:>9} {:>14} {:>6}",
        style("METRIC").bold(),
        style("RULE").bold(),
        style("TARGET").bold(),
        style("ACTUAL").bold(),
        style("MEAN").bold(),
        style("STD DEV").bold(),
        style("CPK").bold(),
        style("MET").bold()
    );
    for s in &summaries {
        let cpk = match s.cpk.value() {
            Some(v) if v >= 1.33 => style(format!("{:.2}", v)).green(),
            Some(v) if v >= 1.0 => style(format!("{:.2}", v)).yellow(),
            Some(v) => style(format!("{:.2}", v)).red(),
            None => style("n/c".to_string()).dim(),
        };
        println!(
            "{:<24} {:<13} {:>10} {:>10} {:>9.2} {:>9.2} {:>14} {:>6}",
            truncate_str(&s.name, 24),
            s.rule.to_string(),
            truncate_str(or_dash(s.latest_target.as_deref().unwrap_or("")), 10),
            truncate_str(or_dash(s.latest_actual.as_deref().unwrap_or("")), 10),
            s.statistics.mean,
            s.statistics.std_dev,
            cpk,
            format!("{}/{}", s.months_met, s.months_evaluated)
        );
    }
    Ok(())
}

fn run_edit(ctx: &Context, args: EditArgs) -> Result<()> {
    let mut state = ctx.load_state()?;
    let id = resolve_bowler(&state, &args.bowler)?;

    state
        .update_bowler(&id, |b| {
            if let Some(name) = args.name.filter(|n| !n.trim().is_empty()) {
                b.name = name;
            }
            if let Some(description) = args.description {
                b.description = description;
            }
            if let Some(group) = args.group {
                b.group = Some(group).filter(|g| !g.trim().is_empty());
            }
            if let Some(tags) = args.tags {
                b.tags = tags.into_iter().filter(|t| !t.trim().is_empty()).collect();
            }
        })
        .into_diagnostic()?;
    ctx.save_state(&state)?;

    println!("{} Updated bowler {}", style("✓").green(), style(&id).cyan());
    Ok(())
}

fn run_delete(ctx: &Context, args: DeleteArgs) -> Result<()> {
    let mut state = ctx.load_state()?;
    let id = resolve_bowler(&state, &args.bowler)?;
    let name = state.bowler(&id).map(|b| b.name.clone()).unwrap_or_default();

    if !confirm(&format!("Delete bowler '{}' and all its metrics?", name), ctx.yes)? {
        println!("Cancelled.");
        return Ok(());
    }

    state.remove_bowler(&id).into_diagnostic()?;
    ctx.save_state(&state)?;
    println!("{} Deleted bowler {}", style("✓").green(), style(&name).yellow());
    Ok(())
}

fn run_export(ctx: &Context, args: ExportArgs) -> Result<()> {
    let state = ctx.load_state()?;
    let bowlers: Vec<&Bowler> = match &args.bowler {
        Some(reference) => {
            let id = resolve_bowler(&state, reference)?;
            state.bowler(&id).into_iter().collect()
        }
        None => state.bowlers().iter().collect(),
    };

    let sink: Box<dyn std::io::Write> = match &args.output {
        Some(path) => Box::new(std::fs::File::create(path).into_diagnostic()?),
        None => Box::new(std::io::stdout()),
    };
    let mut writer = csv::Writer::from_writer(sink);
    writer
        .write_record(["bowler", "metric", "rule", "unit", "month", "actual", "target"])
        .into_diagnostic()?;

    let mut rows = 0usize;
    for bowler in bowlers {
        for metric in &bowler.metrics {
            let rule = metric.target_meeting_rule.to_string();
            for (month, entry) in &metric.monthly_data {
                writer
                    .write_record([
                        bowler.name.as_str(),
                        metric.name.as_str(),
                        rule.as_str(),
                        metric.unit.as_deref().unwrap_or(""),
                        month.as_str(),
                        entry.actual.as_str(),
                        entry.target.as_str(),
                    ])
                    .into_diagnostic()?;
                rows += 1;
            }
        }
    }
    writer.flush().into_diagnostic()?;

    if let Some(path) = &args.output {
        println!(
            "{} Exported {} row(s) to {}",
            style("✓").green(),
            rows,
            style(path.display()).cyan()
        );
    }
    Ok(())
}

fn run_import(ctx: &Context, args: ImportArgs) -> Result<()> {
    let mut state = ctx.load_state()?;
    let parsed: ImportFile = parse_yaml_file(&args.file)?;
    let items = match parsed {
        ImportFile::Many(items) => items,
        ImportFile::One(item) => vec![item],
    };

    // Validate everything before touching state
    let user = state.user_id().to_string();
    let bowlers = items
        .into_iter()
        .map(|item| item.into_bowler(&user))
        .collect::<Result<Vec<_>>>()?;

    let count = bowlers.len();
    let metrics: usize = bowlers.iter().map(|b| b.metrics.len()).sum();
    for bowler in bowlers {
        state.add_bowler(bowler);
    }
    ctx.save_state(&state)?;

    println!(
        "{} Imported {} bowler(s) with {} metric(s)",
        style("✓").green(),
        count,
        metrics
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::yaml::parse_yaml;

    #[test]
    fn test_import_layout() {
        let yaml = r#"
name: Plant KPIs
group: Ops
tags: [weekly]
metrics:
  - name: OTD
    rule: gte
    unit: "%"
    months:
      2024-01: {actual: "95", target: "90"}
      2024-02: {actual: "97"}
"#;
        let item: ImportBowler = parse_yaml(yaml, "kpis.yaml").unwrap();
        let bowler = item.into_bowler("alice").unwrap();
        assert_eq!(bowler.user_id, "alice");
        assert_eq!(bowler.group.as_deref(), Some("Ops"));
        let otd = &bowler.metrics[0];
        assert_eq!(otd.target_meeting_rule, TargetRule::Gte);
        assert_eq!(otd.monthly_data["2024-01"].target, "90");
        assert_eq!(otd.monthly_data["2024-02"].target, "");
    }

    #[test]
    fn test_import_rejects_bad_month() {
        let yaml = "name: X\nmetrics:\n  - name: M\n    months:\n      2024-13: {actual: \"1\"}\n";
        let item: ImportBowler = parse_yaml(yaml, "x.yaml").unwrap();
        assert!(item.into_bowler("alice").is_err());
    }

    #[test]
    fn test_import_rejects_duplicate_metric() {
        let yaml = "name: X\nmetrics:\n  - name: M\n  - name: m\n";
        let item: ImportBowler = parse_yaml(yaml, "x.yaml").unwrap();
        assert!(item.into_bowler("alice").is_err());
    }

    #[test]
    fn test_import_file_accepts_list() {
        let yaml = "- name: A\n- name: B\n";
        let parsed: ImportFile = parse_yaml(yaml, "x.yaml").unwrap();
        assert!(matches!(parsed, ImportFile::Many(ref v) if v.len() == 2));
    }
}
