//! `bowler a3` command - A3 problem-solving cases

use chrono::{Local, NaiveDate};
use clap::{Subcommand, ValueEnum};
use console::style;
use miette::{miette, IntoDiagnostic, Result};

use crate::ai::{check_action_plan_inputs, check_root_cause_inputs, generate_action_plan, generate_root_causes};
use crate::cli::commands::ai_error;
use crate::cli::context::resolve_a3;
use crate::cli::helpers::{confirm, escape_tsv, truncate_str};
use crate::cli::output::{effective_format, print_structured};
use crate::cli::viz::{render_cause_tree, render_progress};
use crate::cli::{Context, GlobalOpts, OutputFormat};
use crate::core::cause_tree::{self, root_node};
use crate::core::entity::Priority;
use crate::core::identity::EntityId;
use crate::core::state::{action_plan_request_key, mind_map_request_key, AppState};
use crate::entities::a3::{A3Case, A3Status, ActionItem, ActionStatus, ImageRef};

#[derive(Subcommand, Debug)]
pub enum A3Commands {
    /// Open a new A3 case
    New(NewArgs),

    /// List A3 cases
    List(ListArgs),

    /// Show a case section by section
    Show(CaseRef),

    /// Set one field of a case
    Set(SetArgs),

    /// Delete a case
    Delete(CaseRef),

    /// Generate a 5-Whys mind map from the problem statement
    Why(CaseRef),

    /// Print the mind map as a tree
    Tree(CaseRef),

    /// Edit mind-map nodes
    Node {
        #[command(subcommand)]
        cmd: NodeCommands,
    },

    /// Draft action items from the problem statement and root cause
    Plan(CaseRef),

    /// Edit the action plan
    Action {
        #[command(subcommand)]
        cmd: ActionCommands,
    },

    /// Attach or detach data-analysis images
    Image {
        #[command(subcommand)]
        cmd: ImageCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum NodeCommands {
    /// Add a cause under an existing node
    Add {
        case: String,
        /// Parent node ID (e.g. root, cause-3)
        parent: String,
        text: String,
    },

    /// Change a node's text
    Edit {
        case: String,
        node: String,
        text: String,
    },

    /// Remove a node and everything below it
    Remove { case: String, node: String },
}

#[derive(Subcommand, Debug)]
pub enum ActionCommands {
    /// Add an action item
    Add {
        case: String,
        task: String,
        #[arg(long)]
        owner: Option<String>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<NaiveDate>,
    },

    /// Mark an action done
    Done {
        case: String,
        /// Action number (1-based) or ID
        action: String,
    },

    /// Set an action's status
    Status {
        case: String,
        action: String,
        status: ActionStatus,
    },

    /// Remove an action
    Remove { case: String, action: String },
}

#[derive(Subcommand, Debug)]
pub enum ImageCommands {
    /// Attach an image by URL
    Add {
        case: String,
        url: String,
        #[arg(long)]
        caption: Option<String>,
    },

    /// Detach an image by its number (1-based)
    Remove { case: String, index: usize },
}

#[derive(clap::Args, Debug)]
pub struct CaseRef {
    /// A3 case (A3@N, ID or title)
    pub case: String,
}

#[derive(clap::Args, Debug)]
pub struct NewArgs {
    pub title: String,

    #[arg(long, short = 'd')]
    pub description: Option<String>,

    #[arg(long)]
    pub owner: Option<String>,

    #[arg(long, short = 'g')]
    pub group: Option<String>,

    #[arg(long, short = 'p', default_value = "medium")]
    pub priority: Priority,

    /// Problem statement
    #[arg(long)]
    pub problem: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Only cases with this status
    #[arg(long, short = 's')]
    pub status: Option<A3Status>,

    /// Print only the number of matching cases
    #[arg(long)]
    pub count: bool,
}

/// Editable case fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum A3Field {
    Title,
    Description,
    Owner,
    Group,
    Priority,
    Status,
    StartDate,
    EndDate,
    ProblemStatement,
    Observations,
    DataAnalysis,
    RootCause,
    Results,
    LinkedMetric,
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    pub case: String,

    pub field: A3Field,

    /// New value; an empty string clears optional fields
    #[arg(allow_hyphen_values = true)]
    pub value: String,
}

pub fn run(cmd: A3Commands, global: &GlobalOpts) -> Result<()> {
    let ctx = Context::open(global)?;
    match cmd {
        A3Commands::New(args) => run_new(&ctx, args),
        A3Commands::List(args) => run_list(&ctx, args),
        A3Commands::Show(args) => run_show(&ctx, args),
        A3Commands::Set(args) => run_set(&ctx, args),
        A3Commands::Delete(args) => run_delete(&ctx, args),
        A3Commands::Why(args) => run_why(&ctx, args),
        A3Commands::Tree(args) => run_tree(&ctx, args),
        A3Commands::Node { cmd } => run_node(&ctx, cmd),
        A3Commands::Plan(args) => run_plan(&ctx, args),
        A3Commands::Action { cmd } => run_action(&ctx, cmd),
        A3Commands::Image { cmd } => run_image(&ctx, cmd),
    }
}

fn case_of<'a>(state: &'a AppState, id: &EntityId) -> Result<&'a A3Case> {
    state
        .a3(id)
        .ok_or_else(|| miette!("A3 case not found: {}", id))
}

fn run_new(ctx: &Context, args: NewArgs) -> Result<()> {
    let title = args.title.trim();
    if title.is_empty() {
        return Err(miette!("Title cannot be empty"));
    }

    let mut state = ctx.load_state()?;
    let mut case = A3Case::new(state.user_id(), title);
    case.description = args.description.unwrap_or_default();
    case.owner = args.owner.unwrap_or_default();
    case.group = args.group.filter(|g| !g.is_empty());
    case.priority = args.priority;
    case.problem_statement = args.problem.unwrap_or_default();

    let id = state.add_a3(case);
    ctx.save_state(&state)?;

    let short = state.short_ids().get_short_id(&id).unwrap_or_default();
    match ctx.format {
        OutputFormat::Id => println!("{}", id),
        _ => println!(
            "{} Created A3 {} {}",
            style("✓").green(),
            style(short).cyan(),
            style(title).yellow()
        ),
    }
    Ok(())
}

fn run_list(ctx: &Context, args: ListArgs) -> Result<()> {
    let state = ctx.load_state()?;
    let short_ids = state.short_ids();

    let cases: Vec<&A3Case> = state
        .a3_cases()
        .iter()
        .filter(|c| args.status.map_or(true, |s| c.status == s))
        .collect();

    if args.count {
        println!("{}", cases.len());
        return Ok(());
    }

    let format = effective_format(ctx.format, true);
    if print_structured(&cases, format)? {
        return Ok(());
    }

    if cases.is_empty() {
        println!("No A3 cases found.");
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
                "{:<8} {:<30} {:<12} {:<9} {:>8}",
                style("SHORT").bold(),
                style("TITLE").bold(),
                style("STATUS").bold(),
                style("PRIORITY").bold(),
                style("ACTIONS").bold()
            );
            for c in &cases {
                let done = c
                    .action_plan
                    .iter()
                    .filter(|a| a.status == ActionStatus::Done)
                    .count();
                println!(
                    "{:<8}\t{:<30}\t{:<12}\t{:<9}\t{:>8}",
                    short_ids.get_short_id(&c.id).unwrap_or_default(),
                    escape_tsv(&truncate_str(&c.title, 30)),
                    c.status,
                    c.priority,
                    format!("{}/{}", done, c.action_plan.len())
                );
            }
        }
    }
    Ok(())
}

fn print_section(title: &str, body: &str) {
    println!();
    println!("{}", style(title).bold().underlined());
    if body.trim().is_empty() {
        println!("{}", style("(empty)").dim());
    } else {
        println!("{}", body.trim_end());
    }
}

fn run_show(ctx: &Context, args: CaseRef) -> Result<()> {
    let state = ctx.load_state()?;
    let id = resolve_a3(&state, &args.case)?;
    let case = case_of(&state, &id)?;

    if print_structured(case, ctx.format)? {
        return Ok(());
    }
    if ctx.format == OutputFormat::Id {
        println!("{}", case.id);
        return Ok(());
    }

    println!("{}", style("─".repeat(60)).dim());
    println!("{}: {}", style("A3").bold(), style(&case.title).yellow());
    println!("{}: {}", style("ID").bold(), style(&case.id).cyan());
    println!(
        "{}: {}   {}: {}",
        style("Status").bold(),
        case.status,
        style("Priority").bold(),
        case.priority
    );
    if !case.owner.is_empty() {
        println!("{}: {}", style("Owner").bold(), case.owner);
    }
    if let Some(group) = &case.group {
        println!("{}: {}", style("Group").bold(), group);
    }
    if case.start_date.is_some() || case.end_date.is_some() {
        let fmt = |d: Option<NaiveDate>| d.map(|d| d.to_string()).unwrap_or_else(|| "?".to_string());
        println!(
            "{}: {} .. {}",
            style("Dates").bold(),
            fmt(case.start_date),
            fmt(case.end_date)
        );
    }
    if let Some(metric_id) = &case.linked_metric {
        let name = state
            .bowlers()
            .iter()
            .flat_map(|b| b.metrics.iter())
            .find(|m| &m.id == metric_id)
            .map(|m| m.name.clone())
            .unwrap_or_else(|| metric_id.to_string());
        println!("{}: {}", style("Metric").bold(), name);
    }
    println!("{}", style("─".repeat(60)).dim());

    if !case.description.is_empty() {
        println!("{}", case.description);
    }
    print_section("Problem Statement", &case.problem_statement);
    print_section("Observations", &case.observations);
    print_section("Data Analysis", &case.data_analysis);
    for (i, image) in case.images.iter().enumerate() {
        match &image.caption {
            Some(caption) => println!("  [{}] {} ({})", i + 1, image.url, caption),
            None => println!("  [{}] {}", i + 1, image.url),
        }
    }
    print_section("Root Cause", &case.root_cause);

    if !case.mind_map.is_empty() {
        print_section("5 Whys", &render_cause_tree(&case.mind_map));
    }

    println!();
    println!("{}", style("Action Plan").bold().underlined());
    if case.action_plan.is_empty() {
        println!("{}", style("(empty)").dim());
    } else {
        print_actions(&case.action_plan);
        if let Some(progress) = case.action_progress() {
            println!("{}", render_progress(progress, 30));
        }
    }

    print_section("Results", &case.results);
    Ok(())
}

fn print_actions(actions: &[ActionItem]) {
    for (i, action) in actions.iter().enumerate() {
        let mark = match action.status {
            ActionStatus::Done => style("✓").green(),
            ActionStatus::InProgress => style("…").yellow(),
            ActionStatus::Open => style("○").dim(),
        };
        let mut line = format!("{:>3}. {} {}", i + 1, mark, action.task);
        if !action.owner.is_empty() {
            line.push_str(&format!("  @{}", action.owner));
        }
        if let Some(due) = action.due {
            line.push_str(&format!("  due {}", due));
        }
        println!("{}", line);
    }
}

/// Find a metric anywhere in the user's bowlers by ID or name
fn resolve_metric_id(state: &AppState, reference: &str) -> Result<EntityId> {
    state
        .bowlers()
        .iter()
        .find_map(|b| b.find_metric(reference))
        .map(|m| m.id.clone())
        .ok_or_else(|| miette!("No metric found matching '{}'", reference))
}

fn parse_date(value: &str) -> Result<Option<NaiveDate>> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map(Some)
        .map_err(|_| miette!("Invalid date '{}': expected YYYY-MM-DD", value))
}

fn run_set(ctx: &Context, args: SetArgs) -> Result<()> {
    let mut state = ctx.load_state()?;
    let id = resolve_a3(&state, &args.case)?;
    let value = args.value;

    // Parse up front so a bad value never half-applies
    let linked = match args.field {
        A3Field::LinkedMetric if !value.trim().is_empty() => Some(resolve_metric_id(&state, &value)?),
        _ => None,
    };
    let priority = match args.field {
        A3Field::Priority => Some(value.parse::<Priority>().map_err(|e| miette!("{}", e))?),
        _ => None,
    };
    let status = match args.field {
        A3Field::Status => Some(value.parse::<A3Status>().map_err(|e| miette!("{}", e))?),
        _ => None,
    };
    let date = match args.field {
        A3Field::StartDate | A3Field::EndDate => parse_date(&value)?,
        _ => None,
    };
    if args.field == A3Field::Title && value.trim().is_empty() {
        return Err(miette!("Title cannot be empty"));
    }

    let field = args.field;
    state
        .update_a3(&id, |case| match field {
            A3Field::Title => case.title = value.trim().to_string(),
            A3Field::Description => case.description = value,
            A3Field::Owner => case.owner = value,
            A3Field::Group => case.group = Some(value).filter(|g| !g.is_empty()),
            A3Field::Priority => case.priority = priority.unwrap_or_default(),
            A3Field::Status => case.status = status.unwrap_or_default(),
            A3Field::StartDate => case.start_date = date,
            A3Field::EndDate => case.end_date = date,
            A3Field::ProblemStatement => case.problem_statement = value,
            A3Field::Observations => case.observations = value,
            A3Field::DataAnalysis => case.data_analysis = value,
            A3Field::RootCause => case.root_cause = value,
            A3Field::Results => case.results = value,
            A3Field::LinkedMetric => case.linked_metric = linked,
        })
        .into_diagnostic()?;
    ctx.save_state(&state)?;

    let name = field
        .to_possible_value()
        .map(|v| v.get_name().to_string())
        .unwrap_or_default();
    println!("{} Updated {}", style("✓").green(), style(name).cyan());
    Ok(())
}

fn run_delete(ctx: &Context, args: CaseRef) -> Result<()> {
    let mut state = ctx.load_state()?;
    let id = resolve_a3(&state, &args.case)?;
    let title = case_of(&state, &id)?.title.clone();

    if !confirm(&format!("Delete A3 '{}'?", title), ctx.yes)? {
        println!("Cancelled.");
        return Ok(());
    }

    state.remove_a3(&id).into_diagnostic()?;
    let report = ctx.save_state(&state)?;
    tracing::debug!("Deleted {} record(s)", report.deleted);
    println!("{} Deleted A3 {}", style("✓").green(), style(title).yellow());
    Ok(())
}

fn run_why(ctx: &Context, args: CaseRef) -> Result<()> {
    let mut state = ctx.load_state()?;
    let id = resolve_a3(&state, &args.case)?;
    let case = case_of(&state, &id)?.clone();

    check_root_cause_inputs(&case).map_err(ai_error)?;
    if !case.mind_map.is_empty() && !confirm("Replace the existing mind map?", ctx.yes)? {
        println!("Cancelled.");
        return Ok(());
    }

    let client = ctx.chat_client()?;
    let ticket = ctx.begin_request(&mut state, mind_map_request_key(&id), &id)?;
    let nodes = generate_root_causes(&client, &case).map_err(ai_error)?;

    // Apply against what is stored now, not what was loaded before the call
    let mut fresh = ctx.reload_for(&ticket)?;
    fresh
        .apply_generated_mind_map(&ticket, &id, nodes)
        .into_diagnostic()?;
    ctx.save_state(&fresh)?;

    let tree = &case_of(&fresh, &id)?.mind_map;
    if print_structured(tree, ctx.format)? {
        return Ok(());
    }
    println!(
        "{} Generated {} cause(s)",
        style("✓").green(),
        tree.len().saturating_sub(1)
    );
    println!("{}", render_cause_tree(tree));
    Ok(())
}

fn run_tree(ctx: &Context, args: CaseRef) -> Result<()> {
    let state = ctx.load_state()?;
    let id = resolve_a3(&state, &args.case)?;
    let case = case_of(&state, &id)?;

    if print_structured(&case.mind_map, ctx.format)? {
        return Ok(());
    }
    println!("{}", render_cause_tree(&case.mind_map));
    Ok(())
}

fn run_node(ctx: &Context, cmd: NodeCommands) -> Result<()> {
    let (case_ref, verb) = match &cmd {
        NodeCommands::Add { case, .. } => (case, "Added"),
        NodeCommands::Edit { case, .. } => (case, "Updated"),
        NodeCommands::Remove { case, .. } => (case, "Removed"),
    };

    let mut state = ctx.load_state()?;
    let id = resolve_a3(&state, case_ref)?;
    let case = case_of(&state, &id)?;
    let mut nodes = case.mind_map.clone();

    let detail = match cmd {
        NodeCommands::Add { parent, text, .. } => {
            if text.trim().is_empty() {
                return Err(miette!("Cause text cannot be empty"));
            }
            if nodes.is_empty() {
                // Start a map rooted at the problem statement
                let root_text = if case.problem_statement.trim().is_empty() {
                    case.title.as_str()
                } else {
                    case.problem_statement.trim()
                };
                nodes.push(root_node(root_text));
            }
            cause_tree::add_child(&mut nodes, &parent, text.trim()).into_diagnostic()?
        }
        NodeCommands::Edit { node, text, .. } => {
            let target = nodes
                .iter_mut()
                .find(|n| n.id == node)
                .ok_or_else(|| miette!("Node not found: {}", node))?;
            target.text = text;
            node
        }
        NodeCommands::Remove { node, .. } => {
            let removed = cause_tree::remove_subtree(&mut nodes, &node).into_diagnostic()?;
            format!("{} ({} node(s))", node, removed)
        }
    };

    state.set_mind_map(&id, nodes).into_diagnostic()?;
    ctx.save_state(&state)?;
    println!("{} {} {}", style("✓").green(), verb, style(detail).cyan());
    Ok(())
}

fn run_plan(ctx: &Context, args: CaseRef) -> Result<()> {
    let mut state = ctx.load_state()?;
    let id = resolve_a3(&state, &args.case)?;
    let case = case_of(&state, &id)?.clone();

    check_action_plan_inputs(&case).map_err(ai_error)?;

    let client = ctx.chat_client()?;
    let ticket = ctx.begin_request(&mut state, action_plan_request_key(&id), &id)?;
    let today = Local::now().date_naive();
    let items = generate_action_plan(&client, &case, today).map_err(ai_error)?;
    let added = items.len();

    let mut fresh = ctx.reload_for(&ticket)?;
    fresh
        .apply_generated_actions(&ticket, &id, items)
        .into_diagnostic()?;
    ctx.save_state(&fresh)?;

    let plan = &case_of(&fresh, &id)?.action_plan;
    if print_structured(plan, ctx.format)? {
        return Ok(());
    }
    println!("{} Added {} action(s)", style("✓").green(), added);
    print_actions(plan);
    Ok(())
}

/// Find an action by 1-based position or by ID (or unique ID prefix)
fn action_index(case: &A3Case, reference: &str) -> Result<usize> {
    if let Ok(n) = reference.parse::<usize>() {
        if n >= 1 && n <= case.action_plan.len() {
            return Ok(n - 1);
        }
    }
    let matches: Vec<usize> = case
        .action_plan
        .iter()
        .enumerate()
        .filter(|(_, a)| {
            let id = a.id.to_string();
            id == reference || (reference.len() >= 6 && id.starts_with(reference))
        })
        .map(|(i, _)| i)
        .collect();
    match matches.as_slice() {
        [i] => Ok(*i),
        [] => Err(miette!("No action matching '{}'", reference)),
        _ => Err(miette!("'{}' matches more than one action", reference)),
    }
}

fn run_action(ctx: &Context, cmd: ActionCommands) -> Result<()> {
    let case_ref = match &cmd {
        ActionCommands::Add { case, .. }
        | ActionCommands::Done { case, .. }
        | ActionCommands::Status { case, .. }
        | ActionCommands::Remove { case, .. } => case.clone(),
    };

    let mut state = ctx.load_state()?;
    let id = resolve_a3(&state, &case_ref)?;
    let case = case_of(&state, &id)?;

    let message = match cmd {
        ActionCommands::Add { task, owner, due, .. } => {
            if task.trim().is_empty() {
                return Err(miette!("Task cannot be empty"));
            }
            let mut item = ActionItem::new(task.trim());
            item.owner = owner.unwrap_or_default();
            item.due = due;
            let n = case.action_plan.len() + 1;
            state
                .update_a3(&id, |c| c.action_plan.push(item))
                .into_diagnostic()?;
            format!("Added action {}", n)
        }
        ActionCommands::Done { action, .. } => {
            let i = action_index(case, &action)?;
            state
                .update_a3(&id, |c| c.action_plan[i].status = ActionStatus::Done)
                .into_diagnostic()?;
            format!("Action {} done", i + 1)
        }
        ActionCommands::Status { action, status, .. } => {
            let i = action_index(case, &action)?;
            state
                .update_a3(&id, |c| c.action_plan[i].status = status)
                .into_diagnostic()?;
            format!("Action {} is {}", i + 1, status)
        }
        ActionCommands::Remove { action, .. } => {
            let i = action_index(case, &action)?;
            let task = case.action_plan[i].task.clone();
            state
                .update_a3(&id, |c| {
                    c.action_plan.remove(i);
                })
                .into_diagnostic()?;
            format!("Removed '{}'", truncate_str(&task, 40))
        }
    };

    ctx.save_state(&state)?;
    println!("{} {}", style("✓").green(), message);
    if let Some(progress) = state.a3(&id).and_then(|c| c.action_progress()) {
        println!("{}", render_progress(progress, 30));
    }
    Ok(())
}

fn run_image(ctx: &Context, cmd: ImageCommands) -> Result<()> {
    let case_ref = match &cmd {
        ImageCommands::Add { case, .. } | ImageCommands::Remove { case, .. } => case.clone(),
    };

    let mut state = ctx.load_state()?;
    let id = resolve_a3(&state, &case_ref)?;
    let count = case_of(&state, &id)?.images.len();

    let message = match cmd {
        ImageCommands::Add { url, caption, .. } => {
            if url.trim().is_empty() {
                return Err(miette!("Image URL cannot be empty"));
            }
            let image = ImageRef {
                url: url.trim().to_string(),
                caption: caption.filter(|c| !c.is_empty()),
            };
            state
                .update_a3(&id, |c| c.images.push(image))
                .into_diagnostic()?;
            format!("Attached image {}", count + 1)
        }
        ImageCommands::Remove { index, .. } => {
            if index == 0 || index > count {
                return Err(miette!("No image {} (case has {})", index, count));
            }
            state
                .update_a3(&id, |c| {
                    c.images.remove(index - 1);
                })
                .into_diagnostic()?;
            format!("Detached image {}", index)
        }
    };

    ctx.save_state(&state)?;
    println!("{} {}", style("✓").green(), message);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case_with_actions(n: usize) -> A3Case {
        let mut case = A3Case::new("alice", "Scrap rate");
        for i in 0..n {
            case.action_plan.push(ActionItem::new(format!("task {}", i + 1)));
        }
        case
    }

    #[test]
    fn test_action_index_by_position() {
        let case = case_with_actions(3);
        assert_eq!(action_index(&case, "1").unwrap(), 0);
        assert_eq!(action_index(&case, "3").unwrap(), 2);
        assert!(action_index(&case, "4").is_err());
        assert!(action_index(&case, "0").is_err());
    }

    #[test]
    fn test_action_index_by_id() {
        let case = case_with_actions(2);
        let id = case.action_plan[1].id.to_string();
        assert_eq!(action_index(&case, &id).unwrap(), 1);
        assert!(action_index(&case, "ACT").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("").unwrap(), None);
        assert_eq!(
            parse_date("2026-03-01").unwrap(),
            NaiveDate::from_ymd_opt(2026, 3, 1)
        );
        assert!(parse_date("03/01/2026").is_err());
    }
}
