//! `bowler ask` command - free-form questions to the assistant

use miette::Result;

use crate::ai;
use crate::cli::commands::ai_error;
use crate::cli::{Context, GlobalOpts};
use crate::core::state::AppState;
use crate::core::stats::MetricSummary;

#[derive(clap::Args, Debug)]
pub struct AskArgs {
    /// The question (words are joined with spaces)
    #[arg(required = true, num_args = 1..)]
    pub question: Vec<String>,

    /// Include a summary of your bowlers and A3 cases
    #[arg(long, short = 'c')]
    pub context: bool,
}

pub fn run(args: AskArgs, global: &GlobalOpts) -> Result<()> {
    let question = args.question.join(" ");
    if question.trim().is_empty() {
        return Err(ai_error(ai::AiError::MissingInput("question")));
    }

    let ctx = Context::open(global)?;
    let context = if args.context {
        Some(workspace_context(&ctx.load_state()?))
    } else {
        None
    };

    let client = ctx.chat_client()?;
    let answer = ai::ask(&client, &question, context.as_deref()).map_err(ai_error)?;
    println!("{}", answer);
    Ok(())
}

/// Plain-text digest of the user's records for grounding an answer
fn workspace_context(state: &AppState) -> String {
    let mut out = String::new();

    for bowler in state.bowlers() {
        out.push_str(&format!("Bowler \"{}\"", bowler.name));
        if let Some(group) = &bowler.group {
            out.push_str(&format!(" (group {})", group));
        }
        out.push('\n');
        for metric in &bowler.metrics {
            let s = MetricSummary::from_metric(metric);
            out.push_str(&format!(
                "- {} [{}]: latest actual {}, target {}, mean {:.2}, Cpk {}, met {}/{} months\n",
                s.name,
                s.rule,
                s.latest_actual.as_deref().unwrap_or("-"),
                s.latest_target.as_deref().unwrap_or("-"),
                s.statistics.mean,
                s.cpk,
                s.months_met,
                s.months_evaluated
            ));
        }
    }

    for case in state.a3_cases() {
        out.push_str(&format!("A3 \"{}\" ({}, {})", case.title, case.status, case.priority));
        if !case.problem_statement.is_empty() {
            out.push_str(&format!(": {}", case.problem_statement));
        }
        out.push('\n');
        if !case.root_cause.is_empty() {
            out.push_str(&format!("  root cause: {}\n", case.root_cause));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::a3::A3Case;
    use crate::entities::bowler::Bowler;
    use crate::entities::metric::{Metric, TargetRule};

    #[test]
    fn test_workspace_context_lists_records() {
        let mut state = AppState::new("alice");
        let mut bowler = Bowler::new("alice", "Plant 1").with_group("Ops");
        let mut metric = Metric::new("OTD", TargetRule::Gte);
        metric.set_month("2026-01", Some("93"), Some("95"));
        bowler.metrics.push(metric);
        state.add_bowler(bowler);

        let mut case = A3Case::new("alice", "Late shipments");
        case.problem_statement = "OTD below 95%".to_string();
        state.add_a3(case);

        let text = workspace_context(&state);
        assert!(text.contains("Bowler \"Plant 1\" (group Ops)"));
        assert!(text.contains("- OTD [gte]: latest actual 93, target 95"));
        assert!(text.contains("A3 \"Late shipments\""));
        assert!(text.contains("OTD below 95%"));
    }

    #[test]
    fn test_workspace_context_empty() {
        assert!(workspace_context(&AppState::new("alice")).is_empty());
    }
}
