//! Structured generation flows
//!
//! Each flow checks its required inputs before touching the network, sends a
//! single chat request, then validates the reply. Nothing here mutates a
//! record; callers apply the result through the application state.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::ai::client::{ChatClient, ChatError, ChatMessage};
use crate::ai::reply::{parse_structured, strip_code_fences, StructuredReply};
use crate::core::cause_tree::{build_cause_tree, extract_why_tree, CauseNode, CauseTreeError};
use crate::core::stats::MetricSummary;
use crate::core::trend::TrendLabel;
use crate::entities::a3::{A3Case, ActionItem};
use crate::entities::metric::Metric;

const ANALYST_SYSTEM_PROMPT: &str = "You are a lean manufacturing and six-sigma performance analyst. \
When asked for JSON, reply with JSON only and no commentary.";

const COACH_SYSTEM_PROMPT: &str = "You are an experienced A3 problem-solving coach. \
When asked for JSON, reply with JSON only and no commentary.";

/// Errors from the generation flows
#[derive(Debug, Error)]
pub enum AiError {
    #[error("Missing required input: {0}")]
    MissingInput(&'static str),

    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error(transparent)]
    Tree(#[from] CauseTreeError),

    #[error("AI did not return a valid {0}")]
    Malformed(&'static str),
}

impl AiError {
    pub fn is_retryable(&self) -> bool {
        match self {
            AiError::MissingInput(_) => false,
            AiError::Chat(e) => e.is_retryable(),
            AiError::Tree(_) | AiError::Malformed(_) => true,
        }
    }
}

// =========================================================================
// Metric analysis
// =========================================================================

#[derive(Debug, Default, Deserialize)]
struct AnalysisReply {
    #[serde(default)]
    trend: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    suggestions: Vec<String>,
}

/// Statistics plus the narrative and trend label from the chat call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricAnalysis {
    #[serde(flatten)]
    pub summary: MetricSummary,

    pub trend: TrendLabel,

    pub narrative: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

fn metric_analysis_prompt(metric: &Metric, summary: &MetricSummary) -> String {
    let mut prompt = format!(
        "Analyze the monthly performance of the metric \"{}\".\n",
        metric.name
    );
    if !metric.definition.is_empty() {
        prompt.push_str(&format!("Definition: {}\n", metric.definition));
    }
    prompt.push_str(&format!(
        "Target meeting rule: {} ({}).\n",
        metric.target_meeting_rule,
        metric.attribute
    ));

    prompt.push_str("Monthly data (month: actual / target):\n");
    for (month, entry) in &metric.monthly_data {
        prompt.push_str(&format!("- {}: {} / {}\n", month, entry.actual, entry.target));
    }

    let stats = &summary.statistics;
    prompt.push_str(&format!(
        "Statistics: mean={:.3}, stdDev={:.3}, min={}, max={}, n={}, Cpk={}.\n",
        stats.mean, stats.std_dev, stats.min, stats.max, stats.count, summary.cpk
    ));

    let labels: Vec<String> = TrendLabel::all().iter().map(|l| l.to_string()).collect();
    prompt.push_str(&format!(
        "Reply as JSON: {{\"trend\": one of [{}], \"summary\": \"2-4 sentence assessment\", \
         \"suggestions\": [\"short improvement idea\", ...]}}",
        labels.join(", ")
    ));
    prompt
}

/// Inputs `analyze_metric` needs before any chat call
pub fn check_metric_inputs(metric: &Metric) -> Result<(), AiError> {
    if metric.actual_values().is_empty() {
        return Err(AiError::MissingInput("metric has no actual values"));
    }
    Ok(())
}

/// Summarize a metric and ask for a trend label and narrative
pub fn analyze_metric<C: ChatClient + ?Sized>(
    client: &C,
    metric: &Metric,
) -> Result<MetricAnalysis, AiError> {
    check_metric_inputs(metric)?;

    let summary = MetricSummary::from_metric(metric);
    let messages = [
        ChatMessage::system(ANALYST_SYSTEM_PROMPT),
        ChatMessage::user(metric_analysis_prompt(metric, &summary)),
    ];
    let reply = client.complete(&messages)?;

    let (trend, narrative, suggestions) = match parse_structured::<AnalysisReply>(&reply) {
        StructuredReply::Parsed(parsed) => (
            TrendLabel::from_reply(parsed.trend.as_deref()),
            parsed.summary.unwrap_or_default(),
            parsed.suggestions,
        ),
        StructuredReply::Malformed { reason, raw } => {
            warn!("Metric analysis reply was not JSON ({}); keeping it as narrative", reason);
            (TrendLabel::default(), raw, Vec::new())
        }
    };

    Ok(MetricAnalysis {
        summary,
        trend,
        narrative,
        suggestions,
    })
}

// =========================================================================
// Root-cause (5 Whys) generation
// =========================================================================

fn root_cause_prompt(case: &A3Case) -> String {
    let mut prompt = format!(
        "Perform a 5 Whys root-cause analysis for this problem.\nProblem statement: {}\n",
        case.problem_statement
    );
    if !case.observations.is_empty() {
        prompt.push_str(&format!("Observations: {}\n", case.observations));
    }
    if !case.data_analysis.is_empty() {
        prompt.push_str(&format!("Data analysis: {}\n", case.data_analysis));
    }
    prompt.push_str(
        "Reply as JSON: {\"whyTree\": [{\"cause\": \"direct cause\", \"children\": \
         [{\"cause\": \"deeper cause\", \"children\": [...]}]}]}. \
         Give 2-4 direct causes and go at most 5 levels deep.",
    );
    prompt
}

pub fn check_root_cause_inputs(case: &A3Case) -> Result<(), AiError> {
    if case.problem_statement.trim().is_empty() {
        return Err(AiError::MissingInput("problem statement"));
    }
    Ok(())
}

/// Generate a fresh mind map for the case's problem statement
pub fn generate_root_causes<C: ChatClient + ?Sized>(
    client: &C,
    case: &A3Case,
) -> Result<Vec<CauseNode>, AiError> {
    check_root_cause_inputs(case)?;

    let messages = [
        ChatMessage::system(COACH_SYSTEM_PROMPT),
        ChatMessage::user(root_cause_prompt(case)),
    ];
    let reply = client.complete(&messages)?;

    let why_tree = extract_why_tree(&reply);
    let nodes = build_cause_tree(case.problem_statement.trim(), &why_tree)?;
    Ok(nodes)
}

// =========================================================================
// Action plan generation
// =========================================================================

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlanReply {
    Wrapped { actions: Vec<PlanAction> },
    Bare(Vec<PlanAction>),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlanAction {
    #[serde(default)]
    task: String,
    #[serde(default)]
    owner: Option<String>,
    #[serde(default)]
    due_in_days: Option<i64>,
}

fn action_plan_prompt(case: &A3Case) -> String {
    let mut prompt = format!(
        "Draft a troubleshooting and countermeasure plan.\nProblem statement: {}\nRoot cause: {}\n",
        case.problem_statement, case.root_cause
    );
    if !case.observations.is_empty() {
        prompt.push_str(&format!("Observations: {}\n", case.observations));
    }
    prompt.push_str(
        "Reply as JSON: {\"actions\": [{\"task\": \"specific action\", \"owner\": \"role\", \
         \"dueInDays\": 14}]}. Give 3-7 actions ordered by priority.",
    );
    prompt
}

pub fn check_action_plan_inputs(case: &A3Case) -> Result<(), AiError> {
    check_root_cause_inputs(case)?;
    if case.root_cause.trim().is_empty() {
        return Err(AiError::MissingInput("root cause"));
    }
    Ok(())
}

/// Draft action items from the problem statement and root cause
///
/// Due dates are resolved relative to `today`.
pub fn generate_action_plan<C: ChatClient + ?Sized>(
    client: &C,
    case: &A3Case,
    today: NaiveDate,
) -> Result<Vec<ActionItem>, AiError> {
    check_action_plan_inputs(case)?;

    let messages = [
        ChatMessage::system(COACH_SYSTEM_PROMPT),
        ChatMessage::user(action_plan_prompt(case)),
    ];
    let reply = client.complete(&messages)?;

    let actions = match parse_structured::<PlanReply>(&reply) {
        StructuredReply::Parsed(PlanReply::Wrapped { actions })
        | StructuredReply::Parsed(PlanReply::Bare(actions)) => actions,
        StructuredReply::Malformed { reason, .. } => {
            warn!("Action plan reply was not valid JSON: {}", reason);
            Vec::new()
        }
    };

    let items: Vec<ActionItem> = actions
        .into_iter()
        .filter(|a| !a.task.trim().is_empty())
        .map(|a| {
            let mut item = ActionItem::new(a.task.trim());
            item.owner = a.owner.unwrap_or_default();
            item.due = a
                .due_in_days
                .filter(|d| *d >= 0)
                .map(|d| today + Duration::days(d));
            item
        })
        .collect();

    if items.is_empty() {
        return Err(AiError::Malformed("action plan"));
    }
    Ok(items)
}

// =========================================================================
// Free-form Q&A
// =========================================================================

/// Ask a free-form question, optionally grounded in workspace context
pub fn ask<C: ChatClient + ?Sized>(
    client: &C,
    question: &str,
    context: Option<&str>,
) -> Result<String, AiError> {
    if question.trim().is_empty() {
        return Err(AiError::MissingInput("question"));
    }

    let mut messages = vec![ChatMessage::system(ANALYST_SYSTEM_PROMPT)];
    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        messages.push(ChatMessage::system(format!(
            "Context from the user's bowlers and A3 cases:\n{}",
            context
        )));
    }
    messages.push(ChatMessage::user(question.trim()));

    let reply = client.complete(&messages)?;
    Ok(strip_code_fences(&reply))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::metric::TargetRule;
    use std::cell::RefCell;

    /// Replays canned replies and records what it was sent
    struct ScriptedClient {
        replies: RefCell<Vec<Result<String, ChatError>>>,
        sent: RefCell<Vec<Vec<ChatMessage>>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<&str>) -> Self {
            Self {
                replies: RefCell::new(replies.into_iter().map(|r| Ok(r.to_string())).collect()),
                sent: RefCell::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                replies: RefCell::new(vec![Err(ChatError::EmptyResponse)]),
                sent: RefCell::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.sent.borrow().len()
        }
    }

    impl ChatClient for ScriptedClient {
        fn complete(&self, messages: &[ChatMessage]) -> Result<String, ChatError> {
            self.sent.borrow_mut().push(messages.to_vec());
            self.replies.borrow_mut().remove(0)
        }
    }

    fn metric_with_data() -> Metric {
        let mut metric = Metric::new("OTD", TargetRule::Gte);
        metric.set_month("2024-01", Some("10"), Some("5"));
        metric.set_month("2024-02", Some("20"), Some("5"));
        metric.set_month("2024-03", Some("30"), Some("5"));
        metric
    }

    fn case_with_problem() -> A3Case {
        let mut case = A3Case::new("alice", "Late shipments");
        case.problem_statement = "OTD dropped to 80%".to_string();
        case
    }

    #[test]
    fn test_analyze_metric_parses_label() {
        let client = ScriptedClient::new(vec![
            "```json\n{\"trend\": \"improving\", \"summary\": \"Up and to the right\", \"suggestions\": [\"keep going\"]}\n```",
        ]);
        let analysis = analyze_metric(&client, &metric_with_data()).unwrap();
        assert_eq!(analysis.trend, TrendLabel::Improving);
        assert_eq!(analysis.narrative, "Up and to the right");
        assert_eq!(analysis.suggestions, vec!["keep going"]);
        assert_eq!(analysis.summary.statistics.mean, 20.0);

        let prompt = &client.sent.borrow()[0][1].content;
        assert!(prompt.contains("2024-02: 20 / 5"));
    }

    #[test]
    fn test_analyze_metric_unknown_label_defaults_stable() {
        let client = ScriptedClient::new(vec!["{\"trend\": \"stellar\", \"summary\": \"ok\"}"]);
        let analysis = analyze_metric(&client, &metric_with_data()).unwrap();
        assert_eq!(analysis.trend, TrendLabel::Stable);
    }

    #[test]
    fn test_analyze_metric_plain_text_reply_kept_as_narrative() {
        let client = ScriptedClient::new(vec!["Looks fine to me."]);
        let analysis = analyze_metric(&client, &metric_with_data()).unwrap();
        assert_eq!(analysis.trend, TrendLabel::Stable);
        assert_eq!(analysis.narrative, "Looks fine to me.");
    }

    #[test]
    fn test_analyze_metric_without_actuals_skips_network() {
        let client = ScriptedClient::new(vec![]);
        let metric = Metric::new("Empty", TargetRule::Gte);
        assert!(matches!(
            analyze_metric(&client, &metric),
            Err(AiError::MissingInput(_))
        ));
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn test_generate_root_causes_builds_tree() {
        let client = ScriptedClient::new(vec![
            "{\"whyTree\": [{\"cause\": \"Carrier late\", \"children\": [{\"cause\": \"No backup carrier\"}]}]}",
        ]);
        let nodes = generate_root_causes(&client, &case_with_problem()).unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0].text, "OTD dropped to 80%");
    }

    #[test]
    fn test_generate_root_causes_malformed_is_invalid_tree() {
        let client = ScriptedClient::new(vec!["Sorry, I can't help with that."]);
        let err = generate_root_causes(&client, &case_with_problem()).unwrap_err();
        assert!(matches!(err, AiError::Tree(CauseTreeError::InvalidTree)));
        assert_eq!(err.to_string(), "AI did not return a valid tree");
    }

    #[test]
    fn test_generate_root_causes_requires_problem_statement() {
        let client = ScriptedClient::new(vec![]);
        let case = A3Case::new("alice", "Empty");
        assert!(matches!(
            generate_root_causes(&client, &case),
            Err(AiError::MissingInput("problem statement"))
        ));
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn test_generate_action_plan() {
        let client = ScriptedClient::new(vec![
            "{\"actions\": [{\"task\": \"Qualify backup carrier\", \"owner\": \"Logistics\", \"dueInDays\": 14}, {\"task\": \"\"}]}",
        ]);
        let mut case = case_with_problem();
        case.root_cause = "Single carrier".to_string();
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();

        let items = generate_action_plan(&client, &case, today).unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].owner, "Logistics");
        assert_eq!(items[0].due, NaiveDate::from_ymd_opt(2024, 1, 15));
    }

    #[test]
    fn test_generate_action_plan_accepts_bare_array() {
        let client = ScriptedClient::new(vec!["[{\"task\": \"Audit\"}]"]);
        let mut case = case_with_problem();
        case.root_cause = "x".to_string();
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let items = generate_action_plan(&client, &case, today).unwrap();
        assert_eq!(items[0].task, "Audit");
        assert!(items[0].due.is_none());
    }

    #[test]
    fn test_generate_action_plan_requires_root_cause() {
        let client = ScriptedClient::new(vec![]);
        let today = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(matches!(
            generate_action_plan(&client, &case_with_problem(), today),
            Err(AiError::MissingInput("root cause"))
        ));
        assert_eq!(client.calls(), 0);
    }

    #[test]
    fn test_ask_includes_context_and_surfaces_errors() {
        let client = ScriptedClient::new(vec!["Answer"]);
        let answer = ask(&client, "What is Cpk?", Some("Bowler: Plant KPIs")).unwrap();
        assert_eq!(answer, "Answer");
        assert_eq!(client.sent.borrow()[0].len(), 3);

        let failing = ScriptedClient::failing();
        let err = ask(&failing, "Hello?", None).unwrap_err();
        assert!(err.is_retryable());
        assert!(matches!(ask(&failing, "   ", None), Err(AiError::MissingInput(_))));
    }
}
