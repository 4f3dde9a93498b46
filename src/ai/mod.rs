//! Chat-completion integration
//!
//! The client only moves JSON over HTTP; prompts, reply validation and the
//! conversion of replies into records live in [`flows`].

pub mod client;
pub mod flows;
pub mod reply;

pub use client::{ChatClient, ChatError, ChatMessage, HttpChatClient, Role};
pub use flows::{
    analyze_metric, ask, check_action_plan_inputs, check_metric_inputs, check_root_cause_inputs,
    generate_action_plan, generate_root_causes, AiError, MetricAnalysis,
};
pub use reply::{parse_structured, strip_code_fences, StructuredReply};
