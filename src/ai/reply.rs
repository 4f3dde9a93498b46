//! Chat reply post-processing
//!
//! Structured flows ask the model for JSON, but replies often come wrapped in
//! Markdown code fences or not as JSON at all. [`parse_structured`] makes the
//! malformed case an explicit variant instead of an error.

use serde::de::DeserializeOwned;

pub use crate::core::text::strip_code_fences;

/// Outcome of decoding a structured reply
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredReply<T> {
    Parsed(T),
    Malformed { reason: String, raw: String },
}

/// Strip fences and decode the reply as `T`
pub fn parse_structured<T: DeserializeOwned>(reply: &str) -> StructuredReply<T> {
    let cleaned = strip_code_fences(reply);
    match serde_json::from_str::<T>(&cleaned) {
        Ok(value) => StructuredReply::Parsed(value),
        Err(e) => StructuredReply::Malformed {
            reason: e.to_string(),
            raw: cleaned,
        },
    }
}
