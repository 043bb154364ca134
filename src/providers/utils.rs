use anyhow::{anyhow, Result};
use serde::de::DeserializeOwned;

/// Parses a JSON object out of a chat reply.
///
/// Models like to wrap JSON in Markdown fences or add a sentence before it,
/// so the reply is stripped down to the outermost `{ ... }` first.
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Result<T> {
    let cleaned = reply
        .trim()
        .trim_matches('`')
        .trim_start_matches("json")
        .trim_start_matches("JSON")
        .trim();

    let candidate = match (cleaned.find('{'), cleaned.rfind('}')) {
        (Some(start), Some(end)) if start < end => &cleaned[start..=end],
        _ => cleaned,
    };

    serde_json::from_str(candidate)
        .map_err(|e| anyhow!("Failed to parse model reply as JSON ({}): {}", e, reply))
}
