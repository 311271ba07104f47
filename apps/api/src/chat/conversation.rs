//! Normalization of client-supplied conversation history.
//!
//! Clients echo back whatever the previous response carried, including
//! provider continuation ids and UI metadata. Upstream rejects stale
//! metadata outright, so only `role` and text survive.

use serde_json::Value;

use crate::llm_client::{ChatMessage, Role};

/// Older turns beyond this are dropped before the model call.
pub const MAX_HISTORY_MESSAGES: usize = 20;

fn parse_role(value: &Value) -> Option<Role> {
    match value.get("role")?.as_str()? {
        "user" => Some(Role::User),
        "assistant" => Some(Role::Assistant),
        _ => None,
    }
}

/// Text of a message given either a plain `content` string or a list of
/// typed parts (`content` or `parts`), where only `text` parts count.
fn extract_text(value: &Value) -> Option<String> {
    if let Some(text) = value.get("content").and_then(Value::as_str) {
        return Some(text.to_string());
    }

    let parts = value
        .get("parts")
        .or_else(|| value.get("content"))
        .and_then(Value::as_array)?;
    let text: Vec<&str> = parts
        .iter()
        .filter(|p| p.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    (!text.is_empty()).then(|| text.join(""))
}

/// Strips everything but role and text, drops system/tool turns and empty
/// messages, merges consecutive same-role turns, and trims the history so
/// it starts with a user turn and ends at the last one.
pub fn normalize_conversation(raw: &[Value]) -> Vec<ChatMessage> {
    let mut messages: Vec<ChatMessage> = Vec::new();

    for value in raw {
        let Some(role) = parse_role(value) else {
            continue;
        };
        let Some(text) = extract_text(value) else {
            continue;
        };
        let text = text.trim();
        if text.is_empty() {
            continue;
        }

        match messages.last_mut() {
            Some(prev) if prev.role == role => {
                prev.content.push_str("\n\n");
                prev.content.push_str(text);
            }
            _ => messages.push(ChatMessage {
                role,
                content: text.to_string(),
            }),
        }
    }

    if let Some(last_user) = messages.iter().rposition(|m| m.role == Role::User) {
        messages.truncate(last_user + 1);
    } else {
        return Vec::new();
    }

    if messages.len() > MAX_HISTORY_MESSAGES {
        messages.drain(..messages.len() - MAX_HISTORY_MESSAGES);
    }
    let first_user = messages
        .iter()
        .position(|m| m.role == Role::User)
        .unwrap_or(0);
    messages.drain(..first_user);

    messages
}

/// The question being asked: the final user turn.
pub fn last_user_utterance(messages: &[ChatMessage]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.as_str())
}
