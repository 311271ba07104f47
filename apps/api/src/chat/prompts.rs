use chrono::NaiveDate;

use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, SCOPE_INSTRUCTION};

/// System prompt for the ranch assistant with retrieved diary context.
/// `context` is the composer output, or its sentinel when nothing matched.
pub fn chat_system_prompt(context: &str, today: NaiveDate) -> String {
    format!(
        r#"You are a ranch management assistant. You help a rancher recall and reason about what they recorded in their field diary.

{SCOPE_INSTRUCTION}

{GROUNDING_INSTRUCTION}

Today's date is {today}. Answer concisely in plain language. When you refer to an entry, mention its date.

RELEVANT DIARY ENTRIES:
{context}"#,
        today = today.format("%Y-%m-%d"),
    )
}
