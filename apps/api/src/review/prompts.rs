// Prompt constants for the weekly review.

use crate::llm_client::prompts::GROUNDING_INSTRUCTION;

/// System prompt for weekly summaries. JSON-only.
pub const WEEKLY_REVIEW_SYSTEM: &str = "You are a ranch operations analyst writing a weekly \
    review of a rancher's field diary. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences around the JSON.";

/// Replace `{week_start}`, `{week_end}` and `{entries}` before sending.
pub const WEEKLY_REVIEW_PROMPT_TEMPLATE: &str = r#"Summarize the ranch diary for {week_start} through {week_end}.

Return a JSON object with this EXACT schema:
{"summary_md": "<markdown summary>"}

The markdown summary should have these sections, omitting any with nothing to report:
## Highlights
## Grazing & Pastures
## Herd Health
## Weather & Water
## Follow-ups

Keep it under 300 words. Use bullet points.

{grounding}

DIARY ENTRIES:
{entries}"#;

pub fn weekly_review_prompt(week_start: &str, week_end: &str, entries: &str) -> String {
    WEEKLY_REVIEW_PROMPT_TEMPLATE
        .replace("{week_start}", week_start)
        .replace("{week_end}", week_end)
        .replace("{grounding}", GROUNDING_INSTRUCTION)
        .replace("{entries}", entries)
}
