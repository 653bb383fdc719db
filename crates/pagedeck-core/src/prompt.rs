/// Default upper bound on the page text sent to the model, in characters.
pub const MAX_SNIPPET_CHARS: usize = 5000;

const CARD_SCHEMA_SAMPLE: &str = r#"[
    {"front": "What does X do?", "back": "X does <b>Y</b>.", "tags": ["topic"]}
]"#;

/// Cut `text` down to its first `max_chars` characters.
///
/// Counts `char`s, not bytes, so multi-byte text is never split mid-codepoint.
pub fn truncate_snippet(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

pub fn build_prompt(snippet: &str) -> String {
    format!(
        r#"
<task>
You are an Anki flashcard expert. Summarize the content below and extract its core knowledge points as flashcards.
</task>

<format>
Output must be strict JSON: either a JSON array of cards, or an object of the form {{"cards": [...]}}.
No markdown, no commentary.

Card fields:
- "front": the question (required)
- "back": the answer, HTML allowed (required)
- "tags": array of tag strings (optional)

Example:
{schema}
</format>

<content>
{snippet}
</content>
"#,
        schema = CARD_SCHEMA_SAMPLE,
        snippet = snippet
    )
}
