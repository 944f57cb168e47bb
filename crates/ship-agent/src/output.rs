//! Model output cleaning

/// Strip a markdown code fence wrapped around the model's answer.
///
/// When the text contains a fence, everything from the end of the first line
/// up to the last fence is kept. Text without a fence is only trimmed.
pub fn clean_llm_output(raw: &str) -> String {
    if raw.contains("```") {
        let start = raw.find('\n').map(|i| i + 1).unwrap_or(0);
        if let Some(end) = raw.rfind("```") {
            if end > start {
                return raw[start..end].trim().to_string();
            }
        }
    }
    raw.trim().to_string()
}
