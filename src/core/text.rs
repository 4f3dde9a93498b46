//! Text cleanup for model replies

/// Remove Markdown code-fence markers (```` ```json ```` and ```` ``` ````)
pub fn strip_code_fences(text: &str) -> String {
    let mut cleaned = String::with_capacity(text.len());
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some(tag) = trimmed.strip_prefix("```") {
            // Whole-line fence, possibly with a language tag
            if tag.chars().all(|c| c.is_ascii_alphanumeric()) {
                continue;
            }
        }
        cleaned.push_str(line);
        cleaned.push('\n');
    }
    cleaned
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
        .to_string()
}
