//! Code block extraction from model replies
//!
//! Fallback chain: first fence tagged with the target language, then the
//! first fence of any kind, then the whole reply. Always yields a string.

const FENCE: &str = "```";

/// Pull the most likely code block for `language` out of `text`.
pub fn extract_code_block(text: &str, language: &str) -> String {
    let tagged = format!("{}{}", FENCE, language);
    if !language.is_empty() {
        if let Some(start) = find_tagged_fence(text, &tagged) {
            return block_from(text, start + tagged.len(), false);
        }
    }

    if let Some(start) = text.find(FENCE) {
        return block_from(text, start + FENCE.len(), true);
    }

    text.trim().to_string()
}

/// Position of a fence tagged exactly `tagged` (so `csharp` doesn't match
/// a fence tagged `csharpx`).
fn find_tagged_fence(text: &str, tagged: &str) -> Option<usize> {
    let mut offset = 0;
    while let Some(pos) = text[offset..].find(tagged) {
        let start = offset + pos;
        let after = &text[start + tagged.len()..];
        let boundary = after
            .chars()
            .next()
            .map(|c| c.is_whitespace())
            .unwrap_or(true);
        if boundary {
            return Some(start);
        }
        offset = start + tagged.len();
    }
    None
}

/// Content from `body_start` up to the next fence (or end of text), trimmed.
fn block_from(text: &str, body_start: usize, skip_info_string: bool) -> String {
    let mut body = &text[body_start..];

    if skip_info_string {
        if let Some(newline) = body.find('\n') {
            let info = body[..newline].trim();
            if !info.is_empty() && !info.contains(char::is_whitespace) && !info.contains('`') {
                body = &body[newline + 1..];
            }
        }
    }

    let end = body.find(FENCE).unwrap_or(body.len());
    body[..end].trim().to_string()
}
