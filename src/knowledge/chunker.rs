//! Paragraph chunking for ingested documents.

/// Upper bound of a packed chunk, in chars. A single longer paragraph
/// still becomes one chunk.
pub const MAX_CHUNK_CHARS: usize = 1000;

/// Packs blank-line separated paragraphs into chunks of at most
/// `max_chars`. Never splits a paragraph; returns the whole content as one
/// chunk when there are no non-empty paragraphs.
pub fn chunk_content(content: &str, max_chars: usize) -> Vec<String> {
    let normalized = content.replace("\r\n", "\n");
    let mut chunks = Vec::new();
    let mut current = String::new();

    for paragraph in normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
    {
        let current_len = current.chars().count();
        if !current.is_empty() && current_len + paragraph.chars().count() > max_chars {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push_str("\n\n");
        }
        current.push_str(paragraph);
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    if chunks.is_empty() {
        vec![content.to_string()]
    } else {
        chunks
    }
}

/// Rough token estimate: four chars per token, rounded up.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(4)
}
