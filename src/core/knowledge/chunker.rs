/// Split text into fixed-size chunks with the configured overlap between
/// consecutive chunks. Sizes are in characters so multi-byte content never
/// splits mid-character.
pub fn split_text(content: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    if content.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = content.chars().collect();
    let step = chunk_size.saturating_sub(overlap).max(1);

    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }

    chunks
}
