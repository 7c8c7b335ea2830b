//! crates/nexus_chat_core/src/chunking.rs
//!
//! Splits extracted text into overlapping windows before they are embedded.

/// Window and overlap sizes, in characters.
#[derive(Debug, Clone, Copy)]
pub struct ChunkingOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingOptions {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Splits `text` into overlapping chunks, preferring to break after a full stop
/// and otherwise at a space, as long as the break falls in the second half of the window.
pub fn chunk_text(text: &str, options: ChunkingOptions) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = options.chunk_size.max(1);
    let overlap = options.chunk_overlap.min(size / 2);

    if chars.len() <= size {
        let trimmed = text.trim();
        return if trimmed.is_empty() {
            Vec::new()
        } else {
            vec![trimmed.to_string()]
        };
    }

    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let mut end = (start + size).min(chars.len());

        if end < chars.len() {
            let half = start + size / 2;
            if let Some(dot) = rfind(&chars[start..end], '.').map(|i| start + i) {
                if dot > half {
                    end = dot + 1;
                } else if let Some(space) = rfind(&chars[start..end], ' ').map(|i| start + i) {
                    if space > half {
                        end = space;
                    }
                }
            } else if let Some(space) = rfind(&chars[start..end], ' ').map(|i| start + i) {
                if space > half {
                    end = space;
                }
            }
        }

        let chunk: String = chars[start..end].iter().collect();
        let chunk = chunk.trim();
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }

        if end >= chars.len() {
            break;
        }
        start = end - overlap;
    }

    chunks
}

fn rfind(window: &[char], needle: char) -> Option<usize> {
    window.iter().rposition(|c| *c == needle)
}
