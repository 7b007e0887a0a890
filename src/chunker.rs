//! Sentence/paragraph-aware sliding-window chunker.

/// Splits `text` into chunks of at most `chunk_size` characters, carrying
/// roughly `overlap` characters of trailing context into the next chunk.
///
/// Break points are searched for, in order of preference: the last `". "`
/// at or past the halfway point of the window, else the last newline past
/// halfway, else the last space, else a hard cut at the window end. Empty
/// (post-trim) chunks are dropped.
#[must_use]
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();
    if len == 0 {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;

    loop {
        let remaining = len - start;
        if remaining <= chunk_size {
            push_trimmed(&mut chunks, &chars[start..len]);
            break;
        }

        let window_end = start + chunk_size;
        let halfway = start + chunk_size / 2;

        let break_point = find_sentence_break(&chars, start, window_end, halfway)
            .or_else(|| find_newline_break(&chars, start, window_end, halfway))
            .or_else(|| find_space_break(&chars, start, window_end))
            .unwrap_or(window_end.saturating_sub(1));

        push_trimmed(&mut chunks, &chars[start..=break_point.min(len - 1)]);

        let next_start = (break_point + 1).saturating_sub(overlap);
        // Overlap shorter than the window guarantees break_point + 1 > start,
        // so next_start can only fail to advance if overlap >= chunk_size;
        // fall back to the hard cut to keep the loop terminating.
        start = if next_start > start {
            next_start
        } else {
            break_point + 1
        };
    }

    chunks
}

fn find_sentence_break(
    chars: &[char],
    start: usize,
    window_end: usize,
    halfway: usize,
) -> Option<usize> {
    let end = window_end.min(chars.len());
    let mut i = end;
    while i > start {
        i -= 1;
        if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1] == ' ' && i >= halfway {
            return Some(i + 1);
        }
    }
    None
}

fn find_newline_break(
    chars: &[char],
    start: usize,
    window_end: usize,
    halfway: usize,
) -> Option<usize> {
    let end = window_end.min(chars.len());
    let mut i = end;
    while i > start {
        i -= 1;
        if chars[i] == '\n' && i >= halfway {
            return Some(i);
        }
    }
    None
}

fn find_space_break(chars: &[char], start: usize, window_end: usize) -> Option<usize> {
    let end = window_end.min(chars.len());
    let mut i = end;
    while i > start {
        i -= 1;
        if chars[i] == ' ' {
            return Some(i);
        }
    }
    None
}

fn push_trimmed(chunks: &mut Vec<String>, slice: &[char]) {
    let s: String = slice.iter().collect();
    let trimmed = s.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_yields_no_chunks() {
        assert!(chunk_text("", 1600, 320).is_empty());
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = chunk_text("hello world", 1600, 320);
        assert_eq!(chunks, vec!["hello world".to_string()]);
    }

    #[test]
    fn no_chunk_exceeds_chunk_size() {
        let text = "word ".repeat(2000);
        let chunks = chunk_text(&text, 1600, 320);
        assert!(chunks.iter().all(|c| c.chars().count() <= 1600));
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| !c.is_empty()));
    }

    #[test]
    fn prefers_sentence_boundary_when_available() {
        let first = "a".repeat(900);
        let second = "b".repeat(900);
        let text = format!("{first}. {second}");
        let chunks = chunk_text(&text, 1000, 100);
        assert!(chunks[0].ends_with('.'));
    }

    #[test]
    fn chunks_cover_the_original_text() {
        let text = "Sentence one here. Sentence two here. Sentence three here. ".repeat(60);
        let chunks = chunk_text(&text, 200, 40);
        // Every chunk is non-empty and within bounds; overlap means we can't
        // assert exact concatenation equals original, but content from the
        // start and the end of the source must appear in the output.
        assert!(!chunks.is_empty());
        assert!(chunks.iter().all(|c| c.chars().count() <= 200));
        assert!(text.trim().starts_with(chunks[0].chars().take(10).collect::<String>().as_str()));
    }
}
