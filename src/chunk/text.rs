//! Text chunking for provider request limits.
//!
//! All lengths are counted in `char`s, not bytes, so limits hold for
//! non-Latin scripts (a Bengali character is three UTF-8 bytes).

/// Characters that end a sentence in the scripts we translate into.
///
/// Includes the Devanagari/Bengali danda and double danda, and the
/// full-width forms used by CJK text.
pub const SENTENCE_TERMINATORS: &[char] = &['.', '!', '?', '\u{0964}', '\u{0965}', '。', '！', '？'];

/// Splits `text` into chunks of at most `max_length` characters on word boundaries.
///
/// Each split happens at the rightmost whitespace at or before `max_length`.
/// A word longer than `max_length` is force-split at exactly `max_length`.
/// Chunks are trimmed and never empty; empty or whitespace-only input yields
/// no chunks.
pub fn chunk_text(text: &str, max_length: usize) -> Vec<String> {
    let max_length = max_length.max(1);
    let mut chunks = Vec::new();
    let mut rest = text.trim();

    while let Some(boundary) = byte_offset_of_char(rest, max_length) {
        // Include the character at `max_length` so a space right at the limit
        // still counts as a word boundary.
        let window_end = boundary + rest[boundary..].chars().next().map_or(0, char::len_utf8);
        let split = rest[..window_end]
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map(|(i, _)| i)
            .filter(|&i| i > 0)
            .unwrap_or(boundary);

        chunks.push(rest[..split].trim_end().to_string());
        rest = rest[split..].trim_start();
    }

    if !rest.is_empty() {
        chunks.push(rest.to_string());
    }

    chunks
}

/// Splits `text` into chunks of at most `max_length` characters, preferring
/// sentence boundaries.
///
/// Whole sentences are packed greedily into a chunk. A sentence that alone
/// exceeds the limit falls back to [`chunk_text`]; its last piece stays open
/// so following sentences can join it. Sentence terminators stay attached to
/// their sentence.
pub fn chunk_sentences(text: &str, max_length: usize) -> Vec<String> {
    let max_length = max_length.max(1);
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= max_length {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in split_sentences(text) {
        let sentence_len = sentence.chars().count();

        if sentence_len > max_length {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let mut pieces = chunk_text(sentence, max_length);
            if let Some(last) = pieces.pop() {
                chunks.extend(pieces);
                current_len = last.chars().count();
                current = last;
            }
            continue;
        }

        if current.is_empty() {
            current.push_str(sentence);
            current_len = sentence_len;
        } else if current_len + 1 + sentence_len > max_length {
            chunks.push(std::mem::take(&mut current));
            current.push_str(sentence);
            current_len = sentence_len;
        } else {
            current.push(' ');
            current.push_str(sentence);
            current_len += 1 + sentence_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Splits text after each run of sentence terminators. Returned sentences are
/// trimmed and non-empty.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !SENTENCE_TERMINATORS.contains(&c) {
            continue;
        }
        let next_is_terminator = chars
            .peek()
            .is_some_and(|(_, next)| SENTENCE_TERMINATORS.contains(next));
        if next_is_terminator {
            continue;
        }
        let end = i + c.len_utf8();
        let sentence = text[start..end].trim();
        if !sentence.is_empty() {
            sentences.push(sentence);
        }
        start = end;
    }

    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail);
    }

    sentences
}

/// Byte offset of the `n`-th character, or `None` if the text has `n` or
/// fewer characters.
fn byte_offset_of_char(text: &str, n: usize) -> Option<usize> {
    text.char_indices().nth(n).map(|(i, _)| i)
}
