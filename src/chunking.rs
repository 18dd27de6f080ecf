use std::str::SplitWhitespace;

/// Number of words per chunk
pub const CHUNK_WORDS: usize = 500;

/// Lazy iterator over fixed-size, non-overlapping word windows of a text.
///
/// Words are whitespace-delimited and re-joined with a single space, so a
/// chunk never contains a newline and can be stored as one line of text.
/// The final chunk may be shorter than the window.
pub struct WordChunks<'a> {
    words: SplitWhitespace<'a>,
    window: usize,
}

impl<'a> Iterator for WordChunks<'a> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let mut chunk = String::new();
        for word in self.words.by_ref().take(self.window) {
            if !chunk.is_empty() {
                chunk.push(' ');
            }
            chunk.push_str(word);
        }

        if chunk.is_empty() {
            None
        } else {
            Some(chunk)
        }
    }
}

/// Split text into chunks of [`CHUNK_WORDS`] words
pub fn split_into_chunks(text: &str) -> WordChunks<'_> {
    split_into_windows(text, CHUNK_WORDS)
}

/// Split text into chunks of `window` words. A zero window is treated as one.
pub fn split_into_windows(text: &str, window: usize) -> WordChunks<'_> {
    WordChunks {
        words: text.split_whitespace(),
        window: window.max(1),
    }
}
