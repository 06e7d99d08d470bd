//! Splitting transcripts into overlapping, size-bounded chunks for embedding.
//!
//! Lengths are measured in characters, not bytes. Chunks end at a sentence or
//! word boundary close to the size limit where one exists; each chunk after the
//! first starts exactly `overlap` characters before the previous one ended.

/// Default maximum chunk length in characters.
pub const DEFAULT_MAX_LEN: usize = 1000;

/// Default overlap between adjacent chunks in characters.
pub const DEFAULT_OVERLAP: usize = 200;

/// Character-based text splitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSplitter {
    max_len: usize,
    overlap: usize,
}

impl TextSplitter {
    /// Create a splitter. `max_len` is at least 1 and `overlap` is kept below it.
    pub fn new(max_len: usize, overlap: usize) -> Self {
        let max_len = max_len.max(1);
        Self {
            max_len,
            overlap: overlap.min(max_len - 1),
        }
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// How far back from the hard limit to look for a boundary.
    fn lookback(&self) -> usize {
        (self.max_len / 4).max(1)
    }

    /// Split `text` into ordered chunks.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.max_len {
            return vec![text.to_string()];
        }

        let mut chunks = Vec::new();
        let mut start = 0;

        loop {
            let hard_end = (start + self.max_len).min(chars.len());
            if hard_end == chars.len() {
                chunks.push(chars[start..].iter().collect());
                break;
            }

            let end = self.find_break(&chars, start, hard_end);
            chunks.push(chars[start..end].iter().collect());
            start = end - self.overlap;
        }

        chunks
    }

    /// Pick the end (exclusive) of the chunk starting at `start`.
    ///
    /// The result is always greater than `start + overlap`, so the next chunk
    /// begins strictly after this one.
    fn find_break(&self, chars: &[char], start: usize, hard_end: usize) -> usize {
        let floor = (start + self.overlap + 1).max(hard_end.saturating_sub(self.lookback()));
        if floor >= hard_end {
            return hard_end;
        }

        // Sentence end: terminal punctuation followed by whitespace.
        for p in (floor..hard_end).rev() {
            if matches!(chars[p], '.' | '!' | '?') && chars[p + 1].is_whitespace() {
                return p + 1;
            }
        }

        // Word boundary: cut just before a whitespace character.
        for p in (floor..=hard_end).rev() {
            if chars[p].is_whitespace() {
                return p;
            }
        }

        hard_end
    }
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LEN, DEFAULT_OVERLAP)
    }
}

/// Split `text` into chunks of at most `max_len` characters overlapping by `overlap`.
pub fn split(text: &str, max_len: usize, overlap: usize) -> Vec<String> {
    TextSplitter::new(max_len, overlap).split(text)
}
