//! Separator-based tokenization of filenames.
//!
//! A filename is cut into tokens by applying each separator in turn to every
//! fragment produced so far. Each token keeps its byte span in the original
//! string so that any contiguous run of tokens can be mapped back to the exact
//! substring it covers, separators included.
//!
//! # Examples
//!
//! ```
//! use runfiler::tokenizer::{Span, split_with_separators};
//!
//! let tokenized = split_with_separators("A_B_C_D", &["_"]);
//! assert_eq!(tokenized.tokens(), vec!["A", "B", "C", "D"]);
//! assert_eq!(tokenized.spans()[1], Span::new(2, 3));
//! ```

use serde::Serialize;

/// A half-open byte range `[start, end)` into a tokenized string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// A string together with the spans of its non-empty tokens.
///
/// This is an immutable value: changing the separators means producing a new
/// `Tokenized`, never mutating an existing one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tokenized {
    text: String,
    spans: Vec<Span>,
}

impl Tokenized {
    /// The original, unsplit string.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Token spans in left-to-right order.
    pub fn spans(&self) -> &[Span] {
        &self.spans
    }

    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Token strings in left-to-right order.
    pub fn tokens(&self) -> Vec<&str> {
        self.spans.iter().map(|span| &self.text[span.start..span.end]).collect()
    }

    /// The substring covering tokens `first..=last`, separators included.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of range or `first > last`.
    pub fn slice_tokens(&self, first: usize, last: usize) -> &str {
        &self.text[self.spans[first].start..self.spans[last].end]
    }
}

/// Splits `text` with every non-empty separator, in order.
///
/// For each separator, every current fragment is cut at all of the
/// separator's non-overlapping occurrences inside that fragment. Zero-length
/// pieces are dropped. Empty separators are ignored; with no usable separator
/// the whole string is a single token (or no token if `text` is empty).
pub fn split_with_separators<S: AsRef<str>>(text: &str, separators: &[S]) -> Tokenized {
    let mut fragments = if text.is_empty() {
        Vec::new()
    } else {
        vec![Span::new(0, text.len())]
    };

    for separator in separators.iter().map(AsRef::as_ref) {
        if separator.is_empty() {
            continue;
        }

        let mut next = Vec::with_capacity(fragments.len());
        for fragment in &fragments {
            let mut piece_start = fragment.start;
            for (offset, _) in text[fragment.start..fragment.end].match_indices(separator) {
                let piece_end = fragment.start + offset;
                if piece_end > piece_start {
                    next.push(Span::new(piece_start, piece_end));
                }
                piece_start = piece_end + separator.len();
            }
            if fragment.end > piece_start {
                next.push(Span::new(piece_start, fragment.end));
            }
        }
        fragments = next;
    }

    Tokenized {
        text: text.to_string(),
        spans: fragments,
    }
}
