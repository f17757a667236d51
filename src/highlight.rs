//! Case-insensitive search over the displayed text.
//!
//! Offsets are UTF-8 byte offsets into the haystack and always fall on char
//! boundaries, so spans can be used to slice the text directly.

use std::ops::Range;

/// A half-open `[start, end)` range denoting a search hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
}

impl MatchSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// All hits of one search, in ascending order of `start`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Matches {
    spans: Vec<MatchSpan>,
}

impl Matches {
    /// Start offset of the first hit, used to place the caret.
    pub fn first_start(&self) -> Option<usize> {
        self.spans.first().map(|span| span.start)
    }

    pub fn spans(&self) -> &[MatchSpan] {
        &self.spans
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MatchSpan> {
        self.spans.iter()
    }

    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }
}

impl<'a> IntoIterator for &'a Matches {
    type Item = &'a MatchSpan;
    type IntoIter = std::slice::Iter<'a, MatchSpan>;

    fn into_iter(self) -> Self::IntoIter {
        self.spans.iter()
    }
}

/// Finds every case-insensitive occurrence of `needle` in `haystack`.
///
/// The scan is greedy left-to-right and resumes at the end of each hit, so
/// spans never overlap. An empty needle matches nothing.
pub fn find_matches(haystack: &str, needle: &str) -> Matches {
    let folded: Vec<char> = needle.chars().flat_map(char::to_lowercase).collect();
    if folded.is_empty() {
        return Matches::default();
    }

    let mut spans = Vec::new();
    let mut pos = 0;
    while pos < haystack.len() {
        match match_len_at(&haystack[pos..], &folded) {
            Some(len) => {
                spans.push(MatchSpan::new(pos, pos + len));
                pos += len;
            }
            None => {
                // Advance by one char to stay on a boundary
                pos += haystack[pos..].chars().next().map_or(1, char::len_utf8);
            }
        }
    }

    Matches { spans }
}

/// Byte length of the prefix of `rest` whose lowercase form equals `folded`.
///
/// A haystack char whose lowercase expansion only partially overlaps the
/// needle's end is not a match.
fn match_len_at(rest: &str, folded: &[char]) -> Option<usize> {
    let mut matched = 0;
    for (offset, ch) in rest.char_indices() {
        for lower in ch.to_lowercase() {
            if matched == folded.len() || folded[matched] != lower {
                return None;
            }
            matched += 1;
        }
        if matched == folded.len() {
            return Some(offset + ch.len_utf8());
        }
    }
    None
}
