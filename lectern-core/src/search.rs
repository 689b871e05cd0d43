use crate::{NormalizedRect, PageRef};

/// Character range of a match within its page's text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextSpan {
    pub start: usize,
    pub len: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchMatch {
    pub page: PageRef,
    pub span: TextSpan,
    pub rects: Vec<NormalizedRect>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum SearchState {
    #[default]
    Idle,
    NoResults {
        query: String,
    },
    Results {
        query: String,
        matches: Vec<SearchMatch>,
        current: usize,
    },
}

/// Rectangles to paint on one page: the focused match and every other one.
#[derive(Debug, Clone, Default)]
pub struct SearchHighlights {
    pub current: Vec<NormalizedRect>,
    pub others: Vec<NormalizedRect>,
}

impl SearchHighlights {
    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.others.is_empty()
    }
}

impl SearchState {
    pub fn from_matches(query: &str, matches: Vec<SearchMatch>) -> Self {
        if matches.is_empty() {
            SearchState::NoResults {
                query: query.to_string(),
            }
        } else {
            SearchState::Results {
                query: query.to_string(),
                matches,
                current: 0,
            }
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self, SearchState::Idle)
    }

    pub fn query(&self) -> Option<&str> {
        match self {
            SearchState::Idle => None,
            SearchState::NoResults { query } | SearchState::Results { query, .. } => Some(query),
        }
    }

    pub fn current(&self) -> Option<&SearchMatch> {
        match self {
            SearchState::Results {
                matches, current, ..
            } => matches.get(*current),
            _ => None,
        }
    }

    pub fn match_count(&self) -> usize {
        match self {
            SearchState::Results { matches, .. } => matches.len(),
            _ => 0,
        }
    }

    /// Moves the focused match by `delta`, wrapping at both ends.
    pub fn step(&mut self, delta: isize) -> Option<&SearchMatch> {
        match self {
            SearchState::Results {
                matches, current, ..
            } => {
                let len = matches.len() as isize;
                let next = (*current as isize + delta).rem_euclid(len);
                *current = next as usize;
                matches.get(*current)
            }
            _ => None,
        }
    }

    /// Popover label for the current state; `None` when idle.
    pub fn summary(&self, document_name: Option<&str>, width: usize) -> Option<String> {
        match self {
            SearchState::Idle => None,
            SearchState::NoResults { query } => Some(format!(
                "Nothing like \"{}\" found in {}",
                shorten_query(query, width),
                document_name.unwrap_or("the current document")
            )),
            SearchState::Results {
                matches, current, ..
            } => Some(format!("{} of {} found", current + 1, matches.len())),
        }
    }

    pub fn highlights_for(&self, page: PageRef) -> SearchHighlights {
        let mut highlights = SearchHighlights::default();
        if let SearchState::Results {
            matches, current, ..
        } = self
        {
            for (index, found) in matches.iter().enumerate() {
                if found.page != page {
                    continue;
                }
                if index == *current {
                    highlights.current.extend(found.rects.iter().copied());
                } else {
                    highlights.others.extend(found.rects.iter().copied());
                }
            }
        }
        highlights
    }
}

/// Shortens `query` to `width - 3` characters plus an ellipsis once it exceeds `width`.
pub fn shorten_query(query: &str, width: usize) -> String {
    if query.chars().count() <= width {
        return query.to_string();
    }
    let mut shortened: String = query.chars().take(width.saturating_sub(3)).collect();
    shortened.push_str("...");
    shortened
}

/// Non-overlapping occurrences of `needle` in `haystack`, in character offsets.
pub fn find_spans(haystack: &str, needle: &str, case_insensitive: bool) -> Vec<TextSpan> {
    let fold = |c: char| {
        if case_insensitive {
            c.to_lowercase().next().unwrap_or(c)
        } else {
            c
        }
    };
    let hay: Vec<char> = haystack.chars().map(fold).collect();
    let pattern: Vec<char> = needle.chars().map(fold).collect();
    if pattern.is_empty() || pattern.len() > hay.len() {
        return Vec::new();
    }

    let mut spans = Vec::new();
    let mut start = 0;
    while start + pattern.len() <= hay.len() {
        if hay[start..start + pattern.len()] == pattern[..] {
            spans.push(TextSpan {
                start,
                len: pattern.len(),
            });
            start += pattern.len();
        } else {
            start += 1;
        }
    }
    spans
}
