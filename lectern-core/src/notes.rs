use std::collections::HashMap;
use std::ops::Range;
use std::path::{Path, PathBuf};

use crate::DocumentInfo;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
}

impl TextStyle {
    pub const PLAIN: TextStyle = TextStyle {
        bold: false,
        italic: false,
        underline: false,
    };

    pub fn is_plain(&self) -> bool {
        *self == Self::PLAIN
    }
}

/// A run of text sharing one style; `range` is in bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleSpan {
    pub range: Range<usize>,
    pub style: TextStyle,
}

/// Text with formatting spans. The spans tile the text exactly, in order, and no two
/// neighbours share a style.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RichText {
    text: String,
    spans: Vec<StyleSpan>,
}

impl RichText {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_plain(text: &str) -> Self {
        let mut rich = Self::new();
        rich.push_str(text, TextStyle::PLAIN);
        rich
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn spans(&self) -> &[StyleSpan] {
        &self.spans
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn push_str(&mut self, text: &str, style: TextStyle) {
        if text.is_empty() {
            return;
        }
        let start = self.text.len();
        self.text.push_str(text);
        let end = self.text.len();
        match self.spans.last_mut() {
            Some(last) if last.style == style => last.range.end = end,
            _ => self.spans.push(StyleSpan {
                range: start..end,
                style,
            }),
        }
    }

    pub fn push(&mut self, c: char, style: TextStyle) {
        let mut buf = [0u8; 4];
        self.push_str(c.encode_utf8(&mut buf), style);
    }

    /// Removes the last character, shrinking or dropping its span.
    pub fn pop(&mut self) -> Option<char> {
        let c = self.text.pop()?;
        let end = self.text.len();
        if let Some(last) = self.spans.last_mut() {
            last.range.end = end;
            if last.range.is_empty() {
                self.spans.pop();
            }
        }
        Some(c)
    }

    /// Style of the character starting at byte `offset`.
    pub fn style_at(&self, offset: usize) -> Option<TextStyle> {
        self.spans
            .iter()
            .find(|span| span.range.contains(&offset))
            .map(|span| span.style)
    }

    /// Style that newly typed text continues with.
    pub fn trailing_style(&self) -> TextStyle {
        self.spans
            .last()
            .map(|span| span.style)
            .unwrap_or(TextStyle::PLAIN)
    }

    pub fn segments(&self) -> impl Iterator<Item = (&str, TextStyle)> + '_ {
        self.spans
            .iter()
            .map(move |span| (&self.text[span.range.clone()], span.style))
    }
}

impl From<&str> for RichText {
    fn from(text: &str) -> Self {
        RichText::from_plain(text)
    }
}

/// Identifies a note: a page of a document, or the whole document as page 0.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NoteKey {
    pub document: PathBuf,
    pub page: usize,
}

impl NoteKey {
    pub const DOCUMENT_PAGE: usize = 0;

    pub fn new(document: &Path, page: usize) -> Self {
        Self {
            document: document.to_path_buf(),
            page,
        }
    }

    pub fn for_document(info: &DocumentInfo) -> Self {
        Self::new(&info.path, Self::DOCUMENT_PAGE)
    }

    pub fn for_page(info: &DocumentInfo, number: usize) -> Self {
        Self::new(&info.path, number)
    }

    pub fn is_document_note(&self) -> bool {
        self.page == Self::DOCUMENT_PAGE
    }
}

/// One rich-text note per key; writes replace.
///
/// Closing a lecture does not remove its notes, so reopening the same file within the
/// session brings them back.
#[derive(Debug, Default)]
pub struct NoteStore {
    notes: HashMap<NoteKey, RichText>,
}

impl NoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: NoteKey, text: RichText) {
        self.notes.insert(key, text);
    }

    pub fn get(&self, key: &NoteKey) -> RichText {
        self.notes.get(key).cloned().unwrap_or_default()
    }

    pub fn contains(&self, key: &NoteKey) -> bool {
        self.notes.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fake_info;

    #[test]
    fn unset_key_reads_as_empty() {
        let store = NoteStore::new();
        let key = NoteKey::new(Path::new("/tmp/a.pdf"), 2);

        assert!(store.get(&key).is_empty());
        assert!(!store.contains(&key));
    }

    #[test]
    fn writes_overwrite_instead_of_appending() {
        let mut store = NoteStore::new();
        let key = NoteKey::new(Path::new("/tmp/a.pdf"), 2);

        store.set(key.clone(), RichText::from_plain("hello"));
        assert_eq!(store.get(&key).as_str(), "hello");

        store.set(key.clone(), RichText::from_plain("world"));
        assert_eq!(store.get(&key).as_str(), "world");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn document_and_page_notes_are_distinct() {
        let info = fake_info("/tmp/distinct.pdf", 3);
        let mut store = NoteStore::new();

        store.set(NoteKey::for_document(&info), "whole".into());
        store.set(NoteKey::for_page(&info, 1), "first".into());

        assert!(NoteKey::for_document(&info).is_document_note());
        assert_eq!(store.get(&NoteKey::for_document(&info)).as_str(), "whole");
        assert_eq!(store.get(&NoteKey::for_page(&info, 1)).as_str(), "first");
        assert_eq!(
            NoteKey::for_page(&info, 1),
            NoteKey::new(Path::new("/tmp/distinct.pdf"), 1)
        );
    }

    #[test]
    fn rich_text_merges_equal_styles_and_splits_others() {
        let bold = TextStyle {
            bold: true,
            ..TextStyle::PLAIN
        };
        let mut text = RichText::new();
        text.push_str("ab", TextStyle::PLAIN);
        text.push('c', TextStyle::PLAIN);
        text.push_str("dé", bold);

        assert_eq!(text.as_str(), "abcdé");
        assert_eq!(text.spans().len(), 2);
        assert_eq!(text.spans()[0].range, 0..3);
        assert_eq!(text.spans()[1].range, 3..6);
        assert_eq!(text.style_at(3), Some(bold));
        assert_eq!(text.trailing_style(), bold);

        let segments: Vec<_> = text.segments().map(|(s, _)| s).collect();
        assert_eq!(segments, vec!["abc", "dé"]);
    }

    #[test]
    fn pop_shrinks_then_drops_the_last_span() {
        let bold = TextStyle {
            bold: true,
            ..TextStyle::PLAIN
        };
        let mut text = RichText::from_plain("a");
        text.push('é', bold);

        assert_eq!(text.pop(), Some('é'));
        assert_eq!(text.spans().len(), 1);
        assert_eq!(text.trailing_style(), TextStyle::PLAIN);
        assert_eq!(text.pop(), Some('a'));
        assert!(text.spans().is_empty());
        assert_eq!(text.pop(), None);
    }
}
