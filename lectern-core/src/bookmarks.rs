use std::fmt;

use crate::outline::OutlineDataSource;
use crate::{DocumentId, PageRef};

/// Session-unique bookmark identity. Ids are handed out in increasing order and are
/// never reused after a delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BookmarkId(u64);

impl BookmarkId {
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BookmarkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub id: BookmarkId,
    pub name: String,
    pub page: PageRef,
}

#[derive(Debug, Default)]
pub struct BookmarkList {
    bookmarks: Vec<Bookmark>,
    last_id: u64,
}

impl BookmarkList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the next id.
    pub fn allocate_id(&mut self) -> BookmarkId {
        self.last_id += 1;
        BookmarkId(self.last_id)
    }

    pub fn add(&mut self, bookmark: Bookmark) {
        self.last_id = self.last_id.max(bookmark.id.0);
        self.bookmarks.push(bookmark);
    }

    pub fn delete(&mut self, id: BookmarkId) -> Option<Bookmark> {
        let index = self.position(id)?;
        Some(self.bookmarks.remove(index))
    }

    /// Drops every bookmark pointing into `document`, returning how many went.
    pub fn delete_all_for(&mut self, document: DocumentId) -> usize {
        let before = self.bookmarks.len();
        self.bookmarks.retain(|bookmark| bookmark.page.document != document);
        before - self.bookmarks.len()
    }

    pub fn find_by_name(&self, name: &str) -> Option<&Bookmark> {
        self.bookmarks.iter().find(|bookmark| bookmark.name == name)
    }

    pub fn get(&self, id: BookmarkId) -> Option<&Bookmark> {
        self.bookmarks.iter().find(|bookmark| bookmark.id == id)
    }

    pub fn rename(&mut self, id: BookmarkId, name: impl Into<String>) -> bool {
        match self.bookmarks.iter_mut().find(|bookmark| bookmark.id == id) {
            Some(bookmark) => {
                bookmark.name = name.into();
                true
            }
            None => false,
        }
    }

    pub fn position(&self, id: BookmarkId) -> Option<usize> {
        self.bookmarks.iter().position(|bookmark| bookmark.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bookmark> {
        self.bookmarks.iter()
    }

    pub fn len(&self) -> usize {
        self.bookmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bookmarks.is_empty()
    }
}

impl OutlineDataSource for BookmarkList {
    type Item = BookmarkId;

    fn child_count(&self, parent: Option<&BookmarkId>) -> usize {
        match parent {
            None => self.bookmarks.len(),
            Some(_) => 0,
        }
    }

    fn child(&self, parent: Option<&BookmarkId>, index: usize) -> Option<BookmarkId> {
        match parent {
            None => self.bookmarks.get(index).map(|bookmark| bookmark.id),
            Some(_) => None,
        }
    }

    fn is_expandable(&self, _item: &BookmarkId) -> bool {
        false
    }
}
