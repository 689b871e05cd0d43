use std::collections::HashSet;
use std::path::Path;

use crate::document::Lecture;
use crate::{DocumentId, PageRef};

/// Item of the lecture tree: documents are roots, pages are their leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutlineNode {
    Document(DocumentId),
    Page(PageRef),
}

impl OutlineNode {
    pub fn document(&self) -> DocumentId {
        match self {
            OutlineNode::Document(id) => *id,
            OutlineNode::Page(page) => page.document,
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self, OutlineNode::Document(_))
    }
}

/// Queries a tree widget makes against its model.
pub trait OutlineDataSource {
    type Item;

    /// Children of `parent`, or of the root when `parent` is `None`.
    fn child_count(&self, parent: Option<&Self::Item>) -> usize;
    fn child(&self, parent: Option<&Self::Item>, index: usize) -> Option<Self::Item>;
    fn is_expandable(&self, item: &Self::Item) -> bool;
}

/// A visible row of the lecture tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutlineRow {
    pub node: OutlineNode,
    pub depth: usize,
}

/// Open lectures in the order they were opened, with the tree's expansion and
/// selection state.
#[derive(Debug, Default)]
pub struct LectureOutline {
    lectures: Vec<Lecture>,
    expanded: HashSet<DocumentId>,
    selected: Option<OutlineNode>,
}

impl LectureOutline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lectures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lectures.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Lecture> {
        self.lectures.iter()
    }

    /// Adds `lecture` at the end. Callers check for an already open path first.
    pub fn append(&mut self, lecture: Lecture) {
        self.lectures.push(lecture);
    }

    /// Removes the lecture with `id`, dropping its expansion state and any selection
    /// inside it.
    pub fn delete(&mut self, id: DocumentId) -> Option<Lecture> {
        let index = self.position(id)?;
        let lecture = self.lectures.remove(index);
        self.expanded.remove(&id);
        if self.selected.map(|node| node.document()) == Some(id) {
            self.selected = None;
        }
        Some(lecture)
    }

    pub fn position(&self, id: DocumentId) -> Option<usize> {
        self.lectures.iter().position(|lecture| lecture.id() == id)
    }

    pub fn get(&self, id: DocumentId) -> Option<&Lecture> {
        self.lectures.iter().find(|lecture| lecture.id() == id)
    }

    pub fn get_by_url(&self, path: &Path) -> Option<&Lecture> {
        self.lectures.iter().find(|lecture| lecture.info.path == path)
    }

    /// The lecture `offset` places away from `id`, if both exist.
    pub fn get_relative(&self, id: DocumentId, offset: isize) -> Option<&Lecture> {
        let index = self.position(id)?;
        let target = index.checked_add_signed(offset)?;
        self.lectures.get(target)
    }

    /// Whether `node` names a lecture or page that is currently open.
    pub fn contains(&self, node: &OutlineNode) -> bool {
        match node {
            OutlineNode::Document(id) => self.get(*id).is_some(),
            OutlineNode::Page(page) => self
                .get(page.document)
                .and_then(|lecture| lecture.page(page.number))
                .is_some(),
        }
    }

    pub fn expand(&mut self, id: DocumentId) -> bool {
        if self.get(id).is_none() {
            return false;
        }
        self.expanded.insert(id)
    }

    pub fn collapse(&mut self, id: DocumentId) -> bool {
        self.expanded.remove(&id)
    }

    pub fn is_expanded(&self, id: DocumentId) -> bool {
        self.expanded.contains(&id)
    }

    pub fn selected(&self) -> Option<OutlineNode> {
        self.selected
    }

    /// Records `node` as selected and reports whether the selection changed.
    pub(crate) fn select(&mut self, node: OutlineNode) -> bool {
        if self.selected == Some(node) {
            return false;
        }
        self.selected = Some(node);
        true
    }

    pub(crate) fn clear_selection(&mut self) {
        self.selected = None;
    }

    /// The rows a tree widget shows given the current expansion state.
    pub fn rows(&self) -> Vec<OutlineRow> {
        let mut rows = Vec::new();
        for lecture in &self.lectures {
            rows.push(OutlineRow {
                node: OutlineNode::Document(lecture.id()),
                depth: 0,
            });
            if self.is_expanded(lecture.id()) {
                rows.extend(lecture.pages().map(|page| OutlineRow {
                    node: OutlineNode::Page(page),
                    depth: 1,
                }));
            }
        }
        rows
    }

    pub fn row_of(&self, node: &OutlineNode) -> Option<usize> {
        self.rows().iter().position(|row| row.node == *node)
    }

    pub fn selected_row(&self) -> Option<usize> {
        self.selected.and_then(|node| self.row_of(&node))
    }
}

impl OutlineDataSource for LectureOutline {
    type Item = OutlineNode;

    fn child_count(&self, parent: Option<&OutlineNode>) -> usize {
        match parent {
            None => self.lectures.len(),
            Some(OutlineNode::Document(id)) => {
                self.get(*id).map(|lecture| lecture.page_count()).unwrap_or(0)
            }
            Some(OutlineNode::Page(_)) => 0,
        }
    }

    fn child(&self, parent: Option<&OutlineNode>, index: usize) -> Option<OutlineNode> {
        match parent {
            None => self
                .lectures
                .get(index)
                .map(|lecture| OutlineNode::Document(lecture.id())),
            Some(OutlineNode::Document(id)) => self
                .get(*id)?
                .page(index + 1)
                .map(OutlineNode::Page),
            Some(OutlineNode::Page(_)) => None,
        }
    }

    fn is_expandable(&self, item: &OutlineNode) -> bool {
        match item {
            OutlineNode::Document(id) => self.child_count(Some(&OutlineNode::Document(*id))) > 0,
            OutlineNode::Page(_) => false,
        }
    }
}
