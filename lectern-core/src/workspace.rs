use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use crate::bookmarks::{Bookmark, BookmarkId, BookmarkList};
use crate::config::ViewerConfig;
use crate::document::Lecture;
use crate::error::LecternError;
use crate::mirror::{MirrorFrame, MirrorId, MirrorSet, PresentationMirror};
use crate::notes::{NoteKey, NoteStore, RichText};
use crate::outline::{LectureOutline, OutlineNode};
use crate::search::{SearchMatch, SearchState};
use crate::{resolve_document_path, DocumentId, DocumentProvider, PageRef};

const DEFAULT_TITLE: &str = "Lectern";

/// What the window is currently showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    NoDocument,
    DocumentActive(DocumentId),
    PageActive(PageRef),
}

impl Selection {
    pub fn document(&self) -> Option<DocumentId> {
        match self {
            Selection::NoDocument => None,
            Selection::DocumentActive(id) => Some(*id),
            Selection::PageActive(page) => Some(page.document),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenOutcome {
    Opened(DocumentId),
    /// The path was already open; its entry was selected instead.
    AlreadyOpen(DocumentId),
}

impl OpenOutcome {
    pub fn id(&self) -> DocumentId {
        match self {
            OpenOutcome::Opened(id) | OpenOutcome::AlreadyOpen(id) => *id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WorkspaceEvent {
    DocumentOpened(DocumentId),
    DocumentClosed(DocumentId),
    SelectionChanged(Selection),
    NoteLoaded,
    BookmarksChanged,
    SearchUpdated,
    MirrorsChanged,
}

/// Navigation commands. Every one of them resolves to an outline selection.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    NextItem,
    PreviousItem,
    NextLecture,
    PreviousLecture,
    /// Moves the tree cursor over visible rows without expanding anything.
    MoveRow { delta: isize },
    ScrollPages { delta: isize },
    GotoPage { number: usize },
    LastPage,
    Expand,
    Collapse,
    CloseSelectedLecture,
    AddBookmark,
    MoveBookmarkCursor { delta: isize },
    ActivateSelectedBookmark,
    DeleteSelectedBookmark,
    Search { query: String },
    SearchNext { count: usize },
    SearchPrev { count: usize },
}

/// Window decoration derived from the current state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowChrome {
    pub title: String,
    pub toolbar_title: Option<String>,
    pub search_placeholder: Option<String>,
    pub note_placeholder: Option<String>,
    pub toolbar_visible: bool,
    pub search_visible: bool,
    pub bookmarks_visible: bool,
}

/// Which controls the front end should offer right now.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Affordances {
    pub can_next_item: bool,
    pub can_previous_item: bool,
    pub can_next_lecture: bool,
    pub can_previous_lecture: bool,
    pub can_close_lecture: bool,
    pub can_present: bool,
    pub can_bookmark: bool,
    pub can_delete_bookmark: bool,
}

/// One lecture-set window: the outline, bookmarks and notes, and the selection state
/// that keeps the page view, the note box and the presentation mirrors in step.
pub struct Workspace {
    config: Arc<ViewerConfig>,
    outline: LectureOutline,
    bookmarks: BookmarkList,
    notes: NoteStore,
    selection: Selection,
    current_page: Option<PageRef>,
    note_buffer: RichText,
    search: SearchState,
    text_selection: Option<SearchMatch>,
    bookmark_cursor: Option<BookmarkId>,
    mirrors: MirrorSet,
    events: Vec<WorkspaceEvent>,
}

impl Workspace {
    pub fn new(config: Arc<ViewerConfig>) -> Self {
        Self {
            config,
            outline: LectureOutline::new(),
            bookmarks: BookmarkList::new(),
            notes: NoteStore::new(),
            selection: Selection::NoDocument,
            current_page: None,
            note_buffer: RichText::new(),
            search: SearchState::Idle,
            text_selection: None,
            bookmark_cursor: None,
            mirrors: MirrorSet::new(),
            events: Vec::new(),
        }
    }

    pub fn outline(&self) -> &LectureOutline {
        &self.outline
    }

    pub fn bookmarks(&self) -> &BookmarkList {
        &self.bookmarks
    }

    pub fn notes(&self) -> &NoteStore {
        &self.notes
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// The page the view is on; for an active document this is its first page.
    pub fn current_page(&self) -> Option<PageRef> {
        self.current_page
    }

    pub fn active_lecture(&self) -> Option<&Lecture> {
        self.selection
            .document()
            .and_then(|id| self.outline.get(id))
    }

    pub fn note(&self) -> &RichText {
        &self.note_buffer
    }

    pub fn search(&self) -> &SearchState {
        &self.search
    }

    pub fn text_selection(&self) -> Option<&SearchMatch> {
        self.text_selection.as_ref()
    }

    pub fn selected_bookmark(&self) -> Option<BookmarkId> {
        self.bookmark_cursor
    }

    pub fn mirror_count(&self) -> usize {
        self.mirrors.len()
    }

    pub fn mirror_ids(&self) -> Vec<MirrorId> {
        self.mirrors.ids()
    }

    pub fn drain_events(&mut self) -> Vec<WorkspaceEvent> {
        std::mem::take(&mut self.events)
    }

    /// Opens `path`, or selects it if it is already open.
    #[instrument(skip(self, provider))]
    pub async fn open_with<P>(
        &mut self,
        provider: &P,
        path: &Path,
    ) -> Result<OpenOutcome, LecternError>
    where
        P: DocumentProvider + ?Sized,
    {
        if !has_pdf_extension(path) {
            return Err(LecternError::UnsupportedFile {
                path: path.to_path_buf(),
            });
        }

        let resolved = resolve_document_path(path);
        if let Some(id) = self.outline.get_by_url(&resolved).map(Lecture::id) {
            debug!("already open, selecting existing entry");
            self.select_outline_item(OutlineNode::Document(id));
            return Ok(OpenOutcome::AlreadyOpen(id));
        }

        let backend = provider
            .open(&resolved)
            .await
            .map_err(|err| LecternError::open(&resolved, err))?;
        let lecture = Lecture::new(backend);
        let id = lecture.id();
        if let Some(existing) = self.outline.get_by_url(&lecture.info.path).map(Lecture::id) {
            self.select_outline_item(OutlineNode::Document(existing));
            return Ok(OpenOutcome::AlreadyOpen(existing));
        }

        info!(pages = lecture.page_count(), "opened lecture");
        self.outline.append(lecture);
        self.events.push(WorkspaceEvent::DocumentOpened(id));
        self.select_outline_item(OutlineNode::Document(id));
        Ok(OpenOutcome::Opened(id))
    }

    /// Opens each path in turn. A failure is logged and does not stop the rest.
    pub async fn open_all<P>(
        &mut self,
        provider: &P,
        paths: &[PathBuf],
    ) -> Vec<Result<OpenOutcome, LecternError>>
    where
        P: DocumentProvider + ?Sized,
    {
        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths {
            let outcome = self.open_with(provider, path).await;
            if let Err(err) = &outcome {
                warn!(?err, path = %path.display(), "skipping lecture");
            }
            outcomes.push(outcome);
        }
        outcomes
    }

    /// The single entry point that changes the selected outline item. Returns whether
    /// the selection changed; items that are not open are ignored.
    pub fn select_outline_item(&mut self, node: OutlineNode) -> bool {
        if !self.outline.contains(&node) {
            debug!(?node, "ignoring selection of an item that is not open");
            return false;
        }
        if let OutlineNode::Page(page) = node {
            self.outline.expand(page.document);
        }
        if !self.outline.select(node) {
            return false;
        }
        self.on_selection_changed(node);
        true
    }

    fn on_selection_changed(&mut self, node: OutlineNode) {
        let previous_document = self.selection.document();
        let Some(lecture) = self.outline.get(node.document()) else {
            return;
        };
        let (selection, page, key) = match node {
            OutlineNode::Document(id) => (
                Selection::DocumentActive(id),
                lecture.first_page(),
                NoteKey::for_document(&lecture.info),
            ),
            OutlineNode::Page(page) => (
                Selection::PageActive(page),
                Some(page),
                NoteKey::for_page(&lecture.info, page.number),
            ),
        };

        self.selection = selection;
        self.current_page = page;
        self.note_buffer = self.notes.get(&key);
        self.text_selection = None;
        if previous_document != Some(node.document()) && self.search.is_active() {
            self.search = SearchState::Idle;
            self.events.push(WorkspaceEvent::SearchUpdated);
        }

        debug!(?selection, "selection changed");
        self.events.push(WorkspaceEvent::SelectionChanged(selection));
        self.events.push(WorkspaceEvent::NoteLoaded);
        self.broadcast_current_page();
    }

    fn enter_no_document(&mut self) {
        self.selection = Selection::NoDocument;
        self.current_page = None;
        self.note_buffer = RichText::new();
        self.search = SearchState::Idle;
        self.text_selection = None;
        self.outline.clear_selection();
        self.mirrors.clear_all();
        self.events
            .push(WorkspaceEvent::SelectionChanged(Selection::NoDocument));
        self.events.push(WorkspaceEvent::NoteLoaded);
    }

    fn current_frame(&self) -> Option<MirrorFrame> {
        let page = self.current_page?;
        let lecture = self.outline.get(page.document)?;
        Some(MirrorFrame {
            page,
            title: format!(
                "Presenting {} page {}",
                lecture.info.file_name(),
                lecture.info.page_label(page.number)
            ),
            backend: Arc::clone(&lecture.backend),
        })
    }

    fn broadcast_current_page(&mut self) {
        if self.mirrors.is_empty() {
            return;
        }
        match self.current_frame() {
            Some(frame) => self.mirrors.broadcast(&frame),
            None => self.mirrors.clear_all(),
        }
    }

    /// Closes the lecture and every bookmark pointing into it. Notes are kept.
    #[instrument(skip(self))]
    pub fn close_lecture(&mut self, id: DocumentId) -> bool {
        let Some(lecture) = self.outline.delete(id) else {
            return false;
        };
        let removed = self.bookmarks.delete_all_for(id);
        if self
            .bookmark_cursor
            .is_some_and(|cursor| self.bookmarks.get(cursor).is_none())
        {
            self.bookmark_cursor = None;
        }
        info!(file = lecture.info.file_name(), bookmarks = removed, "closed lecture");
        self.events.push(WorkspaceEvent::DocumentClosed(id));
        self.events.push(WorkspaceEvent::BookmarksChanged);

        if self.selection.document() == Some(id) || self.outline.is_empty() {
            self.enter_no_document();
        }
        true
    }

    fn next_item_target(&self) -> Option<OutlineNode> {
        let selected = self.outline.selected()?;
        if let OutlineNode::Document(id) = selected {
            if !self.outline.is_expanded(id) {
                if let Some(first) = self.outline.get(id).and_then(Lecture::first_page) {
                    return Some(OutlineNode::Page(first));
                }
            }
        }
        let rows = self.outline.rows();
        let index = rows.iter().position(|row| row.node == selected)?;
        rows.get(index + 1).map(|row| row.node)
    }

    fn previous_item_target(&self) -> Option<OutlineNode> {
        let selected = self.outline.selected()?;
        let rows = self.outline.rows();
        let index = rows.iter().position(|row| row.node == selected)?;
        let previous = rows.get(index.checked_sub(1)?)?.node;
        if let OutlineNode::Document(id) = previous {
            if !self.outline.is_expanded(id) {
                if let Some(last) = self.outline.get(id).and_then(Lecture::last_page) {
                    return Some(OutlineNode::Page(last));
                }
            }
        }
        Some(previous)
    }

    /// Steps to the next row as if every lecture were expanded.
    pub fn next_item(&mut self) -> bool {
        let Some(target) = self.next_item_target() else {
            return false;
        };
        if let Some(OutlineNode::Document(id)) = self.outline.selected() {
            self.outline.expand(id);
        }
        self.select_outline_item(target)
    }

    pub fn previous_item(&mut self) -> bool {
        match self.previous_item_target() {
            Some(target) => self.select_outline_item(target),
            None => false,
        }
    }

    fn relative_lecture(&self, offset: isize) -> Option<DocumentId> {
        let current = self.selection.document()?;
        self.outline.get_relative(current, offset).map(Lecture::id)
    }

    pub fn next_lecture(&mut self) -> bool {
        match self.relative_lecture(1) {
            Some(id) => self.select_outline_item(OutlineNode::Document(id)),
            None => false,
        }
    }

    pub fn previous_lecture(&mut self) -> bool {
        match self.relative_lecture(-1) {
            Some(id) => self.select_outline_item(OutlineNode::Document(id)),
            None => false,
        }
    }

    /// Moves the tree cursor over the visible rows only.
    pub fn move_row(&mut self, delta: isize) -> bool {
        let rows = self.outline.rows();
        let target = match self.outline.selected_row() {
            Some(index) => index.checked_add_signed(delta).and_then(|i| rows.get(i)),
            None => rows.first(),
        };
        match target.map(|row| row.node) {
            Some(node) => self.select_outline_item(node),
            None => false,
        }
    }

    /// Scrolls the page view within the active lecture, clamped to its pages.
    pub fn scroll_pages(&mut self, delta: isize) -> bool {
        let Some(current) = self.current_page else {
            return false;
        };
        let Some(lecture) = self.outline.get(current.document) else {
            return false;
        };
        let last = lecture.page_count() as isize;
        let target = (current.number as isize).saturating_add(delta).clamp(1, last);
        self.goto_page(target as usize)
    }

    /// Jumps to page `number` of the active lecture, clamped to its pages.
    pub fn goto_page(&mut self, number: usize) -> bool {
        let Some(lecture) = self.active_lecture() else {
            return false;
        };
        let number = number.clamp(1, lecture.page_count().max(1));
        match lecture.page(number) {
            Some(page) => self.select_outline_item(OutlineNode::Page(page)),
            None => false,
        }
    }

    pub fn expand_selected(&mut self) -> bool {
        match self.outline.selected() {
            Some(OutlineNode::Document(id)) => self.outline.expand(id),
            _ => false,
        }
    }

    /// Collapses the selected lecture, or the lecture of the selected page, moving the
    /// selection up to the lecture.
    pub fn collapse_selected(&mut self) -> bool {
        let Some(selected) = self.outline.selected() else {
            return false;
        };
        let id = selected.document();
        let collapsed = self.outline.collapse(id);
        if !selected.is_document() {
            self.select_outline_item(OutlineNode::Document(id));
        }
        collapsed
    }

    pub fn close_selected_lecture(&mut self) -> bool {
        match self.outline.selected() {
            Some(OutlineNode::Document(id)) => self.close_lecture(id),
            _ => false,
        }
    }

    /// Stores the edit buffer as the note of the selected item.
    pub fn commit_note(&mut self, text: RichText) -> bool {
        let Some(key) = self.outline.selected().and_then(|node| self.note_key(node)) else {
            return false;
        };
        self.notes.set(key, text.clone());
        self.note_buffer = text;
        true
    }

    fn note_key(&self, node: OutlineNode) -> Option<NoteKey> {
        let lecture = self.outline.get(node.document())?;
        Some(match node {
            OutlineNode::Document(_) => NoteKey::for_document(&lecture.info),
            OutlineNode::Page(page) => NoteKey::for_page(&lecture.info, page.number),
        })
    }

    /// Bookmarks the page in view, named after its id.
    pub fn add_bookmark(&mut self) -> Option<BookmarkId> {
        let page = self.current_page?;
        let id = self.bookmarks.allocate_id();
        let name = format!("{} {}", self.config.bookmarks.name_prefix, id);
        self.bookmarks.add(Bookmark { id, name, page });
        self.bookmark_cursor = Some(id);
        self.events.push(WorkspaceEvent::BookmarksChanged);
        Some(id)
    }

    pub fn rename_bookmark(&mut self, id: BookmarkId, name: impl Into<String>) -> bool {
        let renamed = self.bookmarks.rename(id, name);
        if renamed {
            self.events.push(WorkspaceEvent::BookmarksChanged);
        }
        renamed
    }

    pub fn delete_bookmark(&mut self, id: BookmarkId) -> bool {
        let position = self.bookmarks.position(id);
        if self.bookmarks.delete(id).is_none() {
            return false;
        }
        if self.bookmark_cursor == Some(id) {
            self.bookmark_cursor = position
                .and_then(|index| {
                    self.bookmarks
                        .iter()
                        .nth(index)
                        .or_else(|| self.bookmarks.iter().last())
                })
                .map(|bookmark| bookmark.id);
        }
        self.events.push(WorkspaceEvent::BookmarksChanged);
        true
    }

    pub fn select_bookmark(&mut self, id: Option<BookmarkId>) {
        self.bookmark_cursor = id.filter(|id| self.bookmarks.get(*id).is_some());
    }

    pub fn move_bookmark_cursor(&mut self, delta: isize) -> bool {
        let target = match self.bookmark_cursor.and_then(|id| self.bookmarks.position(id)) {
            Some(index) => index.checked_add_signed(delta),
            None => Some(0),
        };
        match target.and_then(|index| self.bookmarks.iter().nth(index)) {
            Some(bookmark) => {
                self.bookmark_cursor = Some(bookmark.id);
                true
            }
            None => false,
        }
    }

    /// Jumps to the bookmarked page through the outline.
    pub fn activate_bookmark(&mut self, id: BookmarkId) -> bool {
        let Some(page) = self.bookmarks.get(id).map(|bookmark| bookmark.page) else {
            return false;
        };
        self.select_outline_item(OutlineNode::Page(page))
    }

    /// Searches the active lecture. An empty query clears the search.
    #[instrument(skip(self))]
    pub fn search_text(&mut self, query: &str) -> &SearchState {
        self.events.push(WorkspaceEvent::SearchUpdated);
        self.text_selection = None;
        if query.is_empty() {
            self.search = SearchState::Idle;
            return &self.search;
        }
        let Some(lecture) = self.active_lecture() else {
            self.search = SearchState::Idle;
            return &self.search;
        };

        let matches = match lecture
            .backend
            .find(query, self.config.search.case_insensitive)
        {
            Ok(matches) => matches,
            Err(err) => {
                warn!(?err, "search failed");
                Vec::new()
            }
        };
        debug!(count = matches.len(), "search finished");
        self.search = SearchState::from_matches(query, matches);
        if let Some(first) = self.search.current().cloned() {
            self.activate_search_match(first);
        }
        &self.search
    }

    /// Moves to another match, wrapping around.
    pub fn step_search(&mut self, delta: isize) -> bool {
        let Some(found) = self.search.step(delta).cloned() else {
            return false;
        };
        self.events.push(WorkspaceEvent::SearchUpdated);
        self.activate_search_match(found);
        true
    }

    fn activate_search_match(&mut self, found: SearchMatch) {
        self.select_outline_item(OutlineNode::Page(found.page));
        if self.current_page == Some(found.page) {
            self.text_selection = Some(found);
        }
    }

    pub fn search_summary(&self) -> Option<String> {
        let name = self.active_lecture().map(|lecture| lecture.info.file_name());
        self.search
            .summary(name, self.config.search.summary_width)
    }

    /// Attaches a presentation mirror showing the page in view.
    pub fn present(&mut self, mirror: Box<dyn PresentationMirror>) -> Option<MirrorId> {
        let frame = self.current_frame()?;
        let id = self.mirrors.attach(mirror, &frame);
        self.events.push(WorkspaceEvent::MirrorsChanged);
        Some(id)
    }

    pub fn detach_mirror(&mut self, id: MirrorId) -> bool {
        let detached = self.mirrors.detach(id);
        if detached {
            self.events.push(WorkspaceEvent::MirrorsChanged);
        }
        detached
    }

    /// Tears the window down; mirrors go first.
    pub fn close(&mut self) {
        self.mirrors.close_all();
        self.events.push(WorkspaceEvent::MirrorsChanged);
    }

    pub fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::NextItem => self.next_item(),
            Command::PreviousItem => self.previous_item(),
            Command::NextLecture => self.next_lecture(),
            Command::PreviousLecture => self.previous_lecture(),
            Command::MoveRow { delta } => self.move_row(delta),
            Command::ScrollPages { delta } => self.scroll_pages(delta),
            Command::GotoPage { number } => self.goto_page(number),
            Command::LastPage => self.goto_page(usize::MAX),
            Command::Expand => self.expand_selected(),
            Command::Collapse => self.collapse_selected(),
            Command::CloseSelectedLecture => self.close_selected_lecture(),
            Command::AddBookmark => self.add_bookmark().is_some(),
            Command::MoveBookmarkCursor { delta } => self.move_bookmark_cursor(delta),
            Command::ActivateSelectedBookmark => match self.bookmark_cursor {
                Some(id) => self.activate_bookmark(id),
                None => false,
            },
            Command::DeleteSelectedBookmark => match self.bookmark_cursor {
                Some(id) => self.delete_bookmark(id),
                None => false,
            },
            Command::Search { query } => {
                self.search_text(&query);
                true
            }
            Command::SearchNext { count } => self.step_search(count.max(1) as isize),
            Command::SearchPrev { count } => self.step_search(-(count.max(1) as isize)),
        }
    }

    pub fn chrome(&self) -> WindowChrome {
        let bookmarks_visible = !self.outline.is_empty();
        let Some(lecture) = self.active_lecture() else {
            return WindowChrome {
                title: DEFAULT_TITLE.to_string(),
                toolbar_title: None,
                search_placeholder: None,
                note_placeholder: None,
                toolbar_visible: false,
                search_visible: false,
                bookmarks_visible,
            };
        };

        let name = lecture.info.file_name();
        let toolbar_title = match self.selection {
            Selection::PageActive(page) => {
                format!("{} page {}", name, lecture.info.page_label(page.number))
            }
            _ => name.to_string(),
        };
        WindowChrome {
            title: format!("{} ({} open)", name, self.outline.len()),
            note_placeholder: Some(format!("Add some notes to {}", toolbar_title)),
            toolbar_title: Some(toolbar_title),
            search_placeholder: Some(format!("Search in {}", name)),
            toolbar_visible: true,
            search_visible: true,
            bookmarks_visible,
        }
    }

    pub fn affordances(&self) -> Affordances {
        let has_document = self.selection.document().is_some();
        Affordances {
            can_next_item: has_document && self.next_item_target().is_some(),
            can_previous_item: has_document && self.previous_item_target().is_some(),
            can_next_lecture: self.relative_lecture(1).is_some(),
            can_previous_lecture: self.relative_lecture(-1).is_some(),
            can_close_lecture: matches!(self.outline.selected(), Some(OutlineNode::Document(_))),
            can_present: has_document && self.current_page.is_some(),
            can_bookmark: self.current_page.is_some(),
            can_delete_bookmark: self.bookmark_cursor.is_some(),
        }
    }
}

fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::tests::RecordingMirror;
    use crate::outline::OutlineDataSource;
    use crate::testing::FakeProvider;
    use crate::{document_id_for_path, TextStyle};

    fn provider() -> FakeProvider {
        FakeProvider {
            pages: vec![
                ("a.pdf", vec!["intro to rust", "ownership rules", "borrowing"]),
                ("b.pdf", vec!["traits", "Rust generics"]),
                ("c.pdf", vec!["closing"]),
                ("empty.pdf", vec![]),
            ],
        }
    }

    fn workspace() -> Workspace {
        Workspace::new(Arc::new(ViewerConfig::default()))
    }

    async fn open(ws: &mut Workspace, name: &str) -> DocumentId {
        ws.open_with(&provider(), &PathBuf::from(format!("/tmp/lectern-tests/{name}")))
            .await
            .unwrap()
            .id()
    }

    fn page(document: DocumentId, number: usize) -> PageRef {
        PageRef { document, number }
    }

    #[tokio::test]
    async fn opening_selects_the_new_lecture() {
        let mut ws = workspace();
        let a = open(&mut ws, "a.pdf").await;

        assert_eq!(ws.selection(), Selection::DocumentActive(a));
        assert_eq!(ws.current_page(), Some(page(a, 1)));
        assert_eq!(ws.outline().selected(), Some(OutlineNode::Document(a)));
        let events = ws.drain_events();
        assert_eq!(events[0], WorkspaceEvent::DocumentOpened(a));
        assert!(events.contains(&WorkspaceEvent::SelectionChanged(
            Selection::DocumentActive(a)
        )));
        assert!(ws.drain_events().is_empty());
    }

    #[tokio::test]
    async fn opening_the_same_url_twice_selects_the_existing_entry() {
        let mut ws = workspace();
        let a = open(&mut ws, "a.pdf").await;
        open(&mut ws, "b.pdf").await;

        let outcome = ws
            .open_with(&provider(), Path::new("/tmp/lectern-tests/a.pdf"))
            .await;

        assert!(matches!(outcome, Ok(OpenOutcome::AlreadyOpen(id)) if id == a));
        assert_eq!(ws.outline().len(), 2);
        assert_eq!(ws.selection(), Selection::DocumentActive(a));
    }

    #[tokio::test]
    async fn non_pdf_and_failing_files_are_reported() {
        let mut ws = workspace();
        let outcomes = ws
            .open_all(
                &provider(),
                &[
                    PathBuf::from("/tmp/lectern-tests/notes.txt"),
                    PathBuf::from("/tmp/lectern-tests/missing.pdf"),
                    PathBuf::from("/tmp/lectern-tests/A.PDF"),
                    PathBuf::from("/tmp/lectern-tests/c.pdf"),
                ],
            )
            .await;

        assert!(matches!(outcomes[0], Err(LecternError::UnsupportedFile { .. })));
        assert!(matches!(outcomes[1], Err(LecternError::Open { .. })));
        assert!(matches!(outcomes[2], Err(LecternError::Open { .. })));
        assert!(matches!(outcomes[3], Ok(OpenOutcome::Opened(_))));
        assert_eq!(ws.outline().len(), 1);
    }

    #[tokio::test]
    async fn next_item_walks_the_flattened_tree() {
        let mut ws = workspace();
        let a = open(&mut ws, "a.pdf").await;
        let b = open(&mut ws, "b.pdf").await;

        assert!(ws.select_outline_item(OutlineNode::Page(page(a, 2))));
        assert!(ws.outline().is_expanded(a));

        assert!(ws.next_item());
        assert_eq!(ws.selection(), Selection::PageActive(page(a, 3)));
        assert!(ws.next_item());
        assert_eq!(ws.selection(), Selection::DocumentActive(b));
        assert!(ws.next_item());
        assert_eq!(ws.selection(), Selection::PageActive(page(b, 1)));
        assert!(ws.next_item());
        assert_eq!(ws.selection(), Selection::PageActive(page(b, 2)));

        assert!(!ws.affordances().can_next_item);
        assert!(!ws.next_item());
        assert_eq!(ws.selection(), Selection::PageActive(page(b, 2)));
    }

    #[tokio::test]
    async fn previous_item_enters_the_previous_lecture_at_its_last_page() {
        let mut ws = workspace();
        let a = open(&mut ws, "a.pdf").await;
        let b = open(&mut ws, "b.pdf").await;
        ws.outline.collapse(a);
        ws.select_outline_item(OutlineNode::Document(b));

        assert!(ws.previous_item());
        assert_eq!(ws.selection(), Selection::PageActive(page(a, 3)));
        ws.select_outline_item(OutlineNode::Page(page(a, 1)));
        assert!(ws.previous_item());
        assert_eq!(ws.selection(), Selection::DocumentActive(a));
        assert!(!ws.affordances().can_previous_item);
        assert!(!ws.previous_item());
    }

    #[tokio::test]
    async fn lecture_navigation_skips_pages() {
        let mut ws = workspace();
        let a = open(&mut ws, "a.pdf").await;
        let b = open(&mut ws, "b.pdf").await;
        let c = open(&mut ws, "c.pdf").await;
        ws.select_outline_item(OutlineNode::Page(page(b, 2)));

        assert!(ws.apply(Command::NextLecture));
        assert_eq!(ws.selection(), Selection::DocumentActive(c));
        assert!(!ws.affordances().can_next_lecture);
        assert!(!ws.apply(Command::NextLecture));

        assert!(ws.apply(Command::PreviousLecture));
        assert!(ws.apply(Command::PreviousLecture));
        assert_eq!(ws.selection(), Selection::DocumentActive(a));
        assert!(!ws.apply(Command::PreviousLecture));
    }

    #[test]
    fn navigation_without_a_document_is_a_no_op() {
        let mut ws = workspace();

        assert_eq!(ws.affordances(), Affordances::default());
        assert!(!ws.next_item());
        assert!(!ws.previous_item());
        assert!(!ws.next_lecture());
        assert!(!ws.scroll_pages(1));
        assert!(ws.add_bookmark().is_none());
        assert!(!ws.commit_note(RichText::from_plain("lost")));
        assert!(ws.notes().is_empty());
        assert!(ws.present(Box::new(RecordingMirror::default())).is_none());
    }

    #[tokio::test]
    async fn scrolling_selects_pages_through_the_outline() {
        let mut ws = workspace();
        let a = open(&mut ws, "a.pdf").await;

        assert!(ws.apply(Command::ScrollPages { delta: 1 }));
        assert_eq!(ws.selection(), Selection::PageActive(page(a, 2)));
        assert_eq!(ws.outline().selected(), Some(OutlineNode::Page(page(a, 2))));
        assert!(ws.apply(Command::ScrollPages { delta: 10 }));
        assert_eq!(ws.current_page(), Some(page(a, 3)));
        assert!(!ws.apply(Command::ScrollPages { delta: 1 }));
        assert!(ws.apply(Command::GotoPage { number: 0 }));
        assert_eq!(ws.current_page(), Some(page(a, 1)));
        assert!(ws.apply(Command::LastPage));
        assert_eq!(ws.current_page(), Some(page(a, 3)));
    }

    #[tokio::test]
    async fn move_row_and_collapse_follow_visible_rows() {
        let mut ws = workspace();
        let a = open(&mut ws, "a.pdf").await;
        let b = open(&mut ws, "b.pdf").await;
        ws.select_outline_item(OutlineNode::Document(a));

        assert!(ws.apply(Command::MoveRow { delta: 1 }));
        assert_eq!(ws.selection(), Selection::DocumentActive(b));
        assert!(!ws.apply(Command::MoveRow { delta: 1 }));

        ws.select_outline_item(OutlineNode::Page(page(b, 2)));
        assert!(ws.apply(Command::Collapse));
        assert_eq!(ws.selection(), Selection::DocumentActive(b));
        assert!(!ws.outline().is_expanded(b));
        assert!(ws.apply(Command::Expand));
        assert!(ws.outline().is_expanded(b));
    }

    #[tokio::test]
    async fn notes_follow_the_selected_item() {
        let mut ws = workspace();
        let a = open(&mut ws, "a.pdf").await;

        assert!(ws.commit_note(RichText::from_plain("document note")));
        ws.select_outline_item(OutlineNode::Page(page(a, 2)));
        assert!(ws.note().is_empty());

        let mut rich = RichText::from_plain("page ");
        rich.push_str("two", TextStyle { bold: true, ..TextStyle::PLAIN });
        ws.commit_note(rich.clone());
        ws.commit_note(RichText::from_plain("page two, revised"));

        ws.select_outline_item(OutlineNode::Document(a));
        assert_eq!(ws.note().as_str(), "document note");
        ws.select_outline_item(OutlineNode::Page(page(a, 2)));
        assert_eq!(ws.note().as_str(), "page two, revised");
    }

    #[tokio::test]
    async fn closing_a_lecture_cascades_to_its_bookmarks_only() {
        let mut ws = workspace();
        let a = open(&mut ws, "a.pdf").await;
        let b = open(&mut ws, "b.pdf").await;

        ws.select_outline_item(OutlineNode::Page(page(a, 2)));
        let bm1 = ws.add_bookmark().unwrap();
        assert!(ws.rename_bookmark(bm1, "bm1"));
        ws.select_outline_item(OutlineNode::Page(page(b, 1)));
        let kept = ws.add_bookmark().unwrap();
        assert_eq!(ws.bookmarks().get(kept).unwrap().name, "New Bookmark 2");

        ws.select_outline_item(OutlineNode::Document(a));
        assert!(ws.affordances().can_close_lecture);
        assert!(ws.apply(Command::CloseSelectedLecture));

        assert!(ws.bookmarks().find_by_name("bm1").is_none());
        assert!(ws.bookmarks().get(kept).is_some());
        assert!(ws.outline().get(a).is_none());
        assert_eq!(ws.selection(), Selection::NoDocument);
        assert!(!ws.activate_bookmark(bm1));
    }

    #[tokio::test]
    async fn closing_another_lecture_keeps_the_selection() {
        let mut ws = workspace();
        let a = open(&mut ws, "a.pdf").await;
        let b = open(&mut ws, "b.pdf").await;
        ws.select_outline_item(OutlineNode::Page(page(b, 2)));

        assert!(ws.close_lecture(a));
        assert_eq!(ws.selection(), Selection::PageActive(page(b, 2)));

        assert!(ws.close_lecture(b));
        assert_eq!(ws.selection(), Selection::NoDocument);
        assert!(ws.outline().is_empty());
        let chrome = ws.chrome();
        assert_eq!(chrome.title, "Lectern");
        assert!(!chrome.toolbar_visible && !chrome.search_visible && !chrome.bookmarks_visible);
    }

    #[tokio::test]
    async fn notes_survive_closing_and_reopening() {
        let mut ws = workspace();
        let a = open(&mut ws, "a.pdf").await;
        ws.commit_note(RichText::from_plain("keep me"));
        ws.close_lecture(a);

        let reopened = open(&mut ws, "a.pdf").await;
        assert_eq!(reopened, a);
        assert_eq!(ws.note().as_str(), "keep me");
    }

    #[tokio::test]
    async fn bookmark_activation_selects_the_page() {
        let mut ws = workspace();
        let a = open(&mut ws, "a.pdf").await;
        ws.goto_page(3);
        let id = ws.add_bookmark().unwrap();
        ws.select_outline_item(OutlineNode::Document(a));
        ws.outline.collapse(a);

        assert!(ws.apply(Command::ActivateSelectedBookmark));
        assert_eq!(ws.selection(), Selection::PageActive(page(a, 3)));
        assert!(ws.outline().is_expanded(a));

        assert!(ws.affordances().can_delete_bookmark);
        assert!(ws.apply(Command::DeleteSelectedBookmark));
        assert!(ws.bookmarks().get(id).is_none());
        assert_eq!(ws.selected_bookmark(), None);
    }

    #[tokio::test]
    async fn bookmark_cursor_moves_within_bounds() {
        let mut ws = workspace();
        open(&mut ws, "a.pdf").await;
        let first = ws.add_bookmark().unwrap();
        ws.scroll_pages(1);
        let second = ws.add_bookmark().unwrap();

        assert_eq!(ws.selected_bookmark(), Some(second));
        assert!(ws.move_bookmark_cursor(-1));
        assert_eq!(ws.selected_bookmark(), Some(first));
        assert!(!ws.move_bookmark_cursor(-1));

        ws.delete_bookmark(first);
        assert_eq!(ws.selected_bookmark(), Some(second));
    }

    #[tokio::test]
    async fn search_jumps_to_matches_and_wraps() {
        let mut ws = workspace();
        let b = open(&mut ws, "b.pdf").await;
        ws.select_outline_item(OutlineNode::Document(b));

        ws.search_text("rust");
        assert_eq!(ws.search().match_count(), 1);
        assert_eq!(ws.selection(), Selection::PageActive(page(b, 2)));
        let cursor = ws.text_selection().unwrap();
        assert_eq!(cursor.span.start, 0);
        assert_eq!(cursor.span.len, 4);
        assert_eq!(ws.search_summary().unwrap(), "1 of 1 found");

        assert!(ws.apply(Command::SearchNext { count: 1 }));
        assert_eq!(ws.current_page(), Some(page(b, 2)));
        assert!(ws.text_selection().is_some());
    }

    #[tokio::test]
    async fn search_without_matches_keeps_the_page() {
        let mut ws = workspace();
        let a = open(&mut ws, "a.pdf").await;
        ws.goto_page(2);

        ws.search_text("haskell");
        assert_eq!(ws.current_page(), Some(page(a, 2)));
        assert!(matches!(ws.search(), SearchState::NoResults { .. }));
        assert_eq!(
            ws.search_summary().unwrap(),
            "Nothing like \"haskell\" found in a.pdf"
        );
        assert!(!ws.step_search(1));

        ws.search_text("");
        assert_eq!(ws.search(), &SearchState::Idle);
        assert!(ws.search_summary().is_none());
    }

    #[tokio::test]
    async fn a_new_query_without_matches_drops_the_old_cursor() {
        let mut ws = workspace();
        let b = open(&mut ws, "b.pdf").await;

        ws.search_text("rust");
        assert!(ws.text_selection().is_some());

        ws.search_text("haskell");
        assert!(matches!(ws.search(), SearchState::NoResults { .. }));
        assert!(ws.text_selection().is_none());
        assert_eq!(ws.current_page(), Some(page(b, 2)));
    }

    #[tokio::test]
    async fn switching_lecture_resets_search() {
        let mut ws = workspace();
        let a = open(&mut ws, "a.pdf").await;
        open(&mut ws, "b.pdf").await;
        ws.select_outline_item(OutlineNode::Document(a));
        ws.search_text("rules");
        assert!(ws.search().is_active());

        ws.next_lecture();
        assert_eq!(ws.search(), &SearchState::Idle);
    }

    #[tokio::test]
    async fn mirrors_follow_page_changes_and_clear_on_close() {
        let mut ws = workspace();
        let a = open(&mut ws, "a.pdf").await;
        let mirror = RecordingMirror::default();
        let other = RecordingMirror::default();

        assert!(ws.affordances().can_present);
        let id = ws.present(Box::new(mirror.clone())).unwrap();
        let other_id = ws.present(Box::new(other.clone())).unwrap();
        assert_eq!(ws.mirror_ids(), vec![id, other_id]);
        ws.scroll_pages(1);
        assert!(ws.detach_mirror(id));
        ws.scroll_pages(1);
        ws.close_lecture(a);

        assert_eq!(
            *mirror.log.borrow(),
            vec!["Presenting a.pdf page 1", "Presenting a.pdf page 2", "close"]
        );
        assert_eq!(
            *other.log.borrow(),
            vec![
                "Presenting a.pdf page 1",
                "Presenting a.pdf page 2",
                "Presenting a.pdf page 3",
                "clear"
            ]
        );

        ws.close();
        assert_eq!(ws.mirror_count(), 0);
        assert_eq!(other.log.borrow().last().unwrap(), "close");
    }

    #[tokio::test]
    async fn mirrors_clear_when_the_new_lecture_has_no_pages() {
        let mut ws = workspace();
        open(&mut ws, "a.pdf").await;
        let mirror = RecordingMirror::default();
        ws.present(Box::new(mirror.clone())).unwrap();

        let empty = open(&mut ws, "empty.pdf").await;

        assert_eq!(ws.selection(), Selection::DocumentActive(empty));
        assert_eq!(ws.current_page(), None);
        assert_eq!(*mirror.log.borrow(), vec!["Presenting a.pdf page 1", "clear"]);
    }

    #[tokio::test]
    async fn chrome_reflects_the_selection() {
        let mut ws = workspace();
        let a = open(&mut ws, "a.pdf").await;
        open(&mut ws, "b.pdf").await;
        ws.select_outline_item(OutlineNode::Page(page(a, 2)));

        let chrome = ws.chrome();
        assert_eq!(chrome.title, "a.pdf (2 open)");
        assert_eq!(chrome.toolbar_title.as_deref(), Some("a.pdf page 2"));
        assert_eq!(chrome.search_placeholder.as_deref(), Some("Search in a.pdf"));
        assert_eq!(
            chrome.note_placeholder.as_deref(),
            Some("Add some notes to a.pdf page 2")
        );
        assert!(chrome.bookmarks_visible);
        assert!(!ws.affordances().can_close_lecture);
    }

    #[tokio::test]
    async fn empty_lecture_has_no_page_in_view() {
        let mut ws = workspace();
        let empty = open(&mut ws, "empty.pdf").await;

        assert_eq!(ws.selection(), Selection::DocumentActive(empty));
        assert_eq!(ws.current_page(), None);
        assert!(!ws.affordances().can_present);
        assert!(!ws.affordances().can_next_item);
        assert!(!ws
            .outline()
            .is_expandable(&OutlineNode::Document(empty)));
    }

    #[test]
    fn selecting_items_that_are_not_open_is_ignored() {
        let mut ws = workspace();
        let ghost = document_id_for_path(Path::new("/tmp/lectern-tests/ghost.pdf"));

        assert!(!ws.select_outline_item(OutlineNode::Document(ghost)));
        assert!(!ws.select_outline_item(OutlineNode::Page(page(ghost, 1))));
        assert_eq!(ws.selection(), Selection::NoDocument);
    }
}
