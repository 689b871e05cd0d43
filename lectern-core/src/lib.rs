use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use once_cell::sync::Lazy;
use uuid::Uuid;

pub mod app;
pub mod bookmarks;
pub mod config;
pub mod document;
pub mod error;
pub mod mirror;
pub mod notes;
pub mod outline;
pub mod search;
pub mod workspace;

pub use app::{AppContext, WindowId};
pub use bookmarks::{Bookmark, BookmarkId, BookmarkList};
pub use config::ViewerConfig;
pub use document::Lecture;
pub use error::LecternError;
pub use mirror::{MirrorFrame, MirrorId, MirrorSet, PresentationMirror};
pub use notes::{NoteKey, NoteStore, RichText, StyleSpan, TextStyle};
pub use outline::{LectureOutline, OutlineDataSource, OutlineNode, OutlineRow};
pub use search::{SearchHighlights, SearchMatch, SearchState, TextSpan};
pub use workspace::{
    Affordances, Command, OpenOutcome, Selection, WindowChrome, Workspace, WorkspaceEvent,
};

/// Stable identity of an open lecture, derived from its resolved path.
pub type DocumentId = Uuid;

static DOCUMENT_NAMESPACE: Lazy<Uuid> = Lazy::new(|| {
    Uuid::parse_str("3f0d4c1e-8a57-5b0e-9d2c-61a4e0b7c95d").expect("valid namespace UUID")
});

/// Resolves `path` the way lectures are identified: canonical if the file exists,
/// otherwise absolute against the working directory.
pub fn resolve_document_path(path: &Path) -> PathBuf {
    path.canonicalize()
        .or_else(|_| {
            if path.is_absolute() {
                Ok(path.to_path_buf())
            } else {
                std::env::current_dir().map(|cwd| cwd.join(path))
            }
        })
        .unwrap_or_else(|_| path.to_path_buf())
}

pub fn document_id_for_path(path: &Path) -> DocumentId {
    let resolved = resolve_document_path(path);
    let rendered = resolved.to_string_lossy();
    Uuid::new_v5(&DOCUMENT_NAMESPACE, rendered.as_bytes())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub keywords: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub path: PathBuf,
    pub page_count: usize,
    /// Display label per page; index 0 is page number 1.
    pub page_labels: Vec<String>,
    pub metadata: DocumentMetadata,
}

impl DocumentInfo {
    pub fn file_name(&self) -> &str {
        self.path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or("<unknown>")
    }

    /// Label of the 1-based page `number`, falling back to the number itself.
    pub fn page_label(&self, number: usize) -> String {
        if number == 0 || number > self.page_count {
            return number.to_string();
        }
        self.page_labels
            .get(number - 1)
            .filter(|label| !label.is_empty())
            .cloned()
            .unwrap_or_else(|| number.to_string())
    }
}

/// A page of an open lecture, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageRef {
    pub document: DocumentId,
    pub number: usize,
}

impl PageRef {
    pub fn index(&self) -> usize {
        self.number.saturating_sub(1)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RenderRequest {
    pub page_index: usize,
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            page_index: 0,
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RenderImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Rectangle in page space with all edges in `0.0..=1.0`, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NormalizedRect {
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl NormalizedRect {
    pub fn clamp(self) -> Self {
        let left = self.left.min(self.right).clamp(0.0, 1.0);
        let right = self.left.max(self.right).clamp(0.0, 1.0);
        let top = self.top.min(self.bottom).clamp(0.0, 1.0);
        let bottom = self.top.max(self.bottom).clamp(0.0, 1.0);
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.right > self.left && self.bottom > self.top
    }
}

/// Rendering and text-search engine for one loaded PDF.
pub trait DocumentBackend: Send + Sync {
    fn info(&self) -> &DocumentInfo;
    fn render_page(&self, request: RenderRequest) -> Result<RenderImage>;
    /// Every occurrence of `query` in document order. An empty query matches nothing.
    fn find(&self, query: &str, case_insensitive: bool) -> Result<Vec<SearchMatch>>;
}

#[async_trait::async_trait]
pub trait DocumentProvider: Send + Sync {
    async fn open(&self, path: &Path) -> Result<Arc<dyn DocumentBackend>>;
}
