use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::info;

use crate::config::ViewerConfig;
use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WindowId(u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owns every open lecture-set window. Closing the last one leaves the application
/// running; `reopen` brings back an empty window.
pub struct AppContext {
    config: Arc<ViewerConfig>,
    windows: BTreeMap<WindowId, Workspace>,
    next_id: u64,
}

impl AppContext {
    pub fn new(config: ViewerConfig) -> Self {
        Self {
            config: Arc::new(config),
            windows: BTreeMap::new(),
            next_id: 0,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Creates an empty window.
    pub fn open_window(&mut self) -> WindowId {
        self.next_id += 1;
        let id = WindowId(self.next_id);
        self.windows
            .insert(id, Workspace::new(Arc::clone(&self.config)));
        info!(window = %id, open = self.windows.len(), "opened window");
        id
    }

    /// Closes the window after closing its presentation mirrors.
    pub fn close_window(&mut self, id: WindowId) -> bool {
        match self.windows.remove(&id) {
            Some(mut workspace) => {
                workspace.close();
                info!(window = %id, open = self.windows.len(), "closed window");
                true
            }
            None => false,
        }
    }

    /// Opens a fresh window if none is left.
    pub fn reopen(&mut self) -> Option<WindowId> {
        if self.windows.is_empty() {
            Some(self.open_window())
        } else {
            None
        }
    }

    pub fn window(&self, id: WindowId) -> Option<&Workspace> {
        self.windows.get(&id)
    }

    pub fn window_mut(&mut self, id: WindowId) -> Option<&mut Workspace> {
        self.windows.get_mut(&id)
    }

    pub fn window_ids(&self) -> Vec<WindowId> {
        self.windows.keys().copied().collect()
    }

    /// The window after `id` in creation order, wrapping around.
    pub fn next_window(&self, id: WindowId) -> Option<WindowId> {
        self.windows
            .range((std::ops::Bound::Excluded(id), std::ops::Bound::Unbounded))
            .next()
            .or_else(|| self.windows.iter().next())
            .map(|(next, _)| *next)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }
}
