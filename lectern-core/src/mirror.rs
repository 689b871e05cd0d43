use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, warn};

use crate::{DocumentBackend, PageRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MirrorId(u64);

impl fmt::Display for MirrorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What a mirror needs to show one page on its own.
#[derive(Clone)]
pub struct MirrorFrame {
    pub page: PageRef,
    pub title: String,
    pub backend: Arc<dyn DocumentBackend>,
}

impl fmt::Debug for MirrorFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MirrorFrame")
            .field("page", &self.page)
            .field("title", &self.title)
            .finish()
    }
}

/// A passive follower that displays whatever page its window broadcasts.
pub trait PresentationMirror {
    fn show(&mut self, frame: &MirrorFrame) -> Result<()>;
    /// The owning window has no document to show.
    fn clear(&mut self) -> Result<()>;
    fn close(&mut self) {}
}

/// The presentation mirrors attached to one window.
#[derive(Default)]
pub struct MirrorSet {
    next_id: u64,
    mirrors: Vec<(MirrorId, Box<dyn PresentationMirror>)>,
}

impl MirrorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    pub fn ids(&self) -> Vec<MirrorId> {
        self.mirrors.iter().map(|(id, _)| *id).collect()
    }

    /// Registers `mirror` and shows `frame` on it straight away.
    pub fn attach(
        &mut self,
        mut mirror: Box<dyn PresentationMirror>,
        frame: &MirrorFrame,
    ) -> MirrorId {
        self.next_id += 1;
        let id = MirrorId(self.next_id);
        if let Err(err) = mirror.show(frame) {
            warn!(?err, mirror = %id, "failed to show initial page on mirror");
        }
        self.mirrors.push((id, mirror));
        debug!(mirror = %id, count = self.mirrors.len(), "attached presentation mirror");
        id
    }

    /// Closes and forgets the mirror; unknown ids are ignored.
    pub fn detach(&mut self, id: MirrorId) -> bool {
        match self.mirrors.iter().position(|(candidate, _)| *candidate == id) {
            Some(index) => {
                let (_, mut mirror) = self.mirrors.remove(index);
                mirror.close();
                true
            }
            None => false,
        }
    }

    pub fn broadcast(&mut self, frame: &MirrorFrame) {
        for (id, mirror) in &mut self.mirrors {
            if let Err(err) = mirror.show(frame) {
                warn!(?err, mirror = %id, page = frame.page.number, "mirror failed to show page");
            }
        }
    }

    pub fn clear_all(&mut self) {
        for (id, mirror) in &mut self.mirrors {
            if let Err(err) = mirror.clear() {
                warn!(?err, mirror = %id, "mirror failed to clear");
            }
        }
    }

    pub fn close_all(&mut self) {
        for (_, mut mirror) in self.mirrors.drain(..) {
            mirror.close();
        }
    }
}
