use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};
use parking_lot::Mutex;

use crate::{DocumentBackend, DocumentId, DocumentInfo, PageRef, RenderImage, RenderRequest};

const CACHE_CAPACITY: usize = 10;

/// An open lecture: the backend handle plus a small render cache for the main view.
/// Presentation mirrors render through `backend` at their own scale.
pub struct Lecture {
    pub info: DocumentInfo,
    pub backend: Arc<dyn DocumentBackend>,
    render_cache: Mutex<HashMap<CacheKey, RenderImage>>,
}

impl Lecture {
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self {
            info: backend.info().clone(),
            backend,
            render_cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> DocumentId {
        self.info.id
    }

    pub fn page_count(&self) -> usize {
        self.info.page_count
    }

    /// The page numbered `number` (1-based), if the document has it.
    pub fn page(&self, number: usize) -> Option<PageRef> {
        if number == 0 || number > self.info.page_count {
            return None;
        }
        Some(PageRef {
            document: self.info.id,
            number,
        })
    }

    pub fn first_page(&self) -> Option<PageRef> {
        self.page(1)
    }

    pub fn last_page(&self) -> Option<PageRef> {
        self.page(self.info.page_count)
    }

    pub fn pages(&self) -> impl Iterator<Item = PageRef> + '_ {
        (1..=self.info.page_count).map(move |number| PageRef {
            document: self.info.id,
            number,
        })
    }

    pub fn render(&self, page: PageRef, scale: f32) -> Result<RenderImage> {
        if page.document != self.info.id || self.page(page.number).is_none() {
            return Err(anyhow!(
                "page {} is not part of {}",
                page.number,
                self.info.file_name()
            ));
        }

        let key = CacheKey::new(page.index(), scale);
        if let Some(image) = self.render_cache.lock().get(&key).cloned() {
            return Ok(image);
        }

        let image = self.backend.render_page(RenderRequest {
            page_index: page.index(),
            scale,
        })?;
        self.store_cached_render(key, &image, page.index());
        Ok(image)
    }

    fn store_cached_render(&self, key: CacheKey, image: &RenderImage, reference_page: usize) {
        let mut cache = self.render_cache.lock();
        cache.insert(key, image.clone());

        if cache.len() > CACHE_CAPACITY {
            let mut keys: Vec<_> = cache.keys().copied().collect();
            keys.sort_by_key(|k| k.page_index.abs_diff(reference_page));
            for stale in keys.into_iter().skip(CACHE_CAPACITY) {
                cache.remove(&stale);
            }
        }
    }
}

impl std::fmt::Debug for Lecture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lecture").field("info", &self.info).finish()
    }
}

#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
struct CacheKey {
    page_index: usize,
    scale_milli: u32,
}

impl CacheKey {
    fn new(page_index: usize, scale: f32) -> Self {
        let scaled = (scale * 1000.0).round();
        let scale_milli = if !scaled.is_finite() || scaled <= 0.0 {
            1
        } else if scaled > u32::MAX as f32 {
            u32::MAX
        } else {
            scaled as u32
        };
        Self {
            page_index,
            scale_milli,
        }
    }
}
