use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use lectern_core::search::find_spans;
use lectern_core::{
    document_id_for_path, DocumentBackend, DocumentInfo, DocumentMetadata, DocumentProvider,
    NormalizedRect, PageRef, RenderImage, RenderRequest, SearchMatch,
};
use parking_lot::Mutex;
use pdfium_render::prelude::*;
use tracing::{debug, instrument, warn};

/// Environment variable naming a pdfium shared library to bind before the defaults.
pub const PDFIUM_LIBRARY_ENV: &str = "LECTERN_PDFIUM_LIBRARY_PATH";

pub struct PdfiumRenderFactory {
    pdfium: Arc<Pdfium>,
}

impl PdfiumRenderFactory {
    pub fn new() -> Result<Self> {
        let pdfium = match bind_pdfium_from_env() {
            Some(pdfium) => pdfium,
            None => bind_pdfium_default()?,
        };
        Ok(Self {
            pdfium: Arc::new(pdfium),
        })
    }
}

#[async_trait]
impl DocumentProvider for PdfiumRenderFactory {
    async fn open(&self, path: &Path) -> Result<Arc<dyn DocumentBackend>> {
        let absolute = path
            .canonicalize()
            .with_context(|| format!("failed to resolve path for {:?}", path))?;
        let info = build_document_info(&self.pdfium, &absolute)?;
        debug!(path = %absolute.display(), pages = info.page_count, "loaded pdf");
        Ok(Arc::new(PdfiumDocument::new(
            Arc::clone(&self.pdfium),
            absolute,
            info,
        )))
    }
}

struct PdfiumDocument {
    path: PathBuf,
    info: DocumentInfo,
    cache: Mutex<Option<RenderCacheEntry>>,
    document: Mutex<Option<PdfDocument<'static>>>,
    pdfium: Arc<Pdfium>,
}

struct RenderCacheEntry {
    page_index: usize,
    scale: f32,
    image: RenderImage,
}

impl PdfiumDocument {
    fn new(pdfium: Arc<Pdfium>, path: PathBuf, info: DocumentInfo) -> Self {
        Self {
            path,
            info,
            cache: Mutex::new(None),
            document: Mutex::new(None),
            pdfium,
        }
    }

    fn open_document(&self) -> Result<PdfDocument<'static>> {
        let document = self
            .pdfium
            .load_pdf_from_file(&self.path, None)
            .with_context(|| format!("failed to open {:?}", self.path))?;
        // SAFETY: the document borrows the bindings owned by `self.pdfium`. It is kept in
        // `self.document`, which is declared before `pdfium` and so dropped first.
        let document = unsafe { mem::transmute::<PdfDocument<'_>, PdfDocument<'static>>(document) };
        Ok(document)
    }

    fn with_document<R, F>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&PdfDocument<'static>) -> Result<R>,
    {
        let mut guard = self.document.lock();
        let document = match guard.take() {
            Some(document) => document,
            None => self.open_document()?,
        };
        let result = f(&document);
        *guard = Some(document);
        result
    }

    fn render_internal(
        &self,
        document: &PdfDocument<'_>,
        request: &RenderRequest,
    ) -> Result<RenderImage> {
        let page = page_at(document, request.page_index)?;
        let config = PdfRenderConfig::new().scale_page_by_factor(request.scale.max(0.1));
        let bitmap = page
            .render_with_config(&config)
            .with_context(|| format!("failed to render page {}", request.page_index))?;
        let pixels = bitmap.as_image().to_rgba8().into_raw();

        Ok(RenderImage {
            width: u32::try_from(bitmap.width()).unwrap_or_default(),
            height: u32::try_from(bitmap.height()).unwrap_or_default(),
            pixels,
        })
    }

    fn find_on_page(
        &self,
        document: &PdfDocument<'_>,
        page_index: usize,
        query: &str,
        case_insensitive: bool,
    ) -> Result<Vec<SearchMatch>> {
        let page = page_at(document, page_index)?;
        let text = page
            .text()
            .with_context(|| format!("failed to extract text for page {}", page_index))?;
        let page_width = page.width().value;
        let page_height = page.height().value;

        // One entry per pdfium character so match spans index straight into the bounds.
        let mut haystack = String::new();
        let mut char_rects = Vec::new();
        let chars = text.chars();
        for ch in chars.iter() {
            let Some(c) = ch.unicode_char() else {
                continue;
            };
            haystack.push(c);
            let rect = match ch.loose_bounds() {
                Ok(bounds) if page_width > 0.0 && page_height > 0.0 => Some(
                    NormalizedRect {
                        left: bounds.left().value / page_width,
                        right: bounds.right().value / page_width,
                        top: 1.0 - bounds.top().value / page_height,
                        bottom: 1.0 - bounds.bottom().value / page_height,
                    }
                    .clamp(),
                ),
                _ => None,
            };
            char_rects.push(rect);
        }

        let spans = find_spans(&haystack, query, case_insensitive);
        if spans.is_empty() {
            return Ok(Vec::new());
        }

        let page_ref = PageRef {
            document: self.info.id,
            number: page_index + 1,
        };
        Ok(spans
            .into_iter()
            .map(|span| {
                let chars = char_rects.iter().skip(span.start).take(span.len);
                SearchMatch {
                    page: page_ref,
                    span,
                    rects: merge_line_rects(chars.flatten().copied()),
                }
            })
            .collect())
    }
}

/// Joins per-character boxes into one box per text line.
fn merge_line_rects(rects: impl IntoIterator<Item = NormalizedRect>) -> Vec<NormalizedRect> {
    let mut lines: Vec<NormalizedRect> = Vec::new();
    for rect in rects.into_iter().filter(NormalizedRect::is_valid) {
        match lines.last_mut() {
            Some(line) if rect.top < line.bottom && rect.bottom > line.top => {
                line.left = line.left.min(rect.left);
                line.right = line.right.max(rect.right);
                line.top = line.top.min(rect.top);
                line.bottom = line.bottom.max(rect.bottom);
            }
            _ => lines.push(rect),
        }
    }
    lines
}

impl DocumentBackend for PdfiumDocument {
    fn info(&self) -> &DocumentInfo {
        &self.info
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn render_page(&self, request: RenderRequest) -> Result<RenderImage> {
        {
            let cache = self.cache.lock();
            if let Some(entry) = cache.as_ref() {
                if entry.page_index == request.page_index
                    && (entry.scale - request.scale).abs() < f32::EPSILON
                {
                    return Ok(entry.image.clone());
                }
            }
        }

        let image = self.with_document(|document| self.render_internal(document, &request))?;

        *self.cache.lock() = Some(RenderCacheEntry {
            page_index: request.page_index,
            scale: request.scale,
            image: image.clone(),
        });

        Ok(image)
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn find(&self, query: &str, case_insensitive: bool) -> Result<Vec<SearchMatch>> {
        if query.is_empty() {
            return Ok(Vec::new());
        }

        self.with_document(|document| {
            let mut matches = Vec::new();
            for page_index in 0..self.info.page_count {
                match self.find_on_page(document, page_index, query, case_insensitive) {
                    Ok(found) => matches.extend(found),
                    Err(err) => warn!(?err, page = page_index, "skipping page during search"),
                }
            }
            Ok(matches)
        })
    }
}

fn page_at<'a>(document: &'a PdfDocument<'_>, page_index: usize) -> Result<PdfPage<'a>> {
    let index: PdfPageIndex = page_index
        .try_into()
        .map_err(|_| anyhow!("page {} is out of supported range", page_index))?;
    document
        .pages()
        .get(index)
        .with_context(|| format!("page {} out of range", page_index))
}

fn build_document_info(pdfium: &Pdfium, path: &Path) -> Result<DocumentInfo> {
    let document = pdfium
        .load_pdf_from_file(path, None)
        .with_context(|| format!("failed to open {:?}", path))?;
    let page_count = usize::try_from(document.pages().len()).unwrap_or_default();
    let page_labels = document
        .pages()
        .iter()
        .map(|page| page.label().map(str::to_owned).unwrap_or_default())
        .collect();

    let metadata = document.metadata();
    let title = metadata
        .get(PdfDocumentMetadataTagType::Title)
        .map(|t| t.value().to_owned());
    let author = metadata
        .get(PdfDocumentMetadataTagType::Author)
        .map(|t| t.value().to_owned());
    let keywords = metadata
        .get(PdfDocumentMetadataTagType::Keywords)
        .map(|t| split_keywords(t.value()))
        .unwrap_or_default();

    Ok(DocumentInfo {
        id: document_id_for_path(path),
        path: path.to_path_buf(),
        page_count,
        page_labels,
        metadata: DocumentMetadata {
            title,
            author,
            keywords,
        },
    })
}

fn split_keywords(raw: &str) -> Vec<String> {
    raw.split([',', ';'])
        .map(str::trim)
        .filter(|keyword| !keyword.is_empty())
        .map(str::to_owned)
        .collect()
}

pub type PdfRenderFactory = PdfiumRenderFactory;

fn bind_pdfium_from_env() -> Option<Pdfium> {
    let path = std::env::var(PDFIUM_LIBRARY_ENV).ok()?;
    if path.is_empty() {
        return None;
    }
    match Pdfium::bind_to_library(&path) {
        Ok(bindings) => Some(Pdfium::new(bindings)),
        Err(err) => {
            warn!("failed to load Pdfium from {}={}: {}", PDFIUM_LIBRARY_ENV, path, err);
            None
        }
    }
}

fn bind_pdfium_default() -> Result<Pdfium> {
    let mut errors = Vec::new();

    let cwd_path = Pdfium::pdfium_platform_library_name_at_path("./");
    match Pdfium::bind_to_library(&cwd_path) {
        Ok(bindings) => return Ok(Pdfium::new(bindings)),
        Err(err) => errors.push(format!("{}: {}", cwd_path.display(), err)),
    }

    match Pdfium::bind_to_system_library() {
        Ok(bindings) => Ok(Pdfium::new(bindings)),
        Err(err) => {
            errors.push(format!("system: {err}"));
            Err(anyhow!(
                "failed to bind to a pdfium library; install it or set {} ({})",
                PDFIUM_LIBRARY_ENV,
                errors.join(", ")
            ))
        }
    }
}
