use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use lectern_core::{MirrorFrame, PresentationMirror, RenderRequest};
use tracing::{debug, warn};

use crate::{DrawParams, KittyRenderer};

const IDLE_TITLE: &str = "No lectures open";

/// Shows the broadcast page full-screen on another kitty terminal.
pub struct KittyMirror<W: Write> {
    renderer: KittyRenderer<W>,
    size: DrawParams,
    scale: f32,
}

impl KittyMirror<File> {
    /// Opens a terminal device such as `/dev/pts/3` for writing.
    pub fn open(device: &Path, size: DrawParams, scale: f32) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .open(device)
            .with_context(|| format!("failed to open presentation terminal {:?}", device))?;
        debug!(device = %device.display(), "opened presentation terminal");
        Ok(Self::new(file, size, scale))
    }
}

impl<W: Write> KittyMirror<W> {
    pub fn new(writer: W, size: DrawParams, scale: f32) -> Self {
        Self {
            renderer: KittyRenderer::new(writer),
            size,
            scale,
        }
    }

    pub fn into_inner(self) -> W {
        self.renderer.into_inner()
    }
}

impl<W: Write> PresentationMirror for KittyMirror<W> {
    fn show(&mut self, frame: &MirrorFrame) -> Result<()> {
        let image = frame.backend.render_page(RenderRequest {
            page_index: frame.page.index(),
            scale: self.scale,
        })?;
        let params = DrawParams::fit(&image, self.size.columns, self.size.rows, 2.0);

        self.renderer.begin_sync_update()?;
        self.renderer.clear_all()?;
        self.renderer.set_title(&frame.title)?;
        self.renderer.draw(&image, params)?;
        self.renderer.end_sync_update()
    }

    fn clear(&mut self) -> Result<()> {
        self.renderer.delete_images()?;
        self.renderer.clear_all()?;
        self.renderer.set_title(IDLE_TITLE)
    }

    fn close(&mut self) {
        let result = self
            .renderer
            .delete_images()
            .and_then(|_| self.renderer.clear_all());
        if let Err(err) = result {
            warn!(?err, "failed to reset presentation terminal");
        }
    }
}
