use std::io::{self, Write};

use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use crossterm::{
    cursor,
    terminal::{Clear, ClearType},
};
use lectern_core::{NormalizedRect, RenderImage, SearchHighlights};
use png::{BitDepth, ColorType, Encoder};

mod input;
mod mirror;

pub use input::{EventMapper, InputMode, PromptKind, UiEvent};
pub use mirror::KittyMirror;

pub struct KittyRenderer<W: Write> {
    writer: W,
    image_id: u32,
    placement_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawParams {
    pub columns: u32,
    pub rows: u32,
}

impl DrawParams {
    pub fn clamped(columns: u32, rows: u32) -> Self {
        Self {
            columns: columns.max(1),
            rows: rows.max(1),
        }
    }

    /// Largest cell box inside `columns` x `rows` that keeps the image's aspect ratio.
    /// `cell_aspect` is the height of one cell divided by its width.
    pub fn fit(image: &RenderImage, columns: u32, rows: u32, cell_aspect: f32) -> Self {
        let columns = columns.max(1);
        let rows = rows.max(1);
        if image.width == 0 || image.height == 0 || !(cell_aspect.is_finite() && cell_aspect > 0.0)
        {
            return Self::clamped(columns, rows);
        }

        let ratio = image.width as f32 / image.height as f32 * cell_aspect;
        let mut cols = columns as f32;
        let mut fitted_rows = (cols / ratio).round().max(1.0);
        if fitted_rows > rows as f32 {
            fitted_rows = rows as f32;
            cols = (fitted_rows * ratio).round().max(1.0);
        }
        Self::clamped(
            (cols as u32).min(columns),
            (fitted_rows as u32).min(rows),
        )
    }
}

impl<W: Write> KittyRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            image_id: 1,
            placement_id: 1,
        }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn draw(&mut self, image: &RenderImage, params: DrawParams) -> Result<()> {
        let mut buffer = Vec::new();
        let mut encoder = Encoder::new(&mut buffer, image.width, image.height);
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&image.pixels)?;
        writer.finish()?;

        let encoded = BASE64.encode(&buffer);
        let mut chunks = encoded.as_bytes().chunks(4096).peekable();
        let mut first = true;

        while let Some(chunk) = chunks.next() {
            let more = chunks.peek().is_some();
            if first {
                write!(
                    self.writer,
                    "\u{1b}_Ga=T,f=100,C=1,q=2,i={},p={},c={},r={},s={},v={},z=-1,m={}",
                    self.image_id,
                    self.placement_id,
                    params.columns,
                    params.rows,
                    image.width,
                    image.height,
                    if more { 1 } else { 0 }
                )?;
                first = false;
            } else {
                write!(self.writer, "\u{1b}_Gm={},q=2", if more { 1 } else { 0 })?;
            }
            if !chunk.is_empty() {
                self.writer.write_all(b";")?;
                self.writer.write_all(chunk)?;
            }
            write!(self.writer, "\u{1b}\\")?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Removes every image this renderer placed.
    pub fn delete_images(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}_Ga=d,d=I,i={},q=2\u{1b}\\", self.image_id)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn set_title(&mut self, title: &str) -> Result<()> {
        let title: String = title.chars().filter(|c| !c.is_control()).collect();
        write!(self.writer, "\u{1b}]2;{}\u{7}", title)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn begin_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026h")?;
        Ok(())
    }

    /// Disables synchronized updates.
    /// The terminal will render all buffered changes at once.
    pub fn end_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026l")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Clears the entire screen.
    pub fn clear_all(&mut self) -> Result<()> {
        crossterm::execute!(
            &mut self.writer,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        Ok(())
    }
}

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    write!(writer, "{}", label)?;
    writer.flush()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PixelRect {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

/// Tints the search hits on a rendered page; the focused hit is drawn stronger.
pub fn paint_search_highlights(image: &mut RenderImage, highlights: &SearchHighlights) {
    if image.width == 0 || image.height == 0 || highlights.is_empty() {
        return;
    }

    for rect in &highlights.others {
        if let Some(rect) = normalized_to_pixel_rect(*rect, image.width, image.height) {
            fill_rect(image, rect, [255, 200, 0], 0.2);
        }
    }
    for rect in &highlights.current {
        if let Some(rect) = normalized_to_pixel_rect(*rect, image.width, image.height) {
            fill_rect(image, rect, [255, 235, 0], 0.35);
        }
    }
}

fn normalized_to_pixel_rect(rect: NormalizedRect, width: u32, height: u32) -> Option<PixelRect> {
    let width_f = width as f32;
    let height_f = height as f32;

    let x0 = ((rect.left * width_f).floor() as i64).clamp(0, width as i64);
    let x1 = ((rect.right * width_f).ceil() as i64).clamp(0, width as i64);
    let y0 = ((rect.top * height_f).floor() as i64).clamp(0, height as i64);
    let y1 = ((rect.bottom * height_f).ceil() as i64).clamp(0, height as i64);

    if x1 <= x0 || y1 <= y0 {
        return None;
    }

    Some(PixelRect {
        x0: x0 as u32,
        y0: y0 as u32,
        x1: x1 as u32,
        y1: y1 as u32,
    })
}

fn fill_rect(image: &mut RenderImage, rect: PixelRect, color: [u8; 3], alpha: f32) {
    let width = image.width as usize;
    let x1 = rect.x1.min(image.width);
    let y1 = rect.y1.min(image.height);

    for y in rect.y0.min(y1)..y1 {
        let row_start = (y as usize) * width * 4;
        for x in rect.x0.min(x1)..x1 {
            let idx = row_start + (x as usize) * 4;
            if let Some(pixel) = image.pixels.get_mut(idx..idx + 4) {
                blend_pixel(pixel, color, alpha);
            }
        }
    }
}

fn blend_pixel(pixel: &mut [u8], color: [u8; 3], alpha: f32) {
    let alpha = alpha.clamp(0.0, 1.0);
    let inv = 1.0 - alpha;
    for (channel, target) in pixel.iter_mut().zip(color) {
        *channel = ((*channel as f32 * inv) + (target as f32 * alpha))
            .round()
            .clamp(0.0, 255.0) as u8;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn white(width: u32, height: u32) -> RenderImage {
        RenderImage {
            width,
            height,
            pixels: vec![255; (width * height * 4) as usize],
        }
    }

    #[test]
    fn kitty_draw_emits_protocol() {
        let mut renderer = KittyRenderer::new(Vec::new());
        let image = RenderImage {
            width: 1,
            height: 1,
            pixels: vec![255, 0, 0, 255],
        };

        renderer.draw(&image, DrawParams::clamped(10, 5)).unwrap();
        let output = renderer.into_inner();
        assert_eq!(&output[..3], b"\x1b_G");
        let text = String::from_utf8_lossy(&output);
        assert!(text.contains("c=10,r=5,s=1,v=1"));
        assert!(text.ends_with("\u{1b}\\"));
    }

    #[test]
    fn set_title_strips_control_characters() {
        let mut renderer = KittyRenderer::new(Vec::new());
        renderer.set_title("week1.pdf\u{7} page 2").unwrap();
        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert_eq!(output, "\u{1b}]2;week1.pdf page 2\u{7}");
    }

    #[test]
    fn fit_keeps_aspect_ratio_inside_the_box() {
        let portrait = white(100, 200);
        let params = DrawParams::fit(&portrait, 80, 20, 2.0);
        assert_eq!(params, DrawParams { columns: 20, rows: 20 });

        let landscape = white(400, 100);
        let params = DrawParams::fit(&landscape, 40, 30, 2.0);
        assert_eq!(params, DrawParams { columns: 40, rows: 5 });

        let empty = white(0, 0);
        assert_eq!(DrawParams::fit(&empty, 0, 0, 2.0), DrawParams::clamped(1, 1));
    }

    #[test]
    fn highlights_tint_only_covered_pixels() {
        let mut image = white(10, 10);
        let highlights = SearchHighlights {
            current: vec![NormalizedRect {
                left: 0.0,
                top: 0.0,
                right: 0.2,
                bottom: 0.1,
            }],
            others: vec![],
        };

        paint_search_highlights(&mut image, &highlights);

        assert_eq!(&image.pixels[0..4], &[255, 248, 166, 255]);
        let untouched = (5 * 10 + 5) * 4;
        assert_eq!(&image.pixels[untouched..untouched + 4], &[255, 255, 255, 255]);
    }

    #[test]
    fn degenerate_rects_are_skipped() {
        assert!(normalized_to_pixel_rect(
            NormalizedRect {
                left: 0.5,
                top: 0.5,
                right: 0.5,
                bottom: 0.9,
            },
            10,
            10
        )
        .is_none());
    }
}
