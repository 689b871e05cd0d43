use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use clap::Parser;
use crossterm::cursor;
use crossterm::event;
use crossterm::style::{Attribute, Print, SetAttribute};
use crossterm::terminal::{self, Clear, ClearType};
use directories::ProjectDirs;
use lectern_core::{
    AppContext, Command, DocumentProvider, Lecture, OutlineNode, PageRef, RenderImage, RichText,
    TextStyle, ViewerConfig, WindowId, Workspace,
};
use lectern_render::PdfRenderFactory;
use lectern_tty::{
    paint_search_highlights, write_status_line, DrawParams, EventMapper, KittyMirror,
    KittyRenderer, PromptKind, UiEvent,
};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

const NOTE_ROWS: u32 = 4;
const MIRROR_SCALE: f32 = 2.0;
const RENDER_FAILED_HINT: &str = "This page could not be rendered.";

#[derive(Debug, Parser)]
#[command(
    name = "lectern",
    version,
    about = "Lecture-set PDF viewer for kitty terminals"
)]
struct Args {
    /// Page to show in the first lecture (1-based)
    #[arg(short = 'p', long = "page")]
    page: Option<usize>,

    /// Configuration file to use instead of the platform default
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// PDF files to open in the first window
    files: Vec<PathBuf>,
}

struct RawModeGuard;

impl RawModeGuard {
    fn new() -> anyhow::Result<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
        let mut stdout = io::stdout();
        let _ = crossterm::execute!(stdout, cursor::Show);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Panel {
    None,
    Outline,
    Bookmarks,
}

enum LoopAction {
    Continue,
    ContinueRedraw,
    RedrawNote,
    Quit,
}

/// Everything the event loop mutates between frames.
struct Frontend {
    app: AppContext,
    active: WindowId,
    mapper: EventMapper,
    panel: Panel,
    message: Option<String>,
}

impl Frontend {
    fn new(mut app: AppContext) -> Self {
        let active = app.open_window();
        Self {
            app,
            active,
            mapper: EventMapper::new(),
            panel: Panel::None,
            message: None,
        }
    }

    fn window(&self) -> Option<&Workspace> {
        self.app.window(self.active)
    }

    fn window_mut(&mut self) -> Option<&mut Workspace> {
        self.app.window_mut(self.active)
    }

    fn window_position(&self) -> (usize, usize) {
        let ids = self.app.window_ids();
        let index = ids.iter().position(|id| *id == self.active).unwrap_or(0);
        (index + 1, ids.len())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let project_dirs = ProjectDirs::from("org", "lectern", "lectern")
        .ok_or_else(|| anyhow!("unable to resolve platform data directories"))?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| project_dirs.config_dir().join("config.toml"));
    let config = ViewerConfig::load(&config_path)?;
    let _log_guard = init_logging(&project_dirs, &config.log.filter)?;
    info!(config = %config_path.display(), "starting lectern");

    let poll_interval = config.ui.poll_interval;
    let provider = PdfRenderFactory::new()?;
    let mut frontend = Frontend::new(AppContext::new(config));

    if let Some(window) = frontend.window_mut() {
        let outcomes = window.open_all(&provider, &args.files).await;
        let failed = outcomes.iter().filter(|outcome| outcome.is_err()).count();
        if failed > 0 {
            frontend.message = Some(format!("{failed} file(s) could not be opened"));
        }
    }

    if let Some(number) = args.page {
        show_start_page(&mut frontend, number);
    }

    let _raw = RawModeGuard::new()?;
    let mut stdout = io::stdout();
    crossterm::execute!(stdout, cursor::Hide)?;
    let mut renderer = KittyRenderer::new(stdout);
    let mut dirty = true;

    loop {
        if dirty {
            redraw(&mut renderer, &frontend)?;
            dirty = false;
        }

        if event::poll(poll_interval)? {
            let ev = event::read()?;
            let ui_event = frontend.mapper.map_event(ev);
            match handle_event(ui_event, &mut frontend, &provider).await? {
                LoopAction::ContinueRedraw => dirty = true,
                LoopAction::Continue => {
                    draw_status_line(&mut renderer, &status_text(&frontend))?;
                }
                LoopAction::RedrawNote => {
                    redraw_note(&mut renderer, &frontend)?;
                    draw_status_line(&mut renderer, &status_text(&frontend))?;
                }
                LoopAction::Quit => break,
            }
            if let Some(window) = frontend.window_mut() {
                let events = window.drain_events();
                if !events.is_empty() {
                    debug!(?events, "workspace changed");
                    dirty = true;
                }
            }
        }
    }

    for id in frontend.app.window_ids() {
        frontend.app.close_window(id);
    }
    renderer.delete_images()?;
    renderer.clear_all()?;
    Ok(())
}

async fn handle_event<P>(
    event: UiEvent,
    frontend: &mut Frontend,
    provider: &P,
) -> Result<LoopAction>
where
    P: DocumentProvider + ?Sized,
{
    frontend.message = None;
    let active = frontend.active;
    let Some(window) = frontend.app.window_mut(active) else {
        return Ok(LoopAction::Quit);
    };

    match event {
        UiEvent::Command(cmd) => {
            let changed = window.apply(cmd);
            Ok(if changed {
                LoopAction::ContinueRedraw
            } else {
                LoopAction::Continue
            })
        }
        UiEvent::ToggleSidebar => {
            frontend.panel = Panel::Outline;
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::ToggleBookmarks => {
            frontend.panel = Panel::Bookmarks;
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::CloseOverlay => {
            frontend.panel = Panel::None;
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::BeginSearch | UiEvent::SearchQueryChanged { .. } => Ok(LoopAction::Continue),
        UiEvent::SearchSubmit { query } => {
            window.apply(Command::Search { query });
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::SearchCancel | UiEvent::PromptCancel => Ok(LoopAction::Continue),
        UiEvent::BeginNote => {
            if window.active_lecture().is_some() {
                let note = window.note().clone();
                frontend.mapper.begin_note(note);
            } else {
                frontend.message = Some("Open a lecture to take notes".to_string());
            }
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::NoteEdited => Ok(LoopAction::RedrawNote),
        UiEvent::NoteCommit { text } => {
            window.commit_note(text);
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::BeginRename => {
            let selected = window
                .selected_bookmark()
                .and_then(|id| window.bookmarks().get(id))
                .map(|bookmark| (bookmark.id, bookmark.name.clone()));
            if let Some((id, name)) = selected {
                frontend
                    .mapper
                    .begin_prompt(PromptKind::RenameBookmark(id), &name);
            }
            Ok(LoopAction::Continue)
        }
        UiEvent::PromptSubmit { kind, value } => {
            let value = value.trim();
            match kind {
                PromptKind::OpenFile => {
                    if let Err(err) = window.open_with(provider, Path::new(value)).await {
                        warn!(?err, path = value, "failed to open lecture");
                        frontend.message = Some(err.to_string());
                    }
                }
                PromptKind::Present => {
                    let size = terminal::size()
                        .map(|(cols, rows)| DrawParams::clamped(u32::from(cols), u32::from(rows)))
                        .unwrap_or(DrawParams::clamped(80, 24));
                    match KittyMirror::open(Path::new(value), size, MIRROR_SCALE) {
                        Ok(mirror) => {
                            if window.present(Box::new(mirror)).is_none() {
                                frontend.message = Some("Nothing to present".to_string());
                            }
                        }
                        Err(err) => {
                            warn!(?err, device = value, "failed to attach presentation mirror");
                            frontend.message = Some(format!("{err:#}"));
                        }
                    }
                }
                PromptKind::RenameBookmark(id) => {
                    if !value.is_empty() {
                        window.rename_bookmark(id, value);
                    }
                }
            }
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::DetachMirrors => {
            for id in window.mirror_ids() {
                window.detach_mirror(id);
            }
            Ok(LoopAction::Continue)
        }
        UiEvent::NewWindow => {
            frontend.active = frontend.app.open_window();
            frontend.panel = Panel::None;
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::CloseWindow => {
            frontend.active = close_window(&mut frontend.app, active);
            frontend.panel = Panel::None;
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::NextWindow => {
            if let Some(next) = frontend.app.next_window(active) {
                frontend.active = next;
            }
            Ok(LoopAction::ContinueRedraw)
        }
        UiEvent::Quit => Ok(LoopAction::Quit),
        UiEvent::None => Ok(LoopAction::Continue),
    }
}

/// Closes `id` and returns the window to show next, bringing back an empty one when
/// the last window went away.
fn close_window(app: &mut AppContext, id: WindowId) -> WindowId {
    let next = app.next_window(id).filter(|next| *next != id);
    app.close_window(id);
    match next.or_else(|| app.reopen()) {
        Some(next) => next,
        None => app.open_window(),
    }
}

struct Layout {
    total_cols: u32,
    total_rows: u32,
    cell_aspect: f32,
    sidebar_cols: u32,
    body_rows: u32,
    note_rows: u32,
}

impl Layout {
    fn compute(frontend: &Frontend, has_note: bool) -> Result<Self> {
        let window = terminal::window_size()?;
        let total_cols = u32::from(window.columns).max(1);
        let total_rows = u32::from(window.rows).max(1);
        let cell_aspect = if window.width > 0 && window.height > 0 {
            (f32::from(window.height) / total_rows as f32)
                / (f32::from(window.width) / total_cols as f32)
        } else {
            2.0
        };
        let sidebar_cols = match frontend.panel {
            Panel::None => 0,
            Panel::Outline | Panel::Bookmarks => {
                u32::from(frontend.app.config().ui.sidebar_width).min(total_cols / 2)
            }
        };
        let available = total_rows.saturating_sub(1);
        let note_rows = if has_note && available > NOTE_ROWS * 2 {
            NOTE_ROWS
        } else {
            0
        };
        Ok(Self {
            total_cols,
            total_rows,
            cell_aspect,
            sidebar_cols,
            body_rows: available.saturating_sub(note_rows).max(1),
            note_rows,
        })
    }

    fn page_cols(&self) -> u32 {
        self.total_cols
            .saturating_sub(self.sidebar_cols + u32::from(self.sidebar_cols > 0))
            .max(1)
    }

    fn page_origin_col(&self) -> u32 {
        if self.sidebar_cols > 0 {
            self.sidebar_cols + 1
        } else {
            0
        }
    }
}

/// Selects the first lecture and jumps to `number` in it.
fn show_start_page(frontend: &mut Frontend, number: usize) -> bool {
    let Some(window) = frontend.window_mut() else {
        return false;
    };
    let first = window.outline().iter().next().map(|lecture| lecture.id());
    let Some(first) = first else {
        return false;
    };
    window.select_outline_item(OutlineNode::Document(first));
    window.apply(Command::GotoPage { number })
}

fn redraw(renderer: &mut KittyRenderer<io::Stdout>, frontend: &Frontend) -> Result<()> {
    let Some(window) = frontend.window() else {
        return Ok(());
    };
    let chrome = window.chrome();
    let layout = Layout::compute(frontend, chrome.note_placeholder.is_some())?;

    renderer.begin_sync_update()?;
    renderer.delete_images()?;
    renderer.clear_all()?;
    renderer.set_title(&chrome.title)?;

    if layout.sidebar_cols > 0 {
        let lines = match frontend.panel {
            Panel::Bookmarks => bookmark_lines(window),
            _ => outline_lines(window),
        };
        draw_sidebar(
            renderer.writer(),
            &lines,
            layout.sidebar_cols as usize,
            layout.body_rows as usize,
        )?;
    }

    draw_page(renderer, window, &layout)?;

    if let Some(placeholder) = chrome.note_placeholder.as_deref() {
        let text = frontend.mapper.note_buffer().unwrap_or_else(|| window.note());
        draw_note_box(renderer.writer(), text, placeholder, &layout)?;
    }

    renderer.end_sync_update()?;
    draw_status_line(renderer, &status_text(frontend))
}

fn redraw_note(renderer: &mut KittyRenderer<io::Stdout>, frontend: &Frontend) -> Result<()> {
    let Some(window) = frontend.window() else {
        return Ok(());
    };
    let Some(placeholder) = window.chrome().note_placeholder else {
        return Ok(());
    };
    let layout = Layout::compute(frontend, true)?;
    let text = frontend.mapper.note_buffer().unwrap_or_else(|| window.note());
    draw_note_box(renderer.writer(), text, &placeholder, &layout)
}

fn draw_page<W: Write>(
    renderer: &mut KittyRenderer<W>,
    window: &Workspace,
    layout: &Layout,
) -> Result<()> {
    let (Some(lecture), Some(page)) = (window.active_lecture(), window.current_page()) else {
        let hint = if window.outline().is_empty() {
            "No lectures open. Press O to open a PDF."
        } else {
            "This lecture has no pages."
        };
        return print_page_hint(renderer.writer(), layout, hint);
    };

    let mut image = match render_to_fit(lecture, page, layout) {
        Ok(image) => image,
        Err(err) => {
            warn!(?err, page = page.number, "failed to render page");
            return print_page_hint(renderer.writer(), layout, RENDER_FAILED_HINT);
        }
    };

    paint_search_highlights(&mut image, &window.search().highlights_for(page));

    let params = DrawParams::fit(
        &image,
        layout.page_cols(),
        layout.body_rows,
        layout.cell_aspect,
    );
    let start_col =
        layout.page_origin_col() + layout.page_cols().saturating_sub(params.columns) / 2;
    let start_row = layout.body_rows.saturating_sub(params.rows) / 2;
    crossterm::execute!(
        renderer.writer(),
        cursor::MoveTo(start_col as u16, start_row as u16)
    )?;
    renderer.draw(&image, params)
}

/// Renders `page` at a scale that fills the page area when the pixel size is known.
fn render_to_fit(lecture: &Lecture, page: PageRef, layout: &Layout) -> Result<RenderImage> {
    let image = lecture.render(page, 1.0)?;
    let window_px = terminal::window_size()?;
    if image.width == 0 || image.height == 0 || window_px.width == 0 || window_px.height == 0 {
        return Ok(image);
    }
    let cell_width = f32::from(window_px.width) / layout.total_cols as f32;
    let cell_height = f32::from(window_px.height) / layout.total_rows as f32;
    let width_ratio = cell_width * layout.page_cols() as f32 / image.width as f32;
    let height_ratio = cell_height * layout.body_rows as f32 / image.height as f32;
    let scale_ratio = width_ratio.min(height_ratio);
    if scale_ratio > 1.05 {
        lecture.render(page, scale_ratio.min(8.0))
    } else {
        Ok(image)
    }
}

fn print_page_hint(writer: &mut impl Write, layout: &Layout, hint: &str) -> Result<()> {
    crossterm::execute!(
        writer,
        cursor::MoveTo(layout.page_origin_col() as u16, (layout.body_rows / 2) as u16),
        Print(truncate_with_ellipsis(hint.to_string(), layout.page_cols() as usize))
    )?;
    Ok(())
}

/// Sidebar rows for the lecture tree; the flag marks the selected row.
fn outline_lines(window: &Workspace) -> Vec<(String, bool)> {
    let outline = window.outline();
    let selected = outline.selected_row();
    outline
        .rows()
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| {
            let text = match row.node {
                OutlineNode::Document(id) => {
                    let lecture = outline.get(id)?;
                    let marker = if outline.is_expanded(id) { '-' } else { '+' };
                    format!("{} {}", marker, lecture.info.file_name())
                }
                OutlineNode::Page(page) => {
                    let lecture = outline.get(page.document)?;
                    format!(
                        "{}page {}",
                        "  ".repeat(row.depth),
                        lecture.info.page_label(page.number)
                    )
                }
            };
            Some((text, selected == Some(index)))
        })
        .collect()
}

fn bookmark_lines(window: &Workspace) -> Vec<(String, bool)> {
    let cursor = window.selected_bookmark();
    window
        .bookmarks()
        .iter()
        .map(|bookmark| {
            let location = window
                .outline()
                .get(bookmark.page.document)
                .map(|lecture| {
                    format!(
                        "{} p{}",
                        lecture.info.file_name(),
                        lecture.info.page_label(bookmark.page.number)
                    )
                })
                .unwrap_or_default();
            (
                format!("{} ({})", bookmark.name, location),
                cursor == Some(bookmark.id),
            )
        })
        .collect()
}

fn draw_sidebar(
    writer: &mut impl Write,
    lines: &[(String, bool)],
    width: usize,
    height: usize,
) -> Result<()> {
    let selected = lines.iter().position(|(_, selected)| *selected).unwrap_or(0);
    let offset = selected.saturating_sub(height.saturating_sub(1));
    for (row, (text, is_selected)) in lines.iter().skip(offset).take(height).enumerate() {
        let content = truncate_with_ellipsis(text.clone(), width);
        if *is_selected {
            print_inverted(writer, 0, row as u16, &content)?;
        } else {
            crossterm::execute!(writer, cursor::MoveTo(0, row as u16), Print(content))?;
        }
    }
    for row in 0..height {
        crossterm::execute!(writer, cursor::MoveTo(width as u16, row as u16), Print('|'))?;
    }
    Ok(())
}

fn draw_note_box(
    writer: &mut impl Write,
    text: &RichText,
    placeholder: &str,
    layout: &Layout,
) -> Result<()> {
    if layout.note_rows == 0 {
        return Ok(());
    }
    let top = layout.body_rows as u16;
    let width = layout.total_cols as usize;
    crossterm::execute!(writer, cursor::MoveTo(0, top), Print("-".repeat(width)))?;

    let first_row = top + 1;
    let last_row = top + layout.note_rows as u16 - 1;
    for row in first_row..=last_row {
        crossterm::execute!(writer, cursor::MoveTo(0, row), Clear(ClearType::CurrentLine))?;
    }
    if text.is_empty() {
        crossterm::execute!(
            writer,
            cursor::MoveTo(0, first_row),
            SetAttribute(Attribute::Dim),
            Print(truncate_with_ellipsis(placeholder.to_string(), width)),
            SetAttribute(Attribute::Reset)
        )?;
        return Ok(());
    }

    let mut row = first_row;
    let mut col = 0usize;
    crossterm::execute!(writer, cursor::MoveTo(0, row))?;
    for (segment, style) in text.segments() {
        apply_text_style(writer, style)?;
        for c in segment.chars() {
            if c == '\n' || col >= width {
                row += 1;
                col = 0;
                if row > last_row {
                    crossterm::execute!(writer, SetAttribute(Attribute::Reset))?;
                    return Ok(());
                }
                crossterm::execute!(writer, cursor::MoveTo(0, row))?;
                if c == '\n' {
                    continue;
                }
            }
            crossterm::execute!(writer, Print(c))?;
            col += 1;
        }
    }
    crossterm::execute!(writer, SetAttribute(Attribute::Reset))?;
    Ok(())
}

fn apply_text_style(writer: &mut impl Write, style: TextStyle) -> Result<()> {
    crossterm::execute!(writer, SetAttribute(Attribute::Reset))?;
    if style.bold {
        crossterm::execute!(writer, SetAttribute(Attribute::Bold))?;
    }
    if style.italic {
        crossterm::execute!(writer, SetAttribute(Attribute::Italic))?;
    }
    if style.underline {
        crossterm::execute!(writer, SetAttribute(Attribute::Underlined))?;
    }
    Ok(())
}

fn status_text(frontend: &Frontend) -> String {
    let (position, windows) = frontend.window_position();
    let base = frontend.window().map(|window| {
        let chrome = window.chrome();
        let mut status = chrome
            .toolbar_title
            .unwrap_or_else(|| "No lectures open".to_string());
        if windows > 1 {
            status.push_str(&format!(" | window {position}/{windows}"));
        }
        if window.mirror_count() > 0 {
            status.push_str(&format!(" | presenting on {}", window.mirror_count()));
        }
        if let Some(summary) = window.search_summary() {
            status.push_str(" | ");
            status.push_str(&summary);
        }
        status
    });
    let pending = frontend
        .mapper
        .pending_input()
        .or_else(|| frontend.message.clone());
    combine_status(base, pending.as_deref()).unwrap_or_default()
}

fn combine_status(base: Option<String>, pending_input: Option<&str>) -> Option<String> {
    match (base, pending_input.filter(|s| !s.is_empty())) {
        (Some(mut base), Some(pending)) => {
            base.push_str(" | ");
            base.push_str(pending);
            Some(base)
        }
        (Some(base), None) => Some(base),
        (None, Some(pending)) => Some(pending.to_string()),
        (None, None) => None,
    }
}

fn draw_status_line(renderer: &mut KittyRenderer<io::Stdout>, status: &str) -> Result<()> {
    let (cols, rows) = terminal::size()?;
    let status_row = rows.saturating_sub(1);
    let writer = renderer.writer();
    crossterm::execute!(
        writer,
        cursor::MoveTo(0, status_row),
        Clear(ClearType::CurrentLine)
    )?;
    write_status_line(
        writer,
        &truncate_with_ellipsis(status.to_string(), usize::from(cols)),
    )?;
    Ok(())
}

fn print_inverted(writer: &mut impl Write, col: u16, row: u16, content: &str) -> Result<()> {
    crossterm::execute!(
        writer,
        cursor::MoveTo(col, row),
        SetAttribute(Attribute::Reverse),
        Print(content),
        SetAttribute(Attribute::Reset)
    )?;
    Ok(())
}

fn truncate_with_ellipsis(text: String, width: usize) -> String {
    if text.chars().count() <= width {
        return text;
    }
    if width <= 3 {
        return text.chars().take(width).collect();
    }
    let mut truncated: String = text.chars().take(width - 3).collect();
    truncated.push_str("...");
    truncated
}

fn init_logging(project_dirs: &ProjectDirs, default_filter: &str) -> Result<WorkerGuard> {
    let log_dir = project_dirs.data_local_dir().join("logs");
    fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::never(log_dir, "lectern.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    // The terminal is in raw mode and owned by the viewer, so logs only go to the file.
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .try_init()
        .map_err(|err| anyhow!(err))?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lectern_core::{
        document_id_for_path, DocumentBackend, DocumentInfo, DocumentMetadata, RenderImage,
        RenderRequest, SearchMatch,
    };
    use std::sync::Arc;

    struct BlankBackend {
        info: DocumentInfo,
    }

    impl DocumentBackend for BlankBackend {
        fn info(&self) -> &DocumentInfo {
            &self.info
        }

        fn render_page(&self, _request: RenderRequest) -> Result<RenderImage> {
            Ok(RenderImage {
                width: 1,
                height: 1,
                pixels: vec![255; 4],
            })
        }

        fn find(&self, _query: &str, _case_insensitive: bool) -> Result<Vec<SearchMatch>> {
            Ok(Vec::new())
        }
    }

    /// Every path opens as a three-page lecture.
    struct BlankProvider;

    #[async_trait]
    impl DocumentProvider for BlankProvider {
        async fn open(&self, path: &Path) -> Result<Arc<dyn DocumentBackend>> {
            Ok(Arc::new(BlankBackend {
                info: DocumentInfo {
                    id: document_id_for_path(path),
                    path: path.to_path_buf(),
                    page_count: 3,
                    page_labels: vec!["i".into(), "ii".into(), String::new()],
                    metadata: DocumentMetadata::default(),
                },
            }))
        }
    }

    struct BrokenBackend {
        info: DocumentInfo,
    }

    impl DocumentBackend for BrokenBackend {
        fn info(&self) -> &DocumentInfo {
            &self.info
        }

        fn render_page(&self, _request: RenderRequest) -> Result<RenderImage> {
            anyhow::bail!("corrupt page")
        }

        fn find(&self, _query: &str, _case_insensitive: bool) -> Result<Vec<SearchMatch>> {
            Ok(Vec::new())
        }
    }

    struct BrokenProvider;

    #[async_trait]
    impl DocumentProvider for BrokenProvider {
        async fn open(&self, path: &Path) -> Result<Arc<dyn DocumentBackend>> {
            Ok(Arc::new(BrokenBackend {
                info: DocumentInfo {
                    id: document_id_for_path(path),
                    path: path.to_path_buf(),
                    page_count: 1,
                    page_labels: Vec::new(),
                    metadata: DocumentMetadata::default(),
                },
            }))
        }
    }

    fn test_layout() -> Layout {
        Layout {
            total_cols: 80,
            total_rows: 24,
            cell_aspect: 2.0,
            sidebar_cols: 0,
            body_rows: 19,
            note_rows: NOTE_ROWS,
        }
    }

    async fn frontend_with(files: &[&str]) -> Frontend {
        let mut frontend = Frontend::new(AppContext::new(ViewerConfig::default()));
        let paths: Vec<PathBuf> = files
            .iter()
            .map(|name| Path::new("/tmp/lectern-cli").join(name))
            .collect();
        let window = frontend.window_mut().unwrap();
        for outcome in window.open_all(&BlankProvider, &paths).await {
            outcome.unwrap();
        }
        frontend
    }

    #[test]
    fn combine_status_joins_non_empty_parts() {
        assert_eq!(
            combine_status(Some("a.pdf".into()), Some("/rust")).as_deref(),
            Some("a.pdf | /rust")
        );
        assert_eq!(combine_status(Some("a.pdf".into()), Some("")).as_deref(), Some("a.pdf"));
        assert_eq!(combine_status(None, Some("12")).as_deref(), Some("12"));
        assert_eq!(combine_status(None, None), None);
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate_with_ellipsis("lecture".into(), 10), "lecture");
        assert_eq!(truncate_with_ellipsis("lecture-one".into(), 8), "lectu...");
        assert_eq!(truncate_with_ellipsis("übung".into(), 2), "üb");
    }

    #[tokio::test]
    async fn outline_lines_mark_the_selected_row() {
        let mut frontend = frontend_with(&["a.pdf", "b.pdf"]).await;
        let window = frontend.window_mut().unwrap();
        window.apply(Command::PreviousLecture);
        window.apply(Command::NextItem);

        let lines = outline_lines(frontend.window().unwrap());
        let texts: Vec<&str> = lines.iter().map(|(text, _)| text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["- a.pdf", "  page i", "  page ii", "  page 3", "+ b.pdf"]
        );
        assert_eq!(
            lines.iter().position(|(_, selected)| *selected),
            Some(1)
        );
    }

    #[tokio::test]
    async fn bookmark_lines_show_location() {
        let mut frontend = frontend_with(&["a.pdf"]).await;
        let window = frontend.window_mut().unwrap();
        window.apply(Command::GotoPage { number: 2 });
        window.apply(Command::AddBookmark);

        let lines = bookmark_lines(frontend.window().unwrap());
        assert_eq!(
            lines,
            vec![("New Bookmark 1 (a.pdf pii)".to_string(), true)]
        );
    }

    #[tokio::test]
    async fn status_reports_page_windows_and_search() {
        let mut frontend = frontend_with(&["a.pdf"]).await;
        frontend.app.open_window();
        let window = frontend.window_mut().unwrap();
        window.apply(Command::GotoPage { number: 2 });
        window.apply(Command::Search {
            query: "anything".into(),
        });

        assert_eq!(
            status_text(&frontend),
            "a.pdf page ii | window 1/2 | Nothing like \"anything\" found in a.pdf"
        );
    }

    #[tokio::test]
    async fn start_page_applies_to_the_first_lecture() {
        let mut frontend = frontend_with(&["a.pdf", "b.pdf"]).await;

        assert!(show_start_page(&mut frontend, 3));
        let window = frontend.window().unwrap();
        let first = window.outline().iter().next().unwrap().id();
        assert_eq!(window.current_page().map(|page| page.document), Some(first));
        assert_eq!(window.current_page().map(|page| page.number), Some(3));

        let mut empty = Frontend::new(AppContext::new(ViewerConfig::default()));
        assert!(!show_start_page(&mut empty, 2));
    }

    #[tokio::test]
    async fn unrenderable_page_leaves_a_hint_and_keeps_running() {
        let mut frontend = Frontend::new(AppContext::new(ViewerConfig::default()));
        let window = frontend.window_mut().unwrap();
        window
            .open_with(&BrokenProvider, Path::new("/tmp/lectern-cli/broken.pdf"))
            .await
            .unwrap();

        let mut renderer = KittyRenderer::new(Vec::new());
        draw_page(&mut renderer, frontend.window().unwrap(), &test_layout()).unwrap();

        let output = String::from_utf8(renderer.into_inner()).unwrap();
        assert!(output.contains(RENDER_FAILED_HINT));
        assert!(!output.contains("\u{1b}_G"));
    }

    #[test]
    fn closing_the_last_window_brings_back_an_empty_one() {
        let mut app = AppContext::new(ViewerConfig::default());
        let first = app.open_window();
        let second = app.open_window();

        assert_eq!(close_window(&mut app, first), second);
        let fresh = close_window(&mut app, second);
        assert_ne!(fresh, second);
        assert_eq!(app.window_ids(), vec![fresh]);
        assert!(app.window(fresh).unwrap().outline().is_empty());
    }
}
