use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};
use lectern_core::{BookmarkId, Command, RichText, TextStyle};

#[derive(Debug, Clone)]
pub enum UiEvent {
    Command(Command),
    ToggleSidebar,
    ToggleBookmarks,
    CloseOverlay,
    BeginSearch,
    SearchQueryChanged { query: String },
    SearchSubmit { query: String },
    SearchCancel,
    /// The front end should call [`EventMapper::begin_note`] with the note on screen.
    BeginNote,
    NoteEdited,
    NoteCommit { text: RichText },
    /// The front end should call [`EventMapper::begin_prompt`] for the bookmark under the cursor.
    BeginRename,
    PromptSubmit { kind: PromptKind, value: String },
    PromptCancel,
    DetachMirrors,
    NewWindow,
    CloseWindow,
    NextWindow,
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptKind {
    OpenFile,
    /// Terminal device to mirror the current page onto.
    Present,
    RenameBookmark(BookmarkId),
}

impl PromptKind {
    fn label(&self) -> &'static str {
        match self {
            PromptKind::OpenFile => "open",
            PromptKind::Present => "present on",
            PromptKind::RenameBookmark(_) => "rename",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Normal,
    Sidebar,
    Bookmarks,
    Search,
    Note,
    Prompt,
}

#[derive(Debug, Default)]
pub struct EventMapper {
    pending_count: Option<usize>,
    pending_digits: String,
    mode: InputMode,
    search_buffer: String,
    note_buffer: RichText,
    note_style: TextStyle,
    prompt: Option<PromptKind>,
    prompt_buffer: String,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.reset_count();
            self.search_buffer.clear();
            self.prompt = None;
            self.prompt_buffer.clear();
            if self.mode == InputMode::Note {
                self.note_buffer = RichText::new();
                self.note_style = TextStyle::PLAIN;
            }
            self.mode = mode;
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    /// Starts editing `text`; typing continues in the style of its last run.
    pub fn begin_note(&mut self, text: RichText) {
        self.set_mode(InputMode::Note);
        self.note_style = text.trailing_style();
        self.note_buffer = text;
    }

    pub fn note_buffer(&self) -> Option<&RichText> {
        (self.mode == InputMode::Note).then_some(&self.note_buffer)
    }

    pub fn note_style(&self) -> TextStyle {
        self.note_style
    }

    pub fn begin_prompt(&mut self, kind: PromptKind, initial: &str) {
        self.set_mode(InputMode::Prompt);
        self.prompt = Some(kind);
        self.prompt_buffer = initial.to_string();
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        let Event::Key(KeyEvent {
            code, modifiers, ..
        }) = event
        else {
            return UiEvent::None;
        };
        match self.mode {
            InputMode::Normal => self.map_key_normal(code, modifiers),
            InputMode::Sidebar => self.map_key_sidebar(code, modifiers),
            InputMode::Bookmarks => self.map_key_bookmarks(code, modifiers),
            InputMode::Search => self.map_key_search(code, modifiers),
            InputMode::Note => self.map_key_note(code, modifiers),
            InputMode::Prompt => self.map_key_prompt(code, modifiers),
        }
    }

    /// Keys shared by the page view and both side panels.
    fn map_key_common(&mut self, code: KeyCode, modifiers: KeyModifiers) -> Option<UiEvent> {
        let event = match (code, modifiers) {
            (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                if let Some(digit) = c.to_digit(10) {
                    self.push_digit(digit as usize);
                }
                return Some(UiEvent::None);
            }
            (KeyCode::Char(']'), _) => UiEvent::Command(Command::NextItem),
            (KeyCode::Char('['), _) => UiEvent::Command(Command::PreviousItem),
            (KeyCode::Char('}'), _) => UiEvent::Command(Command::NextLecture),
            (KeyCode::Char('{'), _) => UiEvent::Command(Command::PreviousLecture),
            (KeyCode::Char('n'), KeyModifiers::NONE) => {
                let count = self.take_count();
                return Some(UiEvent::Command(Command::SearchNext { count }));
            }
            (KeyCode::Char('N'), modifiers)
                if modifiers.is_empty() || modifiers == KeyModifiers::SHIFT =>
            {
                let count = self.take_count();
                return Some(UiEvent::Command(Command::SearchPrev { count }));
            }
            (KeyCode::Char('/'), KeyModifiers::NONE) => {
                self.set_mode(InputMode::Search);
                UiEvent::BeginSearch
            }
            (KeyCode::Char('n'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                UiEvent::NewWindow
            }
            (KeyCode::Char('w'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                UiEvent::CloseWindow
            }
            (KeyCode::Char('w'), KeyModifiers::NONE) => UiEvent::NextWindow,
            (KeyCode::Char('O'), _) => {
                self.begin_prompt(PromptKind::OpenFile, "");
                return Some(UiEvent::None);
            }
            (KeyCode::Char('q'), _) => UiEvent::Quit,
            _ => return None,
        };
        self.reset_count();
        Some(event)
    }

    fn map_key_normal(&mut self, code: KeyCode, modifiers: KeyModifiers) -> UiEvent {
        if let Some(event) = self.map_key_common(code, modifiers) {
            return event;
        }
        match (code, modifiers) {
            (KeyCode::Char('j'), KeyModifiers::NONE)
            | (KeyCode::Down, KeyModifiers::NONE)
            | (KeyCode::PageDown, _) => {
                let count = self.take_count();
                UiEvent::Command(Command::ScrollPages {
                    delta: count as isize,
                })
            }
            (KeyCode::Char('k'), KeyModifiers::NONE)
            | (KeyCode::Up, KeyModifiers::NONE)
            | (KeyCode::PageUp, _) => {
                let count = self.take_count();
                UiEvent::Command(Command::ScrollPages {
                    delta: -(count as isize),
                })
            }
            (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => {
                let number = self.take_count();
                UiEvent::Command(Command::GotoPage { number })
            }
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => match self.pending_count.take() {
                Some(number) if number > 0 => {
                    self.reset_count();
                    UiEvent::Command(Command::GotoPage { number })
                }
                _ => {
                    self.reset_count();
                    UiEvent::Command(Command::LastPage)
                }
            },
            (KeyCode::Char('b'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::Command(Command::AddBookmark)
            }
            (KeyCode::Char('B'), _) => {
                self.reset_count();
                self.set_mode(InputMode::Bookmarks);
                UiEvent::ToggleBookmarks
            }
            (KeyCode::Char('o'), KeyModifiers::NONE) | (KeyCode::Tab, _) => {
                self.reset_count();
                self.set_mode(InputMode::Sidebar);
                UiEvent::ToggleSidebar
            }
            (KeyCode::Char('e'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::BeginNote
            }
            (KeyCode::Char('p'), KeyModifiers::NONE) => {
                self.begin_prompt(PromptKind::Present, "");
                UiEvent::None
            }
            (KeyCode::Char('P'), _) => {
                self.reset_count();
                UiEvent::DetachMirrors
            }
            (KeyCode::Char('x'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::Command(Command::CloseSelectedLecture)
            }
            _ => {
                self.reset_count();
                UiEvent::None
            }
        }
    }

    fn map_key_sidebar(&mut self, code: KeyCode, modifiers: KeyModifiers) -> UiEvent {
        if let Some(event) = self.map_key_common(code, modifiers) {
            return event;
        }
        match (code, modifiers) {
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => {
                let count = self.take_count();
                UiEvent::Command(Command::MoveRow {
                    delta: count as isize,
                })
            }
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => {
                let count = self.take_count();
                UiEvent::Command(Command::MoveRow {
                    delta: -(count as isize),
                })
            }
            (KeyCode::Char('l'), KeyModifiers::NONE)
            | (KeyCode::Right, _)
            | (KeyCode::Enter, _) => {
                self.reset_count();
                UiEvent::Command(Command::Expand)
            }
            (KeyCode::Char('h'), KeyModifiers::NONE) | (KeyCode::Left, _) => {
                self.reset_count();
                UiEvent::Command(Command::Collapse)
            }
            (KeyCode::Char('x'), KeyModifiers::NONE) | (KeyCode::Delete, _) => {
                self.reset_count();
                UiEvent::Command(Command::CloseSelectedLecture)
            }
            (KeyCode::Char('o'), KeyModifiers::NONE) | (KeyCode::Tab, _) | (KeyCode::Esc, _) => {
                self.set_mode(InputMode::Normal);
                UiEvent::CloseOverlay
            }
            _ => {
                self.reset_count();
                UiEvent::None
            }
        }
    }

    fn map_key_bookmarks(&mut self, code: KeyCode, modifiers: KeyModifiers) -> UiEvent {
        if let Some(event) = self.map_key_common(code, modifiers) {
            return event;
        }
        match (code, modifiers) {
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => {
                let count = self.take_count();
                UiEvent::Command(Command::MoveBookmarkCursor {
                    delta: count as isize,
                })
            }
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => {
                let count = self.take_count();
                UiEvent::Command(Command::MoveBookmarkCursor {
                    delta: -(count as isize),
                })
            }
            (KeyCode::Enter, _) => {
                self.reset_count();
                UiEvent::Command(Command::ActivateSelectedBookmark)
            }
            (KeyCode::Char('b'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::Command(Command::AddBookmark)
            }
            (KeyCode::Char('d'), KeyModifiers::NONE) | (KeyCode::Delete, _) => {
                self.reset_count();
                UiEvent::Command(Command::DeleteSelectedBookmark)
            }
            (KeyCode::Char('r'), KeyModifiers::NONE) => {
                self.reset_count();
                UiEvent::BeginRename
            }
            (KeyCode::Char('B'), _) | (KeyCode::Esc, _) => {
                self.set_mode(InputMode::Normal);
                UiEvent::CloseOverlay
            }
            _ => {
                self.reset_count();
                UiEvent::None
            }
        }
    }

    fn map_key_search(&mut self, code: KeyCode, modifiers: KeyModifiers) -> UiEvent {
        match (code, modifiers) {
            (KeyCode::Esc, _) => {
                self.set_mode(InputMode::Normal);
                UiEvent::SearchCancel
            }
            (KeyCode::Enter, _) => {
                let query = std::mem::take(&mut self.search_buffer);
                self.set_mode(InputMode::Normal);
                UiEvent::SearchSubmit { query }
            }
            (KeyCode::Backspace, _) => {
                self.search_buffer.pop();
                UiEvent::SearchQueryChanged {
                    query: self.search_buffer.clone(),
                }
            }
            (KeyCode::Char(c), mods) if mods.is_empty() || mods == KeyModifiers::SHIFT => {
                self.search_buffer.push(c);
                UiEvent::SearchQueryChanged {
                    query: self.search_buffer.clone(),
                }
            }
            _ => UiEvent::None,
        }
    }

    fn map_key_note(&mut self, code: KeyCode, modifiers: KeyModifiers) -> UiEvent {
        match (code, modifiers) {
            (KeyCode::Esc, _) => {
                let text = std::mem::take(&mut self.note_buffer);
                self.set_mode(InputMode::Normal);
                UiEvent::NoteCommit { text }
            }
            (KeyCode::Char('b'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                self.note_style.bold = !self.note_style.bold;
                UiEvent::NoteEdited
            }
            (KeyCode::Char('e'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                self.note_style.italic = !self.note_style.italic;
                UiEvent::NoteEdited
            }
            (KeyCode::Char('u'), modifiers) if modifiers.contains(KeyModifiers::CONTROL) => {
                self.note_style.underline = !self.note_style.underline;
                UiEvent::NoteEdited
            }
            (KeyCode::Enter, _) => {
                self.note_buffer.push('\n', self.note_style);
                UiEvent::NoteEdited
            }
            (KeyCode::Backspace, _) => {
                self.note_buffer.pop();
                UiEvent::NoteEdited
            }
            (KeyCode::Char(c), mods) if mods.is_empty() || mods == KeyModifiers::SHIFT => {
                self.note_buffer.push(c, self.note_style);
                UiEvent::NoteEdited
            }
            _ => UiEvent::None,
        }
    }

    fn map_key_prompt(&mut self, code: KeyCode, modifiers: KeyModifiers) -> UiEvent {
        match (code, modifiers) {
            (KeyCode::Esc, _) => {
                self.set_mode(InputMode::Normal);
                UiEvent::PromptCancel
            }
            (KeyCode::Enter, _) => {
                let value = std::mem::take(&mut self.prompt_buffer);
                let kind = self.prompt.take();
                self.set_mode(InputMode::Normal);
                match kind {
                    Some(kind) => UiEvent::PromptSubmit { kind, value },
                    None => UiEvent::PromptCancel,
                }
            }
            (KeyCode::Backspace, _) => {
                self.prompt_buffer.pop();
                UiEvent::None
            }
            (KeyCode::Char(c), mods) if mods.is_empty() || mods == KeyModifiers::SHIFT => {
                self.prompt_buffer.push(c);
                UiEvent::None
            }
            _ => UiEvent::None,
        }
    }

    fn push_digit(&mut self, digit: usize) {
        let current = self.pending_count.unwrap_or(0);
        let next = current.saturating_mul(10).saturating_add(digit);
        self.pending_count = Some(next);
        if let Some(c) = char::from_digit(digit as u32, 10) {
            self.pending_digits.push(c);
        }
    }

    fn take_count(&mut self) -> usize {
        let count = self
            .pending_count
            .take()
            .filter(|&count| count > 0)
            .unwrap_or(1);
        self.pending_digits.clear();
        count
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }

    /// What the user has typed so far, for the status line.
    pub fn pending_input(&self) -> Option<String> {
        match self.mode {
            InputMode::Search => Some(format!("/{}", self.search_buffer)),
            InputMode::Prompt => {
                let label = self.prompt.map(|kind| kind.label()).unwrap_or("input");
                Some(format!("{}: {}", label, self.prompt_buffer))
            }
            InputMode::Note => {
                let mut marker = String::from("-- NOTE --");
                for (on, flag) in [
                    (self.note_style.bold, " bold"),
                    (self.note_style.italic, " italic"),
                    (self.note_style.underline, " underline"),
                ] {
                    if on {
                        marker.push_str(flag);
                    }
                }
                Some(marker)
            }
            _ if !self.pending_digits.is_empty() => Some(self.pending_digits.clone()),
            _ => None,
        }
    }
}
