use ratatui::layout::Rect;

use crate::session::{ChatSession, Submission};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    Editing,
}

/// Convert a character index to a byte index for UTF-8 safe string operations
fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

pub struct App {
    pub should_quit: bool,
    pub input_mode: InputMode,

    // Input line
    pub input: String,
    pub cursor: usize, // cursor position in chars

    // Clear confirmation popup
    pub confirm_clear: bool,

    pub session: ChatSession,
    pub endpoint: String,

    // Transcript viewport
    pub scroll: u16,
    pub chat_height: u16,
    pub max_scroll: u16,

    // Animation state
    pub animation_frame: u8, // 0-2 for ellipsis animation

    // Areas for mouse hit-testing (updated during render)
    pub chat_area: Option<Rect>,
    pub send_area: Option<Rect>,
    pub clear_area: Option<Rect>,
}

impl App {
    pub fn new(session: ChatSession, endpoint: impl Into<String>) -> Self {
        Self {
            should_quit: false,
            input_mode: InputMode::Editing,
            input: String::new(),
            cursor: 0,
            confirm_clear: false,
            session,
            endpoint: endpoint.into(),
            scroll: 0,
            chat_height: 0,
            max_scroll: 0,
            animation_frame: 0,
            chat_area: None,
            send_area: None,
            clear_area: None,
        }
    }

    /// Hand the input line to the session. The line is only emptied when the
    /// prompt was accepted, so a rejected prompt can be edited and resent.
    pub fn send(&mut self) -> Submission {
        let outcome = self.session.submit(&self.input);
        if let Submission::Accepted(_) = outcome {
            self.input.clear();
            self.cursor = 0;
        }
        outcome
    }

    pub fn request_clear(&mut self) {
        self.confirm_clear = true;
    }

    /// Answer the clear confirmation popup
    pub fn resolve_clear(&mut self, confirmed: bool) {
        if !self.confirm_clear {
            return;
        }
        self.confirm_clear = false;
        if confirmed {
            self.session.clear();
            self.scroll = 0;
        }
    }

    /// Tick animation frame (called by Tick event)
    pub fn tick_animation(&mut self) {
        if self.session.is_generating() {
            self.animation_frame = (self.animation_frame + 1) % 3;
        }
    }

    pub fn scroll_up(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = self.scroll.saturating_add(lines).min(self.max_scroll);
    }

    pub fn scroll_page_up(&mut self) {
        self.scroll_up((self.chat_height / 2).max(1));
    }

    pub fn scroll_page_down(&mut self) {
        self.scroll_down((self.chat_height / 2).max(1));
    }

    pub fn insert_char(&mut self, c: char) {
        let byte_pos = char_to_byte_index(&self.input, self.cursor);
        self.input.insert(byte_pos, c);
        self.cursor += 1;
    }

    pub fn backspace(&mut self) {
        if self.cursor > 0 {
            self.cursor -= 1;
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn delete(&mut self) {
        if self.cursor < self.input.chars().count() {
            let byte_pos = char_to_byte_index(&self.input, self.cursor);
            self.input.remove(byte_pos);
        }
    }

    pub fn cursor_left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn cursor_right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.input.chars().count());
    }

    pub fn cursor_home(&mut self) {
        self.cursor = 0;
    }

    pub fn cursor_end(&mut self) {
        self.cursor = self.input.chars().count();
    }
}
