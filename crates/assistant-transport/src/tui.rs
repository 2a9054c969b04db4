//! Terminal chat helpers for ratatui applications.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
};

use crate::chat::{ChatMessage, ChatRole};

/// Number of identifier characters shown in the status bar.
const ID_PREFIX_CHARS: usize = 12;

/// User intent decoded from a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    Input(char),
    Backspace,
    Submit,
    NewConversation,
    Cancel,
    ScrollUp,
    ScrollDown,
    PageUp,
    PageDown,
    Quit,
}

/// Map a crossterm key event to a chat action.
#[must_use]
pub fn key_to_action(key: &KeyEvent) -> Option<ChatAction> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c' | 'd') => Some(ChatAction::Quit),
            KeyCode::Char('n') => Some(ChatAction::NewConversation),
            _ => None,
        };
    }

    match key.code {
        KeyCode::Char(c) => Some(ChatAction::Input(c)),
        KeyCode::Backspace => Some(ChatAction::Backspace),
        KeyCode::Enter => Some(ChatAction::Submit),
        KeyCode::Esc => Some(ChatAction::Cancel),
        KeyCode::Up => Some(ChatAction::ScrollUp),
        KeyCode::Down => Some(ChatAction::ScrollDown),
        KeyCode::PageUp => Some(ChatAction::PageUp),
        KeyCode::PageDown => Some(ChatAction::PageDown),
        _ => None,
    }
}

/// Shorten an identifier for display, e.g. `session_1a2b...`.
#[must_use]
pub fn truncate_id(id: &str) -> String {
    let prefix: String = id.chars().take(ID_PREFIX_CHARS).collect();
    format!("{prefix}...")
}

/// Render the transcript as styled lines, one blank line between messages.
///
/// `failed` tells whether the entry at an index is a failed turn.
#[must_use]
pub fn transcript_lines(messages: &[ChatMessage], failed: impl Fn(usize) -> bool) -> Vec<Line<'_>> {
    let mut lines = Vec::new();

    for (index, message) in messages.iter().enumerate() {
        let (label, color) = match message.role {
            ChatRole::User => ("You", Color::Cyan),
            ChatRole::Assistant if failed(index) => ("Assistant", Color::Red),
            ChatRole::Assistant => ("Assistant", Color::Green),
        };
        lines.push(Line::from(Span::styled(
            label,
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        )));
        lines.extend(message.content.lines().map(Line::from));
        lines.push(Line::default());
    }

    lines
}

/// Wrapped transcript paragraph and the number of rows it takes at `width`.
#[must_use]
pub fn transcript_paragraph(lines: Vec<Line<'_>>, width: u16) -> (Paragraph<'_>, usize) {
    let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false });
    let rows = paragraph.line_count(width);
    (paragraph, rows)
}

/// Scroll position of the transcript pane.
///
/// Follows the newest rows until the user scrolls up; [`Self::follow`]
/// turns following back on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscriptScroll {
    offset: u16,
    following: bool,
}

impl Default for TranscriptScroll {
    fn default() -> Self {
        Self {
            offset: 0,
            following: true,
        }
    }
}

impl TranscriptScroll {
    #[must_use]
    pub const fn offset(&self) -> u16 {
        self.offset
    }

    #[must_use]
    pub const fn is_following(&self) -> bool {
        self.following
    }

    /// Stick to the bottom again.
    pub const fn follow(&mut self) {
        self.following = true;
    }

    pub const fn scroll_up(&mut self, rows: u16) {
        self.following = false;
        self.offset = self.offset.saturating_sub(rows);
    }

    pub const fn scroll_down(&mut self, rows: u16) {
        self.offset = self.offset.saturating_add(rows);
    }

    /// Clamp to the content and return the offset to render with.
    pub fn resolve(&mut self, content_rows: usize, viewport_rows: u16) -> u16 {
        let bottom = content_rows.saturating_sub(usize::from(viewport_rows));
        let bottom = u16::try_from(bottom).unwrap_or(u16::MAX);
        if self.following || self.offset > bottom {
            self.offset = bottom;
        }
        self.offset
    }
}
