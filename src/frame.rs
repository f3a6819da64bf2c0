//! The barcode-text frame
//!
//! Edits the line list owned by the app, follows the signed-in user's
//! default type and tracks the collapsible panel. The list itself is lent
//! in on every call; the frame keeps only focus and preference state.

use std::time::Instant;
use tokio::sync::watch;

use crate::barcode::lines;
use crate::barcode::{BarcodeLine, LineId, Symbology};
use crate::panel::{PanelTransition, TransitionState};
use crate::prefs::sync::{AuthState, DefaultTypeSync};
use crate::prefs::{AuthProvider, UserId};

/// Editable column of the focused line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Prefix,
    Text,
}

impl Field {
    pub fn toggle(self) -> Self {
        match self {
            Field::Prefix => Field::Text,
            Field::Text => Field::Prefix,
        }
    }
}

pub struct TextFrame {
    sync: DefaultTypeSync,
    auth_rx: watch::Receiver<Option<UserId>>,
    focused: usize,
    field: Field,
    known_len: usize,
    auth_closed: bool,
    panel: PanelTransition,
}

impl TextFrame {
    /// Mount the frame: seed an empty list, subscribe to auth changes and
    /// apply the current session right away.
    pub fn mount(
        auth: &dyn AuthProvider,
        sync: DefaultTypeSync,
        lines: &mut Vec<BarcodeLine>,
        is_collapsed: bool,
    ) -> Self {
        if let Some(max_id) = lines.iter().map(|line| line.id).max() {
            LineId::observe(max_id);
        }

        let mut auth_rx = auth.subscribe();
        let user = auth_rx.borrow_and_update().clone();

        let mut frame = Self {
            sync,
            auth_rx,
            focused: 0,
            field: Field::Text,
            known_len: lines.len(),
            auth_closed: false,
            panel: PanelTransition::new(is_collapsed),
        };
        frame.sync.on_auth_changed(user);

        *lines = lines::seed_if_empty(std::mem::take(lines), frame.default_type(), LineId::generate());
        frame.refocus(lines);
        frame
    }

    pub fn default_type(&self) -> Symbology {
        self.sync.default_type()
    }

    pub fn auth_state(&self) -> &AuthState {
        self.sync.state()
    }

    pub fn focused(&self) -> usize {
        self.focused
    }

    pub fn field(&self) -> Field {
        self.field
    }

    pub fn focused_id(&self, lines: &[BarcodeLine]) -> Option<LineId> {
        lines.get(self.focused).map(|line| line.id)
    }

    /// Pick up auth changes and finished preference loads.
    /// Returns true when something visible changed.
    pub fn tick(&mut self) -> bool {
        let mut changed = false;

        if !self.auth_closed {
            match self.auth_rx.has_changed() {
                Ok(true) => {
                    let user = self.auth_rx.borrow_and_update().clone();
                    self.sync.on_auth_changed(user);
                    changed = true;
                }
                Ok(false) => {}
                Err(_) => {
                    tracing::debug!("Auth provider dropped its session channel");
                    self.auth_closed = true;
                }
            }
        }

        changed | self.sync.poll_loaded()
    }

    /// Move focus after the list length changed: growth focuses the newest
    /// line, shrinking clamps to the last one
    fn refocus(&mut self, lines: &[BarcodeLine]) {
        if lines.len() > self.known_len {
            self.focused = lines.len() - 1;
            self.field = Field::Text;
        } else {
            self.focused = self.focused.min(lines.len().saturating_sub(1));
        }
        self.known_len = lines.len();
    }

    pub fn add_line(&mut self, lines: &mut Vec<BarcodeLine>) {
        *lines = lines::append(std::mem::take(lines), self.default_type(), LineId::generate());
        self.refocus(lines);
    }

    pub fn delete_line(&mut self, lines: &mut Vec<BarcodeLine>, id: LineId) {
        *lines = lines::delete(std::mem::take(lines), id);
        self.refocus(lines);
    }

    pub fn delete_focused(&mut self, lines: &mut Vec<BarcodeLine>) {
        if let Some(id) = self.focused_id(lines) {
            self.delete_line(lines, id);
        }
    }

    pub fn set_text(&mut self, lines: &mut Vec<BarcodeLine>, id: LineId, text: String) {
        *lines = lines::update_text(std::mem::take(lines), id, text);
    }

    pub fn set_prefix(&mut self, lines: &mut Vec<BarcodeLine>, id: LineId, prefix: String) {
        *lines = lines::update_prefix(std::mem::take(lines), id, prefix);
    }

    pub fn set_type(&mut self, lines: &mut Vec<BarcodeLine>, id: LineId, symbology: Symbology) {
        *lines = lines::update_type(std::mem::take(lines), id, symbology);
    }

    /// Type a character into the focused field
    pub fn insert_char(&mut self, lines: &mut Vec<BarcodeLine>, c: char) {
        self.edit_focused(lines, |value| value.push(c));
    }

    pub fn backspace(&mut self, lines: &mut Vec<BarcodeLine>) {
        self.edit_focused(lines, |value| {
            value.pop();
        });
    }

    fn edit_focused(&mut self, lines: &mut Vec<BarcodeLine>, edit: impl FnOnce(&mut String)) {
        let Some(line) = lines.get(self.focused) else {
            return;
        };
        let id = line.id;
        let mut value = match self.field {
            Field::Prefix => line.prefix.clone(),
            Field::Text => line.text.clone(),
        };
        edit(&mut value);
        match self.field {
            Field::Prefix => self.set_prefix(lines, id, value),
            Field::Text => self.set_text(lines, id, value),
        }
    }

    pub fn cycle_focused_type(&mut self, lines: &mut Vec<BarcodeLine>) {
        if let Some(line) = lines.get(self.focused) {
            let (id, next) = (line.id, line.symbology.next());
            self.set_type(lines, id, next);
        }
    }

    /// Change the default type for new lines. Persisted in the background
    /// when signed in; failures never reach the UI.
    pub fn set_default_type(&mut self, symbology: Symbology) {
        let _ = self.sync.set_default_type(symbology);
    }

    pub fn cycle_default_type(&mut self) {
        self.set_default_type(self.default_type().next());
    }

    pub fn move_up(&mut self, lines: &[BarcodeLine]) {
        if !lines.is_empty() {
            self.focused = self.focused.checked_sub(1).unwrap_or(lines.len() - 1);
        }
    }

    pub fn move_down(&mut self, lines: &[BarcodeLine]) {
        if !lines.is_empty() {
            self.focused = (self.focused + 1) % lines.len();
        }
    }

    pub fn focus_row(&mut self, lines: &[BarcodeLine], row: usize) {
        if row < lines.len() {
            self.focused = row;
        }
    }

    pub fn toggle_field(&mut self) {
        self.field = self.field.toggle();
    }

    /// Report the row under the pointer to the app's hover setter
    pub fn mouse_enter(&self, id: LineId, set_hovered: &mut Option<LineId>) {
        *set_hovered = Some(id);
    }

    pub fn mouse_leave(&self, set_hovered: &mut Option<LineId>) {
        *set_hovered = None;
    }

    pub fn set_collapsed(&mut self, is_collapsed: bool, now: Instant) {
        self.panel.set_flag(is_collapsed, now);
    }

    pub fn panel_state(&self, now: Instant) -> TransitionState {
        self.panel.state(now)
    }

    pub fn panel_height_percent(&self, now: Instant) -> u16 {
        self.panel.height_percent(now)
    }

    pub fn panel_animating(&self, now: Instant) -> bool {
        self.panel.is_animating(now)
    }
}
