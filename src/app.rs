use anyhow::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use ratatui::layout::Rect;
use std::cell::Cell;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::barcode::{BarcodeLine, LineId};
use crate::config::AppConfig;
use crate::frame::TextFrame;
use crate::prefs::sync::{AuthState, DefaultTypeSync};
use crate::prefs::{AuthProvider, LocalAuth, PreferenceStore, UserId};
use crate::theme::Theme;

/// How long a status message stays in the info line
const STATUS_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Popup {
    None,
    SignIn,
    Help,
}

pub struct App {
    pub popup: Popup,

    // Owned here, lent to the frame on every call
    pub lines: Vec<BarcodeLine>,
    pub hovered: Option<LineId>,
    pub preview_collapsed: bool,

    pub frame: TextFrame,
    auth: Arc<LocalAuth>,

    pub config: AppConfig,
    persist_config: bool,
    pub theme: Theme,

    // Sign-in popup input
    pub input_buffer: String,

    // Status message (shown in info line, auto-clears after timeout)
    pub status_message: Option<String>,
    pub status_message_time: Option<Instant>,

    // Written by the renderer so mouse events can be mapped to rows
    pub table_area: Cell<Rect>,
    pub table_offset: Cell<usize>,
}

impl App {
    pub fn new(
        config: AppConfig,
        auth: Arc<LocalAuth>,
        store: Arc<dyn PreferenceStore>,
        mut lines: Vec<BarcodeLine>,
        persist_config: bool,
    ) -> Self {
        let preview_collapsed = config.preview_collapsed;
        let frame = TextFrame::mount(auth.as_ref(), DefaultTypeSync::new(store), &mut lines, preview_collapsed);
        let theme = Theme::from_overrides(&config.theme);

        Self {
            popup: Popup::None,
            lines,
            hovered: None,
            preview_collapsed,
            frame,
            auth,
            config,
            persist_config,
            theme,
            input_buffer: String::new(),
            status_message: None,
            status_message_time: None,
            table_area: Cell::new(Rect::default()),
            table_offset: Cell::new(0),
        }
    }

    /// Set a status message (auto-clears after 3 seconds)
    fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
        self.status_message_time = Some(Instant::now());
    }

    fn save_config(&self) {
        if !self.persist_config {
            return;
        }
        if let Err(e) = self.config.save() {
            tracing::warn!("Failed to save config: {}", e);
        }
    }

    /// Signed-in user, if any
    pub fn user(&self) -> Option<&UserId> {
        match self.frame.auth_state() {
            AuthState::Authenticated(user) => Some(user),
            AuthState::Anonymous => None,
        }
    }

    pub async fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        // Handle popups first
        if self.popup != Popup::None {
            return self.handle_popup_key(key).await;
        }

        self.handle_normal_key(key).await
    }

    async fn handle_normal_key(&mut self, key: KeyEvent) -> Result<()> {
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            match key.code {
                KeyCode::Char('n') => self.frame.add_line(&mut self.lines),
                KeyCode::Char('d') => {
                    self.frame.delete_focused(&mut self.lines);
                    self.clear_stale_hover();
                }
                KeyCode::Char('t') => self.frame.cycle_focused_type(&mut self.lines),
                KeyCode::Char('y') => {
                    self.frame.cycle_default_type();
                    self.set_status(format!("Default type: {}", self.frame.default_type()));
                }
                KeyCode::Char('p') => self.toggle_preview(),
                KeyCode::Char('l') => self.start_sign_in(),
                KeyCode::Char('o') => self.sign_out(),
                _ => {}
            }
            return Ok(());
        }

        match key.code {
            // Enter in a line adds the next one
            KeyCode::Enter => self.frame.add_line(&mut self.lines),
            KeyCode::Tab | KeyCode::BackTab => self.frame.toggle_field(),
            KeyCode::Up => self.frame.move_up(&self.lines),
            KeyCode::Down => self.frame.move_down(&self.lines),
            KeyCode::Backspace => self.frame.backspace(&mut self.lines),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::ALT) => {
                self.frame.insert_char(&mut self.lines, c)
            }
            KeyCode::F(1) => self.popup = Popup::Help,
            _ => {}
        }
        Ok(())
    }

    async fn handle_popup_key(&mut self, key: KeyEvent) -> Result<()> {
        match self.popup {
            Popup::SignIn => self.handle_sign_in_key(key),
            Popup::Help => {
                if matches!(key.code, KeyCode::Esc | KeyCode::Enter | KeyCode::F(1)) {
                    self.popup = Popup::None;
                }
                Ok(())
            }
            Popup::None => Ok(()),
        }
    }

    fn start_sign_in(&mut self) {
        self.popup = Popup::SignIn;
        self.input_buffer.clear();
    }

    fn handle_sign_in_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                self.popup = Popup::None;
                self.input_buffer.clear();
            }
            KeyCode::Enter => match UserId::parse(&self.input_buffer) {
                Some(user) => {
                    self.popup = Popup::None;
                    self.input_buffer.clear();
                    self.sign_in(user);
                }
                None => self.set_status("Enter a user id without spaces"),
            },
            KeyCode::Backspace => {
                self.input_buffer.pop();
            }
            KeyCode::Char(c) if !c.is_whitespace() => self.input_buffer.push(c),
            _ => {}
        }
        Ok(())
    }

    pub fn sign_in(&mut self, user: UserId) {
        self.set_status(format!("Signed in as {}", user));
        self.config.last_user = Some(user.to_string());
        self.save_config();
        self.auth.sign_in(user);
    }

    pub fn sign_out(&mut self) {
        if self.auth.current_user().is_none() {
            return;
        }
        self.auth.sign_out();
        self.config.last_user = None;
        self.save_config();
        self.set_status("Signed out");
    }

    fn toggle_preview(&mut self) {
        self.preview_collapsed = !self.preview_collapsed;
        self.frame.set_collapsed(self.preview_collapsed, Instant::now());
        self.config.preview_collapsed = self.preview_collapsed;
        self.save_config();
    }

    /// Drop the hover id if its line was deleted
    fn clear_stale_hover(&mut self) {
        if let Some(id) = self.hovered {
            if !self.lines.iter().any(|line| line.id == id) {
                self.frame.mouse_leave(&mut self.hovered);
            }
        }
    }

    /// Line index under a screen position, using the last rendered table
    fn row_at(&self, column: u16, row: u16) -> Option<usize> {
        let area = self.table_area.get();
        let body_top = area.y.saturating_add(1); // header row
        let inside = column >= area.x
            && column < area.x.saturating_add(area.width)
            && row >= body_top
            && row < area.y.saturating_add(area.height);
        if !inside {
            return None;
        }
        let idx = self.table_offset.get() + usize::from(row - body_top);
        (idx < self.lines.len()).then_some(idx)
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        let row = self.row_at(mouse.column, mouse.row);
        match mouse.kind {
            MouseEventKind::Moved => match row.map(|idx| self.lines[idx].id) {
                Some(id) if self.hovered != Some(id) => self.frame.mouse_enter(id, &mut self.hovered),
                None if self.hovered.is_some() => self.frame.mouse_leave(&mut self.hovered),
                _ => {}
            },
            MouseEventKind::Down(MouseButton::Left) => {
                if let Some(idx) = row {
                    self.frame.focus_row(&self.lines, idx);
                }
            }
            _ => {}
        }
    }

    /// Periodic housekeeping: auth/preference updates and status timeout
    pub async fn tick(&mut self) -> Result<()> {
        self.frame.tick();

        if let Some(time) = self.status_message_time {
            if time.elapsed() >= STATUS_TIMEOUT {
                self.status_message = None;
                self.status_message_time = None;
            }
        }
        Ok(())
    }
}
