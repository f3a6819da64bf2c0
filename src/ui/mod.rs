use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};
use std::time::Instant;

use crate::app::{App, Popup};
use crate::barcode::Symbology;
use crate::frame::Field;
use crate::panel::TransitionState;
use crate::theme::Theme;

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();
    let now = Instant::now();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Info line
            Constraint::Min(6),    // Frame + preview
            Constraint::Length(1), // Footer
        ])
        .split(area);

    let text_height = app.frame.panel_height_percent(now);
    let body = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(text_height),
            Constraint::Percentage(100 - text_height),
        ])
        .split(chunks[1]);

    draw_info_line(f, app, chunks[0]);
    draw_text_frame(f, app, body[0]);
    draw_preview(f, app, body[1]);
    draw_footer(f, app, chunks[2]);

    match app.popup {
        Popup::None => {}
        Popup::SignIn => draw_sign_in(f, app),
        Popup::Help => draw_help_popup(f, &app.theme),
    }
}

fn draw_info_line(f: &mut Frame, app: &App, area: Rect) {
    let t = &app.theme;
    let line = if let Some(ref status) = app.status_message {
        Line::from(Span::styled(status, Style::default().fg(t.warning)))
    } else {
        match app.user() {
            Some(user) => Line::from(vec![
                Span::styled("● ", Style::default().fg(t.success)),
                Span::styled(user.as_str(), Style::default().fg(t.text)),
            ]),
            None => Line::from(Span::styled("Not signed in (Ctrl-L to sign in)", Style::default().fg(t.text_dim))),
        }
    };

    f.render_widget(Paragraph::new(line).alignment(Alignment::Center), area);
}

fn draw_text_frame(f: &mut Frame, app: &App, area: Rect) {
    let t = &app.theme;
    let block = Block::default()
        .title(Span::styled(" Barcodes text ", Style::default().fg(t.accent).add_modifier(Modifier::BOLD)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(t.accent));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(2), Constraint::Length(1)])
        .split(inner);

    draw_lines_table(f, app, chunks[0]);
    draw_frame_controls(f, app, chunks[1]);
}

fn draw_lines_table(f: &mut Frame, app: &App, area: Rect) {
    let t = &app.theme;
    let focused = app.frame.focused();

    let header = Row::new(vec![
        Span::styled("#", Style::default().fg(t.header)),
        Span::styled("Prefix", Style::default().fg(t.header)),
        Span::styled("Text", Style::default().fg(t.header)),
        Span::styled("Type", Style::default().fg(t.header)),
    ]);

    let rows: Vec<Row> = app
        .lines
        .iter()
        .enumerate()
        .map(|(i, line)| {
            let cell = |value: &str, field: Field| {
                if i == focused && app.frame.field() == field {
                    Line::from(vec![
                        Span::styled(value.to_string(), Style::default().fg(t.text)),
                        Span::styled("_", Style::default().fg(t.accent)),
                    ])
                } else if value.is_empty() {
                    Line::from(Span::styled("·", Style::default().fg(t.inactive)))
                } else {
                    Line::from(Span::styled(value.to_string(), Style::default().fg(t.text)))
                }
            };

            let type_color = if line.symbology == app.frame.default_type() { t.text_dim } else { t.accent };
            Row::new(vec![
                Line::from(Span::styled(format!("{}", i + 1), Style::default().fg(t.text_dim))),
                cell(&line.prefix, Field::Prefix),
                cell(&line.text, Field::Text),
                Line::from(Span::styled(line.symbology.as_str(), Style::default().fg(type_color))),
            ])
        })
        .collect();

    let widths = [
        Constraint::Length(4),
        Constraint::Percentage(25),
        Constraint::Fill(1),
        Constraint::Length(9),
    ];

    let table = Table::new(rows, widths)
        .header(header)
        .row_highlight_style(Style::default().bg(t.bg_selected));

    let mut state = TableState::default().with_selected(Some(focused));
    f.render_stateful_widget(table, area, &mut state);

    app.table_area.set(area);
    app.table_offset.set(state.offset());
}

fn draw_frame_controls(f: &mut Frame, app: &App, area: Rect) {
    let t = &app.theme;
    let mut spans = vec![
        Span::styled("[ ", Style::default().fg(t.text_dim)),
        Span::styled("Add new line", Style::default().fg(t.accent)),
        Span::styled(" ^N ]  ", Style::default().fg(t.text_dim)),
        Span::styled("Default:", Style::default().fg(t.text_dim)),
    ];
    for symbology in Symbology::ALL {
        let style = if symbology == app.frame.default_type() {
            Style::default().fg(t.accent).add_modifier(Modifier::BOLD | Modifier::REVERSED)
        } else {
            Style::default().fg(t.inactive)
        };
        spans.push(Span::raw(" "));
        spans.push(Span::styled(format!(" {} ", symbology), style));
    }
    spans.push(Span::styled("  ^Y", Style::default().fg(t.text_dim)));

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_preview(f: &mut Frame, app: &App, area: Rect) {
    let t = &app.theme;
    let title = match app.frame.panel_state(Instant::now()) {
        TransitionState::Entering | TransitionState::Entered => " Preview (collapsed, ^P) ",
        TransitionState::Exiting | TransitionState::Exited => " Preview ",
    };
    let block = Block::default()
        .title(Span::styled(title, Style::default().fg(t.inactive)))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(t.inactive));

    let lines: Vec<Line> = app
        .lines
        .iter()
        .map(|line| {
            let hovered = app.hovered == Some(line.id);
            let base = if hovered {
                Style::default().fg(t.hover).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(t.text)
            };
            let payload = line.payload();
            let payload_span = if payload.is_empty() {
                Span::styled("(empty)", Style::default().fg(t.text_dim))
            } else {
                Span::styled(payload, base)
            };
            Line::from(vec![
                Span::styled(format!("{:<8}", line.symbology.as_str()), base),
                Span::styled("│ ", Style::default().fg(t.inactive)),
                payload_span,
            ])
        })
        .collect();

    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let t = &app.theme;
    let key = |k: &'static str| Span::styled(k, Style::default().fg(t.accent));
    let desc = |d: &'static str| Span::styled(d, Style::default().fg(t.text_dim));

    let footer = Paragraph::new(Line::from(vec![
        key("Enter"), desc(" add  "),
        key("Tab"), desc(" field  "),
        key("^D"), desc(" delete  "),
        key("^T"), desc(" type  "),
        key("^P"), desc(" preview  "),
        key("F1"), desc(" help  "),
        key("^Q"), desc(" quit"),
    ]))
    .alignment(Alignment::Center);

    f.render_widget(footer, area);
}

fn draw_sign_in(f: &mut Frame, app: &App) {
    let t = &app.theme;
    let popup_area = centered_rect(50, 20, f.area());
    f.render_widget(Clear, popup_area);

    let input = Paragraph::new(vec![
        Line::from(""),
        Line::from(vec![
            Span::styled(app.input_buffer.as_str(), Style::default().fg(t.text)),
            Span::styled("_", Style::default().fg(t.accent)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Enter", Style::default().fg(t.success).add_modifier(Modifier::BOLD)),
            Span::styled(" sign in   ", Style::default().fg(t.text_dim)),
            Span::styled("Esc", Style::default().fg(t.danger)),
            Span::styled(" cancel", Style::default().fg(t.text_dim)),
        ]),
    ])
    .alignment(Alignment::Center)
    .block(
        Block::default()
            .title(Span::styled(" Sign in: user id ", Style::default().fg(t.accent)))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(t.accent)),
    );

    f.render_widget(input, popup_area);
}

fn draw_help_popup(f: &mut Frame, t: &Theme) {
    let area = f.area();
    let popup_area = centered_rect(
        if area.width < 80 { 95 } else { 60 },
        if area.height < 30 { 95 } else { 70 },
        area,
    );

    f.render_widget(Clear, popup_area);

    let section = |title: &'static str| {
        Line::from(Span::styled(title, Style::default().fg(t.header).add_modifier(Modifier::BOLD)))
    };
    let binding = |keys: &'static str, what: &'static str| {
        Line::from(vec![
            Span::styled(format!("  {:<12}", keys), Style::default().fg(t.accent)),
            Span::raw(what),
        ])
    };

    let help_text = vec![
        section("═══ Lines ═══"),
        binding("Enter / ^N", "Add a new line with the default type"),
        binding("^D", "Delete the focused line"),
        binding("^T", "Cycle the focused line's type"),
        binding("Tab", "Switch between prefix and text"),
        binding("↑/↓", "Move between lines"),
        Line::from(""),
        section("═══ Defaults ═══"),
        binding("^Y", "Cycle the default type for new lines"),
        Line::from(Span::styled(
            "              Saved to your preferences while signed in",
            Style::default().fg(t.text_dim),
        )),
        binding("^L / ^O", "Sign in / sign out"),
        Line::from(""),
        section("═══ View ═══"),
        binding("^P", "Collapse or expand the preview"),
        binding("^Q / ^C", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", Style::default().fg(t.text_dim)),
            Span::styled("F1", Style::default().fg(t.accent)),
            Span::styled("/", Style::default().fg(t.text_dim)),
            Span::styled("Esc", Style::default().fg(t.accent)),
            Span::styled(" to close", Style::default().fg(t.text_dim)),
        ]),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(Span::styled(" barcode-text Help ", Style::default().fg(t.accent)))
                .borders(Borders::ALL)
                .border_style(Style::default().fg(t.accent)),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
