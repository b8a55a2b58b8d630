use super::state::{FocusPane, InputKind, TuiState, UiMode};
use crate::download::binding::ButtonMode;
use crate::ui::dialog::DialogKind;
use crate::view::fragment::{BarStyle, CloseAction, ControlState, Fragment, PauseIcon};
use fluent::fluent_args;
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Gauge, List, ListItem, Paragraph, Wrap},
};

/// Main rendering function
pub fn render(state: &TuiState, f: &mut Frame) {
    let size = f.area();

    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Header
            Constraint::Min(0),    // Content area
            Constraint::Length(1), // Status bar
        ])
        .split(size);

    render_header(state, f, main_chunks[0]);
    render_main(state, f, main_chunks[1]);
    render_status_bar(state, f, main_chunks[2]);

    match state.ui_mode {
        UiMode::Input(kind) => render_input_dialog(state, kind, f, size),
        UiMode::Help => render_help(state, f, size),
        UiMode::Normal => {}
    }
}

fn render_header(state: &TuiState, f: &mut Frame, area: Rect) {
    let args = fluent_args!["count" => state.badge_count];
    let line = Line::from(vec![
        Span::styled(
            format!(" {} ", state.t("tui-title")),
            Style::default()
                .fg(Color::Black)
                .bg(Color::Rgb(255, 220, 100))
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(
            state.t_with_args("tui-badge", Some(&args)),
            Style::default().fg(Color::Cyan),
        ),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

/// Left: formats above the compact queue. Right: details of the selection.
fn render_main(state: &TuiState, f: &mut Frame, area: Rect) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(42), Constraint::Percentage(58)])
        .split(area);

    let left = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(columns[0]);

    render_formats(state, f, left[0]);
    render_queue(state, f, left[1]);
    render_details(state, f, columns[1]);
}

fn border_style(focused: bool) -> Style {
    if focused {
        Style::default().fg(Color::Rgb(255, 220, 100))
    } else {
        Style::default().fg(Color::Rgb(80, 80, 100))
    }
}

fn render_formats(state: &TuiState, f: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(state.focus_pane == FocusPane::Formats))
        .title(state.t("tui-formats"));

    if state.format_rows.is_empty() {
        let text = match state.analyzing {
            Some(total) => {
                let args = fluent_args!["total" => total];
                state.t_with_args("tui-analyzing", Some(&args))
            }
            None => state.t("tui-no-results"),
        };
        let paragraph = Paragraph::new(text)
            .style(Style::default().fg(Color::Gray))
            .block(block)
            .wrap(Wrap { trim: true });
        f.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = state
        .format_rows
        .iter()
        .map(|row| {
            let button_key = match row.mode {
                ButtonMode::Download => "button-download",
                ButtonMode::Pause => "button-pause",
                ButtonMode::Resume => "button-resume",
            };
            let button_style = if row.enabled {
                Style::default().fg(Color::Rgb(100, 200, 255))
            } else {
                Style::default().fg(Color::DarkGray)
            };
            let size = row.request.format.size.as_deref().unwrap_or("");
            ListItem::new(Line::from(vec![
                Span::styled(format!("[{}] ", state.t(button_key)), button_style),
                Span::raw(format!(
                    "{} ({}) {}",
                    row.request.format.display_label(),
                    row.request.format.ext,
                    size
                )),
                Span::styled(
                    format!("  {}", row.request.title),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::Rgb(60, 60, 80))
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("▶ ");
    f.render_stateful_widget(list, area, &mut *state.format_list_state_mut());
}

fn render_queue(state: &TuiState, f: &mut Frame, area: Rect) {
    let args = fluent_args!["count" => state.badge_count];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(state.focus_pane == FocusPane::Queue))
        .title(format!(
            "{} - {}",
            state.t("tui-queue"),
            state.t_with_args("tui-badge", Some(&args))
        ));

    if state.compact.is_empty() {
        let paragraph = Paragraph::new(state.t("tui-no-tasks"))
            .style(Style::default().fg(Color::Gray))
            .block(block);
        f.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = state
        .compact
        .iter()
        .map(|fragment| {
            let status_style = if fragment.status_is_error {
                Style::default().fg(Color::Rgb(255, 100, 100))
            } else {
                Style::default().fg(Color::Gray)
            };
            ListItem::new(vec![
                Line::from(Span::styled(
                    fragment.title.clone(),
                    Style::default().add_modifier(Modifier::BOLD),
                )),
                Line::from(vec![
                    Span::styled(
                        format_progress_bar(fragment.bar_width, 12),
                        Style::default().fg(bar_color(fragment.bar_style)),
                    ),
                    Span::raw(format!(" {:>3}% ", fragment.percent)),
                    Span::styled(fragment.status_text.clone(), status_style),
                ]),
            ])
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::Rgb(60, 60, 80)))
        .highlight_symbol("▶ ");
    f.render_stateful_widget(list, area, &mut *state.task_list_state_mut());
}

fn render_details(state: &TuiState, f: &mut Frame, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style(false))
        .title(state.t("tui-details"));

    let Some(fragment) = state.selected_detail() else {
        let paragraph = Paragraph::new(state.t("tui-no-tasks"))
            .style(Style::default().fg(Color::Gray))
            .block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Title and state
            Constraint::Length(1), // Gauge
            Constraint::Length(2), // Controls
            Constraint::Min(0),    // Info and logs
        ])
        .split(inner);

    let mut header = vec![
        Line::from(Span::styled(
            fragment.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled(
                state.t(fragment.state.label_key()),
                Style::default().fg(bar_color(fragment.bar_style)),
            ),
            Span::raw("  "),
            Span::raw(fragment.status_text.clone()),
        ]),
    ];
    if fragment.reverted {
        header.push(Line::from(Span::styled(
            format!("({})", state.t("tui-reverted")),
            Style::default().fg(Color::Yellow),
        )));
    }
    f.render_widget(Paragraph::new(header), chunks[0]);

    let gauge = Gauge::default()
        .gauge_style(Style::default().fg(bar_color(fragment.bar_style)))
        .percent(u16::from(fragment.bar_width.min(100)))
        .label(format!("{}%", fragment.percent));
    f.render_widget(gauge, chunks[1]);

    f.render_widget(Paragraph::new(control_line(state, fragment)), chunks[2]);

    let mut lines = Vec::new();
    if let Some(size) = &fragment.size_label {
        lines.push(Line::from(format!("{}: {}", state.t("tui-size"), size)));
    }
    if let Some(error) = &fragment.error {
        lines.push(Line::from(Span::styled(
            format!("{}: {}", state.t("tui-error"), error),
            Style::default().fg(Color::Rgb(255, 100, 100)),
        )));
    }
    if !fragment.log_lines.is_empty() {
        lines.push(Line::from(Span::styled(
            state.t("tui-log"),
            Style::default().fg(Color::DarkGray),
        )));
        lines.extend(fragment.log_lines.iter().map(|l| Line::from(l.clone())));
    }
    f.render_widget(Paragraph::new(lines).wrap(Wrap { trim: false }), chunks[3]);
}

/// `[p] Pause  [r] Retry  [x] Cancel`, dimmed when disabled
fn control_line<'a>(state: &TuiState, fragment: &Fragment) -> Line<'a> {
    let mut spans = Vec::new();
    let mut push = |key: &str, label: String, control: ControlState| {
        if !control.is_visible() {
            return;
        }
        let style = if control == ControlState::Enabled {
            Style::default().fg(Color::Cyan)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        spans.push(Span::styled(format!("[{}] {}  ", key, label), style));
    };

    let pause_label = match fragment.pause_icon {
        PauseIcon::Pause => state.t("button-pause"),
        PauseIcon::Play => state.t("button-resume"),
    };
    push("p", pause_label, fragment.pause);
    push("r", state.t("button-retry"), fragment.retry);
    let close_label = match fragment.close {
        CloseAction::Cancel => state.t("button-cancel"),
        CloseAction::Dismiss => state.t("button-close"),
    };
    push("x", close_label, ControlState::Enabled);

    Line::from(spans)
}

fn render_status_bar(state: &TuiState, f: &mut Frame, area: Rect) {
    let line = if let Some(dialog) = &state.dialog {
        let color = match dialog.kind {
            DialogKind::Info => Color::Rgb(100, 220, 130),
            DialogKind::Warning => Color::Rgb(255, 200, 100),
            DialogKind::Error => Color::Rgb(255, 100, 100),
        };
        Line::from(vec![
            Span::styled(
                format!("{}: ", dialog.title),
                Style::default().fg(color).add_modifier(Modifier::BOLD),
            ),
            Span::styled(dialog.message.clone(), Style::default().fg(color)),
            Span::styled("  (Esc)", Style::default().fg(Color::DarkGray)),
        ])
    } else if let Some(notice) = &state.notice {
        Line::from(Span::styled(notice.clone(), Style::default().fg(Color::Cyan)))
    } else {
        Line::from(Span::styled(state.t("tui-help"), Style::default().fg(Color::Cyan)))
    };
    f.render_widget(Paragraph::new(line), area);
}

fn render_input_dialog(state: &TuiState, kind: InputKind, f: &mut Frame, area: Rect) {
    let dialog_width = area.width.saturating_sub(4).min(80);
    let dialog_height = 10.min(area.height);

    let dialog_area = Rect {
        x: (area.width.saturating_sub(dialog_width)) / 2,
        y: (area.height.saturating_sub(dialog_height)) / 2,
        width: dialog_width,
        height: dialog_height,
    };

    let title = match kind {
        InputKind::Analyze => state.t("tui-input-analyze"),
        InputKind::Batch => state.t("tui-input-batch"),
    };
    let paragraph = Paragraph::new(format!("{}█", state.input_buffer))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(title)
                .style(Style::default().bg(Color::Black)),
        )
        .wrap(Wrap { trim: false });

    f.render_widget(Clear, dialog_area);
    f.render_widget(paragraph, dialog_area);
}

fn render_help(state: &TuiState, f: &mut Frame, area: Rect) {
    let dialog_width = area.width.saturating_sub(4).min(60);
    let dialog_height = 14.min(area.height);

    let dialog_area = Rect {
        x: (area.width.saturating_sub(dialog_width)) / 2,
        y: (area.height.saturating_sub(dialog_height)) / 2,
        width: dialog_width,
        height: dialog_height,
    };

    let lines: Vec<Line> = state
        .t("tui-help")
        .split("  ")
        .map(|entry| Line::from(entry.to_string()))
        .collect();
    let paragraph = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .title(state.t("tui-title"))
            .style(Style::default().bg(Color::Black)),
    );

    f.render_widget(Clear, dialog_area);
    f.render_widget(paragraph, dialog_area);
}

fn bar_color(style: BarStyle) -> Color {
    match style {
        BarStyle::Active => Color::Rgb(100, 200, 255),    // Sky blue
        BarStyle::Paused => Color::Rgb(150, 150, 160),    // Muted gray
        BarStyle::Completed => Color::Rgb(100, 220, 130), // Fresh green
        BarStyle::Failed => Color::Rgb(255, 100, 100),    // Soft red
        BarStyle::Cancelled => Color::Rgb(120, 120, 130), // Dark gray
    }
}

/// Text bar for a fill share of 0..=100
fn format_progress_bar(fill: u8, width: usize) -> String {
    let filled = (usize::from(fill.min(100)) * width) / 100;
    let remaining = width.saturating_sub(filled);

    let mut bar = String::with_capacity(width * 3);
    for _ in 0..filled {
        bar.push('█');
    }
    for _ in 0..remaining {
        bar.push('░');
    }
    bar
}
