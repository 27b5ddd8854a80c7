// Handles the rendering of widgets to the terminal frame.

use super::model::ServiceState;
use super::row::ServiceRow;
use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

pub const TITLE: &str = " DB stat ";
pub const NO_ENGINES: &str = "No supported database engines found";

/// Main render function called every frame.
pub fn render(
    f: &mut Frame,
    rows: &[ServiceRow],
    list_state: &mut ListState,
    notice: Option<&str>,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(f.area());

    if rows.is_empty() {
        render_empty(f, chunks[0]);
    } else {
        render_rows(f, chunks[0], rows, list_state);
    }
    render_footer(f, chunks[1], notice);
}

fn render_empty(f: &mut Frame, area: Rect) {
    let paragraph = Paragraph::new(NO_ENGINES)
        .alignment(Alignment::Center)
        .block(Block::default().borders(Borders::ALL).title(TITLE));
    f.render_widget(paragraph, area);
}

fn render_rows(f: &mut Frame, area: Rect, rows: &[ServiceRow], state: &mut ListState) {
    let items: Vec<ListItem> = rows.iter().map(|row| ListItem::new(row_line(row))).collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(TITLE))
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .bg(Color::DarkGray),
        )
        .highlight_symbol(">> ");

    f.render_stateful_widget(list, area, state);
}

pub fn row_line(row: &ServiceRow) -> Line<'static> {
    let (symbol, color) = match row.state() {
        ServiceState::Active => ("●", Color::Green),
        ServiceState::Failed => ("✖", Color::Red),
        ServiceState::Inactive => ("○", Color::DarkGray),
        ServiceState::Other => ("?", Color::Yellow),
    };

    Line::from(vec![
        Span::styled(symbol, Style::default().fg(color)),
        Span::raw(format!(" {:<24}", row.title())),
        Span::styled(
            format!("{:<14}", row.status_text()),
            Style::default().fg(Color::Gray),
        ),
        Span::styled(
            format!("[{}]", row.control().label()),
            Style::default().fg(Color::Cyan),
        ),
    ])
}

fn render_footer(f: &mut Frame, area: Rect, notice: Option<&str>) {
    let help_text = match notice {
        Some(message) => Line::from(Span::styled(
            message.to_string(),
            Style::default().fg(Color::Red),
        )),
        None => Line::from(vec![
            Span::raw("Nav: "),
            Span::styled("j/k ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("| Press: "),
            Span::styled("Enter ", Style::default().fg(Color::Cyan)),
            Span::raw("| Refresh: "),
            Span::styled("r ", Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("| Quit: "),
            Span::styled("q", Style::default().fg(Color::Red)),
        ]),
    };

    let paragraph =
        Paragraph::new(help_text).block(Block::default().borders(Borders::ALL).title(" Controls "));

    f.render_widget(paragraph, area);
}
