// Handles the rendering of widgets to the terminal frame.

use super::model::{Availability, Notice, ServiceRecord, ServiceStatus, Snapshot};
use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap},
};

/// Main render function called every frame.
pub fn render(
    f: &mut Frame,
    snapshot: &Snapshot,
    acting_user: &str,
    notice: Option<&Notice>,
    list_state: &mut ListState,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(3)])
        .split(f.area());

    render_service_list(f, chunks[0], snapshot, acting_user, list_state);
    render_footer(f, chunks[1]);

    if let Some(notice) = notice {
        render_notice(f, notice);
    }
}

fn title(snapshot: &Snapshot) -> String {
    match &snapshot.label {
        Some(label) if snapshot.loading => format!(" Homebrew Services | {label} "),
        _ => " Homebrew Services ".to_string(),
    }
}

fn render_service_list(
    f: &mut Frame,
    area: Rect,
    snapshot: &Snapshot,
    acting_user: &str,
    state: &mut ListState,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(title(snapshot));

    if let Availability::Unavailable { path } = &snapshot.availability {
        let message = Paragraph::new(vec![
            Line::from(Span::styled(
                "Homebrew Services not found",
                Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            )),
            Line::from(format!("No executable at {}", path.display())),
        ])
        .block(block);
        f.render_widget(message, area);
        return;
    }

    if snapshot.services.is_empty() {
        let text = if snapshot.loading {
            "Refreshing..."
        } else {
            "No services available"
        };
        let message = Paragraph::new(Span::styled(text, Style::default().fg(Color::DarkGray)))
            .block(block);
        f.render_widget(message, area);
        return;
    }

    let items: Vec<ListItem> = snapshot
        .services
        .iter()
        .map(|service| service_item(service, acting_user))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .add_modifier(Modifier::BOLD)
                .bg(Color::DarkGray),
        )
        .highlight_symbol(">> ");

    f.render_stateful_widget(list, area, state);
}

fn service_item(service: &ServiceRecord, acting_user: &str) -> ListItem<'static> {
    let (status_symbol, color, status_text) = match service.status {
        ServiceStatus::Running => ("●", Color::Green, "started"),
        ServiceStatus::Stopped => ("○", Color::DarkGray, "stopped"),
        ServiceStatus::Unknown => ("?", Color::Yellow, "unknown"),
    };

    let foreign = service.is_foreign(acting_user);
    let name_style = if foreign {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default()
    };

    let mut spans = vec![
        Span::styled(status_symbol, Style::default().fg(color)),
        Span::styled(format!(" {:<32}", service.name), name_style),
        Span::styled(format!("[{status_text}]"), Style::default().fg(Color::Gray)),
    ];
    if let Some(owner) = &service.owner {
        spans.push(Span::styled(
            format!(" {owner}"),
            Style::default().fg(Color::Gray),
        ));
    }
    if foreign {
        spans.push(Span::styled(" (read-only)", Style::default().fg(Color::DarkGray)));
    }

    ListItem::new(Line::from(spans))
}

fn render_footer(f: &mut Frame, area: Rect) {
    let help_text = Line::from(vec![
        Span::raw("Nav: "),
        Span::styled("j/k ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("| Toggle: "),
        Span::styled("Enter ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("| Action: "),
        Span::styled(
            "s(start) x(stop) r(restart) ",
            Style::default().fg(Color::Cyan),
        ),
        Span::raw("| All: "),
        Span::styled("S X R ", Style::default().fg(Color::Cyan)),
        Span::raw("| Refresh: "),
        Span::styled("u ", Style::default().add_modifier(Modifier::BOLD)),
        Span::raw("| Quit: "),
        Span::styled("q", Style::default().fg(Color::Red)),
    ]);

    let paragraph =
        Paragraph::new(help_text).block(Block::default().borders(Borders::ALL).title(" Controls "));

    f.render_widget(paragraph, area);
}

fn render_notice(f: &mut Frame, notice: &Notice) {
    let area = centered_rect(60, 30, f.area());

    f.render_widget(Clear, area);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(format!(" {} ", notice.title));

    let content = vec![
        Line::from(notice.detail.as_str()),
        Line::from(""),
        Line::from(Span::styled(
            "Press Esc to dismiss",
            Style::default().fg(Color::DarkGray),
        )),
    ];

    let paragraph = Paragraph::new(content)
        .block(block)
        .wrap(Wrap { trim: true });

    f.render_widget(paragraph, area);
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
