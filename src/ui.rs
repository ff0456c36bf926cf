use chrono::{DateTime, Local};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Cell, Clear, Paragraph, Row, Table, Wrap};
use ratatui::Frame;
use std::time::SystemTime;

use crate::api::ViewType;
use crate::app::{App, ConnectionStatus, CrowdingLevel, InputMode, ReportType, Subject, ThemeMode, TipType};

struct Theme {
    accent: Color,
    warn: Color,
    danger: Color,
    ok: Color,
    dim: Color,
    highlight_fg: Color,
    highlight_bg: Color,
    panel_bg: Color,
}

fn theme(mode: ThemeMode) -> Theme {
    match mode {
        ThemeMode::Dark => Theme {
            accent: Color::Cyan,
            warn: Color::Yellow,
            danger: Color::Red,
            ok: Color::Green,
            dim: Color::DarkGray,
            highlight_fg: Color::Black,
            highlight_bg: Color::Cyan,
            panel_bg: Color::Reset,
        },
        ThemeMode::Light => Theme {
            accent: Color::Blue,
            warn: Color::Yellow,
            danger: Color::Red,
            ok: Color::Green,
            dim: Color::Gray,
            highlight_fg: Color::White,
            highlight_bg: Color::Blue,
            panel_bg: Color::Reset,
        },
    }
}

fn status_color(theme: &Theme, status: ConnectionStatus) -> Color {
    match status {
        ConnectionStatus::Checking => theme.warn,
        ConnectionStatus::Online => theme.ok,
        ConnectionStatus::Fallback => theme.warn,
        ConnectionStatus::Offline => theme.danger,
    }
}

pub fn ui(f: &mut Frame, app: &App) {
    let size = f.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4),
            Constraint::Min(6),
            Constraint::Length(1),
        ])
        .split(size);

    render_header(f, chunks[0], app);
    render_body(f, chunks[1], app);
    render_footer(f, chunks[2], app);

    match app.input_mode {
        InputMode::TrainEdit => render_search_popup(
            f,
            size,
            app,
            "TRAIN SEARCH",
            &app.train_query,
            &train_suggestion_lines(app),
            app.train_sugg_cursor,
        ),
        InputMode::StationEdit => render_search_popup(
            f,
            size,
            app,
            "STATION SEARCH",
            &app.station_query,
            &station_suggestion_lines(app),
            app.station_sugg_cursor,
        ),
        InputMode::Report => render_report_form(f, size, app),
        InputMode::Seats => render_seat_form(f, size, app),
        InputMode::Tip => render_tip_form(f, size, app),
        InputMode::Help => render_help(f, size, app),
        InputMode::Normal => {}
    }
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let clock = Local::now().format("%H:%M:%S").to_string();
    let update_time = app
        .last_update
        .map(format_system_time)
        .unwrap_or_else(|| "--".to_string());
    let refresh = if app.auto_refresh_enabled() {
        "ON"
    } else {
        "OFF"
    };
    let cfr = match &app.cfr {
        Some(status) if status.overall_status => Span::styled("CFR OK", Style::default().fg(theme.ok)),
        Some(_) => Span::styled("CFR DOWN", Style::default().fg(theme.warn)),
        None => Span::styled("CFR --", Style::default().fg(theme.dim)),
    };

    let line_top = Line::from(vec![
        Span::styled(
            "GARA BOARD",
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" | "),
        Span::styled(
            app.connection.label().to_string(),
            Style::default()
                .fg(status_color(&theme, app.connection))
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::raw(app.connection_message.clone()),
        Span::raw(" | "),
        cfr,
        Span::raw(" | "),
        Span::raw(clock),
    ]);

    let line_bottom = Line::from(vec![
        Span::raw(format!("VIEW {}", app.view_type.label())),
        Span::raw(" | "),
        Span::raw(format!("REFRESH {refresh}")),
        Span::raw(" | "),
        Span::raw(format!("THEME {}", app.theme_mode.label())),
        Span::raw(" | "),
        Span::raw(format!("LAST {update_time}")),
        Span::raw(" | "),
        Span::styled("MENU ", Style::default().fg(theme.dim)),
        Span::styled("[t]Train ", Style::default().fg(theme.dim)),
        Span::styled("[s]Station ", Style::default().fg(theme.dim)),
        Span::styled("[r]Report ", Style::default().fg(theme.dim)),
        Span::styled("[S]Seats ", Style::default().fg(theme.dim)),
        Span::styled("[p]Tip ", Style::default().fg(theme.dim)),
        Span::styled("[?]Help", Style::default().fg(theme.dim)),
    ]);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title("STATUS");
    let paragraph = Paragraph::new(vec![line_top, line_bottom])
        .block(block)
        .style(Style::default().bg(theme.panel_bg));
    f.render_widget(paragraph, area);
}

fn render_body(f: &mut Frame, area: Rect, app: &App) {
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(area);

    render_subject(f, body[0], app);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(body[1]);
    render_reports(f, side[0], app);
    render_seats(f, side[1], app);
}

fn render_subject(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);

    if let Some(error) = &app.error {
        let mut lines = vec![Line::from(Span::styled(
            error.clone(),
            Style::default()
                .fg(theme.danger)
                .add_modifier(Modifier::BOLD),
        ))];
        if !app.error_suggestions.is_empty() {
            lines.push(Line::raw(""));
            lines.push(Line::from(Span::styled(
                "Did you mean:",
                Style::default().fg(theme.dim),
            )));
            for suggestion in &app.error_suggestions {
                lines.push(Line::raw(format!("  {suggestion}")));
            }
        }
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            "[R] retry last action",
            Style::default().fg(theme.dim),
        )));
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title("ERROR");
        f.render_widget(Paragraph::new(lines).block(block).wrap(Wrap { trim: true }), area);
        return;
    }

    if app.loading {
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title("LOADING");
        f.render_widget(
            Paragraph::new(app.loading_message.clone())
                .style(Style::default().fg(theme.accent))
                .block(block),
            area,
        );
        return;
    }

    if let Some(train) = &app.train_data {
        let title = match (&train.train_number, &train.train_name) {
            (Some(number), Some(name)) => format!("TRAIN {number} {name}"),
            (Some(number), None) => format!("TRAIN {number}"),
            _ => "TRAIN".to_string(),
        };
        let header = Row::new(vec!["STATION", "ARR", "DEP", "PLAT", "DELAY"]).style(
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        );
        let rows: Vec<Row> = train
            .stops
            .iter()
            .map(|stop| {
                let delay = stop.delay.unwrap_or(0);
                let delay_style = if delay > 0 {
                    Style::default().fg(theme.danger)
                } else {
                    Style::default().fg(theme.ok)
                };
                let marker = if stop.is_origin {
                    "> "
                } else if stop.is_destination {
                    "# "
                } else {
                    "  "
                };
                Row::new(vec![
                    Cell::from(format!(
                        "{marker}{}",
                        stop.station_name.clone().unwrap_or_default()
                    )),
                    Cell::from(stop.arrival_time.clone().unwrap_or_else(|| "--".into())),
                    Cell::from(stop.departure_time.clone().unwrap_or_else(|| "--".into())),
                    Cell::from(stop.platform.clone().unwrap_or_else(|| "--".into())),
                    Cell::from(format_delay(delay)).style(delay_style),
                ])
            })
            .collect();
        let table = Table::new(
            rows,
            [
                Constraint::Min(18),
                Constraint::Length(6),
                Constraint::Length(6),
                Constraint::Length(5),
                Constraint::Length(7),
            ],
        )
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title(title),
        );
        f.render_widget(table, area);
        return;
    }

    if let Subject::Station { name, view, .. } = &app.subject {
        let title = format!("{} {}", name.to_uppercase(), view.label());
        let (place, time) = match view {
            ViewType::Departures => ("DESTINATION", "DEP"),
            ViewType::Arrivals => ("ORIGIN", "ARR"),
        };
        let header = Row::new(vec!["TRAIN", place, time, "PLAT", "DELAY"]).style(
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        );
        let rows: Vec<Row> = app
            .board
            .iter()
            .map(|row| {
                let delay = row.delay.unwrap_or(0);
                let delay_style = if delay > 0 {
                    Style::default().fg(theme.danger)
                } else {
                    Style::default().fg(theme.ok)
                };
                let place_text = match view {
                    ViewType::Departures => row.destination.clone(),
                    ViewType::Arrivals => row.origin.clone(),
                };
                let time_text = match view {
                    ViewType::Departures => row.departure_timestamp.clone(),
                    ViewType::Arrivals => row.arrival_timestamp.clone(),
                };
                Row::new(vec![
                    Cell::from(row.train_number.clone().unwrap_or_default()),
                    Cell::from(place_text.unwrap_or_default()),
                    Cell::from(time_text.unwrap_or_else(|| "--".into())),
                    Cell::from(row.platform.clone().unwrap_or_else(|| "--".into())),
                    Cell::from(format_delay(delay)).style(delay_style),
                ])
            })
            .collect();
        let table = Table::new(
            rows,
            [
                Constraint::Length(10),
                Constraint::Min(16),
                Constraint::Length(8),
                Constraint::Length(5),
                Constraint::Length(7),
            ],
        )
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_type(BorderType::Rounded)
                .title(title),
        );
        f.render_widget(table, area);
        return;
    }

    let lines = vec![
        Line::raw(""),
        Line::from(Span::styled(
            "No train or station selected.",
            Style::default().fg(theme.dim),
        )),
        Line::raw(""),
        Line::from(Span::styled(
            "[t] search a train   [s] search a station",
            Style::default().fg(theme.dim),
        )),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title("BOARD");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_reports(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let mut lines = Vec::new();
    if app.reports.is_empty() {
        lines.push(Line::from(Span::styled(
            "No passenger reports yet.",
            Style::default().fg(theme.dim),
        )));
    }
    for report in &app.reports {
        let mut detail = report.report_type.to_uppercase();
        if let Some(minutes) = report.delay_minutes {
            detail.push_str(&format!(" +{minutes}min"));
        }
        if let Some(platform) = &report.platform {
            detail.push_str(&format!(" platform {platform}"));
        }
        if let Some(level) = &report.crowding_level {
            detail.push_str(&format!(" {level}"));
        }
        let mut meta = report.time_ago.clone().unwrap_or_default();
        if let Some(count) = report.verified_count.filter(|c| *c > 0) {
            meta.push_str(&format!("  verified x{count}"));
        }
        if let Some(count) = report.helpful_count.filter(|c| *c > 0) {
            meta.push_str(&format!("  helpful x{count}"));
        }
        lines.push(Line::from(Span::styled(
            detail,
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        )));
        if let Some(message) = report.message.as_ref().filter(|m| !m.is_empty()) {
            lines.push(Line::raw(format!("  {message}")));
        }
        if !meta.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("  {meta}"),
                Style::default().fg(theme.dim),
            )));
        }
    }
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title("PASSENGER REPORTS");
    f.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn render_seats(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let header = Row::new(vec!["CAR", "FREE", "TOTAL", "OCC"]).style(
        Style::default()
            .fg(theme.accent)
            .add_modifier(Modifier::BOLD),
    );
    let rows: Vec<Row> = app
        .seats
        .iter()
        .map(|seat| {
            let occupancy = seat.occupancy_rate.unwrap_or(0);
            let style = if occupancy >= 90 {
                Style::default().fg(theme.danger)
            } else if occupancy >= 70 {
                Style::default().fg(theme.warn)
            } else {
                Style::default().fg(theme.ok)
            };
            Row::new(vec![
                Cell::from(seat.car_number.clone().unwrap_or_default()),
                Cell::from(seat.available_seats.map_or("--".into(), |v| v.to_string())),
                Cell::from(seat.total_seats.map_or("--".into(), |v| v.to_string())),
                Cell::from(format!("{occupancy}%")).style(style),
            ])
        })
        .collect();
    let table = Table::new(
        rows,
        [
            Constraint::Length(5),
            Constraint::Length(6),
            Constraint::Length(6),
            Constraint::Length(6),
        ],
    )
    .header(header)
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .title("SEATS"),
    );
    f.render_widget(table, area);
}

fn render_footer(f: &mut Frame, area: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let text = match app.input_mode {
        InputMode::Normal => {
            "q quit | v view | a auto-refresh | R retry | c clear | d theme".to_string()
        }
        InputMode::TrainEdit | InputMode::StationEdit => {
            "type to search | up/down pick | enter select | esc cancel".to_string()
        }
        InputMode::Report | InputMode::Seats | InputMode::Tip => {
            "tab next field | left/right cycle choice | enter submit | esc close".to_string()
        }
        InputMode::Help => "esc close".to_string(),
    };
    f.render_widget(
        Paragraph::new(text).style(Style::default().fg(theme.dim)),
        area,
    );
}

fn train_suggestion_lines(app: &App) -> Vec<String> {
    app.train_suggestions
        .iter()
        .map(|s| {
            let mut line = s.train_number.clone();
            if let Some(kind) = &s.kind {
                line.push_str(&format!(" [{kind}]"));
            }
            if let Some(description) = &s.description {
                line.push_str(&format!(" {description}"));
            }
            line
        })
        .collect()
}

fn station_suggestion_lines(app: &App) -> Vec<String> {
    app.station_suggestions
        .iter()
        .map(|s| s.name.clone())
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn render_search_popup(
    f: &mut Frame,
    size: Rect,
    app: &App,
    title: &str,
    query: &str,
    suggestions: &[String],
    cursor: usize,
) {
    let theme = theme(app.theme_mode);
    let height = (suggestions.len() as u16 + 4).clamp(5, 14);
    let area = centered_rect(50, height, size);
    f.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(vec![
            Span::styled("> ", Style::default().fg(theme.accent)),
            Span::raw(query.to_string()),
            Span::styled("_", Style::default().fg(theme.accent)),
        ]),
        Line::raw(""),
    ];
    for (idx, suggestion) in suggestions.iter().enumerate() {
        let style = if idx == cursor {
            Style::default()
                .fg(theme.highlight_fg)
                .bg(theme.highlight_bg)
        } else {
            Style::default()
        };
        lines.push(Line::from(Span::styled(suggestion.clone(), style)));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title(title.to_string());
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn form_line(theme: &Theme, selected: bool, label: &str, value: String) -> Line<'static> {
    let label_style = if selected {
        Style::default()
            .fg(theme.highlight_fg)
            .bg(theme.highlight_bg)
    } else {
        Style::default().fg(theme.dim)
    };
    Line::from(vec![
        Span::styled(format!("{label:<10}"), label_style),
        Span::raw(" "),
        Span::raw(value),
    ])
}

fn render_report_form(f: &mut Frame, size: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let area = centered_rect(54, 11, size);
    f.render_widget(Clear, area);

    let form = &app.report_form;
    let mut lines = vec![
        form_line(
            &theme,
            form.cursor == 0,
            "TYPE",
            form.report_type.label().to_string(),
        ),
        form_line(&theme, form.cursor == 1, "MESSAGE", form.message.clone()),
    ];
    match form.report_type {
        ReportType::Delay => lines.push(form_line(
            &theme,
            form.cursor == 2,
            "DELAY MIN",
            form.delay_minutes.clone(),
        )),
        ReportType::Platform => lines.push(form_line(
            &theme,
            form.cursor == 3,
            "PLATFORM",
            form.platform.clone(),
        )),
        ReportType::Crowding => lines.push(form_line(
            &theme,
            form.cursor == 4,
            "CROWDING",
            crowding_label(form.crowding).to_string(),
        )),
        ReportType::Info => {}
    }
    lines.push(form_line(
        &theme,
        form.cursor == 5,
        "STATION",
        form.station.clone(),
    ));
    if form.submitting {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            "Submitting...",
            Style::default().fg(theme.accent),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title("PASSENGER REPORT");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn crowding_label(level: CrowdingLevel) -> &'static str {
    match level {
        CrowdingLevel::Empty => "Empty",
        CrowdingLevel::Comfortable => "Comfortable",
        CrowdingLevel::Crowded => "Crowded",
        CrowdingLevel::Packed => "Packed",
    }
}

fn render_seat_form(f: &mut Frame, size: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let area = centered_rect(54, 10, size);
    f.render_widget(Clear, area);

    let form = &app.seat_form;
    let mut lines = vec![
        form_line(&theme, form.cursor == 0, "CAR", form.car_number.clone()),
        form_line(&theme, form.cursor == 1, "FREE", form.available.clone()),
        form_line(&theme, form.cursor == 2, "TOTAL", form.total.clone()),
        form_line(&theme, form.cursor == 3, "STATION", form.station.clone()),
    ];
    if form.submitting {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            "Submitting...",
            Style::default().fg(theme.accent),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title("SEAT AVAILABILITY");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_tip_form(f: &mut Frame, size: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let area = centered_rect(54, 9, size);
    f.render_widget(Clear, area);

    let form = &app.tip_form;
    let mut lines = vec![
        form_line(
            &theme,
            form.cursor == 0,
            "TYPE",
            tip_label(form.tip_type).to_string(),
        ),
        form_line(&theme, form.cursor == 1, "MESSAGE", form.message.clone()),
        form_line(&theme, form.cursor == 2, "STATION", form.station.clone()),
    ];
    if form.submitting {
        lines.push(Line::raw(""));
        lines.push(Line::from(Span::styled(
            "Submitting...",
            Style::default().fg(theme.accent),
        )));
    }

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title("STATION TIP");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn tip_label(kind: TipType) -> &'static str {
    match kind {
        TipType::General => "General",
        TipType::Food => "Food",
        TipType::Luggage => "Luggage",
        TipType::Accessibility => "Accessibility",
    }
}

fn render_help(f: &mut Frame, size: Rect, app: &App) {
    let theme = theme(app.theme_mode);
    let area = centered_rect(60, 16, size);
    f.render_widget(Clear, area);

    let lines = vec![
        Line::from(Span::styled(
            "Keys",
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        )),
        Line::raw("t       search a train by number"),
        Line::raw("s       search a station board"),
        Line::raw("v       toggle departures / arrivals"),
        Line::raw("a       toggle auto refresh"),
        Line::raw("R       retry the last lookup"),
        Line::raw("c       clear everything"),
        Line::raw("r       submit a passenger report"),
        Line::raw("S       submit seat availability"),
        Line::raw("p       submit a station tip"),
        Line::raw("d       toggle light / dark theme"),
        Line::raw("q       quit"),
    ];
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .title("HELP");
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn centered_rect(width: u16, height: u16, size: Rect) -> Rect {
    let width = width.min(size.width);
    let height = height.min(size.height);
    Rect {
        x: size.x + (size.width.saturating_sub(width)) / 2,
        y: size.y + (size.height.saturating_sub(height)) / 2,
        width,
        height,
    }
}

fn format_delay(delay: i64) -> String {
    if delay > 0 {
        format!("+{delay}")
    } else {
        "on time".to_string()
    }
}

fn format_system_time(time: SystemTime) -> String {
    let datetime: DateTime<Local> = time.into();
    datetime.format("%H:%M:%S").to_string()
}
