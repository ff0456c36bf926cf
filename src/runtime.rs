use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, Sender};
use std::time::{Duration, Instant, SystemTime};
use tracing::warn;

use crate::api::{ApiEvent, ApiRequest};
use crate::app::{App, InputMode};
use crate::config;
use crate::ui;

pub fn init_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;
    Ok(terminal)
}

pub fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

pub fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    mut app: App,
    req_tx: Sender<ApiRequest>,
    evt_rx: Receiver<ApiEvent>,
    config_path: PathBuf,
) -> Result<()> {
    let tick_rate = Duration::from_millis(100);
    loop {
        while let Ok(event) = evt_rx.try_recv() {
            apply_event(&mut app, &req_tx, event);
        }

        for request in app.due_requests(Instant::now()) {
            let _ = req_tx.send(request);
        }

        terminal.draw(|f| ui::ui(f, &app))?;

        if event::poll(tick_rate)? {
            if let Event::Key(key) = event::read()? {
                if handle_key(&mut app, &req_tx, &config_path, key) {
                    return Ok(());
                }
            }
        }
    }
}

fn apply_event(app: &mut App, req_tx: &Sender<ApiRequest>, event: ApiEvent) {
    match event {
        ApiEvent::Stations(outcome) => app.apply_stations(outcome),
        ApiEvent::Probe(outcome) => app.apply_probe(outcome),
        ApiEvent::Cfr(status) => app.apply_cfr_status(status),
        ApiEvent::Train {
            generation,
            outcome,
        } => {
            for request in app.apply_train_result(generation, outcome, SystemTime::now()) {
                let _ = req_tx.send(request);
            }
        }
        ApiEvent::Board {
            generation,
            outcome,
        } => app.apply_board_result(generation, outcome, SystemTime::now()),
        ApiEvent::TrainSuggestions { generation, items } => {
            app.apply_train_suggestions(generation, items)
        }
        ApiEvent::StationSuggestions { generation, items } => {
            app.apply_station_suggestions(generation, items)
        }
        ApiEvent::Reports {
            train_number,
            reports,
        } => app.apply_reports(&train_number, reports),
        ApiEvent::Seats { train_number, rows } => app.apply_seats(&train_number, rows),
        ApiEvent::Submit { form, outcome } => {
            if let Some(request) = app.apply_submit(form, outcome, Instant::now()) {
                let _ = req_tx.send(request);
            }
        }
    }
}

/// Returns true when the app should exit.
fn handle_key(
    app: &mut App,
    req_tx: &Sender<ApiRequest>,
    config_path: &Path,
    key: KeyEvent,
) -> bool {
    match app.input_mode {
        InputMode::Normal => match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Char('t') => {
                app.input_mode = InputMode::TrainEdit;
                app.error = None;
            }
            KeyCode::Char('s') => {
                app.input_mode = InputMode::StationEdit;
                app.error = None;
            }
            KeyCode::Char('v') => {
                if let Some(request) = app.toggle_view_type() {
                    let _ = req_tx.send(request);
                }
            }
            KeyCode::Char('a') => app.toggle_auto_refresh(Instant::now()),
            KeyCode::Char('r') => app.input_mode = InputMode::Report,
            KeyCode::Char('S') => app.input_mode = InputMode::Seats,
            KeyCode::Char('p') => app.input_mode = InputMode::Tip,
            KeyCode::Char('R') => {
                if let Some(request) = app.retry_last_action() {
                    let _ = req_tx.send(request);
                }
            }
            KeyCode::Char('c') => app.clear_all(),
            KeyCode::Char('d') => {
                app.toggle_theme();
                if let Err(err) = config::save_theme(config_path, app.theme_mode.label()) {
                    warn!("theme save failed: {err}");
                }
            }
            KeyCode::Char('?') | KeyCode::Char('h') => app.input_mode = InputMode::Help,
            _ => {}
        },
        InputMode::TrainEdit => match key.code {
            KeyCode::Esc => {
                app.train_suggestions.clear();
                app.close_modals();
            }
            KeyCode::Enter => {
                let request = if app.train_suggestions.is_empty() {
                    app.select_train()
                } else {
                    app.select_train_suggestion(app.train_sugg_cursor)
                };
                if let Some(request) = request {
                    let _ = req_tx.send(request);
                    app.close_modals();
                }
            }
            KeyCode::Down => {
                if !app.train_suggestions.is_empty() {
                    app.train_sugg_cursor =
                        (app.train_sugg_cursor + 1).min(app.train_suggestions.len() - 1);
                }
            }
            KeyCode::Up => {
                app.train_sugg_cursor = app.train_sugg_cursor.saturating_sub(1);
            }
            KeyCode::Backspace => {
                let mut text = app.train_query.clone();
                text.pop();
                app.train_query_input(text, Instant::now());
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.train_query_input(String::new(), Instant::now());
            }
            KeyCode::Char(ch) => {
                let mut text = app.train_query.clone();
                text.push(ch);
                app.train_query_input(text, Instant::now());
            }
            _ => {}
        },
        InputMode::StationEdit => match key.code {
            KeyCode::Esc => {
                app.station_suggestions.clear();
                app.close_modals();
            }
            KeyCode::Enter => {
                let request = if app.station_suggestions.is_empty() {
                    app.select_station_query()
                } else {
                    app.select_station_suggestion(app.station_sugg_cursor)
                };
                if let Some(request) = request {
                    let _ = req_tx.send(request);
                    app.close_modals();
                }
            }
            KeyCode::Down => {
                if !app.station_suggestions.is_empty() {
                    app.station_sugg_cursor =
                        (app.station_sugg_cursor + 1).min(app.station_suggestions.len() - 1);
                }
            }
            KeyCode::Up => {
                app.station_sugg_cursor = app.station_sugg_cursor.saturating_sub(1);
            }
            KeyCode::Backspace => {
                let mut text = app.station_query.clone();
                text.pop();
                app.station_query_input(text, Instant::now());
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.station_query_input(String::new(), Instant::now());
            }
            KeyCode::Char(ch) => {
                let mut text = app.station_query.clone();
                text.push(ch);
                app.station_query_input(text, Instant::now());
            }
            _ => {}
        },
        InputMode::Report => match key.code {
            KeyCode::Esc => app.close_modals(),
            KeyCode::Tab => app.report_form.cursor_next(),
            KeyCode::BackTab => app.report_form.cursor_prev(),
            KeyCode::Enter => {
                if let Some(request) = app.submit_report() {
                    let _ = req_tx.send(request);
                }
            }
            KeyCode::Left | KeyCode::Right => match app.report_form.cursor {
                0 => app.report_form.report_type = app.report_form.report_type.next(),
                4 => app.report_form.crowding = app.report_form.crowding.next(),
                _ => {}
            },
            KeyCode::Backspace => {
                if let Some(field) = report_text_field(app) {
                    field.pop();
                }
            }
            KeyCode::Char(ch) => {
                if let Some(field) = report_text_field(app) {
                    field.push(ch);
                }
            }
            _ => {}
        },
        InputMode::Seats => match key.code {
            KeyCode::Esc => app.close_modals(),
            KeyCode::Tab => {
                app.seat_form.cursor = (app.seat_form.cursor + 1) % 4;
            }
            KeyCode::BackTab => {
                app.seat_form.cursor = (app.seat_form.cursor + 3) % 4;
            }
            KeyCode::Enter => {
                if let Some(request) = app.submit_seats() {
                    let _ = req_tx.send(request);
                }
            }
            KeyCode::Backspace => {
                seat_text_field(app).pop();
            }
            KeyCode::Char(ch) => {
                seat_text_field(app).push(ch);
            }
            _ => {}
        },
        InputMode::Tip => match key.code {
            KeyCode::Esc => app.close_modals(),
            KeyCode::Tab => {
                app.tip_form.cursor = (app.tip_form.cursor + 1) % 3;
            }
            KeyCode::BackTab => {
                app.tip_form.cursor = (app.tip_form.cursor + 2) % 3;
            }
            KeyCode::Enter => {
                if let Some(request) = app.submit_tip() {
                    let _ = req_tx.send(request);
                }
            }
            KeyCode::Left | KeyCode::Right => {
                if app.tip_form.cursor == 0 {
                    app.tip_form.tip_type = app.tip_form.tip_type.next();
                }
            }
            KeyCode::Backspace => {
                if let Some(field) = tip_text_field(app) {
                    field.pop();
                }
            }
            KeyCode::Char(ch) => {
                if let Some(field) = tip_text_field(app) {
                    field.push(ch);
                }
            }
            _ => {}
        },
        InputMode::Help => match key.code {
            KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q') => app.close_modals(),
            _ => {}
        },
    }
    false
}

fn report_text_field(app: &mut App) -> Option<&mut String> {
    match app.report_form.cursor {
        1 => Some(&mut app.report_form.message),
        2 => Some(&mut app.report_form.delay_minutes),
        3 => Some(&mut app.report_form.platform),
        5 => Some(&mut app.report_form.station),
        _ => None,
    }
}

fn seat_text_field(app: &mut App) -> &mut String {
    match app.seat_form.cursor {
        0 => &mut app.seat_form.car_number,
        1 => &mut app.seat_form.available,
        2 => &mut app.seat_form.total,
        _ => &mut app.seat_form.station,
    }
}

fn tip_text_field(app: &mut App) -> Option<&mut String> {
    match app.tip_form.cursor {
        1 => Some(&mut app.tip_form.message),
        2 => Some(&mut app.tip_form.station),
        _ => None,
    }
}
