mod api;
mod app;
mod config;
mod logging;
mod model;
mod runtime;
mod timers;
mod ui;

use anyhow::Result;
use std::sync::mpsc;

use api::{spawn_api_worker, ApiRequest, ViewType};
use app::{App, ThemeMode};
use config::parse_args;
use logging::init as init_logging;
use runtime::{init_terminal, restore_terminal, run_app};
use tracing::{debug, info, warn};

fn main() -> Result<()> {
    let config = parse_args()?;
    let _log_guard = init_logging(&config);
    info!("gara-tui starting");
    debug!("config path: {}", config.config_path.display());

    let (req_tx, req_rx) = mpsc::channel();
    let (evt_tx, evt_rx) = mpsc::channel();
    spawn_api_worker(config.base_url.clone(), config.timeout, req_rx, evt_tx);

    // Station list seeds autocomplete and doubles as the first
    // reachability signal; the probe and CFR health timers fire on their
    // own from the first loop pass.
    let _ = req_tx.send(ApiRequest::Stations);

    let mut app = App::new(
        ThemeMode::from_str(&config.theme),
        config.refresh,
        config.probe,
        config.cfr_refresh,
    );
    app.view_type = ViewType::from_str(&config.view);

    let mut terminal = init_terminal()?;
    let res = run_app(&mut terminal, app, req_tx, evt_rx, config.config_path);
    restore_terminal(&mut terminal)?;

    if let Err(err) = res {
        warn!("runtime error: {err}");
        eprintln!("{err}");
    }

    info!("gara-tui exited");
    Ok(())
}
