use std::time::{Duration, Instant, SystemTime};

use tracing::{debug, info, warn};

use crate::api::{
    ApiRequest, FormKind, ProbeOutcome, ReportPayload, SeatPayload, TipPayload, TrainLookupFailure,
    ViewType,
};
use crate::model::{
    BoardRow, CfrStatus, DataSource, PassengerReport, SeatRow, Station, TrainDetail,
    TrainSuggestion,
};
use crate::timers::{Debounce, Interval, OneShot};

pub const MIN_QUERY_LEN: usize = 2;
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(300);
pub const SUCCESS_REVERT_DELAY: Duration = Duration::from_secs(3);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Checking,
    Online,
    Fallback,
    Offline,
}

impl ConnectionStatus {
    pub fn label(self) -> &'static str {
        match self {
            ConnectionStatus::Checking => "CHECKING",
            ConnectionStatus::Online => "ONLINE",
            ConnectionStatus::Fallback => "FALLBACK",
            ConnectionStatus::Offline => "OFFLINE",
        }
    }
}

/// What is currently displayed. Exactly one subject at a time; switching
/// wipes the other side's data before the new fetch is issued.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Subject {
    #[default]
    None,
    Train {
        number: String,
    },
    Station {
        id: String,
        name: String,
        view: ViewType,
    },
}

impl Subject {
    pub fn train_number(&self) -> Option<&str> {
        match self {
            Subject::Train { number } => Some(number),
            _ => None,
        }
    }
}

/// The last fetch-triggering operation, for the manual retry affordance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LastAction {
    LoadTrain(String),
    LoadStation {
        id: String,
        name: String,
        view: ViewType,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    TrainEdit,
    StationEdit,
    Report,
    Seats,
    Tip,
    Help,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThemeMode {
    Light,
    Dark,
}

impl ThemeMode {
    pub fn toggle(self) -> Self {
        match self {
            ThemeMode::Light => ThemeMode::Dark,
            ThemeMode::Dark => ThemeMode::Light,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ThemeMode::Light => "LIGHT",
            ThemeMode::Dark => "DARK",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "dark" => ThemeMode::Dark,
            _ => ThemeMode::Light,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportType {
    Delay,
    Platform,
    Crowding,
    Info,
}

impl ReportType {
    pub fn next(self) -> Self {
        match self {
            ReportType::Delay => ReportType::Platform,
            ReportType::Platform => ReportType::Crowding,
            ReportType::Crowding => ReportType::Info,
            ReportType::Info => ReportType::Delay,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReportType::Delay => "delay",
            ReportType::Platform => "platform",
            ReportType::Crowding => "crowding",
            ReportType::Info => "info",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ReportType::Delay => "Delay",
            ReportType::Platform => "Platform change",
            ReportType::Crowding => "Crowding",
            ReportType::Info => "Information",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CrowdingLevel {
    Empty,
    Comfortable,
    Crowded,
    Packed,
}

impl CrowdingLevel {
    pub fn next(self) -> Self {
        match self {
            CrowdingLevel::Empty => CrowdingLevel::Comfortable,
            CrowdingLevel::Comfortable => CrowdingLevel::Crowded,
            CrowdingLevel::Crowded => CrowdingLevel::Packed,
            CrowdingLevel::Packed => CrowdingLevel::Empty,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CrowdingLevel::Empty => "empty",
            CrowdingLevel::Comfortable => "comfortable",
            CrowdingLevel::Crowded => "crowded",
            CrowdingLevel::Packed => "packed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TipType {
    General,
    Food,
    Luggage,
    Accessibility,
}

impl TipType {
    pub fn next(self) -> Self {
        match self {
            TipType::General => TipType::Food,
            TipType::Food => TipType::Luggage,
            TipType::Luggage => TipType::Accessibility,
            TipType::Accessibility => TipType::General,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TipType::General => "general",
            TipType::Food => "food",
            TipType::Luggage => "luggage",
            TipType::Accessibility => "accessibility",
        }
    }
}

#[derive(Clone, Debug)]
pub struct ReportForm {
    pub report_type: ReportType,
    pub message: String,
    pub delay_minutes: String,
    pub platform: String,
    pub crowding: CrowdingLevel,
    pub station: String,
    pub submitting: bool,
    pub cursor: usize,
}

impl Default for ReportForm {
    fn default() -> Self {
        Self {
            report_type: ReportType::Delay,
            message: String::new(),
            delay_minutes: "0".to_string(),
            platform: String::new(),
            crowding: CrowdingLevel::Comfortable,
            station: String::new(),
            submitting: false,
            cursor: 0,
        }
    }
}

impl ReportForm {
    pub fn reset(&mut self) {
        let submitting = self.submitting;
        *self = ReportForm::default();
        self.submitting = submitting;
    }

    /// Positions 2-4 only exist for the matching report type; the cursor
    /// never lands on a field the form does not render.
    fn field_visible(&self, cursor: usize) -> bool {
        match cursor {
            2 => self.report_type == ReportType::Delay,
            3 => self.report_type == ReportType::Platform,
            4 => self.report_type == ReportType::Crowding,
            _ => true,
        }
    }

    pub fn cursor_next(&mut self) {
        loop {
            self.cursor = (self.cursor + 1) % 6;
            if self.field_visible(self.cursor) {
                break;
            }
        }
    }

    pub fn cursor_prev(&mut self) {
        loop {
            self.cursor = (self.cursor + 5) % 6;
            if self.field_visible(self.cursor) {
                break;
            }
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct SeatForm {
    pub car_number: String,
    pub available: String,
    pub total: String,
    pub station: String,
    pub submitting: bool,
    pub cursor: usize,
}

impl SeatForm {
    pub fn reset(&mut self) {
        let submitting = self.submitting;
        *self = SeatForm::default();
        self.submitting = submitting;
    }
}

#[derive(Clone, Debug)]
pub struct TipForm {
    pub tip_type: TipType,
    pub message: String,
    pub station: String,
    pub submitting: bool,
    pub cursor: usize,
}

impl Default for TipForm {
    fn default() -> Self {
        Self {
            tip_type: TipType::General,
            message: String::new(),
            station: String::new(),
            submitting: false,
            cursor: 0,
        }
    }
}

impl TipForm {
    pub fn reset(&mut self) {
        let submitting = self.submitting;
        *self = TipForm::default();
        self.submitting = submitting;
    }
}

/// View-state controller. All mutations funnel through the named
/// transition methods below; the runtime loop feeds in input, worker
/// events, and the clock, and sends out whatever requests fall due.
pub struct App {
    pub(crate) input_mode: InputMode,
    pub(crate) theme_mode: ThemeMode,

    // Station list bootstrap.
    pub(crate) stations: Vec<Station>,

    // The single active subject plus its data.
    pub(crate) subject: Subject,
    subject_gen: u64,
    pub(crate) train_data: Option<TrainDetail>,
    pub(crate) board: Vec<BoardRow>,
    pub(crate) reports: Vec<PassengerReport>,
    pub(crate) seats: Vec<SeatRow>,
    pub(crate) view_type: ViewType,
    pub(crate) last_update: Option<SystemTime>,

    // Query fields and their debounced suggestion pipelines.
    pub(crate) train_query: String,
    pub(crate) station_query: String,
    pub(crate) train_suggestions: Vec<TrainSuggestion>,
    pub(crate) station_suggestions: Vec<Station>,
    pub(crate) train_sugg_cursor: usize,
    pub(crate) station_sugg_cursor: usize,
    train_debounce: Debounce,
    station_debounce: Debounce,

    // Progress and error surface.
    pub(crate) loading: bool,
    pub(crate) loading_message: String,
    pub(crate) error: Option<String>,
    pub(crate) error_suggestions: Vec<String>,
    pub(crate) last_action: Option<LastAction>,

    // Connection status, fed by the probe and the per-lookup classifier.
    pub(crate) connection: ConnectionStatus,
    pub(crate) connection_message: String,
    pub(crate) data_source: Option<DataSource>,
    pub(crate) cfr: Option<CfrStatus>,

    // Timers.
    refresh: Interval,
    probe: Interval,
    cfr_timer: Interval,
    revert: OneShot,
    revert_to: Option<(ConnectionStatus, String)>,

    // Passenger submission forms.
    pub(crate) report_form: ReportForm,
    pub(crate) seat_form: SeatForm,
    pub(crate) tip_form: TipForm,
}

impl App {
    pub fn new(
        theme_mode: ThemeMode,
        refresh_every: Duration,
        probe_every: Duration,
        cfr_every: Duration,
    ) -> Self {
        Self {
            input_mode: InputMode::Normal,
            theme_mode,
            stations: Vec::new(),
            subject: Subject::None,
            subject_gen: 0,
            train_data: None,
            board: Vec::new(),
            reports: Vec::new(),
            seats: Vec::new(),
            view_type: ViewType::Departures,
            last_update: None,
            train_query: String::new(),
            station_query: String::new(),
            train_suggestions: Vec::new(),
            station_suggestions: Vec::new(),
            train_sugg_cursor: 0,
            station_sugg_cursor: 0,
            train_debounce: Debounce::new(DEBOUNCE_DELAY, MIN_QUERY_LEN),
            station_debounce: Debounce::new(DEBOUNCE_DELAY, MIN_QUERY_LEN),
            loading: false,
            loading_message: String::new(),
            error: None,
            error_suggestions: Vec::new(),
            last_action: None,
            connection: ConnectionStatus::Checking,
            connection_message: "Checking connection...".to_string(),
            data_source: None,
            cfr: None,
            refresh: Interval::new(refresh_every),
            probe: Interval::running(probe_every),
            cfr_timer: Interval::running(cfr_every),
            revert: OneShot::default(),
            revert_to: None,
            report_form: ReportForm::default(),
            seat_form: SeatForm::default(),
            tip_form: TipForm::default(),
        }
    }

    // --- Data-source classifier -------------------------------------------

    pub fn classify_source(source: Option<&DataSource>) -> (ConnectionStatus, String) {
        match source.and_then(|s| s.kind.as_deref()) {
            Some("real_data") => (ConnectionStatus::Online, "Live data".to_string()),
            Some("fallback_data") => {
                let attempted = source
                    .and_then(|s| s.cfr_attempted)
                    .unwrap_or(false);
                if attempted {
                    (
                        ConnectionStatus::Fallback,
                        "Demo mode (live attempted)".to_string(),
                    )
                } else {
                    (ConnectionStatus::Fallback, "Demo mode".to_string())
                }
            }
            _ => (
                ConnectionStatus::Checking,
                "Checking data source...".to_string(),
            ),
        }
    }

    fn set_connection(&mut self, status: ConnectionStatus, message: String) {
        // During a transient status message the underlying state keeps
        // tracking reality in the revert slot instead of the display.
        if self.revert.armed() {
            self.revert_to = Some((status, message));
        } else {
            self.connection = status;
            self.connection_message = message;
        }
    }

    // --- Subject switcher -------------------------------------------------

    /// Entry point for a typed or suggestion-picked train number. Clears
    /// the station side before anything is fetched, so a failed lookup
    /// never leaves a torn mix of both subjects.
    pub fn select_train(&mut self) -> Option<ApiRequest> {
        let number = self.train_query.trim().to_string();
        if number.is_empty() {
            self.error = Some("Please enter a train number".to_string());
            return None;
        }
        Some(self.issue_train_fetch(number))
    }

    fn issue_train_fetch(&mut self, number: String) -> ApiRequest {
        // Clear the other subject's fields and its suggestion list.
        self.board.clear();
        self.station_query.clear();
        self.station_suggestions.clear();
        self.station_sugg_cursor = 0;
        self.station_debounce.invalidate();

        self.loading = true;
        self.loading_message = format!("Searching for train {number}...");
        self.error = None;
        self.error_suggestions.clear();
        self.last_action = Some(LastAction::LoadTrain(number.clone()));

        self.subject_gen = self.subject_gen.wrapping_add(1);
        self.subject = Subject::Train {
            number: number.clone(),
        };
        debug!("train fetch issued: {number} gen={}", self.subject_gen);
        ApiRequest::Train {
            number,
            generation: self.subject_gen,
        }
    }

    pub fn apply_train_result(
        &mut self,
        generation: u64,
        outcome: Result<TrainDetail, TrainLookupFailure>,
        now: SystemTime,
    ) -> Vec<ApiRequest> {
        if generation != self.subject_gen {
            debug!("dropping stale train result gen={generation}");
            return Vec::new();
        }
        self.loading = false;
        match outcome {
            Ok(detail) => {
                let number = detail
                    .train_number
                    .clone()
                    .or_else(|| self.subject.train_number().map(str::to_string))
                    .unwrap_or_default();
                self.data_source = detail.data_source.clone();
                let (status, message) = Self::classify_source(self.data_source.as_ref());
                self.set_connection(status, message);
                self.train_data = Some(detail);
                self.last_update = Some(now);
                self.error = None;
                self.error_suggestions.clear();
                info!("train {number} loaded");
                vec![
                    ApiRequest::Reports {
                        train_number: number.clone(),
                    },
                    ApiRequest::Seats {
                        train_number: number,
                    },
                ]
            }
            Err(failure) => {
                // Do not show stale data next to an error.
                self.train_data = None;
                self.reports.clear();
                self.seats.clear();
                self.error = Some(failure.message);
                self.error_suggestions = failure.suggestions;
                Vec::new()
            }
        }
    }

    /// Entry point for a picked station. A station without a resolved id
    /// is a user input error, not a network call.
    pub fn select_station(&mut self, id: &str, name: &str) -> Option<ApiRequest> {
        if id.trim().is_empty() {
            self.error = Some("Please pick a station from the suggestions".to_string());
            return None;
        }
        Some(self.issue_station_fetch(id.trim().to_string(), name.to_string(), self.view_type))
    }

    fn issue_station_fetch(&mut self, id: String, name: String, view: ViewType) -> ApiRequest {
        self.train_data = None;
        self.reports.clear();
        self.seats.clear();
        self.data_source = None;
        self.train_query.clear();
        self.train_suggestions.clear();
        self.train_sugg_cursor = 0;
        self.train_debounce.invalidate();

        self.loading = true;
        self.loading_message = format!("Loading {} for {name}...", view.path());
        self.error = None;
        self.error_suggestions.clear();
        self.last_action = Some(LastAction::LoadStation {
            id: id.clone(),
            name: name.clone(),
            view,
        });

        self.subject_gen = self.subject_gen.wrapping_add(1);
        self.station_query = name.clone();
        self.subject = Subject::Station {
            id: id.clone(),
            name,
            view,
        };
        debug!("board fetch issued: station {id} gen={}", self.subject_gen);
        ApiRequest::Board {
            station_id: id,
            view,
            generation: self.subject_gen,
        }
    }

    pub fn apply_board_result(
        &mut self,
        generation: u64,
        outcome: Result<Vec<BoardRow>, String>,
        now: SystemTime,
    ) {
        if generation != self.subject_gen {
            debug!("dropping stale board result gen={generation}");
            return;
        }
        self.loading = false;
        match outcome {
            Ok(rows) => {
                self.board = rows;
                self.last_update = Some(now);
                self.error = None;
            }
            Err(message) => {
                self.board.clear();
                self.error = Some(message);
            }
        }
    }

    /// Flip between departures and arrivals; with a station on screen the
    /// board is re-fetched at the new view.
    pub fn toggle_view_type(&mut self) -> Option<ApiRequest> {
        self.view_type = self.view_type.toggle();
        if let Subject::Station { id, name, .. } = self.subject.clone() {
            Some(self.issue_station_fetch(id, name, self.view_type))
        } else {
            None
        }
    }

    pub fn retry_last_action(&mut self) -> Option<ApiRequest> {
        match self.last_action.clone() {
            Some(LastAction::LoadTrain(number)) => Some(self.issue_train_fetch(number)),
            Some(LastAction::LoadStation { id, name, view }) => {
                Some(self.issue_station_fetch(id, name, view))
            }
            None => None,
        }
    }

    /// Reset both subjects, suggestions, community data, and error state.
    pub fn clear_all(&mut self) {
        self.subject = Subject::None;
        self.subject_gen = self.subject_gen.wrapping_add(1);
        self.train_data = None;
        self.board.clear();
        self.reports.clear();
        self.seats.clear();
        self.data_source = None;
        self.train_query.clear();
        self.station_query.clear();
        self.train_suggestions.clear();
        self.station_suggestions.clear();
        self.train_sugg_cursor = 0;
        self.station_sugg_cursor = 0;
        self.train_debounce.invalidate();
        self.station_debounce.invalidate();
        self.error = None;
        self.error_suggestions.clear();
        self.loading = false;
        debug!("all results cleared");
    }

    // --- Suggestion debouncer ---------------------------------------------

    pub fn train_query_input(&mut self, text: String, now: Instant) {
        self.train_query = text;
        if !self.train_debounce.input(&self.train_query, now) {
            self.train_suggestions.clear();
            self.train_sugg_cursor = 0;
        }
    }

    pub fn station_query_input(&mut self, text: String, now: Instant) {
        self.station_query = text;
        if !self.station_debounce.input(&self.station_query, now) {
            self.station_suggestions.clear();
            self.station_sugg_cursor = 0;
        }
    }

    pub fn apply_train_suggestions(&mut self, generation: u64, items: Vec<TrainSuggestion>) {
        if !self.train_debounce.is_current(generation) {
            debug!("dropping stale train suggestions gen={generation}");
            return;
        }
        self.train_suggestions = items;
        self.train_sugg_cursor = 0;
    }

    pub fn apply_station_suggestions(&mut self, generation: u64, items: Vec<Station>) {
        if !self.station_debounce.is_current(generation) {
            debug!("dropping stale station suggestions gen={generation}");
            return;
        }
        self.station_suggestions = items;
        self.station_sugg_cursor = 0;
    }

    /// Picking a suggestion is both a fill and an implicit submit.
    pub fn select_train_suggestion(&mut self, index: usize) -> Option<ApiRequest> {
        let number = self.train_suggestions.get(index)?.train_number.clone();
        self.train_query = number;
        self.train_suggestions.clear();
        self.train_sugg_cursor = 0;
        self.train_debounce.invalidate();
        self.select_train()
    }

    /// Enter pressed on a typed name with no suggestion highlighted:
    /// fall back to an exact match against the bootstrap station list.
    pub fn select_station_query(&mut self) -> Option<ApiRequest> {
        let query = self.station_query.trim().to_ascii_lowercase();
        if query.is_empty() {
            self.error = Some("Please enter a station name".to_string());
            return None;
        }
        let found = self
            .stations
            .iter()
            .find(|s| s.name.to_ascii_lowercase() == query)
            .cloned();
        match found {
            Some(station) => {
                let id = station.station_id.unwrap_or_default();
                self.select_station(&id, &station.name)
            }
            None => {
                self.error = Some("Please pick a station from the suggestions".to_string());
                None
            }
        }
    }

    pub fn select_station_suggestion(&mut self, index: usize) -> Option<ApiRequest> {
        let station = self.station_suggestions.get(index)?.clone();
        self.station_suggestions.clear();
        self.station_sugg_cursor = 0;
        self.station_debounce.invalidate();
        let id = station.station_id.unwrap_or_default();
        self.select_station(&id, &station.name)
    }

    // --- Connectivity prober / bootstrap ----------------------------------

    /// A lookup classification holds the status line only until the next
    /// probe tick lands; the probe then resumes control.
    pub fn apply_probe(&mut self, outcome: ProbeOutcome) {
        let (status, message) = match outcome {
            ProbeOutcome::Reachable => (ConnectionStatus::Online, "Connected"),
            ProbeOutcome::Degraded => (ConnectionStatus::Fallback, "Limited connectivity"),
            ProbeOutcome::Unreachable => (ConnectionStatus::Offline, "Offline"),
        };
        self.set_connection(status, message.to_string());
    }

    pub fn apply_stations(&mut self, outcome: Result<Vec<Station>, ProbeOutcome>) {
        match outcome {
            Ok(stations) => {
                info!("{} stations loaded", stations.len());
                self.stations = stations;
                self.set_connection(ConnectionStatus::Online, "Connected".to_string());
            }
            Err(ProbeOutcome::Unreachable) => {
                warn!("station list unavailable, backend unreachable");
                self.set_connection(ConnectionStatus::Offline, "Connection failed".to_string());
            }
            Err(_) => {
                warn!("station list degraded");
                self.set_connection(
                    ConnectionStatus::Fallback,
                    "Using fallback data".to_string(),
                );
            }
        }
    }

    pub fn apply_cfr_status(&mut self, status: CfrStatus) {
        self.cfr = Some(status);
    }

    // --- Refresh scheduler -------------------------------------------------

    pub fn auto_refresh_enabled(&self) -> bool {
        self.refresh.is_enabled()
    }

    pub fn toggle_auto_refresh(&mut self, now: Instant) {
        if self.refresh.is_enabled() {
            self.refresh.disable();
            info!("auto refresh off");
        } else {
            self.refresh.enable(now);
            info!("auto refresh on");
        }
    }

    /// Drive every timer and collect the requests that fell due. Called
    /// once per loop pass by the runtime.
    pub fn due_requests(&mut self, now: Instant) -> Vec<ApiRequest> {
        let mut requests = Vec::new();

        if self.revert.fire_due(now) {
            if let Some((status, message)) = self.revert_to.take() {
                self.connection = status;
                self.connection_message = message;
            }
        }

        if self.probe.due(now) {
            requests.push(ApiRequest::Probe);
        }
        if self.cfr_timer.due(now) {
            requests.push(ApiRequest::CfrStatus);
        }

        if self.refresh.due(now) {
            // Re-runs the ordinary fetch path; only one subject can be
            // active, so at most one of these fires.
            match self.subject.clone() {
                Subject::Station { id, name, view } => {
                    requests.push(self.issue_station_fetch(id, name, view));
                }
                Subject::Train { number } => {
                    if self.train_data.is_some() {
                        requests.push(self.issue_train_fetch(number));
                    }
                }
                Subject::None => {}
            }
        }

        if let Some(generation) = self.train_debounce.fire_due(now) {
            requests.push(ApiRequest::TrainSuggestions {
                query: self.train_query.trim().to_string(),
                generation,
            });
        }
        if let Some(generation) = self.station_debounce.fire_due(now) {
            requests.push(ApiRequest::StationSearch {
                query: self.station_query.trim().to_string(),
                generation,
            });
        }

        requests
    }

    // --- Passenger-report submitter ---------------------------------------

    fn active_train_number(&self) -> Option<String> {
        self.train_data
            .as_ref()
            .and_then(|t| t.train_number.clone())
            .or_else(|| self.subject.train_number().map(str::to_string))
            .filter(|n| !n.is_empty())
    }

    pub fn submit_report(&mut self) -> Option<ApiRequest> {
        if self.report_form.submitting {
            return None;
        }
        let Some(train_number) = self.active_train_number() else {
            self.error = Some("Please select a train first".to_string());
            return None;
        };
        let form = &self.report_form;
        let mut payload = ReportPayload {
            train_number,
            report_type: form.report_type.as_str().to_string(),
            message: form.message.clone(),
            station_name: form.station.clone(),
            delay_minutes: None,
            platform: None,
            crowding_level: None,
        };
        match form.report_type {
            ReportType::Delay => {
                payload.delay_minutes = Some(form.delay_minutes.trim().parse().unwrap_or(0));
            }
            ReportType::Platform => {
                payload.platform = Some(form.platform.clone());
            }
            ReportType::Crowding => {
                payload.crowding_level = Some(form.crowding.as_str().to_string());
            }
            ReportType::Info => {}
        }
        // Flag goes up before the request leaves; every outcome path in
        // apply_submit clears it again.
        self.report_form.submitting = true;
        Some(ApiRequest::SubmitReport(payload))
    }

    pub fn submit_seats(&mut self) -> Option<ApiRequest> {
        if self.seat_form.submitting {
            return None;
        }
        let Some(train_number) = self.active_train_number() else {
            self.error = Some("Please select a train first".to_string());
            return None;
        };
        let form = &self.seat_form;
        let payload = SeatPayload {
            train_number,
            car_number: form.car_number.clone(),
            available_seats: form.available.trim().parse().unwrap_or(0),
            total_seats: form.total.trim().parse().unwrap_or(0),
            station_name: form.station.clone(),
        };
        self.seat_form.submitting = true;
        Some(ApiRequest::SubmitSeats(payload))
    }

    pub fn submit_tip(&mut self) -> Option<ApiRequest> {
        if self.tip_form.submitting {
            return None;
        }
        let form = &self.tip_form;
        let payload = TipPayload {
            tip_type: form.tip_type.as_str().to_string(),
            message: form.message.clone(),
            station_name: form.station.clone(),
        };
        self.tip_form.submitting = true;
        Some(ApiRequest::SubmitTip(payload))
    }

    /// Shared completion path for the three forms. Success shows a
    /// transient status line, closes the modal, resets the form, and
    /// schedules a scoped community re-fetch.
    pub fn apply_submit(
        &mut self,
        form: FormKind,
        outcome: Result<String, String>,
        now: Instant,
    ) -> Option<ApiRequest> {
        match form {
            FormKind::Report => self.report_form.submitting = false,
            FormKind::Seats => self.seat_form.submitting = false,
            FormKind::Tip => self.tip_form.submitting = false,
        }
        match outcome {
            Ok(message) => {
                info!("{} submitted", form.label());
                self.show_transient(ConnectionStatus::Online, message, now);
                self.input_mode = InputMode::Normal;
                let refetch = self.active_train_number().and_then(|number| match form {
                    FormKind::Report => Some(ApiRequest::Reports {
                        train_number: number,
                    }),
                    FormKind::Seats => Some(ApiRequest::Seats {
                        train_number: number,
                    }),
                    FormKind::Tip => None,
                });
                match form {
                    FormKind::Report => self.report_form.reset(),
                    FormKind::Seats => self.seat_form.reset(),
                    FormKind::Tip => self.tip_form.reset(),
                }
                refetch
            }
            Err(message) => {
                warn!("{} submit failed: {message}", form.label());
                // The subject stays on screen; failures surface on the
                // status line the same way success messages do.
                let status = self.connection;
                self.show_transient(status, message, now);
                None
            }
        }
    }

    /// Temporary status-line text that reverts after a short delay. The
    /// pre-existing status is saved once, so overlapping transients still
    /// restore the real state.
    fn show_transient(&mut self, status: ConnectionStatus, message: String, now: Instant) {
        if self.revert_to.is_none() {
            self.revert_to = Some((self.connection, self.connection_message.clone()));
        }
        self.connection = status;
        self.connection_message = message;
        self.revert.arm(now, SUCCESS_REVERT_DELAY);
    }

    pub fn apply_reports(&mut self, train_number: &str, reports: Vec<PassengerReport>) {
        // Best-effort data scoped to the active train only.
        if self.active_train_number().as_deref() == Some(train_number) {
            self.reports = reports;
        }
    }

    pub fn apply_seats(&mut self, train_number: &str, rows: Vec<SeatRow>) {
        if self.active_train_number().as_deref() == Some(train_number) {
            self.seats = rows;
        }
    }

    // --- Small UI-facing helpers ------------------------------------------

    pub fn toggle_theme(&mut self) {
        self.theme_mode = self.theme_mode.toggle();
        debug!("theme -> {}", self.theme_mode.label());
    }

    pub fn close_modals(&mut self) {
        self.input_mode = InputMode::Normal;
    }
}

#[cfg(test)]
mod tests {
    use super::{App, ConnectionStatus, InputMode, ReportForm, ReportType, Subject, ThemeMode};
    use crate::api::{ApiRequest, FormKind, ProbeOutcome, TrainLookupFailure};
    use crate::model::{DataSource, Station, TrainDetail, TrainSuggestion};
    use std::time::{Duration, Instant, SystemTime};

    fn app() -> App {
        App::new(
            ThemeMode::Light,
            Duration::from_secs(30),
            Duration::from_secs(30),
            Duration::from_secs(300),
        )
    }

    fn train_detail(number: &str, kind: &str, attempted: bool) -> TrainDetail {
        TrainDetail {
            train_number: Some(number.to_string()),
            data_source: Some(DataSource {
                kind: Some(kind.to_string()),
                cfr_attempted: Some(attempted),
                ..DataSource::default()
            }),
            ..TrainDetail::default()
        }
    }

    fn generation(request: &ApiRequest) -> u64 {
        match request {
            ApiRequest::Train { generation, .. } => *generation,
            ApiRequest::Board { generation, .. } => *generation,
            other => panic!("unexpected request: {other:?}"),
        }
    }

    #[test]
    fn classifier_mapping() {
        let (status, message) = App::classify_source(Some(&DataSource {
            kind: Some("real_data".to_string()),
            ..DataSource::default()
        }));
        assert_eq!(status, ConnectionStatus::Online);
        assert_eq!(message, "Live data");

        let (status, message) = App::classify_source(Some(&DataSource {
            kind: Some("fallback_data".to_string()),
            cfr_attempted: Some(true),
            ..DataSource::default()
        }));
        assert_eq!(status, ConnectionStatus::Fallback);
        assert_eq!(message, "Demo mode (live attempted)");

        let (status, message) = App::classify_source(Some(&DataSource {
            kind: Some("fallback_data".to_string()),
            cfr_attempted: Some(false),
            ..DataSource::default()
        }));
        assert_eq!(status, ConnectionStatus::Fallback);
        assert_eq!(message, "Demo mode");

        let (status, _) = App::classify_source(None);
        assert_eq!(status, ConnectionStatus::Checking);
    }

    #[test]
    fn empty_train_number_is_input_error() {
        let mut app = app();
        app.train_query = "  ".to_string();
        assert!(app.select_train().is_none());
        assert!(app.error.is_some());
        assert!(!app.loading);
        assert_eq!(app.subject, Subject::None);
    }

    #[test]
    fn select_train_clears_station_side_before_fetch() {
        let mut app = app();
        app.station_query = "Brasov".to_string();
        app.station_suggestions.push(Station::default());
        app.board.push(crate::model::BoardRow::default());

        app.train_query = "501".to_string();
        let request = app.select_train().unwrap();
        assert!(matches!(request, ApiRequest::Train { .. }));
        assert!(app.board.is_empty());
        assert!(app.station_query.is_empty());
        assert!(app.station_suggestions.is_empty());
        assert!(app.loading);
    }

    #[test]
    fn exactly_one_subject_after_interleaved_switches() {
        // Station fetch issued first, train selected before it resolves.
        let mut app = app();
        let station_req = app.select_station("10001", "Bucuresti Nord").unwrap();
        let station_gen = generation(&station_req);

        app.train_query = "501".to_string();
        let train_req = app.select_train().unwrap();
        let train_gen = generation(&train_req);

        // Slow station response lands after the train switch: dropped.
        app.apply_board_result(
            station_gen,
            Ok(vec![crate::model::BoardRow::default()]),
            SystemTime::now(),
        );
        assert!(app.board.is_empty());
        assert!(app.loading);

        let followups = app.apply_train_result(
            train_gen,
            Ok(train_detail("501", "real_data", false)),
            SystemTime::now(),
        );
        assert_eq!(followups.len(), 2);
        assert!(app.train_data.is_some());
        assert!(app.board.is_empty());
        assert!(!app.loading);
    }

    #[test]
    fn train_failure_keeps_cleared_state_and_surfaces_suggestions() {
        let mut app = app();
        app.train_query = "9999".to_string();
        let request = app.select_train().unwrap();
        let followups = app.apply_train_result(
            generation(&request),
            Err(TrainLookupFailure {
                message: "Train 9999 not found".to_string(),
                suggestions: vec!["IC 536".to_string()],
            }),
            SystemTime::now(),
        );
        assert!(followups.is_empty());
        assert!(app.train_data.is_none());
        assert_eq!(app.error.as_deref(), Some("Train 9999 not found"));
        assert_eq!(app.error_suggestions, vec!["IC 536".to_string()]);
        assert!(!app.loading);
    }

    #[test]
    fn probe_tick_resumes_control_after_classification() {
        let mut app = app();
        app.train_query = "501".to_string();
        let request = app.select_train().unwrap();
        app.apply_train_result(
            generation(&request),
            Ok(train_detail("501", "fallback_data", true)),
            SystemTime::now(),
        );
        assert_eq!(app.connection, ConnectionStatus::Fallback);
        assert_eq!(app.connection_message, "Demo mode (live attempted)");

        // The classification holds only until the next probe result.
        app.apply_probe(ProbeOutcome::Reachable);
        assert_eq!(app.connection, ConnectionStatus::Online);
        assert_eq!(app.connection_message, "Connected");

        app.apply_probe(ProbeOutcome::Unreachable);
        assert_eq!(app.connection, ConnectionStatus::Offline);
    }

    #[test]
    fn probe_failure_downgrades_to_offline() {
        let mut app = app();
        app.apply_probe(ProbeOutcome::Unreachable);
        assert_eq!(app.connection, ConnectionStatus::Offline);
        app.apply_probe(ProbeOutcome::Degraded);
        assert_eq!(app.connection, ConnectionStatus::Fallback);
    }

    #[test]
    fn debounced_suggestions_fire_once_for_latest_query() {
        let mut app = app();
        let t0 = Instant::now();
        app.train_query_input("1".to_string(), t0);
        app.train_query_input("12".to_string(), t0 + Duration::from_millis(50));
        app.train_query_input("123".to_string(), t0 + Duration::from_millis(100));

        // Probe and health ticks fire on their own; only the suggestion
        // requests matter here.
        assert!(!app
            .due_requests(t0 + Duration::from_millis(150))
            .iter()
            .any(|r| matches!(r, ApiRequest::TrainSuggestions { .. })));
        let requests = app.due_requests(t0 + Duration::from_millis(400));
        let suggestion_reqs: Vec<_> = requests
            .iter()
            .filter(|r| matches!(r, ApiRequest::TrainSuggestions { .. }))
            .collect();
        assert_eq!(suggestion_reqs.len(), 1);
        match suggestion_reqs[0] {
            ApiRequest::TrainSuggestions { query, .. } => assert_eq!(query, "123"),
            _ => unreachable!(),
        }
    }

    #[test]
    fn short_query_clears_results_without_request() {
        let mut app = app();
        let t0 = Instant::now();
        app.train_suggestions.push(TrainSuggestion::default());
        app.train_query_input("1".to_string(), t0);
        assert!(app.train_suggestions.is_empty());
        assert!(!app
            .due_requests(t0 + Duration::from_secs(1))
            .iter()
            .any(|r| matches!(r, ApiRequest::TrainSuggestions { .. })));
    }

    #[test]
    fn stale_suggestion_response_is_dropped() {
        let mut app = app();
        let t0 = Instant::now();
        app.station_query_input("bu".to_string(), t0);
        let requests = app.due_requests(t0 + Duration::from_millis(300));
        let stale_gen = requests
            .iter()
            .find_map(|r| match r {
                ApiRequest::StationSearch { generation, .. } => Some(*generation),
                _ => None,
            })
            .expect("station search fired");

        // New keystroke supersedes the in-flight fetch.
        app.station_query_input("buc".to_string(), t0 + Duration::from_millis(350));
        app.apply_station_suggestions(stale_gen, vec![Station::default()]);
        assert!(app.station_suggestions.is_empty());
    }

    #[test]
    fn refresh_enable_disable_idempotent() {
        let mut app = app();
        let t0 = Instant::now();
        app.toggle_auto_refresh(t0);
        assert!(app.auto_refresh_enabled());
        // Second toggle pair lands back on enabled exactly once.
        app.toggle_auto_refresh(t0);
        app.toggle_auto_refresh(t0);
        assert!(app.auto_refresh_enabled());

        app.train_query = "501".to_string();
        let request = app.select_train().unwrap();
        app.apply_train_result(
            generation(&request),
            Ok(train_detail("501", "real_data", false)),
            SystemTime::now(),
        );

        let requests = app.due_requests(t0 + Duration::from_secs(30));
        let refreshes: Vec<_> = requests
            .iter()
            .filter(|r| matches!(r, ApiRequest::Train { .. }))
            .collect();
        assert_eq!(refreshes.len(), 1);

        // Immediately after, nothing further is due.
        let requests = app.due_requests(t0 + Duration::from_secs(31));
        assert!(!requests.iter().any(|r| matches!(r, ApiRequest::Train { .. })));
    }

    #[test]
    fn refresh_does_nothing_without_subject() {
        let mut app = app();
        let t0 = Instant::now();
        app.toggle_auto_refresh(t0);
        let requests = app.due_requests(t0 + Duration::from_secs(30));
        assert!(!requests.iter().any(|r| matches!(
            r,
            ApiRequest::Train { .. } | ApiRequest::Board { .. }
        )));
    }

    #[test]
    fn report_submit_lifecycle() {
        let mut app = app();
        app.train_query = "501".to_string();
        let request = app.select_train().unwrap();
        app.apply_train_result(
            generation(&request),
            Ok(train_detail("501", "real_data", false)),
            SystemTime::now(),
        );

        app.report_form.report_type = ReportType::Delay;
        app.report_form.delay_minutes = "10".to_string();
        let submit = app.submit_report().unwrap();
        match &submit {
            ApiRequest::SubmitReport(payload) => {
                assert_eq!(payload.train_number, "501");
                assert_eq!(payload.delay_minutes, Some(10));
                assert!(payload.platform.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(app.report_form.submitting);

        // Double submit while in flight is swallowed.
        assert!(app.submit_report().is_none());

        let now = Instant::now();
        let refetch = app.apply_submit(FormKind::Report, Ok("Thanks!".to_string()), now);
        match refetch {
            Some(ApiRequest::Reports { train_number }) => assert_eq!(train_number, "501"),
            other => panic!("expected reports refetch, got {other:?}"),
        }
        assert!(!app.report_form.submitting);
        assert_eq!(app.connection_message, "Thanks!");
        assert_eq!(app.input_mode, InputMode::Normal);

        // Transient message reverts to the prior connection text.
        let requests = app.due_requests(now + Duration::from_secs(3));
        assert!(!requests.is_empty() || app.connection_message != "Thanks!");
        assert_eq!(app.connection_message, "Live data");
    }

    #[test]
    fn report_submit_failure_keeps_train_on_screen() {
        let mut app = app();
        app.train_query = "501".to_string();
        let request = app.select_train().unwrap();
        app.apply_train_result(
            generation(&request),
            Ok(train_detail("501", "real_data", false)),
            SystemTime::now(),
        );
        app.submit_report().unwrap();

        let now = Instant::now();
        let refetch = app.apply_submit(
            FormKind::Report,
            Err("Network error - please check your connection".to_string()),
            now,
        );
        assert!(refetch.is_none());
        assert!(!app.report_form.submitting);

        // The failure lands on the status line, not the subject panel.
        assert!(app.error.is_none());
        assert!(app.train_data.is_some());
        assert_eq!(
            app.connection_message,
            "Network error - please check your connection"
        );

        // After the transient delay the status line reverts.
        app.due_requests(now + Duration::from_secs(3));
        assert_eq!(app.connection_message, "Live data");
        assert!(app.train_data.is_some());
    }

    #[test]
    fn report_cursor_skips_fields_hidden_by_type() {
        let mut form = ReportForm::default();
        assert_eq!(form.report_type, ReportType::Delay);
        form.cursor_next();
        assert_eq!(form.cursor, 1); // message
        form.cursor_next();
        assert_eq!(form.cursor, 2); // delay minutes
        form.cursor_next();
        assert_eq!(form.cursor, 5); // station, platform and crowding hidden
        form.cursor_prev();
        assert_eq!(form.cursor, 2);

        form.report_type = ReportType::Crowding;
        form.cursor = 1;
        form.cursor_next();
        assert_eq!(form.cursor, 4);

        form.report_type = ReportType::Info;
        form.cursor = 1;
        form.cursor_next();
        assert_eq!(form.cursor, 5);
        form.cursor_next();
        assert_eq!(form.cursor, 0);
    }

    #[test]
    fn report_requires_active_train() {
        let mut app = app();
        assert!(app.submit_report().is_none());
        assert_eq!(app.error.as_deref(), Some("Please select a train first"));
        assert!(!app.report_form.submitting);
    }

    #[test]
    fn tip_submits_without_train() {
        let mut app = app();
        app.tip_form.message = "Platform 3 kiosk is cash only".to_string();
        let request = app.submit_tip().unwrap();
        assert!(matches!(request, ApiRequest::SubmitTip(_)));
        let refetch = app.apply_submit(FormKind::Tip, Ok("Tip saved".to_string()), Instant::now());
        assert!(refetch.is_none());
        assert!(!app.tip_form.submitting);
    }

    #[test]
    fn community_data_only_applies_to_active_train() {
        let mut app = app();
        app.train_query = "501".to_string();
        let request = app.select_train().unwrap();
        app.apply_train_result(
            generation(&request),
            Ok(train_detail("501", "real_data", false)),
            SystemTime::now(),
        );

        app.apply_reports("777", vec![crate::model::PassengerReport::default()]);
        assert!(app.reports.is_empty());
        app.apply_reports("501", vec![crate::model::PassengerReport::default()]);
        assert_eq!(app.reports.len(), 1);
    }

    #[test]
    fn retry_reissues_last_action() {
        let mut app = app();
        let first = app.select_station("10001", "Bucuresti Nord").unwrap();
        let retry = app.retry_last_action().unwrap();
        match (&first, &retry) {
            (
                ApiRequest::Board {
                    station_id: a,
                    generation: first_gen,
                    ..
                },
                ApiRequest::Board {
                    station_id: b,
                    generation: retry_gen,
                    ..
                },
            ) => {
                assert_eq!(a, b);
                assert!(retry_gen > first_gen);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
