use std::sync::mpsc::{Receiver, Sender};
use std::thread;
use std::time::Duration;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::blocking::Client;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::model::{
    BoardRow, CfrStatus, LookupError, ReportsResponse, SeatsResponse, Station, StationsResponse,
    SubmitResponse, TrainDetail, TrainSuggestion,
};

pub const GENERIC_NETWORK_ERROR: &str = "Network error - please check your connection";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ViewType {
    Departures,
    Arrivals,
}

impl ViewType {
    pub fn toggle(self) -> Self {
        match self {
            ViewType::Departures => ViewType::Arrivals,
            ViewType::Arrivals => ViewType::Departures,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            ViewType::Departures => "departures",
            ViewType::Arrivals => "arrivals",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ViewType::Departures => "DEPARTURES",
            ViewType::Arrivals => "ARRIVALS",
        }
    }

    pub fn from_str(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "arrivals" | "arr" => ViewType::Arrivals,
            _ => ViewType::Departures,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FormKind {
    Report,
    Seats,
    Tip,
}

impl FormKind {
    pub fn label(self) -> &'static str {
        match self {
            FormKind::Report => "REPORT",
            FormKind::Seats => "SEATS",
            FormKind::Tip => "TIP",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct ReportPayload {
    pub train_number: String,
    pub report_type: String,
    pub message: String,
    pub station_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_minutes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crowding_level: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SeatPayload {
    pub train_number: String,
    pub car_number: String,
    pub available_seats: i64,
    pub total_seats: i64,
    pub station_name: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct TipPayload {
    pub tip_type: String,
    pub message: String,
    pub station_name: String,
}

/// One request issued by the controller. Lookup and suggestion requests
/// carry the generation that was current when they were issued; the
/// controller drops any response whose generation is no longer the
/// latest one.
#[derive(Clone, Debug)]
pub enum ApiRequest {
    Stations,
    Probe,
    CfrStatus,
    Train {
        number: String,
        generation: u64,
    },
    Board {
        station_id: String,
        view: ViewType,
        generation: u64,
    },
    TrainSuggestions {
        query: String,
        generation: u64,
    },
    StationSearch {
        query: String,
        generation: u64,
    },
    Reports {
        train_number: String,
    },
    Seats {
        train_number: String,
    },
    SubmitReport(ReportPayload),
    SubmitSeats(SeatPayload),
    SubmitTip(TipPayload),
}

/// Reachability probe classification. Error statuses mean the backend is
/// up but degraded; transport failures mean it is unreachable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeOutcome {
    Reachable,
    Degraded,
    Unreachable,
}

#[derive(Clone, Debug)]
pub struct TrainLookupFailure {
    pub message: String,
    pub suggestions: Vec<String>,
}

#[derive(Debug)]
pub enum ApiEvent {
    Stations(Result<Vec<Station>, ProbeOutcome>),
    Probe(ProbeOutcome),
    Cfr(CfrStatus),
    Train {
        generation: u64,
        outcome: Result<TrainDetail, TrainLookupFailure>,
    },
    Board {
        generation: u64,
        outcome: Result<Vec<BoardRow>, String>,
    },
    TrainSuggestions {
        generation: u64,
        items: Vec<TrainSuggestion>,
    },
    StationSuggestions {
        generation: u64,
        items: Vec<Station>,
    },
    Reports {
        train_number: String,
        reports: Vec<crate::model::PassengerReport>,
    },
    Seats {
        train_number: String,
        rows: Vec<crate::model::SeatRow>,
    },
    Submit {
        form: FormKind,
        outcome: Result<String, String>,
    },
}

/// Single worker thread servicing requests in order. Requests are never
/// cancelled once sent; staleness is handled on the receiving side via
/// generation tags.
pub fn spawn_api_worker(
    base_url: String,
    timeout: Duration,
    rx: Receiver<ApiRequest>,
    tx: Sender<ApiEvent>,
) {
    thread::spawn(move || {
        info!("api worker started");
        let client = match Client::builder().timeout(timeout).build() {
            Ok(client) => client,
            Err(err) => {
                error!("api client error: {err}");
                let _ = tx.send(ApiEvent::Probe(ProbeOutcome::Unreachable));
                return;
            }
        };
        let base = base_url.trim_end_matches('/').to_string();

        while let Ok(request) = rx.recv() {
            let event = handle_request(&client, &base, request);
            if let Some(event) = event {
                if tx.send(event).is_err() {
                    debug!("receiver dropped, exiting api worker");
                    break;
                }
            }
        }
    });
}

fn handle_request(client: &Client, base: &str, request: ApiRequest) -> Option<ApiEvent> {
    match request {
        ApiRequest::Stations => Some(ApiEvent::Stations(fetch_stations(client, base))),
        ApiRequest::Probe => Some(ApiEvent::Probe(probe(client, base))),
        ApiRequest::CfrStatus => fetch_cfr_status(client, base).map(ApiEvent::Cfr),
        ApiRequest::Train { number, generation } => Some(ApiEvent::Train {
            generation,
            outcome: fetch_train(client, base, &number),
        }),
        ApiRequest::Board {
            station_id,
            view,
            generation,
        } => Some(ApiEvent::Board {
            generation,
            outcome: fetch_board(client, base, &station_id, view),
        }),
        ApiRequest::TrainSuggestions { query, generation } => {
            // Best effort: a failed suggestion fetch leaves the old list alone.
            fetch_json::<Vec<TrainSuggestion>>(
                client,
                &format!("{base}/api/train-suggestions/{}", encode_segment(&query)),
            )
            .map_err(|err| debug!("train suggestions failed: {err}"))
            .ok()
            .map(|items| ApiEvent::TrainSuggestions { generation, items })
        }
        ApiRequest::StationSearch { query, generation } => fetch_json::<Vec<Station>>(
            client,
            &format!("{base}/api/stations/search/{}", encode_segment(&query)),
        )
        .map_err(|err| debug!("station search failed: {err}"))
        .ok()
        .map(|items| ApiEvent::StationSuggestions { generation, items }),
        ApiRequest::Reports { train_number } => fetch_json::<ReportsResponse>(
            client,
            &format!(
                "{base}/api/passenger/reports/{}",
                encode_segment(&train_number)
            ),
        )
        .map_err(|err| warn!("passenger reports failed: {err}"))
        .ok()
        .map(|data| ApiEvent::Reports {
            train_number,
            reports: data.reports,
        }),
        ApiRequest::Seats { train_number } => fetch_json::<SeatsResponse>(
            client,
            &format!(
                "{base}/api/passenger/seats/{}",
                encode_segment(&train_number)
            ),
        )
        .map_err(|err| warn!("seat data failed: {err}"))
        .ok()
        .map(|data| ApiEvent::Seats {
            train_number,
            rows: data.seat_availability,
        }),
        ApiRequest::SubmitReport(payload) => Some(ApiEvent::Submit {
            form: FormKind::Report,
            outcome: post_submit(client, &format!("{base}/api/passenger/report"), &payload),
        }),
        ApiRequest::SubmitSeats(payload) => Some(ApiEvent::Submit {
            form: FormKind::Seats,
            outcome: post_submit(client, &format!("{base}/api/passenger/seats"), &payload),
        }),
        ApiRequest::SubmitTip(payload) => Some(ApiEvent::Submit {
            form: FormKind::Tip,
            outcome: post_submit(client, &format!("{base}/api/passenger/tips"), &payload),
        }),
    }
}

fn probe(client: &Client, base: &str) -> ProbeOutcome {
    match client.get(format!("{base}/api")).send() {
        Ok(resp) if resp.status().is_success() => ProbeOutcome::Reachable,
        Ok(resp) => {
            debug!("probe degraded: HTTP {}", resp.status());
            ProbeOutcome::Degraded
        }
        Err(err) => {
            debug!("probe failed: {err}");
            ProbeOutcome::Unreachable
        }
    }
}

fn fetch_stations(client: &Client, base: &str) -> Result<Vec<Station>, ProbeOutcome> {
    match client.get(format!("{base}/get-stations/")).send() {
        Ok(resp) if resp.status().is_success() => match resp.json::<StationsResponse>() {
            Ok(data) => Ok(data.into_stations()),
            Err(err) => {
                warn!("stations parse error: {err}");
                Err(ProbeOutcome::Degraded)
            }
        },
        Ok(resp) => {
            warn!("stations HTTP {}", resp.status());
            Err(ProbeOutcome::Degraded)
        }
        Err(err) => {
            warn!("stations fetch failed: {err}");
            Err(ProbeOutcome::Unreachable)
        }
    }
}

fn fetch_cfr_status(client: &Client, base: &str) -> Option<CfrStatus> {
    // Background health check, failures are logged only.
    match fetch_json::<CfrStatus>(client, &format!("{base}/api/cfr-status")) {
        Ok(status) => Some(status),
        Err(err) => {
            debug!("cfr status failed: {err}");
            None
        }
    }
}

fn fetch_train(
    client: &Client,
    base: &str,
    number: &str,
) -> Result<TrainDetail, TrainLookupFailure> {
    let url = format!("{base}/api/train/{}", encode_segment(number));
    let resp = client.get(url).send().map_err(|err| {
        debug!("train lookup transport error: {err}");
        TrainLookupFailure {
            message: GENERIC_NETWORK_ERROR.to_string(),
            suggestions: Vec::new(),
        }
    })?;

    let status = resp.status();
    if status.is_success() {
        return resp.json::<TrainDetail>().map_err(|err| TrainLookupFailure {
            message: format!("Parse error: {err}"),
            suggestions: Vec::new(),
        });
    }

    // Structured not-found bodies carry a message and alternatives.
    let body = resp.json::<LookupError>().unwrap_or_default();
    Err(TrainLookupFailure {
        message: body
            .text()
            .map(str::to_string)
            .unwrap_or_else(|| format!("Train lookup failed (HTTP {status})")),
        suggestions: body.suggestions,
    })
}

fn fetch_board(
    client: &Client,
    base: &str,
    station_id: &str,
    view: ViewType,
) -> Result<Vec<BoardRow>, String> {
    let url = format!(
        "{base}/station/{}/{}/current",
        encode_segment(station_id),
        view.path()
    );
    let resp = client.get(url).send().map_err(|err| {
        debug!("board transport error: {err}");
        GENERIC_NETWORK_ERROR.to_string()
    })?;
    let status = resp.status();
    if !status.is_success() {
        return Err("Failed to load station data".to_string());
    }
    resp.json::<Vec<BoardRow>>()
        .map_err(|err| format!("Parse error: {err}"))
}

fn post_submit<T: Serialize>(client: &Client, url: &str, payload: &T) -> Result<String, String> {
    let resp = client.post(url).json(payload).send().map_err(|err| {
        debug!("submit transport error: {err}");
        GENERIC_NETWORK_ERROR.to_string()
    })?;
    let status = resp.status();
    let body = resp.json::<SubmitResponse>().unwrap_or_default();
    if status.is_success() {
        Ok(body
            .message
            .unwrap_or_else(|| "Submitted successfully".to_string()))
    } else {
        Err(body
            .error
            .or(body.message)
            .unwrap_or_else(|| format!("Submit failed (HTTP {status})")))
    }
}

fn fetch_json<T: serde::de::DeserializeOwned>(client: &Client, url: &str) -> Result<T, String> {
    let resp = client.get(url).send().map_err(|err| err.to_string())?;
    let status = resp.status();
    if !status.is_success() {
        return Err(format!("HTTP {status}"));
    }
    resp.json::<T>().map_err(|err| err.to_string())
}

/// Unreserved characters stay literal, everything else is escaped, the
/// same set encodeURIComponent-built URLs use for train numbers like
/// "IR 1621".
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn encode_segment(value: &str) -> String {
    utf8_percent_encode(value.trim(), PATH_SEGMENT).to_string()
}

#[cfg(test)]
mod tests {
    use super::{encode_segment, ReportPayload, ViewType};

    #[test]
    fn encode_path_segments() {
        assert_eq!(encode_segment("IR 1621"), "IR%201621");
        assert_eq!(encode_segment("501"), "501");
        assert_eq!(encode_segment(" Cluj/Napoca "), "Cluj%2FNapoca");
        assert_eq!(encode_segment("R-3024.a_b~c"), "R-3024.a_b~c");
    }

    #[test]
    fn view_type_round_trip() {
        assert_eq!(ViewType::from_str("arrivals"), ViewType::Arrivals);
        assert_eq!(ViewType::from_str("anything"), ViewType::Departures);
        assert_eq!(ViewType::Departures.toggle(), ViewType::Arrivals);
        assert_eq!(ViewType::Arrivals.path(), "arrivals");
    }

    #[test]
    fn report_payload_omits_unused_fields() {
        let payload = ReportPayload {
            train_number: "501".to_string(),
            report_type: "delay".to_string(),
            message: "stuck".to_string(),
            station_name: "Sinaia".to_string(),
            delay_minutes: Some(10),
            platform: None,
            crowding_level: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["delay_minutes"], 10);
        assert!(json.get("platform").is_none());
        assert!(json.get("crowding_level").is_none());
    }
}

#[cfg(all(test, feature = "net-tests"))]
mod net_tests {
    use super::{fetch_train, probe, ProbeOutcome};
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    fn serve_once(body: &'static str, status: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 1024];
                let _ = stream.read(&mut buf);
                let response = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {}\r\nContent-Type: application/json\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}")
    }

    #[test]
    fn train_lookup_paths() {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        let base = serve_once(r#"{"train_number":"501","stops":[]}"#, "200 OK");
        let detail = fetch_train(&client, &base, "501").unwrap();
        assert_eq!(detail.train_number.as_deref(), Some("501"));

        let base = serve_once(
            r#"{"error":"Train 9 not found","suggestions":["IC 536"]}"#,
            "404 Not Found",
        );
        let failure = fetch_train(&client, &base, "9").unwrap_err();
        assert_eq!(failure.message, "Train 9 not found");
        assert_eq!(failure.suggestions, vec!["IC 536".to_string()]);

        let failure = fetch_train(&client, "http://127.0.0.1:1", "501").unwrap_err();
        assert_eq!(failure.message, super::GENERIC_NETWORK_ERROR);
    }

    #[test]
    fn probe_classification() {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();

        let base = serve_once("{}", "200 OK");
        assert_eq!(probe(&client, &base), ProbeOutcome::Reachable);

        let base = serve_once("{}", "503 Service Unavailable");
        assert_eq!(probe(&client, &base), ProbeOutcome::Degraded);

        assert_eq!(
            probe(&client, "http://127.0.0.1:1"),
            ProbeOutcome::Unreachable
        );
    }
}
