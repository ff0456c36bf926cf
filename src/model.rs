use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Metadata attached to a train lookup describing where the payload came
/// from. `kind` is the backend's discriminant string (`real_data`,
/// `fallback_data`, ...); anything else is treated as unknown.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct DataSource {
    #[serde(rename = "type")]
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "de_opt_bool_from_any")]
    pub cfr_attempted: Option<bool>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TrainDetail {
    #[serde(default)]
    pub train_number: Option<String>,
    #[serde(default)]
    pub train_name: Option<String>,
    #[serde(default, alias = "stations")]
    pub stops: Vec<TrainStop>,
    #[serde(default)]
    pub data_source: Option<DataSource>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TrainStop {
    #[serde(default)]
    pub station_name: Option<String>,
    #[serde(default)]
    pub arrival_time: Option<String>,
    #[serde(default)]
    pub departure_time: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64_from_any")]
    pub delay: Option<i64>,
    #[serde(default)]
    pub is_origin: bool,
    #[serde(default)]
    pub is_destination: bool,
}

/// Error body returned by the train lookup on a non-2xx status. The
/// backend uses `error` or `message` interchangeably.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct LookupError {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, deserialize_with = "de_string_list")]
    pub suggestions: Vec<String>,
}

impl LookupError {
    pub fn text(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct Station {
    #[serde(default, deserialize_with = "de_opt_string_from_any")]
    pub station_id: Option<String>,
    #[serde(default)]
    pub name: String,
}

/// `/get-stations/` answers either `{stations: [...]}` or a bare list.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum StationsResponse {
    Wrapped {
        #[serde(default)]
        stations: Vec<Station>,
    },
    Bare(Vec<Station>),
}

impl StationsResponse {
    pub fn into_stations(self) -> Vec<Station> {
        match self {
            StationsResponse::Wrapped { stations } => stations,
            StationsResponse::Bare(stations) => stations,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct BoardRow {
    #[serde(default)]
    pub train_number: Option<String>,
    #[serde(default)]
    pub train_name: Option<String>,
    #[serde(default)]
    pub destination: Option<String>,
    #[serde(default)]
    pub origin: Option<String>,
    #[serde(default)]
    pub departure_timestamp: Option<String>,
    #[serde(default)]
    pub arrival_timestamp: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64_from_any")]
    pub delay: Option<i64>,
    #[serde(default)]
    pub platform: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct TrainSuggestion {
    #[serde(default)]
    pub train_number: String,
    #[serde(rename = "type")]
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct ReportsResponse {
    #[serde(default)]
    pub reports: Vec<PassengerReport>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PassengerReport {
    #[serde(default)]
    pub report_type: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64_from_any")]
    pub delay_minutes: Option<i64>,
    #[serde(default)]
    pub crowding_level: Option<String>,
    #[serde(default)]
    pub station_name: Option<String>,
    #[serde(default)]
    pub time_ago: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64_from_any")]
    pub verified_count: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64_from_any")]
    pub helpful_count: Option<i64>,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct SeatsResponse {
    #[serde(default)]
    pub seat_availability: Vec<SeatRow>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct SeatRow {
    #[serde(default)]
    pub car_number: Option<String>,
    #[serde(default, deserialize_with = "de_opt_i64_from_any")]
    pub available_seats: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64_from_any")]
    pub total_seats: Option<i64>,
    #[serde(default, deserialize_with = "de_opt_i64_from_any")]
    pub occupancy_rate: Option<i64>,
    #[serde(default)]
    pub station_name: Option<String>,
    #[serde(default)]
    pub time_ago: Option<String>,
}

/// `POST /api/passenger/*` success body. Errors come back as `{error}`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SubmitResponse {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct CfrStatus {
    #[serde(default)]
    pub cfr_main_site: bool,
    #[serde(default)]
    pub train_pages: bool,
    #[serde(default)]
    pub stations_page: bool,
    #[serde(default)]
    pub overall_status: bool,
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn de_opt_i64_from_any<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Number(number) => {
            if let Some(value) = number.as_i64() {
                Ok(Some(value))
            } else if let Some(value) = number.as_f64() {
                Ok(Some(value as i64))
            } else {
                Ok(None)
            }
        }
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else if let Ok(value) = trimmed.parse::<i64>() {
                Ok(Some(value))
            } else if let Ok(value) = trimmed.parse::<f64>() {
                Ok(Some(value as i64))
            } else {
                Ok(None)
            }
        }
        Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "expected number or null, got {other}"
        ))),
    }
}

fn de_opt_bool_from_any<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(value) => Ok(Some(value)),
        Value::Number(number) => Ok(number.as_i64().map(|v| v != 0)),
        Value::String(text) => Ok(Some(matches!(
            text.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        ))),
        Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "expected bool or null, got {other}"
        ))),
    }
}

/// Station ids arrive as integers from the board endpoints and as strings
/// from the search endpoint.
fn de_opt_string_from_any<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                Ok(None)
            } else {
                Ok(Some(trimmed.to_string()))
            }
        }
        Value::Number(number) => Ok(Some(number.to_string())),
        Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

fn de_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| match item {
                Value::String(text) => Some(text),
                Value::Number(number) => Some(number.to_string()),
                _ => None,
            })
            .collect()),
        Value::Null => Ok(Vec::new()),
        other => Err(serde::de::Error::custom(format!(
            "expected array or null, got {other}"
        ))),
    }
}
