use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_REFRESH_SECS: u64 = 30;
pub const DEFAULT_PROBE_SECS: u64 = 30;
pub const DEFAULT_CFR_SECS: u64 = 300;
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_THEME: &str = "light";
pub const DEFAULT_VIEW: &str = "departures";

#[derive(Debug, Clone)]
pub struct Config {
    pub base_url: String,
    pub refresh: Duration,
    pub probe: Duration,
    pub cfr_refresh: Duration,
    pub timeout: Duration,
    pub theme: String,
    pub view: String,
    pub config_path: PathBuf,
    pub log_enabled: bool,
    pub log_level: String,
    pub log_file: String,
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    base_url: Option<String>,
    refresh_secs: Option<u64>,
    probe_secs: Option<u64>,
    cfr_secs: Option<u64>,
    timeout_secs: Option<u64>,
    theme: Option<String>,
    view: Option<String>,
    log_enabled: Option<bool>,
    log_level: Option<String>,
    log_file: Option<String>,
}

pub fn parse_args() -> Result<Config> {
    let args: Vec<String> = env::args().skip(1).collect();
    let mut explicit_config: Option<PathBuf> = None;
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let value = iter
                .next()
                .ok_or_else(|| anyhow!("--config needs a value"))?;
            explicit_config = Some(PathBuf::from(value));
        }
    }

    let env_config = env::var("GARA_CONFIG").ok().map(PathBuf::from);
    let config_path = explicit_config
        .clone()
        .or(env_config)
        .unwrap_or_else(|| PathBuf::from("gara-tui.toml"));

    let mut config = Config {
        base_url: DEFAULT_BASE_URL.to_string(),
        refresh: Duration::from_secs(DEFAULT_REFRESH_SECS),
        probe: Duration::from_secs(DEFAULT_PROBE_SECS),
        cfr_refresh: Duration::from_secs(DEFAULT_CFR_SECS),
        timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        theme: DEFAULT_THEME.to_string(),
        view: DEFAULT_VIEW.to_string(),
        config_path: config_path.clone(),
        log_enabled: false,
        log_level: "info".to_string(),
        log_file: "gara-tui.log".to_string(),
    };

    if config_path.exists() {
        if let Some(file_config) = load_file_config(&config_path)? {
            apply_file_config(&mut config, file_config);
        }
    } else if explicit_config.is_some() {
        return Err(anyhow!("Config file not found: {}", config_path.display()));
    }

    config.config_path = config_path.clone();

    if let Ok(url) = env::var("GARA_URL") {
        config.base_url = url;
    }
    if let Ok(value) = env::var("GARA_REFRESH") {
        if let Ok(secs) = value.parse::<u64>() {
            config.refresh = Duration::from_secs(secs.max(5));
        }
    }
    if let Ok(value) = env::var("GARA_PROBE") {
        if let Ok(secs) = value.parse::<u64>() {
            config.probe = Duration::from_secs(secs.max(5));
        }
    }
    if let Ok(value) = env::var("GARA_CFR_REFRESH") {
        if let Ok(secs) = value.parse::<u64>() {
            config.cfr_refresh = Duration::from_secs(secs.max(30));
        }
    }
    if let Ok(value) = env::var("GARA_TIMEOUT") {
        if let Ok(secs) = value.parse::<u64>() {
            config.timeout = Duration::from_secs(secs.max(2));
        }
    }
    if let Ok(value) = env::var("GARA_THEME") {
        config.theme = value;
    }
    if let Ok(value) = env::var("GARA_VIEW") {
        config.view = value;
    }
    if let Ok(value) = env::var("GARA_LOG_ENABLED") {
        config.log_enabled = matches!(value.as_str(), "1" | "true" | "yes" | "on");
    }
    if let Ok(value) = env::var("GARA_LOG_LEVEL") {
        config.log_level = value;
    }
    if let Ok(value) = env::var("GARA_LOG_FILE") {
        config.log_file = value;
    }

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                iter.next();
            }
            "--url" => {
                config.base_url = iter
                    .next()
                    .ok_or_else(|| anyhow!("--url needs a value"))?
                    .to_string();
            }
            "--refresh" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--refresh needs a value"))?;
                let secs: u64 = value.parse()?;
                config.refresh = Duration::from_secs(secs.max(5));
            }
            "--probe" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--probe needs a value"))?;
                let secs: u64 = value.parse()?;
                config.probe = Duration::from_secs(secs.max(5));
            }
            "--cfr-refresh" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--cfr-refresh needs a value"))?;
                let secs: u64 = value.parse()?;
                config.cfr_refresh = Duration::from_secs(secs.max(30));
            }
            "--timeout" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--timeout needs a value"))?;
                let secs: u64 = value.parse()?;
                config.timeout = Duration::from_secs(secs.max(2));
            }
            "--theme" => {
                config.theme = iter
                    .next()
                    .ok_or_else(|| anyhow!("--theme needs a value"))?
                    .to_string();
            }
            "--view" => {
                config.view = iter
                    .next()
                    .ok_or_else(|| anyhow!("--view needs a value"))?
                    .to_string();
            }
            "--log" => {
                config.log_enabled = true;
            }
            "--no-log" => {
                config.log_enabled = false;
            }
            "--log-level" => {
                config.log_level = iter
                    .next()
                    .ok_or_else(|| anyhow!("--log-level needs a value"))?
                    .to_string();
            }
            "--log-file" => {
                config.log_file = iter
                    .next()
                    .ok_or_else(|| anyhow!("--log-file needs a value"))?
                    .to_string();
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => {
                return Err(anyhow!("Unknown argument: {other}"));
            }
        }
    }

    validate(&config)?;
    Ok(config)
}

fn load_file_config(path: &Path) -> Result<Option<FileConfig>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config: {}", path.display()))?;
    let cfg: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config: {}", path.display()))?;
    Ok(Some(cfg))
}

fn apply_file_config(target: &mut Config, file: FileConfig) {
    if let Some(base_url) = file.base_url {
        target.base_url = base_url;
    }
    if let Some(refresh_secs) = file.refresh_secs {
        target.refresh = Duration::from_secs(refresh_secs.max(5));
    }
    if let Some(probe_secs) = file.probe_secs {
        target.probe = Duration::from_secs(probe_secs.max(5));
    }
    if let Some(cfr_secs) = file.cfr_secs {
        target.cfr_refresh = Duration::from_secs(cfr_secs.max(30));
    }
    if let Some(timeout_secs) = file.timeout_secs {
        target.timeout = Duration::from_secs(timeout_secs.max(2));
    }
    if let Some(theme) = file.theme {
        target.theme = theme;
    }
    if let Some(view) = file.view {
        target.view = view;
    }
    if let Some(log_enabled) = file.log_enabled {
        target.log_enabled = log_enabled;
    }
    if let Some(log_level) = file.log_level {
        target.log_level = log_level;
    }
    if let Some(log_file) = file.log_file {
        target.log_file = log_file;
    }
}

/// Persist the theme toggle back into the config file without touching
/// anything else the user wrote there.
pub fn save_theme(path: &Path, theme: &str) -> Result<()> {
    let mut doc = match fs::read_to_string(path) {
        Ok(content) => content
            .parse::<toml_edit::DocumentMut>()
            .with_context(|| format!("Failed to parse config: {}", path.display()))?,
        Err(_) => toml_edit::DocumentMut::new(),
    };
    doc["theme"] = toml_edit::value(theme);
    fs::write(path, doc.to_string())
        .with_context(|| format!("Failed to write config: {}", path.display()))?;
    Ok(())
}

fn print_help() {
    println!("gara-tui");
    println!("Usage: gara-tui [--url URL] [--refresh SECONDS] [--probe SECONDS]");
    println!("       [--cfr-refresh SECONDS] [--timeout SECONDS] [--config PATH]");
    println!("       [--theme light|dark] [--view departures|arrivals]");
    println!("       [--log] [--no-log] [--log-level LEVEL] [--log-file PATH]");
    println!("Environment: GARA_URL overrides the backend base URL");
    println!("Environment: GARA_CONFIG overrides config path");
    println!("Environment: GARA_REFRESH/PROBE/CFR_REFRESH/TIMEOUT set intervals in seconds");
    println!("Environment: GARA_THEME sets the color theme");
    println!("Environment: GARA_VIEW sets the initial station board view");
    println!("Environment: GARA_LOG_ENABLED/LEVEL/FILE configure logging");
    println!("Keys: t train search | s station search | v view | a auto-refresh | R retry");
    println!("      r report | S seats | p tip | c clear | d theme | ? help | q quit");
}

fn validate(config: &Config) -> Result<()> {
    let url = config.base_url.trim().to_ascii_lowercase();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(anyhow!(
            "Backend URL must start with http:// or https://: {}",
            config.base_url
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_file(name: &str) -> PathBuf {
        let mut dir = std::env::temp_dir();
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        dir.push(format!("gara-tui-config-test-{suffix}"));
        let _ = fs::create_dir_all(&dir);
        dir.push(name);
        dir
    }

    fn base_config() -> Config {
        Config {
            base_url: DEFAULT_BASE_URL.to_string(),
            refresh: Duration::from_secs(DEFAULT_REFRESH_SECS),
            probe: Duration::from_secs(DEFAULT_PROBE_SECS),
            cfr_refresh: Duration::from_secs(DEFAULT_CFR_SECS),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            theme: DEFAULT_THEME.to_string(),
            view: DEFAULT_VIEW.to_string(),
            config_path: PathBuf::from("gara-tui.toml"),
            log_enabled: false,
            log_level: "info".to_string(),
            log_file: "gara-tui.log".to_string(),
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate(&base_config()).is_ok());
    }

    #[test]
    fn rejects_non_http_url() {
        let mut cfg = base_config();
        cfg.base_url = "ftp://rail.example".to_string();
        let err = validate(&cfg).unwrap_err();
        assert!(err.to_string().contains("http"));
    }

    #[test]
    fn load_file_config_parses_values() {
        let path = temp_file("config.toml");
        let content = r#"
base_url = "http://rail.example:5000"
refresh_secs = 60
probe_secs = 15
cfr_secs = 120
timeout_secs = 5
theme = "dark"
view = "arrivals"
log_enabled = true
log_level = "debug"
log_file = "gara.log"
"#;
        fs::write(&path, content).unwrap();
        let cfg = load_file_config(&path).unwrap().unwrap();
        assert_eq!(cfg.base_url.as_deref(), Some("http://rail.example:5000"));
        assert_eq!(cfg.refresh_secs, Some(60));
        assert_eq!(cfg.probe_secs, Some(15));
        assert_eq!(cfg.cfr_secs, Some(120));
        assert_eq!(cfg.timeout_secs, Some(5));
        assert_eq!(cfg.theme.as_deref(), Some("dark"));
        assert_eq!(cfg.view.as_deref(), Some("arrivals"));
        assert_eq!(cfg.log_enabled, Some(true));
        assert_eq!(cfg.log_level.as_deref(), Some("debug"));
        assert_eq!(cfg.log_file.as_deref(), Some("gara.log"));
        let _ = fs::remove_file(&path);
        let _ = fs::remove_dir(path.parent().unwrap());
    }

    #[test]
    fn apply_file_config_overrides_and_clamps() {
        let mut cfg = base_config();
        let file = FileConfig {
            base_url: Some("http://other.example".to_string()),
            refresh_secs: Some(1),
            probe_secs: Some(0),
            cfr_secs: Some(10),
            timeout_secs: Some(0),
            theme: Some("dark".to_string()),
            log_enabled: Some(true),
            ..Default::default()
        };
        apply_file_config(&mut cfg, file);
        assert_eq!(cfg.base_url, "http://other.example");
        assert_eq!(cfg.refresh, Duration::from_secs(5));
        assert_eq!(cfg.probe, Duration::from_secs(5));
        assert_eq!(cfg.cfr_refresh, Duration::from_secs(30));
        assert_eq!(cfg.timeout, Duration::from_secs(2));
        assert_eq!(cfg.theme, "dark");
        assert!(cfg.log_enabled);
    }

    #[test]
    fn save_theme_preserves_other_keys() {
        let path = temp_file("theme.toml");
        fs::write(
            &path,
            "# my settings\nbase_url = \"http://rail.example\"\nrefresh_secs = 45\n",
        )
        .unwrap();
        save_theme(&path, "dark").unwrap();
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("# my settings"));
        assert!(written.contains("base_url = \"http://rail.example\""));
        assert!(written.contains("theme = \"dark\""));

        let cfg = load_file_config(&path).unwrap().unwrap();
        assert_eq!(cfg.theme.as_deref(), Some("dark"));
        assert_eq!(cfg.refresh_secs, Some(45));
        let _ = fs::remove_file(&path);
        let _ = fs::remove_dir(path.parent().unwrap());
    }
}
