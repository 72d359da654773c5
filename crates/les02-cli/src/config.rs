//! Listener configuration – reads/writes `~/.les02/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use les02_types::Les02Error;
use serde::{Deserialize, Serialize};

/// Persisted listener configuration.  Every field has a default, so an
/// empty or partial file is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SocketCAN interface to read from.
    #[serde(default = "default_can_interface")]
    pub can_interface: String,

    /// Host the WebSocket server binds to.
    #[serde(default = "default_ws_host")]
    pub ws_host: String,

    /// Port the WebSocket server listens on.
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,

    /// Sleep between polls of an empty bridge queue, in milliseconds.
    #[serde(default = "default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,

    /// Feed the bridge from the built-in simulator instead of SocketCAN.
    #[serde(default)]
    pub simulate: bool,

    /// Delay between simulated frames, in milliseconds.
    #[serde(default = "default_sim_period_ms")]
    pub sim_period_ms: u64,
}

fn default_can_interface() -> String {
    "vcan0".to_string()
}
fn default_ws_host() -> String {
    les02_middleware::DEFAULT_HOST.to_string()
}
fn default_ws_port() -> u16 {
    les02_middleware::DEFAULT_PORT
}
fn default_idle_backoff_ms() -> u64 {
    1
}
fn default_sim_period_ms() -> u64 {
    2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            can_interface: default_can_interface(),
            ws_host: default_ws_host(),
            ws_port: default_ws_port(),
            idle_backoff_ms: default_idle_backoff_ms(),
            simulate: false,
            sim_period_ms: default_sim_period_ms(),
        }
    }
}

impl Config {
    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }

    pub fn sim_period(&self) -> Duration {
        Duration::from_millis(self.sim_period_ms)
    }
}

/// Return the path to `~/.les02/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".les02").join("config.toml")
}

/// Load the config at `path`.  Returns `None` if the file does not exist.
pub fn load_from(path: &Path) -> Result<Option<Config>, Les02Error> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| Les02Error::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| Les02Error::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Load `path` (defaults when absent) and apply `LES02_*` overrides.
pub fn resolve(path: &Path) -> Result<Config, Les02Error> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Apply `LES02_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `LES02_CAN_INTERFACE` | `can_interface` |
/// | `LES02_WS_HOST` | `ws_host` |
/// | `LES02_WS_PORT` | `ws_port` |
/// | `LES02_IDLE_BACKOFF_MS` | `idle_backoff_ms` |
/// | `LES02_SIMULATE` | `simulate` (`1`/`true`/`yes` or `0`/`false`/`no`) |
///
/// Unparseable values are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("LES02_CAN_INTERFACE") {
        cfg.can_interface = v;
    }
    if let Ok(v) = std::env::var("LES02_WS_HOST") {
        cfg.ws_host = v;
    }
    if let Ok(v) = std::env::var("LES02_WS_PORT")
        && let Ok(port) = v.parse::<u16>()
    {
        cfg.ws_port = port;
    }
    if let Ok(v) = std::env::var("LES02_IDLE_BACKOFF_MS")
        && let Ok(ms) = v.parse::<u64>()
    {
        cfg.idle_backoff_ms = ms;
    }
    if let Ok(v) = std::env::var("LES02_SIMULATE")
        && let Some(flag) = parse_flag(&v)
    {
        cfg.simulate = flag;
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Write `cfg` to `path`, creating the parent directory if necessary.
pub fn save_to(cfg: &Config, path: &Path) -> Result<(), Les02Error> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Les02Error::Config(format!("failed to create {}: {e}", parent.display())))?;
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| Les02Error::Config(format!("failed to serialize config: {e}")))?;
    fs::write(path, raw)
        .map_err(|e| Les02Error::Config(format!("failed to write {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_listener_contract() {
        let cfg = Config::default();
        assert_eq!(cfg.can_interface, "vcan0");
        assert_eq!(cfg.ws_host, "localhost");
        assert_eq!(cfg.ws_port, 8765);
        assert_eq!(cfg.idle_backoff(), Duration::from_millis(1));
        assert!(!cfg.simulate);
        assert_eq!(cfg.sim_period(), Duration::from_millis(2));
    }

    #[test]
    fn roundtrip_through_file() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config {
            can_interface: "can1".to_string(),
            ws_port: 9001,
            simulate: true,
            ..Config::default()
        };
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "ws_port = 9100\n").unwrap();

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded.ws_port, 9100);
        assert_eq!(loaded.can_interface, "vcan0");
        assert_eq!(loaded.ws_host, "localhost");
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn malformed_file_is_a_config_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "ws_port = \"not a number\"\n").unwrap();
        assert!(matches!(load_from(&path), Err(Les02Error::Config(_))));
    }

    #[test]
    fn config_path_points_to_les02_dir() {
        let p = config_path_for_home("/home/operator");
        assert!(p.to_string_lossy().contains(".les02"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn parse_flag_accepts_common_spellings() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" Yes "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    // All env-var assertions live in one test so parallel tests never race
    // on the same variables.
    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        // SAFETY: the LES02_* variables are only touched by this test.
        unsafe {
            std::env::set_var("LES02_CAN_INTERFACE", "can0");
            std::env::set_var("LES02_WS_PORT", "9999");
            std::env::set_var("LES02_SIMULATE", "true");
            std::env::set_var("LES02_IDLE_BACKOFF_MS", "not-a-number");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.can_interface, "can0");
        assert_eq!(cfg.ws_port, 9999);
        assert!(cfg.simulate);
        assert_eq!(cfg.idle_backoff_ms, 1);

        unsafe { std::env::set_var("LES02_WS_PORT", "70000") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg);
        assert_eq!(cfg.ws_port, 8765);

        let dir = tempfile::tempdir().expect("tmp dir");
        let resolved = resolve(&dir.path().join("missing.toml")).expect("resolve");
        assert_eq!(resolved.can_interface, "can0");

        unsafe {
            std::env::remove_var("LES02_CAN_INTERFACE");
            std::env::remove_var("LES02_WS_PORT");
            std::env::remove_var("LES02_SIMULATE");
            std::env::remove_var("LES02_IDLE_BACKOFF_MS");
        }
    }
}
