use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use tracing::{info, warn};

use crate::limits::*;

/// Daemon settings, read once from the environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    pub courses: Vec<String>,
    pub metrics_port: Option<u16>,
    pub compact_threshold: u64,
    pub hold_ttl_seconds: u32,
    pub reaper_interval: Duration,
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let data_dir: String = try_load(&lookup, "TEESHEET_DATA_DIR", "./data".to_string());
        let courses = lookup("TEESHEET_COURSES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let metrics_port = lookup("TEESHEET_METRICS_PORT").and_then(|raw| match raw.parse() {
            Ok(port) => Some(port),
            Err(e) => {
                warn!("Invalid TEESHEET_METRICS_PORT value: {e}, metrics disabled");
                None
            }
        });
        let reaper_ms: u64 = try_load(
            &lookup,
            "TEESHEET_REAPER_INTERVAL_MS",
            DEFAULT_REAPER_INTERVAL_MS as u64,
        );

        Self {
            data_dir: PathBuf::from(data_dir),
            courses,
            metrics_port,
            compact_threshold: try_load(&lookup, "TEESHEET_COMPACT_THRESHOLD", 1000),
            hold_ttl_seconds: try_load(
                &lookup,
                "TEESHEET_HOLD_TTL_SECONDS",
                DEFAULT_HOLD_TTL_SECONDS,
            ),
            reaper_interval: Duration::from_millis(reaper_ms.max(1)),
        }
    }
}

fn try_load<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Display,
    T::Err: Display,
{
    let Some(raw) = lookup(key) else {
        info!("{key} not set, using default: {default}");
        return default;
    };
    raw.trim().parse().unwrap_or_else(|e| {
        warn!("Invalid {key} value: {e}, using default: {default}");
        default
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        let cfg = config(&[]);
        assert_eq!(cfg.data_dir, PathBuf::from("./data"));
        assert!(cfg.courses.is_empty());
        assert_eq!(cfg.metrics_port, None);
        assert_eq!(cfg.compact_threshold, 1000);
        assert_eq!(cfg.hold_ttl_seconds, DEFAULT_HOLD_TTL_SECONDS);
        assert_eq!(cfg.reaper_interval, Duration::from_millis(DEFAULT_REAPER_INTERVAL_MS as u64));
    }

    #[test]
    fn reads_values() {
        let cfg = config(&[
            ("TEESHEET_DATA_DIR", "/var/lib/teesheet"),
            ("TEESHEET_COURSES", "pines, links,,oak_hill"),
            ("TEESHEET_METRICS_PORT", "9100"),
            ("TEESHEET_COMPACT_THRESHOLD", "50"),
            ("TEESHEET_HOLD_TTL_SECONDS", "600"),
            ("TEESHEET_REAPER_INTERVAL_MS", "250"),
        ]);
        assert_eq!(cfg.data_dir, PathBuf::from("/var/lib/teesheet"));
        assert_eq!(cfg.courses, vec!["pines", "links", "oak_hill"]);
        assert_eq!(cfg.metrics_port, Some(9100));
        assert_eq!(cfg.compact_threshold, 50);
        assert_eq!(cfg.hold_ttl_seconds, 600);
        assert_eq!(cfg.reaper_interval, Duration::from_millis(250));
    }

    #[test]
    fn invalid_values_fall_back() {
        let cfg = config(&[
            ("TEESHEET_METRICS_PORT", "not-a-port"),
            ("TEESHEET_HOLD_TTL_SECONDS", "-5"),
            ("TEESHEET_REAPER_INTERVAL_MS", "0"),
        ]);
        assert_eq!(cfg.metrics_port, None);
        assert_eq!(cfg.hold_ttl_seconds, DEFAULT_HOLD_TTL_SECONDS);
        assert_eq!(cfg.reaper_interval, Duration::from_millis(1));
    }
}
