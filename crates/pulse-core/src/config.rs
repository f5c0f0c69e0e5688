//! pulse.toml configuration parser.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::target::{Target, TargetRegistry};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PulseConfig {
    #[serde(default)]
    pub probe: ProbeConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub targets: Vec<TargetConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    pub name: String,
    pub url: String,
    /// Store key override; defaults to `UrlMonitor:Web.<name>:Status`.
    pub key: Option<String>,
}

/// HTTP probe tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// Total attempts per probe, including the first.
    pub max_attempts: u32,
    pub backoff_initial_ms: u64,
    pub backoff_max_ms: u64,
    /// Status codes treated as transient and retried.
    pub retry_statuses: Vec<u16>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            read_timeout_secs: 30,
            max_attempts: 3,
            backoff_initial_ms: 1000,
            backoff_max_ms: 8000,
            retry_statuses: vec![500, 502, 503, 504],
        }
    }
}

impl ProbeConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn backoff_initial(&self) -> Duration {
        Duration::from_millis(self.backoff_initial_ms)
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_millis(self.backoff_max_ms)
    }
}

/// Chat delivery tuning. Token and channel come from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub max_attempts: u32,
    pub retry_delay_ms: u64,
    pub api_base: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay_ms: 1000,
            api_base: "https://slack.com/api".to_string(),
        }
    }
}

impl NotifyConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Timer settings used by `pulsed serve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub interval_secs: u64,
    /// How far past its scheduled instant a tick may fire before it counts as late.
    pub late_tolerance_secs: u64,
    /// Offset used for the run timestamp in logs.
    pub utc_offset_hours: i32,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            late_tolerance_secs: 10,
            utc_offset_hours: 9,
        }
    }
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn late_tolerance(&self) -> Duration {
        Duration::from_secs(self.late_tolerance_secs)
    }
}

impl PulseConfig {
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate settings. Targets are validated by [`Self::registry`].
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: PulseConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.probe.max_attempts == 0 {
            return Err(invalid("probe.max_attempts", "must be at least 1"));
        }
        if self.probe.backoff_initial_ms > self.probe.backoff_max_ms {
            return Err(invalid(
                "probe.backoff_initial_ms",
                "must not exceed probe.backoff_max_ms",
            ));
        }
        if self.probe.connect_timeout_secs == 0 || self.probe.read_timeout_secs == 0 {
            return Err(invalid("probe", "timeouts must be non-zero"));
        }
        if self.notify.max_attempts == 0 {
            return Err(invalid("notify.max_attempts", "must be at least 1"));
        }
        if self.schedule.interval_secs == 0 {
            return Err(invalid("schedule.interval_secs", "must be non-zero"));
        }
        if !(-23..=23).contains(&self.schedule.utc_offset_hours) {
            return Err(invalid("schedule.utc_offset_hours", "must be within ±23"));
        }
        Ok(())
    }

    /// Build the ordered target registry.
    pub fn registry(&self) -> ConfigResult<TargetRegistry> {
        let targets = self
            .targets
            .iter()
            .map(|t| Target::new(&t.name, &t.url, t.key.as_deref()))
            .collect::<ConfigResult<Vec<_>>>()?;
        TargetRegistry::new(targets)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_uses_defaults() {
        let config = PulseConfig::from_toml_str(
            r#"
[[targets]]
name = "Seeed"
url = "https://www.seeed.co.jp/"
"#,
        )
        .unwrap();

        assert_eq!(config.probe.connect_timeout(), Duration::from_secs(10));
        assert_eq!(config.probe.read_timeout(), Duration::from_secs(30));
        assert_eq!(config.probe.max_attempts, 3);
        assert_eq!(config.probe.retry_statuses, [500, 502, 503, 504]);
        assert_eq!(config.notify.max_attempts, 3);
        assert_eq!(config.schedule.utc_offset_hours, 9);

        let registry = config.registry().unwrap();
        let target = registry.iter().next().unwrap();
        assert_eq!(target.store_key, "UrlMonitor:Web.Seeed:Status");
    }

    #[test]
    fn parse_overrides() {
        let config = PulseConfig::from_toml_str(
            r#"
[probe]
connect_timeout_secs = 2
read_timeout_secs = 5
retry_statuses = [503]

[notify]
max_attempts = 5
api_base = "http://127.0.0.1:9000"

[schedule]
interval_secs = 60

[[targets]]
name = "a"
url = "https://a.example/"
key = "custom:a"

[[targets]]
name = "b"
url = "https://b.example/"
"#,
        )
        .unwrap();

        assert_eq!(config.probe.read_timeout(), Duration::from_secs(5));
        assert_eq!(config.probe.retry_statuses, [503]);
        // Unset fields in a present section keep their defaults.
        assert_eq!(config.probe.max_attempts, 3);
        assert_eq!(config.notify.max_attempts, 5);
        assert_eq!(config.schedule.interval(), Duration::from_secs(60));

        let registry = config.registry().unwrap();
        let keys: Vec<&str> = registry.iter().map(|t| t.store_key.as_str()).collect();
        assert_eq!(keys, ["custom:a", "UrlMonitor:Web.b:Status"]);
    }

    #[test]
    fn zero_attempts_rejected() {
        let err = PulseConfig::from_toml_str("[probe]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "probe.max_attempts", .. }));
    }

    #[test]
    fn inverted_backoff_bounds_rejected() {
        let err = PulseConfig::from_toml_str(
            "[probe]\nbackoff_initial_ms = 5000\nbackoff_max_ms = 100\n",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn registry_requires_targets() {
        let config = PulseConfig::from_toml_str("").unwrap();
        assert!(matches!(config.registry(), Err(ConfigError::EmptyTargets)));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let err = PulseConfig::from_toml_str("[[targets]\nname=").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn from_file_reads_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pulse.toml");
        std::fs::write(
            &path,
            "[[targets]]\nname = \"x\"\nurl = \"http://x.example/\"\n",
        )
        .unwrap();

        let config = PulseConfig::from_file(&path).unwrap();
        assert_eq!(config.targets.len(), 1);
        assert!(matches!(
            PulseConfig::from_file(&dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
