//! Typed view of the effective config.

use anyhow::{bail, Context, Result};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sw_schemas::AsOfPolicy;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Concurrent store computations per job.
    pub workers: usize,
    pub output_dir: String,
    /// Bound for `trigger_and_download_report`.
    pub wait_timeout_secs: u64,
    pub as_of_policy: AsOfPolicy,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            workers: 8,
            output_dir: "reports".to_string(),
            wait_timeout_secs: 30,
            as_of_policy: AsOfPolicy::WallClock,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// IANA zone for stores without a usable configured zone.
    pub fallback_timezone: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            fallback_timezone: "America/Chicago".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Name of the env var holding the Postgres URL (never the URL itself).
    pub url_env: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url_env: "SW_DATABASE_URL".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub report: ReportConfig,
    pub calendar: CalendarConfig,
    pub database: DatabaseConfig,
}

impl EngineConfig {
    /// Deserialize and validate. Missing keys take defaults; unknown keys are
    /// ignored here and surfaced by `report_unused_keys`.
    pub fn from_config_json(config_json: &Value) -> Result<Self> {
        let mut cfg: EngineConfig = serde_json::from_value(config_json.clone())
            .context("CONFIG_INVALID: config does not match the engine schema")?;
        cfg.report.workers = cfg.report.workers.max(1);
        cfg.fallback_tz()?;
        if cfg.report.output_dir.trim().is_empty() {
            bail!("CONFIG_INVALID: report.output_dir must not be empty");
        }
        Ok(cfg)
    }

    pub fn fallback_tz(&self) -> Result<Tz> {
        match self.calendar.fallback_timezone.trim().parse::<Tz>() {
            Ok(tz) => Ok(tz),
            Err(_) => bail!(
                "CONFIG_INVALID: calendar.fallback_timezone '{}' is not an IANA zone",
                self.calendar.fallback_timezone
            ),
        }
    }

    pub fn wait_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.report.wait_timeout_secs)
    }
}
