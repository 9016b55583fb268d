//! Process configuration, loaded once at startup from the environment.
//!
//! Mirrors the teacher's single immutable `AppState`-held config: no
//! module-level mutable globals, no lazily-initialized singletons. Built by
//! `Config::from_env` and then wrapped in an `Arc` by the caller.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub port: u16,
    pub cors_origins: Vec<String>,
    pub intelligence_token: Option<String>,
    pub webhook_url: Option<String>,
    pub llm_api_key: Option<String>,
    pub cycle_interval: Duration,
    pub collector_intervals: CollectorIntervals,
}

#[derive(Debug, Clone)]
pub struct CollectorIntervals {
    pub tasks: Duration,
    pub calendar: Duration,
    pub gmail: Duration,
    pub asana: Duration,
    pub xero: Duration,
}

impl Default for CollectorIntervals {
    fn default() -> Self {
        CollectorIntervals {
            tasks: Duration::from_secs(300),
            calendar: Duration::from_secs(300),
            gmail: Duration::from_secs(180),
            asana: Duration::from_secs(600),
            xero: Duration::from_secs(3600),
        }
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let data_dir = match std::env::var("AGENCYOS_DATA_DIR") {
            Ok(v) => PathBuf::from(v),
            Err(_) => dirs::home_dir()
                .ok_or_else(|| "could not determine home directory".to_string())?
                .join(".agencyos"),
        };

        let db_path = match std::env::var("AGENCYOS_DB_PATH") {
            Ok(v) => PathBuf::from(v),
            Err(_) => data_dir.join("agency.db"),
        };

        let port = std::env::var("AGENCYOS_PORT")
            .ok()
            .and_then(|v| v.parse::<u16>().ok())
            .unwrap_or(4317);

        let cors_origins = std::env::var("AGENCYOS_CORS_ORIGINS")
            .ok()
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default();

        let intelligence_token = std::env::var("AGENCYOS_INTELLIGENCE_TOKEN").ok();
        let webhook_url = std::env::var("AGENCYOS_WEBHOOK_URL").ok();
        let llm_api_key = std::env::var("AGENCYOS_LLM_API_KEY").ok();

        let cycle_interval = env_secs("AGENCYOS_CYCLE_INTERVAL_SECS", Duration::from_secs(300));

        let default_intervals = CollectorIntervals::default();
        let collector_intervals = CollectorIntervals {
            tasks: env_secs("AGENCYOS_INTERVAL_TASKS", default_intervals.tasks),
            calendar: env_secs("AGENCYOS_INTERVAL_CALENDAR", default_intervals.calendar),
            gmail: env_secs("AGENCYOS_INTERVAL_GMAIL", default_intervals.gmail),
            asana: env_secs("AGENCYOS_INTERVAL_ASANA", default_intervals.asana),
            xero: env_secs("AGENCYOS_INTERVAL_XERO", default_intervals.xero),
        };

        Ok(Config {
            data_dir,
            db_path,
            port,
            cors_origins,
            intelligence_token,
            webhook_url,
            llm_api_key,
            cycle_interval,
            collector_intervals,
        })
    }

    /// The polling interval §4.2 assigns to a given collector by its
    /// `sync_state.source` name. Unknown sources fall back to the
    /// tasks/calendar default (300s) rather than polling unconditionally.
    pub fn interval_for(&self, source: &str) -> Duration {
        match source {
            "google_tasks" => self.collector_intervals.tasks,
            "calendar" => self.collector_intervals.calendar,
            "gmail" => self.collector_intervals.gmail,
            "asana" => self.collector_intervals.asana,
            "xero" => self.collector_intervals.xero,
            _ => Duration::from_secs(300),
        }
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.data_dir.join("snapshot_history")
    }

    pub fn current_snapshot_path(&self) -> PathBuf {
        self.data_dir.join("agency_snapshot.json")
    }

    pub fn previous_snapshot_path(&self) -> PathBuf {
        self.data_dir.join("previous_snapshot.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_collector_intervals_are_nonzero() {
        let intervals = CollectorIntervals::default();
        assert!(intervals.tasks.as_secs() > 0);
        assert!(intervals.gmail.as_secs() > 0);
    }

    #[test]
    fn interval_for_maps_each_known_source() {
        let config = Config::from_env().unwrap();
        assert_eq!(config.interval_for("google_tasks"), config.collector_intervals.tasks);
        assert_eq!(config.interval_for("calendar"), config.collector_intervals.calendar);
        assert_eq!(config.interval_for("gmail"), config.collector_intervals.gmail);
        assert_eq!(config.interval_for("asana"), config.collector_intervals.asana);
        assert_eq!(config.interval_for("xero"), config.collector_intervals.xero);
    }
}
