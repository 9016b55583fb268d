//! Loop orchestrator: owns cycle cadence and strict phase ordering
//! (COLLECT -> NORMALIZE -> GATES -> RESOLUTION -> SNAPSHOT -> MOVES). A
//! phase failure marks the cycle failed but the orchestrator continues on
//! the next tick; cycles never overlap.

use crate::collectors::asana::AsanaCollector;
use crate::collectors::calendar::CalendarCollector;
use crate::collectors::gmail::GmailCollector;
use crate::collectors::google_tasks::GoogleTasksCollector;
use crate::collectors::xero::XeroCollector;
use crate::collectors::{run_once, Collector};
use crate::config::Config;
use crate::db::Store;
use crate::{gates, moves, normalizer, resolution, scoring, snapshot};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

pub struct Orchestrator {
    store: Arc<Mutex<Store>>,
    config: Arc<Config>,
    collectors: Vec<Box<dyn Collector>>,
}

pub struct CycleOutcome {
    pub cycle_number: i64,
    pub success: bool,
    pub failed_phase: Option<&'static str>,
    pub phase_durations_ms: BTreeMap<String, u64>,
}

impl Orchestrator {
    pub fn new(store: Arc<Mutex<Store>>, config: Arc<Config>) -> Self {
        let collectors: Vec<Box<dyn Collector>> = vec![
            Box::new(GoogleTasksCollector),
            Box::new(CalendarCollector),
            Box::new(GmailCollector),
            Box::new(AsanaCollector),
            Box::new(XeroCollector),
        ];
        Orchestrator {
            store,
            config,
            collectors,
        }
    }

    pub fn store(&self) -> &Arc<Mutex<Store>> {
        &self.store
    }

    /// Runs exactly one cycle and returns its outcome. Used both by the
    /// long-running `serve` loop and the one-shot `cycle` CLI command.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let now = chrono::Utc::now();
        let now_str = now.to_rfc3339();
        let today = now.date_naive();
        let store = self.store.lock().await;
        let cycle_number = store.last_cycle_number().unwrap_or(0) + 1;

        let cycle_log_id = store.begin_cycle_log(cycle_number, &now_str).ok();
        let mut durations = BTreeMap::new();
        let mut failed_phase: Option<&'static str> = None;

        let collect_start = Instant::now();
        for collector in &self.collectors {
            let interval = self.config.interval_for(collector.name());
            run_once(collector.as_ref(), &store, &now_str, interval).await;
        }
        durations.insert("COLLECT".to_string(), collect_start.elapsed().as_millis() as u64);

        if failed_phase.is_none() {
            let normalize_start = Instant::now();
            if let Err(e) = normalizer::run(&store, today, &now_str) {
                tracing::error!(error = %e, "normalize phase failed");
                failed_phase = Some("NORMALIZE");
            }
            durations.insert("NORMALIZE".to_string(), normalize_start.elapsed().as_millis() as u64);
        }

        let gate_report = if failed_phase.is_none() {
            let gates_start = Instant::now();
            let report = gates::evaluate(&store);
            durations.insert("GATES".to_string(), gates_start.elapsed().as_millis() as u64);
            match report {
                Ok(r) => Some(r),
                Err(e) => {
                    tracing::error!(error = %e, "gates phase failed");
                    failed_phase = Some("GATES");
                    None
                }
            }
        } else {
            None
        };

        if let (Some(report), None) = (&gate_report, failed_phase) {
            let resolution_start = Instant::now();
            if let Err(e) = resolution::run(&store, report, today, &now_str) {
                tracing::error!(error = %e, "resolution phase failed");
                failed_phase = Some("RESOLUTION");
            }
            durations.insert("RESOLUTION".to_string(), resolution_start.elapsed().as_millis() as u64);
        }

        if let (Some(report), None) = (&gate_report, failed_phase) {
            let snapshot_start = Instant::now();
            let built = scoring::recompute_and_persist(&store, today, &now_str)
                .and_then(|_| snapshot::build(&store, report, cycle_number, &now_str));
            match built {
                Ok(mut snap) => {
                    let previous = snapshot::read_previous(&self.config.current_snapshot_path());
                    snapshot::compute_deltas(&mut snap, previous.as_ref());
                    if let Err(e) = snapshot::write_atomic(&self.config, &snap) {
                        tracing::error!(error = %e, "snapshot write failed");
                        failed_phase = Some("SNAPSHOT");
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "snapshot build failed");
                    failed_phase = Some("SNAPSHOT");
                }
            }
            durations.insert("SNAPSHOT".to_string(), snapshot_start.elapsed().as_millis() as u64);
        }

        if failed_phase.is_none() {
            let moves_start = Instant::now();
            if let Err(e) = moves::run(&store, today, &now_str) {
                tracing::error!(error = %e, "moves phase failed");
                failed_phase = Some("MOVES");
            }
            durations.insert("MOVES".to_string(), moves_start.elapsed().as_millis() as u64);
        }

        let success = failed_phase.is_none();
        let finished_at = chrono::Utc::now().to_rfc3339();
        if let Some(id) = cycle_log_id {
            let durations_json = serde_json::to_string(&durations).unwrap_or_else(|_| "{}".to_string());
            let _ = store.finish_cycle_log(id, &finished_at, success, failed_phase, &durations_json);
        }
        drop(store);

        tracing::info!(
            cycle_number,
            success,
            failed_phase = failed_phase.unwrap_or("none"),
            "cycle complete"
        );

        CycleOutcome {
            cycle_number,
            success,
            failed_phase,
            phase_durations_ms: durations,
        }
    }

    /// Runs cycles forever on `config.cycle_interval`. Cycles never
    /// overlap: the next tick is scheduled only after the previous cycle's
    /// `run_cycle` future has resolved.
    pub async fn run_forever(&self) {
        let mut interval = tokio::time::interval(self.config.cycle_interval);
        loop {
            interval.tick().await;
            self.run_cycle().await;
        }
    }
}
