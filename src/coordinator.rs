//! Refresh coordination: one driver task pulls the backend sources on a
//! fixed cadence, re-derives fleet state and KPIs, and republishes a
//! combined snapshot through a watch channel.
//!
//! Cycles run inline on the driver task, so a cycle in progress suppresses
//! the next start and no two cycles ever race a publish. The in-cycle
//! fan-out is a join barrier: sub-fetches settle independently and a failing
//! branch never cancels its siblings.

use chrono::{SecondsFormat, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::json;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};

use crate::feed::TelemetrySource;
use crate::fleet::FleetGenerator;
use crate::kpi::KpiAggregator;
use crate::logging::{log, log_cycle_summary, log_fetch, obj, v_str, Domain, Level};
use crate::snapshot::{CombinedSnapshot, Connectivity, HistorySample, MachineSample};
use crate::state::{now_ts, Config};

/// `None` until the first cycle completes (loading placeholder), then always
/// the most recently published snapshot.
pub type SnapshotReceiver = watch::Receiver<Option<Arc<CombinedSnapshot>>>;

/// Owns the refresh timer and its cancellation handle. Dropping the
/// coordinator without `stop()` aborts nothing; lifecycle is explicit.
pub struct RefreshCoordinator {
    snapshot_rx: SnapshotReceiver,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl RefreshCoordinator {
    /// Spawn the driver task: an immediate first cycle, then one per
    /// `cfg.refresh_secs` until `stop()`.
    pub fn start(cfg: Config, source: Arc<dyn TelemetrySource>) -> Self {
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let refresh = Duration::from_secs(cfg.refresh_secs.max(1));
        let mut runner = CycleRunner::new(cfg, source);

        let handle = tokio::spawn(async move {
            let mut last_good: Option<Arc<CombinedSnapshot>> = None;
            loop {
                let snapshot = tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    snapshot = runner.run_cycle(last_good.as_deref()) => Arc::new(snapshot),
                };
                if snapshot.connectivity != Connectivity::Offline {
                    last_good = Some(snapshot.clone());
                }
                let _ = snapshot_tx.send(Some(snapshot));

                tokio::select! {
                    biased;
                    _ = shutdown_rx.changed() => break,
                    _ = sleep(refresh) => {}
                }
            }
            log(Level::Info, Domain::Cycle, "coordinator_stopped", obj(&[]));
        });

        Self { snapshot_rx, shutdown_tx, handle }
    }

    pub fn subscribe(&self) -> SnapshotReceiver {
        self.snapshot_rx.clone()
    }

    /// Signal shutdown and join the driver. Any in-flight cycle is dropped at
    /// its next await point; once this returns, no publish can occur.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        let _ = self.handle.await;
    }
}

struct CycleRunner {
    cfg: Config,
    source: Arc<dyn TelemetrySource>,
    fleet: FleetGenerator,
    kpi: KpiAggregator,
    rng: StdRng,
    cycle: u64,
}

impl CycleRunner {
    fn new(cfg: Config, source: Arc<dyn TelemetrySource>) -> Self {
        let fleet = FleetGenerator::new(&cfg);
        let kpi = KpiAggregator::new(&cfg);
        Self {
            cfg,
            source,
            fleet,
            kpi,
            rng: StdRng::from_entropy(),
            cycle: 0,
        }
    }

    /// One fetch–reconcile–recompute–assemble pass.
    async fn run_cycle(&mut self, last_good: Option<&CombinedSnapshot>) -> CombinedSnapshot {
        self.cycle += 1;

        let (overview_res, trends_res, alerts_res, machines_res, forecast_res, history_res) = tokio::join!(
            self.source.fetch_overview(),
            self.source.fetch_trends(),
            self.source.fetch_alerts(),
            self.source.fetch_machines(),
            self.source.fetch_forecast(),
            self.source.fetch_history(self.cfg.history_period),
        );

        let overview_ok = overview_res.is_ok();
        let history_ok = history_res.is_ok();
        let all_failed = !overview_ok
            && trends_res.is_err()
            && alerts_res.is_err()
            && machines_res.is_err()
            && forecast_res.is_err()
            && !history_ok;

        // Per-source failures fold to named defaults; the cycle never aborts.
        let mut overview = fold("overview", overview_res, Default::default());
        let mut trends = fold("trends", trends_res, Default::default());
        let mut alerts = fold("alerts", alerts_res, Vec::new());
        let machines = fold("machines", machines_res, Vec::new());
        let mut forecast = fold("forecast", forecast_res, Default::default());

        let mut history = match history_res {
            Ok(samples) => {
                log_fetch("history", true, "");
                samples
            }
            Err(err) => {
                log_fetch("history", false, &err.to_string());
                self.synthesize_history(&machines)
            }
        };

        let connectivity = if all_failed {
            Connectivity::Offline
        } else if !overview_ok || !history_ok {
            Connectivity::Degraded
        } else {
            Connectivity::Healthy
        };

        // Total connectivity loss keeps the last good shell on display
        // instead of blanking the view.
        if connectivity == Connectivity::Offline {
            if let Some(prev) = last_good {
                overview = prev.overview.clone();
                trends = prev.trends.clone();
                alerts = prev.alerts.clone();
                forecast = prev.forecast.clone();
                history = prev.history.clone();
            }
        }

        if connectivity.is_warning() {
            log(
                Level::Warn,
                Domain::Cycle,
                "connectivity",
                obj(&[
                    ("cycle", json!(self.cycle)),
                    ("status", v_str(connectivity.as_str())),
                ]),
            );
        }

        // Re-derivation cascade: alerts → fleet → KPIs.
        let critical_ids: HashSet<String> =
            alerts.iter().map(|a| a.machine_id.clone()).collect();
        let fleet = self.fleet.generate(&critical_ids);
        let active = fleet.active_count();
        let kpis = self.kpi.aggregate(&fleet, active);

        // The externally supplied count is advisory only.
        overview.active_machines = active;

        log_cycle_summary(
            self.cycle,
            active,
            fleet.critical_count(),
            fleet.below_normal_count(),
            kpis.production.value,
            kpis.energy.value,
            connectivity.as_str(),
        );

        CombinedSnapshot {
            overview,
            trends,
            history,
            alerts,
            forecast,
            fleet,
            kpis,
            connectivity,
            cycle: self.cycle,
            published_ts: now_ts(),
        }
    }

    /// Fallback history synthesized from the raw machine list: one sample per
    /// machine, stepped back an hour each, oldest first.
    fn synthesize_history(&mut self, machines: &[MachineSample]) -> Vec<HistorySample> {
        let now = Utc::now();
        let mut samples: Vec<HistorySample> = machines
            .iter()
            .enumerate()
            .map(|(i, m)| HistorySample {
                timestamp: (now - chrono::Duration::hours(i as i64))
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
                temperature: m.temperature,
                vibration: m.vibration,
                power: m.power,
                signals: self.rng.gen_range(500..1500),
            })
            .collect();
        samples.reverse();
        samples
    }
}

fn fold<T>(source: &str, res: anyhow::Result<T>, default: T) -> T {
    match res {
        Ok(value) => {
            log_fetch(source, true, "");
            value
        }
        Err(err) => {
            log_fetch(source, false, &err.to_string());
            default
        }
    }
}
