use std::sync::Arc;

use anyhow::Result;
use serde_json::json;

use fleetpulse::coordinator::RefreshCoordinator;
use fleetpulse::feed::{HttpTelemetrySource, TelemetrySource};
use fleetpulse::logging::{json_log, obj, v_str};
use fleetpulse::state::Config;

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::from_env();
    json_log(
        "startup",
        obj(&[
            ("fleet_size", json!(cfg.total_machines)),
            ("off_tail", json!(cfg.off_tail)),
            ("refresh_secs", json!(cfg.refresh_secs)),
            ("backend", v_str(&cfg.backend_base)),
            ("history_period", v_str(cfg.history_period.as_query_param())),
        ]),
    );

    let source: Arc<dyn TelemetrySource> = Arc::new(HttpTelemetrySource::new(&cfg));

    // Knowledge base is read on demand at startup, not per cycle.
    match source.fetch_rules().await {
        Ok(rules) => json_log("knowledge_base", obj(&[("rules", json!(rules.len()))])),
        Err(err) => json_log("knowledge_base", obj(&[("error", v_str(&err.to_string()))])),
    }

    let coordinator = RefreshCoordinator::start(cfg, source);
    let mut snapshots = coordinator.subscribe();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let published = snapshots.borrow_and_update().clone();
                if let Some(snap) = published {
                    // Presentation boundary: KPI values render at one decimal.
                    json_log(
                        "dashboard",
                        obj(&[
                            ("cycle", json!(snap.cycle)),
                            ("active_units", json!(snap.kpis.active_units.value)),
                            ("active_trend", v_str(&format!("{:+.1}%", snap.kpis.active_units.trend_pct))),
                            ("production_pct", v_str(&format!("{:.1}", snap.kpis.production.value))),
                            ("production_trend", v_str(&format!("{:+.1}%", snap.kpis.production.trend_pct))),
                            ("energy_pct", v_str(&format!("{:.1}", snap.kpis.energy.value))),
                            ("energy_trend", v_str(&format!("{:+.1}%", snap.kpis.energy.trend_pct))),
                            ("active_alerts", json!(snap.overview.active_alerts)),
                            ("critical_alerts", json!(snap.critical_alert_count())),
                            ("connectivity", v_str(snap.connectivity.as_str())),
                        ]),
                    );
                }
            }
        }
    }

    coordinator.stop().await;
    json_log("shutdown", obj(&[("status", v_str("stopped"))]));
    Ok(())
}
