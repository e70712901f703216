//! KPI derivation: production output, energy efficiency and active-unit
//! count, each with a period-over-period trend delta.
//!
//! Trend deltas compare against a synthetic "yesterday" baseline: the current
//! value perturbed by a small bounded offset. No real historical store backs
//! them; this is a documented placeholder-analytics policy, not history.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::json;

use crate::fleet::FleetSnapshot;
use crate::logging::{log, obj, Domain, Level};
use crate::state::Config;

/// Baselines with magnitude below this yield a 0% trend instead of a
/// division blow-up.
const MIN_TREND_BASELINE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Kpi {
    pub value: f64,
    pub trend_pct: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct CountKpi {
    pub value: u32,
    pub trend_pct: f64,
}

/// Full-precision KPI values; rounding to one decimal belongs to the
/// presentation boundary.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct KpiSet {
    pub production: Kpi,
    pub energy: Kpi,
    pub active_units: CountKpi,
}

/// Signed percentage change of `current` against `previous`, guarded against
/// a near-zero denominator.
pub fn trend_pct(current: f64, previous: f64) -> f64 {
    if previous.abs() < MIN_TREND_BASELINE {
        return 0.0;
    }
    (current - previous) / previous * 100.0
}

fn clamp_pct(value: f64) -> f64 {
    value.clamp(0.0, 100.0)
}

pub struct KpiAggregator {
    total: u32,
    production_loss_max: f64,
    energy_w_critical: f64,
    energy_w_below: f64,
    active_jitter: i32,
    production_jitter: f64,
    energy_jitter: f64,
    rng: StdRng,
}

impl KpiAggregator {
    pub fn new(cfg: &Config) -> Self {
        Self::with_rng(cfg, StdRng::from_entropy())
    }

    /// Deterministic aggregator for tests.
    pub fn with_seed(cfg: &Config, seed: u64) -> Self {
        Self::with_rng(cfg, StdRng::seed_from_u64(seed))
    }

    fn with_rng(cfg: &Config, rng: StdRng) -> Self {
        Self {
            total: cfg.total_machines,
            production_loss_max: cfg.production_loss_max,
            energy_w_critical: cfg.energy_w_critical,
            energy_w_below: cfg.energy_w_below,
            active_jitter: cfg.active_baseline_jitter,
            production_jitter: cfg.production_baseline_jitter,
            energy_jitter: cfg.energy_baseline_jitter,
            rng,
        }
    }

    /// Derive the KPI set for one fleet snapshot.
    ///
    /// `active_count` is the caller's independently computed ON count, taken
    /// as a cross-check: a mismatch is logged and the snapshot's own count
    /// wins, so the two can never diverge downstream.
    pub fn aggregate(&mut self, snapshot: &FleetSnapshot, active_count: u32) -> KpiSet {
        let on_count = snapshot.active_count();
        if active_count != on_count {
            log(
                Level::Warn,
                Domain::Kpi,
                "active_count_reconciled",
                obj(&[
                    ("caller", json!(active_count)),
                    ("snapshot", json!(on_count)),
                ]),
            );
        }
        let active = on_count;
        let critical = snapshot.critical_count();
        let below_normal = snapshot.below_normal_count();
        let total = self.total.max(1) as f64;

        let efficiency_loss = self.sample(0.0, self.production_loss_max);
        let production = clamp_pct((active as f64 / total) * 100.0 - efficiency_loss);

        let energy = clamp_pct(
            100.0
                - critical as f64 * self.energy_w_critical
                - below_normal as f64 * self.energy_w_below,
        );

        let prev_active = active as i64 + self.sample_int(self.active_jitter) as i64;
        let prev_production = production - self.sample(-self.production_jitter, self.production_jitter);
        let prev_energy = energy + self.sample(-self.energy_jitter, self.energy_jitter);

        KpiSet {
            production: Kpi {
                value: production,
                trend_pct: trend_pct(production, prev_production),
            },
            energy: Kpi {
                value: energy,
                trend_pct: trend_pct(energy, prev_energy),
            },
            active_units: CountKpi {
                value: active,
                trend_pct: trend_pct(active as f64, prev_active as f64),
            },
        }
    }

    fn sample(&mut self, lo: f64, hi: f64) -> f64 {
        if lo < hi {
            self.rng.gen_range(lo..hi)
        } else {
            0.0
        }
    }

    fn sample_int(&mut self, span: i32) -> i32 {
        if span > 0 {
            self.rng.gen_range(-span..span)
        } else {
            0
        }
    }
}
