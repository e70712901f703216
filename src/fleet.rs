//! Fleet state synthesis: materializes the operating state of the fixed-size
//! machine fleet, reconciled against the externally supplied critical-alert
//! id set.
//!
//! The generator is a pure function of the alert set apart from its owned
//! rng, which drives only the BelowNormal classification and the cosmetic
//! diagnostics jitter. Power state is policy, not simulation: the trailing
//! `off_tail` ids are OFF on every generation, independent of alerts and of
//! condition sampling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::collections::HashSet;

use crate::logging::ts_now;
use crate::state::{now_ts, Config};

const NOTE_NOMINAL: &str =
    "Routine diagnostic cycle complete. All operating parameters within nominal thresholds.";
const NOTE_ANOMALOUS: &str =
    "Anomalous pattern detected. Cross-referencing with failure modes DB.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PowerState {
    On,
    Off,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Condition {
    Normal,
    #[serde(rename = "Below Normal")]
    BelowNormal,
    Critical,
}

/// Cosmetic descriptive bundle, regenerated each snapshot. Values stay inside
/// the documented ranges but are never authoritative telemetry.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub rule_processing_cost_ms: f64,
    pub kb_hit_rate_pct: f64,
    pub reliability_pct: f64,
    pub projected_reliability_pct: f64,
    pub last_scan: String,
    pub note: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct MachineRecord {
    pub id: String,
    pub power: PowerState,
    pub condition: Condition,
    pub diagnostics: Diagnostics,
}

/// Ordered fleet state for one generation cycle. Immutable once built;
/// superseded, not mutated, by the next cycle.
#[derive(Debug, Clone, Serialize)]
pub struct FleetSnapshot {
    pub machines: Vec<MachineRecord>,
    pub generated_ts: u64,
}

impl FleetSnapshot {
    pub fn active_count(&self) -> u32 {
        self.machines.iter().filter(|m| m.power == PowerState::On).count() as u32
    }

    pub fn critical_count(&self) -> u32 {
        self.machines.iter().filter(|m| m.condition == Condition::Critical).count() as u32
    }

    pub fn below_normal_count(&self) -> u32 {
        self.machines.iter().filter(|m| m.condition == Condition::BelowNormal).count() as u32
    }
}

/// Stable identifier for the 1-based machine index: `M-###`.
pub fn machine_id(index: u32) -> String {
    format!("M-{:03}", index)
}

pub struct FleetGenerator {
    total: u32,
    off_tail: u32,
    below_normal_p: f64,
    rng: StdRng,
}

impl FleetGenerator {
    pub fn new(cfg: &Config) -> Self {
        Self::with_rng(cfg, StdRng::from_entropy())
    }

    /// Deterministic generator for tests.
    pub fn with_seed(cfg: &Config, seed: u64) -> Self {
        Self::with_rng(cfg, StdRng::seed_from_u64(seed))
    }

    fn with_rng(cfg: &Config, rng: StdRng) -> Self {
        Self {
            total: cfg.total_machines,
            off_tail: cfg.off_tail,
            below_normal_p: cfg.below_normal_p,
            rng,
        }
    }

    /// Materialize the fleet against the current critical-alert id set.
    ///
    /// Absent alert data is an empty set, never a fault. Only the Critical
    /// classification is deterministic from input; callers must tolerate a
    /// different BelowNormal distribution on every regeneration.
    pub fn generate(&mut self, critical_ids: &HashSet<String>) -> FleetSnapshot {
        let on_cutoff = self.total.saturating_sub(self.off_tail);
        let scan_ts = ts_now();
        let mut machines = Vec::with_capacity(self.total as usize);

        for index in 1..=self.total {
            let id = machine_id(index);
            let power = if index <= on_cutoff { PowerState::On } else { PowerState::Off };

            let condition = if critical_ids.contains(&id) {
                Condition::Critical
            } else if self.rng.gen_bool(self.below_normal_p) {
                Condition::BelowNormal
            } else {
                Condition::Normal
            };

            let diagnostics = self.sample_diagnostics(condition, &scan_ts);
            machines.push(MachineRecord { id, power, condition, diagnostics });
        }

        FleetSnapshot { machines, generated_ts: now_ts() }
    }

    fn sample_diagnostics(&mut self, condition: Condition, scan_ts: &str) -> Diagnostics {
        Diagnostics {
            rule_processing_cost_ms: self.rng.gen_range(10.0..15.0),
            kb_hit_rate_pct: self.rng.gen_range(97.0..99.0),
            reliability_pct: self.rng.gen_range(85.0..95.0),
            projected_reliability_pct: self.rng.gen_range(82.0..92.0),
            last_scan: scan_ts.to_string(),
            note: match condition {
                Condition::Normal => NOTE_NOMINAL,
                _ => NOTE_ANOMALOUS,
            },
        }
    }
}
