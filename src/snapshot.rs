//! Wire records consumed from the backend and the combined snapshot
//! republished to consumers every refresh cycle.
//!
//! Every wire type tolerates absent fields (`serde(default)`): a sparse or
//! partially-shaped payload is folded into defaults, never an error.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::fleet::FleetSnapshot;
use crate::kpi::KpiSet;

/// Aggregation window for the historical-samples endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryPeriod {
    /// Last 10 minutes, distinct readings.
    Current,
    /// Last 60 minutes, minute aggregation.
    Hour,
    /// Last 24 hours, hourly aggregation.
    Day,
}

impl HistoryPeriod {
    pub fn as_query_param(&self) -> &'static str {
        match self {
            HistoryPeriod::Current => "current",
            HistoryPeriod::Hour => "60m",
            HistoryPeriod::Day => "24h",
        }
    }
}

impl FromStr for HistoryPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" => Ok(HistoryPeriod::Current),
            "60m" => Ok(HistoryPeriod::Hour),
            "24h" => Ok(HistoryPeriod::Day),
            other => Err(format!("unknown history period: {}", other)),
        }
    }
}

/// Dashboard overview summary. `active_machines` is advisory only: the
/// published snapshot always overrides it with the fleet generator's count.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverviewSummary {
    pub active_machines: u32,
    pub total_machines: u32,
    pub active_alerts: u32,
    pub critical_alerts: u32,
    pub production_output: f64,
    pub energy_efficiency: f64,
    pub system_health: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendSummary {
    pub avg_temp: f64,
    pub avg_vib: f64,
}

/// One entry of the expert-system alert feed, consumed opaquely.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Alert {
    pub machine_id: String,
    pub condition: String,
    pub confidence: f64,
    pub action: String,
    pub reasoning: String,
}

impl Alert {
    pub fn is_critical(&self) -> bool {
        self.confidence > 0.9
    }
}

/// Raw machine reading, used only to synthesize history when the dedicated
/// endpoint is unavailable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineSample {
    pub machine_id: String,
    pub temperature: f64,
    pub vibration: f64,
    pub power: f64,
}

/// Decision-support forecast, consumed as an opaque record.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastRecord {
    pub reason: String,
    pub degradation: f64,
    pub current_efficiency: f64,
    pub projected_efficiency: f64,
    pub timeframe: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySample {
    pub timestamp: String,
    pub temperature: f64,
    pub vibration: f64,
    pub power: f64,
    pub signals: u32,
}

/// Read-only knowledge-base rule, fetched on demand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleRecord {
    pub diagnosis: String,
    pub action: String,
    pub symptom_keywords: String,
    pub severity: String,
}

/// Technician maintenance-log entry; appended fire-and-forget.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceEntry {
    pub machine_id: String,
    pub diagnosis_id: Option<i64>,
    pub technician_action: String,
    pub notes: String,
    pub resolved: bool,
}

/// Per-cycle health of the backend fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    Healthy,
    /// Overview or history source failed; snapshot is best-effort.
    Degraded,
    /// Every source failed; last good shell carried forward.
    Offline,
}

impl Connectivity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Connectivity::Healthy => "healthy",
            Connectivity::Degraded => "degraded",
            Connectivity::Offline => "offline",
        }
    }

    pub fn is_warning(&self) -> bool {
        !matches!(self, Connectivity::Healthy)
    }
}

/// The product of one refresh cycle. Immutable once published; the watch
/// channel replaces it wholesale, never field-by-field.
#[derive(Debug, Clone, Serialize)]
pub struct CombinedSnapshot {
    pub overview: OverviewSummary,
    pub trends: TrendSummary,
    pub history: Vec<HistorySample>,
    pub alerts: Vec<Alert>,
    pub forecast: ForecastRecord,
    pub fleet: FleetSnapshot,
    pub kpis: KpiSet,
    pub connectivity: Connectivity,
    pub cycle: u64,
    pub published_ts: u64,
}

impl CombinedSnapshot {
    pub fn critical_alert_count(&self) -> usize {
        self.alerts.iter().filter(|a| a.is_critical()).count()
    }
}
