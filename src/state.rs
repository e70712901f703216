use crate::snapshot::HistoryPeriod;

#[derive(Clone)]
pub struct Config {
    /// Fixed fleet size N; every snapshot carries exactly this many records.
    pub total_machines: u32,
    /// Trailing slice of the id range held OFF by policy.
    pub off_tail: u32,
    pub below_normal_p: f64,
    pub refresh_secs: u64,
    pub backend_base: String,
    pub history_period: HistoryPeriod,
    pub http_timeout_secs: u64,
    pub production_loss_max: f64,
    pub energy_w_critical: f64,
    pub energy_w_below: f64,
    /// Synthetic-baseline jitter spans for trend deltas (placeholder analytics,
    /// no real historical store backs these).
    pub active_baseline_jitter: i32,
    pub production_baseline_jitter: f64,
    pub energy_baseline_jitter: f64,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            total_machines: std::env::var("FLEET_SIZE").ok().and_then(|v| v.parse().ok()).unwrap_or(500),
            off_tail: std::env::var("OFF_TAIL").ok().and_then(|v| v.parse().ok()).unwrap_or(10),
            below_normal_p: std::env::var("BELOW_NORMAL_P").ok().and_then(|v| v.parse().ok()).unwrap_or(0.05),
            refresh_secs: std::env::var("REFRESH_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(5),
            backend_base: std::env::var("BACKEND_BASE").unwrap_or_else(|_| "http://127.0.0.1:8000".to_string()),
            history_period: std::env::var("HISTORY_PERIOD").ok().and_then(|v| v.parse().ok()).unwrap_or(HistoryPeriod::Day),
            http_timeout_secs: std::env::var("HTTP_TIMEOUT_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(10),
            production_loss_max: std::env::var("PROD_LOSS_MAX").ok().and_then(|v| v.parse().ok()).unwrap_or(2.0),
            energy_w_critical: std::env::var("ENERGY_W_CRITICAL").ok().and_then(|v| v.parse().ok()).unwrap_or(0.3),
            energy_w_below: std::env::var("ENERGY_W_BELOW").ok().and_then(|v| v.parse().ok()).unwrap_or(0.1),
            active_baseline_jitter: std::env::var("ACTIVE_BASE_JITTER").ok().and_then(|v| v.parse().ok()).unwrap_or(5),
            production_baseline_jitter: std::env::var("PROD_BASE_JITTER").ok().and_then(|v| v.parse().ok()).unwrap_or(2.5),
            energy_baseline_jitter: std::env::var("ENERGY_BASE_JITTER").ok().and_then(|v| v.parse().ok()).unwrap_or(1.5),
        }
    }
}

pub fn now_ts() -> u64 {
    chrono::Utc::now().timestamp() as u64
}
