//! Backend telemetry feed: the seam between the refresh coordinator and the
//! remote endpoints it consumes.
//!
//! The coordinator only ever talks to a `TelemetrySource` trait object, so
//! the HTTP client can be swapped for a stub in tests.

use anyhow::Result;
use async_trait::async_trait;

use crate::snapshot::{
    Alert, ForecastRecord, HistoryPeriod, HistorySample, MachineSample, MaintenanceEntry,
    OverviewSummary, RuleRecord, TrendSummary,
};

pub mod http;
pub mod retry;

pub use http::HttpTelemetrySource;

/// Remote reads consumed by the core, plus the fire-and-forget maintenance
/// log append. Each fetch is independent; callers decide how failures fold.
#[async_trait]
pub trait TelemetrySource: Send + Sync {
    async fn fetch_overview(&self) -> Result<OverviewSummary>;
    async fn fetch_trends(&self) -> Result<TrendSummary>;
    async fn fetch_alerts(&self) -> Result<Vec<Alert>>;
    async fn fetch_machines(&self) -> Result<Vec<MachineSample>>;
    async fn fetch_forecast(&self) -> Result<ForecastRecord>;
    async fn fetch_history(&self, period: HistoryPeriod) -> Result<Vec<HistorySample>>;
    /// Read-only knowledge base, fetched on demand rather than per cycle.
    async fn fetch_rules(&self) -> Result<Vec<RuleRecord>>;
    async fn append_maintenance(&self, entry: &MaintenanceEntry) -> Result<()>;
}
