//! HTTP implementation of the telemetry feed against the backend's REST
//! routes. GET fetches go through bounded retry; the maintenance append is
//! fire-and-forget and never retried.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::retry::{retry_async, HttpStatusError, RetryConfig};
use super::TelemetrySource;
use crate::snapshot::{
    Alert, ForecastRecord, HistoryPeriod, HistorySample, MachineSample, MaintenanceEntry,
    OverviewSummary, RuleRecord, TrendSummary,
};
use crate::state::Config;

pub struct HttpTelemetrySource {
    client: Client,
    base: String,
    retry: RetryConfig,
}

impl HttpTelemetrySource {
    pub fn new(cfg: &Config) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(cfg.http_timeout_secs))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base: cfg.backend_base.trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.base, path);
        retry_async(&self.retry, path, || async {
            let resp = self.client.get(&url).send().await?;
            let status = resp.status();
            if !status.is_success() {
                return Err(anyhow::Error::new(HttpStatusError {
                    status: status.as_u16(),
                    endpoint: path.to_string(),
                }));
            }
            Ok(resp.json::<T>().await?)
        })
        .await
    }
}

#[async_trait]
impl TelemetrySource for HttpTelemetrySource {
    async fn fetch_overview(&self) -> Result<OverviewSummary> {
        self.get_json("/api/dashboard/overview").await
    }

    async fn fetch_trends(&self) -> Result<TrendSummary> {
        self.get_json("/api/dss/trends").await
    }

    async fn fetch_alerts(&self) -> Result<Vec<Alert>> {
        self.get_json("/api/es/diagnoses").await
    }

    async fn fetch_machines(&self) -> Result<Vec<MachineSample>> {
        self.get_json("/api/machines").await
    }

    async fn fetch_forecast(&self) -> Result<ForecastRecord> {
        self.get_json("/api/dss/forecast").await
    }

    async fn fetch_history(&self, period: HistoryPeriod) -> Result<Vec<HistorySample>> {
        self.get_json(&format!(
            "/api/dashboard/history?period={}",
            period.as_query_param()
        ))
        .await
    }

    async fn fetch_rules(&self) -> Result<Vec<RuleRecord>> {
        self.get_json("/api/es/rules").await
    }

    async fn append_maintenance(&self, entry: &MaintenanceEntry) -> Result<()> {
        let url = format!("{}/api/maintenance/log", self.base);
        let resp = self.client.post(&url).json(entry).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(anyhow::Error::new(HttpStatusError {
                status: status.as_u16(),
                endpoint: "/api/maintenance/log".to_string(),
            }));
        }
        Ok(())
    }
}
