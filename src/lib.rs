//! Fleet-state simulation and derived-metrics core.
//!
//! Three components, leaves first: the fleet generator materializes the
//! operating state of a fixed-size machine fleet against the backend's
//! critical-alert feed; the KPI aggregator derives production, energy and
//! active-count indicators with trend deltas; the refresh coordinator pulls
//! the backend sources on a fixed cadence, tolerates partial failure, and
//! republishes a consistent combined snapshot.

pub mod coordinator;
pub mod feed;
pub mod fleet;
pub mod kpi;
pub mod logging;
pub mod snapshot;
pub mod state;
