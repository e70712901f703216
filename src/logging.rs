//! Structured logging for the fleet telemetry core.
//!
//! Design goals:
//! 1. Multi-level granularity (TRACE → FATAL)
//! 2. Domain-specific categories for filtering
//! 3. Summarization-friendly per-cycle checkpoints
//! 4. Replay/audit support via sequence numbers and RFC3339 timestamps

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fs::{create_dir_all, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

// =============================================================================
// Log Levels
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Trace = 0,
    Debug = 1,
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl Level {
    pub fn from_env() -> Self {
        match std::env::var("LOG_LEVEL").as_deref() {
            Ok("trace") => Level::Trace,
            Ok("debug") => Level::Debug,
            Ok("info") => Level::Info,
            Ok("warn") => Level::Warn,
            Ok("error") => Level::Error,
            Ok("fatal") => Level::Fatal,
            _ => Level::Info,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Fatal => "fatal",
        }
    }
}

// =============================================================================
// Log Domains (categories for filtering)
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Domain {
    Fleet,  // Fleet generation, machine conditions
    Kpi,    // KPI derivation, trend deltas
    Feed,   // Backend fetches, per-source fallbacks
    Cycle,  // Refresh cycle lifecycle, publishes
    System, // Startup, shutdown, config
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Fleet => "fleet",
            Domain::Kpi => "kpi",
            Domain::Feed => "feed",
            Domain::Cycle => "cycle",
            Domain::System => "system",
        }
    }

    pub fn is_enabled(&self) -> bool {
        // Check LOG_DOMAINS env var (comma-separated list or "all")
        match std::env::var("LOG_DOMAINS").as_deref() {
            Ok("all") | Err(_) => true,
            Ok(domains) => domains.split(',').any(|d| d.trim() == self.as_str()),
        }
    }
}

// =============================================================================
// Sequence counter for ordering
// =============================================================================

static LOG_SEQ: AtomicU64 = AtomicU64::new(0);
static RUN_CONTEXT: OnceLock<RunContext> = OnceLock::new();

fn next_seq() -> u64 {
    LOG_SEQ.fetch_add(1, Ordering::SeqCst)
}

#[derive(Debug)]
struct RunContext {
    run_id: String,
    events: Mutex<BufWriter<File>>,
    metrics: Mutex<BufWriter<File>>,
}

fn ensure_run_context() -> &'static RunContext {
    RUN_CONTEXT.get_or_init(|| {
        let run_id = std::env::var("RUN_ID")
            .unwrap_or_else(|_| format!("r-{}-{}", ts_epoch_ms(), process::id()));
        let base = std::env::var("LOG_DIR").unwrap_or_else(|_| "out/runs".to_string());
        let mut run_dir = PathBuf::from(base);
        run_dir.push(&run_id);
        if let Err(err) = create_dir_all(&run_dir) {
            eprintln!("[log] failed to create run dir: {}", err);
        }
        let events_path = run_dir.join("events.jsonl");
        let metrics_path = run_dir.join("metrics.jsonl");
        let manifest_path = run_dir.join("manifest.json");

        let _ = std::fs::write(
            manifest_path,
            json!({
                "run_id": run_id,
                "ts": ts_now(),
                "pid": process::id(),
                "log_dir": run_dir.to_string_lossy(),
            })
            .to_string(),
        );

        let events = File::create(events_path).unwrap_or_else(|err| {
            eprintln!("[log] failed to create events log: {}", err);
            File::create("/tmp/fleetpulse-events.jsonl").expect("events fallback")
        });
        let metrics = File::create(metrics_path).unwrap_or_else(|err| {
            eprintln!("[log] failed to create metrics log: {}", err);
            File::create("/tmp/fleetpulse-metrics.jsonl").expect("metrics fallback")
        });

        RunContext {
            run_id,
            events: Mutex::new(BufWriter::new(events)),
            metrics: Mutex::new(BufWriter::new(metrics)),
        }
    })
}

fn split_fields(mut fields: Map<String, Value>) -> (Map<String, Value>, Map<String, Value>) {
    let mut top = Map::new();
    for key in ["cycle", "machine_id", "source", "msg"] {
        if let Some(value) = fields.remove(key) {
            top.insert(key.to_string(), value);
        }
    }
    (top, fields)
}

fn write_line(writer: &Mutex<BufWriter<File>>, line: &str) {
    if let Ok(mut w) = writer.lock() {
        let _ = writeln!(w, "{}", line);
    }
}

// =============================================================================
// Core logging functions
// =============================================================================

/// RFC3339 timestamp with milliseconds
pub fn ts_now() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Epoch milliseconds (for replay correlation)
pub fn ts_epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}

/// Emit a structured log entry
pub fn log(level: Level, domain: Domain, event: &str, fields: Map<String, Value>) {
    let min_level = Level::from_env();
    if level < min_level || !domain.is_enabled() {
        return;
    }

    emit_record(level, domain.as_str(), event, fields);
}

/// Shorthand: info-level entry keyed by module name
pub fn json_log(module: &str, mut fields: Map<String, Value>) {
    fields.insert("ts".to_string(), Value::String(ts_now()));
    fields.insert("module".to_string(), Value::String(module.to_string()));
    emit_record(Level::Info, module, module, fields);
}

fn emit_record(level: Level, component: &str, event: &str, fields: Map<String, Value>) {
    let ctx = ensure_run_context();
    let (mut top, data) = split_fields(fields);

    let msg = top.remove("msg").unwrap_or(Value::String(String::new()));
    let mut entry = Map::new();
    entry.insert("ts".to_string(), json!(ts_now()));
    entry.insert("run_id".to_string(), json!(ctx.run_id.clone()));
    entry.insert("seq".to_string(), json!(next_seq()));
    entry.insert("lvl".to_string(), json!(level.as_str().to_uppercase()));
    entry.insert("component".to_string(), json!(component));
    entry.insert("event".to_string(), json!(event));
    entry.insert("msg".to_string(), msg);
    for (k, v) in top {
        entry.insert(k, v);
    }
    entry.insert("data".to_string(), Value::Object(data));

    let line = Value::Object(entry).to_string();
    if component == "kpi" || event.starts_with("kpi.") {
        write_line(&ctx.metrics, &line);
    }
    write_line(&ctx.events, &line);
    println!("{}", line);
}

// =============================================================================
// Domain-Specific Logging Helpers
// =============================================================================

/// Log the outcome of one backend sub-fetch
pub fn log_fetch(source: &str, ok: bool, detail: &str) {
    log(
        if ok { Level::Debug } else { Level::Warn },
        Domain::Feed,
        "fetch",
        obj(&[
            ("source", v_str(source)),
            ("result", v_str(if ok { "ok" } else { "fallback_default" })),
            ("detail", v_str(detail)),
        ]),
    );
}

/// Per-cycle checkpoint: fleet counts, KPI values and connectivity
pub fn log_cycle_summary(
    cycle: u64,
    active: u32,
    critical: u32,
    below_normal: u32,
    production: f64,
    energy: f64,
    connectivity: &str,
) {
    log(
        Level::Info,
        Domain::Cycle,
        "cycle_summary",
        obj(&[
            ("cycle", json!(cycle)),
            ("active_units", json!(active)),
            ("critical", json!(critical)),
            ("below_normal", json!(below_normal)),
            ("production_pct", v_num(production)),
            ("energy_pct", v_num(energy)),
            ("connectivity", v_str(connectivity)),
        ]),
    );
}

// =============================================================================
// Utility Functions
// =============================================================================

pub fn obj(pairs: &[(&str, Value)]) -> Map<String, Value> {
    let mut map = Map::new();
    for (k, v) in pairs {
        map.insert((*k).to_string(), v.clone());
    }
    map
}

pub fn v_str(s: &str) -> Value {
    Value::String(s.to_string())
}

pub fn v_num(n: f64) -> Value {
    json!(n)
}

// =============================================================================
// Tests
// =============================================================================
