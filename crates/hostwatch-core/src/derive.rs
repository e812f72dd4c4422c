//! Display-ready values derived from a [`MetricsSnapshot`].
//!
//! Everything here is a pure function of its input: no caching, no mutation
//! of the snapshot. Every percentage gauge (CPU, memory, disk) shares the
//! needle formula in [`gauge_state`]; existing visual calibrations depend on
//! it, so it must stay exactly `angle = (percent / 100) * 270 - 45`.

use std::cmp::Ordering;

use serde::Serialize;

use crate::snapshot::{MetricsSnapshot, ProcessInfo};

/// Needle angle at 0%.
pub const GAUGE_MIN_ANGLE: f64 = -45.0;

/// Sweep of the needle from 0% to 100%.
pub const GAUGE_SWEEP_DEGREES: f64 = 270.0;

/// Needle angle at 100%.
pub const GAUGE_MAX_ANGLE: f64 = GAUGE_MIN_ANGLE + GAUGE_SWEEP_DEGREES;

/// Default full-scale value for the process count gauge.
pub const DEFAULT_PROCESS_SCALE: f64 = 100.0;

/// Clamped percentage plus the needle angle it maps to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GaugeState {
    /// In `[0, 100]`.
    pub percent: f64,
    /// In `[-45, 225]`.
    pub angle_degrees: f64,
}

/// Clamp a percentage into `[0, 100]` and map it onto the needle sweep.
///
/// Missing and NaN inputs read as 0.
pub fn gauge_state(percent: Option<f64>) -> GaugeState {
    let clamped = match percent {
        Some(p) if p.is_nan() => 0.0,
        Some(p) => p.clamp(0.0, 100.0),
        None => 0.0,
    };
    GaugeState {
        percent: clamped,
        angle_degrees: (clamped / 100.0) * GAUGE_SWEEP_DEGREES + GAUGE_MIN_ANGLE,
    }
}

/// Gauge for a raw count against a full-scale value.
///
/// The needle uses `min(count / max_scale * 100, 100)`; the caller shows the
/// count itself as the label. A non-positive scale pins any non-zero count
/// to full deflection.
pub fn process_count_gauge_state(count: usize, max_scale: f64) -> GaugeState {
    let percent = if count == 0 {
        0.0
    } else if max_scale <= 0.0 || max_scale.is_nan() {
        100.0
    } else {
        (count as f64 / max_scale * 100.0).min(100.0)
    };
    gauge_state(Some(percent))
}

/// Average CPU load: the server's direct average when present, otherwise
/// the mean of the per-core loads, or 0 with no cores.
pub fn average_cpu(snapshot: &MetricsSnapshot) -> f64 {
    if let Some(avg) = snapshot.average_cpu_load {
        return avg;
    }
    match snapshot.cpu_core_loads.as_deref() {
        Some(cores) if !cores.is_empty() => cores.iter().sum::<f64>() / cores.len() as f64,
        _ => 0.0,
    }
}

/// Number of processes in the snapshot (0 when the list was never sent).
pub fn process_count(snapshot: &MetricsSnapshot) -> usize {
    snapshot.processes.as_ref().map_or(0, Vec::len)
}

/// Number of CPU cores reported.
pub fn core_count(snapshot: &MetricsSnapshot) -> usize {
    snapshot.cpu_core_loads.as_ref().map_or(0, Vec::len)
}

/// `used + available`, when both are known.
pub fn memory_total(snapshot: &MetricsSnapshot) -> Option<u64> {
    let memory = snapshot.memory.as_ref()?;
    Some(memory.used?.saturating_add(memory.available?))
}

/// `used + free`, when both are known.
pub fn disk_total(snapshot: &MetricsSnapshot) -> Option<u64> {
    let disk = snapshot.disk.as_ref()?;
    Some(disk.used?.saturating_add(disk.free?))
}

/// Format a byte count with binary units, e.g. `1.5 GiB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KiB", "MiB", "GiB", "TiB", "PiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

// ---------------------------------------------------------------------------
// Process ordering for the detail panel
// ---------------------------------------------------------------------------

/// How the process detail panel orders rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessSort {
    /// As received from the server.
    #[default]
    Received,
    /// Highest CPU first.
    Cpu,
    /// Highest memory first.
    Memory,
    /// Ascending pid.
    Pid,
}

impl ProcessSort {
    pub fn next(self) -> Self {
        match self {
            Self::Received => Self::Cpu,
            Self::Cpu => Self::Memory,
            Self::Memory => Self::Pid,
            Self::Pid => Self::Received,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Cpu => "cpu",
            Self::Memory => "memory",
            Self::Pid => "pid",
        }
    }
}

/// Up to `limit` processes in the requested order. Missing percentages sort
/// last; the sort is stable, so ties keep wire order.
pub fn top_processes(snapshot: &MetricsSnapshot, sort: ProcessSort, limit: usize) -> Vec<ProcessInfo> {
    let Some(processes) = snapshot.processes.as_ref() else {
        return Vec::new();
    };
    let mut rows: Vec<ProcessInfo> = processes.clone();
    match sort {
        ProcessSort::Received => {}
        ProcessSort::Cpu => rows.sort_by(|a, b| descending(a.cpu_percent, b.cpu_percent)),
        ProcessSort::Memory => rows.sort_by(|a, b| descending(a.memory_percent, b.memory_percent)),
        ProcessSort::Pid => rows.sort_by_key(|p| p.pid),
    }
    rows.truncate(limit);
    rows
}

fn descending(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.partial_cmp(&x).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
