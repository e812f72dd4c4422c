//! Declarative gauge configuration.
//!
//! A dashboard is a list of [`GaugeDescriptor`]s; [`read_gauges`] turns a
//! snapshot into one [`GaugeReading`] per descriptor. Dashboard variants that
//! show different subsets of the metrics differ only in their descriptor list.

use serde::{Deserialize, Serialize};

use crate::derive::{self, DEFAULT_PROCESS_SCALE, GaugeState};
use crate::snapshot::MetricsSnapshot;

/// Which snapshot field drives a gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GaugeMetric {
    Cpu,
    Memory,
    Disk,
    Processes,
}

impl GaugeMetric {
    pub fn default_label(self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Memory => "Memory",
            Self::Disk => "Disk",
            Self::Processes => "Processes",
        }
    }

    /// True when the gauge value is a percentage rather than a count.
    pub fn is_percent(self) -> bool {
        !matches!(self, Self::Processes)
    }
}

/// One configured gauge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaugeDescriptor {
    pub metric: GaugeMetric,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Full-scale value for count gauges; ignored by percentage gauges.
    #[serde(default = "default_max_scale")]
    pub max_scale: f64,
}

fn default_max_scale() -> f64 {
    DEFAULT_PROCESS_SCALE
}

impl GaugeDescriptor {
    pub fn new(metric: GaugeMetric) -> Self {
        Self {
            metric,
            label: None,
            max_scale: DEFAULT_PROCESS_SCALE,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_max_scale(mut self, max_scale: f64) -> Self {
        self.max_scale = max_scale;
        self
    }

    pub fn label(&self) -> &str {
        self.label
            .as_deref()
            .unwrap_or_else(|| self.metric.default_label())
    }
}

/// CPU, memory, disk, processes.
pub fn default_gauges() -> Vec<GaugeDescriptor> {
    vec![
        GaugeDescriptor::new(GaugeMetric::Cpu),
        GaugeDescriptor::new(GaugeMetric::Memory),
        GaugeDescriptor::new(GaugeMetric::Disk),
        GaugeDescriptor::new(GaugeMetric::Processes),
    ]
}

/// A gauge ready for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaugeReading {
    pub metric: GaugeMetric,
    pub label: String,
    /// Value for the numeric label: the raw percentage or the raw count.
    pub value: f64,
    pub state: GaugeState,
    /// False when the driving field has not been received yet.
    pub available: bool,
}

/// Derive one reading per descriptor, in descriptor order.
pub fn read_gauges(snapshot: &MetricsSnapshot, descriptors: &[GaugeDescriptor]) -> Vec<GaugeReading> {
    descriptors
        .iter()
        .map(|descriptor| read_gauge(snapshot, descriptor))
        .collect()
}

pub fn read_gauge(snapshot: &MetricsSnapshot, descriptor: &GaugeDescriptor) -> GaugeReading {
    let (raw, available, state) = match descriptor.metric {
        GaugeMetric::Cpu => {
            let available =
                snapshot.average_cpu_load.is_some() || snapshot.cpu_core_loads.is_some();
            let avg = derive::average_cpu(snapshot);
            (avg, available, derive::gauge_state(Some(avg)))
        }
        GaugeMetric::Memory => {
            let percent = snapshot.memory.as_ref().and_then(|m| m.percent);
            (percent.unwrap_or(0.0), percent.is_some(), derive::gauge_state(percent))
        }
        GaugeMetric::Disk => {
            let percent = snapshot.disk.as_ref().and_then(|d| d.percent);
            (percent.unwrap_or(0.0), percent.is_some(), derive::gauge_state(percent))
        }
        GaugeMetric::Processes => {
            let count = derive::process_count(snapshot);
            (
                count as f64,
                snapshot.processes.is_some(),
                derive::process_count_gauge_state(count, descriptor.max_scale),
            )
        }
    };

    GaugeReading {
        metric: descriptor.metric,
        label: descriptor.label().to_string(),
        value: raw,
        state,
        available,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{DiskStats, MemoryStats, ProcessInfo};

    fn full_snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            cpu_core_loads: Some(vec![10.0, 20.0, 30.0]),
            average_cpu_load: None,
            memory: Some(MemoryStats {
                used: Some(1),
                available: Some(1),
                percent: Some(50.0),
            }),
            disk: Some(DiskStats {
                percent: Some(120.0),
                ..Default::default()
            }),
            processes: Some(
                (0..150)
                    .map(|pid| ProcessInfo {
                        pid,
                        name: None,
                        cpu_percent: None,
                        memory_percent: None,
                    })
                    .collect(),
            ),
        }
    }

    #[test]
    fn default_set_order() {
        let metrics: Vec<GaugeMetric> = default_gauges().iter().map(|g| g.metric).collect();
        assert_eq!(
            metrics,
            vec![
                GaugeMetric::Cpu,
                GaugeMetric::Memory,
                GaugeMetric::Disk,
                GaugeMetric::Processes
            ]
        );
    }

    #[test]
    fn readings_follow_descriptor_order_and_labels() {
        let descriptors = vec![
            GaugeDescriptor::new(GaugeMetric::Disk).with_label("Root FS"),
            GaugeDescriptor::new(GaugeMetric::Cpu),
        ];
        let readings = read_gauges(&full_snapshot(), &descriptors);
        assert_eq!(readings.len(), 2);
        assert_eq!(readings[0].label, "Root FS");
        assert_eq!(readings[1].label, "CPU");
    }

    #[test]
    fn percent_gauges_keep_raw_value_but_clamp_needle() {
        let readings = read_gauges(&full_snapshot(), &default_gauges());
        let disk = &readings[2];
        assert_eq!(disk.value, 120.0);
        assert_eq!(disk.state.percent, 100.0);
        assert_eq!(disk.state.angle_degrees, 225.0);

        let cpu = &readings[0];
        assert_eq!(cpu.value, 20.0);
        assert!(cpu.available);

        assert_eq!(readings[1].state.angle_degrees, 90.0);
    }

    #[test]
    fn process_gauge_shows_count_with_capped_needle() {
        let readings = read_gauges(&full_snapshot(), &default_gauges());
        let procs = &readings[3];
        assert_eq!(procs.value, 150.0);
        assert_eq!(procs.state.percent, 100.0);
    }

    #[test]
    fn process_gauge_respects_custom_scale() {
        let descriptor = GaugeDescriptor::new(GaugeMetric::Processes).with_max_scale(600.0);
        let reading = read_gauge(&full_snapshot(), &descriptor);
        assert_eq!(reading.state.percent, 25.0);
    }

    #[test]
    fn empty_snapshot_reads_as_unavailable_zero() {
        for reading in read_gauges(&MetricsSnapshot::default(), &default_gauges()) {
            assert!(!reading.available, "{:?} should be unavailable", reading.metric);
            assert_eq!(reading.value, 0.0);
            assert_eq!(reading.state.angle_degrees, -45.0);
        }
    }

    #[test]
    fn descriptor_deserializes_from_toml() {
        #[derive(Deserialize)]
        struct Doc {
            gauges: Vec<GaugeDescriptor>,
        }
        let doc: Doc = toml::from_str(
            r#"
            [[gauges]]
            metric = "memory"
            label = "RAM"

            [[gauges]]
            metric = "processes"
            max_scale = 500
            "#,
        )
        .unwrap();
        assert_eq!(doc.gauges[0].label(), "RAM");
        assert_eq!(doc.gauges[1].metric, GaugeMetric::Processes);
        assert_eq!(doc.gauges[1].max_scale, 500.0);
    }
}
