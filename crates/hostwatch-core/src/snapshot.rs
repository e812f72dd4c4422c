//! Metrics snapshot model and the store that owns it.
//!
//! A [`MetricsSnapshot`] doubles as the partial update type: every top-level
//! field is optional, and an inbound `update` payload decodes straight into
//! one. [`MetricsSnapshot::merge`] is a shallow, field-replacing,
//! last-writer-wins merge: a present field replaces the stored one wholesale
//! (no per-element patching of `processes`, no field-by-field blending of
//! `memory`), an absent field leaves the stored one alone.
//!
//! Values are not validated here. Percentages outside 0–100 pass through and
//! are clamped for display only, in [`crate::derive`].

use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

// ---------------------------------------------------------------------------
// Wire-shaped field types
// ---------------------------------------------------------------------------

/// Virtual memory figures. `percent` is the server's authoritative display
/// value and is never recomputed from the byte counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
}

/// Root filesystem usage plus cumulative I/O operation counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiskStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub free: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_count: Option<u64>,
}

/// One row of the remote process table.
///
/// `pid` is unique within a single snapshot only; the server may reuse it
/// across snapshots. The other fields are null for processes the server
/// could not inspect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessInfo {
    pub pid: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_percent: Option<f64>,
}

// ---------------------------------------------------------------------------
// MetricsSnapshot
// ---------------------------------------------------------------------------

/// One complete or partial view of the remote host.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSnapshot {
    /// Per-core load percentages, ordered by core index.
    #[serde(rename = "cpu", skip_serializing_if = "Option::is_none")]
    pub cpu_core_loads: Option<Vec<f64>>,
    /// Server-supplied average load; takes precedence over averaging cores.
    #[serde(rename = "avg_cpu", skip_serializing_if = "Option::is_none")]
    pub average_cpu_load: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory: Option<MemoryStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk: Option<DiskStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processes: Option<Vec<ProcessInfo>>,
}

impl MetricsSnapshot {
    /// Shallow field-level merge: every field present in `update` replaces the
    /// stored field; absent fields are kept. Idempotent.
    pub fn merge(&mut self, update: MetricsSnapshot) {
        let MetricsSnapshot {
            cpu_core_loads,
            average_cpu_load,
            memory,
            disk,
            processes,
        } = update;

        if cpu_core_loads.is_some() {
            self.cpu_core_loads = cpu_core_loads;
        }
        if average_cpu_load.is_some() {
            self.average_cpu_load = average_cpu_load;
        }
        if memory.is_some() {
            self.memory = memory;
        }
        if disk.is_some() {
            self.disk = disk;
        }
        if processes.is_some() {
            self.processes = processes;
        }
    }

    /// True when no field has ever been supplied.
    pub fn is_empty(&self) -> bool {
        self.cpu_core_loads.is_none()
            && self.average_cpu_load.is_none()
            && self.memory.is_none()
            && self.disk.is_none()
            && self.processes.is_none()
    }

    /// Names of the top-level wire fields present, for logging.
    pub fn present_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::with_capacity(5);
        if self.cpu_core_loads.is_some() {
            fields.push("cpu");
        }
        if self.average_cpu_load.is_some() {
            fields.push("avg_cpu");
        }
        if self.memory.is_some() {
            fields.push("memory");
        }
        if self.disk.is_some() {
            fields.push("disk");
        }
        if self.processes.is_some() {
            fields.push("processes");
        }
        fields
    }
}

// ---------------------------------------------------------------------------
// SnapshotStore
// ---------------------------------------------------------------------------

struct StoreInner {
    snapshot: Mutex<MetricsSnapshot>,
    revision: watch::Sender<u64>,
}

/// Single source of truth for the current snapshot.
///
/// Cloning yields another handle to the same store. The engine's message path
/// is the only writer; presentation reads through [`SnapshotStore::current`]
/// or waits on [`SnapshotStore::subscribe`]. The mutex makes each merge and
/// each read atomic, but two consecutive reads may straddle a merge.
#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<StoreInner>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    /// An empty store: every field absent, revision 0.
    pub fn new() -> Self {
        let (revision, _) = watch::channel(0u64);
        Self {
            inner: Arc::new(StoreInner {
                snapshot: Mutex::new(MetricsSnapshot::default()),
                revision,
            }),
        }
    }

    /// Apply an inbound partial update and notify subscribers.
    pub fn merge(&self, update: MetricsSnapshot) {
        self.lock().merge(update);
        self.inner.revision.send_modify(|rev| *rev += 1);
    }

    /// Copy of the latest snapshot.
    pub fn current(&self) -> MetricsSnapshot {
        self.lock().clone()
    }

    /// Run `f` against the latest snapshot without cloning it.
    pub fn read<R>(&self, f: impl FnOnce(&MetricsSnapshot) -> R) -> R {
        f(&self.lock())
    }

    /// Number of merges applied so far.
    pub fn revision(&self) -> u64 {
        *self.inner.revision.borrow()
    }

    /// Receiver that observes a new revision after every merge.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.revision.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, MetricsSnapshot> {
        match self.inner.snapshot.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory(used: u64, available: u64, percent: f64) -> MemoryStats {
        MemoryStats {
            used: Some(used),
            available: Some(available),
            percent: Some(percent),
        }
    }

    fn disk(percent: f64) -> DiskStats {
        DiskStats {
            used: Some(100),
            free: Some(300),
            percent: Some(percent),
            read_count: Some(7),
            write_count: Some(9),
        }
    }

    fn process(pid: u32, name: &str) -> ProcessInfo {
        ProcessInfo {
            pid,
            name: Some(name.to_string()),
            cpu_percent: Some(1.0),
            memory_percent: Some(0.5),
        }
    }

    #[test]
    fn new_store_is_empty() {
        let store = SnapshotStore::new();
        assert!(store.current().is_empty());
        assert_eq!(store.revision(), 0);
    }

    #[test]
    fn merge_replaces_memory_wholesale_and_keeps_disk() {
        let mut snap = MetricsSnapshot {
            memory: Some(memory(1024, 2048, 33.0)),
            disk: Some(disk(40.0)),
            ..Default::default()
        };
        snap.merge(MetricsSnapshot {
            memory: Some(MemoryStats {
                percent: Some(50.0),
                ..Default::default()
            }),
            ..Default::default()
        });

        let mem = snap.memory.as_ref().unwrap();
        assert_eq!(mem.percent, Some(50.0));
        assert_eq!(mem.used, None, "old memory.used must not survive");
        assert_eq!(mem.available, None);
        assert_eq!(snap.disk, Some(disk(40.0)));
    }

    #[test]
    fn merge_replaces_process_list_instead_of_upserting() {
        let mut snap = MetricsSnapshot {
            processes: Some(vec![process(1, "init"), process(2, "sshd")]),
            ..Default::default()
        };
        snap.merge(MetricsSnapshot {
            processes: Some(vec![process(2, "sshd-renamed")]),
            ..Default::default()
        });
        let procs = snap.processes.unwrap();
        assert_eq!(procs.len(), 1);
        assert_eq!(procs[0].name.as_deref(), Some("sshd-renamed"));
    }

    #[test]
    fn merge_with_empty_vec_clears_field_contents() {
        let mut snap = MetricsSnapshot {
            cpu_core_loads: Some(vec![10.0, 20.0]),
            ..Default::default()
        };
        snap.merge(MetricsSnapshot {
            cpu_core_loads: Some(vec![]),
            ..Default::default()
        });
        assert_eq!(snap.cpu_core_loads, Some(vec![]));
    }

    #[test]
    fn merge_is_idempotent() {
        let update = MetricsSnapshot {
            cpu_core_loads: Some(vec![5.0, 15.0]),
            memory: Some(memory(1, 2, 3.0)),
            ..Default::default()
        };
        let mut once = MetricsSnapshot {
            disk: Some(disk(10.0)),
            ..Default::default()
        };
        let mut twice = once.clone();
        once.merge(update.clone());
        twice.merge(update.clone());
        twice.merge(update);
        assert_eq!(once, twice);
    }

    #[test]
    fn later_update_wins_on_overlapping_fields_only() {
        let store = SnapshotStore::new();
        store.merge(MetricsSnapshot {
            cpu_core_loads: Some(vec![1.0]),
            memory: Some(memory(10, 20, 30.0)),
            disk: Some(disk(11.0)),
            ..Default::default()
        });
        store.merge(MetricsSnapshot {
            memory: Some(memory(40, 50, 60.0)),
            processes: Some(vec![process(9, "late")]),
            ..Default::default()
        });

        let snap = store.current();
        assert_eq!(snap.memory, Some(memory(40, 50, 60.0)));
        assert_eq!(snap.cpu_core_loads, Some(vec![1.0]));
        assert_eq!(snap.disk, Some(disk(11.0)));
        assert_eq!(snap.processes.map(|p| p.len()), Some(1));
        assert_eq!(store.revision(), 2);
    }

    #[test]
    fn out_of_range_values_pass_through_unvalidated() {
        let store = SnapshotStore::new();
        store.merge(MetricsSnapshot {
            average_cpu_load: Some(180.0),
            memory: Some(MemoryStats {
                percent: Some(-4.0),
                ..Default::default()
            }),
            ..Default::default()
        });
        let snap = store.current();
        assert_eq!(snap.average_cpu_load, Some(180.0));
        assert_eq!(snap.memory.unwrap().percent, Some(-4.0));
    }

    #[test]
    fn clones_share_state() {
        let store = SnapshotStore::new();
        let reader = store.clone();
        store.merge(MetricsSnapshot {
            average_cpu_load: Some(12.5),
            ..Default::default()
        });
        assert_eq!(reader.read(|s| s.average_cpu_load), Some(12.5));
    }

    #[test]
    fn subscribers_see_each_merge() {
        let store = SnapshotStore::new();
        let mut rx = store.subscribe();
        assert!(!rx.has_changed().unwrap());
        store.merge(MetricsSnapshot::default());
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), 1);
    }

    #[test]
    fn decodes_wire_names() {
        let json = r#"{
            "cpu": [12.5, 40.0],
            "avg_cpu": 26.25,
            "memory": {"used": 100, "available": 300, "percent": 25.0},
            "disk": {"used": 1, "free": 3, "percent": 25.0, "read_count": 5, "write_count": 6},
            "processes": [{"pid": 1, "name": "init", "cpu_percent": 0.0, "memory_percent": null}]
        }"#;
        let snap: MetricsSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snap.cpu_core_loads, Some(vec![12.5, 40.0]));
        assert_eq!(snap.average_cpu_load, Some(26.25));
        assert_eq!(snap.memory.as_ref().unwrap().available, Some(300));
        assert_eq!(snap.disk.as_ref().unwrap().write_count, Some(6));
        let procs = snap.processes.unwrap();
        assert_eq!(procs[0].pid, 1);
        assert_eq!(procs[0].memory_percent, None);
    }

    #[test]
    fn missing_pid_is_a_decode_error() {
        let json = r#"{"processes": [{"name": "ghost"}]}"#;
        assert!(serde_json::from_str::<MetricsSnapshot>(json).is_err());
    }

    #[test]
    fn present_fields_lists_wire_names() {
        let snap = MetricsSnapshot {
            cpu_core_loads: Some(vec![]),
            disk: Some(DiskStats::default()),
            ..Default::default()
        };
        assert_eq!(snap.present_fields(), vec!["cpu", "disk"]);
    }
}
