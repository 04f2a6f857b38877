//! Heap diagnostics: per-type instance counters and the reports built on them.

use std::fmt;

use serde::Serialize;

use crate::heap::types::{TypeId, TypeTable};

/// Live instances and bytes of one type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InstanceCount {
    pub instances: usize,
    pub bytes: usize,
}

/// Per-type counters, indexed by [`TypeId`].
#[derive(Debug, Clone, Default)]
pub struct InstanceCounters {
    counts: Vec<InstanceCount>,
}

impl InstanceCounters {
    pub fn record_alloc(&mut self, id: TypeId, bytes: usize) {
        let index = id.0 as usize;
        if self.counts.len() <= index {
            self.counts.resize(index + 1, InstanceCount::default());
        }
        self.counts[index].instances += 1;
        self.counts[index].bytes += bytes;
    }

    pub fn record_free(&mut self, id: TypeId, bytes: usize) {
        if let Some(count) = self.counts.get_mut(id.0 as usize) {
            count.instances = count.instances.saturating_sub(1);
            count.bytes = count.bytes.saturating_sub(bytes);
        }
    }

    pub fn get(&self, id: TypeId) -> InstanceCount {
        self.counts.get(id.0 as usize).copied().unwrap_or_default()
    }

    fn iter(&self) -> impl Iterator<Item = (TypeId, InstanceCount)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .map(|(index, count)| (TypeId(index as u32), *count))
    }
}

/// One line of an [`InstanceReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceEntry {
    pub type_id: TypeId,
    pub name: &'static str,
    pub instances: usize,
    pub bytes: usize,
}

/// Snapshot of every type with live instances.
///
/// Displays as one `[Heap] <name>: #<instances>; bytes: <bytes>` line per type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstanceReport {
    pub entries: Vec<InstanceEntry>,
}

impl InstanceReport {
    pub fn collect(types: &TypeTable, counters: &InstanceCounters) -> Self {
        let entries = counters
            .iter()
            .filter(|(_, count)| count.instances > 0)
            .map(|(type_id, count)| InstanceEntry {
                type_id,
                name: types.name(type_id),
                instances: count.instances,
                bytes: count.bytes,
            })
            .collect();
        InstanceReport { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl fmt::Display for InstanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for entry in &self.entries {
            writeln!(
                f,
                "[Heap] {}: #{}; bytes: {}",
                entry.name, entry.instances, entry.bytes
            )?;
        }
        Ok(())
    }
}

/// What the out-of-memory hook is told about a failed page acquisition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OomReport {
    /// Bytes the failing allocation needed
    pub requested: usize,
    /// Pages owned by the region at the time
    pub pages: usize,
    /// Outstanding external references held through foreign cells
    pub external_roots: usize,
    /// Live instances per type; empty without the `instance-names` feature
    pub leaks: InstanceReport,
}

impl fmt::Display for OomReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "out of memory: requested {} bytes with {} pages; external roots: {}",
            self.requested, self.pages, self.external_roots
        )?;
        write!(f, "{}", self.leaks)
    }
}
