//! Per-CPU Registry
//!
//! Each core writes its own record exactly once when it checks in. The
//! bootstrap core copies the first `cpu_count` records into an immutable
//! snapshot when the run phase freezes sizing.

use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use super::types::{CpuRecord, MAX_CPUS};

struct RecordCell {
    topology_id: AtomicU32,
    rebased: AtomicBool,
    online: AtomicBool,
}

impl RecordCell {
    const fn new() -> Self {
        Self {
            topology_id: AtomicU32::new(0),
            rebased: AtomicBool::new(false),
            online: AtomicBool::new(false),
        }
    }
}

pub struct PerCpuRegistry {
    cells: [RecordCell; MAX_CPUS],
}

impl PerCpuRegistry {
    pub const fn new() -> Self {
        #[allow(clippy::declare_interior_mutable_const)]
        const CELL: RecordCell = RecordCell::new();
        Self {
            cells: [CELL; MAX_CPUS],
        }
    }

    pub fn reset(&self) {
        for cell in self.cells.iter() {
            cell.online.store(false, Ordering::Relaxed);
            cell.rebased.store(false, Ordering::Relaxed);
            cell.topology_id.store(0, Ordering::Relaxed);
        }
    }

    /// Record the calling core. Write-once per index.
    pub fn register(&self, index: usize, topology_id: u32) -> bool {
        let Some(cell) = self.cells.get(index) else {
            return false;
        };
        if cell.online.load(Ordering::Acquire) {
            return false;
        }
        cell.topology_id.store(topology_id, Ordering::Relaxed);
        cell.online.store(true, Ordering::Release);
        true
    }

    pub fn mark_rebased(&self, index: usize) {
        if let Some(cell) = self.cells.get(index) {
            cell.rebased.store(true, Ordering::Release);
        }
    }

    pub fn is_online(&self, index: usize) -> bool {
        self.cells
            .get(index)
            .map(|cell| cell.online.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Number of registered records among the first `limit` indices
    pub fn online_count(&self, limit: usize) -> usize {
        self.cells
            .iter()
            .take(limit)
            .filter(|cell| cell.online.load(Ordering::Acquire))
            .count()
    }

    pub fn record(&self, index: usize) -> Option<CpuRecord> {
        let cell = self.cells.get(index)?;
        if !cell.online.load(Ordering::Acquire) {
            return None;
        }
        Some(CpuRecord {
            index,
            topology_id: cell.topology_id.load(Ordering::Relaxed),
            rebased: cell.rebased.load(Ordering::Acquire),
        })
    }

    /// Find the index registered under `topology_id`
    pub fn index_of(&self, topology_id: u32) -> Option<usize> {
        (0..MAX_CPUS).find(|&index| {
            let cell = &self.cells[index];
            cell.online.load(Ordering::Acquire)
                && cell.topology_id.load(Ordering::Relaxed) == topology_id
        })
    }

    /// Copy the first `count` records into `out`, returning how many were
    /// registered. Missing records are left as `CpuRecord::empty()` with their
    /// index filled in.
    pub fn snapshot(&self, count: usize, out: &mut [CpuRecord; MAX_CPUS]) -> usize {
        let mut registered = 0;
        for (index, slot) in out.iter_mut().enumerate().take(count.min(MAX_CPUS)) {
            *slot = match self.record(index) {
                Some(record) => {
                    registered += 1;
                    record
                }
                None => CpuRecord {
                    index,
                    ..CpuRecord::empty()
                },
            };
        }
        registered
    }
}
