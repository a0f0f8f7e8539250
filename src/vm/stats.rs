//! Performance counters and execution-flow tracking (spec §3
//! "PerformanceCounters", §4.3 instrumentation, §5).
//!
//! Grounded on the teacher's own perf-counter instinct (it benches step
//! throughput via `kernel-benches`) generalized into an always-on counter
//! set plus a bounded ring of the most recent PCs, so a caller can inspect
//! recent control flow without the history growing unbounded.

const FLOW_RING_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, Default)]
pub struct PerformanceCounters {
    pub instructions_retired: u64,
    pub branches_taken: u64,
    pub loads: u64,
    pub stores: u64,
    pub ecalls: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MemoryStats {
    pub bytes_loaded: u64,
    pub bytes_stored: u64,
}

/// Ring buffer of the most recently retired PCs, plus the count of distinct
/// PCs seen (capped at what the ring can represent — this is an
/// approximation once the working set exceeds the ring's capacity, not an
/// exact unique-PC count).
pub struct ExecutionFlow {
    ring: [u64; FLOW_RING_CAPACITY],
    len: usize,
    next: usize,
}

impl ExecutionFlow {
    pub fn new() -> Self {
        Self {
            ring: [0; FLOW_RING_CAPACITY],
            len: 0,
            next: 0,
        }
    }

    pub fn record(&mut self, pc: u64) {
        self.ring[self.next] = pc;
        self.next = (self.next + 1) % FLOW_RING_CAPACITY;
        self.len = (self.len + 1).min(FLOW_RING_CAPACITY);
    }

    pub fn recent(&self) -> Vec<u64> {
        let start = if self.len == FLOW_RING_CAPACITY { self.next } else { 0 };
        (0..self.len).map(|i| self.ring[(start + i) % FLOW_RING_CAPACITY]).collect()
    }

    pub fn unique_count(&self) -> usize {
        let mut seen: Vec<u64> = self.recent();
        seen.sort_unstable();
        seen.dedup();
        seen.len()
    }
}

impl Default for ExecutionFlow {
    fn default() -> Self {
        Self::new()
    }
}
