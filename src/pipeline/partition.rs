use std::ops::Range;

/// A contiguous run of payload frames assigned to one decode worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    pub worker: usize,
    /// First frame index; payload frames start at 1, after the header.
    pub start: u64,
    pub count: u64,
}

impl Partition {
    pub fn frames(&self) -> Range<u64> {
        self.start..self.start + self.count
    }
}

/// Clamp a requested worker count to `1..=min(payload_frames, parallelism)`.
pub fn effective_workers(requested: usize, payload_frames: u64, parallelism: usize) -> usize {
    let cap = usize::try_from(payload_frames)
        .unwrap_or(usize::MAX)
        .min(parallelism)
        .max(1);
    requested.clamp(1, cap)
}

/// Split payload frames `1..=payload_frames` across `workers` workers.
///
/// Every worker gets `payload_frames / workers` frames; the last one also takes
/// the remainder. A `workers` of zero is treated as one.
pub fn partition(payload_frames: u64, workers: usize) -> Vec<Partition> {
    let workers = workers.max(1);
    let base = payload_frames / workers as u64;
    let remainder = payload_frames - base * workers as u64;

    (0..workers)
        .map(|worker| {
            let is_last = worker + 1 == workers;
            Partition {
                worker,
                start: base * worker as u64 + 1,
                count: if is_last { base + remainder } else { base },
            }
        })
        .collect()
}
