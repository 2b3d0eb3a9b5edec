//! Offset bookkeeping for one partition.
//!
//! - `next`: where the next fetch starts
//! - `committed`: first offset not yet acknowledged
//! - `in_flight`: claimed by a worker, not yet acknowledged or released
//! - `acked`: acknowledged past a gap, waiting for `committed` to catch up
//!
//! Releasing an offset rewinds `next` so the record is fetched again. Offsets
//! that are in flight or acknowledged are skipped when a rewound fetch
//! returns them.

use std::collections::BTreeSet;

#[derive(Debug, Clone)]
pub struct OffsetTracker {
    next: i64,
    committed: i64,
    in_flight: BTreeSet<i64>,
    acked: BTreeSet<i64>,
}

impl OffsetTracker {
    pub fn new(start: i64) -> Self {
        Self {
            next: start,
            committed: start,
            in_flight: BTreeSet::new(),
            acked: BTreeSet::new(),
        }
    }

    /// Offset the next fetch starts at.
    pub fn next(&self) -> i64 {
        self.next
    }

    pub fn committed(&self) -> i64 {
        self.committed
    }

    /// Records between `next` and the high watermark, minus those a
    /// rewound fetch will skip.
    pub fn available(&self, high_watermark: i64) -> u64 {
        let skipped = self
            .in_flight
            .range(self.next..high_watermark)
            .chain(self.acked.range(self.next..high_watermark))
            .count() as i64;
        (high_watermark - self.next - skipped).max(0) as u64
    }

    /// Claims up to `max` of the fetched `offsets` (ascending) and advances
    /// `next` past everything it looked at.
    pub fn claim(&mut self, offsets: &[i64], max: usize) -> Vec<i64> {
        let mut claimed = Vec::new();

        for &offset in offsets {
            if offset < self.next {
                continue;
            }
            if claimed.len() == max {
                break;
            }
            self.next = offset + 1;

            if offset < self.committed
                || self.in_flight.contains(&offset)
                || self.acked.contains(&offset)
            {
                continue;
            }
            self.in_flight.insert(offset);
            claimed.push(offset);
        }

        claimed
    }

    /// Acknowledges one offset. `committed` only moves over a contiguous run.
    pub fn acknowledge(&mut self, offset: i64) {
        self.in_flight.remove(&offset);
        if offset < self.committed {
            return;
        }

        self.acked.insert(offset);
        while self.acked.remove(&self.committed) {
            self.committed += 1;
        }
    }

    /// Returns a claimed offset so the next fetch delivers it again.
    pub fn release(&mut self, offset: i64) {
        if !self.in_flight.remove(&offset) {
            return;
        }
        self.next = self.next.min(offset);
    }
}
