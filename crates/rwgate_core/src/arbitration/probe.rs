//! Critical-section instrumentation.
//!
//! Records enter/exit timestamps of read and write sections so exclusion and
//! concurrency properties can be checked after a run. Timestamps are taken
//! strictly inside the section (after acquisition, before release), so the
//! recorded intervals under-approximate the real section.
use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

use crate::arbitration::CallerId;

/// Kind of critical section a caller was inside.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Read,
    Write,
}

/// One completed critical section.
#[derive(Debug, Clone)]
pub struct SectionEvent {
    pub section: Section,
    pub caller: CallerId,
    pub entered_at: Instant,
    pub exited_at: Instant,
    /// Active readers at section entry, the entering reader included.
    /// Always 0 for write sections.
    pub readers_inside: usize,
}

impl SectionEvent {
    /// Whether two recorded intervals overlap in time.
    pub fn overlaps(&self, other: &SectionEvent) -> bool {
        self.entered_at < other.exited_at && other.entered_at < self.exited_at
    }
}

/// Cloneable recorder of completed critical sections.
///
/// Recording never blocks the lock itself beyond a brief mutex on the event
/// vector; mutex errors on the recording path are ignored.
#[derive(Debug, Default, Clone)]
pub struct SectionProbe {
    events: Arc<Mutex<Vec<SectionEvent>>>,
}

impl SectionProbe {
    pub fn record(&self, event: SectionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// Snapshot of all events recorded so far.
    pub fn events(&self) -> Vec<SectionEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }

    /// Number of overlapping event pairs between sections of kind `a` and
    /// kind `b`.
    ///
    /// For `a == b` each unordered pair is counted once.
    pub fn overlap_count(&self, a: Section, b: Section) -> usize {
        let events = self.events();
        let mut count = 0;
        for (i, left) in events.iter().enumerate() {
            for right in events.iter().skip(i + 1) {
                let kinds_match = (left.section == a && right.section == b)
                    || (left.section == b && right.section == a);
                if kinds_match && left.overlaps(right) {
                    count += 1;
                }
            }
        }
        count
    }

    /// Maximum number of simultaneously active sections of the given kind,
    /// computed by a sweep over enter/exit timestamps.
    pub fn max_concurrent(&self, section: Section) -> usize {
        let mut bounds = Vec::new();
        for event in self.events() {
            if event.section == section {
                bounds.push((event.entered_at, 1i64));
                bounds.push((event.exited_at, -1i64));
            }
        }
        // Exits sort before enters at equal instants, so touching intervals
        // do not count as concurrent
        bounds.sort();
        let mut active = 0i64;
        let mut max = 0i64;
        for (_, delta) in bounds {
            active += delta;
            max = max.max(active);
        }
        max as usize
    }
}
