// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
//! Lock-free counters the audio thread bumps when it has to drop work (full
//! ring, exhausted pool, malformed event) plus a control-thread task that logs
//! them periodically. Nothing here is fatal to the audio thread by design;
//! see the crate-level error handling notes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tracing::{info, span, Level};

/// Telemetry counters, safe to share behind an `Arc` between the audio thread
/// and any control thread that wants to observe them.
#[derive(Default)]
pub struct Counters {
    pub ring_overruns: AtomicU64,
    pub pool_exhausted: AtomicU64,
    pub malformed_events: AtomicU64,
    pub dropped_no_target: AtomicU64,
    pub key_scale_blocked: AtomicU64,
    pub ticks_processed: AtomicU64,
}

impl Counters {
    pub fn new() -> Counters {
        Counters::default()
    }

    #[inline]
    pub fn record(&self, reason: crate::error::DropReason) {
        use crate::error::DropReason::*;
        let counter = match reason {
            RingFull => &self.ring_overruns,
            PoolExhausted => &self.pool_exhausted,
            MalformedEvent => &self.malformed_events,
            NoTargetTrack => &self.dropped_no_target,
            KeyScaleBlocked => &self.key_scale_blocked,
            ChannelRejected | NoteRejected => &self.malformed_events,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn tick(&self) {
        self.ticks_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            ring_overruns: self.ring_overruns.load(Ordering::Relaxed),
            pool_exhausted: self.pool_exhausted.load(Ordering::Relaxed),
            malformed_events: self.malformed_events.load(Ordering::Relaxed),
            dropped_no_target: self.dropped_no_target.load(Ordering::Relaxed),
            key_scale_blocked: self.key_scale_blocked.load(Ordering::Relaxed),
            ticks_processed: self.ticks_processed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub ring_overruns: u64,
    pub pool_exhausted: u64,
    pub malformed_events: u64,
    pub dropped_no_target: u64,
    pub key_scale_blocked: u64,
    pub ticks_processed: u64,
}

/// Spawns a control-thread task that logs a telemetry snapshot every `period`,
/// but only the fields that changed since the previous tick.
pub fn spawn_reporter(
    counters: std::sync::Arc<Counters>,
    period: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let span = span!(Level::INFO, "telemetry");
        let _enter = span.enter();
        let mut previous = Snapshot::default();
        let mut interval = tokio::time::interval(period);
        loop {
            interval.tick().await;
            let current = counters.snapshot();
            if current != previous {
                info!(
                    ring_overruns = current.ring_overruns,
                    pool_exhausted = current.pool_exhausted,
                    malformed_events = current.malformed_events,
                    dropped_no_target = current.dropped_no_target,
                    key_scale_blocked = current.key_scale_blocked,
                    ticks_processed = current.ticks_processed,
                    "telemetry snapshot"
                );
                previous = current;
            }
        }
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::DropReason;

    #[test]
    fn record_and_snapshot() {
        let counters = Counters::new();
        counters.record(DropReason::RingFull);
        counters.record(DropReason::RingFull);
        counters.record(DropReason::PoolExhausted);
        counters.tick();

        let snap = counters.snapshot();
        assert_eq!(snap.ring_overruns, 2);
        assert_eq!(snap.pool_exhausted, 1);
        assert_eq!(snap.ticks_processed, 1);
    }
}
