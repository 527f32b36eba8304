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
//! The JACK-synchronized sync timer (spec section 4.3): produces per-tick
//! timing from the process callback's frame count, and owns the scheduled
//! MIDI buffer ring and the clip-command ring.

pub mod command;
pub mod pool;
pub mod ring;

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::DropReason;
use crate::event::MidiEvent;
use crate::telemetry::Counters;

pub use command::{ClipCommand, Operation, TimerCommand};
use ring::TickRing;

/// How many future ticks the rings can hold before wrapping. Must exceed the
/// largest `delayTicks` any caller schedules (pattern engine lookahead plus a
/// full bar's margin).
const DEFAULT_HORIZON_TICKS: usize = 4096;

/// Where a scheduled MIDI buffer should be written once its tick arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Track(usize),
    Device(usize),
}

/// A (tick, buffer, target) record; `delayTicks` has already been folded into
/// the tick it's keyed under by the time it reaches the ring.
#[derive(Debug, Clone)]
pub struct ScheduledBuffer {
    pub events: Vec<MidiEvent>,
    pub target: Target,
}

/// Everything scheduled for a single tick, handed back from [`SyncTimer::process_cycle`]
/// in drain order: timer commands, then clip commands, then MIDI buffers (spec
/// section 4.3, "Ordering guarantees").
#[derive(Debug, Clone, Default)]
pub struct TickEvents {
    pub tick: u64,
    pub timer_commands: Vec<TimerCommand>,
    pub clip_commands: Vec<ClipCommand>,
    pub midi_buffers: Vec<ScheduledBuffer>,
}

pub struct SyncTimer {
    /// Ticks per beat; an integer power of two.
    multiplier: u32,
    sample_rate: u32,
    bpm: f64,
    current_tick: u64,
    /// `process_cycle` hasn't drained tick 0 yet; without this, the first
    /// call would start its loop at `current_tick + 1` and tick 0's ring
    /// entries (anything scheduled with `delay_ticks == 0` before the timer
    /// has advanced) would never be drained.
    started: bool,
    total_frames: u64,
    midi_ring: TickRing<ScheduledBuffer>,
    clip_ring: TickRing<ClipCommand>,
    timer_ring: TickRing<TimerCommand>,
    /// Round-robin channel cursor per track, plus a cache keyed by
    /// `(track, delay_ticks)` so a note-on and its matching note-off scheduled
    /// at the same delay land on the same channel.
    channel_cursor: HashMap<usize, usize>,
    channel_cache: HashMap<(usize, i64), u8>,
    counters: Arc<Counters>,
}

impl SyncTimer {
    pub fn new(multiplier: u32, sample_rate: u32, bpm: f64, counters: Arc<Counters>) -> SyncTimer {
        SyncTimer {
            multiplier,
            sample_rate,
            bpm,
            current_tick: 0,
            started: false,
            total_frames: 0,
            midi_ring: TickRing::new(DEFAULT_HORIZON_TICKS),
            clip_ring: TickRing::new(DEFAULT_HORIZON_TICKS),
            timer_ring: TickRing::new(DEFAULT_HORIZON_TICKS),
            channel_cursor: HashMap::new(),
            channel_cache: HashMap::new(),
            counters,
        }
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Pins `current_tick` to `tick`. `schedule_midi_buffer`/`schedule_clip_command`/
    /// `schedule_timer_command` all anchor `delay_ticks` against this value, so a
    /// caller driving several elapsed ticks out of one [`SyncTimer::process_cycle`]
    /// batch must call this before scheduling against each one — otherwise every
    /// tick in the batch would anchor against whichever tick `process_cycle` last
    /// advanced to, rather than the tick actually being processed.
    pub fn set_current_tick(&mut self, tick: u64) {
        self.current_tick = tick;
    }

    pub fn set_bpm(&mut self, bpm: f64) {
        self.bpm = bpm;
    }

    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    pub fn multiplier(&self) -> u32 {
        self.multiplier
    }

    /// Absolute microsecond timestamp of the first frame of the current
    /// cycle, monotonic across cycles.
    pub fn jack_playhead_usecs(&self) -> u64 {
        self.total_frames * 1_000_000 / self.sample_rate as u64
    }

    /// Converts a JACK frame timestamp to (tick, sub-tick offset in frames).
    pub fn timer_tick_for_jack_playhead(&self, frame_timestamp: u64) -> (u64, u32) {
        let usecs = frame_timestamp * 1_000_000 / self.sample_rate as u64;
        let ticks_per_usec = self.ticks_per_second() / 1_000_000.0;
        let tick = (usecs as f64 * ticks_per_usec).floor() as u64;
        let tick_start_usecs = (tick as f64 / ticks_per_usec) as u64;
        let offset_usecs = usecs.saturating_sub(tick_start_usecs);
        let offset_frames = (offset_usecs * self.sample_rate as u64 / 1_000_000) as u32;
        (tick, offset_frames)
    }

    fn ticks_per_second(&self) -> f64 {
        self.bpm * self.multiplier as f64 / 60.0
    }

    /// Exact tick-duration to seconds conversion, `ticks_per_second = bpm * multiplier / 60`.
    pub fn subbeat_count_to_seconds(bpm: f64, multiplier: u32, ticks: u64) -> f64 {
        ticks as f64 / (bpm * multiplier as f64 / 60.0)
    }

    /// Inverse of [`SyncTimer::subbeat_count_to_seconds`].
    pub fn seconds_to_subbeat_count(bpm: f64, multiplier: u32, seconds: f64) -> u64 {
        (seconds * bpm * multiplier as f64 / 60.0).round() as u64
    }

    /// Appends `buffer` to the MIDI ring at `currentTick + delay_ticks`.
    pub fn schedule_midi_buffer(&mut self, events: Vec<MidiEvent>, delay_ticks: u64, target: Target) {
        let tick = self.current_tick + delay_ticks;
        if !self.midi_ring.push(tick, ScheduledBuffer { events, target }) {
            self.counters.record(DropReason::RingFull);
        }
    }

    pub fn schedule_clip_command(&mut self, cmd: ClipCommand, delay_ticks: u64) {
        let tick = self.current_tick + delay_ticks;
        if !self.clip_ring.push(tick, cmd) {
            self.counters.record(DropReason::RingFull);
        }
    }

    pub fn schedule_timer_command(&mut self, cmd: TimerCommand, delay_ticks: u64) {
        let tick = self.current_tick + delay_ticks;
        if !self.timer_ring.push(tick, cmd) {
            self.counters.record(DropReason::RingFull);
        }
    }

    /// Round-robin allocates a channel from `candidates` for `track`, caching
    /// the choice by `(track, delay_ticks)` so a note-on/note-off pair
    /// scheduled at the same delay always agree.
    pub fn next_available_channel(
        &mut self,
        track: usize,
        delay_ticks: i64,
        candidates: &[u8],
    ) -> Option<u8> {
        if candidates.is_empty() {
            return None;
        }
        if let Some(channel) = self.channel_cache.get(&(track, delay_ticks)) {
            return Some(*channel);
        }
        let cursor = self.channel_cursor.entry(track).or_insert(0);
        let channel = candidates[*cursor % candidates.len()];
        *cursor = (*cursor + 1) % candidates.len();
        self.channel_cache.insert((track, delay_ticks), channel);
        Some(channel)
    }

    /// Per-cycle algorithm driven by the JACK process callback: advances the
    /// tick count by however many ticks this cycle covers and drains every
    /// ring for each of them, in ascending tick order.
    pub fn process_cycle(&mut self, nframes: u32) -> Vec<TickEvents> {
        self.total_frames += nframes as u64;
        let cycle_end_usecs = self.jack_playhead_usecs();
        let ticks_per_usec = self.ticks_per_second() / 1_000_000.0;
        let absolute_tick = (cycle_end_usecs as f64 * ticks_per_usec).floor() as u64;
        if self.started && absolute_tick <= self.current_tick {
            return Vec::new();
        }

        let start_tick = if self.started { self.current_tick + 1 } else { 0 };
        self.started = true;

        let mut events = Vec::new();
        for tick in start_tick..=absolute_tick {
            self.counters.tick();
            events.push(TickEvents {
                tick,
                timer_commands: self.timer_ring.drain(tick),
                clip_commands: self.clip_ring.drain(tick),
                midi_buffers: self.midi_ring.drain(tick),
            });
        }
        self.current_tick = absolute_tick;
        events
    }

    /// Stops the timer: clears both rings. The caller is responsible for
    /// synthesizing and writing the all-notes-off buffers synchronously
    /// *before* calling this, since those writes must reach the output
    /// devices even though the rings are about to be discarded.
    pub fn stop(&mut self) {
        self.midi_ring.clear();
        self.clip_ring.clear();
        self.timer_ring.clear();
        self.channel_cache.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn counters() -> Arc<Counters> {
        Arc::new(Counters::new())
    }

    #[test]
    fn subbeat_roundtrip_holds_for_integer_ticks() {
        for bpm in [20.0, 120.0, 999.0] {
            for n in [0u64, 1, 128, 1_000_000] {
                let seconds = SyncTimer::subbeat_count_to_seconds(bpm, 128, n);
                let back = SyncTimer::seconds_to_subbeat_count(bpm, 128, seconds);
                assert_eq!(back, n, "bpm={bpm} n={n}");
            }
        }
    }

    #[test]
    fn process_cycle_advances_tick_and_drains_in_order() {
        let mut timer = SyncTimer::new(128, 48000, 120.0, counters());
        timer.schedule_timer_command(TimerCommand::stop_playback(), 0);
        let events = timer.process_cycle(48000); // ~1 second, many ticks
        assert!(!events.is_empty());
        // whatever tick currentTick==0 lands on should carry our command
        let total_commands: usize = events.iter().map(|e| e.timer_commands.len()).sum();
        assert_eq!(total_commands, 1);
    }

    #[test]
    fn next_available_channel_is_stable_for_same_delay() {
        let mut timer = SyncTimer::new(128, 48000, 120.0, counters());
        let candidates = [0, 1, 2];
        let a = timer.next_available_channel(0, 10, &candidates).unwrap();
        let b = timer.next_available_channel(0, 10, &candidates).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn next_available_channel_round_robins_across_delays() {
        let mut timer = SyncTimer::new(128, 48000, 120.0, counters());
        let candidates = [0, 1];
        let a = timer.next_available_channel(0, 1, &candidates).unwrap();
        let b = timer.next_available_channel(0, 2, &candidates).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn stop_clears_all_rings() {
        let mut timer = SyncTimer::new(128, 48000, 120.0, counters());
        timer.schedule_clip_command(ClipCommand::start(0, 0, 60), 0);
        timer.stop();
        let events = timer.process_cycle(48000);
        let total: usize = events.iter().map(|e| e.clip_commands.len()).sum();
        assert_eq!(total, 0);
    }
}
