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
//! Live recording into a pattern (spec section 4.5, "Live recording"): a
//! note-on snapshots the tick and velocity, its matching note-off finalizes
//! the duration, and both are quantized to the nearest step before being
//! written in.

use std::collections::HashMap;

use crate::pattern::{Pattern, SubnoteMetadata};

/// A note-on awaiting its note-off, keyed by `(channel, note)`.
struct OpenNote {
    start_tick: i64,
    velocity: u8,
}

/// Captures incoming note-on/note-off pairs while `Pattern::live_record` is
/// set, quantizing each finished note into the pattern's step grid.
#[derive(Default)]
pub struct LiveRecorder {
    open: HashMap<(u8, u8), OpenNote>,
}

impl LiveRecorder {
    pub fn new() -> LiveRecorder {
        LiveRecorder::default()
    }

    /// Snapshots a note-on at `tick`. A repeated note-on for the same
    /// `(channel, note)` before its note-off replaces the open entry, matching
    /// "last note-on wins" for unterminated recordings.
    pub fn note_on(&mut self, channel: u8, note: u8, velocity: u8, tick: u64) {
        self.open.insert(
            (channel, note),
            OpenNote {
                start_tick: tick as i64,
                velocity,
            },
        );
    }

    /// Finalizes the note-off at `tick`, quantizes the captured note against
    /// `pattern`'s step grid and writes it into the step it lands on. Returns
    /// `false` if there was no matching open note-on.
    pub fn note_off(&mut self, channel: u8, note: u8, tick: u64, pattern: &mut Pattern, multiplier: u32) -> bool {
        let Some(open) = self.open.remove(&(channel, note)) else {
            return false;
        };

        let note_duration = pattern.ticks_per_step(multiplier) as i64;
        if note_duration <= 0 {
            return false;
        }

        // `deviationAllowance` caps how far a note-on can drift from a step
        // boundary, or a note's length from `noteDuration`, before it's still
        // treated as quantized onto the grid.
        let deviation_allowance = note_duration.min(2);

        let mut step = open.start_tick.div_euclid(note_duration);
        let mut delay = open.start_tick - step * note_duration;
        if delay <= deviation_allowance {
            delay = 0;
        } else if note_duration - delay <= deviation_allowance {
            step += 1;
            delay = 0;
        }

        let raw_duration = (tick as i64 - open.start_tick).max(1);
        let duration = if (raw_duration - note_duration).abs() <= deviation_allowance {
            0
        } else {
            raw_duration
        };

        let step_index = step.rem_euclid(pattern.total_steps().max(1) as i64) as usize;

        let mut metadata = SubnoteMetadata::default();
        metadata.velocity = open.velocity;
        metadata.delay = delay as i32;
        metadata.duration = duration as u32;
        pattern.step_mut(step_index).upsert(note, metadata);
        true
    }

    pub fn cancel_all(&mut self) {
        self.open.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::pattern::NoteLength;

    #[test]
    fn quantizes_note_onto_nearest_step() {
        let mut pattern = Pattern::new(16, 8, 1);
        pattern.note_length = NoteLength::Quarter; // 8 ticks/step
        let mut recorder = LiveRecorder::new();
        recorder.note_on(0, 60, 100, 1); // one tick late, within allowance
        assert!(recorder.note_off(0, 60, 9, &mut pattern, 128));
        assert_eq!(pattern.step(0).subnotes[0].note, 60);
        assert_eq!(pattern.step(0).subnotes[0].metadata.delay, 0);
        assert_eq!(pattern.step(0).subnotes[0].metadata.duration, 0);
    }

    #[test]
    fn note_landing_mid_step_keeps_unsnapped_delay() {
        let mut pattern = Pattern::new(16, 8, 1);
        pattern.note_length = NoteLength::Quarter; // 8 ticks/step
        let mut recorder = LiveRecorder::new();
        recorder.note_on(0, 60, 100, 4); // halfway between steps, outside either edge's allowance
        assert!(recorder.note_off(0, 60, 12, &mut pattern, 128));
        assert_eq!(pattern.step(0).subnotes[0].metadata.delay, 4);
    }

    #[test]
    fn scenario_d_note_past_step_boundary_snaps_forward_with_auto_duration() {
        // Pattern with noteDuration=96 ticks; note-on two ticks past the
        // step-1 boundary (tick 96), note-off at tick 192. multiplier=384
        // makes a whole-note step 96 ticks long (base 32 * 384 / 128).
        let mut pattern = Pattern::new(16, 8, 1);
        pattern.note_length = NoteLength::Whole;
        let mut recorder = LiveRecorder::new();
        recorder.note_on(0, 60, 100, 98);
        assert!(recorder.note_off(0, 60, 192, &mut pattern, 384));
        assert_eq!(pattern.step(1).subnotes[0].note, 60);
        assert_eq!(pattern.step(1).subnotes[0].metadata.delay, 0);
        assert_eq!(pattern.step(1).subnotes[0].metadata.duration, 0);
    }

    #[test]
    fn note_off_without_matching_note_on_returns_false() {
        let mut pattern = Pattern::new(16, 8, 1);
        let mut recorder = LiveRecorder::new();
        assert!(!recorder.note_off(0, 60, 10, &mut pattern, 128));
    }

    #[test]
    fn repeated_note_on_replaces_open_entry() {
        let mut recorder = LiveRecorder::new();
        recorder.note_on(0, 60, 100, 0);
        recorder.note_on(0, 60, 50, 2);
        assert_eq!(recorder.open[&(0, 60)].velocity, 50);
    }
}
