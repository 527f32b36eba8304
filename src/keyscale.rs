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
//! Pitch classes, scale interval tables, and the key/scale lock rewrite used by
//! a sketchpad track's `lockStyle`. Grounded on `KeyScales.cpp`'s `onScaleNote`
//! and `midiNoteOnScale` from the original source.

use serde::{Deserialize, Serialize};

/// A pitch class, C through B. `Chromatic` selects "no scale" (lock has no effect).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Pitch {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl Pitch {
    pub fn semitone(&self) -> u8 {
        *self as u8
    }
}

/// A musical scale, identified by its interval pattern measured in semitones
/// from the tonic. The subset below covers the scales used by the example
/// sequences in the persisted-pattern format; `Chromatic` is the identity scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Scale {
    Chromatic,
    Ionian,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    Locrian,
    HarmonicMinor,
    MelodicMinor,
    HarmonicMajor,
    WholeTone,
    Blues,
    MajorPentatonic,
    MinorPentatonic,
    Hirajoshi,
    Hungarian,
    Gypsy,
}

impl Scale {
    /// Semitone offsets from the tonic, strictly increasing, within one octave.
    /// The chromatic scale's table is unused by `on_scale_note`/`note_on_scale`
    /// (both treat `Chromatic` as "lock disabled") but is provided for completeness.
    fn intervals(&self) -> &'static [i32] {
        match self {
            Scale::Chromatic => &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11],
            Scale::Ionian => &[0, 2, 4, 5, 7, 9, 11],
            Scale::Dorian => &[0, 2, 3, 5, 7, 9, 10],
            Scale::Phrygian => &[0, 1, 3, 5, 7, 8, 10],
            Scale::Lydian => &[0, 2, 4, 6, 7, 9, 11],
            Scale::Mixolydian => &[0, 2, 4, 5, 7, 9, 10],
            Scale::Aeolian => &[0, 2, 3, 5, 7, 8, 10],
            Scale::Locrian => &[0, 1, 3, 5, 6, 8, 10],
            Scale::HarmonicMinor => &[0, 2, 3, 5, 7, 8, 11],
            Scale::MelodicMinor => &[0, 2, 3, 5, 7, 9, 11],
            Scale::HarmonicMajor => &[0, 2, 4, 5, 7, 8, 11],
            Scale::WholeTone => &[0, 2, 4, 6, 8, 10],
            Scale::Blues => &[0, 3, 5, 6, 7, 10],
            Scale::MajorPentatonic => &[0, 2, 4, 7, 9],
            Scale::MinorPentatonic => &[0, 3, 5, 7, 10],
            Scale::Hirajoshi => &[0, 2, 3, 7, 8],
            Scale::Hungarian => &[0, 2, 3, 6, 7, 8, 11],
            Scale::Gypsy => &[0, 1, 4, 5, 7, 8, 11],
        }
    }

    /// All MIDI notes 0..127 that lie in this scale rooted at `pitch`, as a
    /// precomputed membership table. Equivalent to the original's
    /// `d->allNotes[scale][root]` set, built lazily per call since scale/pitch
    /// combinations are changed rarely (on the control thread, not per event).
    fn all_notes(&self, pitch: Pitch) -> [bool; 128] {
        let mut table = [false; 128];
        if matches!(self, Scale::Chromatic) {
            table = [true; 128];
            return table;
        }
        let root = pitch.semitone() as i32;
        for note in 0..128i32 {
            let class = (((note - root) % 12) + 12) % 12;
            if self.intervals().contains(&class) {
                table[note as usize] = true;
            }
        }
        table
    }
}

/// Whether a lock is applied to an input event's note byte, mirroring
/// `MidiRouter::applyKeyScale`'s `lockStyle` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum KeyScaleLock {
    Off,
    Block,
    Rewrite,
}

/// Walks the scale's interval table forward or backward by `steps` scale-degrees
/// from `tonic`, clamping the result to the valid MIDI range. Grounded directly
/// on `KeyScales::onScaleNote`.
pub fn on_scale_note(scale: Scale, pitch: Pitch, note: u8, steps: i32) -> u8 {
    if matches!(scale, Scale::Chromatic) || steps == 0 {
        return note.min(127);
    }
    let intervals = scale.intervals();
    let degree_count = intervals.len() as i32;
    let root = pitch.semitone() as i32;

    // Locate the nearest scale degree at or below `note`, expressed as an
    // absolute (octave, degree-index) pair.
    let relative = note as i32 - root;
    let octave = relative.div_euclid(12);
    let class = relative.rem_euclid(12);
    let mut degree_index = 0;
    for (i, interval) in intervals.iter().enumerate() {
        if *interval <= class {
            degree_index = i as i32;
        }
    }

    let mut total_degree = octave * degree_count + degree_index + steps;
    let result_octave = total_degree.div_euclid(degree_count);
    total_degree = total_degree.rem_euclid(degree_count);
    let result = root + result_octave * 12 + intervals[total_degree as usize];

    result.clamp(0, 127) as u8
}

/// True if `note` is a member of `scale` rooted at `pitch`.
pub fn note_on_scale(scale: Scale, pitch: Pitch, note: u8) -> bool {
    if matches!(scale, Scale::Chromatic) {
        return true;
    }
    scale.all_notes(pitch)[note as usize]
}

/// Applies a track's key/scale lock to an in-flight note-class MIDI event,
/// mirroring the `0x79 < status < 0xB0` guard from `MidiRouter::applyKeyScale`.
/// Returns `false` when the event should be dropped (Block rejecting a note
/// outside the scale); the event is rewritten in place for the Rewrite case.
pub fn apply_lock(
    lock: KeyScaleLock,
    scale: Scale,
    pitch: Pitch,
    event: &mut crate::event::MidiEvent,
) -> bool {
    if lock == KeyScaleLock::Off || matches!(scale, Scale::Chromatic) || !event.is_note_class() {
        return true;
    }
    let note = match event.data1() {
        Some(note) => note,
        None => return true,
    };
    match lock {
        KeyScaleLock::Off => true,
        KeyScaleLock::Rewrite => {
            event.set_note(on_scale_note(scale, pitch, note, 0));
            true
        }
        KeyScaleLock::Block => note_on_scale(scale, pitch, note),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::event::MidiEvent;

    #[test]
    fn chromatic_scale_always_passes() {
        assert!(note_on_scale(Scale::Chromatic, Pitch::C, 61));
    }

    #[test]
    fn c_major_membership() {
        // C major: C D E F G A B -> semitone classes 0,2,4,5,7,9,11
        assert!(note_on_scale(Scale::Ionian, Pitch::C, 60)); // C4
        assert!(!note_on_scale(Scale::Ionian, Pitch::C, 61)); // C#4
        assert!(note_on_scale(Scale::Ionian, Pitch::C, 62)); // D4
    }

    #[test]
    fn on_scale_note_zero_steps_is_identity() {
        assert_eq!(on_scale_note(Scale::Ionian, Pitch::C, 61, 0), 61);
    }

    #[test]
    fn on_scale_note_steps_up_lands_on_scale() {
        let rewritten = on_scale_note(Scale::Ionian, Pitch::C, 61, 1);
        assert!(note_on_scale(Scale::Ionian, Pitch::C, rewritten));
    }

    #[test]
    fn apply_lock_block_rejects_out_of_scale_note() {
        let mut e = MidiEvent::short(&[0x92, 61, 80], 0).unwrap();
        let ok = apply_lock(KeyScaleLock::Block, Scale::Ionian, Pitch::C, &mut e);
        assert!(!ok);
    }

    #[test]
    fn apply_lock_rewrite_snaps_to_scale() {
        let mut e = MidiEvent::short(&[0x92, 61, 80], 0).unwrap();
        let ok = apply_lock(KeyScaleLock::Rewrite, Scale::Ionian, Pitch::C, &mut e);
        assert!(ok);
        assert!(note_on_scale(Scale::Ionian, Pitch::C, e.data1().unwrap()));
    }

    #[test]
    fn apply_lock_ignores_non_note_class_status() {
        let mut e = MidiEvent::short(&[0xB0, 1, 1], 0).unwrap();
        let ok = apply_lock(KeyScaleLock::Block, Scale::Ionian, Pitch::C, &mut e);
        assert!(ok, "control-change is outside the 0x79..0xB0 note-class guard");
    }
}
