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
//! Persisted pattern JSON schema (spec section 6, "Persisted state layout")
//! and its conversion to/from the runtime [`crate::pattern::Pattern`].

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::keyscale::{Pitch, Scale};
use crate::pattern::{NoteDestination, NoteLength, Pattern, RatchetStyle, Step, Subnote, SubnoteMetadata};

use super::error::ConfigError;

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedMetadata {
    pub velocity: u8,
    pub delay: i32,
    pub duration: u32,
    pub probability: u8,
    pub ratchet_count: u8,
    pub ratchet_style: u8,
    pub ratchet_probability: u8,
}

impl From<SubnoteMetadata> for PersistedMetadata {
    fn from(m: SubnoteMetadata) -> Self {
        PersistedMetadata {
            velocity: m.velocity,
            delay: m.delay,
            duration: m.duration,
            probability: m.probability,
            ratchet_count: m.ratchet_count,
            ratchet_style: m.ratchet_style as u8,
            ratchet_probability: m.ratchet_probability,
        }
    }
}

impl PersistedMetadata {
    fn into_runtime(self) -> SubnoteMetadata {
        SubnoteMetadata {
            velocity: self.velocity,
            delay: self.delay,
            duration: self.duration,
            probability: self.probability,
            ratchet_count: self.ratchet_count,
            ratchet_style: RatchetStyle::from_u8(self.ratchet_style).unwrap_or(RatchetStyle::SplitStepOverlap),
            ratchet_probability: self.ratchet_probability,
        }
    }
}

/// A chord member: the original format's recursive "subnote" entries,
/// flattened to one level since this engine doesn't nest chords further.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedChordNote {
    pub midi_note: u8,
    pub metadata: PersistedMetadata,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedNote {
    /// -1 means "no primary note in this step" (subnotes may still be present).
    pub midi_note: i32,
    #[serde(default = "default_sketchpad_track")]
    pub sketchpad_track: i32,
    pub metadata: PersistedMetadata,
    #[serde(default)]
    pub subnotes: Vec<PersistedChordNote>,
}

fn default_sketchpad_track() -> i32 {
    -1
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedStep {
    pub note: Option<PersistedNote>,
    /// Opaque legacy per-step payload, round-tripped but not interpreted.
    #[serde(default)]
    pub keyeddata: Option<serde_json::Value>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedPattern {
    pub height: usize,
    pub width: usize,
    pub note_destination: String,
    pub midi_channel: u8,
    #[serde(default)]
    pub external_midi_channel: u8,
    pub default_note_duration: u32,
    pub step_length: u8,
    pub swing: u8,
    pub pattern_length: usize,
    pub bank_offset: usize,
    pub bank_length: usize,
    pub enabled: bool,
    pub scale: Scale,
    pub pitch: Pitch,
    pub octave: i8,
    pub lock_to_key_and_scale: bool,
    pub notes: Vec<Vec<PersistedStep>>,
}

impl PersistedPattern {
    pub fn load(path: &Path) -> Result<PersistedPattern, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let raw = serde_json::to_string_pretty(self)?;
        fs::write(path, raw)?;
        Ok(())
    }

    pub fn into_runtime(self) -> Result<Pattern, ConfigError> {
        let note_length = NoteLength::from_u8(self.step_length).ok_or_else(|| ConfigError::InvalidValue {
            field: "stepLength",
            value: self.step_length.to_string(),
        })?;
        let destination = match self.note_destination.as_str() {
            "synth" => NoteDestination::Synth,
            "sample_trigger" => NoteDestination::SampleTrigger,
            "sample_sliced" => NoteDestination::SampleSliced,
            "external" => NoteDestination::External,
            other => {
                return Err(ConfigError::InvalidValue {
                    field: "noteDestination",
                    value: other.to_string(),
                })
            }
        };

        let mut pattern = Pattern::new(self.width, self.bank_length, self.height);
        pattern.bank_offset = self.bank_offset;
        pattern.note_length = note_length;
        pattern.swing = self.swing;
        pattern.destination = destination;
        pattern.midi_channel = self.midi_channel;
        pattern.external_midi_channel = self.external_midi_channel;
        pattern.enabled = self.enabled;

        for (row_index, row) in self.notes.into_iter().enumerate() {
            for (column_index, cell) in row.into_iter().enumerate() {
                let Some(note) = cell.note else { continue };
                let position = row_index * self.width + column_index;
                let mut step = Step::default();
                if note.midi_note >= 0 {
                    step.subnotes.push(Subnote {
                        note: note.midi_note as u8,
                        metadata: note.metadata.into_runtime(),
                    });
                }
                for chord_note in note.subnotes {
                    step.subnotes.push(Subnote {
                        note: chord_note.midi_note,
                        metadata: chord_note.metadata.into_runtime(),
                    });
                }
                if !step.is_empty() {
                    *pattern.step_mut(position) = step;
                }
            }
        }

        Ok(pattern)
    }

    pub fn from_runtime(pattern: &Pattern, key_scale_lock_enabled: bool) -> PersistedPattern {
        let note_destination = match pattern.destination {
            NoteDestination::Synth => "synth",
            NoteDestination::SampleTrigger => "sample_trigger",
            NoteDestination::SampleSliced => "sample_sliced",
            NoteDestination::External => "external",
        }
        .to_string();

        let notes = pattern
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|step| {
                        if step.is_empty() {
                            return PersistedStep::default();
                        }
                        let mut iter = step.subnotes.iter();
                        let primary = iter.next().unwrap();
                        PersistedStep {
                            note: Some(PersistedNote {
                                midi_note: primary.note as i32,
                                sketchpad_track: -1,
                                metadata: primary.metadata.into(),
                                subnotes: iter
                                    .map(|s| PersistedChordNote {
                                        midi_note: s.note,
                                        metadata: s.metadata.into(),
                                    })
                                    .collect(),
                            }),
                            keyeddata: None,
                        }
                    })
                    .collect()
            })
            .collect();

        PersistedPattern {
            height: pattern.available_bars,
            width: pattern.width,
            note_destination,
            midi_channel: pattern.midi_channel,
            external_midi_channel: pattern.external_midi_channel,
            default_note_duration: pattern.note_length.ticks_per_step(128),
            step_length: pattern.note_length as u8,
            swing: pattern.swing,
            pattern_length: pattern.total_steps(),
            bank_offset: pattern.bank_offset,
            bank_length: pattern.bank_length,
            enabled: pattern.enabled,
            scale: Scale::Chromatic,
            pitch: Pitch::C,
            octave: 0,
            lock_to_key_and_scale: key_scale_lock_enabled,
            notes,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_a_populated_pattern() {
        let mut pattern = Pattern::new(4, 1, 1);
        pattern.step_mut(0).upsert(60, SubnoteMetadata::default());
        let persisted = PersistedPattern::from_runtime(&pattern, false);
        let restored = persisted.into_runtime().unwrap();
        assert_eq!(restored.step(0).subnotes[0].note, 60);
    }

    #[test]
    fn rejects_unknown_note_destination() {
        let mut pattern = Pattern::new(1, 1, 1);
        pattern.step_mut(0).upsert(60, SubnoteMetadata::default());
        let mut persisted = PersistedPattern::from_runtime(&pattern, false);
        persisted.note_destination = "bogus".to_string();
        assert!(persisted.into_runtime().is_err());
    }
}
