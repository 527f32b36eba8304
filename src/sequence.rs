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
//! The sketchpad track/sequence matrix (spec section 4.6): ten tracks, each
//! holding up to five patterns in its clip bank, advanced in lockstep from
//! the sync timer's per-tick output.

use rand::Rng;

use crate::keyscale::{KeyScaleLock, Pitch, Scale};
use crate::pattern::engine::{self, AdvanceContext};
use crate::pattern::Pattern;
use crate::timer::{SyncTimer, Target};

pub const TRACK_COUNT: usize = 10;
pub const CLIPS_PER_TRACK: usize = 5;

/// Where a track's routed output is mirrored to, per spec section 3,
/// "Sketchpad Track".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Zynthian,
    Sampler,
    External,
    None,
}

/// Static per-track routing and key/scale configuration, produced from YAML
/// (see [`crate::config::track::Track::into_config`]).
#[derive(Debug, Clone)]
pub struct TrackConfig {
    pub device_index: usize,
    pub destination: Destination,
    /// -1 means "same as track index".
    pub external_channel: i8,
    pub zynthian_channel_map: [i8; 16],
    pub key_scale_lock: KeyScaleLock,
    pub key: Pitch,
    pub octave: i8,
    pub scale: Scale,
}

impl TrackConfig {
    /// Resolves the external MIDI channel this track writes to, defaulting to
    /// its own index when unset.
    pub fn resolved_external_channel(&self, track_index: usize) -> u8 {
        if self.external_channel < 0 {
            (track_index % 16) as u8
        } else {
            self.external_channel as u8
        }
    }
}

/// One sketchpad track: its static configuration plus a bank of patterns
/// (clips) and which clip is currently active.
pub struct Track {
    pub config: TrackConfig,
    pub clips: Vec<Pattern>,
    pub active_clip: usize,
    /// The tick `active_clip` most recently started playing at, i.e.
    /// `clipOffset` (spec section 4.5 step 1) -- `None` until the track's
    /// first clip start, at which point step advancement treats the clip as
    /// if it had always been playing from tick 0.
    active_clip_started_at: Option<u64>,
}

impl Track {
    pub fn new(config: TrackConfig) -> Track {
        Track {
            config,
            clips: Vec::with_capacity(CLIPS_PER_TRACK),
            active_clip: 0,
            active_clip_started_at: None,
        }
    }

    pub fn active_pattern(&self) -> Option<&Pattern> {
        self.clips.get(self.active_clip)
    }

    pub fn active_pattern_mut(&mut self) -> Option<&mut Pattern> {
        self.clips.get_mut(self.active_clip)
    }

    /// Switches the active clip to `clip_index` and records `tick` as its
    /// start, so the next `advance_tick` call restarts the new clip's pattern
    /// at step 0 instead of wherever `tick` happens to fall.
    pub fn start_clip(&mut self, clip_index: usize, tick: u64) {
        self.active_clip = clip_index;
        self.active_clip_started_at = Some(tick);
    }

    pub fn active_clip_started_at(&self) -> Option<u64> {
        self.active_clip_started_at
    }
}

/// The full ten-track sequence matrix. Owns every track's pattern bank and
/// drives the per-tick step engine for whichever clip is playing.
pub struct SequenceController {
    pub tracks: Vec<Track>,
    /// When set, only this `(track, clip)` advances; every other track's
    /// current clip is silenced, mirroring a DAW-style solo toggle.
    pub solo: Option<(usize, usize)>,
    pub running: bool,
}

impl SequenceController {
    pub fn new(tracks: Vec<Track>) -> SequenceController {
        SequenceController {
            tracks,
            solo: None,
            running: false,
        }
    }

    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn set_solo(&mut self, track: usize, clip: usize) {
        self.solo = Some((track, clip));
    }

    pub fn clear_solo(&mut self) {
        self.solo = None;
    }

    /// Advances every eligible track's active clip for `tick`, scheduling
    /// output into `timer`. A track is eligible when the sequencer is running
    /// and either no clip is soloed or this is the soloed `(track, clip)`.
    /// `song_mode_start_offset` is the tick song-mode playback began at, zero
    /// when no song is currently playing (spec section 4.5 step 1).
    pub fn advance_tick(&mut self, tick: u64, song_mode_start_offset: u64, timer: &mut SyncTimer, rng: &mut impl Rng) {
        if !self.running {
            return;
        }
        let multiplier = timer.multiplier();

        for (track_index, track) in self.tracks.iter().enumerate() {
            if let Some((solo_track, solo_clip)) = self.solo {
                if solo_track != track_index || solo_clip != track.active_clip {
                    continue;
                }
            }
            let Some(pattern) = track.active_pattern() else {
                continue;
            };

            let target = match track.config.destination {
                Destination::External => Target::Device(track.config.device_index),
                _ => Target::Track(track_index),
            };
            let channel_candidates: Vec<u8> = match track.config.destination {
                Destination::Zynthian => track
                    .config
                    .zynthian_channel_map
                    .iter()
                    .enumerate()
                    .filter(|(_, mapped)| **mapped == track_index as i8)
                    .map(|(channel, _)| channel as u8)
                    .collect(),
                Destination::External => vec![track.config.resolved_external_channel(track_index)],
                Destination::Sampler | Destination::None => vec![pattern.midi_channel],
            };
            if channel_candidates.is_empty() {
                continue;
            }

            let ctx = AdvanceContext {
                clip_offset: track.active_clip_started_at().unwrap_or(0) as i64,
                song_mode_start_offset: song_mode_start_offset as i64,
                multiplier,
                track_index,
                target,
                channel_candidates: &channel_candidates,
            };
            engine::advance_tick(pattern, tick, &ctx, timer, rng);
        }
    }

    /// Mutes every track immediately, used on transport stop (spec section
    /// 4.6's "stop behavior"). Returns the `(channel, note)` pairs that need
    /// synthesized note-offs, sourced from the caller's router devices.
    pub fn all_notes_off_targets(&self) -> Vec<(usize, Destination)> {
        self.tracks
            .iter()
            .enumerate()
            .map(|(i, t)| (i, t.config.destination))
            .collect()
    }
}
