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
//! Song-mode segment playback (spec section 4.8): a song is a sequence of
//! segments, each naming the set of (track, clip) pairs playing during it.
//! `startPlayback` builds a sorted tick-keyed playlist once, up front, by
//! diffing clip membership between consecutive segments; the per-tick drain
//! loop then just looks up the current tick in that playlist.

use std::collections::BTreeMap;

use crate::timer::{Operation, TimerCommand};

/// One segment of a song: starts at `start_tick` (relative to playback start)
/// and lasts `length_ticks`, with `clips` naming every (track, clip) pair
/// that should be looping for its duration.
#[derive(Debug, Clone)]
pub struct Segment {
    pub start_tick: u64,
    pub length_ticks: u64,
    pub clips: Vec<(i32, i32)>,
}

impl Segment {
    pub fn end_tick(&self) -> u64 {
        self.start_tick + self.length_ticks
    }
}

pub struct SegmentHandler {
    /// tick (relative to the start-playback offset) -> commands due at that tick.
    playlist: BTreeMap<u64, Vec<TimerCommand>>,
    /// The same playlist, reversed and inverted, staged for a symmetric stop.
    reverse_playlist: BTreeMap<u64, Vec<TimerCommand>>,
    playing: bool,
    start_offset: u64,
}

impl SegmentHandler {
    pub fn new() -> SegmentHandler {
        SegmentHandler {
            playlist: BTreeMap::new(),
            reverse_playlist: BTreeMap::new(),
            playing: false,
            start_offset: 0,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// The tick song-mode playback began at, zero when not currently playing.
    pub fn song_mode_start_offset(&self) -> u64 {
        if self.playing {
            self.start_offset
        } else {
            0
        }
    }

    /// Builds the playlist from `segments` (assumed sorted by `start_tick`)
    /// and marks the handler as playing from `start_offset`.
    pub fn start_playback(&mut self, segments: &[Segment], start_offset: u64) {
        self.playlist = Self::build_playlist(segments);
        self.reverse_playlist = Self::build_reverse_playlist(&self.playlist);
        self.start_offset = start_offset;
        self.playing = true;
    }

    fn build_playlist(segments: &[Segment]) -> BTreeMap<u64, Vec<TimerCommand>> {
        let mut playlist: BTreeMap<u64, Vec<TimerCommand>> = BTreeMap::new();
        let mut previous: Vec<(i32, i32)> = Vec::new();

        for segment in segments {
            let starting: Vec<(i32, i32)> = segment
                .clips
                .iter()
                .filter(|clip| !previous.contains(clip))
                .copied()
                .collect();
            let stopping: Vec<(i32, i32)> = previous
                .iter()
                .filter(|clip| !segment.clips.contains(clip))
                .copied()
                .collect();

            let entry = playlist.entry(segment.start_tick).or_default();
            for (track, clip) in &stopping {
                entry.push(TimerCommand::stop_clip_loop(*track, *clip));
            }
            for (track, clip) in &starting {
                entry.push(TimerCommand::start_clip_loop(*track, *clip));
            }

            previous = segment.clips.clone();
        }

        if let Some(last) = segments.last() {
            let entry = playlist.entry(last.end_tick()).or_default();
            for (track, clip) in &previous {
                entry.push(TimerCommand::stop_clip_loop(*track, *clip));
            }
            entry.push(TimerCommand::stop_playback());
        }

        playlist
    }

    /// Builds the symmetric reverse: every tick's commands inverted and
    /// replayed in the opposite tick order, so stopping mid-song unwinds
    /// exactly the clips the forward playlist started.
    fn build_reverse_playlist(forward: &BTreeMap<u64, Vec<TimerCommand>>) -> BTreeMap<u64, Vec<TimerCommand>> {
        let mut reverse = BTreeMap::new();
        let mut tick_index = 0u64;
        for commands in forward.values().rev() {
            let inverted: Vec<TimerCommand> = commands.iter().rev().filter_map(TimerCommand::inverse).collect();
            if !inverted.is_empty() {
                reverse.insert(tick_index, inverted);
            }
            tick_index += 1;
        }
        reverse
    }

    /// Returns the commands due at `absolute_tick`, if any, while playing.
    /// A tick carrying a terminal `StopPlayback` flips [`SegmentHandler::is_playing`]
    /// to `false` before returning, matching the song-mode transition's
    /// expectation that playback has already ended by that same tick.
    pub fn commands_due(&mut self, absolute_tick: u64) -> Option<&[TimerCommand]> {
        if !self.playing || absolute_tick < self.start_offset {
            return None;
        }
        let relative = absolute_tick - self.start_offset;
        if let Some(commands) = self.playlist.get(&relative) {
            if commands.iter().any(|c| c.operation == Operation::StopPlayback) {
                self.playing = false;
            }
            return Some(commands.as_slice());
        }
        None
    }

    /// Unwinds the currently staged playlist symmetrically (reverse tick
    /// order, each command inverted) and stops playback.
    pub fn stop_playback(&mut self) -> Vec<TimerCommand> {
        self.playing = false;
        self.reverse_playlist.values().flatten().copied().collect()
    }
}

impl Default for SegmentHandler {
    fn default() -> SegmentHandler {
        SegmentHandler::new()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::timer::Operation;

    fn segments() -> Vec<Segment> {
        vec![
            Segment {
                start_tick: 0,
                length_ticks: 384,
                clips: vec![(0, 0), (1, 0)],
            },
            Segment {
                start_tick: 384,
                length_ticks: 384,
                clips: vec![(1, 0), (2, 0)],
            },
        ]
    }

    #[test]
    fn scenario_e_simultaneous_stop_and_start_at_transition() {
        let mut handler = SegmentHandler::new();
        handler.start_playback(&segments(), 0);

        let at_start = handler.commands_due(0).unwrap();
        assert_eq!(at_start.len(), 2);

        let at_transition = handler.commands_due(384).unwrap();
        assert_eq!(at_transition.len(), 2);
        assert!(at_transition.iter().any(|c| c.operation == Operation::StopClipLoop));
        assert!(at_transition.iter().any(|c| c.operation == Operation::StartClipLoop));
    }

    #[test]
    fn scenario_e_terminal_stop_and_end_marker_at_song_end() {
        let mut handler = SegmentHandler::new();
        handler.start_playback(&segments(), 0);

        let at_end = handler.commands_due(768).unwrap();
        assert!(at_end.iter().any(|c| c.operation == Operation::StopClipLoop));
        assert!(at_end.iter().any(|c| c.operation == Operation::StopPlayback));
        assert!(!handler.is_playing());
    }

    #[test]
    fn commands_respect_start_offset() {
        let mut handler = SegmentHandler::new();
        handler.start_playback(&segments(), 100);
        assert!(handler.commands_due(0).is_none());
        assert!(handler.commands_due(100).is_some());
    }

    #[test]
    fn stop_playback_inverts_and_reverses() {
        let mut handler = SegmentHandler::new();
        handler.start_playback(&segments(), 0);
        let unwind = handler.stop_playback();
        assert!(!handler.is_playing());
        assert!(!unwind.is_empty());
        assert!(unwind.iter().all(|c| c.operation != Operation::StopPlayback));
    }

    #[test]
    fn not_playing_reports_no_commands() {
        let mut handler = SegmentHandler::new();
        assert!(handler.commands_due(0).is_none());
    }
}
