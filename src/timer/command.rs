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
//! Value records for the sync timer's clip-command and timer-command rings
//! (spec section 3). Both are plain `Copy` structs so they can live in the
//! fixed-size pools described in section 5 without any heap allocation.

/// A single action on the sample engine. Fits in a fixed-size pool entry; the
/// hot path must not allocate to produce one.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipCommand {
    pub clip_reference: u32,
    pub midi_channel: u8,
    pub midi_note: u8,
    pub start_playback: bool,
    pub stop_playback: bool,
    pub change_volume: bool,
    pub volume: f32,
    pub change_looping: bool,
    pub looping: bool,
    pub change_slice: bool,
    pub slice_index: i32,
}

impl ClipCommand {
    pub fn start(clip_reference: u32, midi_channel: u8, midi_note: u8) -> ClipCommand {
        ClipCommand {
            clip_reference,
            midi_channel,
            midi_note,
            start_playback: true,
            ..Default::default()
        }
    }

    pub fn stop(clip_reference: u32, midi_channel: u8, midi_note: u8) -> ClipCommand {
        ClipCommand {
            clip_reference,
            midi_channel,
            midi_note,
            stop_playback: true,
            ..Default::default()
        }
    }
}

/// The scheduling-level operation a [`TimerCommand`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    StartClipLoop,
    StopClipLoop,
    StartPart,
    StopPart,
    ClipCommand,
    StopPlayback,
    SamplerChannelEnabledState,
}

/// A scheduling-level action dispatched by the sync timer's per-tick drain,
/// used by the segment handler for bar-level song-mode transitions and by the
/// playfield manager for clip start/stop. Carries up to three small integer
/// parameters and one 64-bit value, plus an embedded clip command when
/// `operation == ClipCommand`.
#[derive(Debug, Clone, Copy)]
pub struct TimerCommand {
    pub operation: Operation,
    pub params: [i32; 3],
    pub value: i64,
    pub clip_command: Option<ClipCommand>,
}

impl TimerCommand {
    pub fn start_clip_loop(track: i32, clip: i32) -> TimerCommand {
        TimerCommand {
            operation: Operation::StartClipLoop,
            params: [track, clip, 0],
            value: 0,
            clip_command: None,
        }
    }

    pub fn stop_clip_loop(track: i32, clip: i32) -> TimerCommand {
        TimerCommand {
            operation: Operation::StopClipLoop,
            params: [track, clip, 0],
            value: 0,
            clip_command: None,
        }
    }

    pub fn start_part(track: i32, clip: i32) -> TimerCommand {
        TimerCommand {
            operation: Operation::StartPart,
            params: [track, clip, 0],
            value: 0,
            clip_command: None,
        }
    }

    pub fn stop_part(track: i32, clip: i32) -> TimerCommand {
        TimerCommand {
            operation: Operation::StopPart,
            params: [track, clip, 0],
            value: 0,
            clip_command: None,
        }
    }

    pub fn clip_command(cmd: ClipCommand) -> TimerCommand {
        TimerCommand {
            operation: Operation::ClipCommand,
            params: [0, 0, 0],
            value: 0,
            clip_command: Some(cmd),
        }
    }

    pub fn stop_playback() -> TimerCommand {
        TimerCommand {
            operation: Operation::StopPlayback,
            params: [0, 0, 0],
            value: 0,
            clip_command: None,
        }
    }

    /// Returns the symmetric inverse used when the segment handler reverses a
    /// playlist on stop (starts become stops and vice versa); `None` for
    /// commands with no inverse (e.g. `StopPlayback`).
    pub fn inverse(&self) -> Option<TimerCommand> {
        match self.operation {
            Operation::StartClipLoop => Some(TimerCommand::stop_clip_loop(
                self.params[0],
                self.params[1],
            )),
            Operation::StopClipLoop => Some(TimerCommand::start_clip_loop(
                self.params[0],
                self.params[1],
            )),
            Operation::StartPart => Some(TimerCommand::stop_part(self.params[0], self.params[1])),
            Operation::StopPart => Some(TimerCommand::start_part(self.params[0], self.params[1])),
            Operation::ClipCommand | Operation::StopPlayback | Operation::SamplerChannelEnabledState => None,
        }
    }
}
