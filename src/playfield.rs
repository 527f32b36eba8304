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
//! Bar-aligned clip playstate (spec section 4.7): every (song, track, clip)
//! carries a `current` and a `nextBar` slot; staged changes in `nextBar` are
//! committed atomically on the next bar boundary.

use std::collections::HashMap;

use crate::timer::{SyncTimer, TimerCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipState {
    Stopped,
    Playing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipSlot {
    pub state: ClipState,
    /// Playback offset in frames/ticks within the clip; -1 means "unset".
    pub offset: i32,
}

impl Default for ClipSlot {
    fn default() -> ClipSlot {
        ClipSlot {
            state: ClipState::Stopped,
            offset: -1,
        }
    }
}

/// Where a `setClipPlaystate` call lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitPosition {
    Current,
    NextBar,
}

type ClipKey = (usize, usize, usize);

pub struct PlayfieldManager {
    current: HashMap<ClipKey, ClipSlot>,
    next_bar: HashMap<ClipKey, ClipSlot>,
    bar_length_ticks: u64,
}

impl PlayfieldManager {
    pub fn new(bar_length_ticks: u64) -> PlayfieldManager {
        PlayfieldManager {
            current: HashMap::new(),
            next_bar: HashMap::new(),
            bar_length_ticks: bar_length_ticks.max(1),
        }
    }

    pub fn clip_playstate(&self, song: usize, track: usize, clip: usize, position: CommitPosition) -> ClipSlot {
        let key = (song, track, clip);
        match position {
            CommitPosition::Current => self.current.get(&key).copied().unwrap_or_default(),
            CommitPosition::NextBar => self.next_bar.get(&key).copied().unwrap_or_default(),
        }
    }

    /// Client entry point (spec section 4.7). `sample_looped` reports whether
    /// this clip's destination requires a start/stop clip command on state
    /// transition (sample-loop playback) as opposed to a synth pattern, whose
    /// transitions are driven by the sequence controller instead.
    pub fn set_clip_playstate(
        &mut self,
        song: usize,
        track: usize,
        clip: usize,
        new_state: ClipState,
        position: CommitPosition,
        offset: i32,
        sample_looped: bool,
        timer: &mut SyncTimer,
    ) {
        let key = (song, track, clip);
        match position {
            CommitPosition::NextBar => {
                self.next_bar.insert(key, ClipSlot { state: new_state, offset });
            }
            CommitPosition::Current => {
                self.commit(key, ClipSlot { state: new_state, offset }, sample_looped, timer);
            }
        }
    }

    /// Called once per tick by the caller's sync-timer drain loop. On a bar
    /// boundary, commits every staged `nextBar` entry that differs from
    /// `current` or that carries an explicit offset.
    pub fn process_tick(&mut self, tick: u64, timer: &mut SyncTimer, sample_looped: impl Fn(usize) -> bool) {
        if tick % self.bar_length_ticks != 0 {
            return;
        }

        let due: Vec<(ClipKey, ClipSlot)> = self
            .next_bar
            .iter()
            .filter(|(key, staged)| {
                let current = self.current.get(key).copied().unwrap_or_default();
                current.state != staged.state || staged.offset != -1
            })
            .map(|(key, slot)| (*key, *slot))
            .collect();

        for (key, slot) in due {
            self.commit(key, slot, sample_looped(key.1), timer);
            self.next_bar.remove(&key);
        }
    }

    fn commit(&mut self, key: ClipKey, slot: ClipSlot, sample_looped: bool, timer: &mut SyncTimer) {
        let previous = self.current.get(&key).copied().unwrap_or_default();
        self.current.insert(key, slot);

        if sample_looped && previous.state != slot.state {
            let (_, track, clip) = key;
            let cmd = match slot.state {
                ClipState::Playing => TimerCommand::start_clip_loop(track as i32, clip as i32),
                ClipState::Stopped => TimerCommand::stop_clip_loop(track as i32, clip as i32),
            };
            timer.schedule_timer_command(cmd, 0);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::telemetry::Counters;
    use std::sync::Arc;

    fn timer() -> SyncTimer {
        SyncTimer::new(128, 48000, 120.0, Arc::new(Counters::new()))
    }

    #[test]
    fn current_commit_is_immediate() {
        let mut field = PlayfieldManager::new(32);
        let mut t = timer();
        field.set_clip_playstate(0, 0, 0, ClipState::Playing, CommitPosition::Current, -1, true, &mut t);
        assert_eq!(field.clip_playstate(0, 0, 0, CommitPosition::Current).state, ClipState::Playing);
    }

    #[test]
    fn next_bar_stages_until_bar_boundary() {
        let mut field = PlayfieldManager::new(32);
        let mut t = timer();
        field.set_clip_playstate(0, 0, 0, ClipState::Playing, CommitPosition::NextBar, -1, true, &mut t);
        assert_eq!(field.clip_playstate(0, 0, 0, CommitPosition::Current).state, ClipState::Stopped);

        field.process_tick(16, &mut t, |_| true); // not a bar boundary
        assert_eq!(field.clip_playstate(0, 0, 0, CommitPosition::Current).state, ClipState::Stopped);

        field.process_tick(32, &mut t, |_| true);
        assert_eq!(field.clip_playstate(0, 0, 0, CommitPosition::Current).state, ClipState::Playing);
    }

    #[test]
    fn sample_looped_transition_schedules_timer_command() {
        let mut field = PlayfieldManager::new(32);
        let mut t = timer();
        field.set_clip_playstate(0, 1, 2, ClipState::Playing, CommitPosition::Current, -1, true, &mut t);
        let events = t.process_cycle(48000);
        let total: usize = events.iter().map(|e| e.timer_commands.len()).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn synth_destination_transition_does_not_schedule_clip_command() {
        let mut field = PlayfieldManager::new(32);
        let mut t = timer();
        field.set_clip_playstate(0, 1, 2, ClipState::Playing, CommitPosition::Current, -1, false, &mut t);
        let events = t.process_cycle(48000);
        let total: usize = events.iter().map(|e| e.timer_commands.len()).sum();
        assert_eq!(total, 0);
    }
}
