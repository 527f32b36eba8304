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
//! The top-level engine (spec section 9): owns every subsystem and drives
//! them once per JACK process cycle. This is the only place that touches
//! more than one subsystem, keeping each of them independently testable.

use std::sync::Arc;

use crossbeam_channel::Sender;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::config::EngineConfig;
use crate::event::MidiEvent;
use crate::playfield::PlayfieldManager;
use crate::router::device::RouterDevice;
use crate::router::MidiRouter;
use crate::sequence::{Destination, SequenceController, Track};
use crate::segment::SegmentHandler;
use crate::telemetry::Counters;
use crate::timer::{ClipCommand, SyncTimer, Target, TimerCommand};

/// Ticks per bar for the playfield manager's commit boundary: four beats at
/// `multiplier` ticks/beat, a fixed 4/4 assumption (spec section 4.7 leaves
/// the time signature unspecified; see DESIGN.md).
const BEATS_PER_BAR: u64 = 4;

pub struct Engine {
    router: MidiRouter,
    timer: SyncTimer,
    sequence: SequenceController,
    playfield: PlayfieldManager,
    segment: SegmentHandler,
    rng: SmallRng,
    clip_command_tx: Sender<ClipCommand>,
    timer_command_tx: Sender<TimerCommand>,
    counters: Arc<Counters>,
}

impl Engine {
    /// Builds every subsystem from a resolved [`EngineConfig`]. Returns the
    /// engine plus the receiving ends of the clip-command and timer-command
    /// channels the sample engine and song-mode host should drain from a
    /// control thread.
    pub fn new(
        config: &EngineConfig,
        counters: Arc<Counters>,
    ) -> (
        Engine,
        crossbeam_channel::Receiver<ClipCommand>,
        crossbeam_channel::Receiver<TimerCommand>,
    ) {
        let devices = config
            .device_configs
            .iter()
            .cloned()
            .map(RouterDevice::new)
            .collect::<Vec<_>>();

        let master_channel = devices
            .iter()
            .find_map(|d| d.config.zynthian_master_channel);

        let router = MidiRouter::new(devices, config.track_configs.clone(), master_channel, counters.clone());

        let tracks = config
            .track_configs
            .iter()
            .cloned()
            .map(Track::new)
            .collect::<Vec<_>>();
        let sequence = SequenceController::new(tracks);

        let timer = SyncTimer::new(config.multiplier, 48_000, config.bpm, counters.clone());
        let bar_length_ticks = config.multiplier as u64 * BEATS_PER_BAR;
        let playfield = PlayfieldManager::new(bar_length_ticks);
        let segment = SegmentHandler::new();

        let (clip_command_tx, clip_command_rx) = crossbeam_channel::unbounded();
        let (timer_command_tx, timer_command_rx) = crossbeam_channel::unbounded();

        let engine = Engine {
            router,
            timer,
            sequence,
            playfield,
            segment,
            rng: SmallRng::from_entropy(),
            clip_command_tx,
            timer_command_tx,
            counters,
        };

        (engine, clip_command_rx, timer_command_rx)
    }

    pub fn sequence_mut(&mut self) -> &mut SequenceController {
        &mut self.sequence
    }

    pub fn router_mut(&mut self) -> &mut MidiRouter {
        &mut self.router
    }

    pub fn playfield_mut(&mut self) -> &mut PlayfieldManager {
        &mut self.playfield
    }

    pub fn segment_mut(&mut self) -> &mut SegmentHandler {
        &mut self.segment
    }

    /// Drives one JACK process cycle: feeds each device's captured input,
    /// dispatches routing, advances the sync timer, steps the sequencer,
    /// playfield and segment handler for every tick that elapsed, and
    /// returns each device's output buffer in port order.
    pub fn process_cycle(&mut self, device_inputs: Vec<Vec<MidiEvent>>, nframes: u32) -> Vec<Vec<MidiEvent>> {
        for (index, events) in device_inputs.into_iter().enumerate() {
            if let Some(device) = self.router.devices.get_mut(index) {
                device.process_begin(events);
            }
        }
        self.router.dispatch_cycle();

        let tick_events = self.timer.process_cycle(nframes);
        let destinations: Vec<Destination> = self.sequence.tracks.iter().map(|t| t.config.destination).collect();

        let mut device_outputs = vec![Vec::new(); self.router.devices.len()];

        for tick in tick_events {
            // `process_cycle` has already advanced `self.timer.current_tick` to
            // this cycle's final tick; pin it back to the tick actually being
            // processed so anything scheduled below anchors `delay_ticks`
            // against the right absolute tick rather than the batch's last one.
            self.timer.set_current_tick(tick.tick);
            self.sequence.advance_tick(
                tick.tick,
                self.segment.song_mode_start_offset(),
                &mut self.timer,
                &mut self.rng,
            );

            let sample_looped = |track_index: usize| {
                destinations.get(track_index).copied() == Some(Destination::Sampler)
            };
            self.playfield.process_tick(tick.tick, &mut self.timer, sample_looped);

            if let Some(due) = self.segment.commands_due(tick.tick) {
                for command in due {
                    let _ = self.timer_command_tx.try_send(*command);
                }
            }

            for command in tick.timer_commands {
                let _ = self.timer_command_tx.try_send(command);
            }
            for command in tick.clip_commands {
                let _ = self.clip_command_tx.try_send(command);
            }
            for buffer in tick.midi_buffers {
                let device_index = match buffer.target {
                    Target::Device(index) => Some(index),
                    Target::Track(track_index) => self
                        .sequence
                        .tracks
                        .get(track_index)
                        .map(|t| t.config.device_index),
                };
                if let Some(index) = device_index {
                    if let Some(out) = device_outputs.get_mut(index) {
                        out.extend(buffer.events);
                    } else {
                        self.counters.record(crate::error::DropReason::NoTargetTrack);
                    }
                }
            }
        }

        for (index, events) in self.router.drain_outputs() {
            if let Some(out) = device_outputs.get_mut(index) {
                out.extend(events);
            }
        }

        device_outputs
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }
}
