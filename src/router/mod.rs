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
//! The MIDI router's per-cycle dispatcher (spec section 4.4): merges events
//! from every enabled input device in timestamp order, resolves each one's
//! target sketchpad track, applies key/scale lock, and mirrors it to the
//! outputs its destination calls for.

pub mod device;
pub mod filter;
pub mod note_activation;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::DropReason;
use crate::event::MidiEvent;
use crate::keyscale;
use crate::sequence::{Destination, TrackConfig};
use crate::telemetry::Counters;

pub use device::{DeviceConfig, RouterDevice};

/// Resolved target track of -3 means "discard, do not route" (spec section 4.4 step 5).
const DISCARD_TRACK: i16 = -3;

/// The MPE expressive zone split, grounded on `MidiRouter.h`'s
/// `setExpressiveSplitPoint`/`masterChannels`. `-1` means "all-Upper",
/// `15` means "all-Lower"; anything in between splits the 16 channels at
/// `splitPoint` inclusive for the Lower zone.
pub struct ExpressiveSplit {
    split_point: i8,
}

impl ExpressiveSplit {
    pub fn new(split_point: i8) -> ExpressiveSplit {
        ExpressiveSplit { split_point }
    }

    pub fn split_point(&self) -> i8 {
        self.split_point
    }

    /// Master channel(s) implied by the current split point: channel 0 when
    /// the Lower zone has at least one member channel, channel 15 when the
    /// Upper zone does. Both can be present at once.
    pub fn master_channels(&self) -> Vec<u8> {
        let mut channels = Vec::with_capacity(2);
        if self.split_point >= 0 {
            channels.push(0);
        }
        if self.split_point < 15 {
            channels.push(15);
        }
        channels
    }
}

/// Per-cycle MIDI router: owns every hardware device and dispatches events
/// read from them to the appropriate sketchpad track's output(s).
pub struct MidiRouter {
    pub devices: Vec<RouterDevice>,
    pub track_configs: Vec<TrackConfig>,
    current_track: AtomicUsize,
    master_channel: Option<u8>,
    expressive_split: ExpressiveSplit,
    counters: Arc<Counters>,
}

impl MidiRouter {
    pub fn new(
        devices: Vec<RouterDevice>,
        track_configs: Vec<TrackConfig>,
        master_channel: Option<u8>,
        counters: Arc<Counters>,
    ) -> MidiRouter {
        MidiRouter {
            devices,
            track_configs,
            current_track: AtomicUsize::new(0),
            master_channel,
            expressive_split: ExpressiveSplit::new(15),
            counters,
        }
    }

    pub fn current_track(&self) -> usize {
        self.current_track.load(Ordering::Relaxed)
    }

    pub fn set_current_track(&self, track: usize) {
        self.current_track.store(track, Ordering::Relaxed);
    }

    pub fn set_expressive_split_point(&mut self, split_point: i8) {
        self.expressive_split = ExpressiveSplit::new(split_point);
    }

    pub fn master_channels(&self) -> Vec<u8> {
        self.expressive_split.master_channels()
    }

    /// Drains every enabled input device's captured events in `(frame,
    /// device_index)` order, dispatching each one. Devices must already have
    /// had `process_begin` called for this cycle.
    pub fn dispatch_cycle(&mut self) {
        loop {
            let mut earliest: Option<(usize, u32)> = None;
            for (index, device) in self.devices.iter().enumerate() {
                if !device.enabled || !device.config.input_enabled {
                    continue;
                }
                if let Some(event) = device.current_input_event() {
                    match earliest {
                        Some((_, frame)) if event.frame_offset >= frame => {}
                        _ => earliest = Some((index, event.frame_offset)),
                    }
                }
            }
            let Some((device_index, _)) = earliest else {
                break;
            };
            self.dispatch_one(device_index);
        }
    }

    fn dispatch_one(&mut self, device_index: usize) {
        let event = match self.devices[device_index].current_input_event() {
            Some(e) => *e,
            None => return,
        };
        self.devices[device_index].next_input_event();

        if event.is_system_exclusive() {
            self.broadcast(event, None);
            return;
        }

        if event.is_beat_clock() || event.is_timecode() {
            for device in &mut self.devices {
                let wants_it = if event.is_timecode() {
                    device.config.send_timecode
                } else {
                    device.config.send_beat_clock
                };
                if wants_it {
                    device.write_event_to_output(event, None);
                }
            }
            return;
        }

        let filter_match = self.devices[device_index].input_filter().apply(&event);
        let (mut event, filter_target) = match filter_match {
            Some(m) => (m.event, Some(m.target_track)),
            None => (event, None),
        };

        let channel = event.channel();
        let current_track = self.current_track();
        let mut target_track = resolve_target_track(
            filter_target,
            channel,
            &self.devices[device_index],
            current_track,
        );
        if target_track == DISCARD_TRACK {
            return;
        }

        // A note-off's real target is whatever track its matching note-on
        // activated, which may differ from `target_track`; resolve that
        // first since removing the activation-table entry is always correct
        // regardless of what the key/scale check below decides.
        if let Some(channel) = channel {
            if let Some(note) = event.data1() {
                if event.is_note_off() {
                    target_track = self.devices[device_index].note_off(channel, note, target_track);
                }
            }
        }

        // Key/scale lock is checked against the track this event targets,
        // before a note-on ever touches `NoteActivationTable` (spec section 8
        // scenario B): a note-on `KeyScaleLock::Block` rejects must never
        // leave the activation table believing the note is sounding.
        if target_track >= 0 && event.is_note_class() {
            if let Some(track_config) = self.track_configs.get(target_track as usize) {
                let allowed = keyscale::apply_lock(
                    track_config.key_scale_lock,
                    track_config.scale,
                    track_config.key,
                    &mut event,
                );
                if !allowed {
                    self.counters.record(DropReason::KeyScaleBlocked);
                    return;
                }
            }
        }

        if let Some(channel) = channel {
            if let Some(note) = event.data1() {
                if event.is_note_on() {
                    self.devices[device_index].note_on(channel, note, target_track);
                }
            }
        }

        if target_track < 0 {
            self.counters.record(DropReason::NoTargetTrack);
            return;
        }
        let track_index = target_track as usize;
        if self.track_configs.get(track_index).is_none() {
            self.counters.record(DropReason::NoTargetTrack);
            return;
        }

        self.mirror_to_destination(track_index, event);
    }

    /// Step 8 of spec section 4.4: write to the track's own output device,
    /// then mirror further based on the track's configured destination.
    fn mirror_to_destination(&mut self, track_index: usize, event: MidiEvent) {
        let config = &self.track_configs[track_index];
        let device_index = config.device_index;

        match config.destination {
            Destination::Zynthian => {
                let mapped_channels: Vec<u8> = config
                    .zynthian_channel_map
                    .iter()
                    .enumerate()
                    .filter(|(_, mapped)| **mapped == track_index as i8)
                    .map(|(channel, _)| channel as u8)
                    .collect();
                if let Some(device) = self.devices.get_mut(device_index) {
                    if mapped_channels.is_empty() {
                        device.write_event_to_output(event, None);
                    } else {
                        for channel in mapped_channels {
                            device.write_event_to_output(event, Some(channel));
                        }
                    }
                }
                if let Some(channel) = event.channel() {
                    if self.master_channels_contains(channel) {
                        self.broadcast(event, None);
                    }
                }
            }
            Destination::Sampler => {
                // Not written to the MIDI graph: the sample engine consumes
                // this via the clip-command path fed by the pattern engine.
            }
            Destination::External => {
                let external_channel = config.resolved_external_channel(track_index);
                self.broadcast(event, Some(external_channel));
            }
            Destination::None => {}
        }
    }

    fn master_channels_contains(&self, channel: u8) -> bool {
        self.master_channels().contains(&channel)
            || self.master_channel.map(|m| m == channel).unwrap_or(false)
    }

    fn broadcast(&mut self, event: MidiEvent, channel_override: Option<u8>) {
        for device in &mut self.devices {
            if device.enabled && device.config.output_enabled {
                device.write_event_to_output(event, channel_override);
            }
        }
    }

    /// Collects every output device's drained output buffer for this cycle,
    /// indexed by device index, for the caller to write to JACK port buffers.
    pub fn drain_outputs(&mut self) -> Vec<(usize, Vec<MidiEvent>)> {
        self.devices
            .iter_mut()
            .enumerate()
            .map(|(index, device)| (index, device.drain_output()))
            .collect()
    }
}

/// Spec section 4.4 step 5: prefer the filter match's target track, else the
/// device's channel-to-track map, else the current track. -1/-2 both mean
/// "fall back"; -3 means "discard".
fn resolve_target_track(
    filter_target: Option<i16>,
    channel: Option<u8>,
    device: &RouterDevice,
    current_track: usize,
) -> i16 {
    match filter_target {
        Some(DISCARD_TRACK) => DISCARD_TRACK,
        Some(track) if track >= 0 => track,
        _ => {
            let mapped = channel
                .map(|c| device.target_track_for_midi_channel(c))
                .unwrap_or(-1);
            if mapped >= 0 {
                mapped
            } else {
                current_track as i16
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::keyscale::{KeyScaleLock, Pitch, Scale};
    use crate::router::device::DeviceConfig;
    use crate::router::filter::{EventFilter, FilterEntry, Match, Rewriter};

    fn device_config() -> DeviceConfig {
        DeviceConfig {
            hardware_id: "hw".into(),
            name: "hw".into(),
            input_port: None,
            input_enabled: true,
            output_port: None,
            output_enabled: true,
            device_types: vec![],
            accepted_channel_mask: 0xFFFF,
            accepted_note_range: (0, 127),
            transpose: 0,
            send_beat_clock: false,
            send_timecode: false,
            zynthian_master_channel: None,
            filter_zynthian_output_by_channel: false,
            channel_track_map: [-1; 16],
        }
    }

    fn track_config(destination: Destination) -> TrackConfig {
        TrackConfig {
            device_index: 0,
            destination,
            external_channel: -1,
            zynthian_channel_map: [-1; 16],
            key_scale_lock: KeyScaleLock::Off,
            key: Pitch::C,
            octave: 0,
            scale: Scale::Chromatic,
        }
    }

    #[test]
    fn scenario_a_simple_routing_reaches_mapped_track() {
        let mut config = device_config();
        config.channel_track_map[0] = 3;
        let mut device = RouterDevice::new(config);
        device.process_begin(vec![MidiEvent::short(&[0x90, 60, 100], 100).unwrap()]);

        let mut track_configs = vec![track_config(Destination::None); 4];
        track_configs[3] = track_config(Destination::Zynthian);

        let mut router = MidiRouter::new(vec![device], track_configs, None, Arc::new(Counters::new()));
        router.dispatch_cycle();

        let drained = router.devices[0].drain_output();
        assert_eq!(drained.len(), 1);
        assert_eq!(drained[0].data1(), Some(60));
    }

    #[test]
    fn scenario_b_key_scale_block_drops_event_entirely() {
        let mut device = RouterDevice::new(device_config());
        device.process_begin(vec![MidiEvent::short(&[0x92, 61, 80], 0).unwrap()]);

        let mut blocked_track = track_config(Destination::Zynthian);
        blocked_track.key_scale_lock = KeyScaleLock::Block;
        blocked_track.scale = Scale::Ionian;

        let mut router = MidiRouter::new(vec![device], vec![blocked_track], None, Arc::new(Counters::new()));
        router.current_track.store(0, Ordering::Relaxed);
        router.dispatch_cycle();

        let drained = router.devices[0].drain_output();
        assert!(drained.is_empty());
        assert!(
            !router.devices[0].is_note_active(2, 61),
            "a blocked note-on must never be recorded in the activation table"
        );
    }

    #[test]
    fn discard_target_track_never_written() {
        let mut device = RouterDevice::new(device_config());
        device.process_begin(vec![MidiEvent::short(&[0x90, 60, 100], 0).unwrap()]);

        let filter = EventFilter::new(vec![FilterEntry {
            rule: Match {
                status_nibble: Some(0x90),
                channel_mask: 0xFFFF,
                data1_range: None,
                data2_range: None,
            },
            target_track: DISCARD_TRACK,
            rewriters: vec![Rewriter::SetByte { which: 0, value: 0x90 }],
        }]);
        device.publish_input_filter(filter);

        let mut router = MidiRouter::new(vec![device], vec![track_config(Destination::Zynthian)], None, Arc::new(Counters::new()));
        router.dispatch_cycle();

        let drained = router.devices[0].drain_output();
        assert!(drained.is_empty());
    }

    #[test]
    fn system_exclusive_broadcasts_to_all_enabled_outputs() {
        let device_a = RouterDevice::new(device_config());
        let device_b = RouterDevice::new(device_config());
        let mut router = MidiRouter::new(vec![device_a, device_b], vec![], None, Arc::new(Counters::new()));
        router.devices[0].process_begin(vec![MidiEvent::from_slice(&[0xF0, 0x7E, 0xF7], 0).unwrap()]);
        router.devices[1].process_begin(vec![]);
        router.dispatch_cycle();

        assert_eq!(router.devices[0].drain_output().len(), 1);
        assert_eq!(router.devices[1].drain_output().len(), 1);
    }

    #[test]
    fn master_channels_all_lower_zone() {
        let split = ExpressiveSplit::new(15);
        assert_eq!(split.master_channels(), vec![0]);
    }

    #[test]
    fn master_channels_all_upper_zone() {
        let split = ExpressiveSplit::new(-1);
        assert_eq!(split.master_channels(), vec![15]);
    }

    #[test]
    fn master_channels_standard_split_has_both() {
        let split = ExpressiveSplit::new(7);
        assert_eq!(split.master_channels(), vec![0, 15]);
    }
}
