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
//! One JACK MIDI input/output port pair (spec section 4.1). Owns its input
//! and output filters (swapped atomically from the control thread, read-only
//! on the audio thread) and its note-activation table.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::config::device::DeviceTypeTag;
use crate::event::MidiEvent;
use crate::router::filter::{EventFilter, FilterMatch};
use crate::router::note_activation::NoteActivationTable;

/// Runtime configuration for a router device, produced from its YAML schema
/// (see [`crate::config::device::Device::into_config`]).
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub hardware_id: String,
    pub name: String,
    pub input_port: Option<String>,
    pub input_enabled: bool,
    pub output_port: Option<String>,
    pub output_enabled: bool,
    pub device_types: Vec<DeviceTypeTag>,
    pub accepted_channel_mask: u16,
    pub accepted_note_range: (u8, u8),
    pub transpose: i8,
    pub send_beat_clock: bool,
    pub send_timecode: bool,
    pub zynthian_master_channel: Option<u8>,
    pub filter_zynthian_output_by_channel: bool,
    /// `channel_track_map[channel]`, -1 meaning "use input-filter decision or
    /// current track" (this engine also treats -2 the same way, per spec's
    /// "-2 is unspecified, observed behavior: route to current track").
    pub channel_track_map: [i16; 16],
}

impl DeviceConfig {
    pub fn has_type(&self, tag: DeviceTypeTag) -> bool {
        self.device_types.contains(&tag)
    }
}

/// A router device: a JACK MIDI input/output port pair plus the filters and
/// note-activation bookkeeping scoped to it.
pub struct RouterDevice {
    pub config: DeviceConfig,
    pub enabled: bool,
    input_filter: ArcSwap<EventFilter>,
    output_filter: ArcSwap<EventFilter>,
    note_activation: NoteActivationTable,
    input_events: Vec<MidiEvent>,
    cursor: usize,
    output_events: Vec<MidiEvent>,
}

impl RouterDevice {
    pub fn new(config: DeviceConfig) -> RouterDevice {
        RouterDevice {
            config,
            enabled: true,
            input_filter: ArcSwap::new(Arc::new(EventFilter::empty())),
            output_filter: ArcSwap::new(Arc::new(EventFilter::empty())),
            note_activation: NoteActivationTable::new(),
            input_events: Vec::new(),
            cursor: 0,
            output_events: Vec::new(),
        }
    }

    /// Publishes a new input filter, visible to the audio thread on its next
    /// read with acquire/release semantics via [`ArcSwap`].
    pub fn publish_input_filter(&self, filter: EventFilter) {
        self.input_filter.store(Arc::new(filter));
    }

    pub fn publish_output_filter(&self, filter: EventFilter) {
        self.output_filter.store(Arc::new(filter));
    }

    pub fn input_filter(&self) -> Arc<EventFilter> {
        self.input_filter.load_full()
    }

    /// Captures this cycle's input events and resets the output buffer.
    pub fn process_begin(&mut self, input_events: Vec<MidiEvent>) {
        self.input_events = input_events;
        self.cursor = 0;
        self.output_events.clear();
    }

    pub fn current_input_event(&self) -> Option<&MidiEvent> {
        self.input_events.get(self.cursor)
    }

    pub fn next_input_event(&mut self) {
        self.cursor += 1;
    }

    /// Applies this device's output filter and channel/note/transpose policy
    /// to `event`, then appends it to the output buffer. Returns `false` if
    /// the event was dropped (channel not accepted, note out of range).
    pub fn write_event_to_output(&mut self, event: MidiEvent, channel_override: Option<u8>) -> bool {
        if !self.output_enabled() {
            return false;
        }

        let mut event = match self.output_filter.load().apply(&event) {
            Some(FilterMatch { event, .. }) => event,
            None => event,
        };

        if let Some(channel) = channel_override {
            event.set_channel(channel);
        }

        if let Some(channel) = event.channel() {
            if self.config.accepted_channel_mask & (1 << channel) == 0 {
                return false;
            }
        }

        if event.is_note_on() || event.is_note_off() {
            if let Some(note) = event.data1() {
                let (lo, hi) = self.config.accepted_note_range;
                if note < lo || note > hi {
                    return false;
                }
                if self.config.transpose != 0 {
                    let transposed = (note as i16 + self.config.transpose as i16).clamp(0, 127);
                    event.set_note(transposed as u8);
                }
            }
        }

        self.output_events.push(event);
        true
    }

    fn output_enabled(&self) -> bool {
        self.enabled && self.config.output_enabled
    }

    /// Drains the events accumulated this cycle, in the order they were written.
    pub fn drain_output(&mut self) -> Vec<MidiEvent> {
        std::mem::take(&mut self.output_events)
    }

    /// Records a note-on and returns nothing (the track is already known);
    /// mirrors `setNoteActive` for the "on" half.
    pub fn note_on(&mut self, channel: u8, note: u8, track: i16) {
        self.note_activation.note_on(channel, note, track);
    }

    /// Records a note-off, returning the track its matching note-on targeted.
    /// Falls back to the device's channel map, then the caller-supplied
    /// current track, when the note was never activated on this device.
    pub fn note_off(&mut self, channel: u8, note: u8, current_track: i16) -> i16 {
        self.note_activation
            .note_off(channel, note)
            .unwrap_or_else(|| {
                let mapped = self.target_track_for_midi_channel(channel);
                if mapped >= 0 {
                    mapped
                } else {
                    current_track
                }
            })
    }

    /// Returns the configured track for this device's channel mapping
    /// (-1 meaning "use input-filter decision or current track").
    pub fn target_track_for_midi_channel(&self, channel: u8) -> i16 {
        if (channel as usize) < 16 {
            self.config.channel_track_map[channel as usize]
        } else {
            -1
        }
    }

    /// Every `(channel, note)` pair this device currently believes is
    /// sounding, used to synthesize an all-notes-off buffer on timer stop.
    pub fn active_notes(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.note_activation.active_notes()
    }

    /// Whether `(channel, note)` is currently recorded as active, i.e. has an
    /// unmatched note-on in the activation table.
    pub fn is_note_active(&self, channel: u8, note: u8) -> bool {
        self.note_activation.is_active(channel, note)
    }
}
