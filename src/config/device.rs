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
//! YAML schema for a router device (spec section 3, "Router Device") and its
//! conversion into the runtime [`crate::router::device::DeviceConfig`].

use serde::Deserialize;

use super::error::ConfigError;

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceTypeTag {
    Hardware,
    Controller,
    Sequencer,
    MasterTrack,
    TimeCodeGenerator,
}

/// Raw YAML shape of one router device entry.
#[derive(Debug, Deserialize)]
pub struct Device {
    /// Stable hardware id, derived from a JACK port alias or the `ttymidi:MIDI_`
    /// prefix when no alias is present; empty for the fixed internal devices.
    pub hardware_id: String,
    pub name: String,
    #[serde(default)]
    pub input_port: Option<String>,
    #[serde(default = "default_true")]
    pub input_enabled: bool,
    #[serde(default)]
    pub output_port: Option<String>,
    #[serde(default = "default_true")]
    pub output_enabled: bool,
    #[serde(default)]
    pub device_types: Vec<DeviceTypeTag>,
    /// 1-based MIDI channels this device accepts, e.g. `[1, 2, 16]`. Empty means "all".
    #[serde(default)]
    pub accepted_channels: Vec<u8>,
    /// Inclusive note range this device accepts for note-on/off; `None` means "all".
    #[serde(default)]
    pub accepted_note_range: Option<(u8, u8)>,
    #[serde(default)]
    pub transpose: i8,
    #[serde(default)]
    pub send_beat_clock: bool,
    #[serde(default)]
    pub send_timecode: bool,
    /// Zero-based master channel override for this device (falls back to the
    /// global `ZYNTHIAN_MIDI_MASTER_CHANNEL` when absent).
    #[serde(default)]
    pub zynthian_master_channel: Option<u8>,
    #[serde(default)]
    pub filter_zynthian_output_by_channel: bool,
    /// Sparse 1-based-channel -> sketchpad-track map; channels not present fall
    /// through to input-filter decision or the current track.
    #[serde(default)]
    pub channel_track_map: Vec<ChannelTrackEntry>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct ChannelTrackEntry {
    pub channel: u8,
    pub track: i16,
}

impl Device {
    pub fn into_config(self) -> Result<crate::router::device::DeviceConfig, ConfigError> {
        let mut accepted_channel_mask: u16 = if self.accepted_channels.is_empty() {
            0xFFFF
        } else {
            0
        };
        for channel in &self.accepted_channels {
            if *channel == 0 || *channel > 16 {
                return Err(ConfigError::InvalidValue {
                    field: "accepted_channels",
                    value: channel.to_string(),
                });
            }
            accepted_channel_mask |= 1 << (channel - 1);
        }

        let mut channel_track_map = [-1i16; 16];
        for entry in &self.channel_track_map {
            if entry.channel == 0 || entry.channel > 16 {
                return Err(ConfigError::InvalidValue {
                    field: "channel_track_map.channel",
                    value: entry.channel.to_string(),
                });
            }
            channel_track_map[(entry.channel - 1) as usize] = entry.track;
        }

        Ok(crate::router::device::DeviceConfig {
            hardware_id: self.hardware_id,
            name: self.name,
            input_port: self.input_port,
            input_enabled: self.input_enabled,
            output_port: self.output_port,
            output_enabled: self.output_enabled,
            device_types: self.device_types,
            accepted_channel_mask,
            accepted_note_range: self.accepted_note_range.unwrap_or((0, 127)),
            transpose: self.transpose,
            send_beat_clock: self.send_beat_clock,
            send_timecode: self.send_timecode,
            zynthian_master_channel: self.zynthian_master_channel,
            filter_zynthian_output_by_channel: self.filter_zynthian_output_by_channel,
            channel_track_map,
        })
    }
}
