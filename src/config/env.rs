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
//! Recognized `ZYNTHIAN_*` environment variables (spec section "Configuration
//! environment variables"). These augment, but do not replace, the YAML
//! configuration file; `EnvOverrides::load` is applied after the file is parsed.

use std::env;

#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    /// `ZYNTHIAN_MIDI_FILTER_OUTPUT`: forces per-zynthian-channel output filtering.
    pub filter_zynthian_output_by_channel: Option<bool>,
    /// `ZYNTHIAN_MIDI_PORTS` DISABLED_IN list: hardware-ids to disable on input.
    pub disabled_in: Vec<String>,
    /// `ZYNTHIAN_MIDI_PORTS` ENABLED_OUT list: hardware-ids to enable on output.
    pub enabled_out: Vec<String>,
    /// `ZYNTHIAN_MIDI_PORTS` ENABLED_FB list: hardware-ids to enable for feedback.
    pub enabled_fb: Vec<String>,
    /// `ZYNTHIAN_MIDI_MASTER_CHANNEL`: 1-based in the environment, stored zero-based.
    pub master_channel: Option<u8>,
}

impl EnvOverrides {
    /// Reads the recognized variables from the process environment. Missing
    /// variables leave the corresponding field at its default (`None`/empty).
    pub fn load() -> EnvOverrides {
        let mut overrides = EnvOverrides::default();

        if let Ok(val) = env::var("ZYNTHIAN_MIDI_FILTER_OUTPUT") {
            overrides.filter_zynthian_output_by_channel = Some(val.trim() == "1");
        }

        if let Ok(val) = env::var("ZYNTHIAN_MIDI_PORTS") {
            parse_midi_ports(&val, &mut overrides);
        }

        if let Ok(val) = env::var("ZYNTHIAN_MIDI_MASTER_CHANNEL") {
            if let Ok(raw) = val.trim().parse::<u8>() {
                if (1..=16).contains(&raw) {
                    overrides.master_channel = Some(raw - 1);
                }
            }
        }

        overrides
    }
}

/// Parses the `DISABLED_IN=...\nENABLED_OUT=...\nENABLED_FB=...` multi-line
/// format of `ZYNTHIAN_MIDI_PORTS` into the override lists.
fn parse_midi_ports(raw: &str, overrides: &mut EnvOverrides) {
    for line in raw.lines() {
        let Some((key, values)) = line.split_once('=') else {
            continue;
        };
        let ids: Vec<String> = values
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        match key.trim() {
            "DISABLED_IN" => overrides.disabled_in = ids,
            "ENABLED_OUT" => overrides.enabled_out = ids,
            "ENABLED_FB" => overrides.enabled_fb = ids,
            _ => {}
        }
    }
}
