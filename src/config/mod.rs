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
//! Top-level configuration: a YAML file describing devices, tracks and
//! filters, layered with the recognized `ZYNTHIAN_*` environment overrides
//! (spec section 6).

pub mod device;
pub mod env;
pub mod error;
pub mod filter;
pub mod pattern;
pub mod track;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub use error::ConfigError;

use crate::router::device::DeviceConfig;
use crate::router::filter::EventFilter;
use crate::sequence::TrackConfig;

fn default_multiplier() -> u32 {
    128
}

fn default_bpm() -> f64 {
    120.0
}

/// Raw YAML shape of the whole configuration file.
#[derive(Debug, Deserialize)]
pub struct RawConfig {
    pub jack_client_name: String,
    #[serde(default = "default_multiplier")]
    pub multiplier: u32,
    #[serde(default = "default_bpm")]
    pub bpm: f64,
    #[serde(default)]
    pub pattern_directory: Option<String>,
    #[serde(default)]
    pub devices: Vec<device::Device>,
    #[serde(default)]
    pub tracks: Vec<track::Track>,
    #[serde(default)]
    pub filters: HashMap<String, filter::Filter>,
    /// Maps a device's `hardware_id` to the name of the filter applied to its input port.
    #[serde(default)]
    pub input_filter_assignments: HashMap<String, String>,
    #[serde(default)]
    pub output_filter_assignments: HashMap<String, String>,
}

/// Fully resolved, ready-to-run configuration: YAML plus environment
/// overrides folded in, YAML specs converted to their runtime types.
pub struct EngineConfig {
    pub jack_client_name: String,
    pub multiplier: u32,
    pub bpm: f64,
    pub pattern_directory: Option<PathBuf>,
    pub device_configs: Vec<DeviceConfig>,
    pub track_configs: Vec<TrackConfig>,
    pub input_filters: HashMap<String, EventFilter>,
    pub output_filters: HashMap<String, EventFilter>,
    pub env: env::EnvOverrides,
}

impl RawConfig {
    /// Loads and parses the YAML file at `path` via the `config` crate,
    /// layering in any `ZLROUTER__`-prefixed environment variables (this is
    /// separate from the `ZYNTHIAN_*` overrides applied in
    /// [`RawConfig::into_engine_config`]).
    pub fn load(path: &Path) -> Result<RawConfig, ConfigError> {
        let built = config::Config::builder()
            .add_source(config::File::from(path.to_path_buf()))
            .add_source(config::Environment::with_prefix("ZLROUTER").separator("__"))
            .build()?;
        Ok(built.try_deserialize()?)
    }

    pub fn into_engine_config(self) -> Result<EngineConfig, ConfigError> {
        let env = env::EnvOverrides::load();

        let mut filters_runtime = HashMap::with_capacity(self.filters.len());
        for (name, filter) in self.filters {
            filters_runtime.insert(name, filter.into_runtime()?);
        }

        let mut device_configs = Vec::with_capacity(self.devices.len());
        for device in self.devices {
            let hardware_id = device.hardware_id.clone();
            let input_enabled = device.input_enabled && !env.disabled_in.contains(&hardware_id);
            let output_enabled = device.output_enabled
                && (env.enabled_out.is_empty() || env.enabled_out.contains(&hardware_id));

            let mut config = device.into_config()?;
            config.input_enabled = input_enabled;
            config.output_enabled = output_enabled;
            if let Some(master) = env.master_channel {
                config.zynthian_master_channel.get_or_insert(master);
            }
            if env.filter_zynthian_output_by_channel == Some(true) {
                config.filter_zynthian_output_by_channel = true;
            }
            device_configs.push(config);
        }

        let mut track_configs = Vec::with_capacity(self.tracks.len());
        for track in self.tracks {
            track_configs.push(track.into_config()?);
        }

        let input_filters = self
            .input_filter_assignments
            .into_iter()
            .filter_map(|(hardware_id, filter_name)| {
                filters_runtime.get(&filter_name).cloned().map(|f| (hardware_id, f))
            })
            .collect();
        let output_filters = self
            .output_filter_assignments
            .into_iter()
            .filter_map(|(hardware_id, filter_name)| {
                filters_runtime.get(&filter_name).cloned().map(|f| (hardware_id, f))
            })
            .collect();

        Ok(EngineConfig {
            jack_client_name: self.jack_client_name,
            multiplier: self.multiplier,
            bpm: self.bpm,
            pattern_directory: self.pattern_directory.map(PathBuf::from),
            device_configs,
            track_configs,
            input_filters,
            output_filters,
            env,
        })
    }
}
