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
//! YAML schema for a sketchpad track (spec section 3, "Sketchpad Track").

use serde::Deserialize;

use crate::keyscale::{KeyScaleLock, Pitch, Scale};
use crate::sequence::{Destination, TrackConfig};

use super::error::ConfigError;

#[derive(Debug, Deserialize)]
pub struct Track {
    /// Index of the router device this track writes its output channel to.
    pub device_index: usize,
    #[serde(default)]
    pub destination: DestinationSpec,
    /// -1 means "same as track index".
    #[serde(default = "default_external_channel")]
    pub external_channel: i8,
    /// 16-entry zynthian-channel mapping; -1 means unmapped.
    #[serde(default = "default_zynthian_map")]
    pub zynthian_channel_map: [i8; 16],
    #[serde(default)]
    pub key_scale_lock: KeyScaleLockSpec,
    #[serde(default = "default_pitch")]
    pub key: PitchSpec,
    #[serde(default)]
    pub octave: i8,
    #[serde(default)]
    pub scale: ScaleSpec,
}

fn default_external_channel() -> i8 {
    -1
}

fn default_zynthian_map() -> [i8; 16] {
    [-1; 16]
}

fn default_pitch() -> PitchSpec {
    PitchSpec::C
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationSpec {
    #[default]
    Zynthian,
    Sampler,
    External,
    None,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyScaleLockSpec {
    #[default]
    Off,
    Block,
    Rewrite,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PitchSpec {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScaleSpec {
    #[default]
    Chromatic,
    Ionian,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    Locrian,
    HarmonicMinor,
    MelodicMinor,
    HarmonicMajor,
    WholeTone,
    Blues,
    MajorPentatonic,
    MinorPentatonic,
    Hirajoshi,
    Hungarian,
    Gypsy,
}

impl Track {
    pub fn into_config(self) -> Result<TrackConfig, ConfigError> {
        for channel in &self.zynthian_channel_map {
            if *channel < -1 || *channel > 15 {
                return Err(ConfigError::InvalidValue {
                    field: "zynthian_channel_map",
                    value: channel.to_string(),
                });
            }
        }

        Ok(TrackConfig {
            device_index: self.device_index,
            destination: self.destination.into(),
            external_channel: self.external_channel,
            zynthian_channel_map: self.zynthian_channel_map,
            key_scale_lock: self.key_scale_lock.into(),
            key: self.key.into(),
            octave: self.octave,
            scale: self.scale.into(),
        })
    }
}

impl From<DestinationSpec> for Destination {
    fn from(value: DestinationSpec) -> Self {
        match value {
            DestinationSpec::Zynthian => Destination::Zynthian,
            DestinationSpec::Sampler => Destination::Sampler,
            DestinationSpec::External => Destination::External,
            DestinationSpec::None => Destination::None,
        }
    }
}

impl From<KeyScaleLockSpec> for KeyScaleLock {
    fn from(value: KeyScaleLockSpec) -> Self {
        match value {
            KeyScaleLockSpec::Off => KeyScaleLock::Off,
            KeyScaleLockSpec::Block => KeyScaleLock::Block,
            KeyScaleLockSpec::Rewrite => KeyScaleLock::Rewrite,
        }
    }
}

impl From<PitchSpec> for Pitch {
    fn from(value: PitchSpec) -> Self {
        match value {
            PitchSpec::C => Pitch::C,
            PitchSpec::CSharp => Pitch::CSharp,
            PitchSpec::D => Pitch::D,
            PitchSpec::DSharp => Pitch::DSharp,
            PitchSpec::E => Pitch::E,
            PitchSpec::F => Pitch::F,
            PitchSpec::FSharp => Pitch::FSharp,
            PitchSpec::G => Pitch::G,
            PitchSpec::GSharp => Pitch::GSharp,
            PitchSpec::A => Pitch::A,
            PitchSpec::ASharp => Pitch::ASharp,
            PitchSpec::B => Pitch::B,
        }
    }
}

impl From<ScaleSpec> for Scale {
    fn from(value: ScaleSpec) -> Self {
        match value {
            ScaleSpec::Chromatic => Scale::Chromatic,
            ScaleSpec::Ionian => Scale::Ionian,
            ScaleSpec::Dorian => Scale::Dorian,
            ScaleSpec::Phrygian => Scale::Phrygian,
            ScaleSpec::Lydian => Scale::Lydian,
            ScaleSpec::Mixolydian => Scale::Mixolydian,
            ScaleSpec::Aeolian => Scale::Aeolian,
            ScaleSpec::Locrian => Scale::Locrian,
            ScaleSpec::HarmonicMinor => Scale::HarmonicMinor,
            ScaleSpec::MelodicMinor => Scale::MelodicMinor,
            ScaleSpec::HarmonicMajor => Scale::HarmonicMajor,
            ScaleSpec::WholeTone => Scale::WholeTone,
            ScaleSpec::Blues => Scale::Blues,
            ScaleSpec::MajorPentatonic => Scale::MajorPentatonic,
            ScaleSpec::MinorPentatonic => Scale::MinorPentatonic,
            ScaleSpec::Hirajoshi => Scale::Hirajoshi,
            ScaleSpec::Hungarian => Scale::Hungarian,
            ScaleSpec::Gypsy => Scale::Gypsy,
        }
    }
}
