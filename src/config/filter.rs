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
//! YAML schema for an event filter (spec section 4.2) and its conversion into
//! the runtime [`crate::router::filter::EventFilter`].

use serde::Deserialize;

use crate::router::filter::{EventFilter, FilterEntry, Match, Rewriter};

use super::error::ConfigError;

#[derive(Debug, Deserialize)]
pub struct Filter {
    #[serde(default)]
    pub entries: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
pub struct Entry {
    #[serde(rename = "match")]
    pub match_rule: MatchRule,
    #[serde(default)]
    pub rewrites: Vec<RewriteRule>,
}

#[derive(Debug, Deserialize)]
pub struct MatchRule {
    /// Status nibble, e.g. 0x90 for note-on. `None` matches any status.
    #[serde(default)]
    pub status_nibble: Option<u8>,
    /// 1-based MIDI channels this rule matches; empty means "any channel".
    #[serde(default)]
    pub channels: Vec<u8>,
    #[serde(default)]
    pub data1_range: Option<(u8, u8)>,
    #[serde(default)]
    pub data2_range: Option<(u8, u8)>,
    /// Target track this entry resolves to when matched; -1/-2 mean "current
    /// track", -3 means "discard".
    pub target_track: i16,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RewriteRule {
    SetByte { which: u8, value: u8 },
    AddByte { which: u8, delta: i16 },
    SetChannel { value: u8 },
    SetTargetTrack { value: i16 },
}

impl Filter {
    pub fn into_runtime(self) -> Result<EventFilter, ConfigError> {
        let mut entries = Vec::with_capacity(self.entries.len());
        for entry in self.entries {
            let mut channel_mask: u16 = if entry.match_rule.channels.is_empty() {
                0xFFFF
            } else {
                0
            };
            for channel in &entry.match_rule.channels {
                if *channel == 0 || *channel > 16 {
                    return Err(ConfigError::InvalidValue {
                        field: "match.channels",
                        value: channel.to_string(),
                    });
                }
                channel_mask |= 1 << (channel - 1);
            }

            let rewriters = entry
                .rewrites
                .into_iter()
                .map(|r| match r {
                    RewriteRule::SetByte { which, value } => Rewriter::SetByte { which, value },
                    RewriteRule::AddByte { which, delta } => Rewriter::AddByte { which, delta },
                    RewriteRule::SetChannel { value } => Rewriter::SetChannel { value },
                    RewriteRule::SetTargetTrack { value } => Rewriter::SetTargetTrack { value },
                })
                .collect();

            entries.push(FilterEntry {
                rule: Match {
                    status_nibble: entry.match_rule.status_nibble,
                    channel_mask,
                    data1_range: entry.match_rule.data1_range,
                    data2_range: entry.match_rule.data2_range,
                },
                target_track: entry.match_rule.target_track,
                rewriters,
            });
        }

        Ok(EventFilter::new(entries))
    }
}
