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
use std::fmt;

/// Crate-wide result alias for control-thread operations. The audio thread never
/// returns a Result; it reports trouble through [`crate::telemetry`] counters instead.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Top-level error type for everything that happens off the audio thread: JACK
/// client setup, config loading, pattern (de)serialization.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::error::ConfigError),

    #[error("JACK error: {0}")]
    Jack(#[from] jack::Error),

    #[error("pattern I/O error: {0}")]
    PatternIo(#[from] std::io::Error),

    #[error("pattern JSON error: {0}")]
    PatternJson(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl From<&str> for EngineError {
    fn from(s: &str) -> Self {
        EngineError::Other(s.to_string())
    }
}

impl From<String> for EngineError {
    fn from(s: String) -> Self {
        EngineError::Other(s)
    }
}

/// A value record describing why an event was rejected on the hot path. Never
/// allocates; carried in telemetry counters, not as a `Result` return, since the
/// audio thread must always return control to JACK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    MalformedEvent,
    RingFull,
    PoolExhausted,
    ChannelRejected,
    NoteRejected,
    KeyScaleBlocked,
    NoTargetTrack,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DropReason::MalformedEvent => "malformed event",
            DropReason::RingFull => "ring buffer full",
            DropReason::PoolExhausted => "pool exhausted",
            DropReason::ChannelRejected => "channel not accepted",
            DropReason::NoteRejected => "note not accepted",
            DropReason::KeyScaleBlocked => "blocked by key/scale lock",
            DropReason::NoTargetTrack => "no target track",
        };
        f.write_str(s)
    }
}
