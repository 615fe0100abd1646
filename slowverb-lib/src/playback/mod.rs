//! Transport control over a live effect graph.

pub mod clock;
mod controller;
pub mod output;
pub mod ticker;

use std::fmt;

use crate::graph::GraphError;

pub use clock::{Clock, EngineClock};
pub use controller::PlaybackController;
pub use output::{AudioOutput, RodioOutput};
pub use ticker::{RepeatingTask, DEFAULT_SAMPLE_INTERVAL};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackStatus {
    Stopped,
    Playing,
    Paused,
}

impl fmt::Display for PlaybackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PlaybackStatus::Stopped => "stopped",
            PlaybackStatus::Playing => "playing",
            PlaybackStatus::Paused => "paused",
        };
        f.write_str(label)
    }
}

/// Snapshot of the transport for display.
///
/// Times are on the output timeline: a track slowed to 0.5x reports twice
/// its native duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackState {
    pub status: PlaybackStatus,
    pub position_seconds: f64,
    pub duration_seconds: f64,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            status: PlaybackStatus::Stopped,
            position_seconds: 0.0,
            duration_seconds: 0.0,
        }
    }
}

#[derive(Debug)]
pub enum PlaybackError {
    Graph(GraphError),
    OutputUnavailable(String),
}

impl fmt::Display for PlaybackError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Graph(err) => write!(f, "failed to start playback: {}", err),
            Self::OutputUnavailable(reason) => write!(f, "audio output unavailable: {}", reason),
        }
    }
}

impl std::error::Error for PlaybackError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Graph(err) => Some(err),
            Self::OutputUnavailable(_) => None,
        }
    }
}

impl From<GraphError> for PlaybackError {
    fn from(err: GraphError) -> Self {
        Self::Graph(err)
    }
}
