//! Live destination for a graph's samples.

use std::thread;
use std::time::Duration;

use log::{debug, error, warn};
use rodio::{OutputStream, OutputStreamBuilder, Sink};

use super::PlaybackError;
use crate::graph::GraphSource;

const OUTPUT_STREAM_OPEN_RETRIES: usize = 20;
const OUTPUT_STREAM_OPEN_RETRY_MS: u64 = 100;

/// Device side of the live graph. One source plays at a time; `start`
/// replaces whatever was playing.
pub trait AudioOutput {
    fn start(&mut self, source: GraphSource) -> Result<(), PlaybackError>;
    fn stop(&mut self);
}

/// Default system output through rodio. The device stream is opened on first
/// use and kept; each graph gets its own sink.
#[derive(Default)]
pub struct RodioOutput {
    stream: Option<OutputStream>,
    sink: Option<Sink>,
}

impl RodioOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_stream(&mut self) -> Result<&OutputStream, PlaybackError> {
        if self.stream.is_none() {
            self.stream = Some(open_default_stream()?);
        }
        self.stream
            .as_ref()
            .ok_or_else(|| PlaybackError::OutputUnavailable("no output stream".to_string()))
    }
}

impl AudioOutput for RodioOutput {
    fn start(&mut self, source: GraphSource) -> Result<(), PlaybackError> {
        self.stop();
        let sink = {
            let stream = self.ensure_stream()?;
            Sink::connect_new(stream.mixer())
        };
        sink.append(source);
        sink.play();
        self.sink = Some(sink);
        debug!("output sink started");
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
            debug!("output sink stopped");
        }
    }
}

fn open_default_stream() -> Result<OutputStream, PlaybackError> {
    let mut last_error = String::new();
    for attempt in 1..=OUTPUT_STREAM_OPEN_RETRIES {
        match OutputStreamBuilder::open_default_stream() {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                last_error = err.to_string();
                if attempt == OUTPUT_STREAM_OPEN_RETRIES {
                    break;
                }
                warn!(
                    "open_default_stream attempt {}/{} failed: {}",
                    attempt, OUTPUT_STREAM_OPEN_RETRIES, err
                );
                thread::sleep(Duration::from_millis(OUTPUT_STREAM_OPEN_RETRY_MS));
            }
        }
    }
    error!(
        "failed to open default output stream after {} attempts: {}",
        OUTPUT_STREAM_OPEN_RETRIES, last_error
    );
    Err(PlaybackError::OutputUnavailable(last_error))
}
