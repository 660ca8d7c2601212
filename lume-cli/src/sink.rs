//! Terminal-facing event sink and narrator.

use std::io::Write;

use log::{info, warn};
use lume_core::{EventSink, Narrator, PlaybackEvent};

use crate::CliError;

/// Writes each event as one JSON object per line.
///
/// [`EventSink::emit`] cannot fail, so the first write error is kept and
/// later events are dropped. [`JsonLinesSink::finish`] reports it.
#[derive(Debug)]
pub(crate) struct JsonLinesSink<W: Write> {
    writer: W,
    written: usize,
    error: Option<CliError>,
}

impl<W: Write> JsonLinesSink<W> {
    pub(crate) const fn new(writer: W) -> Self {
        Self {
            writer,
            written: 0,
            error: None,
        }
    }

    pub(crate) const fn written(&self) -> usize {
        self.written
    }

    /// Flush the writer and surface the first failure, if any.
    pub(crate) fn finish(&mut self) -> Result<(), CliError> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        self.writer.flush().map_err(CliError::Output)
    }

    fn write_event(&mut self, event: &PlaybackEvent) -> Result<(), CliError> {
        serde_json::to_writer(&mut self.writer, event).map_err(CliError::Serialize)?;
        self.writer.write_all(b"\n").map_err(CliError::Output)
    }
}

impl<W: Write> EventSink for JsonLinesSink<W> {
    fn emit(&mut self, event: PlaybackEvent) {
        if self.error.is_some() {
            return;
        }
        match self.write_event(&event) {
            Ok(()) => self.written += 1,
            Err(err) => {
                warn!("dropping playback events after output failure: {err}");
                self.error = Some(err);
            }
        }
    }
}

/// Speaks by logging at info level.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct LogNarrator;

impl Narrator for LogNarrator {
    fn say(&mut self, text: &str) {
        info!("narration: {text}");
    }
}
