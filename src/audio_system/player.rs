//! Rodio output
//!
//! Real audio channels backed by rodio sinks. One output stream feeds any
//! number of channels; each channel is one sink.

use std::io::Cursor;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use super::channel::OutputChannel;
use super::library::ClipLibrary;
use super::source::Clip;
use crate::error::MusicError;

/// Open audio device. Must outlive every channel created from it.
pub struct RodioOutput {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    library: ClipLibrary,
}

impl RodioOutput {
    /// Open the default output device
    pub fn try_default(library: ClipLibrary) -> Result<Self, MusicError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| MusicError::StreamInitFailed(Box::new(e)))?;
        tracing::info!("Opened default audio output");
        Ok(Self {
            _stream: stream,
            stream_handle,
            library,
        })
    }

    /// Create `count` independent channels on this output
    pub fn channels(&self, count: usize) -> Result<Vec<Box<dyn OutputChannel>>, MusicError> {
        (0..count)
            .map(|index| {
                RodioChannel::new(index, self.stream_handle.clone(), self.library.clone())
                    .map(|channel| Box::new(channel) as Box<dyn OutputChannel>)
            })
            .collect()
    }

    pub fn library(&self) -> &ClipLibrary {
        &self.library
    }
}

/// One sink-backed voice
pub struct RodioChannel {
    index: usize,
    stream_handle: OutputStreamHandle,
    sink: Sink,
    library: ClipLibrary,
    volume: f32,
}

impl RodioChannel {
    fn new(
        index: usize,
        stream_handle: OutputStreamHandle,
        library: ClipLibrary,
    ) -> Result<Self, MusicError> {
        let sink =
            Sink::try_new(&stream_handle).map_err(|e| MusicError::StreamInitFailed(Box::new(e)))?;
        Ok(Self {
            index,
            stream_handle,
            sink,
            library,
            volume: 0.0,
        })
    }

    fn decode(&self, clip: &Clip) -> Result<Decoder<Cursor<Vec<u8>>>, MusicError> {
        let audio_data = self
            .library
            .get(clip)
            .ok_or_else(|| MusicError::ClipNotFound(clip.to_string()))?;
        // Decoder needs owned 'static data
        let cursor = Cursor::new((*audio_data).clone());
        Decoder::new(cursor).map_err(|e| MusicError::DecodeFailed(Box::new(e)))
    }

    /// Replace the sink so nothing queued survives a restart
    fn reset_sink(&mut self) {
        self.sink.stop();
        match Sink::try_new(&self.stream_handle) {
            Ok(sink) => self.sink = sink,
            Err(e) => tracing::warn!("Channel {}: could not recreate sink: {}", self.index, e),
        }
    }
}

impl OutputChannel for RodioChannel {
    fn play(&mut self, clip: &Clip, looping: bool) {
        self.reset_sink();

        let source = match self.decode(clip) {
            Ok(source) => source,
            Err(e) => {
                tracing::error!("Channel {}: cannot play {}: {}", self.index, clip, e);
                return;
            }
        };

        self.sink.set_volume(self.volume);
        if looping {
            self.sink.append(source.repeat_infinite());
        } else {
            self.sink.append(source);
        }
        self.sink.play();
        tracing::debug!("Channel {} playing {} (loop={})", self.index, clip, looping);
    }

    fn stop(&mut self) {
        if !self.sink.empty() {
            tracing::debug!("Stopping channel {}", self.index);
        }
        self.sink.stop();
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        self.sink.set_volume(self.volume);
    }

    fn is_playing(&self) -> bool {
        !self.sink.empty() && !self.sink.is_paused()
    }
}
