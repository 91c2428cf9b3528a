//! Alarm playback through the default audio device

use crate::output::AlarmOutput;
use crate::AlarmError;
use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Plays a sound file once per `play()` call
///
/// Holds the audio stream, which is not `Send`; keep it on the thread that
/// created it.
pub struct RodioAlarm {
    _stream: OutputStream,
    handle: OutputStreamHandle,
    sink: Option<Sink>,
    sound: Arc<[u8]>,
    volume: f32,
    playing: bool,
}

impl RodioAlarm {
    /// Open the default output device and load the sound into memory
    pub fn open(sound_path: &Path, volume: f32) -> Result<Self, AlarmError> {
        let sound: Arc<[u8]> = std::fs::read(sound_path)?.into();
        // Fail now rather than on the first alarm
        Decoder::new(Cursor::new(sound.clone()))
            .map_err(|e| AlarmError::Sound(format!("{}: {}", sound_path.display(), e)))?;

        let (stream, handle) =
            OutputStream::try_default().map_err(|e| AlarmError::Device(e.to_string()))?;
        info!("Alarm sound loaded from {}", sound_path.display());

        Ok(Self {
            _stream: stream,
            handle,
            sink: None,
            sound,
            volume: volume.clamp(0.0, 1.0),
            playing: false,
        })
    }
}

impl AlarmOutput for RodioAlarm {
    fn play(&mut self) -> Result<(), AlarmError> {
        let source = Decoder::new(Cursor::new(self.sound.clone()))
            .map_err(|e| AlarmError::Sound(e.to_string()))?;
        let sink = Sink::try_new(&self.handle).map_err(|e| AlarmError::Device(e.to_string()))?;
        sink.set_volume(self.volume);
        sink.append(source);

        // replacing the old sink drops and silences it
        self.sink = Some(sink);
        self.playing = true;
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
        self.playing = false;
    }

    fn is_playing(&self) -> bool {
        self.playing
    }

    fn poll_finished(&mut self) -> bool {
        let ended = self.playing && self.sink.as_ref().map_or(true, Sink::empty);
        if ended {
            debug!("Alarm clip finished");
            self.playing = false;
            self.sink = None;
        }
        ended
    }
}
