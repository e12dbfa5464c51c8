// ==========================================
// AUDIO BACKEND
// ==========================================
// This module wraps rodio for the playback engine.
// It handles:
// - Connecting to the default audio output device
// - Loading a track file and starting it from any offset
// - Pause / resume / stop and volume
// - Tracking elapsed playback time ourselves (rodio's Sink does not)
// - Probing track length from the file headers
//
// The engine (engine.rs) decides WHAT to play; this only knows HOW.

use rodio::{Decoder, OutputStream, Sink, Source};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::PlaybackError;

pub const DEFAULT_VOLUME: u32 = 70;

// ==========================================
// PLAYER STATE ENUM
// ==========================================
// Stopped -> Playing -> {Paused <-> Playing} -> Stopped
//
// One enum instead of is_playing / paused booleans: the player can never
// be "playing and paused" at the same time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Stopped,
    Playing,
    Paused,
}

// ==========================================
// AUDIO PLAYER STRUCT
// ==========================================
// Fields explained:
//
// sink: Option<Sink>
//   - rodio's play/pause/volume handle
//   - None when there is no audio device (headless machines, CI); every
//     call then degrades to a no-op and loads fail with NoDevice
//
// state: PlayerState
//   - rodio doesn't expose state, so we track it
//
// volume: u32
//   - 0 (mute) to 100 (max); rodio wants 0.0-1.0
//
// duration: f64
//   - Length of the loaded track in seconds, 0.0 if unknown
//
// start_time / pause_time / total_paused_duration
//   - Elapsed time = now - start_time - time spent paused
//
// start_offset: f64
//   - Where in the file playback started (non-zero after a seek)
pub struct AudioPlayer {
    // The OutputStream is leaked on purpose so it lives for the whole
    // program; dropping it would silence the sink.
    sink: Option<Sink>,
    state: PlayerState,
    volume: u32,
    duration: f64,
    current_file: Option<PathBuf>,
    start_time: Option<Instant>,
    pause_time: Option<Instant>,
    total_paused_duration: Duration,
    start_offset: f64,
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        if let Some(sink) = &self.sink {
            sink.stop();
        }
        self.sink = None;
    }
}

impl AudioPlayer {
    // ==========================================
    // CONSTRUCTOR: new()
    // ==========================================
    // Opens the default output device. If there is none we still build a
    // player, just without a sink.
    pub fn new() -> Self {
        let sink = match OutputStream::try_default() {
            Ok((stream, handle)) => match Sink::try_new(&handle) {
                Ok(sink) => {
                    std::mem::forget(stream);
                    Some(sink)
                }
                Err(e) => {
                    warn!("Could not create audio sink: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("No audio output device: {}", e);
                None
            }
        };

        Self::with_sink(sink)
    }

    // A player with no output device; loads always fail.
    pub fn disconnected() -> Self {
        Self::with_sink(None)
    }

    // A player on rodio's idle sink, with a thread pulling samples at
    // roughly real-time speed in place of a sound card. The thread exits
    // once the sink is dropped.
    #[cfg(test)]
    pub(crate) fn idle() -> Self {
        let (sink, mut output) = Sink::new_idle();
        std::thread::spawn(move || loop {
            let per_tick = (output.sample_rate() as usize * output.channels() as usize) / 100;
            for _ in 0..per_tick.max(1) {
                if output.next().is_none() {
                    return;
                }
            }
            std::thread::sleep(Duration::from_millis(10));
        });
        Self::with_sink(Some(sink))
    }

    fn with_sink(sink: Option<Sink>) -> Self {
        let player = AudioPlayer {
            sink,
            state: PlayerState::Stopped,
            volume: DEFAULT_VOLUME,
            duration: 0.0,
            current_file: None,
            start_time: None,
            pause_time: None,
            total_paused_duration: Duration::from_secs(0),
            start_offset: 0.0,
        };
        player.apply_volume();
        player
    }

    pub fn has_device(&self) -> bool {
        self.sink.is_some()
    }

    // ==========================================
    // PLAYBACK CONTROL: play_from()
    // ==========================================
    // Loads `path` and starts it `offset` seconds in.
    //
    // rodio can't seek an already-playing source, so a seek is just this
    // call again with a new offset: decode from the top, skip ahead.
    //
    // On any failure the player ends up Stopped with nothing loaded.
    pub fn play_from(&mut self, path: &Path, offset: f64) -> Result<(), PlaybackError> {
        if self.sink.is_none() {
            self.reset_to_stopped();
            return Err(PlaybackError::NoDevice);
        }
        if let Some(sink) = &self.sink {
            sink.stop();
        }

        let decoder = match Self::decode_from_file(path) {
            Ok(decoder) => decoder,
            Err(e) => {
                self.reset_to_stopped();
                return Err(e);
            }
        };

        let length = probe_length(path)
            .or_else(|| decoder.total_duration().map(|d| d.as_secs_f64()))
            .unwrap_or(0.0);

        let offset = if length > 0.0 { offset.clamp(0.0, length) } else { offset.max(0.0) };

        // A corrupt stream can panic inside the decoder; keep it contained.
        let appended = match &self.sink {
            Some(sink) => std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                sink.append(decoder.skip_duration(Duration::from_secs_f64(offset)));
                sink.play();
            }))
            .is_ok(),
            None => false,
        };
        if !appended {
            self.reset_to_stopped();
            return Err(PlaybackError::BackendPanic(path.to_path_buf()));
        }

        debug!("Playing {:?} from {:.1}s (length {:.1}s)", path, offset, length);

        self.state = PlayerState::Playing;
        self.duration = length;
        self.current_file = Some(path.to_path_buf());
        self.start_time = Some(Instant::now());
        self.pause_time = None;
        self.total_paused_duration = Duration::from_secs(0);
        self.start_offset = offset;
        Ok(())
    }

    fn decode_from_file(path: &Path) -> Result<Decoder<BufReader<File>>, PlaybackError> {
        let file = File::open(path).map_err(|source| PlaybackError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Decoder::new(BufReader::new(file))?)
    }

    fn reset_to_stopped(&mut self) {
        self.state = PlayerState::Stopped;
        self.duration = 0.0;
        self.current_file = None;
        self.start_time = None;
        self.pause_time = None;
        self.total_paused_duration = Duration::from_secs(0);
        self.start_offset = 0.0;
    }

    // ==========================================
    // PLAYBACK CONTROL: pause() / resume()
    // ==========================================
    // Pausing remembers when we paused so the paused stretch can be taken
    // out of the elapsed time on resume.
    pub fn pause(&mut self) {
        if self.state != PlayerState::Playing {
            return;
        }
        if let Some(sink) = &self.sink {
            sink.pause();
        }
        self.pause_time = Some(Instant::now());
        self.state = PlayerState::Paused;
    }

    pub fn resume(&mut self) {
        if self.state != PlayerState::Paused {
            return;
        }
        if let Some(sink) = &self.sink {
            sink.play();
        }
        if let Some(pause_time) = self.pause_time.take() {
            self.total_paused_duration += Instant::now().duration_since(pause_time);
        }
        self.state = PlayerState::Playing;
    }

    // Stop and forget the loaded file.
    pub fn stop(&mut self) {
        if let Some(sink) = &self.sink {
            sink.stop();
        }
        self.reset_to_stopped();
    }

    // ==========================================
    // VOLUME CONTROL
    // ==========================================
    // Stored as 0-100 so get_volume() returns exactly what was set.
    pub fn get_volume(&self) -> u32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: u32) {
        self.volume = volume.min(100);
        self.apply_volume();
    }

    fn apply_volume(&self) {
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume as f32 / 100.0);
        }
    }

    // ==========================================
    // PLAYBACK INFO
    // ==========================================

    // Seconds into the file: start offset plus un-paused time since start.
    pub fn get_time_pos(&self) -> f64 {
        let Some(start) = self.start_time else {
            return 0.0;
        };
        let until = self.pause_time.unwrap_or_else(Instant::now);
        let played = until
            .duration_since(start)
            .saturating_sub(self.total_paused_duration);
        let position = self.start_offset + played.as_secs_f64();
        if self.duration > 0.0 {
            position.min(self.duration)
        } else {
            position
        }
    }

    pub fn get_duration(&self) -> f64 {
        self.duration
    }

    pub fn get_state(&self) -> PlayerState {
        self.state
    }

    pub fn current_file(&self) -> Option<&Path> {
        self.current_file.as_deref()
    }

    // True while the sink still has audio queued. A paused track counts as
    // busy; a stopped player never is.
    pub fn is_busy(&self) -> bool {
        match &self.sink {
            Some(sink) => self.state != PlayerState::Stopped && !sink.empty(),
            None => false,
        }
    }
}

impl Default for AudioPlayer {
    fn default() -> Self {
        Self::new()
    }
}

// ==========================================
// TRACK LENGTH PROBING
// ==========================================
// rodio's decoders usually can't report a total duration for mp3, so read
// it from the file: frame headers for mp3, the RIFF header for wav.
pub fn probe_length(path: &Path) -> Option<f64> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "mp3" => mp3_metadata::read_from_file(path)
            .ok()
            .map(|meta| meta.duration.as_secs_f64()),
        "wav" => {
            let reader = hound::WavReader::open(path).ok()?;
            let rate = reader.spec().sample_rate;
            if rate == 0 {
                return None;
            }
            Some(reader.duration() as f64 / rate as f64)
        }
        _ => None,
    }
}

// Silent 8 kHz mono wav of the given length.
#[cfg(test)]
pub(crate) fn write_silent_wav(path: &Path, millis: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("wav writer");
    for _ in 0..(8 * millis) {
        writer.write_sample(0i16).expect("sample");
    }
    writer.finalize().expect("finalize");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_wav(path: &Path, seconds: u32) {
        write_silent_wav(path, seconds * 1000);
    }

    #[test]
    fn wav_length_from_header() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("track_01.wav");
        write_wav(&path, 2);

        let length = probe_length(&path).expect("length");
        assert!((length - 2.0).abs() < 0.01);
    }

    #[test]
    fn unknown_or_missing_files_have_no_length() {
        assert_eq!(probe_length(Path::new("/nonexistent/track_01.mp3")), None);
        assert_eq!(probe_length(Path::new("cover.jpg")), None);
    }

    #[test]
    fn disconnected_player_fails_to_load() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("track_01.wav");
        write_wav(&path, 1);

        let mut player = AudioPlayer::disconnected();
        assert!(matches!(player.play_from(&path, 0.0), Err(PlaybackError::NoDevice)));
        assert_eq!(player.get_state(), PlayerState::Stopped);
        assert!(!player.is_busy());
        assert_eq!(player.get_time_pos(), 0.0);
    }

    #[test]
    fn idle_player_plays_to_the_end() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("track_01.wav");
        write_silent_wav(&path, 300);

        let mut player = AudioPlayer::idle();
        player.play_from(&path, 0.0).expect("play");
        assert_eq!(player.get_state(), PlayerState::Playing);
        assert!(player.is_busy());
        assert_eq!(player.current_file(), Some(path.as_path()));

        let deadline = Instant::now() + Duration::from_secs(3);
        while player.is_busy() && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert!(!player.is_busy());
    }

    #[test]
    fn volume_is_clamped() {
        let mut player = AudioPlayer::disconnected();
        assert_eq!(player.get_volume(), DEFAULT_VOLUME);
        player.set_volume(150);
        assert_eq!(player.get_volume(), 100);
        player.set_volume(0);
        assert_eq!(player.get_volume(), 0);
    }

    #[test]
    fn pause_and_resume_need_a_loaded_track() {
        let mut player = AudioPlayer::disconnected();
        player.pause();
        assert_eq!(player.get_state(), PlayerState::Stopped);
        player.resume();
        assert_eq!(player.get_state(), PlayerState::Stopped);
    }
}
