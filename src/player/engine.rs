// ==========================================
// PLAYBACK ENGINE
// ==========================================
// Sits between the UI and the audio backend:
// - resolves library ids to files under tracks/
// - plays single tracks or whole playlists
// - runs a background worker that advances the playlist when a track ends
// - runs a monitor that bumps the library play count once a track has
//   played for a second
// - tells PlayerObservers about track and play/pause changes
//
// Threads involved:
// - the caller (UI) thread
// - one playlist worker per play_playlist() call
// - one play-count monitor per started track
//
// Shared state lives behind `Arc<Inner>`. Lock order is always
// state -> audio, and neither is held while the library is locked or
// while observers run.
//
// Nothing here returns errors to the caller: failures are logged and the
// player falls back to Stopped.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::library::store::{find_audio_file, lock_library, SharedLibrary};
use crate::library::track::normalize_id;
use crate::player::audio::{AudioPlayer, PlayerState};
use crate::player::strategy::{PlaybackStrategy, StrategyKind};
use crate::playlist::PlaylistEntry;

pub const POLL_INTERVAL: Duration = Duration::from_millis(100);
pub const PLAY_COUNT_THRESHOLD: Duration = Duration::from_secs(1);
pub const NO_TRACK: &str = "No track playing";

pub trait PlayerObserver: Send + Sync {
    fn on_track_change(&self, track_info: &str);

    fn on_playback_state_change(&self, is_playing: bool);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerObserverId(u64);

// Everything the engine knows about "what is playing" beyond the backend.
struct PlaybackState {
    current_track: Option<String>,
    playlist: Vec<PlaylistEntry>,
    index: usize,
    // Position captured at the last pause or seek.
    position: f64,
    strategy_kind: StrategyKind,
    strategy: Box<dyn PlaybackStrategy>,
}

struct Inner {
    library: SharedLibrary,
    tracks_dir: PathBuf,
    audio: Mutex<AudioPlayer>,
    state: Mutex<PlaybackState>,
    observers: Mutex<Vec<(PlayerObserverId, Arc<dyn PlayerObserver>)>>,
    next_observer_id: AtomicU64,
    // Set while play_next / play_previous swap tracks so the worker
    // doesn't treat the swap as a natural track end.
    changing_track: AtomicBool,
    // Bumped to retire the running playlist worker.
    playlist_session: AtomicU64,
    // Bumped for every started track; retires the old play-count monitor.
    play_session: AtomicU64,
}

// How a wait on the current track ended.
#[derive(Debug, PartialEq, Eq)]
enum TrackEnd {
    Finished,
    Interrupted,
    Stopped,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// Cheap to clone: every clone drives the same engine.
#[derive(Clone)]
pub struct MusicPlayer {
    inner: Arc<Inner>,
}

impl MusicPlayer {
    pub fn new(library: SharedLibrary, tracks_dir: impl Into<PathBuf>) -> Self {
        Self::with_audio(library, tracks_dir, AudioPlayer::new())
    }

    pub fn with_audio(
        library: SharedLibrary,
        tracks_dir: impl Into<PathBuf>,
        audio: AudioPlayer,
    ) -> Self {
        if !audio.has_device() {
            warn!("No audio output device, tracks will not play");
        }
        let kind = StrategyKind::default();
        MusicPlayer {
            inner: Arc::new(Inner {
                library,
                tracks_dir: tracks_dir.into(),
                audio: Mutex::new(audio),
                state: Mutex::new(PlaybackState {
                    current_track: None,
                    playlist: Vec::new(),
                    index: 0,
                    position: 0.0,
                    strategy_kind: kind,
                    strategy: kind.build(),
                }),
                observers: Mutex::new(Vec::new()),
                next_observer_id: AtomicU64::new(0),
                changing_track: AtomicBool::new(false),
                playlist_session: AtomicU64::new(0),
                play_session: AtomicU64::new(0),
            }),
        }
    }

    // ==========================================
    // OBSERVERS
    // ==========================================

    pub fn add_observer(&self, observer: Arc<dyn PlayerObserver>) -> PlayerObserverId {
        let id = PlayerObserverId(self.inner.next_observer_id.fetch_add(1, Ordering::SeqCst));
        lock(&self.inner.observers).push((id, observer));
        id
    }

    pub fn remove_observer(&self, id: PlayerObserverId) {
        lock(&self.inner.observers).retain(|(existing, _)| *existing != id);
    }

    // Observers are cloned out first so none of them runs under a lock.
    fn notify_observers(&self, track_info: Option<&str>) {
        let observers: Vec<Arc<dyn PlayerObserver>> = lock(&self.inner.observers)
            .iter()
            .map(|(_, o)| Arc::clone(o))
            .collect();
        let is_playing = self.is_playing();

        for observer in observers {
            if let Some(info) = track_info {
                observer.on_track_change(info);
            }
            observer.on_playback_state_change(is_playing);
        }
    }

    fn announce_track(&self) {
        let info = self.current_track_info();
        self.notify_observers(Some(&info));
    }

    // ==========================================
    // SINGLE TRACKS
    // ==========================================

    // `tracks/track_<id>.mp3`, then `.wav`.
    pub fn track_path(&self, track_id: &str) -> Option<PathBuf> {
        find_audio_file(&self.inner.tracks_dir, track_id)
    }

    pub fn tracks_dir(&self) -> &Path {
        &self.inner.tracks_dir
    }

    // Loads and starts one track. False when there is no file or it will
    // not play; the player is then Stopped.
    pub fn play_single_track(&self, track_id: &str) -> bool {
        let id = normalize_id(track_id);
        let Some(path) = self.track_path(&id) else {
            warn!("No audio file for track {}", id);
            return false;
        };

        {
            let mut state = lock(&self.inner.state);
            let mut audio = lock(&self.inner.audio);
            if let Err(e) = audio.play_from(&path, 0.0) {
                error!("Error playing track {}: {}", id, e);
                state.position = 0.0;
                return false;
            }
            state.current_track = Some(id.clone());
            state.position = 0.0;
        }

        info!("Playing track {} from {:?}", id, path);
        self.start_play_count_monitor(id);
        true
    }

    // Plays one track on its own, ending any playlist session.
    pub fn play_track(&self, track_id: &str) -> bool {
        self.inner.playlist_session.fetch_add(1, Ordering::SeqCst);
        lock(&self.inner.state).playlist.clear();

        let started = self.play_single_track(track_id);
        if started {
            self.announce_track();
        } else {
            self.notify_observers(Some(NO_TRACK));
        }
        started
    }

    // ==========================================
    // PLAY COUNT MONITOR
    // ==========================================
    // Counts un-paused time for the track just started. After one second
    // the library play count goes up by one, at most once per started
    // track. A newer track or a stop retires it; a track that runs out
    // outside a playlist is stopped here.
    fn start_play_count_monitor(&self, track_id: String) {
        let session = self.inner.play_session.fetch_add(1, Ordering::SeqCst) + 1;
        let player = self.clone();

        let spawned = thread::Builder::new()
            .name("play-count-monitor".into())
            .spawn(move || player.monitor_play_count(session, track_id));
        if let Err(e) = spawned {
            error!("Could not start play count monitor: {}", e);
        }
    }

    fn monitor_play_count(&self, session: u64, track_id: String) {
        let mut played = Duration::ZERO;
        let mut counted = false;
        let mut last_check = Instant::now();

        loop {
            if self.inner.play_session.load(Ordering::SeqCst) != session {
                return;
            }

            let (state, busy) = {
                let audio = lock(&self.inner.audio);
                (audio.get_state(), audio.is_busy())
            };

            let now = Instant::now();
            match state {
                PlayerState::Stopped => return,
                PlayerState::Paused => {}
                PlayerState::Playing => {
                    if !busy {
                        self.finish_single_track(session);
                        return;
                    }
                    if !counted {
                        played += now.duration_since(last_check);
                        if played >= PLAY_COUNT_THRESHOLD {
                            lock_library(&self.inner.library).increment_play_count(&track_id);
                            counted = true;
                        }
                    }
                }
            }
            last_check = now;
            thread::sleep(POLL_INTERVAL);
        }
    }

    // The playlist worker owns track ends while a playlist is active.
    // Otherwise nothing follows, so the player goes back to Stopped.
    fn finish_single_track(&self, session: u64) {
        let finished = {
            let mut state = lock(&self.inner.state);
            let mut audio = lock(&self.inner.audio);
            let finished = self.inner.play_session.load(Ordering::SeqCst) == session
                && state.playlist.is_empty()
                && audio.get_state() == PlayerState::Playing
                && !audio.is_busy();
            if finished {
                audio.stop();
                state.current_track = None;
                state.position = 0.0;
            }
            finished
        };

        if finished {
            debug!("Track finished, player stopped");
            self.notify_observers(Some(NO_TRACK));
        }
    }

    // ==========================================
    // PLAYLISTS
    // ==========================================

    // Starts the playlist at the strategy's initial index on a fresh
    // worker. Any previous worker retires on its next poll.
    pub fn play_playlist(&self, playlist: &[PlaylistEntry]) {
        if playlist.is_empty() {
            return;
        }

        let session = self.inner.playlist_session.fetch_add(1, Ordering::SeqCst) + 1;
        {
            let mut state = lock(&self.inner.state);
            state.playlist = playlist.to_vec();
            let index = state.strategy.initial_index(&state.playlist);
            state.index = index;
            state.position = 0.0;
            lock(&self.inner.audio).stop();
        }
        self.inner.changing_track.store(false, Ordering::SeqCst);

        info!("Starting playlist of {} tracks", playlist.len());

        let player = self.clone();
        let spawned = thread::Builder::new()
            .name("playlist-worker".into())
            .spawn(move || player.playlist_worker(session));
        if let Err(e) = spawned {
            error!("Could not start playlist worker: {}", e);
        }
    }

    fn session_live(&self, session: u64) -> bool {
        self.inner.playlist_session.load(Ordering::SeqCst) == session
    }

    // Worker loop:
    // 1. play the entry at the current index
    // 2. poll every 100ms until it ends, is swapped, or the session ends
    // 3. on a natural end, move to the strategy's next index
    fn playlist_worker(&self, session: u64) {
        let mut needs_load = true;
        let mut failures = 0usize;

        while self.session_live(session) {
            if self.inner.changing_track.load(Ordering::SeqCst) {
                thread::sleep(POLL_INTERVAL);
                continue;
            }

            if needs_load {
                let next = {
                    let state = lock(&self.inner.state);
                    state
                        .playlist
                        .get(state.index)
                        .map(|entry| (entry.track_id.clone(), state.playlist.len()))
                };
                let Some((track_id, len)) = next else {
                    break;
                };

                if !self.play_single_track(&track_id) {
                    failures += 1;
                    if failures >= len {
                        warn!("No track in the playlist could be played, stopping");
                        if self.session_live(session) {
                            self.stop();
                        }
                        break;
                    }
                    self.advance(session);
                    thread::sleep(POLL_INTERVAL);
                    continue;
                }
                failures = 0;
                self.announce_track();
            }

            needs_load = true;
            match self.wait_for_track_end(session) {
                TrackEnd::Finished => {
                    // An explicit next/previous that raced the natural end
                    // already loaded its own track.
                    if !self.advance(session) {
                        needs_load = false;
                    }
                }
                TrackEnd::Interrupted => needs_load = false,
                TrackEnd::Stopped => break,
            }
        }

        debug!("Playlist worker {} exiting", session);
    }

    fn wait_for_track_end(&self, session: u64) -> TrackEnd {
        loop {
            if !self.session_live(session) {
                return TrackEnd::Stopped;
            }
            if self.inner.changing_track.load(Ordering::SeqCst) {
                return TrackEnd::Interrupted;
            }

            let (state, busy) = {
                let audio = lock(&self.inner.audio);
                (audio.get_state(), audio.is_busy())
            };
            if state != PlayerState::Paused && !busy {
                return TrackEnd::Finished;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    // Moves to the strategy's next index. False when a track change is in
    // flight, in which case the index belongs to that request.
    fn advance(&self, session: u64) -> bool {
        let mut state = lock(&self.inner.state);
        if self.inner.changing_track.load(Ordering::SeqCst) || !self.session_live(session) {
            return false;
        }
        if !state.playlist.is_empty() {
            let next = state.strategy.next_index(&state.playlist, state.index);
            state.index = next;
        }
        state.position = 0.0;
        true
    }

    // ==========================================
    // NEXT / PREVIOUS
    // ==========================================

    pub fn play_next(&self) {
        self.change_track(|state| state.strategy.next_index(&state.playlist, state.index));
    }

    pub fn play_previous(&self) {
        self.change_track(|state| {
            if state.index > 0 {
                state.index - 1
            } else {
                state.playlist.len() - 1
            }
        });
    }

    // Shared body of next/previous. A second request while one is in
    // flight is dropped.
    fn change_track(&self, pick: impl FnOnce(&PlaybackState) -> usize) {
        if lock(&self.inner.state).playlist.is_empty() {
            return;
        }
        if self
            .inner
            .changing_track
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        let track_id = {
            let mut state = lock(&self.inner.state);
            if state.playlist.is_empty() {
                None
            } else {
                let index = pick(&*state).min(state.playlist.len() - 1);
                state.index = index;
                state.position = 0.0;
                Some(state.playlist[index].track_id.clone())
            }
        };

        if let Some(track_id) = track_id {
            if self.play_single_track(&track_id) {
                self.announce_track();
            } else {
                self.stop();
            }
        }

        self.inner.changing_track.store(false, Ordering::SeqCst);
    }

    // ==========================================
    // TRANSPORT
    // ==========================================

    pub fn pause(&self) {
        let paused = {
            let mut state = lock(&self.inner.state);
            let mut audio = lock(&self.inner.audio);
            if audio.get_state() == PlayerState::Playing {
                audio.pause();
                state.position = audio.get_time_pos();
                true
            } else {
                false
            }
        };
        if paused {
            self.notify_observers(None);
        }
    }

    pub fn unpause(&self) {
        let resumed = {
            let mut audio = lock(&self.inner.audio);
            if audio.get_state() == PlayerState::Paused {
                audio.resume();
                true
            } else {
                false
            }
        };
        if resumed {
            self.notify_observers(None);
        }
    }

    pub fn toggle_playback(&self) {
        match self.state() {
            PlayerState::Playing => self.pause(),
            PlayerState::Paused => self.unpause(),
            PlayerState::Stopped => {}
        }
    }

    // Ends playlist and play-count sessions and clears the playlist.
    pub fn stop(&self) {
        self.inner.playlist_session.fetch_add(1, Ordering::SeqCst);
        self.inner.play_session.fetch_add(1, Ordering::SeqCst);
        {
            let mut state = lock(&self.inner.state);
            lock(&self.inner.audio).stop();
            state.playlist.clear();
            state.index = 0;
            state.position = 0.0;
            state.current_track = None;
        }
        self.notify_observers(Some(NO_TRACK));
    }

    // Restarts the current file at `position` seconds. A paused track stays
    // paused at the new spot.
    pub fn seek(&self, position: f64) {
        let mut state = lock(&self.inner.state);
        let mut audio = lock(&self.inner.audio);

        let was_paused = match audio.get_state() {
            PlayerState::Stopped => return,
            PlayerState::Paused => true,
            PlayerState::Playing => false,
        };
        let Some(path) = audio.current_file().map(Path::to_path_buf) else {
            return;
        };

        match audio.play_from(&path, position) {
            Ok(()) => {
                if was_paused {
                    audio.pause();
                }
                state.position = audio.get_time_pos();
            }
            Err(e) => {
                error!("Error seeking in {:?}: {}", path, e);
                state.position = 0.0;
            }
        }
    }

    pub fn seek_relative(&self, seconds: f64) {
        let target = self.position() + seconds;
        self.seek(target.max(0.0));
    }

    pub fn set_volume(&self, volume: u32) {
        lock(&self.inner.audio).set_volume(volume);
    }

    // Swaps the strategy; an active playlist restarts under the new one.
    pub fn set_strategy(&self, kind: StrategyKind) {
        let restart = {
            let mut state = lock(&self.inner.state);
            state.strategy_kind = kind;
            state.strategy = kind.build();
            let active = !state.playlist.is_empty()
                && lock(&self.inner.audio).get_state() != PlayerState::Stopped;
            active.then(|| state.playlist.clone())
        };

        info!("Playback strategy set to {}", kind.label());
        if let Some(playlist) = restart {
            self.play_playlist(&playlist);
        }
    }

    // ==========================================
    // INFO
    // ==========================================

    pub fn state(&self) -> PlayerState {
        lock(&self.inner.audio).get_state()
    }

    pub fn is_playing(&self) -> bool {
        self.state() == PlayerState::Playing
    }

    pub fn current_track(&self) -> Option<String> {
        lock(&self.inner.state).current_track.clone()
    }

    pub fn position(&self) -> f64 {
        lock(&self.inner.audio).get_time_pos()
    }

    pub fn track_length(&self) -> f64 {
        lock(&self.inner.audio).get_duration()
    }

    pub fn volume(&self) -> u32 {
        lock(&self.inner.audio).get_volume()
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        lock(&self.inner.state).strategy_kind
    }

    pub fn playlist(&self) -> Vec<PlaylistEntry> {
        lock(&self.inner.state).playlist.clone()
    }

    pub fn current_index(&self) -> Option<usize> {
        let state = lock(&self.inner.state);
        (!state.playlist.is_empty()).then_some(state.index)
    }

    // "Now Playing: Name - Artist", or the playlist entry name when the
    // library no longer knows the id.
    pub fn current_track_info(&self) -> String {
        let (current, playlist) = {
            let state = lock(&self.inner.state);
            (state.current_track.clone(), state.playlist.clone())
        };
        let library = lock_library(&self.inner.library);
        describe_track(
            current.as_deref(),
            |id| library.get_name(id).zip(library.get_artist(id)),
            &playlist,
        )
    }
}

fn describe_track(
    current: Option<&str>,
    lookup: impl Fn(&str) -> Option<(String, String)>,
    playlist: &[PlaylistEntry],
) -> String {
    let Some(id) = current else {
        return NO_TRACK.to_string();
    };
    if let Some((name, artist)) = lookup(id) {
        return format!("Now Playing: {} - {}", name, artist);
    }
    playlist
        .iter()
        .find(|entry| entry.track_id == id)
        .map(|entry| format!("Now Playing: {}", entry.name))
        .unwrap_or_else(|| NO_TRACK.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Library;
    use crate::player::audio::write_silent_wav;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (MusicPlayer, SharedLibrary, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        let tracks_dir = temp.path().join("tracks");
        fs::create_dir_all(&tracks_dir).expect("tracks dir");
        let library = Library::open(temp.path().join("tracks.csv"), &tracks_dir).shared();
        let player = MusicPlayer::with_audio(library.clone(), &tracks_dir, AudioPlayer::disconnected());
        (player, library, temp)
    }

    #[derive(Default)]
    struct RecordingObserver {
        infos: Mutex<Vec<String>>,
        states: Mutex<Vec<bool>>,
    }

    impl PlayerObserver for RecordingObserver {
        fn on_track_change(&self, track_info: &str) {
            lock(&self.infos).push(track_info.to_string());
        }

        fn on_playback_state_change(&self, is_playing: bool) {
            lock(&self.states).push(is_playing);
        }
    }

    fn entries(ids: &[&str]) -> Vec<PlaylistEntry> {
        ids.iter()
            .map(|id| PlaylistEntry::new(*id, format!("Track {}", id)))
            .collect()
    }

    #[test]
    fn track_path_prefers_mp3() {
        let (player, _library, _temp) = setup();
        let dir = player.tracks_dir().to_path_buf();
        assert_eq!(player.track_path("01"), None);

        fs::write(dir.join("track_01.wav"), b"wav").expect("wav");
        assert_eq!(player.track_path("1"), Some(dir.join("track_01.wav")));

        fs::write(dir.join("track_01.mp3"), b"mp3").expect("mp3");
        assert_eq!(player.track_path("01"), Some(dir.join("track_01.mp3")));
    }

    #[test]
    fn missing_file_does_not_play() {
        let (player, _library, _temp) = setup();
        assert!(!player.play_single_track("05"));
        assert_eq!(player.state(), PlayerState::Stopped);
        assert_eq!(player.current_track(), None);
    }

    #[test]
    fn unplayable_file_leaves_player_stopped() {
        let (player, _library, _temp) = setup();
        fs::write(player.tracks_dir().join("track_02.mp3"), b"not audio").expect("file");

        assert!(!player.play_single_track("02"));
        assert_eq!(player.state(), PlayerState::Stopped);
    }

    #[test]
    fn empty_playlist_is_ignored() {
        let (player, _library, _temp) = setup();
        player.play_playlist(&[]);
        assert!(player.playlist().is_empty());
        assert_eq!(player.current_index(), None);
    }

    #[test]
    fn playlist_of_unplayable_tracks_stops_itself() {
        let (player, _library, _temp) = setup();
        let observer = Arc::new(RecordingObserver::default());
        player.add_observer(observer.clone());

        player.play_playlist(&entries(&["01", "02"]));

        let deadline = Instant::now() + Duration::from_secs(3);
        while !player.playlist().is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(20));
        }

        assert!(player.playlist().is_empty());
        assert_eq!(player.state(), PlayerState::Stopped);
        assert_eq!(lock(&observer.infos).last().map(String::as_str), Some(NO_TRACK));
    }

    #[test]
    fn next_and_previous_without_playlist_do_nothing() {
        let (player, _library, _temp) = setup();
        player.play_next();
        player.play_previous();
        assert_eq!(player.state(), PlayerState::Stopped);
        assert_eq!(player.current_track(), None);
    }

    #[test]
    fn stop_notifies_no_track() {
        let (player, _library, _temp) = setup();
        let observer = Arc::new(RecordingObserver::default());
        let id = player.add_observer(observer.clone());

        player.stop();
        assert_eq!(*lock(&observer.infos), vec![NO_TRACK.to_string()]);
        assert_eq!(*lock(&observer.states), vec![false]);

        player.remove_observer(id);
        player.stop();
        assert_eq!(lock(&observer.infos).len(), 1);
    }

    #[test]
    fn strategy_and_volume_settings() {
        let (player, _library, _temp) = setup();
        assert_eq!(player.strategy_kind(), StrategyKind::Sequential);
        player.set_strategy(StrategyKind::Random);
        assert_eq!(player.strategy_kind(), StrategyKind::Random);

        player.set_volume(35);
        assert_eq!(player.volume(), 35);
    }

    #[test]
    fn pause_and_seek_are_noops_when_stopped() {
        let (player, _library, _temp) = setup();
        player.pause();
        player.unpause();
        player.toggle_playback();
        player.seek(30.0);
        assert_eq!(player.state(), PlayerState::Stopped);
        assert_eq!(player.position(), 0.0);
    }

    // Player on an idle sink, with a silent wav per (id, millis) that the
    // library also knows about.
    fn setup_playing(tracks: &[(&str, u32)]) -> (MusicPlayer, SharedLibrary, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        let tracks_dir = temp.path().join("tracks");
        fs::create_dir_all(&tracks_dir).expect("tracks dir");
        let library = Library::open(temp.path().join("tracks.csv"), &tracks_dir).shared();
        for (id, millis) in tracks {
            write_silent_wav(&tracks_dir.join(format!("track_{}.wav", id)), *millis);
            lock_library(&library).add_track(id, &format!("Track {}", id), "Artist", 0, 0);
        }
        let player = MusicPlayer::with_audio(library.clone(), &tracks_dir, AudioPlayer::idle());
        (player, library, temp)
    }

    fn wait_until(limit: Duration, mut done: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + limit;
        while Instant::now() < deadline {
            if done() {
                return true;
            }
            thread::sleep(Duration::from_millis(20));
        }
        done()
    }

    fn play_count(library: &SharedLibrary, id: &str) -> Option<u32> {
        lock_library(library).get_play_count(id)
    }

    #[test]
    fn sequential_playlist_advances_when_a_track_ends() {
        let (player, _library, _temp) = setup_playing(&[("01", 300), ("02", 300)]);
        let observer = Arc::new(RecordingObserver::default());
        player.add_observer(observer.clone());

        player.play_playlist(&entries(&["01", "02"]));

        assert!(wait_until(Duration::from_secs(3), || {
            player.current_track().as_deref() == Some("02")
        }));
        assert_eq!(player.current_index(), Some(1));
        assert!(lock(&observer.infos).contains(&"Now Playing: Track 01 - Artist".to_string()));
        assert!(lock(&observer.infos).contains(&"Now Playing: Track 02 - Artist".to_string()));

        player.stop();
    }

    #[test]
    fn next_during_playback_moves_exactly_once() {
        let (player, _library, _temp) =
            setup_playing(&[("01", 3000), ("02", 3000), ("03", 3000)]);
        player.play_playlist(&entries(&["01", "02", "03"]));
        assert!(wait_until(Duration::from_secs(2), || {
            player.is_playing() && player.current_track().as_deref() == Some("01")
        }));

        player.play_next();
        assert_eq!(player.current_track().as_deref(), Some("02"));
        assert_eq!(player.current_index(), Some(1));

        // Give the worker several polls to misread the swap as a track end.
        thread::sleep(Duration::from_millis(400));
        assert_eq!(player.current_index(), Some(1));
        assert_eq!(player.current_track().as_deref(), Some("02"));
        assert!(player.is_playing());

        player.stop();
    }

    #[test]
    fn track_changes_in_flight_block_other_moves() {
        let (player, _library, _temp) = setup_playing(&[("01", 3000), ("02", 3000)]);
        player.play_playlist(&entries(&["01", "02"]));
        assert!(wait_until(Duration::from_secs(2), || player.is_playing()));
        let session = player.inner.playlist_session.load(Ordering::SeqCst);

        player.inner.changing_track.store(true, Ordering::SeqCst);
        player.play_next();
        player.play_previous();
        assert!(!player.advance(session));
        assert_eq!(player.current_index(), Some(0));
        assert_eq!(player.current_track().as_deref(), Some("01"));

        player.inner.changing_track.store(false, Ordering::SeqCst);
        assert!(player.advance(session));
        assert_eq!(player.current_index(), Some(1));

        player.stop();
    }

    #[test]
    fn play_count_goes_up_once_after_a_second() {
        let (player, library, _temp) = setup_playing(&[("01", 3000)]);
        assert!(player.play_track("01"));

        thread::sleep(Duration::from_millis(300));
        assert_eq!(play_count(&library, "01"), Some(0));

        assert!(wait_until(Duration::from_secs(2), || play_count(&library, "01") == Some(1)));
        thread::sleep(Duration::from_millis(500));
        assert_eq!(play_count(&library, "01"), Some(1));

        player.stop();
    }

    #[test]
    fn paused_time_does_not_count_as_played() {
        let (player, library, _temp) = setup_playing(&[("01", 3000)]);
        assert!(player.play_track("01"));
        player.pause();
        assert_eq!(player.state(), PlayerState::Paused);

        thread::sleep(Duration::from_millis(1500));
        assert_eq!(play_count(&library, "01"), Some(0));

        player.unpause();
        assert!(wait_until(Duration::from_secs(2), || play_count(&library, "01") == Some(1)));

        player.stop();
    }

    #[test]
    fn single_track_returns_to_stopped_when_it_ends() {
        let (player, _library, _temp) = setup_playing(&[("01", 300)]);
        let observer = Arc::new(RecordingObserver::default());
        player.add_observer(observer.clone());

        assert!(player.play_track("01"));
        assert!(player.is_playing());

        assert!(wait_until(Duration::from_secs(3), || player.state() == PlayerState::Stopped));
        assert_eq!(player.current_track(), None);
        assert_eq!(lock(&observer.infos).last().map(String::as_str), Some(NO_TRACK));
    }

    #[test]
    fn track_info_prefers_library_then_playlist() {
        let playlist = entries(&["01", "02"]);
        let lookup = |id: &str| {
            (id == "01").then(|| ("Song".to_string(), "Band".to_string()))
        };

        assert_eq!(describe_track(None, lookup, &playlist), NO_TRACK);
        assert_eq!(describe_track(Some("01"), lookup, &playlist), "Now Playing: Song - Band");
        assert_eq!(describe_track(Some("02"), lookup, &playlist), "Now Playing: Track 02");
        assert_eq!(describe_track(Some("09"), lookup, &playlist), NO_TRACK);
    }

    #[test]
    fn current_track_info_reads_library() {
        let (player, library, _temp) = setup();
        lock_library(&library).add_track("01", "Song", "Band", 0, 0);
        assert_eq!(player.current_track_info(), NO_TRACK);
    }
}
