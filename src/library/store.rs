// ==========================================
// LIBRARY STORE
// ==========================================
// In-memory map of track id -> Track, backed by the library CSV.
//
// Every mutation:
// 1. updates the map
// 2. rewrites the CSV in full (see persist.rs)
// 3. synchronously notifies every registered LibraryObserver
//
// Reads never fail: unknown ids come back as None.
//
// The store is shared between the UI, the playback engine (play counts),
// the downloader and the file watcher as `SharedLibrary`. Observers are
// called while the caller holds that lock, so an observer must never try
// to lock the library itself.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::SystemTime;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::LibraryError;
use crate::library::persist;
use crate::library::track::{id_number, normalize_id, Track, MAX_RATING};

pub const AUDIO_EXTENSIONS: [&str; 2] = ["mp3", "wav"];

pub trait LibraryObserver: Send + Sync {
    fn on_library_change(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u64);

pub type ObserverList = Vec<(ObserverId, Arc<dyn LibraryObserver>)>;

pub type SharedLibrary = Arc<Mutex<Library>>;

// Locks the shared library, recovering the data if a holder panicked.
pub fn lock_library(library: &SharedLibrary) -> MutexGuard<'_, Library> {
    library.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Name,
    Artist,
    Both,
}

impl SearchField {
    pub fn label(self) -> &'static str {
        match self {
            SearchField::Name => "Track Name",
            SearchField::Artist => "Artist",
            SearchField::Both => "Both",
        }
    }

    pub fn next(self) -> SearchField {
        match self {
            SearchField::Name => SearchField::Artist,
            SearchField::Artist => SearchField::Both,
            SearchField::Both => SearchField::Name,
        }
    }
}

// `tracks/track_<id>.mp3`, falling back to `.wav`.
pub fn find_audio_file(tracks_dir: &Path, track_id: &str) -> Option<PathBuf> {
    let id = normalize_id(track_id);
    AUDIO_EXTENSIONS
        .iter()
        .map(|ext| tracks_dir.join(format!("track_{}.{}", id, ext)))
        .find(|path| path.is_file())
}

pub struct Library {
    library_file: PathBuf,
    tracks_dir: PathBuf,
    tracks: BTreeMap<String, Track>,
    observers: ObserverList,
    next_observer_id: u64,
    last_modified: Option<SystemTime>,
}

impl Library {
    // Loads (or creates) the library file. Never fails: I/O problems are
    // logged and leave an empty library.
    pub fn open(library_file: impl Into<PathBuf>, tracks_dir: impl Into<PathBuf>) -> Self {
        let mut library = Library {
            library_file: library_file.into(),
            tracks_dir: tracks_dir.into(),
            tracks: BTreeMap::new(),
            observers: Vec::new(),
            next_observer_id: 0,
            last_modified: None,
        };
        library.load_from_disk();
        info!(
            "Loaded {} tracks from {:?}",
            library.tracks.len(),
            library.library_file
        );
        library
    }

    pub fn from_config(config: &Config) -> Self {
        Library::open(config.library_file(), config.tracks_dir())
    }

    pub fn shared(self) -> SharedLibrary {
        Arc::new(Mutex::new(self))
    }

    pub fn library_file(&self) -> &Path {
        &self.library_file
    }

    pub fn tracks_dir(&self) -> &Path {
        &self.tracks_dir
    }

    // ==========================================
    // MUTATIONS
    // ==========================================

    // Fails on a duplicate id or a rating above 5.
    pub fn add_track(
        &mut self,
        track_id: &str,
        name: &str,
        artist: &str,
        rating: u8,
        play_count: u32,
    ) -> bool {
        match self.try_add(track_id, name, artist, rating, play_count, None) {
            Ok(id) => {
                info!("Added track {}: {} - {}", id, name, artist);
                true
            }
            Err(e) => {
                warn!("Error adding track: {}", e);
                false
            }
        }
    }

    // Same as add_track, also copying an .mp3/.wav file into the tracks
    // directory as `track_<id>.<ext>`.
    pub fn add_track_with_audio(
        &mut self,
        track_id: &str,
        name: &str,
        artist: &str,
        rating: u8,
        play_count: u32,
        audio_file: &Path,
    ) -> bool {
        match self.try_add(track_id, name, artist, rating, play_count, Some(audio_file)) {
            Ok(id) => {
                info!("Added track {} with audio from {:?}", id, audio_file);
                true
            }
            Err(e) => {
                warn!("Error adding track: {}", e);
                false
            }
        }
    }

    fn try_add(
        &mut self,
        track_id: &str,
        name: &str,
        artist: &str,
        rating: u8,
        play_count: u32,
        audio_file: Option<&Path>,
    ) -> Result<String, LibraryError> {
        let id = normalize_id(track_id);
        if self.tracks.contains_key(&id) {
            return Err(LibraryError::DuplicateId(id));
        }
        if rating > MAX_RATING {
            return Err(LibraryError::InvalidRating(rating));
        }

        let mut track = Track::new(name.trim(), artist.trim(), rating).with_play_count(play_count);

        if let Some(source) = audio_file {
            let ext = source
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase())
                .filter(|e| AUDIO_EXTENSIONS.contains(&e.as_str()))
                .ok_or_else(|| LibraryError::UnsupportedAudio(source.to_path_buf()))?;
            if !source.is_file() {
                return Err(LibraryError::io(
                    source,
                    std::io::Error::new(std::io::ErrorKind::NotFound, "audio file not found"),
                ));
            }

            fs::create_dir_all(&self.tracks_dir)
                .map_err(|e| LibraryError::io(&self.tracks_dir, e))?;
            let target = self.tracks_dir.join(format!("track_{}.{}", id, ext));
            fs::copy(source, &target).map_err(|e| LibraryError::io(&target, e))?;
            track.set_file_path(target);
        } else if let Some(existing) = find_audio_file(&self.tracks_dir, &id) {
            track.set_file_path(existing);
        }

        self.tracks.insert(id.clone(), track);
        if let Err(e) = self.persist() {
            self.tracks.remove(&id);
            return Err(e);
        }
        self.notify_observers();
        Ok(id)
    }

    // Removes the track and, once the library file is saved, any
    // `track_<id>.mp3` / `.wav` next to it.
    pub fn remove_track(&mut self, track_id: &str) -> bool {
        let id = normalize_id(track_id);
        let Some(track) = self.tracks.remove(&id) else {
            warn!("Track {} not found", id);
            return false;
        };

        if let Err(e) = self.persist() {
            error!("Error removing track {}: {}", id, e);
            self.tracks.entry(id).or_insert(track);
            return false;
        }

        let mut audio_removed = false;
        for ext in AUDIO_EXTENSIONS {
            let path = self.tracks_dir.join(format!("track_{}.{}", id, ext));
            if path.exists() {
                match fs::remove_file(&path) {
                    Ok(()) => audio_removed = true,
                    Err(e) => warn!("Could not delete {:?}: {}", path, e),
                }
            }
        }

        info!(
            "Removed track {} - {} by {} (audio file removed: {})",
            id,
            track.name(),
            track.artist(),
            audio_removed
        );

        self.notify_observers();
        true
    }

    pub fn set_rating(&mut self, track_id: &str, rating: u8) {
        let id = normalize_id(track_id);
        let Some(track) = self.tracks.get_mut(&id) else {
            return;
        };
        track.set_rating(rating);
        match self.persist() {
            Ok(()) => self.notify_observers(),
            Err(e) => error!("Rating for {} not saved: {}", id, e),
        }
    }

    pub fn increment_play_count(&mut self, track_id: &str) {
        let id = normalize_id(track_id);
        let Some(track) = self.tracks.get_mut(&id) else {
            return;
        };
        track.increment_play_count();
        debug!("Play count for {} is now {}", id, track.play_count());
        match self.persist() {
            Ok(()) => self.notify_observers(),
            Err(e) => error!("Play count for {} not saved: {}", id, e),
        }
    }

    // ==========================================
    // READS
    // ==========================================

    pub fn get_name(&self, track_id: &str) -> Option<String> {
        self.track(track_id).map(|t| t.name().to_string())
    }

    pub fn get_artist(&self, track_id: &str) -> Option<String> {
        self.track(track_id).map(|t| t.artist().to_string())
    }

    pub fn get_rating(&self, track_id: &str) -> Option<u8> {
        self.track(track_id).map(Track::rating)
    }

    pub fn get_play_count(&self, track_id: &str) -> Option<u32> {
        self.track(track_id).map(Track::play_count)
    }

    pub fn track(&self, track_id: &str) -> Option<&Track> {
        self.tracks.get(&normalize_id(track_id))
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.track(track_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    // (id, track) pairs in numeric id order.
    pub fn tracks(&self) -> Vec<(String, Track)> {
        persist::sorted_ids(&self.tracks)
            .into_iter()
            .map(|id| (id.clone(), self.tracks[id].clone()))
            .collect()
    }

    pub fn list_all(&self) -> String {
        persist::sorted_ids(&self.tracks)
            .into_iter()
            .map(|id| format!("{} {}", id, self.tracks[id].info()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    // Case-insensitive substring match, results in numeric id order.
    pub fn search_tracks(&self, query: &str, field: SearchField) -> Vec<(String, Track)> {
        let query = query.to_lowercase();
        self.tracks()
            .into_iter()
            .filter(|(_, track)| {
                let name = track.name().to_lowercase().contains(&query);
                let artist = track.artist().to_lowercase().contains(&query);
                match field {
                    SearchField::Name => name,
                    SearchField::Artist => artist,
                    SearchField::Both => name || artist,
                }
            })
            .collect()
    }

    pub fn unique_artists(&self) -> Vec<String> {
        let mut artists: Vec<String> = self
            .tracks
            .values()
            .map(|t| t.artist().to_string())
            .collect();
        artists.sort();
        artists.dedup();
        artists
    }

    // Highest numeric id + 1, zero-padded.
    pub fn next_track_id(&self) -> String {
        let max = self.tracks.keys().filter_map(|id| id_number(id)).max().unwrap_or(0);
        normalize_id(&(max + 1).to_string())
    }

    pub fn audio_file(&self, track_id: &str) -> Option<PathBuf> {
        find_audio_file(&self.tracks_dir, track_id)
    }

    // ==========================================
    // OBSERVERS
    // ==========================================

    pub fn add_observer(&mut self, observer: Arc<dyn LibraryObserver>) -> ObserverId {
        let id = ObserverId(self.next_observer_id);
        self.next_observer_id += 1;
        self.observers.push((id, observer));
        id
    }

    pub fn remove_observer(&mut self, id: ObserverId) {
        self.observers.retain(|(existing, _)| *existing != id);
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    // Takes every observer out so a batch of changes stays silent.
    pub fn detach_observers(&mut self) -> ObserverList {
        std::mem::take(&mut self.observers)
    }

    // Puts detached observers back in front of any registered meanwhile.
    pub fn restore_observers(&mut self, mut observers: ObserverList) {
        observers.append(&mut self.observers);
        self.observers = observers;
    }

    pub fn notify_observers(&self) {
        for (_, observer) in &self.observers {
            observer.on_library_change();
        }
    }

    // ==========================================
    // RELOADING
    // ==========================================

    // Reloads only when the file's mtime moved past the last one we saw,
    // so our own writes (which record their mtime) never trigger a reload.
    pub fn reload_if_changed(&mut self) -> bool {
        let current = match file_mtime(&self.library_file) {
            Some(mtime) => mtime,
            None => {
                warn!("Error reloading library: cannot stat {:?}", self.library_file);
                return false;
            }
        };

        let advanced = match self.last_modified {
            Some(last) => current > last,
            None => true,
        };
        if !advanced {
            return false;
        }

        info!("Library file changed on disk, reloading");
        self.load_from_disk();
        self.notify_observers();
        true
    }

    fn load_from_disk(&mut self) {
        self.tracks = persist::load(&self.library_file);
        for (id, track) in self.tracks.iter_mut() {
            if let Some(path) = find_audio_file(&self.tracks_dir, id) {
                track.set_file_path(path);
            }
        }
        self.last_modified = file_mtime(&self.library_file);
    }

    // A failed save puts the file back from .bak and reloads it, so memory
    // never drifts from what is on disk. The error still goes to the caller.
    fn persist(&mut self) -> Result<(), LibraryError> {
        match persist::save(&self.library_file, &self.tracks) {
            Ok(()) => {
                self.last_modified = file_mtime(&self.library_file);
                Ok(())
            }
            Err(e) => {
                error!("Error saving library file: {}", e);
                let backup = persist::backup_path(&self.library_file);
                if backup.exists() {
                    match fs::copy(&backup, &self.library_file) {
                        Ok(_) => self.load_from_disk(),
                        Err(restore) => error!("Error restoring from backup: {}", restore),
                    }
                }
                Err(e)
            }
        }
    }
}

fn file_mtime(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
