// Main TUI application using ratatui
// Holds the UI state, handles key input and runs the draw loop.
// Rendering lives in view.rs.
//
// Library and player changes arrive through observers that only set flags;
// the loop picks them up before each frame. YouTube search and downloads
// run as tokio tasks and report back over an mpsc channel.

use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::library::{
    lock_library, Library, LibraryObserver, LibraryWatcher, ObserverId, SearchField,
    SharedLibrary, Track,
};
use crate::player::engine::NO_TRACK;
use crate::player::{MusicPlayer, PlayerObserver, PlayerObserverId};
use crate::playlist::{Playlist, PlaylistEntry, PlaylistManager};
use crate::youtube::{Downloader, SearchResult, YouTubeApi};

const VOLUME_STEP: u32 = 5;
const SEEK_STEP: f64 = 10.0;
const IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Library,
    Playlist,
    Results,
}

impl Focus {
    fn next(self) -> Focus {
        match self {
            Focus::Library => Focus::Playlist,
            Focus::Playlist => Focus::Results,
            Focus::Results => Focus::Library,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prompt {
    Filter,
    YouTubeSearch,
    SavePlaylist,
    LoadPlaylist,
    DeletePlaylist,
}

impl Prompt {
    pub fn label(self) -> &'static str {
        match self {
            Prompt::Filter => "Filter",
            Prompt::YouTubeSearch => "YouTube search",
            Prompt::SavePlaylist => "Save playlist as",
            Prompt::LoadPlaylist => "Load playlist",
            Prompt::DeletePlaylist => "Delete playlist",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Normal,
    Prompt(Prompt),
}

// Results of background tasks
enum BackgroundEvent {
    SearchFinished(Vec<SearchResult>),
    DownloadFinished(Result<String, String>),
}

// ==========================================
// OBSERVER BRIDGE
// ==========================================
// Runs on whatever thread changed the library or the player, so it only
// records what happened.
#[derive(Default)]
struct UiObserver {
    library_changed: AtomicBool,
    track_info: Mutex<Option<String>>,
    is_playing: AtomicBool,
}

impl UiObserver {
    fn take_track_info(&self) -> Option<String> {
        self.track_info
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }
}

impl LibraryObserver for UiObserver {
    fn on_library_change(&self) {
        self.library_changed.store(true, Ordering::SeqCst);
    }
}

impl PlayerObserver for UiObserver {
    fn on_track_change(&self, track_info: &str) {
        *self
            .track_info
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(track_info.to_string());
    }

    fn on_playback_state_change(&self, is_playing: bool) {
        self.is_playing.store(is_playing, Ordering::SeqCst);
    }
}

pub struct JukeboxApp {
    pub(crate) config: Config,
    pub(crate) library: SharedLibrary,
    pub(crate) player: MusicPlayer,
    playlists: PlaylistManager,
    youtube: Arc<YouTubeApi>,
    downloader: Arc<Downloader>,
    _watcher: Option<LibraryWatcher>,
    observer: Arc<UiObserver>,
    library_observer: ObserverId,
    player_observer: PlayerObserverId,

    pub(crate) playlist: Playlist,
    pub(crate) library_rows: Vec<(String, Track)>,
    pub(crate) filter: String,
    pub(crate) filter_field: SearchField,
    pub(crate) search_results: Vec<SearchResult>,
    pub(crate) selected_track: usize,
    pub(crate) selected_playlist_item: usize,
    pub(crate) selected_result: usize,
    pub(crate) focus: Focus,
    pub(crate) mode: AppMode,
    pub(crate) input: String,
    pub(crate) track_info: String,
    pub(crate) status_message: String,
    pub(crate) is_searching: bool,
    pub(crate) is_downloading: bool,
    should_quit: bool,

    events_tx: mpsc::UnboundedSender<BackgroundEvent>,
    events_rx: mpsc::UnboundedReceiver<BackgroundEvent>,
}

impl JukeboxApp {
    pub fn new(config: Config) -> Self {
        let library = Library::from_config(&config).shared();
        let player = MusicPlayer::new(library.clone(), config.tracks_dir());

        let watcher = match LibraryWatcher::start(&library) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!("Library file watching disabled: {}", e);
                None
            }
        };

        let mut app = Self::with_parts(config, library, player);
        app._watcher = watcher;
        app
    }

    // Wires an app around an existing library and player.
    pub fn with_parts(config: Config, library: SharedLibrary, player: MusicPlayer) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let observer = Arc::new(UiObserver::default());

        let library_observer = lock_library(&library).add_observer(observer.clone());
        let player_observer = player.add_observer(observer.clone());

        let mut app = JukeboxApp {
            playlists: PlaylistManager::new(config.playlists_dir()),
            youtube: Arc::new(YouTubeApi::new(config.youtube_api_key.clone())),
            downloader: Arc::new(Downloader::from_config(&config, library.clone())),
            config,
            library,
            player,
            _watcher: None,
            observer,
            library_observer,
            player_observer,
            playlist: Playlist::new(),
            library_rows: Vec::new(),
            filter: String::new(),
            filter_field: SearchField::Both,
            search_results: Vec::new(),
            selected_track: 0,
            selected_playlist_item: 0,
            selected_result: 0,
            focus: Focus::Library,
            mode: AppMode::Normal,
            input: String::new(),
            track_info: NO_TRACK.to_string(),
            status_message: String::new(),
            is_searching: false,
            is_downloading: false,
            should_quit: false,
            events_tx,
            events_rx,
        };
        app.refresh_library();
        app
    }

    // ==========================================
    // EVENT LOOP
    // ==========================================

    pub async fn run(&mut self) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.event_loop(&mut terminal);

        // Restore the terminal even when the loop failed
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> anyhow::Result<()> {
        while !self.should_quit {
            self.apply_observer_updates();
            self.drain_background_events();

            terminal.draw(|f| self.draw(f))?;

            if event::poll(Duration::from_millis(100))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_key(key.code);
                    }
                }
            }
        }
        info!("Quitting");
        Ok(())
    }

    pub(crate) fn apply_observer_updates(&mut self) {
        if self.observer.library_changed.swap(false, Ordering::SeqCst) {
            self.refresh_library();
        }
        if let Some(info) = self.observer.take_track_info() {
            self.track_info = info;
        }
    }

    pub(crate) fn is_playing(&self) -> bool {
        self.observer.is_playing.load(Ordering::SeqCst)
    }

    fn drain_background_events(&mut self) {
        while let Ok(event) = self.events_rx.try_recv() {
            match event {
                BackgroundEvent::SearchFinished(results) => {
                    self.is_searching = false;
                    self.status_message = if results.is_empty() {
                        "No results (see log for details)".to_string()
                    } else {
                        format!("Found {} results", results.len())
                    };
                    self.search_results = results;
                    self.selected_result = 0;
                    if !self.search_results.is_empty() {
                        self.focus = Focus::Results;
                    }
                }
                BackgroundEvent::DownloadFinished(outcome) => {
                    self.is_downloading = false;
                    self.status_message = match outcome {
                        Ok(track_id) => format!("Downloaded track {}", track_id),
                        Err(e) => format!("Download failed: {}", e),
                    };
                }
            }
        }
    }

    // ==========================================
    // INPUT
    // ==========================================

    pub fn handle_key(&mut self, key: KeyCode) {
        match self.mode {
            AppMode::Prompt(prompt) => self.handle_prompt_key(prompt, key),
            AppMode::Normal => {
                self.status_message.clear();
                self.handle_normal_key(key);
            }
        }
    }

    fn handle_normal_key(&mut self, key: KeyCode) {
        match key {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab => self.focus = self.focus.next(),
            KeyCode::Char('j') => self.move_selection(1),
            KeyCode::Char('k') => self.move_selection(-1),

            KeyCode::Char('/') => {
                self.input = self.filter.clone();
                self.mode = AppMode::Prompt(Prompt::Filter);
            }
            KeyCode::Char('f') => {
                self.filter_field = self.filter_field.next();
                self.refresh_library();
                self.status_message = format!("Filtering by {}", self.filter_field.label());
            }
            KeyCode::Enter => self.add_selected_to_playlist(),
            KeyCode::Char(c @ '0'..='5') => self.rate_selected(c as u8 - b'0'),

            KeyCode::Char('x') => self.remove_selected_from_playlist(),
            KeyCode::Char('c') => {
                self.playlist.clear();
                self.selected_playlist_item = 0;
                self.status_message = "Playlist cleared".to_string();
            }
            KeyCode::Char('P') => self.play_playlist(),
            KeyCode::Char('o') => self.play_selected_track(),

            KeyCode::Char(' ') => self.player.toggle_playback(),
            KeyCode::Char('S') => self.player.stop(),
            KeyCode::Char('n') => self.player.play_next(),
            KeyCode::Char('p') => self.player.play_previous(),
            KeyCode::Char('s') => {
                let kind = self.player.strategy_kind().toggle();
                self.player.set_strategy(kind);
                self.status_message = format!("Playback: {}", kind.label());
            }
            KeyCode::Right => self.player.seek_relative(SEEK_STEP),
            KeyCode::Left => self.player.seek_relative(-SEEK_STEP),
            KeyCode::Up => self.volume_up(),
            KeyCode::Down => self.volume_down(),

            KeyCode::Char('y') => self.open_prompt(Prompt::YouTubeSearch),
            KeyCode::Char('d') => self.download_selected_result(),
            KeyCode::Char('w') => self.open_prompt(Prompt::SavePlaylist),
            KeyCode::Char('l') => self.open_prompt(Prompt::LoadPlaylist),
            KeyCode::Char('X') => self.open_prompt(Prompt::DeletePlaylist),
            _ => {}
        }
    }

    fn open_prompt(&mut self, prompt: Prompt) {
        self.input.clear();
        self.mode = AppMode::Prompt(prompt);
    }

    fn handle_prompt_key(&mut self, prompt: Prompt, key: KeyCode) {
        match key {
            KeyCode::Char(c) => {
                self.input.push(c);
                if prompt == Prompt::Filter {
                    self.set_filter(self.input.clone());
                }
            }
            KeyCode::Backspace => {
                self.input.pop();
                if prompt == Prompt::Filter {
                    self.set_filter(self.input.clone());
                }
            }
            KeyCode::Esc => {
                if prompt == Prompt::Filter {
                    self.set_filter(String::new());
                }
                self.input.clear();
                self.mode = AppMode::Normal;
            }
            KeyCode::Enter => {
                let value = std::mem::take(&mut self.input);
                self.mode = AppMode::Normal;
                self.submit_prompt(prompt, value.trim());
            }
            _ => {}
        }
    }

    fn submit_prompt(&mut self, prompt: Prompt, value: &str) {
        match prompt {
            Prompt::Filter => self.set_filter(value.to_string()),
            Prompt::YouTubeSearch => self.start_search(value),
            Prompt::SavePlaylist => self.save_playlist(value),
            Prompt::LoadPlaylist => self.load_playlist(value),
            Prompt::DeletePlaylist => self.delete_playlist(value),
        }
    }

    fn move_selection(&mut self, delta: isize) {
        let (selected, len) = match self.focus {
            Focus::Library => (&mut self.selected_track, self.library_rows.len()),
            Focus::Playlist => (&mut self.selected_playlist_item, self.playlist.len()),
            Focus::Results => (&mut self.selected_result, self.search_results.len()),
        };
        if len == 0 {
            return;
        }
        *selected = (*selected as isize + delta).rem_euclid(len as isize) as usize;
    }

    // ==========================================
    // LIBRARY PANE
    // ==========================================

    pub(crate) fn refresh_library(&mut self) {
        let library = lock_library(&self.library);
        self.library_rows = if self.filter.is_empty() {
            library.tracks()
        } else {
            library.search_tracks(&self.filter, self.filter_field)
        };
        drop(library);

        if self.selected_track >= self.library_rows.len() {
            self.selected_track = self.library_rows.len().saturating_sub(1);
        }
    }

    fn set_filter(&mut self, filter: String) {
        self.filter = filter;
        self.selected_track = 0;
        self.refresh_library();
    }

    pub(crate) fn selected_library_track(&self) -> Option<&(String, Track)> {
        self.library_rows.get(self.selected_track)
    }

    // track_images/track_<id>.png|jpg|jpeg
    pub(crate) fn cover_image(&self, track_id: &str) -> Option<PathBuf> {
        let dir = self.config.images_dir();
        IMAGE_EXTENSIONS
            .iter()
            .map(|ext| dir.join(format!("track_{}.{}", track_id, ext)))
            .find(|path| path.is_file())
    }

    fn rate_selected(&mut self, rating: u8) {
        let Some((id, track)) = self.selected_library_track().cloned() else {
            self.status_message = "Select a track first".to_string();
            return;
        };
        lock_library(&self.library).set_rating(&id, rating);
        self.status_message = format!("Rated {} {}/5", track.name(), rating);
    }

    fn play_selected_track(&mut self) {
        let Some((id, track)) = self.selected_library_track().cloned() else {
            self.status_message = "Select a track first".to_string();
            return;
        };
        if !self.player.play_track(&id) {
            self.status_message = format!("No playable audio file for track {}", id);
            return;
        }
        self.status_message = format!("Playing {}", track.name());
    }

    // ==========================================
    // PLAYLIST PANE
    // ==========================================

    fn add_selected_to_playlist(&mut self) {
        if self.focus != Focus::Library {
            return;
        }
        let Some((id, track)) = self.selected_library_track().cloned() else {
            self.status_message = "Select a track first".to_string();
            return;
        };

        if self.playlist.add(PlaylistEntry::new(id, track.name())) {
            self.status_message = format!("Added track: {} - {}", track.name(), track.artist());
        } else {
            self.status_message = "Track is already in the playlist!".to_string();
        }
    }

    fn remove_selected_from_playlist(&mut self) {
        match self.playlist.remove(self.selected_playlist_item) {
            Some(entry) => {
                self.status_message = format!("Removed {} from playlist", entry.name);
                if self.selected_playlist_item >= self.playlist.len() {
                    self.selected_playlist_item = self.playlist.len().saturating_sub(1);
                }
            }
            None => self.status_message = "Playlist is empty".to_string(),
        }
    }

    fn play_playlist(&mut self) {
        if self.playlist.is_empty() {
            self.status_message = "Add tracks to the playlist before playing".to_string();
            return;
        }
        self.player.play_playlist(self.playlist.entries());
        self.status_message = format!(
            "Playing playlist ({}, {} tracks)",
            self.player.strategy_kind().label(),
            self.playlist.len()
        );
    }

    fn save_playlist(&mut self, name: &str) {
        if name.is_empty() {
            self.status_message = "Playlist name cannot be empty".to_string();
            return;
        }
        if self.playlist.is_empty() {
            self.status_message = "Playlist is empty, nothing to save".to_string();
            return;
        }
        self.status_message = if self.playlists.save(name, self.playlist.entries()) {
            format!("Saved playlist {}", name)
        } else {
            format!("Could not save playlist {}", name)
        };
    }

    fn load_playlist(&mut self, name: &str) {
        let entries = self.playlists.load(name);
        if entries.is_empty() {
            self.status_message = format!("Playlist {} is empty or missing", name);
            return;
        }
        let count = entries.len();
        self.playlist.replace(entries);
        self.selected_playlist_item = 0;
        self.status_message = format!("Loaded playlist {} ({} tracks)", name, count);
    }

    fn delete_playlist(&mut self, name: &str) {
        self.status_message = if self.playlists.delete(name) {
            format!("Deleted playlist {}", name)
        } else {
            format!("Playlist {} not found", name)
        };
    }

    pub(crate) fn saved_playlists(&self) -> Vec<String> {
        self.playlists.list_playlists()
    }

    // ==========================================
    // PLAYER CONTROLS
    // ==========================================

    fn volume_up(&mut self) {
        let current = self.player.volume();
        self.player.set_volume((current + VOLUME_STEP).min(100));
    }

    fn volume_down(&mut self) {
        let current = self.player.volume();
        self.player.set_volume(current.saturating_sub(VOLUME_STEP));
    }

    // ==========================================
    // YOUTUBE
    // ==========================================

    fn start_search(&mut self, query: &str) {
        if query.is_empty() {
            return;
        }
        if !self.youtube.is_enabled() {
            self.status_message = "YouTube search needs YOUTUBE_API_KEY".to_string();
            return;
        }
        if self.is_searching {
            return;
        }
        self.is_searching = true;

        let youtube = Arc::clone(&self.youtube);
        let query = query.to_string();
        let max_results = self.config.max_results;
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            let results = youtube.search(&query, max_results).await;
            let _ = tx.send(BackgroundEvent::SearchFinished(results));
        });
    }

    fn download_selected_result(&mut self) {
        if self.is_downloading {
            self.status_message = "A download is already running".to_string();
            return;
        }
        let Some(result) = self.search_results.get(self.selected_result).cloned() else {
            self.status_message = "Search YouTube first".to_string();
            return;
        };

        self.is_downloading = true;
        self.status_message = format!("Downloading {}...", result.title);

        let downloader = Arc::clone(&self.downloader);
        let tx = self.events_tx.clone();

        tokio::spawn(async move {
            let outcome = downloader.download(&result).await.map_err(|e| {
                error!("Download failed: {}", e);
                e.to_string()
            });
            let _ = tx.send(BackgroundEvent::DownloadFinished(outcome));
        });
    }

    pub(crate) fn format_time(seconds: f64) -> String {
        let mins = (seconds / 60.0) as u64;
        let secs = (seconds % 60.0) as u64;
        format!("{:02}:{:02}", mins, secs)
    }
}

impl Drop for JukeboxApp {
    fn drop(&mut self) {
        self.player.remove_observer(self.player_observer);
        self.player.stop();
        lock_library(&self.library).remove_observer(self.library_observer);
    }
}
