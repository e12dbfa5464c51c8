// Application configuration
// Paths and settings come from the environment, with the data directory
// falling back to the platform data dir (via `dirs`) like the rest of the app.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

pub const LIBRARY_FILE: &str = "tracks.csv";
pub const TRACKS_DIR: &str = "tracks";
pub const IMAGES_DIR: &str = "track_images";
pub const PLAYLISTS_DIR: &str = "playlists";
pub const LOG_FILE: &str = "jukebox.log";

const DEFAULT_MAX_RESULTS: usize = 10;

#[derive(Debug, Clone)]
pub struct Config {
    pub data_dir: PathBuf,
    pub youtube_api_key: Option<String>,
    pub max_results: usize,
}

impl Config {
    // Read JUKEBOX_HOME, YOUTUBE_API_KEY and JUKEBOX_MAX_RESULTS.
    pub fn from_env() -> Self {
        let data_dir = std::env::var_os("JUKEBOX_HOME")
            .map(PathBuf::from)
            .or_else(|| dirs::data_dir().map(|d| d.join("jukebox")))
            .unwrap_or_else(|| PathBuf::from("."));

        let youtube_api_key = std::env::var("YOUTUBE_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty());

        let max_results = match std::env::var("JUKEBOX_MAX_RESULTS") {
            Ok(raw) => raw.parse().unwrap_or_else(|_| {
                warn!("Ignoring invalid JUKEBOX_MAX_RESULTS={raw}");
                DEFAULT_MAX_RESULTS
            }),
            Err(_) => DEFAULT_MAX_RESULTS,
        };

        Config {
            data_dir,
            youtube_api_key,
            max_results,
        }
    }

    // Config rooted at an explicit directory, no API key.
    pub fn with_data_dir(data_dir: impl AsRef<Path>) -> Self {
        Config {
            data_dir: data_dir.as_ref().to_path_buf(),
            youtube_api_key: None,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn library_file(&self) -> PathBuf {
        self.data_dir.join(LIBRARY_FILE)
    }

    pub fn tracks_dir(&self) -> PathBuf {
        self.data_dir.join(TRACKS_DIR)
    }

    pub fn images_dir(&self) -> PathBuf {
        self.data_dir.join(IMAGES_DIR)
    }

    pub fn playlists_dir(&self) -> PathBuf {
        self.data_dir.join(PLAYLISTS_DIR)
    }

    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join(LOG_FILE)
    }

    // Create the data, tracks, images and playlists directories.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [
            self.data_dir.clone(),
            self.tracks_dir(),
            self.images_dir(),
            self.playlists_dir(),
        ] {
            fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}
