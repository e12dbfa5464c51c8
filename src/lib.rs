// Terminal jukebox: a CSV-backed track library with ratings and play
// counts, playlists, local audio playback and YouTube downloads.

pub mod config;
pub mod error;
pub mod library;
pub mod logging;
pub mod player;
pub mod playlist;
pub mod ui;
pub mod youtube;
