// YouTube downloader
// Turns a search result into a library track:
// 1. allocate the next track id
// 2. save the thumbnail as track_images/track_<id>.jpg
// 3. make sure ffmpeg is installed (yt-dlp needs it for mp3 conversion)
// 4. run yt-dlp into tracks/track_<id>.mp3
// 5. add the track to the library, notifying observers once
//
// Any failure removes the files written so far.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::DownloadError;
use crate::library::{lock_library, SharedLibrary};
use crate::youtube::api::SearchResult;

pub struct Downloader {
    library: SharedLibrary,
    tracks_dir: PathBuf,
    images_dir: PathBuf,
    client: reqwest::Client,
}

impl Downloader {
    pub fn new(
        library: SharedLibrary,
        tracks_dir: impl Into<PathBuf>,
        images_dir: impl Into<PathBuf>,
    ) -> Self {
        Downloader {
            library,
            tracks_dir: tracks_dir.into(),
            images_dir: images_dir.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &Config, library: SharedLibrary) -> Self {
        Self::new(library, config.tracks_dir(), config.images_dir())
    }

    // Returns the id the new track was stored under.
    pub async fn download(&self, result: &SearchResult) -> Result<String, DownloadError> {
        tokio::fs::create_dir_all(&self.tracks_dir).await?;
        tokio::fs::create_dir_all(&self.images_dir).await?;

        let track_id = lock_library(&self.library).next_track_id();
        let audio_path = self.tracks_dir.join(format!("track_{}.mp3", track_id));
        let image_path = self.images_dir.join(format!("track_{}.jpg", track_id));

        info!("Downloading {:?} as track {}", result.title, track_id);

        match self.fetch_and_add(result, &track_id, &audio_path, &image_path).await {
            Ok(()) => {
                info!("Track {} downloaded: {}", track_id, result.title);
                Ok(track_id)
            }
            Err(e) => {
                error!("Download of {:?} failed: {}", result.url, e);
                remove_partial(&[&audio_path, &image_path]);
                Err(e)
            }
        }
    }

    async fn fetch_and_add(
        &self,
        result: &SearchResult,
        track_id: &str,
        audio_path: &Path,
        image_path: &Path,
    ) -> Result<(), DownloadError> {
        if let Some(url) = &result.thumbnail {
            self.download_thumbnail(url, image_path).await?;
        }

        let url = result.url.clone();
        let template = self
            .tracks_dir
            .join(format!("track_{}.%(ext)s", track_id))
            .to_string_lossy()
            .into_owned();

        // yt-dlp and ffmpeg block, keep them off the runtime threads
        tokio::task::spawn_blocking(move || {
            check_ffmpeg()?;
            run_yt_dlp(&url, &template)
        })
        .await??;

        if !audio_path.exists() {
            return Err(DownloadError::AudioMissing(audio_path.to_path_buf()));
        }

        let mut library = lock_library(&self.library);
        let observers = library.detach_observers();
        let added = library.add_track(track_id, &result.title, &result.channel, 0, 0);
        library.restore_observers(observers);
        if !added {
            return Err(DownloadError::Library(track_id.to_string()));
        }
        library.notify_observers();
        Ok(())
    }

    // Only a 200 is written; anything else leaves the track without a cover.
    async fn download_thumbnail(&self, url: &str, path: &Path) -> Result<(), DownloadError> {
        let response = self.client.get(url).send().await?;
        if response.status() != reqwest::StatusCode::OK {
            warn!("Thumbnail {} returned {}", url, response.status());
            return Ok(());
        }
        let bytes = response.bytes().await?;
        tokio::fs::write(path, &bytes).await?;
        debug!("Saved thumbnail to {:?}", path);
        Ok(())
    }
}

fn check_ffmpeg() -> Result<(), DownloadError> {
    let output = Command::new("ffmpeg")
        .arg("-version")
        .output()
        .map_err(|e| DownloadError::FfmpegMissing(e.to_string()))?;

    if !output.status.success() {
        return Err(DownloadError::FfmpegMissing(last_line(&output.stderr)));
    }
    Ok(())
}

fn run_yt_dlp(url: &str, output_template: &str) -> Result<(), DownloadError> {
    let output = Command::new("yt-dlp")
        .arg("-x")
        .arg("--audio-format")
        .arg("mp3")
        .arg("--audio-quality")
        .arg("192K")
        .arg("--no-playlist")
        .arg("--quiet")
        .arg("--no-warnings")
        .arg("-o")
        .arg(output_template)
        .arg(url)
        .output()
        .map_err(DownloadError::Spawn)?;

    if !output.status.success() {
        return Err(DownloadError::YtDlp(last_line(&output.stderr)));
    }
    Ok(())
}

// yt-dlp puts the actual error on its last stderr line
fn last_line(stderr: &[u8]) -> String {
    String::from_utf8_lossy(stderr)
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("unknown error")
        .trim()
        .to_string()
}

fn remove_partial(paths: &[&Path]) {
    for path in paths {
        if path.exists() {
            if let Err(e) = std::fs::remove_file(path) {
                warn!("Could not remove {:?}: {}", path, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Library;
    use std::fs;
    use tempfile::TempDir;

    fn setup() -> (Downloader, SharedLibrary, TempDir) {
        let temp = TempDir::new().expect("temp dir");
        let library = Library::open(temp.path().join("tracks.csv"), temp.path().join("tracks")).shared();
        let downloader = Downloader::new(
            library.clone(),
            temp.path().join("tracks"),
            temp.path().join("track_images"),
        );
        (downloader, library, temp)
    }

    fn result_with_thumbnail(thumbnail: &str) -> SearchResult {
        SearchResult {
            video_id: "abc123".into(),
            title: "Song".into(),
            channel: "Band".into(),
            thumbnail: Some(thumbnail.into()),
            duration: "3:00".into(),
            views: 10,
            url: "https://www.youtube.com/watch?v=abc123".into(),
        }
    }

    #[tokio::test]
    async fn failed_download_removes_partial_files() {
        let (downloader, library, temp) = setup();
        lock_library(&library).add_track("01", "Existing", "Artist", 3, 0);

        let tracks_dir = temp.path().join("tracks");
        fs::create_dir_all(&tracks_dir).expect("tracks dir");
        let stale = tracks_dir.join("track_02.mp3");
        fs::write(&stale, b"partial").expect("stale file");

        let outcome = downloader
            .download(&result_with_thumbnail("http://127.0.0.1:9/thumb.jpg"))
            .await;

        assert!(matches!(outcome, Err(DownloadError::Thumbnail(_))));
        assert!(!stale.exists());
        assert!(!temp.path().join("track_images/track_02.jpg").exists());

        let library = lock_library(&library);
        assert_eq!(library.len(), 1);
        assert!(!library.contains("02"));
    }

    #[test]
    fn last_line_of_stderr() {
        assert_eq!(last_line(b"WARNING: x\nERROR: no video\n\n"), "ERROR: no video");
        assert_eq!(last_line(b""), "unknown error");
    }

    #[test]
    fn remove_partial_ignores_missing_files() {
        let temp = TempDir::new().expect("temp dir");
        let present = temp.path().join("track_01.mp3");
        fs::write(&present, b"x").expect("file");
        let missing = temp.path().join("track_01.jpg");

        remove_partial(&[&present, &missing]);
        assert!(!present.exists());
    }
}
