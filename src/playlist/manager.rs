// Playlist files
// Each playlist is `<playlists_dir>/<name>.txt` with one "id - name" line
// per track. Writes go through a temp file and a rename, so a reader never
// sees half a playlist.

use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use tracing::{error, info, warn};

use crate::error::PlaylistError;
use crate::playlist::list::PlaylistEntry;

const EXTENSION: &str = "txt";

pub struct PlaylistManager {
    playlists_dir: PathBuf,
}

impl PlaylistManager {
    pub fn new(playlists_dir: impl Into<PathBuf>) -> Self {
        let playlists_dir = playlists_dir.into();
        if let Err(e) = fs::create_dir_all(&playlists_dir) {
            error!("Error creating playlists directory {:?}: {}", playlists_dir, e);
        }
        PlaylistManager { playlists_dir }
    }

    pub fn playlists_dir(&self) -> &Path {
        &self.playlists_dir
    }

    // "mix" and "mix.txt" both map to `<dir>/mix.txt`. Names must stay a
    // single file inside the playlists directory.
    pub fn playlist_path(&self, name: &str) -> Result<PathBuf, PlaylistError> {
        let name = name.trim();
        let file_name = if name.ends_with(".txt") {
            name.to_string()
        } else {
            format!("{}.{}", name, EXTENSION)
        };

        let mut components = Path::new(&file_name).components();
        let single_file = matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        );
        if name.is_empty() || name.contains('\\') || !single_file {
            return Err(PlaylistError::InvalidName(name.to_string()));
        }
        Ok(self.playlists_dir.join(file_name))
    }

    // Playlist names (without .txt), sorted.
    pub fn list_playlists(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.playlists_dir) {
            Ok(entries) => entries,
            Err(e) => {
                error!("Error listing playlists: {}", e);
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(EXTENSION))
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        names.sort();
        names
    }

    // Unreadable or missing files give an empty playlist; bad lines are
    // skipped.
    pub fn load(&self, name: &str) -> Vec<PlaylistEntry> {
        match self.try_load(name) {
            Ok(entries) => entries,
            Err(e) => {
                error!("Error loading playlist {}: {}", name, e);
                Vec::new()
            }
        }
    }

    fn try_load(&self, name: &str) -> Result<Vec<PlaylistEntry>, PlaylistError> {
        let path = self.playlist_path(name)?;
        let contents = fs::read_to_string(&path).map_err(|source| PlaylistError::Io {
            path: path.clone(),
            source,
        })?;

        let mut entries = Vec::new();
        for (number, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match PlaylistEntry::parse_line(line) {
                Some(entry) => entries.push(entry),
                None => warn!("Skipping malformed line {} in {:?}", number + 1, path),
            }
        }
        Ok(entries)
    }

    pub fn save(&self, name: &str, entries: &[PlaylistEntry]) -> bool {
        match self.try_save(name, entries) {
            Ok(path) => {
                info!("Saved {} tracks to {:?}", entries.len(), path);
                true
            }
            Err(e) => {
                error!("Error saving playlist {}: {}", name, e);
                false
            }
        }
    }

    fn try_save(&self, name: &str, entries: &[PlaylistEntry]) -> Result<PathBuf, PlaylistError> {
        let path = self.playlist_path(name)?;
        let mut temp_name = path.as_os_str().to_os_string();
        temp_name.push(".tmp");
        let temp = PathBuf::from(temp_name);

        let write = || -> std::io::Result<()> {
            let mut file = fs::File::create(&temp)?;
            for entry in entries {
                writeln!(file, "{}", entry.to_line())?;
            }
            file.sync_all()?;
            fs::rename(&temp, &path)
        };

        if let Err(source) = write() {
            if temp.exists() {
                let _ = fs::remove_file(&temp);
            }
            return Err(PlaylistError::Io { path, source });
        }
        Ok(path)
    }

    pub fn delete(&self, name: &str) -> bool {
        match self.try_delete(name) {
            Ok(()) => {
                info!("Deleted playlist {}", name);
                true
            }
            Err(e) => {
                warn!("Error deleting playlist {}: {}", name, e);
                false
            }
        }
    }

    fn try_delete(&self, name: &str) -> Result<(), PlaylistError> {
        let path = self.playlist_path(name)?;
        if !path.is_file() {
            return Err(PlaylistError::NotFound(name.to_string()));
        }
        fs::remove_file(&path).map_err(|source| PlaylistError::Io { path, source })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_manager() -> (PlaylistManager, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let manager = PlaylistManager::new(temp_dir.path().join("playlists"));
        (manager, temp_dir)
    }

    fn entries() -> Vec<PlaylistEntry> {
        vec![
            PlaylistEntry::new("03", "Bohemian Rhapsody"),
            PlaylistEntry::new("01", "Song - Acoustic"),
            PlaylistEntry::new("12", "Trăm Năm"),
        ]
    }

    #[test]
    fn save_then_load_keeps_order() {
        let (manager, _temp) = setup_test_manager();

        assert!(manager.save("road trip", &entries()));
        assert_eq!(manager.load("road trip"), entries());
        assert_eq!(manager.load("road trip.txt"), entries());
    }

    #[test]
    fn save_appends_extension_once() {
        let (manager, _temp) = setup_test_manager();

        assert!(manager.save("mix.txt", &entries()));
        assert!(manager.playlists_dir().join("mix.txt").is_file());
        assert!(!manager.playlists_dir().join("mix.txt.txt").exists());
        assert!(!manager.playlists_dir().join("mix.txt.tmp").exists());
    }

    #[test]
    fn load_skips_malformed_lines() {
        let (manager, _temp) = setup_test_manager();
        fs::write(
            manager.playlist_path("messy").expect("valid name"),
            "01 - Good\nbroken line\n\n02 - Also good\n",
        )
        .expect("write playlist");

        let loaded = manager.load("messy");
        assert_eq!(
            loaded,
            vec![PlaylistEntry::new("01", "Good"), PlaylistEntry::new("02", "Also good")]
        );
    }

    #[test]
    fn load_missing_playlist_is_empty() {
        let (manager, _temp) = setup_test_manager();
        assert!(manager.load("nope").is_empty());
    }

    #[test]
    fn list_and_delete() {
        let (manager, _temp) = setup_test_manager();
        manager.save("b", &entries());
        manager.save("a", &[]);
        fs::write(manager.playlists_dir().join("notes.md"), "ignore").expect("write");

        assert_eq!(manager.list_playlists(), vec!["a", "b"]);

        assert!(manager.delete("a"));
        assert!(!manager.delete("a"));
        assert_eq!(manager.list_playlists(), vec!["b"]);
    }

    #[test]
    fn names_cannot_leave_the_playlists_directory() {
        let (manager, temp) = setup_test_manager();

        for name in ["../escape", "nested/mix", "/tmp/mix", "..\\mix", "  "] {
            assert!(
                matches!(manager.playlist_path(name), Err(PlaylistError::InvalidName(_))),
                "{:?} should be rejected",
                name
            );
            assert!(!manager.save(name, &entries()));
        }
        assert!(!temp.path().join("escape.txt").exists());
        assert!(manager.list_playlists().is_empty());
        assert!(manager.load("../escape").is_empty());
        assert!(!manager.delete("../escape"));
    }

    #[test]
    fn overwrite_replaces_contents() {
        let (manager, _temp) = setup_test_manager();
        manager.save("mix", &entries());
        manager.save("mix", &[PlaylistEntry::new("07", "Only one")]);

        assert_eq!(manager.load("mix"), vec![PlaylistEntry::new("07", "Only one")]);
    }
}
