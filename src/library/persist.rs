// CSV persistence for the library
//
// File layout: header `track_id,name,artist,rating,play_count`, one row per
// track, ordered by numeric id. Writes go through `<file>.tmp` and an atomic
// rename, with the previous contents kept in `<file>.bak`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::LibraryError;
use crate::library::track::{id_number, normalize_id, Track};

pub const HEADER: [&str; 5] = ["track_id", "name", "artist", "rating", "play_count"];

#[derive(Debug, Serialize, Deserialize)]
struct TrackRow {
    track_id: String,
    name: String,
    artist: String,
    rating: u8,
    play_count: u32,
}

pub fn backup_path(path: &Path) -> PathBuf {
    sibling_with_suffix(path, ".bak")
}

pub fn temp_path(path: &Path) -> PathBuf {
    sibling_with_suffix(path, ".tmp")
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

// Ids in numeric order ("2" before "10"); non-numeric ids go last.
pub fn sorted_ids<'a>(tracks: &'a BTreeMap<String, Track>) -> Vec<&'a String> {
    let mut ids: Vec<&String> = tracks.keys().collect();
    ids.sort_by_key(|id| (id_number(id).unwrap_or(u32::MAX), (*id).clone()));
    ids
}

pub fn create_default(path: &Path) -> Result<(), LibraryError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| LibraryError::io(parent, e))?;
        }
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(HEADER)?;
    writer.flush().map_err(|e| LibraryError::io(path, e))?;
    Ok(())
}

// Reads every well-formed row. Bad rows are logged and skipped; only
// failing to open or read the file at all is an error.
pub fn read_tracks(path: &Path) -> Result<BTreeMap<String, Track>, LibraryError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut tracks = BTreeMap::new();

    for (line, row) in reader.deserialize::<TrackRow>().enumerate() {
        match row {
            Ok(row) => {
                let track = Track::new(row.name, row.artist, row.rating)
                    .with_play_count(row.play_count);
                tracks.insert(normalize_id(&row.track_id), track);
            }
            Err(e) if e.is_io_error() => return Err(e.into()),
            Err(e) => {
                warn!("Skipping library row {}: {}", line + 2, e);
            }
        }
    }

    Ok(tracks)
}

// Load with the backup fallback:
// - missing file: create an empty one
// - first load: snapshot the file to .bak if no backup exists yet
// - unreadable file: restore .bak and retry once, else start empty
pub fn load(path: &Path) -> BTreeMap<String, Track> {
    load_with(path, read_tracks)
}

fn load_with(
    path: &Path,
    mut read: impl FnMut(&Path) -> Result<BTreeMap<String, Track>, LibraryError>,
) -> BTreeMap<String, Track> {
    if !path.exists() {
        if let Err(e) = create_default(path) {
            error!("Error creating default library file: {}", e);
        }
        return BTreeMap::new();
    }

    let backup = backup_path(path);
    let mut backup_created = false;
    if !backup.exists() {
        match fs::copy(path, &backup) {
            Ok(_) => backup_created = true,
            Err(e) => warn!("Could not create library backup {:?}: {}", backup, e),
        }
    }

    match read(path) {
        Ok(tracks) => tracks,
        Err(e) => {
            error!("Error loading library file: {}", e);
            if backup_created || !backup.exists() {
                return BTreeMap::new();
            }
            info!("Restoring library from backup {:?}", backup);
            match fs::copy(&backup, path)
                .map_err(|e| LibraryError::io(path, e))
                .and_then(|_| read(path))
            {
                Ok(tracks) => tracks,
                Err(restore_error) => {
                    error!("Error restoring from backup: {}", restore_error);
                    BTreeMap::new()
                }
            }
        }
    }
}

// Full rewrite: backup, write temp file, rename over the original.
pub fn save(path: &Path, tracks: &BTreeMap<String, Track>) -> Result<(), LibraryError> {
    if path.exists() {
        fs::copy(path, backup_path(path)).map_err(|e| LibraryError::io(path, e))?;
    }

    let temp = temp_path(path);
    if let Err(e) = write_rows(&temp, tracks) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }

    fs::rename(&temp, path).map_err(|e| LibraryError::io(path, e))
}

fn write_rows(path: &Path, tracks: &BTreeMap<String, Track>) -> Result<(), LibraryError> {
    // Header is written by hand so an empty library still gets one.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(HEADER)?;

    for id in sorted_ids(tracks) {
        let track = &tracks[id];
        writer.serialize(TrackRow {
            track_id: normalize_id(id),
            name: track.name().to_string(),
            artist: track.artist().to_string(),
            rating: track.rating(),
            play_count: track.play_count(),
        })?;
    }

    writer.flush().map_err(|e| LibraryError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> BTreeMap<String, Track> {
        let mut tracks = BTreeMap::new();
        tracks.insert("10".to_string(), Track::new("Ten", "Band", 2));
        tracks.insert("02".to_string(), Track::new("Two, with comma", "Band", 5).with_play_count(7));
        tracks
    }

    #[test]
    fn save_writes_header_and_numeric_order() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("tracks.csv");

        save(&path, &sample()).expect("save");

        let contents = fs::read_to_string(&path).expect("read back");
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines[0], "track_id,name,artist,rating,play_count");
        assert_eq!(lines[1], "02,\"Two, with comma\",Band,5,7");
        assert_eq!(lines[2], "10,Ten,Band,2,0");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn empty_library_still_has_header() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("tracks.csv");

        save(&path, &BTreeMap::new()).expect("save");

        let contents = fs::read_to_string(&path).expect("read back");
        assert_eq!(contents.trim(), "track_id,name,artist,rating,play_count");
    }

    #[test]
    fn save_keeps_previous_contents_as_backup() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("tracks.csv");

        save(&path, &sample()).expect("first save");
        let first = fs::read_to_string(&path).expect("read");

        save(&path, &BTreeMap::new()).expect("second save");
        let backup = fs::read_to_string(backup_path(&path)).expect("backup");
        assert_eq!(backup, first);
    }

    #[test]
    fn malformed_rows_are_skipped() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("tracks.csv");
        fs::write(
            &path,
            "track_id,name,artist,rating,play_count\n\
             01,Good,Artist,3,1\n\
             02,Bad,Artist,not-a-number,0\n\
             3,Padded,Artist,1,0\n",
        )
        .expect("write");

        let tracks = load(&path);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks["01"].rating(), 3);
        assert_eq!(tracks["03"].name(), "Padded");
        assert!(backup_path(&path).exists());
    }

    #[test]
    fn missing_file_is_created_empty() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("nested").join("tracks.csv");

        let tracks = load(&path);
        assert!(tracks.is_empty());
        let contents = fs::read_to_string(&path).expect("created");
        assert!(contents.starts_with("track_id,name,artist,rating,play_count"));
    }

    #[test]
    fn unrestorable_library_loads_empty() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("tracks.csv");
        save(&path, &sample()).expect("save");
        save(&path, &sample()).expect("save again so .bak holds the data");

        // A directory where the file should be cannot be read as csv.
        fs::remove_file(&path).expect("remove");
        fs::create_dir(&path).expect("dir in place of file");

        // The restore copy cannot overwrite a directory either.
        let tracks = load(&path);
        assert!(tracks.is_empty());
    }

    #[test]
    fn unreadable_library_is_restored_from_backup() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("tracks.csv");
        save(&path, &sample()).expect("save");
        save(&path, &sample()).expect("save again so .bak holds the data");
        fs::write(&path, "garbage").expect("clobber");

        let mut attempts = 0;
        let tracks = load_with(&path, |p| {
            attempts += 1;
            if attempts == 1 {
                Err(LibraryError::io(
                    p,
                    std::io::Error::new(std::io::ErrorKind::Other, "disk hiccup"),
                ))
            } else {
                read_tracks(p)
            }
        });

        assert_eq!(attempts, 2);
        assert_eq!(tracks.len(), 2);
        assert_eq!(tracks["02"].play_count(), 7);
        assert_eq!(
            fs::read_to_string(&path).expect("restored"),
            fs::read_to_string(backup_path(&path)).expect("backup")
        );
    }
}
