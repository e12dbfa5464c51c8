// Library file watcher
// Watches the directory holding the library CSV and asks the store to
// reload when the file is edited by someone else (the add/remove tools,
// a text editor). The store itself filters out our own writes by mtime.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, error, info};

use crate::library::store::{lock_library, Library, SharedLibrary};

pub struct LibraryWatcher {
    // Dropping the notify watcher stops the OS subscription.
    _watcher: RecommendedWatcher,
    watched_dir: PathBuf,
}

impl LibraryWatcher {
    pub fn start(library: &SharedLibrary) -> notify::Result<Self> {
        let library_file = lock_library(library).library_file().to_path_buf();
        let watched_dir = match library_file.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = library_file
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();

        // Weak: the watcher must not keep the library alive.
        let weak: Weak<Mutex<Library>> = Arc::downgrade(library);

        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| {
            match result {
                Ok(event) => {
                    if !is_library_event(&event, &file_name) {
                        return;
                    }
                    if let Some(library) = weak.upgrade() {
                        debug!("Library file event: {:?}", event.kind);
                        lock_library(&library).reload_if_changed();
                    }
                }
                Err(e) => error!("File watcher error: {}", e),
            }
        })?;

        watcher.watch(&watched_dir, RecursiveMode::NonRecursive)?;
        info!("Watching {:?} for library changes", watched_dir);

        Ok(LibraryWatcher {
            _watcher: watcher,
            watched_dir,
        })
    }

    pub fn watched_dir(&self) -> &Path {
        &self.watched_dir
    }
}

// Modify or create events that touch the library file by name. Renames
// count too: our own temp-file replace shows up as one.
fn is_library_event(event: &Event, file_name: &std::ffi::OsStr) -> bool {
    let relevant_kind = matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_));
    relevant_kind
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == Some(file_name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, ModifyKind, RemoveKind};
    use std::ffi::OsStr;

    fn event(kind: EventKind, path: &str) -> Event {
        Event::new(kind).add_path(PathBuf::from(path))
    }

    #[test]
    fn only_library_file_modifications_count() {
        let name = OsStr::new("tracks.csv");

        let modify = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            "/data/tracks.csv",
        );
        assert!(is_library_event(&modify, name));

        let create = event(EventKind::Create(CreateKind::File), "/data/tracks.csv");
        assert!(is_library_event(&create, name));

        let other_file = event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            "/data/tracks.csv.bak",
        );
        assert!(!is_library_event(&other_file, name));

        let removed = event(EventKind::Remove(RemoveKind::File), "/data/tracks.csv");
        assert!(!is_library_event(&removed, name));
    }

    #[test]
    fn watches_library_directory() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let library = Library::open(temp.path().join("tracks.csv"), temp.path().join("tracks")).shared();

        let watcher = LibraryWatcher::start(&library).expect("watcher");
        assert_eq!(watcher.watched_dir(), temp.path());
    }
}
