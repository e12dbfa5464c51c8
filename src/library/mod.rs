pub mod persist;
pub mod store;
pub mod track;
pub mod watcher;

pub use store::{lock_library, Library, LibraryObserver, ObserverId, SearchField, SharedLibrary};
pub use track::Track;
pub use watcher::LibraryWatcher;
