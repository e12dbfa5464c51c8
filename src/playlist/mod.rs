pub mod list;
pub mod manager;

pub use list::{Playlist, PlaylistEntry};
pub use manager::PlaylistManager;
