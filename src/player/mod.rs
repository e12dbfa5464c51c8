pub mod audio;
pub mod engine;
pub mod strategy;

pub use audio::{AudioPlayer, PlayerState};
pub use engine::{MusicPlayer, PlayerObserver, PlayerObserverId};
pub use strategy::{PlaybackStrategy, StrategyKind};
