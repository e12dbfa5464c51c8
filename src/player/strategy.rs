// ==========================================
// PLAYBACK STRATEGIES
// ==========================================
// A strategy decides where a playlist starts and which index plays after
// the current one. The engine holds one behind a trait object and can swap
// it while running.
//
// - Sequential: 0, 1, 2, ..., N-1, 0, ... (wraps around)
// - Random: any index, uniformly, repeats allowed

use rand::Rng;

use crate::playlist::PlaylistEntry;

pub trait PlaybackStrategy: Send + Sync {
    fn initial_index(&self, playlist: &[PlaylistEntry]) -> usize;

    fn next_index(&self, playlist: &[PlaylistEntry], current_index: usize) -> usize;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialStrategy;

impl PlaybackStrategy for SequentialStrategy {
    fn initial_index(&self, _playlist: &[PlaylistEntry]) -> usize {
        0
    }

    fn next_index(&self, playlist: &[PlaylistEntry], current_index: usize) -> usize {
        if playlist.is_empty() {
            return 0;
        }
        (current_index + 1) % playlist.len()
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RandomStrategy;

impl RandomStrategy {
    fn pick(playlist: &[PlaylistEntry]) -> usize {
        if playlist.is_empty() {
            return 0;
        }
        rand::thread_rng().gen_range(0..playlist.len())
    }
}

impl PlaybackStrategy for RandomStrategy {
    fn initial_index(&self, playlist: &[PlaylistEntry]) -> usize {
        Self::pick(playlist)
    }

    // May return current_index again.
    fn next_index(&self, playlist: &[PlaylistEntry], _current_index: usize) -> usize {
        Self::pick(playlist)
    }
}

// Which strategy is active, for the UI and for rebuilding the trait object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrategyKind {
    #[default]
    Sequential,
    Random,
}

impl StrategyKind {
    pub fn build(self) -> Box<dyn PlaybackStrategy> {
        match self {
            StrategyKind::Sequential => Box::new(SequentialStrategy),
            StrategyKind::Random => Box::new(RandomStrategy),
        }
    }

    pub fn toggle(self) -> StrategyKind {
        match self {
            StrategyKind::Sequential => StrategyKind::Random,
            StrategyKind::Random => StrategyKind::Sequential,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StrategyKind::Sequential => "Sequential",
            StrategyKind::Random => "Random",
        }
    }
}
