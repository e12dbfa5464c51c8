// ==========================================
// TRACK RECORD
// ==========================================
// A single entry of the music library.
//
// The library identifies tracks externally by a two-digit, zero-padded id
// ("01", "02", ...). The id is the key of the library map, so it is not
// stored on the record itself.

use std::path::{Path, PathBuf};

pub const MAX_RATING: u8 = 5;

// ==========================================
// TRACK STRUCT
// ==========================================
// Fields explained:
//
// name / artist: String
//   - Shown in the library list and in "Now Playing"
//
// rating: u8
//   - Always within 0..=5
//   - set_rating() silently ignores anything outside that range
//
// play_count: u32
//   - Only ever goes up, one step at a time
//
// file_path: Option<PathBuf>
//   - Audio file backing the track, when one is known
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    name: String,
    artist: String,
    rating: u8,
    play_count: u32,
    file_path: Option<PathBuf>,
}

impl Track {
    // Ratings above MAX_RATING are dropped to 0, matching set_rating's
    // "ignore invalid values" rule for a fresh record.
    pub fn new(name: impl Into<String>, artist: impl Into<String>, rating: u8) -> Self {
        let mut track = Track {
            name: name.into(),
            artist: artist.into(),
            rating: 0,
            play_count: 0,
            file_path: None,
        };
        track.set_rating(rating);
        track
    }

    pub fn with_play_count(mut self, play_count: u32) -> Self {
        self.play_count = play_count;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn artist(&self) -> &str {
        &self.artist
    }

    pub fn rating(&self) -> u8 {
        self.rating
    }

    // Out-of-range values leave the previous rating untouched.
    pub fn set_rating(&mut self, rating: u8) {
        if rating <= MAX_RATING {
            self.rating = rating;
        }
    }

    pub fn play_count(&self) -> u32 {
        self.play_count
    }

    pub fn increment_play_count(&mut self) {
        self.play_count = self.play_count.saturating_add(1);
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn set_file_path(&mut self, path: impl Into<PathBuf>) {
        self.file_path = Some(path.into());
    }

    pub fn stars(&self) -> String {
        "*".repeat(self.rating as usize)
    }

    // "Name - Artist ***"
    pub fn info(&self) -> String {
        format!("{} - {} {}", self.name, self.artist, self.stars())
    }
}

// ==========================================
// TRACK IDS
// ==========================================
// Pads short ids to two digits: "3" -> "03". Longer ids are left alone,
// so "123" stays "123".
pub fn normalize_id(id: &str) -> String {
    let id = id.trim();
    format!("{:0>2}", id)
}

// Numeric value of an id, used for sorting and allocating new ids.
pub fn id_number(id: &str) -> Option<u32> {
    id.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rating_outside_range_is_ignored() {
        let mut track = Track::new("Song", "Artist", 3);
        track.set_rating(6);
        assert_eq!(track.rating(), 3);
        track.set_rating(0);
        assert_eq!(track.rating(), 0);
        track.set_rating(5);
        assert_eq!(track.rating(), 5);
    }

    #[test]
    fn new_with_invalid_rating_starts_at_zero() {
        let track = Track::new("Song", "Artist", 9);
        assert_eq!(track.rating(), 0);
    }

    #[test]
    fn play_count_increments_by_one() {
        let mut track = Track::new("Song", "Artist", 0).with_play_count(4);
        track.increment_play_count();
        assert_eq!(track.play_count(), 5);
    }

    #[test]
    fn info_shows_stars() {
        let track = Track::new("Another Brick", "Pink Floyd", 4);
        assert_eq!(track.stars(), "****");
        assert_eq!(track.info(), "Another Brick - Pink Floyd ****");
    }

    #[test]
    fn ids_are_zero_padded() {
        assert_eq!(normalize_id("3"), "03");
        assert_eq!(normalize_id("03"), "03");
        assert_eq!(normalize_id(" 7 "), "07");
        assert_eq!(normalize_id("123"), "123");
        assert_eq!(id_number("09"), Some(9));
        assert_eq!(id_number("x1"), None);
    }
}
