// ==========================================
// PLAYLIST
// ==========================================
// The playlist being built in the UI: an ordered list of
// (track id, track name) entries.
//
// Unlike the library there is no uniqueness rule at the data level; the
// only guard is the duplicate check in add(), which is what the UI uses
// when the user picks a track.

// ==========================================
// PLAYLIST ENTRY
// ==========================================
// track_id: String
//   - Two-digit library id, e.g. "03"
//   - Used to find the audio file and library metadata when playing
//
// name: String
//   - Track name captured when the entry was added
//   - Shown in the playlist pane and written to playlist files
//   - Stays put even if the library entry is renamed later
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub track_id: String,
    pub name: String,
}

impl PlaylistEntry {
    pub fn new(track_id: impl Into<String>, name: impl Into<String>) -> Self {
        PlaylistEntry {
            track_id: track_id.into(),
            name: name.into(),
        }
    }

    // "03 - Song name", the playlist file line format
    pub fn to_line(&self) -> String {
        format!("{} - {}", self.track_id, self.name)
    }

    // Splits on the first " - ". Lines without it, or with an empty id or
    // name, are rejected.
    pub fn parse_line(line: &str) -> Option<Self> {
        let (id, name) = line.trim().split_once(" - ")?;
        let (id, name) = (id.trim(), name.trim());
        if id.is_empty() || name.is_empty() {
            return None;
        }
        Some(PlaylistEntry::new(id, name))
    }
}

// ==========================================
// PLAYLIST STRUCT
// ==========================================
// entries: Vec<PlaylistEntry>
//   - Play order, index 0 first
//   - Plain Vec: playlists are small and edited by index from the UI
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    entries: Vec<PlaylistEntry>,
}

impl Playlist {
    pub fn new() -> Self {
        Playlist { entries: Vec::new() }
    }

    pub fn from_entries(entries: Vec<PlaylistEntry>) -> Self {
        Playlist { entries }
    }

    // ==========================================
    // ADDING TRACKS: add()
    // ==========================================
    // Appends an entry unless one with the same track id is already there.
    //
    // Returns: bool
    // - true: entry appended at the end
    // - false: duplicate id, playlist unchanged
    pub fn add(&mut self, entry: PlaylistEntry) -> bool {
        if self.contains(&entry.track_id) {
            return false;
        }
        self.entries.push(entry);
        true
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.entries.iter().any(|e| e.track_id == track_id)
    }

    // ==========================================
    // PLAYLIST MANAGEMENT: remove()
    // ==========================================
    // Removes the entry at `index` and returns it.
    //
    // Returns: Option<PlaylistEntry>
    // - Some(entry): removed
    // - None: index out of bounds, nothing changed
    pub fn remove(&mut self, index: usize) -> Option<PlaylistEntry> {
        if index < self.entries.len() {
            Some(self.entries.remove(index))
        } else {
            None
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    // Replaces the contents, e.g. after loading a playlist file.
    pub fn replace(&mut self, entries: Vec<PlaylistEntry>) {
        self.entries = entries;
    }

    pub fn entries(&self) -> &[PlaylistEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&PlaylistEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // One "id - name" per line, as shown in the playlist pane.
    pub fn to_text(&self) -> String {
        self.entries
            .iter()
            .map(PlaylistEntry::to_line)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rejects_duplicate_ids() {
        let mut playlist = Playlist::new();
        assert!(playlist.add(PlaylistEntry::new("01", "First")));
        assert!(playlist.add(PlaylistEntry::new("02", "Second")));
        assert!(!playlist.add(PlaylistEntry::new("01", "First again")));
        assert_eq!(playlist.len(), 2);
    }

    #[test]
    fn remove_by_index() {
        let mut playlist = Playlist::from_entries(vec![
            PlaylistEntry::new("01", "A"),
            PlaylistEntry::new("02", "B"),
            PlaylistEntry::new("03", "C"),
        ]);

        assert_eq!(playlist.remove(1), Some(PlaylistEntry::new("02", "B")));
        assert_eq!(playlist.remove(10), None);
        assert_eq!(playlist.to_text(), "01 - A\n03 - C");
    }

    #[test]
    fn parse_line_splits_on_first_separator() {
        assert_eq!(
            PlaylistEntry::parse_line("04 - Song - Live Version\n"),
            Some(PlaylistEntry::new("04", "Song - Live Version"))
        );
        assert_eq!(PlaylistEntry::parse_line("no separator here"), None);
        assert_eq!(PlaylistEntry::parse_line(" - missing id"), None);
        assert_eq!(PlaylistEntry::parse_line(""), None);
    }
}
