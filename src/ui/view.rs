// Rendering for JukeboxApp
//
// ┌ header: status / prompt / key help ─────────────────┐
// │ library            │ track details                   │
// │                    │ playlist                        │
// │                    │ youtube results                 │
// └ player: now playing, state, strategy, volume, time ─┘

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use crate::player::PlayerState;
use crate::ui::app::{AppMode, Focus, JukeboxApp, Prompt};

const HELP: &str = "[Tab]Focus [j/k]Move [/]Filter [f]Field [Enter]Add [0-5]Rate [x]Remove [c]Clear \
[P]Play list [o]Play track [Space]Pause [S]Stop [n/p]Next/Prev [s]Strategy [←/→]Seek [↑/↓]Volume \
[y]YouTube [d]Download [w/l/X]Save/Load/Delete list [q]Quit";

impl JukeboxApp {
    pub(crate) fn draw(&self, frame: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Min(12),
                Constraint::Length(5),
            ])
            .split(frame.size());

        self.draw_header(frame, chunks[0]);

        let main_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[1]);

        self.draw_library(frame, main_chunks[0]);

        let right = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(7),
                Constraint::Percentage(50),
                Constraint::Percentage(50),
            ])
            .split(main_chunks[1]);

        self.draw_details(frame, right[0]);
        self.draw_playlist(frame, right[1]);
        self.draw_results(frame, right[2]);
        self.draw_player(frame, chunks[2]);
    }

    fn draw_header(&self, frame: &mut Frame, area: Rect) {
        let text = match self.mode {
            AppMode::Prompt(prompt @ (Prompt::LoadPlaylist | Prompt::DeletePlaylist)) => {
                let saved = self.saved_playlists();
                let available = if saved.is_empty() {
                    "none saved".to_string()
                } else {
                    saved.join(", ")
                };
                format!("{} ({}): {}_", prompt.label(), available, self.input)
            }
            AppMode::Prompt(prompt) => format!("{}: {}_", prompt.label(), self.input),
            AppMode::Normal if self.is_searching => "Searching YouTube... please wait".to_string(),
            AppMode::Normal if !self.status_message.is_empty() => self.status_message.clone(),
            AppMode::Normal => HELP.to_string(),
        };

        let title = if self.is_downloading {
            "Jukebox (downloading...)"
        } else {
            "Jukebox"
        };
        let header = Paragraph::new(text)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(header, area);
    }

    fn pane_block(&self, title: String, pane: Focus) -> Block<'static> {
        let style = if self.focus == pane {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        Block::default()
            .borders(Borders::ALL)
            .border_style(style)
            .title(title)
    }

    fn draw_list(
        &self,
        frame: &mut Frame,
        area: Rect,
        items: Vec<ListItem<'static>>,
        selected: usize,
        block: Block<'static>,
        highlight: Color,
    ) {
        let mut state = ListState::default();
        if !items.is_empty() {
            state.select(Some(selected));
        }
        let list = List::new(items)
            .block(block)
            .highlight_style(Style::default().fg(highlight).add_modifier(Modifier::BOLD));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_library(&self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .library_rows
            .iter()
            .map(|(id, track)| ListItem::new(format!("{} {}", id, track.info())))
            .collect();

        let title = if self.filter.is_empty() {
            format!("Library ({})", self.library_rows.len())
        } else {
            format!(
                "Library [{}: {}] ({})",
                self.filter_field.label(),
                self.filter,
                self.library_rows.len()
            )
        };

        let block = self.pane_block(title, Focus::Library);
        self.draw_list(frame, area, items, self.selected_track, block, Color::Yellow);
    }

    fn draw_details(&self, frame: &mut Frame, area: Rect) {
        let text = match self.selected_library_track() {
            Some((id, track)) => {
                let cover = match self.cover_image(id) {
                    Some(path) => path.display().to_string(),
                    None => "none".to_string(),
                };
                format!(
                    "{}\n{}\nrating: {} {}\nplays: {}\ncover: {}",
                    track.name(),
                    track.artist(),
                    track.rating(),
                    track.stars(),
                    track.play_count(),
                    cover
                )
            }
            None => "No track selected".to_string(),
        };

        let details = Paragraph::new(text)
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Track"));
        frame.render_widget(details, area);
    }

    fn draw_playlist(&self, frame: &mut Frame, area: Rect) {
        let current = self.player.current_track();
        let items: Vec<ListItem> = self
            .playlist
            .entries()
            .iter()
            .map(|entry| {
                let marker = if current.as_deref() == Some(entry.track_id.as_str()) {
                    "♪ "
                } else {
                    "  "
                };
                ListItem::new(format!("{}{}", marker, entry.to_line()))
            })
            .collect();

        let title = format!("Playlist ({})", self.playlist.len());
        let block = self.pane_block(title, Focus::Playlist);
        self.draw_list(frame, area, items, self.selected_playlist_item, block, Color::Green);
    }

    fn draw_results(&self, frame: &mut Frame, area: Rect) {
        let items: Vec<ListItem> = self
            .search_results
            .iter()
            .map(|result| ListItem::new(result.summary()))
            .collect();

        let block = self.pane_block("YouTube".to_string(), Focus::Results);
        self.draw_list(frame, area, items, self.selected_result, block, Color::Cyan);
    }

    fn draw_player(&self, frame: &mut Frame, area: Rect) {
        let state_str = match self.player.state() {
            PlayerState::Playing => "▶ Playing",
            PlayerState::Paused => "⏸ Paused",
            PlayerState::Stopped => "⏹ Stopped",
        };

        let position = self.player.position();
        let length = self.player.track_length();
        let time_str = if length > 0.0 {
            format!("{} / {}", Self::format_time(position), Self::format_time(length))
        } else {
            Self::format_time(position)
        };

        let player_info = format!(
            "{}\nState: {} | Mode: {} | Volume: {}% | Time: {}",
            self.track_info,
            state_str,
            self.player.strategy_kind().label(),
            self.player.volume(),
            time_str
        );

        let title = if self.is_playing() { "Player ♪" } else { "Player" };
        let player_widget = Paragraph::new(player_info)
            .block(Block::default().borders(Borders::ALL).title(title));
        frame.render_widget(player_widget, area);
    }
}
