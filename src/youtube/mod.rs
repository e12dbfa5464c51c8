pub mod api;
pub mod downloader;

pub use api::{format_views, parse_iso_duration, SearchResult, YouTubeApi};
pub use downloader::Downloader;
