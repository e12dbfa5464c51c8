// YouTube Data API search client
// Searches the music category, then fetches durations and view counts for
// every hit in one batched /videos request.

use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::error::YouTubeError;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";
const MUSIC_CATEGORY: &str = "10";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchResult {
    pub video_id: String,
    pub title: String,
    pub channel: String,
    pub thumbnail: Option<String>,
    pub duration: String,
    pub views: u64,
    pub url: String,
}

impl SearchResult {
    // One line for the results list
    pub fn summary(&self) -> String {
        format!(
            "{} - {} [{} • {}]",
            self.title,
            self.channel,
            self.duration,
            format_views(self.views)
        )
    }
}

// Response shapes, only the fields we read

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Snippet {
    title: String,
    #[serde(rename = "channelTitle", default)]
    channel_title: String,
    #[serde(default)]
    thumbnails: Thumbnails,
}

#[derive(Debug, Default, Deserialize)]
struct Thumbnails {
    default: Option<Thumbnail>,
    medium: Option<Thumbnail>,
    high: Option<Thumbnail>,
}

#[derive(Debug, Deserialize)]
struct Thumbnail {
    url: String,
}

#[derive(Debug, Deserialize)]
struct VideosResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    id: String,
    #[serde(rename = "contentDetails")]
    content_details: Option<ContentDetails>,
    statistics: Option<Statistics>,
}

#[derive(Debug, Deserialize)]
struct ContentDetails {
    duration: String,
}

#[derive(Debug, Deserialize)]
struct Statistics {
    #[serde(rename = "viewCount")]
    view_count: Option<String>,
}

pub struct YouTubeApi {
    client: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    warned_missing_key: AtomicBool,
}

impl YouTubeApi {
    pub fn new(api_key: Option<String>) -> Self {
        Self::with_base_url(api_key, API_BASE)
    }

    pub fn with_base_url(api_key: Option<String>, base_url: impl Into<String>) -> Self {
        YouTubeApi {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.into(),
            warned_missing_key: AtomicBool::new(false),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    // Empty on any failure; the reason goes to the log.
    pub async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }

        match self.try_search(query, max_results).await {
            Ok(results) => {
                info!("YouTube search {:?}: {} results", query, results.len());
                results
            }
            Err(YouTubeError::MissingApiKey) => {
                if !self.warned_missing_key.swap(true, Ordering::SeqCst) {
                    warn!("YOUTUBE_API_KEY is not set, YouTube search is disabled");
                }
                Vec::new()
            }
            Err(e) => {
                error!("YouTube search {:?} failed: {}", query, e);
                Vec::new()
            }
        }
    }

    async fn try_search(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<SearchResult>, YouTubeError> {
        let key = self.api_key.as_deref().ok_or(YouTubeError::MissingApiKey)?;
        let max_results = max_results.to_string();

        let search: SearchResponse = self
            .get_json(
                "search",
                &[
                    ("part", "snippet"),
                    ("q", query),
                    ("type", "video"),
                    ("videoCategoryId", MUSIC_CATEGORY),
                    ("maxResults", &max_results),
                    ("key", key),
                ],
            )
            .await?;

        let ids: Vec<&str> = search
            .items
            .iter()
            .filter_map(|item| item.id.video_id.as_deref())
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let videos: VideosResponse = self
            .get_json(
                "videos",
                &[
                    ("part", "contentDetails,statistics"),
                    ("id", &ids.join(",")),
                    ("key", key),
                ],
            )
            .await?;

        Ok(merge_results(search, videos))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T, YouTubeError> {
        let response = self
            .client
            .get(format!("{}/{}", self.base_url, endpoint))
            .query(params)
            .send()
            .await?;

        match response.status() {
            StatusCode::FORBIDDEN => Err(YouTubeError::QuotaExceeded),
            status if !status.is_success() => Err(YouTubeError::Status(status)),
            _ => Ok(response.json::<T>().await?),
        }
    }
}

// Joins search hits with their video details. Hits without details are
// dropped; order follows the search response.
fn merge_results(search: SearchResponse, videos: VideosResponse) -> Vec<SearchResult> {
    search
        .items
        .into_iter()
        .filter_map(|item| {
            let video_id = item.id.video_id?;
            let details = videos.items.iter().find(|v| v.id == video_id)?;
            let duration = details.content_details.as_ref()?;
            let views = details
                .statistics
                .as_ref()
                .and_then(|s| s.view_count.as_deref())
                .and_then(|count| count.parse().ok())
                .unwrap_or(0);

            let thumbnails = item.snippet.thumbnails;
            let thumbnail = thumbnails
                .default
                .or(thumbnails.medium)
                .or(thumbnails.high)
                .map(|t| t.url);

            Some(SearchResult {
                url: format!("https://www.youtube.com/watch?v={}", video_id),
                video_id,
                title: item.snippet.title,
                channel: item.snippet.channel_title,
                thumbnail,
                duration: parse_iso_duration(&duration.duration),
                views,
            })
        })
        .collect()
}

// "PT1H2M3S" -> "1:02:03", "PT4M5S" -> "4:05". Days fold into hours.
pub fn parse_iso_duration(iso: &str) -> String {
    let mut hours = 0u64;
    let mut minutes = 0u64;
    let mut seconds = 0u64;
    let mut number = 0u64;
    let mut in_time = false;

    for c in iso.chars() {
        match c {
            '0'..='9' => {
                number = number.saturating_mul(10).saturating_add(u64::from(c as u8 - b'0'))
            }
            'T' => in_time = true,
            'D' => hours += number.saturating_mul(24),
            'H' if in_time => hours += number,
            'M' if in_time => minutes += number,
            'S' if in_time => seconds += number,
            _ => {}
        }
        if !c.is_ascii_digit() {
            number = 0;
        }
    }

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

pub fn format_views(views: u64) -> String {
    let count = match views {
        v if v >= 1_000_000_000 => format!("{:.1}B", v as f64 / 1_000_000_000.0),
        v if v >= 1_000_000 => format!("{:.1}M", v as f64 / 1_000_000.0),
        v if v >= 1_000 => format!("{:.1}K", v as f64 / 1_000.0),
        v => v.to_string(),
    };
    format!("{} views", count)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_JSON: &str = r#"{
        "items": [
            {
                "id": {"kind": "youtube#video", "videoId": "abc123"},
                "snippet": {
                    "title": "First Song",
                    "channelTitle": "Some Band",
                    "thumbnails": {"default": {"url": "https://i.ytimg.com/vi/abc123/default.jpg"}}
                }
            },
            {
                "id": {"kind": "youtube#channel"},
                "snippet": {"title": "A channel", "channelTitle": "A channel"}
            },
            {
                "id": {"kind": "youtube#video", "videoId": "gone"},
                "snippet": {"title": "Removed", "channelTitle": "Nobody"}
            },
            {
                "id": {"kind": "youtube#video", "videoId": "xyz789"},
                "snippet": {"title": "Long Mix", "channelTitle": "DJ"}
            }
        ]
    }"#;

    const VIDEOS_JSON: &str = r#"{
        "items": [
            {
                "id": "xyz789",
                "contentDetails": {"duration": "PT1H2M3S"},
                "statistics": {"viewCount": "1234567"}
            },
            {
                "id": "abc123",
                "contentDetails": {"duration": "PT4M5S"},
                "statistics": {"viewCount": "999"}
            }
        ]
    }"#;

    #[test]
    fn merges_search_hits_with_details() {
        let search: SearchResponse = serde_json::from_str(SEARCH_JSON).expect("search json");
        let videos: VideosResponse = serde_json::from_str(VIDEOS_JSON).expect("videos json");

        let results = merge_results(search, videos);
        assert_eq!(results.len(), 2);

        assert_eq!(results[0].video_id, "abc123");
        assert_eq!(results[0].title, "First Song");
        assert_eq!(results[0].channel, "Some Band");
        assert_eq!(results[0].duration, "4:05");
        assert_eq!(results[0].views, 999);
        assert_eq!(
            results[0].thumbnail.as_deref(),
            Some("https://i.ytimg.com/vi/abc123/default.jpg")
        );
        assert_eq!(results[0].url, "https://www.youtube.com/watch?v=abc123");

        assert_eq!(results[1].video_id, "xyz789");
        assert_eq!(results[1].duration, "1:02:03");
        assert_eq!(results[1].thumbnail, None);
        assert_eq!(results[1].summary(), "Long Mix - DJ [1:02:03 • 1.2M views]");
    }

    #[test]
    fn empty_responses() {
        let search: SearchResponse = serde_json::from_str("{}").expect("json");
        let videos: VideosResponse = serde_json::from_str("{}").expect("json");
        assert!(merge_results(search, videos).is_empty());
    }

    #[test]
    fn iso_durations() {
        assert_eq!(parse_iso_duration("PT1H2M3S"), "1:02:03");
        assert_eq!(parse_iso_duration("PT4M5S"), "4:05");
        assert_eq!(parse_iso_duration("PT45S"), "0:45");
        assert_eq!(parse_iso_duration("PT10M"), "10:00");
        assert_eq!(parse_iso_duration("PT2H"), "2:00:00");
        assert_eq!(parse_iso_duration("P1DT1M"), "24:01:00");
        assert_eq!(parse_iso_duration(""), "0:00");
    }

    #[test]
    fn view_counts() {
        assert_eq!(format_views(999), "999 views");
        assert_eq!(format_views(3_400), "3.4K views");
        assert_eq!(format_views(1_200_000), "1.2M views");
        assert_eq!(format_views(2_500_000_000), "2.5B views");
        assert_eq!(format_views(0), "0 views");
    }

    #[tokio::test]
    async fn search_without_key_is_empty() {
        let api = YouTubeApi::new(None);
        assert!(!api.is_enabled());
        assert!(api.search("anything", 5).await.is_empty());
        assert!(api.search("again", 5).await.is_empty());
    }

    #[tokio::test]
    async fn unreachable_api_is_empty() {
        let api = YouTubeApi::with_base_url(Some("key".into()), "http://127.0.0.1:9/youtube/v3");
        assert!(api.search("song", 5).await.is_empty());
    }

    #[tokio::test]
    async fn blank_query_is_empty() {
        let api = YouTubeApi::with_base_url(Some("key".into()), "http://127.0.0.1:9/youtube/v3");
        assert!(api.search("   ", 5).await.is_empty());
    }
}
