use serde::{Deserialize, Serialize};

/// A single resolved (or resolvable) media item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaReference {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    /// Duration in seconds.
    pub duration: Option<u64>,
    /// Unix timestamp of publication.
    pub timestamp: Option<i64>,
    /// For `MediaKind::Video` the canonical player URL; for
    /// `MediaKind::DeferredUrl` the URL the framework must resolve next.
    pub source_url: String,
    pub kind: MediaKind,
    /// Name of the extractor that should handle `source_url` when this
    /// reference is deferred.
    pub extractor: Option<String>,
    pub formats: Vec<MediaFormat>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Fully resolved; `formats` is usable as-is.
    Video,
    /// Provisional metadata only; `source_url` needs another resolution pass.
    DeferredUrl,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFormat {
    pub format_id: String,
    pub url: String,
    pub ext: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub fps: Option<f64>,
    /// Total bitrate in KBit/s.
    pub tbr: Option<f64>,
    pub vcodec: Option<String>,
    pub acodec: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistResult {
    pub id: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub entries: Vec<MediaReference>,
}

/// What an extractor hands back to the framework.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResolvedMedia {
    Single(MediaReference),
    Playlist(PlaylistResult),
}

impl ResolvedMedia {
    pub fn as_single(&self) -> Option<&MediaReference> {
        match self {
            ResolvedMedia::Single(reference) => Some(reference),
            ResolvedMedia::Playlist(_) => None,
        }
    }

    pub fn as_playlist(&self) -> Option<&PlaylistResult> {
        match self {
            ResolvedMedia::Single(_) => None,
            ResolvedMedia::Playlist(playlist) => Some(playlist),
        }
    }
}
