use crate::core::{
    ExtractError, Extractor, MediaFormat, MediaKind, MediaReference, PlaylistResult,
    ResolvedMedia, Result,
};
use crate::utils::{
    self, determine_ext, fetch_json, http_client, int_or_none, smuggle_url, sort_formats,
    unsmuggle_url,
};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::LazyLock;
use tracing::{debug, warn};
use url::Url;

const DEFAULT_ORIGIN_URL: &str = "https://player.glomex.com/";
const API_URL: &str = "https://integration-cloudfront-eu-west-1.mes.glomex.cloud/";
const BASE_PLAYER_URL: &str = "https://player.glomex.com/integration/1/iframe-player.html";
/// Integration ID used by video.glomex.com itself.
const INTEGRATION_ID: &str = "19syy24xjn1oqlpc";

static VIDEO_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://video\.glomex\.com/[^/]+/(?P<id>v-[^-/?#&]+)")
        .expect("video URL pattern compiles")
});

static EMBED_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:https?:)?//player\.glomex\.com/integration/[^/]+/iframe-player\.html\?")
        .expect("embed URL pattern compiles")
});

// Embed markup matchers, one per form the player integration docs describe:
// https://docs.glomex.com/publisher/video-player-integration/javascript-api/
// Quote consistency is per occurrence: each matcher carries one alternation
// arm per quote character, so an attribute opened with `"` must close with it.
static IFRAME_EMBED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r#"(?is)<iframe\b[^>]*?\bsrc\s*=\s*"#,
        r#"(?:"(?P<dq>(?:https?:)?//player\.glomex\.com/integration/[^/"]+/iframe-player\.html\?[^"]*)""#,
        r#"|'(?P<sq>(?:https?:)?//player\.glomex\.com/integration/[^/']+/iframe-player\.html\?[^']*)')"#,
    ))
    .expect("iframe embed pattern compiles")
});

static PLAYER_ELEMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?P<tag>glomex-player|div)\b(?P<attrs>[^>]*)>")
        .expect("player element pattern compiles")
});

static PLAYER_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bdata-glomex-player\s*=\s*(?:"true"|'true')"#)
        .expect("player marker pattern compiles")
});

static ATTR_INTEGRATION_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bdata-integration-id\s*=\s*(?:"(?P<dq>[^"]+)"|'(?P<sq>[^']+)')"#)
        .expect("integration attribute pattern compiles")
});

static ATTR_PLAYLIST_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bdata-playlist-id\s*=\s*(?:"(?P<dq>[^"]+)"|'(?P<sq>[^']+)')"#)
        .expect("playlist attribute pattern compiles")
});

static SCRIPT_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>(?P<body>.*?)</script>")
        .expect("script block pattern compiles")
});

static JS_INTEGRATION_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:dataset\s*\.\s*)?\bintegrationId\b\s*[:=]\s*(?:"(?P<dq>[^"]+)"|'(?P<sq>[^']+)')"#)
        .expect("script integration pattern compiles")
});

static JS_PLAYLIST_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:dataset\s*\.\s*)?\bplaylistId\b\s*[:=]\s*(?:"(?P<dq>[^"]+)"|'(?P<sq>[^']+)')"#)
        .expect("script playlist pattern compiles")
});

pub(crate) fn ensure_scheme(url: &str) -> Cow<'_, str> {
    if url.starts_with("//") {
        Cow::Owned(format!("https:{url}"))
    } else {
        Cow::Borrowed(url)
    }
}

fn smuggle_origin_url(url: &str, origin_url: &str) -> String {
    let data = HashMap::from([("origin".to_owned(), origin_url.to_owned())]);
    smuggle_url(url, &data)
}

fn unsmuggle_origin_url(url: &str, fallback_origin_url: Option<&str>) -> (String, String) {
    let (url, data) = unsmuggle_url(url);
    let origin_url = data
        .and_then(|mut data| data.remove("origin"))
        .unwrap_or_else(|| fallback_origin_url.unwrap_or(DEFAULT_ORIGIN_URL).to_owned());
    (url, origin_url)
}

/// Playlist IDs are namespaced by a short prefix code.
fn playlist_id_kind(playlist_id: &str) -> &'static str {
    match playlist_id.split('-').next().unwrap_or("") {
        "v" => "video",
        "pl" => "playlist",
        "rl" => "related videos playlist",
        "cl" => "curated playlist",
        _ => "unknown type",
    }
}

pub(crate) fn video_id_from_url(url: &str) -> Option<String> {
    VIDEO_URL
        .captures(url)
        .map(|captures| captures["id"].to_owned())
}

/// The `pl_type`/`pl_id` query pair claimed by the playlist extractor.
/// `pl_id` must be numeric for the pair to count.
pub(crate) fn playlist_query(url: &str) -> Option<(String, String)> {
    let parsed = Url::parse(&ensure_scheme(url)).ok()?;
    let mut playlist_kind = None;
    let mut playlist_id = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "pl_type" if !value.is_empty() => playlist_kind = Some(value.into_owned()),
            "pl_id" if value.parse::<u64>().is_ok() => playlist_id = Some(value.into_owned()),
            _ => {}
        }
    }
    Some((playlist_kind?, playlist_id?))
}

pub(crate) fn thumbnail_url(image: Option<&ApiImage>) -> Option<String> {
    image
        .and_then(|image| image.url.as_deref())
        .map(|url| format!("{url}/profile:player-960x540"))
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    videos: Vec<ApiVideo>,
}

/// The API answers with either a normal clip or a geo-restriction record in
/// the video slot; the two shapes are told apart by the error code.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ApiVideo {
    Restricted(GeoRestriction),
    Clip(ApiClip),
}

#[derive(Debug, Deserialize)]
struct GeoRestriction {
    error_code: RestrictionCode,
    #[serde(default)]
    geo_locations: Vec<String>,
}

#[derive(Debug, Deserialize)]
enum RestrictionCode {
    #[serde(rename = "contentGeoblocked")]
    ContentGeoblocked,
}

#[derive(Debug, Deserialize)]
struct ApiClip {
    clip_id: Option<String>,
    title: Option<String>,
    description: Option<String>,
    image: Option<ApiImage>,
    #[serde(default)]
    clip_duration: Value,
    #[serde(default)]
    created_at: Value,
    /// format label -> media URL
    #[serde(default)]
    source: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiImage {
    pub(crate) url: Option<String>,
}

/// Extractor for video.glomex.com video pages. Defers to the embed extractor
/// through a player URL built from the page's video ID and the site's own
/// integration ID.
pub struct GlomexExtractor;

impl GlomexExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Extractor for GlomexExtractor {
    fn name(&self) -> &'static str {
        "glomex"
    }

    fn suitable(&self, url: &str) -> bool {
        // URLs carrying a pl_type/pl_id pair belong to the playlist extractor.
        VIDEO_URL.is_match(url) && playlist_query(url).is_none()
    }

    async fn extract(&self, url: &str) -> Result<ResolvedMedia> {
        let video_id = video_id_from_url(url)
            .ok_or_else(|| ExtractError::UnsupportedUrl(url.to_owned()))?;
        let player_url =
            GlomexEmbedExtractor::build_player_url(&video_id, INTEGRATION_ID, Some(url));

        Ok(ResolvedMedia::Single(MediaReference {
            title: video_id.clone(),
            description: None,
            thumbnail: None,
            duration: None,
            timestamp: None,
            source_url: player_url,
            kind: MediaKind::DeferredUrl,
            extractor: Some("glomex:embed".to_owned()),
            formats: Vec::new(),
            id: video_id,
        }))
    }
}

/// Extractor for player.glomex.com iframe URLs, smuggled or not. Also hosts
/// the embed scanner and the player URL constructor used by sibling
/// extractors.
pub struct GlomexEmbedExtractor {
    client: reqwest::Client,
    api_url: String,
}

impl GlomexEmbedExtractor {
    pub fn new() -> Self {
        Self::with_api_url(API_URL)
    }

    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            api_url: api_url.into(),
        }
    }

    /// Player URL for a bare video ID and integration ID. When an origin URL
    /// is given it is smuggled onto the result so a later resolution can
    /// report where the embed was found.
    pub fn build_player_url(
        video_id: &str,
        integration_id: &str,
        origin_url: Option<&str>,
    ) -> String {
        let player_url = format!(
            "{BASE_PLAYER_URL}?playlistId={}&integrationId={}",
            urlencoding::encode(video_id),
            urlencoding::encode(integration_id),
        );
        match origin_url {
            Some(origin_url) => smuggle_origin_url(&player_url, origin_url),
            None => player_url,
        }
    }

    /// Scan a webpage for embedded players and return candidate player URLs
    /// in document order. Three independent passes cover the documented embed
    /// forms: iframes, player elements, and inline script configuration.
    /// Candidates with missing pieces are dropped, never errors.
    pub fn find_embed_urls(webpage: &str, origin_url: &str) -> Vec<String> {
        let mut candidates: Vec<(usize, String)> = Vec::new();

        for captures in IFRAME_EMBED.captures_iter(webpage) {
            let Some(src) = captures.name("dq").or_else(|| captures.name("sq")) else {
                continue;
            };
            let player_url = html_escape::decode_html_entities(src.as_str()).into_owned();
            let position = captures.get(0).map_or(0, |m| m.start());
            candidates.push((position, smuggle_origin_url(&player_url, origin_url)));
        }

        for captures in PLAYER_ELEMENT.captures_iter(webpage) {
            let attrs = captures.name("attrs").map_or("", |m| m.as_str());
            // A plain div only counts when it is explicitly marked as a player.
            if captures["tag"].eq_ignore_ascii_case("div") && !PLAYER_MARKER.is_match(attrs) {
                continue;
            }
            let Some(integration_id) = attr_value(&ATTR_INTEGRATION_ID, attrs) else {
                continue;
            };
            let Some(playlist_id) = attr_value(&ATTR_PLAYLIST_ID, attrs) else {
                continue;
            };
            let position = captures.get(0).map_or(0, |m| m.start());
            candidates.push((
                position,
                Self::build_player_url(&playlist_id, &integration_id, None),
            ));
        }

        for captures in SCRIPT_BLOCK.captures_iter(webpage) {
            let body = captures.name("body").map_or("", |m| m.as_str());
            let (Some(integration_id), Some(playlist_id)) = (
                attr_value(&JS_INTEGRATION_ID, body),
                attr_value(&JS_PLAYLIST_ID, body),
            ) else {
                continue;
            };
            let position = captures.get(0).map_or(0, |m| m.start());
            candidates.push((
                position,
                Self::build_player_url(&playlist_id, &integration_id, None),
            ));
        }

        candidates.sort_by_key(|(position, _)| *position);
        candidates
            .into_iter()
            .map(|(_, player_url)| player_url)
            .collect()
    }

    pub(crate) async fn download_and_extract(
        &self,
        playlist_id: &str,
        integration_id: &str,
        origin_url: &str,
    ) -> Result<ResolvedMedia> {
        debug!(
            "downloading {} JSON for {}",
            playlist_id_kind(playlist_id),
            playlist_id
        );
        let query = [
            ("integration_id", integration_id),
            ("playlist_id", playlist_id),
            ("current_url", origin_url),
        ];
        let response: ApiResponse = fetch_json(&self.client, &self.api_url, &query).await?;

        let mut videos = response.videos;
        if videos.is_empty() {
            return Err(ExtractError::NoContent(playlist_id.to_owned()));
        }
        if videos.len() == 1 {
            let reference = self
                .extract_api_video(videos.remove(0), playlist_id, integration_id)
                .await?;
            return Ok(ResolvedMedia::Single(reference));
        }

        let mut entries = Vec::with_capacity(videos.len());
        for video in videos {
            entries.push(
                self.extract_api_video(video, playlist_id, integration_id)
                    .await?,
            );
        }
        // The playlist borrows its metadata from the first entry.
        let title = Some(entries[0].title.clone());
        let description = entries[0].description.clone();
        Ok(ResolvedMedia::Playlist(PlaylistResult {
            id: playlist_id.to_owned(),
            title,
            description,
            entries,
        }))
    }

    async fn extract_api_video(
        &self,
        video: ApiVideo,
        playlist_id: &str,
        integration_id: &str,
    ) -> Result<MediaReference> {
        let clip = match video {
            ApiVideo::Restricted(GeoRestriction {
                error_code: RestrictionCode::ContentGeoblocked,
                geo_locations,
            }) => {
                return Err(ExtractError::GeoRestricted {
                    countries: geo_locations,
                })
            }
            ApiVideo::Clip(clip) => clip,
        };

        let id = clip
            .clip_id
            .clone()
            .unwrap_or_else(|| playlist_id.to_owned());
        let formats = self.extract_formats(&clip, &id).await;

        Ok(MediaReference {
            title: clip.title.clone().unwrap_or_else(|| id.clone()),
            description: clip.description.clone(),
            thumbnail: thumbnail_url(clip.image.as_ref()),
            duration: int_or_none(&clip.clip_duration).and_then(|d| u64::try_from(d).ok()),
            timestamp: int_or_none(&clip.created_at),
            source_url: Self::build_player_url(&id, integration_id, None),
            kind: MediaKind::Video,
            extractor: None,
            formats,
            id,
        })
    }

    /// Turn the clip's label -> URL source mapping into format records.
    /// Adaptive manifests expand into their quality variants; a manifest that
    /// fails to download or parse drops its label instead of failing the
    /// whole clip.
    async fn extract_formats(&self, clip: &ApiClip, video_id: &str) -> Vec<MediaFormat> {
        let mut formats = Vec::new();
        for (format_id, format_url) in &clip.source {
            if determine_ext(format_url).as_deref() == Some("m3u8") {
                match utils::hls::extract_m3u8_formats(&self.client, format_url, format_id).await {
                    Ok(expanded) => formats.extend(expanded),
                    Err(err) => {
                        warn!("skipping format {} of {}: {}", format_id, video_id, err);
                    }
                }
            } else {
                formats.push(MediaFormat {
                    format_id: format_id.clone(),
                    url: format_url.clone(),
                    ext: determine_ext(format_url).unwrap_or_else(|| "mp4".to_owned()),
                    width: None,
                    height: None,
                    fps: None,
                    tbr: None,
                    vcodec: None,
                    acodec: None,
                });
            }
        }
        sort_formats(&mut formats);
        formats
    }
}

fn attr_value(pattern: &Regex, haystack: &str) -> Option<String> {
    pattern.captures(haystack).and_then(|captures| {
        captures
            .name("dq")
            .or_else(|| captures.name("sq"))
            .map(|m| html_escape::decode_html_entities(m.as_str()).into_owned())
    })
}

#[async_trait]
impl Extractor for GlomexEmbedExtractor {
    fn name(&self) -> &'static str {
        "glomex:embed"
    }

    fn suitable(&self, url: &str) -> bool {
        EMBED_URL.is_match(url)
    }

    async fn extract(&self, url: &str) -> Result<ResolvedMedia> {
        let (url, origin_url) = unsmuggle_origin_url(url, None);
        let parsed = Url::parse(&ensure_scheme(&url)).map_err(|source| ExtractError::Url {
            url: url.clone(),
            source,
        })?;

        let mut playlist_id = None;
        let mut integration_id = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "playlistId" => playlist_id = Some(value.into_owned()),
                "integrationId" => integration_id = Some(value.into_owned()),
                _ => {}
            }
        }
        let (Some(playlist_id), Some(integration_id)) = (playlist_id, integration_id) else {
            return Err(ExtractError::UnsupportedUrl(url));
        };

        self.download_and_extract(&playlist_id, &integration_id, &origin_url)
            .await
    }
}
