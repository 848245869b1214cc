use crate::core::{
    ExtractError, Extractor, MediaKind, MediaReference, PlaylistResult, ResolvedMedia, Result,
};
use crate::extractors::glomex::{playlist_query, thumbnail_url, video_id_from_url, ApiImage};
use crate::utils::{fetch_json, http_client, int_or_none, url_or_none};
use async_trait::async_trait;
use futures::stream::{self, Stream, TryStreamExt};
use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

const LISTING_API_URL: &str = "https://integration-cloudfront-eu-west-1.mes.glomex.cloud/api";

static CHANNEL_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://video\.glomex\.com/channel/(?P<id>\d+)")
        .expect("channel URL pattern compiles")
});

static MOVIE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://video\.glomex\.com/movie/(?P<id>\d+)")
        .expect("movie URL pattern compiles")
});

static PERSON_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://video\.glomex\.com/person/(?P<id>\d+)")
        .expect("person URL pattern compiles")
});

static PLAYLIST_PAGE_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://video\.glomex\.com/[^/]+/v-[^-/?#&]+/?\?")
        .expect("playlist page URL pattern compiles")
});

/// Walks one listing, one page per step. Advanced only by the pagination
/// loop; never shared.
pub(crate) struct PageCursor {
    pub(crate) playlist_id: String,
    pub(crate) item_kind: Option<String>,
    pub(crate) page_number: u32,
    next_page_url: Option<String>,
    exhausted: bool,
}

impl PageCursor {
    fn new(playlist_id: &str, item_kind: Option<&str>) -> Self {
        Self {
            playlist_id: playlist_id.to_owned(),
            item_kind: item_kind.map(str::to_owned),
            page_number: 1,
            next_page_url: None,
            exhausted: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ListingPage {
    results: Option<Value>,
    next: Option<String>,
    has_next: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct ListingEntry {
    clip_id: Option<String>,
    video_url: Option<String>,
    title: Option<String>,
    description: Option<String>,
    image: Option<ApiImage>,
    #[serde(default)]
    clip_duration: Value,
    #[serde(default)]
    created_at: Value,
}

/// Lazy page-by-page walk of a listing API. Each page comes from the prior
/// response's `next` URL or, failing that, from `page_url` applied to the
/// cursor. The walk ends on an absent, empty or non-list result set, and
/// otherwise continues only while the response both names a next page and
/// flags that more exist. A page that fails to fetch or parse ends the whole
/// stream with that error.
fn listing_entries<'a, F>(
    client: &'a reqwest::Client,
    playlist_id: &str,
    item_kind: Option<&str>,
    page_url: F,
) -> impl Stream<Item = Result<MediaReference>> + 'a
where
    F: Fn(&PageCursor) -> String + 'a,
{
    let cursor = PageCursor::new(playlist_id, item_kind);
    stream::try_unfold(cursor, move |mut cursor: PageCursor| {
        let request = if cursor.exhausted {
            None
        } else {
            Some(
                cursor
                    .next_page_url
                    .take()
                    .unwrap_or_else(|| page_url(&cursor)),
            )
        };
        async move {
            let Some(url) = request else { return Ok(None) };
            debug!(
                "downloading page {} for {}",
                cursor.page_number, cursor.playlist_id
            );
            let page: ListingPage = fetch_json(client, &url, &[]).await?;

            let Some(results) = page
                .results
                .as_ref()
                .and_then(Value::as_array)
                .filter(|results| !results.is_empty())
            else {
                return Ok(None);
            };
            let entries: Vec<MediaReference> = results.iter().filter_map(page_entry).collect();

            cursor.next_page_url = page.next;
            cursor.exhausted = cursor.next_page_url.is_none() || !page.has_next.unwrap_or(false);
            cursor.page_number += 1;
            Ok(Some((entries, cursor)))
        }
    })
    .map_ok(|entries| stream::iter(entries.into_iter().map(Ok)))
    .try_flatten()
}

/// A page entry becomes a lightweight reference the framework re-resolves
/// through the video extractor. Entries without a resolvable video URL are
/// dropped.
fn page_entry(value: &Value) -> Option<MediaReference> {
    let entry: ListingEntry = serde_json::from_value(value.clone()).ok()?;
    let video_url = url_or_none(entry.video_url.as_deref())?;
    let id = entry
        .clip_id
        .or_else(|| video_id_from_url(&video_url))
        .unwrap_or_else(|| video_url.clone());

    Some(MediaReference {
        title: entry.title.unwrap_or_else(|| id.clone()),
        description: entry.description,
        thumbnail: thumbnail_url(entry.image.as_ref()),
        duration: int_or_none(&entry.clip_duration).and_then(|d| u64::try_from(d).ok()),
        timestamp: int_or_none(&entry.created_at),
        source_url: video_url,
        kind: MediaKind::DeferredUrl,
        extractor: Some("glomex".to_owned()),
        formats: Vec::new(),
        id,
    })
}

fn match_id(pattern: &Regex, url: &str) -> Result<String> {
    pattern
        .captures(url)
        .map(|captures| captures["id"].to_owned())
        .ok_or_else(|| ExtractError::UnsupportedUrl(url.to_owned()))
}

/// Extractor for video.glomex.com channel listings.
pub struct GlomexChannelExtractor {
    client: reqwest::Client,
    api_url: String,
}

impl GlomexChannelExtractor {
    pub fn new() -> Self {
        Self::with_api_url(LISTING_API_URL)
    }

    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            api_url: api_url.into(),
        }
    }

    pub fn entries<'a>(
        &'a self,
        channel_id: &str,
    ) -> impl Stream<Item = Result<MediaReference>> + 'a {
        let api_url = self.api_url.clone();
        listing_entries(&self.client, channel_id, None, move |cursor| {
            format!(
                "{}/channel/{}/?page={}&format=json",
                api_url, cursor.playlist_id, cursor.page_number
            )
        })
    }
}

#[async_trait]
impl Extractor for GlomexChannelExtractor {
    fn name(&self) -> &'static str {
        "glomex:channel"
    }

    fn suitable(&self, url: &str) -> bool {
        CHANNEL_URL.is_match(url)
    }

    async fn extract(&self, url: &str) -> Result<ResolvedMedia> {
        let channel_id = match_id(&CHANNEL_URL, url)?;
        let entries = self.entries(&channel_id).try_collect().await?;
        Ok(ResolvedMedia::Playlist(PlaylistResult {
            id: channel_id,
            title: None,
            description: None,
            entries,
        }))
    }
}

/// Extractor for video.glomex.com movie listings. The movie record itself
/// provides the playlist title; its episodes come from the paged video
/// listing.
pub struct GlomexMovieExtractor {
    client: reqwest::Client,
    api_url: String,
}

#[derive(Debug, Deserialize)]
struct MovieInfo {
    title: Option<String>,
    description: Option<String>,
}

impl GlomexMovieExtractor {
    pub fn new() -> Self {
        Self::with_api_url(LISTING_API_URL)
    }

    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            api_url: api_url.into(),
        }
    }

    pub fn entries<'a>(
        &'a self,
        movie_id: &str,
    ) -> impl Stream<Item = Result<MediaReference>> + 'a {
        let api_url = self.api_url.clone();
        listing_entries(&self.client, movie_id, None, move |cursor| {
            format!(
                "{}/movie/{}/video/?page={}&format=json",
                api_url, cursor.playlist_id, cursor.page_number
            )
        })
    }
}

#[async_trait]
impl Extractor for GlomexMovieExtractor {
    fn name(&self) -> &'static str {
        "glomex:movie"
    }

    fn suitable(&self, url: &str) -> bool {
        MOVIE_URL.is_match(url)
    }

    async fn extract(&self, url: &str) -> Result<ResolvedMedia> {
        let movie_id = match_id(&MOVIE_URL, url)?;
        debug!("downloading movie JSON for {}", movie_id);
        let movie: MovieInfo = fetch_json(
            &self.client,
            &format!("{}/movie/{}/?format=json", self.api_url, movie_id),
            &[],
        )
        .await?;
        let entries = self.entries(&movie_id).try_collect().await?;
        Ok(ResolvedMedia::Playlist(PlaylistResult {
            id: movie_id,
            title: movie.title,
            description: movie.description,
            entries,
        }))
    }
}

/// Extractor for video.glomex.com person listings.
pub struct GlomexPersonExtractor {
    client: reqwest::Client,
    api_url: String,
}

impl GlomexPersonExtractor {
    pub fn new() -> Self {
        Self::with_api_url(LISTING_API_URL)
    }

    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            api_url: api_url.into(),
        }
    }

    pub fn entries<'a>(
        &'a self,
        person_id: &str,
    ) -> impl Stream<Item = Result<MediaReference>> + 'a {
        let api_url = self.api_url.clone();
        listing_entries(&self.client, person_id, None, move |cursor| {
            format!(
                "{}/person/{}/video/?page={}&format=json",
                api_url, cursor.playlist_id, cursor.page_number
            )
        })
    }
}

#[async_trait]
impl Extractor for GlomexPersonExtractor {
    fn name(&self) -> &'static str {
        "glomex:person"
    }

    fn suitable(&self, url: &str) -> bool {
        PERSON_URL.is_match(url)
    }

    async fn extract(&self, url: &str) -> Result<ResolvedMedia> {
        let person_id = match_id(&PERSON_URL, url)?;
        let entries = self.entries(&person_id).try_collect().await?;
        Ok(ResolvedMedia::Playlist(PlaylistResult {
            id: person_id,
            title: None,
            description: None,
            entries,
        }))
    }
}

/// Extractor for video pages viewed as part of a playlist, recognized by the
/// `pl_type`/`pl_id` query pair. Outranks the plain video extractor.
pub struct GlomexPlaylistExtractor {
    client: reqwest::Client,
    api_url: String,
}

impl GlomexPlaylistExtractor {
    pub fn new() -> Self {
        Self::with_api_url(LISTING_API_URL)
    }

    pub fn with_api_url(api_url: impl Into<String>) -> Self {
        Self {
            client: http_client(),
            api_url: api_url.into(),
        }
    }

    pub fn entries<'a>(
        &'a self,
        playlist_id: &str,
        playlist_kind: &str,
    ) -> impl Stream<Item = Result<MediaReference>> + 'a {
        let api_url = self.api_url.clone();
        listing_entries(
            &self.client,
            playlist_id,
            Some(playlist_kind),
            move |cursor| {
                format!(
                    "{}/playlist/{}/{}/?page={}&format=json",
                    api_url,
                    cursor.item_kind.as_deref().unwrap_or_default(),
                    cursor.playlist_id,
                    cursor.page_number
                )
            },
        )
    }
}

#[async_trait]
impl Extractor for GlomexPlaylistExtractor {
    fn name(&self) -> &'static str {
        "glomex:playlist"
    }

    fn suitable(&self, url: &str) -> bool {
        PLAYLIST_PAGE_URL.is_match(url) && playlist_query(url).is_some()
    }

    async fn extract(&self, url: &str) -> Result<ResolvedMedia> {
        let (playlist_kind, playlist_id) =
            playlist_query(url).ok_or_else(|| ExtractError::UnsupportedUrl(url.to_owned()))?;
        let entries = self.entries(&playlist_id, &playlist_kind).try_collect().await?;
        Ok(ResolvedMedia::Playlist(PlaylistResult {
            id: playlist_id,
            title: None,
            description: None,
            entries,
        }))
    }
}
