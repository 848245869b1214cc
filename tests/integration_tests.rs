use anyhow::Result;
use futures::TryStreamExt;
use glomex_dl::utils::unsmuggle_url;
use glomex_dl::{
    ExtractError, Extractor, ExtractorEngine, GlomexChannelExtractor, GlomexEmbedExtractor,
    GlomexExtractor, GlomexMovieExtractor, GlomexPlaylistExtractor, MediaKind,
};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MASTER_MANIFEST: &str = "#EXTM3U\n\
#EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=640x360,CODECS=\"avc1.64001e,mp4a.40.2\"\n\
low/index.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=2560000,RESOLUTION=1280x720,CODECS=\"avc1.64001f,mp4a.40.2\"\n\
hi/index.m3u8\n";

fn page_entry_json(clip_id: &str, title: &str) -> serde_json::Value {
    json!({
        "clip_id": clip_id,
        "video_url": format!("https://video.glomex.com/sport/{clip_id}"),
        "title": title,
        "clip_duration": 60,
    })
}

#[tokio::test]
async fn test_video_page_defers_to_embed_extractor() -> Result<()> {
    let extractor = GlomexExtractor::new();
    let page_url = "https://video.glomex.com/sport/v-cb24uwg77hgh";
    let resolved = extractor.extract(page_url).await?;

    let reference = resolved.as_single().expect("single reference");
    assert_eq!(reference.id, "v-cb24uwg77hgh");
    assert_eq!(reference.kind, MediaKind::DeferredUrl);
    assert_eq!(reference.extractor.as_deref(), Some("glomex:embed"));

    let (player_url, data) = unsmuggle_url(&reference.source_url);
    assert!(player_url.contains("playlistId=v-cb24uwg77hgh"));
    assert!(player_url.contains("integrationId=19syy24xjn1oqlpc"));
    let data = data.expect("origin smuggled onto player URL");
    assert_eq!(data.get("origin").map(String::as_str), Some(page_url));
    Ok(())
}

#[tokio::test]
async fn test_embed_resolves_single_video() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("integration_id", "abc"))
        .and(query_param("playlist_id", "v-req"))
        .and(query_param("current_url", "https://player.glomex.com/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "videos": [{
                "clip_id": "v-clip99",
                "title": "Kangaroo visits pharmacy",
                "description": "An unexpected customer",
                "image": {"url": "https://images.glomex.com/v-clip99"},
                "clip_duration": "81",
                "created_at": 1381943602,
                "source": {
                    "progressive": "https://cdn.glomex.com/v-clip99.mp4"
                },
            }],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = GlomexEmbedExtractor::with_api_url(server.uri());
    let resolved = extractor
        .extract("https://player.glomex.com/integration/1/iframe-player.html?playlistId=v-req&integrationId=abc")
        .await?;

    let reference = resolved.as_single().expect("single reference");
    assert_eq!(reference.id, "v-clip99");
    assert_eq!(reference.title, "Kangaroo visits pharmacy");
    assert_eq!(reference.description.as_deref(), Some("An unexpected customer"));
    assert_eq!(
        reference.thumbnail.as_deref(),
        Some("https://images.glomex.com/v-clip99/profile:player-960x540")
    );
    assert_eq!(reference.duration, Some(81));
    assert_eq!(reference.timestamp, Some(1381943602));
    assert_eq!(reference.kind, MediaKind::Video);
    assert_eq!(reference.formats.len(), 1);
    assert_eq!(reference.formats[0].format_id, "progressive");
    assert_eq!(reference.formats[0].ext, "mp4");
    Ok(())
}

#[tokio::test]
async fn test_embed_expands_hls_formats() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "videos": [{
                "clip_id": "v-abc",
                "title": "Streamed",
                "source": {
                    "hls": format!("{}/media/master.m3u8", server.uri()),
                    "progressive": "https://cdn.glomex.com/v-abc.mp4",
                },
            }],
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/master.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MASTER_MANIFEST))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = GlomexEmbedExtractor::with_api_url(server.uri());
    let resolved = extractor
        .extract(&GlomexEmbedExtractor::build_player_url("v-abc", "abc", None))
        .await?;

    let reference = resolved.as_single().expect("single reference");
    let ids: Vec<&str> = reference
        .formats
        .iter()
        .map(|format| format.format_id.as_str())
        .collect();
    // Worst-first: the direct file has no known height, then the variants.
    assert_eq!(ids, ["progressive", "hls-1280000", "hls-2560000"]);
    assert_eq!(
        reference.formats[1].url,
        format!("{}/media/low/index.m3u8", server.uri())
    );
    assert_eq!(reference.formats[2].height, Some(720));
    assert_eq!(reference.formats[2].vcodec.as_deref(), Some("avc1.64001f"));
    Ok(())
}

#[tokio::test]
async fn test_embed_forwards_smuggled_origin() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("current_url", "https://example.com/article"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "videos": [{"clip_id": "v-abc", "title": "Embedded", "source": {}}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = GlomexEmbedExtractor::with_api_url(server.uri());
    let smuggled = GlomexEmbedExtractor::build_player_url(
        "v-abc",
        "abc",
        Some("https://example.com/article"),
    );
    let resolved = extractor.extract(&smuggled).await?;
    assert!(resolved.as_single().is_some());
    Ok(())
}

#[tokio::test]
async fn test_embed_reports_geo_restriction() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "videos": [{
                "error_code": "contentGeoblocked",
                "geo_locations": ["US", "CA"],
            }],
        })))
        .mount(&server)
        .await;

    let extractor = GlomexEmbedExtractor::with_api_url(server.uri());
    let err = extractor
        .extract(&GlomexEmbedExtractor::build_player_url("v-abc", "abc", None))
        .await
        .unwrap_err();

    match err {
        ExtractError::GeoRestricted { countries } => assert_eq!(countries, vec!["US", "CA"]),
        other => panic!("expected geo restriction, got {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn test_embed_fails_on_empty_video_list() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"videos": []})))
        .mount(&server)
        .await;

    let extractor = GlomexEmbedExtractor::with_api_url(server.uri());
    let err = extractor
        .extract(&GlomexEmbedExtractor::build_player_url("v-abc", "abc", None))
        .await
        .unwrap_err();
    assert!(matches!(err, ExtractError::NoContent(id) if id == "v-abc"));
    Ok(())
}

#[tokio::test]
async fn test_embed_wraps_multiple_videos_as_playlist() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "videos": [
                {
                    "clip_id": "v-one",
                    "title": "First",
                    "description": "Opening clip",
                    "source": {"progressive": "https://cdn.glomex.com/v-one.mp4"},
                },
                {
                    // No clip_id: the requested playlist ID stands in.
                    "title": "Second",
                    "source": {"progressive": "https://cdn.glomex.com/v-two.mp4"},
                },
            ],
        })))
        .mount(&server)
        .await;

    let extractor = GlomexEmbedExtractor::with_api_url(server.uri());
    let resolved = extractor
        .extract(&GlomexEmbedExtractor::build_player_url("pl-77", "abc", None))
        .await?;

    let playlist = resolved.as_playlist().expect("playlist result");
    assert_eq!(playlist.id, "pl-77");
    assert_eq!(playlist.title.as_deref(), Some("First"));
    assert_eq!(playlist.description.as_deref(), Some("Opening clip"));
    assert_eq!(playlist.entries.len(), 2);
    assert_eq!(playlist.entries[0].id, "v-one");
    assert_eq!(playlist.entries[1].id, "pl-77");
    Ok(())
}

#[tokio::test]
async fn test_channel_pagination_stops_at_empty_page() -> Result<()> {
    let server = MockServer::start().await;
    let api_url = format!("{}/api", server.uri());

    Mock::given(method("GET"))
        .and(path("/api/channel/42/"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [
                page_entry_json("v-one", "First"),
                // No video_url: skipped, not an error.
                {"clip_id": "v-broken", "title": "Unlinked"},
                page_entry_json("v-two", "Second"),
            ],
            "next": format!("{api_url}/channel/42/?page=2&format=json"),
            "has_next": true,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/channel/42/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [page_entry_json("v-three", "Third")],
            "next": format!("{api_url}/channel/42/?page=3&format=json"),
            "has_next": true,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/channel/42/"))
        .and(query_param("page", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [],
            "next": format!("{api_url}/channel/42/?page=4&format=json"),
            "has_next": true,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = GlomexChannelExtractor::with_api_url(api_url);
    let resolved = extractor.extract("https://video.glomex.com/channel/42").await?;

    let playlist = resolved.as_playlist().expect("playlist result");
    let ids: Vec<&str> = playlist
        .entries
        .iter()
        .map(|entry| entry.id.as_str())
        .collect();
    assert_eq!(ids, ["v-one", "v-two", "v-three"]);
    assert!(playlist
        .entries
        .iter()
        .all(|entry| entry.kind == MediaKind::DeferredUrl
            && entry.extractor.as_deref() == Some("glomex")));
    Ok(())
}

#[tokio::test]
async fn test_pagination_flag_beats_next_url() -> Result<()> {
    let server = MockServer::start().await;
    let api_url = format!("{}/api", server.uri());

    Mock::given(method("GET"))
        .and(path("/api/channel/7/"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [page_entry_json("v-only", "Only")],
            "next": format!("{api_url}/channel/7/?page=2&format=json"),
            "has_next": false,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = GlomexChannelExtractor::with_api_url(api_url);
    let entries: Vec<_> = extractor.entries("7").try_collect().await?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].id, "v-only");
    Ok(())
}

#[tokio::test]
async fn test_pagination_failure_is_terminal() -> Result<()> {
    let server = MockServer::start().await;
    let api_url = format!("{}/api", server.uri());

    Mock::given(method("GET"))
        .and(path("/api/channel/9/"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [page_entry_json("v-one", "First")],
            "next": format!("{api_url}/channel/9/?page=2&format=json"),
            "has_next": true,
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/channel/9/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let extractor = GlomexChannelExtractor::with_api_url(api_url);
    let result: Result<Vec<_>, _> = extractor.entries("9").try_collect().await;
    assert!(matches!(result, Err(ExtractError::Fetch { .. })));
    Ok(())
}

#[tokio::test]
async fn test_movie_listing_takes_title_from_metainfo() -> Result<()> {
    let server = MockServer::start().await;
    let api_url = format!("{}/api", server.uri());

    Mock::given(method("GET"))
        .and(path("/api/movie/1337/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "A Long Film",
            "description": "In three parts",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/movie/1337/video/"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [page_entry_json("v-part1", "Part 1")],
            "next": null,
            "has_next": false,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let extractor = GlomexMovieExtractor::with_api_url(api_url);
    let resolved = extractor.extract("https://video.glomex.com/movie/1337").await?;

    let playlist = resolved.as_playlist().expect("playlist result");
    assert_eq!(playlist.title.as_deref(), Some("A Long Film"));
    assert_eq!(playlist.description.as_deref(), Some("In three parts"));
    assert_eq!(playlist.entries.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_engine_prefers_playlist_over_video() -> Result<()> {
    let server = MockServer::start().await;
    let api_url = format!("{}/api", server.uri());

    Mock::given(method("GET"))
        .and(path("/api/playlist/source/4252/"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "results": [page_entry_json("v-abc", "From the playlist")],
            "next": null,
            "has_next": false,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut engine = ExtractorEngine::new();
    engine.register_extractor(Box::new(GlomexPlaylistExtractor::with_api_url(api_url)));
    engine.register_extractor(Box::new(GlomexExtractor::new()));

    let resolved = engine
        .extract("https://video.glomex.com/sport/v-cb24uwg77hgh?pl_type=source&pl_id=4252")
        .await?;
    let playlist = resolved.as_playlist().expect("playlist result");
    assert_eq!(playlist.id, "4252");
    assert_eq!(playlist.entries.len(), 1);

    // Without the playlist query pair the video extractor claims the URL.
    let resolved = engine
        .extract("https://video.glomex.com/sport/v-cb24uwg77hgh")
        .await?;
    assert_eq!(
        resolved.as_single().map(|reference| reference.kind),
        Some(MediaKind::DeferredUrl)
    );
    Ok(())
}

#[tokio::test]
async fn test_engine_rejects_foreign_urls() -> Result<()> {
    let engine = ExtractorEngine::with_builtin_extractors();
    let err = engine.extract("https://vimeo.com/123456").await.unwrap_err();
    assert!(matches!(err, ExtractError::UnsupportedUrl(_)));
    Ok(())
}

#[tokio::test]
async fn test_scanned_embed_resolves_end_to_end() -> Result<()> {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .and(query_param("playlist_id", "v-cb24uwg77hgh"))
        .and(query_param("integration_id", "abc"))
        // Constructed player URLs carry no origin, so resolution falls back
        // to the default one.
        .and(query_param("current_url", "https://player.glomex.com/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "videos": [{"clip_id": "v-cb24uwg77hgh", "title": "Scanned", "source": {}}],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let webpage = r#"<div data-glomex-player="true"
        data-integration-id="abc" data-playlist-id="v-cb24uwg77hgh"></div>"#;
    let candidates =
        GlomexEmbedExtractor::find_embed_urls(webpage, "https://example.com/article");
    assert_eq!(candidates.len(), 1);

    let extractor = GlomexEmbedExtractor::with_api_url(server.uri());
    let resolved = extractor.extract(&candidates[0]).await?;
    assert_eq!(
        resolved.as_single().map(|reference| reference.id.as_str()),
        Some("v-cb24uwg77hgh")
    );
    Ok(())
}
