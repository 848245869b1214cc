use crate::core::{ExtractError, MediaFormat, Result};
use m3u8_rs::Playlist;
use tracing::debug;
use url::Url;

/// Download an HLS manifest and expand it into one format record per quality
/// variant. A media playlist (no variants) collapses to a single format for
/// the manifest itself.
pub async fn extract_m3u8_formats(
    client: &reqwest::Client,
    manifest_url: &str,
    format_id: &str,
) -> Result<Vec<MediaFormat>> {
    debug!("downloading HLS manifest for format {}", format_id);
    let response = client
        .get(manifest_url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|source| ExtractError::Fetch {
            url: manifest_url.to_owned(),
            source,
        })?;

    let manifest = response
        .bytes()
        .await
        .map_err(|source| ExtractError::Fetch {
            url: manifest_url.to_owned(),
            source,
        })?;

    parse_manifest_formats(&manifest, manifest_url, format_id)
}

pub fn parse_manifest_formats(
    manifest: &[u8],
    manifest_url: &str,
    format_id: &str,
) -> Result<Vec<MediaFormat>> {
    let playlist =
        m3u8_rs::parse_playlist_res(manifest).map_err(|err| ExtractError::Manifest {
            url: manifest_url.to_owned(),
            message: format!("{err:?}"),
        })?;

    match playlist {
        Playlist::MasterPlaylist(master) => {
            let base = Url::parse(manifest_url).map_err(|source| ExtractError::Url {
                url: manifest_url.to_owned(),
                source,
            })?;

            let mut formats = Vec::with_capacity(master.variants.len());
            for variant in &master.variants {
                if variant.is_i_frame {
                    continue;
                }
                let variant_url = base
                    .join(&variant.uri)
                    .map(String::from)
                    .unwrap_or_else(|_| variant.uri.clone());
                let (vcodec, acodec) = split_codecs(variant.codecs.as_deref());
                formats.push(MediaFormat {
                    format_id: format!("{}-{}", format_id, variant.bandwidth),
                    url: variant_url,
                    ext: "mp4".to_owned(),
                    width: variant.resolution.as_ref().map(|r| r.width as u32),
                    height: variant.resolution.as_ref().map(|r| r.height as u32),
                    fps: variant.frame_rate,
                    tbr: Some(variant.bandwidth as f64 / 1000.0),
                    vcodec,
                    acodec,
                });
            }
            Ok(formats)
        }
        Playlist::MediaPlaylist(_) => Ok(vec![MediaFormat {
            format_id: format_id.to_owned(),
            url: manifest_url.to_owned(),
            ext: "mp4".to_owned(),
            width: None,
            height: None,
            fps: None,
            tbr: None,
            vcodec: None,
            acodec: None,
        }]),
    }
}

fn split_codecs(codecs: Option<&str>) -> (Option<String>, Option<String>) {
    let mut vcodec = None;
    let mut acodec = None;
    for codec in codecs.unwrap_or_default().split(',') {
        let codec = codec.trim();
        if codec.is_empty() {
            continue;
        }
        let family = codec.split('.').next().unwrap_or(codec);
        if matches!(
            family,
            "avc1" | "avc2" | "avc3" | "hvc1" | "hev1" | "vp8" | "vp9" | "vp09" | "av01"
        ) {
            if vcodec.is_none() {
                vcodec = Some(codec.to_owned());
            }
        } else if matches!(family, "mp4a" | "aac" | "opus" | "vorbis" | "ac-3" | "ec-3" | "mp3") {
            if acodec.is_none() {
                acodec = Some(codec.to_owned());
            }
        }
    }
    (vcodec, acodec)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U\n\
#EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=640x360,CODECS=\"avc1.64001e,mp4a.40.2\"\n\
low/index.m3u8\n\
#EXT-X-STREAM-INF:BANDWIDTH=2560000,RESOLUTION=1280x720,CODECS=\"avc1.64001f,mp4a.40.2\"\n\
https://other.example.com/hi/index.m3u8\n";

    const MEDIA: &str = "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-TARGETDURATION:10\n\
#EXTINF:9.8,\n\
segment-0.ts\n\
#EXT-X-ENDLIST\n";

    #[test]
    fn test_master_playlist_expands_variants() {
        let formats = parse_manifest_formats(
            MASTER.as_bytes(),
            "https://cdn.example.com/live/master.m3u8",
            "hls",
        )
        .unwrap();

        assert_eq!(formats.len(), 2);
        assert_eq!(formats[0].format_id, "hls-1280000");
        assert_eq!(formats[0].url, "https://cdn.example.com/live/low/index.m3u8");
        assert_eq!(formats[0].height, Some(360));
        assert_eq!(formats[0].tbr, Some(1280.0));
        assert_eq!(formats[0].vcodec.as_deref(), Some("avc1.64001e"));
        assert_eq!(formats[0].acodec.as_deref(), Some("mp4a.40.2"));
        assert_eq!(formats[1].url, "https://other.example.com/hi/index.m3u8");
        assert_eq!(formats[1].width, Some(1280));
    }

    #[test]
    fn test_media_playlist_collapses_to_manifest_url() {
        let formats = parse_manifest_formats(
            MEDIA.as_bytes(),
            "https://cdn.example.com/clip.m3u8",
            "hls",
        )
        .unwrap();

        assert_eq!(formats.len(), 1);
        assert_eq!(formats[0].format_id, "hls");
        assert_eq!(formats[0].url, "https://cdn.example.com/clip.m3u8");
    }

    #[test]
    fn test_garbage_manifest_is_an_error() {
        let result = parse_manifest_formats(b"<html>not a manifest</html>", "https://x/", "hls");
        assert!(matches!(result, Err(ExtractError::Manifest { .. })));
    }
}
