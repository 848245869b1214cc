pub mod hls;

use crate::core::{ExtractError, MediaFormat, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;

/// Delimiter reserved by the URL smuggling codec. URLs containing this
/// sequence cannot be smuggled losslessly.
const SMUGGLE_DELIMITER: &str = "#__smuggle=";

pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .expect("Failed to create HTTP client")
}

/// GET `url` with `query` appended and deserialize the JSON body.
pub async fn fetch_json<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, &str)],
) -> Result<T> {
    let response = client
        .get(url)
        .query(query)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|source| ExtractError::Fetch {
            url: url.to_owned(),
            source,
        })?;

    let body = response.text().await.map_err(|source| ExtractError::Fetch {
        url: url.to_owned(),
        source,
    })?;

    serde_json::from_str(&body).map_err(|source| ExtractError::Parse {
        url: url.to_owned(),
        source,
    })
}

/// Append an out-of-band payload to a URL so it survives being passed through
/// a plain URL-typed channel. Reversed by [`unsmuggle_url`].
pub fn smuggle_url(url: &str, data: &HashMap<String, String>) -> String {
    let payload = serde_json::to_string(data).expect("string map serializes");
    format!(
        "{url}{SMUGGLE_DELIMITER}{}",
        urlencoding::encode(&payload)
    )
}

/// Split a smuggled URL back into the plain URL and its payload. A URL that
/// was never smuggled (or carries an unreadable payload) comes back with no
/// payload rather than an error.
pub fn unsmuggle_url(smuggled: &str) -> (String, Option<HashMap<String, String>>) {
    let Some((url, payload)) = smuggled.split_once(SMUGGLE_DELIMITER) else {
        return (smuggled.to_owned(), None);
    };

    let data = urlencoding::decode(payload)
        .ok()
        .and_then(|raw| serde_json::from_str(&raw).ok());
    (url.to_owned(), data)
}

/// Coerce a JSON number or numeric string to an integer.
pub fn int_or_none(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|float| float as i64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Keep a value only if it looks like an absolute or protocol-relative URL.
pub fn url_or_none(value: Option<&str>) -> Option<String> {
    let value = value?.trim();
    (value.starts_with("http://") || value.starts_with("https://") || value.starts_with("//"))
        .then(|| value.to_owned())
}

/// Lower-cased file extension of a URL path, ignoring query and fragment.
pub fn determine_ext(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next()?;
    let (_, ext) = path.rsplit_once('.')?;
    (!ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .then(|| ext.to_ascii_lowercase())
}

/// Order formats worst-first by (height, bitrate); downstream consumers pick
/// from the tail. Ties keep their insertion order.
pub fn sort_formats(formats: &mut [MediaFormat]) {
    formats.sort_by_key(|format| {
        (
            format.height.unwrap_or(0),
            format.tbr.map_or(0, |tbr| (tbr * 1000.0) as u64),
        )
    });
}
