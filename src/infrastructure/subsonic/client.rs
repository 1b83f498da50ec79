//! Subsonic `getCoverArt` HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, StatusCode, header};
use tracing::{debug, warn};

use super::dto::{ERROR_CODE_NOT_FOUND, SubsonicEnvelope};
use crate::domain::entities::CoverArtKind;
use crate::domain::errors::CoverArtError;
use crate::domain::ports::CoverArtProvider;

/// Subsonic REST API version sent with every request.
pub const API_VERSION: &str = "1.16.1";
const USER_AGENT: &str = concat!("sonicart/", env!("CARGO_PKG_VERSION"));
const ARTIST_PREFIX: &str = "ar-";

/// Connection settings for a Subsonic server.
#[derive(Debug, Clone)]
pub struct SubsonicClientConfig {
    /// Server root, e.g. `https://music.example.com`.
    pub base_url: String,
    /// Account name (`u`).
    pub username: String,
    /// Salted password token (`t`).
    pub token: String,
    /// Salt used for `token` (`s`).
    pub salt: String,
    /// Client name reported to the server (`c`).
    pub client_name: String,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for SubsonicClientConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            token: String::new(),
            salt: String::new(),
            client_name: "sonicart".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Fetches cover art from a Subsonic-compatible server.
pub struct SubsonicClient {
    client: Client,
    config: SubsonicClientConfig,
}

impl SubsonicClient {
    /// Creates a client for the configured server.
    ///
    /// # Errors
    /// Returns error if HTTP client creation fails.
    pub fn new(config: SubsonicClientConfig) -> Result<Self, CoverArtError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| CoverArtError::network(format!("failed to create HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    /// Full URL of the `getCoverArt` endpoint.
    #[must_use]
    pub fn cover_art_url(&self) -> String {
        format!("{}/rest/getCoverArt", self.config.base_url.trim_end_matches('/'))
    }

    fn query(&self, entity_id: &str, kind: CoverArtKind, size: u32) -> Vec<(&'static str, String)> {
        vec![
            ("id", cover_art_id(entity_id, kind)),
            ("size", size.to_string()),
            ("v", API_VERSION.to_string()),
            ("c", self.config.client_name.clone()),
            ("f", "json".to_string()),
            ("u", self.config.username.clone()),
            ("t", self.config.token.clone()),
            ("s", self.config.salt.clone()),
        ]
    }
}

impl std::fmt::Debug for SubsonicClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubsonicClient")
            .field("base_url", &self.config.base_url)
            .field("username", &self.config.username)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl CoverArtProvider for SubsonicClient {
    async fn fetch_image_bytes(
        &self,
        entity_id: &str,
        kind: CoverArtKind,
        size: u32,
    ) -> Result<Bytes, CoverArtError> {
        debug!(entity_id, %kind, size, "Requesting cover art");

        let response = self
            .client
            .get(self.cover_art_url())
            .query(&self.query(entity_id, kind, size))
            .send()
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to reach music server");
                if e.is_timeout() {
                    CoverArtError::network("request timed out")
                } else if e.is_connect() {
                    CoverArtError::network("failed to connect to music server")
                } else {
                    CoverArtError::network(e.to_string())
                }
            })?;

        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response
            .bytes()
            .await
            .map_err(|e| CoverArtError::network(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            return Err(classify_status(status, &body));
        }
        classify_body(content_type.as_deref(), body)
    }
}

/// Subsonic addresses artist images with an `ar-` prefixed id.
fn cover_art_id(entity_id: &str, kind: CoverArtKind) -> String {
    match kind {
        CoverArtKind::Artist if !entity_id.starts_with(ARTIST_PREFIX) => {
            format!("{ARTIST_PREFIX}{entity_id}")
        }
        _ => entity_id.to_string(),
    }
}

fn classify_status(status: StatusCode, body: &[u8]) -> CoverArtError {
    let detail = subsonic_error(body).map_or_else(|| format!("HTTP {status}"), |(_, m)| m);
    match status {
        StatusCode::NOT_FOUND => CoverArtError::not_found(detail),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            CoverArtError::network(format!("server throttled request: {detail}"))
        }
        _ => CoverArtError::server(status.as_u16(), detail),
    }
}

/// Subsonic reports errors with a 200 and a JSON body.
fn classify_body(content_type: Option<&str>, body: Bytes) -> Result<Bytes, CoverArtError> {
    if body.is_empty() {
        return Err(CoverArtError::not_found("server returned an empty body"));
    }

    let looks_like_json = content_type.is_some_and(|ct| ct.contains("json"))
        || body.first().is_some_and(|b| *b == b'{');
    if !looks_like_json {
        return Ok(body);
    }

    match subsonic_error(&body) {
        Some((ERROR_CODE_NOT_FOUND, message)) => Err(CoverArtError::not_found(message)),
        Some((code, message)) => Err(CoverArtError::server(
            StatusCode::OK.as_u16(),
            format!("subsonic error {code}: {message}"),
        )),
        None => Err(CoverArtError::decode("expected image, got JSON")),
    }
}

fn subsonic_error(body: &[u8]) -> Option<(u32, String)> {
    let envelope: SubsonicEnvelope = serde_json::from_slice(body).ok()?;
    if envelope.response.status != "failed" {
        return None;
    }
    let error = envelope.response.error?;
    Some((error.code, error.message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::ErrorKind;
    use test_case::test_case;

    fn config() -> SubsonicClientConfig {
        SubsonicClientConfig {
            base_url: "https://music.example.com/".to_string(),
            username: "alice".to_string(),
            token: "26719a1196d2a940705a59634eb18eab".to_string(),
            salt: "c19b2d".to_string(),
            ..SubsonicClientConfig::default()
        }
    }

    fn error_body(code: u32, message: &str) -> Vec<u8> {
        serde_json::json!({
            "subsonic-response": {
                "status": "failed",
                "version": API_VERSION,
                "error": { "code": code, "message": message }
            }
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_client_creation() {
        assert!(SubsonicClient::new(config()).is_ok());
    }

    #[test]
    fn test_cover_art_url_trims_slash() {
        let client = SubsonicClient::new(config()).unwrap();
        assert_eq!(
            client.cover_art_url(),
            "https://music.example.com/rest/getCoverArt"
        );
    }

    #[test]
    fn test_query_parameters() {
        let client = SubsonicClient::new(config()).unwrap();
        let query = client.query("al-42", CoverArtKind::Album, 300);
        let get = |name: &str| {
            query
                .iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.as_str())
        };

        assert_eq!(get("id"), Some("al-42"));
        assert_eq!(get("size"), Some("300"));
        assert_eq!(get("v"), Some(API_VERSION));
        assert_eq!(get("c"), Some("sonicart"));
        assert_eq!(get("f"), Some("json"));
        assert_eq!(get("u"), Some("alice"));
        assert_eq!(get("s"), Some("c19b2d"));
    }

    #[test_case("123", CoverArtKind::Album, "123" ; "album unchanged")]
    #[test_case("123", CoverArtKind::Artist, "ar-123" ; "artist prefixed")]
    #[test_case("ar-123", CoverArtKind::Artist, "ar-123" ; "artist already prefixed")]
    fn test_cover_art_id(id: &str, kind: CoverArtKind, expected: &str) {
        assert_eq!(cover_art_id(id, kind), expected);
    }

    #[test_case(StatusCode::NOT_FOUND, ErrorKind::NotFound ; "not found")]
    #[test_case(StatusCode::TOO_MANY_REQUESTS, ErrorKind::Network ; "rate limited")]
    #[test_case(StatusCode::BAD_GATEWAY, ErrorKind::Network ; "bad gateway")]
    #[test_case(StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Network ; "server error")]
    fn test_classify_status(status: StatusCode, kind: ErrorKind) {
        assert_eq!(classify_status(status, b"").kind(), kind);
    }

    #[test]
    fn test_server_error_keeps_status() {
        let err = classify_status(StatusCode::SERVICE_UNAVAILABLE, b"");
        assert!(matches!(err, CoverArtError::Server { status: 503, .. }));
    }

    #[test]
    fn test_image_body_passes_through() {
        let body = Bytes::from_static(b"\x89PNG\r\n\x1a\n....");
        assert_eq!(classify_body(Some("image/png"), body.clone()).unwrap(), body);
    }

    #[test]
    fn test_empty_body_is_not_found() {
        let err = classify_body(Some("image/jpeg"), Bytes::new()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test_case(70, ErrorKind::NotFound ; "data not found")]
    #[test_case(40, ErrorKind::Network ; "wrong credentials")]
    #[test_case(0, ErrorKind::Network ; "generic")]
    fn test_json_error_body(code: u32, kind: ErrorKind) {
        let body = Bytes::from(error_body(code, "nope"));
        let err = classify_body(Some("application/json"), body).unwrap_err();
        assert_eq!(err.kind(), kind);
    }

    #[test]
    fn test_json_without_content_type() {
        let body = Bytes::from(error_body(70, "Cover art not found"));
        let err = classify_body(None, body).unwrap_err();
        assert_eq!(err, CoverArtError::not_found("Cover art not found"));
    }
}
