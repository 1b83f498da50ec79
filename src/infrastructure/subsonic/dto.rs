//! JSON bodies of Subsonic error responses.

use serde::Deserialize;

/// Subsonic error code for "the requested data was not found".
pub const ERROR_CODE_NOT_FOUND: u32 = 70;

/// Top-level JSON body returned with `f=json`.
#[derive(Debug, Deserialize)]
pub struct SubsonicEnvelope {
    /// The actual response object.
    #[serde(rename = "subsonic-response")]
    pub response: SubsonicResponse,
}

/// Subsonic response object.
#[derive(Debug, Deserialize)]
pub struct SubsonicResponse {
    /// `ok` or `failed`.
    pub status: String,
    /// Present when `status` is `failed`.
    #[serde(default)]
    pub error: Option<SubsonicErrorBody>,
}

/// Subsonic error payload.
#[derive(Debug, Deserialize)]
pub struct SubsonicErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human readable message.
    #[serde(default)]
    pub message: String,
}
