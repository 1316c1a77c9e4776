//! Uniform result envelope returned by every request-issuing operation.

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Status used when no HTTP response was received at all.
pub const NO_RESPONSE_STATUS: u16 = 0;

/// Fixed descriptions for the status codes documented by the Numista API.
pub const HTTP_STATUS_MESSAGES: &[(u16, &str)] = &[
    (NO_RESPONSE_STATUS, "No response received from the API"),
    (200, "Request successful"),
    (201, "The requested operation was accepted and successful"),
    (202, "The requested operation was accepted and successful"),
    (204, "The item has been deleted"),
    (400, "Invalid parameter or missing mandatory parameter"),
    (401, "Invalid or missing API key, or insufficient permission"),
    (404, "The requested item not found, or you are not allowed to access it"),
    (429, "Quota exceeded"),
    (
        501,
        "No user associated to your API key (for grant type 'client_credentials')",
    ),
];

/// Looks up the description for a status code.
///
/// Codes outside the documented table fall back to the canonical reason
/// phrase, then to a generic label.
pub fn status_message(status: u16) -> &'static str {
    HTTP_STATUS_MESSAGES
        .iter()
        .find(|(code, _)| *code == status)
        .map(|(_, msg)| *msg)
        .or_else(|| {
            reqwest::StatusCode::from_u16(status)
                .ok()
                .and_then(|s| s.canonical_reason())
        })
        .unwrap_or("Unrecognized HTTP status")
}

/// Response payload: decoded JSON, or the raw body when decoding failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ResponseData {
    /// Structured JSON body.
    Json(Value),
    /// Raw body bytes that could not be decoded.
    Raw(#[serde(serialize_with = "serialize_raw")] Bytes),
}

fn serialize_raw<S: serde::Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}

impl ResponseData {
    /// An empty JSON object.
    pub fn empty() -> Self {
        Self::Json(Value::Object(Map::new()))
    }

    /// Gets the JSON value, if the body decoded.
    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(v) => Some(v),
            Self::Raw(_) => None,
        }
    }

    /// Gets the raw bytes, if the body did not decode.
    pub fn as_raw(&self) -> Option<&Bytes> {
        match self {
            Self::Json(_) => None,
            Self::Raw(b) => Some(b),
        }
    }

    /// Looks up a top-level field of a JSON object body.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_json().and_then(|v| v.get(key))
    }
}

impl Default for ResponseData {
    fn default() -> Self {
        Self::empty()
    }
}

/// Status details of an envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpInfo {
    /// Numeric HTTP status, or 0 when no response was received.
    pub http_status: u16,
    /// Fixed description of the status.
    pub http_message: &'static str,
}

/// Auxiliary diagnostics attached to an envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResponseExtra {
    /// Final request URL (debug mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Raw response headers (debug mode).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_headers: Option<HashMap<String, String>>,
    /// Raw response body (debug mode).
    #[serde(skip_serializing_if = "Option::is_none", serialize_with = "serialize_raw_opt")]
    pub raw_body: Option<Bytes>,
    /// Transport failure text when no response was received.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_error: Option<String>,
}

fn serialize_raw_opt<S: serde::Serializer>(
    bytes: &Option<Bytes>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match bytes {
        Some(b) => serialize_raw(b, serializer),
        None => serializer.serialize_none(),
    }
}

/// Outcome of one API call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiResponse {
    /// Decoded body, never null.
    pub data: ResponseData,
    /// Status details.
    pub http_info: HttpInfo,
    /// True for non-2xx statuses and undecodable bodies.
    pub failed: bool,
    /// Auxiliary diagnostics.
    pub extra: ResponseExtra,
}

impl ApiResponse {
    /// Builds an envelope classified from its status alone.
    pub fn new(data: ResponseData, http_status: u16) -> Self {
        let failed = !is_success(http_status);
        Self::with_failed(data, http_status, failed)
    }

    /// Builds an envelope with an explicit failure flag.
    ///
    /// A non-2xx status always fails regardless of `failed`.
    pub fn with_failed(data: ResponseData, http_status: u16, failed: bool) -> Self {
        Self {
            data,
            http_info: HttpInfo {
                http_status,
                http_message: status_message(http_status),
            },
            failed: failed || !is_success(http_status),
            extra: ResponseExtra::default(),
        }
    }

    /// Builds the envelope for a transport-level non-response.
    pub fn no_response(error: impl Into<String>) -> Self {
        let mut response = Self::new(ResponseData::empty(), NO_RESPONSE_STATUS);
        response.extra.transport_error = Some(error.into());
        response
    }

    /// Attaches diagnostics.
    pub fn with_extra(mut self, extra: ResponseExtra) -> Self {
        self.extra = extra;
        self
    }

    /// Gets the HTTP status.
    pub fn status(&self) -> u16 {
        self.http_info.http_status
    }

    /// Returns true if the call succeeded.
    pub fn is_success(&self) -> bool {
        !self.failed
    }
}

fn is_success(status: u16) -> bool {
    (200..=299).contains(&status)
}
