//! Transport backed by a pooled `reqwest::Client`.
//!
//! Header names and values are checked before anything is sent: a header
//! that cannot be encoded fails the request instead of being left out.

use super::{HttpMethod, HttpRequest, HttpResponse, HttpTransport, TransportError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::trace;

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => Self::GET,
            HttpMethod::Post => Self::POST,
            HttpMethod::Put => Self::PUT,
            HttpMethod::Patch => Self::PATCH,
            HttpMethod::Delete => Self::DELETE,
        }
    }
}

/// Sends Numista requests over HTTPS with reqwest.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Builds the underlying client with the request and connect timeouts and
    /// the User-Agent every request carries.
    pub fn new(
        timeout: Duration,
        connect_timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| {
                TransportError::Connection(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(Self { client })
    }
}

/// Encodes request headers, rejecting any name or value HTTP cannot carry.
///
/// Secrets are never echoed: only the offending header name is reported.
fn encode_headers(headers: &HashMap<String, String>) -> Result<HeaderMap, TransportError> {
    let mut encoded = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::Request(format!("invalid header name '{}'", name)))?;
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            TransportError::Request(format!("invalid header value for '{}'", name))
        })?;
        encoded.insert(header_name, header_value);
    }
    Ok(encoded)
}

/// Flattens response headers into lower-case names.
///
/// Repeated headers are joined with `", "`; values that are not visible ASCII
/// are skipped.
fn decode_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut decoded: HashMap<String, String> = HashMap::with_capacity(headers.len());
    for (name, value) in headers {
        let Ok(value) = value.to_str() else {
            trace!(header = %name, "Skipping non-ASCII response header");
            continue;
        };
        decoded
            .entry(name.as_str().to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(value);
            })
            .or_insert_with(|| value.to_string());
    }
    decoded
}

fn classify(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_connect() {
        TransportError::Connection(error.to_string())
    } else {
        TransportError::Request(error.to_string())
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let headers = encode_headers(&request.headers)?;

        let mut builder = self
            .client
            .request(request.method.into(), &request.url)
            .headers(headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let headers = decode_headers(response.headers());
        let body = response.bytes().await.map_err(|e| {
            TransportError::Request(format!("Failed to read response body: {}", e))
        })?;

        trace!(status, bytes = body.len(), "Response body read");
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn transport() -> ReqwestTransport {
        ReqwestTransport::new(
            Duration::from_secs(30),
            Duration::from_secs(10),
            "integrations-numista/0.1.0",
        )
        .unwrap()
    }

    #[test]
    fn test_encode_headers() {
        let mut headers = HashMap::new();
        headers.insert("Numista-API-Key".to_string(), "key-1234".to_string());
        headers.insert("Authorization".to_string(), "Bearer tok".to_string());

        let encoded = encode_headers(&headers).unwrap();
        assert_eq!(encoded.len(), 2);
        assert_eq!(encoded["authorization"], "Bearer tok");
    }

    #[test]
    fn test_control_character_in_value_is_rejected() {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer tok\nen".to_string());

        match encode_headers(&headers) {
            Err(TransportError::Request(message)) => {
                assert!(message.contains("Authorization"));
                assert!(!message.contains("tok"));
            }
            other => panic!("expected a request error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_header_name_is_rejected() {
        let mut headers = HashMap::new();
        headers.insert("Bad Header".to_string(), "x".to_string());
        assert!(matches!(
            encode_headers(&headers),
            Err(TransportError::Request(_))
        ));
    }

    #[test]
    fn test_decode_joins_repeated_headers() {
        let mut headers = HeaderMap::new();
        headers.append("x-ratelimit", HeaderValue::from_static("a"));
        headers.append("x-ratelimit", HeaderValue::from_static("b"));
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let decoded = decode_headers(&headers);
        assert_eq!(decoded["x-ratelimit"], "a, b");
        assert_eq!(decoded["content-type"], "application/json");
    }

    #[tokio::test]
    async fn test_send_fails_before_dispatch_on_bad_header() {
        let mut request = HttpRequest::get("http://127.0.0.1:9/v3/types");
        request
            .headers
            .insert("Authorization".to_string(), "Bearer \u{7}".to_string());

        let result = transport().send(request).await;
        assert!(matches!(result, Err(TransportError::Request(_))));
    }
}
