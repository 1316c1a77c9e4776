//! Numista API client implementation.

use crate::auth::{TokenStore, SELF_TOKEN_LABEL};
use crate::config::NumistaConfig;
use crate::errors::{NumistaError, NumistaErrorKind, NumistaResult};
use crate::observability::{self, LoggingConfig, API_KEY_HEADER};
use crate::response::{ApiResponse, ResponseData, ResponseExtra};
use crate::schema::SchemaIndex;
use crate::services::{CatalogueService, UsersService};
use crate::transport::{HttpMethod, HttpRequest, HttpTransport, ReqwestTransport};
use bytes::Bytes;
use secrecy::ExposeSecret;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::instrument::WithSubscriber;
use tracing::{debug, info, warn, Dispatch};

/// Ordered query parameters for one request.
///
/// Entries with empty values are dropped at dispatch. Numeric parameters
/// where zero means "unset" go through [`QueryParams::with_nonzero`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    /// Creates an empty parameter list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter.
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.0.push((key.to_string(), value.to_string()));
        self
    }

    /// Appends a parameter if present.
    pub fn with_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    /// Appends a numeric parameter unless it is zero.
    pub fn with_nonzero(self, key: &str, value: impl Into<u64>) -> Self {
        let value = value.into();
        if value == 0 {
            return self;
        }
        self.with(key, value)
    }

    /// Appends every parameter of `other`.
    pub fn extend(mut self, other: &QueryParams) -> Self {
        self.0.extend(other.0.iter().cloned());
        self
    }

    /// Returns true when no parameter was added.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Gets the non-empty parameters in insertion order.
    pub fn non_empty(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .cloned()
            .collect()
    }

    /// Gets all parameters.
    pub fn as_slice(&self) -> &[(String, String)] {
        &self.0
    }
}

impl From<Vec<(String, String)>> for QueryParams {
    fn from(params: Vec<(String, String)>) -> Self {
        Self(params)
    }
}

/// Returns true for an absent, null, or empty JSON body.
pub(crate) fn is_empty_body(body: Option<&Value>) -> bool {
    match body {
        None | Some(Value::Null) => true,
        Some(Value::Object(map)) => map.is_empty(),
        Some(Value::Array(items)) => items.is_empty(),
        Some(_) => false,
    }
}

/// Numista API client.
pub struct NumistaClient {
    /// Configuration.
    pub(crate) config: NumistaConfig,
    /// HTTP transport.
    pub(crate) transport: Arc<dyn HttpTransport>,
    /// Bearer tokens by label.
    pub(crate) tokens: TokenStore,
    /// Serializes generation of the self token.
    pub(crate) self_token_lock: Mutex<()>,
    /// Lazily loaded schema index.
    pub(crate) schema: OnceCell<SchemaIndex>,
    /// Per-client log destination.
    dispatch: Option<Dispatch>,
}

impl std::fmt::Debug for NumistaClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NumistaClient")
            .field("base_url", &self.config.versioned_base())
            .field("debug", &self.config.debug)
            .finish_non_exhaustive()
    }
}

impl NumistaClient {
    /// Creates a new client using the reqwest transport.
    ///
    /// The self token is not generated here even when `auto_self_token` is
    /// set; use [`NumistaClient::connect`] for that.
    pub fn new(config: NumistaConfig) -> NumistaResult<Self> {
        let transport = ReqwestTransport::new(
            config.timeout,
            config.connect_timeout,
            &config.user_agent,
        )
        .map_err(|e| {
            NumistaError::configuration(format!("Failed to create HTTP transport: {}", e))
                .with_cause(e)
                .logged()
        })?;

        Self::with_transport(config, Arc::new(transport))
    }

    /// Creates a new client over a caller-supplied transport.
    pub fn with_transport(
        config: NumistaConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> NumistaResult<Self> {
        config.validate()?;

        let dispatch = LoggingConfig::new(config.debug, config.log_path.clone())
            .build_dispatch()
            .map_err(NumistaError::logged)?;

        let client = Self {
            config,
            transport,
            tokens: TokenStore::new(),
            self_token_lock: Mutex::new(()),
            schema: OnceCell::new(),
            dispatch,
        };

        client.scoped(|| {
            info!(
                base_url = %client.config.versioned_base(),
                debug = client.config.debug,
                "Numista client created"
            )
        });

        Ok(client)
    }

    /// Creates a client and, when `auto_self_token` is set, generates the
    /// self token before returning.
    pub async fn connect(config: NumistaConfig) -> NumistaResult<Self> {
        let client = Self::new(config)?;
        client.init_self_token().await?;
        Ok(client)
    }

    /// Like [`NumistaClient::connect`] over a caller-supplied transport.
    pub async fn connect_with_transport(
        config: NumistaConfig,
        transport: Arc<dyn HttpTransport>,
    ) -> NumistaResult<Self> {
        let client = Self::with_transport(config, transport)?;
        client.init_self_token().await?;
        Ok(client)
    }

    async fn init_self_token(&self) -> NumistaResult<()> {
        if self.config.auto_self_token {
            self.resolve_token(Some(SELF_TOKEN_LABEL)).await?;
        }
        Ok(())
    }

    /// Creates a new client builder.
    pub fn builder() -> NumistaClientBuilder {
        NumistaClientBuilder::new()
    }

    /// Gets the configuration.
    pub fn config(&self) -> &NumistaConfig {
        &self.config
    }

    /// Gets the token store.
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    // Service accessors

    /// Gets the catalogue service.
    pub fn catalogue(&self) -> CatalogueService<'_> {
        CatalogueService::new(self)
    }

    /// Gets the users service.
    pub fn users(&self) -> UsersService<'_> {
        UsersService::new(self)
    }

    // Logging scope

    /// Runs a future with this client's log destination as the default
    /// subscriber.
    pub(crate) async fn observed<F: Future>(&self, fut: F) -> F::Output {
        match &self.dispatch {
            Some(dispatch) => fut.with_subscriber(dispatch.clone()).await,
            None => fut.await,
        }
    }

    /// Runs a closure with this client's log destination as the default
    /// subscriber.
    pub(crate) fn scoped<T>(&self, f: impl FnOnce() -> T) -> T {
        match &self.dispatch {
            Some(dispatch) => tracing::dispatcher::with_default(dispatch, f),
            None => f(),
        }
    }

    // Request pipeline

    /// Issues one request against a versioned endpoint.
    ///
    /// Validation failures return an error before anything is sent. Every
    /// exchange, including a transport failure, yields an envelope.
    pub async fn request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        body: Option<&Value>,
        headers: Option<HashMap<String, String>>,
        params: QueryParams,
    ) -> NumistaResult<ApiResponse> {
        self.observed(self.execute(method, endpoint, body, headers, params))
            .await
    }

    pub(crate) async fn execute(
        &self,
        method: HttpMethod,
        endpoint: &str,
        body: Option<&Value>,
        headers: Option<HashMap<String, String>>,
        params: QueryParams,
    ) -> NumistaResult<ApiResponse> {
        if !method.is_supported() {
            return Err(NumistaError::invalid_input(
                "http_method",
                format!(
                    "The provided HTTP method ({}) is not valid, expected one of GET, POST, PATCH, DELETE",
                    method
                ),
            )
            .logged());
        }

        if method == HttpMethod::Post && is_empty_body(body) {
            return Err(NumistaError::invalid_input(
                "body",
                format!("A body is required for {} {}", method, endpoint),
            )
            .logged());
        }

        let query = params.non_empty();
        let url = self.build_url(endpoint, &query)?;
        let headers = self.build_headers(headers);
        let body = match body {
            Some(value) if !value.is_null() => {
                let encoded = serde_json::to_vec(value).map_err(|e| {
                    NumistaError::new(
                        NumistaErrorKind::DeserializationError,
                        format!("Failed to serialize request body: {}", e),
                    )
                    .with_cause(e)
                    .logged()
                })?;
                Some(Bytes::from(encoded))
            }
            _ => None,
        };

        observability::on_request_start(method.as_str(), &url, &query, &headers);

        let request = HttpRequest {
            method,
            url: url.clone(),
            headers,
            body,
        };

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    method = %method,
                    url = %url,
                    error = %e,
                    "No response received from the API"
                );
                let mut envelope = ApiResponse::no_response(e.to_string());
                if self.config.debug {
                    envelope.extra.url = Some(url.clone());
                }
                observability::on_request_complete(
                    method.as_str(),
                    &url,
                    envelope.status(),
                    envelope.failed,
                );
                return Ok(envelope);
            }
        };

        let (data, decode_failed) = Self::decode_body(method, &url, &response.body);
        let failed_decode = decode_failed && method != HttpMethod::Delete;
        let envelope = ApiResponse::with_failed(data, response.status, failed_decode);

        let envelope = if self.config.debug {
            envelope.with_extra(ResponseExtra {
                url: Some(url.clone()),
                response_headers: Some(response.headers),
                raw_body: Some(response.body),
                transport_error: None,
            })
        } else {
            envelope
        };

        observability::on_request_complete(
            method.as_str(),
            &url,
            envelope.status(),
            envelope.failed,
        );
        Ok(envelope)
    }

    fn decode_body(method: HttpMethod, url: &str, body: &Bytes) -> (ResponseData, bool) {
        if body.is_empty() {
            if method == HttpMethod::Delete {
                debug!(url = %url, "Empty response body");
            } else {
                info!(url = %url, "Empty response body, expected JSON");
            }
            return (ResponseData::empty(), true);
        }

        match serde_json::from_slice::<Value>(body) {
            Ok(Value::Null) => (ResponseData::empty(), false),
            Ok(value) => (ResponseData::Json(value), false),
            Err(e) => {
                if method == HttpMethod::Delete {
                    debug!(url = %url, error = %e, "Response body is not JSON");
                } else {
                    info!(url = %url, error = %e, "Response body is not JSON, returning raw body");
                }
                (ResponseData::Raw(body.clone()), true)
            }
        }
    }

    fn build_url(&self, endpoint: &str, query: &[(String, String)]) -> NumistaResult<String> {
        let mut url = format!("{}{}", self.config.versioned_base(), endpoint);
        if !query.is_empty() {
            let encoded = serde_urlencoded::to_string(query).map_err(|e| {
                NumistaError::new(
                    NumistaErrorKind::DeserializationError,
                    format!("Failed to encode query parameters: {}", e),
                )
                .with_cause(e)
                .logged()
            })?;
            url.push('?');
            url.push_str(&encoded);
        }
        Ok(url)
    }

    fn build_headers(&self, extra: Option<HashMap<String, String>>) -> HashMap<String, String> {
        let mut headers = HashMap::new();
        headers.insert(
            API_KEY_HEADER.to_string(),
            self.config.api_key.expose_secret().clone(),
        );
        headers.insert("Accept".to_string(), "application/json".to_string());
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        for (name, value) in extra.unwrap_or_default() {
            headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
            headers.insert(name, value);
        }
        headers
    }
}

/// Builder for NumistaClient.
#[derive(Default)]
pub struct NumistaClientBuilder {
    config: Option<NumistaConfig>,
    transport: Option<Arc<dyn HttpTransport>>,
}

impl NumistaClientBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the configuration.
    pub fn config(mut self, config: NumistaConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Sets a custom transport.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Builds the client without generating any token.
    pub fn build(self) -> NumistaResult<NumistaClient> {
        let config = self.config.ok_or_else(|| {
            NumistaError::configuration("Configuration is required").logged()
        })?;

        match self.transport {
            Some(transport) => NumistaClient::with_transport(config, transport),
            None => NumistaClient::new(config),
        }
    }

    /// Builds the client, generating the self token if configured.
    pub async fn connect(self) -> NumistaResult<NumistaClient> {
        let client = self.build()?;
        client.init_self_token().await?;
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::MockHttpTransport;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn client_with(transport: Arc<MockHttpTransport>, debug: bool) -> NumistaClient {
        let config = NumistaConfig::builder()
            .api_key("test-api-key-1234")
            .debug(debug)
            .build()
            .unwrap();
        NumistaClient::with_transport(config, transport).unwrap()
    }

    #[test]
    fn test_query_params_drop_empty_values() {
        let params = QueryParams::new()
            .with("q", "kopeck")
            .with("issuer", "")
            .with_opt::<u32>("page", None)
            .with_opt("count", Some(50));
        assert_eq!(
            params.non_empty(),
            vec![
                ("q".to_string(), "kopeck".to_string()),
                ("count".to_string(), "50".to_string())
            ]
        );
    }

    #[test]
    fn test_query_params_drop_zero_numbers() {
        let extra = QueryParams::new().with("year", 1990);
        let params = QueryParams::new()
            .with_nonzero("page", 0u32)
            .with_nonzero("count", 25u32)
            .with_nonzero("collection", 0u64)
            .extend(&extra);
        assert_eq!(
            params.non_empty(),
            vec![
                ("count".to_string(), "25".to_string()),
                ("year".to_string(), "1990".to_string())
            ]
        );
        assert!(QueryParams::new().with_nonzero("type", 0u64).is_empty());
    }

    #[test]
    fn test_is_empty_body() {
        assert!(is_empty_body(None));
        assert!(is_empty_body(Some(&Value::Null)));
        assert!(is_empty_body(Some(&json!({}))));
        assert!(is_empty_body(Some(&json!([]))));
        assert!(!is_empty_body(Some(&json!({"type": 95420}))));
    }

    #[tokio::test]
    async fn test_request_headers_and_url() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.enqueue_json_response(200, r#"{"count": 0, "types": []}"#);
        let client = client_with(transport.clone(), false);

        let mut extra = HashMap::new();
        extra.insert("accept".to_string(), "text/plain".to_string());
        let response = client
            .request(
                HttpMethod::Get,
                "/types",
                None,
                Some(extra),
                QueryParams::new().with("q", "rouble").with("lang", "en"),
            )
            .await
            .unwrap();

        assert!(!response.failed);
        let request = transport.last_request().unwrap();
        assert_eq!(
            request.url,
            "https://api.numista.com/api/v3/types?q=rouble&lang=en"
        );
        assert_eq!(request.header("Numista-API-Key"), Some("test-api-key-1234"));
        assert_eq!(request.header("Accept"), Some("text/plain"));
        assert_eq!(request.header("Content-Type"), Some("application/json"));
        assert!(response.extra.url.is_none());
    }

    #[tokio::test]
    async fn test_put_is_rejected_before_dispatch() {
        let transport = Arc::new(MockHttpTransport::new());
        let client = client_with(transport.clone(), false);

        let err = client
            .request(HttpMethod::Put, "/types", Some(&json!({"a": 1})), None, QueryParams::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), NumistaErrorKind::InvalidInput);
        assert_eq!(err.field(), Some("http_method"));
        transport.verify_request_count(0);
    }

    #[tokio::test]
    async fn test_post_requires_body() {
        let transport = Arc::new(MockHttpTransport::new());
        let client = client_with(transport.clone(), false);

        for body in [None, Some(json!({}))] {
            let err = client
                .request(HttpMethod::Post, "/types", body.as_ref(), None, QueryParams::new())
                .await
                .unwrap_err();
            assert_eq!(err.field(), Some("body"));
        }
        transport.verify_request_count(0);
    }

    #[tokio::test]
    async fn test_undecodable_body_fails_except_for_delete() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.enqueue_json_response(200, "<html>oops</html>");
        transport.enqueue_json_response(204, "");
        let client = client_with(transport.clone(), false);

        let response = client
            .request(HttpMethod::Get, "/issuers", None, None, QueryParams::new())
            .await
            .unwrap();
        assert!(response.failed);
        assert_eq!(response.status(), 200);
        assert_eq!(
            response.data.as_raw().map(|b| b.as_ref()),
            Some(&b"<html>oops</html>"[..])
        );

        let response = client
            .request(
                HttpMethod::Delete,
                "/users/1/collected_items/2",
                None,
                None,
                QueryParams::new(),
            )
            .await
            .unwrap();
        assert!(!response.failed);
        assert_eq!(response.http_info.http_message, "The item has been deleted");
        assert_eq!(response.data, ResponseData::empty());
    }

    #[tokio::test]
    async fn test_transport_failure_yields_sentinel_envelope() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.enqueue_error(crate::transport::TransportError::Timeout);
        let client = client_with(transport.clone(), true);

        let response = client
            .request(HttpMethod::Get, "/catalogues", None, None, QueryParams::new())
            .await
            .unwrap();
        assert!(response.failed);
        assert_eq!(response.status(), 0);
        assert_eq!(
            response.http_info.http_message,
            "No response received from the API"
        );
        assert_eq!(response.extra.transport_error.as_deref(), Some("Timeout"));
        assert_eq!(
            response.extra.url.as_deref(),
            Some("https://api.numista.com/api/v3/catalogues")
        );
    }

    #[tokio::test]
    async fn test_debug_mode_captures_exchange() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.enqueue_json_response(404, r#"{"error_message": "Type not found"}"#);
        let client = client_with(transport, true);

        let response = client
            .request(HttpMethod::Get, "/types/1", None, None, QueryParams::new())
            .await
            .unwrap();
        assert!(response.failed);
        assert_eq!(response.data.get("error_message"), Some(&json!("Type not found")));
        assert!(response.extra.raw_body.is_some());
        assert_eq!(
            response
                .extra
                .response_headers
                .as_ref()
                .and_then(|h| h.get("content-type"))
                .map(String::as_str),
            Some("application/json")
        );
    }

    #[test]
    fn test_builder_requires_config() {
        let err = NumistaClient::builder().build().unwrap_err();
        assert_eq!(err.kind(), NumistaErrorKind::InvalidConfiguration);
    }
}
