//! Configuration types for the Numista client.

use crate::errors::{NumistaError, NumistaResult};
use crate::types::is_iso4217;
use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Default Numista API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.numista.com/api";

/// Published machine-readable API description.
pub const DEFAULT_SCHEMA_URL: &str = "https://api.numista.com/api/doc/swagger.yaml";

/// Default 3-letter ISO 4217 currency code.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default connect timeout.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default User-Agent header.
pub const DEFAULT_USER_AGENT: &str = "integrations-numista/0.1.0";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "NUMISTA_API_KEY";

/// Environment variable selecting the API version.
pub const API_VERSION_ENV: &str = "NUMISTA_API_VERSION";

/// Supported API versions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ApiVersion {
    /// Legacy v2 API.
    V2,
    /// Current v3 API.
    #[default]
    V3,
}

impl ApiVersion {
    /// Gets the version path segment, e.g. `/v3`.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::V2 => "/v2",
            Self::V3 => "/v3",
        }
    }
}

impl fmt::Display for ApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment().trim_start_matches('/'))
    }
}

impl FromStr for ApiVersion {
    type Err = NumistaError;

    fn from_str(s: &str) -> NumistaResult<Self> {
        match s.trim().trim_start_matches('/').to_ascii_lowercase().as_str() {
            "2" | "v2" => Ok(Self::V2),
            "3" | "v3" => Ok(Self::V3),
            other => Err(NumistaError::configuration(format!(
                "Unrecognized API version '{}', expected v2 or v3",
                other
            ))),
        }
    }
}

/// Where the API schema document is loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSource {
    /// Fetched over HTTP(S).
    Url(String),
    /// Read from a local file.
    File(PathBuf),
}

impl SchemaSource {
    /// Classifies a location: `http(s)` URLs are fetched, anything else is a path.
    pub fn parse(location: &str) -> Self {
        match url::Url::parse(location) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => Self::Url(location.to_string()),
            _ => Self::File(PathBuf::from(location)),
        }
    }
}

impl Default for SchemaSource {
    fn default() -> Self {
        Self::Url(DEFAULT_SCHEMA_URL.to_string())
    }
}

impl fmt::Display for SchemaSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url),
            Self::File(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Numista client configuration.
#[derive(Debug, Clone)]
pub struct NumistaConfig {
    /// API key sent as `Numista-API-Key`.
    pub api_key: SecretString,
    /// API version.
    pub api_version: ApiVersion,
    /// API base URL, without the version segment.
    pub base_url: String,
    /// Verbose logging and raw exchanges in envelope extras.
    pub debug: bool,
    /// Destination file for this client's log records.
    pub log_path: Option<PathBuf>,
    /// Generate the self token when connecting.
    pub auto_self_token: bool,
    /// Location of the API schema document.
    pub schema_source: SchemaSource,
    /// Fallback currency for price lookups.
    pub default_currency: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Connect timeout.
    pub connect_timeout: Duration,
    /// User-Agent header.
    pub user_agent: String,
}

impl NumistaConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> NumistaConfigBuilder {
        NumistaConfigBuilder::new()
    }

    /// Builds a configuration from `NUMISTA_API_KEY` and `NUMISTA_API_VERSION`.
    pub fn from_env() -> NumistaResult<Self> {
        let api_key = std::env::var(API_KEY_ENV).map_err(|_| {
            NumistaError::configuration(format!("Environment variable {} not set", API_KEY_ENV))
                .logged()
        })?;

        let mut builder = Self::builder().api_key(api_key);
        if let Ok(version) = std::env::var(API_VERSION_ENV) {
            builder = builder.api_version(version.parse()?);
        }
        builder.build()
    }

    /// Validates the configuration.
    pub fn validate(&self) -> NumistaResult<()> {
        if self.api_key.expose_secret().trim().is_empty() {
            return Err(NumistaError::configuration(
                "api_key is required to access the Numista API",
            )
            .logged());
        }

        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(NumistaError::configuration(
                "Base URL must start with http:// or https://",
            )
            .logged());
        }

        if !is_iso4217(&self.default_currency) {
            return Err(NumistaError::configuration(format!(
                "Default currency '{}' is not an ISO 4217 code",
                self.default_currency
            ))
            .logged());
        }

        if self.user_agent.is_empty() {
            return Err(NumistaError::configuration("User-Agent cannot be empty").logged());
        }

        Ok(())
    }

    /// Gets the versioned API root, e.g. `https://api.numista.com/api/v3`.
    pub fn versioned_base(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.api_version.path_segment()
        )
    }
}

/// Builder for NumistaConfig.
#[derive(Debug, Default)]
pub struct NumistaConfigBuilder {
    api_key: Option<SecretString>,
    api_version: Option<ApiVersion>,
    base_url: Option<String>,
    debug: bool,
    log_path: Option<PathBuf>,
    auto_self_token: bool,
    schema_source: Option<SchemaSource>,
    default_currency: Option<String>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    user_agent: Option<String>,
}

impl NumistaConfigBuilder {
    /// Creates a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::new(key.into()));
        self
    }

    /// Sets the API version.
    pub fn api_version(mut self, version: ApiVersion) -> Self {
        self.api_version = Some(version);
        self
    }

    /// Sets the base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Enables verbose logging and raw exchange capture.
    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Sets the log destination file.
    pub fn log_path(mut self, path: impl AsRef<Path>) -> Self {
        self.log_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Generates the self token when connecting.
    pub fn auto_self_token(mut self, enabled: bool) -> Self {
        self.auto_self_token = enabled;
        self
    }

    /// Sets the schema document location (URL or file path).
    pub fn schema_source(mut self, location: &str) -> Self {
        self.schema_source = Some(SchemaSource::parse(location));
        self
    }

    /// Sets the fallback currency.
    pub fn default_currency(mut self, currency: impl Into<String>) -> Self {
        self.default_currency = Some(currency.into().to_ascii_uppercase());
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the User-Agent header.
    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> NumistaResult<NumistaConfig> {
        let config = NumistaConfig {
            api_key: self
                .api_key
                .unwrap_or_else(|| SecretString::new(String::new())),
            api_version: self.api_version.unwrap_or_default(),
            base_url: self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            debug: self.debug,
            log_path: self.log_path,
            auto_self_token: self.auto_self_token,
            schema_source: self.schema_source.unwrap_or_default(),
            default_currency: self
                .default_currency
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            timeout: self.timeout.unwrap_or(DEFAULT_TIMEOUT),
            connect_timeout: self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            user_agent: self.user_agent.unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
        };

        config.validate()?;
        Ok(config)
    }
}
