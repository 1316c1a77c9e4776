//! Bearer tokens, the token store and OAuth exchange parameters.

mod exchange;

use crate::errors::{NumistaError, NumistaResult};
use chrono::{DateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tokio::sync::RwLock;

/// Label of the token representing the API key holder.
pub const SELF_TOKEN_LABEL: &str = "self";

/// Prefix for synthesized token labels.
pub const DEFAULT_TOKEN_LABEL: &str = "unnamed_token";

/// Display format for token expiry.
pub const DEFAULT_DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// Permission scopes a token may be granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Read access to the user's collection.
    ViewCollection,
    /// Write access to the user's collection.
    EditCollection,
}

impl Scope {
    /// Every scope the API grants.
    pub const ALL: [Scope; 2] = [Scope::ViewCollection, Scope::EditCollection];

    /// Gets the API name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViewCollection => "view_collection",
            Self::EditCollection => "edit_collection",
        }
    }

    /// Parses a comma-separated scope list.
    ///
    /// Unknown entries are dropped. An empty result falls back to the
    /// read-only `view_collection` scope.
    pub fn parse_list(scope: &str) -> Vec<Scope> {
        let mut scopes = Vec::new();
        for candidate in scope.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            match Self::ALL.iter().find(|s| s.as_str() == candidate) {
                Some(s) if !scopes.contains(s) => scopes.push(*s),
                Some(_) => {}
                None => tracing::debug!(scope = candidate, "Dropping unknown scope"),
            }
        }

        if scopes.is_empty() {
            tracing::info!(
                requested = scope,
                "No valid scopes requested, using view_collection"
            );
            scopes.push(Scope::ViewCollection);
        }
        scopes
    }

    /// Joins scopes into the comma-separated wire form.
    pub fn join(scopes: &[Scope]) -> String {
        scopes
            .iter()
            .map(Scope::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// OAuth grant types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GrantType {
    /// Exchange an authorization code obtained through a redirect.
    AuthorizationCode,
    /// Act as the user the API key belongs to.
    ClientCredentials,
}

impl GrantType {
    /// Gets the API name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::ClientCredentials => "client_credentials",
        }
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = NumistaError;

    fn from_str(s: &str) -> NumistaResult<Self> {
        match s.trim() {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "client_credentials" => Ok(Self::ClientCredentials),
            other => Err(NumistaError::invalid_input(
                "grant_type",
                format!(
                    "grant_type '{}' must be one of authorization_code, client_credentials",
                    other
                ),
            )
            .logged()),
        }
    }
}

/// Token endpoint response body.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    /// Bearer token.
    pub access_token: String,
    /// Token type, e.g. "bearer".
    pub token_type: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
    /// Authorized account.
    pub user_id: u64,
}

/// One stored bearer credential.
#[derive(Debug, Clone)]
pub struct TokenRecord {
    /// Store key.
    pub label: String,
    /// Bearer token.
    pub token: SecretString,
    /// Authorized account.
    pub user_id: u64,
    /// Token type.
    pub token_type: String,
    /// Comma-joined granted scopes.
    pub scope: String,
    /// Expiry, one second ahead of the server's.
    pub expires_at_epoch: i64,
    /// Formatted expiry.
    pub expires_at_display: String,
}

impl TokenRecord {
    /// Builds a record from a grant captured at `captured_at` (epoch seconds).
    pub fn from_grant(
        label: impl Into<String>,
        grant: TokenGrant,
        scope: impl Into<String>,
        captured_at: i64,
    ) -> Self {
        let expires_at_epoch = captured_at + grant.expires_in - 1;
        Self {
            label: label.into(),
            token: SecretString::new(grant.access_token),
            user_id: grant.user_id,
            token_type: grant.token_type,
            scope: scope.into(),
            expires_at_epoch,
            expires_at_display: format_epoch(expires_at_epoch),
        }
    }

    /// Gets the `Authorization` header value.
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.token.expose_secret())
    }

    /// Returns true once `now` (epoch seconds) has passed the expiry.
    pub fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at_epoch
    }

    /// Returns true if the token has expired.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }
}

/// Formats epoch seconds with [`DEFAULT_DATETIME_FMT`] in UTC.
pub fn format_epoch(epoch: i64) -> String {
    DateTime::<Utc>::from_timestamp(epoch, 0)
        .map(|dt| dt.format(DEFAULT_DATETIME_FMT).to_string())
        .unwrap_or_default()
}

/// Parameters of one OAuth token exchange.
#[derive(Debug, Clone)]
pub struct OAuthParams {
    /// Grant type.
    pub grant_type: GrantType,
    /// Authorization code (authorization_code only).
    pub code: Option<String>,
    /// Client ID (authorization_code only).
    pub client_id: Option<String>,
    /// Client secret, the same as the API key (authorization_code only).
    pub client_secret: Option<SecretString>,
    /// Redirect URI used to obtain the code (authorization_code only).
    pub redirect_uri: Option<String>,
    /// Comma-separated requested scopes.
    pub scope: String,
    /// Value echoed back to the redirect URI.
    pub state: Option<String>,
    /// Store label; synthesized when absent.
    pub token_label: Option<String>,
}

impl OAuthParams {
    /// Parameters for a `client_credentials` exchange.
    pub fn client_credentials(scope: impl Into<String>) -> Self {
        Self {
            grant_type: GrantType::ClientCredentials,
            code: None,
            client_id: None,
            client_secret: None,
            redirect_uri: None,
            scope: scope.into(),
            state: None,
            token_label: None,
        }
    }

    /// Parameters for an `authorization_code` exchange.
    pub fn authorization_code(
        code: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            grant_type: GrantType::AuthorizationCode,
            code: Some(code.into()),
            client_id: Some(client_id.into()),
            client_secret: Some(SecretString::new(client_secret.into())),
            redirect_uri: Some(redirect_uri.into()),
            scope: scope.into(),
            state: None,
            token_label: None,
        }
    }

    /// Sets the store label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.token_label = Some(label.into());
        self
    }

    /// Sets the state value.
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// Checks grant-specific required fields and returns the query parameters.
    pub fn to_query(&self, scope: &str) -> NumistaResult<Vec<(String, String)>> {
        let mut params = vec![
            ("grant_type".to_string(), self.grant_type.as_str().to_string()),
            ("scope".to_string(), scope.to_string()),
            ("state".to_string(), self.state.clone().unwrap_or_default()),
        ];

        if self.grant_type == GrantType::AuthorizationCode {
            let secret = self
                .client_secret
                .as_ref()
                .map(|s| s.expose_secret().clone());
            let required = [
                ("code", self.code.clone()),
                ("client_id", self.client_id.clone()),
                ("client_secret", secret),
                ("redirect_uri", self.redirect_uri.clone()),
            ];
            for (field, value) in required {
                match value.filter(|v| !v.trim().is_empty()) {
                    Some(v) => params.push((field.to_string(), v)),
                    None => {
                        return Err(NumistaError::invalid_input(
                            field,
                            format!("{} is required when grant_type='authorization_code'", field),
                        )
                        .logged())
                    }
                }
            }
        }

        Ok(params)
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    tokens: HashMap<String, TokenRecord>,
    /// Highest synthesized label suffix handed out so far.
    issued: usize,
}

/// Process-local token store keyed by label.
///
/// Stale records are kept; callers check [`TokenRecord::is_expired`].
#[derive(Debug, Default)]
pub struct TokenStore {
    inner: RwLock<StoreInner>,
}

impl TokenStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets a record by label.
    pub async fn get(&self, label: &str) -> Option<TokenRecord> {
        self.inner.read().await.tokens.get(label).cloned()
    }

    /// Stores a record under its label, overwriting any existing one.
    pub async fn insert(&self, record: TokenRecord) {
        let mut inner = self.inner.write().await;
        tracing::info!(label = %record.label, "Token stored");
        inner.tokens.insert(record.label.clone(), record);
    }

    /// Removes a record, returning it if present.
    pub async fn remove(&self, label: &str) -> Option<TokenRecord> {
        self.inner.write().await.tokens.remove(label)
    }

    /// Returns true if a label is present.
    pub async fn contains(&self, label: &str) -> bool {
        self.inner.read().await.tokens.contains_key(label)
    }

    /// Gets the number of stored records.
    pub async fn len(&self) -> usize {
        self.inner.read().await.tokens.len()
    }

    /// Returns true if the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.tokens.is_empty()
    }

    /// Lists stored labels.
    pub async fn labels(&self) -> Vec<String> {
        self.inner.read().await.tokens.keys().cloned().collect()
    }

    /// Synthesizes a fresh label: the prefix plus count + 1, bumped past any
    /// label already in use or handed out before.
    pub async fn next_label(&self) -> String {
        let mut inner = self.inner.write().await;
        let mut n = (inner.tokens.len() + 1).max(inner.issued + 1);
        while inner
            .tokens
            .contains_key(&format!("{}{}", DEFAULT_TOKEN_LABEL, n))
        {
            n += 1;
        }
        inner.issued = n;
        format!("{}{}", DEFAULT_TOKEN_LABEL, n)
    }
}
