//! OAuth token exchange and token resolution.

use super::{OAuthParams, Scope, TokenGrant, TokenRecord, SELF_TOKEN_LABEL};
use crate::client::{NumistaClient, QueryParams};
use crate::errors::{NumistaError, NumistaResult};
use crate::transport::HttpMethod;
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, error, info};

const OAUTH_ENDPOINT: &str = "/oauth_token";

impl NumistaClient {
    /// Trades credentials for a bearer token and stores it.
    ///
    /// The stored record overwrites any existing record with the same label.
    pub async fn oauth_exchange(&self, params: OAuthParams) -> NumistaResult<TokenRecord> {
        self.observed(self.exchange(params)).await
    }

    async fn exchange(&self, params: OAuthParams) -> NumistaResult<TokenRecord> {
        let scope = Scope::join(&Scope::parse_list(&params.scope));
        let query = params.to_query(&scope)?;

        let label = match params.token_label.as_deref().map(str::trim) {
            Some(label) if !label.is_empty() => label.to_string(),
            _ => {
                let label = self.tokens.next_label().await;
                info!(label = %label, "No token label provided, using a generated one");
                label
            }
        };

        debug!(
            grant_type = %params.grant_type,
            scope = %scope,
            label = %label,
            "Requesting OAuth token"
        );

        let captured_at = Utc::now().timestamp();
        let response = self
            .execute(
                HttpMethod::Get,
                OAUTH_ENDPOINT,
                None,
                None,
                QueryParams::from(query),
            )
            .await?;

        if !(200..=299).contains(&response.status()) {
            let body = serde_json::to_string(&response.data).unwrap_or_default();
            error!(
                status = response.status(),
                body = %body,
                "OAuth token request rejected"
            );
            return Err(NumistaError::authorization(format!(
                "Failed to get OAuth token: {}",
                response.http_info.http_message
            ))
            .with_status(response.status())
            .logged());
        }

        let grant: TokenGrant = response
            .data
            .as_json()
            .cloned()
            .ok_or_else(|| {
                NumistaError::authorization("OAuth token response is not JSON")
                    .with_status(response.status())
                    .logged()
            })
            .and_then(|value| {
                serde_json::from_value(value).map_err(|e| {
                    NumistaError::authorization(format!(
                        "OAuth token response is missing required fields: {}",
                        e
                    ))
                    .with_status(response.status())
                    .with_cause(e)
                    .logged()
                })
            })?;

        let record = TokenRecord::from_grant(label, grant, scope, captured_at);
        info!(
            label = %record.label,
            user_id = record.user_id,
            expires_at = %record.expires_at_display,
            "OAuth token obtained"
        );
        self.tokens.insert(record.clone()).await;
        Ok(record)
    }

    /// Resolves the token authorizing a user-scoped call.
    ///
    /// A named label must already be stored. `None` and `"self"` resolve the
    /// self token, running a `client_credentials` exchange on first use.
    pub async fn resolve_token(&self, label: Option<&str>) -> NumistaResult<TokenRecord> {
        self.observed(self.resolve(label)).await
    }

    pub(crate) async fn resolve(&self, label: Option<&str>) -> NumistaResult<TokenRecord> {
        match label.map(str::trim).filter(|l| !l.is_empty()) {
            Some(label) if label != SELF_TOKEN_LABEL => {
                debug!(label = %label, "Fetching bearer token");
                self.tokens.get(label).await.ok_or_else(|| {
                    NumistaError::lookup(format!("No token found for label '{}'", label)).logged()
                })
            }
            _ => self.self_token(None).await,
        }
    }

    /// Fetches the self token, generating it with `scope` when absent.
    ///
    /// Without a scope every available scope is requested.
    async fn self_token(&self, scope: Option<&str>) -> NumistaResult<TokenRecord> {
        if let Some(record) = self.tokens.get(SELF_TOKEN_LABEL).await {
            return Ok(record);
        }

        let _guard = self.self_token_lock.lock().await;
        if let Some(record) = self.tokens.get(SELF_TOKEN_LABEL).await {
            return Ok(record);
        }

        info!("No token found under label 'self', attempting to generate it");
        let scope = match scope {
            Some(scope) => scope.to_string(),
            None => Scope::join(&Scope::ALL),
        };
        let params = OAuthParams::client_credentials(scope).with_label(SELF_TOKEN_LABEL);
        self.exchange(params).await.map_err(|e| {
            NumistaError::lookup("No token could be obtained for label 'self'")
                .with_cause(e)
                .logged()
        })
    }

    /// Gets the self bearer token, generating it if absent.
    pub async fn my_token(&self) -> NumistaResult<SecretString> {
        self.observed(async {
            let record = self.self_token(None).await?;
            Ok::<_, NumistaError>(SecretString::new(record.token.expose_secret().clone()))
        })
        .await
    }

    /// Runs a `client_credentials` exchange into the self slot.
    ///
    /// Without a scope every available scope is requested.
    pub async fn my_token_generate(&self, scope: Option<&str>) -> NumistaResult<TokenRecord> {
        self.observed(async {
            let scope = match scope {
                Some(scope) => scope.to_string(),
                None => Scope::join(&Scope::ALL),
            };
            let _guard = self.self_token_lock.lock().await;
            self.exchange(OAuthParams::client_credentials(scope).with_label(SELF_TOKEN_LABEL))
                .await
        })
        .await
    }

    /// Deletes the self token and generates a new one.
    pub async fn my_token_refresh(&self) -> NumistaResult<TokenRecord> {
        self.observed(async {
            let previous = self.tokens.remove(SELF_TOKEN_LABEL).await;
            debug!(existed = previous.is_some(), "Destroyed token 'self'");
            let scope = previous.map(|record| record.scope);
            self.self_token(scope.as_deref()).await
        })
        .await
    }

    /// Gets the user ID the self token belongs to.
    pub async fn my_user_id(&self) -> NumistaResult<u64> {
        self.observed(async { Ok::<_, NumistaError>(self.self_token(None).await?.user_id) })
            .await
    }

    /// Gets the self token expiry as epoch seconds and display string.
    pub async fn my_token_expiry(&self) -> NumistaResult<(i64, String)> {
        self.observed(async {
            let record = self.self_token(None).await?;
            Ok::<_, NumistaError>((record.expires_at_epoch, record.expires_at_display))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use crate::auth::{OAuthParams, SELF_TOKEN_LABEL};
    use crate::client::NumistaClient;
    use crate::config::NumistaConfig;
    use crate::errors::NumistaErrorKind;
    use crate::mocks::MockHttpTransport;
    use crate::transport::HttpMethod;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;
    use std::sync::Arc;

    const GRANT: &str =
        r#"{"access_token": "tok-1234abcd", "token_type": "bearer", "expires_in": 3600, "user_id": 42}"#;

    fn client(transport: Arc<MockHttpTransport>) -> NumistaClient {
        let config = NumistaConfig::builder().api_key("key-0000").build().unwrap();
        NumistaClient::with_transport(config, transport).unwrap()
    }

    #[tokio::test]
    async fn test_client_credentials_exchange() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.enqueue_json_response(200, GRANT);
        let client = client(transport.clone());

        let before = chrono::Utc::now().timestamp();
        let record = client
            .oauth_exchange(
                OAuthParams::client_credentials("edit_collection,bogus").with_label("mine"),
            )
            .await
            .unwrap();
        let after = chrono::Utc::now().timestamp();

        assert_eq!(record.label, "mine");
        assert_eq!(record.user_id, 42);
        assert_eq!(record.scope, "edit_collection");
        assert!(record.expires_at_epoch >= before + 3599);
        assert!(record.expires_at_epoch <= after + 3599);

        transport.verify_request(0, HttpMethod::Get, "/v3/oauth_token?");
        let url = transport.last_request().unwrap().url;
        assert!(url.contains("grant_type=client_credentials"));
        assert!(url.contains("scope=edit_collection"));
        assert!(!url.contains("state="));
        assert!(client.tokens().contains("mine").await);
    }

    #[tokio::test]
    async fn test_rejected_exchange_is_authorization_error() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.enqueue_json_response(401, r#"{"error_message": "Invalid API key"}"#);
        let client = client(transport);

        let err = client
            .oauth_exchange(OAuthParams::client_credentials(""))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), NumistaErrorKind::AuthorizationError);
        assert_eq!(err.status_code(), Some(401));
        assert!(client.tokens().is_empty().await);
    }

    #[tokio::test]
    async fn test_incomplete_grant_is_authorization_error() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.enqueue_json_response(200, r#"{"access_token": "tok", "token_type": "bearer"}"#);
        let client = client(transport);

        let err = client
            .oauth_exchange(OAuthParams::client_credentials(""))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), NumistaErrorKind::AuthorizationError);
        assert!(client.tokens().is_empty().await);
    }

    #[tokio::test]
    async fn test_authorization_code_validated_before_dispatch() {
        let transport = Arc::new(MockHttpTransport::new());
        let client = client(transport.clone());

        let err = client
            .oauth_exchange(OAuthParams::authorization_code(
                "",
                "client",
                "secret",
                "https://cb",
                "",
            ))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), NumistaErrorKind::InvalidInput);
        assert_eq!(err.field(), Some("code"));
        transport.verify_request_count(0);
    }

    #[tokio::test]
    async fn test_unlabelled_exchange_gets_synthesized_label() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.enqueue_json_response(200, GRANT);
        transport.enqueue_json_response(200, GRANT);
        let client = client(transport);

        let first = client
            .oauth_exchange(OAuthParams::client_credentials(""))
            .await
            .unwrap();
        let second = client
            .oauth_exchange(OAuthParams::client_credentials(""))
            .await
            .unwrap();
        assert_eq!(first.label, "unnamed_token1");
        assert_eq!(second.label, "unnamed_token2");
    }

    #[tokio::test]
    async fn test_self_helpers() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.enqueue_json_response(200, GRANT);
        transport.enqueue_json_response(
            200,
            r#"{"access_token": "tok-refreshed", "token_type": "bearer", "expires_in": 3600, "user_id": 42}"#,
        );
        let client = client(transport.clone());

        assert_eq!(client.my_token().await.unwrap().expose_secret(), "tok-1234abcd");
        assert_eq!(client.my_user_id().await.unwrap(), 42);
        let (epoch, display) = client.my_token_expiry().await.unwrap();
        assert_eq!(display, crate::auth::format_epoch(epoch));
        transport.verify_request_count(1);

        let refreshed = client.my_token_refresh().await.unwrap();
        assert_eq!(refreshed.label, SELF_TOKEN_LABEL);
        assert_eq!(refreshed.token.expose_secret(), "tok-refreshed");
        transport.verify_request_count(2);
    }

    #[tokio::test]
    async fn test_generate_requests_every_scope() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.enqueue_json_response(200, GRANT);
        let client = client(transport.clone());

        let record = client.my_token_generate(None).await.unwrap();
        assert_eq!(record.scope, "view_collection,edit_collection");
        assert!(transport
            .last_request()
            .unwrap()
            .url
            .contains("scope=view_collection%2Cedit_collection"));
    }

    #[tokio::test]
    async fn test_lazy_self_token_requests_every_scope() {
        let transport = Arc::new(MockHttpTransport::new());
        for _ in 0..3 {
            transport.enqueue_json_response(200, GRANT);
        }
        let client = client(transport.clone());

        let record = client.resolve_token(None).await.unwrap();
        assert_eq!(record.scope, "view_collection,edit_collection");
        let url = transport.last_request().unwrap().url;
        assert!(url.contains("edit_collection"), "url: {}", url);

        client.tokens().remove(SELF_TOKEN_LABEL).await;
        client.my_token_generate(Some("view_collection")).await.unwrap();
        let refreshed = client.my_token_refresh().await.unwrap();
        assert_eq!(refreshed.scope, "view_collection");
        assert!(transport
            .last_request()
            .unwrap()
            .url
            .ends_with("scope=view_collection"));
    }

    #[tokio::test]
    async fn test_concurrent_self_resolution_exchanges_once() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.enqueue_json_response(200, GRANT);
        let client = client(transport.clone());

        let (a, b) = tokio::join!(client.resolve_token(None), client.resolve_token(None));
        assert_eq!(a.unwrap().user_id, 42);
        assert_eq!(b.unwrap().user_id, 42);
        transport.verify_request_count(1);
    }
}
