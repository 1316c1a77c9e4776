//! User operations: profiles, collections and collected items.
//!
//! Collection endpoints are authorized with a bearer token. A missing user ID
//! defaults to the user the authorizing token belongs to.

use super::{require_body, require_id};
use crate::auth::TokenRecord;
use crate::client::{NumistaClient, QueryParams};
use crate::errors::NumistaResult;
use crate::response::ApiResponse;
use crate::transport::HttpMethod;
use crate::types::{Category, Lang};
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

/// Filters for listing collected items.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectedItemsParams {
    /// Owner; defaults to the token's user.
    pub user_id: Option<u64>,
    /// Category filter, unrestricted when `None`.
    pub category: Option<Category>,
    /// Only items of this type.
    pub type_id: Option<u64>,
    /// Only items in this collection.
    pub collection: Option<u64>,
    /// Authorizing token label; the self token when `None`.
    pub token_label: Option<String>,
    /// Additional query parameters forwarded as given.
    pub extra: QueryParams,
}

impl CollectedItemsParams {
    /// Creates empty filters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the owner.
    pub fn user_id(mut self, user_id: u64) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Sets the category filter.
    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Sets the type filter.
    pub fn type_id(mut self, type_id: u64) -> Self {
        self.type_id = Some(type_id);
        self
    }

    /// Sets the collection filter.
    pub fn collection(mut self, collection: u64) -> Self {
        self.collection = Some(collection);
        self
    }

    /// Sets the authorizing token label.
    pub fn token_label(mut self, label: impl Into<String>) -> Self {
        self.token_label = Some(label.into());
        self
    }

    /// Adds a query parameter the API accepts beyond the fields above.
    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.extra = self.extra.with(key, value);
        self
    }

    fn to_query(&self) -> QueryParams {
        QueryParams::new()
            .with_opt("category", self.category)
            .with_nonzero("type", self.type_id.unwrap_or_default())
            .with_nonzero("collection", self.collection.unwrap_or_default())
            .extend(&self.extra)
    }
}

fn bearer(token: &TokenRecord) -> Option<HashMap<String, String>> {
    let mut headers = HashMap::new();
    headers.insert("Authorization".to_string(), token.bearer_header());
    Some(headers)
}

/// Service for user operations.
pub struct UsersService<'a> {
    client: &'a NumistaClient,
}

impl<'a> UsersService<'a> {
    /// Creates a new users service.
    pub fn new(client: &'a NumistaClient) -> Self {
        Self { client }
    }

    /// Resolves the token and the target user.
    async fn authorize(
        &self,
        user_id: Option<u64>,
        token_label: Option<&str>,
    ) -> NumistaResult<(TokenRecord, u64)> {
        debug!(token_label = token_label.unwrap_or("self"), "Resolving token");
        let token = self.client.resolve(token_label).await?;
        let user_id = match user_id.filter(|id| *id != 0) {
            Some(id) => id,
            None => {
                info!(user_id = token.user_id, "No user_id given, using the token's user");
                token.user_id
            }
        };
        Ok((token, user_id))
    }

    /// Gets a user's public profile.
    ///
    /// Without a user ID the self token's user is looked up, generating the
    /// token if needed.
    pub async fn get_user(&self, user_id: Option<u64>, lang: Lang) -> NumistaResult<ApiResponse> {
        self.client
            .observed(async {
                let user_id = match user_id.filter(|id| *id != 0) {
                    Some(id) => id,
                    None => {
                        info!("No user_id given, using the self token's user");
                        self.client.resolve(None).await?.user_id
                    }
                };
                self.client
                    .execute(
                        HttpMethod::Get,
                        &format!("/users/{}", user_id),
                        None,
                        None,
                        QueryParams::new().with("lang", lang),
                    )
                    .await
            })
            .await
    }

    /// Lists the collections owned by a user.
    pub async fn get_user_collections(
        &self,
        user_id: Option<u64>,
        category: Option<Category>,
        token_label: Option<&str>,
    ) -> NumistaResult<ApiResponse> {
        self.client
            .observed(async {
                let (token, user_id) = self.authorize(user_id, token_label).await?;
                self.client
                    .execute(
                        HttpMethod::Get,
                        &format!("/users/{}/collections", user_id),
                        None,
                        bearer(&token),
                        QueryParams::new().with_opt("category", category),
                    )
                    .await
            })
            .await
    }

    /// Lists the items owned by a user.
    pub async fn get_collected_items(
        &self,
        params: &CollectedItemsParams,
    ) -> NumistaResult<ApiResponse> {
        self.client
            .observed(async {
                let (token, user_id) = self
                    .authorize(params.user_id, params.token_label.as_deref())
                    .await?;
                self.client
                    .execute(
                        HttpMethod::Get,
                        &format!("/users/{}/collected_items", user_id),
                        None,
                        bearer(&token),
                        params.to_query(),
                    )
                    .await
            })
            .await
    }

    /// Adds an item to a user's collection.
    pub async fn add_collected_item(
        &self,
        user_id: Option<u64>,
        body: &Value,
        token_label: Option<&str>,
    ) -> NumistaResult<ApiResponse> {
        self.client
            .observed(async {
                let body = require_body(body)?;
                let (token, user_id) = self.authorize(user_id, token_label).await?;
                self.client
                    .execute(
                        HttpMethod::Post,
                        &format!("/users/{}/collected_items", user_id),
                        Some(body),
                        bearer(&token),
                        QueryParams::new(),
                    )
                    .await
            })
            .await
    }

    /// Alias of [`UsersService::add_collected_item`].
    pub async fn add_collected_items(
        &self,
        user_id: Option<u64>,
        body: &Value,
        token_label: Option<&str>,
    ) -> NumistaResult<ApiResponse> {
        self.add_collected_item(user_id, body, token_label).await
    }

    /// Gets one item of a user's collection.
    pub async fn get_collected_item(
        &self,
        user_id: Option<u64>,
        item_id: u64,
        token_label: Option<&str>,
    ) -> NumistaResult<ApiResponse> {
        self.client
            .observed(async {
                let item_id = require_id("item_id", item_id)?;
                let (token, user_id) = self.authorize(user_id, token_label).await?;
                self.client
                    .execute(
                        HttpMethod::Get,
                        &format!("/users/{}/collected_items/{}", user_id, item_id),
                        None,
                        bearer(&token),
                        QueryParams::new(),
                    )
                    .await
            })
            .await
    }

    /// Edits one item of a user's collection.
    pub async fn edit_collected_item(
        &self,
        user_id: Option<u64>,
        item_id: u64,
        body: &Value,
        token_label: Option<&str>,
    ) -> NumistaResult<ApiResponse> {
        self.client
            .observed(async {
                let item_id = require_id("item_id", item_id)?;
                let body = require_body(body)?;
                let (token, user_id) = self.authorize(user_id, token_label).await?;
                self.client
                    .execute(
                        HttpMethod::Patch,
                        &format!("/users/{}/collected_items/{}", user_id, item_id),
                        Some(body),
                        bearer(&token),
                        QueryParams::new(),
                    )
                    .await
            })
            .await
    }

    /// Deletes one item of a user's collection.
    pub async fn delete_collected_item(
        &self,
        user_id: Option<u64>,
        item_id: u64,
        token_label: Option<&str>,
    ) -> NumistaResult<ApiResponse> {
        self.client
            .observed(async {
                let item_id = require_id("item_id", item_id)?;
                let (token, user_id) = self.authorize(user_id, token_label).await?;
                self.client
                    .execute(
                        HttpMethod::Delete,
                        &format!("/users/{}/collected_items/{}", user_id, item_id),
                        None,
                        bearer(&token),
                        QueryParams::new(),
                    )
                    .await
            })
            .await
    }
}
