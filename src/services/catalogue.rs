//! Catalogue operations: types, issues, prices, issuers and catalogues.

use super::{require_body, require_id};
use crate::client::{NumistaClient, QueryParams};
use crate::errors::NumistaResult;
use crate::response::ApiResponse;
use crate::transport::HttpMethod;
use crate::types::{normalize_currency, Category, Lang};
use serde_json::Value;
use tracing::{debug, info};

/// Default page size for type searches.
pub const DEFAULT_SEARCH_COUNT: u32 = 50;

/// Parameters for searching catalogue types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchTypesParams {
    /// Free-text query.
    pub q: String,
    /// Issuer code.
    pub issuer: String,
    /// Category filter, unrestricted when `None`.
    pub category: Option<Category>,
    /// Page number, starting at 1.
    pub page: u32,
    /// Results per page.
    pub count: u32,
    /// Response language.
    pub lang: Lang,
    /// Additional query parameters forwarded as given.
    pub extra: QueryParams,
}

impl Default for SearchTypesParams {
    fn default() -> Self {
        Self {
            q: String::new(),
            issuer: String::new(),
            category: None,
            page: 1,
            count: DEFAULT_SEARCH_COUNT,
            lang: Lang::default(),
            extra: QueryParams::new(),
        }
    }
}

impl SearchTypesParams {
    /// Creates parameters for a free-text query.
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            ..Default::default()
        }
    }

    /// Sets the issuer code.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    /// Sets the category filter.
    pub fn category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    /// Sets the page.
    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    /// Sets the page size.
    pub fn count(mut self, count: u32) -> Self {
        self.count = count;
        self
    }

    /// Sets the language.
    pub fn lang(mut self, lang: Lang) -> Self {
        self.lang = lang;
        self
    }

    /// Adds a query parameter the API accepts beyond the fields above,
    /// such as `year` or `min_year`.
    pub fn param(mut self, key: &str, value: impl ToString) -> Self {
        self.extra = self.extra.with(key, value);
        self
    }

    fn to_query(&self) -> QueryParams {
        QueryParams::new()
            .with("q", &self.q)
            .with("issuer", &self.issuer)
            .with_opt("category", self.category)
            .with_nonzero("page", self.page)
            .with_nonzero("count", self.count)
            .with("lang", self.lang)
            .extend(&self.extra)
    }
}

/// Service for catalogue operations.
pub struct CatalogueService<'a> {
    client: &'a NumistaClient,
}

impl<'a> CatalogueService<'a> {
    /// Creates a new catalogue service.
    pub fn new(client: &'a NumistaClient) -> Self {
        Self { client }
    }

    /// Searches the catalogue for coin, banknote and exonumia types.
    pub async fn search_types(&self, params: &SearchTypesParams) -> NumistaResult<ApiResponse> {
        self.client
            .observed(async {
                debug!(params = ?params, "Searching types");
                self.client
                    .execute(HttpMethod::Get, "/types", None, None, params.to_query())
                    .await
            })
            .await
    }

    /// Adds a type to the catalogue.
    ///
    /// Requires a specific permission on the API key. At least one issue must
    /// be added to the new type afterwards.
    pub async fn add_type(&self, body: &Value, lang: Lang) -> NumistaResult<ApiResponse> {
        self.client
            .observed(async {
                let body = require_body(body)?;
                info!("The Numista API requires at least one issue to be added to a new type");
                self.client
                    .execute(
                        HttpMethod::Post,
                        "/types",
                        Some(body),
                        None,
                        QueryParams::new().with("lang", lang),
                    )
                    .await
            })
            .await
    }

    /// Gets a type by ID.
    pub async fn get_type(&self, type_id: u64, lang: Lang) -> NumistaResult<ApiResponse> {
        self.client
            .observed(async {
                let type_id = require_id("type_id", type_id)?;
                self.client
                    .execute(
                        HttpMethod::Get,
                        &format!("/types/{}", type_id),
                        None,
                        None,
                        QueryParams::new().with("lang", lang),
                    )
                    .await
            })
            .await
    }

    /// Gets the issues of a type.
    pub async fn get_issues(&self, type_id: u64, lang: Lang) -> NumistaResult<ApiResponse> {
        self.client
            .observed(async {
                let type_id = require_id("type_id", type_id)?;
                self.client
                    .execute(
                        HttpMethod::Get,
                        &format!("/types/{}/issues", type_id),
                        None,
                        None,
                        QueryParams::new().with("lang", lang),
                    )
                    .await
            })
            .await
    }

    /// Adds an issue to a type.
    pub async fn add_issue(
        &self,
        type_id: u64,
        body: &Value,
        lang: Lang,
    ) -> NumistaResult<ApiResponse> {
        self.client
            .observed(async {
                let type_id = require_id("type_id", type_id)?;
                let body = require_body(body)?;
                self.client
                    .execute(
                        HttpMethod::Post,
                        &format!("/types/{}/issues", type_id),
                        Some(body),
                        None,
                        QueryParams::new().with("lang", lang),
                    )
                    .await
            })
            .await
    }

    /// Gets price estimates for an issue.
    ///
    /// The currency is normalized; invalid codes fall back to the configured
    /// default currency.
    pub async fn get_prices(
        &self,
        type_id: u64,
        issue_id: u64,
        currency: &str,
        lang: Lang,
    ) -> NumistaResult<ApiResponse> {
        self.client
            .observed(async {
                let type_id = require_id("type_id", type_id)?;
                let issue_id = require_id("issue_id", issue_id)?;
                let currency = normalize_currency(currency, &self.client.config().default_currency);
                self.client
                    .execute(
                        HttpMethod::Get,
                        &format!("/types/{}/issues/{}/prices", type_id, issue_id),
                        None,
                        None,
                        QueryParams::new()
                            .with("currency", currency)
                            .with("lang", lang),
                    )
                    .await
            })
            .await
    }

    /// Lists issuers.
    pub async fn get_issuers(&self, lang: Lang) -> NumistaResult<ApiResponse> {
        self.client
            .request(
                HttpMethod::Get,
                "/issuers",
                None,
                None,
                QueryParams::new().with("lang", lang),
            )
            .await
    }

    /// Lists reference catalogues.
    pub async fn get_catalogues(&self) -> NumistaResult<ApiResponse> {
        self.client
            .request(HttpMethod::Get, "/catalogues", None, None, QueryParams::new())
            .await
    }

    /// Alias of [`CatalogueService::get_catalogues`].
    pub async fn get_catalogs(&self) -> NumistaResult<ApiResponse> {
        self.get_catalogues().await
    }
}
