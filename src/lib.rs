//! # Numista Integration Library
//!
//! A client for the Numista numismatic catalogue API with:
//! - Catalogue search and lookup (types, issues, prices, issuers, catalogues)
//! - User collections and collected items, authorized with OAuth bearer tokens
//! - A process-local token store with lazy generation of the API key holder's
//!   own token
//! - A uniform result envelope for every API call
//! - Operation lookup in the published API schema
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use integrations_numista::{NumistaClient, NumistaConfig, SearchTypesParams};
//! use integrations_numista::types::Category;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = NumistaConfig::builder()
//!         .api_key("your-api-key")
//!         .build()?;
//!
//!     let client = NumistaClient::new(config)?;
//!
//!     let params = SearchTypesParams::new("Kopecks").category(Category::Coin);
//!     let response = client.catalogue().search_types(&params).await?;
//!     if !response.failed {
//!         println!("{:?}", response.data.get("count"));
//!     }
//!
//!     // Uses the API key holder's own token, generated on first use.
//!     let items = client
//!         .users()
//!         .get_collected_items(&Default::default())
//!         .await?;
//!     println!("{}", items.http_info.http_message);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

// Core modules
pub mod config;
pub mod errors;
pub mod types;

// Result envelope
pub mod response;

// Tokens and OAuth
pub mod auth;

// HTTP client and transport
pub mod client;
pub mod transport;

// API Services
pub mod services;

// Schema lookup
pub mod schema;

// Observability
pub mod observability;

// Mocks for testing
pub mod mocks;

// Re-exports for convenience
pub use auth::{GrantType, OAuthParams, Scope, TokenRecord, TokenStore};
pub use client::{NumistaClient, NumistaClientBuilder, QueryParams};
pub use config::{ApiVersion, NumistaConfig, NumistaConfigBuilder, SchemaSource};
pub use errors::{NumistaError, NumistaErrorKind, NumistaResult};
pub use response::{ApiResponse, HttpInfo, ResponseData, ResponseExtra};
pub use schema::{OperationDescriptor, SchemaIndex};
pub use services::{CatalogueService, CollectedItemsParams, SearchTypesParams, UsersService};
pub use transport::{HttpMethod, HttpTransport};
pub use types::{validate_grade, Category, Grade, Lang};
