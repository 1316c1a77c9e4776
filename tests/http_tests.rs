//! End-to-end tests over the reqwest transport against a local mock server.

use integrations_numista::types::Lang;
use integrations_numista::{
    CollectedItemsParams, HttpMethod, NumistaClient, NumistaConfig, NumistaErrorKind,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::io::Write;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "wiremock-key-7777";

const SCHEMA: &str = r#"
openapi: 3.0.0
info:
  title: Numista API
  version: "3"
paths:
  /users/{user_id}/collected_items:
    post:
      operationId: addCollectedItems
      requestBody:
        content:
          application/json:
            example:
              type: 420
              quantity: 1
      responses:
        201:
          description: Created
  /types/{type_id}:
    get:
      operationId: getType
"#;

fn config_for(server: &MockServer) -> NumistaConfig {
    NumistaConfig::builder()
        .api_key(API_KEY)
        .base_url(format!("{}/api", server.uri()))
        .schema_source(&format!("{}/doc/swagger.yaml", server.uri()))
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_collected_items_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/oauth_token"))
        .and(query_param("grant_type", "client_credentials"))
        .and(header("Numista-API-Key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "http-token-1111",
            "token_type": "bearer",
            "expires_in": 3600,
            "user_id": 42
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/v3/users/42/collected_items"))
        .and(header("Authorization", "Bearer http-token-1111"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "item_count": 1,
            "items": [{"id": 5, "quantity": 1}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = NumistaClient::new(config_for(&server)).unwrap();
    let response = client
        .users()
        .get_collected_items(&CollectedItemsParams::new())
        .await
        .unwrap();

    assert!(!response.failed);
    assert_eq!(response.data.get("item_count"), Some(&json!(1)));
}

#[tokio::test]
async fn test_non_json_body_is_returned_raw() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/types/420"))
        .and(query_param("lang", "fr"))
        .respond_with(ResponseTemplate::new(200).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let client = NumistaClient::new(config_for(&server)).unwrap();
    let response = client.catalogue().get_type(420, Lang::Fr).await.unwrap();

    assert!(response.failed);
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.data.as_raw().map(|b| b.to_vec()),
        Some(b"maintenance".to_vec())
    );
}

#[tokio::test]
async fn test_schema_fetched_once_over_http() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/doc/swagger.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SCHEMA))
        .expect(1)
        .mount(&server)
        .await;

    let client = NumistaClient::new(config_for(&server)).unwrap();

    let op = client
        .schema_find("getType", HttpMethod::Get)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(op.path, "/types/{type_id}");

    let body = client
        .schema_example_body("", HttpMethod::Post)
        .await
        .unwrap();
    assert_eq!(body, Some(json!({"type": 420, "quantity": 1})));

    assert!(client
        .schema_find("missingOperation", HttpMethod::Get)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_failed_schema_load_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/doc/swagger.yaml"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/doc/swagger.yaml"))
        .respond_with(ResponseTemplate::new(200).set_body_string(SCHEMA))
        .mount(&server)
        .await;

    let client = NumistaClient::new(config_for(&server)).unwrap();

    let err = client
        .schema_find("getType", HttpMethod::Get)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), NumistaErrorKind::SchemaError);
    assert_eq!(err.status_code(), Some(503));

    assert!(client
        .schema_find("getType", HttpMethod::Get)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_schema_from_local_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(SCHEMA.as_bytes()).unwrap();

    let config = NumistaConfig::builder()
        .api_key(API_KEY)
        .schema_source(&file.path().display().to_string())
        .build()
        .unwrap();
    let client = NumistaClient::new(config).unwrap();

    let body = client
        .schema_example_body("addCollectedItems", HttpMethod::Post)
        .await
        .unwrap();
    assert_eq!(body, Some(json!({"type": 420, "quantity": 1})));

    let err = client
        .schema_find("", HttpMethod::Get)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), NumistaErrorKind::InvalidInput);
}
