//! Lookup of operation descriptors in the published API schema.

use crate::client::NumistaClient;
use crate::config::SchemaSource;
use crate::errors::{NumistaError, NumistaResult};
use crate::transport::{HttpMethod, HttpRequest};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use tracing::{debug, info};

/// Operation used when no operation ID is given for an example body.
pub const DEFAULT_BODY_OPERATION: &str = "addCollectedItems";

/// One operation of the API schema.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationDescriptor {
    /// HTTP method.
    pub method: HttpMethod,
    /// Path template, e.g. `/types/{type_id}`.
    pub path: String,
    /// Operation ID.
    pub operation_id: String,
    /// The operation object as published.
    pub raw: Value,
}

impl OperationDescriptor {
    /// Gets the literal JSON request body example, if any.
    pub fn example_body(&self) -> Option<&Value> {
        self.raw
            .get("requestBody")?
            .get("content")?
            .get("application/json")?
            .get("example")
    }

    /// Gets the summary text.
    pub fn summary(&self) -> Option<&str> {
        self.raw.get("summary").and_then(Value::as_str)
    }
}

/// Operations of the API schema keyed by (method, path).
#[derive(Debug, Clone, Default)]
pub struct SchemaIndex {
    operations: HashMap<(HttpMethod, String), OperationDescriptor>,
}

impl SchemaIndex {
    /// Parses a YAML (or JSON) schema document.
    pub fn from_yaml(document: &str) -> NumistaResult<Self> {
        let yaml: serde_yaml::Value = serde_yaml::from_str(document).map_err(|e| {
            NumistaError::schema(format!("Failed to parse schema document: {}", e)).with_cause(e)
        })?;
        Self::from_value(&yaml_to_json(yaml))
    }

    /// Indexes the `paths` object of a schema document.
    pub fn from_value(document: &Value) -> NumistaResult<Self> {
        let paths = document
            .get("paths")
            .and_then(Value::as_object)
            .ok_or_else(|| NumistaError::schema("Schema document has no paths object"))?;

        let mut operations = HashMap::new();
        for (path, path_item) in paths {
            for method in [
                HttpMethod::Get,
                HttpMethod::Post,
                HttpMethod::Put,
                HttpMethod::Patch,
                HttpMethod::Delete,
            ] {
                let key = method.as_str().to_ascii_lowercase();
                let Some(operation) = path_item.get(&key) else {
                    continue;
                };
                let operation_id = operation
                    .get("operationId")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                if operation_id.is_empty() {
                    continue;
                }

                operations.insert(
                    (method, path.clone()),
                    OperationDescriptor {
                        method,
                        path: path.clone(),
                        operation_id: operation_id.to_string(),
                        raw: operation.clone(),
                    },
                );
            }
        }

        debug!(operations = operations.len(), "Schema indexed");
        Ok(Self { operations })
    }

    /// Gets an operation by method and path template.
    pub fn get(&self, method: HttpMethod, path: &str) -> Option<&OperationDescriptor> {
        self.operations.get(&(method, path.to_string()))
    }

    /// Finds an operation by ID and method.
    pub fn find(&self, operation_id: &str, method: HttpMethod) -> Option<&OperationDescriptor> {
        self.operations
            .values()
            .find(|op| op.method == method && op.operation_id == operation_id)
    }

    /// Gets the number of indexed operations.
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Returns true if no operations were indexed.
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Converts YAML to JSON, stringifying non-string mapping keys such as
/// response codes.
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    match value {
        serde_yaml::Value::Null => Value::Null,
        serde_yaml::Value::Bool(b) => Value::Bool(b),
        serde_yaml::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null)
            }
        }
        serde_yaml::Value::String(s) => Value::String(s),
        serde_yaml::Value::Sequence(items) => {
            Value::Array(items.into_iter().map(yaml_to_json).collect())
        }
        serde_yaml::Value::Mapping(mapping) => {
            let mut map = Map::new();
            for (k, v) in mapping {
                map.insert(yaml_key(k), yaml_to_json(v));
            }
            Value::Object(map)
        }
        serde_yaml::Value::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

impl NumistaClient {
    /// Finds an operation descriptor by ID and method.
    ///
    /// The schema is loaded on first use. A failed load is retried by the
    /// next lookup.
    pub async fn schema_find(
        &self,
        operation_id: &str,
        method: HttpMethod,
    ) -> NumistaResult<Option<OperationDescriptor>> {
        self.observed(self.find_operation(operation_id, method))
            .await
    }

    async fn find_operation(
        &self,
        operation_id: &str,
        method: HttpMethod,
    ) -> NumistaResult<Option<OperationDescriptor>> {
        if operation_id.trim().is_empty() {
            return Err(
                NumistaError::invalid_input("operation_id", "operation_id is a required field")
                    .logged(),
            );
        }
        if !method.is_supported() {
            return Err(NumistaError::invalid_input(
                "http_method",
                format!(
                    "The provided HTTP method ({}) is not valid, expected one of get, post, patch, delete",
                    method.as_str().to_ascii_lowercase()
                ),
            )
            .logged());
        }

        let index = self.schema_index().await?;
        let found = index.find(operation_id, method).cloned();
        if found.is_none() {
            info!(
                operation_id = %operation_id,
                method = %method,
                "Operation not found in schema"
            );
        }
        Ok(found)
    }

    /// Gets the literal JSON example body for an operation.
    ///
    /// An empty operation ID falls back to [`DEFAULT_BODY_OPERATION`].
    pub async fn schema_example_body(
        &self,
        operation_id: &str,
        method: HttpMethod,
    ) -> NumistaResult<Option<Value>> {
        self.observed(async {
            if !matches!(method, HttpMethod::Post | HttpMethod::Patch) {
                info!(method = %method, "A body is only needed for POST or PATCH operations");
            }

            let operation_id = match operation_id.trim() {
                "" => {
                    debug!("No operation ID given, using {}", DEFAULT_BODY_OPERATION);
                    DEFAULT_BODY_OPERATION
                }
                id => id,
            };

            let example = self
                .find_operation(operation_id, method)
                .await?
                .and_then(|op| op.example_body().cloned());
            if example.is_none() {
                debug!(operation_id = %operation_id, method = %method, "No example body found");
            }
            Ok::<_, NumistaError>(example)
        })
        .await
    }

    async fn schema_index(&self) -> NumistaResult<&SchemaIndex> {
        self.schema
            .get_or_try_init(|| self.load_schema())
            .await
    }

    async fn load_schema(&self) -> NumistaResult<SchemaIndex> {
        let source = &self.config.schema_source;
        info!(source = %source, "Fetching schema document");

        let document = match source {
            SchemaSource::Url(url) => {
                let response = self
                    .transport
                    .send(HttpRequest::get(url.clone()))
                    .await
                    .map_err(|e| {
                        NumistaError::transport(format!(
                            "No response while fetching schema from {}: {}",
                            url, e
                        ))
                        .with_cause(e)
                        .logged()
                    })?;
                if !(200..=299).contains(&response.status) {
                    return Err(NumistaError::schema(format!(
                        "Failed to fetch schema from {}",
                        url
                    ))
                    .with_status(response.status)
                    .logged());
                }
                String::from_utf8_lossy(&response.body).into_owned()
            }
            SchemaSource::File(path) => tokio::fs::read_to_string(path).await.map_err(|e| {
                NumistaError::schema(format!(
                    "Failed to read schema from {}: {}",
                    path.display(),
                    e
                ))
                .with_cause(e)
                .logged()
            })?,
        };

        SchemaIndex::from_yaml(&document).map_err(NumistaError::logged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NumistaConfig;
    use crate::errors::NumistaErrorKind;
    use crate::mocks::MockHttpTransport;
    use crate::transport::TransportError;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    fn client(transport: Arc<MockHttpTransport>) -> NumistaClient {
        let config = NumistaConfig::builder().api_key("key-2468").build().unwrap();
        NumistaClient::with_transport(config, transport).unwrap()
    }

    const SCHEMA: &str = r#"
openapi: 3.0.0
paths:
  /types/{type_id}:
    get:
      operationId: getType
      summary: Get a type
      responses:
        200:
          description: OK
  /users/{user_id}/collected_items:
    get:
      operationId: getCollectedItems
    post:
      operationId: addCollectedItems
      requestBody:
        content:
          application/json:
            example:
              type: 420
              quantity: 1
              grade: xf
"#;

    #[test]
    fn test_index_and_find() {
        let index = SchemaIndex::from_yaml(SCHEMA).unwrap();
        assert_eq!(index.len(), 3);

        let op = index.find("getType", HttpMethod::Get).unwrap();
        assert_eq!(op.path, "/types/{type_id}");
        assert_eq!(op.summary(), Some("Get a type"));
        assert_eq!(op.raw["responses"]["200"]["description"], json!("OK"));

        assert!(index.find("getType", HttpMethod::Post).is_none());
        assert!(index
            .get(HttpMethod::Get, "/users/{user_id}/collected_items")
            .is_some());
    }

    #[test]
    fn test_example_body() {
        let index = SchemaIndex::from_yaml(SCHEMA).unwrap();
        let op = index.find("addCollectedItems", HttpMethod::Post).unwrap();
        assert_eq!(
            op.example_body(),
            Some(&json!({"type": 420, "quantity": 1, "grade": "xf"}))
        );
        assert!(index
            .find("getType", HttpMethod::Get)
            .unwrap()
            .example_body()
            .is_none());
    }

    #[test]
    fn test_document_without_paths() {
        let err = SchemaIndex::from_yaml("openapi: 3.0.0\n").unwrap_err();
        assert_eq!(err.kind(), crate::errors::NumistaErrorKind::SchemaError);
        assert!(SchemaIndex::from_yaml("paths: [unclosed").is_err());
    }

    #[tokio::test]
    async fn test_unsupported_method_rejected_before_load() {
        let transport = Arc::new(MockHttpTransport::new());
        let client = client(transport.clone());

        let err = client
            .schema_find("getType", HttpMethod::Put)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), NumistaErrorKind::InvalidInput);
        assert_eq!(err.field(), Some("http_method"));
        transport.verify_request_count(0);
    }

    #[tokio::test]
    async fn test_unreachable_schema_is_transport_error() {
        let transport = Arc::new(MockHttpTransport::new());
        transport.enqueue_error(TransportError::Timeout);
        transport.enqueue_text_response(200, SCHEMA);
        let client = client(transport.clone());

        let err = client
            .schema_find("getType", HttpMethod::Get)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), NumistaErrorKind::Transport);

        assert!(client
            .schema_find("getType", HttpMethod::Get)
            .await
            .unwrap()
            .is_some());
        transport.verify_request(1, HttpMethod::Get, "swagger.yaml");
    }
}
