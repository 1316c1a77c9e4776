//! Numista API service implementations.

mod catalogue;
mod users;

pub use catalogue::*;
pub use users::*;

use crate::errors::{NumistaError, NumistaResult};
use serde_json::Value;

/// Fails with `InvalidInput` when a required ID is zero.
pub(crate) fn require_id(field: &str, id: u64) -> NumistaResult<u64> {
    if id == 0 {
        return Err(
            NumistaError::invalid_input(field, format!("{} is a required field", field)).logged(),
        );
    }
    Ok(id)
}

/// Fails with `InvalidInput` unless the body is a non-empty JSON object.
pub(crate) fn require_body(body: &Value) -> NumistaResult<&Value> {
    if !body.is_object() || crate::client::is_empty_body(Some(body)) {
        return Err(NumistaError::invalid_input(
            "body",
            "Body validation failed, expected a non-empty JSON object",
        )
        .logged());
    }
    Ok(body)
}
