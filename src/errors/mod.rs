//! Error types for the Numista client.

use std::fmt;
use thiserror::Error;

/// Result type alias for Numista operations.
pub type NumistaResult<T> = Result<T, NumistaError>;

/// Error kinds for categorizing Numista errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumistaErrorKind {
    /// A required field is missing or a value is outside its valid set.
    InvalidInput,
    /// A token could not be found and could not be generated.
    LookupError,
    /// The OAuth endpoint rejected the token exchange.
    AuthorizationError,
    /// The client configuration is invalid.
    InvalidConfiguration,
    /// The API schema document could not be loaded or parsed.
    SchemaError,
    /// A request body could not be serialized.
    DeserializationError,
    /// No response was received where the caller needs one, such as the
    /// schema document fetch.
    Transport,
}

impl fmt::Display for NumistaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInput => write!(f, "invalid_input"),
            Self::LookupError => write!(f, "lookup_error"),
            Self::AuthorizationError => write!(f, "authorization_error"),
            Self::InvalidConfiguration => write!(f, "invalid_configuration"),
            Self::SchemaError => write!(f, "schema_error"),
            Self::DeserializationError => write!(f, "deserialization_error"),
            Self::Transport => write!(f, "transport"),
        }
    }
}

/// Numista client error.
#[derive(Error, Debug)]
pub struct NumistaError {
    kind: NumistaErrorKind,
    message: String,
    /// Offending input field, for `InvalidInput`.
    field: Option<String>,
    /// HTTP status of the rejected exchange, if any.
    status_code: Option<u16>,
    #[source]
    cause: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for NumistaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if let Some(ref field) = self.field {
            write!(f, " (field: {})", field)?;
        }
        if let Some(code) = self.status_code {
            write!(f, " (HTTP {})", code)?;
        }
        Ok(())
    }
}

impl NumistaError {
    /// Creates a new error.
    pub fn new(kind: NumistaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            field: None,
            status_code: None,
            cause: None,
        }
    }

    /// Sets the offending field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Sets the HTTP status code.
    pub fn with_status(mut self, code: u16) -> Self {
        self.status_code = Some(code);
        self
    }

    /// Sets the underlying cause.
    pub fn with_cause(mut self, cause: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }

    /// Gets the error kind.
    pub fn kind(&self) -> NumistaErrorKind {
        self.kind
    }

    /// Gets the message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Gets the offending field name.
    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }

    /// Gets the HTTP status code.
    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    /// Logs the error at error level and returns it.
    ///
    /// Every error returned by the client passes through here so that the
    /// log stream and returned errors stay in correspondence.
    pub fn logged(self) -> Self {
        tracing::error!(
            kind = %self.kind,
            field = self.field.as_deref().unwrap_or(""),
            status = self.status_code.unwrap_or(0),
            "{}",
            self.message
        );
        self
    }

    // Convenience constructors

    /// Creates an invalid input error naming the offending field.
    pub fn invalid_input(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NumistaErrorKind::InvalidInput, message).with_field(field)
    }

    /// Creates a token lookup error.
    pub fn lookup(message: impl Into<String>) -> Self {
        Self::new(NumistaErrorKind::LookupError, message)
    }

    /// Creates an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(NumistaErrorKind::AuthorizationError, message)
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(NumistaErrorKind::InvalidConfiguration, message)
    }

    /// Creates a schema error.
    pub fn schema(message: impl Into<String>) -> Self {
        Self::new(NumistaErrorKind::SchemaError, message)
    }

    /// Creates a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(NumistaErrorKind::Transport, message)
    }
}

/// Returns true if the error was raised before any network call was made.
pub fn is_validation_error(error: &NumistaError) -> bool {
    matches!(
        error.kind(),
        NumistaErrorKind::InvalidInput | NumistaErrorKind::InvalidConfiguration
    )
}
