//! # Error Handling
//!
//! Crate-level error type. Engine failures carry a [`SecretsError`]; this
//! type adds the configuration and I/O failures that happen around it.

use crate::secrets::SecretsError;

/// Custom result type for kvmirror operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for kvmirror
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Secret engine errors
    #[error(transparent)]
    Secrets(#[from] SecretsError),
}

impl Error {
    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config(message.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation(message.into())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = errors
            .field_errors()
            .iter()
            .map(|(field, field_errors)| {
                let messages: Vec<String> = field_errors
                    .iter()
                    .map(|e| e.message.as_ref().map_or("Invalid value".to_string(), |m| m.to_string()))
                    .collect();
                format!("{}: {}", field, messages.join(", "))
            })
            .collect();
        fields.sort();
        if fields.is_empty() {
            return Self::validation(format!("Validation failed: {}", errors));
        }

        Self::validation(format!("Validation failed: {}", fields.join("; ")))
    }
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Self::config(format!("Invalid configuration file: {}", error))
    }
}
