//! Configuration-related errors.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum ConfigError {
    /// Environment override could not be parsed
    #[error("Config parse error for {key}: {message}")]
    ParseError {
        /// Environment variable name
        key: String,
        /// Description of the parse failure
        message: String,
    },

    /// Config validation error (invalid values)
    #[error("Config validation error for {field}: {message}")]
    ValidationError {
        /// Name of the field that failed validation
        field: String,
        /// Description of the validation failure
        message: String,
    },
}

impl ConfigError {
    /// Flatten `validator` output into the first offending field.
    pub fn from_validation_errors(errors: &validator::ValidationErrors) -> Self {
        let mut fields: Vec<String> = Vec::new();
        collect_paths(errors, "", &mut fields);
        fields.sort();
        let field = fields.first().cloned().unwrap_or_else(|| "config".to_string());
        Self::ValidationError { field, message: errors.to_string() }
    }

    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::ValidationError { field: field.to_string(), message: message.into() }
    }
}

fn collect_paths(errors: &validator::ValidationErrors, prefix: &str, out: &mut Vec<String>) {
    for (name, kind) in errors.errors() {
        let path = if prefix.is_empty() { name.to_string() } else { format!("{prefix}.{name}") };
        match kind {
            validator::ValidationErrorsKind::Field(_) => out.push(path),
            validator::ValidationErrorsKind::Struct(inner) => collect_paths(inner, &path, out),
            validator::ValidationErrorsKind::List(items) => {
                for inner in items.values() {
                    collect_paths(inner, &path, out);
                }
            },
        }
    }
}
