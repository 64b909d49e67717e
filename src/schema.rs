//! Schema description used to ground every generation prompt.
//!
//! Loaded once at startup and immutable for the process lifetime. A file
//! path can override the built-in text for deployments with a different
//! table layout.

use std::path::Path;
use std::sync::Arc;

/// Built-in schema description (MIMIC-style hospital tables).
const BUILTIN_SCHEMA: &str = include_str!("../resources/schema.md");

#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("Cannot read schema file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Immutable textual description of every queryable table and column.
#[derive(Debug, Clone)]
pub struct SchemaProvider {
    text: Arc<str>,
}

impl SchemaProvider {
    /// Load from an override file when given, else the built-in text.
    pub fn load(path: Option<&Path>) -> Result<Self, SchemaError> {
        match path {
            Some(p) => {
                let text = std::fs::read_to_string(p).map_err(|source| SchemaError::Read {
                    path: p.display().to_string(),
                    source,
                })?;
                tracing::info!(path = %p.display(), bytes = text.len(), "Loaded schema description");
                Ok(Self { text: text.into() })
            }
            None => Ok(Self::builtin()),
        }
    }

    /// The embedded default schema.
    pub fn builtin() -> Self {
        Self {
            text: BUILTIN_SCHEMA.into(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
