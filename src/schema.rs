//! Schema descriptor supplied to the model.
//!
//! The descriptor is an opaque block of text describing tables, columns and
//! relations. It is interpolated verbatim into every system prompt.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use crate::error::{ChatError, Result};

/// Schema text used when no schema file is configured.
pub const DEFAULT_SCHEMA: &str = r#"Table: applicant
  - applicantNumber: int (primary key)
  - sub_employer: varchar(255)
  - applicant_first: varchar(100)
  - applicant_middle: varchar(100)
  - applicant_last: varchar(100)
  - country_id: int (references country.id)

Table: country
  - id: int (primary key)
  - name: varchar(100)

Relations:
  - applicant.country_id -> country.id"#;

/// Immutable description of the database schema.
///
/// Cloning is cheap; all clones share the same text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaDescriptor {
    text: Arc<str>,
}

impl SchemaDescriptor {
    /// Creates a descriptor from the given text.
    pub fn new(text: impl Into<Arc<str>>) -> Self {
        Self { text: text.into() }
    }

    /// Loads a descriptor from a text file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ChatError::config(format!(
                "Failed to read schema file {}: {e}",
                path.display()
            ))
        })?;

        if text.trim().is_empty() {
            return Err(ChatError::config(format!(
                "Schema file {} is empty",
                path.display()
            )));
        }

        Ok(Self::new(text.trim_end()))
    }

    /// Returns the schema text.
    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl Default for SchemaDescriptor {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA)
    }
}

impl fmt::Display for SchemaDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
