//! Schema descriptors for persisted record types.
//!
//! A [`LiveSchema`] is what the data connection reports for a source table.
//! A [`SchemaDescriptor`] is the validated combination of that live schema with
//! the fields a record type exposes, and is what the metadata cache hands out.

use serde::{Deserialize, Serialize};

use crate::{SchemaError, TabulaResult};

/// Field and key information reported by live schema introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiveSchema {
    /// All column names, in schema order.
    pub attributes: Vec<String>,
    /// Columns forming the primary key, in key order.
    pub primary_key: Vec<String>,
    /// `attributes` minus `primary_key`, in schema order.
    pub non_primary_key: Vec<String>,
    /// Server-generated (auto-increment) column, if any.
    pub identity_column: Option<String>,
}

impl LiveSchema {
    /// Build a live schema from its column list and primary key, deriving the
    /// non-primary-key columns.
    pub fn new(
        attributes: Vec<String>,
        primary_key: Vec<String>,
        identity_column: Option<String>,
    ) -> Self {
        let non_primary_key = attributes
            .iter()
            .filter(|a| !primary_key.contains(*a))
            .cloned()
            .collect();
        Self {
            attributes,
            primary_key,
            non_primary_key,
            identity_column,
        }
    }

    /// Check that the primary and non-primary keys partition the attributes
    /// and that the identity column is one of them.
    pub fn validate(&self, record_type: &str) -> TabulaResult<()> {
        let inconsistent = |reason: String| SchemaError::InconsistentSchema {
            record_type: record_type.to_string(),
            reason,
        };

        for (i, attribute) in self.attributes.iter().enumerate() {
            if self.attributes[..i].contains(attribute) {
                return Err(inconsistent(format!("duplicate column `{}`", attribute)).into());
            }
            let in_pk = self.primary_key.contains(attribute);
            let in_non_pk = self.non_primary_key.contains(attribute);
            if in_pk && in_non_pk {
                return Err(inconsistent(format!(
                    "column `{}` is both primary and non-primary key",
                    attribute
                ))
                .into());
            }
            if !in_pk && !in_non_pk {
                return Err(inconsistent(format!(
                    "column `{}` is in neither primary nor non-primary key",
                    attribute
                ))
                .into());
            }
        }

        if let Some(stray) = self
            .primary_key
            .iter()
            .chain(&self.non_primary_key)
            .find(|c| !self.attributes.contains(*c))
        {
            return Err(inconsistent(format!("key column `{}` is not an attribute", stray)).into());
        }

        if self.primary_key.len() + self.non_primary_key.len() != self.attributes.len() {
            return Err(inconsistent("key columns repeat".to_string()).into());
        }

        if let Some(identity) = &self.identity_column {
            if !self.attributes.contains(identity) {
                return Err(inconsistent(format!(
                    "identity column `{}` is not an attribute",
                    identity
                ))
                .into());
            }
        }

        Ok(())
    }
}

/// Structural metadata for one record type.
///
/// Identity is the fully-qualified type name. Once a descriptor has been
/// populated in a process it is never modified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub record_type: String,
    pub attributes: Vec<String>,
    pub primary_key: Vec<String>,
    pub non_primary_key: Vec<String>,
    pub identity_column: Option<String>,
    /// Fields exposed on the in-memory record type. Always a subset of
    /// `attributes`.
    pub column_properties: Vec<String>,
}

impl SchemaDescriptor {
    /// Combine a live schema with the fields a record type exposes.
    ///
    /// Every exposed field must be a schema column; the schema may have
    /// columns the type does not expose. A violation is a
    /// [`SchemaError::Mismatch`] naming every offending field.
    pub fn assemble(
        record_type: &str,
        live: LiveSchema,
        column_properties: &[&str],
    ) -> TabulaResult<Self> {
        live.validate(record_type)?;

        let diff: Vec<String> = column_properties
            .iter()
            .filter(|p| !live.attributes.iter().any(|a| a.as_str() == **p))
            .map(|p| p.to_string())
            .collect();

        if !diff.is_empty() {
            return Err(SchemaError::Mismatch {
                record_type: record_type.to_string(),
                columns: diff,
            }
            .into());
        }

        Ok(Self {
            record_type: record_type.to_string(),
            attributes: live.attributes,
            primary_key: live.primary_key,
            non_primary_key: live.non_primary_key,
            identity_column: live.identity_column,
            column_properties: column_properties.iter().map(|p| p.to_string()).collect(),
        })
    }

    /// Check whether `name` is a schema column.
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.iter().any(|a| a == name)
    }
}
