//! Schema resolution
//!
//! Maps the headers actually present in a source onto canonical fields using
//! the ordered candidate lists of a `SourceSchema`. Every missing required
//! field is collected before failing, so one error names all of them.

use crate::config::{CanonicalField, SourceSchema};
use crate::error::{MissingField, SchemaValidationError};
use std::collections::{BTreeMap, HashSet};

/// Canonical field -> header present in the source
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMap {
    columns: BTreeMap<CanonicalField, String>,
}

impl ColumnMap {
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.columns.get(&field).map(|s| s.as_str())
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.columns.contains_key(&field)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CanonicalField, &str)> {
        self.columns.iter().map(|(f, h)| (*f, h.as_str()))
    }
}

#[derive(Debug, Clone)]
pub struct SchemaResolver {
    schema: SourceSchema,
}

impl SchemaResolver {
    pub fn new(schema: SourceSchema) -> Self {
        Self { schema }
    }

    pub fn schema(&self) -> &SourceSchema {
        &self.schema
    }

    pub fn resolve<S: AsRef<str>>(&self, headers: &[S]) -> Result<ColumnMap, SchemaValidationError> {
        let present: HashSet<&str> = headers.iter().map(|h| h.as_ref().trim()).collect();

        let mut columns = BTreeMap::new();
        let mut missing = Vec::new();

        for spec in &self.schema.fields {
            let found = spec
                .candidates
                .iter()
                .find(|c| present.contains(c.trim()));

            match found {
                Some(header) => {
                    columns.insert(spec.field, header.trim().to_string());
                }
                None if spec.required => missing.push(MissingField {
                    field: spec.field,
                    candidates: spec.candidates.clone(),
                }),
                None => {}
            }
        }

        if missing.is_empty() {
            Ok(ColumnMap { columns })
        } else {
            Err(SchemaValidationError { missing })
        }
    }
}
