//! Column attribute descriptors and the schema adjuster.
//!
//! The rebuild strategy may hand back a different column set than the one
//! the server described. `SchemaAdjuster` derives descriptors for that new
//! set. Type metadata is not known at this layer, so everything except the
//! name is left unspecified (zero / text).

use crate::adaptee::{Format, Oid};
use std::collections::HashMap;

/// Attribute descriptor of one result column (libpq `PGresAttDesc`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FieldDescriptor {
    pub name: String,
    /// OID of the source table, 0 if not a plain column reference.
    pub table_oid: Oid,
    /// Attribute number within the source table, 0 if unknown.
    pub column_id: i16,
    pub type_oid: Oid,
    pub type_len: i16,
    pub type_modifier: i32,
    pub format: Format,
}

impl FieldDescriptor {
    /// Descriptor carrying only a name; all type metadata unspecified.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Text-format descriptor with a known type.
    pub fn typed(name: impl Into<String>, type_oid: Oid) -> Self {
        Self {
            name: name.into(),
            type_oid,
            type_len: -1,
            ..Self::default()
        }
    }
}

/// Ordered column descriptors plus a name lookup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    fields: Vec<FieldDescriptor>,
    name_to_index: HashMap<String, usize>,
}

impl Schema {
    pub fn from_fields(fields: Vec<FieldDescriptor>) -> Self {
        let mut name_to_index = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            // Duplicate names resolve to the first column, as PQfnumber does.
            name_to_index.entry(field.name.clone()).or_insert(i);
        }
        Self {
            fields,
            name_to_index,
        }
    }

    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Self {
        Self::from_fields(
            names
                .iter()
                .map(|n| FieldDescriptor::named(n.as_ref()))
                .collect(),
        )
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, idx: usize) -> Option<&FieldDescriptor> {
        self.fields.get(idx)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_to_index.get(name).copied()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

/// How a rebuilt column set differs from the original.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchemaChange {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    pub before: usize,
    pub after: usize,
}

impl SchemaChange {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.before == self.after
    }
}

/// Derives attribute descriptors for a driver-determined column set.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaAdjuster;

impl SchemaAdjuster {
    pub fn new() -> Self {
        Self
    }

    /// Build the schema for `names`, replacing `original`.
    pub fn adjust<S: AsRef<str>>(&self, original: &Schema, names: &[S]) -> Schema {
        let adjusted = Schema::from_names(names);
        let change = self.diff(original, &adjusted);
        if !change.is_unchanged() {
            tracing::debug!(
                before = change.before,
                after = change.after,
                added = ?change.added,
                removed = ?change.removed,
                "result columns reshaped by driver"
            );
        }
        adjusted
    }

    /// Compare two schemas by column name.
    pub fn diff(&self, original: &Schema, adjusted: &Schema) -> SchemaChange {
        let added = adjusted
            .names()
            .filter(|n| original.index_of(n).is_none())
            .map(str::to_string)
            .collect();
        let removed = original
            .names()
            .filter(|n| adjusted.index_of(n).is_none())
            .map(str::to_string)
            .collect();

        SchemaChange {
            added,
            removed,
            before: original.len(),
            after: adjusted.len(),
        }
    }
}
