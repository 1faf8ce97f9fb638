//! Field resolution for document types.
//!
//! A [`TypeDescriptor`] lists the fields of a record type in declaration order,
//! each with the document property it is stored under. Descriptors are static
//! tables generated by `#[derive(Document)]`; they can also be written by hand
//! for types that cannot use the derive.
//!
//! The property name of a field is the first comma-delimited token of its
//! serialization annotation, or the field name when there is no (non-empty)
//! annotation. The first field whose property is [`ID_PROPERTY`] is the
//! document identifier.

use std::collections::HashMap;

use serde::Serialize;
use serde::de::DeserializeOwned;

/// The reserved document property carrying the document key.
pub const ID_PROPERTY: &str = "_id";

/// A record type that can be stored as a search-engine document.
///
/// Usually implemented with `#[derive(Document)]`:
///
/// ```
/// use helios_docmap::Document;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Serialize, Deserialize, Document)]
/// struct Tag {
///     #[serde(rename = "_id")]
///     key: String,
///     label: String,
/// }
///
/// assert_eq!(Tag::descriptor().identifier().unwrap().index, 0);
/// ```
pub trait Document: Serialize + DeserializeOwned {
    /// Returns the field table of this type.
    fn descriptor() -> &'static TypeDescriptor;
}

/// Describes one field of a record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    /// Structural (Rust) field name.
    pub name: &'static str,
    /// Serialization annotation, e.g. a serde rename.
    pub annotation: Option<&'static str>,
    /// Declaration position within the type.
    pub index: usize,
}

impl FieldDescriptor {
    /// Creates a field descriptor.
    pub const fn new(name: &'static str, annotation: Option<&'static str>, index: usize) -> Self {
        Self {
            name,
            annotation,
            index,
        }
    }

    /// Returns the document property this field is stored under.
    pub fn property(&self) -> &'static str {
        property_name(self.name, self.annotation)
    }

    /// Returns true if this field carries the document identifier.
    pub fn is_identifier(&self) -> bool {
        self.property() == ID_PROPERTY
    }
}

/// Resolves a document property name from a field name and its annotation.
///
/// ```
/// use helios_docmap::core::fields::property_name;
///
/// assert_eq!(property_name("Id", Some("_id,omitempty")), "_id");
/// assert_eq!(property_name("Name", None), "Name");
/// assert_eq!(property_name("Name", Some(",omitempty")), "Name");
/// ```
pub fn property_name<'a>(name: &'a str, annotation: Option<&'a str>) -> &'a str {
    annotation
        .and_then(|tag| tag.split(',').next())
        .filter(|property| !property.is_empty())
        .unwrap_or(name)
}

/// The field bound to the document identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifierBinding {
    /// Declaration position of the identifier field.
    pub index: usize,
    /// Structural name of the identifier field.
    pub name: &'static str,
}

/// The field table of a record type.
#[derive(Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    type_name: &'static str,
    fields: &'static [FieldDescriptor],
}

impl TypeDescriptor {
    /// Creates a descriptor from a static field table.
    pub const fn new(type_name: &'static str, fields: &'static [FieldDescriptor]) -> Self {
        Self { type_name, fields }
    }

    /// Returns the record type's name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns the fields in declaration order.
    pub fn fields(&self) -> &'static [FieldDescriptor] {
        self.fields
    }

    /// Finds the identifier field, the first one whose property is `_id`.
    ///
    /// Returns `None` when no field maps to `_id`; callers decide whether
    /// that disables identifier-dependent operations.
    pub fn identifier(&self) -> Option<IdentifierBinding> {
        self.fields
            .iter()
            .find(|field| field.is_identifier())
            .map(|field| IdentifierBinding {
                index: field.index,
                name: field.name,
            })
    }

    /// Returns the identifier field's descriptor.
    pub fn identifier_field(&self) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|field| field.is_identifier())
    }

    /// Finds the first field stored under the given document property.
    pub fn field_by_property(&self, property: &str) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|field| field.property() == property)
    }

    /// Finds a field by its declaration position.
    pub fn field_by_index(&self, index: usize) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|field| field.index == index)
    }

    /// Finds a field by its structural name.
    pub fn field_by_name(&self, name: &str) -> Option<&'static FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Maps every structural field name to its document property.
    pub fn property_map(&self) -> HashMap<&'static str, &'static str> {
        self.fields
            .iter()
            .map(|field| (field.name, field.property()))
            .collect()
    }
}
