//! Helios Document Mapping Layer
//!
//! This crate persists and queries arbitrary typed records in Elasticsearch
//! without per-type serialization code. A record type derives [`Document`],
//! which records at compile time how each field maps to a document property
//! and which field carries the document identifier (`_id`).
//!
//! # Features
//!
//! - **Field resolution**: serde-compatible property names, identifier binding
//! - **Codec**: identifier-free write bodies, hit decoding that restores `_id`
//! - **Single-record operations**: exists, find, insert, update, upsert, patch, delete
//! - **Bulk writes**: insert/upsert many records with per-position outcomes
//! - **Repositories**: [`Loader`](repository::Loader) and
//!   [`Searcher`](repository::Searcher) facades
//!
//! # Backend Features
//!
//! - `elasticsearch` (default) - Elasticsearch collaborator built on the
//!   official client
//!
//! # Architecture
//!
//! - [`error`] - Error types for all operations
//! - [`core`] - Field resolver, codec, typed responses, the transport seam,
//!   single-record operations and the bulk engine
//! - [`repository`] - Loader/Searcher composition
//! - [`backends`] - Transport implementations
//! - [`health`] - Engine health checks
//! - [`passcode`] - Passcode storage on top of the single-record operations
//!
//! # Quick Start
//!
//! ```
//! use helios_docmap::Document;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Serialize, Deserialize, Document)]
//! struct User {
//!     #[serde(rename = "_id", default)]
//!     id: String,
//!     #[serde(rename = "userName")]
//!     user_name: String,
//!     email: String,
//! }
//!
//! let descriptor = User::descriptor();
//! let id = descriptor.identifier().unwrap();
//! assert_eq!(id.name, "id");
//! assert_eq!(descriptor.field_by_name("user_name").unwrap().property(), "userName");
//!
//! let user = User { id: "u1".into(), user_name: "ann".into(), email: "ann@example.com".into() };
//! let body = helios_docmap::core::codec::encode_without_id(&user).unwrap();
//! assert!(!body.contains_key("_id"));
//! assert_eq!(body["userName"], "ann");
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Lets the derive's `::helios_docmap::...` paths resolve inside this crate.
extern crate self as helios_docmap;

pub mod backends;
pub mod core;
pub mod error;
pub mod health;
pub mod passcode;
pub mod repository;

pub use crate::core::fields::{
    Document, FieldDescriptor, ID_PROPERTY, IdentifierBinding, TypeDescriptor,
};
pub use crate::error::{StorageError, StorageResult};
pub use helios_docmap_macro::Document;
