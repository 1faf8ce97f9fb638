//! Core mapping and write machinery.
//!
//! - [`fields`] - field resolution and the [`Document`](fields::Document) trait
//! - [`codec`] - document encoding and decoding
//! - [`responses`] - typed engine response envelopes
//! - [`transport`] - the search-engine collaborator seam
//! - [`single`] - single-record operations
//! - [`bulk`] - the bulk write engine

pub mod bulk;
pub mod codec;
pub mod fields;
pub mod responses;
pub mod single;
pub mod transport;

pub use bulk::{BulkResult, insert_many, upsert_many, write_many};
pub use fields::{Document, FieldDescriptor, IdentifierBinding, TypeDescriptor};
pub use transport::{
    BulkAction, BulkChannel, BulkConfig, BulkItem, EngineResponse, ItemOutcome, ItemStatus,
    SearchTransport, WriteRequest,
};
