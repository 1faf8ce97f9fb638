//! Elasticsearch transport.
//!
//! [`ElasticsearchTransport`] maps the collaborator seam onto the official
//! client: existence checks, gets, searches with total-hit tracking, single
//! document writes and the bulk API.
//!
//! # Example
//!
//! ```ignore
//! use helios_docmap::backends::elasticsearch::{ElasticsearchConfig, ElasticsearchTransport};
//!
//! let config = ElasticsearchConfig {
//!     nodes: vec!["http://localhost:9200".to_string()],
//!     ..Default::default()
//! };
//! let transport = ElasticsearchTransport::new(config)?;
//! let found = helios_docmap::core::single::exists(&transport, "users", "u1").await?;
//! ```

mod backend;
mod bulk;

pub use backend::{ElasticsearchAuth, ElasticsearchConfig, ElasticsearchTransport};
pub use bulk::ElasticsearchBulkChannel;
