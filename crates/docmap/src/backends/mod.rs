//! Search-engine transport implementations.
//!
//! Each backend implements [`SearchTransport`](crate::core::SearchTransport)
//! and is gated behind a feature flag.
//!
//! | Backend | Feature | Description |
//! |---------|---------|-------------|
//! | Elasticsearch | `elasticsearch` | Official client, single-node connection pool |

#[cfg(feature = "elasticsearch")]
pub mod elasticsearch;
