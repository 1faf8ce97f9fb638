//! Engine health checks.
//!
//! # Example
//!
//! ```ignore
//! use helios_docmap::health::HealthChecker;
//!
//! let checker = HealthChecker::default();
//! let result = checker.check(&transport).await;
//! let report = checker.build(result.as_ref().ok().cloned().unwrap_or_default(), result.err().as_ref());
//! ```

use std::time::Duration;

use serde_json::{Map, Value};
use tracing::warn;

use crate::core::transport::SearchTransport;
use crate::error::{StorageError, StorageResult};

/// A health report, e.g. `{"status": "success"}`.
pub type HealthReport = Map<String, Value>;

/// Pings the engine under a timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthChecker {
    name: String,
    timeout: Duration,
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self {
            name: "elasticsearch".to_string(),
            timeout: Duration::from_secs(4),
        }
    }
}

impl HealthChecker {
    /// Creates a checker. An empty name falls back to `elasticsearch`.
    pub fn new(name: impl Into<String>, timeout: Duration) -> Self {
        let name = name.into();
        let name = if name.is_empty() {
            HealthChecker::default().name
        } else {
            name
        };
        Self { name, timeout }
    }

    /// Returns the checker's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the ping timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Pings the engine. A slow engine is a transport error.
    pub async fn check<C>(&self, client: &C) -> StorageResult<HealthReport>
    where
        C: SearchTransport + ?Sized,
    {
        match tokio::time::timeout(self.timeout, client.ping()).await {
            Ok(Ok(())) => {
                let mut report = HealthReport::new();
                report.insert("status".to_string(), Value::String("success".to_string()));
                Ok(report)
            }
            Ok(Err(e)) => {
                warn!(name = %self.name, error = %e, "Health check failed");
                Err(e)
            }
            Err(_) => {
                warn!(name = %self.name, timeout_ms = self.timeout.as_millis() as u64, "Health check timed out");
                Err(StorageError::transport(format!(
                    "{} did not answer within {:?}",
                    self.name, self.timeout
                )))
            }
        }
    }

    /// Adds the error, if any, to a report.
    pub fn build(&self, mut data: HealthReport, err: Option<&StorageError>) -> HealthReport {
        if let Some(e) = err {
            data.insert("error".to_string(), Value::String(e.to_string()));
        }
        data
    }
}
