//! Node Metrics Watcher - "The Eyes"
//!
//! Issues the `sets` and TTL `histogram` info queries over one node session
//! and hands the replies to the parser.

use std::time::Duration;

use tracing::{debug, instrument, Span};

use super::parser::{histogram_query, parse_histogram, parse_sets, AgeHistogram, SetFilter, SetOccupancy, SETS_QUERY};
use crate::domain::ports::{InfoSession, Node};
use crate::error::{Error, Result};

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the metrics watcher
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Namespace holding the managed set
    pub namespace: String,

    /// Managed set name
    pub set_name: String,

    /// Upper bound for one info round-trip
    pub request_timeout: Duration,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            namespace: "persisted".to_string(),
            set_name: "lru".to_string(),
            request_timeout: Duration::from_secs(300),
        }
    }
}

impl WatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() || self.set_name.is_empty() {
            return Err(Error::Config(
                "namespace and set name must not be empty".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(Error::Config("request_timeout must be positive".to_string()));
        }
        Ok(())
    }
}

// =============================================================================
// Metrics Watcher
// =============================================================================

/// Reads occupancy and TTL histograms from nodes
#[derive(Debug, Clone)]
pub struct MetricsWatcher {
    config: WatcherConfig,
    filter: SetFilter,
}

impl MetricsWatcher {
    /// Create a new metrics watcher
    pub fn new(config: WatcherConfig) -> Self {
        let filter = SetFilter::new(config.namespace.clone(), config.set_name.clone());
        Self { config, filter }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Fetch occupancy of the managed set on `node`
    #[instrument(skip(self, session), fields(node = %node.address, query = SETS_QUERY))]
    pub async fn fetch_occupancy(
        &self,
        node: &Node,
        session: &mut dyn InfoSession,
    ) -> Result<Vec<SetOccupancy>> {
        let raw = self.query(session, SETS_QUERY).await?;
        let occupancies = parse_sets(&raw, &self.filter);

        debug!(
            "Node {} reports {} matching set record(s)",
            node.address,
            occupancies.len()
        );
        Ok(occupancies)
    }

    /// Fetch the TTL histogram of `set_name` on `node`
    #[instrument(skip(self, session), fields(node = %node.address, query))]
    pub async fn fetch_histogram(
        &self,
        node: &Node,
        session: &mut dyn InfoSession,
        set_name: &str,
    ) -> Result<AgeHistogram> {
        let key = histogram_query(&self.config.namespace, set_name);
        Span::current().record("query", key.as_str());
        let raw = self.query(session, &key).await?;

        debug!("Histogram for {} on {}: {}", set_name, node.address, raw);
        parse_histogram(&raw).map_err(|e| match e {
            Error::Parse { key: field, reason } => {
                Error::parse(field, format!("{} (info query '{}')", reason, key))
            }
            other => other,
        })
    }

    async fn query(&self, session: &mut dyn InfoSession, key: &str) -> Result<String> {
        let mut reply = tokio::time::timeout(
            self.config.request_timeout,
            session.request_info(&[key]),
        )
        .await
        .map_err(|_| Error::Timeout {
            operation: format!("info request '{}'", key),
        })??;

        reply
            .remove(key)
            .ok_or_else(|| Error::Protocol(format!("node did not answer info key '{}'", key)))
    }
}
