use std::fmt;

use super::{GridClassification, GridReport, GridSource};
use crate::cache::CacheGateway;
use crate::config::GawConfig;
use crate::location::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataOrigin {
    Cache,
    Api,
}

impl fmt::Display for DataOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataOrigin::Cache => write!(f, "cache"),
            DataOrigin::Api => write!(f, "api"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub report: GridReport,
    pub origin: DataOrigin,
}

/// Classification for `location`, read through the data cache when enabled.
///
/// Cache read failures and malformed entries count as misses. A fresh
/// success is written back and awaited; a failed write is logged only.
/// Error reports are never cached.
pub async fn resolve_classification(
    location: &Location,
    source: &dyn GridSource,
    cache: &CacheGateway,
    config: &GawConfig,
) -> Resolution {
    let key = location.cache_key();

    if config.kv_cache_data {
        match cache.fetch_data(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<GridClassification>(&raw) {
                Ok(classification) => {
                    log_debug!(config.debug, "Data cache hit for {}", key);
                    return Resolution {
                        report: GridReport::Success(classification),
                        origin: DataOrigin::Cache,
                    };
                }
                Err(e) => {
                    log_error!("Ignoring malformed cached classification for {}: {}", key, e);
                }
            },
            Ok(None) => log_debug!(config.debug, "Data cache miss for {}", key),
            Err(e) => log_error!("Data cache read failed for {}: {}", key, e),
        }
    }

    log_debug!(config.debug, "Fetching classification for {} from {}", key, source.name());
    let report = source.classify(location).await;

    match &report {
        GridReport::Success(classification) if config.kv_cache_data => {
            match serde_json::to_string(classification) {
                Ok(json) => {
                    if let Err(e) = cache
                        .save_data(&key, json, Some(config.data_ttl_secs))
                        .await
                    {
                        log_error!("Data cache write failed for {}: {}", key, e);
                    }
                }
                Err(e) => log_error!("Could not serialize classification for {}: {}", key, e),
            }
        }
        GridReport::Error { message } => {
            log_error!("{} returned an error for {}: {}", source.name(), key, message);
        }
        _ => {}
    }

    Resolution {
        report,
        origin: DataOrigin::Api,
    }
}
