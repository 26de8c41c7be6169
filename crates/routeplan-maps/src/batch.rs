//! Batch geocoding
//!
//! Addresses are dispatched in fixed-size groups. Each group runs
//! concurrently, and the next group starts only after a fixed pause, which
//! keeps the provider's rate limit happy without a token bucket. One failing
//! address never affects its siblings.

use std::collections::{BTreeMap, HashSet};

use futures::future::join_all;
use tracing::{debug, instrument};

use routeplan_types::GeocodedAddress;

use crate::cache::PersistentGeocodeCache;
use crate::config::BatchConfig;
use crate::error::MapsError;
use crate::geocoder::Geocoder;

/// Per-address outcome, keyed by the trimmed input address
pub type BatchResults = BTreeMap<String, Result<GeocodedAddress, MapsError>>;

/// Paced batch geocoder
#[derive(Debug, Clone)]
pub struct BatchGeocoder {
    geocoder: Geocoder,
    config: BatchConfig,
}

impl BatchGeocoder {
    pub fn new(geocoder: Geocoder, config: BatchConfig) -> Self {
        Self { geocoder, config }
    }

    /// Geocode every distinct non-empty address.
    #[instrument(skip(self, addresses), fields(count = addresses.len()))]
    pub async fn geocode_batch<S: AsRef<str>>(&self, addresses: &[S]) -> BatchResults {
        let pending = prepare_addresses(addresses);
        self.dispatch(pending).await
    }

    /// Like [`geocode_batch`](Self::geocode_batch), but answers from `local`
    /// first and stores new successes back into it.
    #[instrument(skip(self, addresses, local), fields(count = addresses.len()))]
    pub async fn geocode_batch_with_local_cache<S: AsRef<str>>(
        &self,
        addresses: &[S],
        local: &mut PersistentGeocodeCache,
    ) -> BatchResults {
        let mut results = BatchResults::new();
        let mut pending = Vec::new();

        for address in prepare_addresses(addresses) {
            match local.get(&address) {
                Some(hit) => {
                    results.insert(address, Ok(hit));
                }
                None => pending.push(address),
            }
        }
        debug!(
            local_hits = results.len(),
            remaining = pending.len(),
            "Checked local geocode cache"
        );

        let fetched = self.dispatch(pending).await;
        for (address, outcome) in &fetched {
            if let Ok(value) = outcome {
                local.insert(address, value);
            }
        }

        results.extend(fetched);
        results
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    async fn dispatch(&self, addresses: Vec<String>) -> BatchResults {
        let mut results = BatchResults::new();
        let batch_size = self.config.batch_size.max(1);
        let groups: Vec<&[String]> = addresses.chunks(batch_size).collect();
        let group_count = groups.len();

        for (index, group) in groups.into_iter().enumerate() {
            let outcomes = join_all(group.iter().map(|address| self.geocoder.geocode(address))).await;
            results.extend(group.iter().cloned().zip(outcomes));

            if index + 1 < group_count {
                tokio::time::sleep(self.config.delay).await;
            }
        }

        results
    }
}

/// Trim, drop empties and collapse duplicates, keeping first-seen order
fn prepare_addresses<S: AsRef<str>>(addresses: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    addresses
        .iter()
        .map(|a| a.as_ref().trim())
        .filter(|a| !a.is_empty())
        .filter(|a| seen.insert(a.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_addresses_filters_and_dedups() {
        let input = ["  Berlin ", "", "   ", "Paris", "Berlin", "paris"];
        assert_eq!(
            prepare_addresses(&input),
            vec!["Berlin".to_string(), "Paris".to_string(), "paris".to_string()]
        );
    }

    #[test]
    fn test_prepare_addresses_empty() {
        let input: [&str; 0] = [];
        assert!(prepare_addresses(&input).is_empty());
    }
}
