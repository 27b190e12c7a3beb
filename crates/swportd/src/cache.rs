//! TTL cache in front of the reconciler.
//!
//! Three independent spaces, each with its own expiry window:
//!
//! | Space      | Key                 | Value                |
//! |------------|---------------------|----------------------|
//! | interfaces | device              | reconciled list      |
//! | live       | (device, interface) | one record           |
//! | aggregates | (device, ae name)   | aggregate summary    |
//!
//! A miss takes the device's fetch lock and checks again before going to the
//! device, so concurrent misses for one device turn into a single fetch.
//! Cached values are replaced whole and handed out as clones.

use crate::config_file::CacheTtls;
use crate::error::{PortdError, PortdResult};
use crate::reconciler::Reconciler;
use crate::store::Store;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use swport_netconf::Partial;
use swport_types::{AggregateSummary, InterfaceName, InterfaceRecord, PortKind, RecordSource};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

struct Entry<T> {
    value: T,
    stored: Instant,
    // store counter value; compared against the counter at call start
    generation: u64,
}

impl<T> Entry<T> {
    fn fresh(&self, ttl: Duration) -> bool {
        self.stored.elapsed() < ttl
    }
}

type Space<K, V> = RwLock<HashMap<K, Entry<V>>>;

fn lookup<K, V>(space: &Space<K, V>, key: &K, ttl: Duration) -> Option<(V, u64)>
where
    K: Eq + Hash,
    V: Clone,
{
    space
        .read()
        .get(key)
        .filter(|entry| entry.fresh(ttl))
        .map(|entry| (entry.value.clone(), entry.generation))
}

/// Cached, coalesced access to reconciled device state.
pub struct InterfaceCache {
    reconciler: Reconciler,
    store: Arc<dyn Store>,
    ttls: CacheTtls,
    interfaces: Space<String, Vec<InterfaceRecord>>,
    live: Space<(String, String), InterfaceRecord>,
    aggregates: Space<(String, String), AggregateSummary>,
    // created on first use, never removed
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    generation: AtomicU64,
}

impl InterfaceCache {
    pub fn new(reconciler: Reconciler, store: Arc<dyn Store>, ttls: CacheTtls) -> Self {
        Self {
            reconciler,
            store,
            ttls,
            interfaces: RwLock::new(HashMap::new()),
            live: RwLock::new(HashMap::new()),
            aggregates: RwLock::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn ttls(&self) -> CacheTtls {
        self.ttls
    }

    // Only inventoried devices get a lock.
    fn device_lock(&self, device: &str) -> PortdResult<Arc<tokio::sync::Mutex<()>>> {
        self.reconciler.inventory().get(device)?;
        Ok(Arc::clone(self.locks.lock().entry(device.to_string()).or_default()))
    }

    fn next_generation(&self) -> u64 {
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    // Values stored after the call began count as live for this caller.
    fn source(&self, generation: u64, started: u64) -> RecordSource {
        if generation > started {
            RecordSource::Live
        } else {
            RecordSource::Cache
        }
    }

    /// Reconciled interfaces of `device`, from cache when fresh.
    pub async fn get_interfaces(&self, device: &str) -> PortdResult<Vec<InterfaceRecord>> {
        let started = self.generation.load(Ordering::SeqCst);
        let key = device.to_string();

        let (records, generation) = match lookup(&self.interfaces, &key, self.ttls.interfaces) {
            Some(hit) => hit,
            None => {
                let lock = self.device_lock(device)?;
                let _guard = lock.lock().await;
                match lookup(&self.interfaces, &key, self.ttls.interfaces) {
                    Some(hit) => hit,
                    None => {
                        let (fetched, generation) = self.fetch_interfaces(device).await?;
                        (fetched.value, generation)
                    }
                }
            }
        };

        let source = self.source(generation, started);
        Ok(stamp(records, source))
    }

    /// One interface. `ae*` names are answered from the aggregate summary.
    pub async fn get_live(&self, device: &str, interface: &str) -> PortdResult<InterfaceRecord> {
        if matches!(InterfaceName::parse(interface), Ok(n) if n.kind == PortKind::Ae) {
            let started = self.generation.load(Ordering::SeqCst);
            let (summary, generation) = self.aggregate_entry(device, interface).await?;
            let mut record = summary.to_record();
            record.source = self.source(generation, started);
            return Ok(record);
        }

        let started = self.generation.load(Ordering::SeqCst);
        let key = (device.to_string(), interface.to_string());
        let (mut record, generation) = match lookup(&self.live, &key, self.ttls.live) {
            Some(hit) => hit,
            None => {
                let lock = self.device_lock(device)?;
                let _guard = lock.lock().await;
                match lookup(&self.live, &key, self.ttls.live) {
                    Some(hit) => hit,
                    None => {
                        let record = self.reconciler.reconcile_interface(device, interface).await?;
                        let generation = self.next_generation();
                        self.live.write().insert(
                            key,
                            Entry {
                                value: record.clone(),
                                stored: Instant::now(),
                                generation,
                            },
                        );
                        (record, generation)
                    }
                }
            }
        };
        record.source = self.source(generation, started);
        Ok(record)
    }

    /// Summary of one aggregate bundle.
    pub async fn get_aggregate(&self, device: &str, name: &str) -> PortdResult<AggregateSummary> {
        Ok(self.aggregate_entry(device, name).await?.0)
    }

    async fn aggregate_entry(
        &self,
        device: &str,
        name: &str,
    ) -> PortdResult<(AggregateSummary, u64)> {
        let key = (device.to_string(), name.to_string());
        if let Some(hit) = lookup(&self.aggregates, &key, self.ttls.aggregates) {
            return Ok(hit);
        }

        let lock = self.device_lock(device)?;
        let _guard = lock.lock().await;
        if let Some(hit) = lookup(&self.aggregates, &key, self.ttls.aggregates) {
            return Ok(hit);
        }

        let summaries = self.reconciler.aggregates(device).await?.value;
        let generation = self.next_generation();
        let stored = Instant::now();
        let mut found = None;
        {
            let mut space = self.aggregates.write();
            for summary in summaries {
                if summary.name == name {
                    found = Some(summary.clone());
                }
                space.insert(
                    (device.to_string(), summary.name.clone()),
                    Entry {
                        value: summary,
                        stored,
                        generation,
                    },
                );
            }
        }
        found
            .map(|summary| (summary, generation))
            .ok_or_else(|| PortdError::not_found("aggregate", name))
    }

    /// Drops every cached value for `device` in all three spaces.
    ///
    /// Waits for an in-flight fetch of the device to store its result first,
    /// so a list read before a device change cannot outlive the purge.
    pub async fn invalidate(&self, device: &str) {
        let _guard = match self.device_lock(device) {
            Ok(lock) => Some(lock.lock_owned().await),
            Err(_) => None,
        };
        self.interfaces.write().remove(device);
        self.live.write().retain(|(d, _), _| d != device);
        self.aggregates.write().retain(|(d, _), _| d != device);
        debug!(device, "Cache invalidated");
    }

    /// Refetches the interface list now, regardless of freshness.
    #[instrument(skip(self))]
    pub async fn refresh(&self, device: &str) -> PortdResult<Partial<Vec<InterfaceRecord>>> {
        let lock = self.device_lock(device)?;
        let _guard = lock.lock().await;
        Ok(self.fetch_interfaces(device).await?.0)
    }

    /// When the last complete refresh of `device` was persisted.
    pub async fn last_refresh(&self, device: &str) -> PortdResult<Option<DateTime<Utc>>> {
        Ok(self
            .store
            .snapshot(device)
            .await?
            .map(|snapshot| snapshot.refreshed_at))
    }

    // Caller holds the device lock.
    async fn fetch_interfaces(
        &self,
        device: &str,
    ) -> PortdResult<(Partial<Vec<InterfaceRecord>>, u64)> {
        let fetched = self.reconciler.reconcile_detailed(device).await?;
        let generation = self.next_generation();
        self.interfaces.write().insert(
            device.to_string(),
            Entry {
                value: fetched.value.clone(),
                stored: Instant::now(),
                generation,
            },
        );

        // A degraded list must not replace the last good snapshot.
        if fetched.is_degraded() {
            warn!(device, warnings = ?fetched.warnings, "Refresh degraded, snapshot not saved");
        } else if let Err(e) = self
            .store
            .save_snapshot(device, &fetched.value, Utc::now())
            .await
        {
            warn!(device, error = %e, "Failed to persist interface snapshot");
        }
        Ok((fetched, generation))
    }
}

fn stamp(mut records: Vec<InterfaceRecord>, source: RecordSource) -> Vec<InterfaceRecord> {
    for record in &mut records {
        record.source = source;
    }
    records
}
