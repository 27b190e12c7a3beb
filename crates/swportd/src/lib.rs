//! swportd - switch-stack port management daemon
//!
//! Serves reconciled interface state for Junos EX virtual-chassis stacks
//! from a TTL cache and pushes operator-approved port changes over NETCONF.
//!
//! The pieces, from the device upward:
//!
//! - [`Reconciler`]: merges declared, operational and fabric views
//! - [`InterfaceCache`]: TTL cache with one fetch lock per device
//! - [`ChangeWorkflow`]: pending → approved/rejected → applied/failed
//! - [`DeviceOps`]: bulk commit, rollback and commit history
//! - [`SyncService`]: cache warm and periodic refresh
//!
//! [`Services`] wires them together around one store and one client.

pub mod audit;
pub mod cache;
pub mod config_file;
pub mod error;
pub mod inventory;
pub mod operations;
pub mod reconciler;
pub mod store;
pub mod sync;
pub mod workflow;

pub use audit::{AuditAction, AuditEntry, Auditor};
pub use cache::InterfaceCache;
pub use config_file::{CacheTtls, PortdConfig};
pub use error::{PortdError, PortdResult};
pub use inventory::Inventory;
pub use operations::DeviceOps;
pub use reconciler::Reconciler;
pub use store::{AuditFilter, MemoryStore, RequestFilter, Store};
pub use sync::SyncService;
pub use workflow::{ChangeRequest, ChangeWorkflow, RequestKind, RequestStatus};

use std::sync::Arc;
use std::time::Duration;
use swport_netconf::NetconfClient;

/// Every daemon component, built once and shared.
#[derive(Clone)]
pub struct Services {
    pub inventory: Arc<Inventory>,
    pub store: Arc<dyn Store>,
    pub reconciler: Reconciler,
    pub cache: Arc<InterfaceCache>,
    pub workflow: Arc<ChangeWorkflow>,
    pub ops: Arc<DeviceOps>,
}

impl Services {
    pub fn new(
        inventory: Inventory,
        store: Arc<dyn Store>,
        client: NetconfClient,
        ttls: CacheTtls,
    ) -> Self {
        let inventory = Arc::new(inventory);
        let reconciler = Reconciler::new(client.clone(), Arc::clone(&inventory));
        let cache = Arc::new(InterfaceCache::new(
            reconciler.clone(),
            Arc::clone(&store),
            ttls,
        ));
        let workflow = Arc::new(ChangeWorkflow::new(
            Arc::clone(&store),
            client.clone(),
            Arc::clone(&inventory),
            Arc::clone(&cache),
        ));
        let ops = Arc::new(DeviceOps::new(
            Arc::clone(&store),
            client,
            Arc::clone(&inventory),
            Arc::clone(&cache),
        ));
        Self {
            inventory,
            store,
            reconciler,
            cache,
            workflow,
            ops,
        }
    }

    /// Background refresher over every inventoried device.
    pub fn sync_service(&self, interval: Duration) -> SyncService {
        SyncService::new(Arc::clone(&self.cache), self.inventory.names(), interval)
    }
}
