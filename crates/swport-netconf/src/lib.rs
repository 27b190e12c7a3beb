//! NETCONF client for Junos switch stacks.
//!
//! Two layers:
//!
//! - **Codec** ([`codec`], [`xml`]): parses configuration, interface-status,
//!   PoE and virtual-chassis replies into normalized records, and builds edit
//!   payloads from desired state. No I/O.
//! - **Session client** ([`Session`], [`NetconfClient`]): one scoped session per
//!   operation over a [`Connector`], with the lock → edit → commit → unlock
//!   transaction and discard-on-failure.
//!
//! Nothing here retries. Every failure is returned to the caller.
//!
//! # Example
//!
//! ```no_run
//! use swport_netconf::{CommitOptions, Credentials, DeviceTarget, NetconfClient};
//!
//! # async fn example() -> swport_netconf::NetconfResult<()> {
//! let client = NetconfClient::ssh(CommitOptions::default());
//! let target = DeviceTarget::new("sw1", "10.0.0.1", "netconf", Credentials::Password("pw".into()));
//! let records = client.get_declared(&target).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod codec;
pub mod error;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod session;
pub mod ssh;
pub mod transport;
pub mod xml;

pub use client::{NetconfClient, OperationalView, Partial};
pub use codec::{CommitEntry, FabricPort, OperStatus};
pub use error::{NetconfError, NetconfResult};
pub use session::{CommitOptions, CommitReport, RollbackReport, Session};
pub use ssh::SshConnector;
pub use transport::{Connector, Credentials, DeviceTarget, RpcChannel};
pub use xml::XmlElement;
