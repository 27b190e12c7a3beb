//! Common types for switch-stack port management.
//!
//! This crate provides the normalized data model shared by the protocol
//! client and the daemon:
//!
//! - [`InterfaceRecord`]: one physical or logical port after reconciliation
//! - [`AggregateSummary`]: derived view of an `ae*` bundle
//! - [`InterfaceName`]: parsed `ge-0/0/10` / `xe-1/2/1` / `ae3` names
//! - [`VlanRef`]: a VLAN referenced by numeric id or by name
//! - [`DesiredConfig`]: a requested port configuration and its validation

mod desired;
mod interface;
mod vlan;

pub use desired::{DesiredConfig, InterfaceChange, ValidationError};
pub use interface::{
    AggregateSummary, InterfaceName, InterfaceRecord, LacpMode, PortKind, PortMode, RecordSource,
    AGGREGATE_PREFIX, FABRIC_PORT_DESCRIPTION,
};
pub use vlan::{VlanEntry, VlanRef};

/// Common error type for parsing failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("invalid interface name: {0}")]
    InvalidInterfaceName(String),

    #[error("invalid port mode: {0} (must be access or trunk)")]
    InvalidPortMode(String),

    #[error("invalid LACP mode: {0}")]
    InvalidLacpMode(String),

    #[error("invalid port type: {0}")]
    InvalidPortKind(String),
}
