//! Interface identity and the reconciled interface record.

use crate::vlan::VlanRef;
use crate::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix of aggregated ethernet (LAG) interface names.
pub const AGGREGATE_PREFIX: &str = "ae";

/// Description given to stack-fabric ports.
pub const FABRIC_PORT_DESCRIPTION: &str = "VC Port";

/// Kind of switch port, derived from the name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    /// Gigabit copper port.
    Ge,
    /// 10G SFP+ port.
    Xe,
    /// Aggregated ethernet bundle.
    Ae,
}

impl PortKind {
    /// Returns the name prefix for this kind.
    pub const fn as_str(&self) -> &'static str {
        match self {
            PortKind::Ge => "ge",
            PortKind::Xe => "xe",
            PortKind::Ae => "ae",
        }
    }

    /// Returns true if this is a logical bundle.
    pub const fn is_aggregate(&self) -> bool {
        matches!(self, PortKind::Ae)
    }
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ge" => Ok(PortKind::Ge),
            "xe" => Ok(PortKind::Xe),
            "ae" => Ok(PortKind::Ae),
            _ => Err(ParseError::InvalidPortKind(s.to_string())),
        }
    }
}

/// Switching mode of a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortMode {
    /// Untagged member of a single VLAN.
    Access,
    /// Tagged member of a VLAN list.
    Trunk,
}

impl PortMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PortMode::Access => "access",
            PortMode::Trunk => "trunk",
        }
    }
}

impl fmt::Display for PortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PortMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "access" => Ok(PortMode::Access),
            "trunk" => Ok(PortMode::Trunk),
            _ => Err(ParseError::InvalidPortMode(s.to_string())),
        }
    }
}

/// LACP negotiation mode of an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LacpMode {
    Active,
    Passive,
}

impl FromStr for LacpMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(LacpMode::Active),
            "passive" => Ok(LacpMode::Passive),
            _ => Err(ParseError::InvalidLacpMode(s.to_string())),
        }
    }
}

/// Where a returned record came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordSource {
    /// Fetched from the device for this request.
    #[default]
    Live,
    /// Served from the process cache.
    Cache,
}

/// A parsed interface name.
///
/// Physical ports follow `{scheme}-{member}/{fpc}/{port}`; bundles are `ae{N}`.
///
/// # Examples
///
/// ```
/// use swport_types::{InterfaceName, PortKind};
///
/// let name = InterfaceName::parse("xe-1/2/1").unwrap();
/// assert_eq!(name.kind, PortKind::Xe);
/// assert_eq!((name.member, name.fpc, name.port), (Some(1), Some(2), Some(1)));
///
/// let ae = InterfaceName::parse("ae3").unwrap();
/// assert!(ae.kind.is_aggregate());
/// assert!(InterfaceName::parse("vme.0").is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InterfaceName {
    pub kind: PortKind,
    /// Stack member (FPC number in the name), physical ports only.
    pub member: Option<u32>,
    /// PIC slot, physical ports only.
    pub fpc: Option<u32>,
    /// Port index, physical ports only.
    pub port: Option<u32>,
}

impl InterfaceName {
    /// Parses an interface name, rejecting unrecognized schemes.
    pub fn parse(name: &str) -> Result<Self, ParseError> {
        let invalid = || ParseError::InvalidInterfaceName(name.to_string());

        if let Some(index) = name.strip_prefix(AGGREGATE_PREFIX) {
            if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) {
                return Ok(Self {
                    kind: PortKind::Ae,
                    member: None,
                    fpc: None,
                    port: None,
                });
            }
            return Err(invalid());
        }

        let (scheme, rest) = name.split_once('-').ok_or_else(invalid)?;
        let kind: PortKind = scheme.parse().map_err(|_| invalid())?;
        if kind.is_aggregate() {
            return Err(invalid());
        }

        let mut parts = rest.split('/').map(|p| p.parse::<u32>());
        match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(Ok(member)), Some(Ok(fpc)), Some(Ok(port)), None) => Ok(Self {
                kind,
                member: Some(member),
                fpc: Some(fpc),
                port: Some(port),
            }),
            _ => Err(invalid()),
        }
    }

    /// Builds the canonical name of a physical port.
    pub fn physical(kind: PortKind, member: u32, fpc: u32, port: u32) -> String {
        format!("{}-{}/{}/{}", kind, member, fpc, port)
    }
}

/// One physical or logical port after reconciliation.
///
/// Field names are part of the wire shape consumed by clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceRecord {
    pub name: String,
    pub member: Option<u32>,
    pub fpc: Option<u32>,
    pub port: Option<u32>,
    #[serde(rename = "type")]
    pub kind: PortKind,
    pub aggregate: bool,

    pub mode: Option<PortMode>,
    pub access_vlan: Option<VlanRef>,
    pub trunk_vlans: Option<Vec<VlanRef>>,
    pub native_vlan: Option<VlanRef>,
    pub description: Option<String>,
    /// Parent aggregate when this port is a bundle member.
    pub bundle: Option<String>,
    pub lacp_mode: Option<LacpMode>,
    pub speed: Option<String>,
    pub duplex: Option<String>,
    pub poe: Option<bool>,

    pub admin_up: bool,
    pub oper_up: bool,

    /// Stack-fabric port. Implies `configured == false` and `admin_up == true`.
    pub vc_port: bool,
    pub vc_status: Option<String>,

    /// Found in the declared configuration.
    pub configured: bool,
    #[serde(rename = "_source")]
    pub source: RecordSource,
}

impl InterfaceRecord {
    /// Creates a record with identity set and every declared field empty.
    pub fn blank(name: impl Into<String>, parsed: InterfaceName) -> Self {
        Self {
            name: name.into(),
            member: parsed.member,
            fpc: parsed.fpc,
            port: parsed.port,
            kind: parsed.kind,
            aggregate: parsed.kind.is_aggregate(),
            mode: None,
            access_vlan: None,
            trunk_vlans: None,
            native_vlan: None,
            description: None,
            bundle: None,
            lacp_mode: None,
            speed: None,
            duplex: None,
            poe: None,
            admin_up: true,
            oper_up: false,
            vc_port: false,
            vc_status: None,
            configured: false,
            source: RecordSource::Live,
        }
    }

    /// Synthesizes a record for a fabric port with no declared configuration.
    pub fn fabric_placeholder(
        name: impl Into<String>,
        parsed: InterfaceName,
        vc_status: &str,
    ) -> Self {
        let mut record = Self::blank(name, parsed);
        record.make_fabric(vc_status);
        record.description = Some(FABRIC_PORT_DESCRIPTION.to_string());
        record
    }

    /// Synthesizes a record for a port seen only in operational status.
    pub fn operational_placeholder(
        name: impl Into<String>,
        parsed: InterfaceName,
        admin_up: bool,
        oper_up: bool,
    ) -> Self {
        let mut record = Self::blank(name, parsed);
        record.admin_up = admin_up;
        record.oper_up = oper_up;
        record
    }

    /// Turns this record into a fabric port: status from the fabric view,
    /// switching and bundle state cleared. The description is kept.
    pub fn make_fabric(&mut self, vc_status: &str) {
        self.vc_port = true;
        self.vc_status = Some(vc_status.to_string());
        self.oper_up = vc_status == "Up";
        self.admin_up = true;
        self.configured = false;
        self.mode = None;
        self.access_vlan = None;
        self.trunk_vlans = None;
        self.native_vlan = None;
        self.bundle = None;
        self.lacp_mode = None;
        self.speed = None;
        self.duplex = None;
        self.poe = None;
    }
}

/// Derived view of one aggregate bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub name: String,
    /// Physical members whose bundle reference matches, sorted.
    pub members: Vec<String>,
    pub lacp_mode: Option<LacpMode>,
    pub description: Option<String>,
    pub configured: bool,
    pub oper_up: bool,
}

impl AggregateSummary {
    /// Renders the summary as an interface record for single-port lookups.
    pub fn to_record(&self) -> InterfaceRecord {
        let parsed = InterfaceName {
            kind: PortKind::Ae,
            member: None,
            fpc: None,
            port: None,
        };
        let mut record = InterfaceRecord::blank(self.name.clone(), parsed);
        record.lacp_mode = self.lacp_mode;
        record.description = self.description.clone();
        record.configured = self.configured;
        record.oper_up = self.oper_up;
        record
    }
}
