//! Requested port configuration and its validation rules.

use crate::interface::{InterfaceName, PortKind, PortMode};
use crate::vlan::VlanRef;
use serde::{Deserialize, Serialize};
use thiserror::Error;

const GE_SPEEDS: &[&str] = &["auto", "10m", "100m", "1g"];
const XE_SPEEDS: &[&str] = &["auto", "10g"];
const DUPLEX_VALUES: &[&str] = &["auto", "full"];

/// Reasons a desired configuration is refused before any device call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("invalid mode '{0}': must be access or trunk")]
    InvalidMode(String),

    #[error("stack-fabric port {0} cannot be configured")]
    FabricPort(String),

    #[error("access mode requires access_vlan")]
    MissingAccessVlan,

    #[error("trunk mode requires a non-empty trunk_vlans list")]
    MissingTrunkVlans,

    #[error("{field} {vlan} out of range (1-4094)")]
    VlanOutOfRange { field: String, vlan: u32 },

    #[error("PoE is not allowed on {0} ports")]
    PoeNotSupported(PortKind),

    #[error("invalid speed '{speed}' for {kind} port")]
    InvalidSpeed { kind: PortKind, speed: String },

    #[error("invalid duplex '{0}': must be auto or full")]
    InvalidDuplex(String),

    #[error("invalid interface name '{0}'")]
    InvalidInterface(String),
}

/// Desired state for one port, as submitted by an operator.
///
/// Extra fields sent by clients (name, member, admin_up, ...) are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DesiredConfig {
    /// Requested mode; checked against `access`/`trunk` during validation.
    pub mode: String,
    #[serde(rename = "type", default)]
    pub kind: Option<PortKind>,
    #[serde(default)]
    pub access_vlan: Option<VlanRef>,
    #[serde(default)]
    pub trunk_vlans: Option<Vec<VlanRef>>,
    #[serde(default)]
    pub native_vlan: Option<VlanRef>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub poe: Option<bool>,
    #[serde(default)]
    pub speed: Option<String>,
    #[serde(default)]
    pub duplex: Option<String>,
    #[serde(default)]
    pub vc_port: bool,
}

impl DesiredConfig {
    /// Access-mode config on a single VLAN.
    pub fn access(vlan: impl Into<VlanRef>) -> Self {
        Self {
            mode: PortMode::Access.to_string(),
            access_vlan: Some(vlan.into()),
            ..Default::default()
        }
    }

    /// Trunk-mode config carrying the given VLANs.
    pub fn trunk<I, V>(vlans: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<VlanRef>,
    {
        Self {
            mode: PortMode::Trunk.to_string(),
            trunk_vlans: Some(vlans.into_iter().map(Into::into).collect()),
            ..Default::default()
        }
    }

    /// Parses the requested mode.
    pub fn port_mode(&self) -> Result<PortMode, ValidationError> {
        self.mode
            .parse()
            .map_err(|_| ValidationError::InvalidMode(self.mode.clone()))
    }

    /// Checks that the payload may be turned into a device edit at all:
    /// not a fabric port, and a known mode.
    pub fn check_editable(&self, interface: &str) -> Result<PortMode, ValidationError> {
        if self.vc_port {
            return Err(ValidationError::FabricPort(interface.to_string()));
        }
        self.port_mode()
    }

    /// Collects every validation problem.
    ///
    /// Port-type specific rules use `kind` when present.
    pub fn validation_errors(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.vc_port {
            errors.push(ValidationError::FabricPort("requested port".to_string()));
        }

        match self.port_mode() {
            Ok(PortMode::Access) => match &self.access_vlan {
                None => errors.push(ValidationError::MissingAccessVlan),
                Some(vlan) => check_vlan(&mut errors, "access_vlan", vlan),
            },
            Ok(PortMode::Trunk) => {
                match self.trunk_vlans.as_deref() {
                    None | Some([]) => errors.push(ValidationError::MissingTrunkVlans),
                    Some(vlans) => {
                        for vlan in vlans {
                            check_vlan(&mut errors, "trunk VLAN", vlan);
                        }
                    }
                }
                if let Some(native) = &self.native_vlan {
                    check_vlan(&mut errors, "native_vlan", native);
                }
            }
            Err(e) => errors.push(e),
        }

        if self.kind == Some(PortKind::Xe) && self.poe == Some(true) {
            errors.push(ValidationError::PoeNotSupported(PortKind::Xe));
        }

        if let (Some(kind), Some(speed)) = (self.kind, self.speed.as_deref()) {
            let allowed = match kind {
                PortKind::Ge => GE_SPEEDS,
                PortKind::Xe => XE_SPEEDS,
                PortKind::Ae => &[][..],
            };
            if !speed.is_empty() && !allowed.contains(&speed) {
                errors.push(ValidationError::InvalidSpeed {
                    kind,
                    speed: speed.to_string(),
                });
            }
        }

        if let Some(duplex) = self.duplex.as_deref() {
            if !duplex.is_empty() && !DUPLEX_VALUES.contains(&duplex) {
                errors.push(ValidationError::InvalidDuplex(duplex.to_string()));
            }
        }

        errors
    }

    /// Returns the first validation problem, if any.
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.validation_errors().into_iter().next() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Validates against a concrete interface: the name must parse, and the
    /// port type is taken from the name when the payload omits it.
    pub fn validate_for(&self, interface: &str) -> Result<(), ValidationError> {
        let parsed = InterfaceName::parse(interface)
            .map_err(|_| ValidationError::InvalidInterface(interface.to_string()))?;
        if self.vc_port {
            return Err(ValidationError::FabricPort(interface.to_string()));
        }
        if self.kind.is_some() {
            return self.validate();
        }
        let typed = Self {
            kind: Some(parsed.kind),
            ..self.clone()
        };
        typed.validate()
    }
}

fn check_vlan(errors: &mut Vec<ValidationError>, field: &str, vlan: &VlanRef) {
    if let Err(id) = vlan.check_range() {
        errors.push(ValidationError::VlanOutOfRange {
            field: field.to_string(),
            vlan: id,
        });
    }
}

/// One interface edit inside a bulk commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceChange {
    pub interface: String,
    pub config: DesiredConfig,
}

impl InterfaceChange {
    pub fn new(interface: impl Into<String>, config: DesiredConfig) -> Self {
        Self {
            interface: interface.into(),
            config,
        }
    }
}
