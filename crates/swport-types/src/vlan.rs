//! VLAN references with range validation.

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// A VLAN as it appears in switching membership lists.
///
/// Devices accept either an IEEE 802.1Q id or the name of a VLAN defined
/// under `vlans`, so both forms are carried. Numeric ids are range-checked
/// by [`VlanRef::check_range`], names are passed through.
///
/// # Examples
///
/// ```
/// use swport_types::VlanRef;
///
/// assert_eq!(VlanRef::parse("10"), VlanRef::Id(10));
/// assert_eq!(VlanRef::parse("USERS"), VlanRef::Name("USERS".to_string()));
/// assert!(VlanRef::Id(4095).check_range().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum VlanRef {
    /// Numeric VLAN id.
    Id(u32),
    /// Named VLAN.
    Name(String),
}

impl VlanRef {
    /// Minimum valid VLAN ID.
    pub const MIN: u32 = 1;

    /// Maximum valid VLAN ID.
    pub const MAX: u32 = 4094;

    /// Parses device text: all-digit strings become ids, anything else a name.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = s.parse::<u32>() {
                return VlanRef::Id(id);
            }
        }
        VlanRef::Name(s.to_string())
    }

    /// Returns the numeric id, if this reference is numeric.
    pub fn id(&self) -> Option<u32> {
        match self {
            VlanRef::Id(id) => Some(*id),
            VlanRef::Name(_) => None,
        }
    }

    /// Checks that a numeric id is in `1..=4094`.
    ///
    /// Returns the offending id on failure. Names always pass.
    pub fn check_range(&self) -> Result<(), u32> {
        match self {
            VlanRef::Id(id) if !(Self::MIN..=Self::MAX).contains(id) => Err(*id),
            _ => Ok(()),
        }
    }
}

impl fmt::Display for VlanRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VlanRef::Id(id) => write!(f, "{}", id),
            VlanRef::Name(name) => write!(f, "{}", name),
        }
    }
}

impl From<u32> for VlanRef {
    fn from(id: u32) -> Self {
        VlanRef::Id(id)
    }
}

impl From<&str> for VlanRef {
    fn from(s: &str) -> Self {
        VlanRef::parse(s)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawVlanRef {
    Number(u64),
    Text(String),
}

impl<'de> Deserialize<'de> for VlanRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawVlanRef::deserialize(deserializer)? {
            // Out-of-range numbers must still reach validation as ids.
            RawVlanRef::Number(n) => VlanRef::Id(u32::try_from(n).unwrap_or(u32::MAX)),
            RawVlanRef::Text(s) => VlanRef::parse(&s),
        })
    }
}

/// A VLAN defined in the device configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlanEntry {
    /// VLAN name.
    pub name: String,
    /// 802.1Q id, when the definition carries one.
    pub id: Option<u32>,
    /// Free-text description.
    pub description: Option<String>,
}
