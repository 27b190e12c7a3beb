//! Device XML to interface records, and desired state to edit payloads.
//!
//! Parsers never fail on unexpected content: unrecognized interfaces,
//! missing leaves and unknown enum values are skipped so one odd stanza
//! does not hide the rest of the device.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use swport_types::{
    AggregateSummary, DesiredConfig, InterfaceName, InterfaceRecord, LacpMode, PortKind, PortMode,
    ValidationError, VlanEntry, VlanRef,
};
use tracing::debug;

use crate::error::NetconfResult;
use crate::xml::XmlElement;

/// PIC slot of the uplink module. Its ports are never stack-fabric ports.
pub const UPLINK_PIC: u32 = 1;

/// Observed admin/oper state of one physical interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct OperStatus {
    pub admin_up: bool,
    pub oper_up: bool,
}

/// A stack-fabric port as reported by the virtual-chassis port view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FabricPort {
    pub name: String,
    /// Device status string, `"Up"` when the link is active.
    pub vc_status: String,
}

/// One line of `show system commit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEntry {
    /// Rollback checkpoint index, 0 is the active configuration.
    pub index: u32,
    pub timestamp: String,
    pub user: String,
    pub client: Option<String>,
    pub comment: Option<String>,
}

/// Subtree filter for the declared configuration.
pub fn configuration_filter() -> XmlElement {
    XmlElement::new("configuration")
        .with_child(XmlElement::new("interfaces"))
        .with_child(XmlElement::new("vlans"))
        .with_child(XmlElement::new("chassis").with_child(XmlElement::new("poe")))
        .with_child(XmlElement::new("virtual-chassis"))
}

fn configuration_root(tree: &XmlElement) -> Option<&XmlElement> {
    tree.descendants("configuration").into_iter().next()
}

/// Declared PoE state per interface from `chassis/poe/interface`.
fn declared_poe(configuration: &XmlElement) -> HashMap<String, bool> {
    configuration
        .find_all(&["chassis", "poe", "interface"])
        .into_iter()
        .filter_map(|iface| {
            let name = iface.child_text("name")?;
            Some((name.to_string(), iface.child("disable").is_none()))
        })
        .collect()
}

/// Parses the declared configuration into one record per recognized interface.
///
/// Every parseable interface is returned; `configured` marks the ones that
/// carry any declared state (switching block, description, bundle reference,
/// speed/duplex, or being an aggregate).
pub fn parse_configuration(tree: &XmlElement) -> Vec<InterfaceRecord> {
    let Some(configuration) = configuration_root(tree) else {
        return Vec::new();
    };
    let poe = declared_poe(configuration);

    let mut records = Vec::new();
    for iface in configuration.find_all(&["interfaces", "interface"]) {
        let Some(name) = iface.child_text("name") else {
            continue;
        };
        let parsed = match InterfaceName::parse(name) {
            Ok(parsed) => parsed,
            Err(_) => {
                debug!(interface = %name, "Skipping unrecognized interface");
                continue;
            }
        };
        records.push(parse_interface(iface, name, parsed, &poe));
    }
    records
}

fn parse_interface(
    iface: &XmlElement,
    name: &str,
    parsed: InterfaceName,
    poe: &HashMap<String, bool>,
) -> InterfaceRecord {
    let mut record = InterfaceRecord::blank(name, parsed);
    record.description = iface.child_text("description").map(str::to_string);

    let unit = iface
        .children_named("unit")
        .find(|u| u.child_text("name") == Some("0"))
        .or_else(|| iface.child("unit"));
    let switching = unit.and_then(|u| u.find(&["family", "ethernet-switching"]));

    if let Some(sw) = switching {
        let mode = sw
            .child_text("port-mode")
            .or_else(|| sw.child_text("interface-mode"))
            .and_then(|m| m.parse::<PortMode>().ok())
            .unwrap_or(PortMode::Access);
        let members: Vec<VlanRef> = sw
            .find_all(&["vlan", "members"])
            .into_iter()
            .map(|m| m.text())
            .filter(|t| !t.is_empty())
            .map(VlanRef::parse)
            .collect();

        record.mode = Some(mode);
        match mode {
            PortMode::Access => record.access_vlan = members.into_iter().next(),
            PortMode::Trunk if !members.is_empty() => record.trunk_vlans = Some(members),
            PortMode::Trunk => {}
        }
        record.native_vlan = sw
            .child_text("native-vlan-id")
            .or_else(|| iface.child_text("native-vlan-id"))
            .map(VlanRef::parse);
    }

    if let Some(eo) = iface.child("ether-options") {
        record.speed = eo.child("speed").and_then(speed_value);
        if eo.child("no-auto-negotiation").is_some() {
            record.duplex = Some("full".to_string());
        } else if let Some(link_mode) = eo.child_text("link-mode") {
            record.duplex = Some(link_mode.trim_end_matches("-duplex").to_string());
        }
        record.bundle = eo
            .find(&["ieee-802.3ad", "bundle"])
            .map(|b| b.text().to_string())
            .filter(|b| !b.is_empty());
    }

    if let Some(lacp) = iface.find(&["aggregated-ether-options", "lacp"]) {
        record.lacp_mode = if lacp.child("active").is_some() {
            Some(LacpMode::Active)
        } else if lacp.child("passive").is_some() {
            Some(LacpMode::Passive)
        } else {
            None
        };
    }

    record.poe = poe.get(name).copied();

    record.configured = switching.is_some()
        || record.description.is_some()
        || record.bundle.is_some()
        || record.aggregate
        || record.speed.is_some()
        || record.duplex.is_some();
    record
}

/// `<speed>1g</speed>` or the keyword form `<speed><ethernet-1g/></speed>`.
fn speed_value(speed: &XmlElement) -> Option<String> {
    if !speed.text().is_empty() {
        return Some(speed.text().to_string());
    }
    speed
        .children()
        .first()
        .map(|c| c.name().trim_start_matches("ethernet-").to_string())
}

/// Parses a terse interface-information reply.
pub fn parse_operational(tree: &XmlElement) -> HashMap<String, OperStatus> {
    tree.descendants("physical-interface")
        .into_iter()
        .filter_map(|phy| {
            let name = phy.child_text("name")?;
            Some((
                name.to_string(),
                OperStatus {
                    admin_up: phy.child_text("admin-status") == Some("up"),
                    oper_up: phy.child_text("oper-status") == Some("up"),
                },
            ))
        })
        .collect()
}

/// Parses a PoE interface-information reply into enabled flags.
pub fn parse_poe(tree: &XmlElement) -> HashMap<String, bool> {
    tree.descendants("poe-interface")
        .into_iter()
        .filter_map(|port| {
            let name = port.child_text("interface-name")?;
            Some((
                name.to_string(),
                port.child_text("interface-power-mode") == Some("on"),
            ))
        })
        .collect()
}

/// Parses the virtual-chassis port view into canonical interface names.
///
/// Ports are listed per member (`fpcN`) as `pic/port`, optionally prefixed
/// with `vcp-255/`. Uplink-module ports ([`UPLINK_PIC`]) and dedicated VCP
/// ports with no front-panel name are skipped.
pub fn parse_fabric_ports(tree: &XmlElement) -> Vec<FabricPort> {
    let items = tree.descendants("multi-routing-engine-item");
    let members: Vec<(u32, &XmlElement)> = if items.is_empty() {
        vec![(0, tree)]
    } else {
        items
            .into_iter()
            .filter_map(|item| {
                let member = item
                    .child_text("re-name")?
                    .strip_prefix("fpc")?
                    .parse()
                    .ok()?;
                Some((member, item))
            })
            .collect()
    };

    let mut ports = Vec::new();
    for (member, section) in members {
        for info in section.descendants("port-information") {
            let Some(port_name) = info.child_text("port-name") else {
                continue;
            };
            let Some((pic, port)) = fabric_pic_port(port_name) else {
                continue;
            };
            if pic == UPLINK_PIC {
                continue;
            }
            let kind = if pic == 0 { PortKind::Ge } else { PortKind::Xe };
            ports.push(FabricPort {
                name: InterfaceName::physical(kind, member, pic, port),
                vc_status: info.child_text("port-status").unwrap_or("Down").to_string(),
            });
        }
    }
    ports
}

fn fabric_pic_port(port_name: &str) -> Option<(u32, u32)> {
    let local = port_name.strip_prefix("vcp-255/").unwrap_or(port_name);
    let (pic, port) = local.split_once('/')?;
    Some((pic.parse().ok()?, port.parse().ok()?))
}

/// Parses the VLAN catalogue from the declared configuration.
pub fn parse_vlans(tree: &XmlElement) -> Vec<VlanEntry> {
    let Some(configuration) = configuration_root(tree) else {
        return Vec::new();
    };
    configuration
        .find_all(&["vlans", "vlan"])
        .into_iter()
        .filter_map(|vlan| {
            Some(VlanEntry {
                name: vlan.child_text("name")?.to_string(),
                id: vlan.child_text("vlan-id").and_then(|id| id.parse().ok()),
                description: vlan.child_text("description").map(str::to_string),
            })
        })
        .collect()
}

/// Derives one summary per aggregate from parsed declared records.
///
/// Aggregates referenced only by a member's bundle leaf are included as
/// unconfigured.
pub fn summarize_aggregates(
    records: &[InterfaceRecord],
    oper: &HashMap<String, OperStatus>,
) -> Vec<AggregateSummary> {
    let mut summaries: BTreeMap<String, AggregateSummary> = BTreeMap::new();

    for record in records.iter().filter(|r| r.aggregate) {
        let summary = summaries
            .entry(record.name.clone())
            .or_insert_with(|| empty_summary(&record.name, oper));
        summary.lacp_mode = record.lacp_mode;
        summary.description = record.description.clone();
        summary.configured = record.configured;
    }
    for record in records {
        if let Some(bundle) = &record.bundle {
            summaries
                .entry(bundle.clone())
                .or_insert_with(|| empty_summary(bundle, oper))
                .members
                .push(record.name.clone());
        }
    }

    summaries
        .into_values()
        .map(|mut s| {
            s.members.sort();
            s
        })
        .collect()
}

fn empty_summary(name: &str, oper: &HashMap<String, OperStatus>) -> AggregateSummary {
    AggregateSummary {
        name: name.to_string(),
        members: Vec::new(),
        lacp_mode: None,
        description: None,
        configured: false,
        oper_up: oper.get(name).is_some_and(|s| s.oper_up),
    }
}

static COMMIT_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\s*(\d+)\s+(\d{4}-\d{2}-\d{2}\s+\d{2}:\d{2}:\d{2}(?:\s+[A-Z]{2,5})?)\s+by\s+(\S+)(?:\s+via\s+(\S+))?",
    )
    .expect("Invalid regex pattern")
});

/// Parses `show system commit` text.
///
/// ```text
/// 0   2024-05-02 10:12:03 UTC by admin via netconf
///     comment: vlan 20 on access ports
/// 1   2024-05-01 08:00:00 UTC by root via cli
/// ```
pub fn parse_commit_history(text: &str) -> Vec<CommitEntry> {
    let mut entries: Vec<CommitEntry> = Vec::new();
    for line in text.lines() {
        if let Some(caps) = COMMIT_LINE.captures(line) {
            let Ok(index) = caps[1].parse() else {
                continue;
            };
            entries.push(CommitEntry {
                index,
                timestamp: caps[2].to_string(),
                user: caps[3].to_string(),
                client: caps.get(4).map(|m| m.as_str().to_string()),
                comment: None,
            });
        } else if let Some(comment) = line.trim().strip_prefix("comment:") {
            if let Some(last) = entries.last_mut() {
                if last.comment.is_none() {
                    last.comment = Some(comment.trim().to_string());
                }
            }
        }
    }
    entries
}

/// Strips one layer of enclosing quote characters from command output.
pub fn unwrap_quotes(text: &str) -> &str {
    let trimmed = text.trim();
    for quote in ['"', '\''] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            return &trimmed[1..trimmed.len() - 1];
        }
    }
    trimmed
}

fn check_range(field: &str, vlan: &VlanRef) -> Result<(), ValidationError> {
    vlan.check_range()
        .map_err(|id| ValidationError::VlanOutOfRange {
            field: field.to_string(),
            vlan: id,
        })
}

/// Builds the merge-style `<config>` payload for one interface.
///
/// Rejects fabric ports and unknown modes before building anything.
pub fn build_edit_payload(interface: &str, desired: &DesiredConfig) -> NetconfResult<XmlElement> {
    let mode = desired.check_editable(interface)?;

    let mut switching = XmlElement::new("ethernet-switching")
        .with_child(XmlElement::new("port-mode").with_text(mode.as_str()));
    let mut vlan = XmlElement::new("vlan");
    match mode {
        PortMode::Access => {
            if let Some(access) = &desired.access_vlan {
                check_range("access_vlan", access)?;
                vlan.push(XmlElement::new("members").with_text(access.to_string()));
            }
            switching.push(vlan);
        }
        PortMode::Trunk => {
            for member in desired.trunk_vlans.iter().flatten() {
                check_range("trunk VLAN", member)?;
                vlan.push(XmlElement::new("members").with_text(member.to_string()));
            }
            switching.push(vlan);
            if let Some(native) = &desired.native_vlan {
                check_range("native_vlan", native)?;
                switching.push(XmlElement::new("native-vlan-id").with_text(native.to_string()));
            }
        }
    }

    let mut iface =
        XmlElement::new("interface").with_child(XmlElement::new("name").with_text(interface));
    if let Some(description) = desired.description.as_deref().filter(|d| !d.is_empty()) {
        iface.push(XmlElement::new("description").with_text(description));
    }
    iface.push(
        XmlElement::new("unit")
            .with_child(XmlElement::new("name").with_text("0"))
            .with_child(XmlElement::new("family").with_child(switching)),
    );

    let speed = desired.speed.as_deref().filter(|s| !s.is_empty());
    let full_duplex = desired.duplex.as_deref() == Some("full");
    if speed.is_some() || full_duplex {
        let eo = iface.push(XmlElement::new("ether-options"));
        if let Some(speed) = speed {
            eo.push(XmlElement::new("speed").with_text(speed));
        }
        if full_duplex {
            eo.push(XmlElement::new("no-auto-negotiation"));
        }
    }

    let mut configuration = XmlElement::new("configuration")
        .with_child(XmlElement::new("interfaces").with_child(iface));
    if let Some(poe) = desired.poe {
        let mut poe_iface =
            XmlElement::new("interface").with_child(XmlElement::new("name").with_text(interface));
        if !poe {
            poe_iface.push(XmlElement::new("disable"));
        }
        configuration
            .child_mut_or_insert("chassis")
            .child_mut_or_insert("poe")
            .push(poe_iface);
    }

    Ok(XmlElement::new("config").with_child(configuration))
}

/// Builds a payload that removes the whole interface stanza.
pub fn build_delete_payload(interface: &str) -> XmlElement {
    XmlElement::new("config").with_child(
        XmlElement::new("configuration").with_child(
            XmlElement::new("interfaces").with_child(
                XmlElement::new("interface")
                    .with_attr("operation", "delete")
                    .with_child(XmlElement::new("name").with_text(interface)),
            ),
        ),
    )
}

/// Returns the message of the first error-severity `rpc-error`, if any.
///
/// Warnings are ignored; the device still applied the request.
pub fn rpc_error_message(reply: &XmlElement) -> Option<String> {
    reply
        .descendants("rpc-error")
        .into_iter()
        .find(|e| e.child_text("error-severity") != Some("warning"))
        .map(|e| {
            e.child_text("error-message")
                .or_else(|| e.child_text("error-tag"))
                .unwrap_or("rpc-error")
                .to_string()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::NetconfError;
    use pretty_assertions::assert_eq;

    fn tree(xml: &str) -> XmlElement {
        XmlElement::parse(xml).unwrap()
    }

    const CONFIG: &str = r#"<rpc-reply><data><configuration>
        <interfaces>
            <interface><name>ge-0/0/1</name>
                <unit><name>0</name><family><ethernet-switching>
                    <port-mode>trunk</port-mode>
                    <vlan><members>10</members><members>20</members></vlan>
                    <native-vlan-id>1</native-vlan-id>
                </ethernet-switching></family></unit>
            </interface>
            <interface><name>ge-0/0/2</name>
                <unit><name>0</name><family><ethernet-switching>
                    <vlan><members>USERS</members></vlan>
                </ethernet-switching></family></unit>
            </interface>
            <interface><name>ge-0/0/3</name><description>printer</description></interface>
            <interface><name>ge-0/0/4</name></interface>
            <interface><name>xe-0/2/0</name>
                <ether-options><ieee-802.3ad><bundle>ae0</bundle></ieee-802.3ad></ether-options>
            </interface>
            <interface><name>xe-1/2/0</name>
                <ether-options><speed><ethernet-10g/></speed><no-auto-negotiation/>
                    <ieee-802.3ad><bundle>ae0</bundle></ieee-802.3ad></ether-options>
            </interface>
            <interface><name>ae0</name><description>core</description>
                <aggregated-ether-options><lacp><active/></lacp></aggregated-ether-options>
            </interface>
            <interface><name>vme</name><unit><name>0</name></unit></interface>
            <interface><name>irb</name></interface>
        </interfaces>
        <vlans>
            <vlan><name>USERS</name><vlan-id>10</vlan-id><description>staff</description></vlan>
            <vlan><name>VOICE</name><vlan-id>20</vlan-id></vlan>
        </vlans>
        <chassis><poe>
            <interface><name>ge-0/0/1</name></interface>
            <interface><name>ge-0/0/2</name><disable/></interface>
        </poe></chassis>
    </configuration></data></rpc-reply>"#;

    #[test]
    fn test_parse_configuration() {
        let records = parse_configuration(&tree(CONFIG));
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["ge-0/0/1", "ge-0/0/2", "ge-0/0/3", "ge-0/0/4", "xe-0/2/0", "xe-1/2/0", "ae0"]
        );

        let trunk = &records[0];
        assert_eq!(trunk.mode, Some(PortMode::Trunk));
        assert_eq!(trunk.trunk_vlans, Some(vec![VlanRef::Id(10), VlanRef::Id(20)]));
        assert_eq!(trunk.native_vlan, Some(VlanRef::Id(1)));
        assert_eq!(trunk.access_vlan, None);
        assert_eq!(trunk.poe, Some(true));
        assert!(trunk.configured);

        let access = &records[1];
        assert_eq!(access.mode, Some(PortMode::Access));
        assert_eq!(access.access_vlan, Some(VlanRef::Name("USERS".to_string())));
        assert_eq!(access.trunk_vlans, None);
        assert_eq!(access.poe, Some(false));
    }

    #[test]
    fn test_configured_rule() {
        let records = parse_configuration(&tree(CONFIG));
        let by_name: HashMap<_, _> = records.iter().map(|r| (r.name.as_str(), r)).collect();

        assert!(by_name["ge-0/0/3"].configured, "description only");
        assert_eq!(by_name["ge-0/0/3"].mode, None);
        assert!(!by_name["ge-0/0/4"].configured);
        assert!(by_name["xe-0/2/0"].configured, "bundle member");
        assert!(by_name["ae0"].configured);

        let xe = by_name["xe-1/2/0"];
        assert_eq!(xe.speed.as_deref(), Some("10g"));
        assert_eq!(xe.duplex.as_deref(), Some("full"));
        assert_eq!(xe.bundle.as_deref(), Some("ae0"));
        assert_eq!(by_name["ae0"].lacp_mode, Some(LacpMode::Active));
    }

    #[test]
    fn test_parse_operational_and_poe() {
        let oper = parse_operational(&tree(
            r#"<interface-information>
                <physical-interface><name>ge-0/0/1</name><admin-status>up</admin-status><oper-status>up</oper-status></physical-interface>
                <physical-interface><name>ge-0/0/2</name><admin-status>down</admin-status><oper-status>down</oper-status></physical-interface>
            </interface-information>"#,
        ));
        assert_eq!(oper["ge-0/0/1"], OperStatus { admin_up: true, oper_up: true });
        assert_eq!(oper["ge-0/0/2"], OperStatus::default());

        let poe = parse_poe(&tree(
            r#"<poe-interface-information>
                <poe-interface><interface-name>ge-0/0/1</interface-name><interface-power-mode>on</interface-power-mode></poe-interface>
                <poe-interface><interface-name>ge-0/0/2</interface-name><interface-power-mode>off</interface-power-mode></poe-interface>
            </poe-interface-information>"#,
        ));
        assert_eq!(poe.get("ge-0/0/1"), Some(&true));
        assert_eq!(poe.get("ge-0/0/2"), Some(&false));
    }

    #[test]
    fn test_parse_fabric_ports_skips_uplink_pic() {
        let ports = parse_fabric_ports(&tree(
            r#"<multi-routing-engine-results>
                <multi-routing-engine-item><re-name>fpc0</re-name>
                    <virtual-chassis-port-information><port-list>
                        <port-information><port-name>vcp-255/2/0</port-name><port-status>Up</port-status></port-information>
                        <port-information><port-name>vcp-255/1/0</port-name><port-status>Up</port-status></port-information>
                        <port-information><port-name>vcp-0</port-name><port-status>Up</port-status></port-information>
                    </port-list></virtual-chassis-port-information>
                </multi-routing-engine-item>
                <multi-routing-engine-item><re-name>fpc1</re-name>
                    <virtual-chassis-port-information><port-list>
                        <port-information><port-name>0/47</port-name><port-status>Down</port-status></port-information>
                    </port-list></virtual-chassis-port-information>
                </multi-routing-engine-item>
            </multi-routing-engine-results>"#,
        ));
        assert_eq!(
            ports,
            vec![
                FabricPort { name: "xe-0/2/0".to_string(), vc_status: "Up".to_string() },
                FabricPort { name: "ge-1/0/47".to_string(), vc_status: "Down".to_string() },
            ]
        );
    }

    #[test]
    fn test_parse_vlans() {
        let vlans = parse_vlans(&tree(CONFIG));
        assert_eq!(vlans.len(), 2);
        assert_eq!(vlans[0].name, "USERS");
        assert_eq!(vlans[0].id, Some(10));
        assert_eq!(vlans[0].description.as_deref(), Some("staff"));
        assert_eq!(vlans[1].description, None);
    }

    #[test]
    fn test_summarize_aggregates() {
        let records = parse_configuration(&tree(CONFIG));
        let mut oper = HashMap::new();
        oper.insert("ae0".to_string(), OperStatus { admin_up: true, oper_up: true });
        let summaries = summarize_aggregates(&records, &oper);
        assert_eq!(summaries.len(), 1);
        let ae0 = &summaries[0];
        assert_eq!(ae0.members, vec!["xe-0/2/0".to_string(), "xe-1/2/0".to_string()]);
        assert_eq!(ae0.lacp_mode, Some(LacpMode::Active));
        assert_eq!(ae0.description.as_deref(), Some("core"));
        assert!(ae0.configured);
        assert!(ae0.oper_up);
    }

    #[test]
    fn test_parse_commit_history() {
        let text = "\
0   2024-05-02 10:12:03 UTC by admin via netconf
    comment: vlan 20 on access ports
1   2024-05-01 08:00:00 UTC by root via cli
2   2024-04-30 17:45:10 UTC by jdoe
";
        let entries = parse_commit_history(text);
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].index, 0);
        assert_eq!(entries[0].timestamp, "2024-05-02 10:12:03 UTC");
        assert_eq!(entries[0].user, "admin");
        assert_eq!(entries[0].client.as_deref(), Some("netconf"));
        assert_eq!(entries[0].comment.as_deref(), Some("vlan 20 on access ports"));
        assert_eq!(entries[1].comment, None);
        assert_eq!(entries[2].client, None);
    }

    #[test]
    fn test_unwrap_quotes() {
        assert_eq!(unwrap_quotes("\"[edit]\n+ x\""), "[edit]\n+ x");
        assert_eq!(unwrap_quotes("'a'"), "a");
        assert_eq!(unwrap_quotes("\"\"x\"\""), "\"x\"");
        assert_eq!(unwrap_quotes("plain"), "plain");
        assert_eq!(unwrap_quotes("\""), "\"");
    }

    #[test]
    fn test_build_access_payload() {
        let mut desired = DesiredConfig::access(10u32);
        desired.description = Some("desk <12> & co".to_string());
        let xml = build_edit_payload("ge-0/0/5", &desired).unwrap().to_xml();
        assert_eq!(
            xml,
            "<config><configuration><interfaces><interface><name>ge-0/0/5</name>\
             <description>desk &lt;12&gt; &amp; co</description>\
             <unit><name>0</name><family><ethernet-switching><port-mode>access</port-mode>\
             <vlan><members>10</members></vlan></ethernet-switching></family></unit>\
             </interface></interfaces></configuration></config>"
        );
    }

    #[test]
    fn test_build_trunk_payload_with_poe_and_speed() {
        let mut desired =
            DesiredConfig::trunk([VlanRef::Id(10), VlanRef::Name("VOICE".to_string())]);
        desired.native_vlan = Some(VlanRef::Id(1));
        desired.poe = Some(false);
        desired.speed = Some("1g".to_string());
        desired.duplex = Some("full".to_string());

        let payload = build_edit_payload("ge-0/0/7", &desired).unwrap();
        let cfg = payload.child("configuration").unwrap();
        let sw = cfg
            .find(&["interfaces", "interface", "unit", "family", "ethernet-switching"])
            .unwrap();
        let members: Vec<_> = sw.find_all(&["vlan", "members"]).iter().map(|m| m.text()).collect();
        assert_eq!(members, vec!["10", "VOICE"]);
        assert_eq!(sw.child_text("native-vlan-id"), Some("1"));

        let eo = cfg.find(&["interfaces", "interface", "ether-options"]).unwrap();
        assert_eq!(eo.child_text("speed"), Some("1g"));
        assert!(eo.child("no-auto-negotiation").is_some());

        let poe = cfg.find(&["chassis", "poe", "interface"]).unwrap();
        assert_eq!(poe.child_text("name"), Some("ge-0/0/7"));
        assert!(poe.child("disable").is_some());
    }

    #[test]
    fn test_build_payload_rejects_fabric_and_bad_mode() {
        let mut desired = DesiredConfig::access(10u32);
        desired.vc_port = true;
        assert!(matches!(
            build_edit_payload("xe-0/2/0", &desired),
            Err(NetconfError::Validation(ValidationError::FabricPort(_)))
        ));

        let desired = DesiredConfig {
            mode: "routed".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            build_edit_payload("ge-0/0/1", &desired),
            Err(NetconfError::Validation(ValidationError::InvalidMode(_)))
        ));

        assert!(matches!(
            build_edit_payload("ge-0/0/1", &DesiredConfig::access(4095u32)),
            Err(NetconfError::Validation(ValidationError::VlanOutOfRange { vlan: 4095, .. }))
        ));
    }

    #[test]
    fn test_build_delete_payload() {
        assert_eq!(
            build_delete_payload("ge-0/0/9").to_xml(),
            "<config><configuration><interfaces><interface operation=\"delete\">\
             <name>ge-0/0/9</name></interface></interfaces></configuration></config>"
        );
    }

    #[test]
    fn test_rpc_error_message() {
        let reply = tree(
            r#"<rpc-reply>
                <rpc-error><error-severity>warning</error-severity><error-message>statement not found</error-message></rpc-error>
                <rpc-error><error-severity>error</error-severity><error-message>
                    configuration database locked by another user
                </error-message></rpc-error>
            </rpc-reply>"#,
        );
        assert_eq!(
            rpc_error_message(&reply).as_deref(),
            Some("configuration database locked by another user")
        );
        assert_eq!(rpc_error_message(&tree("<rpc-reply><ok/></rpc-reply>")), None);
    }
}
