//! Device reply fixtures
//!
//! Each builder renders the document the mock device hands back for one
//! query. Free text is escaped, so descriptions may contain markup.

use quick_xml::escape::escape;

/// One `<interface>` stanza of the declared configuration.
#[derive(Debug, Clone)]
pub struct InterfaceFixture {
    name: String,
    description: Option<String>,
    switching: Option<String>,
    ether_options: Vec<String>,
    lacp: Option<String>,
}

impl InterfaceFixture {
    /// A stanza with only a name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            switching: None,
            ether_options: Vec::new(),
            lacp: None,
        }
    }

    pub fn description(mut self, text: &str) -> Self {
        self.description = Some(text.to_string());
        self
    }

    /// Access port in `vlan`.
    pub fn access(mut self, vlan: &str) -> Self {
        self.switching = Some(format!(
            "<port-mode>access</port-mode><vlan><members>{}</members></vlan>",
            escape(vlan)
        ));
        self
    }

    /// Trunk port carrying `vlans`, optionally with a native VLAN.
    pub fn trunk(mut self, vlans: &[&str], native: Option<&str>) -> Self {
        let members: String = vlans
            .iter()
            .map(|v| format!("<members>{}</members>", escape(*v)))
            .collect();
        let native = native
            .map(|n| format!("<native-vlan-id>{}</native-vlan-id>", escape(n)))
            .unwrap_or_default();
        self.switching = Some(format!(
            "<port-mode>trunk</port-mode><vlan>{}</vlan>{}",
            members, native
        ));
        self
    }

    /// Member of aggregate `ae`.
    pub fn bundle(mut self, ae: &str) -> Self {
        self.ether_options.push(format!(
            "<ieee-802.3ad><bundle>{}</bundle></ieee-802.3ad>",
            escape(ae)
        ));
        self
    }

    pub fn speed(mut self, speed: &str) -> Self {
        self.ether_options
            .push(format!("<speed>{}</speed>", escape(speed)));
        self
    }

    pub fn full_duplex(mut self) -> Self {
        self.ether_options.push("<no-auto-negotiation/>".to_string());
        self
    }

    /// LACP mode of an aggregate, `"active"` or `"passive"`.
    pub fn lacp(mut self, mode: &str) -> Self {
        self.lacp = Some(format!("<lacp><{}/></lacp>", mode));
        self
    }

    fn render(&self) -> String {
        let mut xml = format!("<interface><name>{}</name>", escape(self.name.as_str()));
        if let Some(description) = &self.description {
            xml.push_str(&format!(
                "<description>{}</description>",
                escape(description.as_str())
            ));
        }
        if !self.ether_options.is_empty() {
            xml.push_str(&format!(
                "<ether-options>{}</ether-options>",
                self.ether_options.concat()
            ));
        }
        if let Some(lacp) = &self.lacp {
            xml.push_str(&format!(
                "<aggregated-ether-options>{}</aggregated-ether-options>",
                lacp
            ));
        }
        if let Some(switching) = &self.switching {
            xml.push_str(&format!(
                "<unit><name>0</name><family><ethernet-switching>{}</ethernet-switching></family></unit>",
                switching
            ));
        }
        xml.push_str("</interface>");
        xml
    }
}

/// The `<configuration>` document returned by get-config.
#[derive(Debug, Clone, Default)]
pub struct ConfigFixture {
    interfaces: Vec<InterfaceFixture>,
    vlans: Vec<String>,
    poe: Vec<String>,
}

impl ConfigFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interface(mut self, interface: InterfaceFixture) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn vlan(mut self, name: &str, id: u32, description: Option<&str>) -> Self {
        let description = description
            .map(|d| format!("<description>{}</description>", escape(d)))
            .unwrap_or_default();
        self.vlans.push(format!(
            "<vlan><name>{}</name><vlan-id>{}</vlan-id>{}</vlan>",
            escape(name),
            id,
            description
        ));
        self
    }

    /// Declared PoE for `interface`; `false` renders a `disable` leaf.
    pub fn poe(mut self, interface: &str, enabled: bool) -> Self {
        let disable = if enabled { "" } else { "<disable/>" };
        self.poe.push(format!(
            "<interface><name>{}</name>{}</interface>",
            escape(interface),
            disable
        ));
        self
    }

    pub fn build(&self) -> String {
        let interfaces: String = self.interfaces.iter().map(InterfaceFixture::render).collect();
        let mut xml = format!("<configuration><interfaces>{}</interfaces>", interfaces);
        if !self.vlans.is_empty() {
            xml.push_str(&format!("<vlans>{}</vlans>", self.vlans.concat()));
        }
        if !self.poe.is_empty() {
            xml.push_str(&format!("<chassis><poe>{}</poe></chassis>", self.poe.concat()));
        }
        xml.push_str("</configuration>");
        xml
    }
}

/// Terse `get-interface-information` reply.
#[derive(Debug, Clone, Default)]
pub struct OperFixture {
    ports: Vec<String>,
}

impl OperFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port(mut self, name: &str, admin_up: bool, oper_up: bool) -> Self {
        self.ports.push(format!(
            "<physical-interface><name>{}</name><admin-status>{}</admin-status>\
             <oper-status>{}</oper-status></physical-interface>",
            escape(name),
            up_down(admin_up),
            up_down(oper_up)
        ));
        self
    }

    pub fn build(&self) -> String {
        format!("<interface-information>{}</interface-information>", self.ports.concat())
    }
}

/// `get-poe-interface-information` reply.
#[derive(Debug, Clone, Default)]
pub struct PoeFixture {
    ports: Vec<String>,
}

impl PoeFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn port(mut self, name: &str, powered: bool) -> Self {
        self.ports.push(format!(
            "<poe-interface><interface-name>{}</interface-name>\
             <interface-power-mode>{}</interface-power-mode></poe-interface>",
            escape(name),
            if powered { "on" } else { "off" }
        ));
        self
    }

    pub fn build(&self) -> String {
        format!("<poe-interface-information>{}</poe-interface-information>", self.ports.concat())
    }
}

/// `show virtual-chassis vc-port` reply, one section per member.
#[derive(Debug, Clone, Default)]
pub struct FabricFixture {
    members: Vec<(u32, Vec<String>)>,
}

impl FabricFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// A front-panel port converted to a VC port, listed as `vcp-255/pic/port`.
    pub fn port(self, member: u32, pic: u32, port: u32, status: &str) -> Self {
        self.raw(member, &format!("vcp-255/{}/{}", pic, port), status)
    }

    /// A port listed under its raw device name, e.g. a dedicated `vcp-0`.
    pub fn raw(mut self, member: u32, port_name: &str, status: &str) -> Self {
        let entry = format!(
            "<port-information><port-name>{}</port-name><port-status>{}</port-status>\
             </port-information>",
            escape(port_name),
            escape(status)
        );
        match self.members.iter_mut().find(|(m, _)| *m == member) {
            Some((_, ports)) => ports.push(entry),
            None => self.members.push((member, vec![entry])),
        }
        self
    }

    pub fn build(&self) -> String {
        let items: String = self
            .members
            .iter()
            .map(|(member, ports)| {
                format!(
                    "<multi-routing-engine-item><re-name>fpc{}</re-name>\
                     <virtual-chassis-port-information><port-list>{}</port-list>\
                     </virtual-chassis-port-information></multi-routing-engine-item>",
                    member,
                    ports.concat()
                )
            })
            .collect();
        format!("<multi-routing-engine-results>{}</multi-routing-engine-results>", items)
    }
}

fn up_down(up: bool) -> &'static str {
    if up {
        "up"
    } else {
        "down"
    }
}
