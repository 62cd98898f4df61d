// ── HA plan ──
//
// Everything both devices need to form an active-passive pair: the HA1/HA2
// ports, the group, and per-device HA1 address and election settings. The
// per-device payloads are derived here, so a device's peer address is always
// the other device's HA1 address.

use std::net::Ipv4Addr;

use hapair_api::XPath;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::model::PairSlot;

/// Element that marks an ethernet interface as an HA interface.
pub const HA_INTERFACE_MARKER: &str = "<ha/>";

/// Element that switches HA on.
pub const HA_ENABLED_ELEMENT: &str = "<enabled>yes</enabled>";

/// Per-device HA settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaNode {
    pub ha1_ip: Ipv4Addr,
    /// Election priority; the lower value wins.
    pub priority: u8,
    pub preemptive: bool,
}

/// Settings shared by both devices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HaSettings {
    pub group_id: u8,
    pub ha1_port: String,
    pub ha2_port: String,
    pub ha1_netmask: Ipv4Addr,
    /// Interfaces whose link state feeds HA path monitoring. Empty disables it.
    pub link_monitoring: Vec<String>,
    /// Commit the HA configuration on both devices once it is pushed.
    pub activate: bool,
}

impl Default for HaSettings {
    fn default() -> Self {
        Self {
            group_id: 1,
            ha1_port: "ethernet1/4".into(),
            ha2_port: "ethernet1/5".into(),
            ha1_netmask: Ipv4Addr::new(255, 255, 255, 0),
            link_monitoring: Vec::new(),
            activate: true,
        }
    }
}

impl HaNode {
    /// The conventional addressing for a fresh pair: `1.1.1.1` with
    /// priority 100 (preemptive) and `1.1.1.2` with priority 110.
    pub fn default_pair() -> [Self; 2] {
        [
            Self {
                ha1_ip: Ipv4Addr::new(1, 1, 1, 1),
                priority: 100,
                preemptive: true,
            },
            Self {
                ha1_ip: Ipv4Addr::new(1, 1, 1, 2),
                priority: 110,
                preemptive: false,
            },
        ]
    }
}

/// What one device will be told, for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HaNodeSummary {
    pub slot: PairSlot,
    pub ha1_ip: Ipv4Addr,
    pub peer_ip: Ipv4Addr,
    pub priority: u8,
    pub preemptive: bool,
}

/// A validated HA plan for the pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HaPlan {
    settings: HaSettings,
    nodes: [HaNode; 2],
}

impl HaPlan {
    /// Validate and build a plan.
    ///
    /// Rejects plans where both devices share an HA1 address or an election
    /// priority, where HA1 and HA2 use the same port, or where an interface
    /// name cannot be embedded in a configuration path.
    pub fn new(settings: HaSettings, first: HaNode, second: HaNode) -> Result<Self, CoreError> {
        let invalid = |reason: String| CoreError::InvalidPlan { reason };

        if first.ha1_ip == second.ha1_ip {
            return Err(invalid(format!("both devices use HA1 address {}", first.ha1_ip)));
        }
        if first.priority == second.priority {
            return Err(invalid(format!("both devices use priority {}", first.priority)));
        }
        if settings.ha1_port == settings.ha2_port {
            return Err(invalid(format!("HA1 and HA2 both use {}", settings.ha1_port)));
        }
        if !(1..=63).contains(&settings.group_id) {
            return Err(invalid(format!("group id {} is outside 1-63", settings.group_id)));
        }
        for port in std::iter::once(&settings.ha1_port)
            .chain(std::iter::once(&settings.ha2_port))
            .chain(settings.link_monitoring.iter())
        {
            interface_xpath(port)?;
        }

        Ok(Self {
            settings,
            nodes: [first, second],
        })
    }

    pub fn settings(&self) -> &HaSettings {
        &self.settings
    }

    pub fn node(&self, slot: PairSlot) -> &HaNode {
        match slot {
            PairSlot::First => &self.nodes[0],
            PairSlot::Second => &self.nodes[1],
        }
    }

    /// The HA1 address `slot` must use as its peer.
    pub fn peer_ip(&self, slot: PairSlot) -> Ipv4Addr {
        self.node(slot.other()).ha1_ip
    }

    /// The HA1 and HA2 ports, in that order.
    pub fn ha_ports(&self) -> [&str; 2] {
        [&self.settings.ha1_port, &self.settings.ha2_port]
    }

    pub fn summary(&self) -> [HaNodeSummary; 2] {
        PairSlot::BOTH.map(|slot| {
            let node = self.node(slot);
            HaNodeSummary {
                slot,
                ha1_ip: node.ha1_ip,
                peer_ip: self.peer_ip(slot),
                priority: node.priority,
                preemptive: node.preemptive,
            }
        })
    }

    // ── Payloads ─────────────────────────────────────────────────────

    /// Group definition for `slot`, set at [`ha_group_xpath`].
    pub fn group_element(&self, slot: PairSlot) -> String {
        let node = self.node(slot);
        let mut xml = format!(
            "<group-id>{group}</group-id>\
             <peer-ip>{peer}</peer-ip>\
             <mode><active-passive/></mode>\
             <election-option>\
             <device-priority>{priority}</device-priority>\
             <preemptive>{preemptive}</preemptive>\
             </election-option>\
             <configuration-synchronization><enabled>yes</enabled></configuration-synchronization>\
             <state-synchronization><enabled>yes</enabled></state-synchronization>",
            group = self.settings.group_id,
            peer = self.peer_ip(slot),
            priority = node.priority,
            preemptive = yes_no(node.preemptive),
        );

        if !self.settings.link_monitoring.is_empty() {
            let members: String = self
                .settings
                .link_monitoring
                .iter()
                .map(|port| format!("<member>{port}</member>"))
                .collect();
            xml.push_str(&format!(
                "<monitoring><link-monitoring><enabled>yes</enabled><link-group>\
                 <entry name=\"link-group-1\"><enabled>yes</enabled><interface>{members}</interface></entry>\
                 </link-group></link-monitoring></monitoring>"
            ));
        }
        xml
    }

    /// HA1/HA2 link settings for `slot`, set at [`ha_interface_xpath`].
    pub fn interface_element(&self, slot: PairSlot) -> String {
        format!(
            "<ha1><port>{ha1}</port><ip-address>{ip}</ip-address><netmask>{mask}</netmask></ha1>\
             <ha2><port>{ha2}</port></ha2>",
            ha1 = self.settings.ha1_port,
            ip = self.node(slot).ha1_ip,
            mask = self.settings.ha1_netmask,
            ha2 = self.settings.ha2_port,
        )
    }
}

fn yes_no(flag: bool) -> &'static str {
    if flag { "yes" } else { "no" }
}

// ── Paths ───────────────────────────────────────────────────────────

pub fn ha_root_xpath() -> XPath {
    XPath::device()
        .child("deviceconfig")
        .child("high-availability")
}

pub fn ha_group_xpath() -> XPath {
    ha_root_xpath().child("group")
}

pub fn ha_interface_xpath() -> XPath {
    ha_root_xpath().child("interface")
}

/// The configuration entry of a physical ethernet interface.
pub fn interface_xpath(port: &str) -> Result<XPath, CoreError> {
    XPath::device()
        .child("network")
        .child("interface")
        .child("ethernet")
        .entry("entry", port)
        .map_err(|e| CoreError::InvalidPlan {
            reason: format!("interface name: {e}"),
        })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn plan() -> HaPlan {
        let [a, b] = HaNode::default_pair();
        HaPlan::new(HaSettings::default(), a, b).unwrap()
    }

    #[test]
    fn peer_ip_is_the_other_ha1_address() {
        let plan = plan();
        assert_eq!(plan.peer_ip(PairSlot::First), Ipv4Addr::new(1, 1, 1, 2));
        assert_eq!(plan.peer_ip(PairSlot::Second), Ipv4Addr::new(1, 1, 1, 1));

        let [first, second] = plan.summary();
        assert_eq!(first.peer_ip, second.ha1_ip);
        assert_eq!(second.peer_ip, first.ha1_ip);
    }

    #[test]
    fn equal_addresses_are_rejected() {
        let [a, mut b] = HaNode::default_pair();
        b.ha1_ip = a.ha1_ip;
        let err = HaPlan::new(HaSettings::default(), a, b).unwrap_err();
        assert!(matches!(err, CoreError::InvalidPlan { ref reason } if reason.contains("HA1 address")));
    }

    #[test]
    fn equal_priorities_are_rejected() {
        let [a, mut b] = HaNode::default_pair();
        b.priority = a.priority;
        assert!(HaPlan::new(HaSettings::default(), a, b).is_err());
    }

    #[test]
    fn shared_ha_port_is_rejected() {
        let [a, b] = HaNode::default_pair();
        let settings = HaSettings {
            ha2_port: "ethernet1/4".into(),
            ..HaSettings::default()
        };
        assert!(HaPlan::new(settings, a, b).is_err());
    }

    #[test]
    fn interface_names_with_markup_are_rejected() {
        let [a, b] = HaNode::default_pair();
        let settings = HaSettings {
            link_monitoring: vec!["ethernet1/1</member>".into()],
            ..HaSettings::default()
        };
        assert!(HaPlan::new(settings, a, b).is_err());
    }

    #[test]
    fn group_element_carries_election_settings() {
        let xml = plan().group_element(PairSlot::First);
        assert!(xml.contains("<peer-ip>1.1.1.2</peer-ip>"));
        assert!(xml.contains("<device-priority>100</device-priority>"));
        assert!(xml.contains("<preemptive>yes</preemptive>"));
        assert!(!xml.contains("<monitoring>"));

        let xml = plan().group_element(PairSlot::Second);
        assert!(xml.contains("<peer-ip>1.1.1.1</peer-ip>"));
        assert!(xml.contains("<preemptive>no</preemptive>"));
    }

    #[test]
    fn link_monitoring_is_included_when_configured() {
        let [a, b] = HaNode::default_pair();
        let settings = HaSettings {
            link_monitoring: vec!["ethernet1/1".into(), "ethernet1/2".into()],
            ..HaSettings::default()
        };
        let xml = HaPlan::new(settings, a, b)
            .unwrap()
            .group_element(PairSlot::First);
        assert!(xml.contains("<member>ethernet1/1</member><member>ethernet1/2</member>"));
    }

    #[test]
    fn interface_element_uses_own_address() {
        assert_eq!(
            plan().interface_element(PairSlot::Second),
            "<ha1><port>ethernet1/4</port><ip-address>1.1.1.2</ip-address>\
             <netmask>255.255.255.0</netmask></ha1><ha2><port>ethernet1/5</port></ha2>"
        );
    }
}
