//! Node-usage scanning.
//!
//! Builds the per-zone candidate lists the placement function chooses
//! from. Eligibility and occupancy are computed independently: a node that
//! is no longer eligible still reports the monitors stranded on it, since
//! those keep its zone from looking empty.

use tracing::debug;

use crate::inventory::Node;
use crate::mon::mapping::{Mapping, NodeInfo};
use crate::mon::spec::{ClusterSpec, MonPlacement};

/// A candidate node with its current monitor occupancy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeUsage {
    pub node: Node,
    /// Monitors currently mapped to this node.
    pub mon_count: usize,
    /// Whether a new monitor may be placed here.
    pub mon_valid: bool,
}

impl NodeUsage {
    /// The facts cached in the mapping when a monitor lands here.
    pub fn node_info(&self) -> NodeInfo {
        NodeInfo {
            name: self.node.name.clone(),
            hostname: self.node.hostname().to_string(),
            address: self.node.address().unwrap_or_default().to_string(),
        }
    }
}

/// Returns true if the node can accept a monitor under the placement
/// constraints, ignoring occupancy.
pub fn node_is_valid(node: &Node, placement: &MonPlacement) -> bool {
    if node.unschedulable || !node.ready {
        return false;
    }
    if node.address().is_none() {
        return false;
    }
    if placement
        .node_selector
        .iter()
        .any(|(k, v)| node.labels.get(k) != Some(v))
    {
        return false;
    }
    !node.taints.iter().any(|taint| placement.blocked_by(taint))
}

/// Group nodes by zone and annotate each with its monitor occupancy.
///
/// Nodes are visited in name order and zones appear in the order their
/// first node does. Nodes without a zone label share one implicit zone.
pub fn scan_node_usage(
    nodes: &[Node],
    mapping: &Mapping,
    spec: &ClusterSpec,
) -> Vec<Vec<NodeUsage>> {
    let mut sorted: Vec<&Node> = nodes.iter().collect();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));

    let mut zone_names: Vec<Option<&str>> = Vec::new();
    let mut zones: Vec<Vec<NodeUsage>> = Vec::new();

    for node in sorted {
        let mon_count = mapping.mon_count_on(&node.name);
        let mon_valid = node_is_valid(node, &spec.placement)
            && (spec.mon.allow_multiple_per_node || mon_count == 0);
        debug!(node = %node.name, mon_count, mon_valid, "Scanned node");

        let usage = NodeUsage {
            node: node.clone(),
            mon_count,
            mon_valid,
        };
        let zone = node.zone();
        match zone_names.iter().position(|z| *z == zone) {
            Some(i) => zones[i].push(usage),
            None => {
                zone_names.push(zone);
                zones.push(vec![usage]);
            }
        }
    }

    zones
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inventory::{AddressKind, Taint, TaintEffect, ZONE_LABEL};
    use crate::mon::spec::{TolerationOperator, Toleration};

    fn node(name: &str, zone: Option<&str>) -> Node {
        let node = Node::new(name).with_address(AddressKind::InternalIP, "10.0.0.1");
        match zone {
            Some(zone) => node.with_label(ZONE_LABEL, zone),
            None => node,
        }
    }

    fn info(name: &str) -> NodeInfo {
        NodeInfo {
            name: name.to_string(),
            hostname: name.to_string(),
            address: "10.0.0.1".to_string(),
        }
    }

    #[test]
    fn test_groups_by_zone_in_first_seen_order() {
        let nodes = vec![
            node("n3", Some("z2")),
            node("n1", Some("z2")),
            node("n2", Some("z1")),
            node("n4", None),
        ];
        let zones = scan_node_usage(&nodes, &Mapping::default(), &ClusterSpec::default());

        let names: Vec<Vec<&str>> = zones
            .iter()
            .map(|z| z.iter().map(|u| u.node.name.as_str()).collect())
            .collect();
        assert_eq!(names, vec![vec!["n1", "n3"], vec!["n2"], vec!["n4"]]);
    }

    #[test]
    fn test_occupied_node_invalid_unless_multiple_allowed() {
        let nodes = vec![node("n1", None), node("n2", None)];
        let mut mapping = Mapping::default();
        mapping.assign("a", info("n1"));

        let zones = scan_node_usage(&nodes, &mapping, &ClusterSpec::default());
        assert_eq!(zones[0][0].mon_count, 1);
        assert!(!zones[0][0].mon_valid);
        assert!(zones[0][1].mon_valid);

        let mut spec = ClusterSpec::default();
        spec.mon.allow_multiple_per_node = true;
        let zones = scan_node_usage(&nodes, &mapping, &spec);
        assert!(zones[0][0].mon_valid);
    }

    #[test]
    fn test_stranded_monitor_keeps_count() {
        let mut cordoned = node("n1", Some("z1"));
        cordoned.unschedulable = true;
        let mut mapping = Mapping::default();
        mapping.assign("a", info("n1"));

        let zones = scan_node_usage(&[cordoned], &mapping, &ClusterSpec::default());
        assert_eq!(zones[0][0].mon_count, 1);
        assert!(!zones[0][0].mon_valid);
    }

    #[test]
    fn test_node_eligibility() {
        let placement = MonPlacement::default();
        assert!(node_is_valid(&node("n1", None), &placement));

        let mut not_ready = node("n1", None);
        not_ready.ready = false;
        assert!(!node_is_valid(&not_ready, &placement));

        assert!(!node_is_valid(&Node::new("no-address"), &placement));

        let mut tainted = node("n1", None);
        tainted.taints.push(Taint {
            key: "dedicated".to_string(),
            value: None,
            effect: TaintEffect::NoSchedule,
        });
        assert!(!node_is_valid(&tainted, &placement));

        let tolerant = MonPlacement {
            tolerations: vec![Toleration {
                key: Some("dedicated".to_string()),
                operator: TolerationOperator::Exists,
                ..Default::default()
            }],
            ..Default::default()
        };
        assert!(node_is_valid(&tainted, &tolerant));

        let mut selective = MonPlacement::default();
        selective
            .node_selector
            .insert("role".to_string(), "mon".to_string());
        assert!(!node_is_valid(&node("n1", None), &selective));
        assert!(node_is_valid(
            &node("n1", None).with_label("role", "mon"),
            &selective
        ));
    }

    #[test]
    fn test_node_info() {
        let usage = NodeUsage {
            node: node("n1", None).with_label(crate::inventory::HOSTNAME_LABEL, "host1"),
            mon_count: 0,
            mon_valid: true,
        };
        assert_eq!(
            usage.node_info(),
            NodeInfo {
                name: "n1".to_string(),
                hostname: "host1".to_string(),
                address: "10.0.0.1".to_string(),
            }
        );
    }
}
