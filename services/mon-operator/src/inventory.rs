//! Node inventory interface.
//!
//! Nodes are ephemeral per reconciliation pass. Nothing here is cached
//! across passes; the mapping keeps its own copy of the few fields it needs.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

/// Zone label on current clusters.
pub const ZONE_LABEL: &str = "topology.kubernetes.io/zone";

/// Zone label on older clusters.
pub const LEGACY_ZONE_LABEL: &str = "failure-domain.beta.kubernetes.io/zone";

/// Hostname label.
pub const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

/// Effect of a node taint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaintEffect {
    NoSchedule,
    PreferNoSchedule,
    NoExecute,
}

/// A node taint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taint {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
    pub effect: TaintEffect,
}

/// Kind of node address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddressKind {
    InternalIP,
    ExternalIP,
    Hostname,
}

/// A reported node address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    pub kind: AddressKind,
    pub address: String,
}

fn default_ready() -> bool {
    true
}

/// A node as reported by the inventory.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub taints: Vec<Taint>,
    /// Cordoned nodes accept no new daemons.
    #[serde(default)]
    pub unschedulable: bool,
    #[serde(default = "default_ready")]
    pub ready: bool,
    #[serde(default)]
    pub addresses: Vec<NodeAddress>,
}

impl Node {
    /// Create a ready node with no labels.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ready: true,
            ..Default::default()
        }
    }

    /// Builder: add a label.
    pub fn with_label(mut self, key: &str, value: &str) -> Self {
        self.labels.insert(key.to_string(), value.to_string());
        self
    }

    /// Builder: add an address.
    pub fn with_address(mut self, kind: AddressKind, address: &str) -> Self {
        self.addresses.push(NodeAddress {
            kind,
            address: address.to_string(),
        });
        self
    }

    /// Failure-domain label value, if any.
    pub fn zone(&self) -> Option<&str> {
        self.labels
            .get(ZONE_LABEL)
            .or_else(|| self.labels.get(LEGACY_ZONE_LABEL))
            .map(String::as_str)
    }

    /// Hostname label, falling back to the node name.
    pub fn hostname(&self) -> &str {
        self.labels
            .get(HOSTNAME_LABEL)
            .map(String::as_str)
            .unwrap_or(&self.name)
    }

    /// Best reachable address: internal, then external, then hostname.
    pub fn address(&self) -> Option<&str> {
        [
            AddressKind::InternalIP,
            AddressKind::ExternalIP,
            AddressKind::Hostname,
        ]
        .iter()
        .find_map(|kind| {
            self.addresses
                .iter()
                .find(|a| a.kind == *kind && !a.address.is_empty())
        })
        .map(|a| a.address.as_str())
    }
}

/// Equality-based label selector. An empty selector matches every node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSelector(pub BTreeMap<String, String>);

impl LabelSelector {
    /// Selector that matches every node.
    pub fn everything() -> Self {
        Self::default()
    }

    /// Returns true if every selector label is present with the same value.
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.0.iter().all(|(k, v)| labels.get(k) == Some(v))
    }
}

/// Node inventory provider.
#[async_trait]
pub trait NodeInventory: Send + Sync {
    /// List nodes matching the selector.
    async fn list_nodes(&self, selector: &LabelSelector) -> Result<Vec<Node>>;
}

/// In-memory inventory.
#[derive(Default)]
pub struct StaticInventory {
    nodes: RwLock<Vec<Node>>,
}

impl StaticInventory {
    /// Create an inventory holding the given nodes.
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes: RwLock::new(nodes),
        }
    }

    /// Replace the node set.
    pub async fn set_nodes(&self, nodes: Vec<Node>) {
        *self.nodes.write().await = nodes;
    }

    /// Apply a change to one node. Returns false if the node is unknown.
    pub async fn update_node<F>(&self, name: &str, f: F) -> bool
    where
        F: FnOnce(&mut Node),
    {
        let mut nodes = self.nodes.write().await;
        match nodes.iter_mut().find(|n| n.name == name) {
            Some(node) => {
                f(node);
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl NodeInventory for StaticInventory {
    async fn list_nodes(&self, selector: &LabelSelector) -> Result<Vec<Node>> {
        let nodes = self.nodes.read().await;
        Ok(nodes
            .iter()
            .filter(|n| selector.matches(&n.labels))
            .cloned()
            .collect())
    }
}

/// Inventory backed by a JSON file holding an array of nodes.
///
/// The file is re-read on every listing so edits take effect on the next pass.
pub struct FileInventory {
    path: PathBuf,
}

impl FileInventory {
    /// Create an inventory reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl NodeInventory for FileInventory {
    async fn list_nodes(&self, selector: &LabelSelector) -> Result<Vec<Node>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading node inventory {}", self.path.display()))?;
        let nodes: Vec<Node> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing node inventory {}", self.path.display()))?;
        debug!(path = %self.path.display(), count = nodes.len(), "Loaded node inventory");
        Ok(nodes
            .into_iter()
            .filter(|n| selector.matches(&n.labels))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_zone_prefers_topology_label() {
        let node = Node::new("n1")
            .with_label(LEGACY_ZONE_LABEL, "old")
            .with_label(ZONE_LABEL, "new");
        assert_eq!(node.zone(), Some("new"));

        let node = Node::new("n2").with_label(LEGACY_ZONE_LABEL, "old");
        assert_eq!(node.zone(), Some("old"));
        assert_eq!(Node::new("n3").zone(), None);
    }

    #[test]
    fn test_node_address_order() {
        let node = Node::new("n1")
            .with_address(AddressKind::Hostname, "n1.local")
            .with_address(AddressKind::ExternalIP, "203.0.113.4")
            .with_address(AddressKind::InternalIP, "10.0.0.4");
        assert_eq!(node.address(), Some("10.0.0.4"));
        assert_eq!(node.hostname(), "n1");
        assert_eq!(Node::new("bare").address(), None);
    }

    #[tokio::test]
    async fn test_static_inventory_selector() {
        let inventory = StaticInventory::new(vec![
            Node::new("n1").with_label("role", "storage"),
            Node::new("n2"),
        ]);
        let mut selector = LabelSelector::everything();
        assert_eq!(inventory.list_nodes(&selector).await.unwrap().len(), 2);

        selector.0.insert("role".to_string(), "storage".to_string());
        let nodes = inventory.list_nodes(&selector).await.unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "n1");
    }

    #[tokio::test]
    async fn test_file_inventory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.json");
        std::fs::write(
            &path,
            r#"[{"name":"n1","addresses":[{"kind":"InternalIP","address":"10.0.0.1"}]},
                {"name":"n2","unschedulable":true,"ready":false}]"#,
        )
        .unwrap();

        let nodes = FileInventory::new(&path)
            .list_nodes(&LabelSelector::everything())
            .await
            .unwrap();
        assert_eq!(nodes.len(), 2);
        assert!(nodes[0].ready);
        assert_eq!(nodes[0].address(), Some("10.0.0.1"));
        assert!(nodes[1].unschedulable);
        assert!(!nodes[1].ready);

        assert!(FileInventory::new(dir.path().join("missing.json"))
            .list_nodes(&LabelSelector::everything())
            .await
            .is_err());
    }
}
