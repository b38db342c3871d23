//! Monitor identity generation.

use std::net::Ipv4Addr;
use std::path::PathBuf;

use monplane_id::DaemonId;
use serde::{Deserialize, Serialize};

use crate::error::{MonError, MonResult};

/// Standard messenger v1 port.
pub const DEFAULT_MSGR1_PORT: u16 = 6789;

/// Base of the deterministic bootstrap address range (`2.4.6.x`).
const BOOTSTRAP_BASE: Ipv4Addr = Ipv4Addr::new(2, 4, 6, 0);

/// On-disk locations of a monitor's data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPathMap {
    /// Host directory, or `None` when data is kept in the container only.
    pub host_data_dir: Option<PathBuf>,
    /// Data directory inside the daemon's container.
    pub container_data_dir: PathBuf,
}

impl DataPathMap {
    fn for_daemon(data_dir_host_path: &str, daemon: &DaemonId) -> Self {
        let host_data_dir = if data_dir_host_path.is_empty() {
            None
        } else {
            Some(
                PathBuf::from(data_dir_host_path)
                    .join(daemon.moniker())
                    .join("data"),
            )
        };
        Self {
            host_data_dir,
            container_data_dir: PathBuf::from(format!("/var/lib/ceph/mon/ceph-{}", daemon)),
        }
    }
}

/// Naming context shared by every identity in one cluster.
#[derive(Debug, Clone)]
pub struct IdentityContext {
    /// Resource name prefix, e.g. `rook-ceph`.
    pub resource_prefix: String,
    /// Host directory under which data directories are derived.
    pub data_dir_host_path: String,
    /// Assign deterministic `2.4.6.x` addresses instead of leaving the
    /// address for placement to resolve.
    pub bootstrap_addresses: bool,
}

impl IdentityContext {
    /// Context for a resource prefix such as `rook-ceph`.
    pub fn new(resource_prefix: &str, data_dir_host_path: impl Into<String>) -> Self {
        Self {
            resource_prefix: resource_prefix.to_string(),
            data_dir_host_path: data_dir_host_path.into(),
            bootstrap_addresses: false,
        }
    }

    /// Builder: enable bootstrap addresses.
    pub fn with_bootstrap_addresses(mut self, enabled: bool) -> Self {
        self.bootstrap_addresses = enabled;
        self
    }
}

/// One monitor daemon's identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonConfig {
    /// Globally unique handle, e.g. `rook-ceph-mon-a`.
    pub resource_name: String,
    /// Short id, e.g. `a` or `mon0`.
    pub daemon_name: DaemonId,
    pub port: u16,
    /// Address (or hostname under host networking). Empty until resolved.
    pub public_ip: String,
    pub data_path_map: DataPathMap,
}

impl MonConfig {
    /// Derive a monitor's identity from its short identifier.
    pub fn generate(id: &str, ctx: &IdentityContext) -> MonResult<Self> {
        let daemon = DaemonId::parse(id).map_err(|source| MonError::InvalidIdentifier {
            id: id.to_string(),
            source,
        })?;
        Ok(Self::for_daemon(daemon, ctx))
    }

    /// Identity for an already-parsed identifier.
    pub fn for_daemon(daemon: DaemonId, ctx: &IdentityContext) -> Self {
        let public_ip = if ctx.bootstrap_addresses {
            bootstrap_address(daemon.index()).to_string()
        } else {
            String::new()
        };
        Self {
            resource_name: daemon.resource_name(&ctx.resource_prefix),
            data_path_map: DataPathMap::for_daemon(&ctx.data_dir_host_path, &daemon),
            daemon_name: daemon,
            port: DEFAULT_MSGR1_PORT,
            public_ip,
        }
    }

    /// The `ip:port` endpoint for this monitor.
    pub fn endpoint(&self) -> String {
        format_endpoint(&self.public_ip, self.port)
    }

    /// Short id as a string.
    pub fn name(&self) -> &str {
        self.daemon_name.as_str()
    }
}

/// Deterministic bootstrap address for an index: `2.4.6.{index + 1}`.
pub fn bootstrap_address(index: usize) -> Ipv4Addr {
    let offset = u32::try_from(index).unwrap_or(u32::MAX).wrapping_add(1);
    Ipv4Addr::from(u32::from(BOOTSTRAP_BASE).wrapping_add(offset))
}

/// Join an address and port, bracketing IPv6 literals.
pub fn format_endpoint(address: &str, port: u16) -> String {
    if address.contains(':') {
        format!("[{}]:{}", address, port)
    } else {
        format!("{}:{}", address, port)
    }
}

/// Split an `ip:port` endpoint.
pub fn parse_endpoint(endpoint: &str) -> Option<(String, u16)> {
    let (host, port) = endpoint.rsplit_once(':')?;
    let port = port.parse().ok()?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    if host.is_empty() {
        return None;
    }
    Some((host.to_string(), port))
}
