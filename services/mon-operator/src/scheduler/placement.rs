//! Placement of a single new monitor.

use tracing::{debug, instrument};

use crate::mon::config::MonConfig;

use super::usage::NodeUsage;

/// Pick the node a new monitor should run on.
///
/// A zone holding no monitors at all (counting ones stranded on invalid
/// nodes) beats any zone that holds some. Among candidates in the same
/// class the valid node with the fewest monitors wins, and the first one
/// encountered wins a tie. Returns `None` when no valid node exists.
#[instrument(skip(mon, zones), fields(daemon = %mon.daemon_name, zones = zones.len()))]
pub fn schedule_monitor<'a>(mon: &MonConfig, zones: &'a [Vec<NodeUsage>]) -> Option<&'a NodeUsage> {
    let mut best: Option<(&'a NodeUsage, bool)> = None;

    for zone in zones {
        let zone_count: usize = zone.iter().map(|u| u.mon_count).sum();
        let zone_empty = zone_count == 0;

        for usage in zone.iter().filter(|u| u.mon_valid) {
            let better = match best {
                None => true,
                Some((current, current_empty)) => {
                    (zone_empty && !current_empty)
                        || (zone_empty == current_empty && usage.mon_count < current.mon_count)
                }
            };
            if better {
                best = Some((usage, zone_empty));
            }
        }
    }

    match best {
        Some((usage, zone_empty)) => {
            debug!(node = %usage.node.name, mon_count = usage.mon_count, zone_empty, "Selected node");
            Some(usage)
        }
        None => {
            debug!("No valid node for monitor");
            None
        }
    }
}
