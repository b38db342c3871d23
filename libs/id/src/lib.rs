//! # monplane-id
//!
//! Identifier grammar for monitor daemons.
//!
//! ## ID Forms
//!
//! Two naming schemes are in circulation and both must keep working:
//!
//! - Letter form: `a`, `b`, ..., `z`, `aa`, `ab`, ... (bijective base-26)
//! - Legacy form: `mon0`, `mon1`, ... (`mon` followed by decimal digits)
//!
//! Every identifier maps to a numeric index. Letter form `a` is index 0,
//! legacy `mon7` is index 7. New daemons are always issued in letter form
//! from a monotonically increasing index.
//!
//! Resource names prefix the identifier with the cluster's monitor app
//! name (`rook-ceph-mon-a`), except legacy identifiers which already carry
//! the `mon` moniker (`rook-ceph-mon0`).

mod error;
mod name;
mod types;

pub use error::IdError;
pub use name::{full_name_to_index, index_to_name, name_to_index, resource_name};
pub use types::{DaemonId, LEGACY_PREFIX};
