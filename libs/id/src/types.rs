//! Typed daemon identifier.

use std::fmt;
use std::str::FromStr;

use crate::name::{index_to_name, name_to_index};
use crate::IdError;

/// Prefix that marks a legacy `mon<N>` identifier.
pub const LEGACY_PREFIX: &str = "mon";

/// A parsed monitor daemon identifier.
///
/// The original spelling is preserved so that legacy daemons keep their
/// names across restarts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DaemonId {
    name: String,
    index: usize,
    legacy: bool,
}

impl DaemonId {
    /// Parses a daemon identifier in either letter or legacy form.
    ///
    /// Anything beginning with `mon` is held to the legacy grammar, so
    /// `mon` and `monx` are rejected rather than read as letters.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }

        if let Some(suffix) = s.strip_prefix(LEGACY_PREFIX) {
            if suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit()) {
                return Err(IdError::InvalidLegacySuffix(s.to_string()));
            }
            let index = suffix
                .parse()
                .map_err(|_| IdError::Overflow(s.to_string()))?;
            return Ok(Self {
                name: s.to_string(),
                index,
                legacy: true,
            });
        }

        let index = name_to_index(s)?;
        Ok(Self {
            name: s.to_string(),
            index,
            legacy: false,
        })
    }

    /// Creates the letter-form identifier for an index.
    #[must_use]
    pub fn from_index(index: usize) -> Self {
        Self {
            name: index_to_name(index),
            index,
            legacy: false,
        }
    }

    /// Returns the identifier as written.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    /// Returns the numeric index.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Returns true for `mon<N>` identifiers.
    #[must_use]
    pub const fn is_legacy(&self) -> bool {
        self.legacy
    }

    /// Returns the moniker used in resource names and host data paths.
    ///
    /// Legacy identifiers are kept verbatim (`mon0`); letter identifiers
    /// gain the `mon-` moniker (`mon-a`).
    pub fn moniker(&self) -> String {
        if self.legacy {
            self.name.clone()
        } else {
            format!("{}-{}", LEGACY_PREFIX, self.name)
        }
    }

    /// Returns the resource name under a prefix: `rook-ceph-mon-a`, or
    /// `rook-ceph-mon0` for legacy identifiers.
    pub fn resource_name(&self, resource_prefix: &str) -> String {
        format!("{}-{}", resource_prefix, self.moniker())
    }
}

impl fmt::Display for DaemonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for DaemonId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl serde::Serialize for DaemonId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.name)
    }
}

impl<'de> serde::Deserialize<'de> for DaemonId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
