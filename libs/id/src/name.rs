//! Letter-index alphabet and resource-name helpers.

use crate::IdError;

const ALPHABET_LEN: usize = 26;

/// Convert a numeric index to its letter-form name.
///
/// The encoding is bijective base-26: `0 -> a`, `25 -> z`, `26 -> aa`.
pub fn index_to_name(index: usize) -> String {
    let mut index = index;
    let mut letters = Vec::new();
    loop {
        let digit = index % ALPHABET_LEN;
        letters.push(char::from(b'a' + digit as u8));
        index -= digit;
        if index == 0 {
            break;
        }
        index = index / ALPHABET_LEN - 1;
    }
    letters.iter().rev().collect()
}

/// Convert a letter-form name back to its numeric index.
pub fn name_to_index(name: &str) -> Result<usize, IdError> {
    if name.is_empty() {
        return Err(IdError::Empty);
    }

    let overflow = || IdError::Overflow(name.to_string());

    let mut factor: usize = 1;
    for _ in 1..name.chars().count() {
        factor = factor.checked_mul(ALPHABET_LEN).ok_or_else(overflow)?;
    }

    let mut result: usize = 0;
    for ch in name.chars() {
        if !ch.is_ascii_lowercase() {
            return Err(IdError::InvalidChar {
                ch,
                name: name.to_string(),
            });
        }
        let value = (ch as u8 - b'a') as usize;
        // The least significant letter is 0-based so that `a` and `aa` differ.
        let term = if factor == 1 {
            value
        } else {
            factor.checked_mul(value + 1).ok_or_else(overflow)?
        };
        result = result.checked_add(term).ok_or_else(overflow)?;
        factor /= ALPHABET_LEN;
    }

    Ok(result)
}

/// Build the globally unique resource name for a daemon.
///
/// Names that already start with the app name are returned verbatim.
pub fn resource_name(app_name: &str, name: &str) -> String {
    if name.starts_with(app_name) {
        return name.to_string();
    }
    format!("{}-{}", app_name, name)
}

/// Recover the numeric index from a full resource name.
///
/// `rook-ceph-mon-a` yields 0 and the legacy `rook-ceph-mon123` yields 123.
pub fn full_name_to_index(app_name: &str, name: &str) -> Result<usize, IdError> {
    let prefix = format!("{}-", app_name);
    if let Some(rest) = name.strip_prefix(&prefix) {
        return name_to_index(rest);
    }
    if let Some(rest) = name.strip_prefix(app_name) {
        if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_digit()) {
            return Err(IdError::InvalidLegacySuffix(name.to_string()));
        }
        return rest.parse().map_err(|_| IdError::Overflow(name.to_string()));
    }
    Err(IdError::MissingPrefix {
        expected: app_name.to_string(),
        actual: name.to_string(),
    })
}
