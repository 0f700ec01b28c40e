use std::fmt;
use std::str::FromStr;

use crate::error::{ChunkError, Result};

/// Index of the byte-offset component.
pub const OFFSET_COMPONENT: usize = 3;

/// Minimum number of comma-separated components in an address.
pub const MIN_COMPONENTS: usize = OFFSET_COMPONENT + 1;

/// A transport address such as `"1,0,0,0,80"`.
///
/// Only the byte offset (component 3) is interpreted. Every other component,
/// including the trailing size hint, is carried through verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Address {
    components: Vec<String>,
    offset: u64,
}

impl Address {
    /// Parse an address, validating the offset component.
    pub fn parse(text: &str) -> Result<Self> {
        let components: Vec<String> = text.split(',').map(str::to_string).collect();
        if components.len() < MIN_COMPONENTS {
            return Err(ChunkError::AddressFormat {
                address: text.to_string(),
                reason: format!(
                    "expected at least {MIN_COMPONENTS} components, found {}",
                    components.len()
                ),
            });
        }

        let raw = components[OFFSET_COMPONENT].trim();
        let offset = raw.parse::<u64>().map_err(|_| ChunkError::AddressFormat {
            address: text.to_string(),
            reason: format!("offset component {raw:?} is not a number"),
        })?;

        Ok(Self { components, offset })
    }

    /// The byte offset component.
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// A copy of this address with `delta` bytes added to the offset.
    pub fn with_added_offset(&self, delta: u64) -> Result<Self> {
        let offset = self
            .offset
            .checked_add(delta)
            .ok_or_else(|| ChunkError::AddressFormat {
                address: self.to_string(),
                reason: format!("offset overflows when adding {delta}"),
            })?;
        Ok(Self {
            components: self.components.clone(),
            offset,
        })
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, component) in self.components.iter().enumerate() {
            if index > 0 {
                f.write_str(",")?;
            }
            if index == OFFSET_COMPONENT {
                write!(f, "{}", self.offset)?;
            } else {
                f.write_str(component)?;
            }
        }
        Ok(())
    }
}

impl FromStr for Address {
    type Err = ChunkError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Address of the byte `byte_offset` bytes past `base`.
///
/// An offset of zero returns `base` unchanged.
pub fn calculate_offset_address(base: &str, byte_offset: usize) -> Result<String> {
    if byte_offset == 0 {
        return Ok(base.to_string());
    }
    let shifted = Address::parse(base)?.with_added_offset(byte_offset as u64)?;
    Ok(shifted.to_string())
}
