//! Store-level policy and tag model

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};

/// Row id of a slot in the tag pool; doubles as the tag value
pub type SlotId = i64;

/// Row id of a destination
pub type DestinationId = i64;

/// Group type used when a request does not name one
pub const DEFAULT_GROUP_TYPE: &str = "app";

/// Smallest supported tag length in bytes
pub const MIN_TAG_LENGTH: usize = 1;

/// Largest supported tag length in bytes
pub const MAX_TAG_LENGTH: usize = 3;

/// Directed permission from a source group to a destination
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Sending side
    pub source: Source,
    /// Receiving side
    pub destination: Destination,
}

/// Policy source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// External guid
    pub id: String,
    /// Hex tag, filled in on reads
    pub tag: String,
    /// Group type ("app" when empty)
    pub group_type: String,
}

/// Policy destination
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// External guid
    pub id: String,
    /// Hex tag, filled in on reads
    pub tag: String,
    /// Transport protocol
    pub protocol: String,
    /// Legacy single port
    pub port: u16,
    /// Port range
    pub ports: Ports,
    /// Group type ("app" when empty)
    pub group_type: String,
    /// IP ranges; only the first one is persisted
    pub ips: Vec<IpRange>,
}

impl Destination {
    /// Port range with a bare `port` expanded to `port..=port`
    pub fn port_range(&self) -> Ports {
        if self.ports.start == 0 && self.ports.end == 0 && self.port != 0 {
            Ports {
                start: self.port,
                end: self.port,
            }
        } else {
            self.ports
        }
    }

    /// Port stored in the legacy column
    pub fn legacy_port(&self) -> u16 {
        let range = self.port_range();
        if self.port != 0 {
            self.port
        } else if range.start == range.end {
            range.start
        } else {
            0
        }
    }
}

/// Inclusive port range
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ports {
    /// First port
    pub start: u16,
    /// Last port
    pub end: u16,
}

/// Inclusive IP address range
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRange {
    /// First address
    pub start: String,
    /// Last address
    pub end: String,
}

/// Claimed slot rendered for callers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// External guid
    pub id: String,
    /// Hex tag
    pub tag: String,
    /// Group type
    pub group_type: String,
}

/// Validated tag width in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagLength(usize);

impl TagLength {
    /// Validate a configured tag length
    pub fn new(bytes: usize) -> StoreResult<Self> {
        if !(MIN_TAG_LENGTH..=MAX_TAG_LENGTH).contains(&bytes) {
            return Err(StoreError::InvalidTagLength(bytes));
        }
        Ok(Self(bytes))
    }

    /// Width in bytes
    pub fn bytes(&self) -> usize {
        self.0
    }

    /// Number of usable slots; id 0 is reserved
    pub fn pool_size(&self) -> i64 {
        (1i64 << (self.0 * 8)) - 1
    }

    /// Render a slot id as zero-padded upper-case hex
    pub fn format(&self, slot: SlotId) -> String {
        format!("{:0width$X}", slot, width = self.0 * 2)
    }
}

pub(crate) fn group_type_or_default(group_type: &str) -> &str {
    if group_type.is_empty() {
        DEFAULT_GROUP_TYPE
    } else {
        group_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_tag_length_bounds() {
        assert!(TagLength::new(0).is_err());
        assert!(TagLength::new(4).is_err());
        for n in 1..=3 {
            assert_eq!(TagLength::new(n).unwrap().bytes(), n);
        }
    }

    #[test]
    fn test_pool_size() {
        assert_eq!(TagLength::new(1).unwrap().pool_size(), 255);
        assert_eq!(TagLength::new(2).unwrap().pool_size(), 65_535);
        assert_eq!(TagLength::new(3).unwrap().pool_size(), 16_777_215);
    }

    #[test]
    fn test_format_tag() {
        assert_eq!(TagLength::new(1).unwrap().format(1), "01");
        assert_eq!(TagLength::new(1).unwrap().format(255), "FF");
        assert_eq!(TagLength::new(2).unwrap().format(10), "000A");
        assert_eq!(TagLength::new(3).unwrap().format(0xABCDE), "0ABCDE");
    }

    #[test]
    fn test_single_port_expands() {
        let dest = Destination {
            port: 8080,
            ..Default::default()
        };
        assert_eq!(dest.port_range(), Ports { start: 8080, end: 8080 });
        assert_eq!(dest.legacy_port(), 8080);

        let ranged = Destination {
            ports: Ports { start: 7000, end: 8000 },
            ..Default::default()
        };
        assert_eq!(ranged.port_range(), Ports { start: 7000, end: 8000 });
        assert_eq!(ranged.legacy_port(), 0);
    }

    #[test]
    fn test_default_group_type() {
        assert_eq!(group_type_or_default(""), "app");
        assert_eq!(group_type_or_default("ip"), "ip");
    }

    proptest! {
        #[test]
        fn formatted_tag_has_fixed_width(bytes in 1usize..=3, seed in 1i64..i64::MAX) {
            let len = TagLength::new(bytes).unwrap();
            let slot = 1 + seed % len.pool_size();
            let tag = len.format(slot);
            prop_assert_eq!(tag.len(), bytes * 2);
            prop_assert_eq!(i64::from_str_radix(&tag, 16).unwrap(), slot);
            prop_assert!(!tag.chars().any(|c| c.is_ascii_lowercase()));
        }
    }
}
