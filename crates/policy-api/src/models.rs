//! Wire models
//!
//! JSON shapes exchanged with clients. Store-side types live in
//! `policy_store::models`; the mapper converts between the two.

use serde::{Deserialize, Serialize};

/// Policy list payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policies {
    /// Number of entries in `policies`
    #[serde(default)]
    pub total_policies: usize,
    /// Policies
    #[serde(default)]
    pub policies: Vec<Policy>,
}

/// Policy on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Sending side
    #[serde(default)]
    pub source: Source,
    /// Receiving side
    #[serde(default)]
    pub destination: Destination,
}

/// Policy source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// App or group guid
    #[serde(default)]
    pub id: String,
    /// Hex tag, only present in responses
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
    /// Group type
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub group_type: String,
}

/// Policy destination
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Destination {
    /// App or group guid
    #[serde(default)]
    pub id: String,
    /// Hex tag, only present in responses
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tag: String,
    /// Group type
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub group_type: String,
    /// `tcp` or `udp`
    #[serde(default)]
    pub protocol: String,
    /// Port range
    #[serde(default)]
    pub ports: Ports,
    /// Destination IP ranges
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ips: Vec<IpRange>,
}

/// Inclusive port range. Kept wide so out-of-range values reach validation
/// instead of failing to parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ports {
    /// First port
    #[serde(default)]
    pub start: i64,
    /// Last port
    #[serde(default)]
    pub end: i64,
}

/// Inclusive IP range
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpRange {
    /// First address
    #[serde(default)]
    pub start: String,
    /// Last address
    #[serde(default)]
    pub end: String,
}

/// Tag on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Group guid
    pub id: String,
    /// Hex tag
    pub tag: String,
    /// Group type
    #[serde(rename = "type")]
    pub group_type: String,
}

/// Tag list payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tags {
    /// Tags
    pub tags: Vec<Tag>,
}

/// Egress policy from an app to external IP ranges
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressPolicy {
    /// App guid
    pub source: EgressSource,
    /// External destination
    pub destination: EgressDestination,
}

/// Egress source
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressSource {
    /// App or space guid
    pub id: String,
    /// Group type
    #[serde(rename = "type", default, skip_serializing_if = "String::is_empty")]
    pub group_type: String,
}

/// Egress destination
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EgressDestination {
    /// `tcp`, `udp`, `icmp` or `all`
    pub protocol: String,
    /// Allowed address ranges
    #[serde(default)]
    pub ips: Vec<IpRange>,
}

/// Container-to-container and egress policies submitted together
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyCollection {
    /// App-to-app policies in store form
    pub policies: Vec<policy_store::Policy>,
    /// Egress policies
    pub egress_policies: Vec<EgressPolicy>,
}
