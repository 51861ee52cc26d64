//! Conversion between wire payloads and store policies

use crate::models::{Destination, Policies, Policy, Ports, Source, Tag, Tags};
use crate::validator::{PolicyValidator, Validate, ValidationError};
use policy_store as store;
use thiserror::Error;

/// Mapping failures
#[derive(Error, Debug)]
pub enum MapperError {
    #[error("unmarshal json: {0}")]
    Unmarshal(#[source] serde_json::Error),

    #[error("validate policies: {0}")]
    Validate(#[from] ValidationError),

    #[error("marshal json: {0}")]
    Marshal(#[source] serde_json::Error),
}

/// Parses, validates and renders policy payloads
#[derive(Debug, Clone)]
pub struct PolicyMapper<V = PolicyValidator> {
    validator: V,
}

impl PolicyMapper {
    /// Mapper with the standard validation rules
    pub fn standard() -> Self {
        Self {
            validator: PolicyValidator,
        }
    }
}

impl Default for PolicyMapper {
    fn default() -> Self {
        Self::standard()
    }
}

impl<V: Validate> PolicyMapper<V> {
    /// Mapper using a custom validator
    pub fn new(validator: V) -> Self {
        Self { validator }
    }

    /// Decode a `{"policies": [...]}` body into store policies
    pub fn as_store_policies(&self, bytes: &[u8]) -> Result<Vec<store::Policy>, MapperError> {
        let payload: Policies = serde_json::from_slice(bytes).map_err(MapperError::Unmarshal)?;
        self.validator.validate_policies(&payload.policies)?;
        Ok(payload.policies.iter().map(as_store_policy).collect())
    }

    /// Render store policies as a `{"total_policies": n, "policies": [...]}` body
    pub fn as_bytes(&self, policies: &[store::Policy]) -> Result<Vec<u8>, MapperError> {
        let policies: Vec<Policy> = policies.iter().map(map_store_policy).collect();
        let payload = Policies {
            total_policies: policies.len(),
            policies,
        };
        serde_json::to_vec(&payload).map_err(MapperError::Marshal)
    }

    /// Render stored tags as a `{"tags": [...]}` body
    pub fn tags_as_bytes(&self, tags: &[store::Tag]) -> Result<Vec<u8>, MapperError> {
        let payload = Tags {
            tags: map_store_tags(tags),
        };
        serde_json::to_vec(&payload).map_err(MapperError::Marshal)
    }
}

fn as_store_policy(policy: &Policy) -> store::Policy {
    let ports = policy.destination.ports;
    let start = wire_port(ports.start);
    let end = wire_port(ports.end);
    let port = if start == end { start } else { 0 };

    store::Policy {
        source: store::Source {
            id: policy.source.id.clone(),
            tag: policy.source.tag.clone(),
            group_type: policy.source.group_type.clone(),
        },
        destination: store::Destination {
            id: policy.destination.id.clone(),
            tag: policy.destination.tag.clone(),
            protocol: policy.destination.protocol.clone(),
            port,
            ports: store::Ports { start, end },
            group_type: policy.destination.group_type.clone(),
            ips: policy
                .destination
                .ips
                .first()
                .map(|range| store::IpRange {
                    start: range.start.clone(),
                    end: range.end.clone(),
                })
                .into_iter()
                .collect(),
        },
    }
}

fn map_store_policy(policy: &store::Policy) -> Policy {
    Policy {
        source: Source {
            id: policy.source.id.clone(),
            tag: policy.source.tag.clone(),
            group_type: String::new(),
        },
        destination: Destination {
            id: policy.destination.id.clone(),
            tag: policy.destination.tag.clone(),
            group_type: String::new(),
            protocol: policy.destination.protocol.clone(),
            ports: Ports {
                start: i64::from(policy.destination.ports.start),
                end: i64::from(policy.destination.ports.end),
            },
            ips: Vec::new(),
        },
    }
}

/// Ports are validated before conversion; anything else maps to 0
fn wire_port(value: i64) -> u16 {
    u16::try_from(value).unwrap_or_default()
}

/// Render one stored tag
pub fn map_store_tag(tag: &store::Tag) -> Tag {
    Tag {
        id: tag.id.clone(),
        tag: tag.tag.clone(),
        group_type: tag.group_type.clone(),
    }
}

/// Render stored tags
pub fn map_store_tags(tags: &[store::Tag]) -> Vec<Tag> {
    tags.iter().map(map_store_tag).collect()
}
