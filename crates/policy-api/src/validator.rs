//! Request validation

use crate::models::{Destination, IpRange, Policy};
use std::net::IpAddr;
use thiserror::Error;

/// Highest valid port
pub const MAX_PORT: i64 = 65_535;

/// Why a payload was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing policies")]
    Empty,

    #[error("missing source id")]
    MissingSourceId,

    #[error("missing destination id")]
    MissingDestinationId,

    #[error("invalid destination protocol '{0}', specify either udp or tcp")]
    InvalidProtocol(String),

    #[error("invalid port range {start}-{end}, must be between 1-{max}", max = MAX_PORT)]
    InvalidPortRange { start: i64, end: i64 },

    #[error("invalid ip address: {0}")]
    InvalidIp(String),

    #[error("invalid ip range {start}-{end}")]
    InvalidIpRange { start: String, end: String },
}

/// Validates incoming policies
pub trait Validate: Send + Sync {
    /// Reject the whole batch on the first invalid policy
    fn validate_policies(&self, policies: &[Policy]) -> Result<(), ValidationError>;
}

/// Default validator
#[derive(Debug, Default, Clone, Copy)]
pub struct PolicyValidator;

impl Validate for PolicyValidator {
    fn validate_policies(&self, policies: &[Policy]) -> Result<(), ValidationError> {
        if policies.is_empty() {
            return Err(ValidationError::Empty);
        }
        policies.iter().try_for_each(validate_policy)
    }
}

fn validate_policy(policy: &Policy) -> Result<(), ValidationError> {
    if policy.source.id.is_empty() {
        return Err(ValidationError::MissingSourceId);
    }
    validate_destination(&policy.destination)
}

fn validate_destination(destination: &Destination) -> Result<(), ValidationError> {
    if destination.id.is_empty() {
        return Err(ValidationError::MissingDestinationId);
    }

    match destination.protocol.as_str() {
        "tcp" | "udp" => {}
        other => return Err(ValidationError::InvalidProtocol(other.to_string())),
    }

    let ports = destination.ports;
    if ports.start < 1 || ports.end < ports.start || ports.end > MAX_PORT {
        return Err(ValidationError::InvalidPortRange {
            start: ports.start,
            end: ports.end,
        });
    }

    destination.ips.iter().try_for_each(validate_ip_range)
}

fn validate_ip_range(range: &IpRange) -> Result<(), ValidationError> {
    let start = parse_ip(&range.start)?;
    let end = parse_ip(&range.end)?;

    let ordered = match (start, end) {
        (IpAddr::V4(s), IpAddr::V4(e)) => s <= e,
        (IpAddr::V6(s), IpAddr::V6(e)) => s <= e,
        _ => false,
    };
    if !ordered {
        return Err(ValidationError::InvalidIpRange {
            start: range.start.clone(),
            end: range.end.clone(),
        });
    }
    Ok(())
}

fn parse_ip(value: &str) -> Result<IpAddr, ValidationError> {
    value
        .parse()
        .map_err(|_| ValidationError::InvalidIp(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ports, Source};
    use proptest::prelude::*;

    fn valid() -> Policy {
        Policy {
            source: Source {
                id: "app-1".into(),
                ..Default::default()
            },
            destination: Destination {
                id: "app-2".into(),
                protocol: "tcp".into(),
                ports: Ports { start: 8080, end: 8080 },
                ..Default::default()
            },
        }
    }

    fn check(policy: Policy) -> Result<(), ValidationError> {
        PolicyValidator.validate_policies(&[policy])
    }

    #[test]
    fn test_valid_policy() {
        assert_eq!(check(valid()), Ok(()));
    }

    #[test]
    fn test_empty_batch() {
        assert_eq!(PolicyValidator.validate_policies(&[]), Err(ValidationError::Empty));
    }

    #[test]
    fn test_missing_ids() {
        let mut p = valid();
        p.source.id.clear();
        assert_eq!(check(p), Err(ValidationError::MissingSourceId));

        let mut p = valid();
        p.destination.id.clear();
        assert_eq!(check(p), Err(ValidationError::MissingDestinationId));
    }

    #[test]
    fn test_ip_destination_requires_id() {
        let mut p = valid();
        p.destination.id.clear();
        p.destination.group_type = "ip".into();
        p.destination.ips = vec![IpRange {
            start: "10.0.0.1".into(),
            end: "10.0.0.255".into(),
        }];
        assert_eq!(check(p), Err(ValidationError::MissingDestinationId));
    }

    #[test]
    fn test_protocol() {
        let mut p = valid();
        p.destination.protocol = "icmp".into();
        assert_eq!(check(p), Err(ValidationError::InvalidProtocol("icmp".into())));
    }

    #[test]
    fn test_port_bounds() {
        for (start, end) in [(0, 10), (10, 5), (1, 65_536), (-1, 80)] {
            let mut p = valid();
            p.destination.ports = Ports { start, end };
            assert_eq!(check(p), Err(ValidationError::InvalidPortRange { start, end }));
        }
    }

    #[test]
    fn test_ip_ranges() {
        let range = |start: &str, end: &str| {
            let mut p = valid();
            p.destination.ips = vec![IpRange {
                start: start.into(),
                end: end.into(),
            }];
            check(p)
        };

        assert_eq!(range("10.0.0.1", "10.0.0.1"), Ok(()));
        assert_eq!(range("::1", "::ff"), Ok(()));
        assert_eq!(range("bad", "10.0.0.1"), Err(ValidationError::InvalidIp("bad".into())));
        assert!(matches!(range("10.0.0.9", "10.0.0.1"), Err(ValidationError::InvalidIpRange { .. })));
        assert!(matches!(range("10.0.0.1", "::1"), Err(ValidationError::InvalidIpRange { .. })));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ValidationError::InvalidPortRange { start: 0, end: 1 }.to_string(),
            "invalid port range 0-1, must be between 1-65535"
        );
    }

    proptest! {
        #[test]
        fn prop_ordered_ports_accepted(start in 1i64..=MAX_PORT, len in 0i64..1000) {
            let end = (start + len).min(MAX_PORT);
            let mut p = valid();
            p.destination.ports = Ports { start, end };
            prop_assert_eq!(check(p), Ok(()));
        }
    }
}
