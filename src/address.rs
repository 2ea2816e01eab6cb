//! Provides functions to parse target addresses, CIDRs and address ranges.
//!
//! Parsing is strict and eager, iteration is lazy: a `/8` parses into a
//! single [`TargetSpec`] and only produces addresses as the scanner asks for
//! them. Hostnames are not resolved; a target must be a literal address.
use crate::error::InputError;
use cidr_utils::cidr::IpCidr;
use itertools::Either;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

/// One entry of the target argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetSpec {
    /// `10.0.0.0/24`, `fd00::/120`.
    Cidr(IpCidr),
    /// Inclusive IPv4 range. A single address is a range of one.
    V4Range(Ipv4Addr, Ipv4Addr),
    /// Inclusive IPv6 range.
    V6Range(Ipv6Addr, Ipv6Addr),
}

impl TargetSpec {
    /// Iterates every address covered by this spec in ascending order.
    ///
    /// ```rust
    /// # use conduit::address::TargetSpec;
    /// let spec: TargetSpec = "192.168.0.0/30".parse().unwrap();
    /// assert_eq!(spec.addresses().count(), 4);
    /// ```
    pub fn addresses(&self) -> impl Iterator<Item = IpAddr> + '_ {
        match self {
            Self::Cidr(cidr) => Either::Left(cidr.iter().map(|c| c.address())),
            Self::V4Range(start, end) => Either::Right(Either::Left(
                (u32::from(*start)..=u32::from(*end)).map(|n| IpAddr::V4(Ipv4Addr::from(n))),
            )),
            Self::V6Range(start, end) => Either::Right(Either::Right(
                (u128::from(*start)..=u128::from(*end)).map(|n| IpAddr::V6(Ipv6Addr::from(n))),
            )),
        }
    }
}

impl FromStr for TargetSpec {
    type Err = InputError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();

        if let Ok(ip) = IpAddr::from_str(input) {
            return Ok(match ip {
                IpAddr::V4(v4) => Self::V4Range(v4, v4),
                IpAddr::V6(v6) => Self::V6Range(v6, v6),
            });
        }

        if input.contains('/') {
            return IpCidr::from_str(input)
                .map(Self::Cidr)
                .map_err(|_| InputError::InvalidTarget(input.to_owned()));
        }

        if let Some((start, end)) = input.split_once('-') {
            return parse_range(input, start.trim(), end.trim());
        }

        Err(InputError::InvalidTarget(input.to_owned()))
    }
}

/// Parses `start-end`, where `end` is either a full address of the same
/// family or, for IPv4, just the last octet (`10.0.0.1-50`).
fn parse_range(input: &str, start: &str, end: &str) -> Result<TargetSpec, InputError> {
    let invalid = || InputError::InvalidTarget(input.to_owned());
    let start = IpAddr::from_str(start).map_err(|_| invalid())?;

    let end = match IpAddr::from_str(end) {
        Ok(end) => end,
        Err(_) => match start {
            IpAddr::V4(v4) => {
                let last = end.parse::<u8>().map_err(|_| invalid())?;
                let [a, b, c, _] = v4.octets();
                IpAddr::V4(Ipv4Addr::new(a, b, c, last))
            }
            IpAddr::V6(_) => return Err(invalid()),
        },
    };

    let reversed = || InputError::ReversedRange {
        start: start.to_string(),
        end: end.to_string(),
        range: input.to_owned(),
    };

    match (start, end) {
        (IpAddr::V4(s), IpAddr::V4(e)) if s <= e => Ok(TargetSpec::V4Range(s, e)),
        (IpAddr::V6(s), IpAddr::V6(e)) if s <= e => Ok(TargetSpec::V6Range(s, e)),
        (IpAddr::V4(_), IpAddr::V4(_)) | (IpAddr::V6(_), IpAddr::V6(_)) => Err(reversed()),
        _ => Err(InputError::MixedFamilies(input.to_owned())),
    }
}

/// Parser used by the command line for each comma-separated target.
pub fn parse_target(input: &str) -> Result<TargetSpec, InputError> {
    input.parse()
}

/// Chains the addresses of every spec, in argument order.
pub fn addresses(specs: &[TargetSpec]) -> impl Iterator<Item = IpAddr> + '_ {
    specs.iter().flat_map(TargetSpec::addresses)
}
