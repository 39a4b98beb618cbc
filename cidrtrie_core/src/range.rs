//! Contiguous address intervals and offset arithmetic inside them.

use std::net::IpAddr;

use crate::codec::parse_address;
use crate::errors::ParseError;
use crate::helpers::mask;
use crate::types::{AddressValue, Family, Subnet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Range {
    family: Family,
    start: u128,
    end: u128,
    /// `end - start + 1`; wraps to zero only for the whole IPv6 space.
    size: u128,
}

impl Range {
    pub fn new(start: IpAddr, end: IpAddr) -> Result<Self, ParseError> {
        let start = AddressValue::from(start);
        let end = AddressValue::from(end);
        if start.family != end.family {
            return Err(ParseError::FamilyMismatch);
        }
        if start.value >= end.value {
            return Err(ParseError::EmptyRange);
        }
        Ok(Self {
            family: start.family,
            start: start.value,
            end: end.value,
            size: (end.value - start.value).wrapping_add(1),
        })
    }

    pub fn parse(start: &str, end: &str) -> Result<Self, ParseError> {
        let start = parse_address(start)?.to_ip_addr();
        let end = parse_address(end)?.to_ip_addr();
        Self::new(start, end)
    }

    /// Every address a prefix covers. Host prefixes give a one-address range.
    pub fn from_subnet(subnet: &Subnet) -> Self {
        let bits = subnet.family().total_bits();
        let host_bits = !subnet.mask() & mask(bits, bits);
        let end = subnet.network() | host_bits;
        Self {
            family: subnet.family(),
            start: subnet.network(),
            end,
            size: (end - subnet.network()).wrapping_add(1),
        }
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn start(&self) -> IpAddr {
        AddressValue::new(self.start, self.family).to_ip_addr()
    }

    pub fn end(&self) -> IpAddr {
        AddressValue::new(self.end, self.family).to_ip_addr()
    }

    pub fn size(&self) -> u128 {
        self.size
    }

    pub fn contains_value(&self, value: u128) -> bool {
        (self.start..=self.end).contains(&value)
    }

    /// True iff `other` lies wholly inside this range.
    pub fn covers(&self, other: &Range) -> bool {
        self.family == other.family && self.start <= other.start && other.end <= self.end
    }

    pub fn ip_by_offset(&self, offset: u128) -> Option<IpAddr> {
        // a zero size stands for 2^128 addresses, so every offset fits
        if self.size != 0 && offset >= self.size {
            return None;
        }
        Some(AddressValue::new(self.start + offset, self.family).to_ip_addr())
    }

    pub fn ip_by_offset64(&self, offset: u64) -> Option<IpAddr> {
        self.ip_by_offset(u128::from(offset))
    }
}
