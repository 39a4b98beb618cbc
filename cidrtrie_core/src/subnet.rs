//! Prefix relations and bit indexing on `Subnet`.

use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::codec::{format_cidr, mask_of, parse_cidr};
use crate::errors::ParseError;
use crate::helpers::{get_bit, leading_common_bits, mask};
use crate::types::{AddressValue, Family, Subnet};

impl Subnet {
    /// Build a prefix from an address, clearing every bit past `prefix_len`.
    pub fn new(address: AddressValue, prefix_len: u8) -> Result<Self, ParseError> {
        let mask = mask_of(prefix_len, address.family)?;
        Ok(Self {
            family: address.family,
            network: address.value & mask,
            mask,
            prefix_len,
        })
    }

    pub fn parse(cidr: &str) -> Result<Self, ParseError> {
        let (address, prefix_len) = parse_cidr(cidr)?;
        Self::new(address, prefix_len)
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn network(&self) -> u128 {
        self.network
    }

    pub fn mask(&self) -> u128 {
        self.mask
    }

    pub fn prefix_len(&self) -> u8 {
        self.prefix_len
    }

    pub fn version(&self) -> u8 {
        self.family.version()
    }

    pub fn is_ipv6(&self) -> bool {
        self.family == Family::V6
    }

    pub fn is_host_address(&self) -> bool {
        self.prefix_len == self.family.total_bits()
    }

    pub fn network_addr(&self) -> IpAddr {
        AddressValue::new(self.network, self.family).to_ip_addr()
    }

    pub fn to_cidr(&self) -> String {
        format_cidr(AddressValue::new(self.network, self.family), self.prefix_len)
    }

    /// Copy of this prefix shortened (or lengthened) to `prefix_len`.
    pub(crate) fn with_prefix_len(&self, prefix_len: u8) -> Self {
        let mask = mask(prefix_len, self.family.total_bits());
        Self {
            family: self.family,
            network: self.network & mask,
            mask,
            prefix_len,
        }
    }

    pub fn same_subnet(&self, other: &Subnet) -> bool {
        self.family == other.family
            && self.prefix_len == other.prefix_len
            && self.network == other.network
    }

    /// True iff the two address ranges overlap.
    pub fn intersect(&self, other: &Subnet) -> bool {
        self.family == other.family
            && ((self.network & self.mask) == (other.network & self.mask)
                || (self.network & other.mask) == (other.network & self.mask))
    }

    /// True iff `other`'s range lies wholly inside this one (reflexive).
    pub fn contains(&self, other: &Subnet) -> bool {
        self.family == other.family
            && self.prefix_len <= other.prefix_len
            && (other.network & self.mask) == (self.network & self.mask)
    }

    /// Leading bits on which both networks agree. With `clamp`, capped at the
    /// shorter of the two prefix lengths.
    pub fn common_ones(&self, other: &Subnet, clamp: bool) -> u8 {
        let shared = leading_common_bits(self.network, other.network, self.family.total_bits());
        if !clamp {
            return shared;
        }
        shared.min(self.prefix_len).min(other.prefix_len)
    }

    /// 1-based position, from the low end, of the first bit after the prefix.
    /// Zero for host prefixes, which have no branch bit.
    #[inline]
    pub fn branch_position(&self) -> u8 {
        self.family.total_bits() - self.prefix_len
    }

    /// Value of this network's bit at `position` (see `branch_position`).
    #[inline]
    pub(crate) fn bit_value(&self, position: u8) -> usize {
        get_bit(self.network, position) as usize
    }

    /// Child slot `other` falls into below this prefix, if this prefix can
    /// branch at all.
    #[inline]
    pub(crate) fn slot_for(&self, other: &Subnet) -> Option<usize> {
        match self.branch_position() {
            0 => None,
            position => Some(other.bit_value(position)),
        }
    }

    pub fn debug_string(&self) -> String {
        format!(
            "{}\n net= {:b}\n mask={:b}\n ones={}\n",
            self, self.network, self.mask, self.prefix_len
        )
    }
}

impl FromStr for Subnet {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Subnet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.network_addr(), self.prefix_len)
    }
}

/// Free-standing form of [`Subnet::intersect`].
pub fn intersect(a: &Subnet, b: &Subnet) -> bool {
    a.intersect(b)
}

/// Free-standing form of [`Subnet::contains`].
pub fn contains(a: &Subnet, b: &Subnet) -> bool {
    a.contains(b)
}
