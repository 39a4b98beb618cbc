//! Data structures for the subnet trie

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::constants::{V4_BITS, V6_BITS};
use crate::helpers::{v4_addr, v4_key};

/// Index of a node inside the tree's arena.
pub type NodeId = usize;

/// Address family of a value or prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    #[inline]
    pub const fn total_bits(self) -> u8 {
        match self {
            Family::V4 => V4_BITS,
            Family::V6 => V6_BITS,
        }
    }

    pub const fn version(self) -> u8 {
        match self {
            Family::V4 => 4,
            Family::V6 => 6,
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Family::V4 => f.write_str("IPv4"),
            Family::V6 => f.write_str("IPv6"),
        }
    }
}

/// A 128-bit address value tagged with its family. IPv4 sits in the low 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AddressValue {
    pub value: u128,
    pub family: Family,
}

impl AddressValue {
    pub fn new(value: u128, family: Family) -> Self {
        Self { value, family }
    }

    pub fn to_ip_addr(self) -> IpAddr {
        match self.family {
            Family::V4 => IpAddr::V4(Ipv4Addr::from(v4_addr(self.value))),
            Family::V6 => IpAddr::V6(Ipv6Addr::from(self.value)),
        }
    }
}

impl From<IpAddr> for AddressValue {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => Self::new(v4_key(u32::from(v4)), Family::V4),
            IpAddr::V6(v6) => Self::new(u128::from(v6), Family::V6),
        }
    }
}

/// A CIDR prefix: network value, cached mask and prefix length.
///
/// `network` never carries bits beyond `prefix_len`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subnet {
    pub(crate) family: Family,
    pub(crate) network: u128,
    pub(crate) mask: u128,
    pub(crate) prefix_len: u8,
}

/// Trie node stored in the tree's arena.
#[derive(Debug, Clone)]
pub struct Node<M> {
    pub(crate) subnet: Subnet,
    pub(crate) is_dummy: bool,
    pub(crate) metadata: Option<M>,
    /// Back-reference for depth computation only.
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: [Option<NodeId>; 2],
}

impl<M> Node<M> {
    pub(crate) fn new(subnet: Subnet, metadata: Option<M>, parent: Option<NodeId>) -> Self {
        Self {
            subnet,
            is_dummy: false,
            metadata,
            parent,
            children: [None, None],
        }
    }

    pub(crate) fn dummy(subnet: Subnet, parent: NodeId) -> Self {
        Self {
            subnet,
            is_dummy: true,
            metadata: None,
            parent: Some(parent),
            children: [None, None],
        }
    }

    pub fn subnet(&self) -> &Subnet {
        &self.subnet
    }

    pub fn is_dummy(&self) -> bool {
        self.is_dummy
    }

    pub fn metadata(&self) -> Option<&M> {
        self.metadata.as_ref()
    }

    pub fn set_metadata(&mut self, metadata: Option<M>) -> Option<M> {
        std::mem::replace(&mut self.metadata, metadata)
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn children(&self) -> [Option<NodeId>; 2] {
        self.children
    }
}

impl<M> fmt::Display for Node<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (ones:{},targetPos:{}{})",
            self.subnet,
            self.subnet.prefix_len,
            self.subnet.branch_position(),
            if self.is_dummy { ",isDummy" } else { "" }
        )
    }
}

/// Flattened view of a matched node, as handed across the C ABI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match<'a> {
    pub network: u128,
    pub prefix_len: u8,
    pub family: Family,
    pub tag: Option<&'a str>,
}

impl<'a, M: AsRef<str>> From<&'a Node<M>> for Match<'a> {
    fn from(node: &'a Node<M>) -> Self {
        Self {
            network: node.subnet.network,
            prefix_len: node.subnet.prefix_len,
            family: node.subnet.family,
            tag: node.metadata.as_ref().map(AsRef::as_ref),
        }
    }
}
