pub mod codec;
pub mod constants;
pub mod errors;
pub mod handle_registry;
pub mod helpers;
pub mod public_api;
pub mod range;
pub mod subnet;
pub mod telemetry;
pub mod types;

use constants::*;
use log::{debug, info, trace};
use metrics::{counter, gauge};
use once_cell::sync::OnceCell;
use std::fmt;

pub use errors::{cidrtrie_last_error, cidrtrie_strerror, Error, ErrorCode, ParseError};
pub use range::Range;
pub use subnet::{contains, intersect};
pub use telemetry::cidrtrie_register_stats_callback;
pub use types::{AddressValue, Family, Match, Node, NodeId, Subnet};

// Re-export all public API functions at the crate root
pub use public_api::*;

/// Binary trie of CIDR prefixes below a single root prefix.
///
/// Nodes live in an arena owned by the tree; a node's two child slots and its
/// parent link are arena indices. Branch ("dummy") nodes are synthesized where
/// two inserted prefixes diverge and are never reported as matches.
#[derive(Debug, Clone)]
pub struct SubnetTree<M = String> {
    nodes: Vec<Node<M>>,
}

impl<M> SubnetTree<M> {
    // ---- logging bootstraper -------------------------------------------------
    fn ensure_logging() {
        static INIT: OnceCell<()> = OnceCell::new();
        INIT.get_or_init(|| {
            // Fallback: simple env_logger with RFC‑3339 ts off.
            let _ = env_logger::builder()
                .format_timestamp(None)
                .is_test(std::env::var("RUST_TEST_THREADS").is_ok())
                .try_init();
        });
    }

    pub fn new(root: Subnet) -> Self {
        Self::ensure_logging();
        info!("[OPEN] root={}", root);
        Self {
            nodes: vec![Node::new(root, None, None)],
        }
    }

    pub fn with_root_metadata(root: Subnet, metadata: M) -> Self {
        let mut tree = Self::new(root);
        tree.nodes[ROOT].metadata = Some(metadata);
        tree
    }

    pub fn from_cidr(cidr: &str) -> Result<Self, Error> {
        Ok(Self::new(Subnet::parse(cidr)?))
    }

    pub fn root(&self) -> &Node<M> {
        &self.nodes[ROOT]
    }

    pub fn node(&self, id: NodeId) -> Option<&Node<M>> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut Node<M>> {
        self.nodes.get_mut(id)
    }

    pub fn parent(&self, id: NodeId) -> Option<&Node<M>> {
        self.nodes.get(id)?.parent.map(|p| &self.nodes[p])
    }

    /// Distance from the root, following parent links.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut cursor = self.nodes.get(id).and_then(|n| n.parent);
        while let Some(p) = cursor {
            depth += 1;
            cursor = self.nodes[p].parent;
        }
        depth
    }

    /// All nodes, branch nodes and the root included.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Nodes that stand for a registered prefix (the root included).
    pub fn entry_count(&self) -> usize {
        self.nodes.iter().filter(|n| !n.is_dummy).count()
    }

    /// Depth-first walk over registered prefixes, lower branch first.
    pub fn iter(&self) -> Iter<'_, M> {
        Iter {
            tree: self,
            stack: vec![ROOT],
        }
    }

    pub fn insert_cidr(&mut self, cidr: &str, metadata: Option<M>) -> Result<NodeId, Error> {
        let subnet = Subnet::parse(cidr)?;
        self.insert(subnet, metadata)
    }

    /// Register `subnet` below the root.
    ///
    /// Returns the id of the node now representing `subnet`. On error the tree
    /// is left exactly as it was.
    pub fn insert(&mut self, subnet: Subnet, metadata: Option<M>) -> Result<NodeId, Error> {
        counter!(METRIC_INSERTS).increment(1);
        info!("[INSERT] subnet={}, root={}", subnet, self.nodes[ROOT].subnet);
        let id = self.insert_at(ROOT, subnet, metadata)?;
        gauge!(METRIC_NODES).set(self.nodes.len() as f64);
        Ok(id)
    }

    fn insert_at(
        &mut self,
        mut current: NodeId,
        subnet: Subnet,
        metadata: Option<M>,
    ) -> Result<NodeId, Error> {
        // Every failure below is raised before the first structural change.
        loop {
            let here = self.nodes[current].subnet;
            trace!("[INSERT] At node {}", self.nodes[current]);

            if !here.intersect(&subnet) {
                debug!("[INSERT] {} does not intersect {}", subnet, here);
                return Err(Error::NotIntersecting);
            }

            if subnet.prefix_len == here.prefix_len {
                let node = &mut self.nodes[current];
                if node.is_dummy {
                    debug!("[INSERT] Promoting branch node {}", here);
                    node.is_dummy = false;
                    node.metadata = metadata;
                    return Ok(current);
                }
                debug!("[INSERT] {} already present", subnet);
                return Err(Error::AlreadyExists);
            }

            if subnet.prefix_len < here.prefix_len {
                debug!("[INSERT] {} is shorter than {}", subnet, here);
                return Err(Error::PrefixTooShort);
            }

            // here.prefix_len < subnet.prefix_len, so `here` has a branch bit
            let slot = here.slot_for(&subnet).ok_or(Error::PrefixTooShort)?;

            let existing = match self.nodes[current].children[slot] {
                Some(existing) => existing,
                None => {
                    let id = self.alloc(Node::new(subnet, metadata, Some(current)));
                    self.nodes[current].children[slot] = Some(id);
                    debug!("[INSERT] Attached {} under {} at slot {}", subnet, here, slot);
                    return Ok(id);
                }
            };

            let theirs = self.nodes[existing].subnet;
            let shared = theirs.common_ones(&subnet, false);
            trace!("[INSERT] existing={}, shared={}", theirs, shared);

            // Raw agreement may run past `subnet`'s own length when its host
            // bits happen to match, so a longer existing child also needs a
            // branch point at `subnet`'s length.
            current = if theirs.prefix_len > shared || theirs.prefix_len > subnet.prefix_len {
                self.splice(current, slot, existing, &subnet)
            } else {
                existing
            };
        }
    }

    /// Put a branch node between `parent` and its child `existing`, at the
    /// point where `existing` and `incoming` part ways.
    fn splice(&mut self, parent: NodeId, slot: usize, existing: NodeId, incoming: &Subnet) -> NodeId {
        let theirs = self.nodes[existing].subnet;
        let branch = incoming.with_prefix_len(theirs.common_ones(incoming, true));
        debug_assert!(branch.prefix_len < theirs.prefix_len);
        debug_assert!(branch.prefix_len > self.nodes[parent].subnet.prefix_len);

        let below = theirs.bit_value(branch.branch_position());
        let dummy = self.alloc(Node::dummy(branch, parent));
        self.nodes[dummy].children[below] = Some(existing);
        self.nodes[existing].parent = Some(dummy);
        self.nodes[parent].children[slot] = Some(dummy);

        counter!(METRIC_DUMMIES).increment(1);
        debug!(
            "[SPLICE] Branch {} between {} and {}",
            branch, self.nodes[parent].subnet, theirs
        );
        dummy
    }

    fn alloc(&mut self, node: Node<M>) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// Exact match on network and prefix length. Branch nodes never match.
    pub fn find(&self, target: &Subnet) -> Result<&Node<M>, Error> {
        self.find_id(target).map(|id| &self.nodes[id])
    }

    pub fn find_mut(&mut self, target: &Subnet) -> Result<&mut Node<M>, Error> {
        let id = self.find_id(target)?;
        Ok(&mut self.nodes[id])
    }

    pub fn find_id(&self, target: &Subnet) -> Result<NodeId, Error> {
        counter!(METRIC_FINDS).increment(1);
        if !self.nodes[ROOT].subnet.intersect(target) {
            return Err(Error::NotIntersecting);
        }

        let mut cursor = Some(ROOT);
        while let Some(id) = cursor {
            let node = &self.nodes[id];
            if !node.is_dummy && node.subnet.same_subnet(target) {
                trace!("[FIND] Hit {}", node);
                return Ok(id);
            }
            // children are strictly longer; nothing below can match
            if node.subnet.prefix_len >= target.prefix_len {
                break;
            }
            cursor = node.subnet.slot_for(target).and_then(|slot| node.children[slot]);
        }

        debug!("[FIND] {} not found", target);
        Err(Error::NotFound)
    }

    /// Longest registered prefix containing `target`, falling back to the root.
    pub fn lookup(&self, target: &Subnet) -> Result<&Node<M>, Error> {
        self.lookup_id(target).map(|id| &self.nodes[id])
    }

    pub fn lookup_id(&self, target: &Subnet) -> Result<NodeId, Error> {
        counter!(METRIC_LOOKUPS).increment(1);
        if !self.nodes[ROOT].subnet.intersect(target) {
            return Err(Error::NotIntersecting);
        }

        let mut best = ROOT;
        let mut cursor = ROOT;
        loop {
            let node = &self.nodes[cursor];
            // only a populated slot is ever tested for containment
            let Some(child) = node.subnet.slot_for(target).and_then(|slot| node.children[slot])
            else {
                break;
            };
            let candidate = &self.nodes[child];
            if !candidate.is_dummy && candidate.subnet.contains(target) {
                best = child;
            }
            cursor = child;
        }

        trace!("[LOOKUP] {} -> {}", target, self.nodes[best]);
        Ok(best)
    }

    /// Tree-shaped text dump for diagnostics.
    pub fn render(&self) -> String {
        self.to_string()
    }

    fn fmt_node(&self, id: NodeId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let node = &self.nodes[id];
        write!(f, "{}", node)?;
        let padding = "| ".repeat(self.depth(id) + 1);
        for (bit, child) in node.children.iter().enumerate() {
            if let Some(child) = *child {
                write!(f, "\n{}{} --> ", padding, bit)?;
                self.fmt_node(child, f)?;
            }
        }
        Ok(())
    }
}

impl<M> fmt::Display for SubnetTree<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_node(ROOT, f)
    }
}

pub struct Iter<'a, M> {
    tree: &'a SubnetTree<M>,
    stack: Vec<NodeId>,
}

impl<'a, M> Iterator for Iter<'a, M> {
    type Item = &'a Node<M>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(id) = self.stack.pop() {
            let node = &self.tree.nodes[id];
            self.stack.extend(node.children.iter().rev().flatten());
            if !node.is_dummy {
                return Some(node);
            }
        }
        None
    }
}

impl<'a, M> IntoIterator for &'a SubnetTree<M> {
    type Item = &'a Node<M>;
    type IntoIter = Iter<'a, M>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn net(s: &str) -> Subnet {
        s.parse().unwrap()
    }

    fn scenario_tree() -> SubnetTree<&'static str> {
        let mut tree = SubnetTree::new(net("192.168.100.0/24"));
        tree.insert(net("192.168.100.141/32"), Some("a")).unwrap();
        tree.insert(net("192.168.100.74/32"), Some("b")).unwrap();
        tree.insert(net("192.168.100.10/32"), Some("c")).unwrap();
        tree
    }

    #[test]
    fn find_and_lookup_host_routes() {
        let tree = scenario_tree();

        let hit = tree.find(&net("192.168.100.74/32")).unwrap();
        assert_eq!(hit.subnet().to_cidr(), "192.168.100.74/32");
        assert_eq!(hit.metadata(), Some(&"b"));

        assert_eq!(tree.find(&net("192.168.100.75/32")).unwrap_err(), Error::NotFound);
        let best = tree.lookup(&net("192.168.100.75/32")).unwrap();
        assert_eq!(best.subnet().to_cidr(), "192.168.100.0/24");
    }

    #[test]
    fn splice_builds_branch_at_divergence() {
        let tree = scenario_tree();
        // root, three hosts and one branch for .74/.10
        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.entry_count(), 4);

        let dummy = tree
            .nodes
            .iter()
            .find(|n| n.is_dummy())
            .expect("one branch node");
        assert_eq!(dummy.subnet().to_cidr(), "192.168.100.0/25");
        assert_eq!(tree.find(&net("192.168.100.0/25")).unwrap_err(), Error::NotFound);
    }

    #[test]
    fn lookup_prefers_longer_prefix() {
        let mut tree: SubnetTree = SubnetTree::from_cidr("192.168.100.0/24").unwrap();
        tree.insert_cidr("192.168.100.128/25", Some("upper".into())).unwrap();
        let best = tree.lookup(&net("192.168.100.200/32")).unwrap();
        assert_eq!(best.subnet().to_cidr(), "192.168.100.128/25");
        assert_eq!(best.metadata().map(String::as_str), Some("upper"));
    }

    #[test]
    fn shorter_prefix_than_root_is_rejected() {
        let mut tree: SubnetTree = SubnetTree::from_cidr("192.168.100.0/24").unwrap();
        assert_eq!(
            tree.insert(net("192.168.100.0/16"), None).unwrap_err(),
            Error::PrefixTooShort
        );
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn unrelated_prefix_is_rejected() {
        let mut tree: SubnetTree = SubnetTree::from_cidr("10.0.0.0/8").unwrap();
        assert_eq!(tree.insert(net("11.0.0.0/16"), None).unwrap_err(), Error::NotIntersecting);
        assert_eq!(tree.find(&net("11.0.0.0/16")).unwrap_err(), Error::NotIntersecting);
        assert_eq!(tree.lookup(&net("2001:db8::/32")).unwrap_err(), Error::NotIntersecting);
    }

    #[test]
    fn promotion_attaches_metadata() {
        let mut tree = scenario_tree();
        let id = tree.insert(net("192.168.100.0/25"), Some("promoted")).unwrap();
        let node = tree.node(id).unwrap();
        assert!(!node.is_dummy());
        assert_eq!(node.metadata(), Some(&"promoted"));
        assert_eq!(tree.node_count(), 5);
        assert_eq!(
            tree.lookup(&net("192.168.100.75/32")).unwrap().subnet().to_cidr(),
            "192.168.100.0/25"
        );
    }

    #[test]
    fn shorter_prefix_with_matching_host_bits_goes_above() {
        let mut tree: SubnetTree<u32> = SubnetTree::from_cidr("10.0.0.0/8").unwrap();
        tree.insert(net("10.0.0.0/24"), Some(24)).unwrap();
        tree.insert(net("10.0.0.0/16"), Some(16)).unwrap();

        let sixteen = tree.find_id(&net("10.0.0.0/16")).unwrap();
        let twenty_four = tree.find_id(&net("10.0.0.0/24")).unwrap();
        assert_eq!(tree.node(twenty_four).unwrap().parent(), Some(sixteen));
        assert_eq!(tree.lookup(&net("10.0.1.1/32")).unwrap().metadata(), Some(&16));
        assert_eq!(tree.lookup(&net("10.0.0.1/32")).unwrap().metadata(), Some(&24));
    }

    #[test]
    fn render_indents_by_depth() {
        let tree = scenario_tree();
        let dump = tree.render();
        let expected = "\
192.168.100.0/24 (ones:24,targetPos:8)
| 0 --> 192.168.100.0/25 (ones:25,targetPos:7,isDummy)
| | 0 --> 192.168.100.10/32 (ones:32,targetPos:0)
| | 1 --> 192.168.100.74/32 (ones:32,targetPos:0)
| 1 --> 192.168.100.141/32 (ones:32,targetPos:0)";
        assert_eq!(dump, expected);
        assert_eq!(tree.depth(tree.find_id(&net("192.168.100.10/32")).unwrap()), 2);
    }

    #[test]
    fn iter_skips_branches_in_address_order() {
        let tree = scenario_tree();
        let cidrs: Vec<String> = tree.iter().map(|n| n.subnet().to_cidr()).collect();
        assert_eq!(
            cidrs,
            [
                "192.168.100.0/24",
                "192.168.100.10/32",
                "192.168.100.74/32",
                "192.168.100.141/32"
            ]
        );
    }

    #[test]
    fn root_metadata_is_the_fallback_answer() {
        let mut tree = SubnetTree::with_root_metadata(net("10.0.0.0/8"), "corp");
        tree.insert(net("10.20.0.0/16"), Some("lab")).unwrap();
        assert_eq!(tree.lookup(&net("10.9.9.9/32")).unwrap().metadata(), Some(&"corp"));
        assert_eq!(tree.lookup(&net("10.20.9.9/32")).unwrap().metadata(), Some(&"lab"));
        // a target wider than the root still falls back to it
        assert_eq!(tree.lookup(&net("10.0.0.0/7")).unwrap().metadata(), Some(&"corp"));
    }

    #[test]
    fn wider_target_is_not_answered_by_a_longer_entry() {
        let mut tree: SubnetTree = SubnetTree::from_cidr("10.0.0.0/8").unwrap();
        tree.insert_cidr("10.0.0.0/24", Some("lan".into())).unwrap();
        let best = tree.lookup(&net("10.0.0.0/16")).unwrap();
        assert_eq!(best.subnet().to_cidr(), "10.0.0.0/8");
        let best = tree.lookup(&net("10.0.0.0/25")).unwrap();
        assert_eq!(best.subnet().to_cidr(), "10.0.0.0/24");
    }

    #[test]
    fn ipv6_tree() {
        let mut tree: SubnetTree = SubnetTree::from_cidr("2001:db8::/32").unwrap();
        tree.insert_cidr("2001:db8:1::/48", Some("site".into())).unwrap();
        tree.insert_cidr("2001:db8:1:2::/64", Some("lan".into())).unwrap();
        tree.insert_cidr("2001:db8:ff00::/40", None).unwrap();

        let best = tree.lookup(&net("2001:db8:1:2::99/128")).unwrap();
        assert_eq!(best.subnet().to_cidr(), "2001:db8:1:2::/64");
        let best = tree.lookup(&net("2001:db8:1:3::1/128")).unwrap();
        assert_eq!(best.subnet().to_cidr(), "2001:db8:1::/48");
        assert_eq!(
            tree.insert_cidr("2001:db8:1::/48", None).unwrap_err(),
            Error::AlreadyExists
        );
    }
}
