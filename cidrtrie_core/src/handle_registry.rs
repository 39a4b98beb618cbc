use crate::{errors::ErrorCode, SubnetTree};
use dashmap::DashMap;
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle ID type - safer than raw pointers
pub type HandleId = u64;

/// Trees opened over the C ABI carry their tags as metadata.
pub type TaggedTree = SubnetTree<String>;

/// Process-wide table of open trees. Each call locks only its shard.
struct HandleRegistry {
    handles: DashMap<HandleId, TaggedTree>,
    next_id: AtomicU64,
}

impl HandleRegistry {
    fn new() -> Self {
        Self {
            handles: DashMap::new(),
            next_id: AtomicU64::new(1), // Start from 1, reserve 0 for null/invalid
        }
    }

    fn register(&self, tree: TaggedTree) -> HandleId {
        let handle_id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.handles.insert(handle_id, tree);
        handle_id
    }

    fn unregister(&self, handle_id: HandleId) -> Result<(), ErrorCode> {
        if handle_id == 0 {
            return Err(ErrorCode::InvalidHandle);
        }
        self.handles
            .remove(&handle_id)
            .map(|_| ())
            .ok_or(ErrorCode::InvalidHandle)
    }
}

static REGISTRY: Lazy<HandleRegistry> = Lazy::new(HandleRegistry::new);

/// Register a new tree and return its handle ID
pub fn register_handle(tree: TaggedTree) -> HandleId {
    REGISTRY.register(tree)
}

/// Execute a function with a reference to the tree identified by handle_id
pub fn with_handle<T, F>(handle_id: HandleId, f: F) -> Result<T, ErrorCode>
where
    F: FnOnce(&TaggedTree) -> T,
{
    REGISTRY
        .handles
        .get(&handle_id)
        .map(|tree| f(tree.value()))
        .ok_or(ErrorCode::InvalidHandle)
}

/// Execute a function with a mutable reference to the tree identified by handle_id
pub fn with_handle_mut<T, F>(handle_id: HandleId, f: F) -> Result<T, ErrorCode>
where
    F: FnOnce(&mut TaggedTree) -> T,
{
    REGISTRY
        .handles
        .get_mut(&handle_id)
        .map(|mut tree| f(tree.value_mut()))
        .ok_or(ErrorCode::InvalidHandle)
}

/// Unregister and drop a tree
pub fn unregister_handle(handle_id: HandleId) -> Result<(), ErrorCode> {
    REGISTRY.unregister(handle_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_registry() {
        let registry = HandleRegistry::new();

        // Test invalid handle
        assert!(registry.unregister(0).is_err());
        assert!(registry.unregister(999).is_err());

        let id = registry.register(SubnetTree::from_cidr("10.0.0.0/8").unwrap());
        assert_ne!(id, 0);
        assert!(registry.unregister(id).is_ok());
        assert!(registry.unregister(id).is_err());
    }

    #[test]
    fn global_handles_round_trip() {
        let id = register_handle(SubnetTree::from_cidr("10.0.0.0/8").unwrap());
        with_handle_mut(id, |tree| tree.insert_cidr("10.1.0.0/16", None)).unwrap().unwrap();
        let count = with_handle(id, |tree| tree.entry_count()).unwrap();
        assert_eq!(count, 2);
        unregister_handle(id).unwrap();
        assert_eq!(with_handle(id, |_| ()), Err(ErrorCode::InvalidHandle));
    }
}
