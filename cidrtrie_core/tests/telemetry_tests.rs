use std::ffi::CStr;
use std::os::raw::{c_char, c_ulonglong};
use std::sync::atomic::{AtomicU64, Ordering};

use cidrtrie_core::{cidrtrie_register_stats_callback, constants, SubnetTree};

static INSERTS: AtomicU64 = AtomicU64::new(0);
static DUMMIES: AtomicU64 = AtomicU64::new(0);

unsafe extern "C" fn collect(name: *const c_char, value: c_ulonglong) {
    let name = unsafe { CStr::from_ptr(name) }.to_str().unwrap_or_default();
    if name == constants::METRIC_INSERTS {
        INSERTS.fetch_add(value, Ordering::SeqCst);
    } else if name == constants::METRIC_DUMMIES {
        DUMMIES.fetch_add(value, Ordering::SeqCst);
    }
}

#[test]
fn registered_callback_sees_tree_activity() {
    unsafe { cidrtrie_register_stats_callback(collect) };

    let mut tree: SubnetTree = SubnetTree::from_cidr("192.168.100.0/24").unwrap();
    for cidr in ["192.168.100.74/32", "192.168.100.10/32"] {
        tree.insert_cidr(cidr, None).unwrap();
    }

    assert_eq!(INSERTS.load(Ordering::SeqCst), 2);
    assert_eq!(DUMMIES.load(Ordering::SeqCst), 1);
}
