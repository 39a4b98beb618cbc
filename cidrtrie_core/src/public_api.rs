use crate::{
    constants::TAG_MAX_LEN,
    errors::{map_error, set_last_error, ErrorCode},
    handle_registry::{register_handle, unregister_handle, with_handle, with_handle_mut, HandleId},
    types::{Family, Match, Subnet},
    SubnetTree,
};
use std::{ffi::CStr, os::raw::c_char};

/// Opaque handle – an id into the process-wide registry, never a pointer.
pub type TreeHandle = HandleId;

/// Match record filled by `cidrtrie_find` / `cidrtrie_lookup`.
#[repr(C)]
pub struct SubnetMatchT {
    pub network_high: u64,
    pub network_low: u64,
    pub prefix_len: u8,
    pub is_ipv6: bool,
    pub has_tag: bool,
    pub tag: [c_char; TAG_MAX_LEN],
}

// ─────────────────────────── helpers ─────────────────────────────────── //

#[inline]
fn cstr<'a>(p: *const c_char) -> Result<&'a str, ErrorCode> {
    if p.is_null() {
        return Err(ErrorCode::Utf8Error);
    }
    unsafe { CStr::from_ptr(p) }
        .to_str()
        .map_err(|_| ErrorCode::Utf8Error)
}

#[inline]
fn write_tag(dst: &mut [c_char; TAG_MAX_LEN], s: &str) {
    dst.iter_mut().for_each(|b| *b = 0);
    // keep the last byte as the terminator
    let n = s.len().min(TAG_MAX_LEN - 1);
    for (d, b) in dst.iter_mut().zip(&s.as_bytes()[..n]) {
        *d = *b as c_char;
    }
}

fn write_match(out: &mut SubnetMatchT, m: &Match<'_>) {
    out.network_high = (m.network >> 64) as u64;
    out.network_low = m.network as u64;
    out.prefix_len = m.prefix_len;
    out.is_ipv6 = m.family == Family::V6;
    out.has_tag = m.tag.is_some();
    write_tag(&mut out.tag, m.tag.unwrap_or(""));
}

#[inline]
fn parse_subnet(p: *const c_char) -> Result<Subnet, ErrorCode> {
    Subnet::parse(cstr(p)?).map_err(|_| ErrorCode::InvalidPrefix)
}

/// Record `code` as the thread's last error and hand it back.
#[inline]
fn report(code: ErrorCode) -> ErrorCode {
    set_last_error(code);
    code
}

// ─── small helper to turn Result<T,ErrorCode> into early-return ──────────
macro_rules! try_c { ($expr:expr) => { match $expr {
    Ok(v)  => v,
    Err(e) => return report(e),
}}}

// ───────────────────────── lifetime ──────────────────────────────────── //

/// Create a tree rooted at `root_cidr`.
/// Returns `Success` **and** stores the handle in `*out`
/// -- or an error code otherwise.
#[no_mangle]
pub extern "C" fn cidrtrie_open(root_cidr: *const c_char, out: *mut TreeHandle) -> ErrorCode {
    if out.is_null() {
        return report(ErrorCode::InvalidHandle);
    }
    let root = try_c!(parse_subnet(root_cidr));
    let handle = register_handle(SubnetTree::new(root));
    unsafe { *out = handle };
    report(ErrorCode::Success)
}

#[no_mangle]
pub extern "C" fn cidrtrie_close(h: TreeHandle) -> ErrorCode {
    match unregister_handle(h) {
        Ok(()) => report(ErrorCode::Success),
        Err(code) => report(code),
    }
}

// ───────────────────────── mutation ──────────────────────────────────── //

#[no_mangle]
pub extern "C" fn cidrtrie_insert(
    h: TreeHandle,
    cidr_utf8: *const c_char,
    tag_utf8: *const c_char, // may be NULL
) -> ErrorCode {
    let subnet = try_c!(parse_subnet(cidr_utf8));
    let tag = if tag_utf8.is_null() {
        None
    } else {
        let tag = try_c!(cstr(tag_utf8));
        if tag.len() >= TAG_MAX_LEN {
            return report(ErrorCode::TagTooLong);
        }
        Some(tag.to_owned())
    };

    match try_c!(with_handle_mut(h, |tree| tree.insert(subnet, tag))) {
        Ok(_) => report(ErrorCode::Success),
        Err(e) => report(map_error(&e)),
    }
}

// ───────────────────────── queries ───────────────────────────────────── //

#[no_mangle]
pub extern "C" fn cidrtrie_find(
    h: TreeHandle,
    cidr_utf8: *const c_char,
    out: *mut SubnetMatchT,
) -> ErrorCode {
    let out = try_c!(unsafe { out.as_mut() }.ok_or(ErrorCode::InvalidHandle));
    let target = try_c!(parse_subnet(cidr_utf8));
    let found = try_c!(with_handle(h, |tree| {
        tree.find(&target).map(|node| write_match(out, &Match::from(node)))
    }));
    match found {
        Ok(()) => report(ErrorCode::Success),
        Err(e) => report(map_error(&e)),
    }
}

/// Longest-prefix match; the root answers when nothing longer covers `cidr`.
#[no_mangle]
pub extern "C" fn cidrtrie_lookup(
    h: TreeHandle,
    cidr_utf8: *const c_char,
    out: *mut SubnetMatchT,
) -> ErrorCode {
    let out = try_c!(unsafe { out.as_mut() }.ok_or(ErrorCode::InvalidHandle));
    let target = try_c!(parse_subnet(cidr_utf8));
    let found = try_c!(with_handle(h, |tree| {
        tree.lookup(&target).map(|node| write_match(out, &Match::from(node)))
    }));
    match found {
        Ok(()) => report(ErrorCode::Success),
        Err(e) => report(map_error(&e)),
    }
}

#[no_mangle]
pub extern "C" fn cidrtrie_len(h: TreeHandle, out: *mut u64) -> ErrorCode {
    let out = try_c!(unsafe { out.as_mut() }.ok_or(ErrorCode::InvalidHandle));
    *out = try_c!(with_handle(h, |tree| tree.entry_count() as u64));
    report(ErrorCode::Success)
}

// ───────────────────── stateless predicates ──────────────────────────── //

#[no_mangle]
pub extern "C" fn cidrtrie_intersect(
    a_utf8: *const c_char,
    b_utf8: *const c_char,
    out: *mut bool,
) -> ErrorCode {
    let out = try_c!(unsafe { out.as_mut() }.ok_or(ErrorCode::InvalidHandle));
    let a = try_c!(parse_subnet(a_utf8));
    let b = try_c!(parse_subnet(b_utf8));
    *out = a.intersect(&b);
    report(ErrorCode::Success)
}

#[no_mangle]
pub extern "C" fn cidrtrie_contains(
    a_utf8: *const c_char,
    b_utf8: *const c_char,
    out: *mut bool,
) -> ErrorCode {
    let out = try_c!(unsafe { out.as_mut() }.ok_or(ErrorCode::InvalidHandle));
    let a = try_c!(parse_subnet(a_utf8));
    let b = try_c!(parse_subnet(b_utf8));
    *out = a.contains(&b);
    report(ErrorCode::Success)
}
