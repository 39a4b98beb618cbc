//! Error handling and C-ABI error codes for cidrtrie

use std::cell::RefCell;
use std::os::raw::c_char;

use thiserror::Error;

use crate::types::Family;

/// Rejections raised while turning text into addresses, prefixes and masks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid CIDR notation: {0:?}")]
    InvalidCidr(String),
    #[error("invalid IP address: {0:?}")]
    InvalidAddress(String),
    #[error("prefix length {prefix_len} out of range for {family}")]
    PrefixOutOfRange { prefix_len: u8, family: Family },
    #[error("range endpoints must share a family")]
    FamilyMismatch,
    #[error("range start must be below its end")]
    EmptyRange,
}

/// Errors returned by trie operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("subnet does not intersect the tree")]
    NotIntersecting,
    #[error("subnet already exists")]
    AlreadyExists,
    #[error("subnet prefix is shorter than the node it is inserted into")]
    PrefixTooShort,
    #[error("subnet not found")]
    NotFound,
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    Success = 0,
    NotIntersecting = 1,
    AlreadyExists = 2,
    PrefixTooShort = 3,
    NotFound = 4,
    InvalidPrefix = 5,
    InvalidHandle = 6,
    Utf8Error = 7,
    TagTooLong = 8,
    Unknown = 255,
}

impl ErrorCode {
    /// NUL-terminated description, safe to hand out as a C string.
    pub fn as_cstr(self) -> &'static [u8] {
        match self {
            ErrorCode::Success => b"Success\0",
            ErrorCode::NotIntersecting => b"Subnet does not intersect the tree\0",
            ErrorCode::AlreadyExists => b"Subnet already exists\0",
            ErrorCode::PrefixTooShort => b"Prefix too short\0",
            ErrorCode::NotFound => b"Not found\0",
            ErrorCode::InvalidPrefix => b"Invalid prefix\0",
            ErrorCode::InvalidHandle => b"Invalid handle\0",
            ErrorCode::Utf8Error => b"UTF-8 conversion error\0",
            ErrorCode::TagTooLong => b"Tag too long\0",
            ErrorCode::Unknown => b"Unknown error\0",
        }
    }

    pub fn as_str(self) -> &'static str {
        let bytes = self.as_cstr();
        // every literal above is ASCII
        std::str::from_utf8(&bytes[..bytes.len() - 1]).unwrap_or("Unknown error")
    }
}

// Thread-local last error for C-ABI
thread_local! {
    static LAST_ERROR: RefCell<ErrorCode> = const { RefCell::new(ErrorCode::Success) };
}

pub fn set_last_error(code: ErrorCode) {
    LAST_ERROR.with(|cell| *cell.borrow_mut() = code);
}

pub fn get_last_error() -> ErrorCode {
    LAST_ERROR.with(|cell| *cell.borrow())
}

#[no_mangle]
pub extern "C" fn cidrtrie_last_error() -> ErrorCode {
    get_last_error()
}

#[no_mangle]
pub extern "C" fn cidrtrie_strerror(code: ErrorCode) -> *const c_char {
    code.as_cstr().as_ptr() as *const c_char
}

// Map internal Error to ErrorCode
pub fn map_error(e: &Error) -> ErrorCode {
    match e {
        Error::NotIntersecting => ErrorCode::NotIntersecting,
        Error::AlreadyExists => ErrorCode::AlreadyExists,
        Error::PrefixTooShort => ErrorCode::PrefixTooShort,
        Error::NotFound => ErrorCode::NotFound,
        Error::Parse(_) => ErrorCode::InvalidPrefix,
    }
}
