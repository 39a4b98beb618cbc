//! Address codec: CIDR text ⇄ (128-bit value, prefix length, family), masks.

use std::net::IpAddr;

use ipnet::IpNet;
use log::trace;

use crate::errors::ParseError;
use crate::helpers::mask;
use crate::types::{AddressValue, Family};

/// Parse `addr/prefix_len` (or a bare address, taken as a host prefix).
///
/// Host bits present in the text are kept in the returned value.
pub fn parse_cidr(text: &str) -> Result<(AddressValue, u8), ParseError> {
    if let Ok(net) = text.parse::<IpNet>() {
        trace!("[CODEC] parsed {text:?} as {net}");
        return Ok((ip_to_int(net.addr()), net.prefix_len()));
    }

    match text.split_once('/') {
        Some((addr, plen)) => {
            let value = parse_address(addr).map_err(|_| ParseError::InvalidCidr(text.to_owned()))?;
            let prefix_len: u8 = plen
                .parse()
                .map_err(|_| ParseError::InvalidCidr(text.to_owned()))?;
            // the address and the number are both fine, so the length is what ipnet refused
            mask_of(prefix_len, value.family)?;
            Err(ParseError::InvalidCidr(text.to_owned()))
        }
        None => {
            let value = parse_address(text)?;
            Ok((value, value.family.total_bits()))
        }
    }
}

pub fn parse_address(text: &str) -> Result<AddressValue, ParseError> {
    text.parse::<IpAddr>()
        .map(ip_to_int)
        .map_err(|_| ParseError::InvalidAddress(text.to_owned()))
}

/// All-ones-then-all-zeros pattern of the family's width.
pub fn mask_of(prefix_len: u8, family: Family) -> Result<u128, ParseError> {
    if prefix_len > family.total_bits() {
        return Err(ParseError::PrefixOutOfRange { prefix_len, family });
    }
    Ok(mask(prefix_len, family.total_bits()))
}

/// Render `value/prefix_len` without clearing host bits.
pub fn format_cidr(value: AddressValue, prefix_len: u8) -> String {
    format!("{}/{}", value.to_ip_addr(), prefix_len)
}

#[inline]
pub fn ip_to_int(ip: IpAddr) -> AddressValue {
    AddressValue::from(ip)
}

/// Decimal rendering of a 128-bit value.
pub fn to_decimal(value: u128) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_to_int_matches_known_values() {
        let table: &[(&str, &str, Family)] = &[
            ("0.0.0.0", "0", Family::V4),
            ("0.0.0.1", "1", Family::V4),
            ("1.1.1.1", "16843009", Family::V4),
            ("10.0.0.0", "167772160", Family::V4),
            ("144.51.10.96", "2419264096", Family::V4),
            ("::", "0", Family::V6),
            ("::1", "1", Family::V6),
            ("fe80:abba:edda:acdc::", "338292008029353851204481704463429533696", Family::V6),
            ("fe80:abba:edda:acdc::1000", "338292008029353851204481704463429537792", Family::V6),
            ("2001:db8::", "42540766411282592856903984951653826560", Family::V6),
            ("2001:4860:4860::8888", "42541956123769884636017138956568135816", Family::V6),
        ];

        for (ip, decimal, family) in table {
            let value = parse_address(ip).unwrap();
            assert_eq!(to_decimal(value.value), *decimal, "{ip}");
            assert_eq!(value.family, *family, "{ip}");
        }
    }

    #[test]
    fn parse_cidr_keeps_host_bits() {
        let (value, plen) = parse_cidr("10.0.1.10/24").unwrap();
        assert_eq!(plen, 24);
        assert_eq!(format_cidr(value, plen), "10.0.1.10/24");
    }

    #[test]
    fn bare_address_is_a_host_prefix() {
        assert_eq!(parse_cidr("10.0.0.5").unwrap().1, 32);
        assert_eq!(parse_cidr("2001:db8::1").unwrap().1, 128);
    }

    #[test]
    fn rejects_malformed_text() {
        assert!(matches!(parse_cidr("10.0.0/8"), Err(ParseError::InvalidCidr(_))));
        assert!(matches!(parse_cidr("10.0.0.0/abc"), Err(ParseError::InvalidCidr(_))));
        assert!(matches!(parse_cidr("not an ip"), Err(ParseError::InvalidAddress(_))));
        assert_eq!(
            parse_cidr("10.0.0.0/33"),
            Err(ParseError::PrefixOutOfRange { prefix_len: 33, family: Family::V4 })
        );
        assert_eq!(
            parse_cidr("2001:db8::/129"),
            Err(ParseError::PrefixOutOfRange { prefix_len: 129, family: Family::V6 })
        );
    }

    #[test]
    fn mask_of_refuses_to_clamp() {
        assert_eq!(mask_of(16, Family::V4), Ok(0xFFFF_0000));
        assert_eq!(mask_of(64, Family::V6), Ok(!0u128 << 64));
        assert!(mask_of(33, Family::V4).is_err());
        assert!(mask_of(129, Family::V6).is_err());
    }
}
