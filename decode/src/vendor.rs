// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

// Copyright 2023 Oxide Computer Company

//! Decoding of the vendor identification fields.

use crate::regs::RegInfo;
use media_messages::GARBAGE_CHAR;

/// Byte used to pad fields on the right, besides the ASCII space.
pub const PADDING_CHAR: u8 = 0;

/// Decode a vendor field read from a module.
///
/// Printable fields are ASCII text, left-aligned and padded on the right with
/// spaces or NULs. Any other non-printable byte is replaced with
/// [`GARBAGE_CHAR`], and the padding is then trimmed. The text ends at the
/// first NUL that survives trimming.
///
/// Non-printable fields (the OUI) are formatted as hyphen-separated hex bytes.
pub fn decode_field(raw: &[u8], info: &RegInfo) -> String {
    if !info.printable {
        return format_hex(raw);
    }
    let cleaned: Vec<u8> = raw
        .iter()
        .map(|b| {
            if b.is_ascii_graphic() || *b == b' ' || *b == PADDING_CHAR {
                *b
            } else {
                GARBAGE_CHAR as u8
            }
        })
        .collect();
    let end = cleaned
        .iter()
        .rposition(|b| *b != PADDING_CHAR && *b != b' ')
        .map(|i| i + 1)
        .unwrap_or(0);
    cleaned[..end]
        .iter()
        .take_while(|b| **b != PADDING_CHAR)
        .map(|b| char::from(*b))
        .collect()
}

/// Format bytes as `aa-bb-cc`.
pub fn format_hex(raw: &[u8]) -> String {
    raw.iter()
        .map(|b| format!("{b:02x}"))
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::decode_field;
    use crate::regs::RegInfo;

    const TEXT: RegInfo = RegInfo::printable(0, 17);
    const RAW: RegInfo = RegInfo::new(0, 4);

    #[test]
    fn test_space_padding_is_trimmed() {
        assert_eq!(decode_field(b"ACME            ", &TEXT), "ACME");
        assert_eq!(decode_field(b"ACME\0\0\0\0 \0", &TEXT), "ACME");
        assert_eq!(decode_field(b"                ", &TEXT), "");
    }

    #[test]
    fn test_non_printable_bytes_are_replaced() {
        assert_eq!(decode_field(b"AC\x01ME\x7f   ", &TEXT), "AC?ME?");
        // A trailing garbage byte is not padding.
        assert_eq!(decode_field(b"ACME\xff    ", &TEXT), "ACME?");
    }

    #[test]
    fn test_interior_spaces_kept() {
        assert_eq!(decode_field(b"SOME VENDOR     ", &TEXT), "SOME VENDOR");
    }

    #[test]
    fn test_oui_formatting() {
        assert_eq!(decode_field(&[0x00, 0x02, 0xc9], &RAW), "00-02-c9");
    }
}
