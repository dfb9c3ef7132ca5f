use alloy::primitives::Address;
use std::str::FromStr;

/// What the explorer returns from `eth_getCode` for an externally owned account.
pub const EMPTY_CODE: &str = "0x";

/// Clean a hex string by removing "0x" prefix and whitespace
pub fn clean_hex(s: &str) -> &str {
    let s = s.trim();
    if let Some(stripped) = s.strip_prefix("0x") {
        stripped
    } else {
        s
    }
}

/// Parse a JSON-RPC quantity (`"0x10d4f"`) into a block number.
pub fn parse_quantity(s: &str) -> Option<u64> {
    let s = s.trim();
    let digits = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))?;
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

pub fn block_tag(block_number: u64) -> String {
    format!("0x{block_number:x}")
}

/// Canonical 42-char lowercase form, or `None` for anything that is not an address.
pub fn normalize_address(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.len() != 42 {
        return None;
    }
    Address::from_str(trimmed)
        .ok()
        .map(|address| format!("{address:#x}"))
}

pub fn is_empty_code(code: &str) -> bool {
    let code = code.trim();
    code.is_empty() || code == EMPTY_CODE
}

/// Byte length of hex-encoded bytecode, falling back to half the digit count
/// when the payload is not clean hex.
pub fn bytecode_len(code: &str) -> usize {
    let digits = clean_hex(code);
    match hex::decode(digits) {
        Ok(bytes) => bytes.len(),
        Err(_) => digits.len() / 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quantities_require_hex_prefix() {
        assert_eq!(parse_quantity("0x10d4f"), Some(68_943));
        assert_eq!(parse_quantity(" 0x2 "), Some(2));
        assert_eq!(parse_quantity("0x"), None);
        assert_eq!(parse_quantity("12"), None);
        assert_eq!(parse_quantity("0xzz"), None);
        assert_eq!(block_tag(68_943), "0x10d4f");
    }

    #[test]
    fn addresses_are_lowercased_and_validated() {
        assert_eq!(
            normalize_address("0xF75E354C5EDC8EFED9B59EE9F67A80845ADE7D0C").as_deref(),
            Some("0xf75e354c5edc8efed9b59ee9f67a80845ade7d0c")
        );
        assert_eq!(normalize_address("0x1234"), None);
        assert_eq!(normalize_address(""), None);
        assert_eq!(
            normalize_address("0xg75e354c5edc8efed9b59ee9f67a80845ade7d0c"),
            None
        );
    }

    #[test]
    fn empty_code_sentinel() {
        assert!(is_empty_code("0x"));
        assert!(is_empty_code(" 0x\n"));
        assert!(is_empty_code(""));
        assert!(!is_empty_code("0x6080604052"));
        assert_eq!(bytecode_len("0x6080604052"), 5);
        assert_eq!(bytecode_len("0x"), 0);
    }
}
