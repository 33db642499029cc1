//! Hex literal to bit sequence helpers.
//!
//! Wire fixtures are often written as hex literals ("0xB1"); these helpers
//! expand them into individual bits, most significant first.

use super::{BoltError, BoltResult};

/// Check for a `0x`/`0X` prefix followed by at least one hex digit.
pub fn is_hex(text: &str) -> bool {
    match strip_prefix(text) {
        Some(digits) => !digits.is_empty() && digits.chars().all(|c| c.is_ascii_hexdigit()),
        None => false,
    }
}

/// Expand each hex digit into 4 bits, most significant bit first.
///
/// `"0x1"` is `[0, 0, 0, 1]`, `"0x1000"` is 16 bits long.
pub fn hex_to_bits(text: &str) -> BoltResult<Vec<u8>> {
    if !is_hex(text) {
        return Err(BoltError::validation(format!(
            "'{}' is not a hex literal",
            text
        )));
    }
    let digits = strip_prefix(text).unwrap_or_default();

    let mut bits = Vec::with_capacity(digits.len() * 4);
    for c in digits.chars() {
        let nibble = c.to_digit(16).unwrap_or_default();
        bits.extend(int_to_bits(u64::from(nibble), 4));
    }
    Ok(bits)
}

/// Binary digits of `value`, most significant first, left padded with
/// zeros to at least `padding` bits.
pub fn int_to_bits(value: u64, padding: usize) -> Vec<u8> {
    let width = (64 - value.leading_zeros() as usize).max(padding).max(1);
    (0..width)
        .rev()
        .map(|shift| if shift < 64 { ((value >> shift) & 1) as u8 } else { 0 })
        .collect()
}

fn strip_prefix(text: &str) -> Option<&str> {
    text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
}
