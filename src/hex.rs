//! Hexadecimal literals of monitor arguments.
//!
//! Every numeric argument the monitor accepts is written as `0x` followed by
//! hexadecimal digits without separators: `0xffffff0000100000` and
//! `0xFFFFFF0000100000` name the same address.

/// Why a token is not a hexadecimal literal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseHexError {
    /// The token does not start with `0x`.
    MissingPrefix,
    /// Nothing follows the prefix.
    Empty,
    /// A character after the prefix is not a hexadecimal digit.
    InvalidDigit(char),
    /// The value does not fit in a machine word.
    Overflow,
}

impl core::fmt::Display for ParseHexError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::MissingPrefix => write!(f, "expected a literal starting with 0x"),
            Self::Empty => write!(f, "no digits after 0x"),
            Self::InvalidDigit(c) => write!(f, "invalid hex digit {c:?}"),
            Self::Overflow => write!(f, "literal does not fit in {} bits", usize::BITS),
        }
    }
}

/// Parses `0x`-prefixed hexadecimal `token` into a machine word.
///
/// Digits are case-insensitive. The token is only borrowed.
pub fn parse_hex(token: &str) -> Result<usize, ParseHexError> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .ok_or(ParseHexError::MissingPrefix)?;
    if digits.is_empty() {
        return Err(ParseHexError::Empty);
    }
    digits.chars().try_fold(0usize, |acc, c| {
        let digit = c.to_digit(16).ok_or(ParseHexError::InvalidDigit(c))?;
        acc.checked_mul(16)
            .and_then(|acc| acc.checked_add(digit as usize))
            .ok_or(ParseHexError::Overflow)
    })
}
