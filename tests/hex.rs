use kmon::hex::{ParseHexError, parse_hex};

#[test]
fn parses_literals() {
    assert_eq!(parse_hex("0x1A"), Ok(26));
    assert_eq!(parse_hex("0xff"), Ok(255));
    assert_eq!(parse_hex("0x0"), Ok(0));
    assert_eq!(parse_hex("0xffffff0000100000"), Ok(0xffff_ff00_0010_0000));
}

#[test]
fn digits_are_case_insensitive() {
    assert_eq!(parse_hex("0xDeadBeef"), parse_hex("0xdeadbeef"));
    assert_eq!(parse_hex("0XABC"), Ok(0xabc));
}

#[test]
fn leaves_the_token_alone() {
    let token = String::from("0xAbC");
    assert_eq!(parse_hex(&token), Ok(0xabc));
    assert_eq!(token, "0xAbC");
    assert_eq!(parse_hex(&token), Ok(0xabc));
}

#[test]
fn rejects_malformed_literals() {
    assert_eq!(parse_hex("1234"), Err(ParseHexError::MissingPrefix));
    assert_eq!(parse_hex(""), Err(ParseHexError::MissingPrefix));
    assert_eq!(parse_hex("0x"), Err(ParseHexError::Empty));
    assert_eq!(parse_hex("0x12g4"), Err(ParseHexError::InvalidDigit('g')));
    assert_eq!(parse_hex("0x-1"), Err(ParseHexError::InvalidDigit('-')));
}

#[test]
fn rejects_values_wider_than_a_word() {
    assert_eq!(parse_hex("0xffffffffffffffff"), Ok(usize::MAX));
    assert_eq!(parse_hex("0x10000000000000000"), Err(ParseHexError::Overflow));
}
