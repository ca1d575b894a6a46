//! Decoders for the controller's numeric replies.
//!
//! The device answers every query with a plain decimal integer. Decoding
//! stops at the first character that cannot extend the number, so an empty
//! or garbled reply reads as zero. A failed exchange must be detected from
//! the transport result, never from the decoded value.

use crate::{MacroResult, MotionEndReason};

pub fn parse_long(reply: &str) -> i64 {
    let text = reply.trim_start();
    let (negative, digits) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };

    let magnitude = digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0i64, |acc, digit| {
            acc.saturating_mul(10)
                .saturating_add(i64::from(digit - b'0'))
        });

    if negative { -magnitude } else { magnitude }
}

pub fn parse_int(reply: &str) -> i32 {
    parse_long(reply).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

pub fn parse_bool(reply: &str) -> bool {
    parse_long(reply) != 0
}

pub fn parse_motion_end_reason(reply: &str) -> MotionEndReason {
    MotionEndReason::from_code(parse_int(reply))
}

pub fn parse_macro_result(reply: &str) -> MacroResult {
    MacroResult::from_code(parse_int(reply))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_and_signed_integers() {
        assert_eq!(parse_long("12345"), 12345);
        assert_eq!(parse_long("-25000"), -25000);
        assert_eq!(parse_long("+7"), 7);
        assert_eq!(parse_long("\r\n  42"), 42);
    }

    #[test]
    fn stops_at_first_non_digit() {
        assert_eq!(parse_long("100\r\n"), 100);
        assert_eq!(parse_long("12abc"), 12);
        assert_eq!(parse_long("3.75"), 3);
    }

    #[test]
    fn malformed_reads_as_zero() {
        assert_eq!(parse_long(""), 0);
        assert_eq!(parse_long("?"), 0);
        assert_eq!(parse_long("-"), 0);
        assert_eq!(parse_int("error"), 0);
        assert!(!parse_bool(""));
    }

    #[test]
    fn overflow_saturates() {
        assert_eq!(parse_long("99999999999999999999999"), i64::MAX);
        assert_eq!(parse_int("4294967296"), i32::MAX);
        assert_eq!(parse_int("-4294967296"), i32::MIN);
    }

    #[test]
    fn typed_replies() {
        assert!(parse_bool("1"));
        assert_eq!(parse_motion_end_reason("3"), MotionEndReason::HardRls);
        assert_eq!(parse_macro_result("0"), MacroResult::Executing);
        assert_eq!(parse_macro_result("6"), MacroResult::FailTooManyFound);
    }
}
