// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Minimal-length literal encoders.
//!
//! Each encoder consumes a maximal digit run from the cursor and
//! pushes the operand bytes onto the output stack least significant
//! first, so that LIFO draining emits them big-endian. The returned
//! opcode is sized to the operand. Encodings are minimal: no leading
//! zero byte is ever produced, and the value 0 yields zero operand
//! bytes with the push-0-bytes opcode.

use crate::error::{ScanError, ScanErrorKind};
use crate::opcodes::{self, MAX_PUSH_BYTES};
use crate::scan_stack::ScanStack;
use crate::text_utils::{is_decimal_digit, is_hex_digit, Cursor};

/// Parse a constant at the cursor, dispatching on the `0x` prefix.
pub fn parse_constant<'a>(
    cursor: &mut Cursor<'a>,
    stack: &mut ScanStack<'a>,
) -> Result<u8, ScanError> {
    if cursor.eat_prefix("0x") {
        parse_hex(cursor, stack)
    } else {
        parse_decimal(cursor, stack)
    }
}

/// Encode a run of hex digits (the `0x` prefix already consumed).
pub fn parse_hex<'a>(cursor: &mut Cursor<'a>, stack: &mut ScanStack<'a>) -> Result<u8, ScanError> {
    let start = cursor.pos();
    let digits = cursor.take_run(is_hex_digit);
    if digits.is_empty() {
        return Err(ScanError::new(
            ScanErrorKind::UnexpectedChar,
            "Expected hex digits after 0x",
            start,
        ));
    }
    // Leading zero digits never change the value; dropping them keeps
    // the encoding minimal.
    let digits = digits.trim_start_matches('0').as_bytes();
    let count = digits.len().div_ceil(2);
    if count > MAX_PUSH_BYTES {
        return Err(ScanError::new(
            ScanErrorKind::LiteralTooLong,
            format!("Hex literal does not fit {MAX_PUSH_BYTES} operand bytes"),
            start,
        ));
    }
    // Pair digits from the end of the run backward, least significant
    // byte first; an odd leftover leading digit becomes its own byte.
    let mut end = digits.len();
    while end > 0 {
        if end >= 2 {
            stack.push_token(hex_value(digits[end - 2]) << 4 | hex_value(digits[end - 1]));
            end -= 2;
        } else {
            stack.push_token(hex_value(digits[0]));
            end = 0;
        }
    }
    Ok(opcodes::push_op(count))
}

/// Encode a run of decimal digits as an unsigned integer below 2^256.
///
/// The value accumulates in four little-endian u64 limbs by Horner's
/// method: each digit multiplies the accumulator by 10 and adds in,
/// with carries propagated through `u128` intermediates.
pub fn parse_decimal<'a>(
    cursor: &mut Cursor<'a>,
    stack: &mut ScanStack<'a>,
) -> Result<u8, ScanError> {
    let start = cursor.pos();
    let mut limbs = [0u64; 4];
    while let Some(c) = cursor.peek().filter(|&c| is_decimal_digit(c)) {
        cursor.bump();
        let mut carry = u128::from(c - b'0');
        for limb in &mut limbs {
            let wide = u128::from(*limb) * 10 + carry;
            *limb = wide as u64;
            carry = wide >> 64;
        }
        if carry != 0 {
            return Err(ScanError::new(
                ScanErrorKind::LiteralTooLong,
                "Decimal literal exceeds 256 bits",
                start,
            ));
        }
    }
    // Minimal significant byte count: scan from the most significant
    // byte down for the first nonzero one.
    let mut count = 0;
    for ix in (0..MAX_PUSH_BYTES).rev() {
        if byte_at(&limbs, ix) != 0 {
            count = ix + 1;
            break;
        }
    }
    for ix in 0..count {
        stack.push_token(byte_at(&limbs, ix));
    }
    Ok(opcodes::push_op(count))
}

/// Byte `ix` of the little-endian limb array (0 = least significant).
fn byte_at(limbs: &[u64; 4], ix: usize) -> u8 {
    (limbs[ix / 8] >> ((ix % 8) * 8)) as u8
}

fn hex_value(c: u8) -> u8 {
    match c {
        b'0'..=b'9' => c - b'0',
        b'a'..=b'f' => c - b'a' + 10,
        _ => c - b'A' + 10,
    }
}
