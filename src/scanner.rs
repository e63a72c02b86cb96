// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! The scan session: recursive-descent expression scanner, pull-based
//! token iterator, and the label-patching finalizer.
//!
//! One `Scanner` owns everything a scan needs (cursor, output stack,
//! label table, pending-jump queue, program counter), so independent
//! sessions never share state. The caller drives it one byte at a
//! time:
//!
//! ```
//! use callforge::scanner::Scanner;
//!
//! let mut scanner = Scanner::new("loop: COINBASE JUMP(loop)");
//! let mut code = Vec::new();
//! while scanner.has_remaining() {
//!     code.push(scanner.next_token()?);
//! }
//! scanner.finalize(&mut code)?;
//! assert_eq!(code, [0x5b, 0x41, 0x60, 0x00, 0x56]);
//! # Ok::<(), callforge::error::ScanError>(())
//! ```

use crate::error::{Diagnostic, ScanError, ScanErrorKind};
use crate::labels::{LabelTable, LabelTableResult, PendingJump, PendingJumps};
use crate::literal;
use crate::opcodes;
use crate::scan_stack::{LabelKind, LabelRef, ScanStack, StackEntry};
use crate::text_utils::{is_decimal_digit, is_lowercase_letter, is_mnemonic_char, Cursor};

/// Finalization behavior for label offsets past the one-byte address
/// width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelMode {
    /// An offset >= 256 fails the assembly.
    #[default]
    Strict,
    /// An offset >= 256 is reported as a warning and its low byte is
    /// written.
    Lenient,
}

/// One scan session over an in-memory source text.
pub struct Scanner<'a> {
    cursor: Cursor<'a>,
    stack: ScanStack<'a>,
    labels: LabelTable<'a>,
    pending: PendingJumps<'a>,
    /// Tokens emitted so far; the next emission gets this value as
    /// its program counter.
    emitted: u32,
    mode: LabelMode,
}

impl<'a> Scanner<'a> {
    /// Start a strict-mode session at the beginning of `source`.
    #[must_use]
    pub fn new(source: &'a str) -> Self {
        Self::with_mode(source, LabelMode::Strict)
    }

    #[must_use]
    pub fn with_mode(source: &'a str, mode: LabelMode) -> Self {
        Self {
            cursor: Cursor::new(source),
            stack: ScanStack::new(),
            labels: LabelTable::new(),
            pending: PendingJumps::new(),
            emitted: 0,
            mode,
        }
    }

    /// True while significant source text or buffered tokens remain.
    /// Skips trailing waste and comments, so a source ending in either
    /// terminates cleanly.
    pub fn has_remaining(&mut self) -> bool {
        !self.stack.is_empty() || self.cursor.skip_waste().is_some()
    }

    /// Number of tokens emitted so far.
    #[must_use]
    pub fn emitted(&self) -> u32 {
        self.emitted
    }

    /// The label table, populated as destination markers drain.
    #[must_use]
    pub fn labels(&self) -> &LabelTable<'a> {
        &self.labels
    }

    /// Emit the next machine-code byte, refilling the output stack
    /// from the source when it runs empty.
    pub fn next_token(&mut self) -> Result<u8, ScanError> {
        let pc = self.emitted;
        self.emitted += 1;
        if self.stack.is_empty() {
            self.scan_term()?;
        }
        if let Some(label) = self.stack.top_label() {
            self.stack.pop();
            return self.classify_label(label, pc);
        }
        match self.stack.pop() {
            Some(StackEntry::Token(token)) => Ok(token),
            _ => Err(ScanError::new(
                ScanErrorKind::UnexpectedEof,
                "No buffered tokens and no source text remain",
                self.cursor.pos(),
            )),
        }
    }

    /// Patch every pending label use in the emitted `code`. Returns
    /// lenient-mode warnings; strict mode turns them into errors.
    pub fn finalize(&mut self, code: &mut [u8]) -> Result<Vec<Diagnostic>, ScanError> {
        let mut warnings = Vec::new();
        while let Some(jump) = self.pending.pop() {
            let Some(target) = self.labels.resolve(jump.name) else {
                return Err(ScanError::new(
                    ScanErrorKind::UndefinedLabel,
                    format!("Undefined label: {}", jump.name),
                    jump.offset,
                ));
            };
            let slot = code.get_mut(jump.pc as usize).ok_or_else(|| {
                ScanError::new(
                    ScanErrorKind::TruncatedOutput,
                    format!("Jump placeholder at {} is outside the output buffer", jump.pc),
                    jump.offset,
                )
            })?;
            if target >= 256 {
                let message = format!(
                    "Label {} resolves to {}, past the one-byte address range",
                    jump.name, target
                );
                match self.mode {
                    LabelMode::Strict => {
                        return Err(ScanError::new(
                            ScanErrorKind::LabelOutOfRange,
                            message,
                            jump.offset,
                        ))
                    }
                    LabelMode::Lenient => {
                        warnings.push(Diagnostic::warning(message, Some(jump.offset)));
                    }
                }
            }
            *slot = target as u8;
        }
        Ok(warnings)
    }

    fn classify_label(&mut self, label: LabelRef<'a>, pc: u32) -> Result<u8, ScanError> {
        match label.kind {
            LabelKind::Destination => match self.labels.define(label.name, pc) {
                LabelTableResult::Ok => Ok(opcodes::JUMPDEST),
                LabelTableResult::Duplicate => Err(ScanError::new(
                    ScanErrorKind::DuplicateLabel,
                    format!("Label defined twice: {}", label.name),
                    label.offset,
                )),
            },
            LabelKind::Reference => {
                self.pending.push(PendingJump {
                    pc,
                    name: label.name,
                    offset: label.offset,
                });
                Ok(opcodes::STOP)
            }
        }
    }

    /// Parse one term (literal, label, or call) onto the output
    /// stack, returning the number of argument slots its value fills
    /// (a nested call fills as many as its declared return count).
    fn scan_term(&mut self) -> Result<u8, ScanError> {
        let Some(next) = self.cursor.skip_waste() else {
            return Err(ScanError::new(
                ScanErrorKind::UnexpectedEof,
                "Expected an expression",
                self.cursor.pos(),
            ));
        };
        if is_decimal_digit(next) {
            let op = literal::parse_constant(&mut self.cursor, &mut self.stack)?;
            self.stack.push_token(op);
            return Ok(1);
        }
        if is_lowercase_letter(next) {
            self.scan_label();
            return Ok(1);
        }
        self.scan_call()
    }

    /// Parse a label occurrence. A definition pushes only its marker;
    /// a use pushes the marker and then the one-byte push opcode on
    /// top, so the opcode drains before the placeholder byte.
    fn scan_label(&mut self) {
        let offset = self.cursor.pos();
        let name = self.cursor.take_run(is_lowercase_letter);
        if self.cursor.skip_waste() == Some(b':') {
            self.cursor.bump();
            self.stack.push_label(LabelRef {
                name,
                offset,
                kind: LabelKind::Destination,
            });
        } else {
            self.stack.push_label(LabelRef {
                name,
                offset,
                kind: LabelKind::Reference,
            });
            self.stack.push_token(opcodes::PUSH1);
        }
    }

    fn scan_call(&mut self) -> Result<u8, ScanError> {
        let start = self.cursor.pos();
        let mnemonic = self.cursor.take_run(is_mnemonic_char);
        if mnemonic.is_empty() {
            let found = self.cursor.peek().map_or('\u{0}', char::from);
            return Err(ScanError::new(
                ScanErrorKind::UnexpectedChar,
                format!("Expected an expression, found {found:?}"),
                start,
            ));
        }
        let Some(entry) = opcodes::lookup(mnemonic) else {
            return Err(ScanError::new(
                ScanErrorKind::UnknownMnemonic,
                format!("Unknown mnemonic: {mnemonic}"),
                start,
            ));
        };
        self.stack.push_token(entry.opcode);
        if self.cursor.skip_waste() != Some(b'(') {
            // Bare form: the machine operands are expected to be on
            // the stack already.
            return Ok(entry.ret_count);
        }
        self.cursor.bump();
        let mut filled: u8 = 0;
        while filled < entry.arg_count {
            if filled > 0 {
                self.expect(b',')?;
            }
            self.cursor.skip_waste();
            let arg_start = self.cursor.pos();
            let slots = self.scan_term()?;
            if slots == 0 {
                return Err(ScanError::new(
                    ScanErrorKind::VoidArgument,
                    "Argument expression leaves no value on the stack",
                    arg_start,
                ));
            }
            filled = filled.saturating_add(slots);
        }
        self.expect(b')')?;
        Ok(entry.ret_count)
    }

    /// Require the next significant character to be `expected` and
    /// consume it.
    fn expect(&mut self, expected: u8) -> Result<(), ScanError> {
        match self.cursor.skip_waste() {
            Some(c) if c == expected => {
                self.cursor.bump();
                Ok(())
            }
            Some(c) => Err(ScanError::new(
                ScanErrorKind::UnexpectedChar,
                format!(
                    "Expected {:?}, found {:?}",
                    char::from(expected),
                    char::from(c)
                ),
                self.cursor.pos(),
            )),
            None => Err(ScanError::new(
                ScanErrorKind::UnexpectedEof,
                format!("Expected {:?} before end of input", char::from(expected)),
                self.cursor.pos(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opcodes::{JUMPDEST, PUSH1, STOP};

    fn scan(source: &str) -> Vec<u8> {
        let mut scanner = Scanner::new(source);
        let mut code = Vec::new();
        while scanner.has_remaining() {
            code.push(scanner.next_token().expect(source));
        }
        code
    }

    fn assemble(source: &str) -> Vec<u8> {
        let mut scanner = Scanner::new(source);
        let mut code = Vec::new();
        while scanner.has_remaining() {
            code.push(scanner.next_token().expect(source));
        }
        let warnings = scanner.finalize(&mut code).expect(source);
        assert!(warnings.is_empty(), "unexpected warnings for {source}");
        code
    }

    #[test]
    fn arguments_drain_last_first() {
        // ADD(1,2): second argument's push precedes the first's,
        // operator comes last.
        assert_eq!(scan("ADD(1,2)"), [0x60, 0x02, 0x60, 0x01, 0x01]);
    }

    #[test]
    fn nested_calls_flatten_innermost_last_argument_first() {
        // MUL(ADD(1,2),SUB(3,4)) drains as 4, 3, SUB, 2, 1, ADD, MUL.
        assert_eq!(
            scan("MUL(ADD(1,2),SUB(3,4))"),
            [0x60, 0x04, 0x60, 0x03, 0x03, 0x60, 0x02, 0x60, 0x01, 0x01, 0x02]
        );
    }

    #[test]
    fn bare_ops_emit_single_bytes() {
        assert_eq!(scan("CALLER"), [0x33]);
        assert_eq!(scan("CALLER()"), [0x33]);
        assert_eq!(scan("ADD"), [0x01]);
        assert_eq!(scan("STOP"), [0x00]);
    }

    #[test]
    fn literal_terms_stand_alone() {
        assert_eq!(scan("42"), [0x60, 0x2a]);
        assert_eq!(scan("0"), [0x5f]);
        assert_eq!(scan("0x1234"), [0x61, 0x12, 0x34]);
    }

    #[test]
    fn comments_and_waste_are_skipped() {
        let source = "/ doubles the calldata word\n  ADD( 1 , 2 ) / trailing note";
        assert_eq!(scan(source), [0x60, 0x02, 0x60, 0x01, 0x01]);
        assert_eq!(scan("MUL (1,2)"), [0x60, 0x02, 0x60, 0x01, 0x02]);
        assert_eq!(scan(""), []);
        assert_eq!(scan("   \n/ only a comment"), []);
    }

    #[test]
    fn label_definition_emits_jumpdest() {
        let mut scanner = Scanner::new("loop:");
        assert!(scanner.has_remaining());
        assert_eq!(scanner.next_token().unwrap(), JUMPDEST);
        assert!(!scanner.has_remaining());
        assert_eq!(scanner.labels().resolve("loop"), Some(0));
    }

    #[test]
    fn label_use_emits_push_and_placeholder() {
        let mut scanner = Scanner::new("loop: JUMP(loop)");
        let mut code = Vec::new();
        while scanner.has_remaining() {
            code.push(scanner.next_token().unwrap());
        }
        assert_eq!(code, [JUMPDEST, PUSH1, STOP, 0x56]);
        let warnings = scanner.finalize(&mut code).unwrap();
        assert!(warnings.is_empty());
        assert_eq!(code, [JUMPDEST, PUSH1, 0x00, 0x56]);
    }

    #[test]
    fn backward_label_round_trip() {
        assert_eq!(
            assemble("loop: COINBASE JUMP(loop)"),
            [0x5b, 0x41, 0x60, 0x00, 0x56]
        );
    }

    #[test]
    fn forward_label_round_trip() {
        assert_eq!(assemble("JUMP(end) end:"), [0x60, 0x03, 0x56, 0x5b]);
    }

    #[test]
    fn jumpi_with_label_and_condition() {
        // JUMPI(dest, cond): condition drains first, then the push of
        // the destination, then JUMPI itself.
        assert_eq!(
            assemble("dest: JUMPI(dest,1)"),
            [0x5b, 0x60, 0x01, 0x60, 0x00, 0x57]
        );
    }

    #[test]
    fn multi_return_call_fills_extra_argument_slots() {
        // DUP1 returns two values, so ADDMOD(DUP1(5),7) has only one
        // further argument to parse.
        assert_eq!(
            assemble("ADDMOD(DUP1(5),7)"),
            [0x60, 0x07, 0x60, 0x05, 0x80, 0x08]
        );
    }

    #[test]
    fn program_counter_counts_every_emitted_byte() {
        let mut scanner = Scanner::new("ADD(1,2) end:");
        let mut code = Vec::new();
        while scanner.has_remaining() {
            code.push(scanner.next_token().unwrap());
        }
        assert_eq!(scanner.emitted(), code.len() as u32);
        // end: sits after five tokens.
        assert_eq!(scanner.labels().resolve("end"), Some(5));
    }

    #[test]
    fn unknown_mnemonic_is_fatal() {
        let mut scanner = Scanner::new("NOP()");
        assert_eq!(
            scanner.next_token().unwrap_err().kind(),
            ScanErrorKind::UnknownMnemonic
        );
    }

    #[test]
    fn missing_separator_is_fatal() {
        let mut scanner = Scanner::new("ADD(1)");
        let mut err = None;
        while scanner.has_remaining() {
            match scanner.next_token() {
                Ok(_) => {}
                Err(e) => {
                    err = Some(e);
                    break;
                }
            }
        }
        assert_eq!(err.expect("error").kind(), ScanErrorKind::UnexpectedChar);
    }

    #[test]
    fn unclosed_call_is_fatal() {
        let mut scanner = Scanner::new("ADD(1,2");
        assert_eq!(
            scanner.next_token().unwrap_err().kind(),
            ScanErrorKind::UnexpectedEof
        );
    }

    #[test]
    fn void_argument_is_fatal() {
        let mut scanner = Scanner::new("ADD(POP(1),2)");
        assert_eq!(
            scanner.next_token().unwrap_err().kind(),
            ScanErrorKind::VoidArgument
        );
    }

    #[test]
    fn duplicate_label_is_fatal() {
        let mut scanner = Scanner::new("here: here:");
        let mut err = None;
        while scanner.has_remaining() {
            match scanner.next_token() {
                Ok(_) => {}
                Err(e) => {
                    err = Some(e);
                    break;
                }
            }
        }
        assert_eq!(err.expect("error").kind(), ScanErrorKind::DuplicateLabel);
    }

    #[test]
    fn undefined_label_fails_finalization() {
        let mut scanner = Scanner::new("JUMP(nowhere)");
        let mut code = Vec::new();
        while scanner.has_remaining() {
            code.push(scanner.next_token().unwrap());
        }
        assert_eq!(
            scanner.finalize(&mut code).unwrap_err().kind(),
            ScanErrorKind::UndefinedLabel
        );
    }

    #[test]
    fn out_of_range_label_is_strict_error_lenient_warning() {
        let mut source = "COINBASE ".repeat(300);
        source.push_str("far: JUMP(far)");

        let mut scanner = Scanner::new(&source);
        let mut code = Vec::new();
        while scanner.has_remaining() {
            code.push(scanner.next_token().unwrap());
        }
        assert_eq!(
            scanner.finalize(&mut code).unwrap_err().kind(),
            ScanErrorKind::LabelOutOfRange
        );

        let mut scanner = Scanner::with_mode(&source, LabelMode::Lenient);
        let mut code = Vec::new();
        while scanner.has_remaining() {
            code.push(scanner.next_token().unwrap());
        }
        let warnings = scanner.finalize(&mut code).unwrap();
        assert_eq!(warnings.len(), 1);
        // The destination sits at pc 300; its low byte is written.
        assert_eq!(scanner.labels().resolve("far"), Some(300));
        assert_eq!(code[302], (300 % 256) as u8);
    }

    #[test]
    fn finalize_rejects_truncated_buffer() {
        let mut scanner = Scanner::new("end: JUMP(end)");
        let mut code = Vec::new();
        while scanner.has_remaining() {
            code.push(scanner.next_token().unwrap());
        }
        let mut short = code[..2].to_vec();
        assert_eq!(
            scanner.finalize(&mut short).unwrap_err().kind(),
            ScanErrorKind::TruncatedOutput
        );
    }

    #[test]
    fn sessions_are_independent() {
        let mut first = Scanner::new("a: JUMP(a)");
        let mut second = Scanner::new("a: JUMP(a)");
        let mut code = Vec::new();
        while first.has_remaining() {
            code.push(first.next_token().unwrap());
        }
        // The second session has its own label table and queue.
        let mut other = Vec::new();
        while second.has_remaining() {
            other.push(second.next_token().unwrap());
        }
        assert_eq!(code, other);
        assert!(first.finalize(&mut code).unwrap().is_empty());
        assert!(second.finalize(&mut other).unwrap().is_empty());
    }
}
