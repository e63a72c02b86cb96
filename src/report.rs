// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// Reporter for scan errors and diagnostics with source context.

use crate::error::{Diagnostic, ScanError, Severity};

/// Map a byte offset into 1-based line and column numbers.
#[must_use]
pub fn line_col(source: &str, offset: usize) -> (u32, usize) {
    let clamped = offset.min(source.len());
    let mut line: u32 = 1;
    let mut col: usize = 1;
    for &c in &source.as_bytes()[..clamped] {
        if c == b'\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }
    (line, col)
}

/// Format a fatal scan error with its source line and a highlight on
/// the offending column.
pub fn format_scan_error(
    err: &ScanError,
    file: Option<&str>,
    source: &str,
    use_color: bool,
) -> String {
    let (line_num, column) = line_col(source, err.offset());
    let header = match file {
        Some(file) => format!("{file}:{line_num}: ERROR"),
        None => format!("{line_num}: ERROR"),
    };

    let mut out = String::new();
    out.push_str(&header);
    out.push('\n');
    out.push_str(&context_line(source, line_num, column, use_color));
    out.push('\n');
    out.push_str(&format!("ERROR: {}", err.message()));
    out
}

/// Format a non-fatal diagnostic; warnings without a source position
/// render as a bare message.
pub fn format_diagnostic(
    diag: &Diagnostic,
    file: Option<&str>,
    source: &str,
    use_color: bool,
) -> String {
    let sev = match diag.severity {
        Severity::Warning => "WARNING",
        Severity::Error => "ERROR",
    };
    let Some(offset) = diag.offset else {
        return format!("{sev}: {}", diag.message);
    };
    let (line_num, column) = line_col(source, offset);
    let header = match file {
        Some(file) => format!("{file}:{line_num}: {sev}"),
        None => format!("{line_num}: {sev}"),
    };

    let mut out = String::new();
    out.push_str(&header);
    out.push('\n');
    out.push_str(&context_line(source, line_num, column, use_color));
    out.push('\n');
    out.push_str(&format!("{sev}: {}", diag.message));
    out
}

fn context_line(source: &str, line_num: u32, column: usize, use_color: bool) -> String {
    let line_text = source
        .lines()
        .nth(line_num.saturating_sub(1) as usize)
        .unwrap_or("<source unavailable>");
    format!(
        "{:>5} | {}",
        line_num,
        highlight_line(line_text, column, use_color)
    )
}

fn highlight_line(line: &str, column: usize, use_color: bool) -> String {
    if column == 0 {
        return line.to_string();
    }
    let idx = column.saturating_sub(1);
    if idx >= line.len() {
        if use_color {
            return format!("{line}\x1b[31m^\x1b[0m");
        }
        return format!("{line}^");
    }
    let (head, tail) = line.split_at(idx);
    let ch = tail.chars().next().unwrap_or(' ');
    let rest = &tail[ch.len_utf8()..];
    if use_color {
        format!("{head}\x1b[31m{ch}\x1b[0m{rest}")
    } else {
        format!("{head}{ch}{rest}")
    }
}
