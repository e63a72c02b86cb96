// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Driver: file handling, the scan loop, finalization, and outputs.

mod cli;

pub use cli::Cli;

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::Path;

use clap::Parser;

use crate::error::{Diagnostic, ScanError};
use crate::report;
use crate::scanner::{LabelMode, Scanner};

/// Result of assembling one source text.
#[derive(Debug)]
pub struct Assembly {
    pub code: Vec<u8>,
    pub warnings: Vec<Diagnostic>,
}

/// Report from one successfully assembled input, with the context
/// needed to render its warnings.
#[derive(Debug)]
pub struct RunReport {
    pub file: String,
    pub source: String,
    pub warnings: Vec<Diagnostic>,
}

/// Categories of driver errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunErrorKind {
    Cli,
    Io,
    Scan,
}

/// Error from a failed run. Scan errors keep the file name and source
/// so `render` can show the offending line.
#[derive(Debug)]
pub struct RunError {
    kind: RunErrorKind,
    message: String,
    scan: Option<ScanError>,
    file: Option<String>,
    source: Option<String>,
}

impl RunError {
    fn cli(message: impl Into<String>) -> Self {
        Self {
            kind: RunErrorKind::Cli,
            message: message.into(),
            scan: None,
            file: None,
            source: None,
        }
    }

    fn io(message: impl Into<String>) -> Self {
        Self {
            kind: RunErrorKind::Io,
            message: message.into(),
            scan: None,
            file: None,
            source: None,
        }
    }

    fn scan(error: ScanError, file: String, source: String) -> Self {
        Self {
            kind: RunErrorKind::Scan,
            message: error.message().to_string(),
            scan: Some(error),
            file: Some(file),
            source: Some(source),
        }
    }

    pub fn kind(&self) -> RunErrorKind {
        self.kind
    }

    /// Render for the terminal, with source context for scan errors.
    pub fn render(&self, use_color: bool) -> String {
        match &self.scan {
            Some(error) => report::format_scan_error(
                error,
                self.file.as_deref(),
                self.source.as_deref().unwrap_or(""),
                use_color,
            ),
            None => format!("ERROR: {}", self.message),
        }
    }
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RunError {}

/// Assemble `source` in one pass plus finalization.
pub fn assemble_source(source: &str, mode: LabelMode) -> Result<Assembly, ScanError> {
    let mut scanner = Scanner::with_mode(source, mode);
    let mut code = Vec::new();
    while scanner.has_remaining() {
        code.push(scanner.next_token()?);
    }
    let warnings = scanner.finalize(&mut code)?;
    Ok(Assembly { code, warnings })
}

/// Render a code image as lowercase hex, two digits per byte.
#[must_use]
pub fn to_hex(code: &[u8]) -> String {
    let mut out = String::with_capacity(code.len() * 2);
    for byte in code {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

/// Entry point for the binary: parse arguments, assemble every input.
pub fn run() -> Result<Vec<RunReport>, RunError> {
    let cli = Cli::parse();
    let mode = validate_cli(&cli)?;

    let mut reports = Vec::new();
    for infile in &cli.infiles {
        reports.push(run_one(&cli, mode, infile)?);
    }
    Ok(reports)
}

fn validate_cli(cli: &Cli) -> Result<LabelMode, RunError> {
    if cli.infiles.len() > 1 {
        let named_output = cli.outfile.is_some()
            || cli.bin_name.as_deref().is_some_and(|name| !name.is_empty())
            || cli.hex_name.as_deref().is_some_and(|name| !name.is_empty());
        if named_output {
            return Err(RunError::cli(
                "With multiple inputs, explicit output names are not allowed",
            ));
        }
    }
    Ok(if cli.lenient {
        LabelMode::Lenient
    } else {
        LabelMode::Strict
    })
}

fn run_one(cli: &Cli, mode: LabelMode, path: &Path) -> Result<RunReport, RunError> {
    let file = path.display().to_string();
    let source = fs::read_to_string(path)
        .map_err(|err| RunError::io(format!("Cannot read {file}: {err}")))?;

    let mut scanner = Scanner::with_mode(&source, mode);
    let mut code = Vec::new();
    while scanner.has_remaining() {
        match scanner.next_token() {
            Ok(byte) => code.push(byte),
            Err(err) => return Err(RunError::scan(err, file.clone(), source.clone())),
        }
    }
    let warnings = match scanner.finalize(&mut code) {
        Ok(warnings) => warnings,
        Err(err) => return Err(RunError::scan(err, file.clone(), source.clone())),
    };

    if cli.dump_symbols {
        scanner
            .labels()
            .dump(io::stderr().lock())
            .map_err(|err| RunError::io(format!("Cannot write label dump: {err}")))?;
    }

    write_outputs(cli, path, &code)?;
    Ok(RunReport {
        file,
        source,
        warnings,
    })
}

fn write_outputs(cli: &Cli, path: &Path, code: &[u8]) -> Result<(), RunError> {
    let base = output_base(cli.outfile.as_deref(), path);
    let mut wrote = false;

    if let Some(name) = &cli.bin_name {
        let out = resolve_output_name(name, &base, "bin");
        fs::write(&out, code).map_err(|err| RunError::io(format!("Cannot write {out}: {err}")))?;
        wrote = true;
    }
    if let Some(name) = &cli.hex_name {
        let out = resolve_output_name(name, &base, "hex");
        let mut text = to_hex(code);
        text.push('\n');
        fs::write(&out, text).map_err(|err| RunError::io(format!("Cannot write {out}: {err}")))?;
        wrote = true;
    }
    if !wrote {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "{}", to_hex(code))
            .map_err(|err| RunError::io(format!("Cannot write to stdout: {err}")))?;
    }
    Ok(())
}

fn output_base(outfile: Option<&str>, path: &Path) -> String {
    match outfile {
        Some(base) => base.to_string(),
        None => path.with_extension("").display().to_string(),
    }
}

fn resolve_output_name(name: &str, base: &str, ext: &str) -> String {
    if name.is_empty() {
        return format!("{base}.{ext}");
    }
    if Path::new(name).extension().is_none() {
        return format!("{name}.{ext}");
    }
    name.to_string()
}
