// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Command-line interface parsing.

use std::path::PathBuf;

use clap::Parser;

pub const VERSION: &str = "1.0";

const LONG_ABOUT: &str = "Assembler for function-call-style stack machine notation.

Source terms are numeric literals (decimal or 0x-prefixed hex, encoded
with the shortest push instruction), lowercase labels (name: defines a
jump destination, a bare name pushes its one-byte offset), and
mnemonic calls like ADD(1,2) whose arguments are emitted in reverse so
the machine stack receives them in call order.

Outputs are opt-in: specify -b/--bin and/or -x/--hex. With neither,
the hex rendering of the code is printed to stdout.
Use -o/--outfile to set the output base name when filenames are
omitted.";

#[derive(Parser, Debug)]
#[command(
    name = "callForge",
    version = VERSION,
    about = "Assembler for function-call-style stack machine notation",
    long_about = LONG_ABOUT
)]
pub struct Cli {
    #[arg(
        short = 'b',
        long = "bin",
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "",
        long_help = "Emit the raw code image. FILE is optional; when omitted, the output base is used and a .bin extension is added."
    )]
    pub bin_name: Option<String>,
    #[arg(
        short = 'x',
        long = "hex",
        value_name = "FILE",
        num_args = 0..=1,
        default_missing_value = "",
        long_help = "Emit the code image as lowercase hex text. FILE is optional; when omitted, the output base is used and a .hex extension is added."
    )]
    pub hex_name: Option<String>,
    #[arg(
        short = 'o',
        long = "outfile",
        value_name = "BASE",
        long_help = "Output filename base when -b/-x omit filenames. Defaults to the input filename without its extension."
    )]
    pub outfile: Option<String>,
    #[arg(
        short = 's',
        long = "symbols",
        help = "Dump the resolved label table to stderr"
    )]
    pub dump_symbols: bool,
    #[arg(
        long = "lenient",
        help = "Warn instead of failing when a label offset exceeds one byte"
    )]
    pub lenient: bool,
    #[arg(value_name = "INFILE", required = true, help = "Assembly source file(s)")]
    pub infiles: Vec<PathBuf>,
}
