// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

// CLI entrypoint for callForge.

use callforge::report::format_diagnostic;

fn main() {
    let use_color = std::env::var("NO_COLOR").is_err();
    match callforge::assembler::run() {
        Ok(reports) => {
            for report in reports {
                for diag in &report.warnings {
                    eprintln!(
                        "{}",
                        format_diagnostic(diag, Some(&report.file), &report.source, use_color)
                    );
                }
            }
        }
        Err(err) => {
            eprintln!("{}", err.render(use_color));
            std::process::exit(1);
        }
    }
}
