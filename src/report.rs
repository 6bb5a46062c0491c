// Copyright (c) 2021 Allen Wild <allenwild93@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::input::{read_entries, ArchivePath};
use crate::roots::{count_roots, list_roots};
use crate::sniff::TypeSniffer;

#[derive(Debug, Default, Clone, Copy)]
pub struct ReportOptions {
    /// Print the root entries themselves rather than how many there are.
    pub list: bool,
}

/// Tally of a whole run over the input files.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub processed: usize,
    pub failed: usize,
}

impl Summary {
    pub fn exit_code(&self) -> i32 {
        if self.failed == 0 {
            0
        } else {
            1
        }
    }
}

/// Process every file in turn and write its report to `out`. Archives that can't be read are
/// logged and skipped, only a failure to write `out` stops the run.
pub fn report_files<W: Write>(
    out: &mut W,
    files: &[PathBuf],
    sniffer: &dyn TypeSniffer,
    options: ReportOptions,
) -> io::Result<Summary> {
    let mut summary = Summary::default();
    for path in files {
        match read_entries(path, sniffer) {
            Ok(entries) => {
                write_report(out, path, &entries, options)?;
                summary.processed += 1;
            }
            Err(e) => {
                log::error!("{}; skipped", e);
                summary.failed += 1;
            }
        }
    }
    out.flush()?;
    Ok(summary)
}

fn write_report<W: Write>(
    out: &mut W,
    path: &Path,
    entries: &[ArchivePath],
    options: ReportOptions,
) -> io::Result<()> {
    if options.list {
        // root names go out as stored, they aren't necessarily UTF-8
        for root in list_roots(entries) {
            out.write_all(&root)?;
            out.write_all(b"\n")?;
        }
    } else {
        writeln!(out, "{} {}", count_roots(entries), path.display())?;
    }
    Ok(())
}
