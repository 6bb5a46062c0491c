// Copyright (c) 2021 Allen Wild <allenwild93@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Print every entry path in an archive, followed by the detected format and filters.

use std::env;
use std::fs::File;
use std::process;

use libarchive::ArchiveReader;

fn main() {
    let Some(filename) = env::args_os().nth(1) else {
        eprintln!("usage: basic ARCHIVE");
        process::exit(2);
    };

    let result = File::open(&filename)
        .map_err(|e| e.to_string())
        .and_then(|file| ArchiveReader::new(file).map_err(|e| e.to_string()));
    let mut reader = match result {
        Ok(reader) => reader,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    loop {
        match reader.read_next_header() {
            Ok(Some(entry)) => match entry.path() {
                Some(path) => println!("{}", path.display()),
                None => println!("[entry without a path]"),
            },
            Ok(None) => break,
            Err(e) => {
                eprintln!("Error: {}", e);
                process::exit(1);
            }
        }
    }

    eprintln!(
        "format: {}, filters: {}",
        reader.format_name().unwrap_or_else(|| "unknown".into()),
        reader.filter_names().join(" -> ")
    );
}
