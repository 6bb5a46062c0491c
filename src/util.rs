// Copyright (c) 2021 Allen Wild <allenwild93@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::ffi::OsString;
use std::path::PathBuf;

/// Expand shell-style glob patterns in the command line arguments, so that `care '*.zip'` works
/// on shells (or in scripts) that didn't expand it already.
///
/// Each argument becomes its sorted matches. An argument that isn't a valid pattern, isn't
/// UTF-8, or matches nothing is kept as a literal path, so that a typo gets reported as a missing
/// file instead of silently disappearing.
pub fn expand_globs<I>(args: I) -> Vec<PathBuf>
where
    I: IntoIterator<Item = OsString>,
{
    let mut files = Vec::new();
    for arg in args {
        let matches = match arg.to_str() {
            Some(pattern) if is_pattern(pattern) => glob_matches(pattern),
            _ => Vec::new(),
        };
        if matches.is_empty() {
            files.push(PathBuf::from(arg));
        } else {
            files.extend(matches);
        }
    }
    files
}

fn is_pattern(s: &str) -> bool {
    s.contains(|c: char| matches!(c, '*' | '?' | '['))
}

fn glob_matches(pattern: &str) -> Vec<PathBuf> {
    match glob::glob(pattern) {
        Ok(paths) => paths
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    log::warn!("{}", e);
                    None
                }
            })
            .collect(),
        Err(e) => {
            log::debug!("`{}` is not a valid glob pattern ({}), using it literally", pattern, e);
            Vec::new()
        }
    }
}
