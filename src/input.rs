// Copyright (c) 2021 Allen Wild <allenwild93@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::fs::File;
use std::io;
use std::os::unix::ffi::OsStringExt;
use std::path::{Path, PathBuf};

use libarchive::{ArchiveError, ArchiveReader};

use crate::sniff::{ContainerFormat, TypeSniffer};

/// One entry's path name inside an archive, as the raw bytes stored in it. Names aren't always
/// valid UTF-8, and two names that differ only in their invalid bytes are still different.
pub type ArchivePath = Vec<u8>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ReadError {
    #[error("unrecognized archive: `{}`", .path.display())]
    Unrecognized { path: PathBuf },
    #[error("failed to read {format} archive `{}`: {source}", .path.display())]
    Corrupt { path: PathBuf, format: ContainerFormat, source: ArchiveError },
    #[error("failed to open `{}`: {source}", .path.display())]
    Io { path: PathBuf, source: io::Error },
}

/// Sniff the container format of `path`, then list the path names of every entry in it, in
/// archive order. Files the sniffer doesn't know are handed to libarchive with every format
/// enabled, and only count as unrecognized if libarchive can't place them either.
pub fn read_entries(
    path: &Path,
    sniffer: &dyn TypeSniffer,
) -> Result<Vec<ArchivePath>, ReadError> {
    let io_err = |source| ReadError::Io { path: path.to_owned(), source };

    let format = match sniffer.sniff(path).map_err(io_err)? {
        Some(format) => {
            log::debug!("{}: detected {} container", path.display(), format);
            format
        }
        None => {
            log::debug!("{}: no known signature, trying every libarchive format", path.display());
            ContainerFormat::Auto
        }
    };

    let file = File::open(path).map_err(io_err)?;
    read_container(path, file, format).map_err(|source| {
        if source.is_unrecognized_format() {
            log::debug!("{}: {}", path.display(), source);
            ReadError::Unrecognized { path: path.to_owned() }
        } else {
            ReadError::Corrupt { path: path.to_owned(), format, source }
        }
    })
}

fn read_container(
    path: &Path,
    file: File,
    format: ContainerFormat,
) -> Result<Vec<ArchivePath>, ArchiveError> {
    let mut archive = ArchiveReader::with_support(file, format.formats(), format.filters())?;
    let mut entries = Vec::new();
    loop {
        let entry_path = match archive.read_next_header()? {
            Some(entry) => entry
                .path()
                .ok_or_else(|| ArchiveError::new_custom("read an entry that has no path".into()))?,
            None => break,
        };

        if let Some(warning) = archive.take_warning() {
            log::warn!("{}: {}: {}", path.display(), entry_path.display(), warning);
        }
        entries.push(entry_path.into_os_string().into_vec());
    }

    if log::log_enabled!(log::Level::Debug) {
        log::debug!(
            "{}: {} entries, libarchive format `{}`, filters {}",
            path.display(),
            entries.len(),
            archive.format_name().unwrap_or_default(),
            archive.filter_names().join(" -> "),
        );
    }

    // archive (and the file inside it) is closed here, on the error paths above as well
    Ok(entries)
}
