// Copyright (c) 2021 Allen Wild <allenwild93@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Guess an archive's container format, either from its leading bytes or from its file name.

use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use libarchive::{Filter, Format};

/// Compression wrapped around an archive stream, as opposed to per-entry compression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    Zip,
    Tar,
    SevenZip,
    Rar,
    Cpio,
    /// A compressed stream. Whatever archive format libarchive finds inside is accepted, which
    /// covers tar.gz, cpio.xz and friends.
    Compressed(Compression),
    /// Nothing recognized the file up front. libarchive gets to try every format and filter it
    /// was built with (ar, iso9660, xar, cab, lz4, ...).
    Auto,
}

impl ContainerFormat {
    /// The libarchive formats to enable when opening this container.
    pub fn formats(self) -> &'static [Format] {
        match self {
            ContainerFormat::Zip => &[Format::Zip],
            ContainerFormat::Tar => &[Format::Tar],
            ContainerFormat::SevenZip => &[Format::SevenZip],
            ContainerFormat::Rar => &[Format::Rar, Format::Rar5],
            ContainerFormat::Cpio => &[Format::Cpio],
            ContainerFormat::Compressed(_) | ContainerFormat::Auto => &[Format::All],
        }
    }

    /// The libarchive filters to enable when opening this container.
    pub fn filters(self) -> &'static [Filter] {
        match self {
            ContainerFormat::Compressed(Compression::Gzip) => &[Filter::Gzip],
            ContainerFormat::Compressed(Compression::Bzip2) => &[Filter::Bzip2],
            ContainerFormat::Compressed(Compression::Xz) => &[Filter::Xz],
            ContainerFormat::Compressed(Compression::Zstd) => &[Filter::Zstd],
            ContainerFormat::Auto => &[Filter::All],
            _ => &[],
        }
    }
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ContainerFormat::Zip => "zip",
            ContainerFormat::Tar => "tar",
            ContainerFormat::SevenZip => "7z",
            ContainerFormat::Rar => "rar",
            ContainerFormat::Cpio => "cpio",
            ContainerFormat::Compressed(Compression::Gzip) => "gzip",
            ContainerFormat::Compressed(Compression::Bzip2) => "bzip2",
            ContainerFormat::Compressed(Compression::Xz) => "xz",
            ContainerFormat::Compressed(Compression::Zstd) => "zstd",
            ContainerFormat::Auto => "auto-detected",
        };
        f.write_str(name)
    }
}

pub trait TypeSniffer {
    /// Guess the container format of the file at `path`. Return Ok(None) when the file isn't
    /// recognized, and Err(...) only when it couldn't be inspected at all.
    fn sniff(&self, path: &Path) -> io::Result<Option<ContainerFormat>>;
}

/// Identifies archives by the magic numbers in their first few hundred bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct MagicSniffer;

impl MagicSniffer {
    /// Enough to cover a whole tar header block.
    pub const SNIFF_LEN: usize = 512;

    /// Identify a container from a buffer holding the start of a file. `head` may be shorter
    /// than SNIFF_LEN if the file is.
    pub fn detect(head: &[u8]) -> Option<ContainerFormat> {
        const CPIO_ASCII: [&[u8]; 3] = [b"070701", b"070702", b"070707"];

        let format = match head {
            [b'P', b'K', 3, 4, ..] | [b'P', b'K', 5, 6, ..] | [b'P', b'K', 7, 8, ..] => {
                ContainerFormat::Zip
            }
            [0x1f, 0x8b, ..] => ContainerFormat::Compressed(Compression::Gzip),
            [b'B', b'Z', b'h', ..] => ContainerFormat::Compressed(Compression::Bzip2),
            [0xfd, b'7', b'z', b'X', b'Z', 0, ..] => ContainerFormat::Compressed(Compression::Xz),
            [0x28, 0xb5, 0x2f, 0xfd, ..] => ContainerFormat::Compressed(Compression::Zstd),
            [b'7', b'z', 0xbc, 0xaf, 0x27, 0x1c, ..] => ContainerFormat::SevenZip,
            [b'R', b'a', b'r', b'!', 0x1a, 0x07, ..] => ContainerFormat::Rar,
            [0xc7, 0x71, ..] | [0x71, 0xc7, ..] => ContainerFormat::Cpio,
            _ if CPIO_ASCII.iter().any(|magic| head.starts_with(magic)) => ContainerFormat::Cpio,
            _ if is_tar_header(head) => ContainerFormat::Tar,
            _ => return None,
        };
        Some(format)
    }
}

impl TypeSniffer for MagicSniffer {
    fn sniff(&self, path: &Path) -> io::Result<Option<ContainerFormat>> {
        let mut head = Vec::with_capacity(Self::SNIFF_LEN);
        File::open(path)?.take(Self::SNIFF_LEN as u64).read_to_end(&mut head)?;
        Ok(Self::detect(&head))
    }
}

/// POSIX and GNU tar headers carry "ustar" at offset 257. Older v7 headers have no magic at all,
/// so fall back to checking the header checksum.
fn is_tar_header(head: &[u8]) -> bool {
    if head.len() < MagicSniffer::SNIFF_LEN {
        return false;
    }
    if &head[257..262] == b"ustar" {
        return true;
    }

    // the checksum field is 8 bytes at offset 148: octal digits, terminated by NUL or space
    let field = &head[148..156];
    let digits = field
        .iter()
        .skip_while(|&&b| b == b' ')
        .take_while(|&&b| (b'0'..=b'7').contains(&b));
    let mut stored = 0u32;
    let mut ndigits = 0;
    for &b in digits {
        stored = stored * 8 + u32::from(b - b'0');
        ndigits += 1;
    }
    if ndigits == 0 {
        return false;
    }

    // the checksum is computed with the checksum field itself treated as eight spaces
    let actual: u32 = head[..512]
        .iter()
        .enumerate()
        .map(|(i, &b)| if (148..156).contains(&i) { u32::from(b' ') } else { u32::from(b) })
        .sum();
    // an all-zero block would "match" with a stored checksum of 256, but isn't a header
    actual == stored && head[0] != 0
}

/// Identifies archives by file name suffix alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtensionSniffer;

impl ExtensionSniffer {
    /// Longest suffixes first, so ".tar.gz" wins over a hypothetical ".gz".
    const SUFFIXES: &'static [(&'static str, ContainerFormat)] = &[
        (".tar.gz", ContainerFormat::Compressed(Compression::Gzip)),
        (".tar.bz2", ContainerFormat::Compressed(Compression::Bzip2)),
        (".tar.xz", ContainerFormat::Compressed(Compression::Xz)),
        (".tar.zst", ContainerFormat::Compressed(Compression::Zstd)),
        (".tgz", ContainerFormat::Compressed(Compression::Gzip)),
        (".tbz2", ContainerFormat::Compressed(Compression::Bzip2)),
        (".tbz", ContainerFormat::Compressed(Compression::Bzip2)),
        (".txz", ContainerFormat::Compressed(Compression::Xz)),
        (".tzst", ContainerFormat::Compressed(Compression::Zstd)),
        (".zip", ContainerFormat::Zip),
        (".tar", ContainerFormat::Tar),
        (".7z", ContainerFormat::SevenZip),
        (".rar", ContainerFormat::Rar),
        (".cpio", ContainerFormat::Cpio),
    ];

    pub fn detect(path: &Path) -> Option<ContainerFormat> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();
        Self::SUFFIXES
            .iter()
            .find(|(suffix, _)| name.len() > suffix.len() && name.ends_with(suffix))
            .map(|&(_, format)| format)
    }
}

impl TypeSniffer for ExtensionSniffer {
    fn sniff(&self, path: &Path) -> io::Result<Option<ContainerFormat>> {
        Ok(Self::detect(path))
    }
}

/// Ask each sniffer in turn, returning the first answer.
#[derive(Default)]
pub struct SnifferChain(Vec<Box<dyn TypeSniffer>>);

impl SnifferChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sniffer: impl TypeSniffer + 'static) -> Self {
        self.0.push(Box::new(sniffer));
        self
    }

    /// Content sniffing with an extension fallback, or the extension alone when `content` is
    /// false.
    pub fn standard(content: bool) -> Self {
        let chain = Self::new();
        let chain = if content { chain.with(MagicSniffer) } else { chain };
        chain.with(ExtensionSniffer)
    }
}

impl TypeSniffer for SnifferChain {
    fn sniff(&self, path: &Path) -> io::Result<Option<ContainerFormat>> {
        for sniffer in &self.0 {
            if let Some(format) = sniffer.sniff(path)? {
                return Ok(Some(format));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn tar_block(magic: bool) -> Vec<u8> {
        let mut header =
            if magic { tar::Header::new_ustar() } else { tar::Header::new_old() };
        header.set_path("file.txt").unwrap();
        header.set_size(0);
        header.set_mode(0o644);
        header.set_cksum();
        header.as_bytes().to_vec()
    }

    #[test]
    fn detect_by_magic() {
        assert_eq!(MagicSniffer::detect(b"PK\x03\x04rest"), Some(ContainerFormat::Zip));
        assert_eq!(MagicSniffer::detect(b"PK\x05\x06"), Some(ContainerFormat::Zip));
        assert_eq!(
            MagicSniffer::detect(&[0x1f, 0x8b, 8, 0]),
            Some(ContainerFormat::Compressed(Compression::Gzip))
        );
        assert_eq!(
            MagicSniffer::detect(b"BZh91AY"),
            Some(ContainerFormat::Compressed(Compression::Bzip2))
        );
        assert_eq!(
            MagicSniffer::detect(b"\xfd7zXZ\x00\x00"),
            Some(ContainerFormat::Compressed(Compression::Xz))
        );
        assert_eq!(
            MagicSniffer::detect(&[0x28, 0xb5, 0x2f, 0xfd]),
            Some(ContainerFormat::Compressed(Compression::Zstd))
        );
        assert_eq!(MagicSniffer::detect(b"7z\xbc\xaf\x27\x1c"), Some(ContainerFormat::SevenZip));
        assert_eq!(MagicSniffer::detect(b"Rar!\x1a\x07\x01\x00"), Some(ContainerFormat::Rar));
        assert_eq!(MagicSniffer::detect(b"070701000000"), Some(ContainerFormat::Cpio));
        assert_eq!(MagicSniffer::detect(b""), None);
        assert_eq!(MagicSniffer::detect(b"just some text\n"), None);
    }

    #[test]
    fn detect_tar_headers() {
        assert_eq!(MagicSniffer::detect(&tar_block(true)), Some(ContainerFormat::Tar));
        assert_eq!(MagicSniffer::detect(&tar_block(false)), Some(ContainerFormat::Tar));

        let mut corrupted = tar_block(false);
        corrupted[0] ^= 0x20;
        assert_eq!(MagicSniffer::detect(&corrupted), None);

        assert_eq!(MagicSniffer::detect(&[0u8; 512]), None);
        assert_eq!(MagicSniffer::detect(&tar_block(true)[..300]), None);
    }

    #[test]
    fn detect_by_extension() {
        let detect = |name: &str| ExtensionSniffer::detect(Path::new(name));
        assert_eq!(detect("a.zip"), Some(ContainerFormat::Zip));
        assert_eq!(detect("dir/A.ZIP"), Some(ContainerFormat::Zip));
        assert_eq!(detect("a.tar"), Some(ContainerFormat::Tar));
        assert_eq!(detect("a.tar.gz"), Some(ContainerFormat::Compressed(Compression::Gzip)));
        assert_eq!(detect("a.tgz"), Some(ContainerFormat::Compressed(Compression::Gzip)));
        assert_eq!(detect("a.tar.bz2"), Some(ContainerFormat::Compressed(Compression::Bzip2)));
        assert_eq!(detect("a.txz"), Some(ContainerFormat::Compressed(Compression::Xz)));
        assert_eq!(detect("a.tar.zst"), Some(ContainerFormat::Compressed(Compression::Zstd)));
        assert_eq!(detect("a.7z"), Some(ContainerFormat::SevenZip));
        assert_eq!(detect("a.rar"), Some(ContainerFormat::Rar));
        assert_eq!(detect("a.cpio"), Some(ContainerFormat::Cpio));
        assert_eq!(detect("a.gz"), None);
        assert_eq!(detect("notes.txt"), None);
        assert_eq!(detect(".zip"), None);
        assert_eq!(detect(""), None);
    }

    #[test]
    fn chain_prefers_content_over_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("misnamed.tar");
        File::create(&path).unwrap().write_all(b"PK\x05\x06").unwrap();

        assert_eq!(SnifferChain::standard(true).sniff(&path).unwrap(), Some(ContainerFormat::Zip));
        assert_eq!(SnifferChain::standard(false).sniff(&path).unwrap(), Some(ContainerFormat::Tar));
    }

    #[test]
    fn chain_falls_back_to_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.tgz");
        File::create(&path).unwrap();

        assert_eq!(
            SnifferChain::standard(true).sniff(&path).unwrap(),
            Some(ContainerFormat::Compressed(Compression::Gzip))
        );
        assert_eq!(SnifferChain::new().sniff(&path).unwrap(), None);
    }

    #[test]
    fn magic_sniffer_reports_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(MagicSniffer.sniff(&dir.path().join("nope.zip")).is_err());
        // extension sniffing never touches the filesystem
        assert!(ExtensionSniffer.sniff(&dir.path().join("nope.zip")).unwrap().is_some());
    }

    #[test]
    fn libarchive_support_matches_format() {
        assert_eq!(ContainerFormat::Zip.formats(), &[Format::Zip]);
        assert!(ContainerFormat::Zip.filters().is_empty());
        let tgz = ContainerFormat::Compressed(Compression::Gzip);
        assert_eq!(tgz.formats(), &[Format::All]);
        assert_eq!(tgz.filters(), &[Filter::Gzip]);
        assert_eq!(tgz.to_string(), "gzip");
        assert_eq!(ContainerFormat::Auto.formats(), &[Format::All]);
        assert_eq!(ContainerFormat::Auto.filters(), &[Filter::All]);
    }
}
