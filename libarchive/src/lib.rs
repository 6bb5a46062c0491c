// Copyright (c) 2021 Allen Wild <allenwild93@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! A small safe wrapper around the libarchive read API: open anything implementing
//! `io::Read`, restrict which formats and filters libarchive will try, and walk the entry
//! headers.

use std::borrow::Borrow;
use std::ffi::{CStr, OsStr};
use std::fmt;
use std::io::{ErrorKind, Read};
use std::os::raw::{c_char, c_int, c_void};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::pin::Pin;

pub mod ffi;

macro_rules! expect_nonnull {
    ($e:expr) => {
        match $e {
            p if p.is_null() => panic!("{} unexpectedly returned NULL", stringify!($e)),
            p => p,
        }
    };
}

macro_rules! expect_nonnull_unsafe {
    ($e:expr) => {
        unsafe { expect_nonnull!($e) }
    };
}

const DEFAULT_BUF_SIZE: usize = 8192;

/// Convert a borrowed raw C string into an owned PathBuf, or None if the pointer is NULL.
///
/// SAFETY: `ptr` must point to a null-terminated string, or be a NULL pointer.
unsafe fn raw_cstring_to_pathbuf(ptr: *const c_char) -> Option<PathBuf> {
    if ptr.is_null() {
        None
    } else {
        Some(PathBuf::from(OsStr::from_bytes(CStr::from_ptr(ptr).to_bytes())))
    }
}

/// Like raw_cstring_to_pathbuf, but for the static name strings libarchive hands out.
///
/// SAFETY: `ptr` must point to a null-terminated string, or be a NULL pointer.
unsafe fn raw_cstring_to_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
    }
}

/// An archive container format that libarchive can be told to recognize.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Every format libarchive was built with.
    All,
    SevenZip,
    Cpio,
    Rar,
    Rar5,
    Tar,
    Zip,
}

impl Format {
    /// SAFETY: archive must be a valid pointer to a struct archive that hasn't been opened yet.
    unsafe fn enable(self, archive: *mut ffi::archive) -> c_int {
        match self {
            Format::All => ffi::archive_read_support_format_all(archive),
            Format::SevenZip => ffi::archive_read_support_format_7zip(archive),
            Format::Cpio => ffi::archive_read_support_format_cpio(archive),
            Format::Rar => ffi::archive_read_support_format_rar(archive),
            Format::Rar5 => ffi::archive_read_support_format_rar5(archive),
            Format::Tar => ffi::archive_read_support_format_tar(archive),
            Format::Zip => ffi::archive_read_support_format_zip(archive),
        }
    }
}

/// A decompression filter applied to the raw input before format detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter {
    /// Every filter libarchive was built with.
    All,
    Bzip2,
    Gzip,
    Xz,
    Zstd,
}

impl Filter {
    /// SAFETY: archive must be a valid pointer to a struct archive that hasn't been opened yet.
    unsafe fn enable(self, archive: *mut ffi::archive) -> c_int {
        match self {
            Filter::All => ffi::archive_read_support_filter_all(archive),
            Filter::Bzip2 => ffi::archive_read_support_filter_bzip2(archive),
            Filter::Gzip => ffi::archive_read_support_filter_gzip(archive),
            Filter::Xz => ffi::archive_read_support_filter_xz(archive),
            Filter::Zstd => ffi::archive_read_support_filter_zstd(archive),
        }
    }
}

#[derive(Debug)]
pub struct ArchiveEntry {
    ptr: *mut ffi::archive_entry,
}

impl Drop for ArchiveEntry {
    fn drop(&mut self) {
        unsafe {
            ffi::archive_entry_free(self.ptr);
        }
    }
}

impl ArchiveEntry {
    fn new() -> Self {
        Self { ptr: expect_nonnull_unsafe!(ffi::archive_entry_new()) }
    }

    /// The entry's path name as stored in the archive. libarchive returns NULL for the
    /// locale-encoded name when it can't be converted, in which case the UTF-8 name is tried.
    pub fn path(&self) -> Option<PathBuf> {
        unsafe {
            raw_cstring_to_pathbuf(ffi::archive_entry_pathname(self.ptr))
                .or_else(|| raw_cstring_to_pathbuf(ffi::archive_entry_pathname_utf8(self.ptr)))
        }
    }

    fn as_ptr(&mut self) -> *mut ffi::archive_entry {
        self.ptr
    }
}

#[derive(Debug)]
pub struct ArchiveError {
    errno: i32,
    msg: String,
    prefix: Option<String>,
    /// No enabled format reader claimed the input
    unrecognized: bool,
}

impl fmt::Display for ArchiveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let Some(ref prefix) = self.prefix {
            write!(f, "{}: {} ({})", prefix, self.msg, self.errno)
        } else {
            write!(f, "{} ({})", self.msg, self.errno)
        }
    }
}

impl std::error::Error for ArchiveError {}

impl ArchiveError {
    /// Construct an ArchiveError by calling archive_errno() and archive_error_string() on the
    /// given archive.
    ///
    /// SAFETY: archive must be a valid pointer to a struct archive.
    unsafe fn from_archive(archive: *mut ffi::archive) -> Self {
        let msg = match ffi::archive_error_string(archive) {
            p if p.is_null() => "[unknown error message]".into(),
            p => CStr::from_ptr(p).to_string_lossy().into_owned(),
        };

        let errno = ffi::archive_errno(archive);
        // archive_format() stays 0 until a format reader has parsed a header. A format error
        // after that point is damage inside a recognized archive.
        let unrecognized =
            errno == ffi::ARCHIVE_ERRNO_FILE_FORMAT && ffi::archive_format(archive) == 0;
        Self { errno, msg, prefix: None, unrecognized }
    }

    unsafe fn with_prefix(archive: *mut ffi::archive, prefix: impl ToString) -> Self {
        let mut err = ArchiveError::from_archive(archive);
        err.prefix = Some(prefix.to_string());
        err
    }

    pub fn new_custom(msg: String) -> Self {
        Self { errno: 0, msg, prefix: None, unrecognized: false }
    }

    pub fn errno(&self) -> i32 {
        self.errno
    }

    pub fn message(&self) -> &str {
        &self.msg
    }

    /// True when libarchive gave up because none of the enabled formats matched the input, as
    /// opposed to failing partway through an archive it did recognize.
    pub fn is_unrecognized_format(&self) -> bool {
        self.unrecognized
    }
}

#[derive(Debug)]
struct ReadInner<R: Read> {
    reader: R,
    buf: Box<[u8]>,
}

impl<R: Read> ReadInner<R> {
    fn new_pinned(reader: R, buf_size: usize) -> Pin<Box<Self>> {
        let buf = vec![0u8; buf_size].into_boxed_slice();
        Box::pin(Self { reader, buf })
    }
}

pub struct ArchiveReader<R: Read> {
    /// Raw FFI object
    ptr: *mut ffi::archive,
    /// Rust reader and buffer, used by the read callback
    // This field is passed as a raw pointer to libarchive, and never used directly from Rust code,
    // thus the compiler thinks it's never used.
    #[allow(dead_code)]
    read_inner: Pin<Box<ReadInner<R>>>,
    /// Cached struct archive_entry for use during reading. A reference to this is returned by
    /// read_next_header
    entry: ArchiveEntry,
    /// Set when libarchive returned ARCHIVE_WARN for the most recent header
    warning: Option<ArchiveError>,
}

impl<R: Read> ArchiveReader<R> {
    unsafe extern "C" fn read_callback(
        archive: *mut ffi::archive,
        data: *mut c_void,
        out_buf: *mut *const c_void,
    ) -> ffi::la_ssize_t {
        // SAFETY: data is a void* that points to the ReadInner<R> registered in
        // archive_read_open(). The ReadInner<R> is pinned and owned by the ArchiveReader<R> that
        // registered this callback, and it outlives the struct archive* (see Drop below), so
        // handing libarchive a pointer into its buf via out_buf is sound.
        //
        // Exclusive access is guaranteed because this callback only runs inside libarchive calls
        // made through &mut self methods on the owning ArchiveReader. The raw struct archive*
        // must never leave this object.
        let ri: *mut ReadInner<R> = data as *mut _;

        loop {
            match (*ri).reader.read(&mut (*ri).buf) {
                Ok(count) => {
                    *out_buf = (*ri).buf.borrow() as *const [u8] as *const c_void;
                    return count as ffi::la_ssize_t;
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    // if reading fails, we must call archive_set_error and return -1
                    let errno = err.raw_os_error().unwrap_or(libc::EIO);
                    // archive_set_error is variadic and takes a printf-like format. for
                    // simplicity, just use a constant error message.
                    let msg = b"error reading archive input\0";
                    ffi::archive_set_error(archive, errno, msg.as_ptr() as *const c_char);
                    return -1;
                }
            }
        }
    }

    /// Create a new ArchiveReader wrapping the given reader, with every format and filter
    /// libarchive knows about enabled.
    ///
    /// May panic if archive_read_new() fails.
    pub fn new(reader: R) -> Result<Self, ArchiveError> {
        Self::with_support(reader, &[Format::All], &[Filter::All])
    }

    /// Create a new ArchiveReader that only recognizes the given formats and filters. Opening
    /// reads the start of the input to detect filters, so this can fail on I/O errors too.
    ///
    /// May panic if archive_read_new() fails.
    pub fn with_support(
        reader: R,
        formats: &[Format],
        filters: &[Filter],
    ) -> Result<Self, ArchiveError> {
        let ptr = expect_nonnull_unsafe!(ffi::archive_read_new());

        // Build Self right away so that Drop frees the struct archive* on every error path below.
        let mut this = Self {
            ptr,
            read_inner: ReadInner::new_pinned(reader, DEFAULT_BUF_SIZE),
            entry: ArchiveEntry::new(),
            warning: None,
        };

        unsafe {
            for format in formats {
                // ARCHIVE_WARN is fine here, it means some support is degraded rather than absent
                if format.enable(ptr) < ffi::ARCHIVE_WARN {
                    return Err(ArchiveError::with_prefix(
                        ptr,
                        format!("failed to enable archive format {:?}", format),
                    ));
                }
            }
            for filter in filters {
                // filters return ARCHIVE_WARN when they fall back to an external program
                if filter.enable(ptr) < ffi::ARCHIVE_WARN {
                    return Err(ArchiveError::with_prefix(
                        ptr,
                        format!("failed to enable archive filter {:?}", filter),
                    ));
                }
            }

            // SAFETY: we must never use this pointer to move out of or drop the read_inner. This
            // pointer is passed to read_callback() where we have to use it carefully. Moving
            // `this` later is fine, the ReadInner lives on the heap behind the Pin<Box>.
            let data_ptr =
                this.read_inner.as_mut().get_unchecked_mut() as *mut ReadInner<R> as *mut c_void;

            // No open/close callbacks, all of that is handled in Rust.
            if ffi::archive_read_open(ptr, data_ptr, None, Some(Self::read_callback), None)
                != ffi::ARCHIVE_OK
            {
                return Err(ArchiveError::with_prefix(ptr, "failed to open archive"));
            }
        }

        Ok(this)
    }

    /// Read the next entry in the archive, consuming input from the inner reader. Returns a shared
    /// reference to an ArchiveEntry owned by this ArchiveReader, or `Ok(None)` on EOF.
    ///
    /// An ARCHIVE_WARN result still yields the entry; the warning is kept for
    /// [`take_warning`](Self::take_warning).
    pub fn read_next_header(&mut self) -> Result<Option<&ArchiveEntry>, ArchiveError> {
        self.warning = None;
        let ret = unsafe { ffi::archive_read_next_header2(self.ptr, self.entry.as_ptr()) };
        match ret {
            ffi::ARCHIVE_OK => Ok(Some(&self.entry)),
            ffi::ARCHIVE_EOF => Ok(None),
            ffi::ARCHIVE_WARN => {
                self.warning = Some(self.last_error());
                Ok(Some(&self.entry))
            }
            ffi::ARCHIVE_RETRY | ffi::ARCHIVE_FAILED | ffi::ARCHIVE_FATAL => Err(self.last_error()),
            other => Err(ArchiveError::new_custom(format!(
                "archive_read_next_header2 returned unexpected status {}",
                other
            ))),
        }
    }

    /// Take the warning libarchive raised while reading the most recent header, if any.
    pub fn take_warning(&mut self) -> Option<ArchiveError> {
        self.warning.take()
    }

    pub fn last_error(&mut self) -> ArchiveError {
        // SAFETY: self.ptr is always valid
        unsafe { ArchiveError::from_archive(self.ptr) }
    }

    /// Name of the detected archive format, e.g. "GNU tar format". Only meaningful after the
    /// first header has been read.
    pub fn format_name(&mut self) -> Option<String> {
        unsafe { raw_cstring_to_string(ffi::archive_format_name(self.ptr)) }
    }

    /// Names of the filters stacked on top of the raw input, outermost first. The last one is
    /// always "none".
    pub fn filter_names(&mut self) -> Vec<String> {
        unsafe {
            let count = ffi::archive_filter_count(self.ptr);
            (0..count)
                .filter_map(|n| raw_cstring_to_string(ffi::archive_filter_name(self.ptr, n)))
                .collect()
        }
    }
}

impl<R: Read> Drop for ArchiveReader<R> {
    fn drop(&mut self) {
        let ret = unsafe { ffi::archive_read_free(self.ptr) };
        debug_assert_eq!(ret, ffi::ARCHIVE_OK, "archive_read_free failed!");
        // drop for the ReadInner will run next, closing the inner reader and dropping the buffer
        // now that we're sure that libarchive is done with it.
    }
}

#[cfg(test)]
mod tests {
    use std::io::{self, Cursor, Read};
    use std::path::PathBuf;

    use super::*;

    fn tar_bytes(names: &[&str]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for name in names {
            let mut header = tar::Header::new_ustar();
            header.set_size(5);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append_data(&mut header, name, &b"hello"[..]).unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn read_paths<R: Read>(reader: &mut ArchiveReader<R>) -> Result<Vec<PathBuf>, ArchiveError> {
        let mut paths = Vec::new();
        while let Some(entry) = reader.read_next_header()? {
            paths.push(entry.path().unwrap());
        }
        Ok(paths)
    }

    #[test]
    fn new_and_free() {
        unsafe {
            let ar = ffi::archive_read_new();
            assert!(!ar.is_null());
            ffi::archive_read_free(ar);
        }
    }

    #[test]
    fn reads_tar_paths_in_order() {
        let data = tar_bytes(&["top/a.txt", "top/sub/b.txt", "other"]);
        let mut reader = ArchiveReader::new(Cursor::new(data)).unwrap();
        let paths = read_paths(&mut reader).unwrap();
        assert_eq!(
            paths,
            vec![PathBuf::from("top/a.txt"), PathBuf::from("top/sub/b.txt"), PathBuf::from("other")]
        );
        assert!(reader.format_name().unwrap().contains("tar"));
        assert_eq!(reader.filter_names().last().map(String::as_str), Some("none"));
    }

    #[test]
    fn restricted_format_rejects_other_containers() {
        let data = tar_bytes(&["file"]);
        // newer libarchive picks the format while opening, older ones on the first header
        let err = ArchiveReader::with_support(Cursor::new(data), &[Format::Zip], &[])
            .and_then(|mut reader| read_paths(&mut reader))
            .unwrap_err();
        assert!(err.is_unrecognized_format(), "{}", err);
    }

    #[test]
    fn garbage_input_is_an_error() {
        let mut data = b"\x89PNG\r\n\x1a\n".to_vec();
        data.resize(2048, 0xab);
        let err = ArchiveReader::new(Cursor::new(data))
            .and_then(|mut reader| read_paths(&mut reader))
            .unwrap_err();
        assert!(!err.message().is_empty());
        assert!(err.is_unrecognized_format(), "{}", err);
    }

    #[test]
    fn truncation_inside_a_known_format_is_not_unrecognized() {
        let mut data = tar_bytes(&["first", "second"]);
        // first header and its data block, then part of the second header
        data.truncate(512 + 512 + 100);
        let mut reader = ArchiveReader::new(Cursor::new(data)).unwrap();
        assert!(reader.read_next_header().unwrap().is_some());
        let err = reader.read_next_header().unwrap_err();
        assert!(!err.is_unrecognized_format(), "{}", err);
    }

    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::from_raw_os_error(libc::EACCES))
        }
    }

    #[test]
    fn read_errors_are_reported() {
        let failed = match ArchiveReader::new(FailingReader) {
            Err(_) => true,
            Ok(mut reader) => reader.read_next_header().is_err(),
        };
        assert!(failed);
    }

    #[test]
    fn custom_error_display() {
        let err = ArchiveError::new_custom("entry has no path".into());
        assert_eq!(err.to_string(), "entry has no path (0)");
        assert_eq!(err.errno(), 0);
        assert!(!err.is_unrecognized_format());
    }
}
