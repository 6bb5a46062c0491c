// Copyright (c) 2021 Allen Wild <allenwild93@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! Raw declarations for the subset of the libarchive read API that we use.
//! Linking is set up by build.rs.

#![allow(non_camel_case_types)]

use std::os::raw::{c_char, c_int, c_void};

pub const ARCHIVE_EOF: c_int = 1;
pub const ARCHIVE_OK: c_int = 0;
pub const ARCHIVE_RETRY: c_int = -10;
pub const ARCHIVE_WARN: c_int = -20;
pub const ARCHIVE_FAILED: c_int = -25;
pub const ARCHIVE_FATAL: c_int = -30;

/// errno set when no enabled format reader recognizes the input
pub const ARCHIVE_ERRNO_FILE_FORMAT: c_int = libc::EILSEQ;

pub type la_ssize_t = libc::ssize_t;

#[repr(C)]
pub struct archive {
    _unused: [u8; 0],
}

#[repr(C)]
pub struct archive_entry {
    _unused: [u8; 0],
}

pub type archive_read_callback = Option<
    unsafe extern "C" fn(
        archive: *mut archive,
        client_data: *mut c_void,
        buffer: *mut *const c_void,
    ) -> la_ssize_t,
>;
pub type archive_open_callback =
    Option<unsafe extern "C" fn(archive: *mut archive, client_data: *mut c_void) -> c_int>;
pub type archive_close_callback =
    Option<unsafe extern "C" fn(archive: *mut archive, client_data: *mut c_void) -> c_int>;

extern "C" {
    pub fn archive_read_new() -> *mut archive;
    pub fn archive_read_free(a: *mut archive) -> c_int;

    pub fn archive_read_support_format_all(a: *mut archive) -> c_int;
    pub fn archive_read_support_format_7zip(a: *mut archive) -> c_int;
    pub fn archive_read_support_format_cpio(a: *mut archive) -> c_int;
    pub fn archive_read_support_format_rar(a: *mut archive) -> c_int;
    pub fn archive_read_support_format_rar5(a: *mut archive) -> c_int;
    pub fn archive_read_support_format_tar(a: *mut archive) -> c_int;
    pub fn archive_read_support_format_zip(a: *mut archive) -> c_int;

    pub fn archive_read_support_filter_all(a: *mut archive) -> c_int;
    pub fn archive_read_support_filter_bzip2(a: *mut archive) -> c_int;
    pub fn archive_read_support_filter_gzip(a: *mut archive) -> c_int;
    pub fn archive_read_support_filter_xz(a: *mut archive) -> c_int;
    pub fn archive_read_support_filter_zstd(a: *mut archive) -> c_int;

    pub fn archive_read_open(
        a: *mut archive,
        client_data: *mut c_void,
        open: archive_open_callback,
        read: archive_read_callback,
        close: archive_close_callback,
    ) -> c_int;
    pub fn archive_read_next_header2(a: *mut archive, entry: *mut archive_entry) -> c_int;

    pub fn archive_errno(a: *mut archive) -> c_int;
    pub fn archive_error_string(a: *mut archive) -> *const c_char;
    pub fn archive_set_error(a: *mut archive, err: c_int, fmt: *const c_char, ...);

    pub fn archive_format(a: *mut archive) -> c_int;
    pub fn archive_format_name(a: *mut archive) -> *const c_char;
    pub fn archive_filter_count(a: *mut archive) -> c_int;
    pub fn archive_filter_name(a: *mut archive, n: c_int) -> *const c_char;

    pub fn archive_entry_new() -> *mut archive_entry;
    pub fn archive_entry_free(entry: *mut archive_entry);
    pub fn archive_entry_pathname(entry: *mut archive_entry) -> *const c_char;
    pub fn archive_entry_pathname_utf8(entry: *mut archive_entry) -> *const c_char;
}
