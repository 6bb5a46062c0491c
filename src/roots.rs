// Copyright (c) 2021 Allen Wild <allenwild93@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::collections::BTreeSet;

/// Return the segment of `path` that would land directly in the extraction directory.
///
/// Paths are split on both `/` and `\`. Empty segments (a leading `/` or doubled separators) and
/// leading `.` or `..` segments are skipped, so `./pkg/file`, `/pkg/file` and `pkg/file` all
/// have the root `pkg`. A path with nothing left after that has no root.
///
/// Works on raw bytes: archive entry names carry whatever encoding the archiver used.
pub fn root_segment(path: &[u8]) -> Option<&[u8]> {
    path.split(|&b| b == b'/' || b == b'\\')
        .find(|seg| !matches!(*seg, b"" | b"." | b".."))
}

/// The distinct root segments of an archive's entries. Iterates in sorted byte order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RootEntrySet(BTreeSet<Vec<u8>>);

impl RootEntrySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the root segment of `path`, if it has one.
    pub fn insert(&mut self, path: &[u8]) {
        if let Some(root) = root_segment(path) {
            // avoid allocating for the common case of many entries under one root
            if !self.0.contains(root) {
                self.0.insert(root.to_vec());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn into_vec(self) -> Vec<Vec<u8>> {
        self.0.into_iter().collect()
    }
}

impl<S: AsRef<[u8]>> FromIterator<S> for RootEntrySet {
    fn from_iter<I: IntoIterator<Item = S>>(paths: I) -> Self {
        let mut set = Self::new();
        set.extend(paths);
        set
    }
}

impl<S: AsRef<[u8]>> Extend<S> for RootEntrySet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, paths: I) {
        for path in paths {
            self.insert(path.as_ref());
        }
    }
}

/// Number of distinct root entries among `paths`.
pub fn count_roots<I, S>(paths: I) -> usize
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    paths.into_iter().collect::<RootEntrySet>().len()
}

/// The distinct root entries among `paths`, sorted.
pub fn list_roots<I, S>(paths: I) -> Vec<Vec<u8>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<[u8]>,
{
    paths.into_iter().collect::<RootEntrySet>().into_vec()
}
