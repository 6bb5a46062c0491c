// Copyright (c) 2021 Allen Wild <allenwild93@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::path::{Path, PathBuf};

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=PKG_CONFIG_PATH");

    eprintln!("Searching for libarchive>=3.0.0 with pkg-config.");
    if pkg_config::Config::new().atleast_version("3.0.0").probe("libarchive").is_ok() {
        // probe() printed all the relevant cargo metadata output so we don't have to do anything
        eprintln!("libarchive found using pkg-config");
        return;
    }

    // Fall back to a libarchive.so or libarchive.a (probably a symlink) in this crate's directory
    // or in the workspace root. All we need is something to link against, so this lets care build
    // on systems that have the libarchive runtime but not the -dev package. For custom
    // installations, set PKG_CONFIG_PATH and use pkg-config as usual.
    eprintln!("Failed to find libarchive using pkg-config, looking for local libarchive instead.");

    let Some(mydir) = std::env::var_os("CARGO_MANIFEST_DIR").map(PathBuf::from) else {
        eprintln!("CARGO_MANIFEST_DIR is not set");
        std::process::exit(1);
    };
    let candidates = [Some(mydir.as_path()), mydir.parent()];
    if candidates.iter().flatten().any(|dir| check_local_libarchive(dir)) {
        return;
    }

    eprintln!(
        "No libarchive.so or libarchive.a found in the local `care` or `care/libarchive`\n\
         directories. Either install the libarchive-dev and pkg-config packages, or create a \
         `libarchive.so` or `libarchive.a` symlink in the current directory pointing to a \
         suitable library file."
    );

    std::process::exit(1);
}

fn check_local_libarchive(dir: &Path) -> bool {
    // n.b. the "static" lib type is really important for the .a, or we get weird linker errors
    // when building for musl
    for (file, kind) in [("libarchive.so", "dylib"), ("libarchive.a", "static")] {
        if dir.join(file).exists() {
            eprintln!("Found {} in {}", file, dir.display());
            println!("cargo:rustc-link-search=native={}", dir.display());
            println!("cargo:rustc-link-lib={}=archive", kind);
            return true;
        }
    }
    false
}
