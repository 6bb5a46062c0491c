// Copyright (c) 2021 Allen Wild <allenwild93@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use std::ffi::OsString;
use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{crate_version, value_parser, Arg, ArgAction, ArgMatches, Command};
use log::LevelFilter;
use termcolor::ColorChoice;

mod input;
mod logger;
mod report;
mod roots;
mod sniff;
mod util;
use logger::StderrLogger;
use report::ReportOptions;
use sniff::SnifferChain;

#[derive(Debug)]
struct Args {
    color_choice: ColorChoice,
    level: LevelFilter,
    list: bool,
    sniff_content: bool,
    inputs: Vec<PathBuf>,
}

fn command() -> Command<'static> {
    Command::new("care")
        .about("Count archive root entries.")
        .long_about(
            "Count the entries at the root of archive files, to decide whether to unpack them \
             into a new folder or into the current one without scattering files around. \
             Supports every format libarchive does.",
        )
        .version(crate_version!())
        .arg(
            Arg::new("list")
                .short('l')
                .long("list")
                .action(ArgAction::SetTrue)
                .help("list the unique root entries instead of counting them"),
        )
        .arg(
            Arg::new("no_sniff")
                .long("no-sniff")
                .action(ArgAction::SetTrue)
                .help("detect archive formats by file extension only, not by content"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose")
                .help("don't report archives that were skipped"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("print detected formats and other debug info to stderr"),
        )
        .arg(
            Arg::new("color")
                .long("color")
                .action(ArgAction::Set)
                .value_parser(["auto", "always", "never"])
                .default_value("auto")
                .help("enable terminal colors for diagnostics"),
        )
        .arg(
            Arg::new("always_color")
                .short('C')
                .action(ArgAction::SetTrue)
                .overrides_with("color")
                .help("alias for --color=always"),
        )
        .arg(
            Arg::new("input")
                .value_name("FILE")
                .required(true)
                .multiple_values(true)
                .value_parser(value_parser!(OsString))
                .help("archive files or glob patterns"),
        )
}

fn parse_args_from<I, T>(argv: I) -> clap::Result<Args>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let m = command().try_get_matches_from(argv)?;
    Ok(args_from_matches(&m))
}

/// State of an `ArgAction::SetTrue` switch.
fn flag(m: &ArgMatches, id: &str) -> bool {
    m.get_one::<bool>(id).copied().unwrap_or(false)
}

fn args_from_matches(m: &ArgMatches) -> Args {
    let color_choice = if flag(m, "always_color") {
        ColorChoice::Always
    } else {
        match m.get_one::<String>("color").map(String::as_str) {
            Some("always") => ColorChoice::Always,
            Some("never") => ColorChoice::Never,
            _ => {
                // diagnostics go to stderr, so that's the stream to check
                if atty::is(atty::Stream::Stderr) {
                    ColorChoice::Auto
                } else {
                    ColorChoice::Never
                }
            }
        }
    };

    let level = if flag(m, "quiet") {
        LevelFilter::Off
    } else if flag(m, "verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    };

    let inputs =
        util::expand_globs(m.get_many::<OsString>("input").into_iter().flatten().cloned());

    Args {
        color_choice,
        level,
        list: flag(m, "list"),
        sniff_content: !flag(m, "no_sniff"),
        inputs,
    }
}

fn run(args: Args) -> Result<i32> {
    let sniffer = SnifferChain::standard(args.sniff_content);
    let options = ReportOptions { list: args.list };

    let stdout = io::stdout();
    let mut stdout_lock = stdout.lock();
    let summary = report::report_files(&mut stdout_lock, &args.inputs, &sniffer, options)
        .context("failed to write report")?;
    log::debug!("{} archives counted, {} skipped", summary.processed, summary.failed);

    Ok(summary.exit_code())
}

fn main() {
    // let libarchive convert entry names using the user's locale rather than plain "C"
    unsafe {
        libc::setlocale(libc::LC_CTYPE, b"\0".as_ptr() as *const libc::c_char);
    }

    let args = match parse_args_from(std::env::args_os()) {
        Ok(args) => args,
        Err(e) => e.exit(),
    };
    if let Err(e) = StderrLogger::new(args.level, args.color_choice).install() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    let code = match run(args) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{:#}", e);
            1
        }
    };
    log::logger().flush();
    std::process::exit(code);
}
