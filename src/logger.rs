// Copyright (c) 2021 Allen Wild <allenwild93@gmail.com>
// SPDX-License-Identifier: GPL-3.0-or-later

//! A `log` backend that prints `level: message` lines to stderr, with the level name colored.

use std::io::{self, Write};

use log::{Level, LevelFilter, Log, Metadata, Record};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

#[derive(Debug)]
pub struct StderrLogger {
    level: LevelFilter,
    color_choice: ColorChoice,
}

impl StderrLogger {
    pub fn new(level: LevelFilter, color_choice: ColorChoice) -> Self {
        Self { level, color_choice }
    }

    /// Install this logger as the global `log` backend. Fails if a logger was already set.
    pub fn install(self) -> Result<(), log::SetLoggerError> {
        log::set_max_level(self.level);
        log::set_boxed_logger(Box::new(self))
    }

    fn write_record<W: Write + WriteColor>(w: &mut W, record: &Record) -> io::Result<()> {
        let (label, color) = level_style(record.level());
        w.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
        write!(w, "{}", label)?;
        w.reset()?;
        writeln!(w, ": {}", record.args())
    }
}

fn level_style(level: Level) -> (&'static str, Color) {
    match level {
        Level::Error => ("error", Color::Red),
        Level::Warn => ("warning", Color::Yellow),
        Level::Info => ("info", Color::Green),
        Level::Debug => ("debug", Color::Cyan),
        Level::Trace => ("trace", Color::Magenta),
    }
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let stderr = StandardStream::stderr(self.color_choice);
        let mut lock = stderr.lock();
        // nowhere left to report a failure to write to stderr
        let _ = Self::write_record(&mut lock, record);
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

#[cfg(test)]
mod tests {
    use termcolor::{Ansi, NoColor};

    use super::*;

    fn render<W: Write + WriteColor>(mut w: W, level: Level, msg: &str) -> W {
        StderrLogger::write_record(
            &mut w,
            &Record::builder().level(level).args(format_args!("{}", msg)).build(),
        )
        .unwrap();
        w
    }

    #[test]
    fn plain_output() {
        let out = render(NoColor::new(Vec::new()), Level::Warn, "skipped `x.txt`").into_inner();
        assert_eq!(String::from_utf8(out).unwrap(), "warning: skipped `x.txt`\n");
    }

    #[test]
    fn colored_output() {
        let out = render(Ansi::new(Vec::new()), Level::Error, "boom").into_inner();
        let s = String::from_utf8(out).unwrap();
        assert!(s.contains("\x1b[31m"), "{:?}", s);
        assert!(s.ends_with("error\x1b[0m: boom\n"), "{:?}", s);
    }

    #[test]
    fn level_filtering() {
        let logger = StderrLogger::new(LevelFilter::Warn, ColorChoice::Never);
        assert!(logger.enabled(&Metadata::builder().level(Level::Error).build()));
        assert!(logger.enabled(&Metadata::builder().level(Level::Warn).build()));
        assert!(!logger.enabled(&Metadata::builder().level(Level::Debug).build()));

        let quiet = StderrLogger::new(LevelFilter::Off, ColorChoice::Never);
        assert!(!quiet.enabled(&Metadata::builder().level(Level::Error).build()));
    }
}
