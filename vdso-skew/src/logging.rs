/*
 * Copyright (c) 2018-2019, Trustees of Indiana University
 *     ("University Works" via Baojun Wang)
 * Copyright (c) 2018-2019, Ryan Newton
 *     ("Traditional Works of Scholarship")
 *
 *  All rights reserved.
 *
 *  This source code is licensed under the BSD-style license found in the
 *  LICENSE file in the root directory of this source tree.
 */

//! Installs a colored, timestamped `fern` sink once at process start.
//! Verbosity is driven by `-v` occurrences: 0 is `info`, 1 is `debug`, 2+
//! is `trace` (per-syscall tracing).

use colored::{Color, Colorize};
use fern::Dispatch;
use log::LevelFilter;

fn level_color(level: log::Level) -> Color {
    match level {
        log::Level::Error => Color::Red,
        log::Level::Warn => Color::Yellow,
        log::Level::Info => Color::Green,
        log::Level::Debug => Color::Cyan,
        log::Level::Trace => Color::BrightBlack,
    }
}

fn verbosity_to_filter(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Sets up global logging for the CLI front end. `verbosity` is the number
/// of `-v` flags the user passed.
pub fn init(verbosity: u8) -> Result<(), fern::InitError> {
    Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} {:<5} {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level().to_string().color(level_color(record.level())),
                message
            ))
        })
        .level(verbosity_to_filter(verbosity))
        .chain(std::io::stderr())
        .apply()?;
    Ok(())
}
