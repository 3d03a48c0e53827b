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

//! CLI front end: turns `--faketime`/`--clk-ids` strings into a core
//! [`crate::skew::Config`] and drives inject/recover against `--pid` and,
//! with `--include-children`, its current descendants.

use structopt::StructOpt;

#[derive(Debug, StructOpt)]
#[structopt(
    name = "vdso-skew",
    about = "Skew a process's view of wall/monotonic time by hijacking its VDSO clock functions."
)]
pub struct Opt {
    /// Target process id.
    #[structopt(long)]
    pub pid: i32,

    /// Offset applied to the target's clock reads: an absolute date, or a
    /// signed integer suffixed with s/m/h/d/y (default seconds).
    #[structopt(long, default_value = "0")]
    pub faketime: String,

    /// Comma-separated clock-id names the skew applies to.
    #[structopt(long, default_value = "CLOCK_REALTIME", use_delimiter = true)]
    pub clk_ids: Vec<String>,

    /// Also inject into every current descendant of --pid.
    #[structopt(long)]
    pub include_children: bool,

    /// Increase log verbosity (repeatable: -v, -vv, -vvv).
    #[structopt(short, long, parse(from_occurrences))]
    pub verbose: u8,

    /// Undo a previous injection against --pid instead of performing one.
    #[structopt(long)]
    pub recover: bool,
}
