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

//! Child-process discovery for `--include-children`, grounded in
//! `cmd/watchmaker.go`'s `getChildPid` sweep: build a parent-to-children
//! map over every process on the system, then flatten the subtree rooted
//! at the target pid.

use std::collections::HashMap;

use procfs::process::all_processes;

use crate::error::{Result, SkewError};

/// All transitive descendants of `pid`, in breadth-first discovery order.
/// Does not include `pid` itself.
pub fn descendants(pid: i32) -> Result<Vec<i32>> {
    let mut children_of: HashMap<i32, Vec<i32>> = HashMap::new();

    for proc in all_processes().map_err(|e| SkewError::TargetGone(format!("enumerate /proc: {}", e)))? {
        let proc = match proc {
            Ok(p) => p,
            Err(_) => continue,
        };
        let stat = match proc.stat() {
            Ok(s) => s,
            Err(_) => continue,
        };
        children_of.entry(stat.ppid).or_default().push(stat.pid);
    }

    let mut out = Vec::new();
    let mut frontier = vec![pid];
    while let Some(parent) = frontier.pop() {
        if let Some(kids) = children_of.get(&parent) {
            for &kid in kids {
                out.push(kid);
                frontier.push(kid);
            }
        }
    }
    Ok(out)
}
