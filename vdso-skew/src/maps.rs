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

//! Parses `/proc/<pid>/maps` into [`MapEntry`] records. §4.1 of the design:
//! a line with fewer than three whitespace-separated fields is skipped, a
//! pathname is only present from the sixth field on, and malformed hex is
//! fatal.

use std::fs;

use crate::error::{Result, SkewError};

/// One contiguous VMA in a traced process's address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapEntry {
    pub start_addr: u64,
    pub end_addr: u64,
    pub perms: String,
    pub padding_size: u64,
    pub path: String,
}

impl MapEntry {
    pub fn size(&self) -> u64 {
        self.end_addr - self.start_addr
    }
}

fn parse_hex_u64(s: &str, what: &str) -> Result<u64> {
    u64::from_str_radix(s, 16)
        .map_err(|e| SkewError::MemoryIo(format!("malformed {} {:?}: {}", what, s, e)))
}

/// Reads and parses `/proc/<pid>/maps` in full. Line order is preserved:
/// the VDSO search in [`crate::traced_program`] relies on the VDSO being
/// mapped late and scans from the end.
pub fn read_maps(pid: i32) -> Result<Vec<MapEntry>> {
    let data = fs::read_to_string(format!("/proc/{}/maps", pid))
        .map_err(|e| SkewError::TargetGone(format!("read /proc/{}/maps: {}", pid, e)))?;
    parse_maps(&data)
}

fn parse_maps(data: &str) -> Result<Vec<MapEntry>> {
    let mut entries = Vec::new();
    for line in data.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 {
            continue;
        }

        let (start_str, end_str) = fields[0]
            .split_once('-')
            .ok_or_else(|| SkewError::MemoryIo(format!("malformed address range {:?}", fields[0])))?;
        let start_addr = parse_hex_u64(start_str, "start address")?;
        let end_addr = parse_hex_u64(end_str, "end address")?;
        let perms = fields[1].to_string();
        let padding_size = parse_hex_u64(fields[2], "padding size")?;
        let path = if fields.len() >= 6 {
            fields[fields.len() - 1].to_string()
        } else {
            String::new()
        };

        entries.push(MapEntry {
            start_addr,
            end_addr,
            perms,
            padding_size,
            path,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_line_with_path() {
        let data = "7f1234500000-7f1234521000 r-xp 00000000 08:01 131074 /lib/x86_64-linux-gnu/libc.so\n";
        let entries = parse_maps(data).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].start_addr, 0x7f1234500000);
        assert_eq!(entries[0].end_addr, 0x7f1234521000);
        assert_eq!(entries[0].perms, "r-xp");
        assert_eq!(entries[0].padding_size, 0);
        assert_eq!(entries[0].path, "/lib/x86_64-linux-gnu/libc.so");
    }

    #[test]
    fn anonymous_mapping_has_empty_path() {
        let data = "7ffd00000000-7ffd00021000 rw-p 00000000 00:00 0\n";
        let entries = parse_maps(data).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "");
    }

    #[test]
    fn vdso_entry_is_found_by_literal_path() {
        let data = "7ffd00000000-7ffd00021000 rw-p 00000000 00:00 0\n\
                    7ffd00022000-7ffd00023000 r-xp 00000000 00:00 0                  [vdso]\n";
        let entries = parse_maps(data).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].path, "[vdso]");
    }

    #[test]
    fn short_lines_are_skipped() {
        let data = "7ffd00000000-7ffd00021000 rw-p\n";
        let entries = parse_maps(data).unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn malformed_hex_is_fatal() {
        let data = "zzzz-7ffd00021000 rw-p 00000000 00:00 0\n";
        assert!(parse_maps(data).is_err());
    }
}
