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

/// Name of the VDSO symbol replaced by the `clock_gettime` fake image.
pub const SYM_CLOCK_GETTIME: &str = "clock_gettime";
/// Name of the VDSO symbol replaced by the `gettimeofday` fake image.
pub const SYM_GETTIMEOFDAY: &str = "gettimeofday";

/// extern variables referenced by `fake_clock_gettime.o`'s `.rela.text`.
pub const VAR_CLOCK_IDS_MASK: &str = "CLOCK_IDS_MASK";
pub const VAR_TV_SEC_DELTA: &str = "TV_SEC_DELTA";
pub const VAR_TV_NSEC_DELTA: &str = "TV_NSEC_DELTA";

/// Path of the `[vdso]` mapping as it appears in `/proc/<pid>/maps`.
pub const VDSO_MAP_PATH: &str = "[vdso]";

/// Environment variable carrying the log level for the CLI front end.
pub const VDSO_SKEW_LOG_KEY: &str = "VDSO_SKEW_LOG";

/// POSIX clock IDs, bit position == numeric clock id (`man 2 clock_gettime`).
/// bit 9 (`CLOCK_BOOTTIME_ALARM`) is the highest bit this tool understands.
pub const CLOCK_ID_NAMES: &[(&str, u32)] = &[
    ("CLOCK_REALTIME", 0),
    ("CLOCK_MONOTONIC", 1),
    ("CLOCK_PROCESS_CPUTIME_ID", 2),
    ("CLOCK_THREAD_CPUTIME_ID", 3),
    ("CLOCK_MONOTONIC_RAW", 4),
    ("CLOCK_REALTIME_COARSE", 5),
    ("CLOCK_MONOTONIC_COARSE", 6),
    ("CLOCK_BOOTTIME", 7),
    ("CLOCK_REALTIME_ALARM", 8),
    ("CLOCK_BOOTTIME_ALARM", 9),
];

#[test]
fn clock_id_names_cover_ten_bits() {
    assert_eq!(CLOCK_ID_NAMES.len(), 10);
    for (i, (_, bit)) in CLOCK_ID_NAMES.iter().enumerate() {
        assert_eq!(*bit as usize, i);
    }
}
