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

//! `EncodeClkIds`: textual clock-ID names to the bitmask described in
//! [`vdso_skew_common::CLOCK_ID_NAMES`].

use vdso_skew_common::CLOCK_ID_NAMES;

use crate::error::{Result, SkewError};

/// Maps each name in `names` to its bit and ORs them together. Unknown
/// names are a hard [`SkewError::Input`].
pub fn encode_clk_ids<S: AsRef<str>>(names: &[S]) -> Result<u64> {
    let mut mask = 0u64;
    for name in names {
        let name = name.as_ref();
        let bit = CLOCK_ID_NAMES
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, bit)| *bit)
            .ok_or_else(|| SkewError::Input(format!("unknown clock id {}", name)))?;
        mask |= 1u64 << bit;
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_realtime() {
        assert_eq!(encode_clk_ids(&["CLOCK_REALTIME"]).unwrap(), 1);
    }

    #[test]
    fn highest_bit() {
        assert_eq!(encode_clk_ids(&["CLOCK_BOOTTIME_ALARM"]).unwrap(), 1 << 9);
    }

    #[test]
    fn ored_together() {
        assert_eq!(
            encode_clk_ids(&["CLOCK_REALTIME", "CLOCK_MONOTONIC"]).unwrap(),
            0b11
        );
    }

    #[test]
    fn unknown_name_is_input_error() {
        assert!(matches!(
            encode_clk_ids(&["NOT_A_CLOCK"]),
            Err(SkewError::Input(_))
        ));
    }
}
