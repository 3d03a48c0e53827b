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

//! Per-process virtual time skew via VDSO function hijacking, on a live
//! `ptrace`'d target. See [`skew`] for the public facade
//! (`Config`/`get_skew`/`Skew`) and [`clock_ids`]/[`offset`] for the two
//! standalone string-to-value conversions the facade is built from.

pub mod arch;
pub mod attacher;
pub mod children;
pub mod clock_ids;
pub mod cli;
pub mod elf_image;
pub mod error;
pub mod logging;
pub mod maps;
pub mod offset;
pub mod remote;
pub mod skew;
pub mod traced_program;

pub use clock_ids::encode_clk_ids;
pub use error::{Result, SkewError};
pub use offset::calculate_offset;
pub use skew::{get_skew, Config, Skew};
