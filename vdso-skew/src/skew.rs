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

//! `Config`/`get_skew`/`Skew`: the public facade over the attacher and
//! traced-program machinery. `Config` carries the already-resolved numeric
//! skew (delta seconds, delta nanoseconds, clock-id mask); the CLI front
//! end is what turns `--faketime`/`--clk-ids` strings into one via
//! [`crate::offset::calculate_offset`] and [`crate::clock_ids::encode_clk_ids`].

use std::collections::HashMap;
use std::sync::Mutex;

use crate::attacher;
use crate::elf_image::{self, FakeImage};
use crate::error::{Result, SkewError};
use crate::traced_program::TracedProgram;

/// The resolved skew a `Skew` facade applies to every pid it touches.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct Config {
    pub delta_seconds: i64,
    pub delta_nanoseconds: i64,
    pub clock_ids_mask: u64,
}

impl Config {
    pub fn new(delta_seconds: i64, delta_nanoseconds: i64, clock_ids_mask: u64) -> Self {
        Config {
            delta_seconds,
            delta_nanoseconds,
            clock_ids_mask,
        }
    }

    fn variables(&self) -> HashMap<String, u64> {
        let mut variables = HashMap::new();
        variables.insert(
            vdso_skew_common::VAR_CLOCK_IDS_MASK.to_string(),
            self.clock_ids_mask,
        );
        variables.insert(
            vdso_skew_common::VAR_TV_SEC_DELTA.to_string(),
            self.delta_seconds as u64,
        );
        variables.insert(
            vdso_skew_common::VAR_TV_NSEC_DELTA.to_string(),
            self.delta_nanoseconds as u64,
        );
        variables
    }
}

struct Images {
    clock_gettime: FakeImage,
    gettimeofday: FakeImage,
}

/// Restricts `variables` to the subset `image` actually references, so
/// each image's `attacher::inject` call sees exactly `|offset_table|`
/// entries: `clock_gettime` references all three skew variables,
/// `gettimeofday` only the two deltas, and `attacher::inject`'s
/// pre-condition requires an exact count match.
fn select_variables(image: &FakeImage, variables: &HashMap<String, u64>) -> HashMap<String, u64> {
    image
        .offset_table
        .keys()
        .filter_map(|name| variables.get(name).map(|&v| (name.clone(), v)))
        .collect()
}

fn load_images() -> Result<Images> {
    let clock_gettime = elf_image::load_fake_image(
        vdso_skew_common::SYM_CLOCK_GETTIME,
        vdso_skew_fakeclock::FAKE_CLOCK_GETTIME_OBJ,
    )?;
    let gettimeofday = elf_image::load_fake_image(
        vdso_skew_common::SYM_GETTIMEOFDAY,
        vdso_skew_fakeclock::FAKE_GETTIMEOFDAY_OBJ,
    )?;
    Ok(Images {
        clock_gettime,
        gettimeofday,
    })
}

/// Holds the two loaded fake images plus the variable values every
/// injection writes. The mutex serializes concurrent `inject`/`recover`
/// calls and guards `FakeImage.origin_func_code`/`origin_address`, per the
/// ordering guarantee that `clock_gettime` installs before `gettimeofday`.
pub struct Skew {
    images: Mutex<Images>,
    variables: HashMap<String, u64>,
}

/// Relocates both embedded fake images against `cfg`. Mirrors the
/// spec's `GetSkew` constructor.
pub fn get_skew(cfg: &Config) -> Result<Skew> {
    Ok(Skew {
        images: Mutex::new(load_images()?),
        variables: cfg.variables(),
    })
}

impl Skew {
    /// Seizes `pid`, injects `clock_gettime` then `gettimeofday`
    /// (idempotently, per [`attacher::inject`]), and detaches.
    pub fn inject(&self, pid: u64) -> Result<()> {
        let traced = TracedProgram::trace(pid as i32)?;
        let result = self.inject_into(&traced);
        traced.detach()?;
        result
    }

    fn inject_into(&self, traced: &TracedProgram) -> Result<()> {
        let vdso = traced.find_vdso()?;
        let mut images = self.images.lock().unwrap();
        let clock_gettime_vars = select_variables(&images.clock_gettime, &self.variables);
        attacher::inject(traced, &vdso, &mut images.clock_gettime, &clock_gettime_vars)?;
        let gettimeofday_vars = select_variables(&images.gettimeofday, &self.variables);
        attacher::inject(traced, &vdso, &mut images.gettimeofday, &gettimeofday_vars)?;
        Ok(())
    }

    /// Restores both hijacked VDSO functions in `pid` to their original
    /// code. `gettimeofday` is always attempted even if `clock_gettime`'s
    /// recovery fails -- per §4.8 the two recoveries are unconditional and
    /// independent; if both fail, both are reported as an aggregate.
    pub fn recover(&self, pid: u64) -> Result<()> {
        let traced = TracedProgram::trace(pid as i32)?;
        let (clock_gettime_result, gettimeofday_result) = {
            let mut images = self.images.lock().unwrap();
            let clock_gettime_result = attacher::recover(&traced, &mut images.clock_gettime);
            let gettimeofday_result = attacher::recover(&traced, &mut images.gettimeofday);
            (clock_gettime_result, gettimeofday_result)
        };
        traced.detach()?;
        match (clock_gettime_result, gettimeofday_result) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(a), Err(b)) => Err(SkewError::Rollback(format!(
                "clock_gettime recover failed ({}); gettimeofday recover failed ({})",
                a, b
            ))),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
        }
    }

    /// Produces an independent `Skew` carrying the same variables but
    /// freshly loaded, unattached fake images. Per design notes §9,
    /// `FakeImage.fake_entry` is a back-reference into a specific tracee,
    /// not a handle to clone; a forked tracer process gets clean state
    /// rather than inheriting addresses that describe someone else's
    /// attach history.
    pub fn fork(&self) -> Result<Skew> {
        Ok(Skew {
            images: Mutex::new(load_images()?),
            variables: self.variables.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Child, Command};

    fn spawn_sleeper() -> Child {
        Command::new("sleep")
            .arg("5")
            .spawn()
            .expect("failed to spawn sleep(1) for a live ptrace test")
    }

    #[test]
    fn inject_then_recover_against_a_live_child() {
        let mut child = spawn_sleeper();
        let cfg = Config::new(3600, 0, 1);
        let skew = get_skew(&cfg).expect("get_skew failed");

        skew.inject(child.id() as u64).expect("inject failed");
        skew.recover(child.id() as u64).expect("recover failed");

        let _ = child.kill();
        let _ = child.wait();
    }

    #[test]
    fn fork_produces_an_independent_skew_with_the_same_variables() {
        let cfg = Config::new(60, 500, 3);
        let skew = get_skew(&cfg).expect("get_skew failed");
        let forked = skew.fork().expect("fork failed");
        assert_eq!(forked.variables, skew.variables);
    }
}
