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

//! The Fake-Image Attacher: maps a relocated [`FakeImage`] into a traced
//! process and splices a trampoline over the VDSO function it replaces.
//!
//! Every ptrace call in here must come from the same OS thread for the
//! whole attach/recover sequence -- the original tool pins its goroutine
//! to its OS thread for exactly this reason. Rust has no scheduler that
//! migrates a thread mid-function the way Go's does, so a plain `&self`
//! call sequence already gives that guarantee; nothing extra is needed.

use std::collections::HashMap;

use libc::{MAP_ANONYMOUS, MAP_PRIVATE, PROT_EXEC, PROT_READ, PROT_WRITE};

use crate::arch::{ArchBackend, Current as Arch};
use crate::elf_image::FakeImage;
use crate::error::{Result, SkewError};
use crate::maps::MapEntry;
use crate::traced_program::TracedProgram;

/// Returns the address a previous injection is still mapped at, if the
/// bytes at `fake_entry.start` -- stripped of the variable-slot tail, which
/// legitimately changes across injections with different variable values --
/// still match `image.content` stripped the same way. A read failure or a
/// mismatch (an unrelated mapping reusing that address, say) is treated as
/// absent rather than as an error: `inject` just redoes the work.
fn find_injected_image(traced: &TracedProgram, image: &FakeImage) -> Result<Option<u64>> {
    let entry = match &image.fake_entry {
        Some(e) => e,
        None => return Ok(None),
    };
    let current = match traced.read_mem(entry.start_addr, image.content.len()) {
        Ok(bytes) => bytes,
        Err(_) => return Ok(None),
    };
    let tail = image.offset_table.len() * Arch::VARIABLE_SLOT_SIZE;
    let code_len = image.content.len().saturating_sub(tail);
    if current[..code_len] == image.content[..code_len] {
        Ok(Some(entry.start_addr))
    } else {
        Ok(None)
    }
}

/// Undoes a trampoline write, restoring the hijacked function's original
/// bytes. Called both by [`recover`] and, on a best-effort basis, after a
/// failed or partial [`inject`].
fn try_rewrite_fake_image(traced: &TracedProgram, image: &FakeImage) -> Result<()> {
    match (image.origin_address, &image.origin_func_code) {
        (Some(addr), Some(code)) => traced
            .write_mem(addr, code)
            .map_err(|e| SkewError::Rollback(format!("restoring original code at {:#x}: {}", addr, e))),
        _ => Ok(()),
    }
}

/// Maps `image.content` into `pid`'s address space, pokes in `variables`,
/// and overwrites the VDSO function `image.symbol_name` with a trampoline
/// jumping to it. A no-op if [`find_injected_image`] shows the image is
/// already live in this process.
///
/// Pre-condition: `variables` supplies exactly one value per entry in
/// `image.offset_table` -- anything else is a caller bug, reported as
/// [`SkewError::Input`] rather than silently leaving a slot at zero.
pub fn inject(
    traced: &TracedProgram,
    vdso: &MapEntry,
    image: &mut FakeImage,
    variables: &HashMap<String, u64>,
) -> Result<()> {
    if variables.len() != image.offset_table.len() {
        return Err(SkewError::Input(format!(
            "{}: expected {} variable(s), got {}",
            image.symbol_name,
            image.offset_table.len(),
            variables.len()
        )));
    }

    if find_injected_image(traced, image)?.is_some() {
        return Ok(());
    }

    let sym_addr = traced.find_symbol(vdso, &image.symbol_name)?;

    let map_addr = traced.mmap(
        image.content.len(),
        PROT_READ | PROT_WRITE | PROT_EXEC,
        MAP_PRIVATE | MAP_ANONYMOUS,
    )?;

    let mut content = image.content.clone();
    for (name, value) in variables {
        if let Some(&offset) = image.offset_table.get(name) {
            for (addr, val) in Arch::variable_writes(map_addr, offset, *value) {
                let local_offset = (addr - map_addr) as usize;
                content[local_offset..local_offset + 8].copy_from_slice(&val.to_le_bytes());
            }
        }
    }
    traced.write_mem(map_addr, &content)?;

    let trampoline = Arch::trampoline_bytes(map_addr);
    let origin_code = traced.read_mem(sym_addr, trampoline.len())?;
    image.origin_address = Some(sym_addr);
    image.origin_func_code = Some(origin_code);

    if let Err(e) = traced.write_mem(sym_addr, &trampoline) {
        try_rewrite_fake_image(traced, image)?;
        return Err(e);
    }

    image.fake_entry = Some(MapEntry {
        start_addr: map_addr,
        end_addr: map_addr + content.len() as u64,
        perms: "rwxp".to_string(),
        padding_size: 0,
        path: String::new(),
    });
    Ok(())
}

/// Reverses [`inject`] for one image, restoring the hijacked function's
/// original bytes. Leaves the mapped fake-image page behind -- it is
/// harmless once nothing jumps to it -- and clears the bookkeeping so a
/// later `inject` call starts fresh.
pub fn recover(traced: &TracedProgram, image: &mut FakeImage) -> Result<()> {
    try_rewrite_fake_image(traced, image)?;
    image.origin_address = None;
    image.origin_func_code = None;
    image.fake_entry = None;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Child, Command};

    use crate::elf_image::load_fake_image;

    fn spawn_sleeper() -> Child {
        Command::new("sleep")
            .arg("5")
            .spawn()
            .expect("failed to spawn sleep(1) for a live ptrace test")
    }

    fn clock_gettime_variables() -> HashMap<String, u64> {
        let mut variables = HashMap::new();
        variables.insert(vdso_skew_common::VAR_CLOCK_IDS_MASK.to_string(), 1u64);
        variables.insert(vdso_skew_common::VAR_TV_SEC_DELTA.to_string(), 3600u64);
        variables.insert(vdso_skew_common::VAR_TV_NSEC_DELTA.to_string(), 0u64);
        variables
    }

    #[test]
    fn inject_then_recover_round_trips_against_a_live_child() {
        let mut child = spawn_sleeper();
        let traced = TracedProgram::trace(child.id() as i32).expect("seize failed");
        let vdso = traced.find_vdso().expect("no [vdso] mapping found");

        let mut image = load_fake_image(
            vdso_skew_common::SYM_CLOCK_GETTIME,
            vdso_skew_fakeclock::FAKE_CLOCK_GETTIME_OBJ,
        )
        .expect("load_fake_image failed");
        let variables = clock_gettime_variables();

        inject(&traced, &vdso, &mut image, &variables).expect("inject failed");
        assert!(image.fake_entry.is_some());
        assert!(image.origin_func_code.is_some());

        // find_injected_image should recognize this as already-installed
        // and make the second call a no-op rather than re-mapping.
        let installed_at = image.fake_entry.as_ref().unwrap().start_addr;
        inject(&traced, &vdso, &mut image, &variables).expect("re-inject failed");
        assert_eq!(image.fake_entry.as_ref().unwrap().start_addr, installed_at);

        recover(&traced, &mut image).expect("recover failed");
        assert!(image.fake_entry.is_none());
        assert!(image.origin_func_code.is_none());
        assert!(image.origin_address.is_none());

        traced.detach().expect("detach failed");
        let _ = child.kill();
        let _ = child.wait();
    }

    #[test]
    fn inject_rejects_a_mismatched_variable_count() {
        let mut child = spawn_sleeper();
        let traced = TracedProgram::trace(child.id() as i32).expect("seize failed");
        let vdso = traced.find_vdso().expect("no [vdso] mapping found");

        let mut image = load_fake_image(
            vdso_skew_common::SYM_CLOCK_GETTIME,
            vdso_skew_fakeclock::FAKE_CLOCK_GETTIME_OBJ,
        )
        .expect("load_fake_image failed");

        let mut too_few = clock_gettime_variables();
        too_few.remove(vdso_skew_common::VAR_TV_NSEC_DELTA);

        let err = inject(&traced, &vdso, &mut image, &too_few).unwrap_err();
        assert!(matches!(err, SkewError::Input(_)));
        assert!(image.fake_entry.is_none());

        traced.detach().expect("detach failed");
        let _ = child.kill();
        let _ = child.wait();
    }
}
