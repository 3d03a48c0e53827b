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

//! The Fake-Image Loader: turns one of the embedded, freestanding `.o`
//! objects into a relocated, position-independent byte blob ready to be
//! poked over the target's VDSO page.
//!
//! The compiler emits `clock_gettime`/`gettimeofday` against three
//! external symbols -- the clock-id mask and the two skew deltas -- as
//! PC-relative references. There is no linker in this pipeline to resolve
//! them, so we do the linker's job by hand: read `.rela.text`, append one
//! storage slot per external symbol after `.text`, and patch each
//! reference to point at its slot.

use std::collections::HashMap;

use goblin::elf::Elf;

use crate::arch::{ArchBackend, Current as Arch};
use crate::error::{Result, SkewError};
use crate::maps::MapEntry;

/// A relocated function body, not yet mapped into any process.
#[derive(Debug, Clone)]
pub struct FakeImage {
    pub symbol_name: String,
    /// `.text` bytes followed by one [`crate::arch::ArchBackend::VARIABLE_SLOT_SIZE`]
    /// slot per external variable, in the order listed in `offset_table`.
    pub content: Vec<u8>,
    /// Byte offset of each external variable's slot within `content`,
    /// keyed by the variable's linker symbol name.
    pub offset_table: HashMap<String, u64>,
    /// The hijacked function's original machine code, saved so
    /// [`crate::attacher`] can roll back.
    pub origin_func_code: Option<Vec<u8>>,
    /// Address of the hijacked function inside the target, once injected.
    pub origin_address: Option<u64>,
    /// The VMA this image was mapped into, once injected.
    pub fake_entry: Option<MapEntry>,
}

/// Symbols the loader resolves relocations against. Any other undefined
/// symbol referenced from `.text` is an [`SkewError::ElfStructural`]: the
/// embedded objects are expected to be self-contained aside from these three.
const KNOWN_VARIABLES: &[&str] = &[
    vdso_skew_common::VAR_CLOCK_IDS_MASK,
    vdso_skew_common::VAR_TV_SEC_DELTA,
    vdso_skew_common::VAR_TV_NSEC_DELTA,
];

/// R_X86_64_PC32 / R_AARCH64_PREL32 both resolve to `S + A - P`: a
/// 32-bit, PC-relative displacement. Every relocation the freestanding
/// compilers emit for this code is one of those two, so a single
/// formula suffices for both architectures.
fn apply_pc_relative_fixup(text: &mut [u8], r_offset: u64, symbol_addr: i64, addend: i64) -> Result<()> {
    let r_offset = r_offset as usize;
    if r_offset + 4 > text.len() {
        return Err(SkewError::ElfStructural(format!(
            "relocation offset {} out of range for .text of length {}",
            r_offset,
            text.len()
        )));
    }
    let p = r_offset as i64;
    let value = (symbol_addr + addend - p) as i32;
    text[r_offset..r_offset + 4].copy_from_slice(&value.to_le_bytes());
    Ok(())
}

/// Parses one embedded `.o` and produces a relocated [`FakeImage`].
///
/// `symbol_name` names the function the object defines (`clock_gettime`
/// or `gettimeofday`); it is used only for diagnostics and for the
/// AArch64 `__kernel_<name>` symbol-lookup convention in
/// [`crate::traced_program`].
pub fn load_fake_image(symbol_name: &str, object_bytes: &[u8]) -> Result<FakeImage> {
    let elf = Elf::parse(object_bytes)?;

    let expected_machine = if cfg!(target_arch = "x86_64") {
        goblin::elf::header::EM_X86_64
    } else {
        goblin::elf::header::EM_AARCH64
    };
    if elf.header.e_machine != expected_machine {
        return Err(SkewError::ElfStructural(format!(
            "{}: unsupported ELF machine type {} (expected {})",
            symbol_name, elf.header.e_machine, expected_machine
        )));
    }

    let text_idx = elf
        .section_headers
        .iter()
        .position(|sh| elf.shdr_strtab.get_at(sh.sh_name) == Some(".text"))
        .ok_or_else(|| SkewError::ElfStructural(format!("{}: no .text section", symbol_name)))?;
    let text_hdr = &elf.section_headers[text_idx];
    let start = text_hdr.sh_offset as usize;
    let end = start + text_hdr.sh_size as usize;
    if end > object_bytes.len() {
        return Err(SkewError::ElfStructural(format!(
            "{}: .text section runs past end of object",
            symbol_name
        )));
    }
    let mut text = object_bytes[start..end].to_vec();

    let relocs = elf
        .shdr_relocs
        .iter()
        .find(|(idx, _)| *idx == text_idx)
        .map(|(_, section)| section);

    let mut offset_table: HashMap<String, u64> = HashMap::new();
    let slot_size = Arch::VARIABLE_SLOT_SIZE as u64;

    if let Some(section) = relocs {
        for reloc in section.iter() {
            let sym = elf.syms.get(reloc.r_sym).ok_or_else(|| {
                SkewError::ElfStructural(format!(
                    "{}: relocation refers to missing symbol index {}",
                    symbol_name, reloc.r_sym
                ))
            })?;
            let sym_name = elf.strtab.get_at(sym.st_name).unwrap_or("").to_string();

            if !KNOWN_VARIABLES.contains(&sym_name.as_str()) {
                return Err(SkewError::ElfStructural(format!(
                    "{}: unexpected undefined symbol {:?} in relocation",
                    symbol_name, sym_name
                )));
            }

            // The slot lives at `text.len() + n * slot_size` but hasn't been
            // appended yet; its address relative to the start of `content`
            // (which is what the relocation's `S` operand must be, since
            // the whole blob is mapped as one contiguous region) is exactly
            // `slot_offset`.
            let slot_offset = match offset_table.get(&sym_name) {
                Some(&off) => off,
                None => {
                    let off = text.len() as u64 + offset_table.len() as u64 * slot_size;
                    offset_table.insert(sym_name.clone(), off);
                    off
                }
            };
            let addend = reloc.r_addend.unwrap_or(0);
            apply_pc_relative_fixup(&mut text, reloc.r_offset, slot_offset as i64, addend)?;
        }
    }

    let mut ordered: Vec<(&String, &u64)> = offset_table.iter().collect();
    ordered.sort_by_key(|(_, off)| **off);

    let mut content = text;
    for _ in &ordered {
        content.extend(std::iter::repeat(0u8).take(Arch::VARIABLE_SLOT_SIZE));
    }

    Ok(FakeImage {
        symbol_name: symbol_name.to_string(),
        content,
        offset_table,
        origin_func_code: None,
        origin_address: None,
        fake_entry: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pc_relative_fixup_writes_four_bytes_le() {
        let mut text = vec![0u8; 8];
        apply_pc_relative_fixup(&mut text, 4, 100, 0).unwrap();
        let value = i32::from_le_bytes(text[4..8].try_into().unwrap());
        assert_eq!(value, 100 - 4);
    }

    #[test]
    fn pc_relative_fixup_rejects_out_of_range_offset() {
        let mut text = vec![0u8; 4];
        assert!(apply_pc_relative_fixup(&mut text, 4, 0, 0).is_err());
    }
}
