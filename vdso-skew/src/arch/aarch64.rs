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

use std::mem::MaybeUninit;

use nix::unistd::Pid;

use crate::error::{Result, SkewError};

use super::{ArchBackend, Regs};

pub struct Aarch64;

/// `svc #0`.
const SYSCALL_INSTR: [u8; 4] = [0x01, 0x00, 0x00, 0xd4];

/// ELF core-note type for the general-purpose register set, from
/// `<elf.h>`. The kernel never implemented `PTRACE_GETREGS`/`SETREGS` for
/// AArch64, only the generic `GETREGSET`/`SETREGSET` pair addressed by note
/// type.
const NT_PRSTATUS: i32 = 1;

/// `libc::ptrace` is declared variadic; nix has no AArch64 `getregs`, so
/// the register set is fetched through the generic `GETREGSET` request
/// with an `iovec` pointing at a `user_regs_struct`-shaped buffer.
unsafe fn ptrace_regset(request: i32, pid: Pid, iov: &mut libc::iovec) -> Result<()> {
    let ret = libc::ptrace(
        request as libc::c_int,
        pid.as_raw(),
        NT_PRSTATUS as *mut libc::c_void,
        iov as *mut libc::iovec as *mut libc::c_void,
    );
    if ret == -1 {
        return Err(SkewError::MemoryIo(format!(
            "ptrace GETREGSET/SETREGSET: {}",
            std::io::Error::last_os_error()
        )));
    }
    Ok(())
}

impl ArchBackend for Aarch64 {
    /// Two 8-byte words: a pointer word followed by the value word it
    /// points at. AArch64 has no PC-relative `mov`-immediate-then-jump
    /// idiom that reaches a full 64-bit literal in two instructions, so
    /// the generated code loads the variable through one level of
    /// indirection instead of encoding it inline.
    const VARIABLE_SLOT_SIZE: usize = 16;

    fn syscall_instr() -> &'static [u8] {
        &SYSCALL_INSTR
    }

    fn get_regs(pid: Pid) -> Result<Regs> {
        let mut regs = MaybeUninit::<Regs>::uninit();
        let mut iov = libc::iovec {
            iov_base: regs.as_mut_ptr() as *mut libc::c_void,
            iov_len: std::mem::size_of::<Regs>(),
        };
        unsafe {
            ptrace_regset(libc::PTRACE_GETREGSET, pid, &mut iov)?;
            Ok(regs.assume_init())
        }
    }

    fn set_regs(pid: Pid, regs: &Regs) -> Result<()> {
        let mut regs = *regs;
        let mut iov = libc::iovec {
            iov_base: &mut regs as *mut Regs as *mut libc::c_void,
            iov_len: std::mem::size_of::<Regs>(),
        };
        unsafe { ptrace_regset(libc::PTRACE_SETREGSET, pid, &mut iov) }
    }

    fn get_ip(regs: &Regs) -> u64 {
        regs.pc
    }

    fn set_ip(regs: &mut Regs, ip: u64) {
        regs.pc = ip;
    }

    fn set_syscall(regs: &mut Regs, nr: u64, args: &[u64]) -> Result<(), &'static str> {
        if args.len() > 6 {
            return Err("aarch64 syscalls take at most 6 arguments");
        }
        regs.regs[8] = nr;
        for (i, value) in args.iter().copied().enumerate() {
            regs.regs[i] = value;
        }
        Ok(())
    }

    fn syscall_return(regs: &Regs) -> u64 {
        regs.regs[0]
    }

    /// `ldr x9, #8; br x9; <8-byte target>` -- 16 bytes. AArch64's `br`
    /// needs the target already in a register, so the trampoline loads
    /// it from the literal pool trailing the two instructions rather than
    /// encoding it as an immediate.
    fn trampoline_bytes(target: u64) -> Vec<u8> {
        let mut bytes = vec![0x49, 0x00, 0x00, 0x58, 0x20, 0x01, 0x1f, 0xd6];
        bytes.extend_from_slice(&target.to_le_bytes());
        bytes
    }

    fn variable_writes(entry_start: u64, offset: u64, value: u64) -> Vec<(u64, u64)> {
        let slot = entry_start + offset;
        vec![(slot, slot + 8), (slot + 8, value)]
    }

    fn kernel_symbol_prefix() -> Option<&'static str> {
        Some("__kernel_")
    }
}
