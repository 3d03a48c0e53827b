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

use nix::sys::ptrace;
use nix::unistd::Pid;

use crate::error::{Result, SkewError};

use super::{ArchBackend, Regs};

pub struct X86_64;

/// `syscall` -- two bytes, fixed regardless of the call number.
const SYSCALL_INSTR: [u8; 2] = [0x0f, 0x05];

impl ArchBackend for X86_64 {
    const VARIABLE_SLOT_SIZE: usize = 8;

    fn syscall_instr() -> &'static [u8] {
        &SYSCALL_INSTR
    }

    fn get_regs(pid: Pid) -> Result<Regs> {
        ptrace::getregs(pid).map_err(|e| SkewError::MemoryIo(format!("getregs: {}", e)))
    }

    fn set_regs(pid: Pid, regs: &Regs) -> Result<()> {
        ptrace::setregs(pid, *regs).map_err(|e| SkewError::MemoryIo(format!("setregs: {}", e)))
    }

    fn get_ip(regs: &Regs) -> u64 {
        regs.rip
    }

    fn set_ip(regs: &mut Regs, ip: u64) {
        regs.rip = ip;
    }

    fn set_syscall(regs: &mut Regs, nr: u64, args: &[u64]) -> Result<(), &'static str> {
        if args.len() > 6 {
            return Err("x86-64 syscalls take at most 6 arguments");
        }
        regs.rax = nr;
        let slots = [
            &mut regs.rdi,
            &mut regs.rsi,
            &mut regs.rdx,
            &mut regs.r10,
            &mut regs.r8,
            &mut regs.r9,
        ];
        for (slot, value) in slots.into_iter().zip(args.iter().copied()) {
            *slot = value;
        }
        Ok(())
    }

    fn syscall_return(regs: &Regs) -> u64 {
        regs.rax
    }

    /// `movabs rax, target; jmp rax` -- 12 bytes, the same trampoline shape
    /// used to hijack the hooked syscall in `patch_syscall` (see the
    /// reverie tracer this module's ptrace loop is grounded on), here
    /// landing on the VDSO entry point instead of an extended jump.
    fn trampoline_bytes(target: u64) -> Vec<u8> {
        let mut bytes = vec![0x48, 0xb8];
        bytes.extend_from_slice(&target.to_le_bytes());
        bytes.extend_from_slice(&[0xff, 0xe0]);
        bytes
    }

    /// One slot, one write: the value lands directly at `entry_start + offset`.
    fn variable_writes(entry_start: u64, offset: u64, value: u64) -> Vec<(u64, u64)> {
        vec![(entry_start + offset, value)]
    }

    fn kernel_symbol_prefix() -> Option<&'static str> {
        None
    }
}
