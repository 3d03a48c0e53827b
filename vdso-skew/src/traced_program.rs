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

//! `TracedProgram`: seizes every thread of a target, executes syscalls on
//! its behalf by rewriting registers and single-stepping over a planted
//! instruction, and locates the VDSO mapping and the symbols inside it.
//!
//! The seize/interrupt fixed point and the remote-syscall register dance
//! follow the same shape as `Remote`/`RemoteSyscall` in the reverie
//! tracer: attach without a `SIGSTOP` race, wait for the group-stop, then
//! treat the tracee as a CPU you can program one instruction at a time.

use std::fs;

use goblin::elf::Elf;
use lazy_static::lazy_static;
use nix::errno::Errno;
use nix::sys::ptrace;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::Pid;

use crate::arch::{self, ArchBackend, Current as Arch, Regs};
use crate::error::{Result, SkewError};
use crate::maps::{read_maps, MapEntry};
use crate::remote;

lazy_static! {
    /// `sysconf(_SC_PAGESIZE)` doesn't change at runtime; read it once.
    static ref PAGE_SIZE: usize = unsafe { libc::sysconf(libc::_SC_PAGESIZE) as usize };
}

/// One thread of the target, seized and ready to have syscalls run on it.
pub struct TracedProgram {
    pub pid: Pid,
    tids: Vec<Pid>,
}

/// Repeatedly lists `/proc/<pid>/task` and seizes any tid not seen before,
/// until a full pass adds nothing new -- the target may be creating
/// threads concurrently with the scan.
fn seize_all_threads(pid: Pid) -> Result<Vec<Pid>> {
    let mut seized = Vec::new();
    loop {
        let tids = list_tids(pid)?;
        let mut added = false;
        for tid in tids {
            if seized.contains(&tid) {
                continue;
            }
            match ptrace::seize(tid, ptrace::Options::PTRACE_O_TRACESYSGOOD) {
                Ok(()) => {
                    added = true;
                    seized.push(tid);
                }
                Err(Errno::ESRCH) => continue,
                Err(e) => {
                    return Err(SkewError::TargetGone(format!(
                        "seize tid {}: {}",
                        tid, e
                    )))
                }
            }
        }
        if !added {
            break;
        }
    }
    if seized.is_empty() {
        return Err(SkewError::TargetGone(format!("process {} has no threads", pid)));
    }
    Ok(seized)
}

fn list_tids(pid: Pid) -> Result<Vec<Pid>> {
    let dir = format!("/proc/{}/task", pid);
    let entries = fs::read_dir(&dir)
        .map_err(|e| SkewError::TargetGone(format!("read {}: {}", dir, e)))?;
    let mut tids = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| SkewError::TargetGone(e.to_string()))?;
        if let Some(name) = entry.file_name().to_str() {
            if let Ok(tid) = name.parse::<i32>() {
                tids.push(Pid::from_raw(tid));
            }
        }
    }
    Ok(tids)
}

/// Interrupts a seized tid and waits for its group-stop, so it is safe to
/// read/write registers and memory. A tid that has already exited is not
/// an error here: it simply drops out of the later steps.
fn stop_and_wait(tid: Pid) -> Result<bool> {
    if let Err(e) = ptrace::interrupt(tid) {
        if e == Errno::ESRCH {
            return Ok(false);
        }
        return Err(SkewError::TargetGone(format!("interrupt tid {}: {}", tid, e)));
    }
    match waitpid(tid, Some(WaitPidFlag::empty())) {
        Ok(WaitStatus::Exited(..)) | Ok(WaitStatus::Signaled(..)) => Ok(false),
        Ok(_) => Ok(true),
        Err(Errno::ECHILD) => Ok(false),
        Err(e) => Err(SkewError::TargetGone(format!("waitpid tid {}: {}", tid, e))),
    }
}

impl TracedProgram {
    /// Seizes every thread of `pid`, stopping each in turn.
    pub fn trace(pid: i32) -> Result<Self> {
        let pid = Pid::from_raw(pid);
        let tids = seize_all_threads(pid)?;
        let mut stopped = Vec::new();
        for tid in tids {
            if stop_and_wait(tid)? {
                stopped.push(tid);
            }
        }
        if stopped.is_empty() {
            return Err(SkewError::TargetGone(format!("process {} has no live threads", pid)));
        }
        Ok(TracedProgram { pid, tids: stopped })
    }

    /// Detaches every seized thread, letting the target resume normally.
    pub fn detach(&self) -> Result<()> {
        for &tid in &self.tids {
            if let Err(e) = ptrace::detach(tid, None) {
                if e != Errno::ESRCH {
                    return Err(SkewError::TargetGone(format!("detach tid {}: {}", tid, e)));
                }
            }
        }
        Ok(())
    }

    /// The lead thread, the one syscalls are executed on.
    fn lead(&self) -> Pid {
        self.tids[0]
    }

    pub fn get_regs(&self) -> Result<Regs> {
        Arch::get_regs(self.lead())
    }

    pub fn set_regs(&self, regs: &Regs) -> Result<()> {
        Arch::set_regs(self.lead(), regs)
    }

    pub fn read_mem(&self, addr: u64, len: usize) -> Result<Vec<u8>> {
        remote::read_fast(self.lead(), addr, len).or_else(|_| remote::read_slow(self.lead(), addr, len))
    }

    pub fn write_mem(&self, addr: u64, data: &[u8]) -> Result<()> {
        remote::write_fast(self.lead(), addr, data).or_else(|_| remote::write_slow(self.lead(), addr, data))
    }

    /// Executes a syscall on the lead thread by saving its registers,
    /// planting the architecture's syscall instruction at its current PC,
    /// loading the call number and arguments, single-stepping once, and
    /// restoring everything it overwrote. Returns the raw return register,
    /// without judging success -- callers that need the generic pass/fail
    /// check use [`Self::syscall`]; [`Self::mmap`] inspects the raw value
    /// itself so it can tell a bare zero return from a negative-errno one.
    fn syscall_raw(&self, nr: u64, args: &[u64]) -> Result<u64> {
        let saved_regs = self.get_regs()?;
        let ip = Arch::get_ip(&saved_regs);
        let instr = Arch::syscall_instr();
        let saved_code = self.read_mem(ip, instr.len())?;
        self.write_mem(ip, instr)?;

        let result = (|| -> Result<u64> {
            let mut regs = saved_regs;
            Arch::set_syscall(&mut regs, nr, args).map_err(|e| SkewError::RemoteSyscall(e.to_string()))?;
            Arch::set_ip(&mut regs, ip);
            self.set_regs(&regs)?;

            ptrace::step(self.lead(), None)
                .map_err(|e| SkewError::RemoteSyscall(format!("step: {}", e)))?;
            waitpid(self.lead(), Some(WaitPidFlag::empty()))
                .map_err(|e| SkewError::RemoteSyscall(format!("waitpid after step: {}", e)))?;

            let after = self.get_regs()?;
            Ok(Arch::syscall_return(&after))
        })();

        self.write_mem(ip, &saved_code)?;
        self.set_regs(&saved_regs)?;
        result
    }

    /// Executes a syscall on the lead thread and maps a 0 or negative-errno
    /// return to a [`SkewError::RemoteSyscall`].
    pub fn syscall(&self, nr: u64, args: &[u64]) -> Result<u64> {
        let ret = self.syscall_raw(nr, args)?;
        if arch::syscall_failed(ret) {
            return Err(SkewError::RemoteSyscall(format!(
                "syscall {} failed, errno {}",
                nr,
                arch::decode_errno(ret)
            )));
        }
        Ok(ret)
    }

    /// Remote `mmap`, rounded up to a whole page. A 0 return or a
    /// negative-errno return is treated as failure; the initial call is
    /// retried once at `max(size, 2*page)` before giving up.
    pub fn mmap(&self, len: usize, prot: i32, flags: i32) -> Result<u64> {
        let page = *PAGE_SIZE;
        let rounded = ((len + page - 1) / page) * page;
        let sizes = [rounded, std::cmp::max(rounded, 2 * page)];
        let mut last = 0u64;
        for size in sizes {
            let args = [0, size as u64, prot as u64, flags as u64, u64::MAX, 0];
            let ret = self.syscall_raw(libc::SYS_mmap as u64, &args)?;
            if !arch::syscall_failed(ret) {
                return Ok(ret);
            }
            last = ret;
        }
        Err(SkewError::RemoteSyscall(format!(
            "mmap failed twice, last return {:#x} (errno {})",
            last,
            arch::decode_errno(last)
        )))
    }

    /// Finds the `[vdso]` entry, scanning from the end of the map list:
    /// it is mapped late in process startup and a reverse scan finds it
    /// in one pass on every kernel this tool supports.
    pub fn find_vdso(&self) -> Result<MapEntry> {
        let maps = read_maps(self.pid.as_raw())?;
        maps.into_iter()
            .rev()
            .find(|m| m.path == vdso_skew_common::VDSO_MAP_PATH)
            .ok_or_else(|| SkewError::TargetGone(format!("no [vdso] mapping in process {}", self.pid)))
    }

    /// Looks up `name` inside the VDSO mapping by reading it out of the
    /// tracee and parsing it as an ELF shared object. An exact match on
    /// `name` always wins; only if none exists is the architecture's
    /// kernel-symbol alias (e.g. AArch64's `__kernel_` prefix) tried.
    pub fn find_symbol(&self, entry: &MapEntry, name: &str) -> Result<u64> {
        let image = self.read_mem(entry.start_addr, entry.size() as usize)?;
        let elf = Elf::parse(&image)?;

        let load_offset = elf
            .program_headers
            .iter()
            .find(|ph| ph.p_type == goblin::elf::program_header::PT_LOAD)
            .map(|ph| entry.start_addr - ph.p_vaddr)
            .unwrap_or(entry.start_addr);

        let resolve = |target: &str| {
            elf.dynsyms.iter().find_map(|sym| {
                let sym_name = elf.dynstrtab.get_at(sym.st_name).unwrap_or("");
                (sym_name == target).then(|| load_offset + sym.st_value)
            })
        };

        if let Some(addr) = resolve(name) {
            return Ok(addr);
        }
        if let Some(prefix) = Arch::kernel_symbol_prefix() {
            if let Some(addr) = resolve(&format!("{}{}", prefix, name)) {
                return Ok(addr);
            }
        }
        Err(SkewError::ElfStructural(format!(
            "symbol {} not found in [vdso]",
            name
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::{Child, Command};

    /// A short-lived child to seize/trace. `sleep` is available on every
    /// system this tool targets and outlives the few milliseconds a test
    /// needs it for.
    fn spawn_sleeper() -> Child {
        Command::new("sleep")
            .arg("5")
            .spawn()
            .expect("failed to spawn sleep(1) for a live ptrace test")
    }

    #[test]
    fn trace_seizes_reads_regs_and_detaches_a_live_child() {
        let mut child = spawn_sleeper();
        let traced = TracedProgram::trace(child.id() as i32).expect("seize failed");

        let regs = traced.get_regs().expect("get_regs failed");
        assert_ne!(Arch::get_ip(&regs), 0);

        let vdso = traced.find_vdso().expect("no [vdso] mapping found");
        assert!(vdso.size() > 0);

        traced.detach().expect("detach failed");
        let _ = child.kill();
        let _ = child.wait();
    }

    #[test]
    fn mmap_returns_a_usable_address_in_a_live_child() {
        let mut child = spawn_sleeper();
        let traced = TracedProgram::trace(child.id() as i32).expect("seize failed");

        let addr = traced
            .mmap(4096, libc::PROT_READ | libc::PROT_WRITE, libc::MAP_PRIVATE | libc::MAP_ANONYMOUS)
            .expect("mmap failed");
        assert_ne!(addr, 0);

        traced.detach().expect("detach failed");
        let _ = child.kill();
        let _ = child.wait();
    }
}
