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

//! Raw memory I/O against a traced process. Two paths, same shape as
//! `RemotePtr`'s peek/poke in the reverie tracer this module is grounded
//! on: `process_vm_readv`/`writev` when the mapping is writable and the
//! whole range is known up front, and a `ptrace(PEEKDATA/POKEDATA)`
//! word-at-a-time fallback for the VDSO page, which is typically mapped
//! read-only + executable and rejects `process_vm_writev`.

use std::io::{IoSlice, IoSliceMut};

use nix::sys::ptrace;
use nix::sys::uio::{process_vm_readv, process_vm_writev, RemoteIoVec};
use nix::unistd::Pid;

use crate::error::{Result, SkewError};

const WORD_SIZE: usize = std::mem::size_of::<i64>();

/// Reads `len` bytes from `addr` in `pid` via `process_vm_readv`.
pub fn read_fast(pid: Pid, addr: u64, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    let n = {
        let mut local = [IoSliceMut::new(&mut buf)];
        let remote = [RemoteIoVec {
            base: addr as usize,
            len,
        }];
        process_vm_readv(pid, &mut local, &remote)
            .map_err(|e| SkewError::MemoryIo(format!("process_vm_readv: {}", e)))?
    };
    if n != len {
        return Err(SkewError::MemoryIo(format!(
            "process_vm_readv: short read {} of {} bytes",
            n, len
        )));
    }
    Ok(buf)
}

/// Writes `data` to `addr` in `pid` via `process_vm_writev`.
pub fn write_fast(pid: Pid, addr: u64, data: &[u8]) -> Result<()> {
    let local = [IoSlice::new(data)];
    let remote = [RemoteIoVec {
        base: addr as usize,
        len: data.len(),
    }];
    let n = process_vm_writev(pid, &local, &remote)
        .map_err(|e| SkewError::MemoryIo(format!("process_vm_writev: {}", e)))?;
    if n != data.len() {
        return Err(SkewError::MemoryIo(format!(
            "process_vm_writev: short write {} of {} bytes",
            n,
            data.len()
        )));
    }
    Ok(())
}

/// Word-at-a-time read through `ptrace(PTRACE_PEEKDATA)`, required for
/// the VDSO page on kernels that refuse `process_vm_readv` against it.
pub fn read_slow(pid: Pid, addr: u64, len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(len + WORD_SIZE);
    let mut offset = 0usize;
    while offset < len {
        let word_addr = (addr as usize + offset) as ptrace::AddressType;
        let word = ptrace::read(pid, word_addr)
            .map_err(|e| SkewError::MemoryIo(format!("ptrace PEEKDATA at {:#x}: {}", addr + offset as u64, e)))?;
        out.extend_from_slice(&word.to_le_bytes());
        offset += WORD_SIZE;
    }
    out.truncate(len);
    Ok(out)
}

/// Builds one little-endian word out of a `data` chunk, zero-padding if
/// `chunk` is shorter than `WORD_SIZE` -- the bytes past `data`'s end are
/// never meant to carry over whatever was in the tracee before.
fn pad_word(chunk: &[u8]) -> i64 {
    if chunk.len() >= WORD_SIZE {
        i64::from_le_bytes(chunk[..WORD_SIZE].try_into().unwrap())
    } else {
        let mut bytes = [0u8; WORD_SIZE];
        bytes[..chunk.len()].copy_from_slice(chunk);
        i64::from_le_bytes(bytes)
    }
}

/// Word-at-a-time write through `ptrace(PTRACE_POKEDATA)`.
pub fn write_slow(pid: Pid, addr: u64, data: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < data.len() {
        let word_addr = (addr as usize + offset) as ptrace::AddressType;
        let word = pad_word(&data[offset..]);
        unsafe {
            ptrace::write(pid, word_addr, word as *mut std::ffi::c_void)
                .map_err(|e| SkewError::MemoryIo(format!("ptrace POKEDATA at {:#x}: {}", addr + offset as u64, e)))?;
        }
        offset += WORD_SIZE;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// `process_vm_readv`/`writev` work against one's own pid without any
    /// ptrace attach, which is enough to exercise the fast path's framing
    /// (`RemoteIoVec`, short-transfer detection) without a live tracee.
    #[test]
    fn fast_path_round_trips_own_memory() {
        let pid = nix::unistd::getpid();
        let mut buf = [0u8; 32];
        let addr = buf.as_mut_ptr() as u64;
        let data: Vec<u8> = (0..32).collect();

        write_fast(pid, addr, &data).unwrap();
        let read_back = read_fast(pid, addr, data.len()).unwrap();
        assert_eq!(read_back, data);
    }

    #[test]
    fn pad_word_zero_pads_a_partial_chunk() {
        let word = pad_word(&[0x11, 0x22, 0x33]);
        assert_eq!(word.to_le_bytes(), [0x11, 0x22, 0x33, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn pad_word_passes_through_a_full_chunk() {
        let chunk = [1u8, 2, 3, 4, 5, 6, 7, 8];
        assert_eq!(pad_word(&chunk), i64::from_le_bytes(chunk));
    }
}
