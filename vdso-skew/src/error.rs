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

//! The six error kinds of the design: input, target-gone, ELF-structural,
//! remote-syscall failure, memory I/O failure, rollback failure. Kept as a
//! flat enum rather than a tree of wrapped `Box<dyn Error>`, the way the
//! teacher crate favors a formatted `std::io::Error` over an error-derive
//! crate (none of the pack's five repos pull one in).

use std::fmt;

#[derive(Debug)]
pub enum SkewError {
    /// Unknown clock-ID name, malformed offset string, mismatched
    /// variable count.
    Input(String),
    /// The tracee or one of its tids exited during attach/detach.
    TargetGone(String),
    /// The embedded object or the in-process VDSO failed to parse, or a
    /// required section/symbol/machine type is missing/unsupported.
    ElfStructural(String),
    /// A remote-executed syscall (currently only `mmap`) returned 0 or a
    /// negative errno encoded in the return register.
    RemoteSyscall(String),
    /// `process_vm_{read,write}v` or a `ptrace_*` call failed.
    MemoryIo(String),
    /// `TryReWriteFakeImage` itself failed while rolling back a prior
    /// error. The target is now in an inconsistent state.
    Rollback(String),
}

impl fmt::Display for SkewError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkewError::Input(msg) => write!(f, "input error: {}", msg),
            SkewError::TargetGone(msg) => write!(f, "target gone: {}", msg),
            SkewError::ElfStructural(msg) => write!(f, "elf structural error: {}", msg),
            SkewError::RemoteSyscall(msg) => write!(f, "remote syscall failed: {}", msg),
            SkewError::MemoryIo(msg) => write!(f, "memory i/o failed: {}", msg),
            SkewError::Rollback(msg) => {
                write!(f, "rollback failed, target left inconsistent: {}", msg)
            }
        }
    }
}

impl std::error::Error for SkewError {}

impl From<std::io::Error> for SkewError {
    fn from(e: std::io::Error) -> Self {
        SkewError::MemoryIo(e.to_string())
    }
}

impl From<nix::Error> for SkewError {
    fn from(e: nix::Error) -> Self {
        SkewError::MemoryIo(e.to_string())
    }
}

impl From<goblin::error::Error> for SkewError {
    fn from(e: goblin::error::Error) -> Self {
        SkewError::ElfStructural(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SkewError>;
