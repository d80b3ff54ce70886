//! Exception Handling
//!
//! When a thread traps, the kernel (or a process acting on its behalf)
//! reports it to the exception port registered for that kind of
//! exception. What the report carries depends on the port's behavior:
//! - Default: thread and task identity plus the code words
//! - State: the thread's register state instead of its identity
//! - State identity: both
//!
//! Code words are 64-bit because only the `MACH_EXCEPTION_CODES` flavour of
//! the protocol is spoken here.

use core::fmt;

use crate::error::{ExcError, Result};
use crate::ipc::PortName;

// ============================================================================
// Exception Types
// ============================================================================

/// Exception type (`exception_type_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ExceptionType {
    /// Bad access (memory protection violation)
    BadAccess = 1,
    /// Bad instruction (illegal/privileged instruction)
    BadInstruction = 2,
    /// Arithmetic exception (divide by zero, overflow)
    Arithmetic = 3,
    /// Emulation instruction
    Emulation = 4,
    /// Software exception (user-generated)
    Software = 5,
    /// Breakpoint (debugger trap)
    Breakpoint = 6,
    /// System call exception
    Syscall = 7,
    /// Mach system call exception
    MachSyscall = 8,
    /// RPC alert
    RpcAlert = 9,
    /// Abnormal process exit
    Crash = 10,
    /// Hit a resource limit
    Resource = 11,
    /// Violated a guarded resource
    Guard = 12,
    /// Corpse notification
    CorpseNotify = 13,
}

impl ExceptionType {
    /// Every exception kind, in wire order
    pub const ALL: [ExceptionType; 13] = [
        Self::BadAccess,
        Self::BadInstruction,
        Self::Arithmetic,
        Self::Emulation,
        Self::Software,
        Self::Breakpoint,
        Self::Syscall,
        Self::MachSyscall,
        Self::RpcAlert,
        Self::Crash,
        Self::Resource,
        Self::Guard,
        Self::CorpseNotify,
    ];

    pub fn from_raw(val: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.as_raw() == val)
    }

    pub const fn as_raw(self) -> i32 {
        self as i32
    }

    /// Get exception name for debugging
    pub fn name(&self) -> &'static str {
        match self {
            Self::BadAccess => "EXC_BAD_ACCESS",
            Self::BadInstruction => "EXC_BAD_INSTRUCTION",
            Self::Arithmetic => "EXC_ARITHMETIC",
            Self::Emulation => "EXC_EMULATION",
            Self::Software => "EXC_SOFTWARE",
            Self::Breakpoint => "EXC_BREAKPOINT",
            Self::Syscall => "EXC_SYSCALL",
            Self::MachSyscall => "EXC_MACH_SYSCALL",
            Self::RpcAlert => "EXC_RPC_ALERT",
            Self::Crash => "EXC_CRASH",
            Self::Resource => "EXC_RESOURCE",
            Self::Guard => "EXC_GUARD",
            Self::CorpseNotify => "EXC_CORPSE_NOTIFY",
        }
    }
}

impl fmt::Display for ExceptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// Exception Behavior
// ============================================================================

/// Exception behavior flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExceptionBehavior(pub u32);

impl ExceptionBehavior {
    /// Default behavior (send exception message)
    pub const DEFAULT: Self = Self(1);
    /// State behavior (include thread state)
    pub const STATE: Self = Self(2);
    /// State identity behavior (include thread state and identity)
    pub const STATE_IDENTITY: Self = Self(3);
    /// Send 64-bit code words
    pub const MACH_EXCEPTION_CODES: u32 = 0x8000_0000;

    pub fn bits(self) -> u32 {
        self.0
    }

    /// Behavior with the flag bits stripped
    pub fn base(self) -> Self {
        Self(self.0 & !Self::MACH_EXCEPTION_CODES)
    }

    pub fn includes_state(self) -> bool {
        let base = self.base();
        base == Self::STATE || base == Self::STATE_IDENTITY
    }

    pub fn includes_identity(self) -> bool {
        let base = self.base();
        base == Self::DEFAULT || base == Self::STATE_IDENTITY
    }
}

// ============================================================================
// Exception Codes
// ============================================================================

/// Protocol maximum number of code words
pub const EXCEPTION_CODE_MAX: usize = 2;

/// Code and subcode words, at most two
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ExceptionCodes(heapless::Vec<i64, EXCEPTION_CODE_MAX>);

impl ExceptionCodes {
    /// Copy caller codes, rejecting more than the protocol carries
    pub fn from_slice(codes: &[i64]) -> Result<Self> {
        heapless::Vec::from_slice(codes)
            .map(Self)
            .map_err(|_| ExcError::ArgumentError {
                field: "code",
                len: codes.len(),
                max: EXCEPTION_CODE_MAX,
            })
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// ============================================================================
// Exception Report
// ============================================================================

/// One exception as reported to a handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionReport {
    /// Exception type
    pub exception: ExceptionType,
    /// Code words
    pub codes: ExceptionCodes,
    /// Faulting thread
    pub thread: PortName,
    /// Task owning the thread
    pub task: PortName,
}

impl ExceptionReport {
    pub fn new(
        exception: ExceptionType,
        codes: &[i64],
        thread: PortName,
        task: PortName,
    ) -> Result<Self> {
        Ok(Self {
            exception,
            codes: ExceptionCodes::from_slice(codes)?,
            thread,
            task,
        })
    }
}
