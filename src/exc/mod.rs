//! `mach_exc` subsystem, user side
//!
//! Three routines report an exception to a handler port and wait for its
//! verdict:
//!
//! | routine                                | request | reply |
//! |----------------------------------------|---------|-------|
//! | `mach_exception_raise`                 | 2405    | 2505  |
//! | `mach_exception_raise_state`           | 2406    | 2506  |
//! | `mach_exception_raise_state_identity`  | 2407    | 2507  |
//!
//! [`request`] encodes, [`reply`] validates and decodes, and
//! [`MachExcClient`] drives one blocking round trip per call.

use core::fmt;

use crate::kern::THREAD_STATE_MAX;
use crate::mig::{LayoutBuilder, MessageLayout, MIG_REPLY_ID_OFFSET};

pub mod client;
pub mod reply;
pub mod request;

pub use client::MachExcClient;

/// Subsystem base id
pub const MACH_EXC_SUBSYSTEM_BASE: i32 = 2405;

/// Size of a bare `mig_reply_error_t` (header, NDR, RetCode)
pub const MIG_REPLY_ERROR_SIZE: usize = 36;

/// The three routines of the subsystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExcRoutine {
    Raise,
    RaiseState,
    RaiseStateIdentity,
}

impl ExcRoutine {
    pub const fn request_id(self) -> i32 {
        match self {
            ExcRoutine::Raise => MACH_EXC_SUBSYSTEM_BASE,
            ExcRoutine::RaiseState => MACH_EXC_SUBSYSTEM_BASE + 1,
            ExcRoutine::RaiseStateIdentity => MACH_EXC_SUBSYSTEM_BASE + 2,
        }
    }

    pub const fn reply_id(self) -> i32 {
        self.request_id() + MIG_REPLY_ID_OFFSET
    }

    /// Does the request carry thread/task port descriptors?
    pub const fn carries_identity(self) -> bool {
        matches!(self, ExcRoutine::Raise | ExcRoutine::RaiseStateIdentity)
    }

    /// Does the request/reply carry a thread state?
    pub const fn carries_state(self) -> bool {
        matches!(self, ExcRoutine::RaiseState | ExcRoutine::RaiseStateIdentity)
    }

    pub fn name(self) -> &'static str {
        match self {
            ExcRoutine::Raise => "mach_exception_raise",
            ExcRoutine::RaiseState => "mach_exception_raise_state",
            ExcRoutine::RaiseStateIdentity => "mach_exception_raise_state_identity",
        }
    }

    /// Request layout
    pub fn request_layout(self) -> MessageLayout {
        let mut b = LayoutBuilder::new();
        if self.carries_identity() {
            b = b.port_descriptor("thread").port_descriptor("task");
        }
        b = b
            .ndr()
            .scalar("exception", 4)
            .array("codeCnt", "code", 8, crate::kern::exception::EXCEPTION_CODE_MAX);
        if self.carries_state() {
            b = b
                .scalar("flavor", 4)
                .array("old_stateCnt", "old_state", 4, THREAD_STATE_MAX);
        }
        b.build()
    }

    /// Reply layout (trailer excluded)
    pub fn reply_layout(self) -> MessageLayout {
        let mut b = LayoutBuilder::new().ndr().scalar("RetCode", 4);
        if self.carries_state() {
            b = b
                .scalar("flavor", 4)
                .array("new_stateCnt", "new_state", 4, THREAD_STATE_MAX);
        }
        b.build()
    }
}

impl fmt::Display for ExcRoutine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Request and reply layouts of one routine
#[derive(Debug, Clone)]
pub struct RoutineLayout {
    pub request: MessageLayout,
    pub reply: MessageLayout,
}

/// Layouts of all three routines, computed once per client
#[derive(Debug, Clone)]
pub struct ExcLayouts {
    raise: RoutineLayout,
    raise_state: RoutineLayout,
    raise_state_identity: RoutineLayout,
}

impl ExcLayouts {
    pub fn new() -> Self {
        let of = |r: ExcRoutine| RoutineLayout {
            request: r.request_layout(),
            reply: r.reply_layout(),
        };
        Self {
            raise: of(ExcRoutine::Raise),
            raise_state: of(ExcRoutine::RaiseState),
            raise_state_identity: of(ExcRoutine::RaiseStateIdentity),
        }
    }

    pub fn get(&self, routine: ExcRoutine) -> &RoutineLayout {
        match routine {
            ExcRoutine::Raise => &self.raise,
            ExcRoutine::RaiseState => &self.raise_state,
            ExcRoutine::RaiseStateIdentity => &self.raise_state_identity,
        }
    }
}

impl Default for ExcLayouts {
    fn default() -> Self {
        Self::new()
    }
}
