//! Error types for exception RPCs

use thiserror::Error;

use crate::ipc::{KernReturn, MachMsgReturn, ReplyPortRelease, KERN_INVALID_ARGUMENT};
use crate::kern::ExceptionBehavior;
use crate::mig::{MIG_ARRAY_TOO_LARGE, MIG_REPLY_MISMATCH, MIG_SERVER_DIED, MIG_TYPE_ERROR};

/// Result type for exception RPCs
pub type Result<T> = core::result::Result<T, ExcError>;

/// Errors that can end an exception RPC
///
/// Every variant is terminal for the call that produced it; nothing is
/// retried internally.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExcError {
    /// Caller-supplied array exceeds the protocol bound; nothing was sent
    #[error("{field} has {len} elements (max: {max})")]
    ArgumentError {
        field: &'static str,
        len: usize,
        max: usize,
    },

    /// Behavior names no exception routine; nothing was sent
    #[error("unsupported exception behavior {:#x}", .0.bits())]
    UnsupportedBehavior(ExceptionBehavior),

    /// `mach_msg` itself failed
    #[error("mach_msg failed: {code}, reply port {reply_port}")]
    Transport {
        code: MachMsgReturn,
        reply_port: ReplyPortRelease,
    },

    /// Reply id is not the one this routine expects
    #[error("reply id mismatch: expected {expected}, got {actual}")]
    ProtocolMismatch { expected: i32, actual: i32 },

    /// The handler went away before replying
    #[error("remote process died")]
    RemoteTerminated,

    /// Reply framing or size doesn't fit the routine's reply shape
    #[error("malformed reply: {0}")]
    TypeError(&'static str),

    /// The handler answered with a failure status
    #[error("remote returned {0}")]
    RemoteStatus(KernReturn),

    /// Reply state was larger than the protocol allows; the output buffer
    /// holds the first [`crate::kern::THREAD_STATE_MAX`] words anyway
    #[error("reply state has {count} words (max: {max}), output truncated")]
    ArrayTooLarge { count: u32, max: usize },
}

impl ExcError {
    /// The `kern_return_t` a MIG stub would have returned
    pub fn kern_return(&self) -> KernReturn {
        match self {
            ExcError::ArgumentError { .. } | ExcError::ArrayTooLarge { .. } => {
                KernReturn(MIG_ARRAY_TOO_LARGE)
            }
            ExcError::UnsupportedBehavior(_) => KERN_INVALID_ARGUMENT,
            ExcError::Transport { code, .. } => KernReturn(code.0),
            ExcError::ProtocolMismatch { .. } => KernReturn(MIG_REPLY_MISMATCH),
            ExcError::RemoteTerminated => KernReturn(MIG_SERVER_DIED),
            ExcError::TypeError(_) => KernReturn(MIG_TYPE_ERROR),
            ExcError::RemoteStatus(kr) => *kr,
        }
    }

    /// Was anything put on the wire before this error?
    pub fn was_sent(&self) -> bool {
        !matches!(
            self,
            ExcError::ArgumentError { .. } | ExcError::UnsupportedBehavior(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ipc::mach_msg::MACH_SEND_INVALID_DEST;

    #[test]
    fn test_kern_return_mapping() {
        let cases = [
            (
                ExcError::ArgumentError {
                    field: "code",
                    len: 3,
                    max: 2,
                },
                -307,
            ),
            (
                ExcError::Transport {
                    code: MachMsgReturn(MACH_SEND_INVALID_DEST),
                    reply_port: ReplyPortRelease::Recycle,
                },
                MACH_SEND_INVALID_DEST,
            ),
            (
                ExcError::ProtocolMismatch {
                    expected: 2505,
                    actual: 9,
                },
                -301,
            ),
            (ExcError::UnsupportedBehavior(ExceptionBehavior(4)), 4),
            (ExcError::RemoteTerminated, -308),
            (ExcError::TypeError("size"), -300),
            (ExcError::RemoteStatus(KernReturn(5)), 5),
            (ExcError::ArrayTooLarge { count: 2000, max: 1296 }, -307),
        ];

        for (err, code) in cases {
            assert_eq!(err.kern_return(), KernReturn(code), "{err}");
        }
    }

    #[test]
    fn test_display() {
        let err = ExcError::Transport {
            code: MachMsgReturn(MACH_SEND_INVALID_DEST),
            reply_port: ReplyPortRelease::Recycle,
        };
        assert_eq!(
            err.to_string(),
            "mach_msg failed: MACH_SEND_INVALID_DEST (0x10000003), reply port recycled"
        );
        assert!(!ExcError::ArgumentError {
            field: "code",
            len: 3,
            max: 2
        }
        .was_sent());
    }
}
