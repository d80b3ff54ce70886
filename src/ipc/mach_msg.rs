//! `mach_msg` options and return codes
//!
//! The exception client always issues one combined send+receive with no
//! timeout: the reporting thread is already stopped waiting for a verdict,
//! so the wait is unbounded.
//!
//! ## Reply port release
//!
//! When the send half fails because the message itself was rejected
//! (invalid data, destination or header), the reply port never left this
//! task and can be handed back for reuse. Every other outcome releases it
//! by deallocation.

use core::fmt;

// ============================================================================
// Message Option Flags
// ============================================================================

/// Send a message
pub const MACH_SEND_MSG: u32 = 0x0000_0001;

/// Receive a message
pub const MACH_RCV_MSG: u32 = 0x0000_0002;

/// No options beyond send/receive
pub const MACH_MSG_OPTION_NONE: u32 = 0x0000_0000;

/// Never time out
pub const MACH_MSG_TIMEOUT_NONE: u32 = 0;

// ============================================================================
// Message Return Codes
// ============================================================================

/// Operation successful
pub const MACH_MSG_SUCCESS: i32 = 0;

/// Thread is waiting to send (interrupted)
pub const MACH_SEND_IN_PROGRESS: i32 = 0x1000_0001;
/// Invalid data (message, buffer, etc.)
pub const MACH_SEND_INVALID_DATA: i32 = 0x1000_0002;
/// Invalid destination port
pub const MACH_SEND_INVALID_DEST: i32 = 0x1000_0003;
/// Operation timed out
pub const MACH_SEND_TIMED_OUT: i32 = 0x1000_0004;
/// Software interrupt
pub const MACH_SEND_INTERRUPTED: i32 = 0x1000_0007;
/// Data doesn't contain a complete message
pub const MACH_SEND_MSG_TOO_SMALL: i32 = 0x1000_0008;
/// Invalid reply port
pub const MACH_SEND_INVALID_REPLY: i32 = 0x1000_0009;
/// Invalid port right
pub const MACH_SEND_INVALID_RIGHT: i32 = 0x1000_000a;
/// Invalid header
pub const MACH_SEND_INVALID_HEADER: i32 = 0x1000_0010;
/// Resource shortage
pub const MACH_SEND_NO_BUFFER: i32 = 0x1000_000d;

/// Invalid receive name
pub const MACH_RCV_INVALID_NAME: i32 = 0x1000_4002;
/// Operation timed out
pub const MACH_RCV_TIMED_OUT: i32 = 0x1000_4003;
/// Message too large for buffer
pub const MACH_RCV_TOO_LARGE: i32 = 0x1000_4004;
/// Operation interrupted
pub const MACH_RCV_INTERRUPTED: i32 = 0x1000_4005;
/// Port changed (moved to a set)
pub const MACH_RCV_PORT_CHANGED: i32 = 0x1000_4006;
/// Invalid data
pub const MACH_RCV_INVALID_DATA: i32 = 0x1000_4008;
/// Port died during receive
pub const MACH_RCV_PORT_DIED: i32 = 0x1000_4009;
/// Header error
pub const MACH_RCV_HEADER_ERROR: i32 = 0x1000_400b;
/// Body error
pub const MACH_RCV_BODY_ERROR: i32 = 0x1000_400c;

// ============================================================================
// Message Return Type
// ============================================================================

/// Return value from `mach_msg`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MachMsgReturn(pub i32);

impl MachMsgReturn {
    /// Success
    pub const SUCCESS: Self = Self(MACH_MSG_SUCCESS);

    /// Check if successful
    pub fn is_success(self) -> bool {
        self.0 == MACH_MSG_SUCCESS
    }

    /// Check if send error
    pub fn is_send_error(self) -> bool {
        (self.0 & 0x1000_0000) != 0 && (self.0 & 0x0000_4000) == 0
    }

    /// Check if receive error
    pub fn is_rcv_error(self) -> bool {
        (self.0 & 0x1000_4000) == 0x1000_4000
    }

    /// How the reply port must be released after this outcome
    pub fn reply_port_release(self) -> ReplyPortRelease {
        match self.0 {
            MACH_SEND_INVALID_DATA | MACH_SEND_INVALID_DEST | MACH_SEND_INVALID_HEADER => {
                ReplyPortRelease::Recycle
            }
            _ => ReplyPortRelease::Deallocate,
        }
    }

    /// Get error name for debugging
    pub fn name(self) -> &'static str {
        match self.0 {
            MACH_MSG_SUCCESS => "SUCCESS",
            MACH_SEND_IN_PROGRESS => "SEND_IN_PROGRESS",
            MACH_SEND_INVALID_DATA => "SEND_INVALID_DATA",
            MACH_SEND_INVALID_DEST => "SEND_INVALID_DEST",
            MACH_SEND_TIMED_OUT => "SEND_TIMED_OUT",
            MACH_SEND_INTERRUPTED => "SEND_INTERRUPTED",
            MACH_SEND_MSG_TOO_SMALL => "SEND_MSG_TOO_SMALL",
            MACH_SEND_INVALID_REPLY => "SEND_INVALID_REPLY",
            MACH_SEND_INVALID_RIGHT => "SEND_INVALID_RIGHT",
            MACH_SEND_INVALID_HEADER => "SEND_INVALID_HEADER",
            MACH_SEND_NO_BUFFER => "SEND_NO_BUFFER",
            MACH_RCV_INVALID_NAME => "RCV_INVALID_NAME",
            MACH_RCV_TIMED_OUT => "RCV_TIMED_OUT",
            MACH_RCV_TOO_LARGE => "RCV_TOO_LARGE",
            MACH_RCV_INTERRUPTED => "RCV_INTERRUPTED",
            MACH_RCV_PORT_CHANGED => "RCV_PORT_CHANGED",
            MACH_RCV_INVALID_DATA => "RCV_INVALID_DATA",
            MACH_RCV_PORT_DIED => "RCV_PORT_DIED",
            MACH_RCV_HEADER_ERROR => "RCV_HEADER_ERROR",
            MACH_RCV_BODY_ERROR => "RCV_BODY_ERROR",
            _ => "UNKNOWN",
        }
    }
}

impl Default for MachMsgReturn {
    fn default() -> Self {
        Self::SUCCESS
    }
}

impl From<i32> for MachMsgReturn {
    fn from(code: i32) -> Self {
        Self(code)
    }
}

impl fmt::Display for MachMsgReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MACH_{} ({:#x})", self.name(), self.0)
    }
}

/// What happens to the reply port once a call is over
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyPortRelease {
    /// Returned to the transport for reuse (`mig_put_reply_port`)
    Recycle,
    /// Destroyed (`mig_dealloc_reply_port`)
    Deallocate,
}

impl fmt::Display for ReplyPortRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplyPortRelease::Recycle => write!(f, "recycled"),
            ReplyPortRelease::Deallocate => write!(f, "deallocated"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_port_release_classes() {
        for code in [
            MACH_SEND_INVALID_DATA,
            MACH_SEND_INVALID_DEST,
            MACH_SEND_INVALID_HEADER,
        ] {
            assert_eq!(
                MachMsgReturn(code).reply_port_release(),
                ReplyPortRelease::Recycle
            );
        }

        for code in [
            MACH_MSG_SUCCESS,
            MACH_SEND_TIMED_OUT,
            MACH_RCV_TIMED_OUT,
            MACH_SEND_INTERRUPTED,
            MACH_RCV_PORT_DIED,
            5,
        ] {
            assert_eq!(
                MachMsgReturn(code).reply_port_release(),
                ReplyPortRelease::Deallocate
            );
        }
    }

    #[test]
    fn test_error_classes() {
        assert!(MachMsgReturn(MACH_SEND_INVALID_DEST).is_send_error());
        assert!(!MachMsgReturn(MACH_SEND_INVALID_DEST).is_rcv_error());
        assert!(MachMsgReturn(MACH_RCV_TIMED_OUT).is_rcv_error());
        assert!(!MachMsgReturn(MACH_RCV_TIMED_OUT).is_send_error());
        assert!(MachMsgReturn::SUCCESS.is_success());
    }

    #[test]
    fn test_names() {
        assert_eq!(MachMsgReturn(MACH_SEND_INVALID_HEADER).name(), "SEND_INVALID_HEADER");
        assert_eq!(MachMsgReturn(0x1234).name(), "UNKNOWN");
    }
}
