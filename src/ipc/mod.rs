//! Core Mach IPC types and constants
//!
//! This module provides the pieces every exception RPC is built from:
//! - Port names (borrowed capability tokens)
//! - Kernel return codes
//! - The message header and its bit helpers
//!
//! The wire codec lives in [`codec`], `mach_msg` return codes in
//! [`mach_msg`], and the transport seam in [`transport`].

use core::fmt;

pub mod codec;
pub mod mach_msg;
pub mod reply_port;
pub mod transport;

pub use codec::{MessageBuffer, MessageReader, MessageWriter, NdrRecord, PortDescriptor};
pub use mach_msg::{MachMsgReturn, ReplyPortRelease};
pub use reply_port::ReplyPortGuard;
pub use transport::{KernelTransport, MachTransport};

// ════════════════════════════════════════════════════════════
// Basic Types
// ════════════════════════════════════════════════════════════

/// A Mach port name (identifier)
///
/// Port names are process-local identifiers for ports. The client only
/// borrows them for the duration of one call; it never allocates or
/// releases the exception, thread or task ports it is handed.
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct PortName(pub u32);

impl PortName {
    /// Create a new port name
    pub const fn new(name: u32) -> Self {
        PortName(name)
    }

    /// Check if this is a null port
    pub const fn is_null(&self) -> bool {
        self.0 == MACH_PORT_NULL.0
    }

    /// Get the raw port name value
    pub const fn as_raw(&self) -> u32 {
        self.0
    }
}

impl From<u32> for PortName {
    fn from(value: u32) -> Self {
        PortName(value)
    }
}

impl From<PortName> for u32 {
    fn from(port: PortName) -> Self {
        port.0
    }
}

impl fmt::Display for PortName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Kernel return code (`kern_return_t`)
#[repr(transparent)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct KernReturn(pub i32);

impl KernReturn {
    /// Create a new kernel return code
    pub const fn new(code: i32) -> Self {
        KernReturn(code)
    }

    /// Check if this represents success
    pub const fn is_success(&self) -> bool {
        self.0 == KERN_SUCCESS.0
    }

    /// Get the raw return code value
    pub const fn as_raw(&self) -> i32 {
        self.0
    }

    /// Symbolic name for the common kernel and MIG codes
    pub fn name(&self) -> &'static str {
        match self.0 {
            0 => "KERN_SUCCESS",
            1 => "KERN_INVALID_ADDRESS",
            2 => "KERN_PROTECTION_FAILURE",
            3 => "KERN_NO_SPACE",
            4 => "KERN_INVALID_ARGUMENT",
            5 => "KERN_FAILURE",
            crate::mig::MIG_TYPE_ERROR => "MIG_TYPE_ERROR",
            crate::mig::MIG_REPLY_MISMATCH => "MIG_REPLY_MISMATCH",
            crate::mig::MIG_REMOTE_ERROR => "MIG_REMOTE_ERROR",
            crate::mig::MIG_BAD_ID => "MIG_BAD_ID",
            crate::mig::MIG_BAD_ARGUMENTS => "MIG_BAD_ARGUMENTS",
            crate::mig::MIG_NO_REPLY => "MIG_NO_REPLY",
            crate::mig::MIG_ARRAY_TOO_LARGE => "MIG_ARRAY_TOO_LARGE",
            crate::mig::MIG_SERVER_DIED => "MIG_SERVER_DIED",
            _ => "UNKNOWN",
        }
    }
}

impl From<i32> for KernReturn {
    fn from(value: i32) -> Self {
        KernReturn(value)
    }
}

impl From<KernReturn> for i32 {
    fn from(kr: KernReturn) -> Self {
        kr.0
    }
}

impl fmt::Display for KernReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#x})", self.name(), self.0)
    }
}

// ════════════════════════════════════════════════════════════
// Message Header
// ════════════════════════════════════════════════════════════

/// Mach message header
///
/// Every Mach message starts with these 24 bytes. On a request the remote
/// port is the destination and the local port is the reply port; the
/// kernel swaps them on delivery, so a well-formed reply carries a null
/// remote port.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct MachMsgHeader {
    /// Message and port flags
    pub msgh_bits: u32,
    /// Message size in bytes (trailer excluded)
    pub msgh_size: u32,
    /// Remote (destination) port
    pub msgh_remote_port: PortName,
    /// Local (reply) port
    pub msgh_local_port: PortName,
    /// Voucher port (always null here)
    pub msgh_voucher_port: PortName,
    /// Message ID
    pub msgh_id: i32,
}

impl MachMsgHeader {
    /// Encoded size of the header
    pub const SIZE: usize = 24;

    /// Create a new message header
    ///
    /// # Arguments
    ///
    /// * `msg_id` - Message identifier (subsystem-specific)
    /// * `msg_size` - Total message size including header
    pub fn new(msg_id: i32, msg_size: u32) -> Self {
        Self {
            msgh_bits: 0,
            msgh_size: msg_size,
            msgh_remote_port: MACH_PORT_NULL,
            msgh_local_port: MACH_PORT_NULL,
            msgh_voucher_port: MACH_PORT_NULL,
            msgh_id: msg_id,
        }
    }

    /// Set the remote (destination) port
    pub fn with_remote_port(mut self, port: PortName, disposition: u32) -> Self {
        self.msgh_remote_port = port;
        self.msgh_bits = (self.msgh_bits & !MACH_MSGH_BITS_REMOTE_MASK) | disposition;
        self
    }

    /// Set the local (reply) port
    pub fn with_local_port(mut self, port: PortName, disposition: u32) -> Self {
        self.msgh_local_port = port;
        self.msgh_bits = (self.msgh_bits & !MACH_MSGH_BITS_LOCAL_MASK) | (disposition << 8);
        self
    }

    /// Mark the message as carrying descriptors
    pub fn complex(mut self) -> Self {
        self.msgh_bits |= MACH_MSGH_BITS_COMPLEX;
        self
    }

    /// Does the message carry descriptors?
    pub const fn is_complex(&self) -> bool {
        self.msgh_bits & MACH_MSGH_BITS_COMPLEX != 0
    }

    /// Write the header at the start of a message
    pub fn encode(&self, w: &mut MessageWriter<'_>) {
        w.put_u32(self.msgh_bits);
        w.put_u32(self.msgh_size);
        w.put_u32(self.msgh_remote_port.0);
        w.put_u32(self.msgh_local_port.0);
        w.put_u32(self.msgh_voucher_port.0);
        w.put_i32(self.msgh_id);
    }

    /// Read the header from the start of a message
    pub fn decode(r: &mut MessageReader<'_>) -> Self {
        Self {
            msgh_bits: r.get_u32(),
            msgh_size: r.get_u32(),
            msgh_remote_port: PortName(r.get_u32()),
            msgh_local_port: PortName(r.get_u32()),
            msgh_voucher_port: PortName(r.get_u32()),
            msgh_id: r.get_i32(),
        }
    }
}

// ════════════════════════════════════════════════════════════
// Constants - Kern Return Codes
// ════════════════════════════════════════════════════════════

/// Operation completed successfully
pub const KERN_SUCCESS: KernReturn = KernReturn(0);

/// Invalid argument
pub const KERN_INVALID_ARGUMENT: KernReturn = KernReturn(4);

/// Operation failed
pub const KERN_FAILURE: KernReturn = KernReturn(5);

// ════════════════════════════════════════════════════════════
// Constants - Port Names
// ════════════════════════════════════════════════════════════

/// The null port (invalid port name)
pub const MACH_PORT_NULL: PortName = PortName(0);

// ════════════════════════════════════════════════════════════
// Constants - Port Dispositions
// ════════════════════════════════════════════════════════════

/// Copy send right
pub const MACH_MSG_TYPE_COPY_SEND: u8 = 19;

/// Make send-once right
pub const MACH_MSG_TYPE_MAKE_SEND_ONCE: u8 = 21;

/// Descriptor type tag for a port descriptor
pub const MACH_MSG_PORT_DESCRIPTOR: u8 = 0;

// ════════════════════════════════════════════════════════════
// Constants - Message Header Bits
// ════════════════════════════════════════════════════════════

/// Mask for remote port disposition
pub const MACH_MSGH_BITS_REMOTE_MASK: u32 = 0x0000_00ff;

/// Mask for local port disposition
pub const MACH_MSGH_BITS_LOCAL_MASK: u32 = 0x0000_ff00;

/// Message carries a descriptor body
pub const MACH_MSGH_BITS_COMPLEX: u32 = 0x8000_0000;

/// Create message header bits from port dispositions
#[allow(non_snake_case)]
pub const fn MACH_MSGH_BITS(remote: u32, local: u32) -> u32 {
    remote | (local << 8)
}

/// Extract remote port disposition from header bits
#[allow(non_snake_case)]
pub const fn MACH_MSGH_BITS_REMOTE(bits: u32) -> u32 {
    bits & MACH_MSGH_BITS_REMOTE_MASK
}

/// Extract local port disposition from header bits
#[allow(non_snake_case)]
pub const fn MACH_MSGH_BITS_LOCAL(bits: u32) -> u32 {
    (bits & MACH_MSGH_BITS_LOCAL_MASK) >> 8
}

/// Notification id the kernel substitutes when a send-once right dies
pub const MACH_NOTIFY_SEND_ONCE: i32 = 0o107;

// ════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_name() {
        let port = PortName::new(42);
        assert_eq!(port.as_raw(), 42);
        assert!(!port.is_null());
        assert!(MACH_PORT_NULL.is_null());
    }

    #[test]
    fn test_kern_return() {
        assert!(KERN_SUCCESS.is_success());
        assert!(!KERN_FAILURE.is_success());
        assert_eq!(KernReturn(-308).name(), "MIG_SERVER_DIED");
        assert_eq!(KernReturn(-305).to_string(), "MIG_NO_REPLY (0xfffffecf)");
    }

    #[test]
    fn test_msgh_bits() {
        let bits = MACH_MSGH_BITS(
            MACH_MSG_TYPE_COPY_SEND as u32,
            MACH_MSG_TYPE_MAKE_SEND_ONCE as u32,
        );

        assert_eq!(bits, 0x1513);
        assert_eq!(MACH_MSGH_BITS_REMOTE(bits), MACH_MSG_TYPE_COPY_SEND as u32);
        assert_eq!(MACH_MSGH_BITS_LOCAL(bits), MACH_MSG_TYPE_MAKE_SEND_ONCE as u32);
    }

    #[test]
    fn test_header_builders() {
        let header = MachMsgHeader::new(2405, 84)
            .with_remote_port(PortName(0x103), MACH_MSG_TYPE_COPY_SEND as u32)
            .with_local_port(PortName(0x207), MACH_MSG_TYPE_MAKE_SEND_ONCE as u32)
            .complex();

        assert!(header.is_complex());
        assert_eq!(header.msgh_bits, 0x8000_1513);
        assert_eq!(header.msgh_remote_port, PortName(0x103));
        assert_eq!(header.msgh_local_port, PortName(0x207));
    }

    #[test]
    fn test_header_wire_layout() {
        let mut buf = MessageBuffer::new();
        let header = MachMsgHeader::new(2406, 48)
            .with_remote_port(PortName(7), MACH_MSG_TYPE_COPY_SEND as u32);
        header.encode(&mut buf.writer());

        assert_eq!(&buf.as_bytes()[0..4], &0x13u32.to_le_bytes());
        assert_eq!(&buf.as_bytes()[4..8], &48u32.to_le_bytes());
        assert_eq!(&buf.as_bytes()[8..12], &7u32.to_le_bytes());
        assert_eq!(&buf.as_bytes()[20..24], &2406i32.to_le_bytes());

        let decoded = MachMsgHeader::decode(&mut buf.reader());
        assert_eq!(decoded, header);
    }
}
