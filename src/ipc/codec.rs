//! Fixed-layout message codec
//!
//! MIG stubs overlay packed C structs on a union of request and reply.
//! Here the same bytes are produced by an explicit writer/reader pair over
//! one aligned buffer that serves as both the send and the receive area of
//! a combined `mach_msg` call.
//!
//! Integers are written little-endian, which is what the NDR record below
//! advertises (`int_rep = 1`) and what every Apple target uses natively.

use crate::ipc::{PortName, MACH_MSG_PORT_DESCRIPTOR};

/// Size of the shared send/receive buffer
///
/// Large enough for the biggest request (`mach_exception_raise_state_identity`
/// with two codes and a full 1296-word state: 5276 bytes) and the biggest
/// reply plus its trailer (5236 bytes).
pub const MESSAGE_BUFFER_SIZE: usize = 5280;

/// Size of the minimal trailer the kernel appends on receive
pub const MACH_MSG_TRAILER_SIZE: usize = 8;

/// Message buffer shared by request and reply
///
/// Aligned so the kernel transport can hand it to `mach_msg` directly.
#[repr(C, align(8))]
#[derive(Clone)]
pub struct MessageBuffer {
    bytes: [u8; MESSAGE_BUFFER_SIZE],
}

impl MessageBuffer {
    /// Create a zeroed buffer
    pub fn new() -> Self {
        Self {
            bytes: [0; MESSAGE_BUFFER_SIZE],
        }
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Raw bytes, mutable
    pub fn as_mut_bytes(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Pointer handed to `mach_msg`
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.bytes.as_mut_ptr()
    }

    /// Writer positioned at the start of the buffer
    pub fn writer(&mut self) -> MessageWriter<'_> {
        MessageWriter::new(&mut self.bytes)
    }

    /// Reader positioned at the start of the buffer
    pub fn reader(&self) -> MessageReader<'_> {
        MessageReader::new(&self.bytes)
    }

    /// Reader positioned at `offset`
    pub fn reader_at(&self, offset: usize) -> MessageReader<'_> {
        let mut r = MessageReader::new(&self.bytes);
        r.seek(offset);
        r
    }

    /// Clear the buffer between calls
    pub fn clear(&mut self) {
        self.bytes.fill(0);
    }

    /// Zero everything from `offset` to the end
    pub fn clear_from(&mut self, offset: usize) {
        let offset = offset.min(MESSAGE_BUFFER_SIZE);
        self.bytes[offset..].fill(0);
    }
}

impl Default for MessageBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for MessageBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MessageBuffer")
            .field("len", &MESSAGE_BUFFER_SIZE)
            .finish()
    }
}

// ════════════════════════════════════════════════════════════
// Writer / Reader
// ════════════════════════════════════════════════════════════

/// Sequential little-endian writer
///
/// Writes past the end of the buffer are a layout bug, not an input error:
/// every caller sizes its message against [`MESSAGE_BUFFER_SIZE`] first.
pub struct MessageWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl<'a> MessageWriter<'a> {
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes written so far
    pub fn position(&self) -> usize {
        self.pos
    }

    fn put_bytes(&mut self, bytes: &[u8]) {
        let end = self.pos + bytes.len();
        self.buf[self.pos..end].copy_from_slice(bytes);
        self.pos = end;
    }

    pub fn put_u8(&mut self, v: u8) {
        self.put_bytes(&[v]);
    }

    pub fn put_u16(&mut self, v: u16) {
        self.put_bytes(&v.to_le_bytes());
    }

    pub fn put_u32(&mut self, v: u32) {
        self.put_bytes(&v.to_le_bytes());
    }

    pub fn put_i32(&mut self, v: i32) {
        self.put_bytes(&v.to_le_bytes());
    }

    pub fn put_i64(&mut self, v: i64) {
        self.put_bytes(&v.to_le_bytes());
    }

    /// Write a counted array of 32-bit words (count is written separately)
    pub fn put_u32_slice(&mut self, words: &[u32]) {
        for w in words {
            self.put_u32(*w);
        }
    }

    /// Write a counted array of 64-bit integers
    pub fn put_i64_slice(&mut self, values: &[i64]) {
        for v in values {
            self.put_i64(*v);
        }
    }
}

/// Sequential little-endian reader
pub struct MessageReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> MessageReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn seek(&mut self, offset: usize) {
        self.pos = offset;
    }

    fn take<const N: usize>(&mut self) -> [u8; N] {
        let mut out = [0u8; N];
        out.copy_from_slice(&self.buf[self.pos..self.pos + N]);
        self.pos += N;
        out
    }

    pub fn get_u8(&mut self) -> u8 {
        self.take::<1>()[0]
    }

    pub fn get_u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take())
    }

    pub fn get_u32(&mut self) -> u32 {
        u32::from_le_bytes(self.take())
    }

    pub fn get_i32(&mut self) -> i32 {
        i32::from_le_bytes(self.take())
    }

    pub fn get_i64(&mut self) -> i64 {
        i64::from_le_bytes(self.take())
    }
}

// ════════════════════════════════════════════════════════════
// NDR Record
// ════════════════════════════════════════════════════════════

/// Canonical data representation record
///
/// Tells the receiver how the sender encoded integers, characters and
/// floats so both sides agree on the payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NdrRecord {
    pub mig_vers: u8,
    pub if_vers: u8,
    pub reserved1: u8,
    pub mig_encoding: u8,
    pub int_rep: u8,
    pub char_rep: u8,
    pub float_rep: u8,
    pub reserved2: u8,
}

impl NdrRecord {
    /// Encoded size
    pub const SIZE: usize = 8;

    /// Little-endian integers, ASCII characters, IEEE floats
    pub const NATIVE: Self = Self {
        mig_vers: 0,
        if_vers: 0,
        reserved1: 0,
        mig_encoding: 0,
        int_rep: 1,
        char_rep: 0,
        float_rep: 0,
        reserved2: 0,
    };

    pub fn encode(&self, w: &mut MessageWriter<'_>) {
        w.put_u8(self.mig_vers);
        w.put_u8(self.if_vers);
        w.put_u8(self.reserved1);
        w.put_u8(self.mig_encoding);
        w.put_u8(self.int_rep);
        w.put_u8(self.char_rep);
        w.put_u8(self.float_rep);
        w.put_u8(self.reserved2);
    }

    pub fn decode(r: &mut MessageReader<'_>) -> Self {
        Self {
            mig_vers: r.get_u8(),
            if_vers: r.get_u8(),
            reserved1: r.get_u8(),
            mig_encoding: r.get_u8(),
            int_rep: r.get_u8(),
            char_rep: r.get_u8(),
            float_rep: r.get_u8(),
            reserved2: r.get_u8(),
        }
    }
}

// ════════════════════════════════════════════════════════════
// Descriptors
// ════════════════════════════════════════════════════════════

/// Port descriptor in a complex message body (`mach_msg_port_descriptor_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortDescriptor {
    pub name: PortName,
    pub disposition: u8,
}

impl PortDescriptor {
    /// Encoded size: name, pad1, pad2:16, disposition:8, type:8
    pub const SIZE: usize = 12;

    pub fn new(name: PortName, disposition: u8) -> Self {
        Self { name, disposition }
    }

    pub fn encode(&self, w: &mut MessageWriter<'_>) {
        w.put_u32(self.name.0);
        w.put_u32(0);
        w.put_u16(0);
        w.put_u8(self.disposition);
        w.put_u8(MACH_MSG_PORT_DESCRIPTOR);
    }

    pub fn decode(r: &mut MessageReader<'_>) -> Self {
        let name = PortName(r.get_u32());
        let _pad1 = r.get_u32();
        let _pad2 = r.get_u16();
        let disposition = r.get_u8();
        let _type = r.get_u8();
        Self { name, disposition }
    }
}
