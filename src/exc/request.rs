//! Request encoding
//!
//! Field order follows the routine layouts in [`super::ExcRoutine`]. Arrays
//! are packed, so everything after `code` shifts by the number of code
//! words actually sent, and the message size is the layout's fixed size
//! plus the bytes of each array.
//!
//! The reply port is patched in last with [`set_reply_port`], after every
//! argument has been checked, so a rejected call never takes a port.

use crate::error::{ExcError, Result};
use crate::ipc::codec::{MessageBuffer, MessageWriter, NdrRecord, PortDescriptor};
use crate::ipc::{
    MachMsgHeader, PortName, MACH_MSG_TYPE_COPY_SEND, MACH_MSG_TYPE_MAKE_SEND_ONCE, MACH_PORT_NULL,
};
use crate::kern::exception::EXCEPTION_CODE_MAX;
use crate::kern::{ExceptionCodes, ExceptionReport, ExceptionType, ThreadState, THREAD_STATE_MAX};
use crate::mig::MessageLayout;

use super::ExcRoutine;

/// Byte offset of `msgh_local_port` in the header
const LOCAL_PORT_OFFSET: usize = 12;

/// Encoded size for the given array lengths, or `ArgumentError`
fn sized(
    layout: &MessageLayout,
    counts: &[usize],
    field: &'static str,
    len: usize,
    max: usize,
) -> Result<u32> {
    layout
        .size_with(counts)
        .map(|size| size as u32)
        .ok_or(ExcError::ArgumentError { field, len, max })
}

fn encode_header(w: &mut MessageWriter<'_>, routine: ExcRoutine, endpoint: PortName, size: u32) {
    let mut header = MachMsgHeader::new(routine.request_id(), size)
        .with_remote_port(endpoint, MACH_MSG_TYPE_COPY_SEND as u32)
        .with_local_port(MACH_PORT_NULL, MACH_MSG_TYPE_MAKE_SEND_ONCE as u32);
    if routine.carries_identity() {
        header = header.complex();
    }
    header.encode(w);
}

fn encode_identity(w: &mut MessageWriter<'_>, thread: PortName, task: PortName) {
    w.put_u32(2);
    PortDescriptor::new(thread, MACH_MSG_TYPE_COPY_SEND).encode(w);
    PortDescriptor::new(task, MACH_MSG_TYPE_COPY_SEND).encode(w);
}

fn encode_codes(w: &mut MessageWriter<'_>, exception: ExceptionType, codes: &ExceptionCodes) {
    NdrRecord::NATIVE.encode(w);
    w.put_i32(exception.as_raw());
    w.put_u32(codes.len() as u32);
    w.put_i64_slice(codes.as_slice());
}

fn encode_state(w: &mut MessageWriter<'_>, flavor: i32, state: &ThreadState) {
    w.put_i32(flavor);
    w.put_u32(state.len() as u32);
    w.put_u32_slice(state.as_slice());
}

/// Encode `mach_exception_raise`; returns the message size
pub fn encode_raise(
    buf: &mut MessageBuffer,
    layout: &MessageLayout,
    endpoint: PortName,
    report: &ExceptionReport,
) -> Result<u32> {
    let codes = report.codes.len();
    let size = sized(layout, &[codes], "code", codes, EXCEPTION_CODE_MAX)?;

    let mut w = buf.writer();
    encode_header(&mut w, ExcRoutine::Raise, endpoint, size);
    encode_identity(&mut w, report.thread, report.task);
    encode_codes(&mut w, report.exception, &report.codes);
    debug_assert_eq!(w.position(), size as usize);

    Ok(size)
}

/// Encode `mach_exception_raise_state`; returns the message size
pub fn encode_raise_state(
    buf: &mut MessageBuffer,
    layout: &MessageLayout,
    endpoint: PortName,
    exception: ExceptionType,
    codes: &ExceptionCodes,
    flavor: i32,
    old_state: &ThreadState,
) -> Result<u32> {
    let size = sized(
        layout,
        &[codes.len(), old_state.len()],
        "old_state",
        old_state.len(),
        THREAD_STATE_MAX,
    )?;

    let mut w = buf.writer();
    encode_header(&mut w, ExcRoutine::RaiseState, endpoint, size);
    encode_codes(&mut w, exception, codes);
    encode_state(&mut w, flavor, old_state);
    debug_assert_eq!(w.position(), size as usize);

    Ok(size)
}

/// Encode `mach_exception_raise_state_identity`; returns the message size
pub fn encode_raise_state_identity(
    buf: &mut MessageBuffer,
    layout: &MessageLayout,
    endpoint: PortName,
    report: &ExceptionReport,
    flavor: i32,
    old_state: &ThreadState,
) -> Result<u32> {
    let size = sized(
        layout,
        &[report.codes.len(), old_state.len()],
        "old_state",
        old_state.len(),
        THREAD_STATE_MAX,
    )?;

    let mut w = buf.writer();
    encode_header(&mut w, ExcRoutine::RaiseStateIdentity, endpoint, size);
    encode_identity(&mut w, report.thread, report.task);
    encode_codes(&mut w, report.exception, &report.codes);
    encode_state(&mut w, flavor, old_state);
    debug_assert_eq!(w.position(), size as usize);

    Ok(size)
}

/// Place the reply port in an encoded request
pub fn set_reply_port(buf: &mut MessageBuffer, port: PortName) {
    let bytes = buf.as_mut_bytes();
    bytes[LOCAL_PORT_OFFSET..LOCAL_PORT_OFFSET + 4].copy_from_slice(&port.0.to_le_bytes());
}
