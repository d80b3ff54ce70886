//! Reply validation
//!
//! Checks run in a fixed order and stop at the first failure:
//! 1. id (a send-once notification means the handler died)
//! 2. framing: complex bit and size
//! 3. the reply must not carry a remote port
//! 4. RetCode
//! 5. state count, for the state routines only
//!
//! A bare `mig_reply_error_t` is accepted for the state routines only when
//! its RetCode reports a failure.

use crate::error::{ExcError, Result};
use crate::ipc::codec::{MessageBuffer, NdrRecord};
use crate::ipc::{KernReturn, MachMsgHeader, MACH_NOTIFY_SEND_ONCE};
use crate::kern::{ThreadState, THREAD_STATE_MAX};
use crate::mig::MessageLayout;

use super::{ExcRoutine, MIG_REPLY_ERROR_SIZE};

/// Header and RetCode of a received reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyPrefix {
    pub header: MachMsgHeader,
    pub ret_code: KernReturn,
}

fn read_prefix(buf: &MessageBuffer) -> ReplyPrefix {
    let mut r = buf.reader();
    let header = MachMsgHeader::decode(&mut r);
    let _ndr = NdrRecord::decode(&mut r);
    let ret_code = KernReturn(r.get_i32());
    ReplyPrefix { header, ret_code }
}

fn check_id(header: &MachMsgHeader, routine: ExcRoutine) -> Result<()> {
    if header.msgh_id == routine.reply_id() {
        return Ok(());
    }
    if header.msgh_id == MACH_NOTIFY_SEND_ONCE {
        return Err(ExcError::RemoteTerminated);
    }
    Err(ExcError::ProtocolMismatch {
        expected: routine.reply_id(),
        actual: header.msgh_id,
    })
}

fn check_remote_port(header: &MachMsgHeader) -> Result<()> {
    if header.msgh_remote_port.is_null() {
        Ok(())
    } else {
        Err(ExcError::TypeError("reply carries a remote port"))
    }
}

fn check_ret_code(prefix: &ReplyPrefix) -> Result<()> {
    if prefix.ret_code.is_success() {
        Ok(())
    } else {
        Err(ExcError::RemoteStatus(prefix.ret_code))
    }
}

/// Validate a `mach_exception_raise` reply
pub fn check_simple_reply(buf: &MessageBuffer, layout: &MessageLayout) -> Result<()> {
    let prefix = read_prefix(buf);
    let header = &prefix.header;

    check_id(header, ExcRoutine::Raise)?;
    if header.is_complex() || header.msgh_size as usize != layout.min_size {
        return Err(ExcError::TypeError("reply size or framing"));
    }
    check_remote_port(header)?;
    check_ret_code(&prefix)
}

/// Validate the fixed part of a state reply; returns its size on success
pub fn check_state_reply(
    buf: &MessageBuffer,
    layout: &MessageLayout,
    routine: ExcRoutine,
) -> Result<usize> {
    let prefix = read_prefix(buf);
    let header = &prefix.header;
    let size = header.msgh_size as usize;

    check_id(header, routine)?;
    let in_bounds = (layout.min_size..=layout.max_size).contains(&size);
    let error_reply = size == MIG_REPLY_ERROR_SIZE && !prefix.ret_code.is_success();
    if header.is_complex() || !(in_bounds || error_reply) {
        return Err(ExcError::TypeError("reply size or framing"));
    }
    check_remote_port(header)?;
    check_ret_code(&prefix)?;

    Ok(size)
}

/// Unmarshal flavor and state from a reply that passed [`check_state_reply`]
///
/// The flavor is written before the count is looked at. An oversized count
/// still copies [`THREAD_STATE_MAX`] words into `new_state`.
pub fn decode_state(
    buf: &MessageBuffer,
    layout: &MessageLayout,
    size: usize,
    flavor: &mut i32,
    new_state: &mut ThreadState,
) -> Result<()> {
    let mut r = buf.reader_at(layout.min_size - 8);
    *flavor = r.get_i32();
    let count = r.get_u32();

    if count as usize > THREAD_STATE_MAX {
        new_state.fill_truncated((0..THREAD_STATE_MAX).map(|_| r.get_u32()));
        return Err(ExcError::ArrayTooLarge {
            count,
            max: THREAD_STATE_MAX,
        });
    }
    if size != layout.min_size + 4 * count as usize {
        return Err(ExcError::TypeError("state count disagrees with reply size"));
    }

    new_state.fill_truncated((0..count).map(|_| r.get_u32()));
    Ok(())
}
