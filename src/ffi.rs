//! C ABI for the app's Objective-C and Swift layers
//!
//! The probe functions mirror `JessiJITCheck.h`. The three
//! `mach_exception_raise*` functions keep the MIG user prototypes so
//! existing callers link against them unchanged, and report failures as
//! the `kern_return_t` the generated stubs would have returned.

use core::slice;

use spin::Once;

use crate::error::ExcError;
use crate::exc::MachExcClient;
use crate::ipc::{KernelTransport, PortName, KERN_INVALID_ARGUMENT, KERN_SUCCESS};
use crate::kern::exception::EXCEPTION_CODE_MAX;
use crate::kern::{ExceptionType, ThreadState, THREAD_STATE_MAX};
use crate::mig::MIG_ARRAY_TOO_LARGE;
use crate::probe;

#[allow(non_camel_case_types)]
pub type kern_return_t = i32;
#[allow(non_camel_case_types)]
pub type mach_port_t = u32;
#[allow(non_camel_case_types)]
pub type exception_type_t = i32;
#[allow(non_camel_case_types)]
pub type mach_exception_data_type_t = i64;
#[allow(non_camel_case_types)]
pub type mach_msg_type_number_t = u32;
#[allow(non_camel_case_types)]
pub type natural_t = u32;

static CLIENT: Once<MachExcClient<KernelTransport>> = Once::new();

fn client() -> &'static MachExcClient<KernelTransport> {
    CLIENT.call_once(|| MachExcClient::new(KernelTransport::new()))
}

// ════════════════════════════════════════════════════════════
// Probes
// ════════════════════════════════════════════════════════════

#[no_mangle]
/// Whether a debugger has enabled JIT for this process
pub extern "C" fn jessi_check_jit_enabled() -> bool {
    probe::is_jit_enabled()
}

#[no_mangle]
pub extern "C" fn jessi_is_ios26_or_later() -> bool {
    probe::is_ios26_or_later()
}

#[no_mangle]
pub extern "C" fn jessi_is_txm_device() -> bool {
    probe::is_txm_present()
}

#[no_mangle]
pub extern "C" fn jessi_is_trollstore_installed() -> bool {
    probe::is_trollstore_installed()
}

// ════════════════════════════════════════════════════════════
// Exception RPCs
// ════════════════════════════════════════════════════════════

/// Borrow a caller array after checking its count against `max`
///
/// # Safety
/// `ptr` must point to `count` readable elements when `count` is nonzero.
unsafe fn borrow_array<'a, T>(
    ptr: *const T,
    count: mach_msg_type_number_t,
    max: usize,
) -> Result<&'a [T], kern_return_t> {
    let count = count as usize;
    if count > max {
        return Err(MIG_ARRAY_TOO_LARGE);
    }
    if count == 0 {
        return Ok(&[]);
    }
    if ptr.is_null() {
        return Err(KERN_INVALID_ARGUMENT.0);
    }
    Ok(slice::from_raw_parts(ptr, count))
}

fn exception_kind(exception: exception_type_t) -> Result<ExceptionType, kern_return_t> {
    ExceptionType::from_raw(exception).ok_or(KERN_INVALID_ARGUMENT.0)
}

/// Copy the reply state out the way the MIG stub does
///
/// # Safety
/// `new_state` must have room for [`THREAD_STATE_MAX`] words and
/// `new_state_cnt` must be writable.
unsafe fn write_state_out(
    result: Result<(), ExcError>,
    state: &ThreadState,
    new_state: *mut natural_t,
    new_state_cnt: *mut mach_msg_type_number_t,
) -> kern_return_t {
    let count = match &result {
        Ok(()) => state.len() as mach_msg_type_number_t,
        Err(ExcError::ArrayTooLarge { count, .. }) => *count,
        Err(err) => return err.kern_return().0,
    };
    core::ptr::copy_nonoverlapping(state.as_slice().as_ptr(), new_state, state.len());
    *new_state_cnt = count;
    match result {
        Ok(()) => KERN_SUCCESS.0,
        Err(err) => err.kern_return().0,
    }
}

#[no_mangle]
/// Report an exception with thread and task identity
/// # Safety
/// `code` must point to `code_cnt` values.
pub unsafe extern "C" fn mach_exception_raise(
    exception_port: mach_port_t,
    thread: mach_port_t,
    task: mach_port_t,
    exception: exception_type_t,
    code: *const mach_exception_data_type_t,
    code_cnt: mach_msg_type_number_t,
) -> kern_return_t {
    let codes = match borrow_array(code, code_cnt, EXCEPTION_CODE_MAX) {
        Ok(codes) => codes,
        Err(kr) => return kr,
    };
    let exception = match exception_kind(exception) {
        Ok(e) => e,
        Err(kr) => return kr,
    };

    match client().raise_exception(
        PortName(exception_port),
        PortName(thread),
        PortName(task),
        exception,
        codes,
    ) {
        Ok(()) => KERN_SUCCESS.0,
        Err(err) => err.kern_return().0,
    }
}

#[no_mangle]
/// Report an exception with thread state; receives the handler's state
/// # Safety
/// `code` and `old_state` must point to their counts of values, `flavor`
/// and `new_state_cnt` must be writable and `new_state` must have room
/// for 1296 words.
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn mach_exception_raise_state(
    exception_port: mach_port_t,
    exception: exception_type_t,
    code: *const mach_exception_data_type_t,
    code_cnt: mach_msg_type_number_t,
    flavor: *mut i32,
    old_state: *const natural_t,
    old_state_cnt: mach_msg_type_number_t,
    new_state: *mut natural_t,
    new_state_cnt: *mut mach_msg_type_number_t,
) -> kern_return_t {
    if flavor.is_null() || new_state.is_null() || new_state_cnt.is_null() {
        return KERN_INVALID_ARGUMENT.0;
    }
    let codes = match borrow_array(code, code_cnt, EXCEPTION_CODE_MAX) {
        Ok(codes) => codes,
        Err(kr) => return kr,
    };
    let old_state = match borrow_array(old_state, old_state_cnt, THREAD_STATE_MAX) {
        Ok(words) => words,
        Err(kr) => return kr,
    };
    let exception = match exception_kind(exception) {
        Ok(e) => e,
        Err(kr) => return kr,
    };

    let mut state = ThreadState::new();
    let result = client().raise_exception_state(
        PortName(exception_port),
        exception,
        codes,
        &mut *flavor,
        old_state,
        &mut state,
    );
    write_state_out(result, &state, new_state, new_state_cnt)
}

#[no_mangle]
/// Report an exception with identity and thread state; receives the
/// handler's state
/// # Safety
/// Same requirements as [`mach_exception_raise_state`].
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn mach_exception_raise_state_identity(
    exception_port: mach_port_t,
    thread: mach_port_t,
    task: mach_port_t,
    exception: exception_type_t,
    code: *const mach_exception_data_type_t,
    code_cnt: mach_msg_type_number_t,
    flavor: *mut i32,
    old_state: *const natural_t,
    old_state_cnt: mach_msg_type_number_t,
    new_state: *mut natural_t,
    new_state_cnt: *mut mach_msg_type_number_t,
) -> kern_return_t {
    if flavor.is_null() || new_state.is_null() || new_state_cnt.is_null() {
        return KERN_INVALID_ARGUMENT.0;
    }
    let codes = match borrow_array(code, code_cnt, EXCEPTION_CODE_MAX) {
        Ok(codes) => codes,
        Err(kr) => return kr,
    };
    let old_state = match borrow_array(old_state, old_state_cnt, THREAD_STATE_MAX) {
        Ok(words) => words,
        Err(kr) => return kr,
    };
    let exception = match exception_kind(exception) {
        Ok(e) => e,
        Err(kr) => return kr,
    };

    let mut state = ThreadState::new();
    let result = client().raise_exception_state_identity(
        PortName(exception_port),
        PortName(thread),
        PortName(task),
        exception,
        codes,
        &mut *flavor,
        old_state,
        &mut state,
    );
    write_state_out(result, &state, new_state, new_state_cnt)
}
