//! Kern subsystem - exception vocabulary
//!
//! Exception kinds, delivery behaviors, code words and thread-state blobs
//! as they travel in `mach_exc` messages.

pub mod exception;
pub mod thread_state;

pub use exception::{ExceptionBehavior, ExceptionCodes, ExceptionReport, ExceptionType};
pub use thread_state::{ThreadState, THREAD_STATE_MAX};
