//! Message transport
//!
//! [`MachTransport`] is the seam between the exception client and the
//! kernel. [`KernelTransport`] talks to the real `mach_msg` trap and the
//! MIG reply-port cache on Apple targets; everywhere else it behaves like
//! a kernel that refuses every message, the same way the runtime stubs do.

use crate::ipc::codec::MessageBuffer;
use crate::ipc::mach_msg::MachMsgReturn;
use crate::ipc::PortName;

/// Combined send/receive plus reply-port bookkeeping
///
/// Implementations must be usable from several threads at once; each call
/// works on its own buffer and its own reply port.
pub trait MachTransport {
    /// Hand out a reply port for one call
    fn acquire_reply_port(&self) -> PortName;

    /// Take a reply port back for reuse
    fn recycle_reply_port(&self, port: PortName);

    /// Destroy a reply port
    fn deallocate_reply_port(&self, port: PortName);

    /// Send `send_size` bytes of `buf`, then block until a reply of at most
    /// `rcv_size` bytes lands in the same buffer
    fn send_receive(
        &self,
        buf: &mut MessageBuffer,
        send_size: u32,
        rcv_size: u32,
        reply_port: PortName,
    ) -> MachMsgReturn;

    /// Release any rights carried by a reply that failed validation
    fn destroy_reply(&self, _buf: &mut MessageBuffer) {}
}

impl<T: MachTransport + ?Sized> MachTransport for &T {
    fn acquire_reply_port(&self) -> PortName {
        (**self).acquire_reply_port()
    }

    fn recycle_reply_port(&self, port: PortName) {
        (**self).recycle_reply_port(port)
    }

    fn deallocate_reply_port(&self, port: PortName) {
        (**self).deallocate_reply_port(port)
    }

    fn send_receive(
        &self,
        buf: &mut MessageBuffer,
        send_size: u32,
        rcv_size: u32,
        reply_port: PortName,
    ) -> MachMsgReturn {
        (**self).send_receive(buf, send_size, rcv_size, reply_port)
    }

    fn destroy_reply(&self, buf: &mut MessageBuffer) {
        (**self).destroy_reply(buf)
    }
}

// ════════════════════════════════════════════════════════════
// Kernel Transport
// ════════════════════════════════════════════════════════════

/// The real kernel
#[derive(Debug, Default, Clone, Copy)]
pub struct KernelTransport;

impl KernelTransport {
    pub const fn new() -> Self {
        KernelTransport
    }
}

impl MachTransport for KernelTransport {
    fn acquire_reply_port(&self) -> PortName {
        // SAFETY: returns the calling thread's cached reply port.
        PortName(unsafe { sys::mig_get_reply_port() })
    }

    fn recycle_reply_port(&self, port: PortName) {
        // SAFETY: port came from mig_get_reply_port on this thread.
        unsafe { sys::mig_put_reply_port(port.0) }
    }

    fn deallocate_reply_port(&self, port: PortName) {
        // SAFETY: port came from mig_get_reply_port on this thread.
        unsafe { sys::mig_dealloc_reply_port(port.0) }
    }

    fn send_receive(
        &self,
        buf: &mut MessageBuffer,
        send_size: u32,
        rcv_size: u32,
        reply_port: PortName,
    ) -> MachMsgReturn {
        use crate::ipc::mach_msg::{
            MACH_MSG_OPTION_NONE, MACH_MSG_TIMEOUT_NONE, MACH_RCV_MSG, MACH_SEND_MSG,
        };

        debug_assert!(send_size as usize <= buf.as_bytes().len());
        debug_assert!(rcv_size as usize <= buf.as_bytes().len());

        // SAFETY: the buffer is 8-byte aligned, holds a fully encoded
        // request of send_size bytes and has room for rcv_size bytes.
        let kr = unsafe {
            sys::mach_msg(
                buf.as_mut_ptr(),
                MACH_SEND_MSG | MACH_RCV_MSG | MACH_MSG_OPTION_NONE,
                send_size,
                rcv_size,
                reply_port.0,
                MACH_MSG_TIMEOUT_NONE,
                crate::ipc::MACH_PORT_NULL.0,
            )
        };
        MachMsgReturn(kr)
    }

    fn destroy_reply(&self, buf: &mut MessageBuffer) {
        // SAFETY: the buffer holds a message just received by mach_msg.
        unsafe { sys::mach_msg_destroy(buf.as_mut_ptr()) }
    }
}

// ════════════════════════════════════════════════════════════
// FFI Bridge (platform-specific)
// ════════════════════════════════════════════════════════════

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod sys {
    extern "C" {
        /// Low-level mach_msg system call
        ///
        /// # Safety
        ///
        /// This function performs raw IPC and requires properly formatted
        /// message buffers. Misuse can lead to undefined behavior.
        pub fn mach_msg(
            msg: *mut u8,
            option: u32,
            send_size: u32,
            rcv_size: u32,
            rcv_name: u32,
            timeout: u32,
            notify: u32,
        ) -> i32;

        pub fn mig_get_reply_port() -> u32;
        pub fn mig_put_reply_port(reply_port: u32);
        pub fn mig_dealloc_reply_port(reply_port: u32);
        pub fn mach_msg_destroy(msg: *mut u8);
    }
}

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
mod sys {
    //! Stub implementation for non-Apple platforms
    //!
    //! There is no Mach kernel to talk to, so every send fails with
    //! KERN_FAILURE and no reply port is ever handed out.

    use crate::ipc::{KERN_FAILURE, MACH_PORT_NULL};

    /// # Safety
    ///
    /// This is a stub that always returns KERN_FAILURE.
    pub unsafe fn mach_msg(
        _msg: *mut u8,
        _option: u32,
        _send_size: u32,
        _rcv_size: u32,
        _rcv_name: u32,
        _timeout: u32,
        _notify: u32,
    ) -> i32 {
        KERN_FAILURE.0
    }

    pub unsafe fn mig_get_reply_port() -> u32 {
        MACH_PORT_NULL.0
    }

    pub unsafe fn mig_put_reply_port(_reply_port: u32) {}

    pub unsafe fn mig_dealloc_reply_port(_reply_port: u32) {}

    pub unsafe fn mach_msg_destroy(_msg: *mut u8) {}
}
