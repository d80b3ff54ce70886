//! Single-use reply port
//!
//! A reply port is taken from the transport right before a request is
//! encoded and must go back exactly once: recycled or deallocated
//! depending on how the call ended. The guard consumes itself on release
//! and deallocates on drop, so an early return can never leak the port.

use log::trace;

use crate::ipc::mach_msg::ReplyPortRelease;
use crate::ipc::transport::MachTransport;
use crate::ipc::PortName;

/// Owns the reply port for the duration of one call
pub struct ReplyPortGuard<'a, T: MachTransport + ?Sized> {
    transport: &'a T,
    port: PortName,
    released: bool,
}

impl<'a, T: MachTransport + ?Sized> ReplyPortGuard<'a, T> {
    /// Take a reply port from the transport
    pub fn acquire(transport: &'a T) -> Self {
        let port = transport.acquire_reply_port();
        trace!("acquired reply port {}", port);
        Self {
            transport,
            port,
            released: false,
        }
    }

    /// The port to place in the request header
    pub fn port(&self) -> PortName {
        self.port
    }

    /// Give the port back according to `how`
    pub fn release(mut self, how: ReplyPortRelease) {
        self.release_inner(how);
    }

    fn release_inner(&mut self, how: ReplyPortRelease) {
        if self.released {
            return;
        }
        self.released = true;
        match how {
            ReplyPortRelease::Recycle => self.transport.recycle_reply_port(self.port),
            ReplyPortRelease::Deallocate => self.transport.deallocate_reply_port(self.port),
        }
        trace!("reply port {} {}", self.port, how);
    }
}

impl<T: MachTransport + ?Sized> Drop for ReplyPortGuard<'_, T> {
    fn drop(&mut self) {
        self.release_inner(ReplyPortRelease::Deallocate);
    }
}
