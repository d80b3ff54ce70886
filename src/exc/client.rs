//! Exception RPC client
//!
//! One call is one blocking round trip: validate the arguments, encode,
//! take a reply port, `mach_msg` send+receive, give the port back, then
//! validate the reply. Nothing is retried. Each call owns its own message
//! buffer so calls from different threads never share one.

use log::{debug, warn};

use crate::error::{ExcError, Result};
use crate::ipc::codec::MessageBuffer;
use crate::ipc::{MachMsgHeader, MachTransport, PortName, ReplyPortGuard, ReplyPortRelease};
use crate::kern::{ExceptionBehavior, ExceptionCodes, ExceptionReport, ExceptionType, ThreadState};

use super::{reply, request, ExcLayouts, ExcRoutine};

/// Client side of the `mach_exc` subsystem
pub struct MachExcClient<T: MachTransport> {
    transport: T,
    layouts: ExcLayouts,
}

impl<T: MachTransport> MachExcClient<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            layouts: ExcLayouts::new(),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `mach_exception_raise`: report thread, task and codes; no state
    pub fn raise_exception(
        &self,
        endpoint: PortName,
        thread: PortName,
        task: PortName,
        exception: ExceptionType,
        codes: &[i64],
    ) -> Result<()> {
        let report = ExceptionReport::new(exception, codes, thread, task)?;
        self.raise_report(endpoint, &report)
    }

    /// `mach_exception_raise_state`: report codes and state, get the
    /// handler's state back
    ///
    /// `flavor` is both the flavor sent and the flavor the handler replied
    /// with.
    pub fn raise_exception_state(
        &self,
        endpoint: PortName,
        exception: ExceptionType,
        codes: &[i64],
        flavor: &mut i32,
        old_state: &[u32],
        new_state: &mut ThreadState,
    ) -> Result<()> {
        let codes = ExceptionCodes::from_slice(codes)?;
        let old_state = ThreadState::from_slice(old_state)?;
        self.raise_codes_state(endpoint, exception, &codes, flavor, &old_state, new_state)
    }

    /// `mach_exception_raise_state_identity`: report everything, get the
    /// handler's state back
    #[allow(clippy::too_many_arguments)]
    pub fn raise_exception_state_identity(
        &self,
        endpoint: PortName,
        thread: PortName,
        task: PortName,
        exception: ExceptionType,
        codes: &[i64],
        flavor: &mut i32,
        old_state: &[u32],
        new_state: &mut ThreadState,
    ) -> Result<()> {
        let report = ExceptionReport::new(exception, codes, thread, task)?;
        let old_state = ThreadState::from_slice(old_state)?;
        self.raise_report_state_identity(endpoint, &report, flavor, &old_state, new_state)
    }

    /// Report `report` the way a port registered with `behavior` expects
    ///
    /// For the state behaviors `state` goes out as the old state and is
    /// replaced by the handler's new state. A behavior other than the three
    /// known ones (with or without `MACH_EXCEPTION_CODES`) is rejected
    /// before a reply port is taken.
    pub fn deliver(
        &self,
        endpoint: PortName,
        behavior: ExceptionBehavior,
        report: &ExceptionReport,
        flavor: &mut i32,
        state: &mut ThreadState,
    ) -> Result<()> {
        let base = behavior.base();
        if base == ExceptionBehavior::STATE {
            let old_state = state.clone();
            self.raise_codes_state(
                endpoint,
                report.exception,
                &report.codes,
                flavor,
                &old_state,
                state,
            )
        } else if base == ExceptionBehavior::STATE_IDENTITY {
            let old_state = state.clone();
            self.raise_report_state_identity(endpoint, report, flavor, &old_state, state)
        } else if base == ExceptionBehavior::DEFAULT {
            self.raise_report(endpoint, report)
        } else {
            Err(ExcError::UnsupportedBehavior(behavior))
        }
    }

    fn raise_report(&self, endpoint: PortName, report: &ExceptionReport) -> Result<()> {
        let routine = ExcRoutine::Raise;
        let layouts = self.layouts.get(routine);

        let mut buf = MessageBuffer::new();
        let size = request::encode_raise(&mut buf, &layouts.request, endpoint, report)?;
        self.round_trip(&mut buf, size, routine)?;

        let outcome = reply::check_simple_reply(&buf, &layouts.reply);
        self.settle(&mut buf, routine, outcome)
    }

    fn raise_codes_state(
        &self,
        endpoint: PortName,
        exception: ExceptionType,
        codes: &ExceptionCodes,
        flavor: &mut i32,
        old_state: &ThreadState,
        new_state: &mut ThreadState,
    ) -> Result<()> {
        let routine = ExcRoutine::RaiseState;
        let mut buf = MessageBuffer::new();
        let size = request::encode_raise_state(
            &mut buf,
            &self.layouts.get(routine).request,
            endpoint,
            exception,
            codes,
            *flavor,
            old_state,
        )?;
        self.round_trip(&mut buf, size, routine)?;
        self.finish_state_reply(&mut buf, routine, flavor, new_state)
    }

    fn raise_report_state_identity(
        &self,
        endpoint: PortName,
        report: &ExceptionReport,
        flavor: &mut i32,
        old_state: &ThreadState,
        new_state: &mut ThreadState,
    ) -> Result<()> {
        let routine = ExcRoutine::RaiseStateIdentity;
        let mut buf = MessageBuffer::new();
        let size = request::encode_raise_state_identity(
            &mut buf,
            &self.layouts.get(routine).request,
            endpoint,
            report,
            *flavor,
            old_state,
        )?;
        self.round_trip(&mut buf, size, routine)?;
        self.finish_state_reply(&mut buf, routine, flavor, new_state)
    }

    fn finish_state_reply(
        &self,
        buf: &mut MessageBuffer,
        routine: ExcRoutine,
        flavor: &mut i32,
        new_state: &mut ThreadState,
    ) -> Result<()> {
        let layout = &self.layouts.get(routine).reply;
        let outcome = reply::check_state_reply(buf, layout, routine)
            .and_then(|size| reply::decode_state(buf, layout, size, flavor, new_state));
        self.settle(buf, routine, outcome)
    }

    /// Send the encoded request and wait for the reply
    ///
    /// The reply port goes back before this returns, whatever happened.
    fn round_trip(
        &self,
        buf: &mut MessageBuffer,
        send_size: u32,
        routine: ExcRoutine,
    ) -> Result<()> {
        let rcv_size = self.layouts.get(routine).reply.receive_size() as u32;
        let guard = ReplyPortGuard::acquire(&self.transport);
        request::set_reply_port(buf, guard.port());

        debug!(
            "{}: sending {} bytes, reply port {}",
            routine,
            send_size,
            guard.port()
        );
        let mr = self.transport.send_receive(buf, send_size, rcv_size, guard.port());
        let release = mr.reply_port_release();
        guard.release(release);

        if mr.is_success() {
            // the buffer past the reply still holds the request
            let received = MachMsgHeader::decode(&mut buf.reader()).msgh_size as usize;
            buf.clear_from(received);
            return Ok(());
        }
        warn!("{}: {}, reply port {}", routine, mr, release);
        Err(ExcError::Transport {
            code: mr,
            reply_port: release,
        })
    }

    /// Destroy a rejected reply and pass the outcome through
    fn settle(
        &self,
        buf: &mut MessageBuffer,
        routine: ExcRoutine,
        outcome: Result<()>,
    ) -> Result<()> {
        match &outcome {
            Ok(()) => debug!("{}: handler accepted", routine),
            Err(ExcError::RemoteStatus(kr)) => debug!("{}: handler returned {}", routine, kr),
            Err(err) => warn!("{}: {}", routine, err),
        }
        if outcome.is_err() {
            self.transport.destroy_reply(buf);
        }
        outcome
    }
}

impl<T: MachTransport + Default> Default for MachExcClient<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
