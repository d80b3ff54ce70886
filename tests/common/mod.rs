//! Scripted in-memory transport shared by the integration tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use jessi_core::ipc::codec::{MessageBuffer, MessageWriter, NdrRecord};
use jessi_core::ipc::mach_msg::MACH_RCV_TIMED_OUT;
use jessi_core::ipc::{MachMsgHeader, MachMsgReturn, MachTransport, PortName};

/// What the fake kernel does with the next send
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Deliver these bytes as the reply
    Reply(Vec<u8>),
    /// Fail `mach_msg` with this code
    Fail(i32),
}

/// One request as the fake kernel saw it
#[derive(Debug, Clone)]
pub struct Sent {
    pub bytes: Vec<u8>,
    pub rcv_size: u32,
    pub reply_port: PortName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortEvent {
    Acquired(PortName),
    Recycled(PortName),
    Deallocated(PortName),
}

#[derive(Default)]
struct Script {
    replies: VecDeque<Scripted>,
    sent: Vec<Sent>,
    events: Vec<PortEvent>,
    next_port: u32,
    destroyed: usize,
}

#[derive(Default)]
pub struct ScriptedTransport {
    inner: Mutex<Script>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            inner: Mutex::new(Script {
                replies: script.into_iter().collect(),
                next_port: 0x1003,
                ..Default::default()
            }),
        }
    }

    pub fn replying(reply: Vec<u8>) -> Self {
        Self::new([Scripted::Reply(reply)])
    }

    pub fn failing(code: i32) -> Self {
        Self::new([Scripted::Fail(code)])
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.inner.lock().unwrap().sent.clone()
    }

    pub fn events(&self) -> Vec<PortEvent> {
        self.inner.lock().unwrap().events.clone()
    }

    pub fn destroyed(&self) -> usize {
        self.inner.lock().unwrap().destroyed
    }

    /// Number of ports handed back, by either route
    pub fn released(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| !matches!(e, PortEvent::Acquired(_)))
            .count()
    }
}

impl MachTransport for ScriptedTransport {
    fn acquire_reply_port(&self) -> PortName {
        let mut s = self.inner.lock().unwrap();
        let port = PortName(s.next_port);
        s.next_port += 4;
        s.events.push(PortEvent::Acquired(port));
        port
    }

    fn recycle_reply_port(&self, port: PortName) {
        self.inner.lock().unwrap().events.push(PortEvent::Recycled(port));
    }

    fn deallocate_reply_port(&self, port: PortName) {
        self.inner.lock().unwrap().events.push(PortEvent::Deallocated(port));
    }

    fn send_receive(
        &self,
        buf: &mut MessageBuffer,
        send_size: u32,
        rcv_size: u32,
        reply_port: PortName,
    ) -> MachMsgReturn {
        let mut s = self.inner.lock().unwrap();
        s.sent.push(Sent {
            bytes: buf.as_bytes()[..send_size as usize].to_vec(),
            rcv_size,
            reply_port,
        });
        match s.replies.pop_front() {
            Some(Scripted::Reply(bytes)) => {
                // like the kernel, only the received bytes are overwritten
                buf.as_mut_bytes()[..bytes.len()].copy_from_slice(&bytes);
                MachMsgReturn::SUCCESS
            }
            Some(Scripted::Fail(code)) => MachMsgReturn(code),
            None => MachMsgReturn(MACH_RCV_TIMED_OUT),
        }
    }

    fn destroy_reply(&self, _buf: &mut MessageBuffer) {
        self.inner.lock().unwrap().destroyed += 1;
    }
}

// ════════════════════════════════════════════════════════════
// Reply builders
// ════════════════════════════════════════════════════════════

/// Builds reply messages, well-formed unless told otherwise
#[derive(Debug, Clone)]
pub struct ReplyBuilder {
    header: MachMsgHeader,
    ret_code: i32,
    state: Option<(i32, u32, Vec<u32>)>,
}

impl ReplyBuilder {
    /// `mach_exception_raise` reply
    pub fn simple(ret_code: i32) -> Self {
        Self {
            header: MachMsgHeader::new(2505, 36),
            ret_code,
            state: None,
        }
    }

    /// State reply for `id` (2506 or 2507) carrying `words`
    pub fn state(id: i32, flavor: i32, words: &[u32]) -> Self {
        Self {
            header: MachMsgHeader::new(id, 44 + 4 * words.len() as u32),
            ret_code: 0,
            state: Some((flavor, words.len() as u32, words.to_vec())),
        }
    }

    /// Bare `mig_reply_error_t` for `id`
    pub fn error(id: i32, ret_code: i32) -> Self {
        Self {
            header: MachMsgHeader::new(id, 36),
            ret_code,
            state: None,
        }
    }

    pub fn id(mut self, id: i32) -> Self {
        self.header.msgh_id = id;
        self
    }

    pub fn size(mut self, size: u32) -> Self {
        self.header.msgh_size = size;
        self
    }

    pub fn bits(mut self, bits: u32) -> Self {
        self.header.msgh_bits = bits;
        self
    }

    pub fn remote_port(mut self, port: PortName) -> Self {
        self.header.msgh_remote_port = port;
        self
    }

    pub fn ret_code(mut self, ret_code: i32) -> Self {
        self.ret_code = ret_code;
        self
    }

    /// Override the declared state count without touching the words
    pub fn state_count(mut self, count: u32) -> Self {
        if let Some((_, cnt, _)) = self.state.as_mut() {
            *cnt = count;
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut buf = MessageBuffer::new();
        let len = {
            let mut w: MessageWriter<'_> = buf.writer();
            self.header.encode(&mut w);
            NdrRecord::NATIVE.encode(&mut w);
            w.put_i32(self.ret_code);
            if let Some((flavor, count, words)) = &self.state {
                w.put_i32(*flavor);
                w.put_u32(*count);
                w.put_u32_slice(words);
            }
            w.position()
        };
        buf.as_bytes()[..len].to_vec()
    }
}
