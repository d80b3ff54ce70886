//! jessi-core - native support layer of the JESSI launcher
//!
//! Two independent pieces:
//! - [`exc`]: a client for the `mach_exc` exception RPCs, built on an
//!   explicit message codec ([`ipc`], [`mig`]) and the exception model in
//!   [`kern`]
//! - [`probe`]: memoized device capability checks (JIT, iOS 26, TXM,
//!   TrollStore)
//!
//! [`ffi`] exports both to C for the app, and [`config`] holds the probe
//! thresholds.

// MIG-shaped signatures carry many arguments
#![allow(clippy::too_many_arguments)]

pub mod config;
pub mod error;
pub mod exc;
pub mod ffi;
pub mod ipc;
pub mod kern;
pub mod mig;
pub mod probe;

pub use config::{Config, ConfigError, ProbeConfig};
pub use error::{ExcError, Result};
pub use exc::{ExcRoutine, MachExcClient};
pub use ipc::{KernReturn, KernelTransport, MachTransport, PortName};
pub use kern::{ExceptionBehavior, ExceptionReport, ExceptionType, ThreadState};
pub use probe::{Capabilities, CapabilityReport, DeviceSignals, HostSignals};
