//! Signals of the running host

use std::path::{Path, PathBuf};

use log::trace;

use super::DeviceSignals;

/// Reads signals from the current process and kernel
///
/// On targets without `csops`/`sysctlbyname` every kernel signal is
/// unknown; filesystem signals still work.
#[derive(Debug, Default, Clone, Copy)]
pub struct HostSignals;

impl HostSignals {
    pub const fn new() -> Self {
        HostSignals
    }
}

impl DeviceSignals for HostSignals {
    fn code_signing_status(&self) -> Option<u32> {
        let status = sys::code_signing_status();
        trace!("csops status: {:x?}", status);
        status
    }

    fn os_product_version(&self) -> Option<String> {
        let version = sys::sysctl_string(sys::OS_PRODUCT_VERSION);
        trace!("os product version: {:?}", version);
        version
    }

    fn hardware_model(&self) -> Option<String> {
        let model = sys::sysctl_string(sys::HARDWARE_MODEL);
        trace!("hardware model: {:?}", model);
        model
    }

    fn path_exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn bundle_path(&self) -> Option<PathBuf> {
        // App.app/App: the executable sits directly in the bundle
        let exe = std::env::current_exe().ok()?;
        let bundle = exe.parent().map(Path::to_path_buf);
        trace!("bundle path: {:?}", bundle);
        bundle
    }
}

// ════════════════════════════════════════════════════════════
// FFI Bridge (platform-specific)
// ════════════════════════════════════════════════════════════

#[cfg(any(target_os = "macos", target_os = "ios"))]
mod sys {
    use core::ffi::{c_char, c_int, c_void, CStr};

    use crate::probe::CS_OPS_STATUS;

    pub const OS_PRODUCT_VERSION: &CStr = c"kern.osproductversion";

    // hw.machine is the model identifier on iOS but the architecture on macOS
    #[cfg(target_os = "ios")]
    pub const HARDWARE_MODEL: &CStr = c"hw.machine";
    #[cfg(target_os = "macos")]
    pub const HARDWARE_MODEL: &CStr = c"hw.model";

    extern "C" {
        fn getpid() -> c_int;
        fn csops(pid: c_int, ops: u32, useraddr: *mut c_void, usersize: usize) -> c_int;
        fn sysctlbyname(
            name: *const c_char,
            oldp: *mut c_void,
            oldlenp: *mut usize,
            newp: *mut c_void,
            newlen: usize,
        ) -> c_int;
    }

    pub fn code_signing_status() -> Option<u32> {
        let mut flags: u32 = 0;
        // SAFETY: csops writes at most usersize bytes into flags.
        let rc = unsafe {
            csops(
                getpid(),
                CS_OPS_STATUS,
                (&mut flags as *mut u32).cast(),
                core::mem::size_of::<u32>(),
            )
        };
        (rc == 0).then_some(flags)
    }

    pub fn sysctl_string(name: &CStr) -> Option<String> {
        let mut len = 0usize;
        // SAFETY: a null oldp asks only for the required length.
        let rc = unsafe {
            sysctlbyname(name.as_ptr(), core::ptr::null_mut(), &mut len, core::ptr::null_mut(), 0)
        };
        if rc != 0 || len == 0 {
            return None;
        }

        let mut buf = vec![0u8; len];
        // SAFETY: buf has room for len bytes and len is updated in place.
        let rc = unsafe {
            sysctlbyname(
                name.as_ptr(),
                buf.as_mut_ptr().cast(),
                &mut len,
                core::ptr::null_mut(),
                0,
            )
        };
        if rc != 0 {
            return None;
        }
        buf.truncate(len);
        let text = CStr::from_bytes_until_nul(&buf).ok()?;
        text.to_str().ok().map(str::to_owned)
    }
}

#[cfg(not(any(target_os = "macos", target_os = "ios")))]
mod sys {
    //! No code signing or sysctl strings off Apple platforms

    pub const OS_PRODUCT_VERSION: &str = "kern.osproductversion";
    pub const HARDWARE_MODEL: &str = "hw.machine";

    pub fn code_signing_status() -> Option<u32> {
        None
    }

    pub fn sysctl_string(_name: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filesystem_signals() {
        let host = HostSignals::new();
        assert!(host.path_exists(&std::env::temp_dir()));
        assert!(!host.path_exists(Path::new("/definitely/not/here/_TrollStore")));
        assert!(host.bundle_path().is_some());
    }

    #[cfg(not(any(target_os = "macos", target_os = "ios")))]
    #[test]
    fn test_kernel_signals_unknown() {
        let host = HostSignals::new();
        assert_eq!(host.code_signing_status(), None);
        assert_eq!(host.os_product_version(), None);
        assert_eq!(host.hardware_model(), None);
    }
}
