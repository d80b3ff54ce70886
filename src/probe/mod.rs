//! Device capability probes
//!
//! Four yes/no questions the launcher asks before starting the Java
//! runtime:
//! - is this process being debugged, i.e. is JIT available
//! - is the OS iOS 26 or later
//! - does the device run TXM (iOS 26 on an A15/M2 class chip or newer)
//! - is TrollStore installed
//!
//! Raw platform facts come from a [`DeviceSignals`] implementation;
//! [`Capabilities`] turns them into memoized answers. The free functions
//! at the bottom answer for the current process.

use core::fmt;
use std::path::{Path, PathBuf};

use once_cell::race::OnceBox;

pub mod capabilities;
pub mod host;

pub use capabilities::{CapabilityReport, Capabilities};
pub use host::HostSignals;

/// `CS_OPS_STATUS` operation of `csops`
pub const CS_OPS_STATUS: u32 = 0;
/// Code signing status flag set while a debugger is attached
pub const CS_DEBUGGED: u32 = 0x1000_0000;

/// Raw platform facts
///
/// Every query may fail; `None` means "unknown" and the probes answer
/// `false` for it.
pub trait DeviceSignals {
    /// Code signing status flags of the current process
    fn code_signing_status(&self) -> Option<u32>;

    /// OS product version string, e.g. `"26.0.1"`
    fn os_product_version(&self) -> Option<String>;

    /// Hardware model identifier, e.g. `"iPhone14,2"`
    fn hardware_model(&self) -> Option<String>;

    fn path_exists(&self, path: &Path) -> bool;

    /// Directory of the running app bundle
    fn bundle_path(&self) -> Option<PathBuf>;
}

impl<S: DeviceSignals + ?Sized> DeviceSignals for &S {
    fn code_signing_status(&self) -> Option<u32> {
        (**self).code_signing_status()
    }

    fn os_product_version(&self) -> Option<String> {
        (**self).os_product_version()
    }

    fn hardware_model(&self) -> Option<String> {
        (**self).hardware_model()
    }

    fn path_exists(&self, path: &Path) -> bool {
        (**self).path_exists(path)
    }

    fn bundle_path(&self) -> Option<PathBuf> {
        (**self).bundle_path()
    }
}

// ════════════════════════════════════════════════════════════
// OS Version
// ════════════════════════════════════════════════════════════

/// Parsed `major.minor.patch` product version; missing parts are zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OsVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl OsVersion {
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.trim().split('.');
        let major = parts.next()?.parse().ok()?;
        let mut next = || match parts.next() {
            Some(p) => p.parse().ok(),
            None => Some(0),
        };
        let minor = next()?;
        let patch = next()?;
        Some(Self {
            major,
            minor,
            patch,
        })
    }
}

impl fmt::Display for OsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

// ════════════════════════════════════════════════════════════
// Hardware Model
// ════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceFamily {
    IPhone,
    IPad,
    Mac,
}

/// Model identifier such as `iPhone14,2`: family, generation, variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HardwareModel {
    pub family: DeviceFamily,
    pub generation: u32,
    pub variant: u32,
}

impl HardwareModel {
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let (family, rest) = [
            ("iPhone", DeviceFamily::IPhone),
            ("iPad", DeviceFamily::IPad),
            ("Mac", DeviceFamily::Mac),
        ]
        .iter()
        .find_map(|(prefix, family)| text.strip_prefix(prefix).map(|rest| (*family, rest)))?;

        let (generation, variant) = rest.split_once(',')?;
        Some(Self {
            family,
            generation: generation.parse().ok()?,
            variant: variant.parse().ok()?,
        })
    }
}

// ════════════════════════════════════════════════════════════
// Process-wide probes
// ════════════════════════════════════════════════════════════

static HOST: OnceBox<Capabilities<HostSignals>> = OnceBox::new();

/// Capabilities of the current process, built on first use
///
/// Racing first callers may each build a set; one is kept and the rest
/// are dropped before any signal is read.
pub fn host() -> &'static Capabilities<HostSignals> {
    HOST.get_or_init(|| Box::new(Capabilities::new(HostSignals::new())))
}

pub fn is_jit_enabled() -> bool {
    host().jit_enabled()
}

pub fn is_ios26_or_later() -> bool {
    host().ios26_or_later()
}

pub fn is_txm_present() -> bool {
    host().txm_present()
}

pub fn is_trollstore_installed() -> bool {
    host().trollstore_installed()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_version() {
        assert_eq!(
            OsVersion::parse("26.0.1"),
            Some(OsVersion {
                major: 26,
                minor: 0,
                patch: 1
            })
        );
        assert_eq!(OsVersion::parse("18.6").map(|v| v.major), Some(18));
        assert_eq!(OsVersion::parse("27").map(|v| (v.minor, v.patch)), Some((0, 0)));
        assert_eq!(OsVersion::parse(""), None);
        assert_eq!(OsVersion::parse("26.x"), None);
        assert!(OsVersion::parse("26.0").unwrap() > OsVersion::parse("18.7.2").unwrap());
    }

    #[test]
    fn test_hardware_model() {
        assert_eq!(
            HardwareModel::parse("iPhone14,2"),
            Some(HardwareModel {
                family: DeviceFamily::IPhone,
                generation: 14,
                variant: 2
            })
        );
        assert_eq!(
            HardwareModel::parse("iPad13,18").map(|m| (m.family, m.generation)),
            Some((DeviceFamily::IPad, 13))
        );
        assert_eq!(HardwareModel::parse("Mac14,7").map(|m| m.family), Some(DeviceFamily::Mac));
        assert_eq!(HardwareModel::parse("arm64"), None);
        assert_eq!(HardwareModel::parse("iPhone"), None);
        assert_eq!(HardwareModel::parse("iPhone14"), None);
    }

    #[test]
    fn test_host_probes_are_stable() {
        let first = host().report();
        assert_eq!(host().report(), first);
        assert_eq!(is_jit_enabled(), first.jit_enabled);
        assert_eq!(is_ios26_or_later(), first.ios26_or_later);
        assert_eq!(is_txm_present(), first.txm_present);
        assert_eq!(is_trollstore_installed(), first.trollstore_installed);
    }
}
