//! Memoized capability answers
//!
//! Each answer is stored once per [`Capabilities`] and never changes
//! afterwards. Nothing here waits: concurrent first callers may each read
//! the signals, the first to finish publishes its answer and every caller
//! returns that stored value.

use core::fmt;
use std::path::Path;

use log::debug;
use once_cell::race::OnceBool;

use crate::config::ProbeConfig;

use super::{DeviceFamily, DeviceSignals, HardwareModel, OsVersion, CS_DEBUGGED};

/// Capability answers for one set of signals
pub struct Capabilities<S: DeviceSignals> {
    signals: S,
    config: ProbeConfig,
    jit: OnceBool,
    ios26: OnceBool,
    txm: OnceBool,
    trollstore: OnceBool,
}

impl<S: DeviceSignals> Capabilities<S> {
    pub fn new(signals: S) -> Self {
        Self::with_config(signals, ProbeConfig::default())
    }

    pub fn with_config(signals: S, config: ProbeConfig) -> Self {
        Self {
            signals,
            config,
            jit: OnceBool::new(),
            ios26: OnceBool::new(),
            txm: OnceBool::new(),
            trollstore: OnceBool::new(),
        }
    }

    pub fn signals(&self) -> &S {
        &self.signals
    }

    pub fn config(&self) -> &ProbeConfig {
        &self.config
    }

    /// A debugger is attached, so pages may be mapped executable
    pub fn jit_enabled(&self) -> bool {
        self.jit.get_or_init(|| {
            let enabled = self
                .signals
                .code_signing_status()
                .is_some_and(|flags| flags & CS_DEBUGGED != 0);
            debug!("jit enabled: {}", enabled);
            enabled
        })
    }

    /// OS product version is at or past the configured major
    pub fn ios26_or_later(&self) -> bool {
        self.ios26.get_or_init(|| {
            let version = self
                .signals
                .os_product_version()
                .as_deref()
                .and_then(OsVersion::parse);
            let later = version.is_some_and(|v| v.major >= self.config.min_os_major);
            debug!("os version {:?}, ios26 or later: {}", version, later);
            later
        })
    }

    /// iOS 26 or later on a TXM-capable chip
    pub fn txm_present(&self) -> bool {
        self.txm.get_or_init(|| {
            let present = self.ios26_or_later()
                && self
                    .signals
                    .hardware_model()
                    .as_deref()
                    .and_then(HardwareModel::parse)
                    .is_some_and(|model| self.txm_capable(&model));
            debug!("txm present: {}", present);
            present
        })
    }

    /// A TrollStore marker sits next to the bundle, or a configured
    /// helper path exists
    pub fn trollstore_installed(&self) -> bool {
        self.trollstore.get_or_init(|| {
            let installed = self.trollstore_marker_present()
                || self
                    .config
                    .trollstore_paths
                    .iter()
                    .any(|path| self.signals.path_exists(path));
            debug!("trollstore installed: {}", installed);
            installed
        })
    }

    /// All four answers
    pub fn report(&self) -> CapabilityReport {
        CapabilityReport {
            jit_enabled: self.jit_enabled(),
            ios26_or_later: self.ios26_or_later(),
            txm_present: self.txm_present(),
            trollstore_installed: self.trollstore_installed(),
        }
    }

    fn txm_capable(&self, model: &HardwareModel) -> bool {
        let min = &self.config.txm_min_generation;
        let threshold = match model.family {
            DeviceFamily::IPhone => min.iphone,
            DeviceFamily::IPad => min.ipad,
            DeviceFamily::Mac => min.mac,
        };
        model.generation >= threshold
    }

    fn trollstore_marker_present(&self) -> bool {
        // markers live in the per-app container, the bundle's parent
        let container = self
            .signals
            .bundle_path()
            .and_then(|bundle| bundle.parent().map(Path::to_path_buf));
        let Some(container) = container else {
            return false;
        };
        self.config
            .trollstore_markers
            .iter()
            .any(|marker| self.signals.path_exists(&container.join(marker)))
    }
}

impl<S: DeviceSignals> fmt::Debug for Capabilities<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("jit", &self.jit.get())
            .field("ios26", &self.ios26.get())
            .field("txm", &self.txm.get())
            .field("trollstore", &self.trollstore.get())
            .finish()
    }
}

/// Snapshot of every capability answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityReport {
    pub jit_enabled: bool,
    pub ios26_or_later: bool,
    pub txm_present: bool,
    pub trollstore_installed: bool,
}

impl fmt::Display for CapabilityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "jit enabled:          {}", self.jit_enabled)?;
        writeln!(f, "ios 26 or later:      {}", self.ios26_or_later)?;
        writeln!(f, "txm present:          {}", self.txm_present)?;
        write!(f, "trollstore installed: {}", self.trollstore_installed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct FakeSignals {
        status: Option<u32>,
        version: Option<&'static str>,
        model: Option<&'static str>,
        existing: Vec<PathBuf>,
        reads: AtomicUsize,
    }

    impl DeviceSignals for FakeSignals {
        fn code_signing_status(&self) -> Option<u32> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.status
        }

        fn os_product_version(&self) -> Option<String> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.version.map(String::from)
        }

        fn hardware_model(&self) -> Option<String> {
            self.model.map(String::from)
        }

        fn path_exists(&self, path: &Path) -> bool {
            self.existing.iter().any(|p| p == path)
        }

        fn bundle_path(&self) -> Option<PathBuf> {
            Some(PathBuf::from("/var/containers/Bundle/Application/ABCD/JESSI.app"))
        }
    }

    #[test]
    fn test_jit_flag() {
        let caps = Capabilities::new(FakeSignals {
            status: Some(CS_DEBUGGED | 0x1),
            ..Default::default()
        });
        assert!(caps.jit_enabled());

        let caps = Capabilities::new(FakeSignals {
            status: Some(0x2000_0001),
            ..Default::default()
        });
        assert!(!caps.jit_enabled());
        assert!(!Capabilities::new(FakeSignals::default()).jit_enabled());
    }

    #[test]
    fn test_memoized() {
        let caps = Capabilities::new(FakeSignals {
            status: Some(CS_DEBUGGED),
            version: Some("26.1"),
            ..Default::default()
        });
        for _ in 0..3 {
            assert!(caps.jit_enabled());
            assert!(caps.ios26_or_later());
        }
        assert_eq!(caps.signals().reads.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_ios26() {
        let at = |v| {
            Capabilities::new(FakeSignals {
                version: Some(v),
                ..Default::default()
            })
            .ios26_or_later()
        };
        assert!(at("26.0"));
        assert!(at("27.2.1"));
        assert!(!at("18.6"));
        assert!(!at("garbage"));
    }

    #[test]
    fn test_txm() {
        let on = |version, model| {
            Capabilities::new(FakeSignals {
                version: Some(version),
                model: Some(model),
                ..Default::default()
            })
            .txm_present()
        };
        assert!(on("26.0", "iPhone14,2"));
        assert!(on("26.0", "iPad16,3"));
        assert!(on("26.0", "Mac14,2"));
        assert!(!on("26.0", "iPhone13,4"));
        assert!(!on("18.6", "iPhone17,1"));
        assert!(!on("26.0", "arm64"));
    }

    #[test]
    fn test_txm_threshold_from_config() {
        let mut config = ProbeConfig::default();
        config.txm_min_generation.iphone = 15;
        let caps = Capabilities::with_config(
            FakeSignals {
                version: Some("26.0"),
                model: Some("iPhone14,5"),
                ..Default::default()
            },
            config,
        );
        assert!(!caps.txm_present());
    }

    #[test]
    fn test_trollstore_marker() {
        let caps = Capabilities::new(FakeSignals {
            existing: vec![PathBuf::from(
                "/var/containers/Bundle/Application/ABCD/_TrollStoreLite",
            )],
            ..Default::default()
        });
        assert!(caps.trollstore_installed());

        let caps = Capabilities::new(FakeSignals {
            existing: vec![PathBuf::from("/var/containers/Bundle/Application/ABCD/JESSI.app")],
            ..Default::default()
        });
        assert!(!caps.trollstore_installed());
    }

    #[test]
    fn test_trollstore_helper_path() {
        let helper = PathBuf::from("/var/jb/TrollStoreHelper");
        let config = ProbeConfig {
            trollstore_paths: vec![helper.clone()],
            ..ProbeConfig::default()
        };
        let caps = Capabilities::with_config(
            FakeSignals {
                existing: vec![helper],
                ..Default::default()
            },
            config,
        );
        assert!(caps.trollstore_installed());
    }
}
